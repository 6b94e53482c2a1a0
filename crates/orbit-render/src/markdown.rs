//! Markdown to HTML conversion with generated heading ids.

use std::collections::HashMap;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

/// Convert markdown to HTML.
///
/// Headings without an explicit id get one generated by slugifying their
/// text, so rendered pages always expose linkable heading anchors.
/// Duplicate slugs are disambiguated with a numeric suffix.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events: Vec<Event> = Parser::new_ext(markdown, options).collect();

    let mut used: HashMap<String, u32> = HashMap::new();
    let mut output: Vec<Event> = Vec::with_capacity(events.len());

    for (index, event) in events.iter().enumerate() {
        if let Event::Start(Tag::Heading {
            level,
            id: None,
            classes,
            attrs,
        }) = event
        {
            let slug = unique_slug(&heading_text(&events[index + 1..]), &mut used);
            output.push(Event::Start(Tag::Heading {
                level: *level,
                id: Some(CowStr::from(slug)),
                classes: classes.clone(),
                attrs: attrs.clone(),
            }));
        } else {
            output.push(event.clone());
        }
    }

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, output.into_iter());
    out
}

/// Collect the text of a heading from the events following its start tag.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Slugify heading text: lowercase, alphanumerics kept, runs of anything
/// else collapsed to single dashes.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn unique_slug(text: &str, used: &mut HashMap<String, u32>) -> String {
    let base = slugify(text);
    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}-{}", *count - 1)
    }
}
