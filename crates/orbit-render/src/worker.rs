//! The render worker.
//!
//! One dedicated thread renders pages one at a time. The worker owns a
//! [`ModuleHost`] and a set of pages it has already rendered; asking it to
//! render a page it has seen before swaps in a fresh host first, so repeat
//! renders always observe the files as they are on disk now. A failed
//! render also recycles the host, leaving the worker clean for the next
//! call.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use orbit_source::normalize;

use crate::error::RenderError;
use crate::host::ModuleHost;
use crate::layout::apply_layout;
use crate::markdown::markdown_to_html;
use crate::transform::{AssetUrlRewriter, RenderContext, Transform};

/// A render request handed to the worker.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    /// Page context assembled by the caller.
    pub context: RenderContext,
    /// Whether to write the rendered output to `context.output_path`.
    pub write_to_disk: bool,
}

/// The outcome of a successful render.
#[derive(Clone, Debug)]
pub struct RenderResult {
    /// Page that was rendered.
    pub source_path: PathBuf,
    /// Where the output was (or would be) written.
    pub output_path: PathBuf,
    /// Page source path relative to the docs directory.
    pub source_relative_path: PathBuf,
    /// The rendered HTML.
    pub content: String,
}

enum Job {
    Render(Box<RenderRequest>),
    Shutdown,
}

type Reply = Result<RenderResult, RenderError>;

/// Factory recreating the transform chain when the worker thread is
/// (re)spawned.
pub type TransformFactory = Arc<dyn Fn() -> Vec<Box<dyn Transform>> + Send + Sync>;

struct WorkerChannel {
    tx: mpsc::Sender<Job>,
    rx: mpsc::Receiver<Reply>,
}

impl WorkerChannel {
    fn spawn(factory: &TransformFactory) -> Self {
        let (job_tx, job_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let transforms = factory();
        thread::spawn(move || worker_main(&job_rx, &reply_tx, &transforms));
        Self {
            tx: job_tx,
            rx: reply_rx,
        }
    }

    /// Send a request and wait for the reply.
    ///
    /// Returns the request itself if the worker thread is gone so the
    /// caller can retry on a fresh one.
    fn round_trip(&self, request: Box<RenderRequest>) -> Result<Reply, Box<RenderRequest>> {
        if let Err(mpsc::SendError(job)) = self.tx.send(Job::Render(request)) {
            if let Job::Render(request) = job {
                return Err(request);
            }
            return Ok(Err(RenderError::WorkerUnavailable));
        }
        // A recv error means the thread died mid-render; the next call's
        // send will fail and trigger a respawn.
        Ok(self
            .rx
            .recv()
            .unwrap_or(Err(RenderError::WorkerUnavailable)))
    }
}

/// Handle to the render worker thread.
///
/// Thread-safe; renders are strictly serialized. A second call while one
/// is outstanding fails with [`RenderError::Concurrent`] instead of
/// queueing.
pub struct RenderWorker {
    in_flight: Mutex<Option<PathBuf>>,
    channel: Mutex<Option<WorkerChannel>>,
    factory: TransformFactory,
}

impl Default for RenderWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderWorker {
    /// Create a worker with only the built-in transforms.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transforms(Arc::new(Vec::new))
    }

    /// Create a worker whose thread runs [`AssetUrlRewriter`] followed by
    /// the transforms the factory produces, in order.
    #[must_use]
    pub fn with_transforms(factory: TransformFactory) -> Self {
        let factory: TransformFactory = Arc::new(move || {
            let mut transforms: Vec<Box<dyn Transform>> = vec![Box::new(AssetUrlRewriter)];
            transforms.extend(factory());
            transforms
        });
        Self {
            in_flight: Mutex::new(None),
            channel: Mutex::new(Some(WorkerChannel::spawn(&factory))),
            factory,
        }
    }

    /// Render one page.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Concurrent`] if a render is already in
    /// flight, [`RenderError::PathMismatch`] if the worker's reply names a
    /// different page, or any pipeline error.
    pub fn render(&self, request: RenderRequest) -> Result<RenderResult, RenderError> {
        let source_path = request.context.source_path.clone();
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(busy) = in_flight.as_ref() {
                return Err(RenderError::Concurrent {
                    in_flight: busy.clone(),
                });
            }
            *in_flight = Some(source_path.clone());
        }

        let reply = self.dispatch(Box::new(request));
        *self.in_flight.lock().unwrap() = None;

        verify_reply(source_path, reply?)
    }

    fn dispatch(&self, request: Box<RenderRequest>) -> Reply {
        let mut slot = self.channel.lock().unwrap();
        let channel = slot.get_or_insert_with(|| WorkerChannel::spawn(&self.factory));

        match channel.round_trip(request) {
            Ok(reply) => reply,
            Err(request) => {
                tracing::warn!("render worker thread is gone; respawning");
                let fresh = WorkerChannel::spawn(&self.factory);
                let reply = match fresh.round_trip(request) {
                    Ok(reply) => reply,
                    Err(_) => Err(RenderError::WorkerUnavailable),
                };
                *slot = Some(fresh);
                reply
            }
        }
    }

    /// Stop the worker thread. Idempotent; the worker respawns on the next
    /// render call.
    pub fn shutdown(&self) {
        if let Some(channel) = self.channel.lock().unwrap().take() {
            let _ = channel.tx.send(Job::Shutdown);
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_main(
    jobs: &mpsc::Receiver<Job>,
    replies: &mpsc::Sender<Reply>,
    transforms: &[Box<dyn Transform>],
) {
    let mut host = ModuleHost::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    while let Ok(job) = jobs.recv() {
        let Job::Render(request) = job else { break };

        let source_path = normalize(&request.context.source_path);
        if !seen.insert(source_path.clone()) {
            // Repeat render: drop the module cache so edits are observed.
            host = ModuleHost::new();
            seen.clear();
            seen.insert(source_path);
        }

        let reply = render_page(&mut host, transforms, &request);
        if reply.is_err() {
            // Leave the worker clean for the next render.
            host = ModuleHost::new();
            seen.clear();
        }

        if replies.send(reply).is_err() {
            break;
        }
    }
}

fn render_page(
    host: &mut ModuleHost,
    transforms: &[Box<dyn Transform>],
    request: &RenderRequest,
) -> Reply {
    let ctx = &request.context;
    let module = host.load(&ctx.source_path)?;

    let mut content = if is_markdown(&ctx.source_path) {
        markdown_to_html(&module.content)
    } else {
        module.content.clone()
    };

    if let Some(layout_target) = module.data.layout.clone() {
        let dir = ctx.source_path.parent().unwrap_or_else(|| Path::new(""));
        let layout = host.load(&dir.join(layout_target))?;
        content = apply_layout(&layout.content, &content, ctx, &module.data);
    }

    for transform in transforms {
        content = transform
            .apply(&content, ctx)
            .map_err(|source| RenderError::Transform {
                name: transform.name().to_owned(),
                source,
            })?;
    }

    if request.write_to_disk {
        write_output(&ctx.output_path, &content)?;
    }

    Ok(RenderResult {
        source_path: ctx.source_path.clone(),
        output_path: ctx.output_path.clone(),
        source_relative_path: ctx.source_relative_path.clone(),
        content,
    })
}

/// A reply must name the page that was asked for; anything else means the
/// worker and caller lost sync and the result cannot be trusted.
fn verify_reply(expected: PathBuf, result: RenderResult) -> Result<RenderResult, RenderError> {
    if result.source_path == expected {
        Ok(result)
    } else {
        Err(RenderError::PathMismatch {
            expected,
            got: result.source_path,
        })
    }
}

fn is_markdown(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".page.md"))
}

fn write_output(path: &Path, content: &str) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RenderError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::error::TransformError;

    assert_impl_all!(RenderWorker: Send, Sync);

    fn context_for(docs: &Path, out: &Path, relative: &str) -> RenderContext {
        let relative = PathBuf::from(relative);
        let output_relative = orbit_source::to_output_relative(&relative);
        RenderContext {
            source_path: docs.join(&relative),
            source_relative_path: relative.clone(),
            output_path: out.join(&output_relative),
            output_relative_path: output_relative,
            url: orbit_source::to_url(&relative),
            menu_html: String::new(),
            vars: BTreeMap::new(),
        }
    }

    fn request_for(docs: &Path, out: &Path, relative: &str) -> RenderRequest {
        RenderRequest {
            context: context_for(docs, out, relative),
            write_to_disk: false,
        }
    }

    #[test]
    fn test_renders_markdown_page() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("index.page.md"), "# Hello\n\nWorld.\n").unwrap();

        let worker = RenderWorker::new();
        let result = worker
            .render(request_for(docs.path(), out.path(), "index.page.md"))
            .unwrap();

        assert!(result.content.contains(r#"<h1 id="hello">Hello</h1>"#));
        assert!(result.content.contains("<p>World.</p>"));
        assert_eq!(result.source_relative_path, PathBuf::from("index.page.md"));
    }

    #[test]
    fn test_html_page_passes_through() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("raw.page.html"), "<p># not markdown</p>").unwrap();

        let worker = RenderWorker::new();
        let result = worker
            .render(request_for(docs.path(), out.path(), "raw.page.html"))
            .unwrap();

        assert_eq!(result.content, "<p># not markdown</p>");
    }

    #[test]
    fn test_layout_application() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::create_dir_all(docs.path().join("_layouts")).unwrap();
        fs::write(
            docs.path().join("_layouts/base.page.html"),
            "<title>{{ title }}</title><main>{{ content }}</main>",
        )
        .unwrap();
        fs::write(
            docs.path().join("about.page.md"),
            "---\ntitle: About\nlayout: ./_layouts/base.page.html\n---\n# About\n",
        )
        .unwrap();

        let worker = RenderWorker::new();
        let result = worker
            .render(request_for(docs.path(), out.path(), "about.page.md"))
            .unwrap();

        assert!(result.content.starts_with("<title>About</title><main>"));
        assert!(result.content.contains(r#"<h1 id="about">About</h1>"#));
    }

    #[test]
    fn test_reply_for_wrong_page_is_rejected() {
        let result = RenderResult {
            source_path: PathBuf::from("/docs/other.page.md"),
            output_path: PathBuf::from("/site/other/index.html"),
            source_relative_path: PathBuf::from("other.page.md"),
            content: String::new(),
        };

        let verdict = verify_reply(PathBuf::from("/docs/index.page.md"), result);

        match verdict {
            Err(RenderError::PathMismatch { expected, got }) => {
                assert_eq!(expected, PathBuf::from("/docs/index.page.md"));
                assert_eq!(got, PathBuf::from("/docs/other.page.md"));
            }
            other => panic!("expected a path mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_repeat_render_observes_edits() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let page = docs.path().join("page.page.md");
        fs::write(&page, "first\n").unwrap();

        let worker = RenderWorker::new();
        let first = worker
            .render(request_for(docs.path(), out.path(), "page.page.md"))
            .unwrap();
        assert!(first.content.contains("first"));

        fs::write(&page, "second\n").unwrap();
        let second = worker
            .render(request_for(docs.path(), out.path(), "page.page.md"))
            .unwrap();
        assert!(second.content.contains("second"));
    }

    #[test]
    fn test_repeat_render_refreshes_includes() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let shared = docs.path().join("shared.md");
        fs::write(&shared, "old shared\n").unwrap();
        fs::write(
            docs.path().join("page.page.md"),
            "{{ include ./shared.md }}\n",
        )
        .unwrap();

        let worker = RenderWorker::new();
        let first = worker
            .render(request_for(docs.path(), out.path(), "page.page.md"))
            .unwrap();
        assert!(first.content.contains("old shared"));

        fs::write(&shared, "new shared\n").unwrap();
        let second = worker
            .render(request_for(docs.path(), out.path(), "page.page.md"))
            .unwrap();
        assert!(second.content.contains("new shared"));
    }

    #[test]
    fn test_write_to_disk() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("about.page.md"), "# About\n").unwrap();

        let worker = RenderWorker::new();
        let mut request = request_for(docs.path(), out.path(), "about.page.md");
        request.write_to_disk = true;
        let result = worker.render(request).unwrap();

        let written = fs::read_to_string(out.path().join("about/index.html")).unwrap();
        assert_eq!(written, result.content);
    }

    #[test]
    fn test_worker_recovers_after_failure() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("good.page.md"), "# Good\n").unwrap();

        let worker = RenderWorker::new();
        let missing = worker.render(request_for(docs.path(), out.path(), "missing.page.md"));
        assert!(matches!(missing, Err(RenderError::Io { .. })));

        let good = worker
            .render(request_for(docs.path(), out.path(), "good.page.md"))
            .unwrap();
        assert!(good.content.contains("Good"));
    }

    /// Transform that parks until the test releases it, to hold the
    /// worker's in-flight guard open deterministically.
    struct Gate {
        started: mpsc::Sender<()>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Transform for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        fn apply(&self, content: &str, _ctx: &RenderContext) -> Result<String, TransformError> {
            self.started.send(()).ok();
            self.release.lock().unwrap().recv().ok();
            Ok(content.to_owned())
        }
    }

    #[test]
    fn test_concurrent_render_is_rejected() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("slow.page.md"), "# Slow\n").unwrap();
        fs::write(docs.path().join("other.page.md"), "# Other\n").unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gates = Mutex::new(Some((started_tx, release_rx)));
        let worker = Arc::new(RenderWorker::with_transforms(Arc::new(move || {
            match gates.lock().unwrap().take() {
                Some((started, release)) => vec![Box::new(Gate {
                    started,
                    release: Mutex::new(release),
                }) as Box<dyn Transform>],
                None => Vec::new(),
            }
        })));

        let background = Arc::clone(&worker);
        let slow = request_for(docs.path(), out.path(), "slow.page.md");
        let slow_path = slow.context.source_path.clone();
        let handle = thread::spawn(move || background.render(slow));

        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("gated render never started");

        let rejected = worker.render(request_for(docs.path(), out.path(), "other.page.md"));
        match rejected {
            Err(RenderError::Concurrent { in_flight }) => assert_eq!(in_flight, slow_path),
            other => panic!("expected Concurrent, got {other:?}"),
        }

        release_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_shutdown_then_render_respawns() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("page.page.md"), "# Page\n").unwrap();

        let worker = RenderWorker::new();
        worker.shutdown();
        worker.shutdown();

        let result = worker
            .render(request_for(docs.path(), out.path(), "page.page.md"))
            .unwrap();
        assert!(result.content.contains("Page"));
    }
}
