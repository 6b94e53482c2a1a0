//! Directory-level data cascade.
//!
//! A `thisDir.data.yaml` file contributes vars to every page in its
//! directory. The page's own front matter wins over these; the merge
//! happens at layout substitution time, the engine only supplies the
//! directory layer here.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use orbit_source::DIR_DATA_FILE;

/// Load the cascaded vars for a page: the scalar entries of the
/// `thisDir.data.yaml` next to it.
///
/// A missing file yields no vars; an unreadable or invalid file is logged
/// and also yields no vars, so a half-typed data file never fails a
/// render.
#[must_use]
pub fn dir_vars(source_path: &Path) -> BTreeMap<String, String> {
    let Some(dir) = source_path.parent() else {
        return BTreeMap::new();
    };
    let data_file = dir.join(DIR_DATA_FILE);
    if !data_file.exists() {
        return BTreeMap::new();
    }

    let content = match fs::read_to_string(&data_file) {
        Ok(content) => content,
        Err(error) => {
            tracing::warn!(path = %data_file.display(), %error, "cannot read directory data");
            return BTreeMap::new();
        }
    };
    let raw: BTreeMap<String, serde_yaml::Value> = match serde_yaml::from_str(&content) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(path = %data_file.display(), %error, "invalid directory data");
            return BTreeMap::new();
        }
    };

    raw.into_iter()
        .filter_map(|(key, value)| scalar_string(&value).map(|s| (key, s)))
        .collect()
}

fn scalar_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
