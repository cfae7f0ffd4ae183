use std::path::PathBuf;

use tracing::{error, warn};

use crate::config::FolderEntry;

/// A validated watch target: a named, existing directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSpec {
    pub path: PathBuf,
    pub name: String,
}

/// Filter config candidates down to the folders that can be watched.
///
/// - Entries with an empty or missing `path` or `name` are logged as errors and skipped.
/// - Entries whose `path` is not an existing directory are logged as warnings and skipped.
///
/// Invalid entries never fail the run; an empty result is a valid outcome.
pub fn register(candidates: &[FolderEntry]) -> Vec<FolderSpec> {
    candidates
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| validate(index, entry))
        .collect()
}

fn validate(index: usize, entry: &FolderEntry) -> Option<FolderSpec> {
    let path = non_empty(entry.path.as_deref());
    let name = non_empty(entry.name.as_deref());

    let (Some(path), Some(name)) = (path, name) else {
        error!(
            index,
            path = entry.path.as_deref().unwrap_or(""),
            name = entry.name.as_deref().unwrap_or(""),
            "folder entry is missing a path or a name, skipping"
        );
        return None;
    };

    let path = PathBuf::from(path);
    if !path.is_dir() {
        warn!(folder = name, path = %path.display(), "folder does not exist, skipping");
        return None;
    }

    Some(FolderSpec {
        path,
        name: name.to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
