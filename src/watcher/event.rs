use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Kind of change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "Created",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
        })
    }
}

/// A notification as delivered by the OS watch facility, before it is tied
/// to a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNotification {
    /// Content, metadata or timestamp change.
    Changed(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    /// One side of a rename the backend reports in two separate events.
    /// Producers pair these up before anything reaches the channel.
    RenameHalf {
        side: RenameSide,
        path: PathBuf,
        /// Backend cookie shared by both halves of one rename, when it has one.
        tracker: Option<usize>,
    },
}

/// Which side of a rename a [`RawNotification::RenameHalf`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameSide {
    From,
    To,
    /// The backend does not say (macOS reports each side as "some rename").
    Unknown,
}

/// Normalized change event flowing through the event channel.
///
/// Immutable once built. `old_path` is `Some` exactly when the kind is
/// [`ChangeKind::Renamed`]; the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    folder: Arc<str>,
    path: PathBuf,
    kind: ChangeKind,
    old_path: Option<PathBuf>,
}

impl ChangeEvent {
    pub fn created(folder: impl Into<Arc<str>>, path: impl Into<PathBuf>) -> Self {
        Self::single(folder.into(), path.into(), ChangeKind::Created)
    }

    pub fn modified(folder: impl Into<Arc<str>>, path: impl Into<PathBuf>) -> Self {
        Self::single(folder.into(), path.into(), ChangeKind::Modified)
    }

    pub fn deleted(folder: impl Into<Arc<str>>, path: impl Into<PathBuf>) -> Self {
        Self::single(folder.into(), path.into(), ChangeKind::Deleted)
    }

    /// `path` is the new location, `old_path` the one it was renamed from.
    pub fn renamed(
        folder: impl Into<Arc<str>>,
        old_path: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            folder: folder.into(),
            path: path.into(),
            kind: ChangeKind::Renamed,
            old_path: Some(old_path.into()),
        }
    }

    fn single(folder: Arc<str>, path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            folder,
            path,
            kind,
            old_path: None,
        }
    }

    /// Tie a raw notification to the folder it was observed in.
    pub fn from_raw(folder: &Arc<str>, raw: RawNotification) -> Self {
        let folder = Arc::clone(folder);
        match raw {
            RawNotification::Changed(path) => Self::single(folder, path, ChangeKind::Modified),
            RawNotification::Created(path) => Self::single(folder, path, ChangeKind::Created),
            RawNotification::Deleted(path) => Self::single(folder, path, ChangeKind::Deleted),
            RawNotification::Renamed { from, to } => Self::renamed(folder, from, to),
            // A half that was never paired is a move across the folder boundary.
            RawNotification::RenameHalf { side, path, .. } => {
                let kind = match side {
                    RenameSide::From => ChangeKind::Deleted,
                    RenameSide::To => ChangeKind::Created,
                    RenameSide::Unknown => ChangeKind::Modified,
                };
                Self::single(folder, path, kind)
            }
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn old_path(&self) -> Option<&Path> {
        self.old_path.as_deref()
    }
}
