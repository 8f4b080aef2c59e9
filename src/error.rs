//! Error types for file structure operations.
//!
//! Domain errors carry a specific message and are raised as the result of the
//! failing operation; unclassified filesystem failures propagate unwrapped for
//! a boundary layer to report. The enum is `Clone` so that a settled
//! single-flight operation can hand the same outcome to every caller that
//! attached to it.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StructureError {
    /// The resolved path is neither the root nor strictly under it. Raised
    /// synchronously at construction, before any state is touched.
    #[error("cannot create \"{}\" because it is outside of the root of the file structure", path.display())]
    OutOfRoot { path: PathBuf },

    /// The path is not present in the structure's index.
    #[error("could not find \"{}\" in the file structure", path.display())]
    NotFound { path: PathBuf },

    /// Deleting a directory that still has direct children.
    #[error("cannot delete \"{}\" because it is not empty", path.display())]
    NotEmpty { path: PathBuf },

    /// Deleting a file that other files still reference, outside of a move.
    #[error("cannot delete \"{}\" because it is referenced by another file", path.display())]
    Referenced { path: PathBuf },

    /// A referencing file failed to rewrite itself while a move was updating
    /// the reference graph. The path names the originally moved file.
    #[error("could not update references after moving \"{}\"", path.display())]
    RefactorFailed { path: PathBuf },

    /// Unclassified failure from the filesystem access surface.
    #[error("filesystem operation on \"{}\" failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// The change-event watcher could not be created or registered.
    #[error("could not watch the file structure: {message}")]
    Watch { message: String },
}

impl StructureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StructureError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Whether this is the `NotEmpty` condition that terminates a `cleanup`
    /// cascade normally.
    pub fn is_not_empty(&self) -> bool {
        matches!(self, StructureError::NotEmpty { .. })
    }
}
