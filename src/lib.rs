//! file-structure: Live In-Memory Directory Mirror
//!
//! Maintains a live, in-memory mirror of a directory subtree so an editing
//! tool can create, move, copy, delete, and cross-reference files without
//! re-scanning the disk for every operation. The mirror is a process-lifetime
//! cache: the real filesystem is the only persisted state, and a full
//! `refresh` from the root rebuilds everything.

pub mod directory;
pub mod error;
pub mod file;
pub mod file_type;
pub mod node;
pub mod reference;
pub mod serialise;
pub mod structure;
pub mod types;
pub mod watch;

mod path;
mod state;

pub use directory::Directory;
pub use error::StructureError;
pub use file::File;
pub use file_type::{FileBehavior, FileType, Refactor};
pub use node::{DeleteOptions, MoveOptions, Node, SaveOptions};
pub use reference::ReferenceManager;
pub use serialise::{ReferenceStub, SerialisedDirectory, SerialisedFile, SerialisedNode};
pub use structure::FileStructure;
pub use types::NodeId;
pub use watch::WatchHandle;
