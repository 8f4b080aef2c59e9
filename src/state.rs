//! In-memory tree state.
//!
//! One arena of node records, a global path index, and per-directory child
//! and subtree collections. Records are never evicted from the arena, so a
//! handle stays readable after its node detaches; attach/detach only edit
//! the collections and the path index.

use crate::file_type::FileType;
use crate::types::NodeId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub(crate) struct DirectoryRecord {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) directories: Vec<NodeId>,
    pub(crate) files: Vec<NodeId>,
    pub(crate) all_directories: Vec<NodeId>,
    pub(crate) all_files: Vec<NodeId>,
}

pub(crate) struct FileRecord {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) basename: String,
    pub(crate) extension: String,
    pub(crate) url: String,
    pub(crate) parent: NodeId,
    pub(crate) content: Option<Vec<u8>>,
    pub(crate) file_type: Arc<FileType>,
}

pub(crate) enum NodeRecord {
    Directory(DirectoryRecord),
    File(FileRecord),
}

impl NodeRecord {
    pub(crate) fn path(&self) -> &Path {
        match self {
            NodeRecord::Directory(record) => &record.path,
            NodeRecord::File(record) => &record.path,
        }
    }

    pub(crate) fn parent(&self) -> Option<NodeId> {
        match self {
            NodeRecord::Directory(record) => record.parent,
            NodeRecord::File(record) => Some(record.parent),
        }
    }

    pub(crate) fn is_directory(&self) -> bool {
        matches!(self, NodeRecord::Directory(_))
    }
}

pub(crate) struct TreeState {
    pub(crate) nodes: HashMap<NodeId, NodeRecord>,
    pub(crate) paths: HashMap<PathBuf, NodeId>,
}

impl TreeState {
    pub(crate) fn new() -> Self {
        TreeState {
            nodes: HashMap::new(),
            paths: HashMap::new(),
        }
    }

    pub(crate) fn record(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[&id]
    }

    pub(crate) fn directory(&self, id: NodeId) -> &DirectoryRecord {
        match &self.nodes[&id] {
            NodeRecord::Directory(record) => record,
            NodeRecord::File(_) => unreachable!("node {id} is not a directory"),
        }
    }

    pub(crate) fn directory_mut(&mut self, id: NodeId) -> &mut DirectoryRecord {
        match self.nodes.get_mut(&id) {
            Some(NodeRecord::Directory(record)) => record,
            _ => unreachable!("node {id} is not a directory"),
        }
    }

    pub(crate) fn file(&self, id: NodeId) -> &FileRecord {
        match &self.nodes[&id] {
            NodeRecord::File(record) => record,
            NodeRecord::Directory(_) => unreachable!("node {id} is not a file"),
        }
    }

    pub(crate) fn file_mut(&mut self, id: NodeId) -> &mut FileRecord {
        match self.nodes.get_mut(&id) {
            Some(NodeRecord::File(record)) => record,
            _ => unreachable!("node {id} is not a file"),
        }
    }

    /// Attach a freshly inserted record to its parent chain and the path
    /// index. Equivalent to calling `add_item` on the node's parent.
    pub(crate) fn register(&mut self, item: NodeId) {
        if let Some(start) = self.record(item).parent() {
            self.register_from(start, item);
        }
        self.index_path(item);
    }

    /// Add `item` to `start`'s collections and propagate up the parent chain:
    /// the direct collection only where `item`'s parent is the directory at
    /// hand, the subtree collection everywhere. Duplicate adds are no-ops.
    pub(crate) fn register_from(&mut self, start: NodeId, item: NodeId) {
        let item_is_directory = self.record(item).is_directory();
        let item_parent = self.record(item).parent();

        let mut cursor = Some(start);
        while let Some(directory_id) = cursor {
            let directory = self.directory_mut(directory_id);
            if item_parent == Some(directory_id) {
                let direct = if item_is_directory {
                    &mut directory.directories
                } else {
                    &mut directory.files
                };
                if !direct.contains(&item) {
                    direct.push(item);
                }
            }
            let subtree = if item_is_directory {
                &mut directory.all_directories
            } else {
                &mut directory.all_files
            };
            if !subtree.contains(&item) {
                subtree.push(item);
            }
            cursor = directory.parent;
        }
    }

    /// Detach `item` from its parent chain and the path index. The record
    /// itself stays in the arena and keeps its parent pointer, so cascades
    /// that run after a delete can still walk upward. Missing removes are
    /// no-ops.
    pub(crate) fn unregister(&mut self, item: NodeId) {
        if let Some(start) = self.record(item).parent() {
            self.unregister_from(start, item);
        }
        self.unindex_path(item);
    }

    pub(crate) fn unregister_from(&mut self, start: NodeId, item: NodeId) {
        let item_is_directory = self.record(item).is_directory();
        let item_parent = self.record(item).parent();

        let mut cursor = Some(start);
        while let Some(directory_id) = cursor {
            let directory = self.directory_mut(directory_id);
            if item_parent == Some(directory_id) {
                let direct = if item_is_directory {
                    &mut directory.directories
                } else {
                    &mut directory.files
                };
                direct.retain(|candidate| *candidate != item);
            }
            let subtree = if item_is_directory {
                &mut directory.all_directories
            } else {
                &mut directory.all_files
            };
            subtree.retain(|candidate| *candidate != item);
            cursor = directory.parent;
        }
    }

    /// Index `item` under its path. Last registration wins; a collision with
    /// a different node is flagged, never silently deduplicated.
    pub(crate) fn index_path(&mut self, item: NodeId) {
        let path = self.record(item).path().to_path_buf();
        if let Some(previous) = self.paths.insert(path.clone(), item) {
            if previous != item {
                warn!(
                    path = %path.display(),
                    "path registered more than once in the structure index"
                );
            }
        }
    }

    /// Remove `item` from the path index, but only while the index still
    /// points at it; a later registration at the same path stays in place.
    pub(crate) fn unindex_path(&mut self, item: NodeId) {
        let path = self.record(item).path().to_path_buf();
        if self.paths.get(&path) == Some(&item) {
            self.paths.remove(&path);
        }
    }

    /// Snapshot of every descendant of `directory`, transitively.
    pub(crate) fn subtree_of(&self, directory: NodeId) -> Vec<NodeId> {
        let record = self.directory(directory);
        let mut subtree = record.all_directories.clone();
        subtree.extend(record.all_files.iter().copied());
        subtree
    }
}
