//! The root aggregate.
//!
//! `FileStructure` owns the root directory, the global path index, the file
//! subtype registry, the reference graph, and the single-flight table for
//! in-flight directory operations. Collaborators hand it a path or URL; it
//! resolves the node and the node does the work.

use crate::directory::Directory;
use crate::error::StructureError;
use crate::file::File;
use crate::file_type::{derived_extension, FileType, FileTypeRegistry};
use crate::node::Node;
use crate::path;
use crate::reference::ReferenceManager;
use crate::serialise::SerialisedDirectory;
use crate::state::{DirectoryRecord, FileRecord, NodeRecord, TreeState};
use crate::types::NodeId;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub(crate) type SharedOp = Shared<BoxFuture<'static, Result<(), StructureError>>>;

/// Run `operation` to completion on the runtime regardless of whether any
/// caller keeps awaiting it, and hand back a sharable view of its outcome.
/// There is no cancellation at this layer; callers that need to stop waiting
/// simply drop their end.
pub(crate) fn spawn_shared<F>(operation: F) -> SharedOp
where
    F: Future<Output = Result<(), StructureError>> + Send + 'static,
{
    let task = tokio::spawn(operation);
    async move {
        match task.await {
            Ok(result) => result,
            // Tasks are never cancelled, so a join error is a panic inside
            // the operation; surface it as a panic here too.
            Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
        }
    }
    .boxed()
    .shared()
}

/// Single-flight table: at most one outstanding read and one outstanding
/// refresh per directory. Slots hold the pending result itself, so late
/// callers attach to the same eventual outcome; a slot is cleared when the
/// operation settles, successfully or not.
#[derive(Default)]
pub(crate) struct PendingOps {
    pub(crate) reads: HashMap<NodeId, SharedOp>,
    pub(crate) refreshes: HashMap<NodeId, SharedOp>,
}

pub(crate) struct StructureInner {
    pub(crate) root_path: PathBuf,
    pub(crate) root_id: NodeId,
    pub(crate) state: RwLock<TreeState>,
    pub(crate) registry: RwLock<FileTypeRegistry>,
    pub(crate) references: ReferenceManager,
    pub(crate) pending: Mutex<PendingOps>,
}

/// Live in-memory mirror of the directory subtree rooted at a configured
/// path. One per configured path, torn down with the process; the real
/// filesystem is the only persisted state and a full `refresh` rebuilds the
/// mirror from it.
#[derive(Clone)]
pub struct FileStructure {
    pub(crate) inner: Arc<StructureInner>,
}

impl FileStructure {
    /// Create a structure rooted at `root_path`. The path is normalized
    /// lexically; callers are expected to pass an absolute path.
    pub fn new(root_path: impl AsRef<Path>) -> Self {
        let root_path = path::normalize(root_path.as_ref());
        let root_id = NodeId::next();
        let name = root_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut state = TreeState::new();
        state.nodes.insert(
            root_id,
            NodeRecord::Directory(DirectoryRecord {
                path: root_path.clone(),
                name,
                url: "/".to_string(),
                parent: None,
                directories: Vec::new(),
                files: Vec::new(),
                all_directories: Vec::new(),
                all_files: Vec::new(),
            }),
        );
        state.paths.insert(root_path.clone(), root_id);

        debug!(root = %root_path.display(), "created file structure");
        FileStructure {
            inner: Arc::new(StructureInner {
                root_path,
                root_id,
                state: RwLock::new(state),
                registry: RwLock::new(FileTypeRegistry::new()),
                references: ReferenceManager::new(),
                pending: Mutex::new(PendingOps::default()),
            }),
        }
    }

    /// The absolute, normalized root path.
    pub fn root_path(&self) -> &Path {
        &self.inner.root_path
    }

    /// Handle to the root directory.
    pub fn root(&self) -> Directory {
        self.directory_handle(self.inner.root_id)
    }

    /// The cross-file reference graph.
    pub fn references(&self) -> &ReferenceManager {
        &self.inner.references
    }

    /// Look a path up in the global index. Relative inputs resolve against
    /// the root.
    pub fn resolve(&self, lookup: impl AsRef<Path>) -> Result<Node, StructureError> {
        let absolute = path::resolve_against(&self.inner.root_path, lookup.as_ref());
        let found = self.inner.state.read().paths.get(&absolute).copied();
        match found {
            Some(id) => Ok(self.node_handle(id)),
            None => Err(StructureError::NotFound { path: absolute }),
        }
    }

    /// Map a root-relative URL (the form boundary callers pass around, e.g.
    /// `/other/file.ext`) to an absolute path under the root.
    pub fn path_for_url(&self, url: &str) -> PathBuf {
        let mut absolute = self.inner.root_path.clone();
        for segment in url.split('/').filter(|segment| !segment.is_empty()) {
            absolute.push(segment);
        }
        path::normalize(&absolute)
    }

    /// Resolve a root-relative URL to a node.
    pub fn resolve_url(&self, url: &str) -> Result<Node, StructureError> {
        self.resolve(self.path_for_url(url))
    }

    /// Register a file subtype. At file-construction time the longest
    /// declared suffix that matches the trailing path segment wins, falling
    /// back to the generic file type.
    pub fn register_file_type(&self, file_type: FileType) {
        debug!(
            name = file_type.name(),
            extension = ?file_type.extension(),
            "registered file type"
        );
        self.inner.registry.write().register(file_type);
    }

    /// Index a node under its path. Called by directories during attach;
    /// adding an already-indexed node is a no-op.
    pub fn add_item(&self, node: &Node) {
        self.inner.state.write().index_path(node.id());
    }

    /// Drop a node from the path index. Removing an absent node is a no-op.
    pub fn remove_item(&self, node: &Node) {
        self.inner.state.write().unindex_path(node.id());
    }

    /// Scan the whole subtree from the root. Delegates to the root
    /// directory's single-flight `read`.
    pub async fn read(&self) -> Result<(), StructureError> {
        self.root().read().await
    }

    /// Drop the in-memory mirror and rebuild it from disk.
    pub async fn refresh(&self) -> Result<(), StructureError> {
        self.root().refresh().await
    }

    /// Serialise the whole tree from the root.
    pub fn serialise(&self) -> SerialisedDirectory {
        self.root().serialise()
    }

    pub(crate) fn directory_handle(&self, id: NodeId) -> Directory {
        Directory::from_parts(self.clone(), id)
    }

    pub(crate) fn file_handle(&self, id: NodeId) -> File {
        File::from_parts(self.clone(), id)
    }

    pub(crate) fn node_handle(&self, id: NodeId) -> Node {
        let is_directory = self.inner.state.read().record(id).is_directory();
        if is_directory {
            Node::Directory(self.directory_handle(id))
        } else {
            Node::File(self.file_handle(id))
        }
    }

    /// Construct a directory node at `target`, creating missing ancestors on
    /// demand. Fails with `OutOfRoot` before any state is touched.
    pub(crate) fn create_directory_node(&self, target: &Path) -> Result<NodeId, StructureError> {
        let absolute = path::resolve_against(&self.inner.root_path, target);
        if !absolute.starts_with(&self.inner.root_path) {
            return Err(StructureError::OutOfRoot { path: absolute });
        }
        if absolute == self.inner.root_path {
            return Ok(self.inner.root_id);
        }
        let mut state = self.inner.state.write();
        Ok(self.create_directory_locked(&mut state, absolute))
    }

    fn create_directory_locked(&self, state: &mut TreeState, absolute: PathBuf) -> NodeId {
        let parent_path = match absolute.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.inner.root_path.clone(),
        };
        let parent_id = self.ensure_directory_locked(state, parent_path);

        let id = NodeId::next();
        let name = absolute
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = path::url_for(&self.inner.root_path, &absolute);
        debug!(path = %absolute.display(), %id, "created directory node");
        state.nodes.insert(
            id,
            NodeRecord::Directory(DirectoryRecord {
                path: absolute,
                name,
                url,
                parent: Some(parent_id),
                directories: Vec::new(),
                files: Vec::new(),
                all_directories: Vec::new(),
                all_files: Vec::new(),
            }),
        );
        state.register(id);
        id
    }

    /// Resolve the directory at `absolute`, creating it (and its ancestors)
    /// when missing. Reuses an indexed directory; this is where the path
    /// index prevents duplicate construction of the parent chain.
    fn ensure_directory_locked(&self, state: &mut TreeState, absolute: PathBuf) -> NodeId {
        if absolute == self.inner.root_path {
            return self.inner.root_id;
        }
        if let Some(&existing) = state.paths.get(&absolute) {
            if state.record(existing).is_directory() {
                return existing;
            }
        }
        self.create_directory_locked(state, absolute)
    }

    /// Construct a file node at `target`. `subtype` pins the file type (used
    /// by moves, which preserve the source subtype); otherwise the registry
    /// picks by longest-suffix match on the file name.
    pub(crate) fn create_file_node(
        &self,
        target: &Path,
        subtype: Option<Arc<FileType>>,
    ) -> Result<NodeId, StructureError> {
        let absolute = path::resolve_against(&self.inner.root_path, target);
        if absolute == self.inner.root_path || !absolute.starts_with(&self.inner.root_path) {
            return Err(StructureError::OutOfRoot { path: absolute });
        }

        let name = absolute
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = subtype.unwrap_or_else(|| self.inner.registry.read().match_for(&name));
        let extension = file_type
            .extension()
            .map(str::to_owned)
            .unwrap_or_else(|| derived_extension(&name));
        let basename = name
            .strip_suffix(&extension)
            .unwrap_or(&name)
            .to_string();
        let url = path::url_for(&self.inner.root_path, &absolute);

        let parent_path = match absolute.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.inner.root_path.clone(),
        };

        let mut state = self.inner.state.write();
        let parent_id = self.ensure_directory_locked(&mut state, parent_path);
        let id = NodeId::next();
        debug!(path = %absolute.display(), file_type = file_type.name(), %id, "created file node");
        state.nodes.insert(
            id,
            NodeRecord::File(FileRecord {
                path: absolute,
                name,
                basename,
                extension,
                url,
                parent: parent_id,
                content: None,
                file_type,
            }),
        );
        state.register(id);
        Ok(id)
    }

    /// Detach a node from its parent chain and the path index.
    pub(crate) fn detach(&self, id: NodeId) {
        self.inner.state.write().unregister(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn resolving_an_unknown_path_is_not_found() {
        let structure = FileStructure::new("/file-structure");
        let error = structure.resolve("/file-structure/missing.ext");
        assert!(matches!(error, Err(StructureError::NotFound { .. })));
    }

    #[test]
    fn the_root_resolves_to_itself() {
        let structure = FileStructure::new("/file-structure");
        let node = structure.resolve("/file-structure");
        assert!(matches!(node, Ok(Node::Directory(_))));
    }

    #[test]
    fn urls_map_to_paths_under_the_root() {
        let structure = FileStructure::new("/file-structure");
        assert_eq!(
            structure.path_for_url("/other/file.ext"),
            Path::new("/file-structure/other/file.ext")
        );
        assert_eq!(structure.path_for_url("/"), Path::new("/file-structure"));
    }
}
