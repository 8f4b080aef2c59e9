//! Directory nodes.
//!
//! A `Directory` is a cheap handle onto the structure's arena. Recursive
//! operations fan sibling work out without a mandated order and settle only
//! once every child has settled; the first failure wins and in-flight
//! siblings run to completion with their results discarded.

use crate::error::StructureError;
use crate::file::File;
use crate::node::{MoveOptions, Node};
use crate::serialise::SerialisedDirectory;
use crate::structure::{spawn_shared, FileStructure};
use crate::types::NodeId;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Clone)]
pub struct Directory {
    structure: FileStructure,
    id: NodeId,
}

impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Directory {}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}

impl Directory {
    /// Construct a directory node at `target`, which must be the root or
    /// strictly under it. Missing ancestors are created on demand; the new
    /// node registers with its parent and the root index. Constructing the
    /// root path returns the existing root.
    pub fn create(
        structure: &FileStructure,
        target: impl AsRef<Path>,
    ) -> Result<Directory, StructureError> {
        let id = structure.create_directory_node(target.as_ref())?;
        Ok(structure.directory_handle(id))
    }

    pub(crate) fn from_parts(structure: FileStructure, id: NodeId) -> Self {
        Directory { structure, id }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> PathBuf {
        self.structure.inner.state.read().directory(self.id).path.clone()
    }

    pub fn name(&self) -> String {
        self.structure.inner.state.read().directory(self.id).name.clone()
    }

    /// Directories have no extension; name and basename coincide.
    pub fn basename(&self) -> String {
        self.name()
    }

    pub fn url(&self) -> String {
        self.structure.inner.state.read().directory(self.id).url.clone()
    }

    /// The owning directory, or `None` for the root (which the structure
    /// itself owns).
    pub fn parent(&self) -> Option<Directory> {
        let parent = self.structure.inner.state.read().directory(self.id).parent;
        parent.map(|id| self.structure.directory_handle(id))
    }

    /// Direct child directories, in insertion order.
    pub fn directories(&self) -> Vec<Directory> {
        let ids = self.structure.inner.state.read().directory(self.id).directories.clone();
        ids.into_iter()
            .map(|id| self.structure.directory_handle(id))
            .collect()
    }

    /// Direct child files, in insertion order.
    pub fn files(&self) -> Vec<File> {
        let ids = self.structure.inner.state.read().directory(self.id).files.clone();
        ids.into_iter()
            .map(|id| self.structure.file_handle(id))
            .collect()
    }

    /// Every descendant directory, transitively.
    pub fn all_directories(&self) -> Vec<Directory> {
        let ids = self.structure.inner.state.read().directory(self.id).all_directories.clone();
        ids.into_iter()
            .map(|id| self.structure.directory_handle(id))
            .collect()
    }

    /// Every descendant file, transitively.
    pub fn all_files(&self) -> Vec<File> {
        let ids = self.structure.inner.state.read().directory(self.id).all_files.clone();
        ids.into_iter()
            .map(|id| self.structure.file_handle(id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.structure.inner.state.read();
        let record = state.directory(self.id);
        record.directories.is_empty() && record.files.is_empty()
    }

    /// Maintain this directory's collections for a node somewhere in its
    /// subtree, then propagate up the parent chain so every ancestor's
    /// subtree index stays consistent. Duplicate adds are no-ops.
    pub fn add_item(&self, node: &Node) {
        self.structure.inner.state.write().register_from(self.id, node.id());
        self.structure.add_item(node);
    }

    /// Inverse of `add_item`; missing removes are no-ops.
    pub fn remove_item(&self, node: &Node) {
        self.structure.inner.state.write().unregister_from(self.id, node.id());
        self.structure.remove_item(node);
    }

    /// Scan this directory's disk entries into the tree.
    ///
    /// Single-flight: a read requested while one is already in progress
    /// attaches to the same pending result instead of issuing a second scan.
    /// Subdirectories are read recursively; files construct through the
    /// subtype registry, and eager subtypes load their content as part of
    /// discovery.
    pub async fn read(&self) -> Result<(), StructureError> {
        let op = {
            let mut pending = self.structure.inner.pending.lock();
            match pending.reads.get(&self.id) {
                Some(op) => op.clone(),
                None => {
                    let directory = self.clone();
                    let op = spawn_shared(async move {
                        let result = directory.scan().await;
                        directory
                            .structure
                            .inner
                            .pending
                            .lock()
                            .reads
                            .remove(&directory.id);
                        result
                    });
                    pending.reads.insert(self.id, op.clone());
                    op
                }
            }
        };
        op.await
    }

    async fn scan(&self) -> Result<(), StructureError> {
        let path = self.path();
        let mut entries = fs::read_dir(&path)
            .await
            .map_err(|source| StructureError::io(&path, source))?;

        let mut found = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => found.push(entry.path()),
                Ok(None) => break,
                Err(source) => return Err(StructureError::io(&path, source)),
            }
        }
        debug!(path = %path.display(), entries = found.len(), "scanned directory");

        let discoveries = found
            .into_iter()
            .map(|entry| discover(self.structure.clone(), entry));
        for result in join_all(discoveries).await {
            result?;
        }
        Ok(())
    }

    /// Reset this directory's in-memory subtree and re-run `read`.
    ///
    /// Single-flight, independently of `read`: a refresh requested while one
    /// is in flight reuses the pending result.
    pub async fn refresh(&self) -> Result<(), StructureError> {
        let op = {
            let mut pending = self.structure.inner.pending.lock();
            match pending.refreshes.get(&self.id) {
                Some(op) => op.clone(),
                None => {
                    let directory = self.clone();
                    let op = spawn_shared(async move {
                        let result = directory.reset_and_read().await;
                        directory
                            .structure
                            .inner
                            .pending
                            .lock()
                            .refreshes
                            .remove(&directory.id);
                        result
                    });
                    pending.refreshes.insert(self.id, op.clone());
                    op
                }
            }
        };
        op.await
    }

    async fn reset_and_read(&self) -> Result<(), StructureError> {
        {
            let mut state = self.structure.inner.state.write();
            let subtree = state.subtree_of(self.id);
            debug!(path = %state.directory(self.id).path.display(), dropped = subtree.len(), "refreshing directory");
            for id in subtree {
                state.unregister(id);
            }
        }
        self.read().await
    }

    /// Ensure this directory exists on disk. Idempotent: an existing
    /// directory succeeds without mutation; otherwise the parent chain is
    /// ensured first, then the directory is created.
    pub async fn save(&self) -> Result<(), StructureError> {
        self.save_inner().await
    }

    fn save_inner(&self) -> BoxFuture<'static, Result<(), StructureError>> {
        let directory = self.clone();
        async move {
            let path = directory.path();
            if fs::metadata(&path).await.is_ok() {
                return Ok(());
            }
            if let Some(parent) = directory.parent() {
                parent.save_inner().await?;
            }
            match fs::create_dir(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "created directory on disk");
                    Ok(())
                }
                Err(source) if source.kind() == io::ErrorKind::AlreadyExists => Ok(()),
                Err(source) => Err(StructureError::io(&path, source)),
            }
        }
        .boxed()
    }

    /// Delete this directory. Fails with `NotEmpty` while any direct child
    /// remains; on success removes the disk entry and detaches from the
    /// parent chain and every ancestor's subtree index.
    pub async fn delete(&self) -> Result<(), StructureError> {
        let path = self.path();
        if !self.is_empty() {
            return Err(StructureError::NotEmpty { path });
        }
        fs::remove_dir(&path)
            .await
            .map_err(|source| StructureError::io(&path, source))?;
        self.structure.detach(self.id);
        debug!(path = %path.display(), "deleted directory");
        Ok(())
    }

    /// Delete this directory, then cascade upward through now-empty
    /// ancestors. The first ancestor that is not empty terminates the
    /// cascade normally; any other failure propagates unchanged.
    pub async fn cleanup(&self) -> Result<(), StructureError> {
        self.cleanup_inner().await
    }

    pub(crate) fn cleanup_inner(&self) -> BoxFuture<'static, Result<(), StructureError>> {
        let directory = self.clone();
        async move {
            match directory.delete().await {
                Ok(()) => {}
                Err(error) if error.is_not_empty() => return Ok(()),
                Err(error) => return Err(error),
            }
            match directory.parent() {
                Some(parent) => parent.cleanup_inner().await,
                None => Ok(()),
            }
        }
        .boxed()
    }

    /// Unconditional recursive deletion: force-remove every child directory,
    /// delete every child file bypassing the reference check, then remove
    /// this directory's own disk entry and detach.
    pub async fn rimraf(&self) -> Result<(), StructureError> {
        self.rimraf_inner().await
    }

    fn rimraf_inner(&self) -> BoxFuture<'static, Result<(), StructureError>> {
        let directory = self.clone();
        async move {
            let children = directory.directories();
            for result in join_all(children.iter().map(Directory::rimraf_inner)).await {
                result?;
            }
            let files = directory.files();
            for result in join_all(files.iter().map(File::remove_unchecked)).await {
                result?;
            }
            let path = directory.path();
            fs::remove_dir(&path)
                .await
                .map_err(|source| StructureError::io(&path, source))?;
            directory.structure.detach(directory.id);
            debug!(path = %path.display(), "rimrafed directory");
            Ok(())
        }
        .boxed()
    }

    /// Move or copy this directory to `new_path`. A new directory of the
    /// same kind is created and saved, every direct child is moved to the
    /// analogous path under it independently of its siblings, and the
    /// original is deleted unless this is a copy. Any child failure aborts
    /// the whole move with that failure.
    pub async fn move_to(
        &self,
        new_path: impl AsRef<Path>,
        options: MoveOptions,
    ) -> Result<Directory, StructureError> {
        self.move_inner(new_path.as_ref().to_path_buf(), options).await
    }

    pub(crate) fn move_inner(
        &self,
        new_path: PathBuf,
        options: MoveOptions,
    ) -> BoxFuture<'static, Result<Directory, StructureError>> {
        let directory = self.clone();
        async move {
            debug!(
                from = %directory.path().display(),
                to = %new_path.display(),
                is_copy = options.is_copy,
                "moving directory"
            );
            let new_directory = Directory::create(&directory.structure, &new_path)?;
            new_directory.save().await?;

            let mut children: Vec<Node> = Vec::new();
            children.extend(directory.directories().into_iter().map(Node::Directory));
            children.extend(directory.files().into_iter().map(Node::File));

            let moves: Vec<BoxFuture<'static, Result<(), StructureError>>> = children
                .into_iter()
                .map(|child| {
                    let target = new_path.join(child.name());
                    async move { child.move_to(target, options).await.map(|_| ()) }.boxed()
                })
                .collect();
            for result in join_all(moves).await {
                result?;
            }

            if !options.is_copy {
                directory.delete().await?;
            }
            Ok(new_directory)
        }
        .boxed()
    }

    /// Presentation shape for API consumers: children sorted by name,
    /// ascending and case-sensitive, ties kept in insertion order.
    pub fn serialise(&self) -> SerialisedDirectory {
        let mut directories = self.directories();
        directories.sort_by(|a, b| a.name().cmp(&b.name()));
        let mut files = self.files();
        files.sort_by(|a, b| a.name().cmp(&b.name()));

        SerialisedDirectory {
            basename: self.basename(),
            directories: directories.iter().map(Directory::serialise).collect(),
            files: files.iter().map(File::serialise).collect(),
            is_directory: true,
            path: self.path(),
            url: self.url(),
        }
    }
}

/// Stat one scanned entry and bring it into the tree. Subdirectories recurse
/// into `read`; base-type files stay unread while eager subtypes load now.
///
/// Returns a boxed future so the `read` -> `scan` -> `discover` -> `read`
/// recursion has a type-erasure boundary, matching the other recursive
/// helpers on `Directory`.
fn discover(
    structure: FileStructure,
    entry: PathBuf,
) -> BoxFuture<'static, Result<(), StructureError>> {
    async move {
        let metadata = fs::metadata(&entry)
            .await
            .map_err(|source| StructureError::io(&entry, source))?;
        if metadata.is_dir() {
            let directory = Directory::create(&structure, &entry)?;
            directory.read().await
        } else {
            let file = File::create(&structure, &entry)?;
            if file.file_type().eager_read() {
                file.read().await.map(|_| ())
            } else {
                Ok(())
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureError;

    #[test]
    fn construction_creates_missing_ancestors() {
        let structure = FileStructure::new("/file-structure");
        let directory =
            Directory::create(&structure, "/file-structure/parent-directory/directory")
                .expect("should create");

        assert_eq!(directory.url(), "/parent-directory/directory");
        assert!(structure.resolve("/file-structure/parent-directory").is_ok());
        assert_eq!(
            directory.parent().map(|parent| parent.path()),
            Some(PathBuf::from("/file-structure/parent-directory"))
        );
        assert_eq!(structure.root().all_directories().len(), 2);
    }

    #[test]
    fn construction_outside_the_root_fails() {
        let structure = FileStructure::new("/file-structure");
        let error = Directory::create(&structure, "/outside/directory");
        assert!(matches!(error, Err(StructureError::OutOfRoot { .. })));
    }

    #[test]
    fn sibling_roots_are_outside() {
        // "/file-structure-other" shares the string prefix but not the
        // component prefix.
        let structure = FileStructure::new("/file-structure");
        let error = Directory::create(&structure, "/file-structure-other/directory");
        assert!(matches!(error, Err(StructureError::OutOfRoot { .. })));
    }

    #[test]
    fn creating_the_root_path_returns_the_root() {
        let structure = FileStructure::new("/file-structure");
        let directory = Directory::create(&structure, "/file-structure").expect("should resolve");
        assert_eq!(directory, structure.root());
        assert_eq!(directory.url(), "/");
    }

    #[test]
    fn duplicate_construction_is_kept_not_deduped() {
        let structure = FileStructure::new("/file-structure");
        let first = Directory::create(&structure, "/file-structure/a").expect("should create");
        let second = Directory::create(&structure, "/file-structure/a").expect("should create");

        assert_ne!(first, second);
        assert_eq!(structure.root().directories().len(), 2);
    }

    #[test]
    fn serialised_children_sort_by_name_with_stable_ties() {
        let structure = FileStructure::new("/file-structure");
        Directory::create(&structure, "/file-structure/parent/f").expect("should create");
        Directory::create(&structure, "/file-structure/parent/a").expect("should create");
        Directory::create(&structure, "/file-structure/parent/a").expect("should create");
        File::create(&structure, "/file-structure/parent/b").expect("should create");

        let parent = match structure.resolve("/file-structure/parent") {
            Ok(Node::Directory(parent)) => parent,
            other => panic!("expected a directory, got {other:?}"),
        };
        let serialised = parent.serialise();

        let directory_names: Vec<_> = serialised
            .directories
            .iter()
            .map(|child| child.basename.as_str())
            .collect();
        let file_names: Vec<_> = serialised
            .files
            .iter()
            .map(|child| child.basename.as_str())
            .collect();
        assert_eq!(directory_names, vec!["a", "a", "f"]);
        assert_eq!(file_names, vec!["b"]);
        assert!(serialised.is_directory);
    }
}
