//! File nodes.
//!
//! A `File` is a leaf handle: disk-backed content, extension-based identity,
//! and participation in the reference graph. Content is loaded lazily for the
//! base type; richer subtypes read eagerly during discovery and may rewrite
//! themselves through the `refactor` hook when something they reference moves.

use crate::directory::Directory;
use crate::error::StructureError;
use crate::file_type::{FileType, Refactor};
use crate::node::{DeleteOptions, MoveOptions, SaveOptions};
use crate::serialise::{ReferenceStub, SerialisedFile};
use crate::structure::FileStructure;
use crate::types::NodeId;
use futures::future::join_all;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct File {
    structure: FileStructure,
    id: NodeId,
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for File {}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}

impl File {
    /// Construct a file node at `target`, which must be strictly under the
    /// root. Missing parent directories are created on demand; the subtype
    /// comes from the registry by longest-suffix match, falling back to the
    /// generic type.
    pub fn create(
        structure: &FileStructure,
        target: impl AsRef<Path>,
    ) -> Result<File, StructureError> {
        let id = structure.create_file_node(target.as_ref(), None)?;
        Ok(structure.file_handle(id))
    }

    /// Construct with a pinned subtype; moves use this so the new location
    /// keeps the old file's type even when the name no longer matches it.
    pub(crate) fn create_with_type(
        structure: &FileStructure,
        target: &Path,
        file_type: Arc<FileType>,
    ) -> Result<File, StructureError> {
        let id = structure.create_file_node(target, Some(file_type))?;
        Ok(structure.file_handle(id))
    }

    pub(crate) fn from_parts(structure: FileStructure, id: NodeId) -> Self {
        File { structure, id }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn structure(&self) -> &FileStructure {
        &self.structure
    }

    pub fn path(&self) -> PathBuf {
        self.structure.inner.state.read().file(self.id).path.clone()
    }

    /// The full trailing path segment, extension included.
    pub fn name(&self) -> String {
        self.structure.inner.state.read().file(self.id).name.clone()
    }

    /// The name with the resolved extension stripped.
    pub fn basename(&self) -> String {
        self.structure.inner.state.read().file(self.id).basename.clone()
    }

    /// The subtype-declared extension, or the one derived from the name.
    pub fn extension(&self) -> String {
        self.structure.inner.state.read().file(self.id).extension.clone()
    }

    pub fn url(&self) -> String {
        self.structure.inner.state.read().file(self.id).url.clone()
    }

    /// The owning directory.
    pub fn parent(&self) -> Directory {
        let parent = self.structure.inner.state.read().file(self.id).parent;
        self.structure.directory_handle(parent)
    }

    pub fn file_type(&self) -> Arc<FileType> {
        Arc::clone(&self.structure.inner.state.read().file(self.id).file_type)
    }

    /// Raw content, if a read or save has populated it.
    pub fn content(&self) -> Option<Vec<u8>> {
        self.structure.inner.state.read().file(self.id).content.clone()
    }

    /// Content as UTF-8 text, when populated and valid.
    pub fn text(&self) -> Option<String> {
        self.content()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Files this file points at (outgoing edges), via the reference manager.
    pub fn references(&self) -> Vec<File> {
        self.structure.references().get_references(self)
    }

    /// Files pointing at this file (incoming edges). A back-reference records
    /// a relation only; it never implies ownership.
    pub fn referenced_by(&self) -> Vec<File> {
        self.structure.references().get_referenced_by(self)
    }

    /// Record that this file's content names `other`.
    pub fn add_reference(&self, other: &File) {
        self.structure.references().add_reference(self, other);
    }

    /// Drop every edge touching this file, in both directions.
    pub fn clear_references(&self) {
        self.structure.references().clear_references(self);
    }

    /// Load raw bytes from disk into content. Repeating a read is idempotent,
    /// so no single-flight guard is needed here.
    pub async fn read(&self) -> Result<Vec<u8>, StructureError> {
        let path = self.path();
        let bytes = fs::read(&path)
            .await
            .map_err(|source| StructureError::io(&path, source))?;
        self.structure.inner.state.write().file_mut(self.id).content = Some(bytes.clone());
        debug!(path = %path.display(), bytes = bytes.len(), "read file");
        Ok(bytes)
    }

    /// Ensure the parent directory exists, write `data` to disk, and update
    /// the in-memory content. `options.is_move` does not change save
    /// behavior; it exists so a move can thread one options value through
    /// its save and delete calls.
    pub async fn save(
        &self,
        data: impl Into<Vec<u8>>,
        _options: SaveOptions,
    ) -> Result<(), StructureError> {
        let data = data.into();
        let path = self.path();
        self.parent().save().await?;
        fs::write(&path, &data)
            .await
            .map_err(|source| StructureError::io(&path, source))?;
        self.structure.inner.state.write().file_mut(self.id).content = Some(data);
        debug!(path = %path.display(), "saved file");
        Ok(())
    }

    /// Delete this file. Fails with `Referenced` while other files point at
    /// it, unless `options.is_move` is set: a move may delete the old
    /// location because it is about to re-establish the incoming edges
    /// against the new one. Deletion never touches the reference graph.
    pub async fn delete(&self, options: DeleteOptions) -> Result<(), StructureError> {
        let path = self.path();
        if !options.is_move && !self.referenced_by().is_empty() {
            return Err(StructureError::Referenced { path });
        }
        self.unlink(&path).await
    }

    /// Force-delete for `rimraf`, bypassing the reference check.
    pub(crate) async fn remove_unchecked(&self) -> Result<(), StructureError> {
        let path = self.path();
        self.unlink(&path).await
    }

    async fn unlink(&self, path: &Path) -> Result<(), StructureError> {
        fs::remove_file(path)
            .await
            .map_err(|source| StructureError::io(path, source))?;
        self.structure.detach(self.id);
        debug!(path = %path.display(), "deleted file");
        Ok(())
    }

    /// Delete this file, then cascade upward through now-empty ancestor
    /// directories; the first non-empty ancestor terminates the cascade
    /// normally, any other failure propagates unchanged.
    pub async fn cleanup(&self) -> Result<(), StructureError> {
        match self.delete(DeleteOptions::default()).await {
            Ok(()) => {}
            Err(error) if error.is_not_empty() => return Ok(()),
            Err(error) => return Err(error),
        }
        self.parent().cleanup_inner().await
    }

    /// Subtype extension point: rewrite this file's own content in response
    /// to a name or path change elsewhere. The base type resolves
    /// immediately without doing anything.
    pub async fn refactor(&self, change: Refactor) -> Result<(), StructureError> {
        let behavior = self.file_type().behavior();
        behavior.refactor(self, &change).await
    }

    /// Move or copy this file to `new_path`.
    ///
    /// A new file of the same subtype is created and saved with this file's
    /// content; the old location is deleted unless this is a copy. For a true
    /// move the reference graph follows: incoming edges are re-established
    /// against the new identity and each referencer is asked to refactor
    /// itself, first for the name change, then for the path change. A
    /// refactor rejection fails the whole move with `RefactorFailed` naming
    /// this file; updates already applied are not rolled back.
    pub async fn move_to(
        &self,
        new_path: impl AsRef<Path>,
        options: MoveOptions,
    ) -> Result<File, StructureError> {
        let old_path = self.path();
        let old_name = self.basename();

        debug!(
            from = %old_path.display(),
            to = %new_path.as_ref().display(),
            is_copy = options.is_copy,
            "moving file"
        );
        let new_file =
            File::create_with_type(&self.structure, new_path.as_ref(), self.file_type())?;

        let content = match self.content() {
            Some(bytes) => bytes,
            // Lazily-discovered files have nothing in memory yet; carry the
            // disk content along. A file that never existed on disk moves as
            // empty.
            None => match fs::read(&old_path).await {
                Ok(bytes) => bytes,
                Err(source) if source.kind() == io::ErrorKind::NotFound => Vec::new(),
                Err(source) => return Err(StructureError::io(&old_path, source)),
            },
        };

        let transfer = SaveOptions {
            is_move: !options.is_copy,
        };
        new_file.save(content, transfer).await?;

        if options.is_copy {
            return Ok(new_file);
        }

        self.delete(DeleteOptions { is_move: true }).await?;

        let referencers = self.referenced_by();
        self.clear_references();

        let new_name = new_file.basename();
        let new_to_path = new_file.path();
        let updates = referencers.into_iter().map(|referencer| {
            let new_file = new_file.clone();
            let old_name = old_name.clone();
            let new_name = new_name.clone();
            let old_to_path = old_path.clone();
            let new_to_path = new_to_path.clone();
            async move {
                referencer.add_reference(&new_file);
                referencer
                    .refactor(Refactor::ReferenceNameChange {
                        old_name,
                        new_name,
                        extension: referencer.extension(),
                    })
                    .await?;
                referencer
                    .refactor(Refactor::ReferencePathChange {
                        from_path: referencer.path(),
                        old_to_path,
                        new_to_path,
                    })
                    .await
            }
        });
        for result in join_all(updates).await {
            if let Err(error) = result {
                warn!(path = %old_path.display(), %error, "reference refactor failed");
                return Err(StructureError::RefactorFailed { path: old_path });
            }
        }

        if old_name != new_name {
            if let Err(error) = new_file
                .refactor(Refactor::FileNameChange {
                    old_name,
                    new_name,
                })
                .await
            {
                warn!(path = %old_path.display(), %error, "rename refactor failed");
                return Err(StructureError::RefactorFailed { path: old_path });
            }
        }

        Ok(new_file)
    }

    /// Presentation shape for API consumers. References serialise as shallow
    /// stubs so cyclic reference chains cannot recurse.
    pub fn serialise(&self) -> SerialisedFile {
        SerialisedFile {
            basename: self.basename(),
            extension: self.extension(),
            path: self.path(),
            references: self.references().iter().map(File::stub).collect(),
            referenced_by: self.referenced_by().iter().map(File::stub).collect(),
            url: self.url(),
        }
    }

    fn stub(&self) -> ReferenceStub {
        ReferenceStub {
            basename: self.basename(),
            extension: self.extension(),
            path: self.path(),
            url: self.url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_type::FileType;
    use std::path::PathBuf;

    #[test]
    fn works_out_name_extension_basename_and_url() {
        let structure = FileStructure::new("/file-structure");
        let file = File::create(&structure, "/file-structure/directory/file.ext")
            .expect("should create");

        assert_eq!(file.name(), "file.ext");
        assert_eq!(file.extension(), ".ext");
        assert_eq!(file.basename(), "file");
        assert_eq!(file.url(), "/directory/file.ext");
    }

    #[test]
    fn subtype_extension_beats_the_derived_one() {
        let structure = FileStructure::new("/file-structure");
        structure.register_file_type(FileType::new("test", ".test.ext"));

        let file = File::create(&structure, "/file-structure/directory/file.test.ext")
            .expect("should create");

        assert_eq!(file.extension(), ".test.ext");
        assert_eq!(file.basename(), "file");
        assert_eq!(file.file_type().name(), "test");
    }

    #[test]
    fn creates_the_parent_chain_on_demand() {
        let structure = FileStructure::new("/file-structure");
        let file = File::create(
            &structure,
            "/file-structure/parent-directory/directory/file.ext",
        )
        .expect("should create");

        assert!(structure
            .resolve("/file-structure/parent-directory")
            .is_ok());
        assert!(structure
            .resolve("/file-structure/parent-directory/directory")
            .is_ok());
        assert_eq!(
            file.parent().path(),
            PathBuf::from("/file-structure/parent-directory/directory")
        );
    }

    #[test]
    fn construction_outside_the_root_fails() {
        let structure = FileStructure::new("/file-structure");
        let error = File::create(&structure, "/outside/file.ext");
        assert!(matches!(error, Err(StructureError::OutOfRoot { .. })));
    }

    #[test]
    fn references_mirror_in_both_directions() {
        let structure = FileStructure::new("/file-structure");
        let file = File::create(&structure, "/file-structure/file.ext").expect("should create");
        let other =
            File::create(&structure, "/file-structure/other-file.ext").expect("should create");

        file.add_reference(&other);
        file.add_reference(&other);

        assert_eq!(file.references(), vec![other.clone()]);
        assert_eq!(other.referenced_by(), vec![file.clone()]);

        file.clear_references();

        assert!(file.references().is_empty());
        assert!(other.referenced_by().is_empty());
    }

    #[test]
    fn serialises_references_as_shallow_stubs() {
        let structure = FileStructure::new("/file-structure");
        let file = File::create(&structure, "/file-structure/directory/file.ext")
            .expect("should create");
        let other = File::create(&structure, "/file-structure/directory/other-file.ext")
            .expect("should create");

        other.add_reference(&file);
        let serialised = file.serialise();

        assert_eq!(serialised.basename, "file");
        assert_eq!(serialised.extension, ".ext");
        assert_eq!(serialised.url, "/directory/file.ext");
        assert!(serialised.references.is_empty());
        assert_eq!(serialised.referenced_by.len(), 1);
        assert_eq!(serialised.referenced_by[0].basename, "other-file");
        assert_eq!(
            serialised.referenced_by[0].url,
            "/directory/other-file.ext"
        );
    }
}
