//! File subtypes.
//!
//! A file subtype is a plain data-plus-behavior bundle selected by extension
//! lookup at construction time, not a type hierarchy. The registry tries the
//! longest declared suffix first and falls back to the generic type, which
//! reads lazily and ignores refactor requests.

use crate::error::StructureError;
use crate::file::File;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A change that a file may need to rewrite its own content for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refactor {
    /// The file itself was renamed during a move.
    FileNameChange { old_name: String, new_name: String },
    /// A file this file references was renamed. `extension` is the extension
    /// of the referencing file, so its behavior knows which syntax to rewrite.
    ReferenceNameChange {
        old_name: String,
        new_name: String,
        extension: String,
    },
    /// A file this file references moved to a new path.
    ReferencePathChange {
        from_path: PathBuf,
        old_to_path: PathBuf,
        new_to_path: PathBuf,
    },
}

/// Behavior bundle for a file subtype.
///
/// `refactor` is always asynchronous in contract, even when trivial, so
/// subtypes that rewrite content on disk and subtypes that do nothing share
/// one call shape.
#[async_trait]
pub trait FileBehavior: Send + Sync {
    async fn refactor(&self, _file: &File, _change: &Refactor) -> Result<(), StructureError> {
        Ok(())
    }
}

struct NoopBehavior;

#[async_trait]
impl FileBehavior for NoopBehavior {}

/// Descriptor for a registered file subtype.
pub struct FileType {
    name: String,
    extension: Option<String>,
    eager_read: bool,
    behavior: Arc<dyn FileBehavior>,
}

impl FileType {
    /// A subtype matching every file name ending in `extension` (which may be
    /// multi-segment, e.g. `.special.ext`). Registered subtypes read eagerly
    /// during discovery unless `with_eager_read(false)` opts out.
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Self {
        FileType {
            name: name.into(),
            extension: Some(extension.into()),
            eager_read: true,
            behavior: Arc::new(NoopBehavior),
        }
    }

    pub(crate) fn generic() -> Self {
        FileType {
            name: "generic".to_string(),
            extension: None,
            eager_read: false,
            behavior: Arc::new(NoopBehavior),
        }
    }

    /// Eager subtypes have their content read as part of directory discovery;
    /// the generic type is left unread until someone asks.
    pub fn with_eager_read(mut self, eager_read: bool) -> Self {
        self.eager_read = eager_read;
        self
    }

    pub fn with_behavior(mut self, behavior: Arc<dyn FileBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn eager_read(&self) -> bool {
        self.eager_read
    }

    pub(crate) fn behavior(&self) -> Arc<dyn FileBehavior> {
        Arc::clone(&self.behavior)
    }
}

impl fmt::Debug for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileType")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("eager_read", &self.eager_read)
            .finish()
    }
}

/// Ordered extension-to-subtype registry.
pub(crate) struct FileTypeRegistry {
    types: Vec<Arc<FileType>>,
    generic: Arc<FileType>,
}

impl FileTypeRegistry {
    pub(crate) fn new() -> Self {
        FileTypeRegistry {
            types: Vec::new(),
            generic: Arc::new(FileType::generic()),
        }
    }

    pub(crate) fn register(&mut self, file_type: FileType) {
        self.types.push(Arc::new(file_type));
    }

    /// Longest declared suffix wins; registration order breaks ties.
    pub(crate) fn match_for(&self, file_name: &str) -> Arc<FileType> {
        let mut best: Option<&Arc<FileType>> = None;
        for candidate in &self.types {
            let Some(extension) = candidate.extension() else {
                continue;
            };
            if !file_name.ends_with(extension) {
                continue;
            }
            let better = match best.and_then(|b| b.extension()) {
                Some(current) => extension.len() > current.len(),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
        best.cloned().unwrap_or_else(|| Arc::clone(&self.generic))
    }
}

/// Extension derived from a file name: the segment from the last `.` on, or
/// empty when there is no `.` past the first character (so dotfiles like
/// `.gitignore` have no extension).
pub(crate) fn derived_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(index) if index > 0 => file_name[index..].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_declared_suffix_wins() {
        let mut registry = FileTypeRegistry::new();
        registry.register(FileType::new("plain", ".ext"));
        registry.register(FileType::new("special", ".special.ext"));

        assert_eq!(registry.match_for("file.special.ext").name(), "special");
        assert_eq!(registry.match_for("file.ext").name(), "plain");
    }

    #[test]
    fn unmatched_names_fall_back_to_the_generic_type() {
        let mut registry = FileTypeRegistry::new();
        registry.register(FileType::new("plain", ".ext"));

        let matched = registry.match_for("file.other");
        assert_eq!(matched.name(), "generic");
        assert!(!matched.eager_read());
    }

    #[test]
    fn derived_extension_takes_the_trailing_segment() {
        assert_eq!(derived_extension("file.ext"), ".ext");
        assert_eq!(derived_extension("file.test.ext"), ".ext");
        assert_eq!(derived_extension("file"), "");
        assert_eq!(derived_extension(".gitignore"), "");
    }
}
