//! Node handles and operation options.

use crate::directory::Directory;
use crate::error::StructureError;
use crate::file::File;
use crate::serialise::SerialisedNode;
use crate::types::NodeId;
use std::path::{Path, PathBuf};

/// Options for move/copy operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOptions {
    /// Copy instead of move: the original node stays in place and keeps its
    /// reference edges.
    pub is_copy: bool,
}

/// Options threaded from a move through `save` to `delete`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub is_move: bool,
}

/// Options for file deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Deleting the old location of a move is allowed even while incoming
    /// references still point at it; the caller re-establishes them against
    /// the new identity.
    pub is_move: bool,
}

/// Either node type, as returned by `FileStructure::resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directory(Directory),
    File(File),
}

impl Node {
    pub(crate) fn id(&self) -> NodeId {
        match self {
            Node::Directory(directory) => directory.id(),
            Node::File(file) => file.id(),
        }
    }

    pub fn path(&self) -> PathBuf {
        match self {
            Node::Directory(directory) => directory.path(),
            Node::File(file) => file.path(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Node::Directory(directory) => directory.name(),
            Node::File(file) => file.name(),
        }
    }

    pub fn url(&self) -> String {
        match self {
            Node::Directory(directory) => directory.url(),
            Node::File(file) => file.url(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Node::Directory(directory) => Some(directory),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    /// Move or copy this node, whichever kind it is.
    pub async fn move_to(
        &self,
        new_path: impl AsRef<Path>,
        options: MoveOptions,
    ) -> Result<Node, StructureError> {
        match self {
            Node::Directory(directory) => directory
                .move_inner(new_path.as_ref().to_path_buf(), options)
                .await
                .map(Node::Directory),
            Node::File(file) => file.move_to(new_path, options).await.map(Node::File),
        }
    }

    /// Delete this node. Directories ignore `options` (their emptiness check
    /// always applies); files honor `is_move`.
    pub async fn delete(&self, options: DeleteOptions) -> Result<(), StructureError> {
        match self {
            Node::Directory(directory) => directory.delete().await,
            Node::File(file) => file.delete(options).await,
        }
    }

    /// Delete this node and cascade through now-empty ancestors.
    pub async fn cleanup(&self) -> Result<(), StructureError> {
        match self {
            Node::Directory(directory) => directory.cleanup().await,
            Node::File(file) => file.cleanup().await,
        }
    }

    pub fn serialise(&self) -> SerialisedNode {
        match self {
            Node::Directory(directory) => SerialisedNode::Directory(directory.serialise()),
            Node::File(file) => SerialisedNode::File(file.serialise()),
        }
    }
}

impl From<Directory> for Node {
    fn from(directory: Directory) -> Self {
        Node::Directory(directory)
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}
