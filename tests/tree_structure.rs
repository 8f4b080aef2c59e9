//! Integration tests for tree construction, discovery, and removal against a
//! real directory.

use file_structure::{DeleteOptions, Directory, File, FileStructure, FileType, Node, StructureError};
use std::path::Path;

fn node_as_file(node: Node) -> File {
    match node {
        Node::File(file) => file,
        Node::Directory(directory) => panic!("expected a file, got {directory:?}"),
    }
}

fn node_as_directory(node: Node) -> Directory {
    match node {
        Node::Directory(directory) => directory,
        Node::File(file) => panic!("expected a directory, got {file:?}"),
    }
}

#[tokio::test]
async fn read_discovers_the_tree_and_honors_eager_subtypes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    std::fs::write(root.join("a.txt"), "alpha").expect("write a.txt");
    std::fs::create_dir(root.join("sub")).expect("mkdir sub");
    std::fs::write(root.join("sub/b.note"), "beta").expect("write b.note");

    let structure = FileStructure::new(root);
    structure.register_file_type(FileType::new("note", ".note"));
    structure.read().await.expect("read");

    let lazy = node_as_file(structure.resolve(root.join("a.txt")).expect("a.txt"));
    assert_eq!(lazy.content(), None);
    assert_eq!(lazy.file_type().name(), "generic");

    let eager = node_as_file(structure.resolve(root.join("sub/b.note")).expect("b.note"));
    assert_eq!(eager.content(), Some(b"beta".to_vec()));
    assert_eq!(eager.file_type().name(), "note");

    let tree = structure.root();
    assert_eq!(tree.files().len(), 1);
    assert_eq!(tree.directories().len(), 1);
    assert_eq!(tree.all_files().len(), 2);
    assert_eq!(tree.all_directories().len(), 1);
}

#[tokio::test]
async fn concurrent_reads_share_one_scan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    std::fs::write(root.join("only.txt"), "once").expect("write only.txt");

    let structure = FileStructure::new(root);
    let directory = structure.root();

    let (first, second) = tokio::join!(directory.read(), directory.read());
    first.expect("first read");
    second.expect("second read");

    // A second underlying scan would have constructed a duplicate node.
    assert_eq!(directory.files().len(), 1);
}

#[tokio::test]
async fn concurrent_refreshes_share_one_rebuild() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    std::fs::write(root.join("only.txt"), "once").expect("write only.txt");

    let structure = FileStructure::new(root);
    structure.read().await.expect("read");

    let directory = structure.root();
    let (first, second) = tokio::join!(directory.refresh(), directory.refresh());
    first.expect("first refresh");
    second.expect("second refresh");

    assert_eq!(directory.files().len(), 1);
}

#[tokio::test]
async fn refresh_rebuilds_the_mirror_from_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    std::fs::write(root.join("old.txt"), "old").expect("write old.txt");

    let structure = FileStructure::new(root);
    structure.read().await.expect("read");
    assert!(structure.resolve(root.join("old.txt")).is_ok());

    std::fs::remove_file(root.join("old.txt")).expect("remove old.txt");
    std::fs::write(root.join("new.txt"), "new").expect("write new.txt");

    structure.refresh().await.expect("refresh");

    assert!(matches!(
        structure.resolve(root.join("old.txt")),
        Err(StructureError::NotFound { .. })
    ));
    assert!(structure.resolve(root.join("new.txt")).is_ok());
    assert_eq!(structure.root().files().len(), 1);
    assert_eq!(structure.root().all_files().len(), 1);
}

#[tokio::test]
async fn save_creates_the_parent_chain_on_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let structure = FileStructure::new(root);
    let file = File::create(&structure, root.join("deep/nested/file.ext")).expect("create");
    file.save("content", Default::default()).await.expect("save");

    assert!(root.join("deep").is_dir());
    assert!(root.join("deep/nested").is_dir());
    assert_eq!(
        std::fs::read_to_string(root.join("deep/nested/file.ext")).expect("read back"),
        "content"
    );
    assert_eq!(file.text(), Some("content".to_string()));

    // Saving into an existing chain is idempotent.
    file.save("updated", Default::default()).await.expect("save again");
    assert_eq!(
        std::fs::read_to_string(root.join("deep/nested/file.ext")).expect("read back"),
        "updated"
    );
}

#[tokio::test]
async fn delete_refuses_a_directory_with_children() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let structure = FileStructure::new(root);
    let file = File::create(&structure, root.join("dir/file.ext")).expect("create");
    file.save("content", Default::default()).await.expect("save");

    let directory = node_as_directory(structure.resolve(root.join("dir")).expect("dir"));
    assert!(matches!(
        directory.delete().await,
        Err(StructureError::NotEmpty { .. })
    ));

    file.delete(DeleteOptions::default()).await.expect("delete file");
    directory.delete().await.expect("delete dir");

    assert!(!root.join("dir").exists());
    assert!(structure.root().directories().is_empty());
    assert!(matches!(
        structure.resolve(root.join("dir")),
        Err(StructureError::NotFound { .. })
    ));
}

#[tokio::test]
async fn cleanup_stops_at_the_first_non_empty_ancestor() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let structure = FileStructure::new(root);
    let first = File::create(&structure, root.join("dir/file-1.ext")).expect("create");
    first.save("one", Default::default()).await.expect("save");
    let second = File::create(&structure, root.join("dir/file-2.ext")).expect("create");
    second.save("two", Default::default()).await.expect("save");

    first.cleanup().await.expect("cleanup");

    // file-1 is gone, but the cascade stopped at the still-occupied
    // directory, so file-2 and the directory survive.
    assert!(!root.join("dir/file-1.ext").exists());
    assert!(root.join("dir/file-2.ext").exists());
    assert!(root.join("dir").is_dir());
    assert!(structure.resolve(root.join("dir")).is_ok());
    assert!(structure.resolve(root.join("dir/file-2.ext")).is_ok());
}

#[tokio::test]
async fn cleanup_cascades_through_empty_ancestors() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let structure = FileStructure::new(root);
    let file = File::create(&structure, root.join("a/b/file.ext")).expect("create");
    file.save("content", Default::default()).await.expect("save");
    let keeper = File::create(&structure, root.join("a/keep.ext")).expect("create");
    keeper.save("kept", Default::default()).await.expect("save");

    file.cleanup().await.expect("cleanup");

    // b emptied out and was removed; a still holds keep.ext and stops the
    // cascade.
    assert!(!root.join("a/b").exists());
    assert!(root.join("a/keep.ext").exists());
    assert!(matches!(
        structure.resolve(root.join("a/b")),
        Err(StructureError::NotFound { .. })
    ));
}

#[tokio::test]
async fn cleanup_rethrows_unexpected_failures() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let structure = FileStructure::new(root);
    // Constructed in memory but never saved: the unlink fails with a raw
    // filesystem error, which must not be swallowed.
    let file = File::create(&structure, root.join("missing.ext")).expect("create");

    assert!(matches!(
        file.cleanup().await,
        Err(StructureError::Io { .. })
    ));
}

#[tokio::test]
async fn rimraf_removes_the_subtree_unconditionally() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let structure = FileStructure::new(root);
    let file = File::create(&structure, root.join("dir/file.ext")).expect("create");
    file.save("content", Default::default()).await.expect("save");
    let nested = File::create(&structure, root.join("dir/sub/nested.ext")).expect("create");
    nested.save("nested", Default::default()).await.expect("save");

    // An incoming reference blocks delete, but not rimraf.
    let referencer = File::create(&structure, root.join("referencer.ext")).expect("create");
    referencer.save("ref", Default::default()).await.expect("save");
    referencer.add_reference(&file);

    let directory = node_as_directory(structure.resolve(root.join("dir")).expect("dir"));
    directory.rimraf().await.expect("rimraf");

    assert!(!root.join("dir").exists());
    assert!(structure.root().directories().is_empty());
    assert!(matches!(
        structure.resolve(root.join("dir")),
        Err(StructureError::NotFound { .. })
    ));
    assert!(matches!(
        structure.resolve(root.join("dir/sub")),
        Err(StructureError::NotFound { .. })
    ));
    // Subtree indexes on the root no longer know any of it.
    assert!(structure.root().all_directories().is_empty());
    assert_eq!(structure.root().all_files().len(), 1);
}

#[tokio::test]
async fn watch_returns_a_live_handle() {
    let temp = tempfile::tempdir().expect("tempdir");
    let structure = FileStructure::new(temp.path());
    let handle = structure.watch().expect("watch");
    // The handle owns the watcher; nothing more to assert without racing the
    // platform notifier.
    drop(handle);
}

#[tokio::test]
async fn resolve_accepts_root_relative_lookups() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    std::fs::write(root.join("file.ext"), "content").expect("write");

    let structure = FileStructure::new(root);
    structure.read().await.expect("read");

    let by_relative = structure.resolve(Path::new("file.ext")).expect("relative");
    let by_absolute = structure.resolve(root.join("file.ext")).expect("absolute");
    assert_eq!(by_relative, by_absolute);

    let by_url = structure.resolve_url("/file.ext").expect("url");
    assert_eq!(by_url, by_absolute);
}
