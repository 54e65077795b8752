use super::*;
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[test]
fn fs_strip_prefixes() {
    assert_eq!(strip_prefixes(Path::new("foo/bar")), Path::new("foo/bar"));
    assert_eq!(strip_prefixes(Path::new("/foo/bar")), Path::new("foo/bar"));
    assert_eq!(strip_prefixes(Path::new("/")), Path::new("."));
    assert_eq!(strip_prefixes(Path::new("")), Path::new("."));
}

#[tokio::test]
async fn fs_init_creates_partitions() {
    let root = tempfile::tempdir().unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    fs.init().await.unwrap();
    // A second run finds everything in place.
    fs.init().await.unwrap();

    assert!(root.path().join("users").is_dir());
    assert!(root.path().join("shares").is_dir());
}

#[tokio::test]
async fn fs_new_creates_missing_root() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("data");

    Filesystem::new(&root).unwrap();

    assert!(root.is_dir());
}

#[tokio::test]
async fn fs_stat() {
    let root = tempfile::tempdir().unwrap();

    // Create a temp file and get it's metadata
    let file = tempfile::NamedTempFile::new_in(root.path()).unwrap();
    let path = file.path();
    let file = file.as_file();
    let meta = file.metadata().unwrap();

    let fs = Filesystem::new(root.path()).unwrap();
    let filename = path.file_name().unwrap();
    let my_meta = fs.metadata(filename).await.unwrap();

    assert_eq!(meta.is_dir(), my_meta.is_dir());
    assert_eq!(meta.is_file(), my_meta.is_file());
    assert_eq!(meta.file_type().is_symlink(), my_meta.is_symlink());
    assert_eq!(meta.len(), my_meta.len());
    assert_eq!(meta.modified().unwrap(), my_meta.modified().unwrap());
}

#[tokio::test]
async fn fs_stat_missing_file() {
    let root = tempfile::tempdir().unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    let err = fs.metadata("nope.txt").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn fs_list() {
    // Create a temp directory and create some files in it
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    let file = tempfile::NamedTempFile::new_in(root.path().join("docs")).unwrap();
    let path = file.path();
    let relpath = path.strip_prefix(root.path().join("docs")).unwrap();
    let meta = file.as_file().metadata().unwrap();

    let fs = Filesystem::new(root.path()).unwrap();
    let my_list = fs.list("docs").await.unwrap();

    assert_eq!(my_list.len(), 1);

    let my_fileinfo = &my_list[0];
    assert_eq!(my_fileinfo.path, relpath);
    assert_eq!(my_fileinfo.metadata.is_dir(), meta.is_dir());
    assert_eq!(my_fileinfo.metadata.is_file(), meta.is_file());
    assert_eq!(my_fileinfo.metadata.len(), meta.len());
    assert_eq!(my_fileinfo.metadata.modified().unwrap(), meta.modified().unwrap());
}

#[tokio::test]
async fn fs_open_read() {
    let root = tempfile::tempdir().unwrap();
    let data = b"Koen was here\n";
    let mut f = File::create(root.path().join("bla.txt")).unwrap();
    f.write_all(data).unwrap();

    let fs = Filesystem::new(root.path()).unwrap();
    let mut my_file = fs.open("bla.txt", OpenFlags::READ).await.unwrap();
    let mut my_content = Vec::new();
    my_file.read_to_end(&mut my_content).await.unwrap();

    assert_eq!(data.as_ref(), &*my_content);
}

#[tokio::test]
async fn fs_open_write_truncates() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("greeting.txt"), b"a much longer previous content").unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    let mut file = fs
        .open("greeting.txt", OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE)
        .await
        .unwrap();
    file.write_all(b"hallo").await.unwrap();
    file.flush().await.unwrap();
    drop(file);

    let mut written_content = Vec::new();
    let mut f = File::open(root.path().join("greeting.txt")).unwrap();
    f.read_to_end(&mut written_content).unwrap();
    assert_eq!(b"hallo", written_content.as_slice());
}

#[tokio::test]
async fn fs_create_and_remove_dirs() {
    let root = tempfile::tempdir().unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    fs.create_dir_all("users/alice/docs").await.unwrap();
    std::fs::write(root.path().join("users/alice/docs/note.txt"), b"note").unwrap();
    assert_eq!(fs.create_dir("users/alice/docs").await.unwrap_err().kind(), ErrorKind::AlreadyExists);

    fs.remove_all("users/alice/docs").await.unwrap();

    assert!(!root.path().join("users/alice/docs").exists());
    assert!(root.path().join("users/alice").is_dir());
}

#[tokio::test]
async fn fs_remove_single_file() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("note.txt"), b"note").unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    fs.remove_all("note.txt").await.unwrap();

    assert!(!root.path().join("note.txt").exists());
}

#[tokio::test]
async fn fs_refuses_to_remove_root() {
    let root = tempfile::tempdir().unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    assert_eq!(fs.remove_all("/").await.unwrap_err().kind(), ErrorKind::PermissionDenied);
    assert!(root.path().is_dir());
}

#[tokio::test]
async fn fs_rename() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("old.txt"), b"content").unwrap();
    let fs = Filesystem::new(root.path()).unwrap();

    fs.rename("old.txt", "new.txt").await.unwrap();

    assert!(!root.path().join("old.txt").exists());
    assert_eq!(std::fs::read(root.path().join("new.txt")).unwrap(), b"content");
}

#[tokio::test]
async fn fs_stays_inside_root() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("root");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(parent.path().join("secret.txt"), b"secret").unwrap();
    let fs = Filesystem::new(&root).unwrap();

    assert!(fs.open("../secret.txt", OpenFlags::READ).await.is_err());
    assert!(fs.metadata("../secret.txt").await.is_err());
    assert!(fs.remove_all("../secret.txt").await.is_err());
    assert!(parent.path().join("secret.txt").exists());
}
