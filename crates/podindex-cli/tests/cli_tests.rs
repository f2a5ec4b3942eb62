//! End-to-end tests running the `podindex` binary.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn create_store(dir: &Path) -> PathBuf {
    let db_path = dir.join("podcastindex_feeds.db");
    let conn = Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE podcasts (id INTEGER PRIMARY KEY, podcastGuid TEXT, title TEXT, description TEXT);
         INSERT INTO podcasts VALUES (1, 'guid-1', 'Go Time', 'concurrency talk');
         INSERT INTO podcasts VALUES (2, 'guid-2', 'Rustacean Hour', 'systems chat');",
    )
    .unwrap();
    db_path
}

fn podindex(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_podindex"))
        .args(args)
        .output()
        .expect("Failed to run podindex")
}

#[test]
fn test_setup_index_and_search() {
    let temp_dir = TempDir::new().unwrap();
    let db = create_store(temp_dir.path());
    let db = db.to_str().unwrap();

    let setup = podindex(&["setup-index", "--db", db, "--no-progress"]);
    assert!(setup.status.success(), "{}", String::from_utf8_lossy(&setup.stderr));

    let found = podindex(&["search", "concurrency", "--db", db, "--out-fields", "id", "title"]);
    assert!(found.status.success());
    assert_eq!(String::from_utf8_lossy(&found.stdout), "[1,\"Go Time\"]\n");

    let default_projection = podindex(&["search", "chat", "--db", db]);
    assert_eq!(
        String::from_utf8_lossy(&default_projection.stdout),
        "[2,\"guid-2\",\"Rustacean Hour\"]\n"
    );
}

#[test]
fn test_error_exit_codes() {
    let temp_dir = TempDir::new().unwrap();
    let db = create_store(temp_dir.path());
    let db = db.to_str().unwrap();

    // Index missing
    let missing = podindex(&["search", "go", "--db", db]);
    assert_eq!(missing.status.code(), Some(3));

    assert!(podindex(&["setup-index", "--db", db, "--no-progress"]).status.success());

    // Field names must be plain identifiers
    let invalid = podindex(&["search", "go", "--db", db, "--fields", "title:x"]);
    assert_eq!(invalid.status.code(), Some(2));

    // Index already built
    let again = podindex(&["setup-index", "--db", db, "--no-progress"]);
    assert_eq!(again.status.code(), Some(3));
}

#[test]
fn test_search_field_not_in_index() {
    let temp_dir = TempDir::new().unwrap();
    let db = create_store(temp_dir.path());
    let db = db.to_str().unwrap();

    let setup = podindex(&["setup-index", "--db", db, "--fields", "title", "--no-progress"]);
    assert!(setup.status.success());

    let output = podindex(&["search", "chat", "--db", db, "--fields", "description"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unpack_missing_archive_member() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("podcastindex_feeds.db.tgz");
    let file = std::fs::File::create(&archive).unwrap();
    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
        file,
        flate2::Compression::default(),
    ));
    let mut header = tar::Header::new_gnu();
    header.set_size(3);
    builder.append_data(&mut header, "./other.db", &b"abc"[..]).unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    let output = podindex(&[
        "unpack",
        "--path",
        archive.to_str().unwrap(),
        "--out-path",
        temp_dir.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(4));
}
