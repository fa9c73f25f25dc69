use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "op, actor, target, amount, months, rate, name").unwrap();
    writeln!(csv, "open, ada@example.com, savings, 100.0, , , Ada").unwrap();

    let mut cmd = Command::new(cargo_bin!("ledgerbank"));
    cmd.arg(csv.path()).arg("--db-path").arg("some_db");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."))
        .stdout(predicate::str::contains("ada@example.com,savings,100.00,active"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "op, actor, target, amount, months, rate, name").unwrap();
    writeln!(csv, "open, ada@example.com, savings, 100.0, , , Ada").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("ledgerbank"));
    cmd.env("RUST_LOG", "off")
        .arg(csv.path())
        .arg("--db-path")
        .arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING").not());
}
