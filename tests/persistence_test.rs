#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: open an account and apply for a loan
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "op, actor, target, amount, months, rate, name").unwrap();
    writeln!(csv1, "open, ada@example.com, savings, 100.0, , , Ada").unwrap();
    writeln!(csv1, "apply_custom, ada@example.com, , 10000, 7, , Wedding").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("ledgerbank"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("ada@example.com,savings,100.00,active"));

    // 2. Second run against the same DB: the account and the loan are still there
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "op, actor, target, amount, months, rate, name").unwrap();
    writeln!(csv2, "deposit, ada@example.com, , 50.0, , ,").unwrap();
    writeln!(csv2, "approve, root, ada@example.com#1, , , 10,").unwrap();
    writeln!(csv2, "pay_emi, ada@example.com, ada@example.com#1, , , ,").unwrap();

    let loans_out = dir.path().join("loans.csv");
    let mut cmd2 = Command::new(cargo_bin!("ledgerbank"));
    cmd2.arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--loans-out")
        .arg(&loans_out);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    let stderr2 = String::from_utf8_lossy(&output2.stderr);
    assert!(!stderr2.contains("Error processing command"), "{stderr2}");

    // Should have recovered 100.0 and added 50.0 = 150.0
    assert!(stdout2.contains("ada@example.com,savings,150.00,active"));
    let loans = std::fs::read_to_string(&loans_out).unwrap();
    assert!(loans.contains("ada@example.com#1,Wedding,Ongoing,10000.00,7,10,1511.90"));
}
