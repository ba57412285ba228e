//! Integration tests for the complete sync pipeline
//!
//! These tests cross crate boundaries:
//! - dump files → `load_record_dir` → `LocalRecordSet`
//! - `LocalRecordSet` → `Reconciler` → ledger
//!
//! Run with: cargo test --test integration_tests

use std::fs;
use std::time::Duration;
use tempfile::tempdir;
use uen_ledger::abi::AbiDescriptor;
use uen_ledger::{CancelFlag, LedgerError, MemoryLedger, RecordLedger};
use uen_reconcile::{Outcome, Reconciler, RetryPolicy};
use uen_records::{load_record_dir, DataSource};

fn policy() -> RetryPolicy {
    RetryPolicy {
        remote_read_delay: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

fn write_sample(root: &std::path::Path) -> std::path::PathBuf {
    let dir = DataSource::Sample.resolve(root);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("d_01.json"),
        serde_json::json!([
            {"uen": "53123456A", "entity_name": "ACME PTE. LTD.", "entity_status_description": "Live"},
            {"uen": "201912345K", "entity_name": "BETA LLP", "entity_status_description": "na"},
        ])
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.join("d_02.json"),
        serde_json::json!([
            {"uen": "T08LL1234A", "entity_name": "GAMMA LLP"},
            {"uen": "53123456A", "entity_name": "ACME HOLDINGS PTE. LTD."},
        ])
        .to_string(),
    )
    .unwrap();
    fs::write(dir.join("d_03.json"), "{ truncated").unwrap();
    dir
}

// ============================================================================
// Dump files → ledger
// ============================================================================

#[test]
fn test_dump_to_ledger_converges() {
    let root = tempdir().unwrap();
    let dir = write_sample(root.path());

    let loaded = load_record_dir(&dir).unwrap();
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.skipped.len(), 1);

    let ledger = MemoryLedger::new()
        .with_records([("201912345K", "BETA LLP")])
        .with_max_batch(1);
    let report = Reconciler::new(&ledger, policy(), CancelFlag::new())
        .run(&loaded.records, 200)
        .unwrap();

    assert_eq!(report.outcome, Outcome::Synced);
    assert!(report.quarantined.is_empty());
    assert_eq!(ledger.len(), 3);
    // later file wins for the duplicate identifier
    assert_eq!(
        ledger.get_display_name("53123456A").unwrap(),
        "ACME HOLDINGS PTE. LTD."
    );
    // the pre-existing identifier is never part of a submission
    assert!(ledger
        .attempts()
        .iter()
        .all(|batch| !batch.contains(&"201912345K".to_string())));
}

#[test]
fn test_second_run_is_a_no_op() {
    let root = tempdir().unwrap();
    let dir = write_sample(root.path());
    let records = load_record_dir(&dir).unwrap().records;
    let ledger = MemoryLedger::new();

    Reconciler::new(&ledger, policy(), CancelFlag::new())
        .run(&records, 2)
        .unwrap();
    let submitted = ledger.attempts().len();

    let again = Reconciler::new(&ledger, policy(), CancelFlag::new())
        .run(&records, 2)
        .unwrap();
    assert_eq!(again.outcome, Outcome::Synced);
    assert_eq!(again.batches_committed, 0);
    assert_eq!(ledger.attempts().len(), submitted);
}

#[test]
fn test_interrupt_then_resume() {
    let root = tempdir().unwrap();
    let dir = write_sample(root.path());
    let records = load_record_dir(&dir).unwrap().records;

    let ledger = MemoryLedger::new().cancel_on_attempt(2);
    let first = Reconciler::new(&ledger, policy(), CancelFlag::new())
        .run(&records, 1)
        .unwrap();
    assert_eq!(first.outcome, Outcome::Cancelled);
    assert_eq!(ledger.len(), 1);

    let second = Reconciler::new(&ledger, policy(), CancelFlag::new())
        .run(&records, 1)
        .unwrap();
    assert_eq!(second.outcome, Outcome::Synced);
    assert_eq!(ledger.len(), 3);
}

#[test]
fn test_remote_outage_surfaces_as_error() {
    let root = tempdir().unwrap();
    let dir = write_sample(root.path());
    let records = load_record_dir(&dir).unwrap().records;

    let ledger = MemoryLedger::new();
    for _ in 0..5 {
        ledger.fail_next_read(LedgerError::Transport("connection refused".into()));
    }
    let err = Reconciler::new(&ledger, policy(), CancelFlag::new())
        .run(&records, 2)
        .unwrap_err();
    assert!(err.to_string().contains("5 times"));
    assert!(ledger.attempts().is_empty());
}

// ============================================================================
// Shipped contract ABI
// ============================================================================

#[test]
fn test_bundled_abi_declares_registry_functions() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("abi/uen_management.json");
    let abi = AbiDescriptor::load(&path).unwrap();
    abi.require_registry().unwrap();
}
