use pretty_assertions::assert_eq;
use sitepush_deploy::hash_ledger::{HashLedger, file_sha256};
use tempfile::tempdir;

// sha256("hello")
const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

#[test]
fn hashes_file_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hello.txt");
    std::fs::write(&path, b"hello").unwrap();
    assert_eq!(file_sha256(&path).unwrap(), HELLO_SHA256);
}

#[test]
fn hashing_missing_file_errors() {
    let dir = tempdir().unwrap();
    assert!(file_sha256(&dir.path().join("nope")).is_err());
}

#[test]
fn matches_requires_same_hash_and_size() {
    let mut ledger = HashLedger::new();
    ledger.record("a.txt", 5, HELLO_SHA256.to_string());

    assert!(ledger.matches("a.txt", 5, HELLO_SHA256));
    assert!(!ledger.matches("a.txt", 6, HELLO_SHA256));
    assert!(!ledger.matches("a.txt", 5, "deadbeef"));
    assert!(!ledger.matches("b.txt", 5, HELLO_SHA256));
}

#[test]
fn record_replaces_previous_entry() {
    let mut ledger = HashLedger::new();
    ledger.record("a.txt", 1, "one".into());
    ledger.record("a.txt", 2, "two".into());
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.get("a.txt").unwrap().sha256, "two");
}

#[test]
fn save_then_load_restores_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let mut ledger = HashLedger::new();
    ledger.record("sub/b.txt", 20, HELLO_SHA256.to_string());

    ledger.save(&path).unwrap();
    let loaded = HashLedger::load(&path);

    assert_eq!(loaded, ledger);
    assert!(!dir.path().join("ledger.tmp").exists());
}

#[test]
fn missing_ledger_loads_empty() {
    let dir = tempdir().unwrap();
    assert!(HashLedger::load(&dir.path().join("ledger.json")).is_empty());
}

#[test]
fn corrupt_ledger_loads_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, b"{ not json").unwrap();
    assert!(HashLedger::load(&path).is_empty());
}
