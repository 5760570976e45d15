#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ledger_core::Chain;
use ledger_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub const TEST_DIFFICULTY: u32 = 8;

pub fn create_temp_dir() -> (TempDir, PathBuf) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("chain");
    (temp_dir, db_path)
}

pub fn create_temp_store() -> (TempDir, PathBuf, Arc<SledStore>) {
    let (temp_dir, db_path) = create_temp_dir();
    let store = SledStore::open(&db_path).expect("Failed to open SledStore");
    (temp_dir, db_path, Arc::new(store))
}

pub fn open_chain(db_path: &Path) -> Chain<SledStore> {
    let store = SledStore::open(db_path).expect("Failed to open SledStore");
    Chain::open(Arc::new(store), TEST_DIFFICULTY).expect("Failed to open chain")
}

pub fn payloads(chain: &Chain<SledStore>) -> Vec<Vec<u8>> {
    chain
        .iter()
        .expect("Chain should have a tip")
        .map(|block| block.expect("Chain should be readable").payload)
        .collect()
}

/// Overwrite raw bytes in one of the store's trees. The store must be closed.
pub fn write_raw(db_path: &Path, tree: &str, key: &[u8], value: &[u8]) {
    let db = sled::open(db_path).expect("Failed to open raw sled");
    let tree = db.open_tree(tree).expect("Failed to open tree");
    tree.insert(key, value).expect("Failed to write raw value");
    db.flush().expect("Failed to flush raw sled");
}
