use parking_lot::RwLock;
use std::collections::HashMap;

use crate::block::{Block, Hash};
use crate::chain::{decode_stored, ChainStore};
use crate::error::{LedgerError, Result};

/// Non-durable `ChainStore`. Blocks are kept encoded so reads go through the
/// same decode path as the on-disk store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    blocks: HashMap<Hash, Vec<u8>>,
    tip: Option<Hash>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: Hash, bytes: Vec<u8>) {
        self.inner.write().blocks.insert(key, bytes);
    }

    #[cfg(test)]
    pub(crate) fn remove_raw(&self, key: &Hash) {
        self.inner.write().blocks.remove(key);
    }
}

impl ChainStore for MemoryStore {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        let inner = self.inner.read();
        inner
            .blocks
            .get(hash)
            .map(|bytes| decode_stored(hash, bytes))
            .transpose()
    }

    fn put_block_and_advance_tip(&self, block: &Block) -> Result<()> {
        let bytes = block.encode()?;
        let mut inner = self.inner.write();
        if inner.tip != block.previous_hash {
            return Err(LedgerError::TipMismatch {
                expected: block.previous_hash,
                found: inner.tip,
            });
        }
        inner.blocks.insert(block.hash, bytes);
        inner.tip = Some(block.hash);
        Ok(())
    }

    fn tip_hash(&self) -> Result<Option<Hash>> {
        Ok(self.inner.read().tip)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
