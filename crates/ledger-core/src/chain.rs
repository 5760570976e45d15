use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::block::{Block, BlockTemplate, Hash};
use crate::constants::GENESIS_PAYLOAD;
use crate::error::{CodecError, LedgerError, Result, ValidationError};
use crate::iter::BackwardIterator;
use crate::pow::{self, ProofOfWork};

/// Trait the storage backends implement for the chain to operate.
/// This lives in `ledger-core` to avoid a circular dependency.
pub trait ChainStore: Send + Sync {
    /// Decode the block stored under `hash`, or `None` if the key is absent.
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>>;

    /// Store `block` under its hash and point the tip at it, as one atomic
    /// write. Fails with `TipMismatch` unless `block.previous_hash` equals the
    /// current tip.
    fn put_block_and_advance_tip(&self, block: &Block) -> Result<()>;

    /// `None` only for a store that has never held a block.
    fn tip_hash(&self) -> Result<Option<Hash>>;

    fn close(&self) -> Result<()>;
}

/// Decode a stored value and make sure it is the block its key names.
pub fn decode_stored(key: &Hash, bytes: &[u8]) -> Result<Block> {
    let block = Block::decode(bytes)?;
    if &block.hash != key {
        return Err(CodecError::KeyMismatch {
            key: *key,
            found: block.hash,
        }
        .into());
    }
    Ok(block)
}

/// Chain façade that mines new blocks and delegates persistence to a `ChainStore`.
pub struct Chain<S: ChainStore> {
    store: Arc<S>,
    pow: ProofOfWork,
    // held across read-tip / mine / persist; readers never take it
    append_lock: Arc<Mutex<()>>,
}

impl<S: ChainStore> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pow: self.pow,
            append_lock: Arc::clone(&self.append_lock),
        }
    }
}

impl<S: ChainStore> Chain<S> {
    pub fn open(store: Arc<S>, difficulty_bits: u32) -> Result<Self> {
        Self::with_pow(store, ProofOfWork::new(difficulty_bits)?)
    }

    /// Adopt the stored tip, or mine and persist a genesis block when the
    /// store is empty.
    pub fn with_pow(store: Arc<S>, pow: ProofOfWork) -> Result<Self> {
        match store.tip_hash()? {
            Some(tip) => {
                let block = store.get_block(&tip)?.ok_or(LedgerError::NotFound(tip))?;
                pow::validate(&block).map_err(|source| LedgerError::Validation {
                    hash: tip,
                    source,
                })?;
                debug!(tip = %hex::encode(tip), "adopted existing tip");
            }
            None => {
                let genesis = pow.mine(BlockTemplate::new(None, GENESIS_PAYLOAD.to_vec()))?;
                store.put_block_and_advance_tip(&genesis)?;
                info!(hash = %genesis.hash_hex(), "created genesis block");
            }
        }
        Ok(Self {
            store,
            pow,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Current tip as recorded by the store. Never waits on an append in progress.
    pub fn tip(&self) -> Result<Hash> {
        self.store.tip_hash()?.ok_or(LedgerError::EmptyStore)
    }

    /// Mine a block carrying `payload` on top of the current tip and persist it.
    pub fn append(&self, payload: impl Into<Vec<u8>>) -> Result<Block> {
        let _guard = self.append_lock.lock();
        let template = BlockTemplate::new(Some(self.tip()?), payload.into());
        let block = self.pow.mine(template)?;
        self.store.put_block_and_advance_tip(&block)?;
        info!(hash = %block.hash_hex(), bytes = block.payload.len(), "appended block");
        Ok(block)
    }

    /// Newest-to-oldest walk starting at the current tip.
    pub fn iter(&self) -> Result<BackwardIterator<'_, S>> {
        Ok(BackwardIterator::new(self.store.as_ref(), self.tip()?))
    }

    /// Walk the whole chain and validate every block. Returns the block count.
    pub fn audit(&self) -> Result<u64> {
        let required = self.pow.difficulty_bits();
        let mut count = 0u64;
        for block in self.iter()? {
            let block = block?;
            let checked = pow::validate(&block).and_then(|()| {
                if block.difficulty_bits < required {
                    Err(ValidationError::InsufficientDifficulty {
                        required,
                        found: block.difficulty_bits,
                    })
                } else {
                    Ok(())
                }
            });
            checked.map_err(|source| LedgerError::Validation {
                hash: block.hash,
                source,
            })?;
            count += 1;
        }
        debug!(blocks = count, "audit passed");
        Ok(count)
    }
}
