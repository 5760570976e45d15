use ledger_core::chain::decode_stored;
use ledger_core::{Block, ChainStore, CodecError, Hash, LedgerError, Result};
use sled::transaction::{
  ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_META: &str = "meta";
const KEY_TIP: &[u8] = b"tip";

/// `ChainStore` on sled. Blocks live in `blocks` keyed by hash; the tip
/// pointer lives in `meta`. sled holds an exclusive file lock on the
/// directory until the last clone of the handle is dropped.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  meta: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let open_err = |source: sled::Error| LedgerError::StoreOpen {
      path: path.to_path_buf(),
      source: source.into(),
    };
    let db = sled::open(path).map_err(open_err)?;
    let blocks = db.open_tree(TREE_BLOCKS).map_err(open_err)?;
    let meta = db.open_tree(TREE_META).map_err(open_err)?;
    info!(path = %path.display(), blocks = blocks.len(), "sled store opened");
    Ok(Self { db, blocks, meta })
  }

  pub fn block_count(&self) -> usize {
    self.blocks.len()
  }
}

fn parse_tip(bytes: &[u8]) -> Result<Hash> {
  <Hash>::try_from(bytes).map_err(|_| CodecError::TipLength(bytes.len()).into())
}

impl ChainStore for SledStore {
  fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
    self
      .blocks
      .get(hash)
      .map_err(LedgerError::store_read)?
      .map(|bytes| decode_stored(hash, &bytes))
      .transpose()
  }

  fn put_block_and_advance_tip(&self, block: &Block) -> Result<()> {
    let bytes = block.encode()?;

    // block and tip land together or not at all
    (&self.blocks, &self.meta)
      .transaction(|(blocks, meta)| -> ConflictableTransactionResult<(), LedgerError> {
        let current = match meta.get(KEY_TIP)? {
          Some(raw) => Some(parse_tip(&raw).map_err(ConflictableTransactionError::Abort)?),
          None => None,
        };
        if current != block.previous_hash {
          return Err(ConflictableTransactionError::Abort(
            LedgerError::TipMismatch {
              expected: block.previous_hash,
              found: current,
            },
          ));
        }
        blocks.insert(&block.hash[..], bytes.as_slice())?;
        meta.insert(KEY_TIP, &block.hash[..])?;
        Ok(())
      })
      .map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => LedgerError::store_write(err),
      })?;

    self.db.flush().map_err(LedgerError::store_write)?;
    debug!(hash = %hex::encode(block.hash), "block persisted, tip advanced");
    Ok(())
  }

  fn tip_hash(&self) -> Result<Option<Hash>> {
    self
      .meta
      .get(KEY_TIP)
      .map_err(LedgerError::store_read)?
      .map(|raw| parse_tip(&raw))
      .transpose()
  }

  fn close(&self) -> Result<()> {
    let flushed = self.db.flush().map_err(LedgerError::store_write)?;
    debug!(bytes = flushed, "sled store flushed");
    Ok(())
  }
}
