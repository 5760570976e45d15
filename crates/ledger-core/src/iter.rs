use crate::block::{Block, Hash};
use crate::chain::ChainStore;
use crate::error::{LedgerError, Result};

/// Walks the chain from `start` back to genesis by following `previous_hash`.
///
/// Each step is a single store lookup; nothing is buffered. The first error
/// ends the walk.
pub struct BackwardIterator<'a, S: ChainStore + ?Sized> {
    store: &'a S,
    current: Option<Hash>,
}

impl<'a, S: ChainStore + ?Sized> BackwardIterator<'a, S> {
    pub fn new(store: &'a S, start: Hash) -> Self {
        Self {
            store,
            current: Some(start),
        }
    }
}

impl<S: ChainStore + ?Sized> Iterator for BackwardIterator<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current.take()?;
        match self.store.get_block(&hash) {
            Ok(Some(block)) => {
                self.current = block.previous_hash;
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::NotFound(hash))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<S: ChainStore + ?Sized> std::iter::FusedIterator for BackwardIterator<'_, S> {}
