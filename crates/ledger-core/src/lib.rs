//! Tamper-evident, append-only ledger: hash-linked blocks sealed by proof-of-work.

pub mod block;
pub mod chain;
pub mod constants;
pub mod error;
pub mod iter;
pub mod memory;
pub mod pow;

pub use block::{puzzle_hash, Block, BlockTemplate, Hash};
pub use chain::{Chain, ChainStore};
pub use error::{CodecError, LedgerError, Result, ValidationError};
pub use iter::BackwardIterator;
pub use memory::MemoryStore;
pub use pow::ProofOfWork;
