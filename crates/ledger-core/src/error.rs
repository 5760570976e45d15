use std::path::PathBuf;

use thiserror::Error;

use crate::Hash;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open store at {}", .path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("failed to read from store")]
    StoreRead(#[source] BoxError),

    #[error("failed to write to store")]
    StoreWrite(#[source] BoxError),

    #[error("stored data is corrupt")]
    Serialization(#[from] CodecError),

    /// A hash reachable from the tip is absent from the store.
    #[error("block {} not found in store", hex::encode(.0))]
    NotFound(Hash),

    #[error("no nonce below {max_nonce} meets difficulty {difficulty_bits}")]
    MiningExhausted { difficulty_bits: u32, max_nonce: i64 },

    #[error("block {} failed validation", hex::encode(.hash))]
    Validation {
        hash: Hash,
        #[source]
        source: ValidationError,
    },

    #[error("store holds no chain")]
    EmptyStore,

    #[error("difficulty must be within 1..=255 bits, got {0}")]
    InvalidDifficulty(u32),

    /// The block does not extend the tip currently recorded in the store.
    #[error("block extends {} but the tip is {}", fmt_opt_hash(.expected), fmt_opt_hash(.found))]
    TipMismatch {
        expected: Option<Hash>,
        found: Option<Hash>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("stored hash {} does not match recomputed {}", hex::encode(.stored), hex::encode(.computed))]
    HashMismatch { stored: Hash, computed: Hash },

    #[error("hash is not below the target for {difficulty_bits} bits")]
    DifficultyNotMet { difficulty_bits: u32 },

    #[error("recorded difficulty {0} is outside 1..=255")]
    InvalidDifficulty(u32),

    #[error("recorded difficulty {found} is below the required {required}")]
    InsufficientDifficulty { required: u32, found: u32 },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoded block is empty")]
    Empty,

    #[error("unsupported encoding version {0}")]
    UnsupportedVersion(u8),

    #[error("malformed block body")]
    Body(#[from] bincode::Error),

    #[error("block stored under {} decodes to {}", hex::encode(.key), hex::encode(.found))]
    KeyMismatch { key: Hash, found: Hash },

    #[error("tip pointer has {0} bytes, expected 32")]
    TipLength(usize),
}

fn fmt_opt_hash(hash: &Option<Hash>) -> String {
    match hash {
        Some(h) => hex::encode(h),
        None => "<none>".to_string(),
    }
}

impl LedgerError {
    pub fn store_read<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::StoreRead(err.into())
    }

    pub fn store_write<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::StoreWrite(err.into())
    }
}
