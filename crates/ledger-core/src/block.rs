use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::mem::size_of;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{ENCODING_VERSION, HASH_SIZE};
use crate::error::{CodecError, Result};

pub type Hash = [u8; HASH_SIZE];

/// A sealed ledger record. `hash` commits to every other field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64,
    pub payload: Vec<u8>,
    /// `None` only for the genesis block.
    pub previous_hash: Option<Hash>,
    pub hash: Hash,
    pub nonce: i64,
    pub difficulty_bits: u32,
}

/// A block that has not been mined yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplate {
    pub timestamp: i64,
    pub payload: Vec<u8>,
    pub previous_hash: Option<Hash>,
}

impl BlockTemplate {
    pub fn new(previous_hash: Option<Hash>, payload: Vec<u8>) -> Self {
        Self {
            timestamp: unix_now(),
            payload,
            previous_hash,
        }
    }

    pub fn seal(self, difficulty_bits: u32, nonce: i64, hash: Hash) -> Block {
        Block {
            timestamp: self.timestamp,
            payload: self.payload,
            previous_hash: self.previous_hash,
            hash,
            nonce,
            difficulty_bits,
        }
    }

    pub(crate) fn puzzle(&self, difficulty_bits: u32) -> PuzzleHasher {
        PuzzleHasher::new(
            self.previous_hash.as_ref(),
            &self.payload,
            self.timestamp,
            difficulty_bits,
        )
    }
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn previous_hash_hex(&self) -> String {
        self.previous_hash.map(hex::encode).unwrap_or_default()
    }

    /// Recompute the puzzle hash from the block's own fields.
    pub fn compute_hash(&self) -> Hash {
        puzzle_hash(
            self.previous_hash.as_ref(),
            &self.payload,
            self.timestamp,
            self.difficulty_bits,
            self.nonce,
        )
    }

    /// Version byte followed by a big-endian, fixed-width bincode body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        // version, timestamp, payload length + bytes, option tag + previous hash, hash, nonce, difficulty
        let capacity = 1
            + size_of::<i64>()
            + size_of::<u64>()
            + self.payload.len()
            + 1
            + HASH_SIZE * 2
            + size_of::<i64>()
            + size_of::<u32>();
        let mut out = Vec::with_capacity(capacity);
        out.push(ENCODING_VERSION);
        codec()
            .serialize_into(&mut out, self)
            .map_err(CodecError::from)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (version, body) = bytes.split_first().ok_or(CodecError::Empty)?;
        if *version != ENCODING_VERSION {
            return Err(CodecError::UnsupportedVersion(*version).into());
        }
        let block = codec().deserialize(body).map_err(CodecError::from)?;
        Ok(block)
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// SHA-256 over the length-prefixed, big-endian puzzle fields.
pub fn puzzle_hash(
    previous_hash: Option<&Hash>,
    payload: &[u8],
    timestamp: i64,
    difficulty_bits: u32,
    nonce: i64,
) -> Hash {
    PuzzleHasher::new(previous_hash, payload, timestamp, difficulty_bits).hash(nonce)
}

/// Hasher state with every field but the nonce already absorbed.
#[derive(Clone)]
pub(crate) struct PuzzleHasher {
    prefix: Sha256,
}

impl PuzzleHasher {
    pub(crate) fn new(
        previous_hash: Option<&Hash>,
        payload: &[u8],
        timestamp: i64,
        difficulty_bits: u32,
    ) -> Self {
        let mut prefix = Sha256::new();
        match previous_hash {
            Some(prev) => {
                prefix.update([HASH_SIZE as u8]);
                prefix.update(prev);
            }
            None => prefix.update([0u8]),
        }
        prefix.update((payload.len() as u64).to_be_bytes());
        prefix.update(payload);
        prefix.update(timestamp.to_be_bytes());
        prefix.update(difficulty_bits.to_be_bytes());
        Self { prefix }
    }

    pub(crate) fn hash(&self, nonce: i64) -> Hash {
        let digest = self.prefix.clone().chain_update(nonce.to_be_bytes()).finalize();
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(&digest[..]);
        out
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
