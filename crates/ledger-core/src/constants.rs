pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_BITS: u32 = (HASH_SIZE * BYTE) as u32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Valid range for `difficulty_bits`. Zero would accept every hash and 256
/// would accept none.
pub const MIN_DIFFICULTY_BITS: u32 = 1;
pub const MAX_DIFFICULTY_BITS: u32 = HASH_BITS - 1;

pub const DEFAULT_MAX_NONCE: i64 = i64::MAX;

/// Leading byte of every encoded block.
pub const ENCODING_VERSION: u8 = 1;

pub const GENESIS_PAYLOAD: &[u8] = b"Genesis Block";
