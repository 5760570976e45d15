use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

use crate::block::{Block, BlockTemplate, Hash};
use crate::constants::{
    BYTE, DEFAULT_MAX_NONCE, HASH_BITS, HASH_SIZE, MAX_DIFFICULTY_BITS, MIN_DIFFICULTY_BITS,
};
use crate::error::{LedgerError, Result, ValidationError};

/// `2^(256 - difficulty_bits)` as a big-endian 256-bit integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target([u8; HASH_SIZE]);

impl Target {
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Big-endian byte arrays of equal length order like the unsigned integers they encode.
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        hash < &self.0
    }
}

pub fn target(difficulty_bits: u32) -> Result<Target> {
    check_difficulty(difficulty_bits)?;
    let shift = (HASH_BITS - difficulty_bits) as usize;
    let mut bytes = [0u8; HASH_SIZE];
    bytes[HASH_SIZE - 1 - shift / BYTE] = 1 << (shift % BYTE);
    Ok(Target(bytes))
}

fn check_difficulty(difficulty_bits: u32) -> Result<()> {
    if (MIN_DIFFICULTY_BITS..=MAX_DIFFICULTY_BITS).contains(&difficulty_bits) {
        Ok(())
    } else {
        Err(LedgerError::InvalidDifficulty(difficulty_bits))
    }
}

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// Mining parameters. Difficulty is always supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty_bits: u32,
    target: Target,
    max_nonce: i64,
    parallel: bool,
}

impl ProofOfWork {
    pub fn new(difficulty_bits: u32) -> Result<Self> {
        Ok(Self {
            difficulty_bits,
            target: target(difficulty_bits)?,
            max_nonce: DEFAULT_MAX_NONCE,
            parallel: false,
        })
    }

    /// Nonces are searched in `0..max_nonce`.
    pub fn with_max_nonce(mut self, max_nonce: i64) -> Self {
        self.max_nonce = max_nonce.max(0);
        self
    }

    /// Spread the nonce search over the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn max_nonce(&self) -> i64 {
        self.max_nonce
    }

    /// Find the smallest nonce whose puzzle hash falls below the target.
    pub fn solve(&self, template: &BlockTemplate) -> Result<(i64, Hash)> {
        let puzzle = template.puzzle(self.difficulty_bits);
        let target = self.target;
        let started = Instant::now();

        let found = if self.parallel {
            (0..self.max_nonce)
                .into_par_iter()
                .map(|nonce| (nonce, puzzle.hash(nonce)))
                .find_first(|(_, hash)| target.is_met_by(hash))
        } else {
            (0..self.max_nonce)
                .map(|nonce| (nonce, puzzle.hash(nonce)))
                .find(|(_, hash)| target.is_met_by(hash))
        };

        match found {
            Some((nonce, hash)) => {
                debug!(
                    nonce,
                    difficulty_bits = self.difficulty_bits,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "puzzle solved"
                );
                Ok((nonce, hash))
            }
            None => Err(LedgerError::MiningExhausted {
                difficulty_bits: self.difficulty_bits,
                max_nonce: self.max_nonce,
            }),
        }
    }

    pub fn mine(&self, template: BlockTemplate) -> Result<Block> {
        let (nonce, hash) = self.solve(&template)?;
        let block = template.seal(self.difficulty_bits, nonce, hash);
        info!(
            "Mined block {} with nonce {}",
            block.hash_hex(),
            block.nonce
        );
        Ok(block)
    }
}

/// Check a block against its own recorded fields: the stored hash must be
/// reproducible and must fall below the target for the recorded difficulty.
pub fn validate(block: &Block) -> Result<(), ValidationError> {
    let target = target(block.difficulty_bits)
        .map_err(|_| ValidationError::InvalidDifficulty(block.difficulty_bits))?;
    let computed = block.compute_hash();
    if computed != block.hash {
        return Err(ValidationError::HashMismatch {
            stored: block.hash,
            computed,
        });
    }
    if !target.is_met_by(&computed) {
        return Err(ValidationError::DifficultyNotMet {
            difficulty_bits: block.difficulty_bits,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(payload: &[u8]) -> BlockTemplate {
        BlockTemplate {
            timestamp: 1_600_000_000,
            payload: payload.to_vec(),
            previous_hash: Some([3u8; 32]),
        }
    }

    #[test]
    fn leading_zero_bits_examples() {
        let mut h = [0u8; 32];
        assert_eq!(count_leading_zero_bits(&h), 256);
        h[0] = 0x0F; // 00001111
        assert_eq!(count_leading_zero_bits(&h), 4);
        h = [0u8; 32];
        h[1] = 0x80; // 00000000 10000000
        assert_eq!(count_leading_zero_bits(&h), 8);
        h[1] = 0x40; // 01000000
        assert_eq!(count_leading_zero_bits(&h), 9);
    }

    #[test]
    fn target_bit_positions() {
        let t = target(8).unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 0x01;
        assert_eq!(t.as_bytes(), &expected);

        let t = target(1).unwrap();
        expected[0] = 0x80;
        assert_eq!(t.as_bytes(), &expected);

        let t = target(255).unwrap();
        let mut expected = [0u8; 32];
        expected[31] = 0x02;
        assert_eq!(t.as_bytes(), &expected);

        let t = target(20).unwrap();
        let mut expected = [0u8; 32];
        expected[2] = 0x10;
        assert_eq!(t.as_bytes(), &expected);
    }

    #[test]
    fn larger_difficulty_means_smaller_target() {
        for bits in MIN_DIFFICULTY_BITS..MAX_DIFFICULTY_BITS {
            assert!(target(bits + 1).unwrap() < target(bits).unwrap());
        }
    }

    #[test]
    fn target_comparison_is_strict() {
        let t = target(8).unwrap();
        let mut h = [0u8; 32];
        h[0] = 0x01;
        assert!(!t.is_met_by(&h));
        h = [0xFF; 32];
        h[0] = 0x00;
        assert!(t.is_met_by(&h));
    }

    #[test]
    fn difficulty_out_of_range_is_rejected() {
        assert!(matches!(
            ProofOfWork::new(0),
            Err(LedgerError::InvalidDifficulty(0))
        ));
        assert!(matches!(
            ProofOfWork::new(256),
            Err(LedgerError::InvalidDifficulty(256))
        ));
        assert!(ProofOfWork::new(255).is_ok());
    }

    #[test]
    fn mine_block_example() {
        let pow = ProofOfWork::new(16).unwrap();
        let block = pow.mine(template(b"Alice pays Bob")).unwrap();
        assert!(count_leading_zero_bits(&block.hash) >= 16);
        assert_eq!(block.difficulty_bits, 16);
        assert_eq!(validate(&block), Ok(()));
    }

    #[test]
    fn solve_returns_first_valid_nonce() {
        let pow = ProofOfWork::new(8).unwrap();
        let t = template(b"first");
        let (nonce, hash) = pow.solve(&t).unwrap();
        let puzzle = t.puzzle(8);
        assert_eq!(puzzle.hash(nonce), hash);
        for earlier in 0..nonce {
            assert!(!pow.target().is_met_by(&puzzle.hash(earlier)));
        }
    }

    #[test]
    fn parallel_search_matches_sequential() {
        let t = template(b"parallel");
        let seq = ProofOfWork::new(12).unwrap().solve(&t).unwrap();
        let par = ProofOfWork::new(12)
            .unwrap()
            .with_parallel(true)
            .solve(&t)
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn exhausted_nonce_space_is_reported() {
        let pow = ProofOfWork::new(255).unwrap().with_max_nonce(16);
        let err = pow.solve(&template(b"hopeless")).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MiningExhausted {
                difficulty_bits: 255,
                max_nonce: 16
            }
        ));

        let err = pow
            .with_parallel(true)
            .solve(&template(b"hopeless"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::MiningExhausted { .. }));
    }

    #[test]
    fn zero_max_nonce_never_searches() {
        let pow = ProofOfWork::new(1).unwrap().with_max_nonce(-3);
        assert_eq!(pow.max_nonce(), 0);
        assert!(pow.solve(&template(b"x")).is_err());
    }

    #[test]
    fn validate_detects_tampered_payload() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = pow.mine(template(b"honest")).unwrap();
        block.payload = b"forged".to_vec();
        assert!(matches!(
            validate(&block),
            Err(ValidationError::HashMismatch { .. })
        ));
    }

    #[test]
    fn validate_detects_tampered_nonce() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = pow.mine(template(b"honest")).unwrap();
        block.nonce += 1;
        assert!(matches!(
            validate(&block),
            Err(ValidationError::HashMismatch { .. })
        ));
    }

    #[test]
    fn validate_detects_unmet_difficulty() {
        // a consistent hash that was never mined
        let t = template(b"lazy");
        let puzzle = t.puzzle(200);
        let nonce = (0..)
            .find(|n| !target(200).unwrap().is_met_by(&puzzle.hash(*n)))
            .unwrap();
        let hash = puzzle.hash(nonce);
        let block = t.seal(200, nonce, hash);
        assert_eq!(
            validate(&block),
            Err(ValidationError::DifficultyNotMet {
                difficulty_bits: 200
            })
        );
    }

    #[test]
    fn validate_rejects_recorded_difficulty_out_of_range() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = pow.mine(template(b"x")).unwrap();
        block.difficulty_bits = 0;
        assert_eq!(validate(&block), Err(ValidationError::InvalidDifficulty(0)));
    }

    #[test]
    fn lowering_recorded_difficulty_breaks_hash() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = pow.mine(template(b"x")).unwrap();
        block.difficulty_bits = 4;
        assert!(matches!(
            validate(&block),
            Err(ValidationError::HashMismatch { .. })
        ));
    }
}
