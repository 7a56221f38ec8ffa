//! Session token generation and validation.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Length of a session token in hex characters.
pub const TOKEN_LENGTH: usize = 32;

/// Produces unguessable 32-character lowercase hex tokens from two
/// independently seeded 64-bit generators.
pub struct TokenGenerator {
    first: ChaCha8Rng,
    second: ChaCha8Rng,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self {
            first: ChaCha8Rng::from_entropy(),
            second: ChaCha8Rng::from_entropy(),
        }
    }

    /// Deterministic generator for tests.
    pub fn from_seeds(first: u64, second: u64) -> Self {
        Self {
            first: ChaCha8Rng::seed_from_u64(first),
            second: ChaCha8Rng::seed_from_u64(second),
        }
    }

    pub fn generate(&mut self) -> String {
        format!("{:016x}{:016x}", self.first.next_u64(), self.second.next_u64())
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Syntactic token validation: exactly 32 hex characters.
pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_hexdigit())
}
