//! Hash arbitrary messages into fixed-size digests.
//!
//! Every [Hasher] produces a digest with a constant size, which can be discovered by hashing
//! nothing ([Hasher::empty]). Checksum fields rely on this to reserve space for a digest
//! before the hashed data is known.

use thiserror::Error;

pub mod digest;
pub use digest::Digest;
pub mod sha256;
pub use sha256::Sha256;
pub mod blake3;
pub use blake3::Blake3;
pub mod crc32;
pub use crc32::Crc32;

/// Errors that can occur when interacting with cryptographic primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid digest length: expected {0}, got {1}")]
    InvalidDigestLength(usize, usize),
}

/// Interface that commonly used hashing functions implement.
pub trait Hasher: Clone + Send + Sync + 'static {
    /// Human-readable name of the hash function.
    const NAME: &'static str;

    /// Digest generated by the hasher.
    type Digest: AsRef<[u8]> + Clone + Eq + std::fmt::Debug + Send + Sync + 'static;

    /// Create a new hasher.
    fn new() -> Self;

    /// Append message to previously recorded data.
    fn update(&mut self, message: &[u8]);

    /// Hash all recorded data and reset the hasher
    /// to the initial state.
    fn finalize(&mut self) -> Self::Digest;

    /// Reset the hasher without generating a hash.
    ///
    /// This function does not need to be called after `finalize`.
    fn reset(&mut self);

    /// Return result of hashing nothing.
    fn empty() -> Self::Digest {
        Self::new().finalize()
    }

    /// Hash a single message.
    fn hash(message: &[u8]) -> Self::Digest {
        let mut hasher = Self::new();
        hasher.update(message);
        hasher.finalize()
    }
}
