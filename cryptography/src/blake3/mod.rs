//! BLAKE3 implementation of the `Hasher` trait.
//!
//! This implementation uses the `blake3` crate to generate BLAKE3 digests.

use crate::Hasher;
use ::blake3::Hasher as IBlake3;

const DIGEST_LENGTH: usize = ::blake3::OUT_LEN;

/// Digest of a BLAKE3 hashing operation.
pub type Digest = crate::Digest<DIGEST_LENGTH>;

/// BLAKE3 hasher.
#[derive(Debug)]
pub struct Blake3 {
    hasher: IBlake3,
}

impl Default for Blake3 {
    fn default() -> Self {
        <Self as Hasher>::new()
    }
}

impl Clone for Blake3 {
    fn clone(&self) -> Self {
        // We manually implement `Clone` to avoid cloning the hasher state.
        Self::default()
    }
}

impl Hasher for Blake3 {
    const NAME: &'static str = "blake3";

    type Digest = Digest;

    fn new() -> Self {
        Self {
            hasher: IBlake3::new(),
        }
    }

    fn update(&mut self, message: &[u8]) {
        self.hasher.update(message);
    }

    fn finalize(&mut self) -> Self::Digest {
        let finalized = self.hasher.finalize();
        self.hasher.reset();
        Self::Digest::from(*finalized.as_bytes())
    }

    fn reset(&mut self) {
        self.hasher.reset();
    }
}
