//! CRC32 (IEEE) implementation of the `Hasher` trait.
//!
//! A CRC is not a cryptographic hash, but formats frequently guard records with one and the
//! checksum layer treats it like any other fixed-size digest. The checksum is emitted big-endian.

use crate::Hasher;

const DIGEST_LENGTH: usize = 4;

/// Digest of a CRC32 computation.
pub type Digest = crate::Digest<DIGEST_LENGTH>;

/// Incremental CRC32 hasher.
#[derive(Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Clone for Crc32 {
    fn clone(&self) -> Self {
        // We manually implement `Clone` to avoid cloning the hasher state.
        Self::default()
    }
}

impl Hasher for Crc32 {
    const NAME: &'static str = "crc32";

    type Digest = Digest;

    fn new() -> Self {
        Self::default()
    }

    fn update(&mut self, message: &[u8]) {
        self.hasher.update(message);
    }

    fn finalize(&mut self) -> Self::Digest {
        let checksum = std::mem::take(&mut self.hasher).finalize();
        Self::Digest::from(checksum.to_be_bytes())
    }

    fn reset(&mut self) {
        self.hasher.reset();
    }
}
