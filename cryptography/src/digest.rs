//! Fixed-size digest produced by a [crate::Hasher].

use crate::Error;
use backpatch_codec::{Error as CodecError, FixedSize, Read, Sizeof, Write};
use backpatch_utils::hex;
use bytes::{Buf, BufMut};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
};

/// Digest of `N` bytes.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Digest<const N: usize>([u8; N]);

impl<const N: usize> Write for Digest<N> {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl<const N: usize> Read for Digest<N> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, cfg: &()) -> Result<Self, CodecError> {
        <[u8; N]>::read_cfg(buf, cfg).map(Self)
    }
}

impl<const N: usize> FixedSize for Digest<N> {
    const SIZE: usize = N;
}

impl<const N: usize> Sizeof for Digest<N> {
    fn sizeof() -> Result<usize, CodecError> {
        Ok(N)
    }
}

impl<const N: usize> From<[u8; N]> for Digest<N> {
    fn from(value: [u8; N]) -> Self {
        Self(value)
    }
}

impl<const N: usize> TryFrom<&[u8]> for Digest<N> {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; N] = value
            .try_into()
            .map_err(|_| Error::InvalidDigestLength(N, value.len()))?;
        Ok(Self(array))
    }
}

impl<const N: usize> AsRef<[u8]> for Digest<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> Deref for Digest<N> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> Debug for Digest<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl<const N: usize> Display for Digest<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}
