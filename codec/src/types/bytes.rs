//! Codec implementations for length-delimited byte strings.
//!
//! For portability and consistency between architectures,
//! the length of the [`Bytes`] must fit within a [`u32`].
//!
//! The encoded size of [`Bytes`] depends on its content, so it reports
//! [Error::Unsized] from [Sizeof].

use crate::{util::at_least, varint, EncodeSize, Error, RangeCfg, Read, Sizeof, Write};
use bytes::{Buf, BufMut, Bytes};

impl Write for Bytes {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        let len = u32::try_from(self.len()).expect("Bytes length exceeds u32");
        varint::write(len, buf);
        buf.put_slice(self);
    }
}

impl EncodeSize for Bytes {
    #[inline]
    fn encode_size(&self) -> usize {
        let len = u32::try_from(self.len()).expect("Bytes length exceeds u32");
        varint::size(len) + self.len()
    }
}

impl Read for Bytes {
    type Cfg = RangeCfg;

    #[inline]
    fn read_cfg(buf: &mut impl Buf, range: &RangeCfg) -> Result<Self, Error> {
        let len32 = varint::read::<u32>(buf)?;
        let len = usize::try_from(len32).map_err(|_| Error::InvalidUsize)?;
        if !range.contains(&len) {
            return Err(Error::InvalidLength(len));
        }
        at_least(buf, len)?;
        Ok(buf.copy_to_bytes(len))
    }
}

impl Sizeof for Bytes {
    #[inline]
    fn sizeof() -> Result<usize, Error> {
        Err(Error::Unsized(std::any::type_name::<Self>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Decode, Encode};

    #[test]
    fn test_bytes() {
        let values = [
            Bytes::new(),
            Bytes::from_static(&[1, 2, 3]),
            Bytes::from(vec![0; 300]),
        ];
        for value in values {
            let encoded = value.encode();
            assert_eq!(
                encoded.len(),
                varint::size(value.len() as u64) + value.len()
            );
            let len = value.len();

            // Valid decoding
            let decoded = Bytes::decode_cfg(encoded, &(len..=len).into()).unwrap();
            assert_eq!(value, decoded);

            // Failure for too long
            assert!(matches!(
                Bytes::decode_cfg(value.encode(), &(..len).into()),
                Err(Error::InvalidLength(_))
            ));

            // Failure for too short
            assert!(matches!(
                Bytes::decode_cfg(value.encode(), &(len + 1..).into()),
                Err(Error::InvalidLength(_))
            ));
        }
    }

    #[test]
    fn test_bytes_unsized() {
        assert!(matches!(Bytes::sizeof(), Err(Error::Unsized(_))));
    }
}
