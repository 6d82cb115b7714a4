//! Serialize structured data.
//!
//! # Overview
//!
//! A binary serialization library used by the deferred patch engine to:
//! - Serialize values into a binary format
//! - Deserialize untrusted binary input into values
//! - Report whether a type always occupies the same number of bytes
//!
//! # Supported Types
//!
//! Natively supports:
//! - Primitives: `u8`, `u16`, `u32`, `u64`, `u128`, `i8`, `i16`, `i32`, `i64`, `i128`, `f32`, `f64`, `bool`
//! - Fixed-size byte arrays `[u8; N]`
//! - Length-delimited [bytes::Bytes] (varint length, bounded by a [RangeCfg] when reading)
//!
//! All fixed-width integers are written big-endian.
//!
//! # Example
//!
//! ```
//! use bytes::{Buf, BufMut};
//! use backpatch_codec::{DecodeExt, Encode, Error, FixedSize, Read, ReadExt, Sizeof, Write};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Point {
//!     x: u32,
//!     y: u32,
//! }
//!
//! impl Write for Point {
//!     fn write(&self, buf: &mut impl BufMut) {
//!         self.x.write(buf);
//!         self.y.write(buf);
//!     }
//! }
//!
//! impl Read for Point {
//!     type Cfg = ();
//!     fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
//!         let x = u32::read(buf)?;
//!         let y = u32::read(buf)?;
//!         Ok(Self { x, y })
//!     }
//! }
//!
//! impl FixedSize for Point {
//!     const SIZE: usize = u32::SIZE + u32::SIZE;
//! }
//!
//! impl Sizeof for Point {
//!     fn sizeof() -> Result<usize, Error> {
//!         Ok(Self::SIZE)
//!     }
//! }
//!
//! let point = Point { x: 1, y: 2 };
//! let encoded = point.encode();
//! assert_eq!(encoded.len(), 8);
//! assert_eq!(Point::decode(encoded).unwrap(), point);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod types;
pub mod util;
pub mod varint;

// Re-export main types and traits
pub use codec::{
    Decode, DecodeExt, Encode, EncodeSize, FixedSize, Read, ReadExt, Sizeof, Write,
};
pub use config::RangeCfg;
pub use error::Error;
