//! Write fields whose value is only known after they have been encoded.
//!
//! # Overview
//!
//! Many binary formats store, ahead of some data, a value derived from that data: a checksum,
//! a length, the offset of a later structure. A single-pass [Encoder] cannot produce such a
//! field when it reaches it. Instead, it writes a fixed-size placeholder and allocates a
//! deferred [Slot]. Once the value is known, the slot is patched in place: the bytes at the
//! slot are checked to still be the placeholder and then overwritten with the encoded value.
//! Each slot is patched exactly once, and [Encoder::finish] fails if any slot never was.
//!
//! Regions that must be preceded by their own length ([Encoder::prefixed]) are encoded into a
//! private buffer first and spliced into the output once complete. Offsets recorded inside
//! such a region account for every enclosing buffer and every pending length header (see
//! [frame::resolve]), so a slot always refers to its position in the final output.
//!
//! Checksums ([Encoder::checksum]) are deferred slots sized for a [backpatch_cryptography::Hasher]
//! and computed over regions captured with [Encoder::capture]. The [Decoder] mirrors the
//! encoder: deferred fields are recorded rather than patched and checksums are verified
//! against their captured sources.
//!
//! An [Encoder] or [Decoder] is a single invocation. It owns all of its state, so independent
//! invocations may run concurrently on different threads.
//!
//! # Example
//!
//! ```rust
//! use backpatch_cryptography::Sha256;
//! use backpatch_deferred::{decode, encode, CaptureCfg, Error, Shape, Source};
//!
//! // Offset of the payload and a digest of it, both written ahead of the payload
//! let encoded = encode(|e| {
//!     let slot = e.field("offset", |e| e.defer::<u16>())?;
//!     e.field("hash", |e| {
//!         e.checksum::<Sha256>(Source::value("payload"), Shape::Single);
//!         Ok(())
//!     })?;
//!     e.write_field("header", &0xffu8);
//!     let offset = e.offset() as u16;
//!     e.field("payload", |e| {
//!         e.capture(&CaptureCfg::checksum(), |e| {
//!             e.prefixed::<u8, _>(|e| {
//!                 e.put_slice(b"hello");
//!                 Ok(())
//!             })
//!         })
//!     })?;
//!     e.patch(&slot, &offset)?;
//!     e.write_checksums()
//! })?;
//! assert_eq!(encoded.len(), 2 + 32 + 1 + 1 + 5);
//!
//! let offset = decode(encoded, |d| {
//!     let offset = d.field("offset", |d| d.defer::<u16>())?;
//!     d.field("hash", |d| {
//!         d.checksum::<Sha256>(Source::value("payload"), Shape::Single)
//!     })?;
//!     d.read_field::<u8>("header")?;
//!     d.field("payload", |d| {
//!         d.capture(&CaptureCfg::checksum(), |d| d.prefixed::<u8, _>(|d| d.take(5)))
//!     })?;
//!     d.verify_checksums()?;
//!     Ok(offset)
//! })?;
//! assert_eq!(offset, 35);
//! # Ok::<(), Error>(())
//! ```

use bytes::Bytes;

pub mod capture;
pub mod checksum;
mod config;
mod decoder;
mod encoder;
mod error;
pub mod frame;
pub mod ledger;
mod patch;
pub mod path;
pub mod slot;

pub use capture::{CaptureCfg, Captures, Region};
pub use checksum::{ChecksumValue, Shape, Source};
pub use config::{Config, DEFAULT_FILL};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::Error;
pub use ledger::Ledger;
pub use path::Path;
pub use slot::{Record, Slot};

/// Encodes one value with `f` using a fresh [Encoder].
pub fn encode(f: impl FnOnce(&mut Encoder) -> Result<(), Error>) -> Result<Bytes, Error> {
    let mut encoder = Encoder::new();
    f(&mut encoder)?;
    encoder.finish()
}

/// Decodes one value from `input` with `f` using a fresh [Decoder].
///
/// Fails if `f` leaves part of `input` unread or any checksum unverified.
pub fn decode<T>(
    input: Bytes,
    f: impl FnOnce(&mut Decoder) -> Result<T, Error>,
) -> Result<T, Error> {
    let mut decoder = Decoder::new(input);
    let value = f(&mut decoder)?;
    decoder.finish()?;
    Ok(value)
}
