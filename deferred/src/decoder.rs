//! Decode a value in a single pass, validating deferred fields.
//!
//! Decoding never patches: the final value of a deferred field is already present in the
//! input. Deferred fields are recorded in a [Ledger] (resolved with the bytes read) so later
//! logic can validate them, and checksums are recomputed from captured regions and compared
//! against the stored digests.

use crate::{
    capture::{CaptureCfg, Captures, Region, Target as CaptureTarget},
    checksum::{self, ChecksumValue, Shape, Source, Spec},
    ledger::Ledger,
    path::{display, Path, Segment},
    slot::{width, Record},
    Error,
};
use backpatch_codec::{DecodeExt, Error as CodecError, Read, Sizeof};
use backpatch_cryptography::Hasher;
use bytes::Bytes;
use std::{any::type_name, borrow::Cow, collections::BTreeSet};
use tracing::debug;

/// Decodes one top-level value.
pub struct Decoder {
    input: Bytes,
    position: usize,
    limit: usize,
    path: Path,
    fields: BTreeSet<String>,
    ledger: Option<Ledger>,
    captures: Captures,
    checksums: Vec<(Spec, ChecksumValue)>,
}

impl Decoder {
    pub fn new(input: Bytes) -> Self {
        Self {
            limit: input.len(),
            input,
            position: 0,
            path: Path::root(),
            fields: BTreeSet::new(),
            ledger: None,
            captures: Captures::default(),
            checksums: Vec::new(),
        }
    }

    /// Path of the value currently being decoded.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Offset of the next byte in the input.
    ///
    /// The input is never buffered, so this is always equal to [Decoder::position].
    pub fn offset(&self) -> usize {
        self.position
    }

    /// Number of bytes left in the current region.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn read<T: Read<Cfg = ()>>(&mut self) -> Result<T, Error> {
        self.read_cfg(&())
    }

    pub fn read_cfg<T: Read>(&mut self, cfg: &T::Cfg) -> Result<T, Error> {
        let mut buf = &self.input[self.position..self.limit];
        let value = T::read_cfg(&mut buf, cfg)?;
        self.position = self.limit - buf.len();
        Ok(value)
    }

    /// Consumes exactly `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<Bytes, Error> {
        if self.remaining() < len {
            return Err(CodecError::EndOfBuffer.into());
        }
        let data = self.input.slice(self.position..self.position + len);
        self.position += len;
        Ok(data)
    }

    fn enter(&mut self, segment: Segment) {
        self.path.push(segment);
        self.fields.insert(self.path.to_string());
    }

    /// Decodes the field `name` of the current value with `f`.
    pub fn field<R>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.enter(Segment::Field(name.into()));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Decodes element `index` of the current sequence with `f`.
    pub fn index<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.enter(Segment::Index(index));
        let result = f(self);
        self.path.pop();
        result
    }

    /// Reads the field `name` of the current value.
    pub fn read_field<T: Read<Cfg = ()>>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<T, Error> {
        self.field(name, |d| d.read())
    }

    /// Decodes a region preceded by its length, read as an `L`.
    ///
    /// `body` must consume exactly the announced number of bytes.
    pub fn prefixed<L, R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error>
    where
        L: Read<Cfg = ()>,
        usize: TryFrom<L>,
    {
        let len = self.read::<L>()?;
        let len = usize::try_from(len).map_err(|_| CodecError::InvalidUsize)?;
        if self.remaining() < len {
            return Err(CodecError::EndOfBuffer.into());
        }

        let limit = self.limit;
        self.limit = self.position + len;
        let result = body(self);
        let unread = self.limit - self.position;
        self.limit = limit;
        let value = result?;
        if unread > 0 {
            return Err(CodecError::ExtraData(unread).into());
        }
        Ok(value)
    }

    /// Records a deferred field (already resolved with `data`) at the current path.
    fn record(
        &mut self,
        offset: usize,
        data: Bytes,
        codec: &'static str,
    ) -> Result<usize, Error> {
        let path = self.path.to_string();
        let mut record = Record::new(path.clone(), offset, data.clone(), codec);
        record.resolve(data)?;
        let id = self
            .ledger
            .get_or_insert_with(Ledger::default)
            .register(record);
        debug!(path, offset, "read deferred field");
        Ok(id)
    }

    /// Reads a deferred field of type `T` at the current path.
    ///
    /// Fails with [Error::NonConstantSize] if `T` does not have a constant encoded size.
    pub fn defer<T: Read<Cfg = ()> + Sizeof>(&mut self) -> Result<T, Error> {
        let len = width::<T>(&self.path.to_string())?;
        let offset = self.position;
        let data = self.take(len)?;
        let value = T::decode(data.clone())?;
        self.record(offset, data, type_name::<T>())?;
        Ok(value)
    }

    /// Deferred fields read so far (none if no deferred field was decoded).
    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    /// Decodes `body` and captures the bytes it consumed.
    pub fn capture<R>(
        &mut self,
        cfg: &CaptureCfg,
        body: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let start = self.position;
        let value = body(self)?;

        let data = self.input.slice(start..self.position);
        let scope = match cfg.target {
            CaptureTarget::Current => self.path.to_string(),
            CaptureTarget::Parent => self.path.parent().to_string(),
        };
        self.captures
            .attach(&scope, &cfg.key, Region::new(start, data), &self.fields)?;
        Ok(value)
    }

    /// Regions captured so far.
    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    /// Reads a checksum field at the current path, returning the stored digest.
    ///
    /// The digest is checked by [Decoder::verify_checksums] once `source` (resolved relative
    /// to the value enclosing the checksum field) has been decoded and captured.
    pub fn checksum<H: Hasher>(
        &mut self,
        source: Source,
        shape: Shape,
    ) -> Result<Bytes, Error> {
        let path = self.path.to_string();
        let offset = self.position;
        let digest = self.take(checksum::size::<H>())?;
        let id = self.record(offset, digest.clone(), type_name::<H::Digest>())?;
        let scope = self.path.parent().to_string();
        self.checksums.push((
            Spec::new::<H>(id, path.clone(), scope, source, shape),
            ChecksumValue::new(path, H::NAME, digest.clone()),
        ));
        Ok(digest)
    }

    /// Verifies every checksum whose source has been captured and that has not been
    /// verified yet.
    ///
    /// Checksums whose source is not captured yet are left for a later call. Fails with
    /// [Error::ChecksumMismatch] on the first stored digest that differs from the digest of
    /// its source.
    pub fn verify_checksums(&mut self) -> Result<(), Error> {
        for (spec, value) in &mut self.checksums {
            if value.verified() {
                continue;
            }
            let actual = match spec.compute(&self.captures, &self.fields) {
                Ok(actual) => actual,
                Err(Error::MissingCapture { .. }) => continue,
                Err(err) => return Err(err),
            };
            if actual != *value.digest() {
                return Err(Error::ChecksumMismatch {
                    path: spec.path().to_string(),
                    expected: value.digest().clone(),
                    actual,
                });
            }
            value.mark_verified();
            debug!(path = spec.path(), name = spec.name(), "verified checksum");
        }
        Ok(())
    }

    /// Checksums read so far.
    pub fn checksums(&self) -> impl Iterator<Item = &ChecksumValue> {
        self.checksums.iter().map(|(_, value)| value)
    }

    /// Completes decoding, returning the captured regions.
    ///
    /// Fails with [Error::MissingCapture] if the source of an unverified checksum was never
    /// captured, with [Error::IncompleteLedger] if a checksum was otherwise never verified,
    /// and with [CodecError::ExtraData] if the input was not fully consumed.
    pub fn finish(self) -> Result<Captures, Error> {
        let mut unverified = Vec::new();
        for (spec, value) in &self.checksums {
            if value.verified() {
                continue;
            }
            spec.regions(&self.captures, &self.fields)?;
            unverified.push(display(value.path()).to_string());
        }
        if !unverified.is_empty() {
            return Err(Error::IncompleteLedger(unverified));
        }
        let remaining = self.remaining();
        if remaining > 0 {
            return Err(CodecError::ExtraData(remaining).into());
        }
        debug!(len = self.position, "finished decoding");
        Ok(self.captures)
    }
}
