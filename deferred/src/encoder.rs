//! Encode a value in a single pass, patching deferred fields in place.

use crate::{
    capture::{CaptureCfg, Captures, Region, Target as CaptureTarget},
    checksum::{self, Shape, Source, Spec},
    frame::{Frame, Stack},
    ledger::Ledger,
    patch::{Patch, Target},
    path::{join, Path, Segment},
    slot::{width, Record, Slot},
    Config, Error,
};
use backpatch_codec::{DecodeExt, Encode, Error as CodecError, FixedSize, Read, Sizeof, Write};
use backpatch_cryptography::Hasher;
use bytes::{BufMut, Bytes, BytesMut};
use std::{any::type_name, borrow::Cow, collections::BTreeSet, sync::Arc};
use tracing::{debug, trace};

/// Encodes one top-level value.
///
/// An encoder is one invocation: it exclusively owns the output, the stack of open frames,
/// the ledger of deferred slots, and the captured regions. Each value must be encoded with a
/// fresh encoder. If any method fails, the output must be discarded.
pub struct Encoder {
    cfg: Config,
    owner: Arc<()>,
    stack: Stack,
    path: Path,
    fields: BTreeSet<String>,
    ledger: Option<Ledger>,
    captures: Captures,
    checksums: Vec<Spec>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(cfg: Config) -> Self {
        Self {
            stack: Stack::with_capacity(cfg.capacity),
            cfg,
            owner: Arc::new(()),
            path: Path::root(),
            fields: BTreeSet::new(),
            ledger: None,
            captures: Captures::default(),
            checksums: Vec::new(),
        }
    }

    /// Path of the value currently being encoded.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write position within the innermost open frame (or the output, if none is open).
    pub fn position(&self) -> usize {
        self.stack.position()
    }

    /// Position the next written byte will occupy in the final output.
    pub fn offset(&self) -> usize {
        self.stack.offset()
    }

    /// Open frames, outermost first.
    pub fn frames(&self) -> &[Frame] {
        self.stack.frames()
    }

    pub fn write<T: Write>(&mut self, value: &T) {
        value.write(self.stack.current_mut());
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.stack.current_mut().put_slice(data);
    }

    /// Bytes written so far to the innermost open frame (or the output, if none is open).
    ///
    /// Nothing prevents modifying bytes that belong to a deferred slot, but doing so makes
    /// the patch of that slot fail.
    pub fn written_mut(&mut self) -> &mut [u8] {
        &mut self.stack.current_mut()[..]
    }

    fn enter(&mut self, segment: Segment) {
        self.path.push(segment);
        self.fields.insert(self.path.to_string());
    }

    /// Encodes the field `name` of the current value with `f`.
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

    /// Encodes element `index` of the current sequence with `f`.
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

    /// Writes `value` as the field `name` of the current value.
    pub fn write_field<T: Write>(&mut self, name: impl Into<Cow<'static, str>>, value: &T) {
        self.enter(Segment::Field(name.into()));
        self.write(value);
        self.path.pop();
    }

    /// Encodes a region whose content must be preceded by a `header`-byte header.
    ///
    /// `body` is encoded into a private buffer. Once it completes, `write_header` is given
    /// the buffered content and must write exactly `header` bytes, which are then written to
    /// the enclosing stream followed by the content. Slots allocated by `body` already
    /// account for the header.
    pub fn framed<R>(
        &mut self,
        header: usize,
        body: impl FnOnce(&mut Self) -> Result<R, Error>,
        write_header: impl FnOnce(&[u8], &mut BytesMut) -> Result<(), Error>,
    ) -> Result<R, Error> {
        self.stack.push(header);
        let result = body(self);
        let frame = self.stack.pop();
        let value = result?;

        let mut encoded = BytesMut::with_capacity(header);
        write_header(frame.buffered(), &mut encoded)?;
        if encoded.len() != header {
            return Err(Error::FrameHeader {
                expected: header,
                actual: encoded.len(),
            });
        }
        let offset = self.offset();
        let current = self.stack.current_mut();
        current.put_slice(&encoded);
        current.put_slice(frame.buffered());
        trace!(
            offset,
            header,
            len = frame.buffered().len(),
            "flushed frame"
        );
        Ok(value)
    }

    /// Encodes a region preceded by its length, written as an `L`.
    pub fn prefixed<L, R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error>
    where
        L: Write + FixedSize + TryFrom<usize>,
    {
        self.framed(L::SIZE, body, |content, buf| {
            let len = L::try_from(content.len())
                .map_err(|_| CodecError::InvalidLength(content.len()))?;
            len.write(buf);
            Ok(())
        })
    }

    /// Writes `placeholder` and registers a slot for it at the current path.
    fn reserve(&mut self, codec: &'static str, placeholder: &[u8]) -> usize {
        let path = self.path.to_string();
        let offset = self.stack.offset();
        let position = self.stack.position();
        self.put_slice(placeholder);

        // Record the bytes as they are in the buffer
        let written = Bytes::copy_from_slice(&self.stack.current()[position..]);
        let len = written.len();
        let id = self
            .ledger
            .get_or_insert_with(Ledger::default)
            .register(Record::new(path.clone(), offset, written, codec));
        debug!(path, offset, len, "allocated deferred slot");
        id
    }

    /// Allocates a deferred field of type `T` at the current path, filled with
    /// [Config::fill] until patched.
    ///
    /// Fails with [Error::NonConstantSize] if `T` does not have a constant encoded size.
    pub fn defer<T: Write + Sizeof>(&mut self) -> Result<Slot<T>, Error> {
        let path = self.path.to_string();
        let len = width::<T>(&path)?;
        let placeholder = vec![self.cfg.fill; len];
        let id = self.reserve(type_name::<T>(), &placeholder);
        Ok(Slot::new(id, path, &self.owner))
    }

    /// Allocates a deferred field of type `T` at the current path, holding `placeholder`
    /// until patched.
    pub fn defer_with<T: Encode + Sizeof>(&mut self, placeholder: &T) -> Result<Slot<T>, Error> {
        let path = self.path.to_string();
        let len = width::<T>(&path)?;
        let encoded = placeholder.encode();
        if encoded.len() != len {
            return Err(Error::NonConstantSize {
                path,
                source: CodecError::InvalidLength(encoded.len()),
            });
        }
        let id = self.reserve(type_name::<T>(), &encoded);
        Ok(Slot::new(id, path, &self.owner))
    }

    /// Resolves `slot` with `value`.
    ///
    /// The bytes at the slot must still be the placeholder written by [Encoder::defer]. The
    /// write position is unaffected.
    pub fn patch<T: Write>(&mut self, slot: &Slot<T>, value: &T) -> Result<(), Error> {
        self.issued(slot)?;
        let patch = Patch {
            target: Target::Slot {
                id: slot.id(),
                path: slot.path(),
            },
            codec: type_name::<T>(),
            value: encoded(value),
        };
        patch.apply(self.ledger.as_mut(), &mut self.stack)
    }

    /// Resolves the slot at `path` (relative to the current value) with `value`.
    ///
    /// Fails with [Error::InvalidPatchTarget] if there is no slot at `path` or if it was
    /// not allocated for a `T`.
    pub fn patch_path<T: Write>(&mut self, path: &str, value: &T) -> Result<(), Error> {
        let path = join(&self.path.to_string(), path);
        let patch = Patch {
            target: Target::Path(&path),
            codec: type_name::<T>(),
            value: encoded(value),
        };
        patch.apply(self.ledger.as_mut(), &mut self.stack)
    }

    /// Returns the value `slot` was resolved with, if any.
    pub fn resolved<T: Read<Cfg = ()>>(&self, slot: &Slot<T>) -> Result<Option<T>, Error> {
        self.issued(slot)?;
        let record = self
            .ledger
            .as_ref()
            .and_then(|ledger| ledger.get(slot.id()))
            .filter(|record| record.path() == slot.path())
            .ok_or_else(|| Error::InvalidPatchTarget {
                path: slot.path().to_string(),
                reason: "slot was not allocated by this invocation",
            })?;
        match record.value() {
            Some(value) => Ok(Some(T::decode(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Fails with [Error::InvalidPatchTarget] if `slot` was issued by another encoder.
    fn issued<T>(&self, slot: &Slot<T>) -> Result<(), Error> {
        if !slot.issued_by(&self.owner) {
            return Err(Error::InvalidPatchTarget {
                path: slot.path().to_string(),
                reason: "slot was not allocated by this invocation",
            });
        }
        Ok(())
    }

    /// Fails with [Error::IncompleteLedger] if any slot allocated so far is unresolved.
    pub fn check_deferred(&self) -> Result<(), Error> {
        self.ledger.as_ref().map_or(Ok(()), Ledger::check_complete)
    }

    /// Slots allocated so far (none if no deferred field was encoded).
    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    /// Encodes `body` and captures the bytes it wrote.
    pub fn capture<R>(
        &mut self,
        cfg: &CaptureCfg,
        body: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let start = self.stack.offset();
        let position = self.stack.position();
        let value = body(self)?;

        let data = Bytes::copy_from_slice(&self.stack.current()[position..]);
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

    /// Allocates a checksum field at the current path.
    ///
    /// The digest is written by [Encoder::write_checksums] once `source` (resolved relative
    /// to the value enclosing the checksum field) has been encoded and captured.
    pub fn checksum<H: Hasher>(&mut self, source: Source, shape: Shape) {
        let path = self.path.to_string();
        let placeholder = vec![self.cfg.fill; checksum::size::<H>()];
        let id = self.reserve(type_name::<H::Digest>(), &placeholder);
        let scope = self.path.parent().to_string();
        self.checksums
            .push(Spec::new::<H>(id, path, scope, source, shape));
    }

    /// Computes and writes every checksum whose source is ready.
    ///
    /// A source is ready once all of it has been captured and it no longer contains an
    /// unresolved slot (other than the checksum's own). Checksums whose source is not ready
    /// are left for a later call, so this may be called at the end of any region: a checksum
    /// covering another checksum is written after it. Digests are computed over the bytes
    /// currently in the output, including slots patched after their region was captured.
    pub fn write_checksums(&mut self) -> Result<(), Error> {
        let mut progress = true;
        while progress {
            progress = false;
            for spec in &self.checksums {
                if !self.ready(spec)? {
                    continue;
                }
                let stack = &self.stack;
                self.captures.refresh(|offset, len| stack.get(offset, len));
                let digest = spec.compute(&self.captures, &self.fields)?;
                let patch = Patch {
                    target: Target::Slot {
                        id: spec.id(),
                        path: spec.path(),
                    },
                    codec: spec.codec(),
                    value: digest,
                };
                patch.apply(self.ledger.as_mut(), &mut self.stack)?;
                debug!(path = spec.path(), name = spec.name(), "wrote checksum");
                progress = true;
            }
        }
        Ok(())
    }

    /// Returns true if `spec` is unwritten and its source is ready.
    fn ready(&self, spec: &Spec) -> Result<bool, Error> {
        let Some(ledger) = self.ledger.as_ref() else {
            return Ok(false);
        };
        if ledger.get(spec.id()).map_or(true, Record::is_resolved) {
            return Ok(false);
        }
        let regions = match spec.regions(&self.captures, &self.fields) {
            Ok(regions) => regions,
            Err(Error::MissingCapture { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        let blocked = ledger.records().iter().enumerate().any(|(id, record)| {
            id != spec.id()
                && !record.is_resolved()
                && regions
                    .iter()
                    .any(|region| region.overlaps(record.offset(), record.len()))
        });
        Ok(!blocked)
    }

    /// Returns the output, failing if any deferred field was never resolved.
    ///
    /// A checksum that was never written because its source was never captured fails with
    /// [Error::MissingCapture].
    pub fn finish(self) -> Result<Bytes, Error> {
        if let Some(ledger) = &self.ledger {
            for spec in &self.checksums {
                if ledger.get(spec.id()).is_some_and(Record::is_resolved) {
                    continue;
                }
                spec.regions(&self.captures, &self.fields)?;
            }
        }
        self.check_deferred()?;
        let slots = self.ledger.as_ref().map_or(0, |ledger| ledger.records().len());
        let output = self.stack.into_inner().freeze();
        debug!(len = output.len(), slots, "finished encoding");
        Ok(output)
    }
}

fn encoded<T: Write>(value: &T) -> Bytes {
    let mut buf = BytesMut::new();
    value.write(&mut buf);
    buf.freeze()
}
