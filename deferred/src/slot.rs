//! Deferred slots: placeholders whose final value is written later.
//!
//! A slot is allocated while encoding by writing a fixed-size placeholder and recording
//! where it will sit in the final output. It is resolved exactly once, by a patch, after
//! checking that the placeholder is still in place.

use crate::Error;
use backpatch_codec::Sizeof;
use bytes::Bytes;
use std::{
    fmt,
    marker::PhantomData,
    sync::{Arc, Weak},
};

/// State of one placeholder.
#[derive(Clone, Debug)]
pub struct Record {
    path: String,
    offset: usize,
    placeholder: Bytes,
    codec: &'static str,
    value: Option<Bytes>,
}

impl Record {
    pub(crate) fn new(
        path: String,
        offset: usize,
        placeholder: Bytes,
        codec: &'static str,
    ) -> Self {
        Self {
            path,
            offset,
            placeholder,
            codec,
            value: None,
        }
    }

    /// Structural path of the deferred field.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Offset of the placeholder in the final output.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes written in place of the final value (or, when decoding, the bytes read).
    pub fn placeholder(&self) -> &Bytes {
        &self.placeholder
    }

    /// Number of bytes reserved for the value.
    pub fn len(&self) -> usize {
        self.placeholder.len()
    }

    /// Returns true if the slot reserves no bytes.
    pub fn is_empty(&self) -> bool {
        self.placeholder.is_empty()
    }

    /// Name of the codec used to encode the final value.
    pub fn codec(&self) -> &'static str {
        self.codec
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Encoded final value, if the slot has been resolved.
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// Checks that `found` (the bytes currently at [Record::offset]) still equal the
    /// placeholder.
    pub(crate) fn verify(&self, found: Option<&[u8]>) -> Result<(), Error> {
        match found {
            Some(found) if found == &self.placeholder[..] => Ok(()),
            found => Err(Error::PlaceholderConsistency {
                path: self.path.clone(),
                expected: self.placeholder.clone(),
                found: Bytes::copy_from_slice(found.unwrap_or_default()),
            }),
        }
    }

    /// Marks the slot as resolved with `value`.
    pub(crate) fn resolve(&mut self, value: Bytes) -> Result<(), Error> {
        if self.value.is_some() {
            return Err(Error::AlreadyResolved(self.path.clone()));
        }
        self.value = Some(value);
        Ok(())
    }
}

/// Returns the number of bytes a slot encoded with `T` occupies.
pub(crate) fn width<T: Sizeof>(path: &str) -> Result<usize, Error> {
    T::sizeof().map_err(|source| Error::NonConstantSize {
        path: path.to_string(),
        source,
    })
}

/// Handle to a deferred slot, used as the target of a patch.
///
/// The handle is only meaningful to the [crate::Encoder] that issued it.
pub struct Slot<T> {
    id: usize,
    path: String,
    owner: Weak<()>,
    _codec: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    pub(crate) fn new(id: usize, path: String, owner: &Arc<()>) -> Self {
        Self {
            id,
            path,
            owner: Arc::downgrade(owner),
            _codec: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Structural path of the deferred field.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns true if the handle was issued by the invocation holding `owner`.
    pub(crate) fn issued_by(&self, owner: &Arc<()>) -> bool {
        Weak::ptr_eq(&self.owner, &Arc::downgrade(owner))
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            path: self.path.clone(),
            owner: self.owner.clone(),
            _codec: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("codec", &std::any::type_name::<T>())
            .finish()
    }
}
