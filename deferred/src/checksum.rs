//! Digests computed over captured regions.
//!
//! A checksum field is a deferred slot sized for the digest of its hasher (the size of the
//! digest of nothing). When encoding, the slot is patched with the digest of its source once
//! the source has been written and captured. When decoding, the stored digest is compared
//! against the digest recomputed from the captured source.
//!
//! Sources are resolved relative to the scope that declared the checksum field and must be
//! captured with [crate::CaptureCfg::checksum].

use crate::{
    capture::{Captures, Region, CHECKSUM_KEY},
    path::{element, join},
    Error,
};
use backpatch_cryptography::Hasher;
use bytes::{Bytes, BytesMut};
use std::{collections::BTreeSet, fmt, ops::Range};
use tracing::trace;

/// Expected result of evaluating a [Source].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Exactly one region, hashed as is.
    Single,
    /// A list of regions, concatenated before hashing.
    Concat,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Single => write!(f, "a single region"),
            Shape::Concat => write!(f, "a list of regions"),
        }
    }
}

/// Data a checksum is computed over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// The value at a path: one region if the value itself was captured, otherwise the
    /// regions of all of its elements.
    Value(String),
    /// The elements in `range` of the sequence at a path.
    Elements(String, Range<usize>),
    /// The values at each of the paths.
    Values(Vec<String>),
    /// Literal bytes.
    Literal(Bytes),
}

impl Source {
    pub fn value(path: impl Into<String>) -> Self {
        Self::Value(path.into())
    }

    pub fn elements(path: impl Into<String>, range: Range<usize>) -> Self {
        Self::Elements(path.into(), range)
    }

    pub fn values<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self::Values(paths.into_iter().map(Into::into).collect())
    }

    pub fn literal(data: impl Into<Bytes>) -> Self {
        Self::Literal(data.into())
    }
}

/// Returns the size of the digests produced by `H`.
pub fn size<H: Hasher>() -> usize {
    H::empty().as_ref().len()
}

fn digest<H: Hasher>(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(H::hash(data).as_ref())
}

/// Source data before it is checked against the expected [Shape].
enum Evaluated<'a> {
    Literal(&'a Bytes),
    One(&'a Region),
    Many(Vec<&'a Region>),
}

/// A declared checksum field.
#[derive(Clone)]
pub(crate) struct Spec {
    id: usize,
    path: String,
    scope: String,
    name: &'static str,
    codec: &'static str,
    hash: fn(&[u8]) -> Bytes,
    source: Source,
    shape: Shape,
}

impl Spec {
    pub(crate) fn new<H: Hasher>(
        id: usize,
        path: String,
        scope: String,
        source: Source,
        shape: Shape,
    ) -> Self {
        Self {
            id,
            path,
            scope,
            name: H::NAME,
            codec: std::any::type_name::<H::Digest>(),
            hash: digest::<H>,
            source,
            shape,
        }
    }

    /// Identifier of the slot holding the digest.
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the type the digest slot was registered with.
    pub(crate) fn codec(&self) -> &'static str {
        self.codec
    }

    /// Computes the digest of the source.
    pub(crate) fn compute(
        &self,
        captures: &Captures,
        fields: &BTreeSet<String>,
    ) -> Result<Bytes, Error> {
        let data = match (self.evaluate(captures, fields)?, self.shape) {
            (Evaluated::Literal(data), Shape::Single) => data.clone(),
            (Evaluated::One(region), Shape::Single) => region.data().clone(),
            (Evaluated::Many(regions), Shape::Concat) => {
                let mut data = BytesMut::with_capacity(regions.iter().map(|r| r.len()).sum());
                for region in regions {
                    data.extend_from_slice(region.data());
                }
                data.freeze()
            }
            (Evaluated::Literal(_) | Evaluated::One(_), expected) => {
                return Err(self.shape_error(expected, "one region"));
            }
            (Evaluated::Many(regions), expected) => {
                let found = format!("a list of {} regions", regions.len());
                return Err(self.shape_error(expected, found));
            }
        };
        let digest = (self.hash)(&data);
        trace!(
            path = self.path.as_str(),
            name = self.name,
            len = data.len(),
            "computed checksum"
        );
        Ok(digest)
    }

    /// Captured regions the source refers to (none for a literal source).
    pub(crate) fn regions<'a>(
        &'a self,
        captures: &'a Captures,
        fields: &BTreeSet<String>,
    ) -> Result<Vec<&'a Region>, Error> {
        Ok(match self.evaluate(captures, fields)? {
            Evaluated::Literal(_) => Vec::new(),
            Evaluated::One(region) => vec![region],
            Evaluated::Many(regions) => regions,
        })
    }

    fn evaluate<'a>(
        &'a self,
        captures: &'a Captures,
        fields: &BTreeSet<String>,
    ) -> Result<Evaluated<'a>, Error> {
        match &self.source {
            Source::Literal(data) => Ok(Evaluated::Literal(data)),
            Source::Value(path) => {
                let path = join(&self.scope, path);
                if let Some(region) = captures.get(&path, CHECKSUM_KEY) {
                    return Ok(Evaluated::One(region));
                }
                if !fields.contains(&element(&path, 0)) {
                    return Err(self.missing(path));
                }
                let mut regions = Vec::new();
                for index in 0.. {
                    let element = element(&path, index);
                    if !fields.contains(&element) {
                        break;
                    }
                    regions.push(self.captured(captures, element)?);
                }
                Ok(Evaluated::Many(regions))
            }
            Source::Elements(path, range) => {
                let path = join(&self.scope, path);
                range
                    .clone()
                    .map(|index| {
                        let element = element(&path, index);
                        if !fields.contains(&element) {
                            return Err(
                                self.shape_error(self.shape, format!("no element '{element}'"))
                            );
                        }
                        self.captured(captures, element)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Evaluated::Many)
            }
            Source::Values(paths) => paths
                .iter()
                .map(|path| self.captured(captures, join(&self.scope, path)))
                .collect::<Result<Vec<_>, _>>()
                .map(Evaluated::Many),
        }
    }

    fn captured<'a>(&self, captures: &'a Captures, path: String) -> Result<&'a Region, Error> {
        captures
            .get(&path, CHECKSUM_KEY)
            .ok_or_else(|| self.missing(path))
    }

    fn missing(&self, data: String) -> Error {
        Error::MissingCapture {
            path: self.path.clone(),
            data,
        }
    }

    fn shape_error(&self, expected: Shape, found: impl Into<String>) -> Error {
        Error::SourceShape {
            path: self.path.clone(),
            expected,
            found: found.into(),
        }
    }
}

/// A checksum read while decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumValue {
    path: String,
    name: &'static str,
    digest: Bytes,
    verified: bool,
}

impl ChecksumValue {
    pub(crate) fn new(path: String, name: &'static str, digest: Bytes) -> Self {
        Self {
            path,
            name,
            digest,
            verified: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the hash function.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Digest stored in the input.
    pub fn digest(&self) -> &Bytes {
        &self.digest
    }

    /// Returns true once the digest has been checked against its source.
    pub fn verified(&self) -> bool {
        self.verified
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verified = true;
    }
}
