//! Record the exact bytes occupied by a sub-structure.
//!
//! Captured regions are kept in a side-table ([Captures]) keyed by the structural path of the
//! value they describe and a configurable key, rather than being stored on the values
//! themselves. Because the key lives in the same namespace as the fields of that value, a key
//! equal to an existing field is rejected.

use crate::{path::join, Error};
use bytes::Bytes;
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};
use tracing::debug;

/// Default key of a capture.
pub const RAW_KEY: &str = "__raw__";

/// Key under which checksum source data is captured.
pub const CHECKSUM_KEY: &str = "__checksum__";

/// A byte range `[start, end)` of the final stream and the bytes it held.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    start: usize,
    end: usize,
    data: Bytes,
}

impl Region {
    pub(crate) fn new(start: usize, data: Bytes) -> Self {
        Self {
            start,
            end: start + data.len(),
            data,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw bytes of the region.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns true if the region shares at least one byte with `[offset, offset + len)`.
    pub fn overlaps(&self, offset: usize, len: usize) -> bool {
        len > 0 && offset < self.end && self.start < offset + len
    }
}

/// Scope a capture is attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Target {
    /// The value being captured.
    ///
    /// A flattened sub-structure shares the scope of the structure it was merged into, so
    /// this also makes the capture reachable from that outer structure.
    #[default]
    Current,
    /// The structure enclosing the value being captured.
    Parent,
}

/// Configuration of a capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureCfg {
    /// Key the region is stored under.
    pub key: Cow<'static, str>,

    /// Scope the region is attached to.
    pub target: Target,
}

impl Default for CaptureCfg {
    fn default() -> Self {
        Self::new(RAW_KEY)
    }
}

impl CaptureCfg {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            target: Target::Current,
        }
    }

    /// Capture suitable as the source of a checksum.
    pub fn checksum() -> Self {
        Self::new(CHECKSUM_KEY)
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }
}

/// Captured regions of one invocation, keyed by scope and capture key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Captures {
    regions: BTreeMap<String, BTreeMap<String, Region>>,
}

impl Captures {
    /// Returns the region captured under `key` at `path`.
    pub fn get(&self, path: &str, key: &str) -> Option<&Region> {
        self.regions.get(path)?.get(key)
    }

    /// Returns the region captured with the default key at `path`.
    pub fn raw(&self, path: &str) -> Option<&Region> {
        self.get(path, RAW_KEY)
    }

    /// Iterates over `(path, key, region)`, ordered by path then key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Region)> {
        self.regions.iter().flat_map(|(path, regions)| {
            regions
                .iter()
                .map(move |(key, region)| (path.as_str(), key.as_str(), region))
        })
    }

    pub fn len(&self) -> usize {
        self.regions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Replaces the data of every region with the bytes `read` returns for its range.
    ///
    /// Regions `read` cannot resolve keep their data.
    pub(crate) fn refresh<'a>(&mut self, read: impl Fn(usize, usize) -> Option<&'a [u8]>) {
        for region in self.regions.values_mut().flat_map(BTreeMap::values_mut) {
            match read(region.start, region.len()) {
                Some(data) if data != &region.data[..] => {
                    region.data = Bytes::copy_from_slice(data);
                }
                _ => {}
            }
        }
    }

    /// Attaches `region` to `scope` under `key`.
    ///
    /// Fails if `scope` already has a field or a capture named `key`.
    pub(crate) fn attach(
        &mut self,
        scope: &str,
        key: &str,
        region: Region,
        fields: &BTreeSet<String>,
    ) -> Result<(), Error> {
        let duplicate = || Error::DuplicateCaptureKey {
            path: scope.to_string(),
            key: key.to_string(),
        };
        if fields.contains(&join(scope, key)) {
            return Err(duplicate());
        }
        let regions = self.regions.entry(scope.to_string()).or_default();
        if regions.contains_key(key) {
            return Err(duplicate());
        }
        debug!(
            path = scope,
            key,
            start = region.start,
            end = region.end,
            "captured region"
        );
        regions.insert(key.to_string(), region);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|path| path.to_string()).collect()
    }

    #[test]
    fn test_cfg() {
        let cfg = CaptureCfg::default();
        assert_eq!(cfg.key, RAW_KEY);
        assert_eq!(cfg.target, Target::Current);

        let cfg = CaptureCfg::checksum().with_target(Target::Parent);
        assert_eq!(cfg.key, CHECKSUM_KEY);
        assert_eq!(cfg.target, Target::Parent);
    }

    #[test]
    fn test_attach() {
        let mut captures = Captures::default();
        let fields = fields(&["num", "array", "array[0]"]);
        let region = Region::new(1, Bytes::from_static(&[1, 2, 3]));
        assert_eq!(region.end(), 4);

        captures
            .attach("array", RAW_KEY, region.clone(), &fields)
            .unwrap();
        captures
            .attach("array", "other", region.clone(), &fields)
            .unwrap();
        assert_eq!(captures.raw("array"), Some(&region));
        assert_eq!(captures.get("array", "other"), Some(&region));
        assert_eq!(captures.get("num", RAW_KEY), None);
        assert_eq!(captures.len(), 2);

        let keys: Vec<_> = captures.iter().map(|(_, key, _)| key).collect();
        assert_eq!(keys, vec![RAW_KEY, "other"]);
    }

    #[test]
    fn test_duplicate_key() {
        let mut captures = Captures::default();
        let fields = fields(&["value", "value.value"]);
        let region = Region::new(0, Bytes::from_static(&[0x30]));

        // Collides with a field of the captured value
        assert!(matches!(
            captures.attach("value", "value", region.clone(), &fields),
            Err(Error::DuplicateCaptureKey { path, key }) if path == "value" && key == "value"
        ));

        // Collides with an earlier capture
        captures
            .attach("value", RAW_KEY, region.clone(), &fields)
            .unwrap();
        assert!(matches!(
            captures.attach("value", RAW_KEY, region, &fields),
            Err(Error::DuplicateCaptureKey { .. })
        ));
    }

    #[test]
    fn test_refresh() {
        let mut captures = Captures::default();
        let region = Region::new(2, Bytes::from_static(&[0, 0xaa]));
        assert!(region.overlaps(3, 1));
        assert!(region.overlaps(0, 3));
        assert!(!region.overlaps(4, 1));
        assert!(!region.overlaps(0, 2));
        assert!(!region.overlaps(2, 0));
        captures
            .attach("a", RAW_KEY, region, &BTreeSet::new())
            .unwrap();

        // Bytes patched after the capture closed are picked up
        let output = [0xff, 0xff, 0x07, 0xaa];
        captures.refresh(|offset, len| output.get(offset..offset + len));
        let region = captures.raw("a").unwrap();
        assert_eq!(region.data().as_ref(), &[0x07, 0xaa]);
        assert_eq!((region.start(), region.end()), (2, 4));

        // Unreadable ranges are left alone
        captures.refresh(|_, _| None);
        assert_eq!(captures.raw("a").unwrap().data().as_ref(), &[0x07, 0xaa]);
    }
}
