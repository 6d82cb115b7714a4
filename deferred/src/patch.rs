//! Resolve deferred slots with their final values.
//!
//! A [Patch] overwrites the placeholder of one slot in place. It never moves the write
//! cursor of the stream being encoded: the target is addressed through the frame stack, so
//! encoding resumes exactly where it left off.

use crate::{frame::Stack, ledger::Ledger, Error};
use backpatch_codec::Error as CodecError;
use bytes::Bytes;
use tracing::debug;

/// Slot addressed by a [Patch].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Target<'a> {
    /// A slot handle issued by the invocation that owns the ledger.
    Slot { id: usize, path: &'a str },
    /// The slot registered at a (rendered) structural path.
    Path(&'a str),
}

impl Target<'_> {
    fn path(&self) -> &str {
        match self {
            Target::Slot { path, .. } | Target::Path(path) => *path,
        }
    }
}

/// Request to resolve one slot with an already encoded value.
#[derive(Debug)]
pub(crate) struct Patch<'a> {
    pub(crate) target: Target<'a>,
    pub(crate) codec: &'static str,
    pub(crate) value: Bytes,
}

impl Patch<'_> {
    /// Verifies the placeholder of the target slot and overwrites it with the value.
    ///
    /// Nothing is written unless every check passes.
    pub(crate) fn apply(
        self,
        ledger: Option<&mut Ledger>,
        stack: &mut Stack,
    ) -> Result<(), Error> {
        let invalid = |reason| Error::InvalidPatchTarget {
            path: self.target.path().to_string(),
            reason,
        };
        let ledger = ledger.ok_or_else(|| invalid("no deferred fields were allocated"))?;

        // Locate the slot
        let id = match self.target {
            Target::Slot { id, path } => match ledger.get(id) {
                Some(record) if record.path() == path => id,
                _ => return Err(invalid("slot was not allocated by this invocation")),
            },
            Target::Path(path) => ledger
                .find(path)
                .ok_or_else(|| invalid("no deferred field at path"))?,
        };
        let record = ledger
            .get_mut(id)
            .ok_or_else(|| invalid("slot was not allocated by this invocation"))?;
        if record.codec() != self.codec {
            return Err(invalid("value codec differs from slot codec"));
        }
        if record.is_resolved() {
            return Err(Error::AlreadyResolved(record.path().to_string()));
        }
        if self.value.len() != record.len() {
            return Err(CodecError::InvalidLength(self.value.len()).into());
        }

        // Verify and overwrite
        let (offset, len) = (record.offset(), record.len());
        record.verify(stack.get(offset, len))?;
        let Some(target) = stack.get_mut(offset, len) else {
            return Err(invalid("target is not writable"));
        };
        target.copy_from_slice(&self.value);
        record.resolve(self.value)?;
        debug!(path = record.path(), offset, len, "patched deferred slot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Record;
    use bytes::BufMut;

    fn setup() -> (Ledger, Stack) {
        let mut ledger = Ledger::default();
        let mut stack = Stack::default();
        stack.current_mut().put_slice(&[0xff, 0x00, 0x00, 0xee]);
        ledger.register(Record::new("a".into(), 1, Bytes::from_static(&[0, 0]), "u16"));
        (ledger, stack)
    }

    fn patch<'a>(target: Target<'a>, value: &'static [u8]) -> Patch<'a> {
        Patch {
            target,
            codec: "u16",
            value: Bytes::from_static(value),
        }
    }

    #[test]
    fn test_apply() {
        let (mut ledger, mut stack) = setup();
        patch(Target::Slot { id: 0, path: "a" }, &[1, 2])
            .apply(Some(&mut ledger), &mut stack)
            .unwrap();
        assert_eq!(stack.current().as_ref(), &[0xff, 1, 2, 0xee]);
        assert_eq!(ledger.get(0).unwrap().value().unwrap().as_ref(), &[1, 2]);

        // Cursor is untouched
        assert_eq!(stack.position(), 4);

        // Second patch is rejected before touching the stream
        assert!(matches!(
            patch(Target::Path("a"), &[3, 4]).apply(Some(&mut ledger), &mut stack),
            Err(Error::AlreadyResolved(path)) if path == "a"
        ));
        assert_eq!(stack.current().as_ref(), &[0xff, 1, 2, 0xee]);
    }

    #[test]
    fn test_invalid_target() {
        let (mut ledger, mut stack) = setup();
        assert!(matches!(
            patch(Target::Path("a"), &[1, 2]).apply(None, &mut stack),
            Err(Error::InvalidPatchTarget { .. })
        ));
        assert!(matches!(
            patch(Target::Path("b"), &[1, 2]).apply(Some(&mut ledger), &mut stack),
            Err(Error::InvalidPatchTarget { path, .. }) if path == "b"
        ));
        assert!(matches!(
            patch(Target::Slot { id: 0, path: "b" }, &[1, 2])
                .apply(Some(&mut ledger), &mut stack),
            Err(Error::InvalidPatchTarget { .. })
        ));
        assert!(matches!(
            patch(Target::Slot { id: 7, path: "a" }, &[1, 2])
                .apply(Some(&mut ledger), &mut stack),
            Err(Error::InvalidPatchTarget { .. })
        ));

        let wrong_codec = Patch {
            target: Target::Path("a"),
            codec: "u32",
            value: Bytes::from_static(&[1, 2]),
        };
        assert!(matches!(
            wrong_codec.apply(Some(&mut ledger), &mut stack),
            Err(Error::InvalidPatchTarget { .. })
        ));
        assert!(!ledger.get(0).unwrap().is_resolved());
    }

    #[test]
    fn test_wrong_length() {
        let (mut ledger, mut stack) = setup();
        assert!(matches!(
            patch(Target::Path("a"), &[1, 2, 3]).apply(Some(&mut ledger), &mut stack),
            Err(Error::Codec(CodecError::InvalidLength(3)))
        ));
    }

    #[test]
    fn test_placeholder_changed() {
        let (mut ledger, mut stack) = setup();
        stack.current_mut()[2] = 0x55;
        assert!(matches!(
            patch(Target::Path("a"), &[1, 2]).apply(Some(&mut ledger), &mut stack),
            Err(Error::PlaceholderConsistency { found, .. }) if found.as_ref() == &[0x00, 0x55]
        ));
        assert!(!ledger.get(0).unwrap().is_resolved());
        assert_eq!(stack.current().as_ref(), &[0xff, 0x00, 0x55, 0xee]);
    }
}
