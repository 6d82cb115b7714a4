//! Errors raised while allocating, patching, capturing, or checksumming.
//!
//! Every error is fatal to the invocation that produced it: on decode no partial value is
//! valid, and on encode the partially written output must be discarded.

use crate::checksum::Shape;
use backpatch_codec::Error as CodecError;
use backpatch_utils::hex;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while encoding or decoding with deferred fields.
#[derive(Error, Debug)]
pub enum Error {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("size of deferred field at '{path}' is not constant")]
    NonConstantSize {
        path: String,
        #[source]
        source: CodecError,
    },
    #[error(
        "data at target of '{path}' ({}) does not equal expected placeholder data ({})",
        hex(.found),
        hex(.expected)
    )]
    PlaceholderConsistency {
        path: String,
        expected: Bytes,
        found: Bytes,
    },
    #[error("deferred value at '{0}' was already written")]
    AlreadyResolved(String),
    #[error("invalid patch target '{path}': {reason}")]
    InvalidPatchTarget { path: String, reason: &'static str },
    #[error("deferred values were never written: {}", .0.join(", "))]
    IncompleteLedger(Vec<String>),
    #[error(
        "checksum mismatch at '{path}': expected {}, got {}",
        hex(.expected),
        hex(.actual)
    )]
    ChecksumMismatch {
        path: String,
        expected: Bytes,
        actual: Bytes,
    },
    #[error("source '{data}' of checksum at '{path}' has no captured data")]
    MissingCapture { path: String, data: String },
    #[error("source of checksum at '{path}' must be {expected}, got {found}")]
    SourceShape {
        path: String,
        expected: Shape,
        found: String,
    },
    #[error("capture key '{key}' already exists at '{path}'")]
    DuplicateCaptureKey { path: String, key: String },
    #[error("frame header must be {expected} bytes, got {actual}")]
    FrameHeader { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::ChecksumMismatch {
            path: "hash".into(),
            expected: Bytes::from_static(&[0xab, 0xcd]),
            actual: Bytes::from_static(&[0x01]),
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch at 'hash': expected abcd, got 01"
        );

        let err = Error::IncompleteLedger(vec!["a".into(), "b[1].c".into()]);
        assert_eq!(
            err.to_string(),
            "deferred values were never written: a, b[1].c"
        );

        let err = Error::PlaceholderConsistency {
            path: "a".into(),
            expected: Bytes::from_static(&[0x00]),
            found: Bytes::from_static(&[0x01]),
        };
        assert_eq!(
            err.to_string(),
            "data at target of 'a' (01) does not equal expected placeholder data (00)"
        );
    }

    #[test]
    fn test_source() {
        use std::error::Error as _;

        let err = Error::NonConstantSize {
            path: "a".into(),
            source: CodecError::Unsized("bytes::Bytes"),
        };
        assert!(matches!(
            err.source().and_then(|e| e.downcast_ref::<CodecError>()),
            Some(CodecError::Unsized(_))
        ));
    }
}
