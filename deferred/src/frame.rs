//! Buffering frames and offset resolution.
//!
//! A region whose length must precede its content is encoded twice: first into a private
//! buffer (a [Frame]), then, once the length is known, its header and content are spliced
//! into the enclosing stream. Anything that needs to know where a byte will end up in the
//! final output while its frame is still open must account for every enclosing frame and
//! every header that has not been written yet. [resolve] performs that computation.
//!
//! ```text
//!  root:     | ...flushed... |
//!                            ^ base of frame 1
//!  frame 1:                  [hdr1] | ...buffered... |
//!                                                    ^ base of frame 2
//!  frame 2:                                          [hdr2] | ...buffered...   <- local
//! ```

use bytes::BytesMut;

/// A region encoded into a private buffer before being spliced into its parent.
#[derive(Debug)]
pub struct Frame {
    /// Position in the parent stream when this frame was entered.
    base: usize,
    /// Width of the header that will be written ahead of this frame's content.
    header: usize,
    buf: BytesMut,
}

impl Frame {
    /// Bytes already present in the parent stream before this frame began.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Width of the (not yet written) header that will precede this frame's content.
    pub fn header(&self) -> usize {
        self.header
    }

    /// Content buffered so far.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }
}

/// Returns the position that byte `local` of the innermost frame will occupy once every
/// frame in `frames` has been flushed to the real output.
///
/// `frames` is ordered from outermost to innermost. When it is empty, `local` already
/// refers to the real output.
pub fn resolve(local: usize, frames: &[Frame]) -> usize {
    frames
        .iter()
        .fold(local, |offset, frame| offset + frame.base + frame.header)
}

/// The real output stream together with the stack of open frames.
#[derive(Debug, Default)]
pub(crate) struct Stack {
    root: BytesMut,
    frames: Vec<Frame>,
}

impl Stack {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            root: BytesMut::with_capacity(capacity),
            frames: Vec::new(),
        }
    }

    pub(crate) fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Buffer currently being written to.
    pub(crate) fn current(&self) -> &BytesMut {
        self.frames.last().map_or(&self.root, |frame| &frame.buf)
    }

    pub(crate) fn current_mut(&mut self) -> &mut BytesMut {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.buf,
            None => &mut self.root,
        }
    }

    /// Write position within the current buffer.
    pub(crate) fn position(&self) -> usize {
        self.current().len()
    }

    /// Position the next written byte will occupy in the real output.
    pub(crate) fn offset(&self) -> usize {
        resolve(self.position(), &self.frames)
    }

    /// Opens a frame whose content will be preceded by a `header`-byte header.
    pub(crate) fn push(&mut self, header: usize) {
        let base = self.position();
        self.frames.push(Frame {
            base,
            header,
            buf: BytesMut::new(),
        });
    }

    /// Closes the innermost frame, returning its buffered content.
    ///
    /// The caller is responsible for writing the header and the content to the
    /// (new) current buffer.
    pub(crate) fn pop(&mut self) -> Frame {
        self.frames.pop().expect("no open frame")
    }

    /// Returns the buffer holding level `level` (0 is the real output) and the
    /// absolute offset of its first byte.
    fn level(&self, level: usize) -> (usize, &BytesMut) {
        match level {
            0 => (0, &self.root),
            _ => (resolve(0, &self.frames[..level]), &self.frames[level - 1].buf),
        }
    }

    /// Finds which buffer holds the absolute range `[offset, offset + len)`.
    ///
    /// Returns the level and the range relative to that buffer, or `None` if the range is
    /// not fully written (for example, because it overlaps a header that is still pending).
    fn locate(&self, offset: usize, len: usize) -> Option<(usize, usize)> {
        let end = offset.checked_add(len)?;
        (0..=self.frames.len()).find_map(|level| {
            let (start, buf) = self.level(level);
            (offset >= start && end <= start + buf.len()).then(|| (level, offset - start))
        })
    }

    /// Returns the written bytes at absolute range `[offset, offset + len)`.
    pub(crate) fn get(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let (level, start) = self.locate(offset, len)?;
        let (_, buf) = self.level(level);
        Some(&buf[start..start + len])
    }

    /// Returns the written bytes at absolute range `[offset, offset + len)` for overwriting.
    pub(crate) fn get_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let (level, start) = self.locate(offset, len)?;
        let buf = match level {
            0 => &mut self.root,
            _ => &mut self.frames[level - 1].buf,
        };
        Some(&mut buf[start..start + len])
    }

    /// Returns the real output. All frames must have been closed.
    pub(crate) fn into_inner(self) -> BytesMut {
        assert!(self.frames.is_empty(), "unflushed frames");
        self.root
    }
}
