//! Structural addresses of values within one invocation.
//!
//! Paths render as `outer.inner[3].leaf`. A field that was flattened into its enclosing
//! structure simply has no segment of its own, so it is addressed exactly like a field
//! declared in the enclosing structure.

use std::{borrow::Cow, fmt};

/// One step of a [Path].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named field.
    Field(Cow<'static, str>),
    /// An element of a sequence.
    Index(usize),
}

/// Address of the value currently being encoded or decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Returns the empty path of the top-level value.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true if this is the path of the top-level value.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub(crate) fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Returns the path of the enclosing value (the root is its own parent).
    pub fn parent(&self) -> Self {
        let mut parent = self.clone();
        parent.pop();
        parent
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Appends a relative path to a rendered base path.
pub fn join(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }
    if relative.is_empty() {
        return base.to_string();
    }
    if relative.starts_with('[') {
        format!("{base}{relative}")
    } else {
        format!("{base}.{relative}")
    }
}

/// How the (empty) path of the top-level value appears in messages.
pub const ROOT: &str = "(root)";

/// Returns `path`, or [ROOT] if it is the path of the top-level value.
pub fn display(path: &str) -> &str {
    if path.is_empty() {
        ROOT
    } else {
        path
    }
}

/// Returns the rendered path of element `index` of the sequence at `base`.
pub fn element(base: &str, index: usize) -> String {
    format!("{base}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let mut path = Path::root();
        assert_eq!(path.to_string(), "");
        assert!(path.is_root());

        path.push(Segment::Field("a1".into()));
        path.push(Segment::Index(3));
        path.push(Segment::Field("value".into()));
        assert_eq!(path.to_string(), "a1[3].value");
        assert_eq!(path.parent().to_string(), "a1[3]");

        // Sequences at the root have no leading separator
        let mut path = Path::root();
        path.push(Segment::Index(0));
        path.push(Segment::Field("a".into()));
        assert_eq!(path.to_string(), "[0].a");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "data"), "data");
        assert_eq!(join("header", "data"), "header.data");
        assert_eq!(join("header", "[1]"), "header[1]");
        assert_eq!(join("header", ""), "header");
        assert_eq!(element("data", 2), "data[2]");
        assert_eq!(display(""), ROOT);
        assert_eq!(display("a[1]"), "a[1]");
    }
}
