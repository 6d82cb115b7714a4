//! Configuration of an [crate::Encoder].

/// Default byte used to fill placeholders.
pub const DEFAULT_FILL: u8 = 0x00;

/// Configuration for an [crate::Encoder].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Byte repeated to fill a placeholder when no explicit placeholder value is given.
    pub fill: u8,

    /// Initial capacity (in bytes) of the output buffer.
    pub capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fill: DEFAULT_FILL,
            capacity: 0,
        }
    }
}
