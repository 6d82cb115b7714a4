//! Leverage common functionality across the backpatch crates.

use std::fmt::Write as _;

/// Converts bytes to a hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Converts a hexadecimal string to bytes.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Converts a hexadecimal string to bytes, stripping whitespace and/or a `0x` prefix. Commonly used
/// in testing to encode external test vectors without modification.
pub fn from_hex_formatted(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.replace(['\t', '\n', '\r', ' '], "");
    let res = hex.strip_prefix("0x").unwrap_or(&hex);
    from_hex(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        // Empty bytes
        let b = &[];
        let h = hex(b);
        assert_eq!(h, "");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Multiple bytes
        let b = &[0x01, 0xab, 0xff];
        let h = hex(b);
        assert_eq!(h, "01abff");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Odd number of characters
        assert!(from_hex("0102030").is_none());

        // Invalid hexadecimal character
        assert!(from_hex("01g3").is_none());

        // Multi-byte character
        assert!(from_hex("0é").is_none());
    }

    #[test]
    fn test_from_hex_formatted() {
        let h = "0x01 02\n03\t04";
        assert_eq!(from_hex_formatted(h).unwrap(), vec![1, 2, 3, 4]);
        assert!(from_hex_formatted("0x0").is_none());
    }
}
