//! Node ID ↔ hex string conversions.
//!
//! The canonical hex form is lowercase, zero-padded to 8 characters, and
//! optionally prefixed with `!`. Conversions are total and mutually inverse.

use crate::error::NodeIdError;

/// Renders `node_id` as `!cafebabe`.
pub fn hex_with_bang(node_id: u32) -> String {
    format!("!{node_id:08x}")
}

/// Renders `node_id` as `cafebabe`, no leading `!`.
pub fn hex_without_bang(node_id: u32) -> String {
    format!("{node_id:08x}")
}

/// Last 6 hex characters of the unbanged hex form, used for UI color coding.
pub fn color(node_id: u32) -> String {
    let hex = hex_without_bang(node_id);
    hex[hex.len() - 6..].to_string()
}

/// Parses a node id from `!cafebabe` or `cafebabe`. Requires exactly 8 hex
/// characters after stripping an optional leading `!`.
pub fn parse(s: &str) -> Result<u32, NodeIdError> {
    let stripped = s.strip_prefix('!').unwrap_or(s);
    if stripped.len() != 8 {
        return Err(NodeIdError::WrongLength(stripped.len()));
    }
    u32::from_str_radix(stripped, 16).map_err(|_| NodeIdError::NotHex(stripped.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_bang() {
        for n in [0u32, 1, 0xcafebabe, u32::MAX] {
            let hex = hex_with_bang(n);
            assert_eq!(parse(&hex).unwrap(), n);
        }
    }

    #[test]
    fn round_trip_without_bang() {
        for n in [0u32, 1, 0xcafebabe, u32::MAX] {
            let hex = hex_without_bang(n);
            assert_eq!(parse(&hex).unwrap(), n);
        }
    }

    #[test]
    fn hex_form_is_eight_lowercase_chars() {
        let hex = hex_without_bang(0xAB);
        assert_eq!(hex.len(), 8);
        assert_eq!(hex, hex.to_lowercase());
    }

    #[test]
    fn color_is_last_six_chars() {
        assert_eq!(color(0x1a2b3c4d), "2b3c4d");
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(parse("abc").is_err());
        assert!(parse("!abc").is_err());
        assert!(parse("123456789").is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(parse("zzzzzzzz").is_err());
    }

    #[test]
    fn parse_accepts_both_forms() {
        assert_eq!(parse("!1a2b3c4d").unwrap(), parse("1a2b3c4d").unwrap());
    }
}
