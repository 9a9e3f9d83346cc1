//! Hex and escape-sequence helpers shared by delimiter parsing, payload modes and the CLI.

use crate::error::{CodecError, Result};

/// Parse a hex string such as `"01 03 0A"`, `"01030a"` or `"0x01,0x03"`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let mut digits = String::with_capacity(input.len());
    for token in input.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        if token.is_empty() {
            continue;
        }
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if token.len() % 2 == 1 {
            digits.push('0');
        }
        digits.push_str(token);
    }

    let raw = digits.as_bytes();
    let mut out = Vec::with_capacity(raw.len() / 2);
    for pair in raw.chunks(2) {
        let hi = hex_digit(pair[0]).ok_or_else(|| CodecError::InvalidHex(input.to_string()))?;
        let lo = hex_digit(pair[1]).ok_or_else(|| CodecError::InvalidHex(input.to_string()))?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Format bytes as upper-case, space-separated hex.
pub fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// True when `input` looks like space-separated hex bytes (`"0D 0A"`).
///
/// Requires at least two tokens so short text such as `"AB"` stays text.
pub fn looks_like_hex_bytes(input: &str) -> bool {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    tokens.len() >= 2
        && tokens
            .iter()
            .all(|t| t.len() == 2 && t.bytes().all(|b| hex_digit(b).is_some()))
}

/// Process backslash escapes: `\n`, `\r`, `\t`, `\0`, `\\`, `\xHH`.
///
/// Unknown escapes are kept verbatim, backslash included.
pub fn unescape(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes[i + 1] {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'0' => out.push(0),
            b'\\' => out.push(b'\\'),
            b'x' if i + 3 < bytes.len() => {
                match (hex_digit(bytes[i + 2]), hex_digit(bytes[i + 3])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 4;
                        continue;
                    }
                    _ => out.extend_from_slice(&bytes[i..i + 2]),
                }
            }
            _ => out.extend_from_slice(&bytes[i..i + 2]),
        }
        i += 2;
    }
    out
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
