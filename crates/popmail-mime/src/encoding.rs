//! Transfer decoders.
//!
//! Base64 and Quoted-Printable, in the body flavour (RFC 2045) and the
//! encoded-word flavour (RFC 2047). The decoders accept the malformed input
//! seen in real mail rather than rejecting it.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use encoding_rs::Encoding;
use std::fmt::Write as _;

use crate::charset;
use crate::error::Result;

/// Decoding engine that accepts missing padding and non-zero trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// Line breaks and any other ASCII whitespace are removed first, since
/// senders wrap encoded lines. Padding may be missing.
///
/// # Errors
///
/// Returns an error if the input contains characters outside the Base64
/// alphabet or has an impossible length.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Decodes Base64 data and interprets the result with `encoding`.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64_text(data: &str, encoding: &'static Encoding) -> Result<String> {
    let bytes = decode_base64(data.as_bytes())?;
    Ok(charset::decode(&bytes, encoding))
}

/// Maximum line length for Quoted-Printable encoding.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Every byte that is not printable ASCII is written as `=XX`, and soft line
/// breaks keep lines under 76 characters.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::new();
    let mut line_length = 0;

    for byte in data {
        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        match *byte {
            b'!'..=b'<' | b'>'..=b'~' => {
                result.push(char::from(*byte));
                line_length += 1;
            }
            // A space may not end a line
            b' ' => {
                if line_length >= MAX_LINE_LENGTH - 1 {
                    result.push_str("=20");
                    line_length += 3;
                } else {
                    result.push(' ');
                    line_length += 1;
                }
            }
            _ => {
                let _ = write!(result, "={byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}

/// Decodes a Quoted-Printable body (RFC 2045).
///
/// Never fails:
/// - `=XX` becomes the byte `XX` (hex digits in either case);
/// - `=` before a line break is a soft line break and disappears;
/// - any other `=` is kept literally.
///
/// Control characters other than tab and paired CRLF are removed first.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let cleaned = strip_illegal_controls(data);
    let mut result = Vec::with_capacity(cleaned.len());
    let mut i = 0;

    while i < cleaned.len() {
        let byte = cleaned[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        if let Some(end) = soft_break_end(&cleaned[i + 1..]) {
            i += 1 + end;
            continue;
        }

        match (cleaned.get(i + 1), cleaned.get(i + 2)) {
            (Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                result.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

/// Decodes the payload of a `Q` encoded word (RFC 2047 §4.2).
///
/// Identical to [`decode_quoted_printable`] except that `_` stands for a space.
#[must_use]
pub fn decode_quoted_printable_word(text: &str, encoding: &'static Encoding) -> String {
    let spaced: Vec<u8> = text
        .bytes()
        .map(|b| if b == b'_' { b' ' } else { b })
        .collect();
    charset::decode(&decode_quoted_printable(&spaced), encoding)
}

/// Length of a soft line break following `=`, including optional trailing blanks.
fn soft_break_end(rest: &[u8]) -> Option<usize> {
    let blanks = rest
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    rest[blanks..]
        .starts_with(b"\r\n")
        .then_some(blanks + 2)
}

/// Removes control characters that may not appear in Quoted-Printable text,
/// including any `\r` or `\n` that is not part of a CRLF pair.
fn strip_illegal_controls(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'\r' if data.get(i + 1) == Some(&b'\n') => {
                out.extend_from_slice(b"\r\n");
                i += 2;
                continue;
            }
            b'\r' | b'\n' | 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F => {}
            byte => out.push(byte),
        }
        i += 1;
    }

    out
}

const fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxk\r\nIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_missing_padding() {
        assert_eq!(decode_base64(b"SGVsbG8").unwrap(), b"Hello");
    }

    #[test]
    fn test_base64_garbage_is_error() {
        assert!(decode_base64(b"!!!not base64!!!").is_err());
    }

    #[test]
    fn test_base64_text_uses_charset() {
        let text = decode_base64_text("Y2Fm6Q==", encoding_rs::WINDOWS_1252).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), "Hello, World!");
        assert!(encode_quoted_printable("Héllo".as_bytes()).contains("=C3=A9"));
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"h=c3=a9llo"), "héllo".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\r\n"), b"Hello");
        assert_eq!(decode_quoted_printable(b"Hello= \t\r\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_hard_line_break_survives() {
        assert_eq!(decode_quoted_printable(b"a\r\nb"), b"a\r\nb");
        assert_eq!(decode_quoted_printable(b"a\tb"), b"a\tb");
    }

    #[test]
    fn test_quoted_printable_literal_equals() {
        assert_eq!(decode_quoted_printable(b"a=b"), b"a=b");
        assert_eq!(decode_quoted_printable(b"1+1=2"), b"1+1=2");
        assert_eq!(decode_quoted_printable(b"end="), b"end=");
        assert_eq!(decode_quoted_printable(b"end=A"), b"end=A");
        assert_eq!(decode_quoted_printable(b"x=ZZ"), b"x=ZZ");
    }

    #[test]
    fn test_quoted_printable_strips_controls() {
        assert_eq!(decode_quoted_printable(b"a\x00b\x07c\x7Fd"), b"abcd");
        assert_eq!(decode_quoted_printable(b"a\rb\nc"), b"abc");
        assert_eq!(decode_quoted_printable(b"a\n\r\nb"), b"a\r\nb");
    }

    #[test]
    fn test_quoted_printable_word_underscore() {
        let text = decode_quoted_printable_word("Keld_J=F8rn_Simonsen", encoding_rs::WINDOWS_1252);
        assert_eq!(text, "Keld Jørn Simonsen");
        // The body flavour leaves underscores alone.
        assert_eq!(decode_quoted_printable(b"a_b"), b"a_b");
    }

    proptest! {
        #[test]
        fn base64_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode_base64(&data);
            prop_assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), data);
        }

        #[test]
        fn quoted_printable_escape_round_trip(
            data in proptest::collection::vec(any::<u8>(), 0..512)
        ) {
            let encoded: String = data.iter().map(|b| format!("={b:02X}")).collect();
            prop_assert_eq!(decode_quoted_printable(encoded.as_bytes()), data);
        }

        #[test]
        fn quoted_printable_encoder_round_trip(
            data in proptest::collection::vec(any::<u8>(), 0..512)
        ) {
            let encoded = encode_quoted_printable(&data);
            prop_assert_eq!(decode_quoted_printable(encoded.as_bytes()), data);
        }

        #[test]
        fn decoders_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let decoded = decode_quoted_printable(&data);
            prop_assert!(decoded.len() <= data.len());
            let _ = decode_base64(&data);
        }
    }
}
