//! `type/subtype; name=value; ...` parameter lists.
//!
//! Tolerates missing semicolons, whitespace around `=`, `;` inside quoted
//! values and a trailing `;`. RFC 2231 extended values (`name*=`) and
//! continuations (`name*0`, `name*1*`, ...) are reassembled, and RFC 2047
//! encoded words in ordinary values are decoded.

use std::collections::{BTreeMap, HashMap};

use crate::charset::{self, CharsetResolver};
use crate::encoded_word;

/// A header value split into its leading token and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedValue {
    pub(crate) token: String,
    pub(crate) parameters: HashMap<String, String>,
}

/// Parses `token; a=1; b="two"` into its parts.
///
/// Parameter names are lowercased. Decoding problems in individual values
/// are logged and the raw value is kept.
pub(crate) fn parse(text: &str, resolver: &CharsetResolver) -> ParsedValue {
    let (token, rest) = split_token(text);
    let raw = tokenize(rest);
    ParsedValue {
        token: token.trim().to_string(),
        parameters: assemble(raw, resolver),
    }
}

/// Removes whitespace outside quoted strings: `charset = "x"` becomes `charset="x"`.
pub(crate) fn strip_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            out.push(c);
        } else if c == '"' {
            in_quotes = true;
            out.push(c);
        } else if !c.is_whitespace() {
            out.push(c);
        }
    }

    out
}

fn split_token(text: &str) -> (&str, &str) {
    text.split_once(';').unwrap_or((text, ""))
}

/// One `name=value` pair as written, before RFC 2231 reassembly.
struct RawParam {
    name: String,
    value: String,
}

fn tokenize(text: &str) -> Vec<RawParam> {
    let chars: Vec<char> = text.chars().collect();
    let mut params = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ';') {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let name_start = i;
        while i < chars.len() && chars[i] != '=' && chars[i] != ';' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect();
        if i >= chars.len() || chars[i] == ';' {
            tracing::debug!(fragment = name.trim(), "parameter without value ignored");
            continue;
        }
        i += 1;

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }

        let value = if chars.get(i) == Some(&'"') {
            let (value, next) = read_quoted(&chars, i + 1);
            i = next;
            value
        } else {
            let (value, next) = read_unquoted(&chars, i);
            i = next;
            value
        };

        params.push(RawParam {
            name: name.trim().to_ascii_lowercase(),
            value,
        });
    }

    params
}

/// Reads a quoted string starting after the opening quote.
fn read_quoted(chars: &[char], mut i: usize) -> (String, usize) {
    let mut value = String::new();
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                value.push(chars[i + 1]);
                i += 2;
            }
            '"' => return (value, i + 1),
            c => {
                value.push(c);
                i += 1;
            }
        }
    }
    (value, i)
}

/// Reads an unquoted value.
///
/// The value normally stops at whitespace. If what follows before the next
/// `;` holds no `=`, it is part of this value (`name=my file.doc`);
/// otherwise it is the next parameter and the separating `;` was missing.
fn read_unquoted(chars: &[char], start: usize) -> (String, usize) {
    let segment_end = chars[start..]
        .iter()
        .position(|&c| c == ';')
        .map_or(chars.len(), |p| start + p);
    let word_end = chars[start..segment_end]
        .iter()
        .position(|c| c.is_whitespace())
        .map_or(segment_end, |p| start + p);

    let trailing: String = chars[word_end..segment_end].iter().collect();
    if trailing.contains('=') {
        (chars[start..word_end].iter().collect(), word_end)
    } else {
        let value: String = chars[start..segment_end].iter().collect();
        (value.trim().to_string(), segment_end)
    }
}

/// One piece of a possibly continued parameter.
struct Section {
    value: String,
    extended: bool,
}

fn assemble(raw: Vec<RawParam>, resolver: &CharsetResolver) -> HashMap<String, String> {
    let mut plain: Vec<(String, String)> = Vec::new();
    let mut sections: BTreeMap<String, BTreeMap<u32, Section>> = BTreeMap::new();

    for RawParam { name, value } in raw {
        let (base, extended) = match name.strip_suffix('*') {
            Some(base) => (base, true),
            None => (name.as_str(), false),
        };

        let (base, index) = match base.rsplit_once('*') {
            Some((b, n)) if !n.is_empty() && n.bytes().all(|d| d.is_ascii_digit()) => {
                (b, n.parse().ok())
            }
            _ => (base, None),
        };

        match index {
            Some(index) => {
                sections
                    .entry(base.to_string())
                    .or_default()
                    .insert(index, Section { value, extended });
            }
            None if extended => {
                sections
                    .entry(base.to_string())
                    .or_default()
                    .insert(0, Section { value, extended });
            }
            None => plain.push((name, value)),
        }
    }

    let mut parameters = HashMap::new();
    for (name, value) in plain {
        let decoded = encoded_word::decode(&value, resolver).unwrap_or_else(|e| {
            tracing::debug!(parameter = %name, error = %e, "parameter kept undecoded");
            value.clone()
        });
        parameters.insert(name, decoded);
    }

    // RFC 2231 values take precedence over plain ones of the same name.
    for (name, parts) in sections {
        parameters.insert(name, join_sections(parts, resolver));
    }

    parameters
}

/// Joins continuation sections in index order and decodes extended ones.
fn join_sections(parts: BTreeMap<u32, Section>, resolver: &CharsetResolver) -> String {
    let mut charset_name: Option<String> = None;
    let mut bytes = Vec::new();

    for (index, section) in parts {
        if !section.extended {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }

        let mut payload = section.value.as_str();
        if index == 0
            && let Some((charset, rest)) = payload.split_once('\'')
            && let Some((_language, encoded)) = rest.split_once('\'')
        {
            if !charset.is_empty() {
                charset_name = Some(charset.to_string());
            }
            payload = encoded;
        }
        bytes.extend(percent_decode(payload));
    }

    let encoding = charset_name
        .as_deref()
        .and_then(|name| match resolver.resolve(name) {
            Ok(encoding) => Some(encoding),
            Err(e) => {
                tracing::debug!(error = %e, "RFC 2231 charset unknown, assuming UTF-8");
                None
            }
        })
        .unwrap_or(encoding_rs::UTF_8);

    charset::decode(&bytes, encoding)
}

fn percent_decode(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = bytes.get(i + 1..i + 3)
            && let Ok(hex) = std::str::from_utf8(hex)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    out
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

    fn params(text: &str) -> HashMap<String, String> {
        parse(text, &CharsetResolver::new()).parameters
    }

    #[test]
    fn test_token_and_simple_params() {
        let parsed = parse("text/plain; charset=utf-8; format=flowed", &CharsetResolver::new());
        assert_eq!(parsed.token, "text/plain");
        assert_eq!(parsed.parameters["charset"], "utf-8");
        assert_eq!(parsed.parameters["format"], "flowed");
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        assert_eq!(params("x; name=\"NUMMER; 251478.doc\"")["name"], "NUMMER; 251478.doc");
    }

    #[test]
    fn test_missing_semicolon() {
        let p = params("x; boundary=\"abc\" charset=utf-8");
        assert_eq!(p["boundary"], "abc");
        assert_eq!(p["charset"], "utf-8");

        let p = params("x; a=1 b=2");
        assert_eq!(p["a"], "1");
        assert_eq!(p["b"], "2");
    }

    #[test]
    fn test_unquoted_value_with_space() {
        assert_eq!(params("x; name=my file.doc")["name"], "my file.doc");
    }

    #[test]
    fn test_whitespace_around_equals() {
        assert_eq!(params("x; charset = \"us-ascii\"")["charset"], "us-ascii");
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(params(r#"x; name="a \"b\" c""#)["name"], "a \"b\" c");
    }

    #[test]
    fn test_names_are_lowercased() {
        assert_eq!(params("x; Filename=\"test.csv\";")["filename"], "test.csv");
    }

    #[test]
    fn test_rfc2231_extended_value() {
        assert_eq!(
            params("x; name*=ISO-8859-1''Ans%E6ttelseskontrakt.pdf")["name"],
            "Ansættelseskontrakt.pdf"
        );
    }

    #[test]
    fn test_rfc2231_continuation() {
        let p = params(
            "multipart/report; report-type=delivery-status; \
             boundary*0=1804289383_1288411300_549365113_21474836; \
             boundary*1=47_bda2385.bisx.prod.on.blackberry",
        );
        assert_eq!(
            p["boundary"],
            "1804289383_1288411300_549365113_2147483647_bda2385.bisx.prod.on.blackberry"
        );
        assert_eq!(p["report-type"], "delivery-status");
    }

    #[test]
    fn test_rfc2231_mixed_sections() {
        let p = params(
            "application/x-stuff; title*0*=us-ascii'en'This%20is%20even%20more%20; \
             title*1*=%2A%2A%2Afun%2A%2A%2A%20; title*2=\"isn't it!\"",
        );
        assert_eq!(p["title"], "This is even more ***fun*** isn't it!");
    }

    #[test]
    fn test_rfc2231_out_of_order_sections() {
        let p = params("x; name*1=\"def\"; name*0=\"abc\"");
        assert_eq!(p["name"], "abcdef");
    }

    #[test]
    fn test_encoded_word_in_value() {
        assert_eq!(
            params(
                "x; name=\"=?Windows-1252?Q?revideret_forel=F8big_dagsorden_090110_\
                 version_2.doc?=\""
            )["name"],
            "revideret foreløbig dagsorden 090110 version 2.doc"
        );
    }

    #[test]
    fn test_strip_whitespace_keeps_quoted() {
        assert_eq!(
            strip_whitespace("text / plain; charset = \"a b\""),
            "text/plain;charset=\"a b\""
        );
    }

    #[test]
    fn test_percent_decode_invalid_kept() {
        assert_eq!(percent_decode("100%ZZ%4"), b"100%ZZ%4");
        assert_eq!(percent_decode("%41%42"), b"AB");
    }
}
