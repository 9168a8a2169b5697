//! RFC 2047 encoded-word decoding.
//!
//! Finds every `=?charset?enc?payload?=` token in a header value and replaces
//! it with its decoded text. Literal text around the tokens is kept as-is,
//! except that whitespace separating two encoded words is dropped.

use std::sync::LazyLock;

use regex::Regex;

use crate::charset::CharsetResolver;
use crate::encoding::{decode_base64_text, decode_quoted_printable_word};
use crate::error::{Error, Result};

// Spaces are allowed in the payload because real senders emit them.
#[allow(clippy::expect_used)] // literal pattern
static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?(\S+?)\?(\w)\?(.+?)\?=").expect("encoded-word pattern compiles")
});

/// Decodes all encoded words in `text`.
///
/// A word whose charset cannot be resolved, or whose Base64 payload is
/// malformed, is left exactly as it appeared. Text without encoded words is
/// returned unchanged.
///
/// # Errors
///
/// Returns [`Error::UnrecognizedEncoding`] if a word uses an encoding letter
/// other than `Q` or `B`.
pub fn decode(text: &str, resolver: &CharsetResolver) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for caps in ENCODED_WORD.captures_iter(text) {
        let (Some(whole), Some(charset), Some(encoding), Some(payload)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };

        let decoded =
            decode_word(charset.as_str(), encoding.as_str(), payload.as_str(), resolver)?;

        // Whitespace is only dropped between two words that both decoded.
        let gap = &text[last_end..whole.start()];
        let joins = previous_was_word && decoded.is_some();
        if !(joins && gap.chars().all(char::is_whitespace)) {
            result.push_str(gap);
        }
        result.push_str(decoded.as_deref().unwrap_or(whole.as_str()));

        last_end = whole.end();
        previous_was_word = decoded.is_some();
    }

    result.push_str(&text[last_end..]);
    Ok(result)
}

/// Decodes one encoded word. `Ok(None)` means "keep the original text".
fn decode_word(
    charset: &str,
    encoding: &str,
    payload: &str,
    resolver: &CharsetResolver,
) -> Result<Option<String>> {
    let is_base64 = match encoding {
        "B" | "b" => true,
        "Q" | "q" => false,
        other => return Err(Error::UnrecognizedEncoding(other.to_string())),
    };

    // RFC 2231 allows a language suffix: `us-ascii*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let encoding = match resolver.resolve(charset) {
        Ok(encoding) => encoding,
        Err(e) => {
            tracing::debug!(charset, error = %e, "leaving encoded word undecoded");
            return Ok(None);
        }
    };

    if is_base64 {
        match decode_base64_text(payload, encoding) {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                tracing::debug!(error = %e, "leaving malformed base64 encoded word undecoded");
                Ok(None)
            }
        }
    } else {
        Ok(Some(decode_quoted_printable_word(payload, encoding)))
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

    fn dec(text: &str) -> String {
        decode(text, &CharsetResolver::new()).unwrap()
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(dec("Hello"), "Hello");
        let tricky = "test that this is not touched ?! ?=..?= =?...?=";
        assert_eq!(dec(tricky), tricky);
    }

    #[test]
    fn test_base64_word() {
        assert_eq!(dec("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(dec("=?UTF-8?b?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_q_word_with_spaces_in_payload() {
        assert_eq!(
            dec("=?iso-8859-1?Q?Re: Yahoo! Mail (comment acc=E9der, restaurer, etc)?="),
            "Re: Yahoo! Mail (comment accéder, restaurer, etc)"
        );
    }

    #[test]
    fn test_danish_subject() {
        assert_eq!(
            dec("=?iso-8859-1?Q?SV:_Ticket(13349550)_-_Sp=F8rgsm=E5l_omkring_CBB_privat?="),
            "SV: Ticket(13349550) - Spørgsmål omkring CBB privat"
        );
    }

    #[test]
    fn test_baltic_charset() {
        assert_eq!(
            dec("=?ISO-8859-13?Q?Fwd=3A_Dvira=E8iai_vasar=E0_vagiami_da=FEniau=2C_bet_draust?="),
            "Fwd: Dviračiai vasarą vagiami dažniau, bet draust"
        );
    }

    #[test]
    fn test_adjacent_words_join() {
        assert_eq!(dec("(=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=)"), "(ab)");
        assert_eq!(dec("(=?ISO-8859-1?Q?a?=\r\n =?ISO-8859-1?Q?b?=)"), "(ab)");
        assert_eq!(dec("(=?ISO-8859-1?Q?a?= =?ISO-8859-2?Q?_b?=)"), "(a b)");
        assert_eq!(
            dec("(=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=) (=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=)"),
            "(ab) (ab)"
        );
    }

    #[test]
    fn test_literal_text_between_words_kept() {
        assert_eq!(dec("=?utf-8?Q?a?= and =?utf-8?Q?b?="), "a and b");
        assert_eq!(dec("Re: =?utf-8?Q?caf=C3=A9?="), "Re: café");
    }

    #[test]
    fn test_unknown_charset_keeps_original() {
        let text = "=?x-no-such-set?Q?abc?= tail";
        assert_eq!(dec(text), text);
    }

    #[test]
    fn test_undecoded_word_keeps_surrounding_spaces() {
        assert_eq!(
            dec("=?utf-8?Q?a?= =?x-no-such-set?Q?b?= =?utf-8?Q?c?="),
            "a =?x-no-such-set?Q?b?= c"
        );
        assert_eq!(dec("=?x-no-such-set?Q?b?= =?utf-8?Q?c?="), "=?x-no-such-set?Q?b?= c");
        assert_eq!(dec("=?utf-8?Q?a?= =?utf-8?B?###?="), "a =?utf-8?B?###?=");
    }

    #[test]
    fn test_malformed_base64_keeps_original() {
        let text = "=?utf-8?B?###?=";
        assert_eq!(dec(text), text);
    }

    #[test]
    fn test_unknown_encoding_letter_is_error() {
        let err = decode("=?utf-8?X?abc?=", &CharsetResolver::new()).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedEncoding(letter) if letter == "X"));
    }

    #[test]
    fn test_language_suffix_ignored() {
        assert_eq!(dec("=?US-ASCII*EN?Q?Keith_Moore?="), "Keith Moore");
    }

    proptest! {
        #[test]
        fn literal_text_is_fixed_point(text in "[^=?]*") {
            let once = dec(&text);
            prop_assert_eq!(&once, &text);
            prop_assert_eq!(dec(&once), text);
        }

        #[test]
        fn never_panics(text in "\\PC*") {
            let _ = decode(&text, &CharsetResolver::new());
        }
    }
}
