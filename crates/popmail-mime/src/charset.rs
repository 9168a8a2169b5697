//! Charset name resolution.
//!
//! Maps MIME charset labels such as `iso-8859-1`, `windows-1254` or `cp1255`
//! onto [`encoding_rs`] decoders. Callers can add their own aliases and a
//! fallback hook for names nothing else recognises.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Hook consulted when a charset name cannot be resolved.
pub type FallbackHook = dyn Fn(&str) -> Option<&'static Encoding> + Send + Sync;

static GLOBAL: LazyLock<Arc<CharsetResolver>> = LazyLock::new(|| Arc::new(CharsetResolver::new()));

/// Resolves charset names to text decoders.
///
/// Lookups are case-insensitive. The resolution order is: registered
/// mappings, Windows codepage numbers (`cp1252`, `windows-1252`, `1252`),
/// WHATWG labels, and finally the fallback hook.
///
/// The resolver is internally synchronized, so one instance can be shared
/// between threads and updated while in use.
pub struct CharsetResolver {
    mappings: RwLock<HashMap<String, &'static Encoding>>,
    fallback: RwLock<Option<Arc<FallbackHook>>>,
}

impl CharsetResolver {
    /// Creates a resolver seeded with the built-in aliases.
    #[must_use]
    pub fn new() -> Self {
        let mappings = BUILTIN_ALIASES
            .iter()
            .map(|(name, encoding)| ((*name).to_string(), *encoding))
            .collect();

        Self {
            mappings: RwLock::new(mappings),
            fallback: RwLock::new(None),
        }
    }

    /// Returns the process-wide resolver used by default configurations.
    ///
    /// It is created on first use and lives until the process exits.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Registers `name` as an alias for `encoding`.
    ///
    /// Registering the same name twice keeps the last encoding. Registered
    /// names take precedence over every built-in rule.
    pub fn add_mapping(&self, name: &str, encoding: &'static Encoding) {
        let key = normalize(name);
        tracing::debug!(charset = %key, encoding = encoding.name(), "registered charset mapping");
        self.mappings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, encoding);
    }

    /// Installs the hook called for names nothing else resolves.
    pub fn set_fallback<F>(&self, hook: F)
    where
        F: Fn(&str) -> Option<&'static Encoding> + Send + Sync + 'static,
    {
        *self.fallback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Removes the fallback hook, restoring the default of failing.
    pub fn clear_fallback(&self) {
        *self.fallback.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Resolves a charset name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCharset`] if no rule matches and the fallback
    /// hook is absent or declines.
    pub fn resolve(&self, name: &str) -> Result<&'static Encoding> {
        let key = normalize(name);

        if let Some(encoding) = self
            .mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(*encoding);
        }

        if let Some(encoding) = codepage_digits(&key).and_then(encoding_for_codepage) {
            return Ok(encoding);
        }

        if let Some(encoding) = Encoding::for_label(key.as_bytes()) {
            return Ok(encoding);
        }

        // Clone the hook out so it runs without holding the lock.
        let hook = self
            .fallback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(encoding) = hook.and_then(|hook| hook(key.as_str())) {
            tracing::debug!(
                charset = %key,
                encoding = encoding.name(),
                "charset resolved by fallback hook"
            );
            return Ok(encoding);
        }

        Err(Error::UnknownCharset(name.to_string()))
    }
}

impl Default for CharsetResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CharsetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mappings = self
            .mappings
            .read()
            .map_or(0, |mappings| mappings.len());
        let has_fallback = self
            .fallback
            .read()
            .is_ok_and(|fallback| fallback.is_some());
        f.debug_struct("CharsetResolver")
            .field("mappings", &mappings)
            .field("has_fallback", &has_fallback)
            .finish()
    }
}

/// Decodes `bytes` with `encoding`, dropping a leading byte order mark.
///
/// Malformed sequences become U+FFFD.
#[must_use]
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_with_bom_removal(bytes).0.into_owned()
}

/// Names that are common in mail but are not WHATWG labels.
const BUILTIN_ALIASES: &[(&str, &Encoding)] = &[
    ("ansi", encoding_rs::WINDOWS_1252),
    ("latin-1", encoding_rs::WINDOWS_1252),
    ("x-unknown", encoding_rs::WINDOWS_1252),
    ("unknown-8bit", encoding_rs::WINDOWS_1252),
    ("utf-8-sig", encoding_rs::UTF_8),
];

fn normalize(name: &str) -> String {
    name.trim().trim_matches('"').to_ascii_lowercase()
}

/// Extracts the codepage number from `cp1252`, `cp-1252`, `windows-1252` or `1252`.
fn codepage_digits(name: &str) -> Option<u16> {
    let rest = name
        .strip_prefix("windows")
        .or_else(|| name.strip_prefix("cp"))
        .unwrap_or(name);
    let digits = rest.trim_start_matches(['-', '_', ' ']);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn encoding_for_codepage(codepage: u16) -> Option<&'static Encoding> {
    let encoding = match codepage {
        437 | 850 | 1252 | 20127 | 28591 => encoding_rs::WINDOWS_1252,
        866 => encoding_rs::IBM866,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1200 => encoding_rs::UTF_16LE,
        1201 => encoding_rs::UTF_16BE,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 | 28599 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        20866 => encoding_rs::KOI8_R,
        21866 => encoding_rs::KOI8_U,
        28592 => encoding_rs::ISO_8859_2,
        28593 => encoding_rs::ISO_8859_3,
        28594 => encoding_rs::ISO_8859_4,
        28595 => encoding_rs::ISO_8859_5,
        28596 => encoding_rs::ISO_8859_6,
        28597 => encoding_rs::ISO_8859_7,
        28598 => encoding_rs::ISO_8859_8,
        28603 => encoding_rs::ISO_8859_13,
        28605 => encoding_rs::ISO_8859_15,
        50220 => encoding_rs::ISO_2022_JP,
        51932 => encoding_rs::EUC_JP,
        54936 => encoding_rs::GB18030,
        65001 => encoding_rs::UTF_8,
        _ => return None,
    };
    Some(encoding)
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
    use std::sync::Mutex;

    #[test]
    fn test_utf8_spellings() {
        let resolver = CharsetResolver::new();
        for name in ["utf8", "utf-8", "UTF-8", " utf-8 ", "\"utf-8\""] {
            assert_eq!(resolver.resolve(name).unwrap(), encoding_rs::UTF_8, "{name}");
        }
    }

    #[test]
    fn test_codepage_aliases_agree() {
        let resolver = CharsetResolver::new();
        let expected = resolver.resolve("windows-1254").unwrap();
        assert_eq!(resolver.resolve("cp-1254").unwrap(), expected);
        assert_eq!(resolver.resolve("Cp1254").unwrap(), expected);
        assert_eq!(resolver.resolve("1254").unwrap(), expected);
        assert_eq!(expected, encoding_rs::WINDOWS_1254);
    }

    #[test]
    fn test_cjk_codepages() {
        let resolver = CharsetResolver::new();
        assert_eq!(resolver.resolve("cp-1255").unwrap(), encoding_rs::WINDOWS_1255);
        assert_eq!(resolver.resolve("cp-950").unwrap(), encoding_rs::BIG5);
        assert_eq!(resolver.resolve("windows-950").unwrap(), encoding_rs::BIG5);
        assert_eq!(resolver.resolve("cp932").unwrap(), encoding_rs::SHIFT_JIS);
    }

    #[test]
    fn test_iso_8859_labels() {
        let resolver = CharsetResolver::new();
        assert_eq!(resolver.resolve("iso-8859-1").unwrap(), encoding_rs::WINDOWS_1252);
        assert_eq!(resolver.resolve("ISO-8859-9").unwrap(), encoding_rs::WINDOWS_1254);
        assert_eq!(resolver.resolve("iso-8859-13").unwrap(), encoding_rs::ISO_8859_13);
        assert_eq!(resolver.resolve("us-ascii").unwrap(), encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_unknown_charset_errors() {
        let resolver = CharsetResolver::new();
        let err = resolver.resolve("no-such-charset").unwrap_err();
        assert!(matches!(err, Error::UnknownCharset(name) if name == "no-such-charset"));
        assert!(resolver.resolve("cp99999").is_err());
    }

    #[test]
    fn test_custom_mapping_is_case_insensitive() {
        let resolver = CharsetResolver::new();
        resolver.add_mapping("ASCII DASCii", encoding_rs::WINDOWS_1252);
        assert_eq!(resolver.resolve("ascii dascii").unwrap(), encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_mapping_overrides_builtin_and_last_wins() {
        let resolver = CharsetResolver::new();
        resolver.add_mapping("iso-8859-1", encoding_rs::UTF_8);
        assert_eq!(resolver.resolve("ISO-8859-1").unwrap(), encoding_rs::UTF_8);
        resolver.add_mapping("iso-8859-1", encoding_rs::ISO_8859_2);
        assert_eq!(resolver.resolve("iso-8859-1").unwrap(), encoding_rs::ISO_8859_2);
    }

    #[test]
    fn test_fallback_hook_receives_name() {
        let resolver = CharsetResolver::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_hook = Arc::clone(&seen);
        resolver.set_fallback(move |name| {
            seen_by_hook.lock().unwrap().push(name.to_string());
            Some(encoding_rs::UTF_8)
        });

        assert_eq!(resolver.resolve("Bogus-Set").unwrap(), encoding_rs::UTF_8);
        assert_eq!(*seen.lock().unwrap(), vec!["bogus-set".to_string()]);

        resolver.clear_fallback();
        assert!(resolver.resolve("bogus-set").is_err());
    }

    #[test]
    fn test_fallback_not_called_for_known_names() {
        let resolver = CharsetResolver::new();
        resolver.set_fallback(|_| panic!("fallback must not run"));
        assert!(resolver.resolve("utf-8").is_ok());
    }

    #[test]
    fn test_global_is_shared() {
        let a = CharsetResolver::global();
        let b = CharsetResolver::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode(b"\xEF\xBB\xBFhi", encoding_rs::UTF_8), "hi");
        assert_eq!(decode(b"caf\xE9", encoding_rs::WINDOWS_1252), "café");
    }
}
