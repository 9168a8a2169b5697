//! `Content-Type` and `Content-Disposition` header values.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::params;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart"), lowercased.
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg"), lowercased.
    pub sub_type: String,
    /// Parameters keyed by lowercased name, values decoded.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// The content type assumed when a header is absent: `text/plain; charset=us-ascii`.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "us-ascii")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns `type/subtype`.
    #[must_use]
    pub fn media_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns a parameter by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns the name parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Checks if this is `message/rfc822`.
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.main_type == "message" && self.sub_type == "rfc822"
    }

    /// Parses a content type using the global charset resolver.
    ///
    /// # Errors
    ///
    /// See [`ContentType::parse_with`].
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_with(s, &ParserConfig::default())
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`. If the
    /// media type is malformed, the value is retried once with all
    /// whitespace outside quotes removed (`text / plain` is accepted).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] if no `type/subtype` can be found.
    pub fn parse_with(s: &str, config: &ParserConfig) -> Result<Self> {
        Self::parse_strict(s, config).or_else(|first| {
            let stripped = params::strip_whitespace(s);
            tracing::debug!(value = s, error = %first, "retrying content type without whitespace");
            Self::parse_strict(&stripped, config).map_err(|_| first)
        })
    }

    fn parse_strict(s: &str, config: &ParserConfig) -> Result<Self> {
        let parsed = params::parse(s, config.resolver());

        let (main_type, sub_type) = parsed
            .token
            .split_once('/')
            .map(|(main, sub)| (main.to_ascii_lowercase(), sub.to_ascii_lowercase()))
            .ok_or_else(|| Error::InvalidContentType(format!("missing subtype in {s:?}")))?;

        if !is_token(&main_type) || !is_token(&sub_type) {
            return Err(Error::InvalidContentType(format!(
                "malformed media type {:?}",
                parsed.token
            )));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters: parsed.parameters,
        })
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::text_plain()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        let mut keys: Vec<&String> = self.parameters.keys().collect();
        keys.sort();
        for key in keys {
            let value = &self.parameters[key];
            // Quote value if it contains special characters
            if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
                write!(f, "; {key}=\"{}\"", value.replace('"', "\\\""))?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

/// RFC 2045 token: non-empty, no whitespace, controls or tspecials.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii() && !c.is_ascii_control() && !" ()<>@,;:\\\"/[]?=".contains(c))
}

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentDisposition {
    /// Disposition type, lowercased (`inline`, `attachment`, ...).
    pub disposition_type: String,
    /// Suggested file name, decoded.
    pub file_name: Option<String>,
    /// Approximate size in bytes.
    pub size: Option<u64>,
    /// `creation-date` parameter.
    pub creation_date: Option<DateTime<Utc>>,
    /// `modification-date` parameter.
    pub modification_date: Option<DateTime<Utc>>,
    /// `read-date` parameter.
    pub read_date: Option<DateTime<Utc>>,
    /// Every parameter, including the ones above, keyed by lowercased name.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Returns true for `inline`.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition_type == "inline"
    }

    /// Returns true for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition_type == "attachment"
    }

    /// Parses a disposition using the global charset resolver.
    ///
    /// # Errors
    ///
    /// See [`ContentDisposition::parse_with`].
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_with(s, &ParserConfig::default())
    }

    /// Parses a `Content-Disposition` value.
    ///
    /// The file name comes from `filename*`, then `filename`, then `name`.
    /// Dates and sizes that cannot be understood are logged and left empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDisposition`] if the disposition type is missing.
    pub fn parse_with(s: &str, config: &ParserConfig) -> Result<Self> {
        let parsed = params::parse(s, config.resolver());
        let disposition_type = parsed.token.to_ascii_lowercase();
        if disposition_type.is_empty() {
            return Err(Error::InvalidDisposition(s.to_string()));
        }

        let parameters = parsed.parameters;
        let file_name = parameters
            .get("filename")
            .or_else(|| parameters.get("name"))
            .cloned();
        let size = parameters.get("size").and_then(|v| parse_size(v));
        let date = |key: &str| parameters.get(key).and_then(|v| disposition_date(v, config));

        Ok(Self {
            disposition_type,
            file_name,
            size,
            creation_date: date("creation-date"),
            modification_date: date("modification-date"),
            read_date: date("read-date"),
            parameters,
        })
    }
}

/// Parses sizes like `509`, `1.5KB` or `2 MB`.
fn parse_size(text: &str) -> Option<u64> {
    const UNITS: [(&str, f64); 5] = [
        ("TB", 1_099_511_627_776.0),
        ("GB", 1_073_741_824.0),
        ("MB", 1_048_576.0),
        ("KB", 1024.0),
        ("B", 1.0),
    ];

    let text = text.trim();
    let upper = text.to_ascii_uppercase();
    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(unit, mult)| upper.strip_suffix(unit).map(|n| (n.trim(), *mult)))
        .unwrap_or((text, 1.0));

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bytes = (value * multiplier).round() as u64;
            Some(bytes)
        }
        _ => {
            tracing::warn!(size = text, "ignoring unparseable disposition size");
            None
        }
    }
}

/// Parses a disposition date, retrying once with `GMT` spelled `+0000` and
/// hour `24` read as `00`.
fn disposition_date(text: &str, config: &ParserConfig) -> Option<DateTime<Utc>> {
    match config.parse_date(text) {
        Ok(date) => date,
        Err(first) => {
            let repaired = text.replace("GMT", "+0000").replace(" 24:", " 00:");
            match config.parse_date(&repaired) {
                Ok(date) => date,
                Err(_) => {
                    tracing::warn!(
                        date = text,
                        error = %first,
                        "ignoring invalid disposition date"
                    );
                    None
                }
            }
        }
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
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("text", "plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_default_is_us_ascii_text() {
        let ct = ContentType::default();
        assert_eq!(ct.media_type(), "text/plain");
        assert_eq!(ct.charset(), Some("us-ascii"));
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_media_type_is_lowercased() {
        let ct = ContentType::parse("Text/HTML; Charset=\"ISO-8859-1\"").unwrap();
        assert_eq!(ct.media_type(), "text/html");
        assert_eq!(ct.charset(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_name_without_space() {
        let ct = ContentType::parse("image/gif;name=\"gradient.gif\"").unwrap();
        assert_eq!(ct.media_type(), "image/gif");
        assert_eq!(ct.name(), Some("gradient.gif"));

        let ct = ContentType::parse("image/jpeg;name=\"Rejsebazar_Kbh(2).jpg\"").unwrap();
        assert_eq!(ct.name(), Some("Rejsebazar_Kbh(2).jpg"));
    }

    #[test]
    fn test_long_media_type() {
        let ct = ContentType::parse(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document; \
             name=\"Hej.docx\"",
        )
        .unwrap();
        assert_eq!(
            ct.media_type(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(ct.name(), Some("Hej.docx"));
    }

    #[test]
    fn test_unquoted_name() {
        let ct = ContentType::parse("text/plain; name=Til").unwrap();
        assert_eq!(ct.name(), Some("Til"));
    }

    #[test]
    fn test_boundary() {
        let ct = ContentType::parse(
            "multipart/mixed; \
             boundary=\"_004_76C5825B768EE04E99BD2EAC9C43507557EDD335B3server1hqcbbe_\"",
        )
        .unwrap();
        assert_eq!(
            ct.boundary(),
            Some("_004_76C5825B768EE04E99BD2EAC9C43507557EDD335B3server1hqcbbe_")
        );
    }

    #[test]
    fn test_continued_boundary() {
        let ct = ContentType::parse(
            "multipart/report; report-type=delivery-status; \
             boundary*0=1804289383_1288411300_549365113_21474836; \
             boundary*1=47_bda2385.bisx.prod.on.blackberry",
        )
        .unwrap();
        assert_eq!(
            ct.boundary(),
            Some("1804289383_1288411300_549365113_2147483647_bda2385.bisx.prod.on.blackberry")
        );
    }

    #[test]
    fn test_encoded_word_name() {
        let ct = ContentType::parse(
            "application/msword; \
             name=\"=?Windows-1252?Q?revideret_forel=F8big_dagsorden_090110_version_2.doc?=\"",
        )
        .unwrap();
        assert_eq!(ct.name(), Some("revideret foreløbig dagsorden 090110 version 2.doc"));
    }

    #[test]
    fn test_three_encoded_words_in_name() {
        let ct = ContentType::parse(
            "text/plain; name=\"=?ISO-8859-1?Q?Test_fil_med_et_langt_navn_som_skal_forts=E6tte?= \
             =?ISO-8859-1?Q?s_og_nu_med_?= =?ISO-8859-1?Q?=C6=D8=C5.txt?=\"",
        )
        .unwrap();
        assert_eq!(
            ct.name(),
            Some("Test fil med et langt navn som skal fortsættes og nu med ÆØÅ.txt")
        );
    }

    #[test]
    fn test_extended_name() {
        let ct = ContentType::parse("application/pdf; name*=ISO-8859-1''Ans%E6ttelseskontrakt.pdf")
            .unwrap();
        assert_eq!(ct.name(), Some("Ansættelseskontrakt.pdf"));
    }

    #[test]
    fn test_rfc2231_title() {
        let ct = ContentType::parse(
            "application/x-stuff; title*0*=us-ascii'en'This%20is%20even%20more%20; \
             title*1*=%2A%2A%2Afun%2A%2A%2A%20; title*2=\"isn't it!\"",
        )
        .unwrap();
        assert_eq!(ct.parameter("title"), Some("This is even more ***fun*** isn't it!"));
    }

    #[test]
    fn test_spaces_around_equals() {
        let ct = ContentType::parse("text/plain; charset = \"us-ascii\"").unwrap();
        assert_eq!(ct.charset(), Some("us-ascii"));
    }

    #[test]
    fn test_trailing_semicolon() {
        for text in [
            "text/plain; charset=\"iso-8859-1\";",
            "text/plain; charset=\"iso-8859-1\"; ",
        ] {
            let ct = ContentType::parse(text).unwrap();
            assert_eq!(ct.charset(), Some("iso-8859-1"));
            assert_eq!(ct.parameters.len(), 1);
        }
    }

    #[test]
    fn test_semicolon_in_quoted_name() {
        let ct = ContentType::parse("application/msword; name=\"NUMMER; 251478.doc\"").unwrap();
        assert_eq!(ct.name(), Some("NUMMER; 251478.doc"));
    }

    #[test]
    fn test_whitespace_retry() {
        let ct = ContentType::parse("text / plain; charset=utf-8").unwrap();
        assert_eq!(ct.media_type(), "text/plain");
    }

    #[test]
    fn test_invalid_content_type() {
        assert!(matches!(ContentType::parse("garbage"), Err(Error::InvalidContentType(_))));
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("text/").is_err());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("charset", "utf-8")
            .with_parameter("name", "a b.txt");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8; name=\"a b.txt\"");
    }

    #[test]
    fn test_disposition_dates_and_size() {
        let cd = ContentDisposition::parse(
            "attachment; filename=genome.jpeg; modification-date=\"Wed, 12 February 1997 16:29:51 \
             -0500\"; creation-date=\"Tue, 11 February 1997 15:29:51 -0400\"; read-date=\"Tue, 11 \
             February 1997 16:29:52 -0500\"; size=509;",
        )
        .unwrap();
        assert!(!cd.is_inline());
        assert!(cd.is_attachment());
        assert_eq!(cd.file_name.as_deref(), Some("genome.jpeg"));
        assert_eq!(cd.modification_date, Some(utc(1997, 2, 12, 21, 29, 51)));
        assert_eq!(cd.creation_date, Some(utc(1997, 2, 11, 19, 29, 51)));
        assert_eq!(cd.read_date, Some(utc(1997, 2, 11, 21, 29, 52)));
        assert_eq!(cd.size, Some(509));
    }

    #[test]
    fn test_disposition_inline_with_positive_offset() {
        let cd = ContentDisposition::parse(
            "inline; filename=test.pdf; creation-date=\"Wed, 12 Oct 2011 11:08:54 +0100\"; \
             size=104953;",
        )
        .unwrap();
        assert!(cd.is_inline());
        assert_eq!(cd.creation_date, Some(utc(2011, 10, 12, 10, 8, 54)));
        assert_eq!(cd.size, Some(104953));
    }

    #[test]
    fn test_disposition_quoted_size_and_gmt() {
        let cd = ContentDisposition::parse(
            "attachment; filename=\"report.pdf\"; size=\"104710\"; creation-date=\"Mon, 04 Feb \
             2013 09:46:28 GMT\"; modification-date=\"Mon, 04 Feb 2013 09:46:28 GMT\"",
        )
        .unwrap();
        assert_eq!(cd.size, Some(104710));
        assert_eq!(cd.creation_date, Some(utc(2013, 2, 4, 9, 46, 28)));
        assert_eq!(cd.modification_date, Some(utc(2013, 2, 4, 9, 46, 28)));
    }

    #[test]
    fn test_disposition_hour_24_repaired() {
        let cd = ContentDisposition::parse(
            "attachment; filename=a.txt; creation-date=\"Mon, 04 Feb 2013 24:10:00 GMT\"",
        )
        .unwrap();
        assert_eq!(cd.creation_date, Some(utc(2013, 2, 4, 0, 10, 0)));
    }

    #[test]
    fn test_disposition_bad_date_ignored() {
        let cd = ContentDisposition::parse("attachment; read-date=\"Mon, 04 Feb 2013 99:99:99\"")
            .unwrap();
        assert_eq!(cd.read_date, None);
        assert_eq!(cd.parameters.len(), 1);
    }

    #[test]
    fn test_disposition_encoded_word_filenames() {
        let cd = ContentDisposition::parse(
            "attachment; filename=\"=?utf-8?B?w5huc2tlIGluZGvDuGJzbGlzdGUuZG9j?=\"",
        )
        .unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("Ønske indkøbsliste.doc"));

        let cd = ContentDisposition::parse(
            "attachment; \
             filename=\"=?iso-8859-1?Q?Br=F8drenes_Jagtklub_-_Referat_af_generalforsamling.doc?=\"",
        )
        .unwrap();
        assert_eq!(
            cd.file_name.as_deref(),
            Some("Brødrenes Jagtklub - Referat af generalforsamling.doc")
        );
    }

    #[test]
    fn test_disposition_rfc2231_filenames() {
        let cd = ContentDisposition::parse(
            "attachment; filename*=ISO-8859-1''%D8%6E%73%6B%65%6C%69%73%74%65%2E%70%64%66",
        )
        .unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("Ønskeliste.pdf"));

        let cd =
            ContentDisposition::parse("attachment; filename*=ISO-8859-1''Ans%E6ttelseskontrakt.pdf")
                .unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("Ansættelseskontrakt.pdf"));

        let cd =
            ContentDisposition::parse("attachment;\r\n\tfilename*=\"utf-8''foobar.jpg\"").unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("foobar.jpg"));
    }

    #[test]
    fn test_disposition_continued_filename() {
        let cd = ContentDisposition::parse(
            "attachment; filename*0=\"very long text document name is here to test if we can \
             parse\"; filename*1=\" continuation in the name in a header.txt\"",
        )
        .unwrap();
        assert_eq!(
            cd.file_name.as_deref(),
            Some(
                "very long text document name is here to test if we can parse \
                 continuation in the name in a header.txt"
            )
        );
    }

    #[test]
    fn test_disposition_continued_encoded_filename() {
        let cd = ContentDisposition::parse(
            "attachment; filename*0*=ISO-8859-1''Test%20fil%20med%20et%20langt%20navn%20som; \
             filename*1*=%20skal%20forts%E6ttes; filename*2*=%20og%20nu%20med%20%C6%D8%C5.txt",
        )
        .unwrap();
        assert_eq!(
            cd.file_name.as_deref(),
            Some("Test fil med et langt navn som skal fortsættes og nu med ÆØÅ.txt")
        );
    }

    #[test]
    fn test_extended_filename_wins() {
        let cd = ContentDisposition::parse(
            "attachment; filename=\"fallback.jpg\"; filename*=utf-8''transf%C2%AA.jpg",
        )
        .unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("transfª.jpg"));
    }

    #[test]
    fn test_filename_case_insensitive_and_name_fallback() {
        let cd = ContentDisposition::parse("attachment; Filename=\"test.csv\"").unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("test.csv"));

        let cd = ContentDisposition::parse("attachment; name=\"only-name.txt\"").unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("only-name.txt"));

        let cd =
            ContentDisposition::parse("attachment; name=\"a.txt\"; filename=\"b.txt\"").unwrap();
        assert_eq!(cd.file_name.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_unknown_parameters_kept() {
        let cd = ContentDisposition::parse("inline; x-custom=\"yes\"").unwrap();
        assert_eq!(cd.parameters["x-custom"], "yes");
        assert_eq!(cd.file_name, None);
    }

    #[test]
    fn test_missing_disposition_type() {
        assert!(matches!(
            ContentDisposition::parse("; filename=a.txt"),
            Err(Error::InvalidDisposition(_))
        ));
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("509"), Some(509));
        assert_eq!(parse_size("2KB"), Some(2048));
        assert_eq!(parse_size("1.5 MB"), Some(1_572_864));
        assert_eq!(parse_size("10b"), Some(10));
        assert_eq!(parse_size("1GB"), Some(1_073_741_824));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("-1"), None);
    }
}
