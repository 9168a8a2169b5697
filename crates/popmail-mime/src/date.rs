//! RFC 2822/5322 date parsing.
//!
//! Mail dates are written by every kind of software and the grammar is
//! applied loosely. The parser strips comments (nested ones too), locates a
//! `day month year hh:mm[:ss]` substring anywhere in the text, and then
//! applies the last whitespace-separated token as the zone.
//!
//! Two outcomes are kept apart:
//! - no date-like text at all is `Ok(None)`;
//! - a date whose fields are out of range (minute 77, day 43) is an error.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use regex::Regex;

use crate::error::{Error, Result};

#[allow(clippy::expect_used)] // literal pattern
static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d\d?) (.+) (\d\d\d\d|\d\d) (\d?\d):(\d?\d)(?::(\d?\d))?")
        .expect("date pattern compiles")
});

#[allow(clippy::expect_used)] // literal pattern
static DASHED_DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d\d?)-([A-Za-z]+)-(\d\d\d\d|\d\d) (\d?\d):(\d?\d)(?::(\d?\d))?")
        .expect("dashed date pattern compiles")
});

/// `Thu Nov 21 09:55:06 1997 (PST)` as written by ctime-style mailers.
#[allow(clippy::expect_used)] // literal pattern
static ASCTIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"^\s*([A-Za-z]{3}),?\s+([A-Za-z]{3,})\s+(\d{1,2})\s+",
            r"(\d{1,2}:\d{1,2}(?::\d{1,2})?)\s+(\d{4})",
            r"(?:\s+\(?([A-Za-z]+|[+-]\d{4})\)?)?\s*$",
        ),
    )
    .expect("asctime pattern compiles")
});

#[allow(clippy::expect_used)] // literal pattern
static NUMERIC_ZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-])(\d\d)(\d\d)").expect("zone pattern compiles"));

/// Parses a date header value into a UTC instant.
///
/// Returns `Ok(None)` when no date can be located in `text`. A missing or
/// unknown zone is treated as `-0000` (UTC).
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] when a date was located but a field is out
/// of range or the month name is not recognised.
pub fn parse_date(text: &str) -> Result<Option<DateTime<Utc>>> {
    parse_date_with_formats(text, &[])
}

/// Like [`parse_date`], but first tries each `chrono` format in `formats`
/// against the normalised text with any trailing zone token removed.
///
/// # Errors
///
/// See [`parse_date`].
pub fn parse_date_with_formats(text: &str, formats: &[String]) -> Result<Option<DateTime<Utc>>> {
    let rewritten = rewrite_asctime(text);
    let normalized = normalize(&rewritten);

    if let Some(local) = try_custom_formats(&normalized, formats) {
        return Ok(Some(apply_zone(local, &normalized)));
    }

    let Some(local) = locate(&normalized)? else {
        tracing::debug!(input = text, "no date found");
        return Ok(None);
    };

    check_day_name(&local, &normalized);
    Ok(Some(apply_zone(local, &normalized)))
}

/// Removes comments, collapses whitespace and tightens `hh : mm`.
fn normalize(text: &str) -> String {
    let stripped = strip_comments(text);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(" : ", ":").replace(" :", ":").replace(": ", ":")
}

/// Drops parenthesised comments, honouring nesting.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out
}

fn rewrite_asctime(text: &str) -> String {
    let Some(caps) = ASCTIME.captures(text) else {
        return text.to_string();
    };
    let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());

    let mut rewritten = format!(
        "{}, {} {} {} {}",
        field(1),
        field(3),
        field(2),
        field(5),
        field(4)
    );
    if let Some(zone) = caps.get(6) {
        rewritten.push(' ');
        rewritten.push_str(zone.as_str());
    }
    rewritten
}

fn try_custom_formats(normalized: &str, formats: &[String]) -> Option<NaiveDateTime> {
    if formats.is_empty() {
        return None;
    }

    let without_zone = match normalized.rsplit_once(' ') {
        Some((head, last)) if looks_like_zone(last) => head,
        _ => normalized,
    };

    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(without_zone, format)
            .or_else(|_| NaiveDateTime::parse_from_str(normalized, format))
            .ok()
    })
}

fn looks_like_zone(token: &str) -> bool {
    NUMERIC_ZONE.is_match(token) || named_zone_offset(token).is_some()
}

fn locate(normalized: &str) -> Result<Option<NaiveDateTime>> {
    let caps = match DATE_TIME.captures(normalized) {
        Some(caps) => caps,
        None => match DASHED_DATE_TIME.captures(normalized) {
            Some(caps) => caps,
            None => return Ok(None),
        },
    };

    let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());
    let located = caps.get(0).map_or(normalized, |m| m.as_str());
    let invalid = |reason: &str| Error::invalid_date(located, reason);

    let day: u32 = field(1).parse().map_err(|_| invalid("bad day"))?;
    let month = month_number(field(2)).ok_or_else(|| invalid("unknown month"))?;
    let year = expand_year(field(3)).ok_or_else(|| invalid("bad year"))?;
    let hour: u32 = field(4).parse().map_err(|_| invalid("bad hour"))?;
    let minute: u32 = field(5).parse().map_err(|_| invalid("bad minute"))?;
    let second: u32 = match caps.get(6) {
        Some(m) => m.as_str().parse().map_err(|_| invalid("bad second"))?,
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| invalid("day out of range for month"))?;
    if hour > 23 {
        return Err(invalid("hour out of range"));
    }
    if minute > 59 {
        return Err(invalid("minute out of range"));
    }
    let time = match second {
        0..=59 => NaiveTime::from_hms_opt(hour, minute, second),
        // Leap second
        60 => NaiveTime::from_hms_milli_opt(hour, minute, 59, 1_000),
        _ => None,
    }
    .ok_or_else(|| invalid("second out of range"))?;

    Ok(Some(NaiveDateTime::new(date, time)))
}

/// Maps the month part of the located date to 1..=12.
///
/// Only the first three letters count, so `Feb`, `February` and `FEB.` all
/// work. The part may carry extra words when the grammar matched loosely.
fn month_number(text: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];

    let word = text.split([' ', '-']).find(|w| !w.is_empty())?;
    let prefix = word.get(..3)?.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .and_then(|i| u32::try_from(i + 1).ok())
}

/// Two-digit years follow RFC 5322: 00-49 are 20xx, 50-99 are 19xx.
fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    Some(match (text.len(), year) {
        (2, 0..=49) => year + 2000,
        (2, _) => year + 1900,
        _ => year,
    })
}

fn check_day_name(local: &NaiveDateTime, normalized: &str) {
    let Some((name, _)) = normalized.split_once(',') else {
        return;
    };
    if name.len() != 3 {
        return;
    }

    let actual = local.weekday().to_string();
    if !name.eq_ignore_ascii_case(&actual) {
        tracing::debug!(
            input = normalized,
            stated = name,
            actual = %actual,
            "day name does not match date"
        );
    }
}

/// Converts the located local time to UTC using the last token of the text.
fn apply_zone(local: NaiveDateTime, normalized: &str) -> DateTime<Utc> {
    let token = normalized.rsplit(' ').next().unwrap_or_default();

    let offset_minutes = zone_offset_minutes(token).unwrap_or_else(|| {
        tracing::warn!(input = normalized, "no time zone in date, assuming -0000");
        0
    });

    let utc = TimeDelta::try_minutes(offset_minutes)
        .and_then(|delta| local.checked_sub_signed(delta))
        .unwrap_or(local);
    utc.and_utc()
}

/// Offset east of UTC in minutes, if `token` names a zone.
fn zone_offset_minutes(token: &str) -> Option<i64> {
    if let Some(hours) = named_zone_offset(token) {
        return Some(hours * 60);
    }

    let caps = NUMERIC_ZONE.captures(token)?;
    let sign = if caps.get(1)?.as_str() == "-" { -1 } else { 1 };
    let hours: i64 = caps.get(2)?.as_str().parse().ok()?;
    let minutes: i64 = caps.get(3)?.as_str().parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// RFC 822 named and military zones, in hours east of UTC.
fn named_zone_offset(token: &str) -> Option<i64> {
    let upper = token.to_ascii_uppercase();
    let offset = match upper.as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        "MSK" => 3,
        letter if letter.len() == 1 => {
            let c = letter.as_bytes()[0];
            match c {
                b'A'..=b'I' => i64::from(c - b'A') + 1,
                b'K'..=b'M' => i64::from(c - b'K') + 10,
                b'N'..=b'Y' => -(i64::from(c - b'N') + 1),
                _ => return None,
            }
        }
        _ => return None,
    };
    Some(offset)
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
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn parse(text: &str) -> DateTime<Utc> {
        parse_date(text).unwrap().unwrap()
    }

    #[test]
    fn test_negative_offset() {
        assert_eq!(parse("Fri, 21 Nov 1997 09:55:06 -0600"), utc(1997, 11, 21, 15, 55, 6));
    }

    #[test]
    fn test_positive_offset() {
        assert_eq!(parse("Tue, 1 Jul 2003 10:52:37 +0200"), utc(2003, 7, 1, 8, 52, 37));
    }

    #[test]
    fn test_offset_with_minutes() {
        assert_eq!(parse("20 Apr 1988 18:10 +0133"), utc(1988, 4, 20, 16, 37, 0));
    }

    #[test]
    fn test_nested_comments() {
        assert_eq!(
            parse("Fri, 21 Nov (foo (bar (baz) ) ) 1997 09:55:06 -0600"),
            utc(1997, 11, 21, 15, 55, 6)
        );
    }

    #[test]
    fn test_comments_and_whitespace_everywhere() {
        assert_eq!(
            parse("Fri, 21 Nov 1997 09(comment):   55  :  06 -0600"),
            utc(1997, 11, 21, 15, 55, 6)
        );
        assert_eq!(
            parse(
                "(comment)  (comment)  20(comment)  \t Apr(comment) 1988(comment) \t18(comment) \
                 :(comment)  \t 10(comment)  \t  +0133 (comment)  \t"
            ),
            utc(1988, 4, 20, 16, 37, 0)
        );
    }

    #[test]
    fn test_trailing_zone_comment() {
        assert_eq!(parse("Wed, 9 May 2007 12:39:13 -0500 (CDT)"), utc(2007, 5, 9, 17, 39, 13));
    }

    #[test]
    fn test_two_digit_year_and_gmt() {
        assert_eq!(parse("21 Nov 97 09:55:06 GMT"), utc(1997, 11, 21, 9, 55, 6));
        assert_eq!(parse("21 Nov 03 09:55:06 GMT"), utc(2003, 11, 21, 9, 55, 6));
    }

    #[test]
    fn test_zone_glued_to_time() {
        assert_eq!(parse("19 Jan 2011 13:24:54+0000"), utc(2011, 1, 19, 13, 24, 54));
    }

    #[test]
    fn test_single_digit_time_fields() {
        assert_eq!(parse("Tue, 8 Mar 2011 7:24:27 +0000"), utc(2011, 3, 8, 7, 24, 27));
        assert_eq!(parse("Tue, 8 Mar 2011 07:4:27 +0000"), utc(2011, 3, 8, 7, 4, 27));
        assert_eq!(parse("Tue, 8 Mar 2011 07:24:7 +0000"), utc(2011, 3, 8, 7, 24, 7));
    }

    #[test]
    fn test_missing_or_garbage_zone_is_utc() {
        assert_eq!(parse("Tue, 08 Mar 2011 07:24:27 0"), utc(2011, 3, 8, 7, 24, 27));
        assert_eq!(parse("Tue, 08 Mar 2011 07:24:27"), utc(2011, 3, 8, 7, 24, 27));
        assert_eq!(parse("Tue, 08 Mar 2011 07:24:27 J"), utc(2011, 3, 8, 7, 24, 27));
    }

    #[test]
    fn test_z_equals_plus_zero() {
        assert_eq!(
            parse("Wed, 9 May 2007 12:39:13 Z"),
            parse("Wed, 9 May 2007 12:39:13 +0000")
        );
    }

    #[test]
    fn test_named_zones() {
        let base = utc(2007, 5, 9, 12, 0, 0);
        assert_eq!(parse("9 May 2007 12:00:00 EST"), base + TimeDelta::hours(5));
        assert_eq!(parse("9 May 2007 12:00:00 EDT"), base + TimeDelta::hours(4));
        assert_eq!(parse("9 May 2007 12:00:00 PST"), base + TimeDelta::hours(8));
        assert_eq!(parse("9 May 2007 12:00:00 MSK"), base - TimeDelta::hours(3));
        assert_eq!(parse("9 May 2007 12:00:00 UT"), base);
    }

    #[test]
    fn test_military_zones() {
        let base = utc(2007, 5, 9, 12, 0, 0);
        assert_eq!(parse("9 May 2007 12:00:00 A"), base - TimeDelta::hours(1));
        assert_eq!(parse("9 May 2007 12:00:00 M"), base - TimeDelta::hours(12));
        assert_eq!(parse("9 May 2007 12:00:00 N"), base + TimeDelta::hours(1));
        assert_eq!(parse("9 May 2007 12:00:00 Y"), base + TimeDelta::hours(12));
    }

    #[test]
    fn test_wrong_day_name_is_ignored() {
        assert_eq!(parse("Sun, 08 Mar 2011 16:16:13 -0000"), utc(2011, 3, 8, 16, 16, 13));
    }

    #[test]
    fn test_full_month_names() {
        assert_eq!(
            parse("Wed, 12 February 1997 16:29:51 -0500"),
            utc(1997, 2, 12, 21, 29, 51)
        );
    }

    #[test]
    fn test_dashed_date() {
        assert_eq!(parse("21-Nov-1997 09:55:06 +0000"), utc(1997, 11, 21, 9, 55, 6));
    }

    #[test]
    fn test_asctime_order() {
        assert_eq!(parse("Thu Nov 21 09:55:06 1997 (PST)"), utc(1997, 11, 21, 17, 55, 6));
        assert_eq!(parse("Thu Nov 21 09:55:06 1997"), utc(1997, 11, 21, 9, 55, 6));
    }

    #[test]
    fn test_no_date_is_none() {
        assert!(parse_date("foo").unwrap().is_none());
        assert!(parse_date("").unwrap().is_none());
    }

    #[test]
    fn test_invalid_fields_are_errors() {
        assert!(matches!(
            parse_date("Sun, 03 Mar 2011 00:77:00 -0000"),
            Err(Error::InvalidDate { .. })
        ));
        assert!(parse_date("Sun, 03 Mar 2011 77:00:00 -0000").is_err());
        assert!(parse_date("Sun, 43 Mar 2011 00:00:00 -0000").is_err());
        assert!(parse_date("Sun, 03 Foo 2011 00:00:00 -0000").is_err());
    }

    #[test]
    fn test_custom_formats_first() {
        let formats = vec!["%Y-%m-%d %H:%M:%S".to_string()];
        let parsed = parse_date_with_formats("2011-03-08 07:24:27 +0100", &formats)
            .unwrap()
            .unwrap();
        assert_eq!(parsed, utc(2011, 3, 8, 6, 24, 27));
    }

    #[test]
    fn test_strip_comments_unbalanced() {
        assert_eq!(strip_comments("a (b (c) d"), "a ");
        assert_eq!(strip_comments("a ) b"), "a ) b");
    }

    proptest! {
        #[test]
        fn never_panics(text in "\\PC*") {
            let _ = parse_date(&text);
        }
    }
}
