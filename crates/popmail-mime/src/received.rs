//! `Received` trace headers (RFC 5321 §4.4).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::ParserConfig;

/// One parsed `Received` header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Received {
    /// The date after the last `;`, if present and understood.
    pub date: Option<DateTime<Utc>>,
    /// Clause values keyed by clause name (`from`, `by`, `with`, `id`, `for`, ...).
    ///
    /// A value is the word after the name plus any comments following it,
    /// e.g. `from` = `mail.example.com ([10.0.0.1])`.
    pub names: HashMap<String, String>,
    /// The unparsed header value.
    pub raw: String,
}

impl Received {
    /// Parses a header value using the default configuration.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::parse_with(value, &ParserConfig::default())
    }

    /// Parses a header value.
    ///
    /// Never fails. A date that cannot be understood is logged and left empty.
    #[must_use]
    pub fn parse_with(value: &str, config: &ParserConfig) -> Self {
        let (clauses, date) = match value.rfind(';') {
            Some(pos) => (&value[..pos], Some(&value[pos + 1..])),
            None => (value, None),
        };

        let date = date.and_then(|text| match config.parse_date(text) {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(date = text, error = %e, "ignoring invalid Received date");
                None
            }
        });

        Self {
            date,
            names: parse_clauses(clauses),
            raw: value.to_string(),
        }
    }
}

enum Item<'a> {
    Word(&'a str),
    Comment(&'a str),
}

/// Pairs each clause name with the following word and its trailing comments.
fn parse_clauses(text: &str) -> HashMap<String, String> {
    let items = tokenize(text);
    let mut names = HashMap::new();
    let mut iter = items.iter().peekable();

    while let Some(item) = iter.next() {
        // A comment where a name belongs has no clause to attach to.
        let Item::Word(name) = *item else { continue };
        let Some(word) = iter.find_map(|item| match item {
            Item::Word(word) => Some(*word),
            Item::Comment(_) => None,
        }) else {
            break;
        };

        let mut value = word.to_string();
        while let Some(Item::Comment(comment)) = iter.peek() {
            value.push(' ');
            value.push_str(comment);
            iter.next();
        }

        if names.contains_key(name) {
            tracing::debug!(clause = name, "repeated Received clause ignored");
        } else {
            names.insert(name.to_string(), value);
        }
    }

    names
}

/// Splits into whitespace-separated words and balanced `( ... )` comments.
fn tokenize(text: &str) -> Vec<Item<'_>> {
    let mut items = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut end = text.len();
        if c == '(' {
            let mut depth = 0usize;
            for (i, c) in chars.by_ref() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            end = i + 1;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            items.push(Item::Comment(&text[start..end]));
        } else {
            while let Some(&(i, c)) = chars.peek() {
                if c.is_whitespace() {
                    end = i;
                    break;
                }
                chars.next();
            }
            items.push(Item::Word(&text[start..end]));
        }
    }

    items
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

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    #[test]
    fn test_date_only() {
        let input = "; Fri, 21 Nov 1997 09:55:06 -0600";
        let received = Received::parse(input);
        assert_eq!(received.date, utc(1997, 11, 21, 15, 55, 6));
        assert_eq!(received.raw, input);
        assert!(received.names.is_empty());

        let received = Received::parse("; Tue, 1 Jul 2003 10:52:37 +0200");
        assert_eq!(received.date, utc(2003, 7, 1, 8, 52, 37));
    }

    #[test]
    fn test_from_and_by() {
        let received = Received::parse("from foo by bar; Fri, 21 Nov 1997 09:55:06 -0600");
        assert_eq!(received.names["from"], "foo");
        assert_eq!(received.names["by"], "bar");

        let received =
            Received::parse("by some.example.openpop.net; Fri, 21 Nov 1997 09:55:06 -0600");
        assert_eq!(received.names["by"], "some.example.openpop.net");
    }

    #[test]
    fn test_value_with_comment() {
        let received = Received::parse(
            "from testing.mail.com ([216.34.181.88:10057] helo=lists.sourceforge.net); Fri, 21 Nov \
             1997 09:55:06 -0600",
        );
        assert_eq!(
            received.names["from"],
            "testing.mail.com ([216.34.181.88:10057] helo=lists.sourceforge.net)"
        );
    }

    #[test]
    fn test_semicolon_in_comment() {
        let received = Received::parse(
            "from foo (;Tue, 1 Jul 2003 10:52:37 +0200); Fri, 21 Nov 1997 09:55:06 +0000",
        );
        assert_eq!(received.names["from"], "foo (;Tue, 1 Jul 2003 10:52:37 +0200)");
        assert_eq!(received.date, utc(1997, 11, 21, 9, 55, 6));
    }

    #[test]
    fn test_full_line() {
        let received = Received::parse(
            "from sog-mx-2.v43.ch3.sourceforge.com ([172.29.43.192] helo=mx.sourceforge.net) \
             by sfs-ml-3.v29.ch3.sourceforge.com \
             with esmtp (Exim 4.76) (envelope-from <thefeds@mail.dk>) \
             id 1Qcvg8-0004Kr-17 \
             for hpop-users@lists.sourceforge.net; Sat, 02 Jul 2011 08:35:52 +0000",
        );
        assert_eq!(
            received.names["from"],
            "sog-mx-2.v43.ch3.sourceforge.com ([172.29.43.192] helo=mx.sourceforge.net)"
        );
        assert_eq!(received.names["by"], "sfs-ml-3.v29.ch3.sourceforge.com");
        assert_eq!(
            received.names["with"],
            "esmtp (Exim 4.76) (envelope-from <thefeds@mail.dk>)"
        );
        assert_eq!(received.names["id"], "1Qcvg8-0004Kr-17");
        assert_eq!(received.names["for"], "hpop-users@lists.sourceforge.net");
        assert_eq!(received.names.len(), 5);
        assert_eq!(received.date, utc(2011, 7, 2, 8, 35, 52));
    }

    #[test]
    fn test_no_space_before_date_and_zone_comment() {
        let received = Received::parse(
            "from smtp.nfit.au.dk ([10.19.9.11]) by mbe1i (Cyrus v2.3.16-Invoca-RPM-2.3.16-3) with \
             LMTPA;Tue, 05 Jul 2011 11:58:11 +0200",
        );
        assert_eq!(received.names["by"], "mbe1i (Cyrus v2.3.16-Invoca-RPM-2.3.16-3)");
        assert_eq!(received.names["with"], "LMTPA");
        assert_eq!(received.names.len(), 3);
        assert_eq!(received.date, utc(2011, 7, 5, 9, 58, 11));

        let received = Received::parse(
            "from ymir.adm.au.dk ([10.60.1.18]) by ns2.au.dk (8.13.7+Sun/8.12.5) with ESMTP id \
             p659boKa018808; Tue, 5 Jul 2011 11:38:04 +0200 (MEST)",
        );
        assert_eq!(received.names["id"], "p659boKa018808");
        assert_eq!(received.date, utc(2011, 7, 5, 9, 38, 4));
    }

    #[test]
    fn test_excessive_whitespace() {
        let received = Received::parse(
            "from fep26 ([80.160.76.230]) by fep34.mail.dk          (InterMail vM.8.01.04.07 \
             201-2260-137-119-20110503) with ESMTP          id \
             <20110706105008.PZHJ18594.fep34.mail.dk@fep26>          for <thefeds@mail.dk>; Wed, 6 \
             Jul 2011 12:50:08 +0200",
        );
        assert_eq!(
            received.names["by"],
            "fep34.mail.dk (InterMail vM.8.01.04.07 201-2260-137-119-20110503)"
        );
        assert_eq!(received.names["id"], "<20110706105008.PZHJ18594.fep34.mail.dk@fep26>");
        assert_eq!(received.names["for"], "<thefeds@mail.dk>");
        assert_eq!(received.names.len(), 5);
    }

    #[test]
    fn test_many_comments() {
        let received = Received::parse(
            "from [189.7.13.40] (helo=AlexandrePC) by insvr1018.insite.com.br with esmtpsa \
             (TLSv1:AES256-SHA:256) (Exim 4.69) (envelope-from <alexandre@vetorjoinville.com.br>) \
             id 1QIUsX-0007Ki-6q for hpop-users@lists.sourceforge.net; Mon, 30 May 2011 15:48:58 \
             +0200",
        );
        assert_eq!(received.names["from"], "[189.7.13.40] (helo=AlexandrePC)");
        assert_eq!(
            received.names["with"],
            "esmtpsa (TLSv1:AES256-SHA:256) (Exim 4.69) (envelope-from \
             <alexandre@vetorjoinville.com.br>)"
        );
        assert_eq!(received.names.len(), 5);
    }

    #[test]
    fn test_leading_comment_skipped() {
        let received = Received::parse(
            "(from apache@localhost) by ip6.nabto.com (8.13.8/8.13.8/Submit) id o937M53u009287; \
             Sun, 3 Oct 2010 09:22:05 +0200",
        );
        assert!(!received.names.contains_key("from"));
        assert_eq!(received.names["by"], "ip6.nabto.com (8.13.8/8.13.8/Submit)");
        assert_eq!(received.names["id"], "o937M53u009287");
        assert_eq!(received.names.len(), 2);
        assert_eq!(received.date, utc(2010, 10, 3, 7, 22, 5));
    }

    #[test]
    fn test_no_date() {
        let received = Received::parse("from 178.88.30.104 by rms-us011.v300.gmx.net with HTTP");
        assert_eq!(received.date, None);
        assert_eq!(received.names["from"], "178.88.30.104");
        assert_eq!(received.names["by"], "rms-us011.v300.gmx.net");
        assert_eq!(received.names["with"], "HTTP");
    }

    #[test]
    fn test_invalid_date_ignored() {
        let received = Received::parse("from a; 45 Foo 2011 10:00:00 +0000");
        assert_eq!(received.date, None);
        assert_eq!(received.names["from"], "a");
    }

    #[test]
    fn test_nested_comment() {
        let received = Received::parse("from a (x (y) z) by b");
        assert_eq!(received.names["from"], "a (x (y) z)");
        assert_eq!(received.names["by"], "b");
    }
}
