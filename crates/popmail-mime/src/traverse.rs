//! Depth-first queries over a [`MessagePart`] tree.
//!
//! A [`PartVisitor`] answers for each leaf and merges the answers of a
//! multipart node's children, left to right. Multipart nodes themselves are
//! never offered to `visit_leaf`.
//!
//! The media-type queries are different: they test every node in pre-order,
//! containers included, so `multipart/alternative` can be found too.

use crate::part::MessagePart;

/// A read-only query over a part tree.
pub trait PartVisitor<'a> {
    /// The answer type.
    type Output;

    /// Answers for a single leaf.
    fn visit_leaf(&mut self, part: &'a MessagePart) -> Self::Output;

    /// Combines the answers of a multipart node's children, in order.
    fn merge(&mut self, answers: Vec<Self::Output>) -> Self::Output;
}

/// Runs `visitor` over the tree rooted at `part`.
pub fn traverse<'a, V: PartVisitor<'a>>(part: &'a MessagePart, visitor: &mut V) -> V::Output {
    if part.is_multipart() {
        let answers = part
            .children()
            .iter()
            .map(|child| traverse(child, visitor))
            .collect();
        visitor.merge(answers)
    } else {
        visitor.visit_leaf(part)
    }
}

/// Collects every leaf accepted by a predicate.
pub struct FindAll<F> {
    predicate: F,
}

impl<F> FindAll<F>
where
    F: FnMut(&MessagePart) -> bool,
{
    /// Creates a collector for leaves matching `predicate`.
    #[must_use]
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<'a, F> PartVisitor<'a> for FindAll<F>
where
    F: FnMut(&MessagePart) -> bool,
{
    type Output = Vec<&'a MessagePart>;

    fn visit_leaf(&mut self, part: &'a MessagePart) -> Self::Output {
        if (self.predicate)(part) {
            vec![part]
        } else {
            Vec::new()
        }
    }

    fn merge(&mut self, answers: Vec<Self::Output>) -> Self::Output {
        answers.into_iter().flatten().collect()
    }
}

/// Returns the first leaf, in depth-first order, accepted by `predicate`.
///
/// Stops as soon as a match is found.
pub fn find_first<'a>(
    part: &'a MessagePart,
    predicate: &mut impl FnMut(&MessagePart) -> bool,
) -> Option<&'a MessagePart> {
    if part.is_multipart() {
        part.children()
            .iter()
            .find_map(|child| find_first(child, predicate))
    } else {
        predicate(part).then_some(part)
    }
}

/// Every node whose media type equals `media_type`, ignoring case.
///
/// Nodes are visited in pre-order: a multipart node before its children.
#[must_use]
pub fn find_all_with_media_type<'a>(
    part: &'a MessagePart,
    media_type: &str,
) -> Vec<&'a MessagePart> {
    let wanted = media_type.to_ascii_lowercase();
    let mut found = Vec::new();
    collect_with_media_type(part, &wanted, &mut found);
    found
}

fn collect_with_media_type<'a>(
    part: &'a MessagePart,
    wanted: &str,
    found: &mut Vec<&'a MessagePart>,
) {
    if part.content_type().media_type() == wanted {
        found.push(part);
    }
    for child in part.children() {
        collect_with_media_type(child, wanted, found);
    }
}

/// The first node, in pre-order, whose media type equals `media_type`,
/// ignoring case. A multipart node is tested before its children.
#[must_use]
pub fn find_first_with_media_type<'a>(
    part: &'a MessagePart,
    media_type: &str,
) -> Option<&'a MessagePart> {
    let wanted = media_type.to_ascii_lowercase();
    first_with_media_type(part, &wanted)
}

fn first_with_media_type<'a>(part: &'a MessagePart, wanted: &str) -> Option<&'a MessagePart> {
    if part.content_type().media_type() == wanted {
        return Some(part);
    }
    part.children()
        .iter()
        .find_map(|child| first_with_media_type(child, wanted))
}

/// Every attachment leaf.
#[must_use]
pub fn find_all_attachments(part: &MessagePart) -> Vec<&MessagePart> {
    traverse(part, &mut FindAll::new(MessagePart::is_attachment))
}

/// Every text leaf.
#[must_use]
pub fn find_all_text(part: &MessagePart) -> Vec<&MessagePart> {
    traverse(part, &mut FindAll::new(MessagePart::is_text))
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

    const RAW: &[u8] = b"Content-Type: multipart/mixed; boundary=outer\r\n\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\r\n\
--inner\r\n\
Content-Type: text/plain\r\n\r\n\
first plain\r\n\
--inner\r\n\
Content-Type: TEXT/HTML\r\n\r\n\
<p>html</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: text/plain\r\n\r\n\
second plain\r\n\
--outer\r\n\
Content-Type: application/pdf\r\n\r\n\
%PDF\r\n\
--outer--\r\n";

    /// Counts leaves, to exercise a visitor with a non-list answer.
    struct LeafCount;

    impl PartVisitor<'_> for LeafCount {
        type Output = usize;

        fn visit_leaf(&mut self, _part: &MessagePart) -> usize {
            1
        }

        fn merge(&mut self, answers: Vec<usize>) -> usize {
            answers.into_iter().sum()
        }
    }

    #[test]
    fn test_custom_visitor() {
        let part = MessagePart::parse(RAW).unwrap();
        assert_eq!(traverse(&part, &mut LeafCount), 4);
    }

    #[test]
    fn test_find_all_with_media_type() {
        let part = MessagePart::parse(RAW).unwrap();
        let plain = find_all_with_media_type(&part, "Text/Plain");
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[0].body().unwrap(), b"first plain");
        assert_eq!(plain[1].body().unwrap(), b"second plain");

        let alternative = find_all_with_media_type(&part, "multipart/alternative");
        assert_eq!(alternative.len(), 1);
        assert_eq!(alternative[0].children().len(), 2);
    }

    #[test]
    fn test_media_type_queries_match_containers() {
        let part = MessagePart::parse(RAW).unwrap();

        let mixed = find_all_with_media_type(&part, "multipart/mixed");
        assert_eq!(mixed.len(), 1);
        assert!(std::ptr::eq(mixed[0], &part));

        let alternative = find_first_with_media_type(&part, "Multipart/Alternative").unwrap();
        assert!(alternative.is_multipart());
        assert_eq!(alternative.children()[1].body().unwrap(), b"<p>html</p>");

        // Containers still never count as attachments or text.
        assert_eq!(find_all_attachments(&part).len(), 1);
        assert_eq!(find_all_text(&part).len(), 3);
    }

    #[test]
    fn test_find_first_with_media_type() {
        let part = MessagePart::parse(RAW).unwrap();
        let html = find_first_with_media_type(&part, "text/html").unwrap();
        assert_eq!(html.body().unwrap(), b"<p>html</p>");
        assert!(find_first_with_media_type(&part, "image/png").is_none());
    }

    #[test]
    fn test_find_first_short_circuits() {
        let part = MessagePart::parse(RAW).unwrap();
        let mut visited = 0;
        let found = find_first(&part, &mut |p: &MessagePart| {
            visited += 1;
            p.content_type().is_text()
        });
        assert!(found.is_some());
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_attachments_and_text() {
        let part = MessagePart::parse(RAW).unwrap();
        let attachments = find_all_attachments(&part);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].content_type().media_type(), "application/pdf");
        assert_eq!(find_all_text(&part).len(), 3);
    }

    #[test]
    fn test_single_leaf() {
        let part = MessagePart::parse(b"Content-Type: text/plain\r\n\r\nx").unwrap();
        assert_eq!(find_all_text(&part).len(), 1);
        assert!(find_first_with_media_type(&part, "text/plain").is_some());
    }
}
