//! Legal RSS 2.0 element names per scope.
//!
//! Anything not listed here is dropped from the output without error.

/// How the text content of an element is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Replace markup characters with entity references.
    Entity,
    /// Wrap the content in a CDATA section, unescaped.
    Cdata,
}

/// Elements allowed directly under `<channel>`.
pub const CHANNEL_ELEMENTS: &[&str] = &[
    "category",
    "cloud",
    "copyright",
    "description",
    "docs",
    "generator",
    "image",
    "language",
    "lastBuildDate",
    "link",
    "managingEditor",
    "pubDate",
    "rating",
    "skipDays",
    "skipHours",
    "textInput",
    "title",
    "ttl",
    "webMaster",
];

/// Sub-elements of `<channel><image>`, in output order.
pub const CHANNEL_IMAGE_ELEMENTS: &[&str] = &["url", "title", "link", "width", "height", "description"];

/// Image sub-elements that fall back to the channel field of the same name.
pub const CHANNEL_IMAGE_FALLBACKS: &[&str] = &["title", "link", "description"];

/// Elements allowed under `<item>` and their content escaping.
pub const ITEM_ELEMENTS: &[(&str, Escape)] = &[
    ("author", Escape::Cdata),
    ("category", Escape::Cdata),
    ("comments", Escape::Cdata),
    ("description", Escape::Cdata),
    ("enclosure", Escape::Entity),
    ("guid", Escape::Entity),
    ("link", Escape::Entity),
    ("pubDate", Escape::Entity),
    ("source", Escape::Cdata),
    ("title", Escape::Cdata),
];

pub fn is_channel_element(name: &str) -> bool {
    CHANNEL_ELEMENTS.contains(&name)
}

/// Escaping policy for an item field, or `None` when the field is not an
/// RSS item element.
pub fn item_escape(name: &str) -> Option<Escape> {
    ITEM_ELEMENTS
        .iter()
        .find(|(element, _)| *element == name)
        .map(|(_, escape)| *escape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_whitelist() {
        assert_eq!(CHANNEL_ELEMENTS.len(), 19);
        assert!(is_channel_element("title"));
        assert!(is_channel_element("lastBuildDate"));
        assert!(!is_channel_element("item"));
        assert!(!is_channel_element("Title"));
    }

    #[test]
    fn test_item_escape_policy() {
        for name in ["author", "category", "comments", "description", "source", "title"] {
            assert_eq!(item_escape(name), Some(Escape::Cdata), "{name}");
        }
        for name in ["enclosure", "guid", "link", "pubDate"] {
            assert_eq!(item_escape(name), Some(Escape::Entity), "{name}");
        }
    }

    #[test]
    fn test_unknown_item_fields_are_not_elements() {
        for name in ["url", "summary", "context", "rich_context", "image", "timestamp", "id", "subtitle"] {
            assert_eq!(item_escape(name), None, "{name}");
        }
    }
}
