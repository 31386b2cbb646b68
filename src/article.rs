//! Article records as produced by the crawler, and their mapping onto RSS
//! item field names.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::feed::{FieldValue, Record};

/// Source field → RSS item fields it is copied to.
pub const ITEM_TO_RSS_MAPPING: &[(&str, &[&str])] = &[
    ("url", &["link", "guid"]),
    ("rich_context", &["description"]),
    ("image", &["enclosure"]),
    ("timestamp", &["pubDate"]),
    ("third_party", &["source"]),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub name: Option<String>,
}

/// An image attached to an article or to the channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub url: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub description: Option<String>,
    /// Size of the image in bytes.
    pub length: Option<u64>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
}

impl From<&Image> for FieldValue {
    fn from(image: &Image) -> Self {
        let entries = [
            ("url", image.url.clone().map(FieldValue::from)),
            ("title", image.title.clone().map(FieldValue::from)),
            ("link", image.link.clone().map(FieldValue::from)),
            ("width", image.width.map(FieldValue::from)),
            ("height", image.height.map(FieldValue::from)),
            ("description", image.description.clone().map(FieldValue::from)),
            ("length", image.length.map(FieldValue::from)),
            ("type", image.mime_type.clone().map(FieldValue::from)),
        ];
        // Only sub-fields that were set appear in the map
        FieldValue::Map(
            entries
                .into_iter()
                .filter_map(|(name, value)| Some((name.to_string(), value?)))
                .collect(),
        )
    }
}

/// One crawled news article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    /// Complete article text.
    pub context: Option<String>,
    /// Complete article HTML.
    pub rich_context: Option<String>,
    pub author: Vec<Author>,
    pub image: Option<Image>,
    pub category: Vec<Category>,
    pub id: Option<String>,
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Third-party source the article was syndicated from.
    pub third_party: Option<String>,
    pub subtitle: Option<String>,
}

impl ArticleRecord {
    /// Converts to a record with every field, in declaration order.
    pub fn to_record(&self) -> Record {
        let authors = self
            .author
            .iter()
            .map(|a| FieldValue::Map(vec![("name".to_string(), a.name.clone().into())]))
            .collect();
        let categories = self
            .category
            .iter()
            .map(|c| FieldValue::Map(vec![("name".to_string(), c.name.clone().into())]))
            .collect();

        Record::new()
            .with("url", self.url.clone())
            .with("title", self.title.clone())
            .with("summary", self.summary.clone())
            .with("context", self.context.clone())
            .with("rich_context", self.rich_context.clone())
            .with("author", FieldValue::List(authors))
            .with("image", self.image.as_ref().map_or(FieldValue::Null, FieldValue::from))
            .with("category", FieldValue::List(categories))
            .with("id", self.id.clone())
            .with("timestamp", self.timestamp)
            .with("third_party", self.third_party.clone())
            .with("subtitle", self.subtitle.clone())
    }

    /// Converts to a record carrying the RSS alias fields as well.
    pub fn to_rss_record(&self) -> Record {
        let mut record = self.to_record();
        extend_to_rss_fields(&mut record);
        record
    }
}

/// Adds the RSS alias of every mapped field present in `record`.
///
/// Aliases are collected in record order and then inserted, so a new alias
/// lands after all existing fields and an existing one is overwritten in place.
pub fn extend_to_rss_fields(record: &mut Record) {
    let aliases: Vec<(&str, FieldValue)> = record
        .iter()
        .filter_map(|(name, value)| {
            ITEM_TO_RSS_MAPPING
                .iter()
                .find(|(source, _)| *source == name)
                .map(|(_, targets)| targets.iter().map(move |t| (*t, value.clone())))
        })
        .flatten()
        .collect();

    for (name, value) in aliases {
        record.insert(name, value);
    }
}
