//! RSS 2.0 document exporter.
//!
//! Channel metadata is written as soon as exporting starts. Items are
//! buffered and only written by [`RssExporter::finish_exporting`], after
//! being ordered newest first by `pubDate`.

use std::io::Write;

use chrono::{DateTime, FixedOffset};

use super::error::ExportError;
use super::normalize::{
    enclosure_attributes, flatten_category, format_timestamp, normalize, resolve_channel_image, sort_key,
};
use super::value::{ChannelMetadata, Record, Value};
use super::whitelist::{is_channel_element, item_escape, Escape};
use super::writer::{XmlWriter, DEFAULT_INDENT};

const ROOT_ELEMENT: &str = "rss";
const CHANNEL_ELEMENT: &str = "channel";
const ITEM_ELEMENT: &str = "item";
const RSS_VERSION: &str = "2.0";

/// Item field that orders the feed.
pub const SORT_KEY: &str = "pubDate";

const CHANNEL_DEPTH: usize = 1;
const ITEM_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExporterState {
    Idle,
    HeaderWritten,
    Buffering,
}

impl ExporterState {
    fn as_str(self) -> &'static str {
        match self {
            ExporterState::Idle => "idle",
            ExporterState::HeaderWritten => "header-written",
            ExporterState::Buffering => "buffering-items",
        }
    }
}

/// Writes one RSS document to `W`.
///
/// The exporter owns its output stream for its whole lifetime and is not
/// meant to be shared between producers.
pub struct RssExporter<W: Write> {
    writer: XmlWriter<W>,
    channel: ChannelMetadata,
    items: Vec<Record>,
    state: ExporterState,
}

impl<W: Write> RssExporter<W> {
    pub fn new(output: W, channel: ChannelMetadata) -> Self {
        Self::with_indent(output, channel, DEFAULT_INDENT)
    }

    pub fn with_indent(output: W, channel: ChannelMetadata, indent: usize) -> Self {
        Self {
            writer: XmlWriter::with_indent(output, indent),
            channel,
            items: Vec::new(),
            state: ExporterState::Idle,
        }
    }

    /// Writes the prolog, opens `<rss>` and `<channel>`, and writes the
    /// whitelisted channel fields.
    pub fn start_exporting(&mut self) -> Result<(), ExportError> {
        self.expect_state("start exporting", &[ExporterState::Idle])?;

        self.writer.start_document()?;
        self.writer.start_element(ROOT_ELEMENT, &[("version", RSS_VERSION)])?;
        self.writer.newline()?;
        self.writer.indent(CHANNEL_DEPTH)?;
        self.writer.start_element(CHANNEL_ELEMENT, &[])?;
        self.writer.newline()?;

        for (name, value) in self.channel.iter() {
            if !is_channel_element(name) {
                tracing::debug!(field = name, "Dropping non-RSS channel field");
                continue;
            }
            let value = if name == "image" {
                resolve_channel_image(&self.channel)
            } else {
                normalize(value)
            };
            self.writer
                .export_field(name, &value, CHANNEL_DEPTH + 1, &[], Escape::Entity)?;
        }

        self.state = ExporterState::HeaderWritten;
        Ok(())
    }

    /// Buffers an item. Nothing is written until [`finish_exporting`](Self::finish_exporting).
    pub fn export_item(&mut self, item: Record) -> Result<(), ExportError> {
        self.expect_state(
            "export item",
            &[ExporterState::HeaderWritten, ExporterState::Buffering],
        )?;
        self.items.push(item);
        self.state = ExporterState::Buffering;
        tracing::debug!(buffered = self.items.len(), "Buffered feed item");
        Ok(())
    }

    /// Number of items waiting to be written.
    pub fn buffered(&self) -> usize {
        self.items.len()
    }

    /// Sorts the buffered items newest first, writes them, closes the
    /// document and hands back the output stream.
    ///
    /// Every item must carry a usable `pubDate`; otherwise nothing further is
    /// written and a [`ExportError::SchemaViolation`] is returned.
    pub fn finish_exporting(mut self) -> Result<W, ExportError> {
        self.expect_state(
            "finish exporting",
            &[ExporterState::HeaderWritten, ExporterState::Buffering],
        )?;

        // Validate every item before writing any of them
        let mut keyed = std::mem::take(&mut self.items)
            .into_iter()
            .enumerate()
            .map(|(index, item)| item_sort_key(index, &item).map(|key| (key, item)))
            .collect::<Result<Vec<_>, ExportError>>()?;

        // Stable: items with equal timestamps keep their buffer order
        keyed.sort_by(|a, b| b.0.cmp(&a.0));

        for (published, item) in &keyed {
            self.write_item(published, item)?;
        }

        self.writer.indent(CHANNEL_DEPTH)?;
        self.writer.end_element(CHANNEL_ELEMENT)?;
        self.writer.newline()?;
        self.writer.end_element(ROOT_ELEMENT)?;
        self.writer.newline()?;
        self.writer.end_document()?;

        tracing::info!(items = keyed.len(), "Finished RSS export");
        Ok(self.writer.into_inner())
    }

    /// `published` is the parsed sort key; `pubDate` is always rendered from
    /// it, whatever form the field arrived in.
    fn write_item(&mut self, published: &DateTime<FixedOffset>, item: &Record) -> Result<(), ExportError> {
        self.writer.indent(ITEM_DEPTH)?;
        self.writer.start_element(ITEM_ELEMENT, &[])?;
        self.writer.newline()?;

        let depth = ITEM_DEPTH + 1;
        for (name, value) in item.iter() {
            let Some(escape) = item_escape(name) else {
                continue;
            };

            match name {
                "enclosure" => match enclosure_attributes(value) {
                    Ok(attributes) => {
                        let attributes: Vec<(&str, &str)> = attributes
                            .iter()
                            .map(|(k, v)| (k.as_str(), v.as_str()))
                            .collect();
                        self.writer
                            .export_field(name, &Value::empty(), depth, &attributes, escape)?;
                    }
                    Err(e) => tracing::warn!(error = %e, "Omitting item enclosure"),
                },
                "category" => match flatten_category(value) {
                    Ok(category) => self.writer.export_field(name, &category, depth, &[], escape)?,
                    Err(e) => tracing::warn!(error = %e, "Omitting item category"),
                },
                SORT_KEY => {
                    let published = Value::Scalar(format_timestamp(published));
                    self.writer.export_field(name, &published, depth, &[], escape)?
                }
                _ => self
                    .writer
                    .export_field(name, &normalize(value), depth, &[], escape)?,
            }
        }

        self.writer.indent(ITEM_DEPTH)?;
        self.writer.end_element(ITEM_ELEMENT)?;
        self.writer.newline()
    }

    fn expect_state(&self, operation: &'static str, allowed: &[ExporterState]) -> Result<(), ExportError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ExportError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }
}

fn item_sort_key(index: usize, item: &Record) -> Result<DateTime<FixedOffset>, ExportError> {
    item.get(SORT_KEY)
        .ok_or_else(|| "field is missing".to_string())
        .and_then(sort_key)
        .map_err(|reason| ExportError::SchemaViolation {
            index,
            field: SORT_KEY,
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::value::FieldValue;
    use pretty_assertions::assert_eq;

    fn item(title: &str, published: &str) -> Record {
        Record::new()
            .with("title", title)
            .with("pubDate", DateTime::parse_from_rfc3339(published).unwrap())
    }

    fn export(channel: ChannelMetadata, items: Vec<Record>) -> Result<String, ExportError> {
        let mut exporter = RssExporter::new(Vec::new(), channel);
        exporter.start_exporting()?;
        for item in items {
            exporter.export_item(item)?;
        }
        let out = exporter.finish_exporting()?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_empty_feed_document() {
        let out = export(Record::new().with("title", "News"), vec![]).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <rss version=\"2.0\">\n  \
             <channel>\n    \
             <title>News</title>\n  \
             </channel>\n\
             </rss>\n"
        );
    }

    #[test]
    fn test_items_written_newest_first() {
        let out = export(
            Record::new(),
            vec![
                item("old", "2020-12-01T09:00:00+08:00"),
                item("new", "2020-12-03T10:00:00+08:00"),
                item("mid", "2020-12-02T09:00:00+08:00"),
            ],
        )
        .unwrap();

        let new = out.find("new").unwrap();
        let mid = out.find("mid").unwrap();
        let old = out.find("old").unwrap();
        assert!(new < mid && mid < old, "{out}");
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let out = export(
            Record::new(),
            vec![
                item("first", "2020-12-02T09:00:00+08:00"),
                item("second", "2020-12-02T09:00:00+08:00"),
            ],
        )
        .unwrap();
        assert!(out.find("first").unwrap() < out.find("second").unwrap());
    }

    #[test]
    fn test_missing_sort_key_is_schema_violation() {
        let err = export(
            Record::new(),
            vec![
                item("ok", "2020-12-02T09:00:00+08:00"),
                Record::new().with("title", "no date"),
            ],
        )
        .unwrap_err();

        match err {
            ExportError::SchemaViolation { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "pubDate");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_sort_key_is_schema_violation() {
        let err = export(
            Record::new(),
            vec![Record::new().with("pubDate", FieldValue::Null)],
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::SchemaViolation { index: 0, .. }));
    }

    #[test]
    fn test_non_rss_channel_fields_dropped() {
        let channel = Record::new()
            .with("title", "News")
            .with("file_name", "appledaily")
            .with("ttl", 60u32);
        let out = export(channel, vec![]).unwrap();
        assert!(out.contains("<title>News</title>"));
        assert!(out.contains("<ttl>60</ttl>"));
        assert!(!out.contains("file_name"));
    }

    #[test]
    fn test_item_fields_in_record_order() {
        let record = Record::new()
            .with("link", "http://x/1")
            .with("title", "T")
            .with("pubDate", DateTime::parse_from_rfc3339("2020-12-01T10:00:00+08:00").unwrap());
        let out = export(Record::new(), vec![record]).unwrap();
        assert!(out.contains(
            "    <item>\n      \
             <link>http://x/1</link>\n      \
             <title><![CDATA[T]]></title>\n      \
             <pubDate>Tue, 01 Dec 2020 10:00:00 +0800</pubDate>\n    \
             </item>\n"
        ));
    }

    #[test]
    fn test_unsupported_category_is_omitted() {
        let record = item("T", "2020-12-01T10:00:00+08:00").with("category", "plain");
        let out = export(Record::new(), vec![record]).unwrap();
        assert!(!out.contains("<category"));
        assert!(out.contains("<title>"));
    }

    #[test]
    fn test_export_item_before_start_is_rejected() {
        let mut exporter = RssExporter::new(Vec::new(), Record::new());
        let err = exporter.export_item(Record::new()).unwrap_err();
        assert!(matches!(err, ExportError::InvalidState { .. }));
        assert_eq!(exporter.buffered(), 0);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut exporter = RssExporter::new(Vec::new(), Record::new());
        exporter.start_exporting().unwrap();
        assert!(matches!(
            exporter.start_exporting(),
            Err(ExportError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_finish_before_start_is_rejected() {
        let exporter = RssExporter::new(Vec::new(), Record::new());
        assert!(matches!(
            exporter.finish_exporting(),
            Err(ExportError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_text_pub_date_rendered_as_rfc2822() {
        let out = export(
            Record::new(),
            vec![
                Record::new()
                    .with("title", "rfc3339")
                    .with("pubDate", "2020-12-03T10:00:00+08:00"),
                Record::new()
                    .with("title", "rfc2822")
                    .with("pubDate", "Wed, 2 Dec 2020 09:00:00 +0800"),
            ],
        )
        .unwrap();
        assert!(out.contains("<pubDate>Thu, 03 Dec 2020 10:00:00 +0800</pubDate>"));
        assert!(out.contains("<pubDate>Wed, 02 Dec 2020 09:00:00 +0800</pubDate>"));
        assert!(!out.contains("2020-12-03T10:00:00"));
    }

    #[test]
    fn test_buffered_items_written_once_on_finish() {
        let mut exporter = RssExporter::new(Vec::new(), Record::new());
        exporter.start_exporting().unwrap();
        exporter
            .export_item(item("buffered", "2020-12-01T10:00:00+08:00"))
            .unwrap();
        assert_eq!(exporter.buffered(), 1);
        let out = String::from_utf8(exporter.finish_exporting().unwrap()).unwrap();
        assert_eq!(out.matches("<item>").count(), 1);
    }
}
