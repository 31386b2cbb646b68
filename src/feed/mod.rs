//! RSS 2.0 feed export.
//!
//! This module turns buffered article records into a single RSS document:
//!
//! - **Values**: the record/field model shared by producers and the writer
//! - **Whitelist**: which element names are legal per scope, and how item
//!   content is escaped
//! - **Normalization**: timestamps, nulls, category and enclosure coercion,
//!   channel image resolution
//! - **Writer**: indented XML emission via `quick-xml`
//! - **Exporter**: the start → buffer → sort → finish state machine
//!
//! # Example
//!
//! ```
//! use newsfeed::feed::{Record, RssExporter};
//!
//! let channel = Record::new().with("title", "News").with("link", "https://example.com");
//! let mut exporter = RssExporter::new(Vec::new(), channel);
//! exporter.start_exporting()?;
//! exporter.export_item(
//!     Record::new()
//!         .with("title", "Hello")
//!         .with("pubDate", "2020-12-01T10:00:00+08:00"),
//! )?;
//! let xml = String::from_utf8(exporter.finish_exporting()?).unwrap();
//! assert!(xml.contains("<title><![CDATA[Hello]]></title>"));
//! assert!(xml.contains("<pubDate>Tue, 01 Dec 2020 10:00:00 +0800</pubDate>"));
//! # Ok::<(), newsfeed::feed::ExportError>(())
//! ```

mod error;
mod exporter;
pub mod normalize;
mod value;
pub mod whitelist;
mod writer;

pub use error::{ExportError, UnsupportedShape};
pub use exporter::{RssExporter, SORT_KEY};
pub use value::{ChannelMetadata, FieldValue, Record, Value};
pub use whitelist::Escape;
pub use writer::{XmlWriter, DEFAULT_INDENT};
