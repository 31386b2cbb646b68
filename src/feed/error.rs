use thiserror::Error;

/// Errors that abort an RSS export.
///
/// Shape problems inside individual fields are not represented here: they
/// surface as [`UnsupportedShape`] and the offending field is omitted.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing to the output stream failed.
    #[error("Failed to write feed: {0}")]
    Io(#[from] std::io::Error),

    /// The XML emitter rejected an event.
    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A buffered item cannot be placed in the feed ordering.
    #[error("Item {index} has an invalid `{field}` field: {reason}")]
    SchemaViolation {
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// An exporter operation was called out of order.
    #[error("Cannot {operation} while exporter is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// An element was closed that is not the innermost open element.
    #[error("Unbalanced XML: expected </{expected}>, got </{found}>")]
    UnbalancedElement { expected: String, found: String },
}

/// A field value whose shape cannot be rendered as the element it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported shape for `{field}`: expected {expected}, got {found}")]
pub struct UnsupportedShape {
    pub field: &'static str,
    pub expected: &'static str,
    pub found: &'static str,
}
