//! Indented XML emitter on top of `quick_xml::Writer`.
//!
//! Formatting is driven explicitly by the caller rather than by quick-xml's
//! indenting writer: empty elements must render as `<a></a>`, text stays
//! inline with its tags, and every element ends with a newline.

use std::io::Write;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::error::ExportError;
use super::value::Value;
use super::whitelist::Escape;

/// Default number of spaces per nesting level.
pub const DEFAULT_INDENT: usize = 2;

/// Name given to each element of a list-valued field.
const LIST_ELEMENT: &str = "value";

pub struct XmlWriter<W: Write> {
    inner: Writer<W>,
    indent: usize,
    open: Vec<String>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_indent(inner, DEFAULT_INDENT)
    }

    pub fn with_indent(inner: W, indent: usize) -> Self {
        Self {
            inner: Writer::new(inner),
            indent,
            open: Vec::new(),
        }
    }

    /// Writes the XML declaration followed by a newline.
    pub fn start_document(&mut self) -> Result<(), ExportError> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.newline()
    }

    /// Verifies every element was closed and flushes the output.
    pub fn end_document(&mut self) -> Result<(), ExportError> {
        if let Some(unclosed) = self.open.last() {
            return Err(ExportError::UnbalancedElement {
                expected: unclosed.clone(),
                found: String::new(),
            });
        }
        self.inner.get_mut().flush()?;
        Ok(())
    }

    pub fn start_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ExportError> {
        let mut start = BytesStart::new(name);
        for &(key, value) in attributes {
            start.push_attribute((key, value));
        }
        self.inner.write_event(Event::Start(start))?;
        self.open.push(name.to_string());
        Ok(())
    }

    /// Closes `name`, which must be the innermost open element.
    pub fn end_element(&mut self, name: &str) -> Result<(), ExportError> {
        match self.open.last() {
            Some(top) if top == name => {}
            other => {
                return Err(ExportError::UnbalancedElement {
                    expected: other.cloned().unwrap_or_default(),
                    found: name.to_string(),
                })
            }
        }
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        self.open.pop();
        Ok(())
    }

    pub fn newline(&mut self) -> Result<(), ExportError> {
        self.inner.get_mut().write_all(b"\n")?;
        Ok(())
    }

    pub fn indent(&mut self, depth: usize) -> Result<(), ExportError> {
        let width = depth * self.indent;
        if width > 0 {
            write!(self.inner.get_mut(), "{:width$}", "")?;
        }
        Ok(())
    }

    /// Writes one complete element for a field at `depth`.
    ///
    /// - Maps become nested child elements named by their keys.
    /// - Lists become repeated `<value>` children.
    /// - Non-empty scalars become content, entity-escaped or in CDATA.
    /// - Empty scalars produce an element with no content.
    ///
    /// `escape` applies to every scalar beneath this element.
    pub fn export_field(
        &mut self,
        name: &str,
        value: &Value,
        depth: usize,
        attributes: &[(&str, &str)],
        escape: Escape,
    ) -> Result<(), ExportError> {
        if !is_xml_name(name) {
            tracing::debug!(name, "Skipping field with an invalid element name");
            return Ok(());
        }
        let attributes: Vec<(&str, &str)> = attributes
            .iter()
            .filter(|(key, _)| is_xml_name(key))
            .copied()
            .collect();

        self.indent(depth)?;
        self.start_element(name, &attributes)?;
        match value {
            Value::Map(entries) => {
                self.newline()?;
                for (child, child_value) in entries {
                    self.export_field(child, child_value, depth + 1, &[], escape)?;
                }
                self.indent(depth)?;
            }
            Value::List(items) => {
                self.newline()?;
                for item in items {
                    self.export_field(LIST_ELEMENT, item, depth + 1, &[], escape)?;
                }
                self.indent(depth)?;
            }
            Value::Scalar(content) if !content.is_empty() => self.write_content(content, escape)?,
            Value::Scalar(_) => {}
        }
        self.end_element(name)?;
        self.newline()
    }

    fn write_content(&mut self, content: &str, escape: Escape) -> Result<(), ExportError> {
        // CDATA content is written verbatim; `]]>` inside it is not split
        let event = match escape {
            Escape::Cdata => Event::CData(BytesCData::new(content)),
            Escape::Entity => Event::Text(BytesText::new(content)),
        };
        self.inner.write_event(event)?;
        Ok(())
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// Whether `name` can be used as an element or attribute name.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':'))
}
