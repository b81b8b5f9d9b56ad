//! XML response serialization helpers over `quick_xml::Writer`.
//!
//! Conventions shared by the REST-XML and Query/XML dialects:
//! - XML declaration `<?xml version="1.0" encoding="UTF-8"?>`
//! - Timestamps in ISO 8601 with milliseconds and `Z` suffix
//! - Booleans as lowercase `true`/`false`

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

/// Serialize a complete XML document with the given root element.
///
/// `namespace`, when set, becomes the root's `xmlns` attribute. The closure
/// writes the root's children.
pub fn to_xml<F>(
    root_element: &str,
    namespace: Option<&str>,
    write_children: F,
) -> io::Result<Vec<u8>>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>) -> io::Result<()>,
{
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let element = writer.create_element(root_element);
    let element = match namespace {
        Some(ns) => element.with_attribute(("xmlns", ns)),
        None => element,
    };
    element.write_inner_content(write_children)?;

    Ok(buf)
}

/// Write a simple `<tag>text</tag>` element.
pub fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Write `<tag>text</tag>` only if the value is `Some`.
pub fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

/// Write `<tag>true|false</tag>`.
pub fn write_bool_element<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

/// Format a `DateTime<Utc>` as ISO 8601 with milliseconds and `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
