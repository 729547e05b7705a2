// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::Error;

/// Element attributes in document order.
///
/// Lookups return the first occurrence of a name.
#[derive(Clone, Default, Debug)]
pub struct Attributes {
    list: Vec<(String, String)>,
}

impl Attributes {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute. A repeated name is ignored.
    pub fn push(&mut self, name: &str, value: &str) {
        if self.get(name).is_none() {
            self.list.push((name.to_string(), value.to_string()));
        }
    }

    /// Returns an attribute value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.list
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns an attribute value parsed as a number.
    pub fn get_number(&self, name: &str) -> Option<f32> {
        let value = self.get(name)?;
        match value.trim().parse::<f32>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                log::warn!("Failed to parse {} value: '{}'.", name, value);
                None
            }
        }
    }

    /// Checks that there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (name, value) in iter {
            attrs.push(name, value);
        }
        attrs
    }
}

/// A consumer of markup events.
pub trait ElementHandler {
    /// Called once before the first element.
    fn start_document(&mut self) {}

    /// Called when an element is opened.
    fn start_element(&mut self, name: &str, attributes: Attributes);

    /// Called when an element is closed.
    fn end_element(&mut self, name: &str);
}

/// Feeds the elements of an XML document to `handler` in document order.
///
/// The document is read as a stream: every element before a syntax error
/// has already been reported when the error is returned.
///
/// Element and attribute names are passed without a namespace prefix.
/// Namespace declarations, text, comments and processing instructions are skipped.
pub fn parse_events(text: &str, handler: &mut dyn ElementHandler) -> Result<(), Error> {
    let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
    let mut open: Vec<String> = Vec::new();

    handler.start_document();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.local_name().into_inner())?;
                handler.start_element(name, read_attributes(&e)?);
                open.push(name.to_string());
            }
            Event::Empty(e) => {
                let name = local_name(e.local_name().into_inner())?;
                handler.start_element(name, read_attributes(&e)?);
                handler.end_element(name);
            }
            Event::End(e) => {
                let name = local_name(e.local_name().into_inner())?;
                open.pop();
                handler.end_element(name);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match open.pop() {
        Some(name) => Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(name)).into()),
        None => Ok(()),
    }
}

/// Returns the attributes of the root element.
///
/// Only the beginning of the document is read.
pub(crate) fn root_attributes(text: &str) -> Result<Attributes, Error> {
    let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => return read_attributes(&e),
            Event::Eof => {
                let e = IllFormedError::MissingEndTag(String::new());
                return Err(quick_xml::Error::IllFormed(e).into());
            }
            _ => {}
        }
    }
}

fn local_name(name: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(name).map_err(|_| Error::NotAnUtf8Str)
}

// Duplicates are not rejected here. `Attributes::push` keeps the first one.
fn read_attributes(e: &BytesStart) -> Result<Attributes, Error> {
    let mut attrs = Attributes::new();
    let mut list = e.attributes();
    list.with_checks(false);
    for attr in list {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }

        let name = local_name(attr.key.local_name().into_inner())?;
        let value = attr.unescape_value()?;
        attrs.push(name, &value);
    }

    Ok(attrs)
}

/// Reads a package part as a string.
pub(crate) fn read_part_text(archive: &dyn crate::Archive, name: &str) -> Result<String, Error> {
    let data = archive.read(name)?;
    String::from_utf8(data).map_err(|_| Error::NotAnUtf8Str)
}
