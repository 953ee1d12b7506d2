//! BioC collection handling: well-formedness checks, re-serialization of
//! export responses, and the top-level split used by the merger.
//!
//! A BioC collection is a `<collection>` root whose leading children
//! (`source`, `date`, `key`, `infon`) describe the corpus and whose remaining
//! children are `<document>` records.

use std::fmt::Display;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::FulltextError;

pub const COLLECTION_TAG: &str = "collection";
pub const DOCUMENT_TAG: &str = "document";
pub const DATE_TAG: &str = "date";

/// One serialized top-level child of a collection root.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    start: BytesStart<'static>,
    xml: Vec<u8>,
}

impl Element {
    fn empty(start: BytesStart<'static>) -> Result<Self, FulltextError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Empty(start.borrow()))
            .map_err(write_error)?;
        Ok(Self {
            name: tag_name(&start),
            start,
            xml: writer.into_inner(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_document(&self) -> bool {
        self.name == DOCUMENT_TAG
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.xml
    }

    /// The element with its content replaced by `text`, attributes kept.
    pub fn with_text(&self, text: &str) -> Result<Vec<u8>, FulltextError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Start(self.start.borrow()))
            .map_err(write_error)?;
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)?;
        writer
            .write_event(Event::End(self.start.to_end()))
            .map_err(write_error)?;
        Ok(writer.into_inner())
    }
}

/// A parsed collection split into header fields and document records.
///
/// `header` holds the non-document children that precede the first document;
/// non-document children after it are not kept.
#[derive(Debug, Clone)]
pub struct Collection {
    pub root: String,
    pub header: Vec<Element>,
    pub documents: Vec<Element>,
}

impl Collection {
    fn place(&mut self, element: Element) {
        if element.is_document() {
            self.documents.push(element);
        } else if self.documents.is_empty() {
            self.header.push(element);
        }
    }
}

/// An open depth-1 child being copied event by event.
struct Capture {
    name: String,
    start: BytesStart<'static>,
    writer: Writer<Vec<u8>>,
}

impl Capture {
    fn open(start: BytesStart<'static>) -> Result<Self, FulltextError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Start(start.borrow()))
            .map_err(write_error)?;
        Ok(Self {
            name: tag_name(&start),
            start,
            writer,
        })
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), FulltextError> {
        self.writer.write_event(event).map_err(write_error)
    }

    fn finish(self) -> Element {
        Element {
            name: self.name,
            start: self.start,
            xml: self.writer.into_inner(),
        }
    }
}

/// Tracks nesting to enforce a single balanced root element.
#[derive(Debug, Default)]
struct Shape {
    depth: usize,
    root_seen: bool,
}

impl Shape {
    fn track(&mut self, event: &Event<'_>) -> Result<(), String> {
        match event {
            Event::Start(start) => {
                self.open()?;
                check_attributes(start)?;
                self.depth += 1;
            }
            Event::Empty(start) => {
                self.open()?;
                check_attributes(start)?;
            }
            Event::End(end) => {
                self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                    format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    )
                })?;
            }
            Event::Text(text) => {
                text.unescape().map_err(|err| err.to_string())?;
                if self.depth == 0 && !text.iter().all(|byte| byte.is_ascii_whitespace()) {
                    return Err("text outside the root element".to_string());
                }
            }
            Event::CData(_) if self.depth == 0 => {
                return Err("CDATA outside the root element".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn open(&mut self) -> Result<(), String> {
        if self.depth == 0 {
            if self.root_seen {
                return Err("more than one root element".to_string());
            }
            self.root_seen = true;
        }
        Ok(())
    }

    fn finish(&self) -> Result<(), String> {
        if !self.root_seen {
            return Err("no root element".to_string());
        }
        if self.depth != 0 {
            return Err(format!("{} unclosed element(s) at end of input", self.depth));
        }
        Ok(())
    }
}

/// Rejects duplicate names, missing values and bad entity references in the
/// attributes of a start tag.
fn check_attributes(start: &BytesStart<'_>) -> Result<(), String> {
    for attribute in start.attributes().with_checks(true) {
        let attribute = attribute.map_err(|err| {
            format!("bad attribute in <{}>: {err}", tag_name(start))
        })?;
        attribute.unescape_value().map_err(|err| {
            format!("bad attribute value in <{}>: {err}", tag_name(start))
        })?;
    }
    Ok(())
}

/// Checks that `body` is a well-formed document and returns it serialized
/// again, ready to be stored as a batch file.
pub fn reserialize(body: &str) -> Result<Vec<u8>, FulltextError> {
    let mut reader = Reader::from_str(body);
    let mut writer = Writer::new(Vec::with_capacity(body.len() + 1));
    let mut shape = Shape::default();

    loop {
        let event = next_event(&mut reader)?;
        if matches!(event, Event::Eof) {
            break;
        }
        shape
            .track(&event)
            .map_err(|message| malformed(&reader, message))?;
        writer.write_event(event).map_err(write_error)?;
    }
    shape.finish().map_err(|message| malformed(&reader, message))?;

    let mut xml = writer.into_inner();
    if !xml.ends_with(b"\n") {
        xml.push(b'\n');
    }
    Ok(xml)
}

/// Parses a stored batch file into header fields and document records.
/// Nothing is returned unless the whole input is well formed.
pub fn parse_collection(xml: &[u8]) -> Result<Collection, FulltextError> {
    let text = std::str::from_utf8(xml)
        .map_err(|err| FulltextError::MalformedXml(format!("invalid UTF-8: {err}")))?;
    let mut reader = Reader::from_str(text);
    let mut shape = Shape::default();
    let mut collection = Collection {
        root: String::new(),
        header: Vec::new(),
        documents: Vec::new(),
    };
    let mut capture: Option<Capture> = None;

    loop {
        let event = next_event(&mut reader)?;
        if matches!(event, Event::Eof) {
            break;
        }
        let depth = shape.depth;
        shape
            .track(&event)
            .map_err(|message| malformed(&reader, message))?;

        match event {
            Event::Start(start) | Event::Empty(start) if depth == 0 => {
                collection.root = tag_name(&start);
            }
            Event::Start(start) if depth == 1 => {
                capture = Some(Capture::open(start.into_owned())?);
            }
            Event::Empty(start) if depth == 1 => {
                collection.place(Element::empty(start.into_owned())?);
            }
            Event::End(end) if depth == 2 => {
                if let Some(mut child) = capture.take() {
                    child.write(Event::End(end))?;
                    collection.place(child.finish());
                }
            }
            event if depth >= 2 => {
                if let Some(child) = capture.as_mut() {
                    child.write(event)?;
                }
            }
            _ => {}
        }
    }
    shape.finish().map_err(|message| malformed(&reader, message))?;

    Ok(collection)
}

fn next_event<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Event<'a>, FulltextError> {
    reader.read_event().map_err(|err| malformed(reader, err))
}

fn malformed(reader: &Reader<&[u8]>, err: impl Display) -> FulltextError {
    FulltextError::MalformedXml(format!("{err} (at byte {})", reader.buffer_position()))
}

fn write_error(err: impl Display) -> FulltextError {
    FulltextError::MalformedXml(format!("serialize: {err}"))
}

fn tag_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}
