//! Streaming feed parser.
//!
//! Walks the document event by event with a namespace-aware pull reader and
//! collects one [`FeedEntry`] per entry element. A broken entry is dropped on
//! its own; a broken document fails as a whole.

use std::fmt::Display;

use quick_xml::events::{BytesStart, Event};
use quick_xml::NsReader;
use tracing::{debug, warn};

use super::mapping::{Capture, Field, FieldRule, TagMapping};
use super::types::FeedEntry;
use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InEntry,
    InEntryMediaGroup,
}

/// Per-entry field accumulator.
#[derive(Debug, Default)]
struct Accumulator {
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
}

impl Accumulator {
    /// Store a value; the first non-empty value for a field wins.
    fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Description => &mut self.description,
            Field::Thumbnail => &mut self.thumbnail,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    fn finish(self) -> std::result::Result<FeedEntry, Vec<&'static str>> {
        let published = self.published.or(self.updated);
        match (self.id, self.title, published) {
            (Some(id), Some(title), Some(published)) => Ok(FeedEntry {
                id,
                title,
                description: self.description,
                link: self.link,
                thumbnail: self.thumbnail,
                published,
            }),
            (id, title, published) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("id");
                }
                if title.is_none() {
                    missing.push("title");
                }
                if published.is_none() {
                    missing.push("published");
                }
                Err(missing)
            }
        }
    }
}

fn malformed(e: impl Display) -> ParseError {
    ParseError::Malformed(e.to_string())
}

/// Parse a raw feed document into entries using the given tag mapping.
pub fn parse(raw: &[u8], mapping: &TagMapping) -> Result<Vec<FeedEntry>, ParseError> {
    let text =
        std::str::from_utf8(raw).map_err(|e| malformed(format!("invalid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = NsReader::from_str(text);
    let mut state = State::Outside;
    let mut acc = Accumulator::default();
    let mut entries = Vec::new();
    let mut dropped = 0usize;
    // Elements opened but not yet closed, excluding subtrees consumed whole.
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut root_closed = false;

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(malformed)?;
        match event {
            Event::Start(start) => {
                if root_closed {
                    return Err(malformed("element after the root element"));
                }
                check_attributes(&start)?;
                saw_root = true;
                let local = start.local_name();
                match state {
                    State::Outside => {
                        if mapping.entry.matches(&ns, local.as_ref()) {
                            acc = Accumulator::default();
                            state = State::InEntry;
                        }
                        depth += 1;
                    }
                    State::InEntry | State::InEntryMediaGroup => {
                        let in_group = state == State::InEntryMediaGroup;
                        let opens_group = !in_group
                            && mapping
                                .media_group
                                .is_some_and(|group| group.matches(&ns, local.as_ref()));
                        let rule = mapping.rule_for(in_group, &ns, local.as_ref());

                        if opens_group {
                            state = State::InEntryMediaGroup;
                            depth += 1;
                        } else if let Some(rule) = rule {
                            capture_field(&mut reader, &start, rule, &mut acc)?;
                        } else {
                            skip_element(&mut reader)?;
                        }
                    }
                }
            }
            Event::Empty(start) => {
                if root_closed {
                    return Err(malformed("element after the root element"));
                }
                check_attributes(&start)?;
                saw_root = true;
                if depth == 0 {
                    root_closed = true;
                }
                if state != State::Outside {
                    let in_group = state == State::InEntryMediaGroup;
                    if let Some(rule) = mapping.rule_for(in_group, &ns, start.local_name().as_ref())
                    {
                        if let Capture::Attribute(attr) = rule.capture {
                            capture_attribute(&start, attr, rule.field, &mut acc)?;
                        }
                    }
                }
            }
            Event::End(end) => {
                depth = depth.checked_sub(1).ok_or_else(|| malformed("unbalanced end tag"))?;
                if depth == 0 {
                    root_closed = true;
                }
                let local = end.local_name();
                match state {
                    State::InEntryMediaGroup => {
                        if mapping
                            .media_group
                            .is_some_and(|group| group.matches(&ns, local.as_ref()))
                        {
                            state = State::InEntry;
                        }
                    }
                    State::InEntry => {
                        if mapping.entry.matches(&ns, local.as_ref()) {
                            match std::mem::take(&mut acc).finish() {
                                Ok(entry) => entries.push(entry),
                                Err(missing) => {
                                    dropped += 1;
                                    warn!(
                                        missing = ?missing,
                                        "Dropping feed entry without required fields"
                                    );
                                }
                            }
                            state = State::Outside;
                        }
                    }
                    State::Outside => {}
                }
            }
            Event::Text(text) if depth == 0 => {
                if !text.unescape().map_err(malformed)?.trim().is_empty() {
                    return Err(malformed("text outside the root element"));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(malformed("CDATA outside the root element"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(malformed("document has no root element"));
    }
    if depth != 0 || state != State::Outside {
        return Err(malformed("unexpected end of document"));
    }

    debug!(entries = entries.len(), dropped, "Parsed feed document");
    Ok(entries)
}

/// Consume a field element and store its value.
fn capture_field(
    reader: &mut NsReader<&[u8]>,
    start: &BytesStart<'_>,
    rule: FieldRule,
    acc: &mut Accumulator,
) -> Result<(), ParseError> {
    match rule.capture {
        Capture::Attribute(attr) => {
            capture_attribute(start, attr, rule.field, acc)?;
            skip_element(reader)?;
        }
        Capture::Text => {
            let text = read_text_content(reader, start)?;
            acc.set(rule.field, &text);
        }
    }
    Ok(())
}

fn capture_attribute(
    start: &BytesStart<'_>,
    attr: &str,
    field: Field,
    acc: &mut Accumulator,
) -> Result<(), ParseError> {
    if let Some(attribute) = start.try_get_attribute(attr).map_err(malformed)? {
        let value = attribute.unescape_value().map_err(malformed)?;
        acc.set(field, &value);
    }
    Ok(())
}

/// Reject an element that repeats an attribute.
fn check_attributes(start: &BytesStart<'_>) -> Result<(), ParseError> {
    for attribute in start.attributes().with_checks(true) {
        attribute.map_err(malformed)?;
    }
    Ok(())
}

/// Skip the rest of an element whose start tag was just read, checking the
/// markup inside it.
fn skip_element(reader: &mut NsReader<&[u8]>) -> Result<(), ParseError> {
    let mut depth = 1usize;
    while depth > 0 {
        match reader.read_event().map_err(malformed)? {
            Event::Start(nested) => {
                check_attributes(&nested)?;
                depth += 1;
            }
            Event::Empty(nested) => check_attributes(&nested)?,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(malformed("unexpected end of document")),
            _ => {}
        }
    }
    Ok(())
}

/// Read text and CDATA up to the element's end tag, skipping nested markup.
fn read_text_content(
    reader: &mut NsReader<&[u8]>,
    start: &BytesStart<'_>,
) -> Result<String, ParseError> {
    let mut out = String::new();
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Text(text) => out.push_str(&text.unescape().map_err(malformed)?),
            Event::CData(cdata) => {
                out.push_str(std::str::from_utf8(&cdata).map_err(malformed)?)
            }
            Event::Start(nested) => {
                check_attributes(&nested)?;
                skip_element(reader)?;
            }
            Event::Empty(nested) => check_attributes(&nested)?,
            Event::End(end) => {
                if end.name() != start.name() {
                    return Err(malformed("mismatched end tag"));
                }
                return Ok(out);
            }
            Event::Eof => return Err(malformed("unexpected end of document")),
            _ => {}
        }
    }
}
