//! Streaming decoder for DATEX II `SituationPublication` documents.
//!
//! The feed is read once, event by event, with quick-xml. Records, their
//! situation header and the Alert-C, global network and address-based
//! locations they carry are assembled on the fly; memory use follows the
//! nesting depth of the document rather than its size.
//!
//! ```rust,no_run
//! # fn main() -> Result<(), datex_xml::DecodeError> {
//! let file = std::fs::File::open("situations.xml").expect("open feed");
//! let publication = datex_xml::decode(std::io::BufReader::new(file))?;
//! for record in &publication.records {
//!     println!("{} {:?}", record.id, record.record_type);
//! }
//! # Ok(())
//! # }
//! ```

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

mod decoder;
pub mod location;
pub mod model;

use crate::decoder::{DecoderState, Tag};

pub use location::{
    AlertCLinear, AlertCPoint, AlertCTable, GlobalNetworkLinear, GlobalNetworkSegment,
    LinearWithinLinearElement, RawCoordinate,
};
pub use model::{Publication, SituationContext, SituationRecord};

/// Structural failure of a decode call. No records are returned with it.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The underlying reader failed or the document is not well-formed.
    #[error("xml at byte {position}: {message}")]
    Xml { position: usize, message: String },
    /// An attribute could not be parsed or unescaped.
    #[error("malformed attribute: {0}")]
    Attribute(String),
    /// A second root element, or character data outside the root element.
    #[error("content outside the root element at byte {position}")]
    OutsideRoot { position: usize },
    /// The input ended while elements were still open.
    #[error("document ended with {open} unclosed element(s)")]
    UnclosedElements { open: usize },
}

/// Decode a complete `SituationPublication` from a buffered byte stream.
///
/// Blank or unparsable leaf values are treated as absent; records without an
/// `id` attribute are skipped. Any structural problem aborts the whole call.
pub fn decode<R: BufRead>(input: R) -> Result<Publication, DecodeError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 0usize;
    let mut root_closed = false;
    let mut state = DecoderState::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_) | Event::Empty(_)) if root_closed => {
                return Err(DecodeError::OutsideRoot {
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Text(e)) if depth == 0 && !e.iter().all(u8::is_ascii_whitespace) => {
                return Err(DecodeError::OutsideRoot {
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::CData(_)) if depth == 0 => {
                return Err(DecodeError::OutsideRoot {
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Start(e)) => {
                depth += 1;
                text.clear();
                if let Some(tag) = Tag::from_local_name(e.local_name().as_ref()) {
                    state.on_start(tag, &e)?;
                }
            }
            Ok(Event::Empty(e)) => {
                text.clear();
                if let Some(tag) = Tag::from_local_name(e.local_name().as_ref()) {
                    state.on_start(tag, &e)?;
                    state.on_end(tag, None);
                }
                root_closed = depth == 0;
            }
            Ok(Event::Text(e)) => {
                let value = e.unescape().map_err(|err| DecodeError::Xml {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })?;
                text.push_str(&value);
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(e)) => {
                // quick-xml rejects unbalanced end tags before they get here.
                depth = depth.saturating_sub(1);
                root_closed = depth == 0;
                if let Some(tag) = Tag::from_local_name(e.local_name().as_ref()) {
                    let value = text.trim();
                    state.on_end(tag, (!value.is_empty()).then_some(value));
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(DecodeError::Xml {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    if depth > 0 {
        return Err(DecodeError::UnclosedElements { open: depth });
    }

    let publication = state.finish();
    debug!(
        records = publication.records.len(),
        publication_time = ?publication.publication_time,
        "decoded situation publication"
    );
    Ok(publication)
}

/// Decode a document held in memory.
pub fn decode_slice(bytes: &[u8]) -> Result<Publication, DecodeError> {
    decode(bytes)
}

/// Decode a document held in a string.
pub fn decode_str(xml: &str) -> Result<Publication, DecodeError> {
    decode(xml.as_bytes())
}
