// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PikoBridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Parsed status page.
//!
//! The tree itself is an `sxd-document` package. Parsing is lenient: when the
//! body breaks off after the root element has opened, the elements that are
//! still open get closed and everything read so far is kept.

use crate::errors::DocumentError;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt;
use sxd_document::Package;
use sxd_document::parser;
use tracing::warn;

/// Parsed XML document
pub struct Document {
    package: Package,
    truncated: bool,
}

impl Document {
    /// Parse an XML body.
    ///
    /// Fails only when the body is empty or no root element could be read.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        if xml.trim().is_empty() {
            return Err(DocumentError::Empty);
        }

        let strict_error = match parser::parse(xml) {
            Ok(package) => {
                return Ok(Self {
                    package,
                    truncated: false,
                });
            }
            Err(e) => e.to_string(),
        };

        let repaired = match close_open_elements(xml) {
            Repair::Closed { xml: repaired, at } => {
                warn!(
                    "⚠️ [XML] Document truncated at byte {}: {} - keeping partial tree",
                    at, strict_error
                );
                repaired
            }
            Repair::NoRoot => return Err(DocumentError::NoRootElement),
            Repair::Unchanged { at } => {
                return Err(DocumentError::Malformed {
                    position: at,
                    message: strict_error,
                });
            }
        };

        parser::parse(&repaired)
            .map(|package| Self {
                package,
                truncated: true,
            })
            .map_err(|e| DocumentError::Malformed {
                position: 0,
                message: e.to_string(),
            })
    }

    /// True when a syntax error cut the parse short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Name of the root element
    pub fn root_name(&self) -> Option<String> {
        self.dom()
            .root()
            .children()
            .into_iter()
            .find_map(|child| child.element())
            .map(|element| element.name().local_part().to_owned())
    }

    pub(crate) fn dom(&self) -> sxd_document::dom::Document<'_> {
        self.package.as_document()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root_name())
            .field("truncated", &self.truncated)
            .finish()
    }
}

enum Repair {
    /// Valid prefix with the open elements closed; `at` is where it was cut
    Closed { xml: String, at: u64 },
    NoRoot,
    /// Nothing to close, the body is broken some other way
    Unchanged { at: u64 },
}

/// Scan up to the first syntax error and close whatever is still open there
fn close_open_elements(xml: &str) -> Repair {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut valid_until = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                seen_root = true;
                open.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
            }
            Ok(Event::Empty(_)) => seen_root = true,
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
        valid_until = usize::try_from(reader.buffer_position()).unwrap_or(valid_until);
    }

    let at = u64::try_from(valid_until).unwrap_or(u64::MAX);
    if !seen_root {
        return Repair::NoRoot;
    }
    if open.is_empty() {
        return Repair::Unchanged { at };
    }

    let Some(prefix) = xml.get(..valid_until) else {
        return Repair::Unchanged { at };
    };
    let mut repaired = prefix.to_owned();
    for name in open.iter().rev() {
        repaired.push_str("</");
        repaired.push_str(name);
        repaired.push('>');
    }
    Repair::Closed { xml: repaired, at }
}
