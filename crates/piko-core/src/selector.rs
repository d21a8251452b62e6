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

//! XPath 1.0 selectors over [`Document`], evaluated from the document root

use crate::document::Document;
use crate::errors::SelectorError;
use std::fmt;
use sxd_xpath::{Context, Factory, Value, XPath};
use tracing::debug;

/// Validated XPath expression.
///
/// Compiled expressions are not `Send`, so only the source is kept and the
/// expression is rebuilt for each evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }
        compile(source)?;
        Ok(Self {
            source: source.to_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// String value of the first match in document order.
    ///
    /// `None` when nothing matches. Scalar results count as a match unless
    /// they are an empty string or NaN.
    pub fn select_first(&self, doc: &Document) -> Option<String> {
        let xpath = match compile(&self.source) {
            Ok(xpath) => xpath,
            Err(e) => {
                debug!("{}", e);
                return None;
            }
        };

        let dom = doc.dom();
        let context = Context::new();
        match xpath.evaluate(&context, dom.root()) {
            Ok(Value::Nodeset(nodes)) => nodes.document_order_first().map(|node| node.string_value()),
            Ok(Value::String(text)) => (!text.is_empty()).then_some(text),
            Ok(Value::Number(number)) => (!number.is_nan()).then(|| number.to_string()),
            Ok(Value::Boolean(flag)) => Some(flag.to_string()),
            Err(e) => {
                debug!("selector '{}' failed: {}", self.source, e);
                None
            }
        }
    }
}

fn compile(source: &str) -> Result<XPath, SelectorError> {
    match Factory::new().build(source) {
        Ok(Some(xpath)) => Ok(xpath),
        Ok(None) => Err(SelectorError::Empty),
        Err(e) => Err(SelectorError::Invalid {
            selector: source.to_owned(),
            message: e.to_string(),
        }),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
