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

use crate::document::Document;
use crate::errors::ExtractError;
use crate::schema::{FieldDescriptor, FieldSchema, SchemaField};
use tracing::trace;

/// What the document held for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExtraction {
    /// Value node not present in this poll
    Absent,
    Present { value: String, unit: Option<String> },
    /// Value found but the declared unit node is missing
    Invalid(ExtractError),
}

/// Extraction result for one descriptor
#[derive(Debug, Clone)]
pub struct RawExtraction<'a> {
    pub descriptor: &'a FieldDescriptor,
    pub outcome: FieldExtraction,
}

impl RawExtraction<'_> {
    pub fn raw_value(&self) -> Option<&str> {
        match &self.outcome {
            FieldExtraction::Present { value, .. } => Some(value),
            FieldExtraction::Absent | FieldExtraction::Invalid(_) => None,
        }
    }

    pub fn raw_unit(&self) -> Option<&str> {
        match &self.outcome {
            FieldExtraction::Present { unit, .. } => unit.as_deref(),
            FieldExtraction::Absent | FieldExtraction::Invalid(_) => None,
        }
    }
}

/// Run every field of the schema against the document.
///
/// Returns exactly one entry per field, in schema order.
pub fn extract<'a>(doc: &Document, schema: &'a FieldSchema) -> Vec<RawExtraction<'a>> {
    schema
        .fields()
        .iter()
        .map(|field| RawExtraction {
            descriptor: &field.descriptor,
            outcome: extract_field(doc, field),
        })
        .collect()
}

fn extract_field(doc: &Document, field: &SchemaField) -> FieldExtraction {
    let Some(value) = field.value.select_first(doc) else {
        trace!("{} not present in document", field.descriptor.id);
        return FieldExtraction::Absent;
    };

    let unit = match &field.unit {
        None => None,
        Some(selector) => match selector.select_first(doc) {
            Some(unit) => Some(unit),
            None => {
                return FieldExtraction::Invalid(ExtractError::MissingUnit {
                    field: field.descriptor.id.to_owned(),
                    selector: selector.to_string(),
                });
            }
        },
    };

    FieldExtraction::Present { value, unit }
}
