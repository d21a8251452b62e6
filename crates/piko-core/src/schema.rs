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

use crate::errors::SchemaError;
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Value type a field is published as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Number,
    #[default]
    String,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            _ => Err(SchemaError::UnknownType(s.to_owned())),
        }
    }
}

/// Declaration of one published measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Object id in the state store (e.g. "Measurements.AC_Power")
    pub id: &'static str,
    pub name: &'static str,
    pub value_selector: &'static str,
    pub unit_selector: Option<&'static str>,
    pub semantic_type: SemanticType,
    pub read: bool,
    pub write: bool,
    pub role: &'static str,
}

impl FieldDescriptor {
    /// Read-only string field with role "state"
    pub const fn new(id: &'static str, name: &'static str, value_selector: &'static str) -> Self {
        Self {
            id,
            name,
            value_selector,
            unit_selector: None,
            semantic_type: SemanticType::String,
            read: true,
            write: false,
            role: "state",
        }
    }

    pub const fn number(mut self) -> Self {
        self.semantic_type = SemanticType::Number;
        self
    }

    pub const fn unit(mut self, selector: &'static str) -> Self {
        self.unit_selector = Some(selector);
        self
    }

    pub const fn role(mut self, role: &'static str) -> Self {
        self.role = role;
        self
    }
}

/// A descriptor with its selectors validated
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub descriptor: FieldDescriptor,
    pub value: Selector,
    pub unit: Option<Selector>,
}

/// Validated, ordered field table
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<SchemaField>,
}

impl FieldSchema {
    /// Validate and compile a static field table.
    ///
    /// Ids must be unique and non-empty, value selectors non-empty, and every
    /// selector must compile.
    pub fn new(descriptors: &[FieldDescriptor]) -> Result<Self, SchemaError> {
        if descriptors.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.id.trim().is_empty() {
                return Err(SchemaError::EmptyId { index });
            }
            if !seen.insert(descriptor.id) {
                return Err(SchemaError::DuplicateId(descriptor.id.to_owned()));
            }
            if descriptor.value_selector.trim().is_empty() {
                return Err(SchemaError::EmptyValueSelector(descriptor.id.to_owned()));
            }

            let compile = |source: &str| {
                Selector::parse(source).map_err(|source| SchemaError::InvalidSelector {
                    field: descriptor.id.to_owned(),
                    source,
                })
            };

            fields.push(SchemaField {
                descriptor: *descriptor,
                value: compile(descriptor.value_selector)?,
                unit: descriptor.unit_selector.map(compile).transpose()?,
            });
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.descriptor.id == id)
    }

    /// Markdown table of the schema for diagnostic logging
    pub fn markdown_table(&self) -> String {
        let mut table = String::from("\n|Id|Name|Value Type|xPath Value|xPath Unit|\n|---|---|---|---|---|\n");
        for field in &self.fields {
            let d = &field.descriptor;
            table.push_str(&format!(
                "|{}|{}|{}|{}|{}|\n",
                d.id,
                d.name,
                d.semantic_type,
                d.value_selector,
                d.unit_selector.unwrap_or("-")
            ));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POWER: FieldDescriptor = FieldDescriptor::new("power", "Power", "//Power/@Value").number();

    #[test]
    fn test_descriptor_defaults() {
        let field = FieldDescriptor::new("serial", "Serial", "//Device/@Serial");
        assert_eq!(field.semantic_type, SemanticType::String);
        assert!(field.read);
        assert!(!field.write);
        assert_eq!(field.role, "state");
        assert_eq!(field.unit_selector, None);
    }

    #[test]
    fn test_schema_preserves_order() {
        let schema = FieldSchema::new(&[
            POWER,
            FieldDescriptor::new("serial", "Serial", "//Device/@Serial"),
        ])
        .unwrap();

        let ids: Vec<_> = schema.fields().iter().map(|f| f.descriptor.id).collect();
        assert_eq!(ids, vec!["power", "serial"]);
        assert_eq!(schema.len(), 2);
        assert!(schema.get("serial").is_some());
    }

    #[test]
    fn test_schema_rejects_duplicate_ids() {
        let err = FieldSchema::new(&[POWER, POWER]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateId("power".to_owned()));
    }

    #[test]
    fn test_schema_rejects_empty_selector() {
        let err = FieldSchema::new(&[FieldDescriptor::new("x", "X", " ")]).unwrap_err();
        assert_eq!(err, SchemaError::EmptyValueSelector("x".to_owned()));
    }

    #[test]
    fn test_schema_rejects_empty_id_and_table() {
        assert_eq!(FieldSchema::new(&[]).unwrap_err(), SchemaError::Empty);
        assert_eq!(
            FieldSchema::new(&[FieldDescriptor::new("", "X", "//a")]).unwrap_err(),
            SchemaError::EmptyId { index: 0 }
        );
    }

    #[test]
    fn test_schema_rejects_bad_unit_selector() {
        let field = POWER.unit("//Power[@Unit");
        assert!(matches!(
            FieldSchema::new(&[field]),
            Err(SchemaError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_semantic_type_from_str() {
        assert_eq!("Number".parse::<SemanticType>().unwrap(), SemanticType::Number);
        assert_eq!("string".parse::<SemanticType>().unwrap(), SemanticType::String);
        assert_eq!(
            "boolean".parse::<SemanticType>().unwrap_err(),
            SchemaError::UnknownType("boolean".to_owned())
        );
    }

    #[test]
    fn test_markdown_table() {
        let schema = FieldSchema::new(&[
            POWER.unit("//Power/@Unit"),
            FieldDescriptor::new("serial", "Serial", "//Device/@Serial"),
        ])
        .unwrap();

        let table = schema.markdown_table();
        assert!(table.contains("|Id|Name|Value Type|xPath Value|xPath Unit|"));
        assert!(table.contains("|power|Power|number|//Power/@Value|//Power/@Unit|"));
        assert!(table.contains("|serial|Serial|string|//Device/@Serial|-|"));
    }
}
