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

//! Error types for the polling engine

use thiserror::Error;

/// Selector expression could not be compiled
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,

    #[error("selector '{selector}' is not valid XPath: {message}")]
    Invalid { selector: String, message: String },
}

/// Static field table failed validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field table is empty")]
    Empty,

    #[error("field at position {index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate field id '{0}'")]
    DuplicateId(String),

    #[error("field '{0}' has an empty value selector")]
    EmptyValueSelector(String),

    #[error("field '{field}' has an invalid selector: {source}")]
    InvalidSelector {
        field: String,
        #[source]
        source: SelectorError,
    },

    #[error("unknown value type '{0}', expected 'number' or 'string'")]
    UnknownType(String),
}

/// Response body could not be parsed as XML
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document is empty")]
    Empty,

    #[error("document has no root element")]
    NoRootElement,

    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

/// Per-field extraction failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("field '{field}': unit selector '{selector}' matched nothing")]
    MissingUnit { field: String, selector: String },
}

/// Raw value could not be converted to the declared type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("'{raw}' is not a valid number")]
    InvalidNumber { raw: String },

    #[error("'{raw}' is not a finite number")]
    NonFinite { raw: String },
}

/// Failure of the HTTP transport below the status-code level
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Failure reported by a state store backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object '{0}' does not exist")]
    ObjectNotFound(String),

    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected '{id}': {reason}")]
    Rejected { id: String, reason: String },
}

/// Field-level failure during publication of one poll
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("field '{field}': {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },

    #[error("field '{field}': {source}")]
    Store {
        field: String,
        #[source]
        source: StoreError,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type TransportResult<T> = std::result::Result<T, TransportError>;
