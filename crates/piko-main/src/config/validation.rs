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

use std::fmt;

/// Outcome of [`AppConfig::validate_detailed`](super::AppConfig::validate_detailed)
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Polling must not start while any of these remain
    pub errors: Vec<ValidationIssue>,
    /// Accepted, but probably not what the operator meant
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All errors on one line, in the order they were found
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[cfg(test)]
    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|issue| issue.field == field)
    }
}

/// One problem with one setting, keyed by its dotted path (`polling.interval_ms`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut result = ValidationResult::default();
        result.add_warning("polling.max_retries", "no retries");

        assert!(!result.has_errors());
        assert_eq!(result.error_summary(), "");
    }

    #[test]
    fn test_error_summary_keeps_order() {
        let mut result = ValidationResult::default();
        result.add_error("inverter.host", "missing");
        result.add_error("inverter.port", "must not be 0");

        assert!(result.has_error_for("inverter.port"));
        assert!(!result.has_error_for("polling.interval_ms"));
        assert_eq!(
            result.error_summary(),
            "inverter.host: missing; inverter.port: must not be 0"
        );
    }
}
