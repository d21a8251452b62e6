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

use crate::errors::ConversionError;
use crate::schema::SemanticType;
use crate::store::StateValue;
use tracing::trace;

/// Converted field value ready for publication
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: StateValue,
    pub unit: Option<String>,
}

/// Coerce raw document text into the declared type.
///
/// Numbers must be finite decimal literals; the device reports unavailable
/// readings as "nan", which is rejected rather than published.
pub fn convert(raw: &str, semantic_type: SemanticType) -> Result<StateValue, ConversionError> {
    trace!("Converting '{}' to {}", raw, semantic_type);

    match semantic_type {
        SemanticType::String => Ok(StateValue::String(raw.to_owned())),
        SemanticType::Number => {
            let trimmed = raw.trim();
            let number: f64 = trimmed
                .parse()
                .map_err(|_| ConversionError::InvalidNumber {
                    raw: raw.to_owned(),
                })?;
            if !number.is_finite() {
                return Err(ConversionError::NonFinite {
                    raw: raw.to_owned(),
                });
            }
            Ok(StateValue::Number(number))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_number() {
        assert_eq!(
            convert("123.4", SemanticType::Number).unwrap(),
            StateValue::Number(123.4)
        );
        assert_eq!(
            convert(" 523 ", SemanticType::Number).unwrap(),
            StateValue::Number(523.0)
        );
        assert_eq!(
            convert("-0.75", SemanticType::Number).unwrap(),
            StateValue::Number(-0.75)
        );
    }

    #[test]
    fn test_convert_malformed_number_is_an_error() {
        assert_eq!(
            convert("abc", SemanticType::Number).unwrap_err(),
            ConversionError::InvalidNumber {
                raw: "abc".to_owned()
            }
        );
        assert!(matches!(
            convert("", SemanticType::Number),
            Err(ConversionError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_convert_nan_is_rejected() {
        assert_eq!(
            convert("nan", SemanticType::Number).unwrap_err(),
            ConversionError::NonFinite {
                raw: "nan".to_owned()
            }
        );
        assert!(matches!(
            convert("inf", SemanticType::Number),
            Err(ConversionError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_convert_string_is_unchanged() {
        let raw = "  PIKO 5.5 MP plus\t&ü ";
        assert_eq!(
            convert(raw, SemanticType::String).unwrap(),
            StateValue::String(raw.to_owned())
        );
    }

    #[test]
    fn test_number_formats_back_to_source() {
        for raw in ["123.4", "0.001", "49.977", "4200", "-12.5", "1234567.89"] {
            let StateValue::Number(value) = convert(raw, SemanticType::Number).unwrap() else {
                panic!("expected number for {raw}");
            };
            assert_eq!(value.to_string(), raw);
        }
    }
}
