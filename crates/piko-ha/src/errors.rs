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

use piko_core::StoreError;
use thiserror::Error;

/// Home Assistant API error types
#[derive(Error, Debug)]
pub enum HaError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HA API returned error status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Connection timeout")]
    Timeout,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type HaResult<T> = Result<T, HaError>;

impl HaError {
    /// Map onto the store error taxonomy for object `id`
    pub fn into_store_error(self, id: &str) -> StoreError {
        match self {
            Self::EntityNotFound(_) => StoreError::ObjectNotFound(id.to_owned()),
            Self::AuthenticationFailed => StoreError::Rejected {
                id: id.to_owned(),
                reason: "authentication failed".to_owned(),
            },
            Self::ApiError { status, message } if (400..500).contains(&status) => {
                StoreError::Rejected {
                    id: id.to_owned(),
                    reason: format!("status {status}: {message}"),
                }
            }
            e @ (Self::ApiError { .. }
            | Self::HttpError(_)
            | Self::InvalidResponse(_)
            | Self::JsonError(_)
            | Self::Timeout
            | Self::ConfigError(_)) => StoreError::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_rejections() {
        let err = HaError::ApiError {
            status: 400,
            message: "bad state".to_owned(),
        };
        assert_eq!(
            err.into_store_error("Measurements.AC_Power"),
            StoreError::Rejected {
                id: "Measurements.AC_Power".to_owned(),
                reason: "status 400: bad state".to_owned(),
            }
        );
    }

    #[test]
    fn test_server_errors_mean_unavailable() {
        let err = HaError::ApiError {
            status: 502,
            message: String::new(),
        };
        assert!(matches!(
            err.into_store_error("x"),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            HaError::Timeout.into_store_error("x"),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_missing_entity_maps_to_object_id() {
        assert_eq!(
            HaError::EntityNotFound("sensor.piko_device_name".to_owned()).into_store_error("Device.Name"),
            StoreError::ObjectNotFound("Device.Name".to_owned())
        );
    }
}
