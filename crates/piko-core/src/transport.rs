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

use crate::errors::{TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, trace};

/// Raw HTTP response from the inverter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Fetches pages from the inverter's web server
#[async_trait]
pub trait Transport: Send + Sync {
    fn base_url(&self) -> &str;

    async fn fetch(&self, path: &str) -> TransportResult<FetchResponse>;
}

/// reqwest-based transport.
///
/// Certificate validation is disabled: the inverters ship self-signed
/// certificates when HTTPS is enabled.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(base_url: impl Into<String>) -> TransportResult<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_owned();
        debug!("Created HTTP client with base url {}", base_url);

        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    fn classify(&self, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, path: &str) -> TransportResult<FetchResponse> {
        let url = format!("{}{}", self.base_url, path);
        trace!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/xml")
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        debug!("request to {} with status {}", url, status);
        Ok(FetchResponse { status, body })
    }
}
