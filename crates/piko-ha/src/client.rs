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

use crate::errors::{HaError, HaResult};
use crate::types::{HaEntityState, HaStateUpdate};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Base URL of the Home Assistant core API behind the Supervisor proxy
pub const SUPERVISOR_BASE_URL: &str = "http://supervisor/core";

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HomeAssistantClient {
    /// Create a new HA client with custom configuration
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Create HA client using Supervisor API environment variables
    /// This is the standard method for HA addons
    pub fn from_supervisor() -> HaResult<Self> {
        let token = std::env::var("SUPERVISOR_TOKEN").map_err(|_| {
            HaError::ConfigError(
                "SUPERVISOR_TOKEN environment variable not set. Are you running as an HA addon?"
                    .to_owned(),
            )
        })?;

        info!("Initializing HA client using Supervisor API");
        Self::new(SUPERVISOR_BASE_URL, token)
    }

    /// Create HA client from configuration values
    /// Falls back to the Supervisor environment, then to HA_BASE_URL/HA_TOKEN
    pub fn from_config(ha_base_url: Option<String>, ha_token: Option<String>) -> HaResult<Self> {
        if ha_token.is_none() && std::env::var("SUPERVISOR_TOKEN").is_ok() {
            return Self::from_supervisor();
        }

        let base_url = ha_base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| "http://localhost:8123".to_owned());

        let token = ha_token
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config or HA_TOKEN environment variable".to_owned(),
                )
            })?;

        info!("Initializing HA client from configuration: {}", base_url);
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the state of a specific entity
    pub async fn get_state(&self, entity_id: &str) -> HaResult<HaEntityState> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        debug!("🔍 [HA QUERY] Getting state for entity: {}", entity_id);
        trace!("   URL: {}", url);

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let state = response.json::<HaEntityState>().await?;
                debug!("✅ [HA RESULT] Entity: {} = '{}'", entity_id, state.state);
                trace!("   Attributes: {:?}", state.attributes);
                Ok(state)
            }
            StatusCode::NOT_FOUND => {
                debug!("🔍 [HA QUERY] Entity not registered yet: {}", entity_id);
                Err(HaError::EntityNotFound(entity_id.to_owned()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!(
                    "❌ [HA ERROR] Authentication failed for entity: {}",
                    entity_id
                );
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA ERROR] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Create or update an entity state.
    ///
    /// Returns true when Home Assistant created the entity.
    pub async fn set_state(
        &self,
        entity_id: &str,
        state: &str,
        attributes: &Map<String, Value>,
    ) -> HaResult<bool> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        let body = HaStateUpdate { state, attributes };
        trace!("📤 [HA WRITE] {} = '{}'", entity_id, state);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(false),
            StatusCode::CREATED => {
                debug!("✅ [HA WRITE] Created entity {}", entity_id);
                Ok(true)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA ERROR] Authentication failed writing: {}", entity_id);
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!(
                    "❌ [HA ERROR] Failed to write {} (status {}): {}",
                    entity_id, status, error_text
                );
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Remove an entity state
    pub async fn delete_state(&self, entity_id: &str) -> HaResult<()> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        info!("🗑️ [HA DELETE] Removing entity: {}", entity_id);

        let response = self
            .retry_request(|| async {
                self.client
                    .delete(&url)
                    .bearer_auth(&self.token)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(HaError::EntityNotFound(entity_id.to_owned())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::AuthenticationFailed),
            status => Err(HaError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Health check - ping HA API; failures are logged, never returned
    pub async fn ping(&self) -> bool {
        let url = format!("{}/api/", self.base_url);
        debug!("Performing health check");

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let is_ok = response.status().is_success();
                if is_ok {
                    debug!("Health check passed");
                } else {
                    warn!("Health check failed: status {}", response.status());
                }
                is_ok
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> HaResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    if e.is_timeout() {
                        return Err(HaError::Timeout);
                    }
                    return Err(HaError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

impl fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
