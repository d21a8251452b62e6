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

//! One fetch → extract → convert → publish pass

use crate::converter::{TypedValue, convert};
use crate::document::Document;
use crate::errors::{DocumentError, FieldError, TransportError};
use crate::extractor::{FieldExtraction, RawExtraction, extract};
use crate::kostal::STATUS_ENDPOINT;
use crate::publisher::StatePublisher;
use crate::schema::FieldSchema;
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a poll failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureReason {
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("parse error: {0}")]
    ParseError(#[from] DocumentError),
}

/// Per-poll field statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub published: usize,
    pub absent: usize,
    pub deleted: usize,
    pub field_errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Success(PollReport),
    Failure(FailureReason),
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Fetches the status page once and publishes every field found on it
pub struct PollCycle {
    transport: Arc<dyn Transport>,
    schema: Arc<FieldSchema>,
    publisher: StatePublisher,
    endpoint: String,
}

impl PollCycle {
    pub fn new(
        transport: Arc<dyn Transport>,
        schema: Arc<FieldSchema>,
        publisher: StatePublisher,
    ) -> Self {
        Self {
            transport,
            schema,
            publisher,
            endpoint: STATUS_ENDPOINT.to_owned(),
        }
    }

    /// Poll a different page than `/all.xml`
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Run one cycle.
    ///
    /// Transport, status and parse failures never escape: they are returned
    /// as [`PollOutcome::Failure`] after the connection indicator is cleared.
    pub async fn run(&mut self) -> PollOutcome {
        debug!(
            "📡 [POLL] Refreshing states from {}{}",
            self.transport.base_url(),
            self.endpoint
        );

        let response = match self.transport.fetch(&self.endpoint).await {
            Ok(response) => response,
            Err(e) => return self.fail(e.into()).await,
        };

        if response.status != 200 {
            return self
                .fail(FailureReason::UnexpectedStatus(response.status))
                .await;
        }

        // The parsed tree is not Send, so extraction finishes before any await
        let schema = Arc::clone(&self.schema);
        let parsed = Document::parse(&response.body).map(|doc| extract(&doc, &schema));
        let extracted = match parsed {
            Ok(extracted) => extracted,
            Err(e) => return self.fail(e.into()).await,
        };

        self.publish_connection(true).await;

        let report = self.publish_fields(extracted).await;
        if report.field_errors.is_empty() {
            info!(
                "✅ [POLL] Published {} fields ({} absent)",
                report.published, report.absent
            );
        } else {
            warn!(
                "⚠️ [POLL] Published {} fields ({} absent, {} failed)",
                report.published,
                report.absent,
                report.field_errors.len()
            );
        }
        PollOutcome::Success(report)
    }

    async fn publish_fields(&mut self, extracted: Vec<RawExtraction<'_>>) -> PollReport {
        let mut report = PollReport::default();

        for extraction in extracted {
            let descriptor = extraction.descriptor;

            match extraction.outcome {
                FieldExtraction::Absent => {
                    report.absent += 1;
                    match self.publisher.handle_absent(descriptor).await {
                        Ok(true) => report.deleted += 1,
                        Ok(false) => {}
                        Err(source) => {
                            warn!("⚠️ [POLL] Failed to remove stale {}: {}", descriptor.id, source);
                            report.field_errors.push(FieldError::Store {
                                field: descriptor.id.to_owned(),
                                source,
                            });
                        }
                    }
                }
                FieldExtraction::Invalid(e) => {
                    error!("❌ [POLL] {}", e);
                    report.field_errors.push(e.into());
                }
                FieldExtraction::Present { value, unit } => {
                    debug!("found state {} - {}", descriptor.id, value);

                    let converted = match convert(&value, descriptor.semantic_type) {
                        Ok(converted) => converted,
                        Err(source) => {
                            warn!("⚠️ [POLL] Skipping {}: {}", descriptor.id, source);
                            report.field_errors.push(FieldError::Conversion {
                                field: descriptor.id.to_owned(),
                                source,
                            });
                            continue;
                        }
                    };

                    let typed = TypedValue {
                        value: converted,
                        unit,
                    };
                    match self.publisher.publish(descriptor, &typed).await {
                        Ok(()) => report.published += 1,
                        Err(source) => {
                            warn!("⚠️ [POLL] Failed to publish {}: {}", descriptor.id, source);
                            report.field_errors.push(FieldError::Store {
                                field: descriptor.id.to_owned(),
                                source,
                            });
                        }
                    }
                }
            }
        }

        report
    }

    async fn fail(&mut self, reason: FailureReason) -> PollOutcome {
        match &reason {
            FailureReason::TransportError(e) => error!("❌ [POLL] error message: {}", e),
            FailureReason::UnexpectedStatus(status) => {
                error!("❌ [POLL] unexpected status code: {}", status);
            }
            FailureReason::ParseError(e) => error!("❌ [POLL] invalid status page: {}", e),
        }
        self.publish_connection(false).await;
        PollOutcome::Failure(reason)
    }

    /// Publish the connection indicator; store failures are only logged
    pub async fn publish_connection(&mut self, connected: bool) {
        if let Err(e) = self.publisher.publish_connection(connected).await {
            warn!("⚠️ [POLL] Failed to publish connection state {}: {}", connected, e);
        }
    }
}

impl fmt::Debug for PollCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollCycle")
            .field("base_url", &self.transport.base_url())
            .field("endpoint", &self.endpoint)
            .field("fields", &self.schema.len())
            .field("publisher", &self.publisher)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::errors::{TransportError, TransportResult};
    use crate::transport::{FetchResponse, Transport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport returning scripted responses; repeats the last one when exhausted
    #[derive(Debug)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<TransportResult<FetchResponse>>>,
        last: Mutex<Option<TransportResult<FetchResponse>>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<TransportResult<FetchResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn ok(body: &str) -> TransportResult<FetchResponse> {
            Ok(FetchResponse {
                status: 200,
                body: body.to_owned(),
            })
        }

        pub(crate) fn status(status: u16) -> TransportResult<FetchResponse> {
            Ok(FetchResponse {
                status,
                body: String::new(),
            })
        }

        pub(crate) fn refused() -> TransportResult<FetchResponse> {
            Err(TransportError::Connect("connection refused".to_owned()))
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn base_url(&self) -> &str {
            "http://inverter.test"
        }

        async fn fetch(&self, path: &str) -> TransportResult<FetchResponse> {
            self.calls.lock().push(path.to_owned());
            let next = self.responses.lock().pop_front();
            match next {
                Some(response) => {
                    *self.last.lock() = Some(response.clone());
                    response
                }
                None => self
                    .last
                    .lock()
                    .clone()
                    .unwrap_or_else(|| Err(TransportError::Request("no scripted response".to_owned()))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedTransport;
    use super::*;
    use crate::errors::ConversionError;
    use crate::kostal::CONNECTION_STATE_ID;
    use crate::schema::FieldDescriptor;
    use crate::store::{MemoryStateStore, StateValue, StoreOperation};

    const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::new("power", "Power", "//Power/@Value")
            .number()
            .unit("//Power/@Unit"),
        FieldDescriptor::new("name", "Name", "//Device/@Name"),
        FieldDescriptor::new("limit", "Limit", "//Device/@Limit").number(),
    ];

    fn cycle(transport: ScriptedTransport) -> (Arc<ScriptedTransport>, Arc<MemoryStateStore>, PollCycle) {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStateStore::new());
        let schema = Arc::new(FieldSchema::new(FIELDS).unwrap());
        let cycle = PollCycle::new(
            transport.clone(),
            schema,
            StatePublisher::new(store.clone()),
        );
        (transport, store, cycle)
    }

    #[tokio::test]
    async fn test_success_publishes_fields_and_connection() {
        let (transport, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"<root><Device Name="PIKO 5.5"/><Power Value="523" Unit="W"/></root>"#,
        )]));

        let outcome = cycle.run().await;
        let PollOutcome::Success(report) = outcome else {
            panic!("expected success, got {outcome:?}");
        };

        assert_eq!(report.published, 2);
        assert_eq!(report.absent, 1);
        assert!(report.field_errors.is_empty());
        assert_eq!(transport.calls.lock().as_slice(), ["/all.xml"]);

        assert_eq!(store.value("power"), Some(StateValue::Number(523.0)));
        assert_eq!(store.object("power").unwrap().unit.as_deref(), Some("W"));
        assert_eq!(store.value("name"), Some(StateValue::String("PIKO 5.5".to_owned())));
        assert!(store.object("limit").is_none());
        assert_eq!(store.value(CONNECTION_STATE_ID), Some(StateValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_connection_published_before_fields() {
        let (_, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"<Power Value="1" Unit="W"/>"#,
        )]));
        cycle.run().await;

        let writes: Vec<_> = store
            .journal()
            .into_iter()
            .filter_map(|op| match op {
                StoreOperation::Write { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![CONNECTION_STATE_ID.to_owned(), "power".to_owned()]);
    }

    #[tokio::test]
    async fn test_unexpected_status_is_failure_without_field_writes() {
        let (_, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::status(500)]));

        assert_eq!(
            cycle.run().await,
            PollOutcome::Failure(FailureReason::UnexpectedStatus(500))
        );
        assert_eq!(store.value(CONNECTION_STATE_ID), Some(StateValue::Bool(false)));
        assert_eq!(store.object_ids(), vec![CONNECTION_STATE_ID.to_owned()]);
    }

    #[tokio::test]
    async fn test_transport_error_is_classified() {
        let (_, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::refused()]));

        assert!(matches!(
            cycle.run().await,
            PollOutcome::Failure(FailureReason::TransportError(TransportError::Connect(_)))
        ));
        assert_eq!(store.value(CONNECTION_STATE_ID), Some(StateValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_parse_error() {
        let (_, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::ok(
            "<<< not xml",
        )]));

        assert!(matches!(
            cycle.run().await,
            PollOutcome::Failure(FailureReason::ParseError(_))
        ));
        assert_eq!(store.value(CONNECTION_STATE_ID), Some(StateValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_conversion_error_skips_only_that_field() {
        let (_, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"<root><Device Name="PIKO" Limit="nan"/><Power Value="abc" Unit="W"/></root>"#,
        )]));

        let PollOutcome::Success(report) = cycle.run().await else {
            panic!("expected success");
        };

        assert_eq!(report.published, 1);
        assert_eq!(
            report.field_errors,
            vec![
                FieldError::Conversion {
                    field: "power".to_owned(),
                    source: ConversionError::InvalidNumber {
                        raw: "abc".to_owned()
                    },
                },
                FieldError::Conversion {
                    field: "limit".to_owned(),
                    source: ConversionError::NonFinite {
                        raw: "nan".to_owned()
                    },
                },
            ]
        );
        assert!(store.object("power").is_none());
        assert_eq!(store.value("name"), Some(StateValue::String("PIKO".to_owned())));
    }

    #[tokio::test]
    async fn test_missing_unit_node_skips_field() {
        let (_, store, mut cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"<Power Value="12"/>"#,
        )]));

        let PollOutcome::Success(report) = cycle.run().await else {
            panic!("expected success");
        };
        assert_eq!(report.published, 0);
        assert_eq!(report.field_errors.len(), 1);
        assert!(store.object("power").is_none());
    }

    #[tokio::test]
    async fn test_custom_endpoint() {
        let (transport, _, cycle) = cycle(ScriptedTransport::new(vec![ScriptedTransport::status(404)]));
        let mut cycle = cycle.with_endpoint("/measurements.xml");
        cycle.run().await;
        assert_eq!(transport.calls.lock().as_slice(), ["/measurements.xml"]);
    }
}
