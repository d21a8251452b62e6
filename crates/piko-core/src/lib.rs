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

pub mod converter;
pub mod document;
pub mod errors;
pub mod extractor;
pub mod kostal;
pub mod poll;
pub mod publisher;
pub mod scheduler;
pub mod schema;
pub mod selector;
pub mod store;
pub mod timer;
pub mod transport;

pub use converter::{TypedValue, convert};
pub use document::Document;
pub use errors::*;
pub use extractor::{FieldExtraction, RawExtraction, extract};
pub use kostal::{CONNECTION_STATE_ID, PIKO_MP_PLUS_FIELDS, STATUS_ENDPOINT};
pub use poll::{FailureReason, PollCycle, PollOutcome, PollReport};
pub use publisher::{StaleFieldPolicy, StatePublisher};
pub use scheduler::{
    RetryPolicy, RetryScheduler, ScheduledPoll, SchedulerState, StopReason, Transition, WaitKind,
};
pub use schema::{FieldDescriptor, FieldSchema, SchemaField, SemanticType};
pub use selector::Selector;
pub use store::{
    MemoryStateStore, ObjectMetadata, StateStore, StateValue, StoreOperation, StoredState,
    ValueType,
};
pub use timer::{Timer, TokioTimer};
pub use transport::{FetchResponse, HttpTransport, Transport};
