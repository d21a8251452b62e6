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

use crate::converter::TypedValue;
use crate::errors::StoreResult;
use crate::kostal::CONNECTION_STATE_ID;
use crate::schema::FieldDescriptor;
use crate::store::{ObjectMetadata, StateStore, StateValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// What happens to a field's object when the field disappears from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleFieldPolicy {
    /// Leave the object with its last value
    #[default]
    Keep,
    /// Delete objects this instance created once the field is absent
    Delete,
}

/// Writes converted values into the state store.
///
/// Object creation is idempotent; ids ensured by this publisher are cached so
/// steady-state polls issue a single write per field.
pub struct StatePublisher {
    store: Arc<dyn StateStore>,
    stale_policy: StaleFieldPolicy,
    ensured: HashSet<String>,
}

impl StatePublisher {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            stale_policy: StaleFieldPolicy::default(),
            ensured: HashSet::new(),
        }
    }

    pub fn with_stale_policy(mut self, policy: StaleFieldPolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Ensure the field's object exists, then write the value acknowledged
    pub async fn publish(&mut self, descriptor: &FieldDescriptor, typed: &TypedValue) -> StoreResult<()> {
        let metadata = ObjectMetadata::for_field(descriptor, typed.unit.as_deref());
        self.ensure(descriptor.id, &metadata).await?;

        debug!("{} = {} ({})", descriptor.id, typed.value, descriptor.semantic_type);
        self.write(descriptor.id, &typed.value).await
    }

    /// Write the `info.connection` indicator
    pub async fn publish_connection(&mut self, connected: bool) -> StoreResult<()> {
        self.ensure(CONNECTION_STATE_ID, &ObjectMetadata::connection_indicator())
            .await?;
        self.write(CONNECTION_STATE_ID, &StateValue::Bool(connected))
            .await
    }

    /// Apply the stale-field policy to a field missing from this poll.
    ///
    /// Returns true when an object was deleted.
    pub async fn handle_absent(&mut self, descriptor: &FieldDescriptor) -> StoreResult<bool> {
        match self.stale_policy {
            StaleFieldPolicy::Keep => {
                trace!("{} has no value so we ignore it", descriptor.id);
                Ok(false)
            }
            StaleFieldPolicy::Delete => {
                if !self.ensured.remove(descriptor.id) {
                    return Ok(false);
                }
                info!("🗑️ [PUBLISH] {} disappeared, deleting object", descriptor.id);
                self.store.delete_object(descriptor.id).await?;
                Ok(true)
            }
        }
    }

    async fn ensure(&mut self, id: &str, metadata: &ObjectMetadata) -> StoreResult<()> {
        if self.ensured.contains(id) {
            return Ok(());
        }
        if self.store.ensure_object_exists(id, metadata).await? {
            debug!("📦 [PUBLISH] Created object {}", id);
        }
        self.ensured.insert(id.to_owned());
        Ok(())
    }

    async fn write(&mut self, id: &str, value: &StateValue) -> StoreResult<()> {
        let result = self.store.write_value(id, value, true).await;
        if result.is_err() {
            // Object may have been removed externally; re-check it next time
            self.ensured.remove(id);
        }
        result
    }
}

impl fmt::Debug for StatePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePublisher")
            .field("store", &self.store.name())
            .field("stale_policy", &self.stale_policy)
            .field("ensured", &self.ensured.len())
            .finish()
    }
}
