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

use crate::client::HomeAssistantClient;
use crate::errors::HaError;
use async_trait::async_trait;
use parking_lot::RwLock;
use piko_core::{ObjectMetadata, StateStore, StateValue, StoreError, StoreResult, ValueType};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, info};

pub const DEFAULT_ENTITY_PREFIX: &str = "piko";

#[derive(Debug, Clone)]
struct RegisteredEntity {
    entity_id: String,
    attributes: Map<String, Value>,
}

/// State store publishing every object as a Home Assistant entity.
///
/// `Measurements.AC_Power` becomes `sensor.piko_measurements_ac_power`;
/// boolean objects live in the `binary_sensor` domain.
#[derive(Debug)]
pub struct HomeAssistantStateStore {
    client: HomeAssistantClient,
    entity_prefix: String,
    registry: RwLock<HashMap<String, RegisteredEntity>>,
}

impl HomeAssistantStateStore {
    pub fn new(client: HomeAssistantClient) -> Self {
        Self::with_prefix(client, DEFAULT_ENTITY_PREFIX)
    }

    pub fn with_prefix(client: HomeAssistantClient, entity_prefix: impl Into<String>) -> Self {
        Self {
            client,
            entity_prefix: slugify(&entity_prefix.into()),
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Entity id for object `id` of the given type
    pub fn entity_id_for(&self, id: &str, value_type: ValueType) -> String {
        let domain = match value_type {
            ValueType::Boolean => "binary_sensor",
            ValueType::Number | ValueType::String => "sensor",
        };
        let object_id = slugify(id);
        if self.entity_prefix.is_empty() {
            format!("{domain}.{object_id}")
        } else {
            format!("{domain}.{}_{object_id}", self.entity_prefix)
        }
    }

    fn register(&self, id: &str, entity: RegisteredEntity) {
        self.registry.write().insert(id.to_owned(), entity);
    }
}

/// Lowercase, with every run of non-alphanumerics collapsed to `_`
fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

fn attributes_for(metadata: &ObjectMetadata) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("friendly_name".to_owned(), json!(metadata.name));
    if let Some(unit) = &metadata.unit {
        attributes.insert("unit_of_measurement".to_owned(), json!(unit));
    }
    attributes.insert("role".to_owned(), json!(metadata.role));
    attributes.insert("value_type".to_owned(), json!(metadata.value_type));
    attributes
}

fn state_string(value: &StateValue) -> String {
    match value {
        StateValue::Bool(true) => "on".to_owned(),
        StateValue::Bool(false) => "off".to_owned(),
        StateValue::Number(_) | StateValue::String(_) => value.to_string(),
    }
}

#[async_trait]
impl StateStore for HomeAssistantStateStore {
    fn name(&self) -> &str {
        "home_assistant"
    }

    async fn ensure_object_exists(&self, id: &str, metadata: &ObjectMetadata) -> StoreResult<bool> {
        if self.registry.read().contains_key(id) {
            return Ok(false);
        }

        let entity_id = self.entity_id_for(id, metadata.value_type);
        match self.client.get_state(&entity_id).await {
            Ok(existing) => {
                debug!("📦 [HA STORE] Reusing existing entity {} for {}", entity_id, id);
                self.register(
                    id,
                    RegisteredEntity {
                        entity_id,
                        attributes: existing.attributes,
                    },
                );
                Ok(false)
            }
            Err(HaError::EntityNotFound(_)) => {
                info!("📦 [HA STORE] Registering {} as {}", id, entity_id);
                self.register(
                    id,
                    RegisteredEntity {
                        entity_id,
                        attributes: attributes_for(metadata),
                    },
                );
                Ok(true)
            }
            Err(e) => Err(e.into_store_error(id)),
        }
    }

    async fn write_value(&self, id: &str, value: &StateValue, ack: bool) -> StoreResult<()> {
        let (entity_id, mut attributes) = match self.registry.read().get(id) {
            Some(entity) => (entity.entity_id.clone(), entity.attributes.clone()),
            None => return Err(StoreError::ObjectNotFound(id.to_owned())),
        };
        attributes.insert("acknowledged".to_owned(), Value::Bool(ack));

        self.client
            .set_state(&entity_id, &state_string(value), &attributes)
            .await
            .map(|_| ())
            .map_err(|e| e.into_store_error(id))
    }

    async fn delete_object(&self, id: &str) -> StoreResult<()> {
        let Some(entity) = self.registry.write().remove(id) else {
            return Err(StoreError::ObjectNotFound(id.to_owned()));
        };

        self.client
            .delete_state(&entity.entity_id)
            .await
            .map_err(|e| e.into_store_error(id))
    }
}
