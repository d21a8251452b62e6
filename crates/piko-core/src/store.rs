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

use crate::errors::{StoreError, StoreResult};
use crate::schema::{FieldDescriptor, SemanticType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Value written to the state store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl StateValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Boolean,
            Self::Number(_) => ValueType::Number,
            Self::String(_) => ValueType::String,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Type recorded in object metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    String,
    Boolean,
}

impl From<SemanticType> for ValueType {
    fn from(semantic_type: SemanticType) -> Self {
        match semantic_type {
            SemanticType::Number => Self::Number,
            SemanticType::String => Self::String,
        }
    }
}

/// Metadata of a state object, fixed at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub read: bool,
    pub write: bool,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ObjectMetadata {
    pub fn for_field(descriptor: &FieldDescriptor, unit: Option<&str>) -> Self {
        Self {
            name: descriptor.name.to_owned(),
            value_type: descriptor.semantic_type.into(),
            read: descriptor.read,
            write: descriptor.write,
            role: descriptor.role.to_owned(),
            unit: unit.map(str::to_owned),
        }
    }

    /// Metadata of the `info.connection` indicator
    pub fn connection_indicator() -> Self {
        Self {
            name: "Device or service connected".to_owned(),
            value_type: ValueType::Boolean,
            read: true,
            write: false,
            role: "indicator.connected".to_owned(),
            unit: None,
        }
    }
}

/// External key-value store with typed object metadata
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Create the object if it does not exist yet; existing metadata is kept.
    ///
    /// Returns true when this call created the object.
    async fn ensure_object_exists(&self, id: &str, metadata: &ObjectMetadata) -> StoreResult<bool>;

    /// Write a value; `ack` marks data reported by the device itself
    async fn write_value(&self, id: &str, value: &StateValue, ack: bool) -> StoreResult<()>;

    async fn delete_object(&self, id: &str) -> StoreResult<()>;
}

/// Last value written to an object
#[derive(Debug, Clone, PartialEq)]
pub struct StoredState {
    pub value: StateValue,
    pub ack: bool,
    pub updated_at: DateTime<Utc>,
}

/// Store call recorded by [`MemoryStateStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    Ensure { id: String, created: bool },
    Write { id: String, value: StateValue, ack: bool },
    Delete { id: String },
}

/// In-process state store.
///
/// Keeps objects and states in memory and journals every call in order.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    objects: RwLock<BTreeMap<String, ObjectMetadata>>,
    states: RwLock<BTreeMap<String, StoredState>>,
    journal: Mutex<Vec<StoreOperation>>,
    failing_writes: RwLock<HashSet<String>>,
    log_writes: bool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that logs every written value at info level (dry-run backend)
    pub fn logging() -> Self {
        Self {
            log_writes: true,
            ..Self::default()
        }
    }

    /// Make writes to `id` fail with [`StoreError::Unavailable`]
    pub fn fail_writes_for(&self, id: &str) {
        self.failing_writes.write().insert(id.to_owned());
    }

    pub fn object(&self, id: &str) -> Option<ObjectMetadata> {
        self.objects.read().get(id).cloned()
    }

    pub fn state(&self, id: &str) -> Option<StoredState> {
        self.states.read().get(id).cloned()
    }

    pub fn value(&self, id: &str) -> Option<StateValue> {
        self.states.read().get(id).map(|state| state.value.clone())
    }

    pub fn object_ids(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    pub fn journal(&self) -> Vec<StoreOperation> {
        self.journal.lock().clone()
    }

    /// All values written to `id`, oldest first
    pub fn writes_to(&self, id: &str) -> Vec<StateValue> {
        self.journal
            .lock()
            .iter()
            .filter_map(|op| match op {
                StoreOperation::Write { id: target, value, .. } if target == id => {
                    Some(value.clone())
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_object_exists(&self, id: &str, metadata: &ObjectMetadata) -> StoreResult<bool> {
        let created = {
            let mut objects = self.objects.write();
            if objects.contains_key(id) {
                false
            } else {
                objects.insert(id.to_owned(), metadata.clone());
                true
            }
        };

        if created {
            debug!("📦 [STORE] Created object {} ({:?})", id, metadata.value_type);
        }
        self.journal.lock().push(StoreOperation::Ensure {
            id: id.to_owned(),
            created,
        });
        Ok(created)
    }

    async fn write_value(&self, id: &str, value: &StateValue, ack: bool) -> StoreResult<()> {
        if self.failing_writes.read().contains(id) {
            return Err(StoreError::Unavailable(format!("write to {id} rejected")));
        }

        let unit = match self.objects.read().get(id) {
            Some(object) => object.unit.clone(),
            None => return Err(StoreError::ObjectNotFound(id.to_owned())),
        };

        if self.log_writes {
            info!("📝 [STORE] {} = {}{}", id, value, unit.map(|u| format!(" {u}")).unwrap_or_default());
        }

        self.states.write().insert(
            id.to_owned(),
            StoredState {
                value: value.clone(),
                ack,
                updated_at: Utc::now(),
            },
        );
        self.journal.lock().push(StoreOperation::Write {
            id: id.to_owned(),
            value: value.clone(),
            ack,
        });
        Ok(())
    }

    async fn delete_object(&self, id: &str) -> StoreResult<()> {
        let removed = self.objects.write().remove(id).is_some();
        self.states.write().remove(id);
        if !removed {
            return Err(StoreError::ObjectNotFound(id.to_owned()));
        }

        debug!("🗑️ [STORE] Deleted object {}", id);
        self.journal.lock().push(StoreOperation::Delete { id: id.to_owned() });
        Ok(())
    }
}
