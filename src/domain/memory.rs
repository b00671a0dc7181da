//! Actors and their memory
//!
//! An actor is a named participant of a run. Its memory accumulates facts across
//! protocol steps (identifiers, the current thread id, recorded objects). Writes
//! overwrite; reading an absent key is a [`IssuanceError::Precondition`] because it
//! means an earlier step of the flow did not run.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock}
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{Level, event};

use crate::domain::{constant::memory, error::IssuanceError};

/// Well-known memory keys shared by the flow steps
pub mod keys {
    pub const THID: &str = "thid";
    pub const RECORD_ID: &str = "recordId";
    pub const ISSUED_CREDENTIAL: &str = "issuedCredential";
    pub const SHORT_FORM_DID: &str = "shortFormDid";
    pub const LONG_FORM_DID: &str = "longFormDid";
    pub const ANONCREDS_SCHEMA: &str = "anoncredsSchema";
    pub const ANONCREDS_CREDENTIAL_DEFINITION: &str = "anoncredsCredentialDefinition";

    /// Key under which an actor remembers its connection with another actor
    pub fn connection_with(other: &str) -> String {
        format!("connection-with-{}", other)
    }
}

/// Per-actor key/value store, last write wins
#[derive(Debug, Default)]
pub struct Memory {
    entries: RwLock<HashMap<String, serde_json::Value>>
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        // Entries are whole values, so a poisoned lock still guards consistent data.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// A named participant holding its own memory
#[derive(Debug)]
pub struct Actor {
    name:   String,
    memory: Memory
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), memory: Memory::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Store a value under `key`, replacing any previous value
    pub fn remember<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T) -> Result<(), IssuanceError> {
        let key = key.into();
        let value = serde_json::to_value(value)?;
        event!(Level::TRACE, event = memory::REMEMBERED, actor = %self.name, key = %key);
        self.memory.set(key, value);
        Ok(())
    }

    /// Read the value stored under `key`
    ///
    /// Fails with `Precondition` when the key was never set and with
    /// `Serialization` when the stored value has a different shape than `T`.
    pub fn recall<T: DeserializeOwned>(&self, key: &str) -> Result<T, IssuanceError> {
        let Some(value) = self.memory.get(key) else {
            event!(Level::DEBUG, event = memory::RECALL_MISSED, actor = %self.name, key = %key);
            return Err(IssuanceError::precondition(&self.name, key));
        };

        serde_json::from_value(value).map_err(|e| {
            IssuanceError::Serialization(format!("actor '{}' remembers '{}' with another shape: {}", self.name, key, e))
        })
    }

    pub fn recall_text(&self, key: &str) -> Result<String, IssuanceError> {
        self.recall::<String>(key)
    }

    pub fn knows(&self, key: &str) -> bool {
        self.memory.contains(key)
    }
}
