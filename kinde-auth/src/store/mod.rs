//! Transient key-value storage for the authorization flow.
//!
//! Holds pending `state` markers, post-login redirects, PKCE verifiers and the
//! current token set. Backends only need put/get/delete with an optional TTL;
//! expired entries must read back as absent.

mod kv;
mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

pub use kv::{KvStore, DEFAULT_KEY_PREFIX};
pub use memory::MemoryStore;

/// TTL for every entry belonging to one authorization attempt.
pub const PENDING_TTL_SECS: u64 = 600;

/// A value held by the store: either a bare string or a structured record.
///
/// Records are written as JSON text. On read, text that parses as a JSON object
/// comes back as a record and anything else comes back unchanged as text, so a
/// bare marker and a record can share one keyspace.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    Record(Value),
}

impl StoredValue {
    pub fn text(value: impl Into<String>) -> Self {
        StoredValue::Text(value.into())
    }

    /// Serialize a record for storage.
    pub fn record<T: Serialize>(value: &T) -> Result<Self, Error> {
        Ok(StoredValue::Record(serde_json::to_value(value)?))
    }

    /// Decode raw text read back from a backend.
    pub fn decode(raw: String) -> Self {
        match serde_json::from_str::<Value>(&raw) {
            Ok(record @ Value::Object(_)) => StoredValue::Record(record),
            _ => StoredValue::Text(raw),
        }
    }

    /// Encode to the text form written to a backend.
    pub fn encode(&self) -> Result<String, Error> {
        match self {
            StoredValue::Text(text) => Ok(text.clone()),
            StoredValue::Record(record) => Ok(serde_json::to_string(record)?),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StoredValue::Text(text) => Some(text),
            StoredValue::Record(_) => None,
        }
    }

    /// Deserialize a record into `T`. Text values never match a record type.
    pub fn into_record<T: DeserializeOwned>(self) -> Result<T, Error> {
        match self {
            StoredValue::Record(record) => Ok(serde_json::from_value(record)?),
            StoredValue::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }
}

/// Key-expiring storage shared by every request.
///
/// `get` returns `Ok(None)` for absent or expired keys and `Err` only when the
/// backend itself failed, so callers can tell "not found" from "failed".
#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Store `value` under `key`. `ttl_secs` of `None` keeps it until deleted.
    async fn put(&self, key: &str, value: StoredValue, ttl_secs: Option<u64>)
        -> Result<(), Error>;

    async fn get(&self, key: &str) -> Result<Option<StoredValue>, Error>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// Logical key layout shared by every backend.
pub mod keys {
    pub const TOKENS: &str = "tokens";

    pub fn state(state_id: &str) -> String {
        format!("state:{}", state_id)
    }

    pub fn redirect(state_id: &str) -> String {
        format!("redirect:{}", state_id)
    }

    pub fn code_verifier(state_id: &str) -> String {
        format!("code_verifier:{}", state_id)
    }

    /// Token set key: the shared `tokens` slot or `tokens:<session>`.
    pub fn tokens(session_id: Option<&str>) -> String {
        match session_id {
            Some(id) => format!("{}:{}", TOKENS, id),
            None => TOKENS.to_string(),
        }
    }
}
