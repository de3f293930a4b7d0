//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::AuthSettings;
use crate::error::{storage_error, Error, StorageErrorKind};
use crate::store::{MemoryStore, StoredValue, TransientStore};

pub const REDIRECT_URI: &str = "http://localhost:4000/api/auth/kinde_callback";

/// Confidential-client settings pointing at a fictional tenant.
pub fn settings() -> AuthSettings {
    settings_for("https://acme.kinde.com")
}

/// Confidential-client settings with the issuer at `issuer_url` (e.g. a mock server).
pub fn settings_for(issuer_url: &str) -> AuthSettings {
    AuthSettings {
        issuer_url: Some(issuer_url.to_string()),
        client_id: Some("client-id".to_string()),
        client_secret: Some(SecretString::new("client-secret".to_string())),
        redirect_uri: Some(REDIRECT_URI.to_string()),
        ..AuthSettings::default()
    }
}

/// Memory store that can be told to fail operations.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    puts_allowed: Option<usize>,
    puts_seen: AtomicUsize,
    fail_gets: bool,
    /// Deletes of keys starting with this prefix fail; `""` fails them all.
    fail_delete_prefix: Option<&'static str>,
    pub deletes_seen: AtomicUsize,
}

impl FailingStore {
    /// Let the first `allowed` puts through, fail every later one.
    pub fn failing_puts_after(allowed: usize) -> Self {
        Self {
            puts_allowed: Some(allowed),
            ..Self::default()
        }
    }

    pub fn failing_gets() -> Self {
        Self {
            fail_gets: true,
            ..Self::default()
        }
    }

    pub fn failing_deletes() -> Self {
        Self::failing_deletes_of("")
    }

    pub fn failing_deletes_of(prefix: &'static str) -> Self {
        Self {
            fail_delete_prefix: Some(prefix),
            ..Self::default()
        }
    }

    fn failure(op: &str) -> Error {
        storage_error(StorageErrorKind::Operation, &format!("injected {} failure", op))
    }
}

#[async_trait]
impl TransientStore for FailingStore {
    async fn put(
        &self,
        key: &str,
        value: StoredValue,
        ttl_secs: Option<u64>,
    ) -> Result<(), Error> {
        let seen = self.puts_seen.fetch_add(1, Ordering::SeqCst);
        if matches!(self.puts_allowed, Some(allowed) if seen >= allowed) {
            return Err(Self::failure("put"));
        }
        self.inner.put(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> Result<Option<StoredValue>, Error> {
        if self.fail_gets {
            return Err(Self::failure("get"));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.deletes_seen.fetch_add(1, Ordering::SeqCst);
        if matches!(self.fail_delete_prefix, Some(prefix) if key.starts_with(prefix)) {
            return Err(Self::failure("delete"));
        }
        self.inner.delete(key).await
    }
}
