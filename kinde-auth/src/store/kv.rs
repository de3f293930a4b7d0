//! Transient store over a REST key-value service.
//!
//! Speaks the Workers-KV style API: `PUT|GET|DELETE <base>/values/<key>`, with
//! `expiration_ttl` as a query parameter on writes, bearer authentication, and
//! 404 for a missing key.

use std::time::Duration;

use async_trait::async_trait;
use log::*;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{StoredValue, TransientStore};
use crate::error::{storage_error, Error, ErrorKind, StorageErrorKind};

/// Namespace prefix applied to every key unless overridden.
pub const DEFAULT_KEY_PREFIX: &str = "kinde:";

/// Transient store backed by a remote KV namespace.
pub struct KvStore {
    client: reqwest::Client,
    base_url: Url,
    api_token: SecretString,
    key_prefix: String,
}

impl KvStore {
    /// Create a new KV store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Namespace URL, e.g. `https://api.cloudflare.com/client/v4/accounts/<id>/storage/kv/namespaces/<ns>`
    /// * `api_token` - Bearer token for the KV API
    /// * `key_prefix` - Prefix applied to every logical key
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        api_token: SecretString,
        key_prefix: &str,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Config,
        })?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(operation_err)?;

        Ok(Self {
            client,
            base_url,
            api_token,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn value_url(&self, key: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                storage_error(
                    StorageErrorKind::Operation,
                    "KV base URL cannot carry a path",
                )
            })?
            .pop_if_empty()
            .push("values")
            .push(&format!("{}{}", self.key_prefix, key));
        Ok(url)
    }
}

fn operation_err(err: reqwest::Error) -> Error {
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Storage(StorageErrorKind::Operation),
    }
}

fn status_err(op: &str, status: StatusCode) -> Error {
    storage_error(
        StorageErrorKind::Operation,
        &format!("KV {} returned {}", op, status),
    )
}

#[async_trait]
impl TransientStore for KvStore {
    async fn put(
        &self,
        key: &str,
        value: StoredValue,
        ttl_secs: Option<u64>,
    ) -> Result<(), Error> {
        let mut url = self.value_url(key)?;
        if let Some(ttl) = ttl_secs {
            url.query_pairs_mut()
                .append_pair("expiration_ttl", &ttl.to_string());
        }

        let response = self
            .client
            .put(url)
            .bearer_auth(self.api_token.expose_secret())
            .body(value.encode()?)
            .send()
            .await
            .map_err(operation_err)?;

        if !response.status().is_success() {
            warn!("KV put failed with status {}", response.status());
            return Err(status_err("put", response.status()));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredValue>, Error> {
        let response = self
            .client
            .get(self.value_url(key)?)
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(operation_err)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let raw = response.text().await.map_err(operation_err)?;
                Ok(Some(StoredValue::decode(raw)))
            }
            status => {
                warn!("KV get failed with status {}", status);
                Err(status_err("get", status))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let response = self
            .client
            .delete(self.value_url(key)?)
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(operation_err)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            warn!("KV delete failed with status {}", status);
            Err(status_err("delete", status))
        }
    }
}
