//! Namespaced key-value state store used as workflow memory.
//!
//! The store is the shared substrate that lets independently triggered steps
//! of one workflow instance observe each other's progress: each stage reads
//! and writes records under `(namespace, workflow_instance_id)`.
//!
//! # Semantics
//!
//! A write to an existing `(namespace, key)` pair **replaces** the prior
//! record wholesale; the store performs no field-level merge. A stage that
//! updates a record's status must resupply every field it wants to retain.
//! This is a deliberate, observed behavior of the system, not an accident —
//! [`StateStoreExt::merge`] exists as an optional read-modify-write helper
//! on top of `set`, and does not change the contract.
//!
//! There are no transactional multi-key writes, no optimistic-concurrency
//! checks (concurrent writers to one key race, last write wins), and no
//! TTL/expiry. Write failures must surface as errors: a stage must not
//! publish its continuation event when the preceding state write failed.

pub mod memory;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStateStore;

/// Pluggable persistence for workflow state records.
///
/// Implementations are process-wide singletons shared by every step through
/// `Arc<dyn StateStore>`; isolation between workflow instances is achieved
/// by key discipline, not by the store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist `value` under `(namespace, key)`, replacing any existing record.
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StateStoreError>;

    /// Fetch the record under `(namespace, key)`, if any.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StateStoreError>;
}

/// Typed and merge-aware conveniences layered over [`StateStore`].
///
/// Blanket-implemented for every store, including `dyn StateStore`.
#[async_trait]
pub trait StateStoreExt: StateStore {
    /// Serialize `value` and store it under `(namespace, key)`.
    async fn set_json<T>(&self, namespace: &str, key: &str, value: &T) -> Result<(), StateStoreError>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value).map_err(|source| StateStoreError::Serde { source })?;
        self.set(namespace, key, value).await
    }

    /// Fetch and deserialize the record under `(namespace, key)`.
    async fn get_json<T>(&self, namespace: &str, key: &str) -> Result<Option<T>, StateStoreError>
    where
        T: DeserializeOwned,
    {
        match self.get(namespace, key).await? {
            Some(value) => {
                let typed = serde_json::from_value(value)
                    .map_err(|source| StateStoreError::Serde { source })?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// Read-modify-write shallow merge of `patch` into the existing record.
    ///
    /// When both the stored record and `patch` are JSON objects, keys from
    /// `patch` are overlaid onto the stored object (patch wins per key).
    /// Otherwise the record is replaced by `patch`, matching `set`.
    ///
    /// This is a convenience only; it is not atomic and does not alter the
    /// store's last-write-wins contract.
    async fn merge(&self, namespace: &str, key: &str, patch: Value) -> Result<(), StateStoreError> {
        let merged = match (self.get(namespace, key).await?, patch) {
            (Some(Value::Object(mut existing)), Value::Object(patch)) => {
                for (k, v) in patch {
                    existing.insert(k, v);
                }
                Value::Object(existing)
            }
            (_, patch) => patch,
        };
        self.set(namespace, key, merged).await
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

/// Errors surfaced by state store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum StateStoreError {
    #[error("state record serialization failed: {source}")]
    #[diagnostic(
        code(stepline::store::serde),
        help("Ensure the record type serializes to and from JSON cleanly.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("state store backend failure: {0}")]
    #[diagnostic(code(stepline::store::backend))]
    Backend(String),
}
