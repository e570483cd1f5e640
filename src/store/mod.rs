// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction used by every reconciler.
//!
//! Reconcilers never talk to `kube::Api` directly. They go through
//! [`ObjectStore`], which has two implementations:
//!
//! - [`KubeStore`] - backed by a `kube::Client`, used by the controller binary
//! - [`MemoryStore`] - in-process JSON store used by unit and scenario tests
//!
//! All operations are single synchronous API calls from the reconciler's
//! point of view. The store never retries; retry with backoff happens at the
//! whole-pass level through the controller's error policy.

pub mod kube_store;
pub mod memory;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, Verb};

use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Any Kubernetes object with static type information that can be stored.
pub trait StoredObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> StoredObject for K where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Get/list/create/update/delete primitives over Kubernetes objects.
///
/// `namespace` is `None` for cluster-scoped kinds. `create`, `update` and
/// `update_status` take the namespace from the object's metadata.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; a missing object is `Ok(None)`.
    async fn get<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, kube::Error>;

    /// List objects, optionally filtered by an equality label selector (`k=v,k2=v2`).
    async fn list<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, kube::Error>;

    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error>;

    /// Replace an existing object.
    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error>;

    /// Delete an object; a missing object is success.
    async fn delete<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), kube::Error>;

    /// Write the object's `status` subresource.
    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error>;
}

/// Whether an API error is a 404.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

pub(crate) fn api_error(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(kube::core::Status::failure(&message, reason).with_code(code).boxed())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
