// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API.
//!
//! Requests go through `Api<DynamicObject>` built from the static
//! `ApiResource` of each kind, so one code path serves both namespaced and
//! cluster-scoped kinds.

use async_trait::async_trait;
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use super::{is_not_found, ObjectStore, StoredObject};
use crate::constants::OPERATOR_NAME;

/// Store talking to the API server through a `kube::Client`.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoredObject>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn to_dynamic<K: StoredObject>(object: &K) -> Result<DynamicObject, kube::Error> {
    let value = serde_json::to_value(object).map_err(kube::Error::SerdeError)?;
    serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

fn from_dynamic<K: StoredObject>(object: DynamicObject) -> Result<K, kube::Error> {
    let value = serde_json::to_value(object).map_err(kube::Error::SerdeError)?;
    serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..PostParams::default()
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, kube::Error> {
        match self.api::<K>(namespace).get_opt(name).await? {
            Some(object) => Ok(Some(from_dynamic(object)?)),
            None => Ok(None),
        }
    }

    async fn list<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, kube::Error> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        self.api::<K>(namespace)
            .list(&params)
            .await?
            .items
            .into_iter()
            .map(from_dynamic::<K>)
            .collect()
    }

    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let dynamic = to_dynamic(object)?;
        debug!(kind = %K::kind(&()), name = %object.name_any(), "creating object");
        let created = self
            .api::<K>(object.namespace().as_deref())
            .create(&post_params(), &dynamic)
            .await?;
        from_dynamic(created)
    }

    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let dynamic = to_dynamic(object)?;
        debug!(kind = %K::kind(&()), name = %object.name_any(), "replacing object");
        let updated = self
            .api::<K>(object.namespace().as_deref())
            .replace(&object.name_any(), &post_params(), &dynamic)
            .await?;
        from_dynamic(updated)
    }

    async fn delete<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), kube::Error> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, kube::Error> {
        let value = serde_json::to_value(object).map_err(kube::Error::SerdeError)?;
        let patch = json!({ "status": value.get("status").cloned().unwrap_or_default() });
        let updated = self
            .api::<K>(object.namespace().as_deref())
            .patch_status(
                &object.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?;
        from_dynamic(updated)
    }
}
