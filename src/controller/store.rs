//! Control-plane access used by the reconcilers
//!
//! [`ObjectStore`] lists exactly the reads and writes the reconcilers need. Every write
//! carries the resourceVersion of the object it was computed from, so a write based on a
//! stale read fails with a retriable [`Error::ConflictError`].

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::crd::{Account, AccountStatus, Monitor, MonitorStatus, SourceRef};
use crate::error::{Error, Result};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "pulsetic-operator";

/// Namespaced objects whose finalizers the operator manages
pub trait Finalizable:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Finalizable for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn get_account(&self, name: &str) -> Result<Option<Account>>;

    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Accounts with `spec.isDefault` set
    async fn list_default_accounts(&self) -> Result<Vec<Account>> {
        Ok(self
            .list_accounts()
            .await?
            .into_iter()
            .filter(Account::is_default)
            .collect())
    }

    async fn update_account_status(&self, account: &Account, status: &AccountStatus)
        -> Result<Account>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    async fn get_monitor(&self, namespace: &str, name: &str) -> Result<Option<Monitor>>;

    async fn list_monitors(&self, namespace: &str) -> Result<Vec<Monitor>>;

    /// Monitors whose `status.sourceRef` names `source`
    async fn list_monitors_for_source(
        &self,
        namespace: &str,
        source: &SourceRef,
    ) -> Result<Vec<Monitor>> {
        Ok(self
            .list_monitors(namespace)
            .await?
            .into_iter()
            .filter(|m| m.source_ref() == Some(source))
            .collect())
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<Monitor>;

    /// Replace metadata and spec; status is left alone
    async fn replace_monitor(&self, monitor: &Monitor) -> Result<Monitor>;

    async fn update_monitor_status(&self, monitor: &Monitor, status: &MonitorStatus)
        -> Result<Monitor>;

    /// Request deletion. Missing objects are not an error.
    async fn delete_monitor(&self, namespace: &str, name: &str) -> Result<()>;

    async fn set_finalizers<K: Finalizable>(&self, obj: &K, finalizers: Vec<String>) -> Result<K>;
}

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn monitors(&self, namespace: &str) -> Api<Monitor> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of<K: Resource>(obj: &K) -> String {
    obj.namespace().unwrap_or_else(|| "default".to_string())
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Map optimistic-concurrency failures to [`Error::ConflictError`]
fn write_error(e: kube::Error) -> Error {
    match e {
        kube::Error::Api(resp) if resp.code == 409 => Error::ConflictError(resp.message),
        e => Error::KubeError(e),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_account(&self, name: &str) -> Result<Option<Account>> {
        let api: Api<Account> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let api: Api<Account> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_account_status(
        &self,
        account: &Account,
        status: &AccountStatus,
    ) -> Result<Account> {
        let api: Api<Account> = Api::all(self.client.clone());
        let patch = json!({
            "metadata": { "resourceVersion": account.resource_version() },
            "status": status,
        });
        api.patch_status(&account.name_any(), &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(write_error)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_monitor(&self, namespace: &str, name: &str) -> Result<Option<Monitor>> {
        Ok(self.monitors(namespace).get_opt(name).await?)
    }

    async fn list_monitors(&self, namespace: &str) -> Result<Vec<Monitor>> {
        Ok(self
            .monitors(namespace)
            .list(&ListParams::default())
            .await?
            .items)
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<Monitor> {
        self.monitors(&namespace_of(monitor))
            .create(&post_params(), monitor)
            .await
            .map_err(write_error)
    }

    async fn replace_monitor(&self, monitor: &Monitor) -> Result<Monitor> {
        self.monitors(&namespace_of(monitor))
            .replace(&monitor.name_any(), &post_params(), monitor)
            .await
            .map_err(write_error)
    }

    async fn update_monitor_status(
        &self,
        monitor: &Monitor,
        status: &MonitorStatus,
    ) -> Result<Monitor> {
        let patch = json!({
            "metadata": { "resourceVersion": monitor.resource_version() },
            "status": status,
        });
        self.monitors(&namespace_of(monitor))
            .patch_status(&monitor.name_any(), &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(write_error)
    }

    async fn delete_monitor(&self, namespace: &str, name: &str) -> Result<()> {
        match self
            .monitors(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!("Monitor {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_finalizers<K: Finalizable>(&self, obj: &K, finalizers: Vec<String>) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace_of(obj));
        let patch = json!({
            "metadata": {
                "resourceVersion": obj.resource_version(),
                "finalizers": finalizers,
            }
        });
        api.patch(&obj.name_any(), &patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(write_error)
    }
}
