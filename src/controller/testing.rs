//! In-memory control plane for reconciler tests
//!
//! [`MemoryStore`] keeps objects as JSON and emulates the API server behaviour the
//! reconcilers rely on: resourceVersion preconditions, the status subresource split and
//! finalizer-gated deletion.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::events::{EventRecorder, EventType};
use super::reconciler::Context;
use super::store::{Finalizable, ObjectStore};
use crate::config::OperatorConfig;
use crate::crd::{Account, AccountSpec, AccountStatus, Monitor, MonitorStatus, SecretKeyRef};
use crate::error::{Error, Result};

pub const SECRET_NAMESPACE: &str = "pulsetic-system";
pub const SECRET_NAME: &str = "pulsetic";
pub const SECRET_KEY: &str = "apiKey";
pub const API_KEY: &str = "test-api-key";

type Key = (String, String, String);

fn key_for<K: Resource<DynamicType = ()>>(namespace: Option<&str>, name: &str) -> Key {
    (
        K::kind(&()).to_string(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::KubeError(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

fn is_released(value: &Value) -> bool {
    let deleting = !value["metadata"]["deletionTimestamp"].is_null();
    let finalizers = value["metadata"]["finalizers"]
        .as_array()
        .map(Vec::len)
        .unwrap_or(0);
    deleting && finalizers == 0
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<Key, Value>>,
    version: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryStore {
    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Store `obj` as is, assigning a fresh resourceVersion
    pub fn insert<K>(&self, obj: K) -> K
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let key = key_for::<K>(obj.meta().namespace.as_deref(), &obj.name_any());
        let mut value = serde_json::to_value(&obj).unwrap();
        value["metadata"]["resourceVersion"] = json!(self.next_version());
        self.objects.lock().unwrap().insert(key, value.clone());
        serde_json::from_value(value).unwrap()
    }

    pub fn get<K>(&self, namespace: Option<&str>, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let objects = self.objects.lock().unwrap();
        objects
            .get(&key_for::<K>(namespace, name))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    pub fn list<K>(&self, namespace: Option<&str>) -> Vec<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let kind = K::kind(&()).to_string();
        let objects = self.objects.lock().unwrap();
        objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && namespace.map_or(true, |n| n == ns.as_str()))
            .map(|(_, value)| serde_json::from_value(value.clone()).unwrap())
            .collect()
    }

    /// Request deletion the way the API server does: objects with finalizers only get a
    /// deletion timestamp. Returns the object as it looks afterwards, if it still exists.
    pub fn mark_deleted<K>(&self, namespace: Option<&str>, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = key_for::<K>(namespace, name);
        let mut objects = self.objects.lock().unwrap();
        let value = objects.get_mut(&key)?;
        if value["metadata"]["deletionTimestamp"].is_null() {
            value["metadata"]["deletionTimestamp"] = json!(Time(chrono::Utc::now()));
            value["metadata"]["resourceVersion"] = json!(self.next_version());
        }
        let stored = value.clone();

        let has_finalizers = stored["metadata"]["finalizers"]
            .as_array()
            .is_some_and(|f| !f.is_empty());
        if !has_finalizers {
            objects.remove(&key);
            return None;
        }
        Some(serde_json::from_value(stored).unwrap())
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Apply `update` to the stored copy of `obj` if its resourceVersion still matches
    fn write<K>(&self, obj: &K, update: impl FnOnce(&mut Value)) -> Result<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = key_for::<K>(obj.meta().namespace.as_deref(), &obj.name_any());
        let mut objects = self.objects.lock().unwrap();
        let value = objects.get_mut(&key).ok_or_else(|| {
            api_error(404, "NotFound", format!("{} {:?} not found", key.0, key.2))
        })?;

        if let Some(expected) = obj.resource_version() {
            if value["metadata"]["resourceVersion"].as_str() != Some(expected.as_str()) {
                return Err(Error::ConflictError(format!(
                    "the object has been modified: {} {:?}",
                    key.0, key.2
                )));
            }
        }

        update(value);
        value["metadata"]["resourceVersion"] = json!(self.next_version());
        self.writes.fetch_add(1, Ordering::SeqCst);

        let stored = value.clone();
        if is_released(&stored) {
            objects.remove(&key);
        }
        Ok(serde_json::from_value(stored).unwrap())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_account(&self, name: &str) -> Result<Option<Account>> {
        Ok(self.get(None, name))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.list(None))
    }

    async fn update_account_status(
        &self,
        account: &Account,
        status: &AccountStatus,
    ) -> Result<Account> {
        self.write(account, |value| value["status"] = json!(status))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.get(Some(namespace), name))
    }

    async fn get_monitor(&self, namespace: &str, name: &str) -> Result<Option<Monitor>> {
        Ok(self.get(Some(namespace), name))
    }

    async fn list_monitors(&self, namespace: &str) -> Result<Vec<Monitor>> {
        Ok(self.list(Some(namespace)))
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<Monitor> {
        let namespace = monitor.namespace();
        if self
            .get::<Monitor>(namespace.as_deref(), &monitor.name_any())
            .is_some()
        {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("monitors {:?} already exists", monitor.name_any()),
            ));
        }

        // Status is not accepted on create
        let mut created = monitor.clone();
        created.status = None;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.insert(created))
    }

    async fn replace_monitor(&self, monitor: &Monitor) -> Result<Monitor> {
        let replacement = serde_json::to_value(monitor)?;
        self.write(monitor, |value| {
            let status = value["status"].take();
            *value = replacement;
            value["status"] = status;
        })
    }

    async fn update_monitor_status(
        &self,
        monitor: &Monitor,
        status: &MonitorStatus,
    ) -> Result<Monitor> {
        self.write(monitor, |value| value["status"] = json!(status))
    }

    async fn delete_monitor(&self, namespace: &str, name: &str) -> Result<()> {
        self.mark_deleted::<Monitor>(Some(namespace), name);
        Ok(())
    }

    async fn set_finalizers<K: Finalizable>(&self, obj: &K, finalizers: Vec<String>) -> Result<K> {
        self.write(obj, |value| {
            value["metadata"]["finalizers"] = json!(finalizers);
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: String,
    pub name: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

#[derive(Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryRecorder {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    pub fn has(&self, reason: &str) -> bool {
        self.events().iter().any(|e| e.reason == reason)
    }
}

#[async_trait]
impl EventRecorder for MemoryRecorder {
    async fn publish(
        &self,
        regarding: ObjectReference,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            kind: regarding.kind.unwrap_or_default(),
            name: regarding.name.unwrap_or_default(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

pub type TestContext = Context<MemoryStore, MemoryRecorder>;

/// Context talking to a fake Pulsetic API at `api_url`
pub fn context(api_url: &str) -> Arc<TestContext> {
    let config = OperatorConfig {
        api_url: api_url.to_string(),
        ..OperatorConfig::default()
    };
    Arc::new(Context::new(MemoryStore::default(), MemoryRecorder::default(), config).unwrap())
}

pub fn account(name: &str, is_default: bool) -> Account {
    Account::new(
        name,
        AccountSpec {
            is_default,
            api_key_secret_ref: SecretKeyRef {
                namespace: None,
                name: SECRET_NAME.to_string(),
                key: SECRET_KEY.to_string(),
            },
            monitor_defaults: None,
        },
    )
}

pub fn api_key_secret(key: &str, value: &str) -> Secret {
    Secret {
        metadata: kube::api::ObjectMeta {
            name: Some(SECRET_NAME.to_string()),
            namespace: Some(SECRET_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            key.to_string(),
            ByteString(value.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// Default Account plus its credentials
pub fn seed_default_account(store: &MemoryStore) -> Account {
    store.insert(api_key_secret(SECRET_KEY, API_KEY));
    store.insert(account("default", true))
}
