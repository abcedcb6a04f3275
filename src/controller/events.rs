//! Kubernetes Events attached to reconciled objects

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::{Client, Resource};
use tracing::warn;

/// Event reason codes
pub mod reason {
    pub const GET_ACCOUNT_FAILED: &str = "GetAccountFailed";
    pub const GET_API_KEY_FAILED: &str = "GetAPIKeyFailed";
    pub const AUTHENTICATION_FAILED: &str = "AuthenticationFailed";
    pub const FIND_MONITOR_FAILED: &str = "FindMonitorFailed";
    pub const CREATE_MONITOR_FAILED: &str = "CreateMonitorFailed";
    pub const CREATE_MONITOR_SUCCEEDED: &str = "CreateMonitorSucceeded";
    pub const UPDATE_MONITOR_FAILED: &str = "UpdateMonitorFailed";
    pub const UPDATE_MONITOR_SUCCEEDED: &str = "UpdateMonitorSucceeded";
    pub const DELETE_MONITOR_FAILED: &str = "DeleteMonitorFailed";
    pub const DELETE_MONITOR_SUCCEEDED: &str = "DeleteMonitorSucceeded";
    pub const UPDATE_STATUS_FAILED: &str = "UpdateStatusFailed";
    pub const UPDATE_MONITOR_STATUS_FAILED: &str = "UpdateMonitorStatusFailed";
    pub const ADD_FINALIZER_FAILED: &str = "AddFinalizerFailed";
    pub const REMOVE_FINALIZER_FAILED: &str = "RemoveFinalizerFailed";
    pub const PARSE_ANNOTATION_FAILED: &str = "ParseAnnotationFailed";
    pub const GET_VALUES_FAILED: &str = "GetValuesFailed";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

/// Sink for human-readable events. Publishing never fails the reconcile.
#[async_trait]
pub trait EventRecorder: Send + Sync + 'static {
    async fn publish(
        &self,
        regarding: ObjectReference,
        event_type: EventType,
        reason: &str,
        message: &str,
    );
}

/// Publish an event about `obj`
pub async fn record<R, K>(recorder: &R, obj: &K, event_type: EventType, reason: &str, message: &str)
where
    R: EventRecorder + ?Sized,
    K: Resource<DynamicType = ()>,
{
    recorder
        .publish(obj.object_ref(&()), event_type, reason, message)
        .await;
}

/// Publish a warning about `obj` carrying `err` as the message
pub async fn warn_event<R, K, E>(recorder: &R, obj: &K, reason: &str, err: &E)
where
    R: EventRecorder + ?Sized,
    K: Resource<DynamicType = ()>,
    E: std::fmt::Display + ?Sized,
{
    record(recorder, obj, EventType::Warning, reason, &err.to_string()).await;
}

/// [`EventRecorder`] creating core/v1 Events
#[derive(Clone)]
pub struct KubeRecorder {
    client: Client,
}

impl KubeRecorder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventRecorder for KubeRecorder {
    async fn publish(
        &self,
        regarding: ObjectReference,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) {
        // Events about cluster-scoped objects live in the default namespace
        let namespace = regarding
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let events: Api<Event> = Api::namespaced(self.client.clone(), &namespace);

        let time = Time(chrono::Utc::now());
        let event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!(
                    "{}-",
                    regarding.name.as_deref().unwrap_or("pulsetic")
                )),
                namespace: Some(namespace),
                ..Default::default()
            },
            type_: Some(event_type.as_str().to_string()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            involved_object: regarding,
            reporting_component: Some(super::store::FIELD_MANAGER.to_string()),
            first_timestamp: Some(time.clone()),
            last_timestamp: Some(time),
            count: Some(1),
            ..Default::default()
        };

        if let Err(e) = events.create(&PostParams::default(), &event).await {
            warn!("Failed to publish {} event: {}", reason, e);
        }
    }
}
