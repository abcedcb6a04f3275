//! Controller wiring for Accounts, Monitors and monitor sources
//!
//! Implements the controller pattern using kube-rs runtime. Each watched kind gets its own
//! `Controller`; they share one [`Context`] and run until a shutdown signal arrives.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        predicates, reflector, watcher, WatchStreamExt,
    },
    Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::account::reconcile_account;
use super::events::{EventRecorder, KubeRecorder};
use super::monitor::reconcile_monitor;
use super::source::reconcile_source;
use super::store::{KubeStore, ObjectStore};
use crate::config::OperatorConfig;
use crate::crd::{Account, HTTPRoute, Monitor};
use crate::error::{Error, Result};
use crate::pulsetic::{PulseticClient, PulseticError};

/// Shared state for the controllers
pub struct Context<S, R> {
    pub store: S,
    pub recorder: R,
    pub config: OperatorConfig,
    /// Connection pool shared by every per-Account Pulsetic client
    http: reqwest::Client,
}

impl<S: ObjectStore, R: EventRecorder> Context<S, R> {
    pub fn new(store: S, recorder: R, config: OperatorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pulsetic-operator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PulseticError::from)?;
        Ok(Self {
            store,
            recorder,
            config,
            http,
        })
    }

    /// Pulsetic client authenticated with `api_key`
    pub fn pulsetic(&self, api_key: String) -> PulseticClient {
        PulseticClient::with_http_client(self.http.clone(), &self.config.api_url, api_key)
    }
}

/// What a successful reconcile asks of the trigger layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Next {
    /// Revisit after the given delay even without a change
    Requeue(Duration),
    /// Only revisit on the next watch event
    AwaitChange,
}

impl From<Next> for Action {
    fn from(next: Next) -> Self {
        match next {
            Next::Requeue(delay) => Action::requeue(delay),
            Next::AwaitChange => Action::await_change(),
        }
    }
}

/// Which source controllers to start
#[derive(Clone, Copy, Debug)]
pub struct ControllerOptions {
    pub ingress: bool,
    pub httproute: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            ingress: true,
            httproute: true,
        }
    }
}

type KubeContext = Context<KubeStore, KubeRecorder>;

/// Main entry point to start the controllers
pub async fn run_controller(
    client: Client,
    ctx: Arc<KubeContext>,
    options: ControllerOptions,
) -> Result<()> {
    let accounts: Api<Account> = Api::all(client.clone());
    let monitors: Api<Monitor> = Api::all(client.clone());

    // Verify CRDs exist
    ensure_crd(&accounts, "Account").await?;
    ensure_crd(&monitors, "Monitor").await?;

    let mut controllers: Vec<BoxFuture<'static, ()>> = Vec::new();

    info!("Starting Account controller");
    controllers.push(
        watched(accounts, predicates::generation)
            .shutdown_on_signal()
            .run(
                |obj, ctx| observed("account", reconcile_account(obj, ctx)),
                error_policy,
                ctx.clone(),
            )
            .for_each(|res| async move { log_result("account", res) })
            .boxed(),
    );

    info!("Starting Monitor controller");
    controllers.push(
        watched(monitors, predicates::generation)
            .shutdown_on_signal()
            .run(
                |obj, ctx| observed("monitor", reconcile_monitor(obj, ctx)),
                error_policy,
                ctx.clone(),
            )
            .for_each(|res| async move { log_result("monitor", res) })
            .boxed(),
    );

    if options.ingress {
        info!("Starting Ingress controller");
        let ingresses: Api<Ingress> = Api::all(client.clone());
        controllers.push(
            watched(ingresses, generation_and_annotations)
                .shutdown_on_signal()
                .run(
                    |obj, ctx| observed("ingress", reconcile_source(obj, ctx)),
                    error_policy,
                    ctx.clone(),
                )
                .for_each(|res| async move { log_result("ingress", res) })
                .boxed(),
        );
    }

    if options.httproute {
        let routes: Api<HTTPRoute> = Api::all(client.clone());
        match routes.list(&ListParams::default().limit(1)).await {
            Ok(_) => {
                info!("Starting HTTPRoute controller");
                controllers.push(
                    watched(routes, generation_and_annotations)
                        .shutdown_on_signal()
                        .run(
                            |obj, ctx| observed("httproute", reconcile_source(obj, ctx)),
                            error_policy,
                            ctx.clone(),
                        )
                        .for_each(|res| async move { log_result("httproute", res) })
                        .boxed(),
                );
            }
            Err(e) => warn!(
                "HTTPRoute CRD not available, skipping HTTPRoute controller: {}",
                e
            ),
        }
    }

    join_all(controllers).await;
    Ok(())
}

/// Controller fed by a watch that drops events which leave `predicate` unchanged
fn watched<K, P>(api: Api<K>, predicate: P) -> Controller<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    P: Fn(&K) -> Option<u64> + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicate);
    Controller::for_stream(stream, reader)
}

/// Sources are configured through annotations, which do not bump the generation
fn generation_and_annotations<K: Resource>(obj: &K) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    obj.meta().generation.hash(&mut hasher);
    obj.meta().annotations.hash(&mut hasher);
    Some(hasher.finish())
}

async fn ensure_crd<K>(api: &Api<K>, kind: &str) -> Result<()>
where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => {
            info!("{} CRD is available", kind);
            Ok(())
        }
        Err(e) => {
            error!("{} CRD not found. Please install the CRDs first: {:?}", kind, e);
            Err(Error::ConfigError(format!("{kind} CRD not installed")))
        }
    }
}

fn log_result<T: std::fmt::Debug, E: std::fmt::Debug>(controller: &str, res: Result<T, E>) {
    match res {
        Ok(obj) => debug!("Reconciled {}: {:?}", controller, obj),
        Err(e) => error!("Reconcile error in {} controller: {:?}", controller, e),
    }
}

/// Run one reconcile pass, recording its duration and outcome
async fn observed<F>(controller: &'static str, pass: F) -> Result<Action>
where
    F: Future<Output = Result<Next>>,
{
    let start = Instant::now();
    let result = pass.await;

    #[cfg(feature = "metrics")]
    {
        super::metrics::observe_reconcile_duration_seconds(
            controller,
            start.elapsed().as_secs_f64(),
        );
        if let Err(e) = &result {
            super::metrics::inc_reconcile_error(controller, e.kind());
        }
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (controller, start);

    result.map(Action::from)
}

/// Error policy determines how to handle reconciliation errors
fn error_policy<K, S, R>(obj: Arc<K>, error: &Error, _ctx: Arc<Context<S, R>>) -> Action
where
    K: ResourceExt,
{
    warn!("Reconciliation error for {}: {}", obj.name_any(), error);

    // Use shorter retry for retriable errors
    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(retry_duration)
}
