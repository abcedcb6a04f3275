//! Monitor reconciler
//!
//! Converges one Monitor with one Pulsetic monitor: find or create it, push the desired
//! settings on every pass, record the remote id in the status and hold a finalizer until
//! the remote monitor is pruned.

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::account::{resolve_account, resolve_api_key};
use super::events::{reason, record, warn_event, EventRecorder, EventType};
use super::finalizers::{ensure_finalizer, finalizer_state, remove_finalizer, FinalizerState};
use super::reconciler::{Context, Next};
use super::store::ObjectStore;
use crate::crd::{Account, Duration, Monitor, MonitorStatus};
use crate::error::Result;
use crate::pulsetic::{FindRequest, PulseticClient};

#[instrument(skip(monitor, ctx), fields(name = %monitor.name_any(), namespace = monitor.namespace()))]
pub async fn reconcile_monitor<S, R>(monitor: Arc<Monitor>, ctx: Arc<Context<S, R>>) -> Result<Next>
where
    S: ObjectStore,
    R: EventRecorder,
{
    let start = Instant::now();

    match finalizer_state(monitor.as_ref()) {
        FinalizerState::Deleting => return cleanup_monitor(&monitor, &ctx, start).await,
        FinalizerState::Cleaned => return Ok(Next::AwaitChange),
        FinalizerState::Absent | FinalizerState::Present => {}
    }

    if monitor.spec.suspend {
        debug!("Monitor {} is suspended", monitor.name_any());
        return Ok(Next::AwaitChange);
    }

    let (account, client) = connect(&monitor, &ctx).await?;
    let params = monitor
        .spec
        .monitor
        .to_edit_params(account.spec.monitor_defaults.as_ref());
    let interval = Duration::from(monitor.spec.reconcile_interval());

    let find = FindRequest {
        id: Some(monitor.remote_id()),
        url: Some(params.url.clone()),
    };
    let existing = match client.find(&find).await {
        Ok(existing) => existing,
        Err(e) => {
            warn_event(&ctx.recorder, monitor.as_ref(), reason::FIND_MONITOR_FAILED, &e).await;
            return Err(e.into());
        }
    };

    let remote = match existing {
        None => match client.create(&params).await {
            Ok(remote) => {
                let message = format!(
                    "Created monitor {:?} in {}, next run in {}",
                    monitor.name_any(),
                    Duration::from(start.elapsed()),
                    interval
                );
                info!("{}", message);
                record(
                    &ctx.recorder,
                    monitor.as_ref(),
                    EventType::Normal,
                    reason::CREATE_MONITOR_SUCCEEDED,
                    &message,
                )
                .await;
                remote
            }
            Err(e) => {
                warn_event(&ctx.recorder, monitor.as_ref(), reason::CREATE_MONITOR_FAILED, &e)
                    .await;
                return Err(e.into());
            }
        },
        Some(found) => match client.update(found.id, &params).await {
            Ok(remote) => {
                let message = format!(
                    "Updated monitor {:?} in {}, next run in {}",
                    monitor.name_any(),
                    Duration::from(start.elapsed()),
                    interval
                );
                debug!("{}", message);
                record(
                    &ctx.recorder,
                    monitor.as_ref(),
                    EventType::Normal,
                    reason::UPDATE_MONITOR_SUCCEEDED,
                    &message,
                )
                .await;
                remote
            }
            Err(e) => {
                warn_event(&ctx.recorder, monitor.as_ref(), reason::UPDATE_MONITOR_FAILED, &e)
                    .await;
                return Err(e.into());
            }
        },
    };

    let status = MonitorStatus {
        ready: true,
        id: remote.id,
        running: remote.is_running,
        source_ref: monitor.source_ref().cloned(),
    };
    let stored = if monitor.status.as_ref() == Some(&status) {
        monitor.as_ref().clone()
    } else {
        match ctx.store.update_monitor_status(&monitor, &status).await {
            Ok(stored) => stored,
            Err(e) => {
                warn_event(&ctx.recorder, monitor.as_ref(), reason::UPDATE_STATUS_FAILED, &e)
                    .await;
                return Err(e);
            }
        }
    };

    if let Err(e) = ensure_finalizer(&ctx.store, &stored).await {
        warn_event(&ctx.recorder, monitor.as_ref(), reason::ADD_FINALIZER_FAILED, &e).await;
        return Err(e);
    }

    Ok(next_run(interval))
}

/// A zero interval turns off periodic revisits
fn next_run(interval: Duration) -> Next {
    if interval.0.is_zero() {
        Next::AwaitChange
    } else {
        Next::Requeue(interval.into())
    }
}

/// Prune the remote monitor if owned, then release the finalizer
async fn cleanup_monitor<S, R>(
    monitor: &Monitor,
    ctx: &Context<S, R>,
    start: Instant,
) -> Result<Next>
where
    S: ObjectStore,
    R: EventRecorder,
{
    let ready = monitor.status.as_ref().is_some_and(|s| s.ready);
    let id = monitor.remote_id();

    if monitor.spec.prune && ready && id != 0 {
        let (_, client) = connect(monitor, ctx).await?;
        if let Err(e) = client.delete(id).await {
            // Keep the finalizer so the remote monitor is not leaked
            warn_event(&ctx.recorder, monitor, reason::DELETE_MONITOR_FAILED, &e).await;
            return Err(e.into());
        }

        let message = format!(
            "Deleted monitor {:?} in {}",
            monitor.name_any(),
            Duration::from(start.elapsed())
        );
        info!("{}", message);
        record(
            &ctx.recorder,
            monitor,
            EventType::Normal,
            reason::DELETE_MONITOR_SUCCEEDED,
            &message,
        )
        .await;
    } else {
        debug!(
            prune = monitor.spec.prune,
            ready, id, "Leaving Pulsetic monitor in place"
        );
    }

    if let Err(e) = remove_finalizer(&ctx.store, monitor).await {
        warn_event(&ctx.recorder, monitor, reason::REMOVE_FINALIZER_FAILED, &e).await;
        return Err(e);
    }

    Ok(Next::AwaitChange)
}

/// Resolve the Monitor's Account and build an authenticated client
async fn connect<S, R>(monitor: &Monitor, ctx: &Context<S, R>) -> Result<(Account, PulseticClient)>
where
    S: ObjectStore,
    R: EventRecorder,
{
    let account = match resolve_account(&ctx.store, monitor.spec.account_name()).await {
        Ok(account) => account,
        Err(e) => {
            warn_event(&ctx.recorder, monitor, reason::GET_ACCOUNT_FAILED, &e).await;
            return Err(e);
        }
    };

    let api_key = match resolve_api_key(&ctx.store, &ctx.config, &account).await {
        Ok(key) => key,
        Err(e) => {
            warn_event(&ctx.recorder, monitor, reason::GET_API_KEY_FAILED, &e).await;
            warn_event(&ctx.recorder, &account, reason::GET_API_KEY_FAILED, &e).await;
            return Err(e);
        }
    };

    let client = ctx.pulsetic(api_key);
    Ok((account, client))
}
