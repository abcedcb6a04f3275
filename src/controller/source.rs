//! Source reconciler
//!
//! Turns annotated route objects (Ingress, HTTPRoute) into Monitors. The generated
//! Monitors are found again through `status.sourceRef`, and the source carries the shared
//! finalizer while it owns any of them.

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::annotations::{apply_annotations, matching_annotations, parse_enabled, UrlOverrides};
use super::events::{reason, record, warn_event, EventRecorder, EventType};
use super::finalizers::{
    ensure_finalizer, finalizer_state, has_finalizer, remove_finalizer, FinalizerState,
};
use super::reconciler::{Context, Next};
use super::store::{Finalizable, ObjectStore};
use crate::crd::{Duration, Monitor, MonitorSpec, SourceRef};
use crate::error::{Error, Result};

/// Set on generated Monitors at creation, holding the source's `Kind/Name`
pub const SOURCE_ANNOTATION: &str = "pulsetic.clevyr.com/source";

/// A routing object whose own configuration can supply a monitor URL
pub trait MonitorSource: Finalizable {
    /// Scheme used when no `monitor.scheme` annotation is set
    fn default_scheme(&self) -> &'static str;

    /// Host of the first routing rule
    fn first_host(&self) -> Option<String>;

    /// First concrete path, or `None` when only `/` or pattern paths are routed
    fn first_path(&self) -> Option<String>;
}

/// URL to monitor for `source`
///
/// `monitor.url` wins outright. Otherwise each of scheme, host and path comes from its
/// annotation, then from the source's routing rules, and the scheme finally from the
/// source type's default.
pub fn desired_url<K: MonitorSource>(source: &K, overrides: &UrlOverrides) -> Result<String> {
    if let Some(url) = &overrides.url {
        return Ok(url.clone());
    }

    let scheme = overrides
        .scheme
        .clone()
        .unwrap_or_else(|| source.default_scheme().to_string());
    let host = overrides
        .host
        .clone()
        .or_else(|| source.first_host())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            Error::ConfigError(format!(
                "{} {} has no host to monitor; set the monitor.host or monitor.url annotation",
                K::kind(&()),
                source.name_any()
            ))
        })?;
    let path = overrides
        .path
        .clone()
        .or_else(|| source.first_path())
        .unwrap_or_default();

    let separator = if path.is_empty() || path.starts_with('/') {
        ""
    } else {
        "/"
    };
    Ok(format!("{scheme}://{host}{separator}{path}"))
}

#[instrument(skip(source, ctx), fields(kind = %K::kind(&()), name = %source.name_any(), namespace = source.namespace()))]
pub async fn reconcile_source<K, S, R>(source: Arc<K>, ctx: Arc<Context<S, R>>) -> Result<Next>
where
    K: MonitorSource,
    S: ObjectStore,
    R: EventRecorder,
{
    let start = Instant::now();
    let name = source.name_any();
    let namespace = source.namespace().unwrap_or_else(|| "default".to_string());
    let source_ref = SourceRef::new(K::kind(&()), name.as_str());

    let owned = match ctx
        .store
        .list_monitors_for_source(&namespace, &source_ref)
        .await
    {
        Ok(owned) => owned,
        Err(e) => {
            warn_event(&ctx.recorder, source.as_ref(), reason::FIND_MONITOR_FAILED, &e).await;
            return Err(e);
        }
    };

    match finalizer_state(source.as_ref()) {
        FinalizerState::Deleting => {
            release_source(source.as_ref(), &owned, &ctx, start).await?;
            return Ok(Next::AwaitChange);
        }
        FinalizerState::Cleaned => return Ok(Next::AwaitChange),
        FinalizerState::Absent | FinalizerState::Present => {}
    }

    let annotations = matching_annotations(source.annotations(), &ctx.config.annotation_prefix);

    let enabled = match parse_enabled(&annotations) {
        Ok(enabled) => enabled,
        Err(e) => {
            warn_event(&ctx.recorder, source.as_ref(), reason::PARSE_ANNOTATION_FAILED, &e).await;
            return Err(e);
        }
    };

    if !enabled {
        if has_finalizer(source.as_ref()) {
            release_source(source.as_ref(), &owned, &ctx, start).await?;
        }
        return Ok(Next::AwaitChange);
    }

    let url = match desired_url(source.as_ref(), &UrlOverrides::from_annotations(&annotations)) {
        Ok(url) => url,
        Err(e) => {
            warn_event(&ctx.recorder, source.as_ref(), reason::GET_VALUES_FAILED, &e).await;
            return Err(e);
        }
    };

    let (targets, create) = if owned.is_empty() {
        match adoptable(&ctx.store, &namespace, &name, &source_ref).await? {
            Some(orphan) => (vec![orphan], false),
            None => {
                // A same-named Monitor owned by someone else makes the create fail
                let mut monitor = Monitor::new(&name, MonitorSpec::default());
                monitor.metadata.namespace = Some(namespace.clone());
                monitor
                    .annotations_mut()
                    .insert(SOURCE_ANNOTATION.to_string(), source_ref.to_string());
                (vec![monitor], true)
            }
        }
    } else {
        (owned, false)
    };

    for current in targets {
        let mut desired = current.clone();
        desired.spec = MonitorSpec::default();
        desired.spec.monitor.name = current.name_any();
        desired.spec.monitor.url = url.clone();
        if let Err(e) = apply_annotations(&mut desired.spec, &annotations) {
            warn_event(&ctx.recorder, source.as_ref(), reason::PARSE_ANNOTATION_FAILED, &e).await;
            return Err(e);
        }

        let stored = if create {
            match ctx.store.create_monitor(&desired).await {
                Ok(stored) => {
                    let message = format!(
                        "Created monitor {:?} in {}",
                        desired.name_any(),
                        Duration::from(start.elapsed())
                    );
                    info!("{}", message);
                    record(
                        &ctx.recorder,
                        source.as_ref(),
                        EventType::Normal,
                        reason::CREATE_MONITOR_SUCCEEDED,
                        &message,
                    )
                    .await;
                    stored
                }
                Err(e) => {
                    warn_event(&ctx.recorder, source.as_ref(), reason::CREATE_MONITOR_FAILED, &e)
                        .await;
                    return Err(e);
                }
            }
        } else if desired.spec != current.spec {
            match ctx.store.replace_monitor(&desired).await {
                Ok(stored) => {
                    let message = format!(
                        "Updated monitor {:?} in {}",
                        desired.name_any(),
                        Duration::from(start.elapsed())
                    );
                    info!("{}", message);
                    record(
                        &ctx.recorder,
                        source.as_ref(),
                        EventType::Normal,
                        reason::UPDATE_MONITOR_SUCCEEDED,
                        &message,
                    )
                    .await;
                    stored
                }
                Err(e) => {
                    warn_event(&ctx.recorder, source.as_ref(), reason::UPDATE_MONITOR_FAILED, &e)
                        .await;
                    return Err(e);
                }
            }
        } else {
            debug!("Monitor {} is up to date", current.name_any());
            current
        };

        if stored.source_ref() != Some(&source_ref) {
            let mut status = stored.status.clone().unwrap_or_default();
            status.source_ref = Some(source_ref.clone());
            if let Err(e) = ctx.store.update_monitor_status(&stored, &status).await {
                warn_event(
                    &ctx.recorder,
                    source.as_ref(),
                    reason::UPDATE_MONITOR_STATUS_FAILED,
                    &e,
                )
                .await;
                return Err(e);
            }
        }
    }

    if let Err(e) = ensure_finalizer(&ctx.store, source.as_ref()).await {
        warn_event(&ctx.recorder, source.as_ref(), reason::ADD_FINALIZER_FAILED, &e).await;
        return Err(e);
    }

    Ok(Next::AwaitChange)
}

/// A Monitor this source created that lost its sourceRef, e.g. because the status write
/// after its creation failed. Only Monitors carrying [`SOURCE_ANNOTATION`] for this
/// source qualify; hand-written Monitors are never taken over.
async fn adoptable<S>(
    store: &S,
    namespace: &str,
    name: &str,
    source_ref: &SourceRef,
) -> Result<Option<Monitor>>
where
    S: ObjectStore,
{
    let marker = source_ref.to_string();
    let existing = store.get_monitor(namespace, name).await?;
    Ok(existing.filter(|m| {
        m.source_ref().is_none()
            && m.metadata.deletion_timestamp.is_none()
            && m.annotations().get(SOURCE_ANNOTATION) == Some(&marker)
    }))
}

/// Delete every owned Monitor, then drop the source's finalizer
async fn release_source<K, S, R>(
    source: &K,
    owned: &[Monitor],
    ctx: &Context<S, R>,
    start: Instant,
) -> Result<()>
where
    K: MonitorSource,
    S: ObjectStore,
    R: EventRecorder,
{
    for monitor in owned {
        let namespace = monitor.namespace().unwrap_or_else(|| "default".to_string());
        if let Err(e) = ctx.store.delete_monitor(&namespace, &monitor.name_any()).await {
            warn_event(&ctx.recorder, source, reason::DELETE_MONITOR_FAILED, &e).await;
            return Err(e);
        }

        let message = format!(
            "Deleted monitor {:?} in {}",
            monitor.name_any(),
            Duration::from(start.elapsed())
        );
        info!("{}", message);
        record(
            &ctx.recorder,
            source,
            EventType::Normal,
            reason::DELETE_MONITOR_SUCCEEDED,
            &message,
        )
        .await;
    }

    if let Err(e) = remove_finalizer(&ctx.store, source).await {
        warn_event(&ctx.recorder, source, reason::REMOVE_FINALIZER_FAILED, &e).await;
        return Err(e);
    }
    Ok(())
}
