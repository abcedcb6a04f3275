//! Tests for the source reconciler
//!
//! Annotated Ingress and HTTPRoute objects are reconciled against the in-memory control
//! plane. The source reconciler never talks to Pulsetic, so no fake API is mounted.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressSpec,
    };
    use kube::api::ObjectMeta;
    use kube::ResourceExt;

    use super::super::events::reason;
    use super::super::finalizers::{has_finalizer, FINALIZER};
    use super::super::reconciler::Next;
    use super::super::source::*;
    use super::super::testing::*;
    use crate::crd::gateway::{HTTPPathMatch, HTTPRouteMatch, HTTPRouteRule};
    use crate::crd::{
        Duration, HTTPRoute, HTTPRouteSpec, Monitor, MonitorSpec, MonitorStatus, SourceRef,
    };
    use crate::error::Error;

    const NAMESPACE: &str = "apps";
    const PREFIX: &str = "pulsetic.clevyr.com/";
    // Never contacted
    const API_URL: &str = "http://127.0.0.1:9";

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (format!("{PREFIX}{k}"), v.to_string()))
            .collect()
    }

    fn ingress(pairs: &[(&str, &str)]) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some(NAMESPACE.to_string()),
                annotations: Some(annotations(pairs)),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some("a.example.com".to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/status".to_string()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend::default(),
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            status: None,
        }
    }

    fn stored_ingress(ctx: &TestContext) -> Option<Ingress> {
        ctx.store.get(Some(NAMESPACE), "web")
    }

    /// Replace the annotations of the stored Ingress, as a user edit would
    fn annotate(ctx: &TestContext, pairs: &[(&str, &str)]) -> Ingress {
        let mut current = stored_ingress(ctx).unwrap();
        current.metadata.annotations = Some(annotations(pairs));
        ctx.store.insert(current)
    }

    fn owned(ctx: &TestContext, kind: &str) -> Vec<Monitor> {
        let source_ref = SourceRef::new(kind, "web");
        ctx.store
            .list::<Monitor>(Some(NAMESPACE))
            .into_iter()
            .filter(|m| m.source_ref() == Some(&source_ref))
            .collect()
    }

    #[tokio::test]
    async fn test_enabled_ingress_creates_monitor() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[
            ("enabled", "true"),
            ("monitor.interval", "5m"),
            ("prune", "false"),
        ]));

        let next = reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();
        assert_eq!(next, Next::AwaitChange);

        let monitors = owned(&ctx, "Ingress");
        assert_eq!(monitors.len(), 1);
        let monitor = &monitors[0];
        assert_eq!(monitor.name_any(), "web");
        assert_eq!(monitor.spec.monitor.name, "web");
        assert_eq!(monitor.spec.monitor.url, "http://a.example.com/status");
        assert_eq!(
            monitor.spec.monitor.defaults.interval,
            Some(Duration::from_secs(300))
        );
        assert!(!monitor.spec.prune);
        assert_eq!(
            monitor.annotations().get(SOURCE_ANNOTATION).map(String::as_str),
            Some("Ingress/web")
        );

        assert!(has_finalizer(&stored_ingress(&ctx).unwrap()));
        assert_eq!(
            ctx.recorder.reasons(),
            vec![reason::CREATE_MONITOR_SUCCEEDED]
        );
    }

    #[tokio::test]
    async fn test_rerun_without_changes_writes_nothing() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let writes = ctx.store.write_count();
        let source = stored_ingress(&ctx).unwrap();
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        assert_eq!(ctx.store.write_count(), writes);
        assert_eq!(owned(&ctx, "Ingress").len(), 1);
    }

    #[tokio::test]
    async fn test_annotation_change_updates_monitor() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let source = annotate(
            &ctx,
            &[("enabled", "true"), ("monitor.path", "/healthz"), ("monitor.name", "Web")],
        );
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let monitors = owned(&ctx, "Ingress");
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].spec.monitor.url, "http://a.example.com/healthz");
        assert_eq!(monitors[0].spec.monitor.name, "Web");
        assert!(ctx.recorder.has(reason::UPDATE_MONITOR_SUCCEEDED));
    }

    #[tokio::test]
    async fn test_url_annotation_wins() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[
            ("enabled", "true"),
            ("monitor.url", "https://status.example.com/ping"),
            ("monitor.scheme", "ftp"),
            ("monitor.host", "ignored.example.com"),
        ]));

        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let monitors = owned(&ctx, "Ingress");
        assert_eq!(monitors[0].spec.monitor.url, "https://status.example.com/ping");
    }

    #[tokio::test]
    async fn test_disabling_removes_owned_monitors_and_finalizer() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();
        assert_eq!(owned(&ctx, "Ingress").len(), 1);

        let source = annotate(&ctx, &[("enabled", "false")]);
        let next = reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();
        assert_eq!(next, Next::AwaitChange);

        assert!(owned(&ctx, "Ingress").is_empty());
        assert!(!has_finalizer(&stored_ingress(&ctx).unwrap()));
        assert!(ctx.recorder.has(reason::DELETE_MONITOR_SUCCEEDED));
    }

    #[tokio::test]
    async fn test_removing_annotations_counts_as_disabled() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let source = annotate(&ctx, &[]);
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        assert!(owned(&ctx, "Ingress").is_empty());
        assert!(!has_finalizer(&stored_ingress(&ctx).unwrap()));
    }

    #[tokio::test]
    async fn test_disabled_source_without_finalizer_is_ignored() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("monitor.interval", "5m")]));

        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        assert_eq!(ctx.store.write_count(), 0);
        assert!(ctx.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_source_releases_monitors() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let deleting: Ingress = ctx.store.mark_deleted(Some(NAMESPACE), "web").unwrap();
        reconcile_source(Arc::new(deleting), ctx.clone()).await.unwrap();

        assert!(owned(&ctx, "Ingress").is_empty());
        assert!(stored_ingress(&ctx).is_none());
    }

    #[tokio::test]
    async fn test_deleted_source_waits_for_finalized_monitors() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        // The Monitor reconciler holds its own finalizer until the remote monitor is pruned
        let mut monitor = owned(&ctx, "Ingress").remove(0);
        monitor.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
        ctx.store.insert(monitor);

        let deleting: Ingress = ctx.store.mark_deleted(Some(NAMESPACE), "web").unwrap();
        reconcile_source(Arc::new(deleting), ctx.clone()).await.unwrap();

        let monitors = owned(&ctx, "Ingress");
        assert_eq!(monitors.len(), 1);
        assert!(monitors[0].metadata.deletion_timestamp.is_some());
        assert!(stored_ingress(&ctx).is_none());
    }

    #[tokio::test]
    async fn test_unknown_annotation_fails_without_mutation() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "true"), ("interval", "1h")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();
        let before = owned(&ctx, "Ingress").remove(0);

        let source = annotate(
            &ctx,
            &[("enabled", "true"), ("interval", "2h"), ("monitor.intervall", "5m")],
        );
        let err = reconcile_source(Arc::new(source), ctx.clone())
            .await
            .unwrap_err();

        match &err {
            Error::AnnotationDecodeError { key, .. } => assert_eq!(key, "monitor.intervall"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_retriable());

        let after = owned(&ctx, "Ingress").remove(0);
        assert_eq!(after.spec, before.spec);
        assert_eq!(after.resource_version(), before.resource_version());
        assert!(ctx.recorder.has(reason::PARSE_ANNOTATION_FAILED));
    }

    #[tokio::test]
    async fn test_malformed_enabled_value() {
        let ctx = context(API_URL);
        let source = ctx.store.insert(ingress(&[("enabled", "sure")]));

        let err = reconcile_source(Arc::new(source), ctx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AnnotationDecodeError { ref key, .. } if key == "enabled"));
        assert!(owned(&ctx, "Ingress").is_empty());
        assert_eq!(ctx.recorder.reasons(), vec![reason::PARSE_ANNOTATION_FAILED]);
    }

    #[tokio::test]
    async fn test_orphaned_monitor_is_adopted() {
        let ctx = context(API_URL);
        // Created on an earlier pass whose status write failed
        let mut orphan = Monitor::new("web", MonitorSpec::default());
        orphan.metadata.namespace = Some(NAMESPACE.to_string());
        orphan
            .annotations_mut()
            .insert(SOURCE_ANNOTATION.to_string(), "Ingress/web".to_string());
        orphan.status = Some(MonitorStatus::default());
        ctx.store.insert(orphan);

        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone()).await.unwrap();

        let monitors = owned(&ctx, "Ingress");
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].spec.monitor.url, "http://a.example.com/status");
        assert!(!ctx.recorder.has(reason::CREATE_MONITOR_FAILED));
    }

    #[tokio::test]
    async fn test_hand_written_monitor_is_not_taken_over() {
        let ctx = context(API_URL);
        let mut spec = MonitorSpec::default();
        spec.monitor.name = "Mine".to_string();
        spec.monitor.url = "https://my-own-target.example.com".to_string();
        let mut mine = Monitor::new("web", spec.clone());
        mine.metadata.namespace = Some(NAMESPACE.to_string());
        mine.status = Some(MonitorStatus {
            ready: true,
            id: 77,
            running: true,
            source_ref: None,
        });
        let mine = ctx.store.insert(mine);

        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        let err = reconcile_source(Arc::new(source), ctx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KubeError(kube::Error::Api(ref resp)) if resp.code == 409));
        assert_eq!(ctx.recorder.reasons(), vec![reason::CREATE_MONITOR_FAILED]);

        let after: Monitor = ctx.store.get(Some(NAMESPACE), "web").unwrap();
        assert_eq!(after.spec, spec);
        assert_eq!(after.status, mine.status);
        assert_eq!(after.resource_version(), mine.resource_version());
        assert!(!has_finalizer(&stored_ingress(&ctx).unwrap()));
    }

    #[tokio::test]
    async fn test_monitor_from_another_source_is_not_taken_over() {
        let ctx = context(API_URL);
        let mut other = Monitor::new("web", MonitorSpec::default());
        other.metadata.namespace = Some(NAMESPACE.to_string());
        other
            .annotations_mut()
            .insert(SOURCE_ANNOTATION.to_string(), "HTTPRoute/web".to_string());
        ctx.store.insert(other);

        let source = ctx.store.insert(ingress(&[("enabled", "true")]));
        reconcile_source(Arc::new(source), ctx.clone())
            .await
            .unwrap_err();
        assert!(owned(&ctx, "Ingress").is_empty());
        assert!(ctx.recorder.has(reason::CREATE_MONITOR_FAILED));
    }

    #[tokio::test]
    async fn test_enabled_httproute_creates_monitor() {
        let ctx = context(API_URL);
        let mut route = HTTPRoute::new(
            "web",
            HTTPRouteSpec {
                hostnames: vec!["a.example.com".to_string()],
                rules: vec![HTTPRouteRule {
                    matches: vec![HTTPRouteMatch {
                        path: Some(HTTPPathMatch {
                            type_: Some("Exact".to_string()),
                            value: Some("/ping".to_string()),
                        }),
                    }],
                }],
            },
        );
        route.metadata.namespace = Some(NAMESPACE.to_string());
        route.metadata.annotations = Some(annotations(&[("enabled", "1")]));
        let route = ctx.store.insert(route);

        reconcile_source(Arc::new(route), ctx.clone()).await.unwrap();

        let monitors = owned(&ctx, "HTTPRoute");
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].spec.monitor.url, "https://a.example.com/ping");

        let route: HTTPRoute = ctx.store.get(Some(NAMESPACE), "web").unwrap();
        assert!(has_finalizer(&route));
    }

    #[tokio::test]
    async fn test_missing_host_reports_values_error() {
        let ctx = context(API_URL);
        let mut source = ingress(&[("enabled", "true")]);
        if let Some(spec) = source.spec.as_mut() {
            spec.rules = None;
        }
        let source = ctx.store.insert(source);

        let err = reconcile_source(Arc::new(source), ctx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(ctx.recorder.reasons(), vec![reason::GET_VALUES_FAILED]);
    }
}
