//! Ingress as a monitor source

use k8s_openapi::api::networking::v1::Ingress;

use super::source::MonitorSource;

/// Characters that only appear in pattern paths, e.g. `/api/(.*)` for ingress-nginx
const PATTERN_CHARS: &[char] = &['*', '(', ')', '[', ']', '^', '$', '|', '?', '+', '\\', '{', '}'];

fn is_concrete_path(path: &str) -> bool {
    !path.is_empty() && path != "/" && !path.contains(PATTERN_CHARS)
}

impl MonitorSource for Ingress {
    fn default_scheme(&self) -> &'static str {
        let has_tls = self
            .spec
            .as_ref()
            .and_then(|spec| spec.tls.as_ref())
            .is_some_and(|tls| !tls.is_empty());
        if has_tls {
            "https"
        } else {
            "http"
        }
    }

    fn first_host(&self) -> Option<String> {
        self.spec
            .as_ref()?
            .rules
            .as_ref()?
            .first()?
            .host
            .clone()
    }

    fn first_path(&self) -> Option<String> {
        self.spec
            .as_ref()?
            .rules
            .as_ref()?
            .first()?
            .http
            .as_ref()?
            .paths
            .iter()
            .filter_map(|p| p.path.as_deref())
            .find(|p| is_concrete_path(p))
            .map(str::to_string)
    }
}
