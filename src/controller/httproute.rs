//! Gateway API HTTPRoute as a monitor source

use super::source::MonitorSource;
use crate::crd::gateway::{HTTPRoute, PATH_MATCH_REGULAR_EXPRESSION};

impl MonitorSource for HTTPRoute {
    fn default_scheme(&self) -> &'static str {
        "https"
    }

    fn first_host(&self) -> Option<String> {
        self.spec.hostnames.first().cloned()
    }

    fn first_path(&self) -> Option<String> {
        self.spec
            .rules
            .iter()
            .flat_map(|rule| rule.matches.iter())
            .filter_map(|m| m.path.as_ref())
            .filter(|path| {
                path.type_
                    .as_deref()
                    .is_some_and(|t| t != PATH_MATCH_REGULAR_EXPRESSION)
            })
            .find_map(|path| path.value.clone())
    }
}
