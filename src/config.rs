//! Operator configuration shared by every reconciler

/// Public Pulsetic API endpoint
pub const DEFAULT_API_URL: &str = "https://api.pulsetic.com/api/public";

/// Namespace holding Account credential secrets unless a reference names another one
pub const DEFAULT_CLUSTER_RESOURCE_NAMESPACE: &str = "pulsetic-system";

/// Prefix of the annotations that turn a route into a monitor source
pub const DEFAULT_ANNOTATION_PREFIX: &str = "pulsetic.clevyr.com/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Base URL of the Pulsetic API, without a trailing slash
    pub api_url: String,
    pub cluster_resource_namespace: String,
    pub annotation_prefix: String,
}

impl OperatorConfig {
    pub fn new(
        api_url: impl Into<String>,
        cluster_resource_namespace: impl Into<String>,
        annotation_prefix: impl Into<String>,
    ) -> Self {
        let api_url = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            cluster_resource_namespace: cluster_resource_namespace.into(),
            annotation_prefix: annotation_prefix.into(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_API_URL,
            DEFAULT_CLUSTER_RESOURCE_NAMESPACE,
            DEFAULT_ANNOTATION_PREFIX,
        )
    }
}
