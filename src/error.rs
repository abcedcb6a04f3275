//! Error types for the Pulsetic operator

use thiserror::Error;

use crate::pulsetic::PulseticError;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Pulsetic API error
    #[error(transparent)]
    PulseticError(#[from] PulseticError),

    /// A referenced control-plane object does not exist
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    /// No Account is flagged as the default
    #[error("no default account")]
    NoDefaultAccount,

    /// More than one Account is flagged as the default
    #[error("more than 1 default account found ({0})")]
    MultipleDefaultAccounts(usize),

    /// The credential secret does not contain the referenced key
    #[error("secret key not found: {secret}/{key}")]
    KeyNotFound { secret: String, key: String },

    /// A source annotation is unknown or malformed
    #[error("annotation {key:?}: {message}")]
    AnnotationDecodeError { key: String, message: String },

    /// A write carried a stale resourceVersion
    #[error("conflict: {0}")]
    ConflictError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the trigger layer should retry quickly.
    ///
    /// Optimistic-concurrency conflicts, throttling and transport failures clear up on
    /// their own. Configuration invariant violations need an operator to fix something.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => {
                resp.code == 409 || resp.code == 429 || resp.code >= 500
            }
            Error::KubeError(_) => true,
            Error::PulseticError(e) => e.is_retriable(),
            Error::ConflictError(_) => true,
            Error::NotFound { .. } => true,
            Error::NoDefaultAccount
            | Error::MultipleDefaultAccounts(_)
            | Error::KeyNotFound { .. }
            | Error::AnnotationDecodeError { .. }
            | Error::SerializationError(_)
            | Error::ConfigError(_) => false,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::PulseticError(_) => "pulsetic",
            Error::NotFound { .. } => "not_found",
            Error::NoDefaultAccount | Error::MultipleDefaultAccounts(_) => "default_account",
            Error::KeyNotFound { .. } => "key_not_found",
            Error::AnnotationDecodeError { .. } => "annotation",
            Error::ConflictError(_) => "conflict",
            Error::SerializationError(_) => "serialization",
            Error::ConfigError(_) => "config",
        }
    }
}
