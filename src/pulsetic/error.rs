//! Errors returned by the Pulsetic API client

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use super::types::null_default;

#[derive(Error, Debug)]
pub enum PulseticError {
    /// Transport failure, including cancellation and timeouts
    #[error("Pulsetic request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Non-success status returned by the Pulsetic API
    #[error(transparent)]
    ApiError(#[from] ApiError),

    #[error("failed to decode Pulsetic response: {0}")]
    DecodeError(#[from] serde_json::Error),

    /// `POST monitors` answered without any monitor for the requested URL
    #[error("Pulsetic returned no monitor for the created URL")]
    EmptyCreateResponse,
}

impl PulseticError {
    pub fn is_retriable(&self) -> bool {
        match self {
            PulseticError::HttpError(e) => !e.is_decode() && !e.is_builder(),
            PulseticError::ApiError(e) => e.status == 408 || e.status == 429 || e.status >= 500,
            PulseticError::DecodeError(_) | PulseticError::EmptyCreateResponse => false,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            PulseticError::ApiError(e) => Some(e.status),
            PulseticError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Error envelope returned with every status code >= 400
///
/// ```json
/// {"message": "The given data was invalid.", "errors": {"url": ["The url field is required."]}}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,

    #[serde(default, deserialize_with = "null_default")]
    pub message: String,

    #[serde(default, deserialize_with = "null_default")]
    pub errors: BTreeMap<String, Vec<String>>,

    /// Raw body, kept when it could not be decoded as the envelope
    #[serde(skip)]
    pub body: Option<String>,
}

impl ApiError {
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiError>(body) {
            Ok(mut err) => {
                err.status = status;
                err
            }
            Err(_) => ApiError {
                status,
                body: Some(body.trim().to_string()).filter(|b| !b.is_empty()),
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pulsetic API error {}", self.status)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        for (field, messages) in &self.errors {
            write!(f, "\n{field}: {}", messages.join(" "))?;
        }
        if let Some(body) = &self.body {
            write!(f, ": {body}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}
