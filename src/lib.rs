//! Pulsetic operator: keeps Pulsetic uptime monitors in sync with Kubernetes
//!
//! This crate provides a Kubernetes operator that reconciles `Monitor` objects, and
//! monitors derived from annotated Ingress and HTTPRoute objects, against the Pulsetic API.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod pulsetic;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
