//! HTTP endpoint for probes and metrics
//!
//! Serves `/healthz` and `/readyz` for the kubelet and, with the `metrics` feature,
//! `/metrics` for Prometheus.

mod handlers;
mod server;

pub use server::{router, run_server, ServerState};
