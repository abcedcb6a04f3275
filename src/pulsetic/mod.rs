//! Pulsetic API client
//!
//! A thin typed binding to the `monitors` endpoints of the Pulsetic public API together
//! with the lookup policy used to match a declared Monitor with its remote record.

mod client;
mod error;
mod find;
mod monitors;
mod types;

pub use client::PulseticClient;
pub use error::{ApiError, PulseticError};
pub use find::FindRequest;
pub use types::{MonitorEditParams, MonitorPage, Node, RemoteMonitor, RequestParams, SslCertificate};

pub(crate) use types::parse_bool;
