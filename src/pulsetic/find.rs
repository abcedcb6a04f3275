//! Match criteria for locating a remote monitor

use super::types::RemoteMonitor;

/// Criteria for [`PulseticClient::find`](super::PulseticClient::find)
///
/// A record matches when its id equals `id`, or its URL equals `url` give or take one
/// trailing slash. A zero id or empty URL counts as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindRequest {
    pub id: Option<i64>,
    pub url: Option<String>,
}

impl FindRequest {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            url: None,
        }
    }

    pub fn by_url(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: Some(url.into()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id.filter(|id| *id != 0)
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn matches(&self, monitor: &RemoteMonitor) -> bool {
        self.id().is_some_and(|id| id == monitor.id) || self.matches_url(&monitor.url)
    }

    pub fn matches_url(&self, url: &str) -> bool {
        self.url().is_some_and(|want| same_url(want, url))
    }
}

fn same_url(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    long.len() == short.len() + 1 && long.starts_with(short) && long.ends_with('/')
}
