//! `monitors` endpoints
//!
//! Listing is lazy: [`PulseticClient::list`] fetches the next page only when the consumer
//! has drained the previous one, and dropping the stream stops pagination.

use std::collections::VecDeque;

use futures::{stream, Stream, TryStreamExt};
use reqwest::Method;
use tracing::{debug, warn};

use super::client::PulseticClient;
use super::error::PulseticError;
use super::find::FindRequest;
use super::types::{CreateMonitorRequest, DataEnvelope, MonitorEditParams, MonitorPage, RemoteMonitor};

const ENDPOINT_MONITORS: &str = "monitors";

struct PageCursor {
    next_page: Option<u32>,
    buffered: VecDeque<RemoteMonitor>,
}

impl PulseticClient {
    /// Fetch a single page of monitors, 1-based
    pub async fn list_page(&self, page: u32) -> Result<MonitorPage, PulseticError> {
        let request = self
            .request(Method::GET, ENDPOINT_MONITORS)
            .query(&[("page", page)]);
        self.execute_json(request).await
    }

    /// Every monitor of the account, one page at a time
    ///
    /// The stream ends after the first error.
    pub fn list(&self) -> impl Stream<Item = Result<RemoteMonitor, PulseticError>> + '_ {
        let cursor = PageCursor {
            next_page: Some(1),
            buffered: VecDeque::new(),
        };

        stream::try_unfold(cursor, move |mut cursor| async move {
            loop {
                if let Some(monitor) = cursor.buffered.pop_front() {
                    return Ok::<_, PulseticError>(Some((monitor, cursor)));
                }
                let Some(page) = cursor.next_page else {
                    return Ok::<_, PulseticError>(None);
                };

                let response = self.list_page(page).await?;
                debug!(
                    page,
                    last_page = response.last_page,
                    count = response.data.len(),
                    "Fetched monitor page"
                );
                cursor.next_page = (page < response.last_page).then_some(page + 1);
                cursor.buffered.extend(response.data);
            }
        })
    }

    /// Fetch a monitor by id. A 404 is a miss, not an error.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<RemoteMonitor>, PulseticError> {
        if id == 0 {
            return Ok(None);
        }

        let request = self.request(Method::GET, &format!("{ENDPOINT_MONITORS}/{id}"));
        match self
            .execute_json::<DataEnvelope<Option<RemoteMonitor>>>(request)
            .await
        {
            Ok(envelope) => Ok(envelope.data.filter(|m| m.id != 0)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Locate a monitor, by id first and then by scanning the list for the URL
    ///
    /// The scan stops requesting pages as soon as a match is found.
    pub async fn find(&self, find: &FindRequest) -> Result<Option<RemoteMonitor>, PulseticError> {
        if let Some(id) = find.id() {
            if let Some(monitor) = self.get_by_id(id).await? {
                return Ok(Some(monitor));
            }
            debug!(id, "Monitor id not found, falling back to URL scan");
        }

        if find.url().is_none() {
            return Ok(None);
        }

        let mut monitors = std::pin::pin!(self.list());
        while let Some(monitor) = monitors.try_next().await? {
            if find.matches_url(&monitor.url) {
                return Ok(Some(monitor));
            }
        }
        Ok(None)
    }

    /// Create a monitor for `params.url`, then apply the remaining fields
    pub async fn create(&self, params: &MonitorEditParams) -> Result<RemoteMonitor, PulseticError> {
        let body = serde_json::to_vec(&CreateMonitorRequest {
            urls: [params.url.as_str()],
        })?;
        let request = self.request(Method::POST, ENDPOINT_MONITORS).body(body);
        let created: Vec<RemoteMonitor> = self.execute_json(request).await?;

        let stub = match created.len() {
            0 => return Err(PulseticError::EmptyCreateResponse),
            1 => &created[0],
            count => {
                warn!(
                    count,
                    url = %params.url,
                    "Pulsetic created more than one monitor for a single URL"
                );
                let find = FindRequest::by_url(params.url.as_str());
                created
                    .iter()
                    .find(|m| find.matches_url(&m.url))
                    .unwrap_or(&created[0])
            }
        };

        self.update(stub.id, params).await
    }

    /// Replace the editable fields of a monitor
    pub async fn update(
        &self,
        id: i64,
        params: &MonitorEditParams,
    ) -> Result<RemoteMonitor, PulseticError> {
        let body = serde_json::to_vec(params)?;
        let request = self
            .request(Method::PUT, &format!("{ENDPOINT_MONITORS}/{id}"))
            .body(body);
        let envelope: DataEnvelope<RemoteMonitor> = self.execute_json(request).await?;
        Ok(envelope.data)
    }

    /// Delete a monitor. Deleting a monitor that no longer exists succeeds.
    pub async fn delete(&self, id: i64) -> Result<(), PulseticError> {
        let request = self.request(Method::DELETE, &format!("{ENDPOINT_MONITORS}/{id}"));
        match self.execute(request).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(id, "Monitor already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
