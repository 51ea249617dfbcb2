//! Network seam for sync round trips.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::wire::format_timestamp;
use super::{SyncError, SyncResult};

/// One outgoing round trip.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Full endpoint URL without query string
    pub url: String,
    pub token: String,
    /// Cursor for incremental pulls; `None` requests the full set
    pub since: Option<DateTime<Utc>>,
    /// Encoded `{"records": [...]}` body
    pub body: String,
}

impl fmt::Debug for SyncRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncRequest")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("since", &self.since)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl SyncRequest {
    /// Query pairs appended to the URL.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("token", self.token.clone())];
        if let Some(since) = self.since {
            query.push(("since", format_timestamp(since)));
        }
        query
    }
}

/// Raw response: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReply {
    pub status: u16,
    pub body: String,
}

impl SyncReply {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends a sync request and returns the raw reply.
///
/// Connectivity failures and timeouts are reported as
/// [`SyncError::Transport`]; any HTTP status, including errors, is a reply.
pub trait SyncTransport: Send + Sync {
    fn send(&self, request: SyncRequest) -> impl Future<Output = SyncResult<SyncReply>> + Send;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SyncError::Configuration(error.to_string()))?;
        Ok(Self { client })
    }
}

impl SyncTransport for HttpTransport {
    async fn send(&self, request: SyncRequest) -> SyncResult<SyncReply> {
        let response = self
            .client
            .post(&request.url)
            .query(&request.query())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(SyncReply { status, body })
    }
}
