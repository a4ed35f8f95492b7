//! Collaborators the pipeline talks to.
//!
//! Each concern sits behind a trait so the stages can be driven by fakes in
//! tests. [`AlertmanagerClient`] and [`GrafanaClient`] are the HTTP
//! implementations.

mod alertmanager;
mod grafana;

pub use alertmanager::AlertmanagerClient;
pub use grafana::GrafanaClient;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{AlertEvent, Dashboard, SilenceList};
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SilenceSource: Send + Sync {
    async fn list_silences(&self) -> Result<SilenceList>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn list_alerts(&self) -> Result<Vec<AlertEvent>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn find_dashboards(&self) -> Result<Vec<Dashboard>>;
}

/// Fire-and-forget sink for serialized annotation payloads.
///
/// Implementations log and swallow every failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnnotationSink: Send + Sync {
    async fn dispatch(&self, payload: Vec<u8>);
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turns a non-2xx response into [`crate::Error::Upstream`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(crate::Error::Upstream {
        url,
        status: status.as_u16(),
        body,
    })
}
