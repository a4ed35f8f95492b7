use async_trait::async_trait;
use reqwest::Client;
use tracing::{trace, warn};
use url::Url;

use super::{check_status, http_client, AnnotationSink, DashboardSource};
use crate::config::Config;
use crate::metrics::ANNOTATIONS_TOTAL;
use crate::models::Dashboard;
use crate::Result;

/// Grafana client for dashboard search and annotation pushes.
pub struct GrafanaClient {
    client: Client,
    annotation_url: Url,
    search_url: Url,
    token: String,
    tags: Vec<String>,
}

impl GrafanaClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client(config.server.http_timeout())?,
            annotation_url: config.annotation.annotation_url()?,
            search_url: config.annotation.dashboard_search_url()?,
            token: config.annotation.token.clone(),
            tags: config.annotation.parse_tags(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// POSTs one serialized annotation. Callers usually want [`AnnotationSink::dispatch`].
    pub async fn post_annotation(&self, payload: Vec<u8>) -> Result<()> {
        let request = self
            .client
            .post(self.annotation_url.clone())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .body(payload)
            .build()?;
        trace!(
            url = %request.url(),
            headers = ?request.headers(),
            body = ?request.body().and_then(|b| b.as_bytes()).map(String::from_utf8_lossy),
            "annotation request"
        );

        let response = self.client.execute(request).await?;
        let response = check_status(response).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        trace!(status = %status, headers = ?headers, body = %body, "annotation response");
        Ok(())
    }
}

#[async_trait]
impl DashboardSource for GrafanaClient {
    async fn find_dashboards(&self) -> Result<Vec<Dashboard>> {
        let query: Vec<(&str, &str)> = self.tags.iter().map(|t| ("tag", t.as_str())).collect();
        let response = self
            .client
            .get(self.search_url.clone())
            .header("Authorization", self.bearer())
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AnnotationSink for GrafanaClient {
    async fn dispatch(&self, payload: Vec<u8>) {
        match self.post_annotation(payload).await {
            Ok(()) => ANNOTATIONS_TOTAL.with_label_values(&["sent"]).inc(),
            Err(e) => {
                ANNOTATIONS_TOTAL.with_label_values(&["failed"]).inc();
                warn!(url = %self.annotation_url, "Unable to push annotation: {}", e);
            }
        }
    }
}
