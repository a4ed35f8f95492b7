use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;
use url::Url;

use super::{check_status, http_client, AlertSource, SilenceSource};
use crate::config::Config;
use crate::models::{AlertEvent, AlertList, SilenceList};
use crate::Result;

/// Alertmanager v1 API client for silences and alerts.
pub struct AlertmanagerClient {
    client: Client,
    silences_url: Url,
    alerts_url: Url,
}

impl AlertmanagerClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client(config.server.http_timeout())?,
            silences_url: config.alerts.silences_url()?,
            alerts_url: config.alerts.alerts_url()?,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &Url) -> Result<T> {
        trace!(url = %url, "GET");
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SilenceSource for AlertmanagerClient {
    async fn list_silences(&self) -> Result<SilenceList> {
        self.get(&self.silences_url).await
    }
}

#[async_trait]
impl AlertSource for AlertmanagerClient {
    async fn list_alerts(&self) -> Result<Vec<AlertEvent>> {
        let list: AlertList = self.get(&self.alerts_url).await?;
        Ok(list.data)
    }
}
