use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub silence: SilenceConfig,
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub services: Vec<ServiceRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub verbose: u8,
    /// Seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,
    /// Seconds between two pipeline runs.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_http_timeout() -> u64 {
    3
}

fn default_interval() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            verbose: 0,
            http_timeout: default_http_timeout(),
            interval: default_interval(),
        }
    }
}

impl ServerConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsConfig {
    pub service_label: String,
    pub unique_label: String,
    pub alertmanager_url: String,
    #[serde(default = "default_silences_api")]
    pub silences_api: String,
    #[serde(default = "default_alerts_api")]
    pub alerts_api: String,
}

fn default_silences_api() -> String {
    "/api/v1/silences".to_string()
}

fn default_alerts_api() -> String {
    "/api/v1/alerts".to_string()
}

impl AlertsConfig {
    pub fn silences_url(&self) -> Result<Url> {
        endpoint_url(&self.alertmanager_url, &self.silences_api)
    }

    pub fn alerts_url(&self) -> Result<Url> {
        endpoint_url(&self.alertmanager_url, &self.alerts_api)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceConfig {
    /// Active, expired and pending state names, in that order.
    #[serde(default = "default_silence_status")]
    pub silence_status: Vec<String>,
}

fn default_silence_status() -> Vec<String> {
    vec!["active".to_string(), "expired".to_string(), "pending".to_string()]
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            silence_status: default_silence_status(),
        }
    }
}

impl SilenceConfig {
    /// Typed view over `silence_status`, which must hold exactly three names.
    pub fn states(&self) -> Result<SilenceStates> {
        match self.silence_status.as_slice() {
            [active, expired, pending] => Ok(SilenceStates {
                active: active.clone(),
                expired: expired.clone(),
                pending: pending.clone(),
            }),
            other => Err(Error::Config(format!(
                "silenceStatus must list exactly 3 states (active, expired, pending), got {}",
                other.len()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilenceStates {
    pub active: String,
    pub expired: String,
    pub pending: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationConfig {
    /// Grafana base URL.
    pub url: String,
    #[serde(default = "default_annotation_api")]
    pub annotation_api: String,
    #[serde(default = "default_dashboard_search_api")]
    pub dashboard_search_api: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_annotation_api() -> String {
    "/api/annotations".to_string()
}

fn default_dashboard_search_api() -> String {
    "/api/search".to_string()
}

impl AnnotationConfig {
    /// Tags attached to every annotation and used for dashboard search.
    pub fn parse_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether Grafana requests carry a bearer token.
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn annotation_url(&self) -> Result<Url> {
        endpoint_url(&self.url, &self.annotation_api)
    }

    pub fn dashboard_search_url(&self) -> Result<Url> {
        endpoint_url(&self.url, &self.dashboard_search_api)
    }
}

/// Routes a service's alerts to the actions and systems that trigger annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRule {
    pub name: String,
    pub annotation_map: AnnotationMap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationMap {
    /// Annotation key whose text is matched against actions and systems.
    pub label: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub systems: Vec<String>,
}

/// Joins `base` and `path` with exactly one slash between them.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let joined = match (base.trim_end_matches('/'), path.trim_start_matches('/')) {
        (base, "") => base.to_string(),
        (base, path) => format!("{}/{}", base, path),
    };
    Ok(Url::parse(&joined)?)
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("unable to read config {}: {}", path.display(), e))
        })?;
        let mut config: Config = serde_json::from_str(&raw)?;

        if let Ok(token) = std::env::var("INTELLIGENCE_ANNOTATION_TOKEN") {
            config.annotation.token = token;
        }
        if let Ok(url) = std::env::var("INTELLIGENCE_ANNOTATION_URL") {
            config.annotation.url = url;
        }
        if let Ok(url) = std::env::var("INTELLIGENCE_ALERTMANAGER_URL") {
            config.alerts.alertmanager_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.alerts.service_label.is_empty() {
            return Err(Error::Config("alerts.serviceLabel must not be empty".to_string()));
        }
        if self.alerts.unique_label.is_empty() {
            return Err(Error::Config("alerts.uniqueLabel must not be empty".to_string()));
        }
        self.silence.states()?;
        self.alerts
            .silences_url()
            .map_err(|e| Error::Config(format!("invalid alerts.alertmanagerUrl: {}", e)))?;
        self.annotation
            .annotation_url()
            .map_err(|e| Error::Config(format!("invalid annotation url: {}", e)))?;
        Ok(())
    }
}
