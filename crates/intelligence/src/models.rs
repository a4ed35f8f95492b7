use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single alert as served by the Alertmanager v1 API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, Value>,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt", default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default, skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

impl AlertEvent {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Annotation value at `key`, if present and a JSON string.
    pub fn annotation_str(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).and_then(Value::as_str)
    }

    pub fn starts_at_millis(&self) -> i64 {
        self.starts_at.timestamp() * 1000
    }

    /// Zero for open-ended alerts. Alertmanager encodes those either as a
    /// missing field or as the zero time `0001-01-01T00:00:00Z`.
    pub fn ends_at_millis(&self) -> i64 {
        match self.ends_at {
            Some(ends_at) if ends_at.timestamp() > 0 => ends_at.timestamp() * 1000,
            _ => 0,
        }
    }
}

/// Envelope used by the Alertmanager v1 list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiList<T> {
    #[serde(default)]
    pub status: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceRecord {
    pub id: String,
    pub status: SilenceStatus,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    #[serde(rename = "startsAt", default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt", default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdBy", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceStatus {
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    #[serde(rename = "isRegex", default)]
    pub is_regex: bool,
}

pub type SilenceList = ApiList<SilenceRecord>;
pub type AlertList = ApiList<AlertEvent>;

/// Dashboard object as returned by the Grafana search API.
pub type Dashboard = serde_json::Map<String, Value>;

/// Integer `id` of a dashboard, zero when missing or not an integer.
pub fn dashboard_id(dashboard: &Dashboard) -> i64 {
    dashboard.get("id").and_then(Value::as_i64).unwrap_or(0)
}

/// Body of a Grafana `POST /api/annotations` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationPayload {
    pub dashboard_id: i64,
    pub time: i64,
    pub time_end: i64,
    pub tags: Vec<String>,
    pub text: String,
}
