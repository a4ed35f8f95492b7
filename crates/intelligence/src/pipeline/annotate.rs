use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{forward, next_event, Shutdown, STAGE_CAPACITY};
use crate::clients::{AnnotationSink, DashboardSource};
use crate::config::{Config, ServiceRule};
use crate::metrics::EVENTS_PROCESSED_TOTAL;
use crate::models::{dashboard_id, AlertEvent, AnnotationPayload, Dashboard};

const SHORT_DESCRIPTION: &str = "shortDescription";

/// Pushes Grafana annotations for matching alerts and passes every alert
/// through unchanged.
#[derive(Clone)]
pub struct Annotator {
    rules: Arc<Vec<ServiceRule>>,
    service_label: String,
    tags: Arc<Vec<String>>,
    dashboards: Arc<dyn DashboardSource>,
    sink: Arc<dyn AnnotationSink>,
}

/// `(action, system)` pairs of `rule` triggered by `event`, action-major.
///
/// Both need to appear, case-insensitively, in the event's annotation at
/// the rule's label. A missing or non-string annotation triggers nothing.
pub fn matching_targets<'a>(rule: &'a ServiceRule, event: &AlertEvent) -> Vec<(&'a str, &'a str)> {
    let Some(text) = event.annotation_str(&rule.annotation_map.label) else {
        return Vec::new();
    };
    let text = text.to_lowercase();
    let contains = |needle: &String| text.contains(&needle.to_lowercase());

    let systems: Vec<&str> = rule
        .annotation_map
        .systems
        .iter()
        .filter(|system| contains(*system))
        .map(String::as_str)
        .collect();

    rule.annotation_map
        .actions
        .iter()
        .filter(|action| contains(*action))
        .flat_map(|action| systems.iter().map(move |system| (action.as_str(), *system)))
        .collect()
}

pub fn build_payload(event: &AlertEvent, dashboard: &Dashboard, tags: &[String]) -> AnnotationPayload {
    AnnotationPayload {
        dashboard_id: dashboard_id(dashboard),
        time: event.starts_at_millis(),
        time_end: event.ends_at_millis(),
        tags: tags.to_vec(),
        text: event
            .annotation_str(SHORT_DESCRIPTION)
            .unwrap_or_default()
            .to_string(),
    }
}

impl Annotator {
    pub fn new(config: &Config, dashboards: Arc<dyn DashboardSource>, sink: Arc<dyn AnnotationSink>) -> Self {
        Self {
            rules: Arc::new(config.services.clone()),
            service_label: config.alerts.service_label.clone(),
            tags: Arc::new(config.annotation.parse_tags()),
            dashboards,
            sink,
        }
    }

    /// Spawns the stage. Dashboards are looked up once for the whole run.
    pub fn annotate(
        &self,
        input: mpsc::Receiver<AlertEvent>,
        shutdown: Shutdown,
    ) -> mpsc::Receiver<AlertEvent> {
        let (tx, rx) = mpsc::channel(STAGE_CAPACITY);
        let stage = self.clone();
        tokio::spawn(async move {
            let dashboards = match stage.dashboards.find_dashboards().await {
                Ok(dashboards) => dashboards,
                Err(e) => {
                    warn!("Unable to find dashboards, annotations are disabled for this run: {}", e);
                    Vec::new()
                }
            };
            debug!("Annotating against {} dashboards", dashboards.len());
            stage.run(input, tx, dashboards, shutdown).await;
        });
        rx
    }

    async fn run(
        self,
        mut input: mpsc::Receiver<AlertEvent>,
        output: mpsc::Sender<AlertEvent>,
        dashboards: Vec<Dashboard>,
        mut shutdown: Shutdown,
    ) {
        while let Some(event) = next_event(&mut input, &mut shutdown).await {
            EVENTS_PROCESSED_TOTAL.with_label_values(&["annotate"]).inc();
            self.annotate_event(&event, &dashboards).await;
            if !forward(&output, event, &mut shutdown).await {
                debug!("Annotate stage stopped");
                return;
            }
        }
        debug!("Annotate stage finished");
    }

    /// Dispatches one annotation per matching rule, action, system and dashboard.
    async fn annotate_event(&self, event: &AlertEvent, dashboards: &[Dashboard]) {
        let service = event.label(&self.service_label);
        for rule in self.rules.iter().filter(|rule| service == Some(rule.name.as_str())) {
            for (action, system) in matching_targets(rule, event) {
                for dashboard in dashboards {
                    let payload = build_payload(event, dashboard, &self.tags);
                    debug!(service = %rule.name, action, system, "Annotation: {:?}", payload);
                    match serde_json::to_vec(&payload) {
                        Ok(body) => self.sink.dispatch(body).await,
                        Err(e) => warn!("Unable to convert annotation {:?} into JSON: {}", payload, e),
                    }
                }
            }
        }
    }
}
