use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{forward, next_event, Shutdown, STAGE_CAPACITY};
use crate::clients::SilenceSource;
use crate::config::{Config, ServiceRule};
use crate::metrics::{ALERTS_SUPPRESSED_TOTAL, EVENTS_PROCESSED_TOTAL};
use crate::models::AlertEvent;
use crate::silence::SilenceTable;

/// Drops alerts covered by an active silence and keeps only alerts of
/// configured services.
#[derive(Clone)]
pub struct Preprocessor {
    table: Arc<SilenceTable>,
    silences: Arc<dyn SilenceSource>,
    rules: Arc<Vec<ServiceRule>>,
    service_label: String,
    unique_label: String,
}

impl Preprocessor {
    pub fn new(config: &Config, table: Arc<SilenceTable>, silences: Arc<dyn SilenceSource>) -> Self {
        Self {
            table,
            silences,
            rules: Arc::new(config.services.clone()),
            service_label: config.alerts.service_label.clone(),
            unique_label: config.alerts.unique_label.clone(),
        }
    }

    /// Rebuilds the silence table, then spawns the stage.
    ///
    /// An alert is emitted once for every rule naming its service, so rules
    /// that share a service name duplicate it downstream.
    pub async fn preprocess(
        &self,
        input: mpsc::Receiver<AlertEvent>,
        shutdown: Shutdown,
    ) -> mpsc::Receiver<AlertEvent> {
        debug!("Preprocess step");
        self.table.rebuild(self.silences.as_ref()).await;
        debug!("Current silence table has {} entries", self.table.len().await);
        trace!("Current silence table: {:?}", self.table.snapshot().await);

        let (tx, rx) = mpsc::channel(STAGE_CAPACITY);
        let stage = self.clone();
        tokio::spawn(async move {
            stage.run(input, tx, shutdown).await;
        });
        rx
    }

    async fn run(
        self,
        mut input: mpsc::Receiver<AlertEvent>,
        output: mpsc::Sender<AlertEvent>,
        mut shutdown: Shutdown,
    ) {
        while let Some(event) = next_event(&mut input, &mut shutdown).await {
            EVENTS_PROCESSED_TOTAL.with_label_values(&["preprocess"]).inc();
            trace!(?event, "Preprocessing alert");

            let service = event.label(&self.service_label);
            for rule in self.rules.iter() {
                if service != Some(rule.name.as_str()) {
                    continue;
                }
                let Some(key) = event.label(&self.unique_label) else {
                    continue;
                };
                if let Some(entry) = self.table.get(key).await {
                    ALERTS_SUPPRESSED_TOTAL.inc();
                    debug!(alert = key, silence_id = %entry.silence_id, "Alert is silenced");
                    continue;
                }
                if !forward(&output, event.clone(), &mut shutdown).await {
                    debug!("Preprocess stage stopped");
                    return;
                }
            }
        }
        debug!("Preprocess stage finished");
    }
}
