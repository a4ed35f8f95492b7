//! Alert pipeline: `raw alerts -> Preprocessor -> Annotator -> consumer`.
//!
//! Every stage is one tokio task reading from its input channel and writing
//! to a capacity-1 output channel, so a slow consumer throttles its producer.
//! A stage closes its output when its input closes, when shutdown is
//! signalled, or when its consumer goes away.

mod annotate;
mod preprocess;

pub use annotate::{build_payload, matching_targets, Annotator};
pub use preprocess::Preprocessor;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::clients::{AnnotationSink, DashboardSource, SilenceSource};
use crate::config::Config;
use crate::models::AlertEvent;
use crate::silence::SilenceTable;
use crate::Result;

/// Capacity of every inter-stage channel.
pub const STAGE_CAPACITY: usize = 1;

/// Cooperative shutdown signal shared by all stages.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered. Pends forever if the trigger is
    /// dropped without firing.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Waits for the next input event, or `None` on end of input or shutdown.
pub(crate) async fn next_event(
    input: &mut mpsc::Receiver<AlertEvent>,
    shutdown: &mut Shutdown,
) -> Option<AlertEvent> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        event = input.recv() => event,
    }
}

/// Hands `event` downstream. `false` means the stage should stop.
pub(crate) async fn forward(
    output: &mpsc::Sender<AlertEvent>,
    event: AlertEvent,
    shutdown: &mut Shutdown,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        sent = output.send(event) => sent.is_ok(),
    }
}

/// Feeds a batch of alerts into a fresh stage channel.
pub fn stream_from(events: Vec<AlertEvent>, shutdown: Shutdown) -> mpsc::Receiver<AlertEvent> {
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);
    tokio::spawn(async move {
        let mut shutdown = shutdown;
        for event in events {
            if !forward(&tx, event, &mut shutdown).await {
                break;
            }
        }
    });
    rx
}

/// Preprocessor and Annotator wired together over one silence table.
pub struct Pipeline {
    table: Arc<SilenceTable>,
    preprocessor: Preprocessor,
    annotator: Annotator,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        silences: Arc<dyn SilenceSource>,
        dashboards: Arc<dyn DashboardSource>,
        sink: Arc<dyn AnnotationSink>,
    ) -> Result<Self> {
        let table = Arc::new(SilenceTable::new(
            config.alerts.unique_label.clone(),
            config.silence.states()?,
        ));
        Ok(Self {
            preprocessor: Preprocessor::new(config, table.clone(), silences),
            annotator: Annotator::new(config, dashboards, sink),
            table,
        })
    }

    pub fn silence_table(&self) -> &Arc<SilenceTable> {
        &self.table
    }

    /// One activation: refreshes silences, then starts both stages.
    pub async fn run(
        &self,
        input: mpsc::Receiver<AlertEvent>,
        shutdown: Shutdown,
    ) -> mpsc::Receiver<AlertEvent> {
        let preprocessed = self.preprocessor.preprocess(input, shutdown.clone()).await;
        self.annotator.annotate(preprocessed, shutdown)
    }
}
