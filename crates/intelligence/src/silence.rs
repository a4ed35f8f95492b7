use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clients::SilenceSource;
use crate::config::SilenceStates;
use crate::metrics::SILENCES_SEEN_TOTAL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilenceEntry {
    pub available: bool,
    pub silence_id: String,
}

/// Cumulative per-state totals of every silence record seen by [`SilenceTable::rebuild`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SilenceCounts {
    pub active: u64,
    pub expired: u64,
    pub pending: u64,
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicU64,
    expired: AtomicU64,
    pending: AtomicU64,
}

/// Unique-label value to active silence lookup, shared between the rebuild
/// and the preprocessor.
pub struct SilenceTable {
    unique_label: String,
    states: SilenceStates,
    entries: RwLock<HashMap<String, SilenceEntry>>,
    counters: Counters,
}

impl SilenceTable {
    pub fn new(unique_label: impl Into<String>, states: SilenceStates) -> Self {
        Self {
            unique_label: unique_label.into(),
            states,
            entries: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub async fn reset(&self) {
        self.entries.write().await.clear();
    }

    /// Replaces the table with the active silences from `source`.
    ///
    /// The old contents are swapped out under a single write lock, so a
    /// concurrent reader sees either the previous table or the new one. A
    /// failed fetch is logged and leaves the table empty. Counters
    /// accumulate across rebuilds.
    pub async fn rebuild(&self, source: &dyn SilenceSource) {
        let silences = match source.list_silences().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Unable to update silence table, error: {}", e);
                self.entries.write().await.clear();
                return;
            }
        };

        let mut fresh = HashMap::new();
        for silence in &silences.data {
            self.count(&silence.status.state);
            if silence.status.state != self.states.active {
                continue;
            }
            for matcher in &silence.matchers {
                if matcher.name == self.unique_label {
                    fresh.insert(
                        matcher.value.clone(),
                        SilenceEntry {
                            available: true,
                            silence_id: silence.id.clone(),
                        },
                    );
                }
            }
        }

        debug!(
            records = silences.data.len(),
            active_keys = fresh.len(),
            "Rebuilt silence table"
        );

        *self.entries.write().await = fresh;
    }

    fn count(&self, state: &str) {
        let counter = if state == self.states.active {
            &self.counters.active
        } else if state == self.states.expired {
            &self.counters.expired
        } else if state == self.states.pending {
            &self.counters.pending
        } else {
            return;
        };
        counter.fetch_add(1, Ordering::Relaxed);
        SILENCES_SEEN_TOTAL.with_label_values(&[state]).inc();
    }

    pub async fn get(&self, key: &str) -> Option<SilenceEntry> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, SilenceEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn counters(&self) -> SilenceCounts {
        SilenceCounts {
            active: self.counters.active.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            pending: self.counters.pending.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockSilenceSource;
    use crate::models::{Matcher, SilenceList, SilenceRecord, SilenceStatus};
    use crate::Error;

    fn states() -> SilenceStates {
        SilenceStates {
            active: "active".to_string(),
            expired: "expired".to_string(),
            pending: "pending".to_string(),
        }
    }

    fn silence(id: &str, state: &str, matchers: &[(&str, &str)]) -> SilenceRecord {
        SilenceRecord {
            id: id.to_string(),
            status: SilenceStatus {
                state: state.to_string(),
            },
            matchers: matchers
                .iter()
                .map(|(name, value)| Matcher {
                    name: name.to_string(),
                    value: value.to_string(),
                    is_regex: false,
                })
                .collect(),
            starts_at: None,
            ends_at: None,
            created_by: None,
            comment: None,
        }
    }

    fn source_with(records: Vec<SilenceRecord>) -> MockSilenceSource {
        let mut source = MockSilenceSource::new();
        source.expect_list_silences().returning(move || {
            Ok(SilenceList {
                status: "success".to_string(),
                data: records.clone(),
            })
        });
        source
    }

    #[tokio::test]
    async fn test_rebuild_keeps_only_active_unique_label_matchers() {
        let source = source_with(vec![
            silence("s1", "active", &[("alertname", "ggus-1"), ("service", "GGUS")]),
            silence("s2", "expired", &[("alertname", "ggus-2")]),
            silence("s3", "pending", &[("alertname", "ggus-3")]),
        ]);
        let table = SilenceTable::new("alertname", states());

        table.rebuild(&source).await;

        assert_eq!(table.len().await, 1);
        assert_eq!(
            table.get("ggus-1").await,
            Some(SilenceEntry {
                available: true,
                silence_id: "s1".to_string()
            })
        );
        assert!(table.get("GGUS").await.is_none());
        assert!(table.get("ggus-2").await.is_none());
        assert!(table.get("ggus-3").await.is_none());
    }

    #[tokio::test]
    async fn test_counters_accumulate_across_rebuilds() {
        let source = source_with(vec![
            silence("s1", "active", &[("alertname", "a")]),
            silence("s2", "expired", &[]),
            silence("s3", "pending", &[]),
            silence("s4", "pending", &[]),
            silence("s5", "unknown", &[]),
        ]);
        let table = SilenceTable::new("alertname", states());

        table.rebuild(&source).await;
        table.reset().await;
        table.rebuild(&source).await;

        assert_eq!(
            table.counters(),
            SilenceCounts {
                active: 2,
                expired: 2,
                pending: 4
            }
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_empties_table() {
        let table = SilenceTable::new("alertname", states());
        table
            .rebuild(&source_with(vec![silence("s1", "active", &[("alertname", "a")])]))
            .await;

        let mut failing = MockSilenceSource::new();
        failing
            .expect_list_silences()
            .times(1)
            .returning(|| Err(Error::Internal("connection refused".to_string())));

        table.rebuild(&failing).await;
        assert!(table.snapshot().await.is_empty());
        assert_eq!(table.counters().active, 1);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_entries() {
        let table = SilenceTable::new("alertname", states());
        table
            .rebuild(&source_with(vec![silence("s1", "active", &[("alertname", "a")])]))
            .await;
        table
            .rebuild(&source_with(vec![silence("s2", "active", &[("alertname", "b")])]))
            .await;

        assert!(table.get("a").await.is_none());
        assert_eq!(table.get("b").await.map(|e| e.silence_id), Some("s2".to_string()));
    }

    #[tokio::test]
    async fn test_reset_empties_table() {
        let table = SilenceTable::new("alertname", states());
        table
            .rebuild(&source_with(vec![silence("s1", "active", &[("alertname", "a")])]))
            .await;
        assert!(!table.is_empty().await);

        table.reset().await;
        assert!(table.is_empty().await);
    }
}
