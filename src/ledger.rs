// Score ledger: every completed run, ranked by total time.
// Best flags are recomputed over the whole ledger on each insert, not just the displayed slice.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::store::ScoreStore;

/// One completed run. Field names match the stored JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub name: String,
    /// Seconds, millisecond precision.
    #[serde(rename = "totalTime")]
    pub total_time: f64,
    /// Locale date text.
    pub date: String,
    #[serde(rename = "isBest", default)]
    pub is_best: bool,
}

/// Ranked collection of score records persisted as one blob.
pub struct ScoreLedger {
    records: Vec<ScoreRecord>,
    key: String,
    store: Box<dyn ScoreStore>,
}

impl ScoreLedger {
    /// Load the ledger stored under `key`. Missing or corrupt data starts an empty ledger.
    pub fn open(store: Box<dyn ScoreStore>, key: &str) -> Self {
        let records = match store.read(key) {
            None => Vec::new(),
            Some(blob) => parse_records(&blob).unwrap_or_else(|err| {
                warn!(%err, key, "discarding unreadable leaderboard");
                Vec::new()
            }),
        };

        ScoreLedger {
            records,
            key: key.to_string(),
            store,
        }
    }

    /// Append a run dated today.
    pub fn append(&mut self, name: &str, total_time: f64) -> Option<&ScoreRecord> {
        self.append_dated(name, total_time, &today_label())
    }

    /// Append a run with an explicit date label. Non-finite or negative times are rejected.
    pub fn append_dated(&mut self, name: &str, total_time: f64, date: &str) -> Option<&ScoreRecord> {
        if !total_time.is_finite() || total_time < 0.0 {
            warn!(total_time, "rejecting invalid score");
            return None;
        }

        self.records.push(ScoreRecord {
            name: name.to_string(),
            total_time,
            date: date.to_string(),
            is_best: false,
        });
        self.recompute_best();
        self.persist();
        info!(name, total_time, entries = self.records.len(), "score recorded");

        self.records.last()
    }

    /// The `k` fastest runs, ascending; ties keep insertion order.
    pub fn top_n(&self, k: usize) -> Vec<ScoreRecord> {
        let mut ranked = self.records.clone();
        ranked.sort_by(|a, b| a.total_time.total_cmp(&b.total_time));
        ranked.truncate(k);
        ranked
    }

    pub fn clear(&mut self) {
        self.records.clear();
        if let Err(err) = self.store.remove(&self.key) {
            warn!(%err, "failed to clear stored leaderboard");
        }
    }

    pub fn best(&self) -> Option<&ScoreRecord> {
        self.records.iter().find(|r| r.is_best)
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn store(&self) -> &dyn ScoreStore {
        self.store.as_ref()
    }

    fn recompute_best(&mut self) {
        let best = self
            .records
            .iter()
            .map(|r| r.total_time)
            .fold(f64::INFINITY, f64::min);
        for record in &mut self.records {
            record.is_best = record.total_time == best;
        }
    }

    fn persist(&mut self) {
        let blob = match serde_json::to_string(&self.records) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(%err, "failed to serialize leaderboard");
                return;
            }
        };
        if let Err(err) = self.store.write(&self.key, &blob) {
            warn!(%err, "failed to persist leaderboard");
        }
    }
}

pub fn parse_records(blob: &str) -> Result<Vec<ScoreRecord>> {
    Ok(serde_json::from_str(blob)?)
}

/// Short numeric date in the local timezone, e.g. `3/14/2026`.
pub fn today_label() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}
