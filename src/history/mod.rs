// src/history/mod.rs

//! Result history and per-tab project snapshots.
//!
//! Records are hash-linked: each one carries the SHA-256 of its output and
//! the hash of the record before it, so a restored history can be checked
//! for tampering or truncation in the middle.

pub mod storage;

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{EngineError, EngineResult};

pub use storage::{MemoryStorage, Storage};

/// Snapshot format version written by [`ProjectSnapshot::to_json`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// The tool a record or input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Evaluate,
    Derivative,
    Integral,
    Matrix,
    Graph,
    Plot,
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tab::Evaluate => "evaluate",
            Tab::Derivative => "derivative",
            Tab::Integral => "integral",
            Tab::Matrix => "matrix",
            Tab::Graph => "graph",
            Tab::Plot => "plot",
        };
        f.write_str(name)
    }
}

/// A single stored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub tab: Tab,
    pub input: String,
    pub output: serde_json::Value,
    pub output_hash: String,
    pub previous_record_hash: Option<String>,
    pub engine_version: String,
}

impl HistoryRecord {
    pub fn new(
        tab: Tab,
        input: String,
        output: serde_json::Value,
        previous_record_hash: Option<String>,
    ) -> EngineResult<Self> {
        let output_hash = calculate_hash(serde_json::to_string(&output)?.as_bytes());
        Ok(HistoryRecord {
            timestamp: Utc::now(),
            tab,
            input,
            output,
            output_hash,
            previous_record_hash,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Hash of the whole record, used as the next record's back-link.
    pub fn record_hash(&self) -> EngineResult<String> {
        let serialized = serde_json::to_string(self)?;
        Ok(calculate_hash(serialized.as_bytes()))
    }
}

/// SHA-256 of a byte slice as lowercase hex.
fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Bounded, most-recent-last log of results.
#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        History {
            records: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a record linked to the current last one, evicting the oldest past capacity.
    pub fn add_record(
        &mut self,
        tab: Tab,
        input: impl Into<String>,
        output: serde_json::Value,
    ) -> EngineResult<()> {
        let previous = match self.records.back() {
            Some(last) => Some(last.record_hash()?),
            None => None,
        };
        let record = HistoryRecord::new(tab, input.into(), output, previous)?;
        self.records.push_back(record);

        while self.records.len() > self.capacity {
            self.records.pop_front();
            tracing::debug!(capacity = self.capacity, "evicted oldest history record");
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn by_tab(&self, tab: Tab) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter().filter(move |r| r.tab == tab)
    }

    pub fn latest(&self) -> Option<&HistoryRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Removes and returns every record, oldest first.
    pub fn drain_records(&mut self) -> Vec<HistoryRecord> {
        self.records.drain(..).collect()
    }

    /// Checks each record's back-link and output hash. The oldest record's
    /// back-link is not checked since its predecessor may have been evicted.
    pub fn verify_links(&self) -> EngineResult<bool> {
        for record in &self.records {
            let expected = calculate_hash(serde_json::to_string(&record.output)?.as_bytes());
            if record.output_hash != expected {
                return Ok(false);
            }
        }
        for (prev, next) in self.records.iter().zip(self.records.iter().skip(1)) {
            if next.previous_record_hash.as_deref() != Some(prev.record_hash()?.as_str()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    /// Restores a history, keeping only the newest `capacity` records.
    pub fn from_json(json: &str, capacity: usize) -> EngineResult<Self> {
        let records: Vec<HistoryRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records, capacity))
    }

    fn from_records(records: Vec<HistoryRecord>, capacity: usize) -> Self {
        let mut history = History::with_capacity(capacity);
        let skip = records.len().saturating_sub(history.capacity);
        history.records = records.into_iter().skip(skip).collect();
        history
    }

    pub fn save(&self, storage: &mut dyn Storage, key: &str) -> EngineResult<()> {
        storage.set(key, self.to_json()?)
    }

    /// Loads from `storage`; a missing key yields an empty history.
    pub fn load(storage: &dyn Storage, key: &str, capacity: usize) -> EngineResult<Self> {
        match storage.get(key) {
            Some(json) => Self::from_json(&json, capacity),
            None => Ok(History::with_capacity(capacity)),
        }
    }
}

/// Last input per tab plus the result history, as saved for a shareable project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub inputs: BTreeMap<Tab, String>,
    pub history: Vec<HistoryRecord>,
}

impl ProjectSnapshot {
    pub fn new(inputs: BTreeMap<Tab, String>, history: &History) -> Self {
        ProjectSnapshot {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            inputs,
            history: history.iter().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let snapshot: ProjectSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::Storage(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Rebuilds a [`History`] from the snapshot's records.
    pub fn history(&self, capacity: usize) -> History {
        History::from_records(self.history.clone(), capacity)
    }

    pub fn save(&self, storage: &mut dyn Storage, key: &str) -> EngineResult<()> {
        storage.set(key, self.to_json()?)
    }

    pub fn load(storage: &dyn Storage, key: &str) -> EngineResult<Option<Self>> {
        storage.get(key).map(|json| Self::from_json(&json)).transpose()
    }
}
