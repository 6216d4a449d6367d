use shared::Error;
use std::time::Duration;

/// Step of a cycle at which a failure happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ListTracked,
    ReadTimestamp,
    DeleteBlob,
    DeleteIndex,
    Inventory,
}

/// A failure isolated to one key (or one listing) that did not stop the cycle
#[derive(Debug)]
pub struct Failure {
    pub key: Option<String>,
    pub stage: Stage,
    pub error: Error,
}

impl Failure {
    pub fn for_key(key: impl Into<String>, stage: Stage, error: Error) -> Self {
        Self {
            key: Some(key.into()),
            stage,
            error,
        }
    }

    pub fn listing(stage: Stage, error: Error) -> Self {
        Self {
            key: None,
            stage,
            error,
        }
    }
}

/// Inconsistencies between the stores, handled without failing the cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Anomaly {
    /// Timestamp is not an integer; the key was treated as stale
    UnparsableTimestamp { key: String, raw: String },
    /// Tracked key whose blob is gone
    OrphanedIndexEntry { key: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyState {
    /// Configured limit <= 0
    Disabled,
    Ran,
    /// Enabled but not run to completion this cycle
    Skipped,
}

/// A key that passed expiration, with the timestamp the sweep read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Survivor {
    pub key: String,
    /// `i64::MIN` for an unparsable timestamp kept while expiration is disabled
    pub last_accessed_at: i64,
}

#[derive(Debug)]
pub struct ExpirationReport {
    pub state: PolicyState,
    pub scanned: usize,
    pub expired: Vec<String>,
    pub survivors: Vec<Survivor>,
    /// Condemned keys left for the next cycle because the deadline passed
    pub deferred: Vec<String>,
    pub anomalies: Vec<Anomaly>,
    pub failures: Vec<Failure>,
}

impl ExpirationReport {
    pub(crate) fn new(state: PolicyState) -> Self {
        Self {
            state,
            scanned: 0,
            expired: Vec::new(),
            survivors: Vec::new(),
            deferred: Vec::new(),
            anomalies: Vec::new(),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct EvictionReport {
    pub state: PolicyState,
    pub budget: Option<u64>,
    pub occupancy_before: Option<u64>,
    pub occupancy_after: Option<u64>,
    pub evicted: Vec<String>,
    /// Survivors absent from the occupancy snapshot
    pub orphans: Vec<String>,
    pub deferred: Vec<String>,
    /// Candidates ran out while still above budget
    pub over_budget: bool,
    pub failures: Vec<Failure>,
}

impl EvictionReport {
    pub(crate) fn new(state: PolicyState, budget: Option<u64>) -> Self {
        Self {
            state,
            budget,
            occupancy_before: None,
            occupancy_after: None,
            evicted: Vec::new(),
            orphans: Vec::new(),
            deferred: Vec::new(),
            over_budget: false,
            failures: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// The deadline passed; remaining work waits for the next cycle
    Partial,
}

/// Everything one cycle did, and everything it could not do
#[derive(Debug)]
pub struct CycleReport {
    pub now: i64,
    pub outcome: CycleOutcome,
    pub expiration: ExpirationReport,
    pub eviction: EvictionReport,
    /// Orphaned tracking entries removed this cycle
    pub healed: Vec<String>,
    pub healing_failures: Vec<Failure>,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Keys whose blob and tracking entry were both removed
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.expiration
            .expired
            .iter()
            .chain(self.eviction.evicted.iter())
            .map(String::as_str)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.expiration
            .failures
            .iter()
            .chain(self.eviction.failures.iter())
            .chain(self.healing_failures.iter())
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        let orphans = self
            .eviction
            .orphans
            .iter()
            .map(|key| Anomaly::OrphanedIndexEntry { key: key.clone() });
        self.expiration
            .anomalies
            .iter()
            .cloned()
            .chain(orphans)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.outcome == CycleOutcome::Completed
            && self.failures().next().is_none()
            && !self.eviction.over_budget
    }
}
