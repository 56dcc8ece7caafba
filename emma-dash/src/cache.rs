//! Per-domain snapshot cache
//!
//! Each dashboard domain holds at most one [`CacheEntry`]. A read returns the
//! cached entry while it is younger than the TTL; otherwise the domain is
//! refreshed first and the new entry returned.
//!
//! # Concurrency
//! Refreshes run without holding any lock. When a refresh completes, its
//! entry replaces the previous one in a single assignment under a short
//! write lock, so readers see either the old or the new entry and never a
//! mix. Overlapping refreshes of one domain are not coalesced: the last one
//! to finish wins. `updated_at` never moves backwards for a domain.
//!
//! An entry's age counts from the moment its source read began, not from
//! when it was installed, so a slow refresh that wins the race does not get
//! a longer freshness window than the data it holds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emma_common::time;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default snapshot lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Dashboard data domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Status,
    Revenue,
    Fusion,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Status, Domain::Revenue, Domain::Fusion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Status => "status",
            Domain::Revenue => "revenue",
            Domain::Fusion => "fusion",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a refresh; recorded in the snapshot payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    OnDemand,
    Manual,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Startup => "startup",
            RefreshTrigger::Scheduled => "scheduled",
            RefreshTrigger::OnDemand => "on-demand",
            RefreshTrigger::Manual => "manual",
        }
    }
}

/// One materialized snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub domain: Domain,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    refreshed_at: Instant,
}

impl CacheEntry {
    /// Time since the source read behind this entry began (monotonic clock)
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }
}

/// Produces the payload for one domain
///
/// Implementations never fail: a missing or unreadable backing source
/// yields a documented default value instead.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn refresh(&self, trigger: RefreshTrigger) -> Value;
}

/// TTL cache over the dashboard domains
pub struct SnapshotCache {
    ttl: Duration,
    sources: HashMap<Domain, Arc<dyn SnapshotSource>>,
    entries: RwLock<HashMap<Domain, Arc<CacheEntry>>>,
    refresh_counts: HashMap<Domain, AtomicU64>,
}

impl SnapshotCache {
    /// Cache with `ttl`, refreshing each domain from its source
    ///
    /// A domain without a source refreshes to `null`.
    pub fn new<I>(ttl: Duration, sources: I) -> Self
    where
        I: IntoIterator<Item = (Domain, Arc<dyn SnapshotSource>)>,
    {
        Self {
            ttl,
            sources: sources.into_iter().collect(),
            entries: RwLock::new(HashMap::new()),
            refresh_counts: Domain::ALL
                .iter()
                .map(|d| (*d, AtomicU64::new(0)))
                .collect(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot for `domain`, refreshing it first when stale or empty
    pub async fn get(&self, domain: Domain) -> Arc<CacheEntry> {
        if let Some(entry) = self.fresh_entry(domain).await {
            debug!(%domain, age_ms = entry.age().as_millis() as u64, "Snapshot cache hit");
            return entry;
        }
        self.refresh_domain(domain, RefreshTrigger::OnDemand).await
    }

    /// Current snapshot without refreshing, fresh or not
    pub async fn peek(&self, domain: Domain) -> Option<Arc<CacheEntry>> {
        self.entries.read().await.get(&domain).cloned()
    }

    pub async fn is_fresh(&self, domain: Domain) -> bool {
        self.fresh_entry(domain).await.is_some()
    }

    /// Rebuild one domain and install the result
    pub async fn refresh_domain(&self, domain: Domain, trigger: RefreshTrigger) -> Arc<CacheEntry> {
        if let Some(count) = self.refresh_counts.get(&domain) {
            count.fetch_add(1, Ordering::Relaxed);
        }

        let started = Instant::now();
        let data = match self.sources.get(&domain) {
            Some(source) => source.refresh(trigger).await,
            None => {
                warn!(%domain, "No snapshot source registered");
                Value::Null
            }
        };

        let mut entries = self.entries.write().await;
        let mut updated_at = time::now();
        if let Some(previous) = entries.get(&domain) {
            updated_at = updated_at.max(previous.updated_at);
        }

        let entry = Arc::new(CacheEntry {
            domain,
            data: stamp(data, updated_at),
            updated_at,
            refreshed_at: started,
        });
        entries.insert(domain, Arc::clone(&entry));
        drop(entries);

        debug!(%domain, trigger = trigger.as_str(), "Snapshot refreshed");
        entry
    }

    /// Refresh every domain concurrently
    pub async fn refresh_all(&self, trigger: RefreshTrigger) -> Vec<Arc<CacheEntry>> {
        let entries = join_all(
            Domain::ALL
                .iter()
                .map(|domain| self.refresh_domain(*domain, trigger)),
        )
        .await;
        info!(trigger = trigger.as_str(), domains = entries.len(), "Snapshots refreshed");
        entries
    }

    /// Number of refreshes started for `domain` since construction
    pub fn refresh_count(&self, domain: Domain) -> u64 {
        self.refresh_counts
            .get(&domain)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    async fn fresh_entry(&self, domain: Domain) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read().await;
        entries
            .get(&domain)
            .filter(|entry| entry.age() < self.ttl)
            .cloned()
    }
}

/// Record the snapshot time inside object payloads
fn stamp(mut data: Value, updated_at: DateTime<Utc>) -> Value {
    if let Value::Object(map) = &mut data {
        map.insert("updatedAt".to_string(), Value::String(time::iso(updated_at)));
    }
    data
}
