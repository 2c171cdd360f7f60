//! # Catalog Cache
//!
//! Session-lifetime, in-memory cache of the slow-moving collections the UI
//! needs on every screen: projects, labels and saved filters.
//!
//! ```text
//! get_*(force)
//!   ├── fresh entry, not forced ──────────────► cached items
//!   └── otherwise: take ticket ─► service call
//!         ├── Ok   ─► store if ticket is still the latest ─► items
//!         └── Err  ─► expired entry + recoverable + not forced ─► stale items + warning
//!                     else ─► error
//! ```
//!
//! Each kind carries a ticket counter. A response is only stored if no newer
//! request or invalidation was issued for that kind while it was in flight,
//! so overlapping refreshes can never leave an older payload in place.
//!
//! The slot mutexes are only held for bookkeeping, never across an `.await`.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::remote::{Filter, Label, Project, ServiceError, TaskService};

/// Default time-to-live for cached collections.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Projects,
    Labels,
    Filters,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Projects => write!(f, "projects"),
            CacheKind::Labels => write!(f, "labels"),
            CacheKind::Filters => write!(f, "filters"),
        }
    }
}

/// A fetched collection plus when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    items: Vec<T>,
    fetched_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn new(items: Vec<T>, ttl: Duration) -> Self {
        Self {
            items,
            fetched_at: Instant::now(),
            ttl,
        }
    }

    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Served only while `now - fetched_at < ttl`.
    fn is_fresh(&self) -> bool {
        self.age() < self.ttl
    }
}

/// Attached to a read that fell back to an expired entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleWarning {
    pub kind: CacheKind,
    pub age: Duration,
    pub cause: ServiceError,
}

impl fmt::Display for StaleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "showing {} from {}s ago ({})",
            self.kind,
            self.age.as_secs(),
            self.cause
        )
    }
}

/// Result of a cache read.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub warning: Option<StaleWarning>,
}

impl<T> Fetched<T> {
    fn fresh(items: Vec<T>) -> Self {
        Self {
            items,
            warning: None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.warning.is_some()
    }
}

struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    latest_ticket: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entry: None,
            latest_ticket: 0,
        }
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Catalog {
    service: Arc<dyn TaskService>,
    ttl: Duration,
    projects: Mutex<Slot<Project>>,
    labels: Mutex<Slot<Label>>,
    filters: Mutex<Slot<Filter>>,
}

impl Catalog {
    pub fn new(service: Arc<dyn TaskService>, ttl: Duration) -> Self {
        Self {
            service,
            ttl,
            projects: Mutex::default(),
            labels: Mutex::default(),
            filters: Mutex::default(),
        }
    }

    pub async fn get_projects(&self, force_refresh: bool) -> Result<Fetched<Project>, ServiceError> {
        self.read(CacheKind::Projects, &self.projects, force_refresh, || {
            self.service.list_projects()
        })
        .await
    }

    pub async fn get_labels(&self, force_refresh: bool) -> Result<Fetched<Label>, ServiceError> {
        self.read(CacheKind::Labels, &self.labels, force_refresh, || {
            self.service.list_labels()
        })
        .await
    }

    pub async fn get_filters(&self, force_refresh: bool) -> Result<Fetched<Filter>, ServiceError> {
        self.read(CacheKind::Filters, &self.filters, force_refresh, || {
            self.service.list_filters()
        })
        .await
    }

    /// Drops the entry for `kind` and supersedes any fetch still in flight,
    /// so the next read always goes to the service.
    pub fn invalidate(&self, kind: CacheKind) {
        match kind {
            CacheKind::Projects => Self::clear(&self.projects),
            CacheKind::Labels => Self::clear(&self.labels),
            CacheKind::Filters => Self::clear(&self.filters),
        }
        info!("Invalidated {kind} cache");
    }

    fn clear<T>(slot: &Mutex<Slot<T>>) {
        let mut slot = lock(slot);
        slot.entry = None;
        slot.latest_ticket += 1;
    }

    async fn read<T, F, Fut>(
        &self,
        kind: CacheKind,
        slot: &Mutex<Slot<T>>,
        force_refresh: bool,
        fetch: F,
    ) -> Result<Fetched<T>, ServiceError>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, ServiceError>>,
    {
        let ticket = {
            let mut slot = lock(slot);
            if !force_refresh
                && let Some(entry) = &slot.entry
                && entry.is_fresh()
            {
                debug!("{kind} cache hit ({} items)", entry.items.len());
                return Ok(Fetched::fresh(entry.items.clone()));
            }
            slot.latest_ticket += 1;
            slot.latest_ticket
        };
        debug!("{kind} cache miss (force={force_refresh}, ticket={ticket})");

        let result = fetch().await;

        let mut slot = lock(slot);
        match result {
            Ok(items) => {
                if slot.latest_ticket == ticket {
                    slot.entry = Some(CacheEntry::new(items.clone(), self.ttl));
                    debug!("Stored {} {kind}", items.len());
                } else {
                    info!(
                        "Discarding superseded {kind} response (ticket {ticket}, latest {})",
                        slot.latest_ticket
                    );
                }
                Ok(Fetched::fresh(items))
            }
            Err(err) => {
                if !force_refresh
                    && err.allows_stale_fallback()
                    && let Some(entry) = &slot.entry
                {
                    let warning = StaleWarning {
                        kind,
                        age: entry.age(),
                        cause: err,
                    };
                    warn!("Serving stale {kind}: {warning}");
                    return Ok(Fetched {
                        items: entry.items.clone(),
                        warning: Some(warning),
                    });
                }
                Err(err)
            }
        }
    }

    /// Cached projects regardless of age, without touching the network.
    pub fn peek_projects(&self) -> Vec<Project> {
        Self::peek(&self.projects)
    }

    pub fn peek_filters(&self) -> Vec<Filter> {
        Self::peek(&self.filters)
    }

    fn peek<T: Clone>(slot: &Mutex<Slot<T>>) -> Vec<T> {
        lock(slot)
            .entry
            .as_ref()
            .map(|e| e.items.clone())
            .unwrap_or_default()
    }

    pub fn project_name(&self, project_id: &str) -> Option<String> {
        lock(&self.projects)
            .entry
            .as_ref()
            .and_then(|e| e.items.iter().find(|p| p.id == project_id))
            .map(|p| p.name.clone())
    }

    pub fn project_color(&self, project_id: &str) -> Option<String> {
        lock(&self.projects)
            .entry
            .as_ref()
            .and_then(|e| e.items.iter().find(|p| p.id == project_id))
            .map(|p| p.color.clone())
    }

    /// Looks a label up by name, case-insensitively.
    pub fn label_color(&self, name: &str) -> Option<String> {
        lock(&self.labels)
            .entry
            .as_ref()
            .and_then(|e| e.items.iter().find(|l| l.name.eq_ignore_ascii_case(name)))
            .map(|l| l.color.clone())
    }
}
