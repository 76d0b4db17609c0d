use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use index::TenantEmbeddingIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::handle::TenantIndexHandle;
use crate::store::EmbeddingStore;

type LoadResult = Result<TenantIndexHandle, CacheError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Observable lifecycle of one tenant's cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Absent,
    Loading,
    Loaded,
}

enum LoadState {
    Absent,
    Loading {
        epoch: u64,
        load: SharedLoad,
        /// Set when a mutation arrived mid-load; the result is then handed to
        /// waiters but never installed.
        stale: bool,
    },
    Loaded(TenantIndexHandle),
}

struct SlotInner {
    state: LoadState,
    epoch: u64,
}

/// Per-tenant cell. Each tenant has its own lock so loads and mutations on one
/// tenant never block another.
struct TenantSlot {
    inner: Mutex<SlotInner>,
}

impl TenantSlot {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: LoadState::Absent,
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Installs a finished load if it is still the current, untouched one.
    fn finish_load(
        &self,
        tenant: &str,
        epoch: u64,
        outcome: Result<TenantEmbeddingIndex, CacheError>,
    ) -> LoadResult {
        let mut inner = self.lock();
        let (in_flight, stale) = match &inner.state {
            LoadState::Loading {
                epoch: current,
                stale,
                ..
            } if *current == epoch => (true, *stale),
            _ => (false, false),
        };

        match outcome {
            Ok(index) => {
                let handle = TenantIndexHandle::new(index);
                if in_flight && !stale {
                    inner.state = LoadState::Loaded(handle.clone());
                } else if in_flight {
                    debug!(tenant, "discarding load overtaken by a mutation");
                    inner.state = LoadState::Absent;
                } else {
                    debug!(tenant, "discarding load overtaken by invalidation");
                }
                Ok(handle)
            }
            Err(err) => {
                if in_flight {
                    inner.state = LoadState::Absent;
                }
                Err(err)
            }
        }
    }

    fn abandon_load(&self, epoch: u64) {
        let mut inner = self.lock();
        if matches!(inner.state, LoadState::Loading { epoch: current, .. } if current == epoch) {
            inner.state = LoadState::Absent;
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) loads: AtomicU64,
    pub(crate) load_failures: AtomicU64,
}

/// Tenant key to embedding index cache with lazy, single-flight population.
///
/// The first `get_or_load` for an absent tenant spawns exactly one load task
/// against the store; every concurrent caller awaits that same task. Writes
/// reach cached tenants through [`if_present`](Self::if_present) and never
/// trigger a load. [`invalidate`](Self::invalidate) drops a tenant back to
/// absent.
///
/// A slot stays in the map after invalidation so health can still report the
/// tenant as known; the map grows with the number of distinct tenant keys.
/// [`evict`](Self::evict) and [`prune_absent`](Self::prune_absent) drop
/// slots that nothing is using.
pub struct EmbeddingCacheProvider {
    store: Arc<dyn EmbeddingStore>,
    config: CacheConfig,
    slots: DashMap<String, Arc<TenantSlot>>,
    counters: Arc<Counters>,
}

impl EmbeddingCacheProvider {
    pub fn new(store: Arc<dyn EmbeddingStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            slots: DashMap::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn slot(&self, tenant: &str) -> Arc<TenantSlot> {
        if let Some(slot) = self.slots.get(tenant) {
            return Arc::clone(slot.value());
        }
        self.slots
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(TenantSlot::new()))
            .clone()
    }

    fn existing_slot(&self, tenant: &str) -> Option<Arc<TenantSlot>> {
        self.slots.get(tenant).map(|slot| Arc::clone(slot.value()))
    }

    /// Returns the tenant's index, loading it from the store on first use.
    ///
    /// A caller that gives up after `load_timeout` gets
    /// [`CacheError::LoadTimeout`]; the load keeps running and is installed
    /// for later callers. A failed load leaves the tenant absent so the next
    /// call retries.
    pub async fn get_or_load(&self, tenant: &str) -> Result<TenantIndexHandle, CacheError> {
        let slot = self.slot(tenant);
        let load = {
            let mut guard = slot.lock();
            let inner = &mut *guard;
            match &inner.state {
                LoadState::Loaded(handle) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("facecache_cache_hits_total").increment(1);
                    debug!(tenant, "embedding cache hit");
                    return Ok(handle.clone());
                }
                LoadState::Loading { load, .. } => {
                    self.record_miss();
                    debug!(tenant, "joining in-flight load");
                    load.clone()
                }
                LoadState::Absent => {
                    self.record_miss();
                    inner.epoch += 1;
                    let epoch = inner.epoch;
                    debug!(tenant, epoch, "starting tenant load");
                    let load = self.start_load(tenant, Arc::clone(&slot), epoch);
                    inner.state = LoadState::Loading {
                        epoch,
                        load: load.clone(),
                        stale: false,
                    };
                    load
                }
            }
        };

        match tokio::time::timeout(self.config.load_timeout, load).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    tenant,
                    timeout_ms = self.config.load_timeout.as_millis() as u64,
                    "gave up waiting for tenant load"
                );
                Err(CacheError::LoadTimeout {
                    tenant: tenant.to_string(),
                    timeout: self.config.load_timeout,
                })
            }
        }
    }

    fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("facecache_cache_misses_total").increment(1);
    }

    // Must be called with the slot lock held so the spawned task cannot
    // finish before the slot is marked as loading.
    fn start_load(&self, tenant: &str, slot: Arc<TenantSlot>, epoch: u64) -> SharedLoad {
        let store = Arc::clone(&self.store);
        let counters = Arc::clone(&self.counters);
        let dimension = self.config.dimension;
        let task_slot = Arc::clone(&slot);
        let task_tenant = tenant.to_string();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = load_tenant(store.as_ref(), &task_tenant, dimension).await;
            let elapsed = started.elapsed();
            metrics::histogram!("facecache_cache_load_seconds").record(elapsed.as_secs_f64());
            match &outcome {
                Ok(index) => {
                    counters.loads.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("facecache_cache_loads_total").increment(1);
                    info!(
                        tenant = %task_tenant,
                        embeddings = index.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "tenant embeddings loaded"
                    );
                }
                Err(err) => {
                    counters.load_failures.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("facecache_cache_load_failures_total").increment(1);
                    warn!(tenant = %task_tenant, error = %err, "tenant load failed");
                }
            }
            task_slot.finish_load(&task_tenant, epoch, outcome)
        });

        let tenant = tenant.to_string();
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    slot.abandon_load(epoch);
                    error!(tenant = %tenant, error = %join_error, "tenant load task aborted");
                    Err(CacheError::LoadAborted {
                        tenant,
                        reason: join_error.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Applies `mutation` only when the tenant is already loaded.
    ///
    /// Returns `None` without touching the store when the tenant is absent or
    /// still loading. A mutation that races a load marks that load stale, so
    /// its result is not cached and the next access reloads.
    pub fn if_present<R>(
        &self,
        tenant: &str,
        mutation: impl FnOnce(&mut TenantEmbeddingIndex) -> R,
    ) -> Option<R> {
        let slot = self.existing_slot(tenant)?;
        let mut guard = slot.lock();
        match &mut guard.state {
            LoadState::Loaded(handle) => {
                debug!(tenant, "mutating cached tenant index");
                Some(handle.write(mutation))
            }
            LoadState::Loading { stale, .. } => {
                debug!(tenant, "tenant is loading; marking load stale");
                *stale = true;
                None
            }
            LoadState::Absent => None,
        }
    }

    /// Drops the tenant's cached index. An in-flight load still answers its
    /// waiters but is not installed.
    pub fn invalidate(&self, tenant: &str) {
        if let Some(slot) = self.existing_slot(tenant) {
            let mut guard = slot.lock();
            if !matches!(guard.state, LoadState::Absent) {
                debug!(tenant, "invalidating tenant cache");
            }
            guard.state = LoadState::Absent;
        }
    }

    /// Invalidates the tenant and forgets its key. Returns `false` when the
    /// key is unknown or a load or caller still holds the slot; the slot is
    /// then left in place, invalidated.
    pub fn evict(&self, tenant: &str) -> bool {
        self.invalidate(tenant);
        // Under the shard write lock no new clone can be taken, so a count of
        // one means the map holds the only reference.
        let removed = self
            .slots
            .remove_if(tenant, |_, slot| Arc::strong_count(slot) == 1)
            .is_some();
        if removed {
            debug!(tenant, "evicted tenant slot");
        }
        removed
    }

    /// Drops every absent slot nothing else references, e.g. tenants whose
    /// load failed. Returns how many were dropped.
    pub fn prune_absent(&self) -> usize {
        let mut pruned = 0;
        self.slots.retain(|_, slot| {
            let idle = Arc::strong_count(slot) == 1
                && matches!(slot.lock().state, LoadState::Absent);
            if idle {
                pruned += 1;
            }
            !idle
        });
        if pruned > 0 {
            debug!(pruned, "pruned absent tenant slots");
        }
        pruned
    }

    /// Invalidates every tenant.
    pub fn invalidate_all(&self) {
        for entry in self.slots.iter() {
            entry.value().lock().state = LoadState::Absent;
        }
        debug!(tenants = self.slots.len(), "invalidated all tenant caches");
    }

    pub fn state(&self, tenant: &str) -> SlotState {
        let Some(slot) = self.existing_slot(tenant) else {
            return SlotState::Absent;
        };
        let guard = slot.lock();
        match guard.state {
            LoadState::Absent => SlotState::Absent,
            LoadState::Loading { .. } => SlotState::Loading,
            LoadState::Loaded(_) => SlotState::Loaded,
        }
    }

    /// The cached index if the tenant is loaded. Never triggers a load.
    pub fn peek(&self, tenant: &str) -> Option<TenantIndexHandle> {
        let slot = self.existing_slot(tenant)?;
        let guard = slot.lock();
        match &guard.state {
            LoadState::Loaded(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Tenants whose index is currently loaded, sorted.
    pub fn loaded_tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| matches!(entry.value().lock().state, LoadState::Loaded(_)))
            .map(|entry| entry.key().clone())
            .collect();
        tenants.sort();
        tenants
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn for_each_slot(&self, mut f: impl FnMut(&str, SlotState, usize)) {
        for entry in self.slots.iter() {
            let guard = entry.value().lock();
            let (state, embeddings) = match &guard.state {
                LoadState::Absent => (SlotState::Absent, 0),
                LoadState::Loading { .. } => (SlotState::Loading, 0),
                LoadState::Loaded(handle) => (SlotState::Loaded, handle.len()),
            };
            f(entry.key().as_str(), state, embeddings);
        }
    }
}

impl fmt::Debug for EmbeddingCacheProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingCacheProvider")
            .field("config", &self.config)
            .field("tracked_tenants", &self.slots.len())
            .finish_non_exhaustive()
    }
}

async fn load_tenant(
    store: &dyn EmbeddingStore,
    tenant: &str,
    dimension: usize,
) -> Result<TenantEmbeddingIndex, CacheError> {
    let rows = store
        .list_embeddings(tenant)
        .await
        .map_err(|source| CacheError::Load {
            tenant: tenant.to_string(),
            source,
        })?;
    TenantEmbeddingIndex::from_embeddings(dimension, rows).map_err(|source| {
        error!(tenant, error = %source, "store returned an invalid embedding");
        CacheError::InvalidEmbedding {
            tenant: tenant.to_string(),
            source,
        }
    })
}
