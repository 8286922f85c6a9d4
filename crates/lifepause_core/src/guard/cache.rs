//! Per-owner TTL cache of currently frozen modules.
//!
//! # Responsibility
//! - Serve "which modules are frozen for this owner" without a store read on
//!   the common path.
//! - Drop entries on explicit invalidation so writers see their change on the
//!   very next request.
//!
//! # Invariants
//! - Entries are immutable snapshots swapped behind an `Arc`.
//! - Map access is sharded per key and no shard lock is held across `.await`.
//! - At most one store read per owner is in flight; concurrent misses wait on
//!   it and share its outcome, errors included.
//! - A fill that raced with `invalidate`/`invalidate_all` never repopulates the
//!   cache; its result is still returned to the callers that waited on it.
//! - Failed fills are not cached.
//! - Tracked owners stay near `max_entries`: expired entries are swept and the
//!   stalest idle entry is evicted before a new owner is admitted.

use crate::config::GuardConfig;
use crate::guard::store::{FreezeStateStore, StoreError};
use crate::model::freeze::OwnerId;
use crate::model::module_tag::ModuleTag;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Immutable set of modules frozen for one owner.
pub type FrozenModules = Arc<BTreeSet<ModuleTag>>;

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Callback freeze-period writers invoke after changing an owner's periods.
pub trait FreezeInvalidation: Send + Sync {
    fn invalidate(&self, owner_id: OwnerId);
}

/// Failures filling a cache entry.
///
/// Cloneable so one failed read can be handed to every waiting caller.
#[derive(Debug, Clone)]
pub enum FreezeCacheError {
    Store(Arc<StoreError>),
    Timeout(Duration),
}

impl Display for FreezeCacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Timeout(limit) => {
                write!(f, "freeze store read timed out after {}ms", limit.as_millis())
            }
        }
    }
}

impl Error for FreezeCacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err.as_ref()),
            Self::Timeout(_) => None,
        }
    }
}

impl From<StoreError> for FreezeCacheError {
    fn from(value: StoreError) -> Self {
        Self::Store(Arc::new(value))
    }
}

type FillOutcome = Result<FrozenModules, FreezeCacheError>;
type FillSender = Arc<watch::Sender<Option<FillOutcome>>>;

struct CachedFreeze {
    modules: FrozenModules,
    fetched_at: Instant,
}

#[derive(Default)]
struct OwnerSlot {
    entry: Option<Arc<CachedFreeze>>,
    /// Present while one caller reads the store for this owner.
    in_flight: Option<FillSender>,
}

enum Lookup {
    Hit(FrozenModules),
    Wait(watch::Receiver<Option<FillOutcome>>),
    Fill(FillSender),
    /// Full of in-flight owners; read without caching.
    Bypass,
}

/// Time-bounded, explicitly invalidated freeze-state cache.
pub struct FreezeStateCache {
    store: Arc<dyn FreezeStateStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    store_timeout: Duration,
    max_entries: usize,
    slots: DashMap<OwnerId, OwnerSlot>,
    /// Bumped on every `invalidate_all`.
    epoch: AtomicU64,
}

impl FreezeStateCache {
    pub fn new(store: Arc<dyn FreezeStateStore>, config: GuardConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn FreezeStateStore>,
        clock: Arc<dyn Clock>,
        config: GuardConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ttl: config.cache_ttl,
            store_timeout: config.store_timeout,
            max_entries: config.max_entries.max(1),
            slots: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the owner's frozen modules, reading the store on miss or expiry.
    ///
    /// An owner without an `ACTIVE` period yields an empty set. Callers that
    /// miss while another caller's read for the same owner is in flight wait
    /// for that read instead of issuing their own.
    ///
    /// # Errors
    /// - `Store` when the store query fails.
    /// - `Timeout` when the store does not answer within `store_timeout`.
    pub async fn get(&self, owner_id: OwnerId) -> Result<FrozenModules, FreezeCacheError> {
        loop {
            let now = self.clock.now();
            let epoch = self.epoch.load(Ordering::SeqCst);
            match self.lookup(owner_id, now) {
                Lookup::Hit(modules) => return Ok(modules),
                Lookup::Wait(mut rx) => {
                    let seen = rx
                        .wait_for(Option::is_some)
                        .await
                        .map(|outcome| (*outcome).clone());
                    match seen {
                        Ok(Some(outcome)) => return outcome,
                        // The filling caller was dropped before publishing.
                        _ => continue,
                    }
                }
                Lookup::Fill(tx) => {
                    let fill = FillGuard {
                        cache: self,
                        owner_id,
                        tx,
                        finished: false,
                    };
                    let outcome = self.read_store(owner_id).await;
                    fill.finish(&outcome, epoch, now);
                    return outcome;
                }
                Lookup::Bypass => return self.read_store(owner_id).await,
            }
        }
    }

    /// Drops the owner's entry; the next `get` reads the store.
    ///
    /// Owners the cache has never seen are left untracked.
    pub fn invalidate(&self, owner_id: OwnerId) {
        if self.slots.remove(&owner_id).is_some() {
            debug!("event=freeze_cache_invalidate module=guard status=ok owner_id={owner_id}");
        }
    }

    /// Drops every entry.
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.slots.clear();
        debug!("event=freeze_cache_invalidate module=guard status=ok scope=all");
    }

    /// Number of owners with a cached snapshot, live or expired.
    pub fn cached_owner_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    /// Number of owners holding a slot, cached or mid-fill.
    pub fn tracked_owner_count(&self) -> usize {
        self.slots.len()
    }

    fn lookup(&self, owner_id: OwnerId, now: Instant) -> Lookup {
        if !self.slots.contains_key(&owner_id)
            && self.slots.len() >= self.max_entries
            && !self.make_room(now)
        {
            return Lookup::Bypass;
        }

        let mut slot = self.slots.entry(owner_id).or_default();
        if let Some(cached) = slot.entry.as_ref() {
            if self.is_live(cached, now) {
                return Lookup::Hit(Arc::clone(&cached.modules));
            }
        }
        if let Some(tx) = slot.in_flight.as_ref() {
            return Lookup::Wait(tx.subscribe());
        }
        let tx: FillSender = Arc::new(watch::channel(None).0);
        slot.in_flight = Some(Arc::clone(&tx));
        Lookup::Fill(tx)
    }

    /// Sweeps expired idle entries, then evicts the stalest idle one if the
    /// map is still full. Returns `false` when every slot is mid-fill.
    fn make_room(&self, now: Instant) -> bool {
        self.slots.retain(|_, slot| {
            slot.in_flight.is_some()
                || slot
                    .entry
                    .as_ref()
                    .is_some_and(|cached| self.is_live(cached, now))
        });
        if self.slots.len() < self.max_entries {
            return true;
        }

        let stalest = self
            .slots
            .iter()
            .filter(|slot| slot.in_flight.is_none())
            .filter_map(|slot| {
                slot.entry
                    .as_ref()
                    .map(|cached| (*slot.key(), cached.fetched_at))
            })
            .min_by_key(|(_, fetched_at)| *fetched_at)
            .map(|(owner_id, _)| owner_id);
        match stalest {
            Some(owner_id) => {
                self.slots
                    .remove_if(&owner_id, |_, slot| slot.in_flight.is_none());
                debug!(
                    "event=freeze_cache_evict module=guard status=ok owner_id={owner_id} max_entries={}",
                    self.max_entries
                );
                true
            }
            None => false,
        }
    }

    fn is_live(&self, cached: &CachedFreeze, now: Instant) -> bool {
        now.saturating_duration_since(cached.fetched_at) < self.ttl
    }

    async fn read_store(&self, owner_id: OwnerId) -> FillOutcome {
        match tokio::time::timeout(
            self.store_timeout,
            self.store.find_active_with_modules(owner_id),
        )
        .await
        {
            Ok(Ok(active)) => Ok(Arc::new(active.map(|a| a.modules).unwrap_or_default())),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(FreezeCacheError::Timeout(self.store_timeout)),
        }
    }

    /// Retires the in-flight marker `tx` and caches `fresh` if it is still
    /// current. Slots that are not cached afterwards are removed.
    fn settle(
        &self,
        owner_id: OwnerId,
        tx: &FillSender,
        fresh: Option<Arc<CachedFreeze>>,
        epoch: u64,
    ) -> bool {
        let Entry::Occupied(mut occupied) = self.slots.entry(owner_id) else {
            return false;
        };
        let ours = occupied
            .get()
            .in_flight
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, tx));
        if !ours {
            // Invalidated mid-fill; the slot now belongs to a newer fill.
            return false;
        }
        // Checked under the shard lock: `invalidate_all` bumps the epoch before
        // clearing, so a stale fill either sees the bump or is cleared after.
        match fresh {
            Some(cached) if self.epoch.load(Ordering::SeqCst) == epoch => {
                let slot = occupied.get_mut();
                slot.in_flight = None;
                slot.entry = Some(cached);
                true
            }
            _ => {
                occupied.remove();
                false
            }
        }
    }
}

/// Owns one in-flight store read. Dropping it unpublished (the caller was
/// cancelled) clears the marker so waiters retry instead of hanging.
struct FillGuard<'a> {
    cache: &'a FreezeStateCache,
    owner_id: OwnerId,
    tx: FillSender,
    finished: bool,
}

impl FillGuard<'_> {
    fn finish(mut self, outcome: &FillOutcome, epoch: u64, fetched_at: Instant) {
        let fresh = outcome.as_ref().ok().map(|modules| {
            Arc::new(CachedFreeze {
                modules: Arc::clone(modules),
                fetched_at,
            })
        });
        let stored = self.cache.settle(self.owner_id, &self.tx, fresh, epoch);
        self.tx.send_replace(Some(outcome.clone()));
        self.finished = true;
        match outcome {
            Ok(modules) => debug!(
                "event=freeze_cache_fill module=guard status=ok owner_id={} frozen_count={} cached={} waiters={}",
                self.owner_id,
                modules.len(),
                stored,
                self.tx.receiver_count()
            ),
            Err(err) => debug!(
                "event=freeze_cache_fill module=guard status=error owner_id={} waiters={} error={}",
                self.owner_id,
                self.tx.receiver_count(),
                err
            ),
        }
    }
}

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.settle(self.owner_id, &self.tx, None, 0);
        }
    }
}

impl FreezeInvalidation for FreezeStateCache {
    fn invalidate(&self, owner_id: OwnerId) {
        FreezeStateCache::invalidate(self, owner_id);
    }
}

impl Debug for FreezeStateCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreezeStateCache")
            .field("ttl", &self.ttl)
            .field("store_timeout", &self.store_timeout)
            .field("max_entries", &self.max_entries)
            .field("owners", &self.slots.len())
            .finish()
    }
}
