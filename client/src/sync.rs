//! Reconciliation Engine - one full two-phase sync cycle.
//!
//! Phase 1 pulls remote rows and merges them into the local cache without
//! discarding unsynced local-only records. Phase 2 pushes the local cache
//! back, per table, independently and concurrently. Partial success is a
//! normal outcome: one table's failure never blocks or rolls back
//! another's, and the consolidated report carries one boolean per table.
//!
//! A cycle never runs concurrently with another: an atomic in-flight flag
//! is taken before phase 1 and released on drop, so a crashed cycle
//! cannot wedge the scheduler.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tirestock_engine::{
    union_merge_containers, union_merge_entries, union_merge_models, union_merge_status,
    CacheStore, StockEntry, SyncLog, TireConsumption, TireMovement,
};

use crate::error::SyncError;
use crate::gateway::{tables, RemoteStore};
use crate::resolver::KeyMaps;
use crate::rows::{ConsumptionInsert, ContainerUpsert, MovementInsert, StatusUpsert, TireModelUpsert};
use crate::session::{Identity, IdentityProvider};

/// Consolidated outcome of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// True only if the pull succeeded and every table's push succeeded.
    pub success: bool,
    /// Whether phase 1 ran and succeeded.
    pub pulled: bool,
    /// Per-table push outcome.
    pub results: BTreeMap<&'static str, bool>,
}

/// The reconciliation engine. Constructed once at startup and shared.
pub struct SyncEngine {
    cache: Arc<CacheStore>,
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    log: Arc<SyncLog>,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag even when a cycle panics or is dropped
/// mid-await.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(
        cache: Arc<CacheStore>,
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        log: Arc<SyncLog>,
    ) -> Self {
        Self {
            cache,
            remote,
            identity,
            log,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    /// Run one full pull-then-push cycle.
    ///
    /// Returns `None` without doing anything when another cycle is still
    /// in flight; the next natural trigger picks up the latest state.
    pub async fn run_cycle(&self) -> Option<SyncReport> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("sync cycle already in flight, dropping trigger");
            return None;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let identity = self.identity.current().await;

        // Audit rows created locally and never seen remotely. Snapshot
        // them before the pull replaces those collections wholesale.
        let pending_movements: Vec<TireMovement> = self
            .cache
            .tire_movements()
            .into_iter()
            .filter(|m| m.remote_id.is_none())
            .collect();
        let pending_consumption: Vec<TireConsumption> = self
            .cache
            .tire_consumption()
            .into_iter()
            .filter(|c| c.remote_id.is_none())
            .collect();

        let pulled = match &identity {
            Some(identity) => self.pull(identity).await,
            None => {
                tracing::debug!("pull skipped: not authenticated");
                false
            }
        };

        let results = self
            .push(identity.as_ref(), pending_movements, pending_consumption)
            .await;

        let success = pulled && results.values().all(|ok| *ok);
        tracing::info!(%success, %pulled, "sync cycle finished");

        Some(SyncReport {
            success,
            pulled,
            results,
        })
    }

    // ── Phase 1: pull ────────────────────────────────────────────────────

    async fn pull(&self, identity: &Identity) -> bool {
        let mut ok = true;
        let admin = identity.is_admin();

        // Model and container rows are fetched regardless of role: they
        // are needed to denormalize entry rows. They are written into the
        // local cache only for admin sessions.
        let models = match self.remote.fetch_models().await {
            Ok(rows) => Some(rows),
            Err(e) => {
                if admin {
                    self.log.record_error(tables::TIRE_MODELS, e.to_string());
                    ok = false;
                } else {
                    tracing::debug!(error = %e, "model lookup fetch failed");
                }
                None
            }
        };
        let containers = match self.remote.fetch_containers().await {
            Ok(rows) => Some(rows),
            Err(e) => {
                if admin {
                    self.log.record_error(tables::CONTAINERS, e.to_string());
                    ok = false;
                } else {
                    tracing::debug!(error = %e, "container lookup fetch failed");
                }
                None
            }
        };

        // Admin collections also merge as a union on their natural keys:
        // a model or container created offline must survive until the
        // push phase uploads it.
        if admin {
            if let Some(rows) = &models {
                let remote: Vec<_> = rows.iter().cloned().map(|r| r.into_local()).collect();
                let merged = union_merge_models(remote, &self.cache.tire_models());
                self.cache.set_tire_models(&merged);
            }
            if let Some(rows) = &containers {
                let remote: Vec<_> = rows.iter().cloned().map(|r| r.into_local()).collect();
                let merged = union_merge_containers(remote, &self.cache.containers());
                self.cache.set_containers(&merged);
            }
            match self.remote.fetch_status().await {
                Ok(rows) => {
                    let remote: Vec<_> = rows.into_iter().map(|r| r.into_local()).collect();
                    let merged = union_merge_status(remote, &self.cache.tire_status());
                    self.cache.set_tire_status(&merged);
                }
                Err(e) => {
                    self.log.record_error(tables::TIRE_STATUS, e.to_string());
                    ok = false;
                }
            }
        }

        let models_by_id: HashMap<_, _> = models
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        let containers_by_id: HashMap<_, _> = containers
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        // Stock entries merge as a union: remote rows are authoritative,
        // but local entries the remote has never seen survive.
        match self.remote.fetch_entries().await {
            Ok(rows) => {
                let local = self.cache.stock_entries();
                let local_by_barcode: HashMap<String, StockEntry> = local
                    .iter()
                    .map(|e| (e.barcode.clone(), e.clone()))
                    .collect();
                let remote_entries: Vec<StockEntry> = rows
                    .into_iter()
                    .map(|r| r.into_local(&models_by_id, &containers_by_id, &local_by_barcode))
                    .collect();
                let merged = union_merge_entries(remote_entries, &local);
                self.cache.set_stock_entries(&merged);
            }
            Err(e) => {
                self.log.record_error(tables::STOCK_ENTRIES, e.to_string());
                ok = false;
            }
        }

        // Audit logs are remote-authoritative once any sync has occurred:
        // replaced wholesale, no merge.
        match self.remote.fetch_movements().await {
            Ok(rows) => {
                let local: Vec<_> = rows.into_iter().map(|r| r.into_local()).collect();
                self.cache.set_tire_movements(&local);
            }
            Err(e) => {
                self.log.record_error(tables::TIRE_MOVEMENTS, e.to_string());
                ok = false;
            }
        }
        match self.remote.fetch_consumption().await {
            Ok(rows) => {
                let local: Vec<_> = rows.into_iter().map(|r| r.into_local()).collect();
                self.cache.set_tire_consumption(&local);
            }
            Err(e) => {
                self.log.record_error(tables::TIRE_CONSUMPTION, e.to_string());
                ok = false;
            }
        }

        ok
    }

    // ── Phase 2: push ────────────────────────────────────────────────────

    async fn push(
        &self,
        identity: Option<&Identity>,
        pending_movements: Vec<TireMovement>,
        pending_consumption: Vec<TireConsumption>,
    ) -> BTreeMap<&'static str, bool> {
        // The six tables push independently; failures never cascade. The
        // natural-key tables go first so that a model or container
        // created this cycle is resolvable when the entries batch builds
        // its key maps from a fresh fetch.
        let (models, containers, status) = tokio::join!(
            self.push_models(identity),
            self.push_containers(identity),
            self.push_status(identity),
        );
        let (entries, movements, consumption) = tokio::join!(
            self.push_entries(identity),
            self.push_movements(identity, pending_movements),
            self.push_consumption(identity, pending_consumption),
        );

        let mut results = BTreeMap::new();
        results.insert(tables::TIRE_MODELS, models);
        results.insert(tables::CONTAINERS, containers);
        results.insert(tables::STOCK_ENTRIES, entries);
        results.insert(tables::TIRE_MOVEMENTS, movements);
        results.insert(tables::TIRE_CONSUMPTION, consumption);
        results.insert(tables::TIRE_STATUS, status);
        results
    }

    /// Admin-gated tables: an insufficient role is a benign skip, counted
    /// as success, so non-admin sessions do not perpetually report
    /// errors. No remote call is attempted and nothing is written to the
    /// activity log; three skip entries per cycle would churn real
    /// outcomes out of the bounded buffer.
    fn admin_gate(&self, identity: Option<&Identity>, table: &'static str) -> bool {
        let allowed = identity.map(Identity::is_admin).unwrap_or(false);
        if !allowed {
            tracing::debug!(%table, "skipping admin-gated push");
        }
        allowed
    }

    /// Authenticated-only tables: pushing without an identity is a hard
    /// failure, reported without attempting the call.
    fn auth_gate(&self, identity: Option<&Identity>, table: &'static str) -> bool {
        if identity.is_none() {
            self.log
                .record_error(table, SyncError::Unauthenticated.to_string());
            return false;
        }
        true
    }

    async fn push_models(&self, identity: Option<&Identity>) -> bool {
        if !self.admin_gate(identity, tables::TIRE_MODELS) {
            return true;
        }

        let rows: Vec<_> = self
            .cache
            .tire_models()
            .iter()
            .map(TireModelUpsert::from_local)
            .collect();
        let count = rows.len();
        match self.remote.upsert_models(rows).await {
            Ok(()) => {
                self.log.record_sync(tables::TIRE_MODELS, count);
                true
            }
            Err(e) => {
                self.log.record_error(tables::TIRE_MODELS, e.to_string());
                false
            }
        }
    }

    async fn push_containers(&self, identity: Option<&Identity>) -> bool {
        if !self.admin_gate(identity, tables::CONTAINERS) {
            return true;
        }

        let rows: Vec<_> = self
            .cache
            .containers()
            .iter()
            .map(ContainerUpsert::from_local)
            .collect();
        let count = rows.len();
        match self.remote.upsert_containers(rows).await {
            Ok(()) => {
                self.log.record_sync(tables::CONTAINERS, count);
                true
            }
            Err(e) => {
                self.log.record_error(tables::CONTAINERS, e.to_string());
                false
            }
        }
    }

    async fn push_status(&self, identity: Option<&Identity>) -> bool {
        if !self.admin_gate(identity, tables::TIRE_STATUS) {
            return true;
        }

        let rows: Vec<_> = self
            .cache
            .tire_status()
            .iter()
            .map(StatusUpsert::from_local)
            .collect();
        let count = rows.len();
        match self.remote.upsert_status(rows).await {
            Ok(()) => {
                self.log.record_sync(tables::TIRE_STATUS, count);
                true
            }
            Err(e) => {
                self.log.record_error(tables::TIRE_STATUS, e.to_string());
                false
            }
        }
    }

    async fn push_entries(&self, identity: Option<&Identity>) -> bool {
        if !self.auth_gate(identity, tables::STOCK_ENTRIES) {
            return false;
        }

        // The key maps are rebuilt from a fresh fetch on every push
        // cycle; remote state may have changed since the last one.
        let models = match self.remote.fetch_models().await {
            Ok(rows) => rows,
            Err(e) => {
                self.log.record_error(tables::STOCK_ENTRIES, e.to_string());
                return false;
            }
        };
        // A container is optional on an entry, so a failed container
        // fetch degrades to pushing with null container ids instead of
        // failing the whole batch.
        let containers = match self.remote.fetch_containers().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "container lookup unavailable, pushing entries without container ids");
                Vec::new()
            }
        };
        let maps = KeyMaps::build(&models, &containers);

        let mut rows = Vec::new();
        for entry in self.cache.stock_entries() {
            match maps.resolve_entry(&entry) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    // Mapping failure drops the record from this batch
                    // only; the remainder still uploads.
                    self.log.record_error(tables::STOCK_ENTRIES, e.to_string());
                }
            }
        }

        let count = rows.len();
        match self.remote.upsert_entries(rows).await {
            Ok(()) => {
                self.log.record_sync(tables::STOCK_ENTRIES, count);
                true
            }
            Err(e) => {
                self.log.record_error(tables::STOCK_ENTRIES, e.to_string());
                false
            }
        }
    }

    async fn push_movements(
        &self,
        identity: Option<&Identity>,
        pending: Vec<TireMovement>,
    ) -> bool {
        if !self.auth_gate(identity, tables::TIRE_MOVEMENTS) {
            return false;
        }

        let rows: Vec<_> = pending.iter().map(MovementInsert::from_local).collect();
        let count = rows.len();
        match self.remote.insert_movements(rows).await {
            Ok(()) => {
                self.log.record_sync(tables::TIRE_MOVEMENTS, count);
                true
            }
            Err(e) => {
                self.log.record_error(tables::TIRE_MOVEMENTS, e.to_string());
                // The pull replaced the collection with the remote set;
                // put the uninserted rows back so they stay pending and
                // the next cycle retries them.
                let mut movements = self.cache.tire_movements();
                for row in pending {
                    if !movements.contains(&row) {
                        movements.push(row);
                    }
                }
                self.cache.set_tire_movements(&movements);
                false
            }
        }
    }

    async fn push_consumption(
        &self,
        identity: Option<&Identity>,
        pending: Vec<TireConsumption>,
    ) -> bool {
        if !self.auth_gate(identity, tables::TIRE_CONSUMPTION) {
            return false;
        }

        let rows: Vec<_> = pending.iter().map(ConsumptionInsert::from_local).collect();
        let count = rows.len();
        match self.remote.insert_consumption(rows).await {
            Ok(()) => {
                self.log.record_sync(tables::TIRE_CONSUMPTION, count);
                true
            }
            Err(e) => {
                self.log.record_error(tables::TIRE_CONSUMPTION, e.to_string());
                let mut records = self.cache.tire_consumption();
                for row in pending {
                    if !records.contains(&row) {
                        records.push(row);
                    }
                }
                self.cache.set_tire_consumption(&records);
                false
            }
        }
    }
}
