//! Integration tests for the reconciliation cycle and the scheduler,
//! driven against an in-memory fake remote store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use tirestock_client::gateway::{tables, RemoteStore};
use tirestock_client::rows::{
    ConsumptionInsert, ConsumptionRow, ContainerRow, ContainerUpsert, MovementInsert, MovementRow,
    StatusRow, StatusUpsert, StockEntryRow, StockEntryUpsert, TireModelRow, TireModelUpsert,
};
use tirestock_client::{
    FixedIdentity, Identity, Result, Role, SchedulerConfig, SyncEngine, SyncError, SyncScheduler,
    SyncStatus,
};
use tirestock_engine::ops::{move_entry, register_entry};
use tirestock_engine::{
    CacheStore, Container, EntryStatus, StockEntry, SyncLog, TireModel, TireType,
};

// ════════════════════════════════════════════════════════════════════════
// Fake remote store
// ════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct RemoteState {
    models: Vec<TireModelRow>,
    containers: Vec<ContainerRow>,
    entries: Vec<StockEntryRow>,
    movements: Vec<MovementRow>,
    consumption: Vec<ConsumptionRow>,
    status: Vec<StatusRow>,
    failing: HashSet<&'static str>,
    failing_inserts: HashSet<&'static str>,
    next_id: u64,
}

impl RemoteState {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-memory [`RemoteStore`] with per-table failure injection. Upserts
/// honor the natural conflict key the way the real backend does:
/// existing rows keep their id, new rows get a fresh one.
#[derive(Default)]
struct FakeRemote {
    state: Mutex<RemoteState>,
    entry_fetches: AtomicUsize,
    // Taken by the first fetch_models call; lets a test hold a cycle
    // open mid-flight.
    hold: Mutex<Option<Hold>>,
}

struct Hold {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl FakeRemote {
    fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fail(&self, table: &'static str) {
        self.state.lock().unwrap().failing.insert(table);
    }

    /// Fail only the insert side of a table, leaving its fetch healthy.
    fn fail_insert(&self, table: &'static str) {
        self.state.lock().unwrap().failing_inserts.insert(table);
    }

    fn recover(&self, table: &'static str) {
        let mut state = self.state.lock().unwrap();
        state.failing.remove(table);
        state.failing_inserts.remove(table);
    }

    fn check(&self, table: &'static str) -> Result<()> {
        if self.state.lock().unwrap().failing.contains(table) {
            return Err(SyncError::remote(table, "injected failure".to_string()));
        }
        Ok(())
    }

    fn check_insert(&self, table: &'static str) -> Result<()> {
        if self.state.lock().unwrap().failing_inserts.contains(table) {
            return Err(SyncError::remote(table, "injected insert failure".to_string()));
        }
        self.check(table)
    }

    fn hold_next_cycle(&self) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Hold {
            started: started.clone(),
            release: release.clone(),
        });
        (started, release)
    }

    fn pulls(&self) -> usize {
        self.entry_fetches.load(Ordering::SeqCst)
    }

    fn models(&self) -> Vec<TireModelRow> {
        self.state.lock().unwrap().models.clone()
    }

    fn containers(&self) -> Vec<ContainerRow> {
        self.state.lock().unwrap().containers.clone()
    }

    fn entries(&self) -> Vec<StockEntryRow> {
        self.state.lock().unwrap().entries.clone()
    }

    fn movements(&self) -> Vec<MovementRow> {
        self.state.lock().unwrap().movements.clone()
    }

    fn seed_model(&self, name: &str, code: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id("model");
        state.models.push(TireModelRow {
            id: id.clone(),
            name: name.to_string(),
            code: code.to_string(),
            tire_type: "Slick".to_string(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        });
        id
    }

    fn seed_container(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id("container");
        state.containers.push(ContainerRow {
            id: id.clone(),
            name: name.to_string(),
            location: Some("paddock".to_string()),
            capacity: 50,
            current_stock: 0,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        });
        id
    }

    fn seed_entry(&self, barcode: &str, model_id: &str, container_id: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id("entry");
        state.entries.push(StockEntryRow {
            id,
            barcode: barcode.to_string(),
            model_id: model_id.to_string(),
            container_id: container_id.map(str::to_string),
            status: "Novo".to_string(),
            pilot: None,
            team: None,
            notes: None,
            discard_reason: None,
            consumption_date: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        });
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn fetch_models(&self) -> Result<Vec<TireModelRow>> {
        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.started.notify_one();
            hold.release.notified().await;
        }
        self.check(tables::TIRE_MODELS)?;
        Ok(self.models())
    }

    async fn fetch_containers(&self) -> Result<Vec<ContainerRow>> {
        self.check(tables::CONTAINERS)?;
        Ok(self.containers())
    }

    async fn fetch_entries(&self) -> Result<Vec<StockEntryRow>> {
        self.entry_fetches.fetch_add(1, Ordering::SeqCst);
        self.check(tables::STOCK_ENTRIES)?;
        Ok(self.entries())
    }

    async fn fetch_movements(&self) -> Result<Vec<MovementRow>> {
        self.check(tables::TIRE_MOVEMENTS)?;
        Ok(self.movements())
    }

    async fn fetch_consumption(&self) -> Result<Vec<ConsumptionRow>> {
        self.check(tables::TIRE_CONSUMPTION)?;
        Ok(self.state.lock().unwrap().consumption.clone())
    }

    async fn fetch_status(&self) -> Result<Vec<StatusRow>> {
        self.check(tables::TIRE_STATUS)?;
        Ok(self.state.lock().unwrap().status.clone())
    }

    async fn upsert_models(&self, rows: Vec<TireModelUpsert>) -> Result<()> {
        self.check(tables::TIRE_MODELS)?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(i) = state.models.iter().position(|m| m.code == row.code) {
                state.models[i].name = row.name;
                state.models[i].tire_type = row.tire_type;
                state.models[i].updated_at = Some(row.updated_at);
            } else {
                let id = state.assign_id("model");
                state.models.push(TireModelRow {
                    id,
                    name: row.name,
                    code: row.code,
                    tire_type: row.tire_type,
                    created_at: Some(Utc::now()),
                    updated_at: Some(row.updated_at),
                });
            }
        }
        Ok(())
    }

    async fn upsert_containers(&self, rows: Vec<ContainerUpsert>) -> Result<()> {
        self.check(tables::CONTAINERS)?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(i) = state.containers.iter().position(|c| c.name == row.name) {
                state.containers[i].location = Some(row.location);
                state.containers[i].capacity = row.capacity;
                state.containers[i].current_stock = row.current_stock;
                state.containers[i].updated_at = Some(row.updated_at);
            } else {
                let id = state.assign_id("container");
                state.containers.push(ContainerRow {
                    id,
                    name: row.name,
                    location: Some(row.location),
                    capacity: row.capacity,
                    current_stock: row.current_stock,
                    created_at: Some(Utc::now()),
                    updated_at: Some(row.updated_at),
                });
            }
        }
        Ok(())
    }

    async fn upsert_entries(&self, rows: Vec<StockEntryUpsert>) -> Result<()> {
        self.check(tables::STOCK_ENTRIES)?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(i) = state.entries.iter().position(|e| e.barcode == row.barcode) {
                let existing = &mut state.entries[i];
                existing.model_id = row.model_id;
                existing.container_id = row.container_id;
                existing.status = row.status;
                existing.pilot = row.pilot;
                existing.team = row.team;
                existing.notes = row.notes;
                existing.discard_reason = row.discard_reason;
                existing.consumption_date = row.consumption_date;
                existing.updated_at = Some(row.updated_at);
            } else {
                let id = state.assign_id("entry");
                state.entries.push(StockEntryRow {
                    id,
                    barcode: row.barcode,
                    model_id: row.model_id,
                    container_id: row.container_id,
                    status: row.status,
                    pilot: row.pilot,
                    team: row.team,
                    notes: row.notes,
                    discard_reason: row.discard_reason,
                    consumption_date: row.consumption_date,
                    created_at: Some(Utc::now()),
                    updated_at: Some(row.updated_at),
                });
            }
        }
        Ok(())
    }

    async fn upsert_status(&self, rows: Vec<StatusUpsert>) -> Result<()> {
        self.check(tables::TIRE_STATUS)?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(i) = state.status.iter().position(|s| s.name == row.name) {
                state.status[i].color = row.color;
                state.status[i].is_default = row.is_default;
                state.status[i].updated_at = Some(row.updated_at);
            } else {
                let id = state.assign_id("status");
                state.status.push(StatusRow {
                    id,
                    name: row.name,
                    color: row.color,
                    is_default: row.is_default,
                    created_at: Some(Utc::now()),
                    updated_at: Some(row.updated_at),
                });
            }
        }
        Ok(())
    }

    async fn insert_movements(&self, rows: Vec<MovementInsert>) -> Result<()> {
        self.check_insert(tables::TIRE_MOVEMENTS)?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let id = state.assign_id("movement");
            state.movements.push(MovementRow {
                id,
                barcode: row.barcode,
                from_container: row.from_container,
                to_container: row.to_container,
                moved_by: row.moved_by,
                reason: row.reason,
                created_at: Some(row.created_at),
            });
        }
        Ok(())
    }

    async fn insert_consumption(&self, rows: Vec<ConsumptionInsert>) -> Result<()> {
        self.check_insert(tables::TIRE_CONSUMPTION)?;
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let id = state.assign_id("consumption");
            state.consumption.push(ConsumptionRow {
                id,
                barcode: row.barcode,
                pilot: row.pilot,
                team: row.team,
                notes: row.notes,
                registered_by: row.registered_by,
                created_at: Some(row.created_at),
            });
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════

fn admin() -> FixedIdentity {
    FixedIdentity(Some(Identity {
        user_id: "admin-1".to_string(),
        role: Role::Admin,
    }))
}

fn member() -> FixedIdentity {
    FixedIdentity(Some(Identity {
        user_id: "member-1".to_string(),
        role: Role::Member,
    }))
}

fn engine_with(
    remote: Arc<FakeRemote>,
    identity: FixedIdentity,
) -> (Arc<SyncEngine>, Arc<CacheStore>) {
    let cache = Arc::new(CacheStore::in_memory());
    let engine = Arc::new(SyncEngine::new(
        cache.clone(),
        remote,
        Arc::new(identity),
        Arc::new(SyncLog::new()),
    ));
    (engine, cache)
}

fn local_model(name: &str, code: &str) -> TireModel {
    TireModel {
        local_id: format!("local-model-{code}"),
        name: name.to_string(),
        code: code.to_string(),
        tire_type: TireType::Slick,
    }
}

fn local_container(name: &str) -> Container {
    Container {
        local_id: format!("local-container-{name}"),
        name: name.to_string(),
        location: "paddock".to_string(),
        capacity: 50,
        current: 0,
    }
}

fn local_entry(barcode: &str, model: &TireModel, container: Option<&Container>) -> StockEntry {
    StockEntry {
        local_id: format!("local-entry-{barcode}"),
        barcode: barcode.to_string(),
        model_id: model.local_id.clone(),
        model_name: model.name.clone(),
        model_type: model.tire_type,
        container_id: container.map(|c| c.local_id.clone()),
        container_name: container.map(|c| c.name.clone()),
        status: EntryStatus::Novo,
        timestamp: Utc::now(),
        pilot: None,
        team: None,
        notes: None,
        discard_reason: None,
        consumption_date: None,
    }
}

// ════════════════════════════════════════════════════════════════════════
// First sync against an empty remote
// ════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn first_cycle_uploads_everything_with_resolved_keys() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());

    let model = local_model("Slick A", "M1");
    let container = local_container("C1");
    cache.set_tire_models(&[model.clone()]);
    cache.set_containers(&[container.clone()]);
    register_entry(&cache, local_entry("12345678", &model, Some(&container))).unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert!(report.success, "report: {report:?}");
    assert!(report.pulled);
    assert!(report.results.values().all(|ok| *ok));

    // The model and container landed first, so the entry resolved their
    // freshly assigned remote ids within the same cycle.
    let models = remote.models();
    let containers = remote.containers();
    let entries = remote.entries();
    assert_eq!(models.len(), 1);
    assert_eq!(containers.len(), 1);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].barcode, "12345678");
    assert_eq!(entries[0].model_id, models[0].id);
    assert_eq!(entries[0].container_id.as_deref(), Some(containers[0].id.as_str()));
}

#[tokio::test]
async fn repeated_cycles_do_not_duplicate_rows() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());

    let model = local_model("Slick A", "M1");
    let container = local_container("C1");
    cache.set_tire_models(&[model.clone()]);
    cache.set_containers(&[container.clone()]);
    register_entry(&cache, local_entry("12345678", &model, Some(&container))).unwrap();

    assert!(engine.run_cycle().await.unwrap().success);
    let id_after_first = remote.models()[0].id.clone();
    let stamp_after_first = remote.models()[0].updated_at;

    assert!(engine.run_cycle().await.unwrap().success);

    let models = remote.models();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, id_after_first);
    // Idempotent on the natural key, but updated_at still refreshes.
    assert!(models[0].updated_at >= stamp_after_first);
    assert_eq!(remote.containers().len(), 1);
    assert_eq!(remote.entries().len(), 1);
}

// ════════════════════════════════════════════════════════════════════════
// Pull semantics
// ════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn pull_keeps_unsynced_local_entries() {
    let remote = FakeRemote::shared();
    let model_id = remote.seed_model("Slick A", "M1");
    remote.seed_entry("11111111", &model_id, None);

    let (engine, cache) = engine_with(remote.clone(), admin());
    let model = local_model("Slick A", "M1");
    cache.set_tire_models(&[model.clone()]);
    register_entry(&cache, local_entry("22222222", &model, None)).unwrap();

    assert!(engine.run_cycle().await.unwrap().success);

    let entries = cache.stock_entries();
    let barcodes: Vec<_> = entries.iter().map(|e| e.barcode.as_str()).collect();
    // Remote rows first, surviving local-only entries after.
    assert_eq!(barcodes, vec!["11111111", "22222222"]);
    assert_eq!(entries[0].model_name, "Slick A");
    // The local-only entry made it upstream during the push phase.
    assert_eq!(remote.entries().len(), 2);
}

#[tokio::test]
async fn member_pull_does_not_touch_admin_collections() {
    let remote = FakeRemote::shared();
    let model_id = remote.seed_model("Slick A", "M1");
    remote.seed_entry("11111111", &model_id, None);

    let (engine, cache) = engine_with(remote.clone(), member());
    let report = engine.run_cycle().await.unwrap();
    assert!(report.success);

    // Model rows were fetched only to denormalize the entry rows.
    assert!(cache.tire_models().is_empty());
    let entries = cache.stock_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].model_name, "Slick A");
}

// ════════════════════════════════════════════════════════════════════════
// Partial failure and gating
// ════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn one_failing_table_does_not_block_the_others() {
    let remote = FakeRemote::shared();
    remote.fail(tables::CONTAINERS);

    let (engine, cache) = engine_with(remote.clone(), admin());
    let model = local_model("Slick A", "M1");
    let container = local_container("C1");
    cache.set_tire_models(&[model.clone()]);
    cache.set_containers(&[container.clone()]);
    register_entry(&cache, local_entry("12345678", &model, Some(&container))).unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert!(!report.success);
    assert!(!report.results[tables::CONTAINERS]);
    assert!(report.results[tables::TIRE_MODELS]);
    assert!(report.results[tables::STOCK_ENTRIES]);
    assert!(report.results[tables::TIRE_STATUS]);
    assert!(report.results[tables::TIRE_MOVEMENTS]);
    assert!(report.results[tables::TIRE_CONSUMPTION]);

    // No rollback on the siblings; the entry degrades to a null
    // container id because the lookup was unavailable.
    assert_eq!(remote.models().len(), 1);
    assert!(remote.containers().is_empty());
    let entries = remote.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].container_id.is_none());
}

#[tokio::test]
async fn member_push_skips_admin_tables_as_success() {
    let remote = FakeRemote::shared();
    remote.seed_model("Slick A", "M1");

    let (engine, cache) = engine_with(remote.clone(), member());
    let model = local_model("Slick A", "M1");
    register_entry(&cache, local_entry("12345678", &model, None)).unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert!(report.success, "a benign skip must not fail the cycle");
    assert!(report.results[tables::TIRE_MODELS]);
    assert!(report.results[tables::CONTAINERS]);
    assert!(report.results[tables::TIRE_STATUS]);
    // No admin-table writes were attempted; the seeded row is untouched.
    assert_eq!(remote.models().len(), 1);
    assert_eq!(remote.entries().len(), 1);
    // Benign skips stay out of the activity log.
    assert!(engine.log().entries().iter().all(|e| {
        e.table != tables::TIRE_MODELS
            && e.table != tables::CONTAINERS
            && e.table != tables::TIRE_STATUS
    }));
}

#[tokio::test]
async fn unresolved_model_drops_only_that_entry() {
    let remote = FakeRemote::shared();
    remote.seed_model("Slick A", "M1");

    let (engine, cache) = engine_with(remote.clone(), member());
    let known = local_model("Slick A", "M1");
    let unknown = local_model("Prototype", "X9");
    register_entry(&cache, local_entry("12345678", &known, None)).unwrap();
    register_entry(&cache, local_entry("87654321", &unknown, None)).unwrap();

    let report = engine.run_cycle().await.unwrap();

    // The batch still lands; the unmappable record is excluded and the
    // exclusion is logged.
    assert!(report.results[tables::STOCK_ENTRIES]);
    let entries = remote.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].barcode, "12345678");
    assert!(engine
        .log()
        .entries()
        .iter()
        .any(|e| e.table == tables::STOCK_ENTRIES && e.message.contains("87654321")));
}

#[tokio::test]
async fn unauthenticated_cycle_skips_pull_and_fails_push() {
    let remote = FakeRemote::shared();
    let model_id = remote.seed_model("Slick A", "M1");
    remote.seed_entry("11111111", &model_id, None);

    let (engine, cache) = engine_with(remote.clone(), FixedIdentity(None));
    let report = engine.run_cycle().await.unwrap();

    assert!(!report.success);
    assert!(!report.pulled);
    assert!(cache.stock_entries().is_empty(), "nothing was pulled");
    assert!(!report.results[tables::STOCK_ENTRIES]);
    assert!(!report.results[tables::TIRE_MOVEMENTS]);
    // Admin tables skip benignly even without an identity.
    assert!(report.results[tables::TIRE_MODELS]);
}

// ════════════════════════════════════════════════════════════════════════
// Audit tables
// ════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn movements_insert_once_across_cycles() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());

    let model = local_model("Slick A", "M1");
    let container = local_container("C1");
    cache.set_tire_models(&[model.clone()]);
    cache.set_containers(&[container.clone()]);
    register_entry(&cache, local_entry("12345678", &model, None)).unwrap();
    move_entry(&cache, "12345678", "C1", "mechanic", "rotation").unwrap();

    assert!(engine.run_cycle().await.unwrap().success);
    assert_eq!(remote.movements().len(), 1);

    // The second cycle pulls the inserted row back, with its remote id,
    // and finds nothing pending to re-insert.
    assert!(engine.run_cycle().await.unwrap().success);
    assert_eq!(remote.movements().len(), 1);
    let movements = cache.tire_movements();
    assert_eq!(movements.len(), 1);
    assert!(movements[0].remote_id.is_some());
}

#[tokio::test]
async fn failed_audit_insert_retries_next_cycle() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());

    let model = local_model("Slick A", "M1");
    let container = local_container("C1");
    cache.set_tire_models(&[model.clone()]);
    cache.set_containers(&[container.clone()]);
    register_entry(&cache, local_entry("12345678", &model, None)).unwrap();
    move_entry(&cache, "12345678", "C1", "mechanic", "rotation").unwrap();

    // The pull succeeds but the insert does not. The pull replaced the
    // cached collection with the (empty) remote set, so the failed
    // insert must put the pending row back.
    remote.fail_insert(tables::TIRE_MOVEMENTS);
    let report = engine.run_cycle().await.unwrap();
    assert!(!report.results[tables::TIRE_MOVEMENTS]);
    assert!(remote.movements().is_empty());
    let pending = cache.tire_movements();
    assert_eq!(pending.len(), 1, "the uninserted row must stay pending");
    assert!(pending[0].remote_id.is_none());

    // After the backend recovers, the next cycle delivers the row.
    remote.recover(tables::TIRE_MOVEMENTS);
    let report = engine.run_cycle().await.unwrap();
    assert!(report.results[tables::TIRE_MOVEMENTS]);
    assert_eq!(remote.movements().len(), 1);

    // And the retry stays idempotent afterwards.
    assert!(engine.run_cycle().await.unwrap().success);
    assert_eq!(remote.movements().len(), 1);
    let movements = cache.tire_movements();
    assert_eq!(movements.len(), 1);
    assert!(movements[0].remote_id.is_some());
}

// ════════════════════════════════════════════════════════════════════════
// Reentrancy
// ════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn concurrent_cycle_is_dropped() {
    let remote = FakeRemote::shared();
    let (started, release) = remote.hold_next_cycle();
    let (engine, _cache) = engine_with(remote.clone(), admin());

    let held = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_cycle().await })
    };
    started.notified().await;

    // The first cycle is parked inside its pull; a second trigger must
    // come back empty-handed without touching the remote.
    assert!(engine.run_cycle().await.is_none());

    release.notify_one();
    let report = held.await.unwrap().unwrap();
    assert!(report.success);

    // The flag is released, so the next cycle runs normally.
    assert!(engine.run_cycle().await.is_some());
}

// ════════════════════════════════════════════════════════════════════════
// Scheduler
// ════════════════════════════════════════════════════════════════════════

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        sync_interval: Duration::from_secs(30),
        error_cooldown: Duration::from_secs(100),
        debounce: Duration::from_millis(800),
    }
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_on_the_interval() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());
    let scheduler = SyncScheduler::start(engine, &cache, fast_config());

    // The first tick fires immediately.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.pulls(), 1);
    assert_eq!(scheduler.status(), SyncStatus::Synced);
    assert!(scheduler.is_online());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(remote.pulls(), 2);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scheduler_backs_off_after_failure() {
    let remote = FakeRemote::shared();
    remote.fail(tables::STOCK_ENTRIES);
    let (engine, cache) = engine_with(remote.clone(), admin());
    let scheduler = SyncScheduler::start(engine, &cache, fast_config());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.pulls(), 1);
    assert_eq!(scheduler.status(), SyncStatus::Error);
    assert!(!scheduler.is_online());

    // A local write during the cooldown is debounced, then suppressed.
    cache.set_tire_models(&[local_model("Slick A", "M1")]);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(remote.pulls(), 1);

    // Interval ticks at 30/60/90 are all suppressed by the cooldown.
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(remote.pulls(), 1);

    // Past the cooldown the next tick goes through.
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(remote.pulls(), 2);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn change_trigger_syncs_after_debounce_without_storming() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());
    let scheduler = SyncScheduler::start(engine, &cache, fast_config());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.pulls(), 1);

    // A burst of local writes coalesces into one cycle shortly after
    // the debounce, well before the next periodic tick.
    for _ in 0..5 {
        cache.set_tire_models(&[local_model("Slick A", "M1")]);
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.pulls(), 2);

    // The cycle's own merge writes back into the cache must not feed
    // the trigger loop.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(remote.pulls(), 2);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_trigger_bypasses_the_interval_gate() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());
    let scheduler = SyncScheduler::start(engine, &cache, fast_config());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.pulls(), 1);

    scheduler.trigger();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.pulls(), 2);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_trigger_not_delayed_by_pending_debounce() {
    let remote = FakeRemote::shared();
    let (engine, cache) = engine_with(remote.clone(), admin());
    let scheduler = SyncScheduler::start(engine, &cache, fast_config());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(remote.pulls(), 1);

    // Arm the debounce with a local write, then ask for a manual cycle.
    // It must run right away, not after the debounce.
    cache.set_tire_models(&[local_model("Slick A", "M1")]);
    scheduler.trigger();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.pulls(), 2);

    // The manual cycle absorbed the pending change, so the debounce
    // does not fire a second cycle.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.pulls(), 2);

    scheduler.shutdown().await;
}
