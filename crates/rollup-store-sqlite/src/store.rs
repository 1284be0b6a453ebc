// crates/rollup-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Collaborator Store
// Description: spec.md §6 ScanGraphStore/ExternalObjectStore/RollupStore
//              backed by SQLite WAL.
// Purpose: One durable adapter implementing every persistence-facing
//          collaborator trait so the engine can run end to end without a
//          separate database service.
// Dependencies: rollup-core, rusqlite, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`SqliteRollupStore`] owns a single `SQLite` connection behind an
//! `Arc<Mutex<Connection>>`: a schema-version table gates migrations,
//! every write happens inside a
//! transaction, and every row stores its JSON payload as a canonical blob
//! alongside the columns needed to query it. Trait methods are `async` (per
//! `rollup_core::interfaces`) but the underlying work is synchronous `SQLite`
//! I/O, so every method hands its blocking body to
//! [`tokio::task::spawn_blocking`] rather than holding the mutex across an
//! await point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rollup_core::ExecutionId;
use rollup_core::ExternalObjectEntry;
use rollup_core::ExternalObjectFilter;
use rollup_core::ExternalObjectStore;
use rollup_core::ExternalObjectStoreError;
use rollup_core::Graph;
use rollup_core::MergedGraph;
use rollup_core::NodeId;
use rollup_core::ReferenceType;
use rollup_core::RepositoryId;
use rollup_core::RollupConfig;
use rollup_core::RollupStore;
use rollup_core::RollupStoreError;
use rollup_core::ScanGraphStore;
use rollup_core::ScanGraphStoreError;
use rollup_core::ScanId;
use rollup_core::TenantId;
use rollup_core::dead_letter::DeadLetterEntry;
use rollup_core::execution::ExecutionStatus;
use rollup_core::execution::RollupExecution;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default dead-letter queue cap per tenant (`spec.md` §4.G "DLQ is bounded
/// (default 1000 entries, oldest evicted)").
const DEFAULT_DEAD_LETTER_QUEUE_MAX_SIZE: usize = 1_000;
/// Default dead-letter retention window (`spec.md` §4.G "default 7-day
/// retention sweep").
const DEFAULT_DEAD_LETTER_RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite`-backed store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum dead-letter entries retained per tenant before the oldest are
    /// evicted (`spec.md` §6 `deadLetterQueueMaxSize`).
    #[serde(default = "default_dead_letter_queue_max_size")]
    pub dead_letter_queue_max_size: usize,
    /// Maximum age, in milliseconds, of a dead-letter entry before the
    /// retention sweep evicts it (`spec.md` §6 `deadLetterRetentionMs`).
    #[serde(default = "default_dead_letter_retention_ms")]
    pub dead_letter_retention_ms: u64,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default dead-letter queue cap per tenant.
const fn default_dead_letter_queue_max_size() -> usize {
    DEFAULT_DEAD_LETTER_QUEUE_MAX_SIZE
}

/// Returns the default dead-letter retention window in milliseconds.
const fn default_dead_letter_retention_ms() -> u64 {
    DEFAULT_DEAD_LETTER_RETENTION_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors, before being mapped to a specific collaborator
/// trait's error type.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row failed to deserialize, or its key columns disagree with
    /// its JSON payload.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid request data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// The blocking task the query ran on was cancelled or panicked.
    #[error("sqlite store task join error: {0}")]
    Join(String),
}

impl From<SqliteStoreError> for ScanGraphStoreError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Unavailable { message: error.to_string() }
    }
}

impl From<SqliteStoreError> for ExternalObjectStoreError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Unavailable { message: error.to_string() }
    }
}

impl From<SqliteStoreError> for RollupStoreError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Unavailable { message: error.to_string() }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of `ScanGraphStore`, `ExternalObjectStore`,
/// and `RollupStore`.
#[derive(Clone)]
pub struct SqliteRollupStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Maximum dead-letter entries retained per tenant.
    dead_letter_queue_max_size: usize,
    /// Maximum age, in milliseconds, of a dead-letter entry.
    dead_letter_retention_ms: u64,
}

impl SqliteRollupStore {
    /// Opens a `SQLite`-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            dead_letter_queue_max_size: config.dead_letter_queue_max_size,
            dead_letter_retention_ms: config.dead_letter_retention_ms,
        })
    }

    /// Opens an in-memory `SQLite`-backed store, useful for tests and CLI
    /// demo runs that do not need durability across process restarts.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the in-memory database cannot be
    /// initialized.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let mut connection = Connection::open_in_memory().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            dead_letter_queue_max_size: DEFAULT_DEAD_LETTER_QUEUE_MAX_SIZE,
            dead_letter_retention_ms: DEFAULT_DEAD_LETTER_RETENTION_MS,
        })
    }

    /// Seeds a repository's scan graph and marks it the latest scan for
    /// that repository (`spec.md` §6 `ScanGraphStore`: the trait only
    /// exposes reads and a merged-graph write, so ingestion of raw scan
    /// graphs is a store-specific operation used by whatever scanner
    /// integration feeds this store).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on backend failure.
    pub async fn put_graph(&self, tenant: TenantId, graph: Graph) -> Result<(), SqliteStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || insert_graph(&connection, tenant, &graph)).await
    }
}

#[async_trait]
impl ScanGraphStore for SqliteRollupStore {
    async fn get_latest_scan(&self, tenant: TenantId, repository_id: RepositoryId) -> Result<Option<ScanId>, ScanGraphStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || latest_scan_id(&connection, tenant, repository_id)).await.map_err(ScanGraphStoreError::from)
    }

    async fn get_graph(&self, tenant: TenantId, scan_id: ScanId) -> Result<Graph, ScanGraphStoreError> {
        let connection = Arc::clone(&self.connection);
        let graph = run_blocking(move || fetch_graph(&connection, tenant, scan_id)).await?;
        graph.ok_or(ScanGraphStoreError::GraphNotFound { scan_id })
    }

    async fn persist_merged_graph(&self, tenant: TenantId, execution_id: ExecutionId, merged_graph: &MergedGraph) -> Result<(), ScanGraphStoreError> {
        let connection = Arc::clone(&self.connection);
        let merged_graph = merged_graph.clone();
        run_blocking(move || insert_merged_graph(&connection, tenant, execution_id, &merged_graph)).await.map_err(ScanGraphStoreError::from)
    }
}

#[async_trait]
impl ExternalObjectStore for SqliteRollupStore {
    async fn save_entries(&self, entries: &[ExternalObjectEntry]) -> Result<usize, ExternalObjectStoreError> {
        let connection = Arc::clone(&self.connection);
        let entries = entries.to_vec();
        run_blocking(move || insert_external_objects(&connection, &entries)).await.map_err(ExternalObjectStoreError::from)
    }

    async fn find_by_external_id(&self, tenant: TenantId, external_id: &str, filter: &ExternalObjectFilter) -> Result<Vec<ExternalObjectEntry>, ExternalObjectStoreError> {
        if external_id.trim().is_empty() {
            return Err(ExternalObjectStoreError::InvalidQuery { message: "external_id must not be empty".to_string() });
        }
        let connection = Arc::clone(&self.connection);
        let normalized_id = external_id.to_string();
        let filter = filter.clone();
        run_blocking(move || query_by_normalized_id(&connection, tenant, &normalized_id, &filter)).await.map_err(ExternalObjectStoreError::from)
    }

    async fn find_by_node_id(&self, tenant: TenantId, node_id: NodeId, scan_id: ScanId) -> Result<Vec<ExternalObjectEntry>, ExternalObjectStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || query_by_node_id(&connection, tenant, node_id, scan_id)).await.map_err(ExternalObjectStoreError::from)
    }

    async fn delete_entries(&self, tenant: TenantId, filter: &ExternalObjectFilter) -> Result<usize, ExternalObjectStoreError> {
        let connection = Arc::clone(&self.connection);
        let filter = filter.clone();
        run_blocking(move || delete_external_objects(&connection, tenant, &filter)).await.map_err(ExternalObjectStoreError::from)
    }

    async fn count_entries(&self, tenant: TenantId) -> Result<u64, ExternalObjectStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || count_external_objects(&connection, tenant)).await.map_err(ExternalObjectStoreError::from)
    }

    async fn count_by_type(&self, tenant: TenantId) -> Result<BTreeMap<ReferenceType, u64>, ExternalObjectStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || count_external_objects_by_type(&connection, tenant)).await.map_err(ExternalObjectStoreError::from)
    }
}

#[async_trait]
impl RollupStore for SqliteRollupStore {
    async fn create_rollup(&self, rollup: RollupConfig) -> Result<RollupConfig, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || insert_rollup(&connection, rollup)).await.map_err(RollupStoreError::from)
    }

    async fn get_rollup(&self, tenant: TenantId, rollup_id: rollup_core::RollupId) -> Result<RollupConfig, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        let rollup = run_blocking(move || fetch_rollup(&connection, tenant, rollup_id)).await?;
        rollup.ok_or(RollupStoreError::RollupNotFound { rollup_id })
    }

    async fn update_rollup(&self, rollup: RollupConfig, expected_version: u64) -> Result<RollupConfig, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || replace_rollup(&connection, rollup, expected_version))
            .await
            .map_err(|err| RollupStoreError::from(SqliteStoreError::Join(err.to_string())))?
    }

    async fn delete_rollup(&self, tenant: TenantId, rollup_id: rollup_core::RollupId) -> Result<(), RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || remove_rollup(&connection, tenant, rollup_id)).await.map_err(RollupStoreError::from)
    }

    async fn list_rollups(&self, tenant: TenantId) -> Result<Vec<RollupConfig>, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || list_rollups_for_tenant(&connection, tenant)).await.map_err(RollupStoreError::from)
    }

    async fn list_active_executions(&self, tenant: TenantId) -> Result<Vec<RollupExecution>, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || list_executions_by_status(&connection, tenant, ExecutionStatus::Running)).await.map_err(RollupStoreError::from)
    }

    async fn put_execution(&self, execution: RollupExecution) -> Result<RollupExecution, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || upsert_execution(&connection, execution)).await.map_err(RollupStoreError::from)
    }

    async fn get_execution(&self, tenant: TenantId, execution_id: ExecutionId) -> Result<RollupExecution, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        let execution = run_blocking(move || fetch_execution(&connection, tenant, execution_id)).await?;
        execution.ok_or(RollupStoreError::ExecutionNotFound { execution_id })
    }

    async fn put_dead_letter(&self, entry: DeadLetterEntry) -> Result<DeadLetterEntry, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        let max_size = self.dead_letter_queue_max_size;
        let retention_ms = self.dead_letter_retention_ms;
        run_blocking(move || insert_dead_letter(&connection, entry, max_size, retention_ms)).await.map_err(RollupStoreError::from)
    }

    async fn list_dead_letters(&self, tenant: TenantId) -> Result<Vec<DeadLetterEntry>, RollupStoreError> {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || list_dead_letters_for_tenant(&connection, tenant)).await.map_err(RollupStoreError::from)
    }
}

// ============================================================================
// SECTION: Blocking Task Bridge
// ============================================================================

/// Runs a blocking `SQLite` closure on the blocking thread pool, mapping a
/// join failure (task panicked or was cancelled) to [`SqliteStoreError::Join`].
async fn run_blocking<F, T>(f: F) -> Result<T, SqliteStoreError>
where
    F: FnOnce() -> Result<T, SqliteStoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|err| SqliteStoreError::Join(err.to_string()))?
}

/// Locks the shared connection, mapping a poisoned mutex to
/// [`SqliteStoreError::Db`].
fn lock(connection: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
    connection.lock().map_err(|_| SqliteStoreError::Db("store mutex poisoned".to_string()))
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens a `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates an existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS scans (
                    tenant_id TEXT NOT NULL,
                    repository_id TEXT NOT NULL,
                    scan_id TEXT NOT NULL,
                    graph_json BLOB NOT NULL,
                    recorded_at INTEGER NOT NULL,
                    PRIMARY KEY (tenant_id, scan_id)
                );
                CREATE TABLE IF NOT EXISTS latest_scans (
                    tenant_id TEXT NOT NULL,
                    repository_id TEXT NOT NULL,
                    scan_id TEXT NOT NULL,
                    PRIMARY KEY (tenant_id, repository_id)
                );
                CREATE TABLE IF NOT EXISTS merged_graphs (
                    tenant_id TEXT NOT NULL,
                    execution_id TEXT NOT NULL,
                    graph_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, execution_id)
                );
                CREATE TABLE IF NOT EXISTS external_objects (
                    tenant_id TEXT NOT NULL,
                    id TEXT NOT NULL,
                    repository_id TEXT NOT NULL,
                    scan_id TEXT NOT NULL,
                    node_id TEXT NOT NULL,
                    normalized_id TEXT NOT NULL,
                    reference_type TEXT NOT NULL,
                    entry_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, id)
                );
                CREATE INDEX IF NOT EXISTS idx_external_objects_normalized
                    ON external_objects (tenant_id, normalized_id);
                CREATE INDEX IF NOT EXISTS idx_external_objects_node
                    ON external_objects (tenant_id, node_id, scan_id);
                CREATE TABLE IF NOT EXISTS rollups (
                    tenant_id TEXT NOT NULL,
                    rollup_id TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    config_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, rollup_id)
                );
                CREATE TABLE IF NOT EXISTS executions (
                    tenant_id TEXT NOT NULL,
                    execution_id TEXT NOT NULL,
                    rollup_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    execution_json BLOB NOT NULL,
                    PRIMARY KEY (tenant_id, execution_id)
                );
                CREATE INDEX IF NOT EXISTS idx_executions_status
                    ON executions (tenant_id, status);
                CREATE TABLE IF NOT EXISTS dead_letters (
                    tenant_id TEXT NOT NULL,
                    id TEXT NOT NULL,
                    execution_id TEXT NOT NULL,
                    rollup_id TEXT NOT NULL,
                    entry_json BLOB NOT NULL,
                    recorded_at INTEGER NOT NULL,
                    PRIMARY KEY (tenant_id, id)
                );
                CREATE INDEX IF NOT EXISTS idx_dead_letters_recorded_at
                    ON dead_letters (tenant_id, recorded_at);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Scan Graphs
// ============================================================================

fn insert_graph(connection: &Mutex<Connection>, tenant: TenantId, graph: &Graph) -> Result<(), SqliteStoreError> {
    let graph_json = serde_json::to_vec(graph).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let mut guard = lock(connection)?;
    let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute(
        "INSERT INTO scans (tenant_id, repository_id, scan_id, graph_json, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(tenant_id, scan_id) DO UPDATE SET graph_json = excluded.graph_json",
        params![tenant.to_string(), graph.repository_id.to_string(), graph.scan_id.to_string(), graph_json, unix_millis()],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute(
        "INSERT INTO latest_scans (tenant_id, repository_id, scan_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(tenant_id, repository_id) DO UPDATE SET scan_id = excluded.scan_id",
        params![tenant.to_string(), graph.repository_id.to_string(), graph.scan_id.to_string()],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    Ok(())
}

fn latest_scan_id(connection: &Mutex<Connection>, tenant: TenantId, repository_id: RepositoryId) -> Result<Option<ScanId>, SqliteStoreError> {
    let guard = lock(connection)?;
    let scan_id: Option<String> = guard
        .query_row(
            "SELECT scan_id FROM latest_scans WHERE tenant_id = ?1 AND repository_id = ?2",
            params![tenant.to_string(), repository_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    scan_id.map(|value| parse_uuid_id(&value, ScanId::from_uuid)).transpose()
}

fn fetch_graph(connection: &Mutex<Connection>, tenant: TenantId, scan_id: ScanId) -> Result<Option<Graph>, SqliteStoreError> {
    let guard = lock(connection)?;
    let bytes: Option<Vec<u8>> = guard
        .query_row(
            "SELECT graph_json FROM scans WHERE tenant_id = ?1 AND scan_id = ?2",
            params![tenant.to_string(), scan_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    let Some(bytes) = bytes else {
        return Ok(None);
    };
    let graph: Graph = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    if graph.scan_id != scan_id {
        return Err(SqliteStoreError::Corrupt(format!("scan_id mismatch for scan {scan_id}")));
    }
    Ok(Some(graph))
}

fn insert_merged_graph(connection: &Mutex<Connection>, tenant: TenantId, execution_id: ExecutionId, merged_graph: &MergedGraph) -> Result<(), SqliteStoreError> {
    let graph_json = serde_json::to_vec(merged_graph).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let guard = lock(connection)?;
    guard
        .execute(
            "INSERT INTO merged_graphs (tenant_id, execution_id, graph_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(tenant_id, execution_id) DO UPDATE SET graph_json = excluded.graph_json",
            params![tenant.to_string(), execution_id.to_string(), graph_json],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    Ok(())
}

// ============================================================================
// SECTION: External Objects
// ============================================================================

fn insert_external_objects(connection: &Mutex<Connection>, entries: &[ExternalObjectEntry]) -> Result<usize, SqliteStoreError> {
    let mut guard = lock(connection)?;
    let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut inserted = 0_usize;
    for entry in entries {
        let entry_json = serde_json::to_vec(entry).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        tx.execute(
            "INSERT INTO external_objects (
                tenant_id, id, repository_id, scan_id, node_id, normalized_id, reference_type, entry_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(tenant_id, id) DO UPDATE SET
                normalized_id = excluded.normalized_id,
                entry_json = excluded.entry_json",
            params![
                entry.tenant.to_string(),
                entry.id,
                entry.repository_id.to_string(),
                entry.scan_id.to_string(),
                entry.node_id.to_string(),
                entry.normalized_id,
                reference_type_label(entry.reference_type),
                entry_json,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        inserted += 1;
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    Ok(inserted)
}

fn query_by_normalized_id(
    connection: &Mutex<Connection>,
    tenant: TenantId,
    normalized_id: &str,
    filter: &ExternalObjectFilter,
) -> Result<Vec<ExternalObjectEntry>, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT entry_json FROM external_objects WHERE tenant_id = ?1 AND normalized_id = ?2")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params![tenant.to_string(), normalized_id], |row| row.get::<_, Vec<u8>>(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut entries = Vec::new();
    for row in rows {
        let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let entry: ExternalObjectEntry = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        if entry_matches_filter(&entry, filter) {
            entries.push(entry);
        }
    }
    drop(stmt);
    drop(guard);
    Ok(entries)
}

fn query_by_node_id(connection: &Mutex<Connection>, tenant: TenantId, node_id: NodeId, scan_id: ScanId) -> Result<Vec<ExternalObjectEntry>, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT entry_json FROM external_objects WHERE tenant_id = ?1 AND node_id = ?2 AND scan_id = ?3")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params![tenant.to_string(), node_id.to_string(), scan_id.to_string()], |row| row.get::<_, Vec<u8>>(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut entries = Vec::new();
    for row in rows {
        let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let entry: ExternalObjectEntry = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        entries.push(entry);
    }
    drop(stmt);
    drop(guard);
    Ok(entries)
}

fn delete_external_objects(connection: &Mutex<Connection>, tenant: TenantId, filter: &ExternalObjectFilter) -> Result<usize, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT id, entry_json FROM external_objects WHERE tenant_id = ?1")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params![tenant.to_string()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut to_delete = Vec::new();
    for row in rows {
        let (id, bytes) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let entry: ExternalObjectEntry = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        if entry_matches_filter(&entry, filter) {
            to_delete.push(id);
        }
    }
    drop(stmt);
    let mut deleted = 0_usize;
    for id in &to_delete {
        guard
            .execute("DELETE FROM external_objects WHERE tenant_id = ?1 AND id = ?2", params![tenant.to_string(), id])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        deleted += 1;
    }
    drop(guard);
    Ok(deleted)
}

fn count_external_objects(connection: &Mutex<Connection>, tenant: TenantId) -> Result<u64, SqliteStoreError> {
    let guard = lock(connection)?;
    let count: i64 = guard
        .query_row("SELECT COUNT(*) FROM external_objects WHERE tenant_id = ?1", params![tenant.to_string()], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    u64::try_from(count).map_err(|_| SqliteStoreError::Corrupt("negative external object count".to_string()))
}

fn count_external_objects_by_type(connection: &Mutex<Connection>, tenant: TenantId) -> Result<BTreeMap<ReferenceType, u64>, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT reference_type, COUNT(*) FROM external_objects WHERE tenant_id = ?1 GROUP BY reference_type")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params![tenant.to_string()], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut counts = BTreeMap::new();
    for row in rows {
        let (label, count) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let reference_type = parse_reference_type(&label)?;
        let count = u64::try_from(count).map_err(|_| SqliteStoreError::Corrupt("negative reference type count".to_string()))?;
        counts.insert(reference_type, count);
    }
    drop(stmt);
    drop(guard);
    Ok(counts)
}

fn entry_matches_filter(entry: &ExternalObjectEntry, filter: &ExternalObjectFilter) -> bool {
    if !filter.repository_ids.is_empty() && !filter.repository_ids.contains(&entry.repository_id) {
        return false;
    }
    if let Some(scan_id) = filter.scan_id {
        if entry.scan_id != scan_id {
            return false;
        }
    }
    if let Some(reference_type) = filter.reference_type {
        if entry.reference_type != reference_type {
            return false;
        }
    }
    true
}

const fn reference_type_label(reference_type: ReferenceType) -> &'static str {
    match reference_type {
        ReferenceType::Arn => "arn",
        ReferenceType::ResourceId => "resource_id",
        ReferenceType::K8sReference => "k8s_reference",
        ReferenceType::GcpResource => "gcp_resource",
        ReferenceType::AzureResource => "azure_resource",
    }
}

fn parse_reference_type(label: &str) -> Result<ReferenceType, SqliteStoreError> {
    match label {
        "arn" => Ok(ReferenceType::Arn),
        "resource_id" => Ok(ReferenceType::ResourceId),
        "k8s_reference" => Ok(ReferenceType::K8sReference),
        "gcp_resource" => Ok(ReferenceType::GcpResource),
        "azure_resource" => Ok(ReferenceType::AzureResource),
        other => Err(SqliteStoreError::Corrupt(format!("unknown reference_type column value: {other}"))),
    }
}

// ============================================================================
// SECTION: Rollups
// ============================================================================

fn insert_rollup(connection: &Mutex<Connection>, rollup: RollupConfig) -> Result<RollupConfig, SqliteStoreError> {
    let config_json = serde_json::to_vec(&rollup).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let guard = lock(connection)?;
    let result = guard.execute(
        "INSERT INTO rollups (tenant_id, rollup_id, version, config_json) VALUES (?1, ?2, ?3, ?4)",
        params![rollup.tenant.to_string(), rollup.rollup_id.to_string(), i64::try_from(rollup.version).unwrap_or(i64::MAX), config_json],
    );
    drop(guard);
    match result {
        Ok(_) => Ok(rollup),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(SqliteStoreError::Invalid(format!("rollup {} already exists", rollup.rollup_id)))
        }
        Err(err) => Err(SqliteStoreError::Db(err.to_string())),
    }
}

fn fetch_rollup(connection: &Mutex<Connection>, tenant: TenantId, rollup_id: rollup_core::RollupId) -> Result<Option<RollupConfig>, SqliteStoreError> {
    let guard = lock(connection)?;
    let bytes: Option<Vec<u8>> = guard
        .query_row(
            "SELECT config_json FROM rollups WHERE tenant_id = ?1 AND rollup_id = ?2",
            params![tenant.to_string(), rollup_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    let Some(bytes) = bytes else {
        return Ok(None);
    };
    let rollup: RollupConfig = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    if rollup.tenant != tenant || rollup.rollup_id != rollup_id {
        return Err(SqliteStoreError::Corrupt(format!("tenant/rollup_id mismatch for rollup {rollup_id}")));
    }
    Ok(Some(rollup))
}

fn replace_rollup(connection: &Mutex<Connection>, rollup: RollupConfig, expected_version: u64) -> Result<RollupConfig, RollupStoreError> {
    let config_json = serde_json::to_vec(&rollup).map_err(|err| RollupStoreError::from(SqliteStoreError::Invalid(err.to_string())))?;
    let mut guard = lock(connection).map_err(RollupStoreError::from)?;
    let tx = guard.transaction().map_err(|err| RollupStoreError::from(SqliteStoreError::Db(err.to_string())))?;
    let current_version: Option<i64> = tx
        .query_row(
            "SELECT version FROM rollups WHERE tenant_id = ?1 AND rollup_id = ?2",
            params![rollup.tenant.to_string(), rollup.rollup_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| RollupStoreError::from(SqliteStoreError::Db(err.to_string())))?;
    let Some(current_version) = current_version else {
        return Err(RollupStoreError::RollupNotFound { rollup_id: rollup.rollup_id });
    };
    let current_version = u64::try_from(current_version).unwrap_or(u64::MAX);
    if current_version != expected_version {
        return Err(RollupStoreError::VersionConflict { rollup_id: rollup.rollup_id, expected: expected_version, actual: current_version });
    }
    tx.execute(
        "UPDATE rollups SET version = ?1, config_json = ?2 WHERE tenant_id = ?3 AND rollup_id = ?4",
        params![i64::try_from(rollup.version).unwrap_or(i64::MAX), config_json, rollup.tenant.to_string(), rollup.rollup_id.to_string()],
    )
    .map_err(|err| RollupStoreError::from(SqliteStoreError::Db(err.to_string())))?;
    tx.commit().map_err(|err| RollupStoreError::from(SqliteStoreError::Db(err.to_string())))?;
    drop(guard);
    Ok(rollup)
}

fn remove_rollup(connection: &Mutex<Connection>, tenant: TenantId, rollup_id: rollup_core::RollupId) -> Result<(), SqliteStoreError> {
    let guard = lock(connection)?;
    guard
        .execute("DELETE FROM rollups WHERE tenant_id = ?1 AND rollup_id = ?2", params![tenant.to_string(), rollup_id.to_string()])
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    Ok(())
}

fn list_rollups_for_tenant(connection: &Mutex<Connection>, tenant: TenantId) -> Result<Vec<RollupConfig>, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT config_json FROM rollups WHERE tenant_id = ?1")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt.query_map(params![tenant.to_string()], |row| row.get::<_, Vec<u8>>(0)).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut rollups = Vec::new();
    for row in rows {
        let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rollup: RollupConfig = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        rollups.push(rollup);
    }
    drop(stmt);
    drop(guard);
    Ok(rollups)
}

// ============================================================================
// SECTION: Executions
// ============================================================================

fn upsert_execution(connection: &Mutex<Connection>, execution: RollupExecution) -> Result<RollupExecution, SqliteStoreError> {
    let execution_json = serde_json::to_vec(&execution).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let guard = lock(connection)?;
    guard
        .execute(
            "INSERT INTO executions (tenant_id, execution_id, rollup_id, status, execution_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(tenant_id, execution_id) DO UPDATE SET
                status = excluded.status,
                execution_json = excluded.execution_json",
            params![
                execution.tenant.to_string(),
                execution.execution_id.to_string(),
                execution.rollup_id.to_string(),
                execution_status_label(execution.status),
                execution_json,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    Ok(execution)
}

fn fetch_execution(connection: &Mutex<Connection>, tenant: TenantId, execution_id: ExecutionId) -> Result<Option<RollupExecution>, SqliteStoreError> {
    let guard = lock(connection)?;
    let bytes: Option<Vec<u8>> = guard
        .query_row(
            "SELECT execution_json FROM executions WHERE tenant_id = ?1 AND execution_id = ?2",
            params![tenant.to_string(), execution_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    let Some(bytes) = bytes else {
        return Ok(None);
    };
    let execution: RollupExecution = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    if execution.tenant != tenant || execution.execution_id != execution_id {
        return Err(SqliteStoreError::Corrupt(format!("tenant/execution_id mismatch for execution {execution_id}")));
    }
    Ok(Some(execution))
}

fn list_executions_by_status(connection: &Mutex<Connection>, tenant: TenantId, status: ExecutionStatus) -> Result<Vec<RollupExecution>, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT execution_json FROM executions WHERE tenant_id = ?1 AND status = ?2")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params![tenant.to_string(), execution_status_label(status)], |row| row.get::<_, Vec<u8>>(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut executions = Vec::new();
    for row in rows {
        let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let execution: RollupExecution = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        executions.push(execution);
    }
    drop(stmt);
    drop(guard);
    Ok(executions)
}

const fn execution_status_label(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Cancelled => "cancelled",
    }
}

// ============================================================================
// SECTION: Dead Letters
// ============================================================================

/// Inserts a dead-letter entry, then enforces `spec.md` §4.G's bounding:
/// a retention sweep deletes entries older than `retention_ms`, and an
/// eviction pass deletes the oldest entries beyond `max_size` remaining
/// entries for that tenant.
fn insert_dead_letter(connection: &Mutex<Connection>, entry: DeadLetterEntry, max_size: usize, retention_ms: u64) -> Result<DeadLetterEntry, SqliteStoreError> {
    let entry_json = serde_json::to_vec(&entry).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let tenant_id = entry.tenant.to_string();
    let recorded_at = unix_millis();
    let mut guard = lock(connection)?;
    let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute(
        "INSERT INTO dead_letters (tenant_id, id, execution_id, rollup_id, entry_json, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(tenant_id, id) DO UPDATE SET entry_json = excluded.entry_json, recorded_at = excluded.recorded_at",
        params![tenant_id, entry.id.as_str(), entry.execution_id.to_string(), entry.rollup_id.to_string(), entry_json, recorded_at],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

    let retention_ms = i64::try_from(retention_ms).unwrap_or(i64::MAX);
    let cutoff = recorded_at.saturating_sub(retention_ms);
    tx.execute("DELETE FROM dead_letters WHERE tenant_id = ?1 AND recorded_at < ?2", params![tenant_id, cutoff])
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

    let max_size = i64::try_from(max_size).unwrap_or(i64::MAX);
    tx.execute(
        "DELETE FROM dead_letters WHERE tenant_id = ?1 AND id NOT IN (
             SELECT id FROM dead_letters WHERE tenant_id = ?1 ORDER BY recorded_at DESC, id DESC LIMIT ?2
         )",
        params![tenant_id, max_size],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    drop(guard);
    Ok(entry)
}

fn list_dead_letters_for_tenant(connection: &Mutex<Connection>, tenant: TenantId) -> Result<Vec<DeadLetterEntry>, SqliteStoreError> {
    let guard = lock(connection)?;
    let mut stmt = guard
        .prepare("SELECT entry_json FROM dead_letters WHERE tenant_id = ?1")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = stmt.query_map(params![tenant.to_string()], |row| row.get::<_, Vec<u8>>(0)).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut entries = Vec::new();
    for row in rows {
        let bytes = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let entry: DeadLetterEntry = serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        entries.push(entry);
    }
    drop(stmt);
    drop(guard);
    Ok(entries)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Parses a stored UUID-backed identifier column, failing closed on
/// corruption rather than panicking.
fn parse_uuid_id<T>(raw: &str, wrap: impl FnOnce(uuid::Uuid) -> T) -> Result<T, SqliteStoreError> {
    let id = raw.parse::<uuid::Uuid>().map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    Ok(wrap(id))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use rollup_core::ConflictResolution;
    use rollup_core::GraphEdge;
    use rollup_core::GraphNode;
    use rollup_core::MergeOptions;
    use rollup_core::RollupId;
    use rollup_core::RollupStatus;
    use rollup_core::Timestamp;
    use rollup_core::dead_letter::DlqStatus;
    use rollup_core::execution::ExecutionPhase;
    use rollup_core::execution::ExecutionProgress;

    use super::*;

    fn now() -> Timestamp {
        Timestamp::new(chrono::Utc::now())
    }

    fn sample_rollup(tenant: TenantId) -> RollupConfig {
        RollupConfig {
            rollup_id: RollupId::new(),
            tenant,
            name: "cross-account-lambdas".to_string(),
            description: None,
            created_by: "tester".to_string(),
            updated_by: "tester".to_string(),
            repository_ids: vec![RepositoryId::new(), RepositoryId::new()],
            matchers: Vec::new(),
            merge_options: MergeOptions { conflict_resolution: ConflictResolution::Union, preserve_source_info: true, create_cross_repo_edges: true, max_nodes: 1_000 },
            schedule: None,
            status: RollupStatus::Draft,
            version: 1,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn create_get_update_and_delete_round_trip_a_rollup() {
        let store = SqliteRollupStore::open_in_memory().expect("open store");
        let tenant = TenantId::new();
        let created = store.create_rollup(sample_rollup(tenant)).await.expect("create");

        let fetched = store.get_rollup(tenant, created.rollup_id).await.expect("get");
        assert_eq!(fetched.name, "cross-account-lambdas");

        let mut updated = fetched;
        updated.status = RollupStatus::Active;
        updated.version = 2;
        let saved = store.update_rollup(updated, 1).await.expect("update");
        assert_eq!(saved.status, RollupStatus::Active);

        let stale = store.get_rollup(tenant, created.rollup_id).await.expect("get after update");
        let conflict = store.update_rollup(stale, 1).await;
        assert!(matches!(conflict, Err(RollupStoreError::VersionConflict { .. })));

        store.delete_rollup(tenant, created.rollup_id).await.expect("delete");
        let missing = store.get_rollup(tenant, created.rollup_id).await;
        assert!(matches!(missing, Err(RollupStoreError::RollupNotFound { .. })));
    }

    #[tokio::test]
    async fn list_active_executions_filters_by_status() {
        let store = SqliteRollupStore::open_in_memory().expect("open store");
        let tenant = TenantId::new();
        let rollup_id = RollupId::new();
        let running = RollupExecution {
            execution_id: ExecutionId::new(),
            rollup_id,
            tenant,
            status: ExecutionStatus::Running,
            current_phase: Some(ExecutionPhase::Match),
            progress: ExecutionProgress::zero(),
            checkpoints: Vec::new(),
            retry_count: 0,
            last_error: None,
            triggered_by_schedule: false,
            started_at: now(),
            finished_at: None,
        };
        let mut completed = running.clone();
        completed.execution_id = ExecutionId::new();
        completed.status = ExecutionStatus::Completed;
        completed.finished_at = Some(now());

        store.put_execution(running.clone()).await.expect("put running");
        store.put_execution(completed).await.expect("put completed");

        let active = store.list_active_executions(tenant).await.expect("list active");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].execution_id, running.execution_id);
    }

    #[tokio::test]
    async fn dead_letter_entries_round_trip() {
        let store = SqliteRollupStore::open_in_memory().expect("open store");
        let tenant = TenantId::new();
        let entry = DeadLetterEntry {
            id: rollup_core::DeadLetterId::new(1_700_000_000_000, "abc123def"),
            execution_id: ExecutionId::new(),
            rollup_id: RollupId::new(),
            tenant,
            phase: ExecutionPhase::Store,
            error_message: "scan store unavailable".to_string(),
            attempts: 3,
            status: DlqStatus::Pending,
            created_at: now(),
            updated_at: now(),
        };
        store.put_dead_letter(entry.clone()).await.expect("put dead letter");
        let listed = store.list_dead_letters(tenant).await.expect("list dead letters");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, entry.id);
    }

    #[tokio::test]
    async fn scan_graph_round_trips_and_tracks_the_latest_scan() {
        let store = SqliteRollupStore::open_in_memory().expect("open store");
        let tenant = TenantId::new();
        let repository_id = RepositoryId::new();
        let node_id = NodeId::new();
        let mut nodes = Map::new();
        nodes.insert(
            node_id,
            GraphNode { id: node_id, node_type: "aws_lambda_function".to_string(), name: "billing-worker".to_string(), file: "main.tf".to_string(), line_start: 1, line_end: 4, attributes: Map::new() },
        );
        let scan_id = ScanId::new();
        let graph = Graph { repository_id, scan_id, nodes, edges: vec![GraphEdge { from: node_id, to: node_id, kind: "self" }], metadata: Map::new() };

        store.put_graph(tenant, graph.clone()).await.expect("put graph");
        let latest = store.get_latest_scan(tenant, repository_id).await.expect("get latest").expect("latest present");
        assert_eq!(latest, scan_id);
        let fetched = store.get_graph(tenant, scan_id).await.expect("get graph");
        assert_eq!(fetched, graph);
    }

    #[tokio::test]
    async fn external_object_lookup_is_scoped_by_tenant_and_filter() {
        let store = SqliteRollupStore::open_in_memory().expect("open store");
        let tenant = TenantId::new();
        let repository_id = RepositoryId::new();
        let scan_id = ScanId::new();
        let node_id = NodeId::new();
        let entry = ExternalObjectEntry {
            id: "eoe-1".to_string(),
            external_id: "arn:aws:lambda:us-east-1:123456789012:function:billing-worker".to_string(),
            reference_type: ReferenceType::Arn,
            normalized_id: "arn:aws:lambda:*:123456789012:function:billing-worker".to_string(),
            tenant,
            repository_id,
            scan_id,
            node_id,
            node_name: "billing-worker".to_string(),
            node_type: "aws_lambda_function".to_string(),
            file_path: "main.tf".to_string(),
            components: Map::new(),
            metadata: Map::new(),
            indexed_at: now(),
        };
        store.save_entries(std::slice::from_ref(&entry)).await.expect("save entries");

        let filter = ExternalObjectFilter::default();
        let found = store.find_by_external_id(tenant, &entry.normalized_id, &filter).await.expect("find by external id");
        assert_eq!(found.len(), 1);

        let by_node = store.find_by_node_id(tenant, node_id, scan_id).await.expect("find by node id");
        assert_eq!(by_node.len(), 1);

        assert_eq!(store.count_entries(tenant).await.expect("count"), 1);
        let by_type = store.count_by_type(tenant).await.expect("count by type");
        assert_eq!(by_type.get(&ReferenceType::Arn), Some(&1));

        let deleted = store.delete_entries(tenant, &ExternalObjectFilter { repository_ids: vec![repository_id], ..ExternalObjectFilter::default() }).await.expect("delete");
        assert_eq!(deleted, 1);
        assert_eq!(store.count_entries(tenant).await.expect("count after delete"), 0);
    }
}
