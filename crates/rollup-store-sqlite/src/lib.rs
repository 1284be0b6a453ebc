// crates/rollup-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Store Adapter
// Description: spec.md §6 concrete collaborator implementation backed by
//              SQLite.
// Purpose: Provide a durable, single-process reference implementation of
//          ScanGraphStore, ExternalObjectStore, and RollupStore so the
//          engine can run against real persistence without a separate
//          database service.
// Dependencies: rollup-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a `SQLite`-backed implementation of every
//! persistence-facing collaborator trait in `rollup_core::interfaces`:
//! [`store::SqliteRollupStore`] implements `ScanGraphStore`,
//! `ExternalObjectStore`, and `RollupStore` against one shared connection:
//! a single struct behind an `Arc<Mutex<Connection>>` with one
//! schema-version table governing migrations. Security posture: database
//! contents are untrusted input on
//! every load; loads that fail to deserialize or that carry a tenant/id
//! mismatch between key and payload fail closed rather than returning
//! partial data.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteRollupStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
