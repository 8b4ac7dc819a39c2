//! SQLite backend for the sitedir engagement store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutating operation runs in one
//! `BEGIN IMMEDIATE` transaction, which takes the write lock up front so the
//! read-check and the write it guards cannot interleave with another writer.

mod encode;
mod reconcile;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use reconcile::ReconcileReport;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
