//! Tests for `SqliteStore` and the managers running on top of it, against an
//! in-memory database.

mod comments;
mod engagement;

use std::sync::Arc;

use sitedir_core::{
  engagement::NewTarget,
  service::{Engine, EngineConfig, NotificationConfig, RetryPolicy},
  user::UserProfile,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Managers with inline notification delivery, so a test can read the inbox
/// as soon as the operation returns.
async fn engine() -> Engine<SqliteStore> {
  let config = EngineConfig {
    retry:         RetryPolicy::once(),
    notifications: NotificationConfig { background: false },
  };
  Engine::new(Arc::new(store().await), config)
}

async fn add_user(engine: &Engine<SqliteStore>, user_id: &str, name: &str) {
  engine
    .put_user_profile(UserProfile {
      user_id:      user_id.into(),
      display_name: name.into(),
      photo_url:    None,
    })
    .await
    .unwrap();
}

async fn add_site(engine: &Engine<SqliteStore>, target_id: &str, owner_id: &str) {
  engine
    .counters
    .register_target(NewTarget {
      target_id: target_id.into(),
      owner_id:  owner_id.into(),
      title:     format!("Site {target_id}"),
      url:       format!("https://{target_id}.example"),
    })
    .await
    .unwrap();
}

/// Every cached aggregate matches a recount of its source rows.
async fn assert_consistent(engine: &Engine<SqliteStore>) {
  let report = engine.store().reconcile().await.unwrap();
  assert!(report.is_clean(), "aggregates drifted: {report:?}");
}
