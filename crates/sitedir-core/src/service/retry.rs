//! Bounded exponential backoff for store calls.

use std::{future::Future, time::Duration};

use serde::Deserialize;

use crate::store::StoreError;

/// How often, and how patiently, an idempotent store call is retried when the
/// backend reports itself unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero behaves like one.
  pub max_attempts:  u32,
  /// Delay after the first failure; doubled after each further failure.
  pub base_delay_ms: u64,
  pub max_delay_ms:  u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:  3,
      base_delay_ms: 50,
      max_delay_ms:  1_000,
    }
  }
}

impl RetryPolicy {
  /// A single attempt, no retries.
  pub fn once() -> Self {
    Self { max_attempts: 1, ..Self::default() }
  }

  /// Delay before attempt `failed + 1`, given `failed` failures so far.
  pub fn delay_after(&self, failed: u32) -> Duration {
    let shift = failed.saturating_sub(1).min(16);
    let ms = self
      .base_delay_ms
      .saturating_mul(1u64 << shift)
      .min(self.max_delay_ms);
    Duration::from_millis(ms)
  }

  /// Run `call` until it succeeds, fails with a non-transient error, or the
  /// attempt budget is spent.
  ///
  /// Only pass calls that are safe to repeat: reads, or writes guarded by an
  /// existence check or dedup key.
  pub async fn run<T, E, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, E>
  where
    E: StoreError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut failed = 0;
    loop {
      match call().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_unavailable() && failed + 1 < max_attempts => {
          failed += 1;
          let delay = self.delay_after(failed);
          tracing::warn!(
            op,
            attempt = failed,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "store unavailable, retrying"
          );
          tokio::time::sleep(delay).await;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use thiserror::Error;

  use super::*;

  #[derive(Debug, Error)]
  enum FakeError {
    #[error("busy")]
    Busy,
    #[error("broken")]
    Broken,
  }

  impl StoreError for FakeError {
    fn is_unavailable(&self) -> bool { matches!(self, Self::Busy) }
  }

  fn fast() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, base_delay_ms: 1, max_delay_ms: 4 }
  }

  #[test]
  fn delays_double_and_cap() {
    let policy = RetryPolicy { max_attempts: 5, base_delay_ms: 50, max_delay_ms: 120 };
    assert_eq!(policy.delay_after(1), Duration::from_millis(50));
    assert_eq!(policy.delay_after(2), Duration::from_millis(100));
    assert_eq!(policy.delay_after(3), Duration::from_millis(120));
  }

  #[tokio::test]
  async fn transient_failure_is_retried_until_success() {
    let calls = AtomicU32::new(0);
    let result = fast()
      .run("test", || async {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(FakeError::Busy)
        } else {
          Ok(7)
        }
      })
      .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_max_attempts() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = fast()
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(FakeError::Busy)
      })
      .await;
    assert!(matches!(result, Err(FakeError::Busy)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn permanent_failure_is_not_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = fast()
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(FakeError::Broken)
      })
      .await;
    assert!(matches!(result, Err(FakeError::Broken)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn once_never_retries() {
    let calls = AtomicU32::new(0);
    let _: Result<(), _> = RetryPolicy::once()
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(FakeError::Busy)
      })
      .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
