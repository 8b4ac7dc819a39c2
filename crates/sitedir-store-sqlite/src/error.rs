//! Error type for `sitedir-store-sqlite`.

use rusqlite::ErrorCode;
use sitedir_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its expected domain.
  #[error("decode error: {0}")]
  Decode(String),
}

impl StoreError for Error {
  fn is_unavailable(&self) -> bool {
    match self {
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
      Error::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(e, _),
      )) => matches!(
        e.code,
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
      ),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  fn sqlite_failure(code: std::os::raw::c_int) -> Error {
    Error::Database(tokio_rusqlite::Error::Rusqlite(
      rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None),
    ))
  }

  #[test]
  fn busy_and_closed_are_transient() {
    assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_unavailable());
    assert!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).is_unavailable());
    assert!(Error::Database(tokio_rusqlite::Error::ConnectionClosed).is_unavailable());
  }

  #[test]
  fn constraint_and_decode_errors_are_permanent() {
    assert!(!sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).is_unavailable());
    assert!(!Error::Decode("bad".into()).is_unavailable());
  }
}
