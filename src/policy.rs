//! Failure policy: whether database faults are returned or abort the caller.
use crate::core::{DbError, Result};
use serde::Deserialize;
use tracing::error;

/// How a handle reports a failed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Every fallible operation returns `Err`.
    #[default]
    ReturnError,
    /// A failed operation panics with the error message instead of returning `Err`.
    FailFast,
}

impl FailurePolicy {
    /// Passes `result` through unchanged, or panics on `Err` under `FailFast`.
    #[track_caller]
    pub fn enforce<T>(self, result: Result<T>) -> Result<T> {
        match (self, result) {
            (FailurePolicy::FailFast, Err(e)) => abort(e),
            (_, result) => result,
        }
    }
}

/// Call-site adapter turning a returned error into a panic.
///
/// ```ignore
/// let users = db.query("SELECT * FROM #__users", []).or_abort();
/// ```
pub trait OrAbort<T> {
    fn or_abort(self) -> T;
}

impl<T> OrAbort<T> for Result<T> {
    #[track_caller]
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => abort(e),
        }
    }
}

#[track_caller]
fn abort(e: DbError) -> ! {
    error!("Unrecoverable database failure: {}", e);
    panic!("database failure: {}", e)
}
