// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod context;
pub mod policy;
pub mod rewrite;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{Database, DatabaseBuilder, Driver, ExecResult, Row};
pub use crate::core::{DbError, Result};
pub use crate::policy::{FailurePolicy, OrAbort};
