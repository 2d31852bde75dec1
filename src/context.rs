//! Request-scoped value bag that can carry a database handle.
//!
//! Prefer passing a [`Database`] explicitly. A `Context` is for the outermost
//! request boundary, where a host framework hands one bag of values to each handler.
use crate::core::{DbError, Result};
use crate::core::db::Database;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable map from value type to value. Deriving a child copies the parent's
/// entries; the parent is never modified.
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

/// Private key under which the handle is stored.
#[derive(Clone)]
struct DatabaseKey(Database);

impl Context {
    /// Empty root context
    pub fn background() -> Self {
        Context::default()
    }

    /// Derives a context carrying `value`. A value of the same type already present is replaced.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values = HashMap::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Context {
            values: Arc::new(values),
        }
    }

    /// Looks up the value of type `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Derives a context carrying an existing handle.
    pub fn with_database(&self, db: Database) -> Self {
        self.with_value(DatabaseKey(db))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values.len())
            .field("has_database", &from_context(self).is_some())
            .finish()
    }
}

/// Opens a handle and returns a child of `parent` carrying it.
///
/// # Errors
///
/// Returns `DbError::Connection` if the handle cannot be opened; `parent` is unaffected.
pub fn attach_to_context(parent: &Context, driver: &str, source: &str, prefix: &str) -> Result<Context> {
    let db = Database::new(driver, source, prefix)?;
    Ok(parent.with_database(db))
}

/// Handle carried by `ctx`, if any.
pub fn from_context(ctx: &Context) -> Option<Database> {
    ctx.value::<DatabaseKey>().map(|key| key.0.clone())
}

/// Handle carried by `ctx`, or `DbError::NoHandle`.
pub fn must_from_context(ctx: &Context) -> Result<Database> {
    from_context(ctx).ok_or(DbError::NoHandle)
}
