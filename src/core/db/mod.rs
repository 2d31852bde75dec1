/// Database Module
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): driver selection, open + ping, handle construction
/// - **Query Execution** (`query.rs`): prefix rewriting, execution and row materialisation
///
/// All operations report through `DbError` and honour the handle's `FailurePolicy`.
pub mod connection;
pub mod query;

pub use connection::*;
pub use query::*;
