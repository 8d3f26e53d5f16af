#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub(crate) mod sql;

pub mod memory;

use async_trait::async_trait;

pub use memory::MemoryAdapter;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAdapter;

use crate::{error::Error, query::Select};

/// A fetched row: column name → value, JSON columns decoded in place.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// -----------------------------
/// Adapter contract
/// -----------------------------

#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Rows matching the plan's predicates, in its order and window.
    async fn fetch(&self, select: &Select) -> Result<Vec<Record>, Error>;

    /// Number of rows matching the plan's predicates. Orderings and the
    /// window are ignored.
    async fn count(&self, select: &Select) -> Result<u64, Error>;
}
