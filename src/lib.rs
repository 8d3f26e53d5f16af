//! # Filterables
//!
//! Bounded filtering, sorting and pagination for untrusted query parameters.
//!
//! A caller describes which rows it wants with a small JSON filter language,
//! an ordered list of sort tokens and a page window. Filterables checks every
//! path against the declared data model, turns the expression into a plan of
//! typed predicates and runs it through a storage adapter, returning the page
//! together with the total number of matching rows.
//!
//! ```rust,ignore
//! use filterables::{Engine, Filterable, Filters, Paginator, adapters::SqliteAdapter};
//!
//! #[derive(Filterable)]
//! #[filterable(table = "people")]
//! struct Person {
//!     id: i64,
//!     age: i32,
//!     name: String,
//!     #[filterable(nested)]
//!     data: serde_json::Value,
//! }
//!
//! let engine = Engine::new(Box::new(SqliteAdapter::from_pool(pool)));
//!
//! let filters = Filters::parse(r#"{"age": {"$gt": 18, "$lt": 35}, "data.city": {"$eq": "Oslo"}}"#)?;
//! let paginator = Paginator::default().sort_by(["age:desc"]);
//!
//! let page = engine.paginate::<Person>(&paginator, Some(&filters)).await?;
//! println!("{} matching, showing {}", page.count(), page.results().len());
//! ```
//!
//! ## Filter operators
//!
//! | Operator  | Value             | Matches                                  |
//! |-----------|-------------------|------------------------------------------|
//! | `$eq`     | scalar            | equal                                    |
//! | `$ne`     | scalar            | not equal                                |
//! | `$in`     | array of scalars  | any of                                   |
//! | `$nin`    | array of scalars  | none of                                  |
//! | `$gt`     | number or string  | greater than                             |
//! | `$lt`     | number or string  | less than                                |
//! | `$has`    | boolean           | present and not null (or the reverse)    |
//! | `$like`   | string pattern    | case-insensitive `LIKE` (`%`, `_`)       |
//! | `$unlike` | string pattern    | negated `$like`                          |
//!
//! `$gt` and `$lt` on the same path form an exclusive range.
//!
//! ## Sorting
//!
//! Sort tokens look like `field[:asc|desc]`; `_pk` sorts by the primary key.
//! Extra strategies implement [`Sorter`] and are registered on the engine
//! through [`Sorters::with`]. Tokens nobody recognises are dropped.
//!
//! ## Feature flags
//!
//! | Flag       | Default | Description                        |
//! |------------|---------|------------------------------------|
//! | `derive`   | ✓       | `#[derive(Filterable)]`            |
//! | `postgres` | ✓       | PostgreSQL adapter via sqlx        |
//! | `sqlite`   | ✓       | SQLite adapter (in-memory or file) |
//!

extern crate self as filterables;

pub mod adapters;
pub mod error;
pub mod filters;
pub mod model;
pub mod pages;
pub mod query;
pub mod sorters;

use std::sync::Arc;

pub use crate::adapters::{Adapter, MemoryAdapter, Record};
pub use crate::error::Error;
pub use crate::filters::{Filters, Operator, OperatorSet};
pub use crate::model::{Field, FieldKind, Filterable, Model, Operand};
pub use crate::pages::{Pagination, Paginator};
pub use crate::query::{Comparison, Direction, Literal, Ordering, Predicate, Select};
pub use crate::sorters::{PrimaryKeySorter, SimpleSorter, Sorter, Sorters};

#[cfg(feature = "derive")]
pub use filterables_derive::*;

/// The Engine owns a storage adapter and the sort strategies used to run
/// paginated queries. Cloning is cheap.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Session>,
}

struct Session {
    adapter: Box<dyn Adapter>,
    sorters: Sorters,
}

impl Engine {
    pub fn new(adapter: Box<dyn Adapter>) -> Self {
        Self::with_sorters(adapter, Sorters::default())
    }

    /// Use a custom strategy registry, e.g. `Sorters::default().with(MySorter)`.
    pub fn with_sorters(adapter: Box<dyn Adapter>, sorters: Sorters) -> Self {
        Self {
            inner: Arc::new(Session { adapter, sorters }),
        }
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.inner.adapter.as_ref()
    }

    pub fn sorters(&self) -> &Sorters {
        &self.inner.sorters
    }

    /// Paginate every row of `M`, optionally filtered.
    pub async fn paginate<M: Filterable>(
        &self,
        paginator: &Paginator,
        filters: Option<&Filters>,
    ) -> Result<Pagination, Error> {
        paginator
            .exec(self, Select::from_model::<M>(), filters)
            .await
    }

    /// Number of rows of `M` matching `filters`.
    pub async fn count<M: Filterable>(&self, filters: Option<&Filters>) -> Result<u64, Error> {
        let select = Select::from_model::<M>();
        let select = match filters {
            Some(filters) => filters.bind(select)?,
            None => select,
        };
        self.adapter().count(&select).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Person;
    use serde_json::json;

    #[tokio::test]
    async fn test_engine_count() {
        let adapter = MemoryAdapter::new();
        adapter
            .insert_all(
                "people",
                [
                    json!({"id": 1, "age": 20}),
                    json!({"id": 2, "age": 40}),
                    json!({"id": 3}),
                ],
            )
            .await
            .unwrap();

        let engine = Engine::new(Box::new(adapter));
        let filters = Filters::new().with("age", "$has", json!(true));

        assert_eq!(engine.count::<Person>(None).await.unwrap(), 3);
        assert_eq!(engine.count::<Person>(Some(&filters)).await.unwrap(), 2);
        assert_eq!(engine.clone().sorters().len(), 2);
    }
}
