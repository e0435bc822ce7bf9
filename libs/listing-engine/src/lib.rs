//! Listing engine: turns a caller's filter/sort/page request into a bounded,
//! deterministic store query and the store's records back into a page.
//!
//! The pieces, leaves first:
//! - [`ConditionBuilder`] compiles raw filter parameters into a `FilterExpr`
//! - [`SortResolver`] validates sort fields and appends the tie-breaker
//! - [`OffsetPaginator`] and [`CursorPaginator`] plan the fetch window
//! - [`QueryExecutor`] is the port to the backing store
//! - [`ResultAssembler`] builds the response envelopes
//! - [`FacetCache`] serves facet counts single-flight with a TTL
//!
//! [`ListingEngine`] wires them together per resource.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use listing_core::{FieldAccess, ListRequest, PageRequest, SortKey, Value};
//! use listing_engine::{EngineConfig, FieldKind, ListingEngine, MemoryExecutor, ResourceSchema};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Clone)]
//! struct Book { id: i64, title: String }
//!
//! impl FieldAccess for Book {
//!     fn field(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "id" => Some(Value::I64(self.id)),
//!             "title" => Some(Value::String(self.title.clone())),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! # async fn run() -> Result<(), listing_core::Error> {
//! let schema = ResourceSchema::new("books", "id", FieldKind::I64)
//!     .sortable("title", FieldKind::String)
//!     .search("q", ["title"])
//!     .default_sort(vec![SortKey::asc("title")]);
//! let executor = Arc::new(MemoryExecutor::new(vec![Book { id: 1, title: "Dune".into() }]));
//! let engine = ListingEngine::new(schema, EngineConfig::default(), executor);
//!
//! let req = ListRequest::new(PageRequest::first(10)).with_filter("q", "dun");
//! let page = engine.list(&req, &CancellationToken::new()).await?;
//! assert_eq!(page.items().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod condition;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod executor;
pub mod facet;
pub mod filter_hash;
pub mod memory;
pub mod offset;
pub mod schema;
pub mod sort;

pub use assemble::ResultAssembler;
pub use condition::{escape_like, escape_regex, ConditionBuilder};
pub use config::{EngineConfig, TextPolicy, HARD_MAX_PAGE_SIZE, TEXT_MAX_LEN_CEILING, TEXT_MIN_LEN_FLOOR};
pub use cursor::{CursorPaginator, CursorPlan, CursorPredicate};
pub use engine::{ListingEngine, MAX_SUGGESTIONS};
pub use executor::{QueryContext, QueryExecutor, StoreError, StoreQuery, StoreResult, Window};
pub use facet::{CacheStore, FacetCache, MemoryCacheStore};
pub use filter_hash::short_filter_hash;
pub use memory::MemoryExecutor;
pub use offset::{OffsetPaginator, OffsetPlan, OffsetWindow};
pub use schema::{BoundsPolicy, FieldKind, FilterSpec, NumericBounds, ResourceSchema, SearchSpec};
pub use sort::SortResolver;
