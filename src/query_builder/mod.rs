//! # Query Builder System
//!
//! Declarative query construction rendered to parameterized PostgreSQL.
//!
//! ## Overview
//!
//! A [`Query`] accumulates a table, conditions, select fields, sorts, group-bys,
//! pagination and insert/update data, then renders SQL text together with an ordered
//! list of [`BindValue`]s. Rendering is two-phase: every value position is first
//! emitted as the intermediate token `{?}`, and a single left-to-right pass then
//! numbers them `$1, $2, ...`. Bind parameters are collected in the same traversal
//! order (select fields first, then conditions), so placeholder `$n` always lines up
//! with the n-th bind value.
//!
//! ## Render Modes
//!
//! - [`QueryKind::Relational`] - field names are used verbatim as column references
//! - [`QueryKind::Document`] - dotted names navigate the JSONB `data` column:
//!   `a.b.c` renders as `data->'a'->'b'->>'c'`
//!
//! ## Key Components
//!
//! - [`builder`] - The [`Query`] accumulator and its renderers
//! - [`conditions`] - WHERE predicates and OR-groups
//! - [`fields`] - Select, inner-query, sort and group-by fields plus path rendering
//! - [`functions`] - Field functions wrapping rendered expressions
//! - [`bind`] - Typed bind parameters and sqlx binding
//! - [`pagination`] - LIMIT/OFFSET rendering
//!
//! ## Example Usage
//!
//! ```rust
//! use qtm::query_builder::{Operator, Query, WhereField};
//!
//! let query = Query::document("tasks")
//!     .add_condition("task_id", "1a2b")
//!     .add_condition_object(WhereField::new("tags", Operator::Exists, vec!["a", "b"]))
//!     .set_limit(10);
//!
//! assert_eq!(
//!     query.get_select_query(true),
//!     "SELECT  *  FROM tasks WHERE (data->>'task_id') =  $1  AND (data->'tags') ? array[$2,$3] LIMIT 10"
//! );
//! assert_eq!(query.get_bind_params().len(), 3);
//! ```

pub mod bind;
pub mod builder;
pub mod conditions;
pub mod fields;
pub mod functions;
pub mod pagination;

pub use bind::{bind_params, BindValue};
pub use builder::{number_placeholders, Query, QueryKind};
pub use conditions::{Condition, Criteria, Operator, WhereField};
pub use fields::{document_path, FieldType, GroupByField, InnerQuery, Selection, SelectField, SortDirection, SortField};
pub use functions::FieldFunction;
pub use pagination::Pagination;
