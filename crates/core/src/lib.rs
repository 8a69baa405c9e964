//! Tenvault schema and transformation core.
//!
//! Declares what a tenant backup contains and how restored rows are
//! rewritten:
//!
//! - [`registry::SchemaRegistry`] holds every module's tables, relations and
//!   hooks, validated once and ordered parents first.
//! - [`transform::ColumnTransformer`] remaps keys, composite references and
//!   identities through a restore session's [`mapper::ColumnMapper`].
//! - [`store::TenantStore`] is the seam the executor reads and writes rows
//!   through.

pub mod error;
pub mod helpers;
pub mod hooks;
pub mod mapper;
pub mod modules;
pub mod registry;
pub mod relation;
pub mod retry;
pub mod row;
pub mod schema;
pub mod store;
pub mod task;
pub mod transform;
pub mod types;
pub mod value;

pub use error::{CoreError, SchemaError};
pub use registry::{ModuleSpecifics, SchemaRegistry};
pub use row::DataRowInfo;
pub use value::ColumnValue;
