//! # pgqb
//!
//! An immutable, chainable PostgreSQL query builder that compiles to parameterized SQL.
//!
//! ## Features
//!
//! - **Immutable handles**: every builder call returns a new [`Query`]; bases are reusable
//! - **Parameterized output**: values are always bound as `$n`, identifiers always quoted
//! - **Whole statements**: SELECT, INSERT, UPDATE, DELETE, COPY, TRUNCATE, column info
//! - **Composable**: sub-queries, joins, CTEs, unions and window functions share one parameter list
//! - **Nested writes**: insert related rows through declared relations, in the right order
//! - **Safe defaults**: UPDATE and DELETE require a WHERE or an explicit `all()`
//!
//! ## Example
//!
//! ```ignore
//! use pgqb::{ColumnDef, ColumnType, ConditionNode, Data, Db, DbConfig, TableSchema};
//!
//! let db = Db::new(
//!     vec![TableSchema::new("user")
//!         .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
//!         .column(ColumnDef::new("name", ColumnType::Text))],
//!     DbConfig::new(),
//! )?;
//! let users = db.table("user")?;
//!
//! // Preview without running anything.
//! let sql = users.where_(ConditionNode::eq("name", "alice")?).to_sql()?;
//! assert_eq!(sql.text, r#"SELECT "user".* FROM "user" WHERE "user"."name" = $1"#);
//!
//! // Run through any `Adapter`, e.g. a `tokio_postgres::Client`.
//! let id = users
//!     .get("id")?
//!     .insert(Data::new().set("name", "bob"))?
//!     .exec(&client)
//!     .await?
//!     .value()?;
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod exec;
pub mod ident;
pub mod monitor;
pub mod qb;
pub mod schema;
pub mod value;

pub use client::{Adapter, QueryResult, Record};
pub use config::{DbConfig, NoPrimaryKey};
pub use db::Db;
pub use error::{OrmError, OrmResult};
pub use exec::QueryOutput;
pub use monitor::LogConfig;
pub use schema::{ColumnDef, ColumnType, Registry, RelationDef, RelationKind, TableSchema};
pub use value::{ColumnRef, RawSql, SqlValue, Value, raw};

// Re-export the query builder for easy access
pub use qb::{
    AggregateCondition, ConditionNode, ConflictTarget, CopyDirection, CopyHeader, CopyOptions,
    CopyTarget, CteOptions, Data, JoinKind, JoinTarget, JsonExpr, JsonKey, MergeSpec,
    NestedWrite, Operand, Operator, Over, Query, QueryState, ReturnType, SortDir, SqlQuery,
    TruncateOptions, UnionKind, WindowDef, parse_having, parse_where,
};
