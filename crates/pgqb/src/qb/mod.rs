//! The query builder and its SQL compiler.
//!
//! A [`Query`] is an immutable handle over a [`QueryState`]. Builder methods live in one module
//! per clause family and all follow the same shape: clone the state, change the clone, return
//! a new handle. [`Query::to_sql`] hands the finished state to the serializer in [`to_sql`],
//! which produces `{text, values}` with `$n` placeholders.
//!
//! # Features
//!
//! - **Clone-and-transform**: a base handle can be reused for any number of derived queries
//! - **Condition trees**: AND/OR/NOT groups compiled with minimal parentheses
//! - **Continuous numbering**: sub-queries, raw fragments and CTEs share one parameter list
//! - **Nested writes**: relation keys in insert payloads become ordered related inserts
//!
//! # Usage
//!
//! ```ignore
//! use pgqb::{ConditionNode, Data, SortDir};
//!
//! let users = db.table("user")?;
//!
//! // SELECT "user".* FROM "user" WHERE "user"."age" > $1 ORDER BY "user"."name" ASC LIMIT $2
//! let sql = users
//!     .where_(ConditionNode::gt("age", 18)?)
//!     .order("name", SortDir::Asc)?
//!     .limit(10)
//!     .to_sql()?;
//!
//! // INSERT INTO "user"("name") VALUES ($1) RETURNING *
//! let created = users.insert(Data::new().set("name", "alice"))?.exec(&client).await?;
//!
//! // UPDATE "user" SET "name" = $1 WHERE "user"."id" = $2
//! users.find(1)?.update(Data::new().set("name", "bob"))?.exec(&client).await?;
//! ```

mod column_info;
mod copy;
mod cte;
mod delete;
mod expr;
mod filter;
mod group;
mod hooks;
mod insert;
mod join;
mod json;
mod lock;
mod order;
mod param;
mod query;
mod select;
mod shorthand;
mod state;
mod to_sql;
mod truncate;
mod union;
mod update;
mod window;


pub use copy::{CopyDirection, CopyHeader, CopyOptions, CopyTarget};
pub use cte::{CteItem, CteOptions};
pub use expr::{AggregateCondition, ConditionNode, Operand, Operator, WhereGroups};
pub use group::GroupItem;
pub use insert::{ConflictTarget, Data, MergeSpec, NestedWrite, OnConflictBuilder};
pub use join::{JoinItem, JoinKind, JoinTarget};
pub use json::{JsonExpr, JsonKey};
pub use lock::{LockClause, LockStrength, LockWait};
pub use order::{OrderItem, SortDir};
pub use param::ParamList;
pub use query::Query;
pub use select::SelectItem;
pub use shorthand::{parse_having, parse_where};
pub use state::{AfterHook, BeforeHook, QueryState, ReturnType};
pub use to_sql::{SqlQuery, serialize};
pub use truncate::TruncateOptions;
pub use union::{UnionItem, UnionKind};
pub use window::{Over, WindowCall, WindowDef};

pub(crate) use insert::RelationOp;
pub(crate) use state::Statement;
