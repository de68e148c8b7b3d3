//! The query state: every clause of one statement, plus how its result is shaped.
//!
//! A `QueryState` is never shared mutably. Builder methods clone it, change the clone and wrap
//! it in a new [`Query`](crate::qb::Query), so two handles derived from the same state never
//! observe each other's later changes.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::OrmResult;
use crate::exec::QueryOutput;
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::copy::CopyOptions;
use crate::qb::cte::CteItem;
use crate::qb::expr::WhereGroups;
use crate::qb::group::GroupItem;
use crate::qb::insert::{Data, InsertPayload, RelationOp};
use crate::qb::join::JoinItem;
use crate::qb::lock::LockClause;
use crate::qb::order::OrderItem;
use crate::qb::select::SelectItem;
use crate::qb::to_sql::SqlQuery;
use crate::qb::truncate::TruncateOptions;
use crate::qb::union::UnionItem;
use crate::qb::update::UpdateItem;
use crate::qb::window::WindowDef;
use crate::schema::TableSchema;
use crate::value::{ColumnRef, RawSql};

/// How the result of a statement is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    /// Every row as a record.
    #[default]
    All,
    /// The first row, or nothing.
    One,
    /// The first row; zero rows is a not-found error.
    OneOrThrow,
    /// Every row as a list of values.
    Rows,
    /// The first column of every row.
    Pluck,
    /// The first column of the first row, or nothing.
    Value,
    /// The first column of the first row; zero rows is a not-found error.
    ValueOrThrow,
    /// Only the affected row count.
    RowCount,
    /// Nothing.
    Void,
}

impl ReturnType {
    /// Return types that force `LIMIT 1` on a select.
    pub(crate) fn limits_to_one(self) -> bool {
        matches!(self, ReturnType::One | ReturnType::OneOrThrow)
    }

    /// Return types that expect at most one row.
    pub(crate) fn expects_one(self) -> bool {
        matches!(
            self,
            ReturnType::One | ReturnType::OneOrThrow | ReturnType::Value | ReturnType::ValueOrThrow
        )
    }

    pub(crate) fn returns_rows(self) -> bool {
        !matches!(self, ReturnType::RowCount | ReturnType::Void)
    }
}

/// Statement kind with its kind-specific payload.
#[derive(Debug, Clone, Default)]
pub(crate) enum Statement {
    #[default]
    Select,
    Insert(InsertPayload),
    Update(Vec<UpdateItem>),
    Delete,
    Truncate(TruncateOptions),
    Copy(CopyOptions),
    ColumnInfo(Option<String>),
}

impl Statement {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Statement::Select => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete => "delete",
            Statement::Truncate(_) => "truncate",
            Statement::Copy(_) => "copy",
            Statement::ColumnInfo(_) => "column info",
        }
    }

    pub(crate) fn is_mutation(&self) -> bool {
        matches!(self, Statement::Insert(_) | Statement::Update(_) | Statement::Delete)
    }
}

/// A FROM source replacing the table itself.
#[derive(Debug, Clone)]
pub(crate) enum FromSource {
    /// `FROM (sub-query) AS "alias"`; the alias is the outer state's alias.
    Query(Box<QueryState>),
    /// `FROM <raw>`
    Raw(RawSql),
}

/// Called with the query about to run.
pub type BeforeHook = Arc<dyn Fn(&Query) -> OrmResult<()> + Send + Sync>;

/// Called with the query that ran and its output.
pub type AfterHook = Arc<dyn Fn(&Query, &QueryOutput) -> OrmResult<()> + Send + Sync>;

/// Lifecycle callbacks, kept in registration order through every clone.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) before_insert: Vec<BeforeHook>,
    pub(crate) after_insert: Vec<AfterHook>,
    pub(crate) before_update: Vec<BeforeHook>,
    pub(crate) after_update: Vec<AfterHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_insert", &self.before_insert.len())
            .field("after_insert", &self.after_insert.len())
            .field("before_update", &self.before_update.len())
            .field("after_update", &self.after_update.len())
            .finish()
    }
}

/// Memoized serializer output. A clone starts empty, so any derived state is recompiled.
#[derive(Default)]
pub(crate) struct SqlCache(OnceLock<Arc<SqlQuery>>);

impl SqlCache {
    pub(crate) fn get_or_try_init(
        &self,
        init: impl FnOnce() -> OrmResult<SqlQuery>,
    ) -> OrmResult<Arc<SqlQuery>> {
        if let Some(sql) = self.0.get() {
            return Ok(Arc::clone(sql));
        }
        let sql = Arc::new(init()?);
        // A concurrent caller may have won the race; both results are identical.
        Ok(Arc::clone(self.0.get_or_init(|| sql)))
    }
}

impl Clone for SqlCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for SqlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.get().is_some() { "SqlCache(filled)" } else { "SqlCache(empty)" })
    }
}

/// Every clause of one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub(crate) table: Option<Arc<TableSchema>>,
    pub(crate) alias: Option<String>,
    pub(crate) from: Option<FromSource>,
    pub(crate) statement: Statement,
    pub(crate) return_type: ReturnType,

    pub(crate) select: Vec<SelectItem>,
    pub(crate) select_all: bool,
    pub(crate) distinct: Option<Vec<ColumnRef>>,
    pub(crate) joins: Vec<JoinItem>,
    pub(crate) where_: WhereGroups,
    pub(crate) where_all: bool,
    pub(crate) group: Vec<GroupItem>,
    pub(crate) having: WhereGroups,
    pub(crate) windows: Vec<(String, WindowDef)>,
    pub(crate) with: Vec<CteItem>,
    pub(crate) unions: Vec<UnionItem>,
    pub(crate) order: Vec<OrderItem>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
    pub(crate) lock: Option<LockClause>,

    pub(crate) defaults: Data,
    pub(crate) hooks: Hooks,
    /// Columns a dependent operation reads back from the main statement.
    pub(crate) required_returning: Vec<String>,
    pub(crate) relation_ops: Vec<RelationOp>,
    pub(crate) wrap_in_transaction: bool,
    /// Insert to run when the main statement matched no row.
    pub(crate) or_create: Option<Box<QueryState>>,

    pub(crate) cache: SqlCache,
}

impl QueryState {
    pub(crate) fn for_table(table: Arc<TableSchema>) -> Self {
        Self {
            table: Some(table),
            ..Self::default()
        }
    }

    /// Name the columns are qualified with: the alias, else the table name.
    pub(crate) fn alias_name(&self) -> Option<&str> {
        match (&self.alias, &self.table) {
            (Some(alias), _) => Some(alias),
            (None, Some(table)) => Some(&table.name),
            _ => None,
        }
    }

    /// The quoted qualifier, e.g. `"user"`.
    pub(crate) fn quoted_alias(&self) -> Option<String> {
        self.alias_name().map(quote)
    }

    pub(crate) fn return_type(&self) -> ReturnType {
        self.return_type
    }

    /// Whether the statement hands rows back to the caller: selects always, data-modifying
    /// statements only with a RETURNING list of their own.
    pub(crate) fn returns_records(&self) -> bool {
        match &self.statement {
            Statement::Select | Statement::ColumnInfo(_) => true,
            Statement::Insert(_) => {
                !self.select.is_empty() || self.select_all || self.return_type.returns_rows()
            }
            Statement::Update(_) | Statement::Delete => !self.select.is_empty() || self.select_all,
            Statement::Truncate(_) | Statement::Copy(_) => false,
        }
    }

    /// `where_()` or `all()` was called.
    pub(crate) fn has_where(&self) -> bool {
        self.where_all || self.where_.is_set()
    }
}
