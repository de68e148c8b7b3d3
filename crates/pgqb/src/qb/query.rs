//! The query handle.

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::monitor::LogConfig;
use crate::qb::expr::ConditionNode;
use crate::qb::select::{SelectExpr, SelectItem};
use crate::qb::state::{FromSource, QueryState, ReturnType, Statement};
use crate::qb::to_sql::{SqlQuery, serialize};
use crate::schema::{Registry, TableSchema};
use crate::value::{ColumnRef, RawSql, Value};

/// An immutable query handle.
///
/// Every builder method takes `&self` and returns a new handle holding a modified clone of the
/// state; the receiver is left untouched and can keep being used as a base for other queries.
///
/// # Example
/// ```ignore
/// let active = db.table("user")?.where_(ConditionNode::eq("active", true)?);
/// let admins = active.where_(ConditionNode::eq("role", "admin")?);
/// let first = active.order("id", SortDir::Asc)?.take();
/// // `active` still compiles to its own SQL.
/// ```
#[derive(Clone, Debug)]
pub struct Query {
    state: Arc<QueryState>,
    registry: Option<Arc<Registry>>,
    log: Option<LogConfig>,
}

impl Query {
    /// A query on `table` without a registry; relation shorthand is unavailable.
    pub fn new(table: Arc<TableSchema>) -> Self {
        Self {
            state: Arc::new(QueryState::for_table(table)),
            registry: None,
            log: None,
        }
    }

    pub(crate) fn with_registry(
        table: Arc<TableSchema>,
        registry: Arc<Registry>,
        log: Option<LogConfig>,
    ) -> Self {
        Self {
            state: Arc::new(QueryState::for_table(table)),
            registry: Some(registry),
            log,
        }
    }

    /// A from-less `SELECT <raw>`.
    pub fn raw_select(raw: RawSql) -> Self {
        let mut state = QueryState::default();
        state.select.push(SelectItem::new(SelectExpr::Raw(raw), None));
        Self {
            state: Arc::new(state),
            registry: None,
            log: None,
        }
    }

    /// Attach SQL logging for executions of this handle.
    pub fn log(&self, log: LogConfig) -> Self {
        let mut next = self.clone();
        next.log = Some(log);
        next
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn table(&self) -> Option<&TableSchema> {
        self.state.table.as_deref()
    }

    pub fn return_type(&self) -> ReturnType {
        self.state.return_type
    }

    pub(crate) fn registry(&self) -> Option<&Arc<Registry>> {
        self.registry.as_ref()
    }

    pub(crate) fn log_config(&self) -> Option<&LogConfig> {
        self.log.as_ref()
    }

    /// Copy the state, apply `f`, and wrap the result in a new handle.
    pub(crate) fn map(&self, f: impl FnOnce(&mut QueryState)) -> Self {
        let mut state = QueryState::clone(&self.state);
        f(&mut state);
        self.derive(state)
    }

    /// Like [`Query::map`] for changes that can be rejected.
    pub(crate) fn try_map(&self, f: impl FnOnce(&mut QueryState) -> OrmResult<()>) -> OrmResult<Self> {
        let mut state = QueryState::clone(&self.state);
        f(&mut state)?;
        Ok(self.derive(state))
    }

    /// A handle on another state sharing this handle's registry and logging.
    pub(crate) fn derive(&self, state: QueryState) -> Self {
        Self {
            state: Arc::new(state),
            registry: self.registry.clone(),
            log: self.log.clone(),
        }
    }

    /// A fresh query on another registered table.
    pub(crate) fn sibling(&self, table: &str) -> OrmResult<Self> {
        let registry = self.registry.as_ref().ok_or_else(|| {
            OrmError::construction(format!(
                "Table {table} cannot be resolved without a registry; create the query through Db"
            ))
        })?;
        let schema = registry
            .get(table)
            .ok_or_else(|| OrmError::construction(format!("Unknown table {table}")))?;
        Ok(Self::with_registry(schema, Arc::clone(registry), self.log.clone()))
    }

    pub(crate) fn require_table(&self, what: &str) -> OrmResult<&Arc<TableSchema>> {
        self.state
            .table
            .as_ref()
            .ok_or_else(|| OrmError::construction(format!("Table is missing for {what}")))
    }

    /// Alias the table: `FROM "user" AS "u"`.
    pub fn as_(&self, alias: &str) -> Self {
        let alias = alias.to_string();
        self.map(|s| s.alias = Some(alias))
    }

    /// Select from a sub-query instead of the table: `FROM (SELECT ...) AS "alias"`.
    pub fn from_query(&self, query: &Query, alias: &str) -> Self {
        let inner = query.state().clone();
        let alias = alias.to_string();
        self.map(|s| {
            s.from = Some(FromSource::Query(Box::new(inner)));
            s.alias = Some(alias);
        })
    }

    /// `FROM <raw>`
    pub fn from_raw(&self, raw: RawSql) -> Self {
        self.map(|s| s.from = Some(FromSource::Raw(raw)))
    }

    pub fn limit(&self, n: i64) -> Self {
        self.map(|s| s.limit = Some(n))
    }

    pub fn offset(&self, n: i64) -> Self {
        self.map(|s| s.offset = Some(n))
    }

    /// Return the first row; zero rows is a not-found error.
    pub fn take(&self) -> Self {
        self.map(|s| s.return_type = ReturnType::OneOrThrow)
    }

    /// Return the first row if there is one.
    pub fn take_optional(&self) -> Self {
        self.map(|s| s.return_type = ReturnType::One)
    }

    /// Return every row; also marks an update or delete as intentionally unfiltered.
    pub fn all(&self) -> Self {
        self.map(|s| {
            s.where_all = true;
            if s.return_type.expects_one() || s.return_type == ReturnType::Rows {
                s.return_type = ReturnType::All;
            }
        })
    }

    /// Return every row as a list of values.
    pub fn rows(&self) -> Self {
        self.map(|s| s.return_type = ReturnType::Rows)
    }

    /// Return the values of one column.
    pub fn pluck(&self, column: &str) -> OrmResult<Self> {
        self.select_single(column, ReturnType::Pluck)
    }

    /// Return one column of the first row; zero rows is a not-found error.
    pub fn get(&self, column: &str) -> OrmResult<Self> {
        self.select_single(column, ReturnType::ValueOrThrow)
    }

    /// Return one column of the first row if there is one.
    pub fn get_optional(&self, column: &str) -> OrmResult<Self> {
        self.select_single(column, ReturnType::Value)
    }

    fn select_single(&self, column: &str, return_type: ReturnType) -> OrmResult<Self> {
        let column = ColumnRef::parse(column)?;
        Ok(self.map(|s| {
            s.select = vec![SelectItem::new(SelectExpr::Column(column), None)];
            s.select_all = false;
            s.return_type = return_type;
            // A single value is read from the first row.
            if return_type != ReturnType::Pluck && matches!(s.statement, Statement::Select) {
                s.limit = Some(1);
            }
        }))
    }

    /// Find one row by its primary key; zero rows is a not-found error.
    pub fn find(&self, key: impl Into<Value>) -> OrmResult<Self> {
        Ok(self.where_primary_key(key.into())?.take())
    }

    /// Find one row by its primary key if it exists.
    pub fn find_optional(&self, key: impl Into<Value>) -> OrmResult<Self> {
        Ok(self.where_primary_key(key.into())?.take_optional())
    }

    /// Find the first row matching `node`; zero rows is a not-found error.
    pub fn find_by(&self, node: ConditionNode) -> Self {
        self.where_(node).take()
    }

    /// Find the first row matching `node` if there is one.
    pub fn find_by_optional(&self, node: ConditionNode) -> Self {
        self.where_(node).take_optional()
    }

    fn where_primary_key(&self, key: Value) -> OrmResult<Self> {
        let table = self.require_table("find")?;
        let node = match table.primary_keys().as_slice() {
            [pk] => ConditionNode::eq(pk, key)?,
            [] => {
                return Err(OrmError::construction(format!(
                    "Table {} has no primary key to find by",
                    table.name
                )));
            }
            _ => {
                return Err(OrmError::construction(format!(
                    "Table {} has a composite primary key; use find_by",
                    table.name
                )));
            }
        };
        Ok(self.where_(node))
    }

    /// Compile to SQL, reusing the memoized result of an earlier call on this handle.
    pub fn to_sql(&self) -> OrmResult<Arc<SqlQuery>> {
        self.state.cache.get_or_try_init(|| serialize(&self.state))
    }

    /// Compile to SQL without consulting or filling the memoized result.
    pub fn to_sql_fresh(&self) -> OrmResult<SqlQuery> {
        serialize(&self.state)
    }
}
