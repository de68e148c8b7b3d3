//! Projections: the SELECT list, also used for RETURNING.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::expr::write_value;
use crate::qb::json::JsonExpr;
use crate::qb::param::ParamList;
use crate::qb::state::{QueryState, ReturnType};
use crate::qb::to_sql::write_query;
use crate::qb::window::WindowCall;
use crate::value::{ColumnRef, RawSql, Value};

/// One projection with an optional output name.
#[derive(Debug, Clone)]
pub struct SelectItem {
    pub(crate) expr: SelectExpr,
    pub(crate) alias: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum SelectExpr {
    Column(ColumnRef),
    Raw(RawSql),
    /// A scalar sub-query.
    Query(Box<QueryState>),
    Json(JsonExpr),
    /// A bound value, used by `insert_from` to append payload values to the source columns.
    Value(Value),
    /// `count(*)` or `count("t"."col")`.
    Count(Option<ColumnRef>),
    Window(WindowCall),
}

impl SelectItem {
    pub(crate) fn new(expr: SelectExpr, alias: Option<String>) -> Self {
        Self { expr, alias }
    }

    pub(crate) fn column(column: ColumnRef) -> Self {
        Self::new(SelectExpr::Column(column), None)
    }

    /// Name of the output column, when it can be known without running the query.
    pub(crate) fn output_name(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        match &self.expr {
            SelectExpr::Column(column) if !column.is_star() => Some(&column.name),
            SelectExpr::Json(json) => json.root_column().map(|c| c.name.as_str()),
            SelectExpr::Count(_) => Some("count"),
            _ => None,
        }
    }

    pub(crate) fn is_count(&self) -> bool {
        matches!(self.expr, SelectExpr::Count(_))
    }

    pub(crate) fn write_sql(
        &self,
        out: &mut String,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<()> {
        match &self.expr {
            SelectExpr::Column(column) => column.write_sql(out, qualifier),
            SelectExpr::Raw(raw) => params.push_raw(raw, out)?,
            SelectExpr::Query(state) => {
                out.push('(');
                write_query(state, params, out)?;
                out.push(')');
            }
            SelectExpr::Json(json) => json.write_sql(out, qualifier, params)?,
            SelectExpr::Value(value) => write_value(value, out, qualifier, params)?,
            SelectExpr::Count(column) => {
                out.push_str("count(");
                match column {
                    Some(column) => column.write_sql(out, qualifier),
                    None => out.push('*'),
                }
                out.push(')');
            }
            SelectExpr::Window(call) => call.write_sql(out, qualifier, params)?,
        }
        // JSON expressions are named after their column unless aliased.
        let alias = match (&self.alias, &self.expr) {
            (Some(alias), _) => Some(alias.as_str()),
            (None, SelectExpr::Json(json)) => json.root_column().map(|c| c.name.as_str()),
            _ => None,
        };
        if let Some(alias) = alias {
            out.push_str(" AS ");
            out.push_str(&quote(alias));
        }
        Ok(())
    }
}

/// Write `a, b AS "c", ...`.
pub(crate) fn write_select_list(
    items: &[SelectItem],
    out: &mut String,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_sql(out, qualifier, params)?;
    }
    Ok(())
}

impl Query {
    /// Add columns to the projection: `column`, `table.column` or `table.*`.
    pub fn select(&self, columns: &[&str]) -> OrmResult<Self> {
        let items = columns
            .iter()
            .map(|c| ColumnRef::parse(c).map(SelectItem::column))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(self.map(|s| push_select(s, items)))
    }

    /// Add `column AS "alias"`.
    pub fn select_as(&self, column: &str, alias: &str) -> OrmResult<Self> {
        let item = SelectItem::new(SelectExpr::Column(ColumnRef::parse(column)?), Some(alias.to_string()));
        Ok(self.map(|s| push_select(s, vec![item])))
    }

    /// Add a raw expression, optionally named.
    pub fn select_raw(&self, raw: RawSql, alias: Option<&str>) -> Self {
        let item = SelectItem::new(SelectExpr::Raw(raw), alias.map(str::to_string));
        self.map(|s| push_select(s, vec![item]))
    }

    /// Add a scalar sub-query: `(SELECT ...) AS "alias"`.
    pub fn select_query(&self, query: &Query, alias: &str) -> Self {
        let item = SelectItem::new(
            SelectExpr::Query(Box::new(query.state().clone())),
            Some(alias.to_string()),
        );
        self.map(|s| push_select(s, vec![item]))
    }

    /// Select (or return) every column: `"user".*`, `RETURNING *`.
    pub fn select_all(&self) -> Self {
        self.map(|s| {
            s.select.clear();
            s.select_all = true;
        })
    }

    /// `SELECT DISTINCT`
    pub fn distinct(&self) -> Self {
        self.map(|s| s.distinct = Some(Vec::new()))
    }

    /// `SELECT DISTINCT ON (columns)`
    pub fn distinct_on(&self, columns: &[&str]) -> OrmResult<Self> {
        let columns = columns
            .iter()
            .map(|c| ColumnRef::parse(c))
            .collect::<OrmResult<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(OrmError::construction("DISTINCT ON needs at least one column"));
        }
        Ok(self.map(|s| s.distinct = Some(columns)))
    }

    /// Select `count(*)`; before a mutation, return the affected row count instead.
    pub fn count(&self) -> Self {
        self.count_item(None)
    }

    /// Select `count("t"."column")`.
    pub fn count_column(&self, column: &str) -> OrmResult<Self> {
        Ok(self.count_item(Some(ColumnRef::parse(column)?)))
    }

    fn count_item(&self, column: Option<ColumnRef>) -> Self {
        self.map(|s| {
            if s.statement.is_mutation() {
                s.select.clear();
                s.select_all = false;
                s.return_type = ReturnType::RowCount;
            } else {
                s.select = vec![SelectItem::new(SelectExpr::Count(column), None)];
                s.select_all = false;
                s.return_type = ReturnType::ValueOrThrow;
            }
        })
    }
}

pub(crate) fn push_select(state: &mut QueryState, items: Vec<SelectItem>) {
    state.select_all = false;
    state.select.extend(items);
}
