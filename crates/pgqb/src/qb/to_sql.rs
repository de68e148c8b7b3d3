//! The statement serializer.
//!
//! Walks a finished [`QueryState`] and produces SQL text with `$n` placeholders plus the values
//! in placeholder order. Sub-queries (FROM, JOIN, CTE, UNION, EXISTS, scalar selects) are
//! written into the same parameter list, so numbering is continuous across the whole statement.

use tokio_postgres::types::ToSql;

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::column_info::write_column_info;
use crate::qb::copy::write_copy;
use crate::qb::cte::write_with;
use crate::qb::delete::write_delete;
use crate::qb::insert::write_insert;
use crate::qb::order::write_order_list;
use crate::qb::param::ParamList;
use crate::qb::select::write_select_list;
use crate::qb::state::{FromSource, QueryState, Statement};
use crate::qb::truncate::write_truncate;
use crate::qb::update::write_update;
use crate::qb::window::write_windows;
use crate::schema::TableSchema;
use crate::value::{ColumnRef, SqlValue};

/// Compiled SQL: text with `$n` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub text: String,
    pub values: Vec<SqlValue>,
}

impl SqlQuery {
    /// The values as driver parameters.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}

/// Compile a query state.
pub fn serialize(state: &QueryState) -> OrmResult<SqlQuery> {
    let mut params = ParamList::new();
    let mut text = String::new();
    write_query(state, &mut params, &mut text)?;
    Ok(SqlQuery {
        text,
        values: params.into_values(),
    })
}

fn require_table<'a>(state: &'a QueryState, what: &str) -> OrmResult<&'a TableSchema> {
    state
        .table
        .as_deref()
        .ok_or_else(|| OrmError::construction(format!("Table is missing for {what}")))
}

/// Append the SQL of `state` to `out`, binding its values into `params`.
pub(crate) fn write_query(state: &QueryState, params: &mut ParamList, out: &mut String) -> OrmResult<()> {
    if !state.with.is_empty() {
        write_with(&state.with, out, params)?;
        out.push(' ');
    }

    match &state.statement {
        Statement::Select => write_select(state, params, out),
        Statement::Truncate(options) => {
            write_truncate(require_table(state, "truncate")?, options, out);
            Ok(())
        }
        Statement::ColumnInfo(column) => {
            write_column_info(require_table(state, "column info")?, column.as_deref(), out, params);
            Ok(())
        }
        Statement::Copy(options) => {
            write_copy(require_table(state, "copy")?, options, out);
            Ok(())
        }
        Statement::Insert(payload) => {
            let table = require_table(state, "insert")?;
            write_insert(state, table, payload, out, params)?;
            write_returning(state, out, params)
        }
        Statement::Update(items) => {
            let table = require_table(state, "update")?;
            write_update(state, table, items, out, params)?;
            write_returning(state, out, params)
        }
        Statement::Delete => {
            let table = require_table(state, "delete")?;
            write_delete(state, table, out, params)?;
            write_returning(state, out, params)
        }
    }
}

fn write_select(state: &QueryState, params: &mut ParamList, out: &mut String) -> OrmResult<()> {
    let qualifier = state.quoted_alias();
    let qualifier = qualifier.as_deref();

    out.push_str("SELECT ");
    if let Some(on) = &state.distinct {
        out.push_str("DISTINCT ");
        if !on.is_empty() {
            out.push_str("ON (");
            write_columns(on, out, qualifier);
            out.push_str(") ");
        }
    }
    write_projection(state, out, qualifier, params)?;

    if state.table.is_some() || state.from.is_some() {
        out.push_str(" FROM ");
        write_from(state, out, params)?;
    }

    for join in &state.joins {
        out.push(' ');
        join.write_sql(out, params)?;
    }

    if let Some(cond) = state.where_.build(qualifier, params)? {
        out.push_str(" WHERE ");
        out.push_str(&cond);
    }

    if !state.group.is_empty() {
        out.push_str(" GROUP BY ");
        for (i, item) in state.group.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            item.write_sql(out, qualifier, params)?;
        }
    }

    if let Some(cond) = state.having.build(qualifier, params)? {
        out.push_str(" HAVING ");
        out.push_str(&cond);
    }

    if !state.windows.is_empty() {
        out.push_str(" WINDOW ");
        write_windows(&state.windows, out, qualifier, params)?;
    }

    for union in &state.unions {
        out.push(' ');
        union.write_sql(out, params)?;
    }

    if !state.order.is_empty() {
        out.push_str(" ORDER BY ");
        write_order_list(&state.order, out, qualifier, params)?;
    }

    let limit = if state.return_type.limits_to_one() {
        Some(1)
    } else {
        state.limit
    };
    if let Some(limit) = limit {
        out.push_str(" LIMIT ");
        out.push_str(&params.placeholder(SqlValue::Int(limit)));
    }
    if let Some(offset) = state.offset {
        out.push_str(" OFFSET ");
        out.push_str(&params.placeholder(SqlValue::Int(offset)));
    }

    if let Some(lock) = &state.lock {
        out.push(' ');
        lock.write_sql(out, params)?;
    }
    Ok(())
}

fn write_columns(columns: &[ColumnRef], out: &mut String, qualifier: Option<&str>) {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        column.write_sql(out, qualifier);
    }
}

/// The SELECT list; without explicit items every visible column of the source.
fn write_projection(
    state: &QueryState,
    out: &mut String,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<()> {
    if !state.select.is_empty() {
        return write_select_list(&state.select, out, qualifier, params);
    }
    let visible = match (&state.table, &state.from, state.select_all) {
        (Some(table), None, false) => table.default_select(),
        _ => None,
    };
    match (visible, qualifier) {
        (Some(columns), _) => {
            let columns: Vec<ColumnRef> = columns.into_iter().map(ColumnRef::new).collect();
            write_columns(&columns, out, qualifier);
        }
        (None, Some(qualifier)) => {
            out.push_str(qualifier);
            out.push_str(".*");
        }
        (None, None) => out.push('*'),
    }
    Ok(())
}

fn write_from(state: &QueryState, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
    match &state.from {
        Some(FromSource::Query(inner)) => {
            let alias = state
                .quoted_alias()
                .ok_or_else(|| OrmError::construction("A FROM sub-query needs an alias"))?;
            out.push('(');
            write_query(inner, params, out)?;
            out.push_str(") AS ");
            out.push_str(&alias);
        }
        Some(FromSource::Raw(raw)) => {
            params.push_raw(raw, out)?;
            if let Some(alias) = &state.alias {
                out.push_str(" AS ");
                out.push_str(&quote(alias));
            }
        }
        None => {
            let table = require_table(state, "select")?;
            out.push_str(&table.quoted_name());
            if let Some(alias) = state.alias.as_ref().filter(|a| **a != table.name) {
                out.push_str(" AS ");
                out.push_str(&quote(alias));
            }
        }
    }
    Ok(())
}

/// Write RETURNING for a data-modifying statement.
///
/// - explicit selection: those items, plus columns nested writes read back;
/// - `select_all()`, or an insert that returns rows without a selection: `*`;
/// - otherwise only the columns nested writes read back, if any.
fn write_returning(state: &QueryState, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
    let qualifier = state.quoted_alias();
    let qualifier = qualifier.as_deref();

    let mut items: Vec<String> = Vec::with_capacity(state.select.len() + state.required_returning.len());
    if !state.select.is_empty() {
        for item in &state.select {
            let mut sql = String::new();
            item.write_sql(&mut sql, qualifier, params)?;
            items.push(sql);
        }
    } else if state.select_all
        || (matches!(state.statement, Statement::Insert(_)) && state.return_type.returns_rows())
    {
        out.push_str(" RETURNING *");
        return Ok(());
    }

    for column in &state.required_returning {
        let sql = ColumnRef::new(column.as_str()).to_sql(qualifier);
        if !items.contains(&sql) {
            items.push(sql);
        }
    }

    if !items.is_empty() {
        out.push_str(" RETURNING ");
        out.push_str(&items.join(", "));
    }
    Ok(())
}
