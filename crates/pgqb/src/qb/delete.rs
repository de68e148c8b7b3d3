//! DELETE.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::param::ParamList;
use crate::qb::select::SelectItem;
use crate::qb::state::{QueryState, ReturnType, Statement};
use crate::qb::update::check_where;
use crate::schema::TableSchema;

impl Query {
    /// Delete the matched rows. Joins become `USING` targets.
    pub fn delete(&self) -> OrmResult<Self> {
        self.require_table("delete")?;
        check_where(self.state(), "delete")?;
        self.try_map(|s| {
            if !matches!(s.statement, Statement::Select) {
                return Err(OrmError::construction(format!(
                    "Cannot delete from a {} query",
                    s.statement.name()
                )));
            }
            s.statement = Statement::Delete;
            if s.select.iter().any(SelectItem::is_count) {
                s.select.clear();
                s.return_type = ReturnType::RowCount;
            }
            Ok(())
        })
    }
}

/// Write `DELETE FROM ... [USING ...] WHERE ...`, without RETURNING.
pub(crate) fn write_delete(
    state: &QueryState,
    table: &TableSchema,
    out: &mut String,
    params: &mut ParamList,
) -> OrmResult<()> {
    check_where(state, "delete")?;

    out.push_str("DELETE FROM ");
    out.push_str(&table.quoted_name());
    if let Some(alias) = state.alias.as_ref().filter(|a| **a != table.name) {
        out.push_str(" AS ");
        out.push_str(&quote(alias));
    }

    let mut conditions = Vec::new();
    if !state.joins.is_empty() {
        out.push_str(" USING ");
        for (i, join) in state.joins.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            join.target.write_sql(out, params)?;
        }
    }

    let qualifier = state.quoted_alias();
    let filter = if state.joins.is_empty() {
        state.where_.build(qualifier.as_deref(), params)?
    } else {
        state.where_.build_and_operand(qualifier.as_deref(), params)?
    };
    if let Some(cond) = filter {
        conditions.push(cond);
    }
    for join in &state.joins {
        if let Some(on) = join.build_on_operand(params)? {
            conditions.push(on);
        }
    }
    if !conditions.is_empty() {
        out.push_str(" WHERE ");
        out.push_str(&conditions.join(" AND "));
    }
    Ok(())
}
