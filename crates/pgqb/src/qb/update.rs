//! UPDATE, increments and the update-or-create flow.

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::expr::write_value;
use crate::qb::insert::Data;
use crate::qb::param::ParamList;
use crate::qb::select::SelectItem;
use crate::qb::state::{QueryState, ReturnType, Statement};
use crate::schema::TableSchema;
use crate::value::{RawSql, Value};

/// One entry of the SET list.
#[derive(Debug, Clone)]
pub(crate) enum UpdateItem {
    /// `"col" = value`
    Set(String, Value),
    /// Spliced as is.
    Raw(RawSql),
    /// `"col" = "col" + by` or `- by`.
    Increment { column: String, by: Value, negate: bool },
}

impl UpdateItem {
    fn write_sql(&self, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
        match self {
            UpdateItem::Set(column, value) => {
                out.push_str(&quote(column));
                out.push_str(" = ");
                write_value(value, out, None, params)?;
            }
            UpdateItem::Raw(raw) => params.push_raw(raw, out)?,
            UpdateItem::Increment { column, by, negate } => {
                let column = quote(column);
                out.push_str(&column);
                out.push_str(" = ");
                out.push_str(&column);
                out.push_str(if *negate { " - " } else { " + " });
                write_value(by, out, None, params)?;
            }
        }
        Ok(())
    }
}

/// Refuse to update or delete without a filter, unless `all()` was called.
pub(crate) fn check_where(state: &QueryState, what: &str) -> OrmResult<()> {
    if state.has_where() {
        Ok(())
    } else {
        Err(OrmError::construction(format!(
            "Dangerous {what} without conditions; add where_() or call all() to {what} every row"
        )))
    }
}

impl Query {
    /// `UPDATE ... SET` the given values.
    ///
    /// Keys that are not columns of the table are dropped, as is the automatic `updated_at`
    /// column, which is always set to `now()`.
    pub fn update(&self, data: Data) -> OrmResult<Self> {
        let table = self.require_table("update")?;
        let items = data
            .column_values(table, "update")?
            .into_iter()
            .filter(|(key, _)| table.updated_at.as_deref() != Some(key.as_str()))
            .map(|(key, value)| UpdateItem::Set(key, value))
            .collect();
        self.push_update(items)
    }

    /// `UPDATE ... SET <raw>`
    pub fn update_raw(&self, raw: RawSql) -> OrmResult<Self> {
        self.push_update(vec![UpdateItem::Raw(raw)])
    }

    /// `SET "col" = "col" + by`
    pub fn increment(&self, column: &str, by: impl Into<Value>) -> OrmResult<Self> {
        self.push_update(vec![UpdateItem::Increment {
            column: column.to_string(),
            by: by.into(),
            negate: false,
        }])
    }

    /// `SET "col" = "col" - by`
    pub fn decrement(&self, column: &str, by: impl Into<Value>) -> OrmResult<Self> {
        self.push_update(vec![UpdateItem::Increment {
            column: column.to_string(),
            by: by.into(),
            negate: true,
        }])
    }

    fn push_update(&self, items: Vec<UpdateItem>) -> OrmResult<Self> {
        self.require_table("update")?;
        check_where(self.state(), "update")?;
        self.try_map(|s| {
            match &mut s.statement {
                Statement::Update(existing) => existing.extend(items),
                Statement::Select => s.statement = Statement::Update(items),
                other => {
                    return Err(OrmError::construction(format!(
                        "Cannot update a {} query",
                        other.name()
                    )));
                }
            }
            if s.select.iter().any(SelectItem::is_count) {
                s.select.clear();
                s.return_type = ReturnType::RowCount;
            }
            Ok(())
        })
    }

    /// Update the matched row, or insert `create` when nothing matched.
    ///
    /// Both statements run in one transaction. The update must match at most one row.
    pub fn upsert(&self, update: Data, create: Data) -> OrmResult<Self> {
        let base = if update.is_empty() {
            self.clone()
        } else {
            self.update(update)?
        };
        base.or_create(create)
    }

    /// Return the matched row, or insert `create` when nothing matched.
    pub fn or_create(&self, create: Data) -> OrmResult<Self> {
        let table = Arc::clone(self.require_table("or_create")?);
        if !self.state().where_.is_set() {
            return Err(OrmError::construction(
                "or_create needs a where_() condition to find the existing row",
            ));
        }

        let base = self.state();
        let mut insert_base = QueryState::for_table(table);
        insert_base.alias = base.alias.clone();
        insert_base.defaults = base.defaults.clone();
        insert_base.hooks = base.hooks.clone();
        insert_base.select = base.select.clone();
        insert_base.select_all = base.select_all;
        insert_base.return_type = match (&base.statement, base.return_type) {
            (Statement::Update(_), _) if base.select.is_empty() && !base.select_all => ReturnType::RowCount,
            (_, rt) if rt.expects_one() => rt,
            _ => ReturnType::One,
        };
        let create = self.derive(insert_base).insert(create)?;

        Ok(self.map(|s| {
            if !s.return_type.expects_one() && s.return_type != ReturnType::RowCount {
                s.return_type = ReturnType::One;
            }
            s.wrap_in_transaction = true;
            s.or_create = Some(Box::new(create.state().clone()));
        }))
    }
}

/// Write `UPDATE ... SET ... [FROM ...] WHERE ...`, without RETURNING.
pub(crate) fn write_update(
    state: &QueryState,
    table: &TableSchema,
    items: &[UpdateItem],
    out: &mut String,
    params: &mut ParamList,
) -> OrmResult<()> {
    check_where(state, "update")?;
    if !state.joins.is_empty() {
        return Err(OrmError::construction("Joins are not supported in an update"));
    }
    if items.is_empty() && table.updated_at.is_none() {
        return Err(OrmError::construction("Update has no columns to set"));
    }

    out.push_str("UPDATE ");
    out.push_str(&table.quoted_name());
    if let Some(alias) = state.alias.as_ref().filter(|a| **a != table.name) {
        out.push_str(" AS ");
        out.push_str(&quote(alias));
    }
    out.push_str(" SET ");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_sql(out, params)?;
    }
    if let Some(updated_at) = &table.updated_at {
        if !items.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&quote(updated_at));
        out.push_str(" = now()");
    }

    let qualifier = state.quoted_alias();
    if let Some(cond) = state.where_.build(qualifier.as_deref(), params)? {
        out.push_str(" WHERE ");
        out.push_str(&cond);
    }
    Ok(())
}
