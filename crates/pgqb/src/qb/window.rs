//! Named windows and window function calls.

use crate::error::OrmResult;
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::expr::check_function_name;
use crate::qb::order::{OrderItem, SortDir, write_order_list};
use crate::qb::param::ParamList;
use crate::qb::select::{SelectExpr, SelectItem, push_select};
use crate::value::{ColumnRef, RawSql};

/// `(PARTITION BY ... ORDER BY ...)`
#[derive(Debug, Clone, Default)]
pub struct WindowDef {
    pub partition_by: Vec<ColumnRef>,
    pub order: Vec<OrderItem>,
}

impl WindowDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, column: &str) -> OrmResult<Self> {
        self.partition_by.push(ColumnRef::parse(column)?);
        Ok(self)
    }

    pub fn order(mut self, column: &str, dir: SortDir) -> OrmResult<Self> {
        self.order.push(OrderItem::column(column, Some(dir))?);
        Ok(self)
    }

    pub fn order_raw(mut self, raw: RawSql) -> Self {
        self.order.push(OrderItem::Raw(raw));
        self
    }

    pub(crate) fn write_sql(
        &self,
        out: &mut String,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<()> {
        out.push('(');
        if !self.partition_by.is_empty() {
            out.push_str("PARTITION BY ");
            for (i, column) in self.partition_by.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                column.write_sql(out, qualifier);
            }
        }
        if !self.order.is_empty() {
            if !self.partition_by.is_empty() {
                out.push(' ');
            }
            out.push_str("ORDER BY ");
            write_order_list(&self.order, out, qualifier, params)?;
        }
        out.push(')');
        Ok(())
    }
}

/// The window a function runs over.
#[derive(Debug, Clone)]
pub enum Over {
    /// A window declared with [`Query::window`].
    Named(String),
    Def(WindowDef),
}

/// `fn(arg) OVER ...`
#[derive(Debug, Clone)]
pub struct WindowCall {
    pub(crate) function: String,
    pub(crate) arg: Option<ColumnRef>,
    pub(crate) over: Over,
}

impl WindowCall {
    pub(crate) fn write_sql(&self, out: &mut String, qualifier: Option<&str>, params: &mut ParamList) -> OrmResult<()> {
        out.push_str(&self.function);
        out.push('(');
        if let Some(arg) = &self.arg {
            arg.write_sql(out, qualifier);
        }
        out.push_str(") OVER ");
        match &self.over {
            Over::Named(name) => out.push_str(&quote(name)),
            Over::Def(def) => def.write_sql(out, qualifier, params)?,
        }
        Ok(())
    }
}

/// Write `"w" AS (...), "v" AS (...)`.
pub(crate) fn write_windows(
    windows: &[(String, WindowDef)],
    out: &mut String,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<()> {
    for (i, (name, def)) in windows.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote(name));
        out.push_str(" AS ");
        def.write_sql(out, qualifier, params)?;
    }
    Ok(())
}

impl Query {
    /// Declare a named window: `WINDOW "name" AS (...)`.
    pub fn window(&self, name: &str, def: WindowDef) -> Self {
        let name = name.to_string();
        self.map(|s| s.windows.push((name, def)))
    }

    /// Select a window function: `row_number() OVER "w" AS "rank"`.
    pub fn select_over(
        &self,
        function: &str,
        column: Option<&str>,
        over: Over,
        alias: &str,
    ) -> OrmResult<Self> {
        check_function_name(function)?;
        let call = WindowCall {
            function: function.to_string(),
            arg: column.map(ColumnRef::parse).transpose()?,
            over,
        };
        let item = SelectItem::new(SelectExpr::Window(call), Some(alias.to_string()));
        Ok(self.map(|s| push_select(s, vec![item])))
    }
}
