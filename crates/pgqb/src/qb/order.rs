//! ORDER BY items, shared by the statement ORDER BY, windows and ordered aggregates.

use crate::error::{OrmError, OrmResult};
use crate::qb::param::ParamList;
use crate::qb::query::Query;
use crate::value::{ColumnRef, RawSql};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl SortDir {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
            SortDir::AscNullsFirst => "ASC NULLS FIRST",
            SortDir::AscNullsLast => "ASC NULLS LAST",
            SortDir::DescNullsFirst => "DESC NULLS FIRST",
            SortDir::DescNullsLast => "DESC NULLS LAST",
        }
    }

    /// Parse `ASC`, `desc`, `ASC NULLS FIRST`, ...
    pub fn parse(s: &str) -> OrmResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDir::Asc),
            "DESC" => Ok(SortDir::Desc),
            "ASC NULLS FIRST" => Ok(SortDir::AscNullsFirst),
            "ASC NULLS LAST" => Ok(SortDir::AscNullsLast),
            "DESC NULLS FIRST" => Ok(SortDir::DescNullsFirst),
            "DESC NULLS LAST" => Ok(SortDir::DescNullsLast),
            _ => Err(OrmError::construction(format!("Unknown sort direction '{s}'"))),
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderItem {
    Column(ColumnRef, Option<SortDir>),
    Raw(RawSql),
}

impl OrderItem {
    /// `column` or `table.column` with an optional direction.
    pub fn column(column: &str, dir: Option<SortDir>) -> OrmResult<Self> {
        Ok(OrderItem::Column(ColumnRef::parse(column)?, dir))
    }

    pub(crate) fn write_sql(
        &self,
        out: &mut String,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<()> {
        match self {
            OrderItem::Column(column, dir) => {
                column.write_sql(out, qualifier);
                if let Some(dir) = dir {
                    out.push(' ');
                    out.push_str(dir.as_sql());
                }
                Ok(())
            }
            OrderItem::Raw(raw) => params.push_raw(raw, out),
        }
    }
}

/// Write `a ASC, b DESC` (no leading keyword).
pub(crate) fn write_order_list(
    items: &[OrderItem],
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
    /// Append `ORDER BY column [dir]`.
    pub fn order(&self, column: &str, dir: SortDir) -> OrmResult<Self> {
        let item = OrderItem::column(column, Some(dir))?;
        Ok(self.map(|s| s.order.push(item)))
    }

    /// Append several `ORDER BY` columns without an explicit direction.
    pub fn order_by(&self, columns: &[&str]) -> OrmResult<Self> {
        let items = columns
            .iter()
            .map(|c| OrderItem::column(c, None))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(self.map(|s| s.order.extend(items)))
    }

    /// Append a raw `ORDER BY` expression.
    pub fn order_raw(&self, raw: RawSql) -> Self {
        self.map(|s| s.order.push(OrderItem::Raw(raw)))
    }
}
