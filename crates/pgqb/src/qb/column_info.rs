//! Column introspection through `information_schema.columns`.

use crate::error::OrmResult;
use crate::qb::Query;
use crate::qb::param::ParamList;
use crate::qb::state::{ReturnType, Statement};
use crate::schema::TableSchema;
use crate::value::SqlValue;

impl Query {
    /// Describe every column of the table, or only `column` as a single row.
    pub fn column_info(&self, column: Option<&str>) -> OrmResult<Self> {
        self.require_table("column info")?;
        let column = column.map(str::to_string);
        Ok(self.map(|s| {
            s.return_type = if column.is_some() {
                ReturnType::OneOrThrow
            } else {
                ReturnType::All
            };
            s.statement = Statement::ColumnInfo(column);
        }))
    }
}

pub(crate) fn write_column_info(
    table: &TableSchema,
    column: Option<&str>,
    out: &mut String,
    params: &mut ParamList,
) {
    out.push_str("SELECT * FROM information_schema.columns WHERE table_name = ");
    out.push_str(&params.placeholder(SqlValue::Text(table.name.clone())));
    out.push_str(" AND table_catalog = current_database()");
    match &table.schema {
        Some(schema) => {
            out.push_str(" AND table_schema = ");
            out.push_str(&params.placeholder(SqlValue::Text(schema.clone())));
        }
        None => out.push_str(" AND table_schema = current_schema()"),
    }
    if let Some(column) = column {
        out.push_str(" AND column_name = ");
        out.push_str(&params.placeholder(SqlValue::Text(column.to_string())));
    }
}
