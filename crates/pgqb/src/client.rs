//! The adapter boundary: send compiled SQL, get rows back.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::{TryStreamExt, pin_mut};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Row, RowStream};
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};
use crate::value::SqlValue;

/// One result row: column names with their values, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Record {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn first(&self) -> Option<&SqlValue> {
        self.values.first()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    pub(crate) fn map_values(
        self,
        mut f: impl FnMut(&str, SqlValue) -> OrmResult<SqlValue>,
    ) -> OrmResult<Self> {
        let values = self
            .columns
            .iter()
            .zip(self.values)
            .map(|(column, value)| f(column, value))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(Self {
            columns: self.columns,
            values,
        })
    }

    /// The row as a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }

    /// Map the row onto a serde model.
    pub fn deserialize<T: DeserializeOwned>(&self) -> OrmResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

/// Rows returned by one statement, plus the affected row count reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub row_count: u64,
    pub rows: Vec<Record>,
}

/// A connection that can run compiled SQL.
///
/// Implemented for `tokio_postgres::Client`, `tokio_postgres::Transaction` and, with the `pool`
/// feature, pooled `deadpool_postgres` clients. Tests can implement it with an in-memory fake.
pub trait Adapter: Send + Sync {
    /// Run `sql` with `params` bound to `$1..$n`.
    fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl std::future::Future<Output = OrmResult<QueryResult>> + Send;

    /// Whether the adapter already runs inside a transaction; the executor then scopes its own
    /// work with a savepoint instead of BEGIN/COMMIT.
    fn in_transaction(&self) -> bool {
        false
    }

    /// Whether consecutive calls are guaranteed to share one session with nothing interleaved.
    ///
    /// A `&tokio_postgres::Client` can be cloned into other tasks, so a `BEGIN` sent through it
    /// might wrap someone else's statements. Such adapters answer `false`, and writes that need
    /// a transaction must go through a `Transaction` instead.
    fn exclusive_session(&self) -> bool {
        true
    }
}

fn decode_column<'a, T>(row: &'a Row, i: usize, name: &str) -> OrmResult<Option<T>>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(i)
        .map_err(|e| OrmError::decode(name, e.to_string()))
}

/// Decode one driver row by column type.
pub(crate) fn record_from_row(row: &Row) -> OrmResult<Record> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            decode_column::<bool>(row, i, name)?.map(SqlValue::Bool)
        } else if *ty == Type::INT2 {
            decode_column::<i16>(row, i, name)?.map(|v| SqlValue::Int(i64::from(v)))
        } else if *ty == Type::INT4 {
            decode_column::<i32>(row, i, name)?.map(|v| SqlValue::Int(i64::from(v)))
        } else if *ty == Type::INT8 {
            decode_column::<i64>(row, i, name)?.map(SqlValue::Int)
        } else if *ty == Type::FLOAT4 {
            decode_column::<f32>(row, i, name)?.map(|v| SqlValue::Float(f64::from(v)))
        } else if *ty == Type::FLOAT8 {
            decode_column::<f64>(row, i, name)?.map(SqlValue::Float)
        } else if *ty == Type::NUMERIC {
            decode_column::<Decimal>(row, i, name)?.map(SqlValue::Decimal)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            decode_column::<serde_json::Value>(row, i, name)?.map(SqlValue::Json)
        } else if *ty == Type::UUID {
            decode_column::<Uuid>(row, i, name)?.map(SqlValue::Uuid)
        } else if *ty == Type::TIMESTAMPTZ {
            decode_column::<DateTime<Utc>>(row, i, name)?.map(SqlValue::Timestamp)
        } else if *ty == Type::TIMESTAMP {
            decode_column::<NaiveDateTime>(row, i, name)?.map(|v| SqlValue::Timestamp(v.and_utc()))
        } else if *ty == Type::DATE {
            decode_column::<NaiveDate>(row, i, name)?.map(SqlValue::Date)
        } else if *ty == Type::BYTEA {
            decode_column::<Vec<u8>>(row, i, name)?.map(SqlValue::Bytes)
        } else if <String as tokio_postgres::types::FromSql>::accepts(ty) {
            decode_column::<String>(row, i, name)?.map(SqlValue::Text)
        } else {
            return Err(OrmError::decode(name, format!("unsupported column type {ty}")));
        };
        columns.push(name.to_string());
        values.push(value.unwrap_or(SqlValue::Null));
    }
    Ok(Record::new(columns, values))
}

async fn collect_rows(stream: RowStream) -> OrmResult<QueryResult> {
    pin_mut!(stream);
    let mut rows = Vec::new();
    while let Some(row) = stream.try_next().await? {
        rows.push(record_from_row(&row)?);
    }
    let row_count = stream.rows_affected().unwrap_or(rows.len() as u64);
    Ok(QueryResult { row_count, rows })
}

fn as_params(params: &[SqlValue]) -> impl ExactSizeIterator<Item = &(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync))
}

impl Adapter for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> OrmResult<QueryResult> {
        let stream = tokio_postgres::Client::query_raw(self, sql, as_params(params)).await?;
        collect_rows(stream).await
    }

    fn exclusive_session(&self) -> bool {
        false
    }
}

impl Adapter for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> OrmResult<QueryResult> {
        let stream = tokio_postgres::Transaction::query_raw(self, sql, as_params(params)).await?;
        collect_rows(stream).await
    }

    fn in_transaction(&self) -> bool {
        true
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl Adapter for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> OrmResult<QueryResult> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        Adapter::query(client, sql, params).await
    }

    fn exclusive_session(&self) -> bool {
        false
    }
}

#[cfg(feature = "pool")]
impl Adapter for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> OrmResult<QueryResult> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        Adapter::query(tx, sql, params).await
    }

    fn in_transaction(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new(
            vec!["id".to_string(), "name".to_string()],
            vec![SqlValue::Int(1), SqlValue::Text("John".to_string())],
        )
    }

    #[test]
    fn get_by_column_name() {
        let record = record();
        assert_eq!(record.get("name"), Some(&SqlValue::Text("John".to_string())));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.first(), Some(&SqlValue::Int(1)));
    }

    #[test]
    fn deserializes_into_models() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct User {
            id: i64,
            name: String,
        }

        let user: User = record().deserialize().unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "John".to_string()
            }
        );
    }

    #[test]
    fn deserialize_errors_are_serialization_errors() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Wrong {
            id: String,
        }

        let err = record().deserialize::<Wrong>().unwrap_err();
        assert!(matches!(err, OrmError::Serialization(_)));
    }
}
