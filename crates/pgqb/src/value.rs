//! Values that flow into compiled statements.
//!
//! - [`SqlValue`]: a typed literal that is always sent as a bound parameter.
//! - [`RawSql`]: an unescaped SQL fragment with `?` placeholders for its own values.
//! - [`ColumnRef`]: a reference to a (possibly qualified) column.
//! - [`Value`]: the tagged union of the three, accepted by builder methods.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

use crate::error::OrmResult;
use crate::ident::{Ident, IdentPart, quote};

/// A literal parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact `numeric`.
    Decimal(Decimal),
    Text(String),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to a JSON value, used when mapping records onto serde models.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Bool(v) => serde_json::Value::Bool(*v),
            SqlValue::Int(v) => serde_json::Value::from(*v),
            SqlValue::Float(v) => serde_json::Value::from(*v),
            SqlValue::Decimal(v) => serde_json::Value::String(v.to_string()),
            SqlValue::Text(v) => serde_json::Value::String(v.clone()),
            SqlValue::Json(v) => v.clone(),
            SqlValue::Uuid(v) => serde_json::Value::String(v.to_string()),
            SqlValue::Timestamp(v) => serde_json::Value::String(v.to_rfc3339()),
            SqlValue::Date(v) => serde_json::Value::String(v.to_string()),
            SqlValue::Bytes(v) => serde_json::Value::from(v.clone()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*v).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*v).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Decimal(v) => match *ty {
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::String(v.to_string()).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Text(v) => match *ty {
                Type::NUMERIC => v.parse::<Decimal>()?.to_sql(ty, out),
                Type::UUID => Uuid::parse_str(v)?.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::String(v.clone()).to_sql(ty, out),
                _ => v.as_str().to_sql(ty, out),
            },
            SqlValue::Json(v) => v.to_sql(ty, out),
            SqlValue::Uuid(v) => match *ty {
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Date(v) => v.to_sql(ty, out),
            SqlValue::Bytes(v) => v.as_slice().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

macro_rules! impl_sql_value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from($v: $ty) -> Self {
                    $body
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Literal(SqlValue::from(v))
                }
            }
        )*
    };
}

impl_sql_value_from! {
    bool => |v| SqlValue::Bool(v),
    i16 => |v| SqlValue::Int(i64::from(v)),
    i32 => |v| SqlValue::Int(i64::from(v)),
    i64 => |v| SqlValue::Int(v),
    u32 => |v| SqlValue::Int(i64::from(v)),
    f32 => |v| SqlValue::Float(f64::from(v)),
    f64 => |v| SqlValue::Float(v),
    Decimal => |v| SqlValue::Decimal(v),
    &str => |v| SqlValue::Text(v.to_string()),
    String => |v| SqlValue::Text(v),
    serde_json::Value => |v| SqlValue::Json(v),
    Uuid => |v| SqlValue::Uuid(v),
    DateTime<Utc> => |v| SqlValue::Timestamp(v),
    NaiveDate => |v| SqlValue::Date(v),
    Vec<u8> => |v| SqlValue::Bytes(v),
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl From<SqlValue> for Value {
    fn from(v: SqlValue) -> Self {
        Value::Literal(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        Value::Literal(SqlValue::from(v))
    }
}

/// A raw SQL fragment. `?` placeholders are bound to `values` in order.
///
/// The fragment is spliced verbatim; keeping user input out of `sql` is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }
}

/// Shorthand for [`RawSql::new`].
pub fn raw(sql: impl Into<String>) -> RawSql {
    RawSql::new(sql)
}

impl From<RawSql> for Value {
    fn from(v: RawSql) -> Self {
        Value::Raw(v)
    }
}

/// A column reference, optionally qualified with a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// Parse `column`, `table.column`, `*` or `table.*`.
    pub fn parse(s: &str) -> OrmResult<Self> {
        let ident = Ident::parse(s)?;
        let name_of = |part: &IdentPart| match part {
            IdentPart::Name(n) => n.clone(),
            IdentPart::Star => "*".to_string(),
        };
        match ident.parts.as_slice() {
            [column] => Ok(Self {
                table: None,
                name: name_of(column),
            }),
            [table, column] => Ok(Self {
                table: Some(name_of(table)),
                name: name_of(column),
            }),
            _ => Err(crate::error::OrmError::construction(format!(
                "Column reference must be `column` or `table.column`, got '{s}'"
            ))),
        }
    }

    pub fn is_star(&self) -> bool {
        self.name == "*"
    }

    /// Qualify with `table` when the reference has no qualifier yet.
    pub fn or_table(mut self, table: &str) -> Self {
        if self.table.is_none() {
            self.table = Some(table.to_string());
        }
        self
    }

    /// Render with `default_table` (already quoted) as qualifier for unqualified references.
    pub(crate) fn write_sql(&self, out: &mut String, default_table: Option<&str>) {
        match (&self.table, default_table) {
            (Some(table), _) => {
                out.push_str(&quote(table));
                out.push('.');
            }
            (None, Some(quoted)) => {
                out.push_str(quoted);
                out.push('.');
            }
            (None, None) => {}
        }
        if self.is_star() {
            out.push('*');
        } else {
            out.push_str(&quote(&self.name));
        }
    }

    pub(crate) fn to_sql(&self, default_table: Option<&str>) -> String {
        let mut out = String::new();
        self.write_sql(&mut out, default_table);
        out
    }
}

/// A value accepted wherever a builder takes an operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Bound as `$n`.
    Literal(SqlValue),
    /// Spliced verbatim; its own values are bound in place.
    Raw(RawSql),
    /// Rendered as a quoted column reference.
    Column(ColumnRef),
}

impl Value {
    /// Reference a column by `column` or `table.column`.
    pub fn column(s: &str) -> OrmResult<Self> {
        ColumnRef::parse(s).map(Value::Column)
    }
}

impl From<ColumnRef> for Value {
    fn from(v: ColumnRef) -> Self {
        Value::Column(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_ref_parse() {
        let c = ColumnRef::parse("user.id").unwrap();
        assert_eq!(c, ColumnRef::qualified("user", "id"));
        assert_eq!(c.to_sql(None), r#""user"."id""#);

        let c = ColumnRef::parse("name").unwrap();
        assert_eq!(c.to_sql(Some(r#""u""#)), r#""u"."name""#);
        assert_eq!(c.to_sql(None), r#""name""#);

        assert!(ColumnRef::parse("a.b.c").is_err());
    }

    #[test]
    fn column_ref_star() {
        let c = ColumnRef::parse("*").unwrap();
        assert!(c.is_star());
        assert_eq!(c.to_sql(Some(r#""user""#)), r#""user".*"#);
    }

    #[test]
    fn numeric_parameters_are_exact() {
        use tokio_postgres::types::FromSql;

        let encode = |value: SqlValue| {
            let mut buf = BytesMut::new();
            value.to_sql(&Type::NUMERIC, &mut buf).unwrap();
            Decimal::from_sql(&Type::NUMERIC, &buf).unwrap()
        };
        let price: Decimal = "19.99".parse().unwrap();
        assert_eq!(encode(SqlValue::from(price)), price);
        assert_eq!(encode(SqlValue::Text("19.99".into())), price);
        assert_eq!(encode(SqlValue::Float(2.5)), Decimal::new(25, 1));
        assert_eq!(SqlValue::Decimal(price).to_json(), serde_json::json!("19.99"));

        let mut buf = BytesMut::new();
        assert!(SqlValue::Text("abc".into()).to_sql(&Type::NUMERIC, &mut buf).is_err());
    }

    #[test]
    fn literal_conversions() {
        assert_eq!(SqlValue::from(5i32), SqlValue::Int(5));
        assert_eq!(SqlValue::from(None::<i32>), SqlValue::Null);
        assert_eq!(Value::from("a"), Value::Literal(SqlValue::Text("a".into())));
        assert_eq!(Value::from(raw("now()")), Value::Raw(RawSql::new("now()")));
    }

    #[test]
    fn to_json_mapping() {
        assert_eq!(SqlValue::Int(3).to_json(), serde_json::json!(3));
        assert_eq!(SqlValue::Null.to_json(), serde_json::Value::Null);
        assert_eq!(
            SqlValue::Json(serde_json::json!({"a": 1})).to_json(),
            serde_json::json!({"a": 1})
        );
    }

    #[test]
    fn encodes_int_for_narrow_columns() {
        let mut buf = BytesMut::new();
        SqlValue::Int(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &7i32.to_be_bytes());

        let mut buf = BytesMut::new();
        assert!(SqlValue::Int(i64::MAX).to_sql(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn encodes_null() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            SqlValue::Null.to_sql(&Type::TEXT, &mut buf).unwrap(),
            IsNull::Yes
        ));
    }
}
