//! Table metadata consulted by the builders.
//!
//! A [`TableSchema`] lists the columns of one table, its relations to other tables and the
//! column maintained by the `updated_at` convention. Schemas are registered once in a
//! [`Registry`] and shared by every query handle through `Arc`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{DbConfig, NoPrimaryKey};
use crate::error::{OrmError, OrmResult};
use crate::ident::quote_table;
use crate::value::SqlValue;

/// Column data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric(Option<(u32, u32)>),
    Text,
    Varchar(Option<u32>),
    Json,
    Jsonb,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Bytea,
}

impl ColumnType {
    /// DDL type name.
    pub fn to_sql(&self) -> String {
        match self {
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Numeric(None) => "numeric".to_string(),
            ColumnType::Numeric(Some((precision, scale))) => {
                format!("numeric({precision}, {scale})")
            }
            ColumnType::Text => "text".to_string(),
            ColumnType::Varchar(None) => "varchar".to_string(),
            ColumnType::Varchar(Some(len)) => format!("varchar({len})"),
            ColumnType::Json => "json".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::TimestampTz => "timestamp with time zone".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Bytea => "bytea".to_string(),
        }
    }

    /// Prepare a literal written to a column of this type.
    ///
    /// JSON columns receive every non-null literal as a JSON value.
    pub fn encode(&self, value: SqlValue) -> SqlValue {
        match (self, value) {
            (ColumnType::Json | ColumnType::Jsonb, SqlValue::Null) => SqlValue::Null,
            (ColumnType::Json | ColumnType::Jsonb, SqlValue::Json(v)) => SqlValue::Json(v),
            (ColumnType::Json | ColumnType::Jsonb, other) => SqlValue::Json(other.to_json()),
            (_, other) => other,
        }
    }

    /// Parse a value received in text format.
    pub fn decode(&self, column: &str, text: &str) -> OrmResult<SqlValue> {
        let fail = |e: &dyn std::fmt::Display| OrmError::decode(column, e.to_string());
        match self {
            ColumnType::Boolean => Ok(SqlValue::Bool(text.starts_with('t'))),
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => text
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|e| fail(&e)),
            ColumnType::Real | ColumnType::Double => text
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|e| fail(&e)),
            ColumnType::Numeric(_) => text
                .parse::<Decimal>()
                .map(SqlValue::Decimal)
                .map_err(|e| fail(&e)),
            ColumnType::Json | ColumnType::Jsonb => serde_json::from_str(text)
                .map(SqlValue::Json)
                .map_err(|e| fail(&e)),
            ColumnType::Uuid => uuid::Uuid::parse_str(text)
                .map(SqlValue::Uuid)
                .map_err(|e| fail(&e)),
            ColumnType::TimestampTz => DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
                .or_else(|_| DateTime::parse_from_rfc3339(text))
                .map(|v| SqlValue::Timestamp(v.with_timezone(&Utc)))
                .map_err(|e| fail(&e)),
            ColumnType::Timestamp => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .map(|v| SqlValue::Timestamp(v.and_utc()))
                .map_err(|e| fail(&e)),
            ColumnType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(SqlValue::Date)
                .map_err(|e| fail(&e)),
            ColumnType::Bytea => decode_hex_bytea(text)
                .map(SqlValue::Bytes)
                .ok_or_else(|| OrmError::decode(column, "invalid bytea hex literal")),
            ColumnType::Text | ColumnType::Varchar(_) => {
                Ok(SqlValue::Text(text.to_string()))
            }
        }
    }

    fn is_textual(&self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Varchar(_))
    }
}

fn decode_hex_bytea(text: &str) -> Option<Vec<u8>> {
    let hex = text.strip_prefix("\\x")?;
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub has_default: bool,
    pub primary_key: bool,
    /// Hidden columns are left out of the default selection.
    pub hidden: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            has_default: false,
            primary_key: false,
            hidden: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn has_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Relation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The declaring table holds the foreign key.
    BelongsTo,
    /// The target table holds the foreign key; at most one target row.
    HasOne,
    /// The target table holds the foreign key.
    HasMany,
}

/// A relation from the declaring table to `table`.
///
/// For `BelongsTo`, `foreign_key` is a column of the declaring table and `primary_key` a column
/// of the target. For `HasOne`/`HasMany` it is the other way around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationKind,
    pub table: String,
    pub foreign_key: String,
    pub primary_key: String,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub relations: Vec<RelationDef>,
    /// Column set to `now()` by every update.
    pub updated_at: Option<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: Vec::new(),
            relations: Vec::new(),
            updated_at: None,
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Maintain `column` with a trailing `"column" = now()` assignment on update.
    pub fn updated_at(mut self, column: impl Into<String>) -> Self {
        self.updated_at = Some(column.into());
        self
    }

    pub fn belongs_to(
        self,
        name: &str,
        table: &str,
        foreign_key: &str,
        primary_key: &str,
    ) -> Self {
        self.relation(RelationKind::BelongsTo, name, table, foreign_key, primary_key)
    }

    pub fn has_one(self, name: &str, table: &str, foreign_key: &str, primary_key: &str) -> Self {
        self.relation(RelationKind::HasOne, name, table, foreign_key, primary_key)
    }

    pub fn has_many(self, name: &str, table: &str, foreign_key: &str, primary_key: &str) -> Self {
        self.relation(RelationKind::HasMany, name, table, foreign_key, primary_key)
    }

    fn relation(
        mut self,
        kind: RelationKind,
        name: &str,
        table: &str,
        foreign_key: &str,
        primary_key: &str,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.to_string(),
            kind,
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            primary_key: primary_key.to_string(),
        });
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns selected when a query selects nothing explicitly.
    ///
    /// `None` means every column (`"table".*`); a list is returned only when some columns are
    /// hidden.
    pub fn default_select(&self) -> Option<Vec<&str>> {
        if !self.columns.iter().any(|c| c.hidden) {
            return None;
        }
        Some(
            self.columns
                .iter()
                .filter(|c| !c.hidden)
                .map(|c| c.name.as_str())
                .collect(),
        )
    }

    /// `"schema"."name"` or `"name"`.
    pub fn quoted_name(&self) -> String {
        quote_table(self.schema.as_deref(), &self.name)
    }

    /// Encode a literal for `column`, or pass it through for unknown columns.
    pub(crate) fn encode(&self, column: &str, value: SqlValue) -> SqlValue {
        match self.get_column(column) {
            Some(def) => def.ty.encode(value),
            None => value,
        }
    }

    /// Decode a text-format result value for `column` when its type is not textual.
    pub(crate) fn decode_text(&self, column: &str, value: SqlValue) -> OrmResult<SqlValue> {
        match (self.get_column(column), value) {
            (Some(def), SqlValue::Text(text)) if !def.ty.is_textual() => {
                def.ty.decode(column, &text)
            }
            (_, value) => Ok(value),
        }
    }
}

/// A validated set of table schemas.
#[derive(Debug, Default)]
pub struct Registry {
    tables: HashMap<String, Arc<TableSchema>>,
}

impl Registry {
    /// Validate and register `tables`.
    ///
    /// Tables without a primary key are handled per [`DbConfig::no_primary_key`]; relations must
    /// point at registered tables.
    pub fn new(tables: Vec<TableSchema>, config: &DbConfig) -> OrmResult<Self> {
        let mut map = HashMap::with_capacity(tables.len());
        for mut table in tables {
            if table.schema.is_none() {
                table.schema = config.schema.clone();
            }
            if table.primary_keys().is_empty() {
                let message = format!("Table {} has no primary key", table.name);
                match config.no_primary_key {
                    NoPrimaryKey::Error => return Err(OrmError::Config(message)),
                    NoPrimaryKey::Warn => tracing::warn!(target: "pgqb", "{message}"),
                    NoPrimaryKey::Ignore => {}
                }
            }
            let name = table.name.clone();
            if map.insert(name.clone(), Arc::new(table)).is_some() {
                return Err(OrmError::Config(format!("Table {name} is registered twice")));
            }
        }

        for table in map.values() {
            for relation in &table.relations {
                if !map.contains_key(&relation.table) {
                    return Err(OrmError::Config(format!(
                        "Relation {}.{} points at unknown table {}",
                        table.name, relation.name, relation.table
                    )));
                }
            }
        }

        Ok(Self { tables: map })
    }

    pub fn get(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.tables.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> TableSchema {
        TableSchema::new("user")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("name", ColumnType::Text))
            .column(ColumnDef::new("password", ColumnType::Text).hidden())
    }

    #[test]
    fn ddl_names() {
        assert_eq!(ColumnType::Varchar(Some(255)).to_sql(), "varchar(255)");
        assert_eq!(ColumnType::Numeric(Some((10, 2))).to_sql(), "numeric(10, 2)");
        assert_eq!(ColumnType::TimestampTz.to_sql(), "timestamp with time zone");
    }

    #[test]
    fn boolean_decodes_first_char() {
        let ty = ColumnType::Boolean;
        assert_eq!(ty.decode("active", "t").unwrap(), SqlValue::Bool(true));
        assert_eq!(ty.decode("active", "true").unwrap(), SqlValue::Bool(true));
        assert_eq!(ty.decode("active", "f").unwrap(), SqlValue::Bool(false));
    }

    #[test]
    fn decode_errors_name_column() {
        let err = ColumnType::Integer.decode("age", "x").unwrap_err();
        assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "age"));
    }

    #[test]
    fn decode_timestamps_and_bytes() {
        let v = ColumnType::TimestampTz
            .decode("at", "2024-01-02 03:04:05.5+00")
            .unwrap();
        assert!(matches!(v, SqlValue::Timestamp(_)));
        assert_eq!(
            ColumnType::Bytea.decode("b", "\\x0aff").unwrap(),
            SqlValue::Bytes(vec![0x0a, 0xff])
        );
    }

    #[test]
    fn numeric_text_decodes_exactly() {
        let v = ColumnType::Numeric(Some((10, 2))).decode("price", "12345678.90").unwrap();
        assert_eq!(v, SqlValue::Decimal(rust_decimal::Decimal::new(1_234_567_890, 2)));
        assert!(ColumnType::Numeric(None).decode("price", "NaN").is_err());
    }

    #[test]
    fn json_columns_encode_as_json() {
        assert_eq!(
            ColumnType::Jsonb.encode(SqlValue::Text("x".into())),
            SqlValue::Json(serde_json::json!("x"))
        );
        assert_eq!(ColumnType::Text.encode(SqlValue::Int(1)), SqlValue::Int(1));
    }

    #[test]
    fn default_select_skips_hidden() {
        assert_eq!(user().default_select(), Some(vec!["id", "name"]));
        let plain = TableSchema::new("t").column(ColumnDef::new("id", ColumnType::Integer));
        assert_eq!(plain.default_select(), None);
    }

    #[test]
    fn registry_primary_key_policy() {
        let no_pk = TableSchema::new("log").column(ColumnDef::new("line", ColumnType::Text));

        let err = Registry::new(vec![no_pk.clone()], &DbConfig::new()).unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));

        let config = DbConfig::new().no_primary_key(NoPrimaryKey::Ignore);
        let registry = Registry::new(vec![no_pk], &config).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_checks_relation_targets() {
        let table = user().has_many("posts", "post", "authorId", "id");
        assert!(Registry::new(vec![table], &DbConfig::new()).is_err());
    }

    #[test]
    fn registry_applies_default_schema() {
        let registry = Registry::new(vec![user()], &DbConfig::new().schema("app")).unwrap();
        let table = registry.get("user").unwrap();
        assert_eq!(table.quoted_name(), r#""app"."user""#);
    }
}
