//! JSON selections.
//!
//! [`JsonExpr`] nests: the target of a `jsonb_set` may itself be a `jsonb_insert`, and so on.
//! Paths are written as text array literals (`'{tags, 0}'`); values are bound as JSON.

use serde_json::Value as Json;

use crate::error::{OrmError, OrmResult};
use crate::qb::Query;
use crate::qb::param::ParamList;
use crate::qb::select::{SelectExpr, SelectItem, push_select};
use crate::qb::state::{FromSource, QueryState, ReturnType};
use crate::value::{ColumnRef, RawSql, SqlValue};

/// One element of a JSON path.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonKey {
    Key(String),
    Index(i64),
}

impl From<&str> for JsonKey {
    fn from(key: &str) -> Self {
        JsonKey::Key(key.to_string())
    }
}

impl From<String> for JsonKey {
    fn from(key: String) -> Self {
        JsonKey::Key(key)
    }
}

impl From<i64> for JsonKey {
    fn from(index: i64) -> Self {
        JsonKey::Index(index)
    }
}

impl From<i32> for JsonKey {
    fn from(index: i32) -> Self {
        JsonKey::Index(i64::from(index))
    }
}

/// Render a path as a quoted text array literal.
fn path_literal(path: &[JsonKey]) -> String {
    let elements: Vec<String> = path
        .iter()
        .map(|key| match key {
            JsonKey::Index(i) => i.to_string(),
            JsonKey::Key(k) => array_element(k),
        })
        .collect();
    format!("'{{{}}}'", elements.join(", "))
}

/// Quote an array element when it is not plain, and double single quotes for the literal.
fn array_element(key: &str) -> String {
    let plain = !key.is_empty()
        && !key.eq_ignore_ascii_case("null")
        && key
            .chars()
            .all(|c| !matches!(c, '{' | '}' | ',' | '"' | '\\' | '\'') && !c.is_whitespace());
    let element = if plain {
        key.to_string()
    } else {
        let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    };
    element.replace('\'', "''")
}

#[derive(Debug, Clone)]
pub enum JsonExpr {
    Column(ColumnRef),
    /// `jsonb_set(target, path, value[, true])`
    Set {
        target: Box<JsonExpr>,
        path: Vec<JsonKey>,
        value: Json,
        create_if_missing: bool,
    },
    /// `jsonb_insert(target, path, value[, true])`
    Insert {
        target: Box<JsonExpr>,
        path: Vec<JsonKey>,
        value: Json,
        insert_after: bool,
    },
    /// `target #- path`
    Remove {
        target: Box<JsonExpr>,
        path: Vec<JsonKey>,
    },
    /// `jsonb_path_query(target, path[, vars, silent])`
    PathQuery {
        target: Box<JsonExpr>,
        path: String,
        vars: Option<Json>,
        silent: bool,
    },
}

impl JsonExpr {
    pub fn column(column: &str) -> OrmResult<Self> {
        Ok(JsonExpr::Column(ColumnRef::parse(column)?))
    }

    pub fn set(self, path: Vec<JsonKey>, value: Json) -> Self {
        JsonExpr::Set {
            target: Box::new(self),
            path,
            value,
            create_if_missing: false,
        }
    }

    /// `jsonb_set(..., true)`: create the key when it is missing.
    pub fn set_or_create(self, path: Vec<JsonKey>, value: Json) -> Self {
        JsonExpr::Set {
            target: Box::new(self),
            path,
            value,
            create_if_missing: true,
        }
    }

    pub fn insert(self, path: Vec<JsonKey>, value: Json) -> Self {
        JsonExpr::Insert {
            target: Box::new(self),
            path,
            value,
            insert_after: false,
        }
    }

    /// `jsonb_insert(..., true)`: insert after the addressed element.
    pub fn insert_after(self, path: Vec<JsonKey>, value: Json) -> Self {
        JsonExpr::Insert {
            target: Box::new(self),
            path,
            value,
            insert_after: true,
        }
    }

    pub fn remove(self, path: Vec<JsonKey>) -> Self {
        JsonExpr::Remove {
            target: Box::new(self),
            path,
        }
    }

    pub fn path_query(self, path: &str) -> Self {
        JsonExpr::PathQuery {
            target: Box::new(self),
            path: path.to_string(),
            vars: None,
            silent: false,
        }
    }

    /// `jsonb_path_query(target, path, vars, silent)`; `vars` feeds the `$name` variables of
    /// the path.
    pub fn path_query_with(self, path: &str, vars: Json, silent: bool) -> Self {
        JsonExpr::PathQuery {
            target: Box::new(self),
            path: path.to_string(),
            vars: Some(vars),
            silent,
        }
    }

    /// The column at the bottom of the nesting.
    pub(crate) fn root_column(&self) -> Option<&ColumnRef> {
        match self {
            JsonExpr::Column(column) => Some(column),
            JsonExpr::Set { target, .. }
            | JsonExpr::Insert { target, .. }
            | JsonExpr::Remove { target, .. }
            | JsonExpr::PathQuery { target, .. } => target.root_column(),
        }
    }

    pub(crate) fn write_sql(&self, out: &mut String, qualifier: Option<&str>, params: &mut ParamList) -> OrmResult<()> {
        match self {
            JsonExpr::Column(column) => column.write_sql(out, qualifier),
            JsonExpr::Set {
                target,
                path,
                value,
                create_if_missing,
            } => {
                out.push_str("jsonb_set(");
                target.write_sql(out, qualifier, params)?;
                out.push_str(", ");
                out.push_str(&path_literal(path));
                out.push_str(", ");
                out.push_str(&params.placeholder(SqlValue::Json(value.clone())));
                if *create_if_missing {
                    out.push_str(", true");
                }
                out.push(')');
            }
            JsonExpr::Insert {
                target,
                path,
                value,
                insert_after,
            } => {
                out.push_str("jsonb_insert(");
                target.write_sql(out, qualifier, params)?;
                out.push_str(", ");
                out.push_str(&path_literal(path));
                out.push_str(", ");
                out.push_str(&params.placeholder(SqlValue::Json(value.clone())));
                if *insert_after {
                    out.push_str(", true");
                }
                out.push(')');
            }
            JsonExpr::Remove { target, path } => {
                target.write_sql(out, qualifier, params)?;
                out.push_str(" #- ");
                out.push_str(&path_literal(path));
            }
            JsonExpr::PathQuery {
                target,
                path,
                vars,
                silent,
            } => {
                out.push_str("jsonb_path_query(");
                target.write_sql(out, qualifier, params)?;
                out.push_str(", ");
                // jsonpath has no text input in the binary protocol; bind text and cast.
                out.push_str(&params.placeholder(SqlValue::Text(path.clone())));
                out.push_str("::text::jsonpath");
                if let Some(vars) = vars {
                    out.push_str(", ");
                    out.push_str(&params.placeholder(SqlValue::Json(vars.clone())));
                    out.push_str(if *silent { ", true" } else { ", false" });
                }
                out.push(')');
            }
        }
        Ok(())
    }
}

impl From<ColumnRef> for JsonExpr {
    fn from(column: ColumnRef) -> Self {
        JsonExpr::Column(column)
    }
}

impl Query {
    /// Select a JSON expression, named `alias` or after its column.
    pub fn select_json(&self, expr: JsonExpr, alias: Option<&str>) -> Self {
        let item = SelectItem::new(SelectExpr::Json(expr), alias.map(str::to_string));
        self.map(|s| push_select(s, vec![item]))
    }

    /// Select `jsonb_set(target, path, value)`.
    pub fn json_set(&self, target: JsonExpr, path: Vec<JsonKey>, value: Json, alias: Option<&str>) -> Self {
        self.select_json(target.set(path, value), alias)
    }

    /// Select `jsonb_insert(target, path, value)`.
    pub fn json_insert(&self, target: JsonExpr, path: Vec<JsonKey>, value: Json, alias: Option<&str>) -> Self {
        self.select_json(target.insert(path, value), alias)
    }

    /// Select `target #- path`.
    pub fn json_remove(&self, target: JsonExpr, path: Vec<JsonKey>, alias: Option<&str>) -> Self {
        self.select_json(target.remove(path), alias)
    }

    /// Select `jsonb_path_query(target, path) AS "alias"`.
    pub fn json_path_query(&self, target: JsonExpr, path: &str, alias: &str) -> OrmResult<Self> {
        if alias.is_empty() {
            return Err(OrmError::construction("jsonb_path_query needs an alias"));
        }
        Ok(self.select_json(target.path_query(path), Some(alias)))
    }

    /// Wrap the query to return its rows as one JSON value.
    ///
    /// Many rows become `COALESCE(json_agg(row_to_json("t".*)), '[]')`; a query returning one
    /// row becomes `row_to_json("t".*)`.
    pub fn json(&self) -> Self {
        let inner = self.state().clone();
        let (expr, return_type) = match inner.return_type {
            ReturnType::One => (r#"row_to_json("t".*)"#, ReturnType::Value),
            ReturnType::OneOrThrow => (r#"row_to_json("t".*)"#, ReturnType::ValueOrThrow),
            _ => (
                r#"COALESCE(json_agg(row_to_json("t".*)), '[]')"#,
                ReturnType::ValueOrThrow,
            ),
        };
        let state = QueryState {
            table: inner.table.clone(),
            alias: Some("t".to_string()),
            select: vec![SelectItem::new(
                SelectExpr::Raw(RawSql::new(expr)),
                Some("json".to_string()),
            )],
            return_type,
            from: Some(FromSource::Query(Box::new(inner))),
            ..QueryState::default()
        };
        self.derive(state)
    }
}
