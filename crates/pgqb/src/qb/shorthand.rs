//! JSON object shorthand for conditions.
//!
//! WHERE shorthand maps column names to a scalar (equality), `null` (`IS NULL`) or an
//! operator map:
//!
//! ```ignore
//! json!({ "name": "John", "age": { "gt": 18, "lt": 65 }, "deletedAt": null })
//! json!({ "OR": [{ "id": 1 }, { "id": 2 }], "NOT": { "role": "admin" } })
//! ```
//!
//! HAVING shorthand maps aggregate function names to either a number (`count(*) = 5`) or to
//! per-column conditions with aggregate options:
//!
//! ```ignore
//! json!({ "count": { "id": { "equals": 10, "distinct": true, "order": { "name": "ASC" } } } })
//! ```
//!
//! Shorthand is parsed once, at the builder call, into [`ConditionNode`]s. Unknown operator
//! keys and malformed values are construction errors.

use serde_json::{Map, Value as Json};

use crate::error::{OrmError, OrmResult};
use crate::qb::expr::{AggregateCondition, ConditionNode, Operand, Operator, WhereGroups};
use crate::qb::order::{OrderItem, SortDir};
use crate::value::{RawSql, SqlValue, Value};

fn malformed(message: impl std::fmt::Display) -> OrmError {
    OrmError::construction(format!("Malformed condition shorthand: {message}"))
}

/// Convert a JSON scalar to a literal.
pub(crate) fn literal(value: &Json) -> SqlValue {
    match value {
        Json::Null => SqlValue::Null,
        Json::Bool(b) => SqlValue::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => SqlValue::Text(s.clone()),
        Json::Array(_) | Json::Object(_) => SqlValue::Json(value.clone()),
    }
}

fn as_object<'a>(value: &'a Json, what: &str) -> OrmResult<&'a Map<String, Json>> {
    value
        .as_object()
        .ok_or_else(|| malformed(format!("{what} must be a JSON object")))
}

/// Parse a WHERE shorthand object into an AND node.
pub fn parse_where(value: &Json) -> OrmResult<ConditionNode> {
    let object = as_object(value, "where")?;
    let mut nodes = Vec::with_capacity(object.len());
    for (key, value) in object {
        match key.as_str() {
            "AND" => nodes.push(ConditionNode::And(parse_where_list(value)?)),
            "OR" => nodes.push(ConditionNode::Or(parse_where_list(value)?)),
            "NOT" => nodes.push(ConditionNode::not(ConditionNode::And(parse_where_list(value)?))),
            column => nodes.extend(parse_column(column, value)?),
        }
    }
    Ok(ConditionNode::And(nodes))
}

fn parse_where_list(value: &Json) -> OrmResult<Vec<ConditionNode>> {
    match value {
        Json::Array(items) => items.iter().map(parse_where).collect(),
        Json::Object(_) => Ok(vec![parse_where(value)?]),
        _ => Err(malformed("AND/OR/NOT take an object or an array of objects")),
    }
}

fn parse_column(column: &str, value: &Json) -> OrmResult<Vec<ConditionNode>> {
    match value {
        Json::Object(ops) => {
            if ops.is_empty() {
                return Err(malformed(format!("empty operator map for '{column}'")));
            }
            ops.iter()
                .map(|(key, operand)| {
                    let op = Operator::from_key(key)?;
                    ConditionNode::compare(column, op, parse_operand(op, operand)?)
                })
                .collect()
        }
        scalar => Ok(vec![ConditionNode::eq(column, literal(scalar))?]),
    }
}

fn parse_operand(op: Operator, value: &Json) -> OrmResult<Operand> {
    match op {
        Operator::In | Operator::NotIn => match value {
            Json::Array(items) => Ok(Operand::List(
                items.iter().map(|v| Value::Literal(literal(v))).collect(),
            )),
            _ => Err(malformed(format!("{op:?} takes an array"))),
        },
        Operator::Between => match value.as_array().map(Vec::as_slice) {
            Some([from, to]) => Ok(Operand::Range(
                Value::Literal(literal(from)),
                Value::Literal(literal(to)),
            )),
            _ => Err(malformed("between takes a two-element array")),
        },
        Operator::JsonSupersetOf | Operator::JsonSubsetOf => {
            Ok(Operand::Value(Value::Literal(SqlValue::Json(value.clone()))))
        }
        _ => match value {
            Json::Array(_) | Json::Object(_) => {
                Err(malformed(format!("{op:?} takes a scalar value")))
            }
            scalar => Ok(Operand::Value(Value::Literal(literal(scalar)))),
        },
    }
}

/// Aggregate option keys accepted next to operators.
const AGGREGATE_OPTIONS: &[&str] = &["distinct", "order", "filter", "filterOr", "withinGroup"];

/// Parse a HAVING shorthand object into an AND node.
pub fn parse_having(value: &Json) -> OrmResult<ConditionNode> {
    let object = as_object(value, "having")?;
    let mut nodes = Vec::new();
    for (function, spec) in object {
        match spec {
            Json::Number(n) if function == "count" => {
                // Numbers are inlined; they never come from an untrusted string.
                let agg = AggregateCondition::new(function)?;
                nodes.push(agg.compare(Operator::Equals, RawSql::new(n.to_string()))?);
            }
            Json::Object(columns) => {
                for (column, condition) in columns {
                    nodes.extend(parse_aggregate(function, column, condition)?);
                }
            }
            _ => {
                return Err(malformed(format!(
                    "aggregate '{function}' takes an object of column conditions"
                )));
            }
        }
    }
    Ok(ConditionNode::And(nodes))
}

fn parse_aggregate(function: &str, column: &str, condition: &Json) -> OrmResult<Vec<ConditionNode>> {
    let mut base = AggregateCondition::new(function)?.column(column)?;
    let ops = match condition {
        Json::Object(map) => map,
        scalar => return Ok(vec![base.compare(Operator::Equals, literal(scalar))?]),
    };

    if let Some(distinct) = ops.get("distinct") {
        base.distinct = distinct.as_bool().ok_or_else(|| malformed("distinct takes a boolean"))?;
    }
    if let Some(within) = ops.get("withinGroup") {
        base.within_group = within.as_bool().ok_or_else(|| malformed("withinGroup takes a boolean"))?;
    }
    if let Some(order) = ops.get("order") {
        for (col, dir) in as_object(order, "order")? {
            let dir = dir.as_str().ok_or_else(|| malformed("order direction must be a string"))?;
            base.order.push(OrderItem::column(col, Some(SortDir::parse(dir)?))?);
        }
    }
    let mut filter = WhereGroups::default();
    if let Some(value) = ops.get("filter") {
        filter.and(parse_where(value)?);
    }
    if let Some(value) = ops.get("filterOr") {
        let items = value
            .as_array()
            .ok_or_else(|| malformed("filterOr takes an array of objects"))?;
        for item in items {
            filter.or(parse_where(item)?);
        }
    }
    base.filter = filter;

    let mut nodes = Vec::new();
    for (key, operand) in ops {
        if AGGREGATE_OPTIONS.contains(&key.as_str()) {
            continue;
        }
        let op = Operator::from_key(key)?;
        nodes.push(base.clone().compare(op, parse_operand(op, operand)?)?);
    }
    if nodes.is_empty() {
        return Err(malformed(format!(
            "aggregate '{function}' on '{column}' has no comparison"
        )));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::param::ParamList;
    use serde_json::json;

    fn build(node: &ConditionNode) -> (String, Vec<SqlValue>) {
        let mut params = ParamList::new();
        let sql = node
            .build(Some(r#""user""#), &mut params)
            .unwrap()
            .unwrap_or_default();
        (sql, params.into_values())
    }

    #[test]
    fn scalar_and_null_values() {
        let node = parse_where(&json!({ "name": "John", "deletedAt": null })).unwrap();
        let (sql, values) = build(&node);
        assert_eq!(sql, r#""user"."name" = $1 AND "user"."deletedAt" IS NULL"#);
        assert_eq!(values, vec![SqlValue::Text("John".into())]);
    }

    #[test]
    fn operator_maps() {
        let node = parse_where(&json!({ "age": { "gt": 18, "lt": 65 }, "id": { "in": [1, 2] } })).unwrap();
        let (sql, values) = build(&node);
        assert_eq!(
            sql,
            r#""user"."age" > $1 AND "user"."age" < $2 AND "user"."id" IN ($3, $4)"#
        );
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn logical_keys() {
        let node = parse_where(&json!({ "OR": [{ "id": 1 }, { "id": 2 }], "NOT": { "role": "admin" } })).unwrap();
        let (sql, _) = build(&node);
        assert_eq!(
            sql,
            r#"("user"."id" = $1 OR "user"."id" = $2) AND NOT ("user"."role" = $3)"#
        );
    }

    #[test]
    fn unknown_operator_fails_fast() {
        let err = parse_where(&json!({ "age": { "greater": 1 } })).unwrap_err();
        assert!(err.is_construction());
        assert!(parse_where(&json!([1, 2])).is_err());
        assert!(parse_where(&json!({ "age": {} })).is_err());
        assert!(parse_where(&json!({ "id": { "in": 1 } })).is_err());
    }

    #[test]
    fn having_count_number_is_inlined() {
        let (sql, values) = build(&parse_having(&json!({ "count": 5 })).unwrap());
        assert_eq!(sql, "count(*) = 5");
        assert!(values.is_empty());
        assert!(parse_having(&json!({ "sum": 5 })).is_err());
    }

    #[test]
    fn having_column_operators() {
        let (sql, values) = build(&parse_having(&json!({ "sum": { "id": { "gt": 5, "lt": 20 } } })).unwrap());
        assert_eq!(sql, r#"sum("user"."id") > $1 AND sum("user"."id") < $2"#);
        assert_eq!(values, vec![SqlValue::Int(5), SqlValue::Int(20)]);
    }

    #[test]
    fn having_options() {
        let node = parse_having(&json!({
            "count": { "id": { "equals": 10, "distinct": true } }
        }))
        .unwrap();
        assert_eq!(build(&node).0, r#"count(DISTINCT "user"."id") = $1"#);

        let node = parse_having(&json!({
            "count": { "id": { "equals": 10, "order": { "name": "ASC" } } }
        }))
        .unwrap();
        assert_eq!(build(&node).0, r#"count("user"."id" ORDER BY "user"."name" ASC) = $1"#);

        let node = parse_having(&json!({
            "count": { "id": { "equals": 10, "withinGroup": true, "order": { "name": "ASC" } } }
        }))
        .unwrap();
        assert_eq!(
            build(&node).0,
            r#"count("user"."id") WITHIN GROUP (ORDER BY "user"."name" ASC) = $1"#
        );
    }

    #[test]
    fn having_filter_values_precede_comparison() {
        let node = parse_having(&json!({
            "count": { "id": {
                "equals": 10,
                "filter": { "id": { "lt": 10 } },
                "filterOr": [{ "id": { "equals": 15 } }, { "id": { "gt": 20 } }]
            } }
        }))
        .unwrap();
        let (sql, values) = build(&node);
        assert_eq!(
            sql,
            r#"count("user"."id") FILTER (WHERE "user"."id" < $1 OR "user"."id" = $2 OR "user"."id" > $3) = $4"#
        );
        assert_eq!(
            values,
            vec![SqlValue::Int(10), SqlValue::Int(15), SqlValue::Int(20), SqlValue::Int(10)]
        );
    }
}
