//! Condition trees for WHERE, HAVING and JOIN ... ON.
//!
//! This module provides:
//! - [`ConditionNode`]: AND/OR/NOT groups, comparisons, EXISTS, raw fragments and aggregate
//!   comparisons
//! - [`WhereGroups`]: the `.where_()` / `.or_where()` accumulation stored on a query
//!
//! `build()` writes SQL with `$n` placeholders numbered against the shared [`ParamList`], so
//! nested sub-queries and raw fragments keep their values in textual order. Empty groups
//! produce nothing and are dropped from the output.

use crate::error::{OrmError, OrmResult};
use crate::qb::order::{OrderItem, write_order_list};
use crate::qb::param::ParamList;
use crate::qb::state::QueryState;
use crate::qb::to_sql::write_query;
use crate::value::{ColumnRef, RawSql, SqlValue, Value};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Not,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    ContainsInsensitive,
    StartsWith,
    StartsWithInsensitive,
    EndsWith,
    EndsWithInsensitive,
    Between,
    JsonSupersetOf,
    JsonSubsetOf,
}

impl Operator {
    /// Map a shorthand operator key (`gt`, `notIn`, ...) to an operator.
    pub fn from_key(key: &str) -> OrmResult<Self> {
        Ok(match key {
            "equals" => Operator::Equals,
            "not" => Operator::Not,
            "in" => Operator::In,
            "notIn" => Operator::NotIn,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "contains" => Operator::Contains,
            "containsInsensitive" => Operator::ContainsInsensitive,
            "startsWith" => Operator::StartsWith,
            "startsWithInsensitive" => Operator::StartsWithInsensitive,
            "endsWith" => Operator::EndsWith,
            "endsWithInsensitive" => Operator::EndsWithInsensitive,
            "between" => Operator::Between,
            "jsonSupersetOf" => Operator::JsonSupersetOf,
            "jsonSubsetOf" => Operator::JsonSubsetOf,
            _ => {
                return Err(OrmError::construction(format!(
                    "Unknown operator '{key}'"
                )));
            }
        })
    }

    fn accepts(self, operand: &Operand) -> bool {
        match (self, operand) {
            (Operator::In | Operator::NotIn, Operand::List(_) | Operand::Query(_)) => true,
            (Operator::In | Operator::NotIn, _) => false,
            (Operator::Between, Operand::Range(..)) => true,
            (Operator::Between, _) | (_, Operand::Range(..)) | (_, Operand::List(_)) => false,
            (
                Operator::Equals
                | Operator::Not
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte,
                Operand::Query(_),
            ) => true,
            (_, Operand::Query(_)) => false,
            (_, Operand::Value(_)) => true,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    Range(Value, Value),
    Query(Box<QueryState>),
}

macro_rules! impl_operand_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_operand_from!(
    bool,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    &str,
    String,
    serde_json::Value,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
    chrono::NaiveDate,
    SqlValue,
    RawSql,
    ColumnRef,
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

/// Function names are spliced into SQL, so only plain identifiers are accepted.
pub(crate) fn check_function_name(function: &str) -> OrmResult<()> {
    let valid = !function.is_empty()
        && function
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(OrmError::construction(format!(
            "Invalid function name '{function}'"
        )))
    }
}

/// An aggregate function compared against a value: `count("t"."id") > $1`.
#[derive(Debug, Clone)]
pub struct AggregateCondition {
    pub function: String,
    /// `None` renders `*`.
    pub arg: Option<ColumnRef>,
    pub distinct: bool,
    pub order: Vec<OrderItem>,
    /// Render `order` as `WITHIN GROUP (ORDER BY ...)` instead of inside the call.
    pub within_group: bool,
    pub filter: WhereGroups,
    pub op: Operator,
    pub operand: Operand,
}

impl AggregateCondition {
    /// Start an aggregate condition; the function name must be a plain SQL identifier.
    pub fn new(function: &str) -> OrmResult<Self> {
        check_function_name(function)?;
        Ok(Self {
            function: function.to_string(),
            arg: None,
            distinct: false,
            order: Vec::new(),
            within_group: false,
            filter: WhereGroups::default(),
            op: Operator::Equals,
            operand: Operand::Value(Value::Literal(SqlValue::Null)),
        })
    }

    pub fn column(mut self, column: &str) -> OrmResult<Self> {
        self.arg = Some(ColumnRef::parse(column)?);
        Ok(self)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order(mut self, item: OrderItem) -> Self {
        self.order.push(item);
        self
    }

    pub fn within_group(mut self) -> Self {
        self.within_group = true;
        self
    }

    /// AND a condition into the `FILTER (WHERE ...)` clause.
    pub fn filter(mut self, node: ConditionNode) -> Self {
        self.filter.and(node);
        self
    }

    /// OR a condition group into the `FILTER (WHERE ...)` clause.
    pub fn filter_or(mut self, node: ConditionNode) -> Self {
        self.filter.or(node);
        self
    }

    /// Finish with the comparison.
    pub fn compare(mut self, op: Operator, operand: impl Into<Operand>) -> OrmResult<ConditionNode> {
        let operand = operand.into();
        if !op.accepts(&operand) {
            return Err(OrmError::construction(format!(
                "Operator {op:?} cannot take this operand"
            )));
        }
        self.op = op;
        self.operand = operand;
        Ok(ConditionNode::Aggregate(Box::new(self)))
    }

    fn write_call(&self, out: &mut String, qualifier: Option<&str>, params: &mut ParamList) -> OrmResult<()> {
        out.push_str(&self.function);
        out.push('(');
        if self.distinct {
            out.push_str("DISTINCT ");
        }
        match &self.arg {
            Some(arg) => arg.write_sql(out, qualifier),
            None => out.push('*'),
        }
        if !self.within_group && !self.order.is_empty() {
            out.push_str(" ORDER BY ");
            write_order_list(&self.order, out, qualifier, params)?;
        }
        out.push(')');
        if self.within_group && !self.order.is_empty() {
            out.push_str(" WITHIN GROUP (ORDER BY ");
            write_order_list(&self.order, out, qualifier, params)?;
            out.push(')');
        }
        if let Some(filter) = self.filter.build(qualifier, params)? {
            out.push_str(" FILTER (WHERE ");
            out.push_str(&filter);
            out.push(')');
        }
        Ok(())
    }
}

/// Boolean expression node.
#[derive(Debug, Clone)]
pub enum ConditionNode {
    /// `column op operand`
    Comparison {
        column: ColumnRef,
        op: Operator,
        operand: Operand,
    },
    /// All children must be true.
    And(Vec<ConditionNode>),
    /// At least one child must be true.
    Or(Vec<ConditionNode>),
    /// Negate the inner expression.
    Not(Box<ConditionNode>),
    /// `EXISTS (subquery)`
    Exists(Box<QueryState>),
    /// Raw SQL with `?` placeholders.
    Raw(RawSql),
    /// Aggregate comparison, used by HAVING.
    Aggregate(Box<AggregateCondition>),
}

/// How a built node combines its parts, used to decide on parentheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    And,
    Or,
    Atom,
}

impl ConditionNode {
    /// Create a comparison, checking that the operand fits the operator.
    pub fn compare(column: &str, op: Operator, operand: impl Into<Operand>) -> OrmResult<Self> {
        let operand = operand.into();
        if !op.accepts(&operand) {
            return Err(OrmError::construction(format!(
                "Operator {op:?} cannot take this operand for column '{column}'"
            )));
        }
        Ok(ConditionNode::Comparison {
            column: ColumnRef::parse(column)?,
            op,
            operand,
        })
    }

    /// `column = value` (`IS NULL` for a null literal).
    pub fn eq(column: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Equals, Operand::Value(value.into()))
    }

    /// `column <> value` (`IS NOT NULL` for a null literal).
    pub fn ne(column: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Not, Operand::Value(value.into()))
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Gt, Operand::Value(value.into()))
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Gte, Operand::Value(value.into()))
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Lt, Operand::Value(value.into()))
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Lte, Operand::Value(value.into()))
    }

    pub fn is_null(column: &str) -> OrmResult<Self> {
        Self::eq(column, SqlValue::Null)
    }

    pub fn is_not_null(column: &str) -> OrmResult<Self> {
        Self::ne(column, SqlValue::Null)
    }

    /// `column IN (values...)`
    pub fn in_list<T: Into<Value>>(column: &str, values: Vec<T>) -> OrmResult<Self> {
        let values = values.into_iter().map(Into::into).collect();
        Self::compare(column, Operator::In, Operand::List(values))
    }

    /// `column NOT IN (values...)`
    pub fn not_in<T: Into<Value>>(column: &str, values: Vec<T>) -> OrmResult<Self> {
        let values = values.into_iter().map(Into::into).collect();
        Self::compare(column, Operator::NotIn, Operand::List(values))
    }

    /// `column IN (subquery)`
    pub fn in_query(column: &str, query: &crate::qb::Query) -> OrmResult<Self> {
        Self::compare(column, Operator::In, Operand::Query(Box::new(query.state().clone())))
    }

    /// `column = (subquery)`
    pub fn eq_query(column: &str, query: &crate::qb::Query) -> OrmResult<Self> {
        Self::compare(column, Operator::Equals, Operand::Query(Box::new(query.state().clone())))
    }

    pub fn between(column: &str, from: impl Into<Value>, to: impl Into<Value>) -> OrmResult<Self> {
        Self::compare(column, Operator::Between, Operand::Range(from.into(), to.into()))
    }

    pub fn exists(query: &crate::qb::Query) -> Self {
        ConditionNode::Exists(Box::new(query.state().clone()))
    }

    pub fn raw(raw: RawSql) -> Self {
        ConditionNode::Raw(raw)
    }

    pub fn and(nodes: Vec<ConditionNode>) -> Self {
        ConditionNode::And(nodes)
    }

    pub fn or(nodes: Vec<ConditionNode>) -> Self {
        ConditionNode::Or(nodes)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(node: ConditionNode) -> Self {
        ConditionNode::Not(Box::new(node))
    }

    /// Check if this expression is empty (contains no conditions).
    pub fn is_empty(&self) -> bool {
        match self {
            ConditionNode::And(nodes) | ConditionNode::Or(nodes) => nodes.iter().all(|n| n.is_empty()),
            ConditionNode::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    /// Build the SQL fragment with `$n` placeholders.
    ///
    /// Unqualified columns are qualified with `qualifier` (an already quoted table or alias).
    /// Returns `None` for empty groups.
    pub fn build(&self, qualifier: Option<&str>, params: &mut ParamList) -> OrmResult<Option<String>> {
        Ok(self.build_joined(qualifier, params)?.map(|(sql, _)| sql))
    }

    /// Like [`build`](Self::build), parenthesized when the result is an OR chain so that more
    /// conditions can be ANDed to it.
    pub(crate) fn build_and_operand(
        &self,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<Option<String>> {
        Ok(self
            .build_joined(qualifier, params)?
            .map(|(sql, joiner)| if joiner == Joiner::Or { format!("({sql})") } else { sql }))
    }

    fn build_joined(
        &self,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<Option<(String, Joiner)>> {
        match self {
            ConditionNode::And(nodes) => build_group(nodes, Joiner::And, qualifier, params),
            ConditionNode::Or(nodes) => build_group(nodes, Joiner::Or, qualifier, params),
            ConditionNode::Not(inner) => Ok(inner
                .build(qualifier, params)?
                .map(|sql| (format!("NOT ({sql})"), Joiner::Atom))),
            ConditionNode::Comparison { column, op, operand } => {
                let lhs = column.to_sql(qualifier);
                let mut out = String::new();
                write_comparison(&lhs, *op, operand, &mut out, qualifier, params)?;
                Ok(Some((out, Joiner::Atom)))
            }
            ConditionNode::Exists(query) => {
                let mut out = String::from("EXISTS (");
                write_query(query, params, &mut out)?;
                out.push(')');
                Ok(Some((out, Joiner::Atom)))
            }
            ConditionNode::Raw(raw) => {
                let mut out = String::new();
                params.push_raw(raw, &mut out)?;
                Ok(Some((out, Joiner::Atom)))
            }
            ConditionNode::Aggregate(agg) => {
                let mut lhs = String::new();
                agg.write_call(&mut lhs, qualifier, params)?;
                let mut out = String::new();
                write_comparison(&lhs, agg.op, &agg.operand, &mut out, qualifier, params)?;
                Ok(Some((out, Joiner::Atom)))
            }
        }
    }
}

fn build_group(
    nodes: &[ConditionNode],
    joiner: Joiner,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<Option<(String, Joiner)>> {
    let mut parts = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Some(part) = node.build_joined(qualifier, params)? {
            parts.push(part);
        }
    }
    match parts.len() {
        0 => Ok(None),
        // A group of one is transparent: no parentheses of its own.
        1 => Ok(parts.pop()),
        _ => {
            let (sep, wraps) = match joiner {
                Joiner::Or => (" OR ", Joiner::And),
                _ => (" AND ", Joiner::Or),
            };
            let sql = parts
                .into_iter()
                .map(|(sql, inner)| {
                    if inner == wraps {
                        format!("({sql})")
                    } else {
                        sql
                    }
                })
                .collect::<Vec<_>>()
                .join(sep);
            Ok(Some((sql, joiner)))
        }
    }
}

pub(crate) fn write_value(
    value: &Value,
    out: &mut String,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<()> {
    match value {
        Value::Literal(v) => out.push_str(&params.placeholder(v.clone())),
        Value::Raw(raw) => params.push_raw(raw, out)?,
        Value::Column(column) => column.write_sql(out, qualifier),
    }
    Ok(())
}

fn write_value_list(
    values: &[Value],
    out: &mut String,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<()> {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(value, out, qualifier, params)?;
    }
    Ok(())
}

fn is_null(operand: &Operand) -> bool {
    matches!(operand, Operand::Value(Value::Literal(SqlValue::Null)))
}

fn write_comparison(
    lhs: &str,
    op: Operator,
    operand: &Operand,
    out: &mut String,
    qualifier: Option<&str>,
    params: &mut ParamList,
) -> OrmResult<()> {
    match (op, operand) {
        (Operator::Equals, _) if is_null(operand) => {
            out.push_str(lhs);
            out.push_str(" IS NULL");
        }
        (Operator::Not, _) if is_null(operand) => {
            out.push_str(lhs);
            out.push_str(" IS NOT NULL");
        }
        (Operator::In, Operand::List(values)) if values.is_empty() => out.push_str("1=0"),
        (Operator::NotIn, Operand::List(values)) if values.is_empty() => out.push_str("1=1"),
        (Operator::In | Operator::NotIn, Operand::List(values)) => {
            out.push_str(lhs);
            out.push_str(if op == Operator::In { " IN (" } else { " NOT IN (" });
            write_value_list(values, out, qualifier, params)?;
            out.push(')');
        }
        (Operator::Between, Operand::Range(from, to)) => {
            out.push_str(lhs);
            out.push_str(" BETWEEN ");
            write_value(from, out, qualifier, params)?;
            out.push_str(" AND ");
            write_value(to, out, qualifier, params)?;
        }
        (_, Operand::Query(query)) => {
            out.push_str(lhs);
            out.push(' ');
            out.push_str(match op {
                Operator::In => "IN",
                Operator::NotIn => "NOT IN",
                other => binary_op(other),
            });
            out.push_str(" (");
            write_query(query, params, out)?;
            out.push(')');
        }
        (
            Operator::Contains
            | Operator::ContainsInsensitive
            | Operator::StartsWith
            | Operator::StartsWithInsensitive
            | Operator::EndsWith
            | Operator::EndsWithInsensitive,
            Operand::Value(value),
        ) => {
            let like = match op {
                Operator::Contains | Operator::StartsWith | Operator::EndsWith => " LIKE ",
                _ => " ILIKE ",
            };
            out.push_str(lhs);
            out.push_str(like);
            if matches!(
                op,
                Operator::Contains
                    | Operator::ContainsInsensitive
                    | Operator::EndsWith
                    | Operator::EndsWithInsensitive
            ) {
                out.push_str("'%' || ");
            }
            write_value(value, out, qualifier, params)?;
            if matches!(
                op,
                Operator::Contains
                    | Operator::ContainsInsensitive
                    | Operator::StartsWith
                    | Operator::StartsWithInsensitive
            ) {
                out.push_str(" || '%'");
            }
        }
        (_, Operand::Value(value)) => {
            out.push_str(lhs);
            out.push(' ');
            out.push_str(binary_op(op));
            out.push(' ');
            write_value(value, out, qualifier, params)?;
        }
        _ => {
            return Err(OrmError::construction(format!(
                "Operator {op:?} cannot take this operand"
            )));
        }
    }
    Ok(())
}

fn binary_op(op: Operator) -> &'static str {
    match op {
        Operator::Equals => "=",
        Operator::Not => "<>",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::JsonSupersetOf => "@>",
        Operator::JsonSubsetOf => "<@",
        Operator::In => "IN",
        Operator::NotIn => "NOT IN",
        Operator::Between => "BETWEEN",
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => "LIKE",
        Operator::ContainsInsensitive
        | Operator::StartsWithInsensitive
        | Operator::EndsWithInsensitive => "ILIKE",
    }
}

/// Conditions accumulated by `.where_()` (AND into the current group) and `.or_where()`
/// (start a new group). Groups are joined with OR.
#[derive(Clone, Debug, Default)]
pub struct WhereGroups {
    groups: Vec<Vec<ConditionNode>>,
}

impl WhereGroups {
    /// AND a node into the current group.
    pub fn and(&mut self, node: ConditionNode) {
        match self.groups.last_mut() {
            Some(group) => group.push(node),
            None => self.groups.push(vec![node]),
        }
    }

    /// Start a new OR group with `node`.
    pub fn or(&mut self, node: ConditionNode) {
        self.groups.push(vec![node]);
    }

    /// Check if the groups are empty.
    pub fn is_empty(&self) -> bool {
        self.groups.iter().flatten().all(|n| n.is_empty())
    }

    /// At least one node was added, even an empty one. An explicit empty `where_()` counts.
    pub fn is_set(&self) -> bool {
        !self.groups.is_empty()
    }

    /// The groups as one condition tree.
    pub fn to_node(&self) -> ConditionNode {
        ConditionNode::Or(
            self.groups
                .iter()
                .map(|group| ConditionNode::And(group.clone()))
                .collect(),
        )
    }

    pub fn build(&self, qualifier: Option<&str>, params: &mut ParamList) -> OrmResult<Option<String>> {
        self.to_node().build(qualifier, params)
    }

    pub(crate) fn build_and_operand(
        &self,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<Option<String>> {
        self.to_node().build_and_operand(qualifier, params)
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(node: &ConditionNode) -> (String, Vec<SqlValue>) {
        let mut params = ParamList::new();
        let sql = node
            .build(Some(r#""user""#), &mut params)
            .unwrap()
            .unwrap_or_default();
        (sql, params.into_values())
    }

    #[test]
    fn nested_groups_get_parentheses() {
        let node = ConditionNode::and(vec![
            ConditionNode::eq("status", "active").unwrap(),
            ConditionNode::or(vec![
                ConditionNode::eq("role", "admin").unwrap(),
                ConditionNode::and(vec![
                    ConditionNode::eq("role", "user").unwrap(),
                    ConditionNode::gt("reputation", 100i32).unwrap(),
                ]),
            ]),
        ]);
        let (sql, values) = build(&node);
        assert_eq!(
            sql,
            r#""user"."status" = $1 AND ("user"."role" = $2 OR ("user"."role" = $3 AND "user"."reputation" > $4))"#
        );
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn single_child_groups_are_transparent() {
        let node = ConditionNode::or(vec![ConditionNode::and(vec![ConditionNode::eq("a", 1i32).unwrap()])]);
        assert_eq!(build(&node).0, r#""user"."a" = $1"#);
    }

    #[test]
    fn empty_groups_are_dropped() {
        let node = ConditionNode::and(vec![
            ConditionNode::or(vec![]),
            ConditionNode::eq("a", 1i32).unwrap(),
            ConditionNode::not(ConditionNode::and(vec![])),
        ]);
        assert_eq!(build(&node).0, r#""user"."a" = $1"#);

        let mut params = ParamList::new();
        assert_eq!(ConditionNode::and(vec![]).build(None, &mut params).unwrap(), None);
    }

    #[test]
    fn null_comparisons() {
        assert_eq!(build(&ConditionNode::is_null("deletedAt").unwrap()).0, r#""user"."deletedAt" IS NULL"#);
        assert_eq!(build(&ConditionNode::is_not_null("t.x").unwrap()).0, r#""t"."x" IS NOT NULL"#);
    }

    #[test]
    fn in_lists() {
        let (sql, values) = build(&ConditionNode::in_list("id", vec![1i32, 2]).unwrap());
        assert_eq!(sql, r#""user"."id" IN ($1, $2)"#);
        assert_eq!(values, vec![SqlValue::Int(1), SqlValue::Int(2)]);

        assert_eq!(build(&ConditionNode::in_list::<i32>("id", vec![]).unwrap()).0, "1=0");
        assert_eq!(build(&ConditionNode::not_in::<i32>("id", vec![]).unwrap()).0, "1=1");
    }

    #[test]
    fn pattern_operators() {
        let node = ConditionNode::compare("name", Operator::ContainsInsensitive, "ab").unwrap();
        assert_eq!(build(&node).0, r#""user"."name" ILIKE '%' || $1 || '%'"#);
        let node = ConditionNode::compare("name", Operator::StartsWith, "ab").unwrap();
        assert_eq!(build(&node).0, r#""user"."name" LIKE $1 || '%'"#);
        let node = ConditionNode::compare("name", Operator::EndsWith, "ab").unwrap();
        assert_eq!(build(&node).0, r#""user"."name" LIKE '%' || $1"#);
    }

    #[test]
    fn between_and_column_operands() {
        let (sql, _) = build(&ConditionNode::between("age", 1i32, 10i32).unwrap());
        assert_eq!(sql, r#""user"."age" BETWEEN $1 AND $2"#);

        let node = ConditionNode::eq("id", Value::column("profile.userId").unwrap()).unwrap();
        let (sql, values) = build(&node);
        assert_eq!(sql, r#""user"."id" = "profile"."userId""#);
        assert!(values.is_empty());
    }

    #[test]
    fn raw_values_keep_their_position() {
        let node = ConditionNode::and(vec![
            ConditionNode::eq("a", 1i32).unwrap(),
            ConditionNode::raw(RawSql::with_values("b = ? OR c = ?", vec![SqlValue::Int(2), SqlValue::Int(3)])),
            ConditionNode::eq("d", 4i32).unwrap(),
        ]);
        let (sql, values) = build(&node);
        assert_eq!(sql, r#""user"."a" = $1 AND b = $2 OR c = $3 AND "user"."d" = $4"#);
        assert_eq!(
            values,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3), SqlValue::Int(4)]
        );
    }

    #[test]
    fn operand_shape_is_checked() {
        assert!(ConditionNode::compare("id", Operator::In, 1i32).is_err());
        assert!(ConditionNode::compare("id", Operator::Between, 1i32).is_err());
        assert!(Operator::from_key("regex").is_err());
    }

    #[test]
    fn aggregate_full_options() {
        let node = AggregateCondition::new("count")
            .unwrap()
            .column("id")
            .unwrap()
            .filter(ConditionNode::lt("id", 10i32).unwrap())
            .filter_or(ConditionNode::eq("id", 15i32).unwrap())
            .filter_or(ConditionNode::gt("id", 20i32).unwrap())
            .compare(Operator::Equals, 10i32)
            .unwrap();
        let (sql, values) = build(&node);
        assert_eq!(
            sql,
            r#"count("user"."id") FILTER (WHERE "user"."id" < $1 OR "user"."id" = $2 OR "user"."id" > $3) = $4"#
        );
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn aggregate_rejects_bad_function_names() {
        assert!(AggregateCondition::new("count(*); --").is_err());
        assert!(AggregateCondition::new("").is_err());
        assert!(AggregateCondition::new("string_agg").is_ok());
    }

    #[test]
    fn where_groups_or_semantics() {
        let mut groups = WhereGroups::default();
        groups.and(ConditionNode::eq("a", 1i32).unwrap());
        groups.and(ConditionNode::eq("b", 2i32).unwrap());
        groups.or(ConditionNode::eq("c", 3i32).unwrap());

        let mut params = ParamList::new();
        let sql = groups.build(Some(r#""t""#), &mut params).unwrap().unwrap();
        assert_eq!(sql, r#"("t"."a" = $1 AND "t"."b" = $2) OR "t"."c" = $3"#);
    }
}
