//! JOIN clauses.
//!
//! ON conditions are compiled with the joined table (or its alias) as the default qualifier,
//! so `ConditionNode::eq("authorId", Value::column("user.id")?)` inside
//! `join_on(JoinKind::Inner, "message", ...)` reads `"message"."authorId" = "user"."id"`.

use crate::error::OrmResult;
use crate::ident::{quote, quote_table};
use crate::qb::Query;
use crate::qb::expr::{ConditionNode, Operand, Operator};
use crate::qb::param::ParamList;
use crate::qb::state::QueryState;
use crate::qb::to_sql::write_query;
use crate::value::{ColumnRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// What a join reads from.
#[derive(Debug, Clone)]
pub enum JoinTarget {
    Table {
        name: String,
        schema: Option<String>,
        alias: Option<String>,
    },
    Query {
        state: Box<QueryState>,
        alias: String,
    },
}

impl JoinTarget {
    pub fn table(name: &str) -> Self {
        JoinTarget::Table {
            name: name.to_string(),
            schema: None,
            alias: None,
        }
    }

    /// `JOIN "name" AS "alias"`
    pub fn table_as(name: &str, alias: &str) -> Self {
        JoinTarget::Table {
            name: name.to_string(),
            schema: None,
            alias: Some(alias.to_string()),
        }
    }

    /// `JOIN (sub-query) AS "alias"`
    pub fn query(query: &Query, alias: &str) -> Self {
        JoinTarget::Query {
            state: Box::new(query.state().clone()),
            alias: alias.to_string(),
        }
    }

    /// Name the joined rows are referred to by.
    pub fn alias_name(&self) -> &str {
        match self {
            JoinTarget::Table { name, alias, .. } => alias.as_deref().unwrap_or(name),
            JoinTarget::Query { alias, .. } => alias,
        }
    }

    /// Write the target without the join keyword, as in `USING` lists.
    pub(crate) fn write_sql(&self, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
        match self {
            JoinTarget::Table { name, schema, alias } => {
                out.push_str(&quote_table(schema.as_deref(), name));
                if let Some(alias) = alias.as_ref().filter(|a| *a != name) {
                    out.push_str(" AS ");
                    out.push_str(&quote(alias));
                }
            }
            JoinTarget::Query { state, alias } => {
                out.push('(');
                write_query(state, params, out)?;
                out.push_str(") AS ");
                out.push_str(&quote(alias));
            }
        }
        Ok(())
    }
}

impl From<&str> for JoinTarget {
    fn from(name: &str) -> Self {
        JoinTarget::table(name)
    }
}

/// One JOIN clause.
#[derive(Debug, Clone)]
pub struct JoinItem {
    pub(crate) kind: JoinKind,
    pub(crate) target: JoinTarget,
    pub(crate) on: Option<ConditionNode>,
}

impl JoinItem {
    /// The ON condition compiled against the joined alias, if any.
    pub(crate) fn build_on(&self, params: &mut ParamList) -> OrmResult<Option<String>> {
        match &self.on {
            Some(node) => node.build(Some(&quote(self.target.alias_name())), params),
            None => Ok(None),
        }
    }

    /// Like [`build_on`](Self::build_on), parenthesized when it has to sit beside other `AND`ed
    /// conditions.
    pub(crate) fn build_on_operand(&self, params: &mut ParamList) -> OrmResult<Option<String>> {
        match &self.on {
            Some(node) => node.build_and_operand(Some(&quote(self.target.alias_name())), params),
            None => Ok(None),
        }
    }

    pub(crate) fn write_sql(&self, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
        out.push_str(self.kind.as_sql());
        out.push(' ');
        self.target.write_sql(out, params)?;
        if self.kind != JoinKind::Cross {
            out.push_str(" ON ");
            match self.build_on(params)? {
                Some(on) => out.push_str(&on),
                None => out.push_str("true"),
            }
        }
        Ok(())
    }
}

impl Query {
    /// `JOIN target ON left = right`.
    ///
    /// An unqualified `left` refers to the joined table, an unqualified `right` to this query's
    /// table.
    pub fn join(&self, target: impl Into<JoinTarget>, left: &str, right: &str) -> OrmResult<Self> {
        self.join_columns(JoinKind::Inner, target.into(), left, right)
    }

    pub fn left_join(&self, target: impl Into<JoinTarget>, left: &str, right: &str) -> OrmResult<Self> {
        self.join_columns(JoinKind::Left, target.into(), left, right)
    }

    pub fn right_join(&self, target: impl Into<JoinTarget>, left: &str, right: &str) -> OrmResult<Self> {
        self.join_columns(JoinKind::Right, target.into(), left, right)
    }

    pub fn full_join(&self, target: impl Into<JoinTarget>, left: &str, right: &str) -> OrmResult<Self> {
        self.join_columns(JoinKind::Full, target.into(), left, right)
    }

    /// Join with an arbitrary ON condition, qualified against the joined table.
    pub fn join_on(&self, kind: JoinKind, target: impl Into<JoinTarget>, on: ConditionNode) -> Self {
        let item = JoinItem {
            kind,
            target: self.resolve_target(target.into()),
            on: Some(on),
        };
        self.map(|s| s.joins.push(item))
    }

    /// `CROSS JOIN target`
    pub fn cross_join(&self, target: impl Into<JoinTarget>) -> Self {
        let item = JoinItem {
            kind: JoinKind::Cross,
            target: self.resolve_target(target.into()),
            on: None,
        };
        self.map(|s| s.joins.push(item))
    }

    fn join_columns(&self, kind: JoinKind, target: JoinTarget, left: &str, right: &str) -> OrmResult<Self> {
        let target = self.resolve_target(target);
        let left = ColumnRef::parse(left)?.or_table(target.alias_name());
        let mut right = ColumnRef::parse(right)?;
        if let Some(alias) = self.state().alias_name() {
            right = right.or_table(alias);
        }
        let on = ConditionNode::Comparison {
            column: left,
            op: Operator::Equals,
            operand: Operand::Value(Value::Column(right)),
        };
        let item = JoinItem {
            kind,
            target,
            on: Some(on),
        };
        Ok(self.map(|s| s.joins.push(item)))
    }

    /// Fill in the schema of registered tables.
    fn resolve_target(&self, target: JoinTarget) -> JoinTarget {
        match target {
            JoinTarget::Table { name, schema: None, alias } => {
                let schema = self
                    .registry()
                    .and_then(|r| r.get(&name))
                    .and_then(|t| t.schema.clone());
                JoinTarget::Table { name, schema, alias }
            }
            other => other,
        }
    }
}
