//! GROUP BY and HAVING.

use serde_json::Value as Json;

use crate::error::OrmResult;
use crate::qb::Query;
use crate::qb::expr::ConditionNode;
use crate::qb::param::ParamList;
use crate::qb::shorthand::parse_having;
use crate::value::{ColumnRef, RawSql};

/// One GROUP BY entry.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Column(ColumnRef),
    Raw(RawSql),
}

impl GroupItem {
    pub(crate) fn write_sql(
        &self,
        out: &mut String,
        qualifier: Option<&str>,
        params: &mut ParamList,
    ) -> OrmResult<()> {
        match self {
            GroupItem::Column(column) => {
                column.write_sql(out, qualifier);
                Ok(())
            }
            GroupItem::Raw(raw) => params.push_raw(raw, out),
        }
    }
}

impl Query {
    /// Append GROUP BY columns.
    pub fn group(&self, columns: &[&str]) -> OrmResult<Self> {
        let items = columns
            .iter()
            .map(|c| ColumnRef::parse(c).map(GroupItem::Column))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(self.map(|s| s.group.extend(items)))
    }

    /// Append a raw GROUP BY expression.
    pub fn group_raw(&self, raw: RawSql) -> Self {
        self.map(|s| s.group.push(GroupItem::Raw(raw)))
    }

    /// AND a condition into the current HAVING group.
    pub fn having(&self, node: ConditionNode) -> Self {
        self.map(|s| s.having.and(node))
    }

    /// Start a new HAVING group for each node, ORed with the previous groups.
    pub fn having_or(&self, nodes: Vec<ConditionNode>) -> Self {
        self.map(|s| {
            for node in nodes {
                s.having.or(node);
            }
        })
    }

    /// AND an aggregate shorthand object: `{"count": 5}` or
    /// `{"sum": {"amount": {"gt": 100, "distinct": true}}}`.
    pub fn having_json(&self, shorthand: &Json) -> OrmResult<Self> {
        Ok(self.having(parse_having(shorthand)?))
    }

    /// AND raw HAVING fragments.
    pub fn having_raw(&self, raws: Vec<RawSql>) -> Self {
        let nodes = raws.into_iter().map(ConditionNode::raw).collect();
        self.having(ConditionNode::and(nodes))
    }
}
