//! WHERE builder methods.

use serde_json::Value as Json;

use crate::error::OrmResult;
use crate::qb::Query;
use crate::qb::expr::ConditionNode;
use crate::qb::shorthand::parse_where;

impl Query {
    /// AND a condition into the current WHERE group.
    ///
    /// An empty node still counts as an explicit WHERE, so `where_(ConditionNode::and(vec![]))`
    /// allows an update of every row.
    pub fn where_(&self, node: ConditionNode) -> Self {
        self.map(|s| s.where_.and(node))
    }

    /// Start a new WHERE group, ORed with the previous ones.
    pub fn or_where(&self, node: ConditionNode) -> Self {
        self.map(|s| s.where_.or(node))
    }

    /// AND `NOT (node)` into the current group.
    pub fn where_not(&self, node: ConditionNode) -> Self {
        self.where_(ConditionNode::not(node))
    }

    /// AND a JSON shorthand object into the current group.
    pub fn where_json(&self, shorthand: &Json) -> OrmResult<Self> {
        Ok(self.where_(parse_where(shorthand)?))
    }

    /// Start a new group from a JSON shorthand object.
    pub fn or_where_json(&self, shorthand: &Json) -> OrmResult<Self> {
        Ok(self.or_where(parse_where(shorthand)?))
    }

    /// `EXISTS (sub-query)`
    pub fn where_exists(&self, query: &Query) -> Self {
        self.where_(ConditionNode::exists(query))
    }

    /// `NOT (EXISTS (sub-query))`
    pub fn where_not_exists(&self, query: &Query) -> Self {
        self.where_not(ConditionNode::exists(query))
    }
}
