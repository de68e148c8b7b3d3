//! UNION / INTERSECT / EXCEPT.

use crate::error::OrmResult;
use crate::qb::Query;
use crate::qb::param::ParamList;
use crate::qb::state::QueryState;
use crate::qb::to_sql::write_query;
use crate::value::RawSql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl UnionKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            UnionKind::Union => "UNION",
            UnionKind::UnionAll => "UNION ALL",
            UnionKind::Intersect => "INTERSECT",
            UnionKind::IntersectAll => "INTERSECT ALL",
            UnionKind::Except => "EXCEPT",
            UnionKind::ExceptAll => "EXCEPT ALL",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum UnionArg {
    Query(Box<QueryState>),
    Raw(RawSql),
}

#[derive(Debug, Clone)]
pub struct UnionItem {
    pub(crate) kind: UnionKind,
    pub(crate) arg: UnionArg,
    pub(crate) wrap: bool,
}

impl UnionItem {
    pub(crate) fn write_sql(&self, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
        out.push_str(self.kind.as_sql());
        out.push(' ');
        if self.wrap {
            out.push('(');
        }
        match &self.arg {
            UnionArg::Query(state) => write_query(state, params, out)?,
            UnionArg::Raw(raw) => params.push_raw(raw, out)?,
        }
        if self.wrap {
            out.push(')');
        }
        Ok(())
    }
}

impl Query {
    /// Combine with `queries` using `kind`; `wrap` puts each one in parentheses.
    pub fn set_operation(&self, kind: UnionKind, queries: &[&Query], wrap: bool) -> Self {
        let items: Vec<UnionItem> = queries
            .iter()
            .map(|q| UnionItem {
                kind,
                arg: UnionArg::Query(Box::new(q.state().clone())),
                wrap,
            })
            .collect();
        self.map(|s| s.unions.extend(items))
    }

    /// Combine with a raw statement.
    pub fn set_operation_raw(&self, kind: UnionKind, raw: RawSql, wrap: bool) -> Self {
        let item = UnionItem {
            kind,
            arg: UnionArg::Raw(raw),
            wrap,
        };
        self.map(|s| s.unions.push(item))
    }

    pub fn union(&self, queries: &[&Query], wrap: bool) -> Self {
        self.set_operation(UnionKind::Union, queries, wrap)
    }

    pub fn union_all(&self, queries: &[&Query], wrap: bool) -> Self {
        self.set_operation(UnionKind::UnionAll, queries, wrap)
    }

    pub fn intersect(&self, queries: &[&Query], wrap: bool) -> Self {
        self.set_operation(UnionKind::Intersect, queries, wrap)
    }

    pub fn intersect_all(&self, queries: &[&Query], wrap: bool) -> Self {
        self.set_operation(UnionKind::IntersectAll, queries, wrap)
    }

    pub fn except(&self, queries: &[&Query], wrap: bool) -> Self {
        self.set_operation(UnionKind::Except, queries, wrap)
    }

    pub fn except_all(&self, queries: &[&Query], wrap: bool) -> Self {
        self.set_operation(UnionKind::ExceptAll, queries, wrap)
    }
}
