//! WITH clauses (common table expressions).

use crate::error::OrmResult;
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::param::ParamList;
use crate::qb::state::QueryState;
use crate::qb::to_sql::write_query;
use crate::value::RawSql;

/// Options of one CTE.
#[derive(Debug, Clone, Default)]
pub struct CteOptions {
    /// Emit `WITH RECURSIVE`.
    pub recursive: bool,
    /// `Some(true)` emits `MATERIALIZED`, `Some(false)` `NOT MATERIALIZED`.
    pub materialized: Option<bool>,
    /// Explicit column names: `"name"("a", "b")`.
    pub columns: Vec<String>,
}

impl CteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn materialized(mut self, materialized: bool) -> Self {
        self.materialized = Some(materialized);
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) enum CteBody {
    Query(Box<QueryState>),
    Raw(RawSql),
}

#[derive(Debug, Clone)]
pub struct CteItem {
    pub(crate) name: String,
    pub(crate) options: CteOptions,
    pub(crate) body: CteBody,
}

/// Write `WITH [RECURSIVE] "a" AS (...), "b" AS (...)`.
pub(crate) fn write_with(items: &[CteItem], out: &mut String, params: &mut ParamList) -> OrmResult<()> {
    out.push_str("WITH ");
    if items.iter().any(|i| i.options.recursive) {
        out.push_str("RECURSIVE ");
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote(&item.name));
        if !item.options.columns.is_empty() {
            out.push('(');
            let columns: Vec<String> = item.options.columns.iter().map(|c| quote(c)).collect();
            out.push_str(&columns.join(", "));
            out.push(')');
        }
        out.push_str(" AS ");
        match item.options.materialized {
            Some(true) => out.push_str("MATERIALIZED "),
            Some(false) => out.push_str("NOT MATERIALIZED "),
            None => {}
        }
        out.push('(');
        match &item.body {
            CteBody::Query(state) => write_query(state, params, out)?,
            CteBody::Raw(raw) => params.push_raw(raw, out)?,
        }
        out.push(')');
    }
    Ok(())
}

impl Query {
    /// Add a CTE; any query kind may be the body, mutations included.
    pub fn with(&self, name: &str, query: &Query, options: CteOptions) -> Self {
        let item = CteItem {
            name: name.to_string(),
            options,
            body: CteBody::Query(Box::new(query.state().clone())),
        };
        self.map(|s| s.with.push(item))
    }

    /// Add a CTE with a raw body.
    pub fn with_raw(&self, name: &str, raw: RawSql, options: CteOptions) -> Self {
        let item = CteItem {
            name: name.to_string(),
            options,
            body: CteBody::Raw(raw),
        };
        self.map(|s| s.with.push(item))
    }
}
