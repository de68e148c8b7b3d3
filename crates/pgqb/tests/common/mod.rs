#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use pgqb::{
    Adapter, ColumnDef, ColumnType, Db, DbConfig, OrmError, OrmResult, QueryResult, Record,
    SqlValue, TableSchema,
};

/// An in-memory adapter that records every statement and replays queued responses.
///
/// Transaction control statements are answered with an empty result without consuming a queued
/// response; any other statement takes the next one, or an empty result when none is left.
#[derive(Default)]
pub struct MockAdapter {
    calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
    responses: Mutex<VecDeque<OrmResult<QueryResult>>>,
    nested: bool,
    shared: bool,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a connection already inside a transaction.
    pub fn nested() -> Self {
        Self {
            nested: true,
            ..Self::default()
        }
    }

    /// Behave like a connection other tasks may be using at the same time.
    pub fn shared() -> Self {
        Self {
            shared: true,
            ..Self::default()
        }
    }

    pub fn respond(&self, result: QueryResult) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(result));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(OrmError::construction(message)));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }
}

fn is_transaction_control(sql: &str) -> bool {
    ["BEGIN", "COMMIT", "ROLLBACK", "SAVEPOINT", "RELEASE"]
        .iter()
        .any(|keyword| sql.starts_with(keyword))
}

impl Adapter for MockAdapter {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> OrmResult<QueryResult> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if is_transaction_control(sql) {
            return Ok(QueryResult::default());
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResult::default()))
    }

    fn in_transaction(&self) -> bool {
        self.nested
    }

    fn exclusive_session(&self) -> bool {
        !self.shared
    }
}

/// Rows with the given column names; the row count is the number of rows.
pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> QueryResult {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    QueryResult {
        row_count: rows.len() as u64,
        rows: rows
            .into_iter()
            .map(|values| Record::new(columns.clone(), values))
            .collect(),
    }
}

/// Only an affected row count.
pub fn affected(n: u64) -> QueryResult {
    QueryResult {
        row_count: n,
        rows: Vec::new(),
    }
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

pub fn db() -> Db {
    Db::new(
        vec![
            TableSchema::new("user")
                .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                .column(ColumnDef::new("name", ColumnType::Text))
                .column(ColumnDef::new("age", ColumnType::Integer).nullable())
                .has_many("posts", "post", "authorId", "id")
                .has_one("profile", "profile", "userId", "id"),
            TableSchema::new("post")
                .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                .column(ColumnDef::new("title", ColumnType::Text))
                .column(ColumnDef::new("authorId", ColumnType::Integer))
                .belongs_to("author", "user", "authorId", "id"),
            TableSchema::new("profile")
                .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                .column(ColumnDef::new("bio", ColumnType::Text))
                .column(ColumnDef::new("userId", ColumnType::Integer)),
        ],
        DbConfig::new(),
    )
    .unwrap()
}
