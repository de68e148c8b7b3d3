//! Running queries through an [`Adapter`].
//!
//! One `exec` call runs, in order:
//!
//! 1. the before hooks of the statement kind,
//! 2. `BEGIN` (or a savepoint) when nested writes or an upsert need one,
//! 3. related inserts whose keys the main row references,
//! 4. the main statement and its row count checks,
//! 5. related inserts referencing the main row,
//! 6. the fallback insert of `upsert` / `or_create` when nothing matched,
//! 7. `COMMIT` (`ROLLBACK` on any error),
//! 8. the after hooks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::client::{Adapter, QueryResult, Record};
use crate::error::{OrmError, OrmResult};
use crate::qb::{Data, Query, RelationOp, ReturnType, Statement};
use crate::value::SqlValue;

/// Global counter for savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The result of one `exec`, shaped by the query's [`ReturnType`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    All(Vec<Record>),
    /// `One` and `OneOrThrow`; the latter never yields `None`.
    One(Option<Record>),
    Rows(Vec<Vec<SqlValue>>),
    Pluck(Vec<SqlValue>),
    /// `Value` and `ValueOrThrow`; the latter never yields `None`.
    Value(Option<SqlValue>),
    RowCount(u64),
    Void,
}

impl QueryOutput {
    /// Every returned record.
    pub fn records(self) -> OrmResult<Vec<Record>> {
        match self {
            QueryOutput::All(records) => Ok(records),
            QueryOutput::One(record) => Ok(record.into_iter().collect()),
            other => Err(shape_error("records", &other)),
        }
    }

    /// The single returned record, if any.
    pub fn record(self) -> OrmResult<Option<Record>> {
        match self {
            QueryOutput::One(record) => Ok(record),
            QueryOutput::All(records) => Ok(records.into_iter().next()),
            other => Err(shape_error("a record", &other)),
        }
    }

    /// The single returned value, if any.
    pub fn value(self) -> OrmResult<Option<SqlValue>> {
        match self {
            QueryOutput::Value(value) => Ok(value),
            other => Err(shape_error("a value", &other)),
        }
    }

    pub fn row_count(&self) -> Option<u64> {
        match self {
            QueryOutput::RowCount(n) => Some(*n),
            _ => None,
        }
    }
}

fn shape_error(wanted: &str, got: &QueryOutput) -> OrmError {
    OrmError::construction(format!("Expected {wanted} from the query, got {got:?}"))
}

/// What the main statement produced, plus the fallback insert if one ran instead.
struct Outcome {
    output: QueryOutput,
    created: Option<Query>,
}

/// Send one statement, logging it when the query has a log configuration.
async fn send<A: Adapter>(
    query: &Query,
    adapter: &A,
    sql: &str,
    values: &[SqlValue],
) -> OrmResult<QueryResult> {
    let start = Instant::now();
    let result = adapter.query(sql, values).await;
    if let Some(log) = query.log_config() {
        match &result {
            Ok(r) => log.on_success(sql, values.len(), start.elapsed(), r.row_count),
            Err(e) => log.on_error(sql, values.len(), start.elapsed(), e),
        }
    }
    result
}

/// BEGIN/COMMIT/ROLLBACK, or a savepoint when the adapter is already in a transaction.
struct TxScope {
    savepoint: Option<String>,
}

impl TxScope {
    async fn begin<A: Adapter>(query: &Query, adapter: &A) -> OrmResult<Self> {
        if !adapter.in_transaction() && !adapter.exclusive_session() {
            return Err(OrmError::construction(
                "This write spans several statements and needs a transaction; \
                 run it on a `Transaction` (see `Query::exec_in_transaction`)",
            ));
        }
        let savepoint = adapter.in_transaction().then(|| {
            let id = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("pgqb_sp_{id}")
        });
        let sql = match &savepoint {
            Some(name) => format!("SAVEPOINT {name}"),
            None => "BEGIN".to_string(),
        };
        send(query, adapter, &sql, &[]).await?;
        Ok(Self { savepoint })
    }

    async fn commit<A: Adapter>(self, query: &Query, adapter: &A) -> OrmResult<()> {
        let sql = match &self.savepoint {
            Some(name) => format!("RELEASE SAVEPOINT {name}"),
            None => "COMMIT".to_string(),
        };
        send(query, adapter, &sql, &[]).await.map(|_| ())
    }

    async fn rollback<A: Adapter>(self, query: &Query, adapter: &A, error: OrmError) -> OrmError {
        let sql = match &self.savepoint {
            Some(name) => format!("ROLLBACK TO SAVEPOINT {name}"),
            None => "ROLLBACK".to_string(),
        };
        match send(query, adapter, &sql, &[]).await {
            Ok(_) => error,
            Err(rollback_err) => OrmError::construction(format!(
                "{error} (rollback failed: {rollback_err})"
            )),
        }
    }
}

fn run_before_hooks(query: &Query) -> OrmResult<()> {
    let hooks = &query.state().hooks;
    let before = match query.state().statement {
        Statement::Insert(_) => &hooks.before_insert,
        Statement::Update(_) => &hooks.before_update,
        _ => return Ok(()),
    };
    before.iter().try_for_each(|hook| hook(query))
}

fn run_after_hooks(query: &Query, output: &QueryOutput) -> OrmResult<()> {
    let hooks = &query.state().hooks;
    let after = match query.state().statement {
        Statement::Insert(_) => &hooks.after_insert,
        Statement::Update(_) => &hooks.after_update,
        _ => return Ok(()),
    };
    after.iter().try_for_each(|hook| hook(query, output))
}

impl Query {
    /// Run the query and shape its result by the return type.
    pub async fn exec<A: Adapter>(&self, adapter: &A) -> OrmResult<QueryOutput> {
        run_before_hooks(self)?;

        let outcome = if self.state().wrap_in_transaction {
            let tx = TxScope::begin(self, adapter).await?;
            match self.run(adapter).await {
                Ok(outcome) => {
                    tx.commit(self, adapter).await?;
                    outcome
                }
                Err(error) => return Err(tx.rollback(self, adapter, error).await),
            }
        } else {
            self.run(adapter).await?
        };

        match &outcome.created {
            Some(created) => run_after_hooks(created, &outcome.output)?,
            None => run_after_hooks(self, &outcome.output)?,
        }
        Ok(outcome.output)
    }

    /// Open a transaction on `client`, run the query inside it and commit.
    ///
    /// Dropping the transaction on error rolls it back.
    pub async fn exec_in_transaction(&self, client: &mut tokio_postgres::Client) -> OrmResult<QueryOutput> {
        let tx = client.transaction().await?;
        let output = self.exec(&tx).await?;
        tx.commit().await?;
        Ok(output)
    }

    /// Every row mapped onto `T`.
    pub async fn fetch_all<T: DeserializeOwned, A: Adapter>(&self, adapter: &A) -> OrmResult<Vec<T>> {
        self.exec(adapter)
            .await?
            .records()?
            .iter()
            .map(|record| record.deserialize::<T>())
            .collect()
    }

    /// The first row mapped onto `T`; zero rows is a not-found error.
    pub async fn fetch_one<T: DeserializeOwned, A: Adapter>(&self, adapter: &A) -> OrmResult<T> {
        self.fetch_optional(adapter)
            .await?
            .ok_or_else(|| OrmError::not_found("Expected 1 row, got 0"))
    }

    /// The first row mapped onto `T`, if any.
    pub async fn fetch_optional<T: DeserializeOwned, A: Adapter>(&self, adapter: &A) -> OrmResult<Option<T>> {
        self.exec(adapter)
            .await?
            .record()?
            .map(|record| record.deserialize())
            .transpose()
    }

    /// Run a statement for its affected row count.
    pub async fn execute<A: Adapter>(&self, adapter: &A) -> OrmResult<u64> {
        let query = if self.state().statement.is_mutation() {
            self.count()
        } else {
            self.clone()
        };
        match query.exec(adapter).await? {
            QueryOutput::RowCount(n) => Ok(n),
            QueryOutput::Void => Ok(0),
            QueryOutput::All(records) => Ok(records.len() as u64),
            other => Err(shape_error("a row count", &other)),
        }
    }

    /// Steps 3 to 6, without hooks or transaction handling.
    fn run<'a, A: Adapter>(&'a self, adapter: &'a A) -> BoxFuture<'a, OrmResult<Outcome>> {
        async move {
            let query = self.run_prepends(adapter).await?;
            let state = query.state();

            let sql = query.to_sql()?;
            let mut result = send(&query, adapter, &sql.text, &sql.values).await?;
            if let Some(table) = state.table.as_deref() {
                result.rows = result
                    .rows
                    .into_iter()
                    .map(|record| record.map_values(|column, value| table.decode_text(column, value)))
                    .collect::<OrmResult<_>>()?;
            }

            let matched = if state.statement.is_mutation() {
                result.row_count
            } else {
                result.rows.len() as u64
            };
            if let Some(create) = &state.or_create {
                if matched > 1 {
                    return Err(OrmError::more_than_one_row(matched));
                }
                if matched == 0 {
                    let created = query.derive((**create).clone());
                    run_before_hooks(&created)?;
                    let output = created.run(adapter).await?.output;
                    return Ok(Outcome {
                        output,
                        created: Some(created),
                    });
                }
            }
            check_row_count(&query, matched)?;

            query.run_appends(adapter, &result).await?;

            Ok(Outcome {
                output: shape_output(&query, result),
                created: None,
            })
        }
        .boxed()
    }

    /// Insert `belongs_to` rows first and fill their keys into the pending cells.
    async fn run_prepends<A: Adapter>(&self, adapter: &A) -> OrmResult<Query> {
        let mut query = self.clone();
        for op in &self.state().relation_ops {
            let RelationOp::Prepend {
                row,
                column,
                relation,
                data,
            } = op
            else {
                continue;
            };
            let related = self
                .sibling(&relation.table)?
                .insert(data.clone())?
                .select(&[relation.primary_key.as_str()])?
                .take();
            let record = related.run(adapter).await?.output.record()?;
            let key = record
                .as_ref()
                .and_then(|r| r.get(&relation.primary_key))
                .cloned()
                .ok_or_else(|| {
                    OrmError::not_found(format!(
                        "Related {} row returned no {}",
                        relation.table, relation.primary_key
                    ))
                })?;
            query = query.fill_pending(*row, *column, key);
        }
        Ok(query)
    }

    /// Insert `has_one` / `has_many` rows pointing at the returned main rows.
    async fn run_appends<A: Adapter>(&self, adapter: &A, result: &QueryResult) -> OrmResult<()> {
        for op in &self.state().relation_ops {
            let RelationOp::Append { row, relation, data } = op else {
                continue;
            };
            let key = result
                .rows
                .get(*row)
                .and_then(|r| r.get(&relation.primary_key))
                .cloned()
                .ok_or_else(|| {
                    OrmError::not_found(format!(
                        "Cannot insert {} rows: the parent row was not returned",
                        relation.table
                    ))
                })?;
            let rows: Vec<Data> = data
                .iter()
                .map(|d| d.clone().set(&relation.foreign_key, key.clone()))
                .collect();
            self.sibling(&relation.table)?
                .insert_many(rows)?
                .count()
                .run(adapter)
                .await?;
        }
        Ok(())
    }
}

/// Zero rows for an `*OrThrow` type is not-found; an expected single row matching many
/// mutations is an error.
fn check_row_count(query: &Query, matched: u64) -> OrmResult<()> {
    let state = query.state();
    match state.return_type() {
        ReturnType::OneOrThrow | ReturnType::ValueOrThrow if matched == 0 => {
            Err(OrmError::not_found(match state.table.as_deref() {
                Some(table) => format!("Record not found in {}", table.name),
                None => "Record not found".to_string(),
            }))
        }
        rt if rt.expects_one() && state.statement.is_mutation() && matched > 1 => {
            Err(OrmError::more_than_one_row(matched))
        }
        _ => Ok(()),
    }
}

fn shape_output(query: &Query, result: QueryResult) -> QueryOutput {
    let state = query.state();
    let return_type = state.return_type();
    if return_type == ReturnType::Void {
        return QueryOutput::Void;
    }
    if return_type == ReturnType::RowCount || !state.returns_records() {
        return QueryOutput::RowCount(result.row_count);
    }
    let mut rows = result.rows;
    match return_type {
        ReturnType::One | ReturnType::OneOrThrow => {
            QueryOutput::One(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
        }
        ReturnType::Rows => QueryOutput::Rows(rows.into_iter().map(Record::into_values).collect()),
        ReturnType::Pluck => QueryOutput::Pluck(
            rows.into_iter()
                .filter_map(|r| r.into_values().into_iter().next())
                .collect(),
        ),
        ReturnType::Value | ReturnType::ValueOrThrow => {
            QueryOutput::Value(rows.into_iter().next().and_then(|r| r.into_values().into_iter().next()))
        }
        _ => QueryOutput::All(rows),
    }
}
