//! INSERT: payloads, nested relation writes and ON CONFLICT.
//!
//! Column lists are the union of the payload keys in first-seen order. In a multi-row insert a
//! row without one of the keys gets `DEFAULT` for it. Keys naming a relation instead of a
//! column become nested writes:
//!
//! - `belongs_to`: the related row is inserted first and its key fills the foreign key cell,
//!   which stays `DEFAULT` until then.
//! - `has_one` / `has_many`: the related rows are inserted after the main row, so the main
//!   statement always returns the primary key they reference.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::expr::write_value;
use crate::qb::param::ParamList;
use crate::qb::select::{SelectExpr, SelectItem};
use crate::qb::shorthand::literal;
use crate::qb::state::{QueryState, ReturnType, Statement};
use crate::qb::to_sql::write_query;
use crate::schema::{RelationDef, RelationKind, TableSchema};
use crate::value::{RawSql, SqlValue, Value};

/// A nested write under a relation key.
#[derive(Debug, Clone)]
pub enum NestedWrite {
    Create(Data),
    CreateMany(Vec<Data>),
}

#[derive(Debug, Clone)]
pub(crate) enum DataEntry {
    Value(Value),
    Relation(NestedWrite),
}

/// An ordered key/value payload for insert and update.
///
/// A key that is never set is "not provided" and is left out of the statement; setting a key to
/// `SqlValue::Null` writes `NULL`.
///
/// # Example
/// ```ignore
/// let data = Data::new()
///     .set("name", "John")
///     .set_opt("age", None::<i32>)      // not provided, skipped
///     .set("deletedAt", SqlValue::Null) // written as NULL
///     .set_raw("createdAt", raw("now()"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Data {
    entries: Vec<(String, DataEntry)>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an earlier value in place.
    pub fn set(self, key: &str, value: impl Into<Value>) -> Self {
        self.put(key, DataEntry::Value(value.into()))
    }

    /// Set `key` when `value` is `Some`; `None` leaves the key out.
    pub fn set_opt<T: Into<Value>>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn set_raw(self, key: &str, raw: RawSql) -> Self {
        self.put(key, DataEntry::Value(Value::Raw(raw)))
    }

    /// Nested write through the relation `name`.
    pub fn relation(self, name: &str, write: NestedWrite) -> Self {
        self.put(name, DataEntry::Relation(write))
    }

    /// Build from a JSON object; nested objects and arrays become JSON values.
    pub fn from_json(json: &Json) -> OrmResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| OrmError::construction("Insert and update data must be a JSON object"))?;
        Ok(object
            .iter()
            .fold(Self::new(), |data, (key, value)| data.set(key, literal(value))))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// The value set for `key`, if it is a plain value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(k, entry)| match entry {
            DataEntry::Value(value) if k == key => Some(value),
            _ => None,
        })
    }

    pub(crate) fn entries(&self) -> &[(String, DataEntry)] {
        &self.entries
    }

    fn put(mut self, key: &str, entry: DataEntry) -> Self {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((key.to_string(), entry)),
        }
        self
    }

    /// `self` layered over `defaults`: default keys first, overridden in place.
    pub(crate) fn merged_over(&self, defaults: &Data) -> Data {
        self.entries
            .iter()
            .fold(defaults.clone(), |data, (key, entry)| data.put(key, entry.clone()))
    }

    /// Plain values for known columns, encoded for their column type.
    ///
    /// Unknown keys are dropped when the table declares its columns; relation entries are
    /// rejected.
    pub(crate) fn column_values(&self, table: &TableSchema, what: &str) -> OrmResult<Vec<(String, Value)>> {
        let mut values = Vec::with_capacity(self.entries.len());
        for (key, entry) in &self.entries {
            match entry {
                DataEntry::Value(value) => {
                    if let Some(value) = encode_for(table, key, value) {
                        values.push((key.clone(), value));
                    }
                }
                DataEntry::Relation(_) => {
                    return Err(OrmError::construction(format!(
                        "Nested write '{key}' is not supported in {what}"
                    )));
                }
            }
        }
        Ok(values)
    }
}

/// Encode a literal through the column type; `None` for keys the table does not have.
fn encode_for(table: &TableSchema, key: &str, value: &Value) -> Option<Value> {
    if !table.columns.is_empty() && !table.has_column(key) {
        return None;
    }
    Some(match value {
        Value::Literal(literal) => Value::Literal(table.encode(key, literal.clone())),
        other => other.clone(),
    })
}

/// One cell of a VALUES row.
#[derive(Debug, Clone)]
pub(crate) enum InsertCell {
    Value(Value),
    Default,
    /// A foreign key filled in by a preceding nested insert.
    Pending,
}

#[derive(Debug, Clone)]
pub(crate) enum InsertValues {
    Rows(Vec<Vec<InsertCell>>),
    Raw(RawSql),
    /// `INSERT INTO ... SELECT ...`
    From(Box<QueryState>),
}

/// What ON CONFLICT applies to.
#[derive(Debug, Clone)]
pub enum ConflictTarget {
    /// `ON CONFLICT ("a", "b")`
    Columns(Vec<String>),
    /// `ON CONFLICT <raw>`, e.g. `ON CONSTRAINT "user_name_key"`.
    Raw(RawSql),
    /// `ON CONFLICT` without a target.
    Inferred,
}

impl ConflictTarget {
    pub fn columns(columns: &[&str]) -> Self {
        ConflictTarget::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

/// What DO UPDATE sets.
#[derive(Debug, Clone)]
pub enum MergeSpec {
    /// Every inserted column from `excluded`.
    All,
    /// The given columns from `excluded`.
    Columns(Vec<String>),
    /// Explicit values.
    Values(Data),
    Raw(RawSql),
}

#[derive(Debug, Clone)]
pub(crate) enum ConflictAction {
    Ignore,
    Merge(MergeSpec),
}

#[derive(Debug, Clone)]
pub(crate) struct OnConflict {
    pub(crate) target: ConflictTarget,
    pub(crate) action: ConflictAction,
}

#[derive(Debug, Clone)]
pub(crate) struct InsertPayload {
    pub(crate) columns: Vec<String>,
    pub(crate) values: InsertValues,
    pub(crate) on_conflict: Option<OnConflict>,
}

impl InsertPayload {
    /// Fill a pending foreign key cell.
    pub(crate) fn fill(&mut self, row: usize, column: usize, value: SqlValue) {
        if let InsertValues::Rows(rows) = &mut self.values {
            if let Some(cell) = rows.get_mut(row).and_then(|r| r.get_mut(column)) {
                *cell = InsertCell::Value(Value::Literal(value));
            }
        }
    }
}

/// A nested write run by the executor around the main statement.
#[derive(Debug, Clone)]
pub(crate) enum RelationOp {
    /// Insert the related row first; its primary key fills `column` of `row`.
    Prepend {
        row: usize,
        column: usize,
        relation: RelationDef,
        data: Data,
    },
    /// Insert the related rows after the main row, pointing back at `row`.
    Append {
        row: usize,
        relation: RelationDef,
        data: Vec<Data>,
    },
}

/// Pending ON CONFLICT clause; finish it with [`ignore`](OnConflictBuilder::ignore) or
/// [`merge`](OnConflictBuilder::merge).
#[derive(Debug, Clone)]
pub struct OnConflictBuilder {
    query: Query,
    target: ConflictTarget,
}

impl OnConflictBuilder {
    /// `DO NOTHING`
    pub fn ignore(self) -> OrmResult<Query> {
        self.finish(ConflictAction::Ignore)
    }

    /// `DO UPDATE SET ...`
    pub fn merge(self, spec: MergeSpec) -> OrmResult<Query> {
        if matches!(self.target, ConflictTarget::Inferred) {
            return Err(OrmError::construction(
                "ON CONFLICT DO UPDATE needs conflict target columns or a raw target",
            ));
        }
        let spec = match spec {
            MergeSpec::Values(data) => {
                let table = self.query.require_table("on conflict")?;
                let values = data.column_values(table, "on conflict")?;
                MergeSpec::Values(values.into_iter().fold(Data::new(), |d, (k, v)| d.set(&k, v)))
            }
            other => other,
        };
        self.finish(ConflictAction::Merge(spec))
    }

    fn finish(self, action: ConflictAction) -> OrmResult<Query> {
        let target = self.target;
        self.query.try_map(|s| match &mut s.statement {
            Statement::Insert(payload) => {
                payload.on_conflict = Some(OnConflict { target, action });
                Ok(())
            }
            other => Err(OrmError::construction(format!(
                "ON CONFLICT needs an insert, got a {} query",
                other.name()
            ))),
        })
    }
}

/// Row values collected for one insert.
struct Collected {
    columns: Vec<String>,
    rows: Vec<Vec<(usize, InsertCell)>>,
    ops: Vec<RelationOp>,
    required: Vec<String>,
}

fn column_index(columns: &mut Vec<String>, key: &str) -> usize {
    match columns.iter().position(|c| c == key) {
        Some(i) => i,
        None => {
            columns.push(key.to_string());
            columns.len() - 1
        }
    }
}

fn collect_rows(query: &Query, table: &TableSchema, rows: &[Data]) -> OrmResult<Collected> {
    let mut collected = Collected {
        columns: Vec::new(),
        rows: Vec::with_capacity(rows.len()),
        ops: Vec::new(),
        required: Vec::new(),
    };

    for (row_index, data) in rows.iter().enumerate() {
        let mut cells = Vec::new();
        for (key, entry) in data.entries() {
            match entry {
                DataEntry::Value(value) => {
                    if let Some(value) = encode_for(table, key, value) {
                        let i = column_index(&mut collected.columns, key);
                        cells.push((i, InsertCell::Value(value)));
                    }
                }
                DataEntry::Relation(write) => {
                    if query.registry().is_none() {
                        return Err(OrmError::construction(format!(
                            "Nested write '{key}' needs a registry; create the query through Db"
                        )));
                    }
                    let relation = table.get_relation(key).ok_or_else(|| {
                        OrmError::construction(format!("Unknown relation {}.{key}", table.name))
                    })?;
                    collect_relation(&mut collected, &mut cells, row_index, relation, write)?;
                }
            }
        }
        collected.rows.push(cells);
    }
    Ok(collected)
}

fn collect_relation(
    collected: &mut Collected,
    cells: &mut Vec<(usize, InsertCell)>,
    row: usize,
    relation: &RelationDef,
    write: &NestedWrite,
) -> OrmResult<()> {
    match (relation.kind, write) {
        (RelationKind::BelongsTo, NestedWrite::Create(data)) => {
            let column = column_index(&mut collected.columns, &relation.foreign_key);
            cells.retain(|(i, _)| *i != column);
            cells.push((column, InsertCell::Pending));
            collected.ops.push(RelationOp::Prepend {
                row,
                column,
                relation: relation.clone(),
                data: data.clone(),
            });
        }
        (RelationKind::HasOne | RelationKind::HasMany, NestedWrite::Create(data)) => {
            push_append(collected, row, relation, vec![data.clone()]);
        }
        (RelationKind::HasMany, NestedWrite::CreateMany(data)) => {
            push_append(collected, row, relation, data.clone());
        }
        (kind, NestedWrite::CreateMany(_)) => {
            return Err(OrmError::construction(format!(
                "Relation {} is {kind:?} and takes a single create",
                relation.name
            )));
        }
    }
    Ok(())
}

fn push_append(collected: &mut Collected, row: usize, relation: &RelationDef, data: Vec<Data>) {
    if !collected.required.contains(&relation.primary_key) {
        collected.required.push(relation.primary_key.clone());
    }
    collected.ops.push(RelationOp::Append {
        row,
        relation: relation.clone(),
        data,
    });
}

/// Turn a select-ish return type into the one an insert produces.
fn insert_return_type(state: &mut QueryState, many: bool) {
    if state.select.iter().any(SelectItem::is_count) {
        state.select.clear();
        state.return_type = ReturnType::RowCount;
        return;
    }
    state.return_type = match (state.return_type, many) {
        (ReturnType::RowCount | ReturnType::Void, _) => state.return_type,
        (ReturnType::Pluck | ReturnType::Rows, true) => state.return_type,
        (_, true) => ReturnType::All,
        (ReturnType::Value | ReturnType::ValueOrThrow | ReturnType::OneOrThrow, false) => state.return_type,
        (_, false) => ReturnType::One,
    };
}

impl Query {
    /// Insert one row.
    pub fn insert(&self, data: Data) -> OrmResult<Self> {
        self.insert_rows(vec![data], false)
    }

    /// Insert several rows in one statement.
    pub fn insert_many(&self, rows: Vec<Data>) -> OrmResult<Self> {
        if rows.is_empty() {
            return Err(OrmError::construction("insert_many needs at least one row"));
        }
        self.insert_rows(rows, true)
    }

    fn insert_rows(&self, rows: Vec<Data>, many: bool) -> OrmResult<Self> {
        let table = Arc::clone(self.require_table("insert")?);
        let defaults = &self.state().defaults;
        let rows: Vec<Data> = rows.iter().map(|row| row.merged_over(defaults)).collect();
        let collected = collect_rows(self, &table, &rows)?;

        if collected.columns.is_empty() && rows.len() > 1 {
            return Err(OrmError::construction(
                "Cannot insert several rows without any column values",
            ));
        }

        let width = collected.columns.len();
        let cells = collected
            .rows
            .into_iter()
            .map(|row| {
                let mut cells = vec![InsertCell::Default; width];
                for (i, cell) in row {
                    cells[i] = cell;
                }
                cells
            })
            .collect();

        let payload = InsertPayload {
            columns: collected.columns,
            values: InsertValues::Rows(cells),
            on_conflict: None,
        };
        self.start_insert(payload, many, collected.required, collected.ops)
    }

    /// `INSERT INTO "t"(columns) VALUES <raw>`
    pub fn insert_raw(&self, columns: &[&str], raw: RawSql) -> OrmResult<Self> {
        self.require_table("insert")?;
        let payload = InsertPayload {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values: InsertValues::Raw(raw),
            on_conflict: None,
        };
        self.start_insert(payload, true, Vec::new(), Vec::new())
    }

    /// `INSERT INTO "t"(source columns, data columns) SELECT ...` from a one-row source query.
    ///
    /// The source columns are named by their aliases or column names; `data` values are
    /// appended to the source projection as bound values.
    pub fn insert_from(&self, source: &Query, data: Data) -> OrmResult<Self> {
        let table = Arc::clone(self.require_table("insert")?);
        if !source.return_type().expects_one() {
            return Err(OrmError::CreateFromMultipleRows);
        }
        let mut from = source.state().clone();
        if !matches!(from.statement, Statement::Select) {
            return Err(OrmError::construction("insert_from needs a select source"));
        }
        if from.select.is_empty() {
            return Err(OrmError::construction(
                "insert_from needs a source query with an explicit select",
            ));
        }

        let mut columns = Vec::with_capacity(from.select.len() + data.len());
        for item in &from.select {
            let name = item.output_name().ok_or_else(|| {
                OrmError::construction("insert_from source columns must be named; use select_as")
            })?;
            columns.push(name.to_string());
        }
        let data = data.merged_over(&self.state().defaults);
        for (key, value) in data.column_values(&table, "insert_from")? {
            columns.push(key);
            from.select.push(SelectItem::new(SelectExpr::Value(value), None));
        }

        let payload = InsertPayload {
            columns,
            values: InsertValues::From(Box::new(from)),
            on_conflict: None,
        };
        self.start_insert(payload, false, Vec::new(), Vec::new())
    }

    fn start_insert(
        &self,
        payload: InsertPayload,
        many: bool,
        required: Vec<String>,
        ops: Vec<RelationOp>,
    ) -> OrmResult<Self> {
        self.try_map(|s| {
            if !matches!(s.statement, Statement::Select) {
                return Err(OrmError::construction(format!(
                    "Cannot insert from a {} query",
                    s.statement.name()
                )));
            }
            s.where_.clear();
            s.where_all = false;
            insert_return_type(s, many);
            s.statement = Statement::Insert(payload);
            s.wrap_in_transaction |= !ops.is_empty();
            s.required_returning = required;
            s.relation_ops = ops;
            Ok(())
        })
    }

    /// Fill a foreign key cell left pending for a preceding related insert.
    pub(crate) fn fill_pending(&self, row: usize, column: usize, value: SqlValue) -> Self {
        self.map(|s| {
            if let Statement::Insert(payload) = &mut s.statement {
                payload.fill(row, column, value);
            }
        })
    }

    /// Values used for keys an insert does not set. Later calls override earlier ones.
    pub fn defaults(&self, data: Data) -> OrmResult<Self> {
        if data.entries().iter().any(|(_, e)| matches!(e, DataEntry::Relation(_))) {
            return Err(OrmError::construction("Defaults cannot contain nested writes"));
        }
        Ok(self.map(|s| s.defaults = data.merged_over(&s.defaults)))
    }

    /// Start an ON CONFLICT clause on an insert.
    pub fn on_conflict(&self, target: ConflictTarget) -> OrmResult<OnConflictBuilder> {
        if !matches!(self.state().statement, Statement::Insert(_)) {
            return Err(OrmError::construction("on_conflict() must follow an insert"));
        }
        Ok(OnConflictBuilder {
            query: self.clone(),
            target,
        })
    }
}

fn write_quoted_list(out: &mut String, names: &[String]) {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote(name));
    }
}

/// Write `INSERT INTO ... [ON CONFLICT ...]`, without RETURNING.
pub(crate) fn write_insert(
    state: &QueryState,
    table: &TableSchema,
    payload: &InsertPayload,
    out: &mut String,
    params: &mut ParamList,
) -> OrmResult<()> {
    out.push_str("INSERT INTO ");
    out.push_str(&table.quoted_name());
    if let Some(alias) = state.alias.as_ref().filter(|a| **a != table.name) {
        out.push_str(" AS ");
        out.push_str(&quote(alias));
    }

    match &payload.values {
        InsertValues::Rows(rows) if payload.columns.is_empty() => {
            if rows.len() > 1 {
                return Err(OrmError::construction(
                    "Cannot insert several rows without any column values",
                ));
            }
            out.push_str(" DEFAULT VALUES");
        }
        InsertValues::Rows(rows) => {
            out.push('(');
            write_quoted_list(out, &payload.columns);
            out.push_str(") VALUES ");
            for (r, row) in rows.iter().enumerate() {
                if r > 0 {
                    out.push_str(", ");
                }
                out.push('(');
                for (c, cell) in row.iter().enumerate() {
                    if c > 0 {
                        out.push_str(", ");
                    }
                    match cell {
                        InsertCell::Value(value) => write_value(value, out, None, params)?,
                        InsertCell::Default | InsertCell::Pending => out.push_str("DEFAULT"),
                    }
                }
                out.push(')');
            }
        }
        InsertValues::Raw(raw) => {
            out.push('(');
            write_quoted_list(out, &payload.columns);
            out.push_str(") VALUES ");
            params.push_raw(raw, out)?;
        }
        InsertValues::From(source) => {
            out.push('(');
            write_quoted_list(out, &payload.columns);
            out.push_str(") ");
            write_query(source, params, out)?;
        }
    }

    let Some(conflict) = &payload.on_conflict else {
        if state.where_.is_set() {
            return Err(OrmError::construction(
                "WHERE on an insert needs on_conflict(..).merge(..)",
            ));
        }
        return Ok(());
    };

    out.push_str(" ON CONFLICT");
    match &conflict.target {
        ConflictTarget::Columns(columns) => {
            out.push_str(" (");
            write_quoted_list(out, columns);
            out.push(')');
        }
        ConflictTarget::Raw(raw) => {
            out.push(' ');
            params.push_raw(raw, out)?;
        }
        ConflictTarget::Inferred => {}
    }

    match &conflict.action {
        ConflictAction::Ignore => {
            if state.where_.is_set() {
                return Err(OrmError::construction(
                    "WHERE cannot follow ON CONFLICT DO NOTHING",
                ));
            }
            out.push_str(" DO NOTHING");
        }
        ConflictAction::Merge(spec) => {
            out.push_str(" DO UPDATE SET ");
            match spec {
                MergeSpec::All => write_excluded(out, &payload.columns)?,
                MergeSpec::Columns(columns) => write_excluded(out, columns)?,
                MergeSpec::Values(data) => {
                    for (i, (key, entry)) in data.entries().iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&quote(key));
                        out.push_str(" = ");
                        if let DataEntry::Value(value) = entry {
                            write_value(value, out, None, params)?;
                        }
                    }
                }
                MergeSpec::Raw(raw) => params.push_raw(raw, out)?,
            }
            let qualifier = state.quoted_alias();
            if let Some(cond) = state.where_.build(qualifier.as_deref(), params)? {
                out.push_str(" WHERE ");
                out.push_str(&cond);
            }
        }
    }
    Ok(())
}

fn write_excluded(out: &mut String, columns: &[String]) -> OrmResult<()> {
    if columns.is_empty() {
        return Err(OrmError::construction("ON CONFLICT DO UPDATE has no columns to set"));
    }
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let column = quote(column);
        out.push_str(&column);
        out.push_str(" = excluded.");
        out.push_str(&column);
    }
    Ok(())
}
