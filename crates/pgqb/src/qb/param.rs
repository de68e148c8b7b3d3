//! Positional parameter collection.
//!
//! One `ParamList` is threaded through a whole statement, sub-queries included, so every
//! `$n` placeholder is numbered at the moment its text is written and values always appear
//! in the same order as their placeholders.

use tokio_postgres::types::ToSql;

use crate::error::{OrmError, OrmResult};
use crate::value::{RawSql, SqlValue};

/// Ordered bound values of a statement being serialized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    values: Vec<SqlValue>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Add a value and return its 1-based index.
    pub fn push(&mut self, value: SqlValue) -> usize {
        self.values.push(value);
        self.values.len()
    }

    /// Add a value and return its `$n` placeholder.
    pub fn placeholder(&mut self, value: SqlValue) -> String {
        format!("${}", self.push(value))
    }

    /// Write a raw fragment, replacing each `?` with the next bound value.
    ///
    /// A fragment without values is spliced verbatim, so operators such as jsonb `?` need no
    /// escaping there. Once a fragment has values, `??` stands for a literal `?` and the number
    /// of placeholders must match the number of values.
    pub fn push_raw(&mut self, raw: &RawSql, out: &mut String) -> OrmResult<()> {
        if raw.values.is_empty() {
            out.push_str(&raw.sql);
            return Ok(());
        }

        let mut values = raw.values.iter();
        let mut placeholders = 0;
        let mut chars = raw.sql.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '?' {
                out.push(ch);
                continue;
            }
            if chars.next_if_eq(&'?').is_some() {
                out.push('?');
                continue;
            }
            placeholders += 1;
            if let Some(value) = values.next() {
                let idx = self.push(value.clone());
                out.push('$');
                out.push_str(&idx.to_string());
            }
        }

        if placeholders != raw.values.len() {
            return Err(OrmError::construction(format!(
                "Raw SQL `{}` has {placeholders} placeholder(s) for {} value(s)",
                raw.sql,
                raw.values.len()
            )));
        }
        Ok(())
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get all parameters as references for tokio-postgres.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_placeholders_continue_numbering() {
        let mut params = ParamList::new();
        params.push(SqlValue::Int(1));

        let mut out = String::new();
        let raw = RawSql::with_values("a = ? OR b = ?", vec![SqlValue::Int(2), SqlValue::Int(3)]);
        params.push_raw(&raw, &mut out).unwrap();

        assert_eq!(out, "a = $2 OR b = $3");
        assert_eq!(
            params.into_values(),
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );
    }

    #[test]
    fn fragments_without_values_are_verbatim() {
        let mut params = ParamList::new();
        let mut out = String::new();
        params.push_raw(&RawSql::new("data ? 'key' OR data ?? 'x'"), &mut out).unwrap();
        assert_eq!(out, "data ? 'key' OR data ?? 'x'");
        assert!(params.is_empty());
    }

    #[test]
    fn doubled_question_mark_is_a_literal() {
        let mut params = ParamList::new();
        let mut out = String::new();
        let raw = RawSql::with_values("data ?? 'k' AND id = ?", vec![SqlValue::Int(5)]);
        params.push_raw(&raw, &mut out).unwrap();

        assert_eq!(out, "data ? 'k' AND id = $1");
        assert_eq!(params.into_values(), vec![SqlValue::Int(5)]);
    }

    #[test]
    fn placeholder_count_must_match_values() {
        let mut out = String::new();

        let extra_value = RawSql::with_values("id = ?", vec![SqlValue::Int(5), SqlValue::Int(6)]);
        let err = ParamList::new().push_raw(&extra_value, &mut out).unwrap_err();
        assert!(err.to_string().contains("1 placeholder(s) for 2 value(s)"));

        // An unescaped jsonb operator counts as a placeholder.
        let unescaped = RawSql::with_values("data ? 'k' AND id = ?", vec![SqlValue::Int(5)]);
        assert!(ParamList::new().push_raw(&unescaped, &mut out).is_err());
    }
}
