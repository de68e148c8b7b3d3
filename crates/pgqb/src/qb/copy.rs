//! COPY FROM / COPY TO.
//!
//! COPY does not accept bound parameters, so option values are written as escaped string
//! literals.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::state::{ReturnType, Statement};
use crate::schema::TableSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyDirection {
    #[default]
    From,
    To,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CopyTarget {
    /// A file on the database server.
    Path(String),
    /// A shell command run by the database server.
    Program(String),
    /// The client connection.
    #[default]
    Stdio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyHeader {
    Bool(bool),
    /// `HEADER match`: check the header line against the column names.
    Match,
}

/// Options of one COPY statement. Unset options are left out of the WITH list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub columns: Vec<String>,
    pub direction: CopyDirection,
    pub target: CopyTarget,
    pub format: Option<String>,
    pub freeze: Option<bool>,
    pub delimiter: Option<String>,
    pub null: Option<String>,
    pub header: Option<CopyHeader>,
    pub quote: Option<String>,
    pub escape: Option<String>,
    pub force_quote: Vec<String>,
    pub force_not_null: Vec<String>,
    pub force_null: Vec<String>,
    pub encoding: Option<String>,
}

impl CopyOptions {
    /// `COPY "t" FROM 'path'`
    pub fn from_path(path: &str) -> Self {
        Self {
            direction: CopyDirection::From,
            target: CopyTarget::Path(path.to_string()),
            ..Self::default()
        }
    }

    /// `COPY "t" TO 'path'`
    pub fn to_path(path: &str) -> Self {
        Self {
            direction: CopyDirection::To,
            target: CopyTarget::Path(path.to_string()),
            ..Self::default()
        }
    }

    pub fn from_program(program: &str) -> Self {
        Self {
            direction: CopyDirection::From,
            target: CopyTarget::Program(program.to_string()),
            ..Self::default()
        }
    }

    pub fn to_program(program: &str) -> Self {
        Self {
            direction: CopyDirection::To,
            target: CopyTarget::Program(program.to_string()),
            ..Self::default()
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn freeze(mut self, freeze: bool) -> Self {
        self.freeze = Some(freeze);
        self
    }

    pub fn delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = Some(delimiter.to_string());
        self
    }

    pub fn null(mut self, null: &str) -> Self {
        self.null = Some(null.to_string());
        self
    }

    pub fn header(mut self, header: CopyHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn quote(mut self, quote: &str) -> Self {
        self.quote = Some(quote.to_string());
        self
    }

    pub fn escape(mut self, escape: &str) -> Self {
        self.escape = Some(escape.to_string());
        self
    }

    pub fn force_quote(mut self, columns: &[&str]) -> Self {
        self.force_quote = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn force_not_null(mut self, columns: &[&str]) -> Self {
        self.force_not_null = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn force_null(mut self, columns: &[&str]) -> Self {
        self.force_null = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_string());
        self
    }
}

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn column_list(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    format!("({})", quoted.join(", "))
}

/// The format name is spliced as a keyword, so it has to be one.
fn check_format(format: &str) -> OrmResult<()> {
    if format.chars().all(|c| c.is_ascii_alphabetic()) && !format.is_empty() {
        Ok(())
    } else {
        Err(OrmError::construction(format!("Invalid COPY format '{format}'")))
    }
}

impl Query {
    /// `COPY "t"[(columns)] FROM|TO ... [WITH (...)]`
    pub fn copy(&self, options: CopyOptions) -> OrmResult<Self> {
        self.require_table("copy")?;
        if let Some(format) = &options.format {
            check_format(format)?;
        }
        self.try_map(|s| {
            if !matches!(s.statement, Statement::Select) {
                return Err(OrmError::construction(format!(
                    "Cannot copy from a {} query",
                    s.statement.name()
                )));
            }
            s.statement = Statement::Copy(options);
            s.return_type = ReturnType::RowCount;
            Ok(())
        })
    }
}

pub(crate) fn write_copy(table: &TableSchema, options: &CopyOptions, out: &mut String) {
    out.push_str("COPY ");
    out.push_str(&table.quoted_name());
    if !options.columns.is_empty() {
        out.push_str(&column_list(&options.columns));
    }
    out.push_str(match options.direction {
        CopyDirection::From => " FROM ",
        CopyDirection::To => " TO ",
    });
    match (&options.target, options.direction) {
        (CopyTarget::Path(path), _) => out.push_str(&string_literal(path)),
        (CopyTarget::Program(program), _) => {
            out.push_str("PROGRAM ");
            out.push_str(&string_literal(program));
        }
        (CopyTarget::Stdio, CopyDirection::From) => out.push_str("STDIN"),
        (CopyTarget::Stdio, CopyDirection::To) => out.push_str("STDOUT"),
    }

    let mut with = Vec::new();
    if let Some(format) = &options.format {
        with.push(format!("FORMAT {format}"));
    }
    if let Some(freeze) = options.freeze {
        with.push(format!("FREEZE {freeze}"));
    }
    if let Some(delimiter) = &options.delimiter {
        with.push(format!("DELIMITER {}", string_literal(delimiter)));
    }
    if let Some(null) = &options.null {
        with.push(format!("NULL {}", string_literal(null)));
    }
    match &options.header {
        Some(CopyHeader::Bool(header)) => with.push(format!("HEADER {header}")),
        Some(CopyHeader::Match) => with.push("HEADER match".to_string()),
        None => {}
    }
    if let Some(quote) = &options.quote {
        with.push(format!("QUOTE {}", string_literal(quote)));
    }
    if let Some(escape) = &options.escape {
        with.push(format!("ESCAPE {}", string_literal(escape)));
    }
    if !options.force_quote.is_empty() {
        with.push(format!("FORCE_QUOTE {}", column_list(&options.force_quote)));
    }
    if !options.force_not_null.is_empty() {
        with.push(format!("FORCE_NOT_NULL {}", column_list(&options.force_not_null)));
    }
    if !options.force_null.is_empty() {
        with.push(format!("FORCE_NULL {}", column_list(&options.force_null)));
    }
    if let Some(encoding) = &options.encoding {
        with.push(format!("ENCODING {}", string_literal(encoding)));
    }

    if !with.is_empty() {
        out.push_str(" WITH (");
        out.push_str(&with.join(", "));
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_double_single_quotes() {
        assert_eq!(string_literal("it's"), "'it''s'");
    }

    #[test]
    fn format_must_be_a_word() {
        assert!(check_format("csv").is_ok());
        assert!(check_format("csv) ; DROP").is_err());
        assert!(check_format("").is_err());
    }
}
