//! TRUNCATE.

use crate::error::{OrmError, OrmResult};
use crate::qb::Query;
use crate::qb::state::{ReturnType, Statement};
use crate::schema::TableSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TruncateOptions {
    pub restart_identity: bool,
    pub cascade: bool,
}

impl TruncateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart_identity(mut self) -> Self {
        self.restart_identity = true;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }
}

impl Query {
    /// `TRUNCATE "t" [RESTART IDENTITY] [CASCADE]`
    pub fn truncate(&self, options: TruncateOptions) -> OrmResult<Self> {
        self.require_table("truncate")?;
        self.try_map(|s| {
            if !matches!(s.statement, Statement::Select) {
                return Err(OrmError::construction(format!(
                    "Cannot truncate from a {} query",
                    s.statement.name()
                )));
            }
            s.statement = Statement::Truncate(options);
            s.return_type = ReturnType::Void;
            Ok(())
        })
    }
}

pub(crate) fn write_truncate(table: &TableSchema, options: &TruncateOptions, out: &mut String) {
    out.push_str("TRUNCATE ");
    out.push_str(&table.quoted_name());
    if options.restart_identity {
        out.push_str(" RESTART IDENTITY");
    }
    if options.cascade {
        out.push_str(" CASCADE");
    }
}
