//! SQL logging through `tracing`.
//!
//! The executor reports every statement it sends (transaction control included) to the
//! configured [`LogConfig`]. Events use the `pgqb.sql` target so they can be filtered
//! independently of application logs.

use std::time::Duration;
use tracing::Level;

use crate::error::OrmError;

/// Truncate `sql` to at most `max_bytes`, backing off to a UTF-8 boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// How executed SQL is logged.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for statement events. Failures always log at WARN.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl LogConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Level for statement events.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Cut logged SQL after `len` bytes.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log the full SQL text.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn display_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub(crate) fn on_success(&self, sql: &str, param_count: usize, elapsed: Duration, row_count: u64) {
        let sql = self.display_sql(sql);
        emit_at_level!(
            self.level,
            target: "pgqb.sql",
            param_count,
            row_count,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            sql = %sql,
        );
    }

    pub(crate) fn on_error(&self, sql: &str, param_count: usize, elapsed: Duration, error: &OrmError) {
        let sql = self.display_sql(sql);
        tracing::warn!(
            target: "pgqb.sql",
            param_count,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            error = %error,
            sql = %sql,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT", 3), "SEL");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate_sql_bytes("aé", 2), "a");
    }

    #[test]
    fn display_sql_appends_ellipsis() {
        let config = LogConfig::new().max_sql_length(6);
        assert_eq!(config.display_sql("SELECT * FROM t"), "SELECT...");
        assert_eq!(config.clone().no_truncate().display_sql("SELECT * FROM t"), "SELECT * FROM t");
    }
}
