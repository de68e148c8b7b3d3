//! Database-level configuration.

use crate::monitor::LogConfig;

/// What to do when a registered table declares no primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoPrimaryKey {
    /// Refuse to build the registry.
    #[default]
    Error,
    /// Emit a `tracing` warning and continue.
    Warn,
    /// Continue silently.
    Ignore,
}

/// Configuration shared by every query handle created from one [`crate::Db`].
///
/// # Example
/// ```ignore
/// let config = DbConfig::new()
///     .schema("app")
///     .log(LogConfig::new().max_sql_length(500))
///     .no_primary_key(NoPrimaryKey::Warn);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// SQL logging; `None` disables it.
    pub log: Option<LogConfig>,
    /// Primary key policy for registered tables.
    pub no_primary_key: NoPrimaryKey,
    /// Schema applied to tables that do not declare one.
    pub schema: Option<String>,
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    pub fn no_primary_key(mut self, policy: NoPrimaryKey) -> Self {
        self.no_primary_key = policy;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}
