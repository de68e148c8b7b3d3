//! The entry point handing out query handles for registered tables.

use std::sync::Arc;

use crate::config::DbConfig;
use crate::error::{OrmError, OrmResult};
use crate::qb::Query;
use crate::schema::{Registry, TableSchema};

/// A validated table registry plus the configuration every handle inherits.
///
/// # Example
/// ```ignore
/// let db = Db::new(
///     vec![
///         TableSchema::new("user")
///             .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
///             .column(ColumnDef::new("name", ColumnType::Text))
///             .has_many("posts", "post", "authorId", "id"),
///         TableSchema::new("post")
///             .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
///             .column(ColumnDef::new("authorId", ColumnType::Integer)),
///     ],
///     DbConfig::new(),
/// )?;
///
/// let users = db.table("user")?;
/// ```
#[derive(Debug, Clone)]
pub struct Db {
    registry: Arc<Registry>,
    config: DbConfig,
}

impl Db {
    pub fn new(tables: Vec<TableSchema>, config: DbConfig) -> OrmResult<Self> {
        let registry = Registry::new(tables, &config)?;
        Ok(Self {
            registry: Arc::new(registry),
            config,
        })
    }

    /// A fresh query on `name`.
    pub fn table(&self, name: &str) -> OrmResult<Query> {
        let table = self
            .registry
            .get(name)
            .ok_or_else(|| OrmError::construction(format!("Unknown table {name}")))?;
        Ok(Query::with_registry(
            table,
            Arc::clone(&self.registry),
            self.config.log.clone(),
        ))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}
