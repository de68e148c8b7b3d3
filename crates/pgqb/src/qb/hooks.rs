//! Lifecycle hooks run by the executor around inserts and updates.

use std::sync::Arc;

use crate::error::OrmResult;
use crate::exec::QueryOutput;
use crate::qb::Query;

impl Query {
    /// Run `hook` before an insert executes; an error aborts the insert.
    pub fn before_insert(&self, hook: impl Fn(&Query) -> OrmResult<()> + Send + Sync + 'static) -> Self {
        let hook = Arc::new(hook);
        self.map(|s| s.hooks.before_insert.push(hook))
    }

    /// Run `hook` after an insert committed.
    pub fn after_insert(
        &self,
        hook: impl Fn(&Query, &QueryOutput) -> OrmResult<()> + Send + Sync + 'static,
    ) -> Self {
        let hook = Arc::new(hook);
        self.map(|s| s.hooks.after_insert.push(hook))
    }

    /// Run `hook` before an update executes; an error aborts the update.
    pub fn before_update(&self, hook: impl Fn(&Query) -> OrmResult<()> + Send + Sync + 'static) -> Self {
        let hook = Arc::new(hook);
        self.map(|s| s.hooks.before_update.push(hook))
    }

    /// Run `hook` after an update committed.
    pub fn after_update(
        &self,
        hook: impl Fn(&Query, &QueryOutput) -> OrmResult<()> + Send + Sync + 'static,
    ) -> Self {
        let hook = Arc::new(hook);
        self.map(|s| s.hooks.after_update.push(hook))
    }
}
