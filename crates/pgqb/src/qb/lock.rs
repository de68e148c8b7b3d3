//! Row locking: `FOR UPDATE [OF ...] [NOWAIT | SKIP LOCKED]`.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote;
use crate::qb::Query;
use crate::qb::param::ParamList;
use crate::value::RawSql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrength {
    Update,
    NoKeyUpdate,
    Share,
    KeyShare,
}

impl LockStrength {
    pub fn as_sql(self) -> &'static str {
        match self {
            LockStrength::Update => "UPDATE",
            LockStrength::NoKeyUpdate => "NO KEY UPDATE",
            LockStrength::Share => "SHARE",
            LockStrength::KeyShare => "KEY SHARE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    NoWait,
    SkipLocked,
}

#[derive(Debug, Clone)]
pub(crate) enum LockTables {
    Names(Vec<String>),
    Raw(RawSql),
}

#[derive(Debug, Clone)]
pub struct LockClause {
    pub(crate) strength: LockStrength,
    pub(crate) tables: Option<LockTables>,
    pub(crate) wait: Option<LockWait>,
}

impl LockClause {
    pub(crate) fn write_sql(&self, out: &mut String, params: &mut ParamList) -> OrmResult<()> {
        out.push_str("FOR ");
        out.push_str(self.strength.as_sql());
        match &self.tables {
            Some(LockTables::Names(names)) => {
                out.push_str(" OF ");
                let names: Vec<String> = names.iter().map(|n| quote(n)).collect();
                out.push_str(&names.join(", "));
            }
            Some(LockTables::Raw(raw)) => {
                out.push_str(" OF ");
                params.push_raw(raw, out)?;
            }
            None => {}
        }
        match self.wait {
            Some(LockWait::NoWait) => out.push_str(" NOWAIT"),
            Some(LockWait::SkipLocked) => out.push_str(" SKIP LOCKED"),
            None => {}
        }
        Ok(())
    }
}

impl Query {
    fn lock_with(&self, strength: LockStrength) -> Self {
        self.map(|s| {
            s.lock = Some(LockClause {
                strength,
                tables: None,
                wait: None,
            })
        })
    }

    pub fn for_update(&self) -> Self {
        self.lock_with(LockStrength::Update)
    }

    pub fn for_no_key_update(&self) -> Self {
        self.lock_with(LockStrength::NoKeyUpdate)
    }

    pub fn for_share(&self) -> Self {
        self.lock_with(LockStrength::Share)
    }

    pub fn for_key_share(&self) -> Self {
        self.lock_with(LockStrength::KeyShare)
    }

    /// Restrict the lock to some tables: `FOR UPDATE OF "a", "b"`.
    pub fn lock_of(&self, tables: &[&str]) -> OrmResult<Self> {
        let names = tables.iter().map(|t| t.to_string()).collect();
        self.update_lock(|lock| lock.tables = Some(LockTables::Names(names)))
    }

    pub fn lock_of_raw(&self, raw: RawSql) -> OrmResult<Self> {
        self.update_lock(|lock| lock.tables = Some(LockTables::Raw(raw)))
    }

    pub fn no_wait(&self) -> OrmResult<Self> {
        self.update_lock(|lock| lock.wait = Some(LockWait::NoWait))
    }

    pub fn skip_locked(&self) -> OrmResult<Self> {
        self.update_lock(|lock| lock.wait = Some(LockWait::SkipLocked))
    }

    fn update_lock(&self, f: impl FnOnce(&mut LockClause)) -> OrmResult<Self> {
        self.try_map(|s| match s.lock.as_mut() {
            Some(lock) => {
                f(lock);
                Ok(())
            }
            None => Err(OrmError::construction(
                "Lock options need a locking clause; call for_update() first",
            )),
        })
    }
}
