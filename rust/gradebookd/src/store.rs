use rusqlite::{Connection, Transaction};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::repo::{AttendanceRepository, ClassRepository, GradeRepository, TeacherRepository};
use crate::watch::{SubscriptionId, Topic, Watchers};

/// Workspace database plus the live-query registry. Every write goes
/// through [`Store::write`], which commits before notifying subscribers.
pub struct Store {
    conn: Connection,
    watchers: Watchers,
    config: Config,
}

impl Store {
    pub fn open(workspace: &Path, config: Config) -> Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
            watchers: Watchers::new(),
            config,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_schema(&conn)?;
        Ok(Self {
            conn,
            watchers: Watchers::new(),
            config: Config::default(),
        })
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn teachers(&self) -> TeacherRepository<'_> {
        TeacherRepository::new(self)
    }

    pub fn classes(&self) -> ClassRepository<'_> {
        ClassRepository::new(self)
    }

    pub fn attendance(&self) -> AttendanceRepository<'_> {
        AttendanceRepository::new(self)
    }

    pub fn grades(&self) -> GradeRepository<'_> {
        GradeRepository::new(self)
    }

    /// Runs `f` in one transaction. The topics it returns are notified
    /// only after the commit succeeds.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<(T, Vec<Topic>)>,
    ) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let (out, topics) = f(&tx)?;
        tx.commit()?;
        self.watchers.notify(&self.conn, &topics);
        Ok(out)
    }

    pub(crate) fn subscribe<T, Q, F>(&self, topic: Topic, query: Q, on_change: F) -> Result<SubscriptionId>
    where
        T: 'static,
        Q: Fn(&Connection) -> Result<Vec<T>> + 'static,
        F: FnMut(&[T]) + 'static,
    {
        self.watchers.subscribe(&self.conn, topic, query, on_change)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.watchers.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.watchers.len()
    }
}
