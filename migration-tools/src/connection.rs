//! Scoped switching of the default database connection.
//!
//! The handler owns every connection opened during an invocation and tracks
//! which database is the current default. [`ConnectionHandler::scope`] makes a
//! target the default for the lifetime of the returned guard; dropping the
//! guard puts the previous default back on every exit path.

use std::collections::HashMap;

use log::debug;

use crate::engine::MigrationEngine;
use crate::errors::Result;
use crate::topology::DatabaseTarget;

pub struct ConnectionHandler<C> {
    default: Option<String>,
    open: HashMap<String, C>,
}

impl<C> Default for ConnectionHandler<C> {
    fn default() -> Self {
        Self {
            default: None,
            open: HashMap::new(),
        }
    }
}

impl<C> ConnectionHandler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `database` as the default connection.
    pub fn with_default(database: impl Into<String>) -> Self {
        Self {
            default: Some(database.into()),
            open: HashMap::new(),
        }
    }

    /// Name of the database currently acting as the default connection.
    pub fn current(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_open(&self, database: &str) -> bool {
        self.open.contains_key(database)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Make `target` the default connection until the guard is dropped.
    ///
    /// Reuses a connection opened earlier in the invocation. When connecting
    /// fails the default is left untouched.
    pub async fn scope<E>(&mut self, engine: &E, target: &DatabaseTarget) -> Result<ScopedConnection<'_, C>>
    where
        E: MigrationEngine<Connection = C>,
    {
        let conn = match self.open.remove(&target.name) {
            Some(conn) => conn,
            None => {
                debug!("opening connection to {}", target.name);
                engine.connect(target).await?
            }
        };

        let previous = self.default.replace(target.name.clone());
        debug!(
            "default connection switched from {} to {}",
            previous.as_deref().unwrap_or("<none>"),
            target.name
        );

        Ok(ScopedConnection {
            handler: self,
            database: target.name.clone(),
            previous,
            conn: Some(conn),
        })
    }
}

/// Guard returned by [`ConnectionHandler::scope`].
pub struct ScopedConnection<'a, C> {
    handler: &'a mut ConnectionHandler<C>,
    database: String,
    previous: Option<String>,
    conn: Option<C>,
}

impl<C> ScopedConnection<'_, C> {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn connection(&mut self) -> &mut C {
        // Only `Drop` takes the connection out.
        self.conn
            .as_mut()
            .expect("scoped connection is held until the guard is dropped")
    }
}

impl<C> Drop for ScopedConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.handler.open.insert(self.database.clone(), conn);
        }
        self.handler.default = self.previous.take();
        debug!(
            "default connection restored to {}",
            self.handler.default.as_deref().unwrap_or("<none>")
        );
    }
}
