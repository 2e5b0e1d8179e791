//! SQLite-backed command executor and tree accessor.
//!
//! One connection behind a mutex. A transaction holds the connection guard
//! for its whole lifetime, so statements from other threads queue behind it.

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};

use crate::config::DescendantsSettings;
use crate::error::Result;
use crate::executor::{CommandExecutor, Params, Transaction};
use crate::statements;
use crate::tree::TreeAccessor;
use crate::types::{ClosureRow, Item, ItemId};

/// SQLite store holding the `Items` edge table and the `Descendants` closure table.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>, settings: &DescendantsSettings) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn, settings)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(settings: &DescendantsSettings) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, settings)
    }

    fn from_connection(conn: Connection, settings: &DescendantsSettings) -> Result<Self> {
        conn.busy_timeout(settings.command_timeout())?;
        conn.execute_batch(statements::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns every closure row including its opaque id.
    pub fn closure_rows(&self) -> Result<Vec<ClosureRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ID, Ancestor, Descendant FROM Descendants ORDER BY Ancestor, Descendant, ID",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, ancestor, descendant)| {
                Ok(ClosureRow {
                    id,
                    ancestor: ItemId::parse(&ancestor)?,
                    descendant: ItemId::parse(&descendant)?,
                })
            })
            .collect()
    }

    /// Returns every `(item, parent)` edge of the primary tree.
    pub fn item_edges(&self) -> Result<Vec<(ItemId, ItemId)>> {
        self.query_pairs(statements::SELECT_ITEM_EDGES, &[])
    }
}

/// Renders bindings as the text values stored in the tables.
fn bind_values(params: Params<'_>) -> Vec<String> {
    params.iter().map(|(_, id)| id.to_string()).collect()
}

fn named<'a>(params: Params<'a>, values: &'a [String]) -> Vec<(&'a str, &'a dyn ToSql)> {
    params
        .iter()
        .zip(values.iter())
        .map(|((name, _), value)| (*name, value as &dyn ToSql))
        .collect()
}

fn collect_ids(conn: &Connection, statement: &str, params: Params<'_>) -> Result<Vec<ItemId>> {
    let values = bind_values(params);
    let bindings = named(params, &values);
    let mut stmt = conn.prepare(statement)?;
    let raw = stmt
        .query_map(bindings.as_slice(), |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.iter().map(|value| ItemId::parse(value)).collect()
}

impl CommandExecutor for SqliteStore {
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            completed: false,
        }))
    }

    fn query_ids(&self, statement: &str, params: Params<'_>) -> Result<Vec<ItemId>> {
        let conn = self.conn.lock();
        collect_ids(&conn, statement, params)
    }

    fn query_pairs(&self, statement: &str, params: Params<'_>) -> Result<Vec<(ItemId, ItemId)>> {
        let conn = self.conn.lock();
        let values = bind_values(params);
        let bindings = named(params, &values);
        let mut stmt = conn.prepare(statement)?;
        let raw = stmt
            .query_map(bindings.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|(first, second)| Ok((ItemId::parse(first)?, ItemId::parse(second)?)))
            .collect()
    }
}

impl TreeAccessor for SqliteStore {
    fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let conn = self.conn.lock();
        let params = [(":itemId", id)];
        let values = bind_values(&params);
        let bindings = named(&params, &values);
        let parent: Option<String> = conn
            .query_row(statements::SELECT_ITEM_PARENT, bindings.as_slice(), |row| {
                row.get(0)
            })
            .optional()?;
        let Some(parent) = parent else {
            return Ok(None);
        };

        let children = collect_ids(&conn, statements::SELECT_ITEM_CHILDREN, &params)?;
        Ok(Some(Item::new(id, ItemId::parse(&parent)?, children)))
    }
}

struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    completed: bool,
}

impl Transaction for SqliteTransaction<'_> {
    fn execute(&mut self, statement: &str, params: Params<'_>) -> Result<usize> {
        let values = bind_values(params);
        let bindings = named(params, &values);
        Ok(self.conn.execute(statement, bindings.as_slice())?)
    }

    fn complete(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.completed = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.completed {
            if let Err(error) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("descendants store rollback failed: {error}");
            }
        }
    }
}
