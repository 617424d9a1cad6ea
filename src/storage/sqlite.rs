//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use crate::{Result, Error};
use crate::fact::{Fact, FactId};
use super::schema;

/// SQLite-backed storage for facts.
///
/// Every mutating method runs in its own transaction and either applies
/// completely or not at all. This type is synchronous and not shared; the
/// [`Store`](super::Store) worker owns the only instance.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for pragma in schema::PRAGMAS {
            self.conn.execute_batch(pragma)?;
        }
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Mutations ==========

    /// Insert a batch of facts in one transaction.
    ///
    /// A duplicate id, whether already stored or repeated inside the batch,
    /// rolls back the whole batch.
    pub fn append(&mut self, facts: &[Fact]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO facts (id, text) VALUES (?1, ?2)")?;
            for fact in facts {
                match stmt.execute(params![fact.id.to_id_string(), fact.text]) {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        return Err(Error::DuplicateFact(fact.id));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        tx.commit()?;
        Ok(facts.len())
    }

    /// Delete every fact
    pub fn delete_all(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM facts", [])?;
        tx.commit()?;
        Ok(removed)
    }

    /// Delete one fact by id. Absent ids remove nothing.
    pub fn delete_one(&mut self, id: &FactId) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM facts WHERE id = ?1", [id.to_id_string()])?;
        Ok(removed)
    }

    /// Delete every fact whose id is in `ids`
    pub fn delete_many(&mut self, ids: &[FactId]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM facts WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute([id.to_id_string()])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    // ========== Queries ==========

    /// All facts in insertion order
    pub fn all_facts(&self) -> Result<Vec<Fact>> {
        let mut stmt = self.conn.prepare("SELECT id, text FROM facts ORDER BY seq")?;
        let facts = stmt
            .query_map([], |row| Self::row_to_fact(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(facts)
    }

    /// Get a fact by id
    pub fn get_fact(&self, id: &FactId) -> Result<Option<Fact>> {
        self.conn
            .query_row(
                "SELECT id, text FROM facts WHERE id = ?1",
                [id.to_id_string()],
                |row| Self::row_to_fact(row),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn contains(&self, id: &FactId) -> Result<bool> {
        Ok(self.get_fact(id)?.is_some())
    }

    /// Count all facts
    pub fn count_facts(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let page_count: i64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(DbStats {
            facts: self.count_facts()?,
            size_bytes: (page_count * page_size) as u64,
        })
    }

    /// Helper to convert a row to a Fact
    fn row_to_fact(row: &rusqlite::Row) -> rusqlite::Result<Fact> {
        let id_str: String = row.get(0)?;
        let id: FactId = id_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Fact::with_id(id, row.get::<_, String>(1)?))
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub facts: usize,
    pub size_bytes: u64,
}
