//! SQLite storage implementation

use std::path::{Path, PathBuf};
use rusqlite::Connection;
use crate::Result;
use super::schema;

/// Connection string for a private in-memory database
pub const MEMORY_URL: &str = ":memory:";

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    /// Parse `:memory:`, a bare path, or an SQLAlchemy-style `sqlite://` URL.
    ///
    /// `sqlite://` and `sqlite:///:memory:` are in-memory, `sqlite:///rel.db`
    /// is relative and `sqlite:////abs/rel.db` is absolute.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        let path = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url);

        if path.is_empty() || path == MEMORY_URL {
            DatabaseTarget::Memory
        } else {
            DatabaseTarget::File(PathBuf::from(path))
        }
    }
}

/// SQLite-backed storage for the mapped tables
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

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open from a connection string, see [`DatabaseTarget::parse`]
    pub fn open_url(url: &str) -> Result<Self> {
        match DatabaseTarget::parse(url) {
            DatabaseTarget::Memory => Self::open_in_memory(),
            DatabaseTarget::File(path) => Self::open(&path),
        }
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        tracing::debug!("schema initialized ({} tables)", schema::TABLES.len());
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ========== Transactions ==========

    /// Begin a transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// True when no transaction is open
    pub fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }

    // ========== Introspection ==========

    /// Count rows in one of the schema tables
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        if !schema::TABLES.contains(&table) {
            return Err(crate::Error::UnknownEntity(table.to_string()));
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Foreign keys declared on a table, as the database sees them
    pub fn foreign_keys(&self, table: &str) -> Result<Vec<StoredForeignKey>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
        )?;

        let keys = stmt
            .query_map([table], |row| {
                Ok(StoredForeignKey {
                    table: table.to_string(),
                    column: row.get(0)?,
                    target_table: row.get(1)?,
                    target_column: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(keys)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            users: self.count_rows("users")?,
            addresses: self.count_rows("addresses")?,
            phone_numbers: self.count_rows("phone_numbers")?,
            house_addresses: self.count_rows("house_addresses")?,
            shipping_preferences: self.count_rows("shipping_preferences")?,
        })
    }
}

/// A foreign key read back from `pragma_foreign_key_list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredForeignKey {
    pub table: String,
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DbStats {
    pub users: usize,
    pub addresses: usize,
    pub phone_numbers: usize,
    pub house_addresses: usize,
    pub shipping_preferences: usize,
}

impl DbStats {
    pub fn rows(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("users", self.users),
            ("addresses", self.addresses),
            ("phone_numbers", self.phone_numbers),
            ("house_addresses", self.house_addresses),
            ("shipping_preferences", self.shipping_preferences),
        ]
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Users: {}", self.users)?;
        writeln!(f, "  Addresses: {}", self.addresses)?;
        writeln!(f, "  Phone numbers: {}", self.phone_numbers)?;
        writeln!(f, "  House addresses: {}", self.house_addresses)?;
        writeln!(f, "  Shipping preferences: {}", self.shipping_preferences)
    }
}
