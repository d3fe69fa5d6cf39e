use crate::entities::product::seed_default_products;
use crate::error::{LedgerError, Result};
use crate::schema;
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handle to the on-disk store.
///
/// Holds only the location. Every logical operation opens its own connection
/// and transaction through [`Store::transact`] or [`Store::read`]; both are
/// released before the call returns, on success and on error alike.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Store { path: path.into() }
    }

    /// Open the store at `path`, creating tables and the seed catalog if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Store::new(path);
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the schema and seed the product catalog.
    ///
    /// Safe to run on every startup: tables are created only when missing and
    /// the catalog is inserted only when the product table is empty.
    /// Returns the number of seed products inserted by this call.
    pub fn initialize(&self) -> Result<usize> {
        let seeded = self.transact(|conn| {
            setup_database(conn)?;
            seed_default_products(conn)
        })?;

        if seeded > 0 {
            info!(path = %self.path.display(), seeded, "store initialized with seed catalog");
        } else {
            debug!(path = %self.path.display(), "store already initialized");
        }
        Ok(seeded)
    }

    /// Run `op` inside a single write transaction.
    ///
    /// Commits when `op` returns `Ok`, rolls back otherwise, so a failed
    /// operation never leaves a partial write behind.
    pub fn transact<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.scoped(TransactionBehavior::Immediate, op)
    }

    /// Run a read-only `op` against one consistent snapshot
    pub fn read<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.scoped(TransactionBehavior::Deferred, op)
    }

    fn scoped<T, F>(&self, behavior: TransactionBehavior, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(behavior)?;

        match op(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                debug!(error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;

        // WAL for crash recovery; foreign keys are off by default in SQLite
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", true)?;

        Ok(conn)
    }
}

/// Create the four tables and their indexes. Never touches existing rows.
pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Tables (parents first so foreign keys resolve)
    // ==========================================================================
    conn.execute(schema::CREATE_CUSTOMERS, [])?;
    conn.execute(schema::CREATE_PRODUCTS, [])?;
    conn.execute(schema::CREATE_DAILY_ENTRIES, [])?;
    conn.execute(schema::CREATE_BILLS, [])?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    for ddl in schema::CREATE_INDEXES {
        conn.execute(ddl, [])?;
    }

    Ok(())
}

/// Row count for one of the schema tables
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    if !schema::TABLES.contains(&table) {
        return Err(LedgerError::validation("table", format!("unknown table '{}'", table)));
    }
    let count: i64 =
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}
