//! SQLite record store using `rusqlite`.

use crate::data::{SalesRecord, SalesTable};
use crate::error::DashboardError;
use crate::ingest::load_sales_csv;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::info;

/// Owns the connection to the `sales` database
pub struct SalesStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SalesStore {
    /// Open (or create) the database file at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DashboardError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, DashboardError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace every stored row with `table` in a single transaction
    pub fn replace_all(&mut self, table: &SalesTable) -> Result<usize, DashboardError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sales", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales (date, product, category, quantity, price, customer_id, region, total_sales)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for r in &table.records {
                stmt.execute(params![
                    r.date,
                    r.product,
                    r.category,
                    r.quantity,
                    r.price,
                    r.customer_id,
                    r.region,
                    r.total_sales
                ])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO dataset_meta (id, has_customer_column) VALUES (1, ?1)",
            params![table.has_customer_column],
        )?;
        tx.commit()?;
        Ok(table.len())
    }

    /// Read the whole `sales` table ordered by date
    pub fn load_all(&self) -> Result<SalesTable, DashboardError> {
        let has_customer_column = self
            .conn
            .query_row(
                "SELECT has_customer_column FROM dataset_meta WHERE id = 1",
                [],
                |row| row.get::<_, bool>(0),
            )
            .optional()?
            .unwrap_or(true);

        let mut stmt = self.conn.prepare(
            "SELECT date, product, category, quantity, price, customer_id, region, total_sales
             FROM sales ORDER BY date, id",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(SalesRecord {
                    date: row.get(0)?,
                    product: row.get(1)?,
                    category: row.get(2)?,
                    quantity: row.get(3)?,
                    price: row.get(4)?,
                    customer_id: row.get(5)?,
                    region: row.get(6)?,
                    total_sales: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SalesTable::new(records, has_customer_column))
    }
}

fn init_schema(conn: &Connection) -> Result<(), DashboardError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sales (
             id           INTEGER PRIMARY KEY AUTOINCREMENT,
             date         TEXT NOT NULL,
             product      TEXT NOT NULL,
             category     TEXT,
             quantity     INTEGER NOT NULL,
             price        REAL NOT NULL,
             customer_id  TEXT,
             region       TEXT,
             total_sales  REAL NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_sales_date ON sales (date);
         CREATE TABLE IF NOT EXISTS dataset_meta (
             id                  INTEGER PRIMARY KEY CHECK (id = 1),
             has_customer_column INTEGER NOT NULL
         );",
    )?;
    Ok(())
}

/// Ingest a CSV file and replace the store's contents with it
pub fn seed_from_csv(csv_path: &Path, store: &mut SalesStore) -> Result<usize, DashboardError> {
    let table = load_sales_csv(csv_path)?;
    let rows = store.replace_all(&table)?;
    info!(rows, db = ?store.path(), "seeded sales table");
    Ok(rows)
}
