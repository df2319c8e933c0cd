use crate::error::{MarketError, MarketResult};
use crate::model::{CountyIdentity, YearMonth};
use crate::shaper::{self, RawRow};
use crate::store::FactStore;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Column list shared by every fact-table SELECT, in `RawRow` field order.
const FACT_COLUMNS: &str = "county_id, date, average, median, total, active, new,
    median_listing_price_per_square_foot, median_square_feet,
    hotness, viewers, supply, demand";

/// Identity row as it appears in the counties CSV.
#[derive(Debug, Deserialize, Clone)]
struct CountyCsvRow {
    id: i64,
    name: String,
}

/// Totals reported after an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub counties: usize,
    pub metric_rows: usize,
}

pub fn setup_database(conn: &Connection) -> MarketResult<()> {
    // Enable WAL mode so readers never block on the import writer
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Counties Table (identity reference data)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS counties (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // County Metrics Table (one row per county per month)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS county_metrics (
            county_id INTEGER NOT NULL,
            date INTEGER NOT NULL,
            average REAL,
            median REAL,
            total REAL,
            active REAL,
            new REAL,
            median_listing_price_per_square_foot REAL,
            median_square_feet REAL,
            hotness REAL,
            viewers REAL,
            supply REAL,
            demand REAL,
            PRIMARY KEY (county_id, date)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_metrics_date ON county_metrics(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_counties_name ON counties(name)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CSV LOADING
// ============================================================================

pub fn load_counties_csv(csv_path: &Path) -> MarketResult<Vec<CountyIdentity>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut counties = Vec::new();
    for result in rdr.deserialize() {
        let row: CountyCsvRow = result?;
        counties.push(CountyIdentity::new(row.id, row.name));
    }

    Ok(counties)
}

/// Load raw fact rows, shaping each one up front so a bad row aborts the load.
pub fn load_metrics_csv(csv_path: &Path) -> MarketResult<Vec<RawRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut rows = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let line = index + 2;
        let row: RawRow = result?;

        if row.county_id.is_none() {
            return Err(MarketError::schema(format!(
                "{} line {}: row has no county_id",
                csv_path.display(),
                line
            )));
        }
        shaper::shape(&row).map_err(|e| {
            MarketError::schema(format!("{} line {}: {}", csv_path.display(), line, e))
        })?;

        rows.push(row);
    }

    Ok(rows)
}

// ============================================================================
// INSERTS (load time only)
// ============================================================================

pub fn insert_counties(conn: &Connection, counties: &[CountyIdentity]) -> MarketResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let inserted = write_counties(&tx, counties)?;
    tx.commit()?;

    Ok(inserted)
}

/// Insert fact rows; an existing `(county_id, date)` is replaced.
pub fn insert_metric_rows(conn: &Connection, rows: &[RawRow]) -> MarketResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let inserted = write_metric_rows(&tx, rows)?;
    tx.commit()?;

    Ok(inserted)
}

// Writers below run inside the caller's transaction.

fn write_counties(conn: &Connection, counties: &[CountyIdentity]) -> MarketResult<usize> {
    let mut stmt = conn.prepare("INSERT OR REPLACE INTO counties (id, name) VALUES (?1, ?2)")?;
    let mut inserted = 0;
    for county in counties {
        inserted += stmt.execute(params![county.id, county.name])?;
    }
    Ok(inserted)
}

fn write_metric_rows(conn: &Connection, rows: &[RawRow]) -> MarketResult<usize> {
    let mut stmt = conn.prepare(&format!(
        "INSERT OR REPLACE INTO county_metrics ({})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        FACT_COLUMNS
    ))?;
    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![
            row.county_id,
            row.date,
            row.average,
            row.median,
            row.total,
            row.active,
            row.new,
            row.median_listing_price_per_square_foot,
            row.median_square_feet,
            row.hotness,
            row.viewers,
            row.supply,
            row.demand,
        ])?;
    }
    Ok(inserted)
}

/// Load both CSV files and write them into the database in one transaction.
///
/// Any failure rolls back both tables.
pub fn import_csv(
    conn: &Connection,
    counties_path: &Path,
    metrics_path: &Path,
) -> MarketResult<ImportSummary> {
    let counties = load_counties_csv(counties_path)?;
    let rows = load_metrics_csv(metrics_path)?;

    let tx = conn.unchecked_transaction()?;
    let summary = ImportSummary {
        counties: write_counties(&tx, &counties)?,
        metric_rows: write_metric_rows(&tx, &rows)?,
    };
    tx.commit()?;

    info!(
        counties = summary.counties,
        metric_rows = summary.metric_rows,
        "import complete"
    );

    Ok(summary)
}

/// (county count, metric row count)
pub fn verify_count(conn: &Connection) -> MarketResult<(i64, i64)> {
    let counties: i64 = conn.query_row("SELECT COUNT(*) FROM counties", [], |row| row.get(0))?;
    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM county_metrics", [], |row| row.get(0))?;

    Ok((counties, rows))
}

// ============================================================================
// SQLITE FACT STORE
// ============================================================================

/// `FactStore` over a SQLite database. Reads are serialized through one connection.
pub struct SqliteFactStore {
    conn: Mutex<Connection>,
}

impl SqliteFactStore {
    /// Open an existing database file (schema is created if missing).
    pub fn open(path: &Path) -> MarketResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> MarketResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> MarketResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteFactStore {
            conn: Mutex::new(conn),
        })
    }

    /// Borrow the connection, e.g. to import into it.
    pub fn connection(&self) -> MarketResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MarketError::Internal("sqlite connection lock poisoned".to_string()))
    }
}

/// A stored value of the wrong type is a schema problem, not a store failure.
fn fact_read_error(err: rusqlite::Error) -> MarketError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(column, ty, _)
        | rusqlite::Error::InvalidColumnType(column, _, ty) => MarketError::schema(format!(
            "county_metrics column {} holds an unusable {} value",
            column, ty
        )),
        other => MarketError::Store(other),
    }
}

fn raw_row_from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        county_id: row.get(0)?,
        date: row.get(1)?,
        average: row.get(2)?,
        median: row.get(3)?,
        total: row.get(4)?,
        active: row.get(5)?,
        new: row.get(6)?,
        median_listing_price_per_square_foot: row.get(7)?,
        median_square_feet: row.get(8)?,
        hotness: row.get(9)?,
        viewers: row.get(10)?,
        supply: row.get(11)?,
        demand: row.get(12)?,
    })
}

impl FactStore for SqliteFactStore {
    fn raw_rows_for_county(&self, id: i64) -> MarketResult<Vec<RawRow>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM county_metrics WHERE county_id = ?1",
            FACT_COLUMNS
        ))?;

        let rows = stmt
            .query_map([id], raw_row_from_sql)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(fact_read_error)?;

        debug!(county_id = id, rows = rows.len(), "loaded county history");
        Ok(rows)
    }

    fn raw_row_for_county_at_date(&self, id: i64, date: YearMonth) -> MarketResult<Option<RawRow>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM county_metrics WHERE county_id = ?1 AND date = ?2",
                    FACT_COLUMNS
                ),
                params![id, date.as_i64()],
                raw_row_from_sql,
            )
            .optional()
            .map_err(fact_read_error)?;

        Ok(row)
    }

    fn identity_for_county(&self, id: i64) -> MarketResult<CountyIdentity> {
        let conn = self.connection()?;
        let identity = conn
            .query_row("SELECT id, name FROM counties WHERE id = ?1", [id], |row| {
                Ok(CountyIdentity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?;

        identity.ok_or_else(|| MarketError::not_found(format!("county {} does not exist", id)))
    }

    fn all_identities(&self) -> MarketResult<Vec<CountyIdentity>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id, name FROM counties")?;

        let identities = stmt
            .query_map([], |row| {
                Ok(CountyIdentity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(identities)
    }

    fn raw_rows_at_date(&self, date: YearMonth) -> MarketResult<Vec<RawRow>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM county_metrics WHERE date = ?1",
            FACT_COLUMNS
        ))?;

        let rows = stmt
            .query_map([date.as_i64()], raw_row_from_sql)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(fact_read_error)?;

        Ok(rows)
    }

    fn date_bounds(&self) -> MarketResult<Option<(i64, i64)>> {
        let conn = self.connection()?;
        let (lo, hi): (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT MIN(date), MAX(date) FROM county_metrics",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(lo.zip(hi))
    }
}
