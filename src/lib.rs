// County Market - Core Library
// Metrics aggregation and query shaping over a per-county, per-month fact table

pub mod error;
pub mod config;
pub mod model;
pub mod shaper;     // Raw rows → canonical metric records
pub mod store;      // Fact Store Access trait + in-memory store
pub mod db;         // SQLite store, schema, CSV import
pub mod timeseries; // One county across time
pub mod comparison; // Many counties at one month
pub mod aggregate;  // All-time average / maximum / minimum
pub mod directory;  // Browse by letter, search by name
pub mod snapshot;   // Latest month across all counties
pub mod engine;

// Re-export commonly used types
pub use error::{ErrorKind, MarketError, MarketResult};
pub use config::AppConfig;
pub use model::{
    AggregateKind, AggregateRow, AllTimeSummary, ComparisonRow, CountyIdentity, MetricField,
    MetricRecord, MetricValues, Observation, Page, ScoreRecord, SnapshotRow, YearMonth,
};
pub use shaper::{shape, RawRow};
pub use store::{FactStore, MemoryFactStore};
pub use db::{
    import_csv, insert_counties, insert_metric_rows, setup_database, verify_count,
    ImportSummary, SqliteFactStore,
};
pub use directory::DirectoryFilter;
pub use engine::MarketEngine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
