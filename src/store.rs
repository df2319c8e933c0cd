// 🗄️ Fact Store Access
// The read-only contract every query needs from a backing store

use crate::error::{MarketError, MarketResult};
use crate::model::{CountyIdentity, YearMonth};
use crate::shaper::RawRow;
use std::collections::BTreeMap;

// ============================================================================
// FACT STORE TRAIT
// ============================================================================

/// Read access to the per-county-per-month fact table and county identities.
///
/// Implementations must tolerate concurrent reads. Rows come back unshaped and
/// in any order; shaping and ordering are the query layer's job.
pub trait FactStore: Send + Sync {
    /// All historical rows for one county, any order. Unknown ids yield an empty list.
    fn raw_rows_for_county(&self, id: i64) -> MarketResult<Vec<RawRow>>;

    /// Zero or one row for `(id, date)`.
    fn raw_row_for_county_at_date(&self, id: i64, date: YearMonth) -> MarketResult<Option<RawRow>>;

    /// Identity for one county, `NotFound` when unknown.
    fn identity_for_county(&self, id: i64) -> MarketResult<CountyIdentity>;

    /// Every known identity, any order.
    fn all_identities(&self) -> MarketResult<Vec<CountyIdentity>>;

    /// Every county's row at one date, any order.
    fn raw_rows_at_date(&self, date: YearMonth) -> MarketResult<Vec<RawRow>>;

    /// Earliest and latest stored `date` values, `None` on an empty table.
    fn date_bounds(&self) -> MarketResult<Option<(i64, i64)>>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Fact store held entirely in memory. Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactStore {
    identities: BTreeMap<i64, CountyIdentity>,
    rows: Vec<RawRow>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a county identity
    pub fn with_county(mut self, id: i64, name: impl Into<String>) -> Self {
        self.identities.insert(id, CountyIdentity::new(id, name));
        self
    }

    /// Builder: add a raw fact row (must carry `county_id` to be found by id lookups)
    pub fn with_row(mut self, row: RawRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = RawRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl FactStore for MemoryFactStore {
    fn raw_rows_for_county(&self, id: i64) -> MarketResult<Vec<RawRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.county_id == Some(id))
            .cloned()
            .collect())
    }

    fn raw_row_for_county_at_date(&self, id: i64, date: YearMonth) -> MarketResult<Option<RawRow>> {
        Ok(self
            .rows
            .iter()
            .find(|r| r.county_id == Some(id) && r.date == Some(date.as_i64()))
            .cloned())
    }

    fn identity_for_county(&self, id: i64) -> MarketResult<CountyIdentity> {
        self.identities
            .get(&id)
            .cloned()
            .ok_or_else(|| MarketError::not_found(format!("county {} does not exist", id)))
    }

    fn all_identities(&self) -> MarketResult<Vec<CountyIdentity>> {
        Ok(self.identities.values().cloned().collect())
    }

    fn raw_rows_at_date(&self, date: YearMonth) -> MarketResult<Vec<RawRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.date == Some(date.as_i64()))
            .cloned()
            .collect())
    }

    fn date_bounds(&self) -> MarketResult<Option<(i64, i64)>> {
        let dates = self.rows.iter().filter_map(|r| r.date);
        let bounds = dates.fold(None, |acc: Option<(i64, i64)>, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        });
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, date: i64, average: f64) -> RawRow {
        RawRow {
            county_id: Some(id),
            date: Some(date),
            average: Some(average),
            ..Default::default()
        }
    }

    #[test]
    fn test_memory_store_lookups() {
        let store = MemoryFactStore::new()
            .with_county(1001, "autauga, al")
            .with_county(1003, "baldwin, al")
            .with_row(row(1001, 202301, 100.0))
            .with_row(row(1001, 202212, 200.0))
            .with_row(row(1003, 202301, 300.0));

        assert_eq!(store.row_count(), 3);
        assert_eq!(store.raw_rows_for_county(1001).unwrap().len(), 2);
        assert!(store.raw_rows_for_county(9999).unwrap().is_empty());

        let jan = YearMonth::parse(202301).unwrap();
        let hit = store.raw_row_for_county_at_date(1003, jan).unwrap().unwrap();
        assert_eq!(hit.average, Some(300.0));
        assert!(store
            .raw_row_for_county_at_date(1003, YearMonth::parse(202212).unwrap())
            .unwrap()
            .is_none());

        assert_eq!(store.raw_rows_at_date(jan).unwrap().len(), 2);
        assert_eq!(store.date_bounds().unwrap(), Some((202212, 202301)));
    }

    #[test]
    fn test_memory_store_identity_not_found() {
        let store = MemoryFactStore::new().with_county(1001, "autauga, al");

        assert_eq!(store.identity_for_county(1001).unwrap().name, "autauga, al");
        assert!(matches!(
            store.identity_for_county(42),
            Err(MarketError::NotFound(_))
        ));
        assert_eq!(store.all_identities().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_store_has_no_bounds() {
        assert_eq!(MemoryFactStore::new().date_bounds().unwrap(), None);
    }
}
