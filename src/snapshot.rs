// 🗓️ Latest snapshot and available dates

use crate::error::{MarketError, MarketResult};
use crate::model::{Page, SnapshotRow, YearMonth};
use crate::shaper;
use crate::store::FactStore;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Earliest and latest month in the fact table.
pub fn date_range<S: FactStore + ?Sized>(store: &S) -> MarketResult<(YearMonth, YearMonth)> {
    match store.date_bounds()? {
        Some((lo, hi)) => Ok((YearMonth::from_stored(lo)?, YearMonth::from_stored(hi)?)),
        None => Err(MarketError::not_found("fact table is empty")),
    }
}

/// Every county's record at the latest stored month, ordered by name, one page at a time.
pub fn latest_snapshot<S: FactStore + ?Sized>(
    store: &S,
    page: Page,
    max_page_size: u32,
) -> MarketResult<Vec<SnapshotRow>> {
    page.validate(max_page_size)?;

    let latest = match store.date_bounds()? {
        Some((_, hi)) => YearMonth::from_stored(hi)?,
        None => return Ok(Vec::new()),
    };

    let names: HashMap<i64, String> = store
        .all_identities()?
        .into_iter()
        .map(|identity| (identity.id, identity.name))
        .collect();

    let mut rows = Vec::new();
    for raw in store.raw_rows_at_date(latest)? {
        let record = shaper::shape(&raw)?;
        let id = raw.county_id.ok_or_else(|| {
            MarketError::schema(format!("row at {} has no county_id", latest))
        })?;

        match names.get(&id) {
            Some(name) => rows.push(SnapshotRow {
                id,
                name: name.clone(),
                record,
            }),
            None => warn!(county_id = id, "snapshot row without identity"),
        }
    }

    rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    debug!(%latest, total = rows.len(), page = page.page, page_size = page.page_size, "latest snapshot");
    Ok(page.apply(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaper::RawRow;
    use crate::store::MemoryFactStore;

    fn row(id: i64, date: i64, median: f64) -> RawRow {
        RawRow {
            county_id: Some(id),
            date: Some(date),
            median: Some(median),
            ..Default::default()
        }
    }

    fn store() -> MemoryFactStore {
        MemoryFactStore::new()
            .with_county(1, "cochise, az")
            .with_county(2, "apache, az")
            .with_county(3, "baldwin, al")
            .with_county(4, "dallas, tx")
            .with_row(row(1, 202302, 300.0))
            .with_row(row(2, 202302, 100.0))
            .with_row(row(3, 202302, 200.0))
            .with_row(row(3, 202301, 150.0))
            .with_row(row(4, 202301, 400.0))
    }

    #[test]
    fn test_latest_snapshot_orders_by_name() {
        let rows = latest_snapshot(&store(), Page::new(1, 10), 100).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();

        // dallas has no row at the latest month
        assert_eq!(names, vec!["apache, az", "baldwin, al", "cochise, az"]);
        assert!(rows.iter().all(|r| r.record.date.as_i64() == 202302));
        assert_eq!(rows[1].record.values.median_listing_price, Some(200.0));
    }

    #[test]
    fn test_latest_snapshot_paginates() {
        let second = latest_snapshot(&store(), Page::new(2, 2), 100).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "cochise, az");

        assert!(latest_snapshot(&store(), Page::new(3, 2), 100).unwrap().is_empty());
    }

    #[test]
    fn test_latest_snapshot_validates_page() {
        assert!(matches!(
            latest_snapshot(&store(), Page::new(0, 10), 100),
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            latest_snapshot(&store(), Page::new(1, 500), 100),
            Err(MarketError::Validation(_))
        ));
    }

    #[test]
    fn test_latest_snapshot_empty_store() {
        let rows = latest_snapshot(&MemoryFactStore::new(), Page::new(1, 10), 100).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_date_range() {
        let (lo, hi) = date_range(&store()).unwrap();
        assert_eq!(lo.as_i64(), 202301);
        assert_eq!(hi.as_i64(), 202302);

        assert!(matches!(
            date_range(&MemoryFactStore::new()),
            Err(MarketError::NotFound(_))
        ));
    }
}
