// 🧭 Market Engine
// One entry point per query, all composed over a single fact store

use crate::aggregate;
use crate::comparison;
use crate::directory::{self, DirectoryFilter};
use crate::error::MarketResult;
use crate::model::{
    validate_county_id, AllTimeSummary, ComparisonRow, CountyIdentity, MetricRecord, Page,
    ScoreRecord, SnapshotRow, YearMonth,
};
use crate::snapshot;
use crate::store::FactStore;
use crate::timeseries;

/// Query façade over a `FactStore`.
///
/// Holds no per-query state, so one engine can serve any number of concurrent callers.
pub struct MarketEngine<S: FactStore> {
    store: S,
    max_page_size: u32,
}

impl<S: FactStore> MarketEngine<S> {
    pub fn new(store: S) -> Self {
        MarketEngine {
            store,
            max_page_size: 100,
        }
    }

    /// Builder: cap on `Page::page_size`
    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    pub fn time_series(&self, county_id: i64) -> MarketResult<Vec<MetricRecord>> {
        timeseries::time_series(&self.store, county_id)
    }

    pub fn score_series(&self, county_id: i64) -> MarketResult<Vec<ScoreRecord>> {
        timeseries::score_series(&self.store, county_id)
    }

    pub fn at_date(&self, county_ids: &[i64], date: YearMonth) -> MarketResult<Vec<ComparisonRow>> {
        comparison::at_date(&self.store, county_ids, date)
    }

    pub fn summarize(&self, county_id: i64) -> MarketResult<AllTimeSummary> {
        aggregate::summarize(&self.store, county_id)
    }

    pub fn by_prefix(&self, filter: DirectoryFilter) -> MarketResult<Vec<CountyIdentity>> {
        directory::by_prefix(&self.store, filter)
    }

    pub fn search(&self, fragment: &str) -> MarketResult<Vec<CountyIdentity>> {
        directory::search(&self.store, fragment)
    }

    pub fn county_name(&self, county_id: i64) -> MarketResult<String> {
        validate_county_id(county_id)?;
        Ok(self.store.identity_for_county(county_id)?.name)
    }

    pub fn latest_snapshot(&self, page: Page) -> MarketResult<Vec<SnapshotRow>> {
        snapshot::latest_snapshot(&self.store, page, self.max_page_size)
    }

    pub fn date_range(&self) -> MarketResult<(YearMonth, YearMonth)> {
        snapshot::date_range(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::model::AggregateKind;
    use crate::shaper::RawRow;
    use crate::store::MemoryFactStore;
    use std::sync::Arc;
    use std::thread;

    fn row(id: i64, date: i64, average: f64) -> RawRow {
        RawRow {
            county_id: Some(id),
            date: Some(date),
            average: Some(average),
            ..Default::default()
        }
    }

    fn engine() -> MarketEngine<MemoryFactStore> {
        MarketEngine::new(
            MemoryFactStore::new()
                .with_county(1001, "autauga, al")
                .with_county(4001, "apache, az")
                .with_county(48505, "zapata, tx")
                .with_row(row(1001, 202301, 100.0))
                .with_row(row(1001, 202212, 200.0))
                .with_row(row(4001, 202301, 50.0)),
        )
        .with_max_page_size(25)
    }

    #[test]
    fn test_engine_end_to_end() {
        let engine = engine();

        let series = engine.time_series(1001).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date.as_i64(), 202212);

        let summary = engine.summarize(1001).unwrap();
        assert_eq!(summary.average.values.average_listing_price, Some(150.0));
        assert_eq!(summary.rows()[1].kind, AggregateKind::Maximum);

        let jan = YearMonth::parse(202301).unwrap();
        let compared = engine.at_date(&[48505, 1001], jan).unwrap();
        assert_eq!(compared.len(), 2);
        assert!(!compared[0].observation.is_present());
        assert!(compared[1].observation.is_present());

        let a = engine.by_prefix(DirectoryFilter::Letter('a')).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].name, "apache, az");

        assert_eq!(engine.county_name(48505).unwrap(), "zapata, tx");
        assert!(matches!(engine.county_name(1), Err(MarketError::NotFound(_))));

        let latest = engine.latest_snapshot(Page::new(1, 25)).unwrap();
        assert_eq!(latest.len(), 2);
        assert!(engine.latest_snapshot(Page::new(1, 26)).is_err());

        let (lo, hi) = engine.date_range().unwrap();
        assert_eq!((lo.as_i64(), hi.as_i64()), (202212, 202301));
    }

    #[test]
    fn test_engine_serves_concurrent_readers() {
        let engine = Arc::new(engine());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        engine.summarize(1001).map(|s| s.maximum.values.average_listing_price)
                    } else {
                        engine.time_series(1001).map(|s| s.last().and_then(|r| r.values.average_listing_price))
                    }
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.join().unwrap().unwrap();
            if i % 2 == 0 {
                assert_eq!(value, Some(200.0));
            } else {
                assert_eq!(value, Some(100.0));
            }
        }
    }
}
