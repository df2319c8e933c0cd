// 📈 Time-Series Query
// One county's full history, shaped and in chronological order

use crate::error::{MarketError, MarketResult};
use crate::model::{validate_county_id, MetricRecord, ScoreRecord};
use crate::shaper;
use crate::store::FactStore;
use tracing::debug;

/// Full history for `county_id`, ascending by date.
///
/// The store may return rows in any order, so the result is always sorted.
/// Two rows for the same month break the fact-table key and are reported as
/// a schema error instead of being silently merged.
pub fn time_series<S: FactStore + ?Sized>(store: &S, county_id: i64) -> MarketResult<Vec<MetricRecord>> {
    validate_county_id(county_id)?;

    let raw = store.raw_rows_for_county(county_id)?;
    if raw.is_empty() {
        return Err(MarketError::not_found(format!(
            "county {} has no history",
            county_id
        )));
    }

    let mut records = shaper::shape_all(&raw)?;
    records.sort_by_key(|r| r.date);

    if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(MarketError::schema(format!(
            "county {} has more than one row for {}",
            county_id, pair[0].date
        )));
    }

    debug!(county_id, records = records.len(), "time series");
    Ok(records)
}

/// Hotness, supply, demand and viewer scores over time.
pub fn score_series<S: FactStore + ?Sized>(store: &S, county_id: i64) -> MarketResult<Vec<ScoreRecord>> {
    let records = time_series(store, county_id)?;
    Ok(records.iter().map(ScoreRecord::from).collect())
}
