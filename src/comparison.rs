// ⚖️ Cross-Sectional Query
// Several counties side by side at one month

use crate::error::{ErrorKind, MarketResult};
use crate::model::{validate_county_id, ComparisonRow, CountyIdentity, Observation, YearMonth};
use crate::shaper::{self, RawRow};
use crate::store::FactStore;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Drop repeated ids, keeping the first occurrence's position.
pub fn dedupe_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// One row per requested county at `date`, in request order.
///
/// A county with no row that month still gets a row, with every metric absent.
/// Ids with no identity at all are left out.
pub fn at_date<S: FactStore + ?Sized>(
    store: &S,
    county_ids: &[i64],
    date: YearMonth,
) -> MarketResult<Vec<ComparisonRow>> {
    for id in county_ids {
        validate_county_id(*id)?;
    }
    let ids = dedupe_ids(county_ids);

    let mut identities = Vec::with_capacity(ids.len());
    let mut rows = HashMap::with_capacity(ids.len());
    for id in &ids {
        match store.identity_for_county(*id) {
            Ok(identity) => identities.push(identity),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(county_id = id, "comparison skipped unknown county");
                continue;
            }
            Err(e) => return Err(e),
        }
        if let Some(raw) = store.raw_row_for_county_at_date(*id, date)? {
            rows.insert(*id, raw);
        }
    }

    let joined = join_at_date(identities, &rows, date)?;

    debug!(
        requested = county_ids.len(),
        returned = joined.len(),
        present = joined.iter().filter(|r| r.observation.is_present()).count(),
        %date,
        "cross-sectional query"
    );
    Ok(joined)
}

/// Join identities with their row at `date` by county id.
///
/// Output order follows `identities`. Rows are shaped here, so an unshapeable
/// row fails the whole join rather than turning into an absent observation.
pub fn join_at_date(
    identities: Vec<CountyIdentity>,
    rows: &HashMap<i64, RawRow>,
    date: YearMonth,
) -> MarketResult<Vec<ComparisonRow>> {
    identities
        .into_iter()
        .map(|identity| {
            let observation = match rows.get(&identity.id) {
                Some(raw) => Observation::Present(shaper::shape(raw)?),
                None => {
                    warn!(county_id = identity.id, %date, "no observation at date");
                    Observation::Absent(date)
                }
            };
            Ok(ComparisonRow {
                identity,
                observation,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::store::MemoryFactStore;

    fn row(id: i64, date: i64, average: f64) -> RawRow {
        RawRow {
            county_id: Some(id),
            date: Some(date),
            average: Some(average),
            ..Default::default()
        }
    }

    fn store() -> MemoryFactStore {
        MemoryFactStore::new()
            .with_county(1, "apache, az")
            .with_county(2, "baldwin, al")
            .with_county(3, "cochise, az")
            .with_row(row(1, 202302, 100.0))
            .with_row(row(2, 202301, 200.0))
            .with_row(row(3, 202302, 300.0))
    }

    fn feb() -> YearMonth {
        YearMonth::parse(202302).unwrap()
    }

    #[test]
    fn test_at_date_keeps_counties_without_data() {
        let rows = at_date(&store(), &[1, 2, 3], feb()).unwrap();

        let ids: Vec<i64> = rows.iter().map(|r| r.identity.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(rows[0].observation.is_present());
        assert_eq!(rows[0].values().average_listing_price, Some(100.0));

        assert_eq!(rows[1].observation, Observation::Absent(feb()));
        assert!(rows[1].values().is_empty());
        assert_eq!(rows[1].identity.name, "baldwin, al");

        assert_eq!(rows[2].values().average_listing_price, Some(300.0));
    }

    #[test]
    fn test_at_date_preserves_request_order_and_dedupes() {
        let rows = at_date(&store(), &[3, 1, 3, 2, 1], feb()).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.identity.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_at_date_empty_and_single() {
        assert!(at_date(&store(), &[], feb()).unwrap().is_empty());

        let one = at_date(&store(), &[2], feb()).unwrap();
        assert_eq!(one.len(), 1);
        assert!(!one[0].observation.is_present());
    }

    #[test]
    fn test_at_date_skips_unknown_identity() {
        let rows = at_date(&store(), &[1, 77, 3], feb()).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.identity.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_at_date_rejects_malformed_id() {
        assert!(matches!(
            at_date(&store(), &[1, -2], feb()),
            Err(MarketError::Validation(_))
        ));
    }

    #[test]
    fn test_join_fails_on_unshapeable_row() {
        let mut rows = HashMap::new();
        rows.insert(
            1,
            RawRow {
                county_id: Some(1),
                date: Some(202302),
                hotness: Some(f64::INFINITY),
                ..Default::default()
            },
        );
        let result = join_at_date(vec![CountyIdentity::new(1, "apache, az")], &rows, feb());
        assert!(matches!(result, Err(MarketError::Schema(_))));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_observation_logs_warning() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        let rows = tracing::subscriber::with_default(subscriber, || {
            at_date(&store(), &[1, 2], feb()).unwrap()
        });
        assert!(!rows[1].observation.is_present());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "got: {}", output);
        assert!(output.contains("no observation at date"), "got: {}", output);
    }

    #[test]
    fn test_dedupe_ids() {
        assert_eq!(dedupe_ids(&[5, 4, 5, 4, 6]), vec![5, 4, 6]);
        assert!(dedupe_ids(&[]).is_empty());
    }
}
