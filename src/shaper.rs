// 📐 Metric Shaper
// Renames raw fact-table columns into the canonical metric vocabulary

use crate::error::{MarketError, MarketResult};
use crate::model::{MetricField, MetricRecord, MetricValues, YearMonth};
use serde::{Deserialize, Serialize};

// ============================================================================
// RAW ROW
// ============================================================================

/// A fact-table row exactly as storage hands it over.
///
/// Every column is optional at this layer: the shaper decides which gaps are
/// structural (missing `date`) and which are just "no observation".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub county_id: Option<i64>,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub active: Option<f64>,
    #[serde(default)]
    pub new: Option<f64>,
    #[serde(default)]
    pub median_listing_price_per_square_foot: Option<f64>,
    #[serde(default)]
    pub median_square_feet: Option<f64>,
    #[serde(default)]
    pub hotness: Option<f64>,
    #[serde(default, alias = "viewer")]
    pub viewers: Option<f64>,
    #[serde(default)]
    pub supply: Option<f64>,
    #[serde(default)]
    pub demand: Option<f64>,
}

impl RawRow {
    /// Raw column backing each canonical metric.
    pub fn column(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::AverageListingPrice => self.average,
            MetricField::MedianListingPrice => self.median,
            MetricField::TotalListingCount => self.total,
            MetricField::ActiveListingCount => self.active,
            MetricField::NewListingCount => self.new,
            MetricField::MedianPricePerSquareFoot => self.median_listing_price_per_square_foot,
            MetricField::MedianSquareFeet => self.median_square_feet,
            MetricField::Hotness => self.hotness,
            MetricField::Viewers => self.viewers,
            MetricField::Supply => self.supply,
            MetricField::Demand => self.demand,
        }
    }
}

/// Raw column name for a canonical metric, as used by the SQLite schema and CSV headers.
pub fn raw_column_name(field: MetricField) -> &'static str {
    match field {
        MetricField::AverageListingPrice => "average",
        MetricField::MedianListingPrice => "median",
        MetricField::TotalListingCount => "total",
        MetricField::ActiveListingCount => "active",
        MetricField::NewListingCount => "new",
        MetricField::MedianPricePerSquareFoot => "median_listing_price_per_square_foot",
        MetricField::MedianSquareFeet => "median_square_feet",
        MetricField::Hotness => "hotness",
        MetricField::Viewers => "viewers",
        MetricField::Supply => "supply",
        MetricField::Demand => "demand",
    }
}

// ============================================================================
// SHAPING
// ============================================================================

/// Shape one raw row into a `MetricRecord`.
///
/// Fails with `SchemaError` when `date` is missing or malformed, or when a
/// numeric column holds a non-finite value. Missing numeric columns stay `None`.
pub fn shape(raw: &RawRow) -> MarketResult<MetricRecord> {
    let date = match raw.date {
        Some(d) => YearMonth::from_stored(d)?,
        None => {
            return Err(MarketError::schema(format!(
                "row for county {} has no date",
                describe_county(raw.county_id)
            )))
        }
    };

    let mut values = MetricValues::default();
    for field in MetricField::ALL {
        let value = raw.column(field);
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(MarketError::schema(format!(
                    "county {} at {}: column '{}' holds non-finite value {}",
                    describe_county(raw.county_id),
                    date,
                    raw_column_name(field),
                    v
                )));
            }
        }
        values.set(field, value);
    }

    Ok(MetricRecord { date, values })
}

/// Shape a batch, failing on the first unshapeable row rather than dropping it.
pub fn shape_all(rows: &[RawRow]) -> MarketResult<Vec<MetricRecord>> {
    rows.iter().map(shape).collect()
}

fn describe_county(id: Option<i64>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "<unknown>".to_string())
}
