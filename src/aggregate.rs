// 📊 All-Time Aggregator
// Per-field average, maximum and minimum over a county's whole history

use crate::error::MarketResult;
use crate::model::{AggregateKind, AggregateRow, AllTimeSummary, MetricField, MetricRecord, MetricValues};
use crate::store::FactStore;
use crate::timeseries;
use tracing::debug;

// ============================================================================
// FIELD ACCUMULATOR
// ============================================================================

/// Running statistics for one metric, fed only with observed values.
///
/// The sum is Neumaier-compensated so the mean does not drift with row order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldAccumulator {
    sum: f64,
    compensation: f64,
    count: u64,
    min: Option<f64>,
    max: Option<f64>,
}

impl FieldAccumulator {
    pub fn push(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
        self.count += 1;

        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some((self.sum + self.compensation) / self.count as f64)
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

/// One accumulator per metric field.
#[derive(Debug, Clone, Default)]
pub struct SummaryAccumulator {
    fields: [FieldAccumulator; 11],
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record; absent fields are skipped individually.
    pub fn push(&mut self, values: &MetricValues) {
        for (slot, field) in self.fields.iter_mut().zip(MetricField::ALL) {
            if let Some(v) = values.get(field) {
                slot.push(v);
            }
        }
    }

    pub fn field(&self, field: MetricField) -> &FieldAccumulator {
        let index = MetricField::ALL
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        &self.fields[index]
    }

    pub fn finish(&self) -> AllTimeSummary {
        let mut average = MetricValues::default();
        let mut maximum = MetricValues::default();
        let mut minimum = MetricValues::default();

        for (acc, field) in self.fields.iter().zip(MetricField::ALL) {
            average.set(field, acc.mean());
            maximum.set(field, acc.max());
            minimum.set(field, acc.min());
        }

        AllTimeSummary {
            average: AggregateRow {
                kind: AggregateKind::Average,
                values: average,
            },
            maximum: AggregateRow {
                kind: AggregateKind::Maximum,
                values: maximum,
            },
            minimum: AggregateRow {
                kind: AggregateKind::Minimum,
                values: minimum,
            },
        }
    }
}

/// Aggregate already-shaped records.
pub fn summarize_records(records: &[MetricRecord]) -> AllTimeSummary {
    let mut acc = SummaryAccumulator::new();
    for record in records {
        acc.push(&record.values);
    }
    acc.finish()
}

/// All-time average/maximum/minimum for one county.
///
/// Errors follow `time_series`: `NotFound` when the county has no rows.
pub fn summarize<S: FactStore + ?Sized>(store: &S, county_id: i64) -> MarketResult<AllTimeSummary> {
    let records = timeseries::time_series(store, county_id)?;
    let summary = summarize_records(&records);

    debug!(county_id, records = records.len(), "all-time summary");
    Ok(summary)
}
