// 🏘️ Value objects shared by every query
// County identity, monthly metric records, and the derived comparison/aggregate rows

use crate::error::{MarketError, MarketResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// YEAR-MONTH DATE
// ============================================================================

/// Calendar month encoded as `YYYYMM` (e.g. 202302).
///
/// Integer order equals chronological order, which is why it is the natural
/// sort key of a county's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YearMonth(u32);

impl YearMonth {
    /// Build from caller input. Malformed values are a validation failure.
    pub fn parse(raw: i64) -> MarketResult<Self> {
        Self::checked(raw).ok_or_else(|| {
            MarketError::validation(format!("'{}' is not a YYYYMM date", raw))
        })
    }

    /// Build from a value read out of the fact table. Malformed values are a schema failure.
    pub fn from_stored(raw: i64) -> MarketResult<Self> {
        Self::checked(raw).ok_or_else(|| {
            MarketError::schema(format!("stored date '{}' is not a YYYYMM date", raw))
        })
    }

    fn checked(raw: i64) -> Option<Self> {
        if !(100..=999_912).contains(&raw) {
            return None;
        }
        let year = (raw / 100) as i32;
        let month = (raw % 100) as u32;
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(YearMonth(raw as u32))
    }

    pub fn year(&self) -> u32 {
        self.0 / 100
    }

    pub fn month(&self) -> u32 {
        self.0 % 100
    }

    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// First day of the month, for callers that want a real calendar date.
    pub fn first_day(&self) -> NaiveDate {
        // checked() already proved this date exists
        NaiveDate::from_ymd_opt(self.year() as i32, self.month(), 1).unwrap_or_default()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for YearMonth {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 6 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MarketError::validation(format!("'{}' is not a YYYYMM date", s)));
        }
        let raw: i64 = trimmed
            .parse()
            .map_err(|_| MarketError::validation(format!("'{}' is not a YYYYMM date", s)))?;
        YearMonth::parse(raw)
    }
}

// ============================================================================
// COUNTY IDENTITY
// ============================================================================

/// County ids are positive FIPS-style integers.
pub fn validate_county_id(id: i64) -> MarketResult<()> {
    if id <= 0 {
        return Err(MarketError::validation(format!(
            "county id must be a positive integer, got {}",
            id
        )));
    }
    Ok(())
}

/// Stable county reference data. Created at load time, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountyIdentity {
    pub id: i64,
    /// Raw, unformatted name as stored (e.g. "autauga, al")
    pub name: String,
}

impl CountyIdentity {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        CountyIdentity { id, name: name.into() }
    }

    /// Human-friendly name: county words title-cased, state code upper-cased.
    ///
    /// "autauga, al" → "Autauga, AL"
    pub fn display_name(&self) -> String {
        let mut parts = self.name.split(',').map(str::trim);
        let county = parts.next().unwrap_or_default();

        let county = county
            .split_whitespace()
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" ");

        let rest: Vec<String> = parts
            .filter(|p| !p.is_empty())
            .map(|p| p.to_uppercase())
            .collect();

        if rest.is_empty() {
            county
        } else {
            format!("{}, {}", county, rest.join(", "))
        }
    }

    /// Directory ordering: name by codepoint, id as tiebreak.
    pub fn directory_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ============================================================================
// METRIC VOCABULARY
// ============================================================================

/// The eleven numeric metrics tracked per county per month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    AverageListingPrice,
    MedianListingPrice,
    TotalListingCount,
    ActiveListingCount,
    NewListingCount,
    MedianPricePerSquareFoot,
    MedianSquareFeet,
    Hotness,
    Viewers,
    Supply,
    Demand,
}

impl MetricField {
    pub const ALL: [MetricField; 11] = [
        MetricField::AverageListingPrice,
        MetricField::MedianListingPrice,
        MetricField::TotalListingCount,
        MetricField::ActiveListingCount,
        MetricField::NewListingCount,
        MetricField::MedianPricePerSquareFoot,
        MetricField::MedianSquareFeet,
        MetricField::Hotness,
        MetricField::Viewers,
        MetricField::Supply,
        MetricField::Demand,
    ];

    /// Serialized attribute name on records and aggregates.
    pub fn name(&self) -> &'static str {
        match self {
            MetricField::AverageListingPrice => "Average_Listing_Price",
            MetricField::MedianListingPrice => "Median_Listing_Price",
            MetricField::TotalListingCount => "Total_Listing_Count",
            MetricField::ActiveListingCount => "Active_Listing_Count",
            MetricField::NewListingCount => "New_Listing_Count",
            MetricField::MedianPricePerSquareFoot => "Median_Price_Per_Square_Foot",
            MetricField::MedianSquareFeet => "Median_Square_Feet",
            MetricField::Hotness => "Hotness",
            MetricField::Viewers => "Viewers",
            MetricField::Supply => "Supply",
            MetricField::Demand => "Demand",
        }
    }

    /// Short chart label (series key).
    pub fn short_name(&self) -> &'static str {
        match self {
            MetricField::AverageListingPrice => "Average",
            MetricField::MedianListingPrice => "Median",
            MetricField::TotalListingCount => "Total",
            MetricField::ActiveListingCount => "Active",
            MetricField::NewListingCount => "New",
            MetricField::MedianPricePerSquareFoot => "Square_Price",
            MetricField::MedianSquareFeet => "Square_Feet",
            MetricField::Hotness => "Hotness",
            MetricField::Viewers => "Viewers",
            MetricField::Supply => "Supply",
            MetricField::Demand => "Demand",
        }
    }

    /// Accepts either the attribute name or the short label, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        MetricField::ALL.into_iter().find(|f| {
            f.name().eq_ignore_ascii_case(name) || f.short_name().eq_ignore_ascii_case(name)
        })
    }
}

// ============================================================================
// METRIC VALUES
// ============================================================================

/// One value slot per metric. `None` means "no observation", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    #[serde(rename = "Average_Listing_Price")]
    pub average_listing_price: Option<f64>,

    #[serde(rename = "Median_Listing_Price")]
    pub median_listing_price: Option<f64>,

    #[serde(rename = "Total_Listing_Count")]
    pub total_listing_count: Option<f64>,

    #[serde(rename = "Active_Listing_Count")]
    pub active_listing_count: Option<f64>,

    #[serde(rename = "New_Listing_Count")]
    pub new_listing_count: Option<f64>,

    #[serde(rename = "Median_Price_Per_Square_Foot")]
    pub median_price_per_square_foot: Option<f64>,

    #[serde(rename = "Median_Square_Feet")]
    pub median_square_feet: Option<f64>,

    #[serde(rename = "Hotness")]
    pub hotness: Option<f64>,

    #[serde(rename = "Viewers")]
    pub viewers: Option<f64>,

    #[serde(rename = "Supply")]
    pub supply: Option<f64>,

    #[serde(rename = "Demand")]
    pub demand: Option<f64>,
}

impl MetricValues {
    pub fn get(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::AverageListingPrice => self.average_listing_price,
            MetricField::MedianListingPrice => self.median_listing_price,
            MetricField::TotalListingCount => self.total_listing_count,
            MetricField::ActiveListingCount => self.active_listing_count,
            MetricField::NewListingCount => self.new_listing_count,
            MetricField::MedianPricePerSquareFoot => self.median_price_per_square_foot,
            MetricField::MedianSquareFeet => self.median_square_feet,
            MetricField::Hotness => self.hotness,
            MetricField::Viewers => self.viewers,
            MetricField::Supply => self.supply,
            MetricField::Demand => self.demand,
        }
    }

    pub fn set(&mut self, field: MetricField, value: Option<f64>) {
        let slot = match field {
            MetricField::AverageListingPrice => &mut self.average_listing_price,
            MetricField::MedianListingPrice => &mut self.median_listing_price,
            MetricField::TotalListingCount => &mut self.total_listing_count,
            MetricField::ActiveListingCount => &mut self.active_listing_count,
            MetricField::NewListingCount => &mut self.new_listing_count,
            MetricField::MedianPricePerSquareFoot => &mut self.median_price_per_square_foot,
            MetricField::MedianSquareFeet => &mut self.median_square_feet,
            MetricField::Hotness => &mut self.hotness,
            MetricField::Viewers => &mut self.viewers,
            MetricField::Supply => &mut self.supply,
            MetricField::Demand => &mut self.demand,
        };
        *slot = value;
    }

    /// True when every slot is absent.
    pub fn is_empty(&self) -> bool {
        MetricField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

// ============================================================================
// SHAPED RECORDS
// ============================================================================

/// One county's observation for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub date: YearMonth,
    #[serde(flatten)]
    pub values: MetricValues,
}

/// Hotness-family projection of a `MetricRecord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub date: YearMonth,
    #[serde(rename = "Hotness")]
    pub hotness: Option<f64>,
    #[serde(rename = "Supply")]
    pub supply: Option<f64>,
    #[serde(rename = "Demand")]
    pub demand: Option<f64>,
    #[serde(rename = "Viewers")]
    pub viewers: Option<f64>,
}

impl From<&MetricRecord> for ScoreRecord {
    fn from(record: &MetricRecord) -> Self {
        ScoreRecord {
            date: record.date,
            hotness: record.values.hotness,
            supply: record.values.supply,
            demand: record.values.demand,
            viewers: record.values.viewers,
        }
    }
}

// ============================================================================
// COMPARISON ROW
// ============================================================================

/// Result of joining one identity with the fact table at one date.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Present(MetricRecord),
    Absent(YearMonth),
}

impl Observation {
    pub fn date(&self) -> YearMonth {
        match self {
            Observation::Present(record) => record.date,
            Observation::Absent(date) => *date,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Observation::Present(_))
    }
}

/// Identity fields joined with a single dated observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub identity: CountyIdentity,
    pub observation: Observation,
}

impl ComparisonRow {
    /// Metric values at the requested date; all absent when there was no row.
    pub fn values(&self) -> MetricValues {
        match &self.observation {
            Observation::Present(record) => record.values,
            Observation::Absent(_) => MetricValues::default(),
        }
    }
}

impl Serialize for ComparisonRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Flat<'a> {
            id: i64,
            #[serde(rename = "Name")]
            name: &'a str,
            date: YearMonth,
            has_data: bool,
            #[serde(flatten)]
            values: MetricValues,
        }

        Flat {
            id: self.identity.id,
            name: &self.identity.name,
            date: self.observation.date(),
            has_data: self.observation.is_present(),
            values: self.values(),
        }
        .serialize(serializer)
    }
}

/// Identity joined with its record at the store's latest date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub record: MetricRecord,
}

// ============================================================================
// ALL-TIME AGGREGATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateKind {
    Average,
    Maximum,
    Minimum,
}

/// One member of the all-time summary triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(rename = "Type")]
    pub kind: AggregateKind,
    #[serde(flatten)]
    pub values: MetricValues,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllTimeSummary {
    pub average: AggregateRow,
    pub maximum: AggregateRow,
    pub minimum: AggregateRow,
}

impl AllTimeSummary {
    /// Average, Maximum, Minimum in chart order.
    pub fn rows(&self) -> [&AggregateRow; 3] {
        [&self.average, &self.maximum, &self.minimum]
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: u32, page_size: u32) -> Self {
        Page { page, page_size }
    }

    pub fn validate(&self, max_page_size: u32) -> MarketResult<()> {
        if self.page == 0 {
            return Err(MarketError::validation("page numbers start at 1"));
        }
        if self.page_size == 0 || self.page_size > max_page_size {
            return Err(MarketError::validation(format!(
                "page_size must be between 1 and {}, got {}",
                max_page_size, self.page_size
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }

    /// Slice `items` down to this page. Past-the-end pages are empty.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.page_size as usize)
            .collect()
    }
}
