use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize, Serializer};

/// One row exactly as it arrives from the loader, before any date parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: String,
    pub state: String,
    pub district: String,
    pub pincode: i64,
    pub age_0_5: Option<f64>,
    pub age_5_17: Option<f64>,
    pub age_18_greater: Option<f64>,
}

/// A preprocessed row. Missing age counts are carried as NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolmentRecord {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: i64,
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_greater: f64,
    pub total_enrolments: f64,
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub day: u32,
    #[serde(serialize_with = "serialize_weekday")]
    pub day_of_week: Weekday,
    pub week_of_year: u32,
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn serialize_weekday<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(weekday_name(*day))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_enrolments: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AgeBreakdown {
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_greater: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataInfo {
    pub total_records: usize,
    pub columns: Vec<String>,
    pub date_range: Option<DateSpan>,
    pub districts: Vec<String>,
    pub pincodes_count: usize,
    pub missing_values: std::collections::BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub period_start: NaiveDate,
    #[serde(flatten)]
    pub ages: AgeBreakdown,
    pub total_enrolments: f64,
    pub unique_pincodes: usize,
    pub district: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PincodeTotals {
    pub pincode: i64,
    pub total_enrolments: f64,
    #[serde(flatten)]
    pub ages: AgeBreakdown,
    pub num_records: usize,
}

// Analysis engine results

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStatistics {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub total_enrolments: f64,
    pub age_group_breakdown: AgeBreakdown,
    pub daily_statistics: DailyStatistics,
    pub unique_pincodes: usize,
    pub date_range: Option<DateSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub total_enrolments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyTotal {
    pub week_start: NaiveDate,
    pub total_enrolments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOfWeekPattern {
    pub days: Vec<String>,
    pub enrolments: Vec<f64>,
}

/// Two-point comparison of the last day against the first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalTrends {
    pub daily_trend: Vec<DailyTotal>,
    pub weekly_trend: Vec<WeeklyTotal>,
    pub monthly_trend: Vec<MonthlyTotal>,
    pub day_of_week_pattern: DayOfWeekPattern,
    pub trend_direction: Option<TrendDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictSummary {
    pub district: String,
    pub total_enrolments: f64,
    pub unique_pincodes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographicDistribution {
    pub pincode_distribution: Vec<PincodeTotals>,
    pub top_10_pincodes: Vec<PincodeTotals>,
    pub district_summary: Vec<DistrictSummary>,
    pub top_10_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBandShare {
    pub band: String,
    pub label: String,
    pub count: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAgeBreakdown {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub ages: AgeBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeDistribution {
    pub overall_breakdown: Vec<AgeBandShare>,
    pub temporal_breakdown: Vec<DailyAgeBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub var1: String,
    pub var2: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationAnalysis {
    pub features: Vec<String>,
    /// Row-major; `None` where a feature has no variance.
    pub correlation_matrix: Vec<Vec<Option<f64>>>,
    pub strong_correlations: Vec<CorrelationPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakMonth {
    pub year: i32,
    pub month: u32,
    pub enrolments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakPeriods {
    pub top_10_days: Vec<DailyTotal>,
    pub peak_month: Option<PeakMonth>,
    pub average_daily_enrolment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullAnalysis {
    pub summary: SummaryStatistics,
    pub temporal: TemporalTrends,
    pub geographic: GeographicDistribution,
    pub age_distribution: AgeDistribution,
    pub correlations: CorrelationAnalysis,
    pub peak_periods: PeakPeriods,
}

// Anomaly engine results

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    High,
    Low,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZScoreDay {
    pub date: NaiveDate,
    pub total_enrolments: f64,
    pub z_score: Option<f64>,
    pub is_anomaly: bool,
    pub anomaly_type: AnomalyType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingDay {
    pub date: NaiveDate,
    pub total_enrolments: f64,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub deviation: Option<f64>,
    pub threshold_value: Option<f64>,
    pub is_rolling_anomaly: bool,
    pub anomaly_severity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PincodeVolume {
    pub pincode: i64,
    pub total_enrolments: f64,
    pub is_high_volume: bool,
    pub percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorSummary<T> {
    pub all_days: Vec<T>,
    pub anomalies_found: usize,
    pub flagged_days: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationVolumeAnalysis {
    pub threshold_percentile: f64,
    pub threshold_value: Option<f64>,
    pub all_pincodes: Vec<PincodeVolume>,
    pub high_volume_pincodes: Vec<PincodeVolume>,
    pub top_10_pincodes: Vec<PincodeVolume>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOfWeekStat {
    pub day_of_week: String,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthStat {
    pub month: u32,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalPatterns {
    pub day_of_week_patterns: Vec<DayOfWeekStat>,
    pub monthly_patterns: Vec<MonthStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub date: NaiveDate,
    pub enrolments: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Methodology {
    pub zscore_threshold: f64,
    pub rolling_window_days: usize,
    pub volume_percentile: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub zscore_analysis: DetectorSummary<ZScoreDay>,
    pub rolling_analysis: DetectorSummary<RollingDay>,
    pub pincode_analysis: LocationVolumeAnalysis,
    pub temporal_analysis: TemporalPatterns,
    pub explanations: Vec<Explanation>,
    pub methodology: Methodology,
}
