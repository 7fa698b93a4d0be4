//! Descriptive statistics over a preprocessed dataset.
//!
//! Every function accepts any slice of records, including an empty one;
//! statistics that cannot be computed come back as `None`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, Weekday};

use crate::config::AGE_GROUPS;
use crate::models::{
    AgeBandShare, AgeBreakdown, AgeDistribution, CorrelationAnalysis, CorrelationPair,
    DailyAgeBreakdown, DailyStatistics, DailyTotal, DateSpan, DayOfWeekPattern, DistrictSummary,
    EnrolmentRecord, FullAnalysis, GeographicDistribution, MonthlyTotal, PeakMonth, PeakPeriods,
    SummaryStatistics, TemporalTrends, TrendDirection, WeeklyTotal, weekday_name,
};
use crate::preprocess::{aggregate_by_pincode, aggregate_by_time, Frequency};
use crate::stats;

pub const WEEK_ORDER: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub const CORRELATION_FEATURES: [&str; 7] = [
    "age_0_5",
    "age_5_17",
    "age_18_greater",
    "total_enrolments",
    "month",
    "day",
    "week_of_year",
];

const STRONG_CORRELATION: f64 = 0.7;
const TOP_N: usize = 10;

/// One entry per distinct date, in date order.
pub fn daily_totals(records: &[EnrolmentRecord]) -> Vec<DailyTotal> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        *by_date.entry(record.date).or_insert(0.0) += stats::nansum([record.total_enrolments]);
    }
    by_date
        .into_iter()
        .map(|(date, total_enrolments)| DailyTotal {
            date,
            total_enrolments,
        })
        .collect()
}

pub fn monthly_totals(records: &[EnrolmentRecord]) -> Vec<MonthlyTotal> {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for record in records {
        *by_month.entry((record.year, record.month)).or_insert(0.0) +=
            stats::nansum([record.total_enrolments]);
    }
    by_month
        .into_iter()
        .map(|((year, month), total_enrolments)| MonthlyTotal {
            year,
            month,
            total_enrolments,
        })
        .collect()
}

fn age_totals(records: &[EnrolmentRecord]) -> AgeBreakdown {
    AgeBreakdown {
        age_0_5: stats::nansum(records.iter().map(|r| r.age_0_5)),
        age_5_17: stats::nansum(records.iter().map(|r| r.age_5_17)),
        age_18_greater: stats::nansum(records.iter().map(|r| r.age_18_greater)),
    }
}

pub fn date_span(records: &[EnrolmentRecord]) -> Option<DateSpan> {
    let start = records.iter().map(|r| r.date).min()?;
    let end = records.iter().map(|r| r.date).max()?;
    Some(DateSpan {
        start,
        end,
        days: (end - start).num_days(),
    })
}

pub fn calculate_summary_statistics(records: &[EnrolmentRecord]) -> SummaryStatistics {
    let daily: Vec<f64> = daily_totals(records)
        .iter()
        .map(|d| d.total_enrolments)
        .collect();
    let unique_pincodes = records.iter().map(|r| r.pincode).collect::<HashSet<_>>().len();

    SummaryStatistics {
        total_enrolments: stats::nansum(records.iter().map(|r| r.total_enrolments)),
        age_group_breakdown: age_totals(records),
        daily_statistics: DailyStatistics {
            mean: stats::mean(&daily),
            median: stats::median(&daily),
            std: stats::sample_std(&daily),
            min: stats::min(&daily),
            max: stats::max(&daily),
        },
        unique_pincodes,
        date_range: date_span(records),
    }
}

/// The trend direction compares only the first and last day; it is not a
/// regression slope.
pub fn analyze_temporal_trends(records: &[EnrolmentRecord]) -> TemporalTrends {
    let daily_trend = daily_totals(records);

    let weekly_trend = aggregate_by_time(records, Frequency::Weekly)
        .into_iter()
        .map(|bucket| WeeklyTotal {
            week_start: bucket.period_start,
            total_enrolments: bucket.total_enrolments,
        })
        .collect();

    let mut by_weekday = [0.0; 7];
    for record in records {
        let slot = record.day_of_week.num_days_from_monday() as usize;
        by_weekday[slot] += stats::nansum([record.total_enrolments]);
    }

    let trend_direction = match (daily_trend.first(), daily_trend.last()) {
        (Some(first), Some(last)) if last.total_enrolments > first.total_enrolments => {
            Some(TrendDirection::Increasing)
        }
        (Some(_), Some(_)) => Some(TrendDirection::Decreasing),
        _ => None,
    };

    TemporalTrends {
        weekly_trend,
        monthly_trend: monthly_totals(records),
        day_of_week_pattern: DayOfWeekPattern {
            days: WEEK_ORDER.iter().map(|d| weekday_name(*d).to_string()).collect(),
            enrolments: by_weekday.to_vec(),
        },
        trend_direction,
        daily_trend,
    }
}

pub fn analyze_geographic_distribution(records: &[EnrolmentRecord]) -> GeographicDistribution {
    let pincode_distribution = aggregate_by_pincode(records);
    let top_10_pincodes: Vec<_> = pincode_distribution.iter().take(TOP_N).cloned().collect();

    let mut districts: BTreeMap<&str, (f64, HashSet<i64>)> = BTreeMap::new();
    for record in records {
        let entry = districts.entry(record.district.as_str()).or_default();
        entry.0 += stats::nansum([record.total_enrolments]);
        entry.1.insert(record.pincode);
    }
    let district_summary = districts
        .into_iter()
        .map(|(district, (total_enrolments, pincodes))| DistrictSummary {
            district: district.to_string(),
            total_enrolments,
            unique_pincodes: pincodes.len(),
        })
        .collect();

    let grand_total: f64 = pincode_distribution.iter().map(|p| p.total_enrolments).sum();
    let top_total: f64 = top_10_pincodes.iter().map(|p| p.total_enrolments).sum();
    let top_10_percent = if grand_total > 0.0 {
        top_total / grand_total * 100.0
    } else {
        0.0
    };

    GeographicDistribution {
        pincode_distribution,
        top_10_pincodes,
        district_summary,
        top_10_percent,
    }
}

pub fn analyze_age_distribution(records: &[EnrolmentRecord]) -> AgeDistribution {
    let totals = age_totals(records);
    let grand_total = stats::nansum(records.iter().map(|r| r.total_enrolments));
    let counts = [totals.age_0_5, totals.age_5_17, totals.age_18_greater];

    let overall_breakdown = AGE_GROUPS
        .iter()
        .zip(counts)
        .map(|((band, label), count)| AgeBandShare {
            band: band.to_string(),
            label: label.to_string(),
            count,
            percentage: if grand_total > 0.0 {
                count / grand_total * 100.0
            } else {
                0.0
            },
        })
        .collect();

    let mut by_date: BTreeMap<NaiveDate, AgeBreakdown> = BTreeMap::new();
    for record in records {
        let entry = by_date.entry(record.date).or_default();
        entry.age_0_5 += stats::nansum([record.age_0_5]);
        entry.age_5_17 += stats::nansum([record.age_5_17]);
        entry.age_18_greater += stats::nansum([record.age_18_greater]);
    }

    AgeDistribution {
        overall_breakdown,
        temporal_breakdown: by_date
            .into_iter()
            .map(|(date, ages)| DailyAgeBreakdown { date, ages })
            .collect(),
    }
}

fn feature_column(records: &[EnrolmentRecord], feature: &str) -> Vec<f64> {
    records
        .iter()
        .map(|r| match feature {
            "age_0_5" => r.age_0_5,
            "age_5_17" => r.age_5_17,
            "age_18_greater" => r.age_18_greater,
            "total_enrolments" => r.total_enrolments,
            "month" => f64::from(r.month),
            "day" => f64::from(r.day),
            "week_of_year" => f64::from(r.week_of_year),
            _ => f64::NAN,
        })
        .collect()
}

pub fn calculate_correlation_matrix(records: &[EnrolmentRecord]) -> CorrelationAnalysis {
    let columns: Vec<Vec<f64>> = CORRELATION_FEATURES
        .iter()
        .map(|feature| feature_column(records, feature))
        .collect();

    let correlation_matrix: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|xs| columns.iter().map(|ys| stats::pearson(xs, ys)).collect())
        .collect();

    let mut strong_correlations = Vec::new();
    for i in 0..CORRELATION_FEATURES.len() {
        for j in (i + 1)..CORRELATION_FEATURES.len() {
            if let Some(correlation) = correlation_matrix[i][j] {
                if correlation.abs() > STRONG_CORRELATION {
                    strong_correlations.push(CorrelationPair {
                        var1: CORRELATION_FEATURES[i].to_string(),
                        var2: CORRELATION_FEATURES[j].to_string(),
                        correlation,
                    });
                }
            }
        }
    }

    CorrelationAnalysis {
        features: CORRELATION_FEATURES.iter().map(|f| f.to_string()).collect(),
        correlation_matrix,
        strong_correlations,
    }
}

pub fn identify_peak_periods(records: &[EnrolmentRecord]) -> PeakPeriods {
    let daily = daily_totals(records);
    let values: Vec<f64> = daily.iter().map(|d| d.total_enrolments).collect();

    let mut ranked = daily.clone();
    ranked.sort_by(|a, b| {
        b.total_enrolments
            .partial_cmp(&a.total_enrolments)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(TOP_N);

    let mut peak_month: Option<PeakMonth> = None;
    for month in monthly_totals(records) {
        if peak_month
            .as_ref()
            .map_or(true, |peak| month.total_enrolments > peak.enrolments)
        {
            peak_month = Some(PeakMonth {
                year: month.year,
                month: month.month,
                enrolments: month.total_enrolments,
            });
        }
    }

    PeakPeriods {
        top_10_days: ranked,
        peak_month,
        average_daily_enrolment: stats::mean(&values),
    }
}

pub fn run_full_analysis(records: &[EnrolmentRecord]) -> FullAnalysis {
    FullAnalysis {
        summary: calculate_summary_statistics(records),
        temporal: analyze_temporal_trends(records),
        geographic: analyze_geographic_distribution(records),
        age_distribution: analyze_age_distribution(records),
        correlations: calculate_correlation_matrix(records),
        peak_periods: identify_peak_periods(records),
    }
}
