//! Statistical anomaly detectors over the per-day enrolment series.
//!
//! Detectors never fail on degenerate input. Where a score is undefined
//! (a single day, zero variance, an incomplete rolling window) the day is
//! reported with `None` and is not flagged.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::analysis::{daily_totals, WEEK_ORDER};
use crate::config::AnomalyParams;
use crate::error::ConfigError;
use crate::models::{
    weekday_name, AnomalyReport, AnomalyType, DayOfWeekStat, DetectorSummary, EnrolmentRecord,
    Explanation, LocationVolumeAnalysis, Methodology, MonthStat, PincodeVolume, RollingDay,
    TemporalPatterns, ZScoreDay,
};
use crate::preprocess::aggregate_by_pincode;
use crate::stats;

const EXPLAINED_ANOMALIES: usize = 5;
const TOP_LOCATIONS: usize = 10;

pub fn classify(z_score: Option<f64>, threshold: f64) -> AnomalyType {
    match z_score {
        Some(z) if z > threshold => AnomalyType::High,
        Some(z) if z < -threshold => AnomalyType::Low,
        _ => AnomalyType::Normal,
    }
}

pub fn calculate_zscore_anomalies(records: &[EnrolmentRecord], threshold: f64) -> Vec<ZScoreDay> {
    let daily = daily_totals(records);
    let values: Vec<f64> = daily.iter().map(|d| d.total_enrolments).collect();
    let mean = stats::mean(&values);
    let std = stats::sample_std(&values).filter(|s| *s > 0.0);

    daily
        .into_iter()
        .map(|day| {
            let z_score = mean
                .zip(std)
                .map(|(mean, std)| (day.total_enrolments - mean) / std);
            ZScoreDay {
                date: day.date,
                total_enrolments: day.total_enrolments,
                z_score,
                is_anomaly: z_score.is_some_and(|z| z.abs() > threshold),
                anomaly_type: classify(z_score, threshold),
            }
        })
        .collect()
}

pub fn calculate_rolling_anomalies(
    records: &[EnrolmentRecord],
    window: usize,
    threshold: f64,
) -> Vec<RollingDay> {
    // daily_totals is already date-ordered
    let daily = daily_totals(records);
    let values: Vec<f64> = daily.iter().map(|d| d.total_enrolments).collect();
    let rolling_mean = stats::rolling_centered(&values, window, stats::mean);
    let rolling_std = stats::rolling_centered(&values, window, stats::sample_std);

    daily
        .into_iter()
        .zip(rolling_mean.into_iter().zip(rolling_std))
        .map(|(day, (rolling_mean, rolling_std))| {
            let deviation = rolling_mean.map(|mean| (day.total_enrolments - mean).abs());
            let threshold_value = rolling_std.map(|std| std * threshold);
            let (is_rolling_anomaly, anomaly_severity) = match (deviation, threshold_value) {
                (Some(deviation), Some(limit)) => {
                    let severity = if limit > 0.0 { deviation / limit } else { 0.0 };
                    (deviation > limit, severity)
                }
                _ => (false, 0.0),
            };
            RollingDay {
                date: day.date,
                total_enrolments: day.total_enrolments,
                rolling_mean,
                rolling_std,
                deviation,
                threshold_value,
                is_rolling_anomaly,
                anomaly_severity,
            }
        })
        .collect()
}

/// Flags pincodes whose total exceeds the given percentile of all pincode
/// totals. Every pincode also gets its tie-averaged percentile rank.
pub fn detect_pincode_anomalies(
    records: &[EnrolmentRecord],
    threshold_percentile: f64,
) -> LocationVolumeAnalysis {
    let totals = aggregate_by_pincode(records);
    let values: Vec<f64> = totals.iter().map(|t| t.total_enrolments).collect();
    let threshold_value = stats::percentile(&values, threshold_percentile);
    let ranks = stats::percentile_ranks(&values);

    let all_pincodes: Vec<PincodeVolume> = totals
        .iter()
        .zip(ranks)
        .map(|(entry, percentile)| PincodeVolume {
            pincode: entry.pincode,
            total_enrolments: entry.total_enrolments,
            is_high_volume: threshold_value.is_some_and(|limit| entry.total_enrolments > limit),
            percentile,
        })
        .collect();

    LocationVolumeAnalysis {
        threshold_percentile,
        threshold_value,
        high_volume_pincodes: all_pincodes
            .iter()
            .filter(|p| p.is_high_volume)
            .cloned()
            .collect(),
        top_10_pincodes: all_pincodes.iter().take(TOP_LOCATIONS).cloned().collect(),
        all_pincodes,
    }
}

/// Mean and spread of row totals by weekday and by month. Descriptive only.
pub fn detect_temporal_anomalies(records: &[EnrolmentRecord]) -> TemporalPatterns {
    let mut by_weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for record in records {
        by_weekday
            .entry(record.day_of_week.num_days_from_monday())
            .or_default()
            .push(record.total_enrolments);
        by_month
            .entry(record.month)
            .or_default()
            .push(record.total_enrolments);
    }

    let day_of_week_patterns = WEEK_ORDER
        .iter()
        .filter_map(|day| {
            let values = by_weekday.get(&day.num_days_from_monday())?;
            Some(DayOfWeekStat {
                day_of_week: weekday_name(*day).to_string(),
                mean: stats::mean(values),
                std: stats::sample_std(values),
            })
        })
        .collect();

    let monthly_patterns = by_month
        .iter()
        .map(|(month, values)| MonthStat {
            month: *month,
            mean: stats::mean(values),
            std: stats::sample_std(values),
        })
        .collect();

    TemporalPatterns {
        day_of_week_patterns,
        monthly_patterns,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    ZScore,
    Rolling,
    Unknown,
}

impl From<&str> for DetectorKind {
    fn from(name: &str) -> Self {
        match name {
            "zscore" => DetectorKind::ZScore,
            "rolling" => DetectorKind::Rolling,
            _ => DetectorKind::Unknown,
        }
    }
}

/// The fields of a flagged day that an explanation refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySubject {
    pub date: NaiveDate,
    pub total_enrolments: f64,
    pub anomaly_type: AnomalyType,
    pub z_score: Option<f64>,
    pub anomaly_severity: f64,
}

impl From<&ZScoreDay> for AnomalySubject {
    fn from(day: &ZScoreDay) -> Self {
        Self {
            date: day.date,
            total_enrolments: day.total_enrolments,
            anomaly_type: day.anomaly_type,
            z_score: day.z_score,
            anomaly_severity: 0.0,
        }
    }
}

impl From<&RollingDay> for AnomalySubject {
    fn from(day: &RollingDay) -> Self {
        let anomaly_type = match day.rolling_mean {
            Some(mean) if day.is_rolling_anomaly && day.total_enrolments > mean => AnomalyType::High,
            Some(_) if day.is_rolling_anomaly => AnomalyType::Low,
            _ => AnomalyType::Normal,
        };
        Self {
            date: day.date,
            total_enrolments: day.total_enrolments,
            anomaly_type,
            z_score: None,
            anomaly_severity: day.anomaly_severity,
        }
    }
}

pub fn explain_anomaly(subject: &AnomalySubject, kind: DetectorKind, window: usize) -> String {
    let date = subject.date.format("%Y-%m-%d");
    let count = subject.total_enrolments as i64;
    let z = subject.z_score.unwrap_or_default();

    match (kind, subject.anomaly_type) {
        (DetectorKind::ZScore, AnomalyType::High) => format!(
            "On {date}, enrolments ({count}) were significantly higher than average \
             (z-score: {z:.2}). This is {:.1} standard deviations above the mean.",
            z.abs()
        ),
        (DetectorKind::ZScore, AnomalyType::Low) => format!(
            "On {date}, enrolments ({count}) were significantly lower than average \
             (z-score: {z:.2}). This is {:.1} standard deviations below the mean.",
            z.abs()
        ),
        (DetectorKind::ZScore, AnomalyType::Normal) => "No significant anomaly detected.".to_string(),
        (DetectorKind::Rolling, _) => format!(
            "On {date}, enrolments deviated significantly from the recent {window}-day trend \
             (severity: {:.2}).",
            subject.anomaly_severity
        ),
        (DetectorKind::Unknown, _) => "Anomaly detected based on statistical analysis.".to_string(),
    }
}

fn summarize<T: Clone>(all_days: Vec<T>, flagged: impl Fn(&T) -> bool) -> DetectorSummary<T> {
    let flagged_days: Vec<T> = all_days.iter().filter(|day| flagged(day)).cloned().collect();
    DetectorSummary {
        anomalies_found: flagged_days.len(),
        flagged_days,
        all_days,
    }
}

/// Highest z-scores first; equal scores keep date order.
fn top_zscore_days(flagged: &[ZScoreDay], limit: usize) -> Vec<&ZScoreDay> {
    let mut ranked: Vec<&ZScoreDay> = flagged.iter().collect();
    ranked.sort_by(|a, b| {
        b.z_score
            .partial_cmp(&a.z_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

pub fn run_anomaly_detection(
    records: &[EnrolmentRecord],
    params: &AnomalyParams,
) -> Result<AnomalyReport, ConfigError> {
    params.validate()?;

    let zscore_analysis = summarize(
        calculate_zscore_anomalies(records, params.threshold),
        |day| day.is_anomaly,
    );
    let rolling_analysis = summarize(
        calculate_rolling_anomalies(records, params.rolling_window, params.threshold),
        |day| day.is_rolling_anomaly,
    );
    let pincode_analysis = detect_pincode_anomalies(records, params.volume_percentile);
    let temporal_analysis = detect_temporal_anomalies(records);

    let explanations = top_zscore_days(&zscore_analysis.flagged_days, EXPLAINED_ANOMALIES)
        .into_iter()
        .map(|day| Explanation {
            date: day.date,
            enrolments: day.total_enrolments,
            explanation: explain_anomaly(
                &AnomalySubject::from(day),
                DetectorKind::ZScore,
                params.rolling_window,
            ),
        })
        .collect();

    info!(
        days = zscore_analysis.all_days.len(),
        zscore_flagged = zscore_analysis.anomalies_found,
        rolling_flagged = rolling_analysis.anomalies_found,
        high_volume_pincodes = pincode_analysis.high_volume_pincodes.len(),
        "anomaly detection complete"
    );

    Ok(AnomalyReport {
        zscore_analysis,
        rolling_analysis,
        pincode_analysis,
        temporal_analysis,
        explanations,
        methodology: Methodology {
            zscore_threshold: params.threshold,
            rolling_window_days: params.rolling_window,
            volume_percentile: params.volume_percentile,
            description: format!(
                "Anomalies are found with transparent statistics: \
                 1) z-scores measure how far each day sits from the overall daily mean; \
                 2) a centered {}-day rolling window compares each day with its local trend; \
                 3) pincodes above the {}th percentile of total volume are marked high volume.",
                params.rolling_window, params.volume_percentile
            ),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;
    use crate::preprocess::tests::raw;
    use chrono::Duration;

    /// One record per consecutive day starting 2024-01-01.
    fn series(values: &[f64]) -> Vec<EnrolmentRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = values
            .iter()
            .enumerate()
            .map(|(offset, value)| {
                let date = start + Duration::days(offset as i64);
                raw(&date.format("%d-%m-%Y").to_string(), 731101, (*value, 0.0, 0.0))
            })
            .collect();
        preprocess(rows)
    }

    #[test]
    fn zscore_flags_the_spike_only() {
        let mut values = vec![10.0; 19];
        values.push(100.0);
        let days = calculate_zscore_anomalies(&series(&values), 2.5);
        let flagged: Vec<&ZScoreDay> = days.iter().filter(|d| d.is_anomaly).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].total_enrolments, 100.0);
        assert_eq!(flagged[0].anomaly_type, AnomalyType::High);
        assert!((flagged[0].z_score.unwrap() - 4.249).abs() < 1e-3);
        assert!(days[..19].iter().all(|d| d.anomaly_type == AnomalyType::Normal));
    }

    #[test]
    fn five_day_spike_peaks_below_two_point_five() {
        // With five points no sample z-score can exceed (n - 1) / sqrt(n)
        let days = calculate_zscore_anomalies(&series(&[10.0, 10.0, 10.0, 10.0, 100.0]), 2.5);
        assert!(days.iter().all(|d| !d.is_anomaly));
        assert!((days[4].z_score.unwrap() - 1.7888).abs() < 1e-3);

        let days = calculate_zscore_anomalies(&series(&[10.0, 10.0, 10.0, 10.0, 100.0]), 1.5);
        let types: Vec<AnomalyType> = days.iter().map(|d| d.anomaly_type).collect();
        assert_eq!(
            types,
            vec![
                AnomalyType::Normal,
                AnomalyType::Normal,
                AnomalyType::Normal,
                AnomalyType::Normal,
                AnomalyType::High
            ]
        );
    }

    #[test]
    fn zscore_flags_low_days() {
        let mut values = vec![100.0; 19];
        values.push(0.0);
        let days = calculate_zscore_anomalies(&series(&values), 2.5);
        assert_eq!(days[19].anomaly_type, AnomalyType::Low);
        assert!(days[19].is_anomaly);
    }

    #[test]
    fn zscore_is_undefined_for_flat_or_single_series() {
        let flat = calculate_zscore_anomalies(&series(&[7.0, 7.0, 7.0]), 2.5);
        assert!(flat.iter().all(|d| d.z_score.is_none() && !d.is_anomaly));

        let single = calculate_zscore_anomalies(&series(&[7.0]), 2.5);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].z_score, None);
        assert_eq!(single[0].anomaly_type, AnomalyType::Normal);

        assert!(calculate_zscore_anomalies(&[], 2.5).is_empty());
    }

    #[test]
    fn zscore_aggregates_rows_per_day() {
        let records = preprocess(vec![
            raw("01-01-2024", 1, (4.0, 0.0, 0.0)),
            raw("01-01-2024", 2, (6.0, 0.0, 0.0)),
            raw("02-01-2024", 1, (20.0, 0.0, 0.0)),
        ]);
        let days = calculate_zscore_anomalies(&records, 2.5);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].total_enrolments, 10.0);
    }

    #[test]
    fn rolling_edges_are_not_anomalous() {
        let values = [10.0, 11.0, 9.0, 10.0, 12.0, 10.0, 11.0, 9.0, 10.0, 10.0];
        let days = calculate_rolling_anomalies(&series(&values), 7, 2.5);
        for day in days[..3].iter().chain(days[7..].iter()) {
            assert_eq!(day.rolling_mean, None);
            assert!(!day.is_rolling_anomaly);
            assert_eq!(day.anomaly_severity, 0.0);
        }
        assert!(days[3..7].iter().all(|d| d.rolling_mean.is_some()));
    }

    #[test]
    fn rolling_flags_local_spike() {
        let values = [10.0, 10.0, 10.0, 11.0, 10.0, 10.0, 90.0, 10.0, 10.0, 11.0, 10.0, 10.0, 10.0];
        let days = calculate_rolling_anomalies(&series(&values), 7, 1.5);
        let spike = &days[6];
        assert!(spike.is_rolling_anomaly);
        assert!(spike.anomaly_severity > 1.0);
        let deviation = spike.deviation.unwrap();
        let limit = spike.threshold_value.unwrap();
        assert!((spike.anomaly_severity - deviation / limit).abs() < 1e-12);
        assert!(!days[3].is_rolling_anomaly);
    }

    #[test]
    fn rolling_zero_spread_has_zero_severity() {
        let days = calculate_rolling_anomalies(&series(&[5.0; 9]), 7, 2.5);
        assert_eq!(days[4].threshold_value, Some(0.0));
        assert_eq!(days[4].deviation, Some(0.0));
        assert!(!days[4].is_rolling_anomaly);
        assert_eq!(days[4].anomaly_severity, 0.0);
    }

    #[test]
    fn volume_detector_uses_interpolated_percentile() {
        let mut rows = Vec::new();
        for (code, total) in [(1, 10.0), (2, 20.0), (3, 30.0), (4, 40.0), (5, 500.0)] {
            rows.push(raw("01-01-2024", code, (total, 0.0, 0.0)));
        }
        let analysis = detect_pincode_anomalies(&preprocess(rows), 95.0);
        // 40 + 0.8 * (500 - 40)
        assert!((analysis.threshold_value.unwrap() - 408.0).abs() < 1e-9);
        assert_eq!(analysis.high_volume_pincodes.len(), 1);
        assert_eq!(analysis.high_volume_pincodes[0].pincode, 5);
        assert_eq!(analysis.all_pincodes[0].percentile, 100.0);
        assert_eq!(analysis.all_pincodes[4].percentile, 20.0);
    }

    #[test]
    fn volume_detector_shares_rank_between_ties() {
        let rows = vec![
            raw("01-01-2024", 1, (10.0, 0.0, 0.0)),
            raw("01-01-2024", 2, (10.0, 0.0, 0.0)),
        ];
        let analysis = detect_pincode_anomalies(&preprocess(rows), 95.0);
        assert!(analysis.all_pincodes.iter().all(|p| p.percentile == 75.0));
        assert!(analysis.high_volume_pincodes.is_empty());

        let empty = detect_pincode_anomalies(&[], 95.0);
        assert_eq!(empty.threshold_value, None);
        assert!(empty.all_pincodes.is_empty());
    }

    #[test]
    fn temporal_patterns_follow_calendar_order() {
        let records = preprocess(vec![
            raw("07-01-2024", 1, (3.0, 0.0, 0.0)),
            raw("01-01-2024", 1, (2.0, 0.0, 0.0)),
            raw("08-01-2024", 1, (4.0, 0.0, 0.0)),
            raw("01-02-2024", 1, (9.0, 0.0, 0.0)),
        ]);
        let patterns = detect_temporal_anomalies(&records);
        let days: Vec<&str> = patterns
            .day_of_week_patterns
            .iter()
            .map(|p| p.day_of_week.as_str())
            .collect();
        assert_eq!(days, vec!["Monday", "Thursday", "Sunday"]);
        assert_eq!(patterns.day_of_week_patterns[0].mean, Some(3.0));
        assert_eq!(patterns.day_of_week_patterns[1].std, None);
        assert_eq!(patterns.monthly_patterns.len(), 2);
        assert_eq!(patterns.monthly_patterns[0].mean, Some(3.0));
    }

    #[test]
    fn explanations_are_deterministic() {
        let subject = AnomalySubject {
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            total_enrolments: 412.0,
            anomaly_type: AnomalyType::High,
            z_score: Some(3.14159),
            anomaly_severity: 1.23456,
        };
        assert_eq!(
            explain_anomaly(&subject, DetectorKind::ZScore, 7),
            "On 2024-03-09, enrolments (412) were significantly higher than average \
             (z-score: 3.14). This is 3.1 standard deviations above the mean."
        );
        assert_eq!(
            explain_anomaly(&subject, DetectorKind::Rolling, 7),
            "On 2024-03-09, enrolments deviated significantly from the recent 7-day trend \
             (severity: 1.23)."
        );
        assert_eq!(
            explain_anomaly(&subject, DetectorKind::from("isolation-forest"), 7),
            "Anomaly detected based on statistical analysis."
        );

        let low = AnomalySubject {
            anomaly_type: AnomalyType::Low,
            z_score: Some(-2.76),
            ..subject.clone()
        };
        assert!(explain_anomaly(&low, DetectorKind::ZScore, 7)
            .ends_with("This is 2.8 standard deviations below the mean."));

        let normal = AnomalySubject {
            anomaly_type: AnomalyType::Normal,
            ..subject
        };
        assert_eq!(
            explain_anomaly(&normal, DetectorKind::ZScore, 7),
            "No significant anomaly detected."
        );
    }

    #[test]
    fn pipeline_explains_top_five_by_z_score() {
        let mut values = vec![10.0; 60];
        for (offset, spike) in [(5, 200.0), (15, 260.0), (25, 220.0), (35, 240.0), (45, 230.0), (55, 210.0)] {
            values[offset] = spike;
        }
        let report = run_anomaly_detection(&series(&values), &AnomalyParams::default()).unwrap();
        assert_eq!(report.zscore_analysis.anomalies_found, 6);
        assert_eq!(report.zscore_analysis.flagged_days.len(), 6);
        assert_eq!(report.zscore_analysis.all_days.len(), 60);

        let explained: Vec<f64> = report.explanations.iter().map(|e| e.enrolments).collect();
        assert_eq!(explained, vec![260.0, 240.0, 230.0, 220.0, 210.0]);
        assert!(report.explanations[0].explanation.contains("(260)"));
        assert_eq!(report.methodology.zscore_threshold, 2.5);
        assert_eq!(report.methodology.rolling_window_days, 7);
    }

    #[test]
    fn pipeline_rejects_invalid_overrides_and_tolerates_empty_input() {
        let params = AnomalyParams::default().with_rolling_window(0);
        assert_eq!(
            run_anomaly_detection(&[], &params),
            Err(ConfigError::InvalidWindow)
        );

        let report = run_anomaly_detection(&[], &AnomalyParams::default()).unwrap();
        assert_eq!(report.zscore_analysis.anomalies_found, 0);
        assert_eq!(report.rolling_analysis.anomalies_found, 0);
        assert!(report.explanations.is_empty());
    }
}
