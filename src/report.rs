use std::fmt::Write;

use crate::anomaly::{explain_anomaly, AnomalySubject, DetectorKind};
use crate::models::{AnomalyReport, FullAnalysis, TrendDirection};

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}

pub fn build_report(scope: Option<&str>, analysis: &FullAnalysis, anomalies: &AnomalyReport) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all records");
    let summary = &analysis.summary;

    let _ = writeln!(output, "# Enrolment Insights Report");
    match &summary.date_range {
        Some(span) => {
            let _ = writeln!(
                output,
                "Generated for {} ({} to {}, {} days)",
                scope_label, span.start, span.end, span.days
            );
        }
        None => {
            let _ = writeln!(output, "Generated for {} (no dated records)", scope_label);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total enrolments: {:.0}", summary.total_enrolments);
    let _ = writeln!(output, "- Unique pincodes: {}", summary.unique_pincodes);
    let daily = &summary.daily_statistics;
    let _ = writeln!(
        output,
        "- Daily mean {} / median {} / std {} (min {}, max {})",
        fmt_stat(daily.mean),
        fmt_stat(daily.median),
        fmt_stat(daily.std),
        fmt_stat(daily.min),
        fmt_stat(daily.max)
    );
    let trend = match analysis.temporal.trend_direction {
        Some(TrendDirection::Increasing) => "increasing",
        Some(TrendDirection::Decreasing) => "decreasing",
        None => "n/a",
    };
    let _ = writeln!(output, "- Trend (first vs last day): {}", trend);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Age Mix");
    for band in &analysis.age_distribution.overall_breakdown {
        let _ = writeln!(
            output,
            "- {}: {:.0} ({:.1}%)",
            band.label, band.count, band.percentage
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Pincodes");
    let geographic = &analysis.geographic;
    if geographic.top_10_pincodes.is_empty() {
        let _ = writeln!(output, "No pincodes in this window.");
    } else {
        for pincode in &geographic.top_10_pincodes {
            let _ = writeln!(
                output,
                "- {}: {:.0} enrolments across {} records",
                pincode.pincode, pincode.total_enrolments, pincode.num_records
            );
        }
        let _ = writeln!(
            output,
            "Top 10 pincodes hold {:.1}% of enrolments.",
            geographic.top_10_percent
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Flagged Days");
    if anomalies.explanations.is_empty() {
        let _ = writeln!(
            output,
            "No days beyond {} standard deviations.",
            anomalies.methodology.zscore_threshold
        );
    } else {
        for explanation in &anomalies.explanations {
            let _ = writeln!(output, "- {}", explanation.explanation);
        }
    }

    let window = anomalies.methodology.rolling_window_days;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Rolling Trend Breaks");
    if anomalies.rolling_analysis.flagged_days.is_empty() {
        let _ = writeln!(output, "No departures from the {}-day trend.", window);
    } else {
        for day in anomalies.rolling_analysis.flagged_days.iter().take(5) {
            let subject = AnomalySubject::from(day);
            let _ = writeln!(
                output,
                "- {}",
                explain_anomaly(&subject, DetectorKind::Rolling, window)
            );
        }
    }

    let high_volume = &anomalies.pincode_analysis.high_volume_pincodes;
    let _ = writeln!(output);
    let _ = writeln!(output, "## High Volume Pincodes");
    if high_volume.is_empty() {
        let _ = writeln!(output, "No pincodes above the volume threshold.");
    } else {
        for pincode in high_volume {
            let _ = writeln!(
                output,
                "- {}: {:.0} enrolments (percentile {:.1})",
                pincode.pincode, pincode.total_enrolments, pincode.percentile
            );
        }
    }

    output
}
