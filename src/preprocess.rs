//! Date parsing, derived columns and the time/location aggregations built on them.
//!
//! Rows whose `date` does not match the ingestion format (`dd-mm-yyyy`) are
//! dropped without error. Compare record counts before and after
//! [`preprocess`] to detect the loss.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::models::{AgeBreakdown, EnrolmentRecord, PincodeTotals, RawRecord, TimeBucket};
use crate::stats::nansum;

pub const INGEST_DATE_FORMAT: &str = "%d-%m-%Y";

/// A raw row whose date has been parsed; derived columns are not yet present.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub date: NaiveDate,
    pub raw: RawRecord,
}

pub fn parse_ingest_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, INGEST_DATE_FORMAT).ok()
}

pub fn parse_dates(rows: Vec<RawRecord>) -> Vec<ParsedRecord> {
    let before = rows.len();
    let parsed: Vec<ParsedRecord> = rows
        .into_iter()
        .filter_map(|raw| parse_ingest_date(&raw.date).map(|date| ParsedRecord { date, raw }))
        .collect();

    let dropped = before - parsed.len();
    if dropped > 0 {
        debug!(dropped, kept = parsed.len(), "dropped rows with unparseable dates");
    }
    parsed
}

pub fn add_derived_columns(rows: Vec<ParsedRecord>) -> Vec<EnrolmentRecord> {
    rows.into_iter().map(derive_record).collect()
}

fn derive_record(parsed: ParsedRecord) -> EnrolmentRecord {
    let ParsedRecord { date, raw } = parsed;
    let age_0_5 = raw.age_0_5.unwrap_or(f64::NAN);
    let age_5_17 = raw.age_5_17.unwrap_or(f64::NAN);
    let age_18_greater = raw.age_18_greater.unwrap_or(f64::NAN);

    EnrolmentRecord {
        date,
        state: raw.state,
        district: raw.district,
        pincode: raw.pincode,
        age_0_5,
        age_5_17,
        age_18_greater,
        total_enrolments: age_0_5 + age_5_17 + age_18_greater,
        year: date.year(),
        month: date.month(),
        month_name: date.format("%B").to_string(),
        day: date.day(),
        day_of_week: date.weekday(),
        week_of_year: date.iso_week().week(),
    }
}

/// Full ingestion pipeline: parse, derive, then stable sort by date.
pub fn preprocess(rows: Vec<RawRecord>) -> Vec<EnrolmentRecord> {
    let mut records = add_derived_columns(parse_dates(rows));
    records.sort_by_key(|record| record.date);
    debug!(records = records.len(), "preprocessed dataset");
    records
}

impl From<&EnrolmentRecord> for RawRecord {
    fn from(record: &EnrolmentRecord) -> Self {
        let observed = |value: f64| (!value.is_nan()).then_some(value);
        RawRecord {
            date: record.date.format(INGEST_DATE_FORMAT).to_string(),
            state: record.state.clone(),
            district: record.district.clone(),
            pincode: record.pincode,
            age_0_5: observed(record.age_0_5),
            age_5_17: observed(record.age_5_17),
            age_18_greater: observed(record.age_18_greater),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Frequency::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    fn next_period(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => start.succ_opt(),
            Frequency::Weekly => start.checked_add_signed(Duration::days(7)),
            Frequency::Monthly => {
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
            }
        }
    }
}

#[derive(Default)]
struct BucketAcc<'a> {
    ages: AgeBreakdown,
    total: f64,
    pincodes: HashSet<i64>,
    district: Option<&'a str>,
}

/// Calendar buckets from the first to the last period; gaps are zero-filled.
pub fn aggregate_by_time(records: &[EnrolmentRecord], frequency: Frequency) -> Vec<TimeBucket> {
    let mut buckets: BTreeMap<NaiveDate, BucketAcc> = BTreeMap::new();
    for record in records {
        let acc = buckets.entry(frequency.period_start(record.date)).or_default();
        acc.ages.age_0_5 += nansum([record.age_0_5]);
        acc.ages.age_5_17 += nansum([record.age_5_17]);
        acc.ages.age_18_greater += nansum([record.age_18_greater]);
        acc.total += nansum([record.total_enrolments]);
        acc.pincodes.insert(record.pincode);
        acc.district.get_or_insert(record.district.as_str());
    }

    let (Some(first), Some(last)) = (
        buckets.keys().next().copied(),
        buckets.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut output = Vec::new();
    let mut period = Some(first);
    while let Some(start) = period.filter(|start| *start <= last) {
        let bucket = match buckets.remove(&start) {
            Some(acc) => TimeBucket {
                period_start: start,
                ages: acc.ages,
                total_enrolments: acc.total,
                unique_pincodes: acc.pincodes.len(),
                district: acc.district.map(str::to_string),
            },
            None => TimeBucket {
                period_start: start,
                ages: AgeBreakdown::default(),
                total_enrolments: 0.0,
                unique_pincodes: 0,
                district: None,
            },
        };
        output.push(bucket);
        period = frequency.next_period(start);
    }
    output
}

/// Per-pincode band sums, total and record count, highest total first.
pub fn aggregate_by_pincode(records: &[EnrolmentRecord]) -> Vec<PincodeTotals> {
    let mut map: BTreeMap<i64, PincodeTotals> = BTreeMap::new();
    for record in records {
        let entry = map.entry(record.pincode).or_insert_with(|| PincodeTotals {
            pincode: record.pincode,
            total_enrolments: 0.0,
            ages: AgeBreakdown::default(),
            num_records: 0,
        });
        entry.total_enrolments += nansum([record.total_enrolments]);
        entry.ages.age_0_5 += nansum([record.age_0_5]);
        entry.ages.age_5_17 += nansum([record.age_5_17]);
        entry.ages.age_18_greater += nansum([record.age_18_greater]);
        entry.num_records += 1;
    }

    let mut totals: Vec<PincodeTotals> = map.into_values().collect();
    totals.sort_by(|a, b| {
        b.total_enrolments
            .partial_cmp(&a.total_enrolments)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    totals
}
