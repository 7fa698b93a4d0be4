//! Pure, composable row filters over a preprocessed dataset.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::error::FilterError;
use crate::models::EnrolmentRecord;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// Month-first before day-first, so "05-01-2024" reads as 1 May.
const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%m-%d-%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

/// Lenient date parser for filter bounds. Accepts ISO dates and datetimes,
/// RFC 3339, and the common slash/dash/month-name layouts.
pub fn parse_flexible_date(text: &str) -> Result<NaiveDateTime, FilterError> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(parsed.and_time(NaiveTime::MIN));
        }
    }
    Err(FilterError::InvalidDate(text.to_string()))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DateBound {
    Date(NaiveDate),
    Text(String),
}

impl DateBound {
    /// `None` for blank text, which leaves that side of the range open.
    pub fn resolve(&self) -> Result<Option<NaiveDateTime>, FilterError> {
        match self {
            DateBound::Date(date) => Ok(Some(date.and_time(NaiveTime::MIN))),
            DateBound::Text(text) if text.trim().is_empty() => Ok(None),
            DateBound::Text(text) => parse_flexible_date(text).map(Some),
        }
    }
}

impl From<NaiveDate> for DateBound {
    fn from(date: NaiveDate) -> Self {
        DateBound::Date(date)
    }
}

impl From<&str> for DateBound {
    fn from(text: &str) -> Self {
        DateBound::Text(text.to_string())
    }
}

/// Inclusive on both ends; records sit at midnight of their date.
pub fn filter_by_date_range(
    records: &[EnrolmentRecord],
    start: Option<&DateBound>,
    end: Option<&DateBound>,
) -> Result<Vec<EnrolmentRecord>, FilterError> {
    let start = start.map(DateBound::resolve).transpose()?.flatten();
    let end = end.map(DateBound::resolve).transpose()?.flatten();

    Ok(records
        .iter()
        .filter(|record| {
            let at = record.date.and_time(NaiveTime::MIN);
            start.map_or(true, |bound| at >= bound) && end.map_or(true, |bound| at <= bound)
        })
        .cloned()
        .collect())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PincodeValue {
    Code(i64),
    Float(f64),
    Text(String),
}

impl PincodeValue {
    pub fn to_code(&self) -> Result<i64, FilterError> {
        match self {
            PincodeValue::Code(code) => Ok(*code),
            PincodeValue::Float(value) if value.is_finite() => Ok(value.trunc() as i64),
            PincodeValue::Float(value) => Err(FilterError::InvalidPincode(value.to_string())),
            PincodeValue::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| FilterError::InvalidPincode(text.clone())),
        }
    }
}

/// A single pincode or a collection of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PincodeSelector {
    One(PincodeValue),
    Many(Vec<PincodeValue>),
}

impl PincodeSelector {
    pub fn codes(&self) -> Result<HashSet<i64>, FilterError> {
        match self {
            PincodeSelector::One(value) => Ok(HashSet::from([value.to_code()?])),
            PincodeSelector::Many(values) => values.iter().map(PincodeValue::to_code).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, PincodeSelector::Many(values) if values.is_empty())
    }
}

impl From<i64> for PincodeSelector {
    fn from(code: i64) -> Self {
        PincodeSelector::One(PincodeValue::Code(code))
    }
}

impl From<Vec<i64>> for PincodeSelector {
    fn from(codes: Vec<i64>) -> Self {
        PincodeSelector::Many(codes.into_iter().map(PincodeValue::Code).collect())
    }
}

impl From<Vec<String>> for PincodeSelector {
    fn from(codes: Vec<String>) -> Self {
        PincodeSelector::Many(codes.into_iter().map(PincodeValue::Text).collect())
    }
}

pub fn filter_by_pincode(
    records: &[EnrolmentRecord],
    pincodes: &PincodeSelector,
) -> Result<Vec<EnrolmentRecord>, FilterError> {
    let codes = pincodes.codes()?;
    Ok(records
        .iter()
        .filter(|record| codes.contains(&record.pincode))
        .cloned()
        .collect())
}

/// Optional filters attached to an analysis request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub start_date: Option<DateBound>,
    #[serde(default)]
    pub end_date: Option<DateBound>,
    #[serde(default)]
    pub pincodes: Option<PincodeSelector>,
}

impl FilterRequest {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.pincodes.as_ref().map_or(true, PincodeSelector::is_empty)
    }

    /// Copies the matching records; the input slice is never modified. An
    /// empty pincode collection applies no location filter.
    pub fn apply(&self, records: &[EnrolmentRecord]) -> Result<Vec<EnrolmentRecord>, FilterError> {
        let mut selected =
            filter_by_date_range(records, self.start_date.as_ref(), self.end_date.as_ref())?;
        if let Some(pincodes) = self.pincodes.as_ref().filter(|p| !p.is_empty()) {
            selected = filter_by_pincode(&selected, pincodes)?;
        }
        Ok(selected)
    }
}
