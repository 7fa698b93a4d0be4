use serde::Serialize;

use crate::error::ConfigError;

/// Z-score threshold used when no override is supplied.
pub const ANOMALY_THRESHOLD: f64 = 2.5;
/// Days in the centered rolling window.
pub const ROLLING_WINDOW: usize = 7;
/// Per-location totals above this percentile are flagged as high volume.
pub const VOLUME_PERCENTILE: f64 = 95.0;

pub const DEFAULT_CSV_PATH: &str = "data/enrolment_dataset.csv";

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "date",
    "state",
    "district",
    "pincode",
    "age_0_5",
    "age_5_17",
    "age_18_greater",
];

/// Age band column names paired with their display labels.
pub const AGE_GROUPS: [(&str, &str); 3] = [
    ("age_0_5", "0-5 years"),
    ("age_5_17", "5-17 years"),
    ("age_18_greater", "18+ years"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyParams {
    pub threshold: f64,
    pub rolling_window: usize,
    pub volume_percentile: f64,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            threshold: ANOMALY_THRESHOLD,
            rolling_window: ROLLING_WINDOW,
            volume_percentile: VOLUME_PERCENTILE,
        }
    }
}

impl AnomalyParams {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_rolling_window(mut self, rolling_window: usize) -> Self {
        self.rolling_window = rolling_window;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.rolling_window == 0 {
            return Err(ConfigError::InvalidWindow);
        }
        if !(0.0..=100.0).contains(&self.volume_percentile) {
            return Err(ConfigError::InvalidPercentile(self.volume_percentile));
        }
        Ok(())
    }
}
