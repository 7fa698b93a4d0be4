use thiserror::Error;

/// The loaded table is missing one or more required columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Data file not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Pincode is not numeric: {0:?}")]
    InvalidPincode(String),

    #[error("Unrecognised date: {0:?}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Anomaly threshold must be a positive finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("Rolling window must cover at least one day")]
    InvalidWindow,

    #[error("Volume percentile must lie in [0, 100], got {0}")]
    InvalidPercentile(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No data loaded. Please load data first.")]
    NoData,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, Error>;
