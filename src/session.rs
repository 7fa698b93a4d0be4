//! The currently loaded dataset, owned explicitly instead of held in a global.
//!
//! A [`Session`] has a single writer: [`Session::replace`] swaps the whole
//! dataset. Readers take an `Arc` snapshot, so a request that started before
//! a replacement keeps working on the data it began with.

use std::sync::Arc;

use tracing::info;

use crate::analysis::run_full_analysis;
use crate::anomaly::run_anomaly_detection;
use crate::config::AnomalyParams;
use crate::error::{Result, SessionError};
use crate::filter::FilterRequest;
use crate::loader::{data_info, RawTable};
use crate::models::{AnomalyReport, DataInfo, EnrolmentRecord, FullAnalysis};
use crate::preprocess::preprocess;

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<EnrolmentRecord>,
}

impl Dataset {
    pub fn from_table(table: RawTable) -> Self {
        Self {
            columns: table.columns,
            records: preprocess(table.rows),
        }
    }

    pub fn info(&self) -> DataInfo {
        data_info(&self.columns, &self.records)
    }
}

#[derive(Debug, Default)]
pub struct Session {
    current: Option<Arc<Dataset>>,
    params: AnomalyParams,
}

impl Session {
    pub fn new(params: AnomalyParams) -> Self {
        Self {
            current: None,
            params,
        }
    }

    pub fn params(&self) -> &AnomalyParams {
        &self.params
    }

    /// Installs a new dataset wholesale and returns its description.
    pub fn replace(&mut self, dataset: Dataset) -> DataInfo {
        let info = dataset.info();
        info!(records = info.total_records, "replaced current dataset");
        self.current = Some(Arc::new(dataset));
        info
    }

    pub fn snapshot(&self) -> std::result::Result<Arc<Dataset>, SessionError> {
        self.current.clone().ok_or(SessionError::NoData)
    }

    pub fn filtered(&self, request: &FilterRequest) -> Result<Vec<EnrolmentRecord>> {
        let dataset = self.snapshot()?;
        Ok(request.apply(&dataset.records)?)
    }

    pub fn analyze(&self, request: &FilterRequest) -> Result<FullAnalysis> {
        let records = self.filtered(request)?;
        Ok(run_full_analysis(&records))
    }

    /// Runs every detector; `overrides` replaces the session parameters for
    /// this call only.
    pub fn detect_anomalies(
        &self,
        request: &FilterRequest,
        overrides: Option<AnomalyParams>,
    ) -> Result<AnomalyReport> {
        let records = self.filtered(request)?;
        let params = overrides.unwrap_or(self.params);
        Ok(run_anomaly_detection(&records, &params)?)
    }
}
