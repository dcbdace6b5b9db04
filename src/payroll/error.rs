// src/payroll/error.rs

use chrono::NaiveDate;
use thiserror::Error;

use super::run::RunStatus;

/// Failures raised by a [`super::store::PayrollStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The facility already has a run for this period that is not yet paid.
    #[error("facility {facility_id} already has an active payroll run starting {period_start}")]
    DuplicateActiveRun {
        facility_id: i64,
        period_start: NaiveDate,
    },

    /// A persisted row no longer decodes (status string, warnings blob, …).
    #[error("corrupt row: {0}")]
    Decode(String),
}

/// Failures surfaced by the payroll engine to its callers.
#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("payroll run {0} not found")]
    RunNotFound(i64),

    #[error("invalid payroll period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("cannot move payroll run from {from} to {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("facility {facility_id} already has an active payroll run for {year}-{month:02}")]
    DuplicateActiveRun {
        facility_id: i64,
        year: i32,
        month: u32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
