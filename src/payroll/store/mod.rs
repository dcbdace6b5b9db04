// src/payroll/store/mod.rs

mod pg;

#[cfg(test)]
pub mod mem;

pub use pg::PgPayrollStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{AttendanceConfirmation, PayrollLineRow, PayrollRunRow, WageRuleRow, WorkLog};

use super::calc::PayrollLineDraft;
use super::error::StoreError;
use super::run::{NewPayrollRun, RunStatus};

/// Everything the payroll engine needs from persistence.
#[async_trait]
pub trait PayrollStore: Send + Sync {
    /// All wage rules of the facility; read once per run as its snapshot.
    async fn load_rule_snapshot(&self, facility_id: i64) -> Result<Vec<WageRuleRow>, StoreError>;

    /// Distinct clients with at least one confirmation in the period,
    /// ordered by client id.
    async fn clients_with_attendance(
        &self,
        facility_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<i64>, StoreError>;

    async fn list_confirmations(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<AttendanceConfirmation>, StoreError>;

    async fn list_work_logs(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<WorkLog>, StoreError>;

    /// Writes the run header and every line in one transaction. Fails with
    /// `DuplicateActiveRun` while the facility already has a non-paid run
    /// for the same period start.
    async fn insert_run_with_lines(
        &self,
        run: &NewPayrollRun,
        lines: &[PayrollLineDraft],
    ) -> Result<(PayrollRunRow, Vec<PayrollLineRow>), StoreError>;

    async fn get_run(&self, run_id: i64) -> Result<Option<PayrollRunRow>, StoreError>;

    /// Lines of one run, ordered by client id.
    async fn list_lines(&self, run_id: i64) -> Result<Vec<PayrollLineRow>, StoreError>;

    /// Runs of one facility, newest period first.
    async fn list_runs(&self, facility_id: i64) -> Result<Vec<PayrollRunRow>, StoreError>;

    /// Compare-and-set status move. Stamps the timestamp matching `to`,
    /// replaces notes when given, and returns false when the run is missing
    /// or no longer in `from`.
    async fn advance_run_status(
        &self,
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
