// src/payroll/run.rs
//
// Payroll run lifecycle and the engine that drives one: snapshot the rules,
// walk the month's clients, calculate each line, persist the lot atomically.

use std::fmt;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PayrollLineRow, PayrollRunRow};

use super::aggregate::{aggregate_attendance, aggregate_work_logs};
use super::calc::{calculate, PayrollLineDraft};
use super::error::{PayrollError, StoreError};
use super::rules::{decode_rule_rows, resolve_rule};
use super::store::PayrollStore;

// ───────────────────────────────────────
// Status state machine
// ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Calculating,
    Draft,
    Confirmed,
    Paid,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Calculating => "calculating",
            RunStatus::Draft => "draft",
            RunStatus::Confirmed => "confirmed",
            RunStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calculating" => Some(RunStatus::Calculating),
            "draft" => Some(RunStatus::Draft),
            "confirmed" => Some(RunStatus::Confirmed),
            "paid" => Some(RunStatus::Paid),
            _ => None,
        }
    }

    /// Forward-only, one step at a time.
    pub fn can_advance(self, to: RunStatus) -> bool {
        matches!(
            (self, to),
            (RunStatus::Calculating, RunStatus::Draft)
                | (RunStatus::Draft, RunStatus::Confirmed)
                | (RunStatus::Confirmed, RunStatus::Paid)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the first and last calendar day of the given month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((start, end))
}

// ───────────────────────────────────────
// Run records
// ───────────────────────────────────────

/// Non-fatal conditions found while calculating, persisted on the run so
/// staff see them on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    NoApplicableRule { client_id: i64, date: NaiveDate },
    MalformedRuleData { wage_rule_id: i64, field: String, detail: String },
}

#[derive(Debug)]
pub struct NewPayrollRun {
    pub facility_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: RunStatus,
    pub notes: Option<String>,
    pub warnings: Vec<RunWarning>,
}

/// A run row with status and warnings decoded.
#[derive(Debug, Clone, Serialize)]
pub struct PayrollRun {
    pub payroll_run_id: i64,
    pub facility_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: RunStatus,
    pub notes: Option<String>,
    pub warnings: Vec<RunWarning>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PayrollRun {
    pub fn from_row(row: PayrollRunRow) -> Result<Self, StoreError> {
        let status = RunStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Decode(format!(
                "payroll run {} has unknown status '{}'",
                row.payroll_run_id, row.status
            ))
        })?;
        let warnings = serde_json::from_value(row.warnings).map_err(|e| {
            StoreError::Decode(format!("payroll run {} warnings: {e}", row.payroll_run_id))
        })?;
        Ok(PayrollRun {
            payroll_run_id: row.payroll_run_id,
            facility_id: row.facility_id,
            period_start: row.period_start,
            period_end: row.period_end,
            status,
            notes: row.notes,
            warnings,
            confirmed_at: row.confirmed_at,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

/// Derived on every read so it always reflects the current lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub client_count: i64,
    pub clients_skipped: i64,
    pub base_total: i64,
    pub piece_total: i64,
    pub deductions_total: i64,
    pub net_total: i64,
}

impl RunSummary {
    pub fn from_lines(lines: &[PayrollLineRow], warnings: &[RunWarning]) -> Self {
        let clients_skipped = warnings
            .iter()
            .filter(|w| matches!(w, RunWarning::NoApplicableRule { .. }))
            .count() as i64;

        let mut summary = RunSummary {
            client_count: lines.len() as i64,
            clients_skipped,
            ..RunSummary::default()
        };
        for line in lines {
            summary.base_total += line.base_amount;
            summary.piece_total += line.piece_amount;
            summary.deductions_total += line.deductions_total;
            summary.net_total += line.net_amount;
        }
        summary
    }
}

#[derive(Debug, Serialize)]
pub struct RunDetail {
    pub run: PayrollRun,
    pub summary: RunSummary,
    pub lines: Vec<PayrollLineRow>,
}

#[derive(Debug, Serialize)]
pub struct RunListEntry {
    pub run: PayrollRun,
    pub summary: RunSummary,
}

// ───────────────────────────────────────
// Engine
// ───────────────────────────────────────

pub struct PayrollEngine<S> {
    store: S,
}

impl<S: PayrollStore> PayrollEngine<S> {
    pub fn new(store: S) -> Self {
        PayrollEngine { store }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Calculates one facility's payroll for a calendar month and persists
    /// the run atomically in `draft`. Per-client problems become warnings on
    /// the run; only store failures and a duplicate active run abort it.
    pub async fn create_run(
        &self,
        facility_id: i64,
        year: i32,
        month: u32,
        notes: Option<String>,
    ) -> Result<RunDetail, PayrollError> {
        let (period_start, period_end) =
            month_bounds(year, month).ok_or(PayrollError::InvalidPeriod { year, month })?;

        tracing::info!(facility_id, %period_start, %period_end, "calculating payroll run");

        // one immutable snapshot; rule edits mid-run cannot skew later clients
        let snapshot = decode_rule_rows(self.store.load_rule_snapshot(facility_id).await?);
        let mut warnings = snapshot.warnings;

        let client_ids = self
            .store
            .clients_with_attendance(facility_id, period_start, period_end)
            .await?;

        let mut lines: Vec<PayrollLineDraft> = Vec::with_capacity(client_ids.len());
        for client_id in client_ids {
            let confirmations = self
                .store
                .list_confirmations(client_id, period_start, period_end)
                .await?;
            let attendance = aggregate_attendance(&confirmations);

            let Some(rule) = resolve_rule(&snapshot.rules, client_id, period_end) else {
                tracing::warn!(facility_id, client_id, "no applicable wage rule, skipping client");
                warnings.push(RunWarning::NoApplicableRule { client_id, date: period_end });
                continue;
            };

            let logs = self
                .store
                .list_work_logs(client_id, period_start, period_end)
                .await?;
            let work_totals = aggregate_work_logs(&logs);

            lines.push(calculate(client_id, rule, attendance, &work_totals));
        }

        let new_run = NewPayrollRun {
            facility_id,
            period_start,
            period_end,
            status: RunStatus::Draft,
            notes,
            warnings,
        };
        let (row, line_rows) =
            self.store.insert_run_with_lines(&new_run, &lines).await.map_err(|e| match e {
                StoreError::DuplicateActiveRun { .. } => {
                    PayrollError::DuplicateActiveRun { facility_id, year, month }
                }
                other => PayrollError::Store(other),
            })?;

        let run = PayrollRun::from_row(row)?;
        tracing::info!(
            payroll_run_id = run.payroll_run_id,
            lines = line_rows.len(),
            warnings = run.warnings.len(),
            "payroll run persisted"
        );

        let summary = RunSummary::from_lines(&line_rows, &run.warnings);
        Ok(RunDetail { run, summary, lines: line_rows })
    }

    pub async fn confirm_run(
        &self,
        run_id: i64,
        notes: Option<String>,
    ) -> Result<PayrollRun, PayrollError> {
        self.transition(run_id, RunStatus::Confirmed, notes).await
    }

    pub async fn mark_paid(&self, run_id: i64) -> Result<PayrollRun, PayrollError> {
        self.transition(run_id, RunStatus::Paid, None).await
    }

    pub async fn get_run(&self, run_id: i64) -> Result<RunDetail, PayrollError> {
        let run = self.load_run(run_id).await?;
        let lines = self.store.list_lines(run_id).await?;
        let summary = RunSummary::from_lines(&lines, &run.warnings);
        Ok(RunDetail { run, summary, lines })
    }

    pub async fn list_runs(&self, facility_id: i64) -> Result<Vec<RunListEntry>, PayrollError> {
        let rows = self.store.list_runs(facility_id).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let run = PayrollRun::from_row(row)?;
            let lines = self.store.list_lines(run.payroll_run_id).await?;
            let summary = RunSummary::from_lines(&lines, &run.warnings);
            entries.push(RunListEntry { run, summary });
        }
        Ok(entries)
    }

    async fn load_run(&self, run_id: i64) -> Result<PayrollRun, PayrollError> {
        let row = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(PayrollError::RunNotFound(run_id))?;
        Ok(PayrollRun::from_row(row)?)
    }

    async fn transition(
        &self,
        run_id: i64,
        to: RunStatus,
        notes: Option<String>,
    ) -> Result<PayrollRun, PayrollError> {
        let run = self.load_run(run_id).await?;
        if !run.status.can_advance(to) {
            return Err(PayrollError::InvalidTransition { from: run.status, to });
        }

        let advanced = self
            .store
            .advance_run_status(run_id, run.status, to, notes.as_deref(), Utc::now())
            .await?;
        if !advanced {
            // lost a race; report whatever status the run has now
            let current = self.load_run(run_id).await?;
            return Err(PayrollError::InvalidTransition { from: current.status, to });
        }

        tracing::info!(payroll_run_id = run_id, status = %to, "payroll run advanced");
        self.load_run(run_id).await
    }
}
