// src/payroll/store/mem.rs
//
// In-memory `PayrollStore` for engine tests. Mirrors the Postgres ordering
// and duplicate-run behaviour so the tests exercise the same contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::models::{AttendanceConfirmation, PayrollLineRow, PayrollRunRow, WageRuleRow, WorkLog};
use crate::payroll::calc::PayrollLineDraft;
use crate::payroll::error::StoreError;
use crate::payroll::run::{NewPayrollRun, RunStatus};

use super::PayrollStore;

#[derive(Default)]
struct MemInner {
    client_facility: HashMap<i64, i64>,
    rules: Vec<WageRuleRow>,
    confirmations: Vec<AttendanceConfirmation>,
    work_logs: Vec<WorkLog>,
    runs: Vec<PayrollRunRow>,
    lines: Vec<PayrollLineRow>,
    next_run_id: i64,
    next_line_id: i64,
}

#[derive(Default)]
pub struct MemPayrollStore {
    inner: Mutex<MemInner>,
}

impl MemPayrollStore {
    pub fn new() -> Self {
        MemPayrollStore::default()
    }

    pub async fn add_client(&self, client_id: i64, facility_id: i64) {
        self.inner.lock().await.client_facility.insert(client_id, facility_id);
    }

    pub async fn add_rule(&self, rule: WageRuleRow) {
        self.inner.lock().await.rules.push(rule);
    }

    pub async fn add_confirmation(&self, confirmation: AttendanceConfirmation) {
        self.inner.lock().await.confirmations.push(confirmation);
    }

    pub async fn add_work_log(&self, log: WorkLog) {
        self.inner.lock().await.work_logs.push(log);
    }

    pub async fn run_count(&self) -> usize {
        self.inner.lock().await.runs.len()
    }

    pub async fn line_count(&self) -> usize {
        self.inner.lock().await.lines.len()
    }
}

#[async_trait]
impl PayrollStore for MemPayrollStore {
    async fn load_rule_snapshot(&self, facility_id: i64) -> Result<Vec<WageRuleRow>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> =
            inner.rules.iter().filter(|r| r.facility_id == facility_id).cloned().collect();
        rows.sort_by_key(|r| r.wage_rule_id);
        Ok(rows)
    }

    async fn clients_with_attendance(
        &self,
        facility_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<i64> = inner
            .confirmations
            .iter()
            .filter(|c| c.day >= period_start && c.day <= period_end)
            .filter(|c| inner.client_facility.get(&c.client_id) == Some(&facility_id))
            .map(|c| c.client_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn list_confirmations(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<AttendanceConfirmation>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .confirmations
            .iter()
            .filter(|c| c.client_id == client_id && c.day >= period_start && c.day <= period_end)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.day);
        Ok(rows)
    }

    async fn list_work_logs(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<WorkLog>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .work_logs
            .iter()
            .filter(|l| l.client_id == client_id && l.day >= period_start && l.day <= period_end)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.day, &a.work_type).cmp(&(b.day, &b.work_type)));
        Ok(rows)
    }

    async fn insert_run_with_lines(
        &self,
        run: &NewPayrollRun,
        lines: &[PayrollLineDraft],
    ) -> Result<(PayrollRunRow, Vec<PayrollLineRow>), StoreError> {
        let mut inner = self.inner.lock().await;

        let duplicate = inner.runs.iter().any(|r| {
            r.facility_id == run.facility_id
                && r.period_start == run.period_start
                && r.status != "paid"
        });
        if duplicate {
            return Err(StoreError::DuplicateActiveRun {
                facility_id: run.facility_id,
                period_start: run.period_start,
            });
        }

        let warnings =
            serde_json::to_value(&run.warnings).map_err(|e| StoreError::Decode(e.to_string()))?;

        inner.next_run_id += 1;
        let run_row = PayrollRunRow {
            payroll_run_id: inner.next_run_id,
            facility_id: run.facility_id,
            period_start: run.period_start,
            period_end: run.period_end,
            status: run.status.as_str().to_string(),
            notes: run.notes.clone(),
            warnings,
            confirmed_at: None,
            paid_at: None,
            created_at: Utc::now(),
        };
        inner.runs.push(run_row.clone());

        let mut line_rows = Vec::with_capacity(lines.len());
        for line in lines {
            let breakdown = serde_json::to_value(&line.breakdown)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            inner.next_line_id += 1;
            let row = PayrollLineRow {
                payroll_line_id: inner.next_line_id,
                payroll_run_id: run_row.payroll_run_id,
                client_id: line.client_id,
                wage_rule_id: line.wage_rule_id,
                work_days: line.work_days,
                total_minutes: line.total_minutes,
                base_amount: line.base_amount,
                piece_amount: line.piece_amount,
                deductions_total: line.deductions_total,
                net_amount: line.net_amount,
                breakdown,
            };
            inner.lines.push(row.clone());
            line_rows.push(row);
        }

        Ok((run_row, line_rows))
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<PayrollRunRow>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.runs.iter().find(|r| r.payroll_run_id == run_id).cloned())
    }

    async fn list_lines(&self, run_id: i64) -> Result<Vec<PayrollLineRow>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> =
            inner.lines.iter().filter(|l| l.payroll_run_id == run_id).cloned().collect();
        rows.sort_by_key(|l| l.client_id);
        Ok(rows)
    }

    async fn list_runs(&self, facility_id: i64) -> Result<Vec<PayrollRunRow>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> =
            inner.runs.iter().filter(|r| r.facility_id == facility_id).cloned().collect();
        rows.sort_by(|a, b| {
            (b.period_start, b.payroll_run_id).cmp(&(a.period_start, a.payroll_run_id))
        });
        Ok(rows)
    }

    async fn advance_run_status(
        &self,
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(run) = inner.runs.iter_mut().find(|r| r.payroll_run_id == run_id) else {
            return Ok(false);
        };
        if run.status != from.as_str() {
            return Ok(false);
        }

        run.status = to.as_str().to_string();
        if let Some(notes) = notes {
            run.notes = Some(notes.to_string());
        }
        match to {
            RunStatus::Confirmed => run.confirmed_at = Some(at),
            RunStatus::Paid => run.paid_at = Some(at),
            _ => {}
        }
        Ok(true)
    }
}
