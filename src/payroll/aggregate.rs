// src/payroll/aggregate.rs
//
// Collapses a month of confirmed attendance and work logs into the few
// numbers compensation needs.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::{AttendanceConfirmation, WorkLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Late,
    EarlyLeave,
    HalfDay,
    Absent,
    NoShow,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "late" => Some(AttendanceStatus::Late),
            "early_leave" => Some(AttendanceStatus::EarlyLeave),
            "half_day" => Some(AttendanceStatus::HalfDay),
            "absent" => Some(AttendanceStatus::Absent),
            "no_show" => Some(AttendanceStatus::NoShow),
            _ => None,
        }
    }

    /// Whether a day with this status counts toward `work_days`.
    pub fn counts_as_worked(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::Present
                | AttendanceStatus::Late
                | AttendanceStatus::EarlyLeave
                | AttendanceStatus::HalfDay
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub work_days: i32,
    pub total_minutes: i32,
}

/// Counts worked days and sums clocked minutes. A day missing either clock
/// stamp still counts as worked but adds no minutes, and a clock-out before
/// the clock-in contributes zero rather than negative time.
pub fn aggregate_attendance(confirmations: &[AttendanceConfirmation]) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();

    for c in confirmations {
        let status = match AttendanceStatus::parse(&c.status) {
            Some(s) => s,
            None => {
                tracing::warn!(
                    attendance_confirmation_id = c.attendance_confirmation_id,
                    status = %c.status,
                    "skipping confirmation with unknown status"
                );
                continue;
            }
        };
        if !status.counts_as_worked() {
            continue;
        }
        summary.work_days += 1;
        if let (Some(check_in), Some(check_out)) = (c.check_in, c.check_out) {
            summary.total_minutes += (check_out - check_in).num_minutes().max(0) as i32;
        }
    }

    summary
}

/// Totals logged quantities per work type. Rows without a quantity are
/// presence records and stay out of the totals. BTreeMap keeps the per-type
/// output in a stable order.
pub fn aggregate_work_logs(logs: &[WorkLog]) -> BTreeMap<String, Decimal> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();

    for log in logs {
        let Some(quantity) = log.quantity else { continue };
        *totals.entry(log.work_type.clone()).or_insert(Decimal::ZERO) += quantity;
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, d, h, m, 0).unwrap()
    }

    fn confirmation(
        id: i64,
        d: u32,
        status: &str,
        check_in: Option<chrono::DateTime<Utc>>,
        check_out: Option<chrono::DateTime<Utc>>,
    ) -> AttendanceConfirmation {
        AttendanceConfirmation {
            attendance_confirmation_id: id,
            client_id: 1,
            day: day(d),
            status: status.into(),
            check_in,
            check_out,
        }
    }

    fn log(d: u32, work_type: &str, quantity: Option<Decimal>) -> WorkLog {
        WorkLog {
            work_log_id: 0,
            client_id: 1,
            day: day(d),
            work_type: work_type.into(),
            quantity,
            unit: None,
        }
    }

    #[test]
    fn counts_worked_statuses_and_sums_minutes() {
        let confirmations = vec![
            confirmation(1, 1, "present", Some(at(1, 9, 0)), Some(at(1, 15, 0))),
            confirmation(2, 2, "late", Some(at(2, 10, 0)), Some(at(2, 15, 0))),
            confirmation(3, 3, "half_day", Some(at(3, 9, 0)), Some(at(3, 12, 0))),
            confirmation(4, 4, "absent", None, None),
        ];
        let summary = aggregate_attendance(&confirmations);
        assert_eq!(summary.work_days, 3);
        assert_eq!(summary.total_minutes, 360 + 300 + 180);
    }

    #[test]
    fn missing_clock_stamp_counts_day_without_minutes() {
        let confirmations = vec![
            confirmation(1, 1, "present", Some(at(1, 9, 0)), None),
            confirmation(2, 2, "early_leave", None, None),
        ];
        let summary = aggregate_attendance(&confirmations);
        assert_eq!(summary.work_days, 2);
        assert_eq!(summary.total_minutes, 0);
    }

    #[test]
    fn inverted_clocks_contribute_zero_minutes() {
        let confirmations =
            vec![confirmation(1, 1, "present", Some(at(1, 15, 0)), Some(at(1, 9, 0)))];
        let summary = aggregate_attendance(&confirmations);
        assert_eq!(summary.work_days, 1);
        assert_eq!(summary.total_minutes, 0);
    }

    #[test]
    fn unknown_status_is_skipped() {
        let confirmations = vec![
            confirmation(1, 1, "vacation?", Some(at(1, 9, 0)), Some(at(1, 15, 0))),
            confirmation(2, 2, "present", None, None),
        ];
        let summary = aggregate_attendance(&confirmations);
        assert_eq!(summary.work_days, 1);
    }

    #[test]
    fn no_worked_days_yields_zeroes() {
        let confirmations = vec![confirmation(1, 1, "no_show", None, None)];
        assert_eq!(aggregate_attendance(&confirmations), AttendanceSummary::default());
    }

    #[test]
    fn work_log_totals_group_by_type() {
        let logs = vec![
            log(1, "封入作業", Some(dec!(120))),
            log(2, "封入作業", Some(dec!(80))),
            log(2, "検品", Some(dec!(35.5))),
        ];
        let totals = aggregate_work_logs(&logs);
        assert_eq!(totals["封入作業"], dec!(200));
        assert_eq!(totals["検品"], dec!(35.5));
    }

    #[test]
    fn null_quantities_are_excluded() {
        let logs = vec![log(1, "検品", None), log(2, "検品", Some(dec!(10)))];
        let totals = aggregate_work_logs(&logs);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals["検品"], dec!(10));
    }

    #[test]
    fn no_logs_yields_empty_totals() {
        assert!(aggregate_work_logs(&[]).is_empty());
    }
}
