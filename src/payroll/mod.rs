// src/payroll/mod.rs
//
// The wage engine: rule resolution, attendance and work-log aggregation,
// per-client compensation, and the payroll run lifecycle.

pub mod aggregate;
pub mod calc;
pub mod error;
pub mod rules;
pub mod run;
pub mod store;
