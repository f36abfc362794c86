//! Batch reconciliation of an account roster against per-portfolio
//! chain-of-title history. Each portfolio folder is processed in
//! isolation: its roster subset and history files are loaded,
//! normalized, and run through an ordered set of QC checks, and the
//! resulting flags are written per portfolio and aggregated into a
//! master file plus an error log.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod table;
pub mod telemetry;
