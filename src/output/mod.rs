//! Output formatting for subnet utilization.
//!
//! - [`report`] - one CSV-style row per subnet
//! - [`terminal`] - field formatting and colouring helpers

mod report;
mod terminal;

pub use report::{print_report, report_lines, subnet_report, SubnetReportRow};
pub use terminal::{format_field, format_ranges};
