// Timesheet Reconciliation & Aggregation Engine - Core Library
// Exposes all modules for use in the CLI and tests

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod invoice;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod validate;

// Re-export commonly used types
pub use aggregate::{aggregate, top_by_hours, total_hours, AggregateBucket, Dimension};
pub use config::EngineConfig;
pub use discovery::{discover_workbooks, employee_name};
pub use extract::{extract_sheet, RawRow, SchemaError, SheetExtraction};
pub use invoice::InvoiceRenderer;
pub use normalize::{canonical, same};
pub use period::{resolve_month_sheets, Period, FULL_YEAR_LABEL, MONTH_TOKENS};
pub use pipeline::{run, EngineError, Mode, RunOutcome, RunSummary};
pub use registry::{ClientRecord, ClientRegistry, RegistryError};
pub use report::{ReportMeta, ReportRenderer, SummaryFigures};
pub use validate::{
    IssueReason, RowVerdict, TimeEntry, ValidationEngine, ValidationIssue, ValidationOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
