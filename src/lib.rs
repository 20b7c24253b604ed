// src/lib.rs

//! Turns raw invoice lines from an extraction service into priced,
//! categorized and validated records.

pub mod categorize;
pub mod config;
pub mod corrections;
pub mod error;
pub mod heuristics;
pub mod line;
pub mod pipeline;
pub mod pricing;
pub mod units;
pub mod validate;
pub mod weight;

pub use categorize::{Categorization, Categorizer, Category, LineType, PricingType};
pub use config::Config;
pub use corrections::{
    CorrectionStore, MemoryCorrectionStore, SqliteCorrectionStore, VendorCorrectionEntry,
    apply_correction,
};
pub use error::{Error, Result};
pub use heuristics::{FormatSource, ParsedFormat, parse_format};
pub use line::{ColumnMapping, NormalizedLine, RawLine, normalize_line, normalize_lines};
pub use pipeline::{Engine, InvoiceResult, InvoiceSummary};
pub use validate::{Issue, IssueCode, Severity, ValidationResult};
