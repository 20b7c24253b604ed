// src/validate.rs

use crate::categorize::{Categorization, Category, LineType, PricingType};
use crate::config::ValidationConfig;
use crate::heuristics::{FormatSource, ParsedFormat};
use crate::line::RawLine;
use crate::pricing::NormalizedPrice;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Warnings and errors are shown to the reviewer; info is only logged.
    pub fn is_anomaly(self) -> bool {
        self != Severity::Info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingPrice,
    MissingQuantity,
    ArithmeticMismatch,
    FormatNeedsReview,
    UnknownUnit,
    PriceNotNormalized,
    PriceOutlier,
    CorrectionApplied,
    FormatFromDescription,
    ZeroTotal,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingPrice => "MISSING_PRICE",
            IssueCode::MissingQuantity => "MISSING_QUANTITY",
            IssueCode::ArithmeticMismatch => "ARITHMETIC_MISMATCH",
            IssueCode::FormatNeedsReview => "FORMAT_NEEDS_REVIEW",
            IssueCode::UnknownUnit => "UNKNOWN_UNIT",
            IssueCode::PriceNotNormalized => "PRICE_NOT_NORMALIZED",
            IssueCode::PriceOutlier => "PRICE_OUTLIER",
            IssueCode::CorrectionApplied => "CORRECTION_APPLIED",
            IssueCode::FormatFromDescription => "FORMAT_FROM_DESCRIPTION",
            IssueCode::ZeroTotal => "ZERO_TOTAL",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding on one line. Issues are rebuilt from scratch on every parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
}

impl Issue {
    pub fn new(
        code: IssueCode,
        severity: Severity,
        message: impl Into<String>,
        line_number: Option<usize>,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            line_number,
        }
    }
}

/// Outcome of the three tiers for one line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub can_bill: bool,
    pub can_process: bool,
    /// Quantity, unit price and total agree.
    pub tier1_valid: bool,
    /// The format resolved to a unit and a total.
    pub tier2_valid: bool,
    /// A price per base unit exists wherever one is expected.
    pub tier3_valid: bool,
    pub warnings: Vec<Issue>,
    pub notes: Vec<Issue>,
}

/// Everything earlier stages produced for a line.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub line: &'a RawLine,
    pub parsed: &'a ParsedFormat,
    pub source: FormatSource,
    pub categorization: Categorization,
    pub price: &'a NormalizedPrice,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn validate(&self, ctx: &LineContext<'_>) -> ValidationResult {
        let line_number = (ctx.line.line_number > 0).then_some(ctx.line.line_number);
        let mut issues = Vec::new();
        let mut push = |code, severity, message: String| {
            issues.push(Issue::new(code, severity, message, line_number));
        };

        let line = ctx.line;
        if line.unit_price.is_none() && line.total_price.is_none() {
            push(
                IssueCode::MissingPrice,
                Severity::Error,
                "no unit price and no total price".to_string(),
            );
        }
        if line.quantity.is_none() {
            push(
                IssueCode::MissingQuantity,
                Severity::Error,
                "no quantity".to_string(),
            );
        }
        if line.effective_total() == Some(0.0) {
            push(
                IssueCode::ZeroTotal,
                Severity::Info,
                "line total is zero".to_string(),
            );
        }

        let tier1_valid = self.check_arithmetic(line, &mut push);
        let tier2_valid = check_format(ctx, &mut push);
        let tier3_valid = self.check_pricing(ctx, &mut push);

        let can_bill = !issues.iter().any(|i| i.severity == Severity::Error);
        let (warnings, notes): (Vec<_>, Vec<_>) =
            issues.into_iter().partition(|i| i.severity.is_anomaly());
        for note in &notes {
            debug!(code = %note.code, line_number = ?note.line_number, message = %note.message, "Info issue");
        }

        ValidationResult {
            can_bill,
            can_process: tier1_valid && tier2_valid,
            tier1_valid,
            tier2_valid,
            tier3_valid,
            warnings,
            notes,
        }
    }

    /// Tier 1. A missing total is derived from quantity and unit price, so
    /// only a line carrying all three can disagree with itself.
    fn check_arithmetic(
        &self,
        line: &RawLine,
        push: &mut impl FnMut(IssueCode, Severity, String),
    ) -> bool {
        let Some(quantity) = line.quantity else {
            return false;
        };
        match (line.unit_price, line.total_price) {
            (Some(unit_price), Some(total)) => {
                let expected = quantity * unit_price;
                let tolerance = self
                    .config
                    .arithmetic_tolerance
                    .max(self.config.relative_tolerance * total.abs());
                if (expected - total).abs() <= tolerance {
                    true
                } else {
                    push(
                        IssueCode::ArithmeticMismatch,
                        Severity::Warning,
                        format!(
                            "{quantity} x {unit_price:.2} = {expected:.2}, invoiced {total:.2}"
                        ),
                    );
                    false
                }
            }
            (None, None) => false,
            _ => true,
        }
    }

    /// Tier 3. Only weight- or volume-priced products expect a price per base
    /// unit; a miss is a warning for food and informational otherwise.
    fn check_pricing(
        &self,
        ctx: &LineContext<'_>,
        push: &mut impl FnMut(IssueCode, Severity, String),
    ) -> bool {
        let c = ctx.categorization;
        let expects_price = c.line_type == LineType::Product
            && c.pricing_type != PricingType::Unit
            && ctx.line.effective_total().is_some_and(|t| t > 0.0);

        if let Some(per_thousand) = ctx.price.per_thousand() {
            if per_thousand > self.config.max_price_per_kg {
                let unit = if ctx.price.price_per_g.is_some() { "kg" } else { "L" };
                push(
                    IssueCode::PriceOutlier,
                    Severity::Warning,
                    format!("{per_thousand:.2} per {unit} is above {:.2}", self.config.max_price_per_kg),
                );
                return false;
            }
            return true;
        }
        if !expects_price {
            return true;
        }

        let severity = if c.category == Category::Food {
            Severity::Warning
        } else {
            Severity::Info
        };
        push(
            IssueCode::PriceNotNormalized,
            severity,
            "no price per gram or per millilitre could be computed".to_string(),
        );
        false
    }
}

/// Tier 2. Fees, credits and deposits carry no package format. A size taken
/// from the description is shown but not trusted until it is confirmed.
fn check_format(ctx: &LineContext<'_>, push: &mut impl FnMut(IssueCode, Severity, String)) -> bool {
    if ctx.source == FormatSource::Correction {
        push(
            IssueCode::CorrectionApplied,
            Severity::Info,
            format!("learned correction used: {}", ctx.parsed.display_form),
        );
    }

    if ctx.categorization.line_type != LineType::Product {
        return true;
    }
    if ctx.source == FormatSource::Description {
        push(
            IssueCode::FormatFromDescription,
            Severity::Warning,
            format!(
                "no package format; size {} taken from description, confirm it",
                ctx.parsed.display_form
            ),
        );
        return false;
    }
    if ctx.parsed.is_authoritative() {
        return true;
    }

    match ctx.parsed.unit_token.as_deref() {
        Some(token) => push(
            IssueCode::UnknownUnit,
            Severity::Warning,
            format!("unknown unit {token:?} in format {:?}", ctx.parsed.display_form),
        ),
        None if ctx.parsed.display_form.is_empty() => push(
            IssueCode::FormatNeedsReview,
            Severity::Warning,
            "no package format".to_string(),
        ),
        None => push(
            IssueCode::FormatNeedsReview,
            Severity::Warning,
            format!("format {:?} has no unit", ctx.parsed.display_form),
        ),
    }
    false
}

/// Validate with the default tolerances.
pub fn validate(ctx: &LineContext<'_>) -> ValidationResult {
    Validator::default().validate(ctx)
}
