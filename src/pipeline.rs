// src/pipeline.rs

use crate::categorize::{Categorizer, LineType};
use crate::config::Config;
use crate::corrections::CorrectionStore;
use crate::heuristics::resolve_format;
use crate::line::{ColumnMapping, NormalizedLine, RawLine, normalize_lines};
use crate::pricing::{MAX_DECIMALS, calculate_normalized_price, round_to};
use crate::validate::{Issue, LineContext, Severity, Validator};
use crate::weight::extract_weight;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, debug_span, info, info_span, warn};

/// Runs raw lines through format resolution, weight, pricing, categorization
/// and validation for one vendor at a time.
pub struct Engine<'a, S: CorrectionStore + ?Sized> {
    store: &'a S,
    categorizer: Categorizer,
    validator: Validator,
    decimals: u32,
}

/// Per-invoice counts that drive the review screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub line_count: usize,
    pub needs_review: usize,
    pub billable: usize,
    pub processable: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Sum of line totals, credits included.
    pub lines_total: f64,
    pub products_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResult {
    pub vendor_id: String,
    /// In input order.
    pub lines: Vec<NormalizedLine>,
    /// Every warning and error of every line, flattened.
    pub issues: Vec<Issue>,
    pub summary: InvoiceSummary,
}

impl<'a, S: CorrectionStore + ?Sized> Engine<'a, S> {
    pub fn new(store: &'a S, config: &Config) -> Self {
        let decimals = config.pricing.decimals;
        if decimals > MAX_DECIMALS {
            warn!(decimals, max = MAX_DECIMALS, "Pricing decimals capped");
        }
        Self {
            store,
            categorizer: Categorizer::from_config(config),
            validator: Validator::new(&config.validation),
            decimals: decimals.min(MAX_DECIMALS),
        }
    }

    /// Interpret one line. Never fails; problems end up in the line's issues.
    pub fn process_line(&self, vendor_id: &str, line: &RawLine) -> NormalizedLine {
        let _span = debug_span!("line", line_number = line.line_number).entered();

        let resolved = resolve_format(line, vendor_id, self.store);
        let parsed = resolved.parsed;
        let categorization = self.categorizer.categorize(vendor_id, line, &parsed);
        let weight = extract_weight(line, &parsed);
        let price = calculate_normalized_price(line, &weight, self.decimals);

        let result = self.validator.validate(&LineContext {
            line,
            parsed: &parsed,
            source: resolved.source,
            categorization,
            price: &price,
        });

        debug!(
            format = %parsed.display_form,
            source = ?resolved.source,
            category = ?categorization.category,
            line_type = ?categorization.line_type,
            can_bill = result.can_bill,
            can_process = result.can_process,
            "Line interpreted"
        );

        NormalizedLine {
            raw: line.clone(),
            parsed_format: parsed,
            format_source: resolved.source,
            weight: weight.weight(),
            weight_in_base_grams: weight.base_grams(),
            volume_in_base_ml: weight.base_millilitres(),
            total_count: weight.total_count,
            price_per_g: price.price_per_g,
            price_per_ml: price.price_per_ml,
            category: categorization.category,
            line_type: categorization.line_type,
            pricing_type: categorization.pricing_type,
            can_bill: result.can_bill,
            can_process: result.can_process,
            warnings: result.warnings,
            notes: result.notes,
        }
    }

    /// Interpret every line of an invoice. Lines are independent: one bad
    /// line never affects its siblings or the totals of the others.
    pub fn process_invoice(&self, vendor_id: &str, lines: &[RawLine]) -> InvoiceResult {
        let _span = info_span!("invoice", vendor = %vendor_id).entered();

        let lines: Vec<NormalizedLine> = lines
            .iter()
            .map(|line| self.process_line(vendor_id, line))
            .collect();
        let issues: Vec<Issue> = lines
            .iter()
            .flat_map(|l| l.warnings.iter().cloned())
            .collect();
        let summary = summarize(&lines, &issues);

        info!(
            lines = summary.line_count,
            needs_review = summary.needs_review,
            billable = summary.billable,
            processable = summary.processable,
            warnings = summary.warnings,
            errors = summary.errors,
            "Invoice processed"
        );

        InvoiceResult {
            vendor_id: vendor_id.to_string(),
            lines,
            issues,
            summary,
        }
    }

    /// Normalize loosely-typed extraction records, then process them.
    pub fn process_values(
        &self,
        vendor_id: &str,
        values: &[Value],
        mapping: Option<&ColumnMapping>,
    ) -> InvoiceResult {
        self.process_invoice(vendor_id, &normalize_lines(values, mapping))
    }
}

fn summarize(lines: &[NormalizedLine], issues: &[Issue]) -> InvoiceSummary {
    let total_of = |keep: &dyn Fn(&NormalizedLine) -> bool| {
        let sum: f64 = lines
            .iter()
            .filter(|l| keep(*l))
            .filter_map(|l| l.raw.effective_total())
            .sum();
        round_to(sum, 2)
    };

    InvoiceSummary {
        line_count: lines.len(),
        needs_review: lines.iter().filter(|l| l.needs_review()).count(),
        billable: lines.iter().filter(|l| l.can_bill).count(),
        processable: lines.iter().filter(|l| l.can_process).count(),
        errors: issues.iter().filter(|i| i.severity == Severity::Error).count(),
        warnings: issues.iter().filter(|i| i.severity == Severity::Warning).count(),
        lines_total: total_of(&|_| true),
        products_total: total_of(&|l| l.line_type == LineType::Product),
    }
}
