// src/line.rs

use crate::categorize::{Category, LineType, PricingType};
use crate::heuristics::{FormatSource, ParsedFormat};
use crate::units;
use crate::validate::Issue;
use crate::weight::Weight;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One invoice line as handed over by the extraction service, after alias
/// normalization. Every stage reads only these fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLine {
    /// 1-based position on the invoice.
    pub line_number: usize,
    pub item_code: Option<String>,
    pub description: String,
    /// Free-text package format ("2/5LB", "Caisse 24kg", "24").
    pub format: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    /// Category supplied by the vendor or the extraction service.
    pub category_hint: Option<String>,
    /// Raw cell text keyed by original column index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub raw_columns: BTreeMap<usize, String>,
}

impl RawLine {
    /// A bare line naming an item by code or by name, for learning a
    /// correction outside of an invoice.
    pub fn for_item(item_code: Option<String>, name: Option<String>) -> Self {
        Self {
            item_code,
            description: name.unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Key used for learned corrections: the item code, else the normalized name.
    pub fn item_identifier(&self) -> Option<String> {
        item_identifier(self.item_code.as_deref(), &self.description)
    }

    /// Invoiced total, derived from quantity and unit price when missing.
    pub fn effective_total(&self) -> Option<f64> {
        self.total_price.or_else(|| match (self.quantity, self.unit_price) {
            (Some(q), Some(p)) => Some(q * p),
            _ => None,
        })
    }

    /// Raw text of the column at `index`, if the extraction kept it.
    pub fn column(&self, index: usize) -> Option<&str> {
        self.raw_columns
            .get(&index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Item code if present, else the trimmed, case-folded, space-collapsed name.
pub fn item_identifier(code: Option<&str>, name: &str) -> Option<String> {
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(code.to_string());
    }
    let folded = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (!folded.is_empty()).then_some(folded)
}

/// Invoice column index for each semantic role, as detected by the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub description: Option<usize>,
    pub item_code: Option<usize>,
    pub package_format: Option<usize>,
    pub quantity: Option<usize>,
    pub unit_price: Option<usize>,
    pub total_price: Option<usize>,
}

const LINE_NUMBER_KEYS: &[&str] = &["lineNumber", "line_number", "line"];
const DESCRIPTION_KEYS: &[&str] = &["description", "name", "itemName", "item_name", "product"];
const ITEM_CODE_KEYS: &[&str] = &["itemCode", "item_code", "sku", "code"];
const FORMAT_KEYS: &[&str] = &["format", "packageFormat", "package_format", "unit", "pack"];
const QUANTITY_KEYS: &[&str] = &["quantity", "qty"];
const UNIT_PRICE_KEYS: &[&str] = &["unitPrice", "unit_price", "price"];
const TOTAL_PRICE_KEYS: &[&str] = &["totalPrice", "total_price", "amount", "total"];
const WEIGHT_KEYS: &[&str] = &["weight", "totalValue", "total_value"];
const WEIGHT_UNIT_KEYS: &[&str] = &["weightUnit", "weight_unit"];
const CATEGORY_KEYS: &[&str] = &["category", "categoryHint", "category_hint"];
const RAW_COLUMN_KEYS: &[&str] = &["rawColumns", "raw_columns", "columns"];

/// Map one loosely-typed extraction record into a [`RawLine`].
///
/// Never fails: a non-object yields an empty line that validation will flag.
/// `line_number` is used unless the record carries its own.
pub fn normalize_line(value: &Value, line_number: usize, mapping: Option<&ColumnMapping>) -> RawLine {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    let mut line = RawLine {
        line_number: first(obj, LINE_NUMBER_KEYS)
            .and_then(loose_number)
            .filter(|n| *n >= 1.0 && n.fract() == 0.0)
            .map(|n| n as usize)
            .unwrap_or(line_number),
        item_code: first(obj, ITEM_CODE_KEYS).and_then(loose_text),
        description: first(obj, DESCRIPTION_KEYS)
            .and_then(loose_text)
            .unwrap_or_default(),
        format: first(obj, FORMAT_KEYS).and_then(loose_text).unwrap_or_default(),
        quantity: first(obj, QUANTITY_KEYS).and_then(loose_number),
        unit_price: first(obj, UNIT_PRICE_KEYS).and_then(loose_number),
        total_price: first(obj, TOTAL_PRICE_KEYS).and_then(loose_number),
        category_hint: first(obj, CATEGORY_KEYS).and_then(loose_text),
        raw_columns: first(obj, RAW_COLUMN_KEYS)
            .map(raw_columns)
            .unwrap_or_default(),
    };

    // A per-case weight given as a separate number ("weight": 5, "unit": "kg").
    if let Some(weight) = first(obj, WEIGHT_KEYS).and_then(loose_number) {
        let unit = first(obj, WEIGHT_UNIT_KEYS)
            .and_then(loose_text)
            .or_else(|| Some(line.format.clone()).filter(|f| units::lookup(f).is_some()));
        if let Some(unit) = unit.filter(|u| units::lookup(u).is_some()) {
            if line.format.trim().is_empty() || units::lookup(&line.format).is_some() {
                line.format = format!("{weight}{unit}");
            }
        }
    }

    if let Some(mapping) = mapping {
        fill_from_columns(&mut line, mapping);
    }

    line
}

/// Normalize a whole payload, numbering lines from 1 in input order.
pub fn normalize_lines(values: &[Value], mapping: Option<&ColumnMapping>) -> Vec<RawLine> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| normalize_line(v, i + 1, mapping))
        .collect()
}

/// Fill empty structured fields from the raw columns the mapping points at.
fn fill_from_columns(line: &mut RawLine, mapping: &ColumnMapping) {
    if line.format.trim().is_empty() {
        if let Some(format) = column_text(line, mapping.package_format) {
            line.format = format;
        }
    }
    if line.description.trim().is_empty() {
        if let Some(description) = column_text(line, mapping.description) {
            line.description = description;
        }
    }
    if line.item_code.is_none() {
        line.item_code = column_text(line, mapping.item_code);
    }
    if line.quantity.is_none() {
        line.quantity = column_text(line, mapping.quantity).and_then(|s| parse_amount(&s));
    }
    if line.unit_price.is_none() {
        line.unit_price = column_text(line, mapping.unit_price).and_then(|s| parse_amount(&s));
    }
    if line.total_price.is_none() {
        line.total_price = column_text(line, mapping.total_price).and_then(|s| parse_amount(&s));
    }
}

fn column_text(line: &RawLine, index: Option<usize>) -> Option<String> {
    index.and_then(|i| line.column(i)).map(str::to_string)
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn loose_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn raw_columns(value: &Value) -> BTreeMap<usize, String> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| Some((k.trim().parse::<usize>().ok()?, loose_text(v)?)))
            .collect(),
        Value::Array(cells) => cells
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((i, loose_text(v)?)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Parse a money or quantity cell: "$1,234.50", "12,95", "(3.00)", "-4".
pub fn parse_amount(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));
    let digits: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = if digits.contains('.') {
        digits.replace(',', "")
    } else {
        match digits.rsplit_once(',') {
            Some((head, tail)) if tail.len() != 3 && !head.contains(',') => {
                format!("{head}.{tail}")
            }
            _ => digits.replace(',', ""),
        }
    };

    let value = normalized.parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}

/// The engine's fully resolved record for one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLine {
    #[serde(flatten)]
    pub raw: RawLine,
    pub parsed_format: ParsedFormat,
    pub format_source: FormatSource,
    pub weight: Option<Weight>,
    pub weight_in_base_grams: Option<f64>,
    pub volume_in_base_ml: Option<f64>,
    /// Items for count-based lines ("1/24CT" x 3 = 72).
    pub total_count: Option<f64>,
    pub price_per_g: Option<f64>,
    #[serde(rename = "pricePerML")]
    pub price_per_ml: Option<f64>,
    pub category: Category,
    pub line_type: LineType,
    pub pricing_type: PricingType,
    pub can_bill: bool,
    pub can_process: bool,
    /// Warning and error issues, surfaced to the reviewer.
    pub warnings: Vec<Issue>,
    /// Info issues, logged but not flagged.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Issue>,
}

impl NormalizedLine {
    /// A product whose format is still unresolved or only guessed from the
    /// description. Fees, credits and deposits carry no format to review.
    pub fn needs_review(&self) -> bool {
        self.line_type == LineType::Product
            && (self.parsed_format.needs_review || self.format_source == FormatSource::Description)
    }
}
