// src/weight.rs

use crate::heuristics::ParsedFormat;
use crate::line::RawLine;
use crate::units::{self, BaseUnit, UnitType};
use serde::{Deserialize, Serialize};

/// A physical amount in the unit it was invoiced in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: f64,
    pub unit: String,
}

/// Total physical quantity of a line: per-case format times cases ordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedWeight {
    pub total_weight: Option<f64>,
    pub weight_unit: Option<String>,
    pub unit_type: Option<UnitType>,
    /// A weight or volume was resolved (false for count items and review cases).
    pub has_embedded_weight: bool,
    /// Items for count-based formats, dozens expanded.
    pub total_count: Option<f64>,
}

impl ExtractedWeight {
    pub fn weight(&self) -> Option<Weight> {
        Some(Weight {
            value: self.total_weight?,
            unit: self.weight_unit.clone()?,
        })
    }

    /// The total converted to grams or millilitres.
    pub fn in_base_units(&self) -> Option<(f64, BaseUnit)> {
        units::to_base(self.total_weight?, self.weight_unit.as_deref()?)
    }

    pub fn base_grams(&self) -> Option<f64> {
        match self.in_base_units()? {
            (grams, BaseUnit::Gram) => Some(grams),
            _ => None,
        }
    }

    pub fn base_millilitres(&self) -> Option<f64> {
        match self.in_base_units()? {
            (ml, BaseUnit::Millilitre) => Some(ml),
            _ => None,
        }
    }
}

/// Multiply the per-case format by the ordered quantity.
///
/// Returns an empty result when the format needs review, has no total, or the
/// line has no quantity. Credits carry negative quantities; the physical
/// amount is taken as positive.
pub fn extract_weight(line: &RawLine, parsed: &ParsedFormat) -> ExtractedWeight {
    if !parsed.is_authoritative() {
        return ExtractedWeight::default();
    }
    let (Some(per_case), Some(unit_type), Some(token)) = (
        parsed.total_value,
        parsed.unit_type,
        parsed.unit_token.as_deref(),
    ) else {
        return ExtractedWeight::default();
    };
    let Some(cases) = line.quantity.map(f64::abs) else {
        return ExtractedWeight::default();
    };

    let total = per_case * cases;
    match unit_type {
        UnitType::Weight | UnitType::Volume => ExtractedWeight {
            total_weight: Some(total),
            weight_unit: Some(token.to_string()),
            unit_type: Some(unit_type),
            has_embedded_weight: true,
            total_count: None,
        },
        UnitType::Count => ExtractedWeight {
            total_weight: None,
            weight_unit: None,
            unit_type: Some(UnitType::Count),
            has_embedded_weight: false,
            total_count: units::lookup(token).map(|u| total * u.factor),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::parse_format;

    fn line(quantity: Option<f64>) -> RawLine {
        RawLine {
            quantity,
            ..RawLine::default()
        }
    }

    #[test]
    fn test_cases_times_pack() {
        let w = extract_weight(&line(Some(4.0)), &parse_format("2/5LB"));
        assert_eq!(w.total_weight, Some(40.0));
        assert_eq!(w.weight_unit.as_deref(), Some("lb"));
        assert!(w.has_embedded_weight);
        assert!((w.base_grams().unwrap() - 18_143.68).abs() < 1e-6);
        assert_eq!(w.base_millilitres(), None);
    }

    #[test]
    fn test_volume() {
        let w = extract_weight(&line(Some(4.0)), &parse_format("500ml"));
        assert_eq!(w.total_weight, Some(2000.0));
        assert_eq!(w.unit_type, Some(UnitType::Volume));
        assert_eq!(w.base_millilitres(), Some(2000.0));
    }

    #[test]
    fn test_sold_by_weight() {
        let w = extract_weight(&line(Some(4.5)), &parse_format("KG"));
        assert_eq!(w.total_weight, Some(4.5));
        assert_eq!(w.base_grams(), Some(4500.0));
    }

    #[test]
    fn test_count_items_have_no_weight() {
        let w = extract_weight(&line(Some(3.0)), &parse_format("1/24CT"));
        assert_eq!(w.total_weight, None);
        assert!(!w.has_embedded_weight);
        assert_eq!(w.total_count, Some(72.0));

        let w = extract_weight(&line(Some(2.0)), &parse_format("1/DZ"));
        assert_eq!(w.total_count, Some(24.0));
    }

    #[test]
    fn test_review_and_missing_quantity_are_empty() {
        assert_eq!(
            extract_weight(&line(Some(4.0)), &parse_format("24")),
            ExtractedWeight::default()
        );
        assert_eq!(
            extract_weight(&line(None), &parse_format("2/5LB")),
            ExtractedWeight::default()
        );
    }

    #[test]
    fn test_credit_quantity_is_positive_amount() {
        let w = extract_weight(&line(Some(-1.0)), &parse_format("1/10LB"));
        assert_eq!(w.total_weight, Some(10.0));
    }
}
