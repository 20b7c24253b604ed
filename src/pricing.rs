// src/pricing.rs

use crate::line::RawLine;
use crate::units::BaseUnit;
use crate::weight::ExtractedWeight;
use serde::Serialize;

/// Default rounding for price per base unit: keeps sub-cent-per-gram
/// precision for recipe costing without float noise.
pub const DEFAULT_DECIMALS: u32 = 6;

/// Past this, `10^decimals` no longer fits an `f64` usefully.
pub const MAX_DECIMALS: u32 = 12;

/// Price per gram or per millilitre. At most one of the two is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPrice {
    pub price_per_g: Option<f64>,
    #[serde(rename = "pricePerML")]
    pub price_per_ml: Option<f64>,
    pub total_base_units: Option<f64>,
    pub base_unit: Option<BaseUnit>,
}

impl NormalizedPrice {
    pub fn is_normalized(&self) -> bool {
        self.price_per_g.is_some() || self.price_per_ml.is_some()
    }

    /// Price per kilogram or per litre, for sanity checks and display.
    pub fn per_thousand(&self) -> Option<f64> {
        self.price_per_g.or(self.price_per_ml).map(|p| p * 1000.0)
    }
}

/// Divide the line total by its quantity in grams or millilitres.
///
/// Lines without a positive total or without a resolvable weight/volume yield
/// an all-empty result rather than an error.
pub fn calculate_normalized_price(
    line: &RawLine,
    weight: &ExtractedWeight,
    decimals: u32,
) -> NormalizedPrice {
    let Some(total_price) = line.effective_total().filter(|p| *p > 0.0) else {
        return NormalizedPrice::default();
    };
    let Some((base_units, base_unit)) = weight.in_base_units().filter(|(b, _)| *b > 0.0) else {
        return NormalizedPrice::default();
    };

    let per_base = round_to(total_price / base_units, decimals);
    let (price_per_g, price_per_ml) = match base_unit {
        BaseUnit::Gram => (Some(per_base), None),
        BaseUnit::Millilitre => (None, Some(per_base)),
    };

    NormalizedPrice {
        price_per_g,
        price_per_ml,
        total_base_units: Some(base_units),
        base_unit: Some(base_unit),
    }
}

/// Round to `decimals` places, capped at [`MAX_DECIMALS`].
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::parse_format;
    use crate::weight::extract_weight;

    fn priced(format: &str, quantity: f64, unit_price: f64, total: f64) -> NormalizedPrice {
        let line = RawLine {
            format: format.to_string(),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            total_price: Some(total),
            ..RawLine::default()
        };
        let weight = extract_weight(&line, &parse_format(&line.format));
        calculate_normalized_price(&line, &weight, DEFAULT_DECIMALS)
    }

    #[test]
    fn test_price_per_gram_for_shrimp_cases() {
        let price = priced("2/5LB", 4.0, 12.95, 51.80);
        assert!((price.total_base_units.unwrap() - 18_143.68).abs() < 1e-6);
        assert_eq!(price.base_unit, Some(BaseUnit::Gram));
        assert!((price.price_per_g.unwrap() - 0.002855).abs() < 1e-9);
        assert_eq!(price.price_per_ml, None);
    }

    #[test]
    fn test_price_per_ml() {
        let price = priced("4/4L", 1.0, 48.50, 48.50);
        assert_eq!(price.price_per_g, None);
        assert!((price.price_per_ml.unwrap() - 0.003031).abs() < 1e-9);
        assert_eq!(price.base_unit, Some(BaseUnit::Millilitre));
    }

    #[test]
    fn test_zero_total_is_not_normalized() {
        let price = priced("2/5LB", 4.0, 0.0, 0.0);
        assert_eq!(price, NormalizedPrice::default());
        assert!(!price.is_normalized());
    }

    #[test]
    fn test_count_items_are_not_normalized() {
        let price = priced("100CT", 1.0, 85.0, 85.0);
        assert!(!price.is_normalized());
    }

    #[test]
    fn test_total_derived_from_unit_price() {
        let line = RawLine {
            format: "KG".to_string(),
            quantity: Some(2.0),
            unit_price: Some(22.50),
            ..RawLine::default()
        };
        let weight = extract_weight(&line, &parse_format(&line.format));
        let price = calculate_normalized_price(&line, &weight, DEFAULT_DECIMALS);
        assert_eq!(price.price_per_g, Some(0.0225));
        assert_eq!(price.per_thousand(), Some(22.5));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.0028549889, 6), 0.002855);
        assert_eq!(round_to(1.23456, 2), 1.23);
    }

    #[test]
    fn test_round_to_caps_huge_precision() {
        assert!((round_to(0.0028549889, 400) - 0.0028549889).abs() < 1e-15);
        assert_eq!(round_to(1.5, u32::MAX), 1.5);
        let price = {
            let line = RawLine {
                format: "KG".to_string(),
                quantity: Some(2.0),
                total_price: Some(45.0),
                ..RawLine::default()
            };
            let weight = extract_weight(&line, &parse_format(&line.format));
            calculate_normalized_price(&line, &weight, 400)
        };
        assert_eq!(price.price_per_g, Some(0.0225));
    }
}
