// src/units.rs

use serde::{Deserialize, Serialize};

/// Physical dimension a unit token measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Weight,
    Volume,
    Count,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Weight => "weight",
            UnitType::Volume => "volume",
            UnitType::Count => "count",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "weight" => Some(UnitType::Weight),
            "volume" => Some(UnitType::Volume),
            "count" => Some(UnitType::Count),
            _ => None,
        }
    }
}

/// Canonical unit prices are normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseUnit {
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "ml")]
    Millilitre,
}

impl BaseUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            BaseUnit::Gram => "g",
            BaseUnit::Millilitre => "ml",
        }
    }
}

/// One row of the conversion table.
#[derive(Debug)]
pub struct Unit {
    /// Canonical symbol used in display forms and stored corrections.
    pub symbol: &'static str,
    pub unit_type: UnitType,
    /// Grams (weight), millilitres (volume) or items (count) per one unit.
    pub factor: f64,
    aliases: &'static [&'static str],
}

impl Unit {
    pub fn base_unit(&self) -> Option<BaseUnit> {
        match self.unit_type {
            UnitType::Weight => Some(BaseUnit::Gram),
            UnitType::Volume => Some(BaseUnit::Millilitre),
            UnitType::Count => None,
        }
    }
}

#[rustfmt::skip]
static UNITS: &[Unit] = &[
    // mass -> grams
    Unit { symbol: "mg", unit_type: UnitType::Weight, factor: 0.001, aliases: &["mg", "milligram", "milligrams", "milligramme"] },
    Unit { symbol: "g", unit_type: UnitType::Weight, factor: 1.0, aliases: &["g", "gr", "grs", "gram", "grams", "gramme", "grammes"] },
    Unit { symbol: "kg", unit_type: UnitType::Weight, factor: 1000.0, aliases: &["kg", "kgs", "kilo", "kilos", "kilogram", "kilograms", "kilogramme", "kilogrammes"] },
    Unit { symbol: "lb", unit_type: UnitType::Weight, factor: 453.592, aliases: &["lb", "lbs", "livre", "livres", "pound", "pounds"] },
    Unit { symbol: "oz", unit_type: UnitType::Weight, factor: 28.3495, aliases: &["oz", "ozs", "ounce", "ounces", "once", "onces"] },
    // volume -> millilitres
    Unit { symbol: "ml", unit_type: UnitType::Volume, factor: 1.0, aliases: &["ml", "mls", "millilitre", "millilitres", "milliliter", "milliliters"] },
    Unit { symbol: "cl", unit_type: UnitType::Volume, factor: 10.0, aliases: &["cl", "centilitre", "centilitres", "centiliter", "centiliters"] },
    Unit { symbol: "dl", unit_type: UnitType::Volume, factor: 100.0, aliases: &["dl", "decilitre", "decilitres", "deciliter", "deciliters"] },
    Unit { symbol: "l", unit_type: UnitType::Volume, factor: 1000.0, aliases: &["l", "lt", "ltr", "ltrs", "litre", "litres", "liter", "liters"] },
    Unit { symbol: "gal", unit_type: UnitType::Volume, factor: 3785.41, aliases: &["gal", "gals", "gallon", "gallons"] },
    Unit { symbol: "qt", unit_type: UnitType::Volume, factor: 946.353, aliases: &["qt", "qts", "quart", "quarts", "pinte", "pintes"] },
    Unit { symbol: "pt", unit_type: UnitType::Volume, factor: 473.176, aliases: &["pt", "pts", "pint", "pints"] },
    Unit { symbol: "dry pt", unit_type: UnitType::Volume, factor: 550.610, aliases: &["dry pt", "drypt", "dry pint", "dry pints"] },
    Unit { symbol: "fl oz", unit_type: UnitType::Volume, factor: 29.5735, aliases: &["fl oz", "floz", "fluid oz", "fluid ounce", "fluid ounces"] },
    // count -> items
    Unit { symbol: "ct", unit_type: UnitType::Count, factor: 1.0, aliases: &["ct", "cts", "cnt", "count"] },
    Unit { symbol: "pc", unit_type: UnitType::Count, factor: 1.0, aliases: &["pc", "pcs", "pce", "pces", "piece", "pieces", "mcx", "morceaux"] },
    Unit { symbol: "ea", unit_type: UnitType::Count, factor: 1.0, aliases: &["ea", "each", "un", "unit", "units", "unite", "unites"] },
    Unit { symbol: "dz", unit_type: UnitType::Count, factor: 12.0, aliases: &["dz", "doz", "dozen", "douzaine", "douzaines"] },
    Unit { symbol: "rl", unit_type: UnitType::Count, factor: 1.0, aliases: &["rl", "rls", "roll", "rolls", "rouleau", "rouleaux"] },
];

/// Fold a raw token into the lookup form: lowercase, no accents, no periods,
/// single spaces.
pub fn normalize_token(token: &str) -> String {
    let folded: String = token
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '.')
        .map(fold_char)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip the French diacritics that show up on Quebec invoices.
pub fn fold_char(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' => 'i',
        'ô' | 'ö' => 'o',
        'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}

/// Look up a unit token. Matching is on the whole token, so "lb" never
/// resolves to the litre row and "lbs" stays a weight.
pub fn lookup(token: &str) -> Option<&'static Unit> {
    let key = normalize_token(token);
    if key.is_empty() {
        return None;
    }
    UNITS.iter().find(|u| u.aliases.contains(&key.as_str()))
}

pub fn unit_type_of(token: &str) -> Option<UnitType> {
    lookup(token).map(|u| u.unit_type)
}

pub fn is_weight_unit(token: &str) -> bool {
    unit_type_of(token) == Some(UnitType::Weight)
}

pub fn is_volume_unit(token: &str) -> bool {
    unit_type_of(token) == Some(UnitType::Volume)
}

/// Convert `value` expressed in `token` into grams or millilitres.
/// Count units have no base and return `None`.
pub fn to_base(value: f64, token: &str) -> Option<(f64, BaseUnit)> {
    let unit = lookup(token)?;
    let base = unit.base_unit()?;
    Some((value * unit.factor, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lb_is_weight_not_litre() {
        assert!(is_weight_unit("lb"));
        assert!(is_weight_unit("LBS"));
        assert!(!is_volume_unit("lb"));
        assert_eq!(lookup("lb").map(|u| u.symbol), Some("lb"));
    }

    #[test]
    fn test_litre_variants() {
        for token in ["L", "l", "litre", "Liter", "LT", "ltr"] {
            assert!(is_volume_unit(token), "{token} should be volume");
        }
    }

    #[test]
    fn test_abbreviation_variants() {
        assert_eq!(lookup("Kilo").map(|u| u.symbol), Some("kg"));
        assert_eq!(lookup("grams").map(|u| u.symbol), Some("g"));
        assert_eq!(lookup("Millilitre").map(|u| u.symbol), Some("ml"));
        assert_eq!(lookup("fl. oz").map(|u| u.symbol), Some("fl oz"));
        assert_eq!(lookup("DRY  PT").map(|u| u.symbol), Some("dry pt"));
        assert_eq!(lookup("unité").map(|u| u.symbol), Some("ea"));
    }

    #[test]
    fn test_to_base() {
        let (grams, base) = to_base(40.0, "lb").unwrap();
        assert!((grams - 18_143.68).abs() < 1e-6);
        assert_eq!(base, BaseUnit::Gram);

        let (ml, base) = to_base(2.0, "L").unwrap();
        assert_eq!(ml, 2000.0);
        assert_eq!(base, BaseUnit::Millilitre);

        assert!(to_base(12.0, "ct").is_none());
        assert!(to_base(1.0, "tigre").is_none());
    }

    #[test]
    fn test_unknown_tokens() {
        assert!(lookup("").is_none());
        assert!(lookup("caisse").is_none());
        assert!(lookup("b").is_none());
    }
}
