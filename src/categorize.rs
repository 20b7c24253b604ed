// src/categorize.rs

use crate::config::Config;
use crate::heuristics::ParsedFormat;
use crate::line::RawLine;
use crate::units::{self, UnitType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Packaging,
    Supply,
    Fee,
    Other,
}

impl Category {
    /// Read a vendor-provided category, English or French.
    pub fn parse(s: &str) -> Option<Self> {
        match fold(s).as_str() {
            "food" | "foods" | "aliment" | "aliments" | "alimentaire" | "nourriture" | "produce"
            | "meat" | "seafood" | "viande" | "poisson" | "legumes" => Some(Self::Food),
            "packaging" | "package" | "emballage" | "emballages" | "disposables" => {
                Some(Self::Packaging)
            }
            "supply" | "supplies" | "fourniture" | "fournitures" | "entretien" | "cleaning"
            | "janitorial" => Some(Self::Supply),
            "fee" | "fees" | "frais" | "charge" | "charges" => Some(Self::Fee),
            "other" | "autre" | "autres" | "misc" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Product,
    Fee,
    Credit,
    Deposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    Weight,
    Unit,
    Volume,
}

impl PricingType {
    /// Built-in default per category. Food is costed by weight, everything
    /// else by the unit.
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Food => PricingType::Weight,
            Category::Packaging | Category::Supply | Category::Fee | Category::Other => {
                PricingType::Unit
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub category: Category,
    pub line_type: LineType,
    pub pricing_type: PricingType,
}

const CREDIT_WORDS: &[&str] = &["credit", "avoir", "retour", "return", "refund", "remboursement"];
const DEPOSIT_WORDS: &[&str] = &["deposit", "consigne", "depot"];
const FEE_WORDS: &[&str] = &[
    "freight", "transport", "livraison", "delivery", "fuel", "carburant", "surcharge",
    "shipping", "handling", "manutention", "fee",
];
const SUPPLY_WORDS: &[&str] = &[
    "gant", "glove", "degraisseur", "degreaser", "desinfectant", "disinfectant", "sanitizer",
    "assainisseur", "savon", "soap", "detergent", "nettoyant", "cleaner", "javel", "bleach",
    "eponge", "sponge", "quat", "poubelle", "garbage",
];
const PACKAGING_WORDS: &[&str] = &[
    "contenant", "container", "couvercle", "lid", "sac", "bag", "boite", "box", "film",
    "papier", "paper", "wrap", "clam", "bol", "bowl", "gobelet", "ustensile", "utensil",
    "serviette", "napkin", "foil", "tray", "barquette", "pellicule", "emballage",
];

/// Per-vendor policy: a vendor-wide category and pricing-type overrides.
#[derive(Debug, Clone, Default)]
struct VendorPolicy {
    category: Option<Category>,
    pricing: HashMap<Category, PricingType>,
}

/// Keyword and policy driven line categorizer.
#[derive(Debug, Clone, Default)]
pub struct Categorizer {
    extra_keywords: HashMap<Category, Vec<String>>,
    pricing_defaults: HashMap<Category, PricingType>,
    vendors: HashMap<String, VendorPolicy>,
}

impl Categorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let extra_keywords = by_category(&config.keywords)
            .into_iter()
            .map(|(cat, words)| (cat, words.iter().map(|w| fold(w)).collect()))
            .collect();
        let vendors = config
            .vendors
            .iter()
            .map(|(id, v)| {
                let policy = VendorPolicy {
                    category: v.category.as_deref().and_then(Category::parse),
                    pricing: by_category(&v.pricing_type),
                };
                (id.clone(), policy)
            })
            .collect();

        Self {
            extra_keywords,
            pricing_defaults: by_category(&config.pricing_defaults),
            vendors,
        }
    }

    /// Decide category, line type and pricing type for one line.
    ///
    /// Category comes from the explicit hint, then the vendor policy, then
    /// keywords, defaulting to food. The pricing type starts from the
    /// category default, is adjusted by what the format says, and is finally
    /// overridden by configuration.
    pub fn categorize(&self, vendor_id: &str, line: &RawLine, parsed: &ParsedFormat) -> Categorization {
        let words = words(&line.description);
        let vendor = self.vendors.get(vendor_id);

        let line_type = self.line_type(line, &words);
        let category = line
            .category_hint
            .as_deref()
            .and_then(Category::parse)
            .or_else(|| (line_type == LineType::Fee).then_some(Category::Fee))
            .or_else(|| vendor.and_then(|v| v.category))
            .or_else(|| self.keyword_category(&words))
            .unwrap_or(match line_type {
                LineType::Deposit => Category::Other,
                _ => Category::Food,
            });

        let pricing_type = vendor
            .and_then(|v| v.pricing.get(&category).copied())
            .or_else(|| self.pricing_defaults.get(&category).copied())
            .unwrap_or_else(|| data_pricing(category, parsed));

        Categorization {
            category,
            line_type,
            pricing_type,
        }
    }

    fn line_type(&self, line: &RawLine, words: &[String]) -> LineType {
        if line.effective_total().is_some_and(|t| t < 0.0) || has_any(words, CREDIT_WORDS) {
            LineType::Credit
        } else if has_any(words, DEPOSIT_WORDS) {
            LineType::Deposit
        } else if has_any(words, FEE_WORDS) || self.has_extra(words, Category::Fee) {
            LineType::Fee
        } else {
            LineType::Product
        }
    }

    fn keyword_category(&self, words: &[String]) -> Option<Category> {
        // Supplies before packaging: "SAC POUBELLE" is a garbage bag.
        if has_any(words, SUPPLY_WORDS) || self.has_extra(words, Category::Supply) {
            Some(Category::Supply)
        } else if has_any(words, PACKAGING_WORDS) || self.has_extra(words, Category::Packaging) {
            Some(Category::Packaging)
        } else if self.has_extra(words, Category::Other) {
            Some(Category::Other)
        } else if self.has_extra(words, Category::Food) {
            Some(Category::Food)
        } else {
            None
        }
    }

    fn has_extra(&self, words: &[String], category: Category) -> bool {
        self.extra_keywords
            .get(&category)
            .is_some_and(|kw| words.iter().any(|w| kw.iter().any(|k| matches_word(w, k))))
    }
}

/// Categorize with the built-in rules only.
pub fn categorize(line: &RawLine, parsed: &ParsedFormat) -> Categorization {
    Categorizer::new().categorize("", line, parsed)
}

/// Category default, then what the format says: liquids are costed by
/// volume, counted food by the unit, and non-food sold per kg or per litre
/// ("KG" alone) by that measure.
fn data_pricing(category: Category, parsed: &ParsedFormat) -> PricingType {
    let default = PricingType::default_for(category);
    if !parsed.is_authoritative() {
        return default;
    }
    match (default, parsed.unit_type) {
        (PricingType::Weight, Some(UnitType::Volume)) => PricingType::Volume,
        (PricingType::Weight, Some(UnitType::Count)) => PricingType::Unit,
        (PricingType::Unit, Some(unit_type)) if sold_per_measure(parsed) => match unit_type {
            UnitType::Weight => PricingType::Weight,
            UnitType::Volume => PricingType::Volume,
            UnitType::Count => PricingType::Unit,
        },
        _ => default,
    }
}

fn sold_per_measure(parsed: &ParsedFormat) -> bool {
    parsed.pack_count == Some(1.0)
        && parsed.unit_value == Some(1.0)
        && parsed.display_form == parsed.unit_token.clone().unwrap_or_default()
}

fn by_category<V: Clone>(map: &HashMap<String, V>) -> HashMap<Category, V> {
    map.iter()
        .filter_map(|(key, value)| match Category::parse(key) {
            Some(category) => Some((category, value.clone())),
            None => {
                warn!(key = %key, "Unknown category in config, ignored");
                None
            }
        })
        .collect()
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase().chars().map(units::fold_char).collect()
}

fn words(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn matches_word(word: &str, keyword: &str) -> bool {
    word == keyword
        || word
            .strip_prefix(keyword)
            .is_some_and(|rest| rest == "s" || rest == "es" || rest == "x")
}

fn has_any(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|w| keywords.iter().any(|k| matches_word(w, k)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::parse_format;

    fn line(description: &str, hint: Option<&str>, total: f64) -> RawLine {
        RawLine {
            description: description.to_string(),
            category_hint: hint.map(str::to_string),
            quantity: Some(1.0),
            unit_price: Some(total),
            total_price: Some(total),
            ..RawLine::default()
        }
    }

    #[test]
    fn test_food_defaults_to_weight_pricing() {
        let c = categorize(&line("Unclassified item", Some("food"), 10.0), &parse_format(""));
        assert_eq!(c.category, Category::Food);
        assert_eq!(c.line_type, LineType::Product);
        assert_eq!(c.pricing_type, PricingType::Weight);
    }

    #[test]
    fn test_packaging_defaults_to_unit_pricing() {
        let c = categorize(&line("Unclassified item", Some("packaging"), 10.0), &parse_format(""));
        assert_eq!(c.category, Category::Packaging);
        assert_eq!(c.pricing_type, PricingType::Unit);
    }

    #[test]
    fn test_keywords() {
        let c = categorize(&line("CONTENANT ALUM. 2.25LB RECT", None, 65.5), &parse_format("1/500"));
        assert_eq!(c.category, Category::Packaging);
        assert_eq!(c.pricing_type, PricingType::Unit);

        let c = categorize(&line("SAC POUBELLE 35X50 BLK", None, 35.75), &parse_format("1/100"));
        assert_eq!(c.category, Category::Supply);

        let c = categorize(&line("GANTS NITRILE M", None, 85.5), &parse_format("10/100"));
        assert_eq!(c.category, Category::Supply);

        let c = categorize(&line("SAUMON ATLANTIQUE FRAIS 10-12LB", None, 14.85), &parse_format("1/PC"));
        assert_eq!(c.category, Category::Food);
        assert_eq!(c.line_type, LineType::Product);
    }

    #[test]
    fn test_fee_credit_deposit() {
        let c = categorize(&line("Surcharge carburant / Fuel", None, 12.5), &parse_format(""));
        assert_eq!(c.line_type, LineType::Fee);
        assert_eq!(c.category, Category::Fee);
        assert_eq!(c.pricing_type, PricingType::Unit);

        let c = categorize(&line("CRÉDIT - SAUMON ENDOMMAGÉ", None, -14.85), &parse_format(""));
        assert_eq!(c.line_type, LineType::Credit);
        assert_eq!(c.category, Category::Food);

        let c = categorize(&line("Consigne bouteilles", None, 2.4), &parse_format(""));
        assert_eq!(c.line_type, LineType::Deposit);
        assert_eq!(c.category, Category::Other);
    }

    #[test]
    fn test_format_adjusts_pricing_type() {
        let c = categorize(&line("LAIT 3.25%", None, 5.0), &parse_format("4/4L"));
        assert_eq!(c.pricing_type, PricingType::Volume);

        let c = categorize(&line("HOMARD VIVANT", None, 28.95), &parse_format("PC"));
        assert_eq!(c.pricing_type, PricingType::Unit);

        let c = categorize(&line("FILM ÉTIRABLE", Some("packaging"), 20.0), &parse_format("KG"));
        assert_eq!(c.pricing_type, PricingType::Weight);

        let c = categorize(&line("FILM ÉTIRABLE", Some("packaging"), 85.0), &parse_format("4/RL"));
        assert_eq!(c.pricing_type, PricingType::Unit);
    }

    #[test]
    fn test_config_overrides() {
        let config: Config = toml::from_str(
            r#"
            [pricing_defaults]
            supply = "volume"

            [vendors.carrousel]
            category = "packaging"

            [vendors.norref.pricing_type]
            food = "unit"

            [keywords]
            packaging = ["ficelle"]
            "#,
        )
        .unwrap();
        let categorizer = Categorizer::from_config(&config);

        let c = categorizer.categorize("carrousel", &line("ARTICLE 123", None, 1.0), &parse_format(""));
        assert_eq!(c.category, Category::Packaging);

        let c = categorizer.categorize("norref", &line("SAUMON", None, 1.0), &parse_format("2/5LB"));
        assert_eq!(c.pricing_type, PricingType::Unit);

        let c = categorizer.categorize("x", &line("DÉGRAISSEUR", None, 1.0), &parse_format("4/4L"));
        assert_eq!(c.pricing_type, PricingType::Volume);

        let c = categorizer.categorize("x", &line("FICELLE BOUCHER", None, 1.0), &parse_format(""));
        assert_eq!(c.category, Category::Packaging);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Emballage"), Some(Category::Packaging));
        assert_eq!(Category::parse("SUPPLIES"), Some(Category::Supply));
        assert_eq!(Category::parse("légumes"), Some(Category::Food));
        assert_eq!(Category::parse("???"), None);
    }
}
