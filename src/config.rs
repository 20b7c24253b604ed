// src/config.rs

use crate::categorize::PricingType;
use serde::Deserialize;
use std::collections::HashMap;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Category name to pricing type, replacing the built-in default.
    #[serde(default)]
    pub pricing_defaults: HashMap<String, PricingType>,
    #[serde(default)]
    pub vendors: HashMap<String, VendorConfig>,
    /// Extra keywords per category name, appended to the built-in lists.
    #[serde(default)]
    pub keywords: HashMap<String, Vec<String>>,
}

fn default_db_path() -> String {
    "corrections/corrections.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            validation: ValidationConfig::default(),
            pricing: PricingConfig::default(),
            pricing_defaults: HashMap::new(),
            vendors: HashMap::new(),
            keywords: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Absolute slack on `quantity * unit_price == total`, in currency units.
    pub arithmetic_tolerance: f64,
    /// Relative slack, for large totals rounded per case.
    pub relative_tolerance: f64,
    /// Sanity ceiling on price per kg or per L.
    pub max_price_per_kg: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            arithmetic_tolerance: 0.02,
            relative_tolerance: 0.01,
            max_price_per_kg: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub decimals: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            decimals: crate::pricing::DEFAULT_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorConfig {
    /// Every line from this vendor falls in this category unless hinted.
    pub category: Option<String>,
    #[serde(default)]
    pub pricing_type: HashMap<String, PricingType>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the given file, or the defaults when none is given.
    pub fn load_or_default(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
