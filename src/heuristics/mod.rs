// src/heuristics/mod.rs

mod patterns;

use crate::corrections::CorrectionStore;
use crate::line::RawLine;
use crate::units::UnitType;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use patterns::{FormatPattern, PATTERNS};

/// Structured reading of a free-text package format ("2/5LB", "4x500ml", "24").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFormat {
    pub pack_count: Option<f64>,
    pub unit_value: Option<f64>,
    pub unit_token: Option<String>,
    pub unit_type: Option<UnitType>,
    pub total_value: Option<f64>,
    pub needs_review: bool,
    pub display_form: String,
}

impl ParsedFormat {
    /// A confidently resolved format: `pack_count` packs of `unit_value` units.
    pub fn resolved(
        pack_count: f64,
        unit_value: f64,
        unit_token: &str,
        unit_type: UnitType,
        display_form: String,
    ) -> Self {
        Self {
            pack_count: Some(pack_count),
            unit_value: Some(unit_value),
            unit_token: Some(unit_token.to_string()),
            unit_type: Some(unit_type),
            total_value: Some(pack_count * unit_value),
            needs_review: false,
            display_form,
        }
    }

    /// Text that could not be resolved. `unit_type` and `total_value` stay empty.
    pub fn unresolved(text: &str) -> Self {
        Self {
            pack_count: None,
            unit_value: None,
            unit_token: None,
            unit_type: None,
            total_value: None,
            needs_review: true,
            display_form: text.trim().to_string(),
        }
    }

    /// `total_value` may be relied on downstream.
    pub fn is_authoritative(&self) -> bool {
        !self.needs_review && self.total_value.is_some() && self.unit_type.is_some()
    }
}

/// Where the format used for a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatSource {
    /// A learned vendor correction; the text was not parsed.
    Correction,
    /// The line's format text.
    Text,
    /// A size embedded in the description, used when the format text was empty.
    Description,
    /// Nothing resolved; the format needs review.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFormat {
    pub parsed: ParsedFormat,
    pub source: FormatSource,
}

/// Parse a package format string. Patterns are tried in priority order and the
/// first structural match wins; empty or unrecognised text needs review.
pub fn parse_format(text: &str) -> ParsedFormat {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedFormat::unresolved(trimmed);
    }

    for pattern in PATTERNS.iter() {
        if let Some(parsed) = pattern.try_parse(trimmed) {
            debug!(pattern = pattern.name(), text = %trimmed, display = %parsed.display_form, "Format matched");
            return parsed;
        }
    }

    let mut parsed = ParsedFormat::unresolved(trimmed);
    parsed.unit_token = patterns::unknown_unit_token(trimmed);
    parsed
}

/// Resolve the format for one line of `vendor_id`'s invoice.
///
/// A learned correction for the line's item always wins over the text. When
/// the line carries no format text at all, the description is tried for an
/// embedded size ("MOULES 2LB") before giving up. Size ranges in the
/// description ("10-12LB") are ignored. A size read from the description is a
/// guess and stays under review until a correction confirms it.
pub fn resolve_format<S: CorrectionStore + ?Sized>(
    line: &RawLine,
    vendor_id: &str,
    store: &S,
) -> ResolvedFormat {
    if let Some(item) = line.item_identifier() {
        match store.get_learned_correction(vendor_id, &item) {
            Ok(Some(entry)) => {
                debug!(vendor = %vendor_id, item = %item, format = %entry.format, "Using learned correction");
                return ResolvedFormat {
                    parsed: entry.to_parsed(),
                    source: FormatSource::Correction,
                };
            }
            Ok(None) => {}
            Err(e) => {
                warn!(vendor = %vendor_id, item = %item, error = %e, "Correction lookup failed, parsing text");
            }
        }
    }

    let parsed = parse_format(&line.format);
    if !parsed.needs_review {
        return ResolvedFormat {
            parsed,
            source: FormatSource::Text,
        };
    }

    if line.format.trim().is_empty() {
        let from_description = parse_format(&patterns::strip_size_ranges(&line.description));
        if from_description.is_authoritative() {
            return ResolvedFormat {
                parsed: from_description,
                source: FormatSource::Description,
            };
        }
    }

    ResolvedFormat {
        parsed,
        source: FormatSource::Unresolved,
    }
}

/// Render a number without a trailing ".0".
pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::{MemoryCorrectionStore, VendorCorrectionEntry};
    use time::OffsetDateTime;

    fn line(code: Option<&str>, description: &str, format: &str) -> RawLine {
        RawLine {
            item_code: code.map(str::to_string),
            description: description.to_string(),
            format: format.to_string(),
            quantity: Some(1.0),
            unit_price: Some(10.0),
            total_price: Some(10.0),
            ..RawLine::default()
        }
    }

    #[test]
    fn test_pack_pattern() {
        let p = parse_format("2/5LB");
        assert!(!p.needs_review);
        assert_eq!(p.pack_count, Some(2.0));
        assert_eq!(p.unit_value, Some(5.0));
        assert_eq!(p.unit_token.as_deref(), Some("lb"));
        assert_eq!(p.unit_type, Some(UnitType::Weight));
        assert_eq!(p.total_value, Some(10.0));
        assert_eq!(p.display_form, "2/5lb");
    }

    #[test]
    fn test_pack_pattern_does_not_fall_through_to_bare_number() {
        let p = parse_format("2/5LB");
        assert!(!p.needs_review);
        let p = parse_format("2/2.5KG");
        assert_eq!(p.total_value, Some(5.0));
        assert_eq!(p.unit_token.as_deref(), Some("kg"));
    }

    #[test]
    fn test_multiplier_pattern() {
        for text in ["4x500ml", "4 X 500 ML", "4×500ml", "Case 4x500ml"] {
            let p = parse_format(text);
            assert!(!p.needs_review, "{text}");
            assert_eq!(p.pack_count, Some(4.0));
            assert_eq!(p.unit_value, Some(500.0));
            assert_eq!(p.unit_type, Some(UnitType::Volume));
            assert_eq!(p.total_value, Some(2000.0));
        }
    }

    #[test]
    fn test_bare_weight_pattern() {
        let p = parse_format("50lb");
        assert_eq!(p.pack_count, Some(1.0));
        assert_eq!(p.unit_value, Some(50.0));
        assert_eq!(p.total_value, Some(50.0));

        let p = parse_format("Caisse 24kg");
        assert_eq!(p.total_value, Some(24.0));
        assert_eq!(p.unit_token.as_deref(), Some("kg"));

        let p = parse_format("Sac 50lb");
        assert_eq!(p.unit_type, Some(UnitType::Weight));

        let p = parse_format("2,5kg");
        assert_eq!(p.total_value, Some(2.5));
    }

    #[test]
    fn test_count_pattern() {
        let p = parse_format("24 CT");
        assert!(!p.needs_review);
        assert_eq!(p.unit_type, Some(UnitType::Count));
        assert_eq!(p.total_value, Some(24.0));

        let p = parse_format("1/24CT");
        assert_eq!(p.unit_type, Some(UnitType::Count));
        assert_eq!(p.total_value, Some(24.0));

        let p = parse_format("4/12PC");
        assert_eq!(p.total_value, Some(48.0));
    }

    #[test]
    fn test_pack_with_implicit_unit_value() {
        let p = parse_format("12/DRY PT");
        assert!(!p.needs_review);
        assert_eq!(p.unit_token.as_deref(), Some("dry pt"));
        assert_eq!(p.unit_type, Some(UnitType::Volume));
        assert_eq!(p.total_value, Some(12.0));

        let p = parse_format("1/PC");
        assert_eq!(p.unit_type, Some(UnitType::Count));
        assert_eq!(p.total_value, Some(1.0));
    }

    #[test]
    fn test_lb_alone_is_weight_not_litre() {
        let p = parse_format("lb");
        assert!(!p.needs_review);
        assert_eq!(p.unit_type, Some(UnitType::Weight));
        assert_eq!(p.unit_token.as_deref(), Some("lb"));

        let p = parse_format("L");
        assert_eq!(p.unit_type, Some(UnitType::Volume));

        let p = parse_format("5LB");
        assert_eq!(p.unit_type, Some(UnitType::Weight));
    }

    #[test]
    fn test_bare_number_needs_review() {
        let p = parse_format("24");
        assert!(p.needs_review);
        assert_eq!(p.unit_type, None);
        assert_eq!(p.total_value, None);

        let p = parse_format("1/500");
        assert!(p.needs_review);
        assert_eq!(p.pack_count, Some(1.0));
        assert_eq!(p.unit_value, Some(500.0));
        assert_eq!(p.unit_type, None);
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(parse_format("").needs_review);
        assert!(parse_format("   ").needs_review);
        assert!(parse_format("8X12").needs_review);

        let p = parse_format("3 caisses");
        assert!(p.needs_review);
        assert_eq!(p.unit_token.as_deref(), Some("caisses"));
    }

    #[test]
    fn test_resolve_prefers_correction() {
        let store = MemoryCorrectionStore::new();
        let entry = VendorCorrectionEntry::from_parsed(
            &parse_format("24 CT"),
            OffsetDateTime::UNIX_EPOCH,
        )
        .unwrap();
        store.save_correction("norref", "SF-11245", &entry).unwrap();

        let resolved = resolve_format(&line(Some("SF-11245"), "HUITRES", "2/5LB"), "norref", &store);
        assert_eq!(resolved.source, FormatSource::Correction);
        assert_eq!(resolved.parsed.total_value, Some(24.0));

        // Other vendors never see it.
        let resolved = resolve_format(&line(Some("SF-11245"), "HUITRES", "2/5LB"), "distrobec", &store);
        assert_eq!(resolved.source, FormatSource::Text);
        assert_eq!(resolved.parsed.total_value, Some(10.0));
    }

    #[test]
    fn test_resolve_falls_back_to_description() {
        let store = MemoryCorrectionStore::new();
        let resolved = resolve_format(&line(None, "MOULES DE L'IPE 2LB", ""), "norref", &store);
        assert_eq!(resolved.source, FormatSource::Description);
        assert_eq!(resolved.parsed.total_value, Some(2.0));

        let resolved = resolve_format(&line(None, "CREVETTES 16/20 TIGRE", ""), "norref", &store);
        assert_eq!(resolved.source, FormatSource::Unresolved);
        assert!(resolved.parsed.needs_review);

        // Size ranges grade the item, they are not a case size.
        let resolved = resolve_format(&line(None, "SAUMON ATLANTIQUE FRAIS 10-12LB", ""), "norref", &store);
        assert_eq!(resolved.source, FormatSource::Unresolved);
        assert_eq!(resolved.parsed.total_value, None);

        // Ambiguous format text is not second-guessed from the description.
        let resolved = resolve_format(&line(None, "BOL SOUPE 16OZ", "1/250"), "carrousel", &store);
        assert_eq!(resolved.source, FormatSource::Unresolved);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(2.5), "2.5");
    }
}
