use super::{ParsedFormat, format_number};
use crate::units::{self, Unit, UnitType};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Amount: "5", "2.5", "2,5" (decimal comma) or "1,000".
const NUM: &str = r"\d+(?:[.,]\d+)?";

/// Unit token. Two-word units come first so "fl oz" is not read as "fl";
/// the letter run is greedy so "lb" is never split into "l" + "b".
const UNIT: &str = r"(?P<unit>fl\.?\s*oz|dry\s*pt|\p{L}+)";

/// One way of reading a package format. Implementations are tried in the
/// order of [`PATTERNS`]; the first `Some` wins.
pub trait FormatPattern: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_parse(&self, text: &str) -> Option<ParsedFormat>;
}

pub static PATTERNS: LazyLock<Vec<Box<dyn FormatPattern>>> = LazyLock::new(|| {
    vec![
        Box::new(PackPattern::new()),
        Box::new(MultiplierPattern::new()),
        Box::new(MeasurePattern::new()),
        Box::new(CountPattern::new()),
        Box::new(UnitOnlyPattern::new()),
        Box::new(BareNumberPattern::new()),
    ]
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("format pattern must compile")
}

fn parse_number(s: &str) -> Option<f64> {
    let normalized = match s.split_once(',') {
        // "1,000" groups thousands, "2,5" is a decimal comma.
        Some((_, frac)) if frac.len() == 3 => s.replace(',', ""),
        Some(_) => s.replace(',', "."),
        None => s.to_string(),
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn with_unit(value: f64, unit: &Unit) -> String {
    if unit.symbol.contains(' ') {
        format!("{} {}", format_number(value), unit.symbol)
    } else {
        format!("{}{}", format_number(value), unit.symbol)
    }
}

fn is_measure(unit: &Unit) -> bool {
    matches!(unit.unit_type, UnitType::Weight | UnitType::Volume)
}

/// `N/M<unit>` ("2/5LB", "1/24CT") and `N/<unit>` ("12/DRY PT", "1/PC").
struct PackPattern {
    re: Regex,
}

impl PackPattern {
    fn new() -> Self {
        Self {
            re: compile(&format!(
                r"(?i)(?P<pack>{NUM})\s*/\s*(?P<value>{NUM})?\s*{UNIT}"
            )),
        }
    }
}

impl FormatPattern for PackPattern {
    fn name(&self) -> &'static str {
        "pack"
    }

    fn try_parse(&self, text: &str) -> Option<ParsedFormat> {
        self.re.captures_iter(text).find_map(|caps| {
            let unit = units::lookup(&caps["unit"])?;
            let pack = parse_number(&caps["pack"])?;
            let (value, display) = match caps.name("value") {
                Some(m) => {
                    let value = parse_number(m.as_str())?;
                    (value, format!("{}/{}", format_number(pack), with_unit(value, unit)))
                }
                None => (1.0, format!("{}/{}", format_number(pack), unit.symbol)),
            };
            Some(ParsedFormat::resolved(
                pack,
                value,
                unit.symbol,
                unit.unit_type,
                display,
            ))
        })
    }
}

/// `N x M<unit>` / `N × M<unit>` ("4x500ml").
struct MultiplierPattern {
    re: Regex,
}

impl MultiplierPattern {
    fn new() -> Self {
        Self {
            re: compile(&format!(
                r"(?i)(?P<pack>{NUM})\s*[x×*]\s*(?P<value>{NUM})\s*{UNIT}"
            )),
        }
    }
}

impl FormatPattern for MultiplierPattern {
    fn name(&self) -> &'static str {
        "multiplier"
    }

    fn try_parse(&self, text: &str) -> Option<ParsedFormat> {
        self.re.captures_iter(text).find_map(|caps| {
            let unit = units::lookup(&caps["unit"])?;
            let pack = parse_number(&caps["pack"])?;
            let value = parse_number(&caps["value"])?;
            let display = format!("{}x{}", format_number(pack), with_unit(value, unit));
            Some(ParsedFormat::resolved(
                pack,
                value,
                unit.symbol,
                unit.unit_type,
                display,
            ))
        })
    }
}

/// A weight or volume anywhere in the text ("50lb", "Caisse 24kg", "1 L").
struct MeasurePattern {
    re: Regex,
}

impl MeasurePattern {
    fn new() -> Self {
        Self {
            re: compile(&format!(r"(?i)(?P<value>{NUM})\s*{UNIT}")),
        }
    }
}

impl FormatPattern for MeasurePattern {
    fn name(&self) -> &'static str {
        "measure"
    }

    fn try_parse(&self, text: &str) -> Option<ParsedFormat> {
        self.re.captures_iter(text).find_map(|caps| {
            let unit = units::lookup(&caps["unit"]).filter(|u| is_measure(u))?;
            let value = parse_number(&caps["value"])?;
            Some(ParsedFormat::resolved(
                1.0,
                value,
                unit.symbol,
                unit.unit_type,
                with_unit(value, unit),
            ))
        })
    }
}

/// `N CT`, `100CT`, `12 PC`. Counts never need a weight unit.
struct CountPattern {
    re: Regex,
}

impl CountPattern {
    fn new() -> Self {
        Self {
            re: compile(&format!(r"(?i)(?P<value>{NUM})\s*{UNIT}")),
        }
    }
}

impl FormatPattern for CountPattern {
    fn name(&self) -> &'static str {
        "count"
    }

    fn try_parse(&self, text: &str) -> Option<ParsedFormat> {
        self.re.captures_iter(text).find_map(|caps| {
            let unit =
                units::lookup(&caps["unit"]).filter(|u| u.unit_type == UnitType::Count)?;
            let value = parse_number(&caps["value"])?;
            Some(ParsedFormat::resolved(
                1.0,
                value,
                unit.symbol,
                unit.unit_type,
                with_unit(value, unit),
            ))
        })
    }
}

/// A lone unit ("KG", "lb", "PC"): the line is sold per unit, so the invoiced
/// quantity is the amount.
struct UnitOnlyPattern {
    re: Regex,
}

impl UnitOnlyPattern {
    fn new() -> Self {
        Self {
            re: compile(&format!(r"(?i)^{UNIT}$")),
        }
    }
}

impl FormatPattern for UnitOnlyPattern {
    fn name(&self) -> &'static str {
        "unit_only"
    }

    fn try_parse(&self, text: &str) -> Option<ParsedFormat> {
        let caps = self.re.captures(text)?;
        let unit = units::lookup(&caps["unit"])?;
        Some(ParsedFormat::resolved(
            1.0,
            1.0,
            unit.symbol,
            unit.unit_type,
            unit.symbol.to_string(),
        ))
    }
}

/// Numbers with no unit ("24", "1/500"). Could be a count, a weight or a
/// volume, so the result always needs review.
struct BareNumberPattern {
    re: Regex,
}

impl BareNumberPattern {
    fn new() -> Self {
        Self {
            re: compile(&format!(
                r"^(?P<first>{NUM})(?:\s*/\s*(?P<second>{NUM}))?$"
            )),
        }
    }
}

impl FormatPattern for BareNumberPattern {
    fn name(&self) -> &'static str {
        "bare_number"
    }

    fn try_parse(&self, text: &str) -> Option<ParsedFormat> {
        let caps = self.re.captures(text)?;
        let first = parse_number(&caps["first"])?;
        let mut parsed = ParsedFormat::unresolved(text);
        match caps.name("second").and_then(|m| parse_number(m.as_str())) {
            Some(second) => {
                parsed.pack_count = Some(first);
                parsed.unit_value = Some(second);
            }
            None => parsed.unit_value = Some(first),
        }
        Some(parsed)
    }
}

static SIZE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?i){NUM}\s*-\s*{NUM}\s*\p{{L}}+")));

/// Blank out size ranges ("10-12LB", "1-1.25LB"). A range grades the item;
/// it is not a case size.
pub(super) fn strip_size_ranges(text: &str) -> Cow<'_, str> {
    SIZE_RANGE.replace_all(text, " ")
}

static UNKNOWN_UNIT: LazyLock<Regex> = LazyLock::new(|| compile(r"\d\s*(\p{L}{2,})"));

/// The first letter run glued to a number, for reporting a unit the table
/// does not know.
pub(super) fn unknown_unit_token(text: &str) -> Option<String> {
    let caps = UNKNOWN_UNIT.captures(text)?;
    let token = units::normalize_token(&caps[1]);
    units::lookup(&token).is_none().then_some(token)
}
