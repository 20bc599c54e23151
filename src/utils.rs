use crate::error::{ExtractionError, Result};
use crate::schema::{LineItemValue, Scale};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static UNIT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d\s*(millions?|billions?|thousands?|mm|bn|m|b|k)\b")
        .expect("unit suffix pattern is valid")
});

/// Inline magnitude word attached to a single figure, e.g. `"$1.5 billion"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSuffix {
    Thousand,
    Million,
    Billion,
}

impl UnitSuffix {
    pub fn multiplier(&self) -> f64 {
        match self {
            UnitSuffix::Thousand => 1_000.0,
            UnitSuffix::Million => 1_000_000.0,
            UnitSuffix::Billion => 1_000_000_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedAmount {
    /// Signed number as written, before any unit is applied.
    pub magnitude: f64,
    pub unit: Option<UnitSuffix>,
}

impl ParsedAmount {
    pub fn value(&self) -> f64 {
        match self.unit {
            Some(unit) => self.magnitude * unit.multiplier(),
            None => self.magnitude,
        }
    }
}

/// Value waiting to be scaled: either already numeric, still textual, or a
/// sentinel that must pass through formatting unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Unknown,
}

impl From<LineItemValue> for RawValue {
    fn from(value: LineItemValue) -> Self {
        match value {
            LineItemValue::Amount(v) => RawValue::Number(v),
            LineItemValue::Unknown => RawValue::Unknown,
        }
    }
}

pub fn detect_unit_suffix(raw: &str) -> Option<UnitSuffix> {
    let caps = UNIT_SUFFIX.captures(raw)?;
    let word = caps.get(1)?.as_str().to_lowercase();
    match word.as_str() {
        "thousand" | "thousands" | "k" => Some(UnitSuffix::Thousand),
        "million" | "millions" | "mm" | "m" => Some(UnitSuffix::Million),
        "billion" | "billions" | "bn" | "b" => Some(UnitSuffix::Billion),
        _ => None,
    }
}

/// Parses a captured numeral such as `"(1,234.5)"`, `"$2.1 million"` or
/// `"1.5e9"`.
///
/// Parentheses mark a negative figure and are checked before any character is
/// stripped. An inline unit is reported separately so callers can decide
/// whether the document scale still applies. Letters other than the unit
/// word or an exponent make the whole value unparseable.
pub fn parse_amount(raw: &str) -> Result<ParsedAmount> {
    let trimmed = raw.trim();
    let is_negative = trimmed.contains('(') && trimmed.contains(')');
    let unit = detect_unit_suffix(trimmed);

    let without_unit = match UNIT_SUFFIX.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(word) => format!("{}{}", &trimmed[..word.start()], &trimmed[word.end()..]),
        None => trimmed.to_string(),
    };

    let cleaned: String = without_unit
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '$' | '€' | '£' | '¥' | '(' | ')'))
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();
    let cleaned = cleaned.trim_end_matches('.');

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(ExtractionError::NormalizationFailure(raw.to_string()));
    }

    let magnitude: f64 = cleaned
        .parse()
        .map_err(|_| ExtractionError::NormalizationFailure(raw.to_string()))?;
    if !magnitude.is_finite() {
        return Err(ExtractionError::NormalizationFailure(raw.to_string()));
    }

    let magnitude = if is_negative {
        -magnitude.abs()
    } else {
        magnitude
    };

    Ok(ParsedAmount { magnitude, unit })
}

/// Converts a textual number into a signed value with any inline unit applied.
pub fn normalize_number(raw: &str) -> Result<f64> {
    parse_amount(raw).map(|parsed| parsed.value())
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Applies the document scale and rounds to two decimals.
///
/// An inline unit on a textual value replaces the document scale instead of
/// compounding with it. Anything unparseable becomes `Unknown`.
pub fn format_value(raw: &RawValue, scale: Scale) -> LineItemValue {
    match raw {
        RawValue::Unknown => LineItemValue::Unknown,
        RawValue::Number(v) => LineItemValue::rounded(v * scale.factor()),
        RawValue::Text(text) => {
            if text.trim().eq_ignore_ascii_case("unknown") {
                return LineItemValue::Unknown;
            }
            match parse_amount(text) {
                Ok(ParsedAmount {
                    magnitude,
                    unit: Some(unit),
                }) => LineItemValue::rounded(magnitude * unit.multiplier()),
                Ok(parsed) => LineItemValue::rounded(parsed.magnitude * scale.factor()),
                Err(e) => {
                    debug!("Formatting fell back to Unknown: {}", e);
                    LineItemValue::Unknown
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_parenthesized_negative() {
        assert_eq!(normalize_number("(123.45)").unwrap(), -123.45);
        assert_eq!(normalize_number("$(1,000)").unwrap(), -1000.0);
    }

    #[test]
    fn test_normalize_thousands_separators() {
        assert_eq!(normalize_number("1,234").unwrap(), 1234.0);
        assert_eq!(normalize_number("$ 12,345,678.90").unwrap(), 12_345_678.9);
        assert_eq!(normalize_number("-42").unwrap(), -42.0);
    }

    #[test]
    fn test_normalize_rejects_digitless_input() {
        assert!(normalize_number("").is_err());
        assert!(normalize_number("   ").is_err());
        assert!(normalize_number("n/a").is_err());
        assert!(matches!(
            normalize_number("$,"),
            Err(ExtractionError::NormalizationFailure(_))
        ));
    }

    #[test]
    fn test_normalize_inline_units() {
        assert_eq!(normalize_number("$1.5 million").unwrap(), 1_500_000.0);
        assert_eq!(normalize_number("2 billion").unwrap(), 2_000_000_000.0);
        assert_eq!(normalize_number("12k").unwrap(), 12_000.0);
        assert_eq!(normalize_number("(3.2m)").unwrap(), -3_200_000.0);
        assert_eq!(detect_unit_suffix("1,200"), None);
    }

    #[test]
    fn test_normalize_exponent_and_unicode_minus() {
        assert_eq!(normalize_number("1.5e9").unwrap(), 1_500_000_000.0);
        assert_eq!(normalize_number("\u{2212}42").unwrap(), -42.0);
        assert_eq!(normalize_number("\u{2212}1,250.5").unwrap(), -1250.5);
    }

    #[test]
    fn test_normalize_rejects_stray_letters() {
        assert!(normalize_number("12abc").is_err());
        assert!(normalize_number("1.2.3").is_err());
        assert!(normalize_number("FY2023").is_err());
        assert!(matches!(
            normalize_number("approx. 40"),
            Err(ExtractionError::NormalizationFailure(_))
        ));
        assert_eq!(
            format_value(&RawValue::Text("1.5e9".to_string()), Scale::Units),
            LineItemValue::Amount(1_500_000_000.0)
        );
    }

    #[test]
    fn test_normalize_trailing_sentence_period() {
        assert_eq!(normalize_number("1,234.56.").unwrap(), 1234.56);
    }

    #[test]
    fn test_format_applies_scale() {
        assert_eq!(
            format_value(&RawValue::Number(50.0), Scale::Millions),
            LineItemValue::Amount(50_000_000.0)
        );
        assert_eq!(
            format_value(&RawValue::Number(1.234567), Scale::Units),
            LineItemValue::Amount(1.23)
        );
    }

    #[test]
    fn test_format_inline_unit_overrides_scale() {
        let raw = RawValue::Text("1.5 billion".to_string());
        assert_eq!(
            format_value(&raw, Scale::Millions),
            LineItemValue::Amount(1_500_000_000.0)
        );

        let plain = RawValue::Text("1,500".to_string());
        assert_eq!(
            format_value(&plain, Scale::Thousands),
            LineItemValue::Amount(1_500_000.0)
        );
    }

    #[test]
    fn test_format_unknown_and_garbage() {
        assert_eq!(format_value(&RawValue::Unknown, Scale::Billions), LineItemValue::Unknown);
        assert_eq!(
            format_value(&RawValue::Text("Unknown".to_string()), Scale::Units),
            LineItemValue::Unknown
        );
        assert_eq!(
            format_value(&RawValue::Text("not reported".to_string()), Scale::Units),
            LineItemValue::Unknown
        );
        assert_eq!(
            format_value(&RawValue::Number(f64::MAX), Scale::Billions),
            LineItemValue::Unknown
        );
    }

    #[test]
    fn test_format_reapplying_unit_scale_is_idempotent() {
        let samples = [0.0, 1.0, -17.5, 123.456, 9_876.5, -0.005, 3.0e5];
        let scales = [Scale::Units, Scale::Thousands, Scale::Millions, Scale::Billions];

        for &x in &samples {
            for &scale in &scales {
                let once = format_value(&RawValue::Number(x), scale);
                let twice = format_value(&RawValue::from(once), Scale::Units);
                assert_eq!(once, twice, "x={} scale={}", x, scale);
            }
        }
    }
}
