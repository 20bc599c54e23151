//! Lenient readers for free-form model answers.
//!
//! Models asked for JSON still wrap it in code fences, surround it with prose
//! or fall back to `key: value` lines. Each shape gets its own
//! [`ResponseParser`]; [`parse_response`] tries them in order and keeps the
//! first non-empty result.

use crate::utils::RawValue;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern is valid")
});

static EMBEDDED_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)(\{[^{]*?"[^"]*?".*?\})"#).expect("embedded object pattern is valid")
});

/// Fields as the model labelled them, before key normalization.
pub type ParsedFields = BTreeMap<String, RawValue>;

pub trait ResponseParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when this strategy does not apply or finds nothing.
    fn parse(&self, response: &str) -> Option<ParsedFields>;
}

/// First fenced code block, parsed as a JSON object.
#[derive(Debug, Default, Clone, Copy)]
pub struct FencedBlockParser;

impl ResponseParser for FencedBlockParser {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn parse(&self, response: &str) -> Option<ParsedFields> {
        let block = FENCED_BLOCK.captures(response)?.get(1)?.as_str();
        parse_json_object(block)
    }
}

/// First brace-delimited object holding at least one quoted key.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedObjectParser;

impl ResponseParser for EmbeddedObjectParser {
    fn name(&self) -> &'static str {
        "embedded_object"
    }

    fn parse(&self, response: &str) -> Option<ParsedFields> {
        let object = EMBEDDED_OBJECT.captures(response)?.get(1)?.as_str();
        parse_json_object(object)
    }
}

/// Line-by-line `key: value` pairs. Values that are not plain numbers become
/// `Unknown`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueLineParser;

impl ResponseParser for KeyValueLineParser {
    fn name(&self) -> &'static str {
        "key_value_lines"
    }

    fn parse(&self, response: &str) -> Option<ParsedFields> {
        let quotes: &[char] = &['"', '\''];
        let mut fields = ParsedFields::new();

        for line in response.trim().lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().trim_matches(quotes).replace(' ', "_");
            if key.is_empty() {
                continue;
            }

            let value = value.trim().trim_matches(',').trim_matches(quotes);
            let parsed = if value.is_empty() || value == "Unknown" {
                RawValue::Unknown
            } else {
                match value.replace(',', "").trim().parse::<f64>() {
                    Ok(number) if number.is_finite() => RawValue::Number(number),
                    _ => RawValue::Unknown,
                }
            };
            fields.insert(key, parsed);
        }

        non_empty(fields)
    }
}

pub fn default_parsers() -> Vec<Box<dyn ResponseParser>> {
    vec![
        Box::new(FencedBlockParser),
        Box::new(EmbeddedObjectParser),
        Box::new(KeyValueLineParser),
    ]
}

/// Runs `parsers` in order. Returns the winning parser's name with its
/// fields, or `None` if every strategy came up empty.
pub fn parse_response(
    response: &str,
    parsers: &[Box<dyn ResponseParser>],
) -> Option<(&'static str, ParsedFields)> {
    for parser in parsers {
        match parser.parse(response) {
            Some(fields) => {
                debug!("Parsed {} fields with {}", fields.len(), parser.name());
                return Some((parser.name(), fields));
            }
            None => debug!("Parser {} found nothing", parser.name()),
        }
    }
    None
}

fn parse_json_object(raw: &str) -> Option<ParsedFields> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("Candidate JSON rejected: {}", e);
            return None;
        }
    };

    let Value::Object(map) = value else {
        return None;
    };

    let fields = map
        .into_iter()
        .map(|(key, value)| (key, json_to_raw(value)))
        .collect();
    non_empty(fields)
}

fn json_to_raw(value: Value) -> RawValue {
    match value {
        Value::Number(n) => n.as_f64().map_or(RawValue::Unknown, RawValue::Number),
        Value::String(s) if s.trim().eq_ignore_ascii_case("unknown") || s.trim().is_empty() => {
            RawValue::Unknown
        }
        Value::String(s) => RawValue::Text(s),
        _ => RawValue::Unknown,
    }
}

fn non_empty(fields: ParsedFields) -> Option<ParsedFields> {
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(response: &str) -> Option<(&'static str, ParsedFields)> {
        parse_response(response, &default_parsers())
    }

    #[test]
    fn test_fenced_block_wins() {
        let response = "Here you go:\n```json\n{\"Revenue\": 100, \"Net_Income\": \"Unknown\"}\n```\n{\"Revenue\": 5}";
        let (parser, fields) = parse(response).unwrap();

        assert_eq!(parser, "fenced_block");
        assert_eq!(fields["Revenue"], RawValue::Number(100.0));
        assert_eq!(fields["Net_Income"], RawValue::Unknown);
    }

    #[test]
    fn test_embedded_object_in_prose() {
        let response = "Sure! The figures are {\"Revenue\": 250.5, \"Gross_Profit\": \"$1.2 million\"} as requested.";
        let (parser, fields) = parse(response).unwrap();

        assert_eq!(parser, "embedded_object");
        assert_eq!(fields["Revenue"], RawValue::Number(250.5));
        assert_eq!(fields["Gross_Profit"], RawValue::Text("$1.2 million".to_string()));
    }

    #[test]
    fn test_malformed_fence_falls_through() {
        let response = "```json\n{Revenue: 100}\n```\nRevenue: 100\nNet Income: 20";
        let (parser, fields) = parse(response).unwrap();

        assert_eq!(parser, "key_value_lines");
        assert_eq!(fields["Revenue"], RawValue::Number(100.0));
        assert_eq!(fields["Net_Income"], RawValue::Number(20.0));
    }

    #[test]
    fn test_key_value_lines_coercion() {
        let fields = KeyValueLineParser
            .parse("\"Revenue\": \"1,500\",\nCost_of_Revenue: n/a\nGross_Profit: Unknown\nOperating_Income:")
            .unwrap();

        assert_eq!(fields["Revenue"], RawValue::Number(1500.0));
        assert_eq!(fields["Cost_of_Revenue"], RawValue::Unknown);
        assert_eq!(fields["Gross_Profit"], RawValue::Unknown);
        assert_eq!(fields["Operating_Income"], RawValue::Unknown);
    }

    #[test]
    fn test_unparsable_response_is_none() {
        assert!(parse("I could not find an income statement.").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_empty_object_falls_through() {
        assert!(FencedBlockParser.parse("```json\n{}\n```").is_none());
    }
}
