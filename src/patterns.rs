use crate::schema::LineItem;
use crate::utils::normalize_number;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

const PLAIN_AMOUNT: &str = r"\$?\s*([\d,]+(?:\.\d+)?)";
const PARENTHESIZED_AMOUNT: &str = r"\$?\s*\(\s*([\d,]+(?:\.\d+)?)\s*\)";

/// Label patterns per line item, most specific first. Each label is completed
/// with an amount pattern, once in plain form and once in parenthesized form.
const LABELS: &[(&str, &[&str])] = &[
    (
        "Revenue",
        &[
            r"(?:Total\s+)?Revenues?[:\s]+",
            r"(?:Total\s+)?Sales[:\s]+",
            r"Revenues?[:\s]*",
            r"Total\s+operating\s+revenues?[:\s]+",
            r"(?:Total\s+)?Net\s+Sales[:\s]+",
            r"Net\s+Revenue[:\s]+",
            r"Net\s+Operating\s+Revenue[:\s]+",
        ],
    ),
    (
        "Cost_of_Revenue",
        &[
            r"Cost\s+of\s+(?:Revenues?|Sales)[:\s]+",
            r"Cost\s+of\s+goods\s+sold[:\s]+",
            r"\bCOGS[:\s]+",
            r"Cost\s+of\s+products\s+sold[:\s]+",
            r"Direct\s+costs?[:\s]+",
        ],
    ),
    (
        "Gross_Profit",
        &[
            r"Gross\s+Profit[:\s]+",
            r"Gross\s+Margin[:\s]+",
            r"Gross\s+Income[:\s]+",
        ],
    ),
    (
        "Operating_Expenses",
        &[
            r"(?:Total\s+)?Operating\s+Expenses[:\s]+",
            r"(?:Total\s+)?\bOpEx[:\s]+",
            r"(?:Total\s+)?Operating\s+Costs(?:\s+and\s+Expenses)?[:\s]+",
            r"Selling,\s+General\s+and\s+Administrative\s+Expenses[:\s]+",
            r"\bSG&A\s+Expenses[:\s]+",
        ],
    ),
    (
        "Operating_Income",
        &[
            r"Operating\s+(?:Income|Profit)[:\s]+",
            r"Income\s+from\s+Operations[:\s]+",
            r"Operating\s+Earnings[:\s]+",
            r"\bEBIT[:\s]+",
        ],
    ),
    (
        "Net_Income",
        &[
            r"Net\s+(?:Income|Profit|Earnings)[:\s]+",
            r"Profit\s+for\s+the\s+(?:year|period)[:\s]+",
            r"Profit\s+after\s+tax[:\s]+",
            r"Bottom\s+Line[:\s]+",
        ],
    ),
    (
        "Research_Development",
        &[
            r"Research\s+(?:and|&)?\s*Development[:\s]+",
            r"\bR\s*(?:&|and)\s*D[:\s]+",
        ],
    ),
    (
        "Sales_Marketing",
        &[
            r"Sales\s+(?:and|&)?\s*Marketing[:\s]+",
            r"Marketing\s+(?:and|&)?\s*Sales[:\s]+",
        ],
    ),
    (
        "General_Administrative",
        &[
            r"General\s+(?:and|&)?\s*Administrative[:\s]+",
            r"\bG\s*(?:&|and)\s*A[:\s]+",
        ],
    ),
];

struct FieldPatterns {
    item: LineItem,
    plain: Vec<Regex>,
    parenthesized: Vec<Regex>,
}

static FIELD_PATTERNS: Lazy<Vec<FieldPatterns>> = Lazy::new(|| {
    LABELS
        .iter()
        .map(|(name, labels)| {
            let build = |amount: &str| -> Vec<Regex> {
                labels
                    .iter()
                    .map(|label| {
                        Regex::new(&format!("(?i){}{}", label, amount))
                            .expect("line item pattern is valid")
                    })
                    .collect()
            };
            FieldPatterns {
                item: LineItem::from_label(name),
                plain: build(PLAIN_AMOUNT),
                parenthesized: build(PARENTHESIZED_AMOUNT),
            }
        })
        .collect()
});

/// Literal values recovered from the text, keyed by line item. Items with no
/// match are absent rather than `Unknown`.
pub type PatternMatches = BTreeMap<LineItem, f64>;

#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Runs every field's patterns against cleaned text. The first pattern
    /// whose capture normalizes wins; parenthesized figures are only tried
    /// when no plain figure matched and are returned negated.
    pub fn extract(&self, text: &str) -> PatternMatches {
        let mut results = PatternMatches::new();

        for field in FIELD_PATTERNS.iter() {
            let found = first_value(&field.plain, text)
                .or_else(|| first_value(&field.parenthesized, text).map(|v| -v.abs()));

            if let Some(value) = found {
                debug!("Found {}: {}", field.item, value);
                results.insert(field.item.clone(), value);
            }
        }

        info!("Pattern extraction matched {} line items", results.len());
        results
    }
}

fn first_value(patterns: &[Regex], text: &str) -> Option<f64> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            if follows_cost_of(&text[..whole.start()]) {
                return None;
            }
            match normalize_number(caps.get(1)?.as_str()) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Skipping pattern {}: {}", re.as_str(), e);
                    None
                }
            }
        })
    })
}

/// True when `preceding` ends with the words "cost of", so a label such as
/// "Revenue" or "Sales" is really part of a cost line.
fn follows_cost_of(preceding: &str) -> bool {
    let mut words = preceding.split_whitespace().rev();
    matches!(
        (words.next(), words.next()),
        (Some(of), Some(cost)) if of.eq_ignore_ascii_case("of") && cost.eq_ignore_ascii_case("cost")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::clean_text;

    fn extract(text: &str) -> PatternMatches {
        PatternExtractor::new().extract(&clean_text(text))
    }

    #[test]
    fn test_basic_statement() {
        let results = extract(
            "Total Revenue: $1,000\nCost of Revenue: $600\nGross Profit: $400\n\
             Operating Expenses: $250\nOperating Income: $150\nNet Income: $100",
        );

        assert_eq!(results.get(&LineItem::Revenue), Some(&1000.0));
        assert_eq!(results.get(&LineItem::CostOfRevenue), Some(&600.0));
        assert_eq!(results.get(&LineItem::GrossProfit), Some(&400.0));
        assert_eq!(results.get(&LineItem::OperatingExpenses), Some(&250.0));
        assert_eq!(results.get(&LineItem::OperatingIncome), Some(&150.0));
        assert_eq!(results.get(&LineItem::NetIncome), Some(&100.0));
    }

    #[test]
    fn test_pattern_order_prefers_first_alternative() {
        let results = extract("Net Sales: 900 Total Revenue: 1,000");
        assert_eq!(results.get(&LineItem::Revenue), Some(&1000.0));
    }

    #[test]
    fn test_alternative_labels() {
        let results = extract("Cost of goods sold: 300 Income from operations: 120 Profit for the year: 80");
        assert_eq!(results.get(&LineItem::CostOfRevenue), Some(&300.0));
        assert_eq!(results.get(&LineItem::OperatingIncome), Some(&120.0));
        assert_eq!(results.get(&LineItem::NetIncome), Some(&80.0));
    }

    #[test]
    fn test_parenthesized_negative() {
        let results = extract("Net Income: (1,250.50)");
        assert_eq!(results.get(&LineItem::NetIncome), Some(&-1250.5));
    }

    #[test]
    fn test_plain_form_wins_over_parenthesized() {
        let results = extract("Operating Income: (20) ... Operating Income: 35");
        assert_eq!(results.get(&LineItem::OperatingIncome), Some(&35.0));
    }

    #[test]
    fn test_missing_items_are_absent() {
        let results = extract("Revenue: 100");
        assert_eq!(results.len(), 1);
        assert!(!results.contains_key(&LineItem::NetIncome));
    }

    #[test]
    fn test_extra_metrics_pass_through() {
        let results = extract("Research and Development: 40 General and Administrative: 15");
        assert_eq!(
            results.get(&LineItem::Other("Research_Development".to_string())),
            Some(&40.0)
        );
        assert_eq!(
            results.get(&LineItem::Other("General_Administrative".to_string())),
            Some(&15.0)
        );
    }

    #[test]
    fn test_gross_profit_is_not_taken_as_net_income() {
        let results = extract("Gross Profit: 900 Revenue: 500");
        assert_eq!(results.get(&LineItem::GrossProfit), Some(&900.0));
        assert_eq!(results.get(&LineItem::Revenue), Some(&500.0));
        assert!(!results.contains_key(&LineItem::NetIncome));
    }

    #[test]
    fn test_cost_lines_are_not_taken_as_revenue() {
        let results = extract("Net sales: 1,000\nCost of revenue: 600\nGross Profit: 400");
        assert_eq!(results.get(&LineItem::Revenue), Some(&1000.0));
        assert_eq!(results.get(&LineItem::CostOfRevenue), Some(&600.0));

        let results = extract("Cost of Revenue: 600\nGross Profit: 400");
        assert!(!results.contains_key(&LineItem::Revenue));
        assert_eq!(results.get(&LineItem::CostOfRevenue), Some(&600.0));

        let results = extract("Cost of Sales: 300\nNet Income: 20");
        assert!(!results.contains_key(&LineItem::Revenue));
        assert_eq!(results.get(&LineItem::CostOfRevenue), Some(&300.0));
    }

    #[test]
    fn test_revenue_after_cost_line_still_matches() {
        let results = extract("Cost of Revenue: 600\nRevenue: 1,000");
        assert_eq!(results.get(&LineItem::Revenue), Some(&1000.0));
        assert_eq!(results.get(&LineItem::CostOfRevenue), Some(&600.0));
    }

    #[test]
    fn test_garbage_text_yields_nothing() {
        assert!(extract("lorem ipsum dolor sit amet").is_empty());
        assert!(extract("").is_empty());
    }
}
