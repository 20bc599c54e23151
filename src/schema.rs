use crate::visualization::VisualizationPayload;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a single income statement figure.
///
/// The six canonical items are always present in a finished report. Any other
/// label found in the document or returned by the model is carried through
/// untouched as [`LineItem::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LineItem {
    Revenue,
    CostOfRevenue,
    GrossProfit,
    OperatingExpenses,
    OperatingIncome,
    NetIncome,
    Other(String),
}

impl LineItem {
    pub const CANONICAL: [LineItem; 6] = [
        LineItem::Revenue,
        LineItem::CostOfRevenue,
        LineItem::GrossProfit,
        LineItem::OperatingExpenses,
        LineItem::OperatingIncome,
        LineItem::NetIncome,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            LineItem::Revenue => "Revenue",
            LineItem::CostOfRevenue => "Cost_of_Revenue",
            LineItem::GrossProfit => "Gross_Profit",
            LineItem::OperatingExpenses => "Operating_Expenses",
            LineItem::OperatingIncome => "Operating_Income",
            LineItem::NetIncome => "Net_Income",
            LineItem::Other(name) => name,
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, LineItem::Other(_))
    }

    /// Maps a free-form label (e.g. `"net_income"`, `"Cost of Sales"`) onto a
    /// canonical item. Unrecognized labels are kept verbatim.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        let key: String = trimmed
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match key.as_str() {
            "revenue" | "revenues" | "total_revenue" | "total_revenues" | "net_revenue"
            | "net_sales" | "sales" => LineItem::Revenue,
            "cost_of_revenue" | "cost_of_revenues" | "cost_of_sales" | "cost_of_goods_sold"
            | "cogs" => LineItem::CostOfRevenue,
            "gross_profit" | "gross_income" => LineItem::GrossProfit,
            "operating_expenses" | "total_operating_expenses" | "opex" => {
                LineItem::OperatingExpenses
            }
            "operating_income" | "operating_profit" | "income_from_operations" | "ebit" => {
                LineItem::OperatingIncome
            }
            "net_income" | "net_profit" | "net_earnings" => LineItem::NetIncome,
            _ => LineItem::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished line item value: a signed amount rounded to at most two
/// decimals, or the `Unknown` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LineItemValue {
    Amount(f64),
    #[default]
    Unknown,
}

impl LineItemValue {
    /// Rounds to two decimals. Non-finite input collapses to `Unknown`.
    pub fn rounded(value: f64) -> Self {
        if value.is_finite() {
            LineItemValue::Amount(crate::utils::round_to_cents(value))
        } else {
            LineItemValue::Unknown
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            LineItemValue::Amount(v) => Some(*v),
            LineItemValue::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, LineItemValue::Amount(_))
    }
}

impl fmt::Display for LineItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineItemValue::Amount(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
                write!(f, "{}", *v as i64)
            }
            LineItemValue::Amount(v) => write!(f, "{}", v),
            LineItemValue::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for LineItemValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            LineItemValue::Amount(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
                serializer.serialize_i64(*v as i64)
            }
            LineItemValue::Amount(v) => serializer.serialize_f64(*v),
            LineItemValue::Unknown => serializer.serialize_str("Unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for LineItemValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(serde::de::IgnoredAny),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(v) => LineItemValue::rounded(v),
            Repr::Text(_) => LineItemValue::Unknown,
        })
    }
}

impl JsonSchema for LineItemValue {
    fn schema_name() -> String {
        "LineItemValue".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let schema = serde_json::json!({
            "description": "Amount in absolute currency units, or the literal string \"Unknown\"",
            "anyOf": [
                { "type": "number" },
                { "type": "string", "enum": ["Unknown"] }
            ]
        });
        serde_json::from_value(schema).unwrap_or(Schema::Bool(true))
    }
}

/// Document-wide multiplier converting stated units to absolute currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    #[default]
    Units,
    Thousands,
    Millions,
    Billions,
}

impl Scale {
    pub fn factor(&self) -> f64 {
        self.as_u64() as f64
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            Scale::Units => 1,
            Scale::Thousands => 1_000,
            Scale::Millions => 1_000_000,
            Scale::Billions => 1_000_000_000,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scale::Units => "units",
            Scale::Thousands => "thousands",
            Scale::Millions => "millions",
            Scale::Billions => "billions",
        };
        f.write_str(name)
    }
}

/// Where a value in the record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[schemars(description = "Matched literally in the document text")]
    Extracted,
    #[schemars(description = "Returned by the model fallback")]
    Model,
    #[schemars(description = "Adjusted by a reasonableness repair")]
    Repaired,
    #[schemars(description = "Computed from other items via an accounting identity")]
    Derived,
    #[schemars(description = "Low-confidence estimate from typical industry ratios")]
    Estimated,
    #[schemars(description = "Not recoverable")]
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    High,
    Medium,
    Low,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineItemEntry {
    pub value: LineItemValue,
    pub provenance: Provenance,
}

/// Request-scoped income statement record, mutated in place by the
/// formatting, validation and inference stages.
#[derive(Debug, Clone, Default)]
pub struct IncomeStatement {
    items: BTreeMap<LineItem, LineItemEntry>,
    scale: Scale,
}

impl IncomeStatement {
    pub fn new(scale: Scale) -> Self {
        Self {
            items: BTreeMap::new(),
            scale,
        }
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn get(&self, item: &LineItem) -> LineItemValue {
        self.items
            .get(item)
            .map(|entry| entry.value)
            .unwrap_or(LineItemValue::Unknown)
    }

    pub fn amount(&self, item: &LineItem) -> Option<f64> {
        self.get(item).amount()
    }

    pub fn provenance(&self, item: &LineItem) -> Option<Provenance> {
        self.items.get(item).map(|entry| entry.provenance)
    }

    pub fn contains(&self, item: &LineItem) -> bool {
        self.items.contains_key(item)
    }

    pub fn set(&mut self, item: LineItem, value: LineItemValue, provenance: Provenance) {
        self.items.insert(item, LineItemEntry { value, provenance });
    }

    pub fn set_amount(&mut self, item: LineItem, value: f64, provenance: Provenance) {
        self.set(item, LineItemValue::rounded(value), provenance);
    }

    /// Number of canonical items holding a numeric value.
    pub fn known_count(&self) -> usize {
        LineItem::CANONICAL
            .iter()
            .filter(|item| self.get(item).is_known())
            .count()
    }

    /// Inserts `Unknown` for every canonical item not yet present.
    pub fn ensure_canonical(&mut self) {
        for item in LineItem::CANONICAL {
            self.items.entry(item).or_insert(LineItemEntry {
                value: LineItemValue::Unknown,
                provenance: Provenance::Missing,
            });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LineItem, &LineItemEntry)> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&LineItem, &mut LineItemEntry)> {
        self.items.iter_mut()
    }

    /// Items outside the canonical six.
    pub fn other_metrics(&self) -> impl Iterator<Item = (&LineItem, &LineItemEntry)> {
        self.items.iter().filter(|(item, _)| !item.is_canonical())
    }

    pub fn quality(&self, insufficient_threshold: usize) -> DataQuality {
        let known = self.known_count();
        let any_estimated = self
            .items
            .values()
            .any(|entry| entry.provenance == Provenance::Estimated);

        if known == LineItem::CANONICAL.len() && !any_estimated {
            DataQuality::High
        } else if known >= insufficient_threshold {
            DataQuality::Medium
        } else {
            DataQuality::Low
        }
    }
}

/// Flat output envelope: one key per line item plus the derived payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionReport {
    #[serde(flatten)]
    pub line_items: BTreeMap<String, LineItemValue>,

    #[schemars(description = "Document scale applied during formatting: 1, 1000, 1000000 or 1000000000")]
    pub scale_factor: u64,

    pub data_quality: DataQuality,

    #[serde(default)]
    #[schemars(description = "How each line item was obtained")]
    pub provenance: BTreeMap<String, Provenance>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[schemars(description = "Chart-ready projection of the record; null only when extraction failed")]
    pub visualization_data: Option<VisualizationPayload>,
}

impl ExtractionReport {
    /// Envelope field names. A line item may never serialize under one of these.
    pub const RESERVED_KEYS: [&'static str; 6] = [
        "scale_factor",
        "data_quality",
        "provenance",
        "warnings",
        "error",
        "visualization_data",
    ];

    pub fn is_reserved_key(name: &str) -> bool {
        Self::RESERVED_KEYS.contains(&name)
    }

    pub fn from_statement(
        statement: &IncomeStatement,
        quality: DataQuality,
        warnings: Vec<String>,
        visualization_data: VisualizationPayload,
    ) -> Self {
        let mut line_items = BTreeMap::new();
        let mut provenance = BTreeMap::new();
        for (item, entry) in statement.iter() {
            if Self::is_reserved_key(item.as_str()) {
                warn!("Dropping line item {} that clashes with an envelope field", item);
                continue;
            }
            line_items.insert(item.to_string(), entry.value);
            provenance.insert(item.to_string(), entry.provenance);
        }

        Self {
            line_items,
            scale_factor: statement.scale().as_u64(),
            data_quality: quality,
            provenance,
            warnings,
            error: None,
            visualization_data: Some(visualization_data),
        }
    }

    /// Envelope returned when the pipeline failed as a whole.
    pub fn failure(message: impl Into<String>) -> Self {
        let line_items = LineItem::CANONICAL
            .iter()
            .map(|item| (item.to_string(), LineItemValue::Unknown))
            .collect();
        let provenance = LineItem::CANONICAL
            .iter()
            .map(|item| (item.to_string(), Provenance::Missing))
            .collect();

        Self {
            line_items,
            scale_factor: Scale::Units.as_u64(),
            data_quality: DataQuality::Error,
            provenance,
            warnings: Vec::new(),
            error: Some(message.into()),
            visualization_data: None,
        }
    }

    pub fn value(&self, key: &str) -> LineItemValue {
        self.line_items
            .get(key)
            .copied()
            .unwrap_or(LineItemValue::Unknown)
    }

    pub fn amount(&self, key: &str) -> Option<f64> {
        self.value(key).amount()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractionReport)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
