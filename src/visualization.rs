use crate::schema::{IncomeStatement, LineItem};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chart-ready projection of a finished income statement. Unknown values are
/// collapsed to zero throughout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisualizationPayload {
    #[schemars(description = "Every line item as a plain number, Unknown mapped to 0")]
    pub raw_data: BTreeMap<String, f64>,
    pub time_series: TimeSeries,
    #[schemars(description = "Signed steps from Revenue down to Net Income")]
    pub waterfall: Vec<WaterfallStep>,
    pub metrics: SummaryMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeSeries {
    #[schemars(
        description = "Revenue, Cost of Revenue, Gross Profit, Operating Income and Net Income, in that order"
    )]
    pub values: Vec<f64>,
    pub percentages: Margins,
}

/// Margins as percentages of Revenue; all zero when Revenue is zero or unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Margins {
    pub gross_margin: f64,
    pub operating_margin: f64,
    pub net_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WaterfallStep {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryMetrics {
    pub total_revenue: f64,
    #[schemars(description = "Cost of Revenue plus Operating Expenses")]
    pub total_costs: f64,
    pub final_profit: f64,
    pub margins: Margins,
}

pub fn build_visualization(statement: &IncomeStatement) -> VisualizationPayload {
    let raw_data: BTreeMap<String, f64> = statement
        .iter()
        .map(|(item, entry)| (item.to_string(), finite_or_zero(entry.value.amount())))
        .collect();

    let value = |item: LineItem| finite_or_zero(statement.amount(&item));
    let revenue = value(LineItem::Revenue);
    let cost_of_revenue = value(LineItem::CostOfRevenue);
    let gross_profit = value(LineItem::GrossProfit);
    let operating_expenses = value(LineItem::OperatingExpenses);
    let operating_income = value(LineItem::OperatingIncome);
    let net_income = value(LineItem::NetIncome);

    let margins = Margins {
        gross_margin: percent_of(gross_profit, revenue),
        operating_margin: percent_of(operating_income, revenue),
        net_margin: percent_of(net_income, revenue),
    };

    let waterfall = [
        ("Revenue", revenue),
        ("Cost of Revenue", -cost_of_revenue),
        ("Gross Profit", gross_profit),
        ("Operating Expenses", -operating_expenses),
        ("Operating Income", operating_income),
        ("Net Income", net_income),
    ]
    .into_iter()
    .map(|(name, value)| WaterfallStep {
        name: name.to_string(),
        value,
    })
    .collect();

    VisualizationPayload {
        raw_data,
        time_series: TimeSeries {
            values: vec![
                revenue,
                cost_of_revenue,
                gross_profit,
                operating_income,
                net_income,
            ],
            percentages: margins,
        },
        waterfall,
        metrics: SummaryMetrics {
            total_revenue: revenue,
            total_costs: cost_of_revenue + operating_expenses,
            final_profit: net_income,
            margins,
        },
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let pct = part / whole * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}
