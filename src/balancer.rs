use crate::config::ValidationConfig;
use crate::schema::{IncomeStatement, LineItem, LineItemValue, Provenance};
use log::{debug, warn};
use std::fmt;

/// Upper bound on top-down repair passes before falling back to clamping.
const MAX_REPAIR_PASSES: usize = 4;

/// One value changed by the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub item: LineItem,
    pub before: f64,
    pub after: f64,
    pub reason: String,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Adjusted {} from {} to {}: {}",
            self.item, self.before, self.after, self.reason
        )
    }
}

/// An expected `lower <= upper` relation between two line items.
struct Ordering {
    upper: LineItem,
    lower: LineItem,
    /// Item `c` such that `lower = upper - c` when it is known.
    bridge: Option<LineItem>,
    /// Multiplier used to rebuild `upper` from `lower` when no bridge exists.
    ratio: f64,
}

fn orderings() -> [Ordering; 3] {
    [
        Ordering {
            upper: LineItem::Revenue,
            lower: LineItem::GrossProfit,
            bridge: Some(LineItem::CostOfRevenue),
            ratio: 2.0,
        },
        Ordering {
            upper: LineItem::GrossProfit,
            lower: LineItem::OperatingIncome,
            bridge: Some(LineItem::OperatingExpenses),
            ratio: 1.5,
        },
        Ordering {
            upper: LineItem::OperatingIncome,
            lower: LineItem::NetIncome,
            bridge: None,
            ratio: 1.2,
        },
    ]
}

/// Reasonableness checks over a formatted record.
///
/// Values are only ever adjusted in place: nothing is removed and nothing
/// becomes `Unknown`.
pub struct AccountingValidator<'a> {
    config: &'a ValidationConfig,
}

impl<'a> AccountingValidator<'a> {
    pub fn new(config: &'a ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, statement: &mut IncomeStatement) -> Vec<Adjustment> {
        let mut adjustments = self.clamp_magnitudes(statement);
        adjustments.extend(self.enforce_ordering(statement));

        for adjustment in &adjustments {
            warn!("{}", adjustment);
        }
        adjustments
    }

    /// Divides any magnitude above the limit by the configured divisor. This
    /// assumes the figure was scaled one step too far, which is a guess.
    pub fn clamp_magnitudes(&self, statement: &mut IncomeStatement) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();

        for (item, entry) in statement.iter_mut() {
            let Some(value) = entry.value.amount() else {
                continue;
            };
            if value.abs() <= self.config.magnitude_limit {
                continue;
            }

            let scaled = LineItemValue::rounded(value / self.config.magnitude_divisor);
            entry.value = scaled;
            entry.provenance = Provenance::Repaired;
            adjustments.push(Adjustment {
                item: item.clone(),
                before: value,
                after: scaled.amount().unwrap_or_default(),
                reason: format!(
                    "magnitude exceeds {:e}, treated as a scale detection error",
                    self.config.magnitude_limit
                ),
            });
        }

        adjustments
    }

    /// Enforces Gross Profit <= Revenue, Operating Income <= Gross Profit and
    /// Net Income <= Operating Income wherever both sides are known and
    /// positive.
    pub fn enforce_ordering(&self, statement: &mut IncomeStatement) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();
        let orderings = orderings();

        for pass in 0..MAX_REPAIR_PASSES {
            let mut changed = false;
            for ordering in &orderings {
                if let Some(adjustment) = self.repair(statement, ordering) {
                    adjustments.push(adjustment);
                    changed = true;
                }
            }
            if !changed {
                debug!("Ordering checks settled after {} passes", pass + 1);
                return adjustments;
            }
        }

        // Bridge repairs lower one side while ratio repairs raise the other, so
        // they can chase each other. Clamping top-down always converges.
        for ordering in &orderings {
            if let Some(adjustment) = clamp_lower(statement, ordering) {
                adjustments.push(adjustment);
            }
        }
        adjustments
    }

    fn repair(&self, statement: &mut IncomeStatement, ordering: &Ordering) -> Option<Adjustment> {
        let (upper, lower) = violation(statement, ordering)?;

        let bridge = ordering
            .bridge
            .as_ref()
            .and_then(|item| statement.amount(item))
            .filter(|cost| *cost >= 0.0);

        if let Some(cost) = bridge {
            let after = upper - cost;
            statement.set_amount(ordering.lower.clone(), after, Provenance::Repaired);
            return Some(Adjustment {
                item: ordering.lower.clone(),
                before: lower,
                after: statement.amount(&ordering.lower).unwrap_or(after),
                reason: format!(
                    "{} exceeded {}; recomputed from {}",
                    ordering.lower,
                    ordering.upper,
                    ordering.bridge.as_ref().map(LineItem::as_str).unwrap_or_default()
                ),
            });
        }

        if self.config.ratio_repairs {
            let after = lower * ordering.ratio;
            statement.set_amount(ordering.upper.clone(), after, Provenance::Repaired);
            return Some(Adjustment {
                item: ordering.upper.clone(),
                before: upper,
                after: statement.amount(&ordering.upper).unwrap_or(after),
                reason: format!(
                    "{} exceeded {}; rescaled {} to {}x",
                    ordering.lower, ordering.upper, ordering.upper, ordering.ratio
                ),
            });
        }

        clamp_lower(statement, ordering)
    }
}

fn violation(statement: &IncomeStatement, ordering: &Ordering) -> Option<(f64, f64)> {
    let upper = statement.amount(&ordering.upper)?;
    let lower = statement.amount(&ordering.lower)?;
    (upper > 0.0 && lower > 0.0 && lower > upper).then_some((upper, lower))
}

fn clamp_lower(statement: &mut IncomeStatement, ordering: &Ordering) -> Option<Adjustment> {
    let (upper, lower) = violation(statement, ordering)?;
    statement.set_amount(ordering.lower.clone(), upper, Provenance::Repaired);
    Some(Adjustment {
        item: ordering.lower.clone(),
        before: lower,
        after: upper,
        reason: format!("{} clamped to {}", ordering.lower, ordering.upper),
    })
}
