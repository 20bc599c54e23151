use crate::config::InferenceConfig;
use crate::schema::{IncomeStatement, LineItem, Provenance};
use log::{debug, info, warn};

/// Items filled in by [`Inferencer::infer`], split by confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOutcome {
    /// Computed from known items through an accounting identity.
    pub derived: Vec<LineItem>,
    /// Guessed from typical industry ratios. Low confidence.
    pub estimated: Vec<LineItem>,
}

pub struct Inferencer<'a> {
    config: &'a InferenceConfig,
}

impl<'a> Inferencer<'a> {
    pub fn new(config: &'a InferenceConfig) -> Self {
        Self { config }
    }

    pub fn infer(&self, statement: &mut IncomeStatement) -> InferenceOutcome {
        let derived = self.apply_identities(statement);
        // Revenue must be the only known item.
        let estimated = if self.config.estimate_ratios
            && statement.known_count() == 1
            && statement.get(&LineItem::Revenue).is_known()
        {
            self.estimate_from_ratios(statement)
        } else {
            Vec::new()
        };

        if !derived.is_empty() {
            info!("Derived {} line items from accounting identities", derived.len());
        }
        if !estimated.is_empty() {
            warn!(
                "Estimated {} line items from typical ratios; treat as low confidence",
                estimated.len()
            );
        }

        InferenceOutcome { derived, estimated }
    }

    /// Fills missing items in a fixed order:
    /// Revenue = Gross Profit + Cost of Revenue,
    /// Gross Profit = Revenue - Cost of Revenue,
    /// Operating Expenses = Gross Profit - Operating Income,
    /// Operating Income = Gross Profit - Operating Expenses.
    pub fn apply_identities(&self, statement: &mut IncomeStatement) -> Vec<LineItem> {
        use LineItem::*;

        let mut derived = Vec::new();
        let rules: [(LineItem, LineItem, LineItem, f64); 4] = [
            (Revenue, GrossProfit, CostOfRevenue, 1.0),
            (GrossProfit, Revenue, CostOfRevenue, -1.0),
            (OperatingExpenses, GrossProfit, OperatingIncome, -1.0),
            (OperatingIncome, GrossProfit, OperatingExpenses, -1.0),
        ];

        for (target, left, right, sign) in rules {
            if statement.get(&target).is_known() {
                continue;
            }
            let (Some(a), Some(b)) = (statement.amount(&left), statement.amount(&right)) else {
                continue;
            };
            let value = a + sign * b;
            debug!("Derived {} = {} from {} and {}", target, value, left, right);
            statement.set_amount(target.clone(), value, Provenance::Derived);
            derived.push(target);
        }

        derived
    }

    /// Sparse-data fallback anchored on Revenue. Every value written here is
    /// tagged [`Provenance::Estimated`].
    pub fn estimate_from_ratios(&self, statement: &mut IncomeStatement) -> Vec<LineItem> {
        let mut estimated = Vec::new();
        let Some(revenue) = statement.amount(&LineItem::Revenue) else {
            return estimated;
        };

        let config = self.config;
        let cost = Some(revenue * config.cost_of_revenue_ratio);
        fill_missing(statement, &mut estimated, LineItem::CostOfRevenue, cost);

        let gross = statement
            .amount(&LineItem::CostOfRevenue)
            .map(|cost| revenue - cost);
        fill_missing(statement, &mut estimated, LineItem::GrossProfit, gross);

        let opex = statement
            .amount(&LineItem::GrossProfit)
            .map(|gp| gp * config.operating_expense_ratio);
        fill_missing(statement, &mut estimated, LineItem::OperatingExpenses, opex);

        let operating = match (
            statement.amount(&LineItem::GrossProfit),
            statement.amount(&LineItem::OperatingExpenses),
        ) {
            (Some(gp), Some(opex)) => Some(gp - opex),
            _ => None,
        };
        fill_missing(statement, &mut estimated, LineItem::OperatingIncome, operating);

        let net = statement
            .amount(&LineItem::OperatingIncome)
            .map(|oi| oi * config.net_income_ratio);
        fill_missing(statement, &mut estimated, LineItem::NetIncome, net);

        estimated
    }
}

fn fill_missing(
    statement: &mut IncomeStatement,
    filled: &mut Vec<LineItem>,
    item: LineItem,
    value: Option<f64>,
) {
    if statement.get(&item).is_known() {
        return;
    }
    if let Some(value) = value {
        statement.set_amount(item.clone(), value, Provenance::Estimated);
        filled.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LineItemValue, Scale};

    fn statement(values: &[(LineItem, f64)]) -> IncomeStatement {
        let mut statement = IncomeStatement::new(Scale::Units);
        for (item, value) in values {
            statement.set_amount(item.clone(), *value, Provenance::Extracted);
        }
        statement
    }

    #[test]
    fn test_gross_profit_from_revenue_and_cost() {
        let config = InferenceConfig::default();
        let mut st = statement(&[(LineItem::Revenue, 1000.0), (LineItem::CostOfRevenue, 600.0)]);

        let outcome = Inferencer::new(&config).infer(&mut st);

        assert_eq!(st.amount(&LineItem::GrossProfit), Some(400.0));
        assert_eq!(st.provenance(&LineItem::GrossProfit), Some(Provenance::Derived));
        assert_eq!(outcome.derived, vec![LineItem::GrossProfit]);
        assert!(outcome.estimated.is_empty());
        assert!(!st.get(&LineItem::NetIncome).is_known());
    }

    #[test]
    fn test_revenue_from_gross_profit_and_cost() {
        let config = InferenceConfig::default();
        let mut st = statement(&[(LineItem::GrossProfit, 300.0), (LineItem::CostOfRevenue, 700.0)]);

        Inferencer::new(&config).apply_identities(&mut st);

        assert_eq!(st.amount(&LineItem::Revenue), Some(1000.0));
    }

    #[test]
    fn test_operating_items_from_each_other() {
        let config = InferenceConfig::default();
        let mut st = statement(&[
            (LineItem::GrossProfit, 400.0),
            (LineItem::OperatingIncome, 150.0),
        ]);
        Inferencer::new(&config).apply_identities(&mut st);
        assert_eq!(st.amount(&LineItem::OperatingExpenses), Some(250.0));

        let mut st = statement(&[
            (LineItem::GrossProfit, 400.0),
            (LineItem::OperatingExpenses, 300.0),
        ]);
        Inferencer::new(&config).apply_identities(&mut st);
        assert_eq!(st.amount(&LineItem::OperatingIncome), Some(100.0));
    }

    #[test]
    fn test_unknown_entries_are_filled() {
        let config = InferenceConfig::default();
        let mut st = statement(&[(LineItem::Revenue, 80.0), (LineItem::CostOfRevenue, 30.0)]);
        st.set(LineItem::GrossProfit, LineItemValue::Unknown, Provenance::Model);

        Inferencer::new(&config).infer(&mut st);

        assert_eq!(st.amount(&LineItem::GrossProfit), Some(50.0));
    }

    #[test]
    fn test_revenue_only_uses_ratio_estimates() {
        let config = InferenceConfig::default();
        let mut st = statement(&[(LineItem::Revenue, 100.0)]);

        let outcome = Inferencer::new(&config).infer(&mut st);

        assert_eq!(st.amount(&LineItem::CostOfRevenue), Some(65.0));
        assert_eq!(st.amount(&LineItem::GrossProfit), Some(35.0));
        assert_eq!(st.amount(&LineItem::OperatingExpenses), Some(24.5));
        assert_eq!(st.amount(&LineItem::OperatingIncome), Some(10.5));
        let net = st.amount(&LineItem::NetIncome).unwrap();
        assert!((net - 7.875).abs() < 0.01, "net income {}", net);

        assert_eq!(outcome.estimated.len(), 5);
        for item in &outcome.estimated {
            assert_eq!(st.provenance(item), Some(Provenance::Estimated));
        }
        assert_eq!(st.provenance(&LineItem::Revenue), Some(Provenance::Extracted));
    }

    #[test]
    fn test_ratio_estimates_need_revenue() {
        let config = InferenceConfig::default();
        let mut st = statement(&[(LineItem::NetIncome, 50.0)]);

        let outcome = Inferencer::new(&config).infer(&mut st);

        assert!(outcome.estimated.is_empty());
        assert_eq!(st.known_count(), 1);
    }

    #[test]
    fn test_revenue_with_another_item_skips_estimates() {
        let config = InferenceConfig::default();

        let mut st = statement(&[(LineItem::Revenue, 100.0), (LineItem::NetIncome, 50.0)]);
        let outcome = Inferencer::new(&config).infer(&mut st);
        assert!(outcome.estimated.is_empty());
        assert!(!st.get(&LineItem::OperatingIncome).is_known());
        assert_eq!(st.amount(&LineItem::NetIncome), Some(50.0));

        let mut st = statement(&[
            (LineItem::Revenue, 100.0),
            (LineItem::OperatingIncome, 80.0),
        ]);
        let outcome = Inferencer::new(&config).infer(&mut st);
        assert!(outcome.estimated.is_empty());
        assert!(!st.get(&LineItem::GrossProfit).is_known());
    }

    #[test]
    fn test_ratio_estimates_can_be_disabled() {
        let config = InferenceConfig {
            estimate_ratios: false,
            ..InferenceConfig::default()
        };
        let mut st = statement(&[(LineItem::Revenue, 100.0)]);

        let outcome = Inferencer::new(&config).infer(&mut st);

        assert!(outcome.estimated.is_empty());
        assert_eq!(st.known_count(), 1);
    }

    #[test]
    fn test_enough_known_items_skip_estimates() {
        let config = InferenceConfig::default();
        let mut st = statement(&[
            (LineItem::Revenue, 1000.0),
            (LineItem::CostOfRevenue, 600.0),
        ]);

        let outcome = Inferencer::new(&config).infer(&mut st);

        assert!(outcome.estimated.is_empty());
        assert!(!st.get(&LineItem::OperatingExpenses).is_known());
    }
}
