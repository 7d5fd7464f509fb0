use crate::domain::analysis::DcfValuation;
use crate::domain::market::FinancialStatements;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct DcfAssumptions {
    pub risk_free_rate: f64,
    pub market_return: f64,
    pub short_term_growth: f64,
    pub long_term_growth: f64,
    pub projection_years: u32,
    /// Used when the provider reports no beta.
    pub default_beta: f64,
}

impl Default for DcfAssumptions {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            market_return: 0.08,
            short_term_growth: 0.05,
            long_term_growth: 0.03,
            projection_years: 5,
            default_beta: 1.0,
        }
    }
}

/// Weighted average cost of capital from market equity, book debt and the CAPM cost of equity.
pub fn wacc(fin: &FinancialStatements, assumptions: &DcfAssumptions) -> Result<f64> {
    let equity = fin
        .market_cap
        .filter(|v| *v > 0.0)
        .context("market cap is required for WACC")?;
    let debt = fin.total_debt.unwrap_or(0.0).max(0.0);
    let beta = fin.beta.unwrap_or(assumptions.default_beta);

    let cost_of_equity =
        assumptions.risk_free_rate + beta * (assumptions.market_return - assumptions.risk_free_rate);

    let cost_of_debt = match fin.interest_expense {
        Some(interest) if debt > 0.0 => interest.abs() / debt,
        _ => 0.0,
    };

    let tax_rate = match (fin.income_tax_expense, fin.pretax_income) {
        (Some(tax), Some(pretax)) if pretax > 0.0 => (tax / pretax).clamp(0.0, 1.0),
        _ => 0.0,
    };

    let value = equity + debt;
    Ok(equity / value * cost_of_equity + debt / value * cost_of_debt * (1.0 - tax_rate))
}

/// Free cash flow per period (operating cash flow plus the negative capex line).
pub fn free_cash_flows(fin: &FinancialStatements) -> Vec<f64> {
    fin.operating_cash_flow
        .iter()
        .zip(&fin.capital_expenditures)
        .map(|(ocf, capex)| ocf + capex)
        .collect()
}

/// Two-stage DCF: explicit growth for `projection_years`, Gordon growth terminal value.
pub fn valuation(fin: &FinancialStatements, assumptions: &DcfAssumptions) -> Result<DcfValuation> {
    let base = free_cash_flows(fin)
        .first()
        .copied()
        .context("no free cash flow history")?;
    let rate = wacc(fin, assumptions)?;
    let g = assumptions.long_term_growth;
    anyhow::ensure!(
        rate > g,
        "WACC {rate:.4} does not exceed terminal growth {g:.4}"
    );

    let mut fcf = base;
    let mut enterprise_value = 0.0;
    let mut discount = 1.0;
    for _ in 0..assumptions.projection_years {
        fcf *= 1.0 + assumptions.short_term_growth;
        discount *= 1.0 + rate;
        enterprise_value += fcf / discount;
    }
    let terminal = fcf * (1.0 + g) / (rate - g);
    enterprise_value += terminal / discount;

    let per_share = fin
        .shares_outstanding
        .filter(|s| *s > 0.0)
        .map(|shares| (enterprise_value - fin.total_debt.unwrap_or(0.0)) / shares);

    Ok(DcfValuation {
        enterprise_value,
        per_share,
        wacc: rate,
        base_free_cash_flow: base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements() -> FinancialStatements {
        FinancialStatements {
            operating_cash_flow: vec![150.0, 120.0],
            capital_expenditures: vec![-50.0, -40.0],
            total_debt: Some(100.0),
            interest_expense: Some(-5.0),
            income_tax_expense: Some(21.0),
            pretax_income: Some(100.0),
            market_cap: Some(900.0),
            beta: Some(1.0),
            shares_outstanding: Some(10.0),
        }
    }

    #[test]
    fn wacc_matches_hand_computation() {
        // Re = 0.02 + 1.0 * 0.06 = 0.08; Rd = 0.05; t = 0.21
        // 0.9 * 0.08 + 0.1 * 0.05 * 0.79 = 0.07595
        let w = wacc(&statements(), &DcfAssumptions::default()).unwrap();
        assert!((w - 0.07595).abs() < 1e-12);
    }

    #[test]
    fn valuation_matches_hand_computation() {
        let v = valuation(&statements(), &DcfAssumptions::default()).unwrap();
        assert_eq!(v.base_free_cash_flow, 100.0);

        let r: f64 = 0.07595;
        let mut expected = 0.0;
        for t in 1..=5 {
            expected += 100.0 * 1.05f64.powi(t) / (1.0 + r).powi(t);
        }
        let fcf5 = 100.0 * 1.05f64.powi(5);
        expected += fcf5 * 1.03 / (r - 0.03) / (1.0 + r).powi(5);

        assert!((v.enterprise_value - expected).abs() < 1e-6);
        let per_share = v.per_share.unwrap();
        assert!((per_share - (expected - 100.0) / 10.0).abs() < 1e-6);
    }

    #[test]
    fn debt_free_company_discounts_at_cost_of_equity() {
        let mut fin = statements();
        fin.total_debt = None;
        fin.beta = Some(1.5);
        let w = wacc(&fin, &DcfAssumptions::default()).unwrap();
        assert!((w - 0.11).abs() < 1e-12);
    }

    #[test]
    fn rejects_missing_inputs_and_low_discount_rate() {
        let mut fin = statements();
        fin.operating_cash_flow.clear();
        assert!(valuation(&fin, &DcfAssumptions::default()).is_err());

        let mut fin = statements();
        fin.market_cap = None;
        assert!(valuation(&fin, &DcfAssumptions::default()).is_err());

        let mut fin = statements();
        fin.beta = Some(0.0);
        fin.total_debt = None;
        // Re = 0.02 < g = 0.03
        assert!(valuation(&fin, &DcfAssumptions::default()).is_err());
    }
}
