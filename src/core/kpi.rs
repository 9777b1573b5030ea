use super::types::{Goal, Kpis, MonthlyDataPoint, PlannerInput, RateSet, Settings};

#[derive(Debug, Default)]
pub(crate) struct RunTotals {
    pub contributions: f64,
    pub fees: f64,
    pub tax_saved: f64,
}

fn annual_bridge_need(goal: Goal, withdrawal_rate: f64) -> f64 {
    match goal {
        Goal::Income { yearly } => yearly,
        Goal::Capital { amount } => amount * withdrawal_rate,
    }
}

fn bridge_years_covered(outside_super: f64, annual_need: f64) -> f64 {
    if annual_need > 0.0 {
        outside_super / annual_need
    } else {
        0.0
    }
}

/// Monthly saving that accumulates to `target` over `months` at the given
/// annual rate (future-value annuity inversion). A near-zero rate falls back
/// to linear division to keep the result finite.
fn monthly_contribution_for_target(target: f64, annual_rate: f64, months: u32) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    if months == 0 {
        return target;
    }
    let monthly_rate = annual_rate / 12.0;
    if monthly_rate.abs() < 1e-9 {
        return target / months as f64;
    }
    let factor = (1.0 + monthly_rate).powi(months as i32);
    target * monthly_rate / (factor - 1.0)
}

fn share(part: f64, whole: f64) -> f64 {
    if whole.abs() > 1e-9 { part / whole } else { 0.0 }
}

/// Pure reduction of the trajectory into summary KPIs; no state mutation.
pub(crate) fn aggregate(
    input: &PlannerInput,
    settings: &Settings,
    rates: &RateSet,
    monthly: &[MonthlyDataPoint],
    totals: &RunTotals,
) -> Kpis {
    let last = monthly
        .last()
        .expect("projection always emits at least one period");

    let equity = last.property_equity.unwrap_or(0.0);
    let net_worth = last.net_worth;
    let outside_super = last.portfolio_balance + last.cash_balance + equity;

    let projected_income_yearly = net_worth * settings.withdrawal_rate;

    let bridge_years_required = settings
        .preservation_age
        .saturating_sub(input.plan.retire_age) as f64;
    let annual_need = annual_bridge_need(input.plan.goal, settings.withdrawal_rate);

    let (gap_to_goal, capital_shortfall) = match input.plan.goal {
        Goal::Income { yearly } => {
            let gap = (yearly - projected_income_yearly).max(0.0);
            (gap, gap / settings.withdrawal_rate)
        }
        Goal::Capital { amount } => {
            let gap = (amount - net_worth).max(0.0);
            (gap, gap)
        }
    };

    let horizon_months = input.plan.retire_age.saturating_sub(input.plan.current_age) * 12;
    let monthly_gap_to_close_target = monthly_contribution_for_target(
        capital_shortfall,
        rates.etf_return - rates.etf_fee,
        horizon_months,
    );

    Kpis {
        net_worth_at_retirement: net_worth,
        super_share: share(last.super_balance, net_worth),
        portfolio_share: share(last.portfolio_balance, net_worth),
        cash_share: share(last.cash_balance, net_worth),
        property_share: share(equity, net_worth),
        outside_super_at_retirement: outside_super,
        projected_income_yearly,
        projected_income_monthly: projected_income_yearly / 12.0,
        bridge_years_required,
        bridge_years_covered: bridge_years_covered(outside_super, annual_need),
        gap_to_goal,
        monthly_gap_to_close_target,
        total_contributions: totals.contributions,
        total_fees_paid: totals.fees,
        total_tax_saved: totals.tax_saved,
    }
}

pub(crate) fn run_warnings(input: &PlannerInput, monthly: &[MonthlyDataPoint]) -> Vec<String> {
    let mut warnings = Vec::new();

    let cap_months = monthly.iter().filter(|p| p.cap_warning).count();
    if cap_months > 0 {
        warnings.push(format!(
            "concessional cap limited salary sacrifice in {cap_months} of {} months",
            monthly.len()
        ));
    }

    let paused_months = monthly.iter().filter(|p| p.dca_paused).count();
    if paused_months > 0 {
        warnings.push(format!(
            "buffer policy paused discretionary investing for {paused_months} of {} months",
            monthly.len()
        ));
    }

    if monthly.last().is_some_and(|p| p.buffers_below_target) {
        warnings.push(format!(
            "cash buffer ends below its recovery target of {} months of expenses",
            input.buffers.recovery_months
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn income_goal_need_is_the_stated_income() {
        assert_close(
            annual_bridge_need(Goal::Income { yearly: 60_000.0 }, 0.04),
            60_000.0,
            1e-12,
        );
    }

    #[test]
    fn capital_goal_need_applies_the_withdrawal_rate() {
        assert_close(
            annual_bridge_need(Goal::Capital { amount: 1_500_000.0 }, 0.04),
            60_000.0,
            1e-9,
        );
    }

    #[test]
    fn contribution_for_target_inverts_future_value() {
        let monthly = monthly_contribution_for_target(100_000.0, 0.06, 120);
        // Forward accumulation of that payment must land on the target.
        let rate = 0.06 / 12.0;
        let accumulated = monthly * ((1.0_f64 + rate).powi(120) - 1.0) / rate;
        assert_close(accumulated, 100_000.0, 1e-6);
    }

    #[test]
    fn contribution_for_target_near_zero_rate_is_linear() {
        assert_close(
            monthly_contribution_for_target(12_000.0, 0.0, 12),
            1_000.0,
            1e-9,
        );
        assert_close(
            monthly_contribution_for_target(12_000.0, 1e-12, 12),
            1_000.0,
            1e-6,
        );
    }

    #[test]
    fn contribution_for_target_degenerates_to_lump_sum() {
        assert_close(
            monthly_contribution_for_target(50_000.0, 0.06, 0),
            50_000.0,
            1e-12,
        );
        assert_close(monthly_contribution_for_target(0.0, 0.06, 120), 0.0, 1e-12);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]
        #[test]
        fn bridge_coverage_is_monotone_in_outside_super(
            low in 0.0_f64..2_000_000.0,
            bump in 0.0_f64..500_000.0,
            need in 1_000.0_f64..200_000.0,
        ) {
            let covered_low = bridge_years_covered(low, need);
            let covered_high = bridge_years_covered(low + bump, need);
            prop_assert!(covered_high >= covered_low);
        }
    }
}
