use super::types::{
    Allocation, ConfigError, PlannerInput, RateSet, RiskProfile, Settings, SuperOption,
};

#[derive(Debug, Clone, Copy)]
struct PresetRates {
    super_high_growth: f64,
    super_growth: f64,
    super_balanced: f64,
    super_conservative: f64,
    etf_single: f64,
    etf_aus: f64,
    etf_global: f64,
    property_growth: f64,
    rental_growth: f64,
    inflation: f64,
    wage_growth: f64,
}

impl PresetRates {
    fn super_return_for(&self, option: SuperOption) -> f64 {
        match option {
            SuperOption::HighGrowth => self.super_high_growth,
            SuperOption::Growth => self.super_growth,
            SuperOption::Balanced => self.super_balanced,
            SuperOption::Conservative => self.super_conservative,
        }
    }

    fn etf_return_for(&self, allocation: Allocation) -> f64 {
        match allocation {
            Allocation::SingleFund => self.etf_single,
            Allocation::TwoFund { aus, global } => aus * self.etf_aus + global * self.etf_global,
        }
    }
}

fn builtin_preset(name: &str) -> Option<PresetRates> {
    match name.to_ascii_lowercase().as_str() {
        "conservative" => Some(PresetRates {
            super_high_growth: 0.065,
            super_growth: 0.060,
            super_balanced: 0.050,
            super_conservative: 0.040,
            etf_single: 0.060,
            etf_aus: 0.058,
            etf_global: 0.064,
            property_growth: 0.030,
            rental_growth: 0.020,
            inflation: 0.030,
            wage_growth: 0.025,
        }),
        "base" => Some(PresetRates {
            super_high_growth: 0.080,
            super_growth: 0.075,
            super_balanced: 0.065,
            super_conservative: 0.050,
            etf_single: 0.075,
            etf_aus: 0.072,
            etf_global: 0.080,
            property_growth: 0.050,
            rental_growth: 0.025,
            inflation: 0.025,
            wage_growth: 0.030,
        }),
        "optimistic" => Some(PresetRates {
            super_high_growth: 0.095,
            super_growth: 0.090,
            super_balanced: 0.080,
            super_conservative: 0.060,
            etf_single: 0.090,
            etf_aus: 0.085,
            etf_global: 0.095,
            property_growth: 0.065,
            rental_growth: 0.030,
            inflation: 0.020,
            wage_growth: 0.035,
        }),
        _ => None,
    }
}

fn default_preset_name(profile: RiskProfile) -> &'static str {
    match profile {
        RiskProfile::Conservative => "conservative",
        RiskProfile::Balanced => "base",
        RiskProfile::Growth => "optimistic",
    }
}

/// Resolves the assumption preset and per-bucket overrides into one immutable
/// `RateSet`. Bucket overrides always win; the preset fills whatever is left.
/// An unrecognized preset is only an error when some rate still needs it.
pub fn resolve_rates(input: &PlannerInput, settings: &Settings) -> Result<RateSet, ConfigError> {
    let name = input
        .plan
        .assumption_preset
        .as_deref()
        .unwrap_or_else(|| default_preset_name(input.plan.risk_profile));
    let preset = builtin_preset(name);

    let missing = || ConfigError::UnknownPreset {
        name: name.to_string(),
    };

    let super_return = match input.super_fund.expected_return {
        Some(rate) => rate,
        None => preset
            .map(|p| p.super_return_for(input.super_fund.option))
            .ok_or_else(missing)?,
    };

    let etf_return = match input.portfolio.expected_return {
        Some(rate) => rate,
        None => preset
            .map(|p| p.etf_return_for(input.portfolio.allocation))
            .ok_or_else(missing)?,
    };

    let inflation = match input.plan.inflation_override {
        Some(rate) => rate,
        None => preset.map(|p| p.inflation).ok_or_else(missing)?,
    };

    let wage_growth = match input.income.wage_growth {
        Some(rate) => rate,
        None => preset.map(|p| p.wage_growth).ok_or_else(missing)?,
    };

    let (property_growth, rental_growth) = match &input.property {
        Some(property) => {
            let growth = match property.growth_rate {
                Some(rate) => rate,
                None => preset.map(|p| p.property_growth).ok_or_else(missing)?,
            };
            let rental = match property.rental_growth_rate {
                Some(rate) => rate,
                None => preset.map(|p| p.rental_growth).ok_or_else(missing)?,
            };
            (growth, rental)
        }
        // No property bucket: the rates are never read, but keep the set total.
        None => (
            preset.map(|p| p.property_growth).unwrap_or(0.0),
            preset.map(|p| p.rental_growth).unwrap_or(0.0),
        ),
    };

    Ok(RateSet {
        super_return,
        super_fee: input.super_fund.fee_rate,
        super_tax: settings.earnings_tax_rate,
        etf_return,
        etf_fee: input.portfolio.fee_rate,
        property_growth,
        rental_growth,
        inflation,
        wage_growth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        CashBuffers, Goal, IncomeExpense, PlanGoal, Portfolio, SuperFund,
    };

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_input() -> PlannerInput {
        PlannerInput {
            plan: PlanGoal {
                current_age: 30,
                retire_age: 65,
                goal: Goal::Income { yearly: 60_000.0 },
                risk_profile: RiskProfile::Balanced,
                assumption_preset: Some("base".to_string()),
                inflation_override: None,
            },
            income: IncomeExpense {
                salary_yearly: 100_000.0,
                bonus_yearly: 0.0,
                wage_growth: None,
                living_expenses_monthly: 4_000.0,
            },
            super_fund: SuperFund {
                balance: 150_000.0,
                guarantee_rate: 0.115,
                salary_sacrifice_monthly: 0.0,
                option: SuperOption::Growth,
                expected_return: None,
                fee_rate: 0.006,
                admin_fee_yearly: 78.0,
                concessional_cap_yearly: None,
            },
            property: None,
            portfolio: Portfolio {
                balance: 10_000.0,
                dca_monthly: 1_000.0,
                allocation: Allocation::SingleFund,
                fee_rate: 0.002,
                expected_return: None,
            },
            buffers: CashBuffers {
                balance: 10_000.0,
                top_up_monthly: 0.0,
                trigger_months: 1.0,
                recovery_months: 3.0,
                interest_rate: 0.0,
            },
        }
    }

    #[test]
    fn base_preset_resolves_option_table_and_fees() {
        let input = sample_input();
        let rates = resolve_rates(&input, &Settings::default()).expect("must resolve");

        assert_approx(rates.super_return, 0.075);
        assert_approx(rates.etf_return, 0.075);
        assert_approx(rates.super_fee, 0.006);
        assert_approx(rates.etf_fee, 0.002);
        assert_approx(rates.super_tax, 0.15);
        assert_approx(rates.inflation, 0.025);
        assert_approx(rates.wage_growth, 0.030);
    }

    #[test]
    fn bucket_overrides_win_over_preset() {
        let mut input = sample_input();
        input.super_fund.expected_return = Some(0.07);
        input.portfolio.expected_return = Some(0.081);
        input.income.wage_growth = Some(0.02);
        input.plan.inflation_override = Some(0.035);

        let rates = resolve_rates(&input, &Settings::default()).expect("must resolve");
        assert_approx(rates.super_return, 0.07);
        assert_approx(rates.etf_return, 0.081);
        assert_approx(rates.wage_growth, 0.02);
        assert_approx(rates.inflation, 0.035);
    }

    #[test]
    fn two_fund_allocation_blends_preset_returns() {
        let mut input = sample_input();
        input.portfolio.allocation = Allocation::TwoFund {
            aus: 0.4,
            global: 0.6,
        };

        let rates = resolve_rates(&input, &Settings::default()).expect("must resolve");
        assert_approx(rates.etf_return, 0.4 * 0.072 + 0.6 * 0.080);
    }

    #[test]
    fn risk_profile_selects_preset_when_name_absent() {
        let mut input = sample_input();
        input.plan.assumption_preset = None;
        input.plan.risk_profile = RiskProfile::Growth;

        let rates = resolve_rates(&input, &Settings::default()).expect("must resolve");
        assert_approx(rates.super_return, 0.090);
        assert_approx(rates.inflation, 0.020);
    }

    #[test]
    fn unknown_preset_without_overrides_is_rejected() {
        let mut input = sample_input();
        input.plan.assumption_preset = Some("moonshot".to_string());

        let err = resolve_rates(&input, &Settings::default()).expect_err("must reject");
        assert_eq!(
            err,
            ConfigError::UnknownPreset {
                name: "moonshot".to_string()
            }
        );
    }

    #[test]
    fn unknown_preset_with_full_overrides_resolves() {
        let mut input = sample_input();
        input.plan.assumption_preset = Some("moonshot".to_string());
        input.super_fund.expected_return = Some(0.07);
        input.portfolio.expected_return = Some(0.07);
        input.income.wage_growth = Some(0.03);
        input.plan.inflation_override = Some(0.025);

        let rates = resolve_rates(&input, &Settings::default()).expect("must resolve");
        assert_approx(rates.super_return, 0.07);
        assert_approx(rates.etf_return, 0.07);
    }

    #[test]
    fn unknown_preset_with_property_still_needs_property_rates() {
        use crate::core::types::{InvestmentProperty, LoanType};

        let mut input = sample_input();
        input.plan.assumption_preset = Some("moonshot".to_string());
        input.super_fund.expected_return = Some(0.07);
        input.portfolio.expected_return = Some(0.07);
        input.income.wage_growth = Some(0.03);
        input.plan.inflation_override = Some(0.025);
        input.property = Some(InvestmentProperty {
            value: 800_000.0,
            loan_balance: 500_000.0,
            interest_rate: 0.06,
            loan_type: LoanType::PrincipalAndInterest,
            loan_term_years: 30,
            weekly_rent: 600.0,
            management_fee_rate: 0.07,
            insurance_yearly: 1_500.0,
            council_rates_yearly: 2_000.0,
            maintenance_rate: 0.05,
            vacancy_rate: 0.03,
            growth_rate: None,
            rental_growth_rate: None,
            extra_repayment_monthly: 0.0,
        });

        assert!(resolve_rates(&input, &Settings::default()).is_err());

        let property = input.property.as_mut().expect("property present");
        property.growth_rate = Some(0.04);
        property.rental_growth_rate = Some(0.02);
        let rates = resolve_rates(&input, &Settings::default()).expect("must resolve");
        assert_approx(rates.property_growth, 0.04);
        assert_approx(rates.rental_growth, 0.02);
    }
}
