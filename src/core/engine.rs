use std::time::Instant;

use super::kpi;
use super::rates::resolve_rates;
use super::types::{
    Allocation, ConfigError, LoanType, MonthlyDataPoint, PauseScope, PlannerInput, RateSet,
    RunMeta, ScenarioResult, Settings,
};

const MEDICARE_LEVY: f64 = 0.02;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum PolicyMode {
    Investing,
    Paused,
}

/// Two-threshold pause/resume policy for discretionary investing. Pausing
/// requires coverage strictly below the trigger; resuming requires coverage
/// at or above the recovery target, which must not be below the trigger.
#[derive(Debug)]
struct BufferPolicy {
    trigger: f64,
    recovery: f64,
    mode: PolicyMode,
}

impl BufferPolicy {
    fn new(trigger: f64, recovery: f64, initial_coverage: f64) -> Self {
        let mode = if initial_coverage < trigger {
            PolicyMode::Paused
        } else {
            PolicyMode::Investing
        };
        Self {
            trigger,
            recovery,
            mode,
        }
    }

    fn update(&mut self, coverage: f64) -> PolicyMode {
        match self.mode {
            PolicyMode::Investing if coverage < self.trigger => self.mode = PolicyMode::Paused,
            PolicyMode::Paused if coverage >= self.recovery => self.mode = PolicyMode::Investing,
            _ => {}
        }
        self.mode
    }
}

fn coverage_months(cash: f64, monthly_expenses: f64) -> f64 {
    if monthly_expenses <= 0.0 {
        f64::INFINITY
    } else {
        cash / monthly_expenses
    }
}

/// Tracks concessional contributions against the annual cap within one
/// financial year (12-period blocks from the start of the run).
#[derive(Debug)]
struct CapTracker {
    cap: f64,
    accrued: f64,
}

impl CapTracker {
    fn new(cap: f64) -> Self {
        Self { cap, accrued: 0.0 }
    }

    fn start_year(&mut self) {
        self.accrued = 0.0;
    }

    /// Returns the salary sacrifice granted this period and whether the
    /// request had to be clamped against the cap. Employer SG is never
    /// reduced, even when it alone breaches the cap; the sacrifice headroom
    /// is net of the employer stream still due this financial year.
    fn gate(&mut self, employer: f64, requested: f64, months_left_in_fy: u32) -> (f64, bool) {
        let months_left = months_left_in_fy.max(1) as f64;
        let headroom = (self.cap - self.accrued).max(0.0);
        let spread = headroom / months_left;
        let sacrificeable = (headroom - employer * months_left).max(0.0);
        let sacrifice = requested.min(spread).min(sacrificeable).max(0.0);
        let clamped = sacrifice + 1e-9 < requested
            || self.accrued + employer + sacrifice > self.cap + 1e-9;
        self.accrued += employer + sacrifice;
        (sacrifice, clamped)
    }
}

#[derive(Debug)]
struct PropertyState {
    value: f64,
    loan: f64,
    scheduled_payment: f64,
}

#[derive(Debug)]
struct Balances {
    super_balance: f64,
    portfolio: f64,
    cash: f64,
    property: Option<PropertyState>,
}

impl Balances {
    fn from_input(input: &PlannerInput) -> Self {
        let property = input.property.as_ref().map(|p| PropertyState {
            value: p.value,
            loan: p.loan_balance,
            scheduled_payment: match p.loan_type {
                LoanType::InterestOnly => 0.0,
                LoanType::PrincipalAndInterest => amortized_payment(
                    p.loan_balance,
                    p.interest_rate,
                    p.loan_term_years.max(1) * 12,
                ),
            },
        });
        Self {
            super_balance: input.super_fund.balance,
            portfolio: input.portfolio.balance,
            cash: input.buffers.balance,
            property,
        }
    }

    fn property_equity(&self) -> f64 {
        self.property
            .as_ref()
            .map(|p| p.value - p.loan)
            .unwrap_or(0.0)
    }

    fn net_worth(&self) -> f64 {
        self.super_balance + self.portfolio + self.cash + self.property_equity()
    }
}

/// Standard amortization payment for a loan over `months`. A near-zero rate
/// degenerates to linear repayment instead of producing a non-finite result.
fn amortized_payment(loan: f64, annual_rate: f64, months: u32) -> f64 {
    let months = months.max(1);
    let monthly_rate = annual_rate / 12.0;
    if monthly_rate.abs() < 1e-9 {
        return loan / months as f64;
    }
    let factor = (1.0 + monthly_rate).powi(months as i32);
    loan * monthly_rate * factor / (factor - 1.0)
}

/// Marginal resident income-tax rate including the Medicare levy, used for
/// the salary-sacrifice tax-saving estimate.
fn marginal_tax_rate(taxable_income: f64) -> f64 {
    let bracket = if taxable_income <= 18_200.0 {
        return 0.0;
    } else if taxable_income <= 45_000.0 {
        0.16
    } else if taxable_income <= 135_000.0 {
        0.30
    } else if taxable_income <= 190_000.0 {
        0.37
    } else {
        0.45
    };
    bracket + MEDICARE_LEVY
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn require_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn validate(input: &PlannerInput) -> Result<(), ConfigError> {
    if input.plan.retire_age < input.plan.current_age {
        return Err(ConfigError::RetirementBeforeCurrent {
            current_age: input.plan.current_age,
            retire_age: input.plan.retire_age,
        });
    }

    require_non_negative("income.salaryYearly", input.income.salary_yearly)?;
    require_non_negative("income.bonusYearly", input.income.bonus_yearly)?;
    require_non_negative(
        "income.livingExpensesMonthly",
        input.income.living_expenses_monthly,
    )?;

    require_finite("super.balance", input.super_fund.balance)?;
    require_non_negative("super.guaranteeRate", input.super_fund.guarantee_rate)?;
    require_non_negative(
        "super.salarySacrificeMonthly",
        input.super_fund.salary_sacrifice_monthly,
    )?;
    require_non_negative("super.feeRate", input.super_fund.fee_rate)?;
    require_non_negative("super.adminFeeYearly", input.super_fund.admin_fee_yearly)?;
    if let Some(cap) = input.super_fund.concessional_cap_yearly {
        require_non_negative("super.concessionalCapYearly", cap)?;
    }

    require_finite("portfolio.balance", input.portfolio.balance)?;
    require_non_negative("portfolio.dcaMonthly", input.portfolio.dca_monthly)?;
    require_non_negative("portfolio.feeRate", input.portfolio.fee_rate)?;
    if let Allocation::TwoFund { aus, global } = input.portfolio.allocation {
        require_non_negative("portfolio.allocation.aus", aus)?;
        require_non_negative("portfolio.allocation.global", global)?;
        let sum = aus + global;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(ConfigError::AllocationWeights { sum });
        }
    }

    require_finite("buffers.balance", input.buffers.balance)?;
    require_non_negative("buffers.topUpMonthly", input.buffers.top_up_monthly)?;
    require_non_negative("buffers.triggerMonths", input.buffers.trigger_months)?;
    require_non_negative("buffers.recoveryMonths", input.buffers.recovery_months)?;
    if input.buffers.recovery_months < input.buffers.trigger_months {
        return Err(ConfigError::BufferThresholds {
            trigger: input.buffers.trigger_months,
            recovery: input.buffers.recovery_months,
        });
    }

    if let Some(property) = &input.property {
        require_non_negative("property.value", property.value)?;
        require_non_negative("property.loanBalance", property.loan_balance)?;
        require_non_negative("property.interestRate", property.interest_rate)?;
        require_non_negative("property.weeklyRent", property.weekly_rent)?;
        require_non_negative("property.managementFeeRate", property.management_fee_rate)?;
        require_non_negative("property.insuranceYearly", property.insurance_yearly)?;
        require_non_negative(
            "property.councilRatesYearly",
            property.council_rates_yearly,
        )?;
        require_non_negative("property.maintenanceRate", property.maintenance_rate)?;
        require_non_negative("property.vacancyRate", property.vacancy_rate)?;
        require_non_negative(
            "property.extraRepaymentMonthly",
            property.extra_repayment_monthly,
        )?;
        if property.loan_balance > property.value {
            return Err(ConfigError::LoanExceedsValue {
                loan_balance: property.loan_balance,
                property_value: property.value,
            });
        }
    }

    Ok(())
}

/// Runs one full projection: validation, rate resolution, then the monthly
/// loop from now to the retirement horizon, finishing with the KPI reduction.
/// Fails fast before any projection work; never fails afterwards.
pub fn run_projection(
    input: &PlannerInput,
    settings: &Settings,
) -> Result<ScenarioResult, ConfigError> {
    let started = Instant::now();
    validate(input)?;
    let rates = resolve_rates(input, settings)?;

    let months = (input.plan.retire_age.saturating_sub(input.plan.current_age)) * 12;

    let mut balances = Balances::from_input(input);
    let initial_coverage =
        coverage_months(balances.cash, input.income.living_expenses_monthly);
    let mut policy = BufferPolicy::new(
        input.buffers.trigger_months,
        input.buffers.recovery_months,
        initial_coverage,
    );
    let cap = input
        .super_fund
        .concessional_cap_yearly
        .unwrap_or(settings.concessional_cap_yearly);
    let mut caps = CapTracker::new(cap);
    let mut totals = kpi::RunTotals::default();

    let monthly = if months == 0 {
        vec![snapshot_point(input, &balances, &policy, initial_coverage)]
    } else {
        let mut points = Vec::with_capacity(months as usize);
        for period in 0..months {
            if period % 12 == 0 {
                caps.start_year();
            }
            points.push(advance_period(
                input,
                settings,
                &rates,
                &mut balances,
                &mut policy,
                &mut caps,
                &mut totals,
                period,
            ));
        }
        points
    };

    let kpis = kpi::aggregate(input, settings, &rates, &monthly, &totals);
    let warnings = kpi::run_warnings(input, &monthly);

    Ok(ScenarioResult {
        input: input.clone(),
        kpis,
        monthly,
        meta: RunMeta {
            duration_ms: started.elapsed().as_secs_f64() * 1_000.0,
            warnings,
        },
    })
}

fn snapshot_point(
    input: &PlannerInput,
    balances: &Balances,
    policy: &BufferPolicy,
    coverage: f64,
) -> MonthlyDataPoint {
    let property = balances.property.as_ref();
    MonthlyDataPoint {
        month: 0,
        age: input.plan.current_age as f64,
        gross_income: (input.income.salary_yearly + input.income.bonus_yearly) / 12.0,
        super_balance: balances.super_balance,
        portfolio_balance: balances.portfolio,
        cash_balance: balances.cash,
        property_value: property.map(|p| p.value),
        loan_balance: property.map(|p| p.loan),
        property_equity: property.map(|p| p.value - p.loan),
        lvr: property.map(|p| if p.value > 0.0 { p.loan / p.value } else { 0.0 }),
        property_cashflow: property.map(|_| 0.0),
        super_contribution: 0.0,
        portfolio_contribution: 0.0,
        property_extra_repayment: 0.0,
        buffer_contribution: 0.0,
        net_worth: balances.net_worth(),
        dca_paused: policy.mode == PolicyMode::Paused,
        cap_warning: false,
        buffers_below_target: coverage < input.buffers.recovery_months,
    }
}

#[allow(clippy::too_many_arguments)]
fn advance_period(
    input: &PlannerInput,
    settings: &Settings,
    rates: &RateSet,
    balances: &mut Balances,
    policy: &mut BufferPolicy,
    caps: &mut CapTracker,
    totals: &mut kpi::RunTotals,
    period: u32,
) -> MonthlyDataPoint {
    let year = period / 12;
    let wage_factor = (1.0 + rates.wage_growth).powi(year as i32);
    let inflation_factor = (1.0 + rates.inflation).powi(year as i32);
    let salary = input.income.salary_yearly * wage_factor;
    let bonus = input.income.bonus_yearly * wage_factor;
    let expenses = input.income.living_expenses_monthly * inflation_factor;

    let coverage = coverage_months(balances.cash, expenses);
    let mode = policy.update(coverage);
    let paused = mode == PolicyMode::Paused;

    // Super contributions: SG on salary, sacrifice gated by the annual cap.
    let employer = salary / 12.0 * input.super_fund.guarantee_rate;
    let months_left_in_fy = 12 - period % 12;
    let (sacrifice, cap_warning) = caps.gate(
        employer,
        input.super_fund.salary_sacrifice_monthly,
        months_left_in_fy,
    );
    let super_gross = employer + sacrifice;
    let super_net = super_gross * (1.0 - settings.contributions_tax_rate);
    let tax_saving = sacrifice
        * (marginal_tax_rate(salary + bonus) - settings.contributions_tax_rate).max(0.0);

    // Discretionary contributions gated by the buffer policy. Super is exempt.
    let requested_dca = input.portfolio.dca_monthly;
    let requested_extra = input
        .property
        .as_ref()
        .map(|p| p.extra_repayment_monthly)
        .unwrap_or(0.0);
    let extra_paused = paused && settings.pause_scope == PauseScope::PortfolioAndProperty;
    let dca = if paused { 0.0 } else { requested_dca };
    let extra_allowed = if extra_paused { 0.0 } else { requested_extra };
    let redirected = if paused {
        requested_dca + if extra_paused { requested_extra } else { 0.0 }
    } else {
        0.0
    };

    // Growth on the existing balance, then contributions, then flat fees.
    let super_fee_drag = balances.super_balance * rates.super_fee / 12.0;
    let admin_fee = input.super_fund.admin_fee_yearly / 12.0 * inflation_factor;
    let super_monthly_rate =
        (rates.super_return * (1.0 - rates.super_tax) - rates.super_fee) / 12.0;
    balances.super_balance =
        balances.super_balance * (1.0 + super_monthly_rate) + super_net - admin_fee;

    let portfolio_fee_drag = balances.portfolio * rates.etf_fee / 12.0;
    balances.portfolio =
        balances.portfolio * (1.0 + (rates.etf_return - rates.etf_fee) / 12.0) + dca;

    let buffer_interest = balances.cash * input.buffers.interest_rate / 12.0;

    let mut property_cashflow = None;
    let mut extra_paid = 0.0;
    if let (Some(state), Some(property)) = (balances.property.as_mut(), input.property.as_ref()) {
        state.value *= 1.0 + rates.property_growth / 12.0;

        let interest = state.loan * property.interest_rate / 12.0;
        let scheduled_principal = if state.loan <= 0.0 {
            0.0
        } else {
            match property.loan_type {
                LoanType::InterestOnly => 0.0,
                LoanType::PrincipalAndInterest => {
                    (state.scheduled_payment - interest).max(0.0).min(state.loan)
                }
            }
        };
        state.loan -= scheduled_principal;
        extra_paid = extra_allowed.min(state.loan);
        // The loan can never amortize below zero.
        state.loan = (state.loan - extra_paid).max(0.0);

        let rent_factor = (1.0 + rates.rental_growth).powi(year as i32);
        let rent =
            property.weekly_rent * 52.0 / 12.0 * rent_factor * (1.0 - property.vacancy_rate);
        let costs = rent * property.management_fee_rate
            + property.insurance_yearly / 12.0
            + property.council_rates_yearly / 12.0
            + rent * property.maintenance_rate;
        let cashflow = rent - costs - interest - scheduled_principal;
        property_cashflow = Some(cashflow);

        balances.cash += cashflow - extra_paid;
    }

    let buffer_contribution = input.buffers.top_up_monthly + redirected;
    balances.cash += buffer_interest + buffer_contribution;

    totals.contributions += super_gross + dca + extra_paid + buffer_contribution;
    totals.fees += super_fee_drag + admin_fee + portfolio_fee_drag;
    totals.tax_saved += tax_saving;

    let end_coverage = coverage_months(balances.cash, expenses);
    let property = balances.property.as_ref();
    MonthlyDataPoint {
        month: period + 1,
        age: input.plan.current_age as f64 + (period as f64 + 1.0) / 12.0,
        gross_income: (salary + bonus) / 12.0,
        super_balance: balances.super_balance,
        portfolio_balance: balances.portfolio,
        cash_balance: balances.cash,
        property_value: property.map(|p| p.value),
        loan_balance: property.map(|p| p.loan),
        property_equity: property.map(|p| p.value - p.loan),
        lvr: property.map(|p| if p.value > 0.0 { p.loan / p.value } else { 0.0 }),
        property_cashflow,
        super_contribution: super_gross,
        portfolio_contribution: dca,
        property_extra_repayment: extra_paid,
        buffer_contribution,
        net_worth: balances.net_worth(),
        dca_paused: paused,
        cap_warning,
        buffers_below_target: end_coverage < input.buffers.recovery_months,
    }
}
