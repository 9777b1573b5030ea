use serde::Serialize;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Growth,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuperOption {
    HighGrowth,
    Growth,
    Balanced,
    Conservative,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoanType {
    InterestOnly,
    PrincipalAndInterest,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Allocation {
    SingleFund,
    TwoFund { aus: f64, global: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Goal {
    Income { yearly: f64 },
    Capital { amount: f64 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PauseScope {
    PortfolioAndProperty,
    PortfolioOnly,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanGoal {
    pub current_age: u32,
    pub retire_age: u32,
    pub goal: Goal,
    pub risk_profile: RiskProfile,
    pub assumption_preset: Option<String>,
    pub inflation_override: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeExpense {
    pub salary_yearly: f64,
    pub bonus_yearly: f64,
    pub wage_growth: Option<f64>,
    pub living_expenses_monthly: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperFund {
    pub balance: f64,
    pub guarantee_rate: f64,
    pub salary_sacrifice_monthly: f64,
    pub option: SuperOption,
    pub expected_return: Option<f64>,
    pub fee_rate: f64,
    pub admin_fee_yearly: f64,
    pub concessional_cap_yearly: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentProperty {
    pub value: f64,
    pub loan_balance: f64,
    pub interest_rate: f64,
    pub loan_type: LoanType,
    pub loan_term_years: u32,
    pub weekly_rent: f64,
    pub management_fee_rate: f64,
    pub insurance_yearly: f64,
    pub council_rates_yearly: f64,
    pub maintenance_rate: f64,
    pub vacancy_rate: f64,
    pub growth_rate: Option<f64>,
    pub rental_growth_rate: Option<f64>,
    pub extra_repayment_monthly: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub balance: f64,
    pub dca_monthly: f64,
    pub allocation: Allocation,
    pub fee_rate: f64,
    pub expected_return: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashBuffers {
    pub balance: f64,
    pub top_up_monthly: f64,
    pub trigger_months: f64,
    pub recovery_months: f64,
    pub interest_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerInput {
    pub plan: PlanGoal,
    pub income: IncomeExpense,
    pub super_fund: SuperFund,
    pub property: Option<InvestmentProperty>,
    pub portfolio: Portfolio,
    pub buffers: CashBuffers,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub preservation_age: u32,
    pub concessional_cap_yearly: f64,
    pub contributions_tax_rate: f64,
    pub earnings_tax_rate: f64,
    pub withdrawal_rate: f64,
    pub pause_scope: PauseScope,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preservation_age: 60,
            concessional_cap_yearly: 30_000.0,
            contributions_tax_rate: 0.15,
            earnings_tax_rate: 0.15,
            withdrawal_rate: 0.04,
            pause_scope: PauseScope::PortfolioAndProperty,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSet {
    pub super_return: f64,
    pub super_fee: f64,
    pub super_tax: f64,
    pub etf_return: f64,
    pub etf_fee: f64,
    pub property_growth: f64,
    pub rental_growth: f64,
    pub inflation: f64,
    pub wage_growth: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyDataPoint {
    pub month: u32,
    pub age: f64,
    pub gross_income: f64,
    pub super_balance: f64,
    pub portfolio_balance: f64,
    pub cash_balance: f64,
    pub property_value: Option<f64>,
    pub loan_balance: Option<f64>,
    pub property_equity: Option<f64>,
    pub lvr: Option<f64>,
    pub property_cashflow: Option<f64>,
    pub super_contribution: f64,
    pub portfolio_contribution: f64,
    pub property_extra_repayment: f64,
    pub buffer_contribution: f64,
    pub net_worth: f64,
    pub dca_paused: bool,
    pub cap_warning: bool,
    pub buffers_below_target: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub net_worth_at_retirement: f64,
    pub super_share: f64,
    pub portfolio_share: f64,
    pub cash_share: f64,
    pub property_share: f64,
    pub outside_super_at_retirement: f64,
    pub projected_income_yearly: f64,
    pub projected_income_monthly: f64,
    pub bridge_years_required: f64,
    pub bridge_years_covered: f64,
    pub gap_to_goal: f64,
    pub monthly_gap_to_close_target: f64,
    pub total_contributions: f64,
    pub total_fees_paid: f64,
    pub total_tax_saved: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub duration_ms: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub input: PlannerInput,
    pub kpis: Kpis,
    pub monthly: Vec<MonthlyDataPoint>,
    pub meta: RunMeta,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown assumption preset `{name}` and no complete rate overrides supplied")]
    UnknownPreset { name: String },
    #[error(
        "buffer recovery target ({recovery} months) must be at least the trigger level ({trigger} months)"
    )]
    BufferThresholds { trigger: f64, recovery: f64 },
    #[error("portfolio allocation weights must sum to 1, got {sum}")]
    AllocationWeights { sum: f64 },
    #[error("retirement age {retire_age} is before current age {current_age}")]
    RetirementBeforeCurrent { current_age: u32, retire_age: u32 },
    #[error("loan balance {loan_balance} exceeds property value {property_value}")]
    LoanExceedsValue {
        loan_balance: f64,
        property_value: f64,
    },
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}
