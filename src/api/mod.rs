use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Allocation, CashBuffers, Goal, IncomeExpense, InvestmentProperty, LoanType, PauseScope,
    PlanGoal, PlannerInput, Portfolio, RiskProfile, ScenarioResult, Settings, SuperFund,
    SuperOption, run_projection,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRiskProfile {
    Conservative,
    Balanced,
    Growth,
}

impl From<CliRiskProfile> for RiskProfile {
    fn from(value: CliRiskProfile) -> Self {
        match value {
            CliRiskProfile::Conservative => RiskProfile::Conservative,
            CliRiskProfile::Balanced => RiskProfile::Balanced,
            CliRiskProfile::Growth => RiskProfile::Growth,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSuperOption {
    HighGrowth,
    Growth,
    Balanced,
    Conservative,
}

impl From<CliSuperOption> for SuperOption {
    fn from(value: CliSuperOption) -> Self {
        match value {
            CliSuperOption::HighGrowth => SuperOption::HighGrowth,
            CliSuperOption::Growth => SuperOption::Growth,
            CliSuperOption::Balanced => SuperOption::Balanced,
            CliSuperOption::Conservative => SuperOption::Conservative,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliLoanType {
    InterestOnly,
    PrincipalAndInterest,
}

impl From<CliLoanType> for LoanType {
    fn from(value: CliLoanType) -> Self {
        match value {
            CliLoanType::InterestOnly => LoanType::InterestOnly,
            CliLoanType::PrincipalAndInterest => LoanType::PrincipalAndInterest,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPauseScope {
    PortfolioAndProperty,
    PortfolioOnly,
}

impl From<CliPauseScope> for PauseScope {
    fn from(value: CliPauseScope) -> Self {
        match value {
            CliPauseScope::PortfolioAndProperty => PauseScope::PortfolioAndProperty,
            CliPauseScope::PortfolioOnly => PauseScope::PortfolioOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliOutput {
    Json,
    Csv,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRiskProfile {
    Conservative,
    Balanced,
    Growth,
}

impl From<ApiRiskProfile> for CliRiskProfile {
    fn from(value: ApiRiskProfile) -> Self {
        match value {
            ApiRiskProfile::Conservative => CliRiskProfile::Conservative,
            ApiRiskProfile::Balanced => CliRiskProfile::Balanced,
            ApiRiskProfile::Growth => CliRiskProfile::Growth,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSuperOption {
    #[serde(alias = "highGrowth", alias = "high_growth")]
    HighGrowth,
    Growth,
    Balanced,
    Conservative,
}

impl From<ApiSuperOption> for CliSuperOption {
    fn from(value: ApiSuperOption) -> Self {
        match value {
            ApiSuperOption::HighGrowth => CliSuperOption::HighGrowth,
            ApiSuperOption::Growth => CliSuperOption::Growth,
            ApiSuperOption::Balanced => CliSuperOption::Balanced,
            ApiSuperOption::Conservative => CliSuperOption::Conservative,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiLoanType {
    #[serde(alias = "interestOnly", alias = "interest_only", alias = "io")]
    InterestOnly,
    #[serde(alias = "principalAndInterest", alias = "principal_and_interest", alias = "pi")]
    PrincipalAndInterest,
}

impl From<ApiLoanType> for CliLoanType {
    fn from(value: ApiLoanType) -> Self {
        match value {
            ApiLoanType::InterestOnly => CliLoanType::InterestOnly,
            ApiLoanType::PrincipalAndInterest => CliLoanType::PrincipalAndInterest,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPauseScope {
    #[serde(alias = "portfolioAndProperty", alias = "portfolio_and_property")]
    PortfolioAndProperty,
    #[serde(alias = "portfolioOnly", alias = "portfolio_only")]
    PortfolioOnly,
}

impl From<ApiPauseScope> for CliPauseScope {
    fn from(value: ApiPauseScope) -> Self {
        match value {
            ApiPauseScope::PortfolioAndProperty => CliPauseScope::PortfolioAndProperty,
            ApiPauseScope::PortfolioOnly => CliPauseScope::PortfolioOnly,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    retire_age: Option<u32>,
    target_income_yearly: Option<f64>,
    target_capital: Option<f64>,
    risk_profile: Option<ApiRiskProfile>,
    assumption_preset: Option<String>,
    inflation: Option<f64>,

    salary_yearly: Option<f64>,
    bonus_yearly: Option<f64>,
    wage_growth: Option<f64>,
    living_expenses_monthly: Option<f64>,

    super_balance: Option<f64>,
    #[serde(alias = "sgRate")]
    super_guarantee_rate: Option<f64>,
    salary_sacrifice_monthly: Option<f64>,
    super_option: Option<ApiSuperOption>,
    super_return: Option<f64>,
    super_fee_rate: Option<f64>,
    super_admin_fee_yearly: Option<f64>,
    concessional_cap_yearly: Option<f64>,

    property_value: Option<f64>,
    loan_balance: Option<f64>,
    loan_interest_rate: Option<f64>,
    loan_type: Option<ApiLoanType>,
    loan_term_years: Option<u32>,
    weekly_rent: Option<f64>,
    management_fee_rate: Option<f64>,
    insurance_yearly: Option<f64>,
    council_rates_yearly: Option<f64>,
    maintenance_rate: Option<f64>,
    vacancy_rate: Option<f64>,
    property_growth: Option<f64>,
    rental_growth: Option<f64>,
    extra_repayment_monthly: Option<f64>,

    portfolio_balance: Option<f64>,
    #[serde(alias = "dca")]
    dca_monthly: Option<f64>,
    aus_weight: Option<f64>,
    global_weight: Option<f64>,
    portfolio_fee_rate: Option<f64>,
    portfolio_return: Option<f64>,

    buffer_balance: Option<f64>,
    buffer_top_up_monthly: Option<f64>,
    buffer_trigger_months: Option<f64>,
    buffer_recovery_months: Option<f64>,
    buffer_interest_rate: Option<f64>,

    preservation_age: Option<u32>,
    concessional_cap: Option<f64>,
    contributions_tax_rate: Option<f64>,
    earnings_tax_rate: Option<f64>,
    withdrawal_rate: Option<f64>,
    pause_scope: Option<ApiPauseScope>,
}

#[derive(Parser, Debug)]
#[command(
    name = "glidepath",
    about = "Deterministic retirement projector: super, ETF portfolio, property, and a cash buffer"
)]
struct Cli {
    #[arg(long, default_value_t = 30)]
    current_age: u32,
    #[arg(long, default_value_t = 65)]
    retire_age: u32,
    #[arg(
        long,
        help = "Target retirement income per year; exactly one of this and --target-capital must be set"
    )]
    target_income_yearly: Option<f64>,
    #[arg(long, help = "Target capital at retirement")]
    target_capital: Option<f64>,
    #[arg(long, value_enum, default_value_t = CliRiskProfile::Balanced)]
    risk_profile: CliRiskProfile,
    #[arg(
        long,
        help = "Assumption preset: conservative, base, or optimistic; defaults to the risk profile's preset"
    )]
    assumption_preset: Option<String>,
    #[arg(long, help = "Inflation override in percent, e.g. 2.5")]
    inflation: Option<f64>,

    #[arg(long, default_value_t = 100_000.0)]
    salary_yearly: f64,
    #[arg(long, default_value_t = 0.0)]
    bonus_yearly: f64,
    #[arg(long, help = "Annual wage growth in percent; defaults to the preset")]
    wage_growth: Option<f64>,
    #[arg(long, default_value_t = 4_000.0)]
    living_expenses_monthly: f64,

    #[arg(long, default_value_t = 150_000.0)]
    super_balance: f64,
    #[arg(long, default_value_t = 11.5, help = "Employer super guarantee in percent")]
    super_guarantee_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    salary_sacrifice_monthly: f64,
    #[arg(long, value_enum, default_value_t = CliSuperOption::Balanced)]
    super_option: CliSuperOption,
    #[arg(
        long,
        help = "Expected gross super return in percent; defaults to the preset's option table"
    )]
    super_return: Option<f64>,
    #[arg(long, default_value_t = 0.6, help = "Super percentage fee in percent")]
    super_fee_rate: f64,
    #[arg(long, default_value_t = 78.0, help = "Flat super admin fee per year")]
    super_admin_fee_yearly: f64,
    #[arg(long, help = "Concessional cap override; defaults to the settings cap")]
    concessional_cap_yearly: Option<f64>,

    #[arg(
        long,
        default_value_t = 0.0,
        help = "Current property value; 0 disables the property bucket"
    )]
    property_value: f64,
    #[arg(long, default_value_t = 0.0)]
    loan_balance: f64,
    #[arg(long, default_value_t = 6.0, help = "Loan interest rate in percent")]
    loan_interest_rate: f64,
    #[arg(long, value_enum, default_value_t = CliLoanType::PrincipalAndInterest)]
    loan_type: CliLoanType,
    #[arg(long, default_value_t = 30)]
    loan_term_years: u32,
    #[arg(long, default_value_t = 0.0)]
    weekly_rent: f64,
    #[arg(long, default_value_t = 7.0, help = "Property management fee as percent of rent")]
    management_fee_rate: f64,
    #[arg(long, default_value_t = 1_500.0)]
    insurance_yearly: f64,
    #[arg(long, default_value_t = 2_000.0)]
    council_rates_yearly: f64,
    #[arg(long, default_value_t = 5.0, help = "Maintenance as percent of rent")]
    maintenance_rate: f64,
    #[arg(long, default_value_t = 3.0, help = "Vacancy in percent of the year")]
    vacancy_rate: f64,
    #[arg(long, help = "Property growth in percent; defaults to the preset")]
    property_growth: Option<f64>,
    #[arg(long, help = "Rental growth in percent; defaults to the preset")]
    rental_growth: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    extra_repayment_monthly: f64,

    #[arg(long, default_value_t = 10_000.0)]
    portfolio_balance: f64,
    #[arg(long, default_value_t = 1_000.0)]
    dca_monthly: f64,
    #[arg(
        long,
        help = "Australian fund weight as a fraction; requires --global-weight, weights must sum to 1"
    )]
    aus_weight: Option<f64>,
    #[arg(long, help = "Global fund weight as a fraction; requires --aus-weight")]
    global_weight: Option<f64>,
    #[arg(long, default_value_t = 0.2, help = "Portfolio fee in percent")]
    portfolio_fee_rate: f64,
    #[arg(long, help = "Expected gross portfolio return in percent; defaults to the preset")]
    portfolio_return: Option<f64>,

    #[arg(long, default_value_t = 10_000.0)]
    buffer_balance: f64,
    #[arg(long, default_value_t = 0.0)]
    buffer_top_up_monthly: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Months of expense coverage below which discretionary investing pauses"
    )]
    buffer_trigger_months: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Months of expense coverage required before investing resumes"
    )]
    buffer_recovery_months: f64,
    #[arg(long, default_value_t = 0.0, help = "Cash buffer interest in percent")]
    buffer_interest_rate: f64,

    #[arg(long, default_value_t = 60)]
    preservation_age: u32,
    #[arg(long, default_value_t = 30_000.0, help = "Annual concessional contribution cap")]
    concessional_cap: f64,
    #[arg(long, default_value_t = 15.0, help = "Contributions tax in percent")]
    contributions_tax_rate: f64,
    #[arg(long, default_value_t = 15.0, help = "Super earnings tax in percent")]
    earnings_tax_rate: f64,
    #[arg(long, default_value_t = 4.0, help = "Retirement withdrawal rate in percent")]
    withdrawal_rate: f64,
    #[arg(long, value_enum, default_value_t = CliPauseScope::PortfolioAndProperty)]
    pause_scope: CliPauseScope,

    #[arg(long, value_enum, default_value_t = CliOutput::Json)]
    output: CliOutput,
}

#[derive(Debug)]
struct ProjectRequest {
    input: PlannerInput,
    settings: Settings,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(cli: Cli) -> Result<ProjectRequest, String> {
    if cli.retire_age < cli.current_age {
        return Err("--retire-age must be >= --current-age".to_string());
    }

    let goal = match (cli.target_income_yearly, cli.target_capital) {
        (Some(yearly), None) => {
            if yearly <= 0.0 {
                return Err("--target-income-yearly must be > 0".to_string());
            }
            Goal::Income { yearly }
        }
        (None, Some(amount)) => {
            if amount <= 0.0 {
                return Err("--target-capital must be > 0".to_string());
            }
            Goal::Capital { amount }
        }
        (Some(_), Some(_)) => {
            return Err(
                "--target-income-yearly and --target-capital are mutually exclusive".to_string(),
            );
        }
        (None, None) => {
            return Err(
                "exactly one of --target-income-yearly and --target-capital must be set"
                    .to_string(),
            );
        }
    };

    let allocation = match (cli.aus_weight, cli.global_weight) {
        (None, None) => Allocation::SingleFund,
        (Some(aus), Some(global)) => Allocation::TwoFund { aus, global },
        _ => {
            return Err("--aus-weight and --global-weight must be provided together".to_string());
        }
    };

    for (name, value) in [
        ("--super-guarantee-rate", cli.super_guarantee_rate),
        ("--super-fee-rate", cli.super_fee_rate),
        ("--portfolio-fee-rate", cli.portfolio_fee_rate),
        ("--loan-interest-rate", cli.loan_interest_rate),
        ("--management-fee-rate", cli.management_fee_rate),
        ("--maintenance-rate", cli.maintenance_rate),
        ("--vacancy-rate", cli.vacancy_rate),
        ("--contributions-tax-rate", cli.contributions_tax_rate),
        ("--earnings-tax-rate", cli.earnings_tax_rate),
        ("--buffer-interest-rate", cli.buffer_interest_rate),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    for (name, value) in [
        ("--inflation", cli.inflation),
        ("--wage-growth", cli.wage_growth),
        ("--super-return", cli.super_return),
        ("--portfolio-return", cli.portfolio_return),
        ("--property-growth", cli.property_growth),
        ("--rental-growth", cli.rental_growth),
    ] {
        if let Some(rate) = value {
            if !rate.is_finite() || rate <= -100.0 {
                return Err(format!("{name} must be > -100"));
            }
        }
    }

    if cli.withdrawal_rate <= 0.0 || cli.withdrawal_rate > 100.0 {
        return Err("--withdrawal-rate must be between 0 and 100".to_string());
    }

    if cli.buffer_recovery_months < cli.buffer_trigger_months {
        return Err("--buffer-recovery-months must be >= --buffer-trigger-months".to_string());
    }

    let property = if cli.property_value > 0.0 {
        if cli.loan_term_years == 0 {
            return Err("--loan-term-years must be >= 1".to_string());
        }
        Some(InvestmentProperty {
            value: cli.property_value,
            loan_balance: cli.loan_balance,
            interest_rate: cli.loan_interest_rate / 100.0,
            loan_type: cli.loan_type.into(),
            loan_term_years: cli.loan_term_years,
            weekly_rent: cli.weekly_rent,
            management_fee_rate: cli.management_fee_rate / 100.0,
            insurance_yearly: cli.insurance_yearly,
            council_rates_yearly: cli.council_rates_yearly,
            maintenance_rate: cli.maintenance_rate / 100.0,
            vacancy_rate: cli.vacancy_rate / 100.0,
            growth_rate: cli.property_growth.map(|r| r / 100.0),
            rental_growth_rate: cli.rental_growth.map(|r| r / 100.0),
            extra_repayment_monthly: cli.extra_repayment_monthly,
        })
    } else {
        None
    };

    let input = PlannerInput {
        plan: PlanGoal {
            current_age: cli.current_age,
            retire_age: cli.retire_age,
            goal,
            risk_profile: cli.risk_profile.into(),
            assumption_preset: cli.assumption_preset,
            inflation_override: cli.inflation.map(|r| r / 100.0),
        },
        income: IncomeExpense {
            salary_yearly: cli.salary_yearly,
            bonus_yearly: cli.bonus_yearly,
            wage_growth: cli.wage_growth.map(|r| r / 100.0),
            living_expenses_monthly: cli.living_expenses_monthly,
        },
        super_fund: SuperFund {
            balance: cli.super_balance,
            guarantee_rate: cli.super_guarantee_rate / 100.0,
            salary_sacrifice_monthly: cli.salary_sacrifice_monthly,
            option: cli.super_option.into(),
            expected_return: cli.super_return.map(|r| r / 100.0),
            fee_rate: cli.super_fee_rate / 100.0,
            admin_fee_yearly: cli.super_admin_fee_yearly,
            concessional_cap_yearly: cli.concessional_cap_yearly,
        },
        property,
        portfolio: Portfolio {
            balance: cli.portfolio_balance,
            dca_monthly: cli.dca_monthly,
            allocation,
            fee_rate: cli.portfolio_fee_rate / 100.0,
            expected_return: cli.portfolio_return.map(|r| r / 100.0),
        },
        buffers: CashBuffers {
            balance: cli.buffer_balance,
            top_up_monthly: cli.buffer_top_up_monthly,
            trigger_months: cli.buffer_trigger_months,
            recovery_months: cli.buffer_recovery_months,
            interest_rate: cli.buffer_interest_rate / 100.0,
        },
    };

    let settings = Settings {
        preservation_age: cli.preservation_age,
        concessional_cap_yearly: cli.concessional_cap,
        contributions_tax_rate: cli.contributions_tax_rate / 100.0,
        earnings_tax_rate: cli.earnings_tax_rate / 100.0,
        withdrawal_rate: cli.withdrawal_rate / 100.0,
        pause_scope: cli.pause_scope.into(),
    };

    Ok(ProjectRequest { input, settings })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/project/csv",
            get(project_csv_get_handler).post(project_csv_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("glidepath HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    match project_from_payload(payload) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(response) => response,
    }
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    match project_from_payload(payload) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(response) => response,
    }
}

async fn project_csv_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    match project_from_payload(payload) {
        Ok(result) => csv_response(&result),
        Err(response) => response,
    }
}

async fn project_csv_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    match project_from_payload(payload) {
        Ok(result) => csv_response(&result),
        Err(response) => response,
    }
}

fn project_from_payload(payload: ProjectPayload) -> Result<ScenarioResult, Response> {
    let request = request_from_payload(payload)
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, &msg))?;
    run_projection(&request.input, &request.settings)
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn csv_response(result: &ScenarioResult) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        render_csv(result),
    )
        .into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

/// One row per monthly data point, in the export shape consumed by the
/// reporting side: outside-super aggregates portfolio, cash, and property
/// equity; property columns are empty when no property is modeled.
pub fn render_csv(result: &ScenarioResult) -> String {
    let mut out = String::from(
        "month,age,netWorth,superBalance,outsideSuperBalance,cashBalance,propertyValue,loanBalance,dcaPaused\n",
    );
    for point in &result.monthly {
        let outside_super = point.portfolio_balance
            + point.cash_balance
            + point.property_equity.unwrap_or(0.0);
        let property_value = point
            .property_value
            .map(|v| format!("{v:.2}"))
            .unwrap_or_default();
        let loan_balance = point
            .loan_balance
            .map(|v| format!("{v:.2}"))
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{:.4},{:.2},{:.2},{:.2},{:.2},{},{},{}\n",
            point.month,
            point.age,
            point.net_worth,
            point.super_balance,
            outside_super,
            point.cash_balance,
            property_value,
            loan_balance,
            point.dca_paused,
        ));
    }
    out
}

fn request_from_payload(payload: ProjectPayload) -> Result<ProjectRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retire_age {
        cli.retire_age = v;
    }
    if payload.target_income_yearly.is_some() || payload.target_capital.is_some() {
        cli.target_income_yearly = payload.target_income_yearly;
        cli.target_capital = payload.target_capital;
    }
    if let Some(v) = payload.risk_profile {
        cli.risk_profile = v.into();
    }
    if let Some(v) = payload.assumption_preset {
        cli.assumption_preset = Some(v);
    }
    if let Some(v) = payload.inflation {
        cli.inflation = Some(v);
    }

    if let Some(v) = payload.salary_yearly {
        cli.salary_yearly = v;
    }
    if let Some(v) = payload.bonus_yearly {
        cli.bonus_yearly = v;
    }
    if let Some(v) = payload.wage_growth {
        cli.wage_growth = Some(v);
    }
    if let Some(v) = payload.living_expenses_monthly {
        cli.living_expenses_monthly = v;
    }

    if let Some(v) = payload.super_balance {
        cli.super_balance = v;
    }
    if let Some(v) = payload.super_guarantee_rate {
        cli.super_guarantee_rate = v;
    }
    if let Some(v) = payload.salary_sacrifice_monthly {
        cli.salary_sacrifice_monthly = v;
    }
    if let Some(v) = payload.super_option {
        cli.super_option = v.into();
    }
    if let Some(v) = payload.super_return {
        cli.super_return = Some(v);
    }
    if let Some(v) = payload.super_fee_rate {
        cli.super_fee_rate = v;
    }
    if let Some(v) = payload.super_admin_fee_yearly {
        cli.super_admin_fee_yearly = v;
    }
    if let Some(v) = payload.concessional_cap_yearly {
        cli.concessional_cap_yearly = Some(v);
    }

    if let Some(v) = payload.property_value {
        cli.property_value = v;
    }
    if let Some(v) = payload.loan_balance {
        cli.loan_balance = v;
    }
    if let Some(v) = payload.loan_interest_rate {
        cli.loan_interest_rate = v;
    }
    if let Some(v) = payload.loan_type {
        cli.loan_type = v.into();
    }
    if let Some(v) = payload.loan_term_years {
        cli.loan_term_years = v;
    }
    if let Some(v) = payload.weekly_rent {
        cli.weekly_rent = v;
    }
    if let Some(v) = payload.management_fee_rate {
        cli.management_fee_rate = v;
    }
    if let Some(v) = payload.insurance_yearly {
        cli.insurance_yearly = v;
    }
    if let Some(v) = payload.council_rates_yearly {
        cli.council_rates_yearly = v;
    }
    if let Some(v) = payload.maintenance_rate {
        cli.maintenance_rate = v;
    }
    if let Some(v) = payload.vacancy_rate {
        cli.vacancy_rate = v;
    }
    if let Some(v) = payload.property_growth {
        cli.property_growth = Some(v);
    }
    if let Some(v) = payload.rental_growth {
        cli.rental_growth = Some(v);
    }
    if let Some(v) = payload.extra_repayment_monthly {
        cli.extra_repayment_monthly = v;
    }

    if let Some(v) = payload.portfolio_balance {
        cli.portfolio_balance = v;
    }
    if let Some(v) = payload.dca_monthly {
        cli.dca_monthly = v;
    }
    if let Some(v) = payload.aus_weight {
        cli.aus_weight = Some(v);
    }
    if let Some(v) = payload.global_weight {
        cli.global_weight = Some(v);
    }
    if let Some(v) = payload.portfolio_fee_rate {
        cli.portfolio_fee_rate = v;
    }
    if let Some(v) = payload.portfolio_return {
        cli.portfolio_return = Some(v);
    }

    if let Some(v) = payload.buffer_balance {
        cli.buffer_balance = v;
    }
    if let Some(v) = payload.buffer_top_up_monthly {
        cli.buffer_top_up_monthly = v;
    }
    if let Some(v) = payload.buffer_trigger_months {
        cli.buffer_trigger_months = v;
    }
    if let Some(v) = payload.buffer_recovery_months {
        cli.buffer_recovery_months = v;
    }
    if let Some(v) = payload.buffer_interest_rate {
        cli.buffer_interest_rate = v;
    }

    if let Some(v) = payload.preservation_age {
        cli.preservation_age = v;
    }
    if let Some(v) = payload.concessional_cap {
        cli.concessional_cap = v;
    }
    if let Some(v) = payload.contributions_tax_rate {
        cli.contributions_tax_rate = v;
    }
    if let Some(v) = payload.earnings_tax_rate {
        cli.earnings_tax_rate = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        cli.withdrawal_rate = v;
    }
    if let Some(v) = payload.pause_scope {
        cli.pause_scope = v.into();
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 30,
        retire_age: 65,
        target_income_yearly: Some(60_000.0),
        target_capital: None,
        risk_profile: CliRiskProfile::Balanced,
        assumption_preset: None,
        inflation: None,
        salary_yearly: 100_000.0,
        bonus_yearly: 0.0,
        wage_growth: None,
        living_expenses_monthly: 4_000.0,
        super_balance: 150_000.0,
        super_guarantee_rate: 11.5,
        salary_sacrifice_monthly: 0.0,
        super_option: CliSuperOption::Balanced,
        super_return: None,
        super_fee_rate: 0.6,
        super_admin_fee_yearly: 78.0,
        concessional_cap_yearly: None,
        property_value: 0.0,
        loan_balance: 0.0,
        loan_interest_rate: 6.0,
        loan_type: CliLoanType::PrincipalAndInterest,
        loan_term_years: 30,
        weekly_rent: 0.0,
        management_fee_rate: 7.0,
        insurance_yearly: 1_500.0,
        council_rates_yearly: 2_000.0,
        maintenance_rate: 5.0,
        vacancy_rate: 3.0,
        property_growth: None,
        rental_growth: None,
        extra_repayment_monthly: 0.0,
        portfolio_balance: 10_000.0,
        dca_monthly: 1_000.0,
        aus_weight: None,
        global_weight: None,
        portfolio_fee_rate: 0.2,
        portfolio_return: None,
        buffer_balance: 10_000.0,
        buffer_top_up_monthly: 0.0,
        buffer_trigger_months: 3.0,
        buffer_recovery_months: 6.0,
        buffer_interest_rate: 0.0,
        preservation_age: 60,
        concessional_cap: 30_000.0,
        contributions_tax_rate: 15.0,
        earnings_tax_rate: 15.0,
        withdrawal_rate: 4.0,
        pause_scope: CliPauseScope::PortfolioAndProperty,
        output: CliOutput::Json,
    }
}

/// One-shot projection from the command line, printed as JSON or CSV.
pub fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();
    let output = cli.output;
    let request = build_request(cli)?;
    let result =
        run_projection(&request.input, &request.settings).map_err(|e| e.to_string())?;
    match output {
        CliOutput::Json => {
            let body = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
            println!("{body}");
        }
        CliOutput::Csv => print!("{}", render_csv(&result)),
    }
    Ok(())
}

#[cfg(test)]
fn request_from_json(json: &str) -> Result<ProjectRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    request_from_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_request_converts_percent_rates_to_fractions() {
        let request = build_request(sample_cli()).expect("valid request");
        let input = request.input;
        assert_approx(input.super_fund.guarantee_rate, 0.115);
        assert_approx(input.super_fund.fee_rate, 0.006);
        assert_approx(input.portfolio.fee_rate, 0.002);
        assert_approx(request.settings.contributions_tax_rate, 0.15);
        assert_approx(request.settings.withdrawal_rate, 0.04);
    }

    #[test]
    fn build_request_requires_exactly_one_goal() {
        let mut cli = sample_cli();
        cli.target_income_yearly = None;
        cli.target_capital = None;
        let err = build_request(cli).expect_err("must reject");
        assert!(err.contains("exactly one"));

        let mut cli = sample_cli();
        cli.target_income_yearly = Some(60_000.0);
        cli.target_capital = Some(1_500_000.0);
        let err = build_request(cli).expect_err("must reject");
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn build_request_requires_paired_weights() {
        let mut cli = sample_cli();
        cli.aus_weight = Some(0.4);
        let err = build_request(cli).expect_err("must reject");
        assert!(err.contains("--aus-weight"));
    }

    #[test]
    fn build_request_rejects_out_of_range_percentages() {
        let mut cli = sample_cli();
        cli.super_guarantee_rate = 150.0;
        let err = build_request(cli).expect_err("must reject");
        assert!(err.contains("--super-guarantee-rate"));
    }

    #[test]
    fn build_request_rejects_inverted_buffer_thresholds() {
        let mut cli = sample_cli();
        cli.buffer_trigger_months = 6.0;
        cli.buffer_recovery_months = 3.0;
        let err = build_request(cli).expect_err("must reject");
        assert!(err.contains("--buffer-recovery-months"));
    }

    #[test]
    fn property_bucket_is_disabled_at_zero_value() {
        let request = build_request(sample_cli()).expect("valid request");
        assert!(request.input.property.is_none());

        let mut cli = sample_cli();
        cli.property_value = 800_000.0;
        cli.loan_balance = 500_000.0;
        cli.weekly_rent = 600.0;
        let request = build_request(cli).expect("valid request");
        let property = request.input.property.expect("property enabled");
        assert_approx(property.interest_rate, 0.06);
        assert_approx(property.vacancy_rate, 0.03);
    }

    #[test]
    fn request_from_json_parses_web_keys() {
        let json = r#"{
          "currentAge": 31,
          "retireAge": 60,
          "targetCapital": 2000000,
          "riskProfile": "growth",
          "salaryYearly": 120000,
          "sgRate": 12,
          "superOption": "high-growth",
          "propertyValue": 750000,
          "loanBalance": 400000,
          "loanType": "interestOnly",
          "weeklyRent": 550,
          "dca": 1500,
          "ausWeight": 0.4,
          "globalWeight": 0.6,
          "bufferTriggerMonths": 2,
          "bufferRecoveryMonths": 4,
          "pauseScope": "portfolio-only"
        }"#;
        let request = request_from_json(json).expect("json should parse");
        let input = &request.input;

        assert_eq!(input.plan.current_age, 31);
        assert_eq!(input.plan.retire_age, 60);
        assert_eq!(input.plan.goal, Goal::Capital { amount: 2_000_000.0 });
        assert_eq!(input.plan.risk_profile, RiskProfile::Growth);
        assert_approx(input.super_fund.guarantee_rate, 0.12);
        assert_eq!(input.super_fund.option, SuperOption::HighGrowth);
        let property = input.property.as_ref().expect("property enabled");
        assert_eq!(property.loan_type, LoanType::InterestOnly);
        assert_approx(input.portfolio.dca_monthly, 1_500.0);
        assert_eq!(
            input.portfolio.allocation,
            Allocation::TwoFund {
                aus: 0.4,
                global: 0.6
            }
        );
        assert_eq!(request.settings.pause_scope, PauseScope::PortfolioOnly);
    }

    #[test]
    fn mismatched_weights_surface_the_core_error() {
        let json = r#"{ "ausWeight": 0.4, "globalWeight": 0.59 }"#;
        let request = request_from_json(json).expect("payload itself is well-formed");
        let err = run_projection(&request.input, &request.settings).expect_err("must reject");
        assert!(err.to_string().contains("sum to 1"));
    }

    #[test]
    fn csv_document_has_the_export_columns() {
        let request = build_request(sample_cli()).expect("valid request");
        let result = run_projection(&request.input, &request.settings).expect("must run");
        let csv = render_csv(&result);

        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(
                "month,age,netWorth,superBalance,outsideSuperBalance,cashBalance,propertyValue,loanBalance,dcaPaused"
            )
        );
        assert_eq!(lines.count(), result.monthly.len());

        let first_row = csv.lines().nth(1).expect("data row");
        assert_eq!(first_row.split(',').count(), 9);
        // No property in the default scenario: empty property cells.
        assert!(first_row.contains(",,"));
    }
}
