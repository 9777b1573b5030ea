mod engine;
mod kpi;
mod rates;
mod types;

pub use engine::run_projection;
pub use rates::resolve_rates;
pub use types::{
    Allocation, CashBuffers, ConfigError, Goal, IncomeExpense, InvestmentProperty, Kpis, LoanType,
    MonthlyDataPoint, PauseScope, PlanGoal, PlannerInput, Portfolio, RateSet, RiskProfile,
    RunMeta, ScenarioResult, Settings, SuperFund, SuperOption,
};
