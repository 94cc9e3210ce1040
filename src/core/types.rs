use serde::{Deserialize, Serialize};

use super::allocation::AllocationSnapshot;

pub const DEFAULT_DIVIDEND_TAX_RATE: f64 = 0.154;
pub const DEFAULT_MAX_AGE: u32 = 100;
pub const AGE_LIMIT: u32 = 120;
pub const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub annual_return_pct: f64,
    pub dividend_pct: f64,
    #[serde(default)]
    pub builtin: bool,
}

impl Preset {
    /// Stand-in for a preset id that no longer exists in the registry.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Unknown".to_string(),
            annual_return_pct: 0.0,
            dividend_pct: 0.0,
            builtin: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct AgeMonth {
    pub age: u32,
    pub month: u32,
}

impl AgeMonth {
    pub fn new(age: u32, month: u32) -> Self {
        Self { age, month }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventFamily {
    Portfolio,
    Contribution,
    LumpSum,
    Withdrawal,
    Income,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    #[serde(alias = "portfolio", rename_all = "camelCase")]
    PortfolioChange { preset_id: String, weight: u32 },
    #[serde(alias = "monthly")]
    MonthlyContribution { amount: f64 },
    #[serde(alias = "lump")]
    LumpSum { amount: f64 },
    #[serde(alias = "withdrawal", alias = "cash-out")]
    RecurringWithdrawal { amount: f64 },
    #[serde(alias = "income")]
    RecurringIncome { amount: f64 },
}

impl EventKind {
    pub fn family(&self) -> EventFamily {
        match self {
            EventKind::PortfolioChange { .. } => EventFamily::Portfolio,
            EventKind::MonthlyContribution { .. } => EventFamily::Contribution,
            EventKind::LumpSum { .. } => EventFamily::LumpSum,
            EventKind::RecurringWithdrawal { .. } => EventFamily::Withdrawal,
            EventKind::RecurringIncome { .. } => EventFamily::Income,
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            EventKind::PortfolioChange { .. } => None,
            EventKind::MonthlyContribution { amount }
            | EventKind::LumpSum { amount }
            | EventKind::RecurringWithdrawal { amount }
            | EventKind::RecurringIncome { amount } => Some(*amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub age: u32,
    #[serde(default = "default_month")]
    pub month: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

fn default_month() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl Event {
    pub fn new(id: impl Into<String>, age: u32, month: u32, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            age,
            month,
            enabled: true,
            label: None,
            kind,
        }
    }

    pub fn at(&self) -> AgeMonth {
        AgeMonth::new(self.age, self.month)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionInputs {
    pub presets: Vec<Preset>,
    pub events: Vec<Event>,
    pub start_age: u32,
    pub retire_age: u32,
    pub max_age: u32,
    pub start_year: i32,
    pub dividend_tax_rate: f64,
    /// Folded into a lump sum at (start_age, month 1).
    pub initial_lump_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSnapshot {
    pub month: u32,
    pub contribution: f64,
    pub return_earned: f64,
    pub dividends: f64,
    pub withdrawal: f64,
    pub cash_flow: f64,
    pub balance: f64,
    pub rebalanced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingBreakdown {
    /// `None` for the synthetic uninvested-cash entry.
    pub preset_id: Option<String>,
    pub name: String,
    pub balance: f64,
    pub return_earned: f64,
    pub dividends: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodResult {
    pub age: u32,
    pub year: i32,
    pub monthly: Vec<MonthSnapshot>,
    pub annual_contribution: f64,
    pub annual_return: f64,
    pub annual_dividend: f64,
    pub annual_withdrawal: f64,
    pub annual_cash_flow: f64,
    pub end_balance: f64,
    pub allocation: AllocationSnapshot,
    pub holdings: Vec<HoldingBreakdown>,
    pub retirement_year: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub start_age: u32,
    pub retire_age: u32,
    pub max_age: u32,
    pub periods: Vec<PeriodResult>,
    pub sustainable_monthly_withdrawal: f64,
}

impl ProjectionResult {
    pub fn period_at(&self, age: u32) -> Option<&PeriodResult> {
        self.periods.iter().find(|p| p.age == age)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedProfile {
    pub annual_return_pct: f64,
    pub dividend_pct: f64,
}

impl BlendedProfile {
    pub fn monthly_growth_rate(self, dividend_tax_rate: f64) -> f64 {
        self.annual_return_pct / 100.0 / 12.0
            + self.dividend_pct / 100.0 / 12.0 * (1.0 - dividend_tax_rate)
    }
}
