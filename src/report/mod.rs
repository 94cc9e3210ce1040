//! Display rows, chart series and money formatting built from a finished
//! projection. Nothing here feeds back into the engine.

use serde::Serialize;

use crate::core::{
    Event, EventKind, HoldingBreakdown, PeriodResult, PresetRegistry, ProjectionResult,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeFilter {
    pub from: u32,
    pub to: u32,
}

impl AgeFilter {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }

    pub fn contains(&self, age: u32) -> bool {
        (self.from..=self.to).contains(&age)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStatus {
    Directed,
    UninvestedCash,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLine {
    pub description: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualRow {
    pub year: i32,
    pub age: u32,
    pub contribution: f64,
    pub return_earned: f64,
    pub dividends: f64,
    pub withdrawal: f64,
    pub cash_flow: f64,
    pub end_balance: f64,
    pub allocation_labels: Vec<String>,
    pub allocation_status: AllocationStatus,
    pub holdings: Vec<HoldingBreakdown>,
    pub retirement_year: bool,
    pub has_events: bool,
    pub events: Vec<EventLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub year: i32,
    pub age: u32,
    pub principal: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub retire_age: u32,
    pub retirement_year: Option<i32>,
    pub retirement_balance: Option<f64>,
    pub final_age: Option<u32>,
    pub final_year: Option<i32>,
    pub final_balance: Option<f64>,
    pub sustainable_monthly_withdrawal: f64,
}

pub fn build_rows(
    result: &ProjectionResult,
    events: &[Event],
    registry: &PresetRegistry,
    filter: AgeFilter,
) -> Vec<AnnualRow> {
    result
        .periods
        .iter()
        .filter(|p| filter.contains(p.age))
        .map(|p| build_row(p, events, registry))
        .collect()
}

fn build_row(period: &PeriodResult, events: &[Event], registry: &PresetRegistry) -> AnnualRow {
    let allocation_labels = period
        .allocation
        .iter()
        .map(|slice| {
            format!(
                "{}: {:.0}%",
                registry.resolve(&slice.preset_id).name,
                (slice.weight_fraction * 100.0).round()
            )
        })
        .collect();

    let allocation_status = if !period.allocation.is_empty() {
        AllocationStatus::Directed
    } else if period.end_balance > 0.0 {
        AllocationStatus::UninvestedCash
    } else {
        AllocationStatus::Undefined
    };

    // Disabled events are listed too so the row can show them struck out.
    let events: Vec<EventLine> = events
        .iter()
        .filter(|e| e.age == period.age)
        .map(|e| EventLine {
            description: describe_event(e, registry),
            enabled: e.enabled,
        })
        .collect();

    AnnualRow {
        year: period.year,
        age: period.age,
        contribution: period.annual_contribution,
        return_earned: period.annual_return,
        dividends: period.annual_dividend,
        withdrawal: period.annual_withdrawal,
        cash_flow: period.annual_cash_flow,
        end_balance: period.end_balance,
        allocation_labels,
        allocation_status,
        holdings: period.holdings.clone(),
        retirement_year: period.retirement_year,
        has_events: !events.is_empty(),
        events,
    }
}

pub fn describe_event(event: &Event, registry: &PresetRegistry) -> String {
    let prefix = event
        .label
        .as_deref()
        .map(|l| format!("{l}: "))
        .unwrap_or_default();
    match &event.kind {
        EventKind::PortfolioChange { preset_id, weight } => format!(
            "Portfolio: {} (weight {weight})",
            registry.resolve(preset_id).name
        ),
        EventKind::MonthlyContribution { amount } => {
            format!("{prefix}Monthly contribution {}", format_money(*amount, false))
        }
        EventKind::LumpSum { amount } if *amount >= 0.0 => {
            format!("{prefix}Deposit {}", format_money(amount.abs(), false))
        }
        EventKind::LumpSum { amount } => {
            format!("{prefix}Withdraw {}", format_money(amount.abs(), false))
        }
        EventKind::RecurringWithdrawal { amount } => {
            format!("{prefix}Monthly withdrawal {}", format_money(*amount, false))
        }
        EventKind::RecurringIncome { amount } => {
            format!("{prefix}Monthly income {}", format_money(*amount, false))
        }
    }
}

pub fn build_chart(result: &ProjectionResult, filter: AgeFilter) -> Vec<ChartPoint> {
    let mut cumulative = 0.0;
    let mut points = Vec::new();
    for period in &result.periods {
        cumulative += period.annual_contribution - period.annual_withdrawal;
        if !filter.contains(period.age) {
            continue;
        }
        let principal = cumulative.min(period.end_balance).max(0.0);
        points.push(ChartPoint {
            year: period.year,
            age: period.age,
            principal,
            growth: (period.end_balance - principal).max(0.0),
        });
    }
    points
}

pub fn summarize(result: &ProjectionResult) -> Summary {
    let retirement = result.period_at(result.retire_age);
    let last = result.periods.last();
    Summary {
        retire_age: result.retire_age,
        retirement_year: retirement.map(|p| p.year),
        retirement_balance: retirement.map(|p| p.end_balance),
        final_age: last.map(|p| p.age),
        final_year: last.map(|p| p.year),
        final_balance: last.map(|p| p.end_balance),
        sustainable_monthly_withdrawal: result.sustainable_monthly_withdrawal,
    }
}

/// Renders an amount in won. Compact mode abbreviates to 억 (1e8) and
/// 만 (1e4); smaller amounts always use the full form.
pub fn format_money(amount: f64, compact: bool) -> String {
    if !amount.is_finite() {
        return "0원".to_string();
    }

    if compact {
        if amount.abs() >= 100_000_000.0 {
            let value = (amount / 100_000_000.0 * 100.0).round() / 100.0;
            return format!("{}억", trim_decimals(&format!("{value:.2}")));
        }
        if amount.abs() >= 10_000.0 {
            return format!("{:.0}만", (amount / 10_000.0).round());
        }
    }

    // Half rounds up, matching how the amounts were always shown.
    let rounded = (amount + 0.5).floor();
    let digits = group_thousands(rounded.abs() as u64);
    if rounded < 0.0 {
        format!("-{digits}원")
    } else {
        format!("{digits}원")
    }
}

fn trim_decimals(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn group_thousands(n: u64) -> String {
    let raw = n.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
