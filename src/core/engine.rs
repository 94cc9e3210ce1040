use std::borrow::Cow;

use tracing::{debug, warn};

use super::allocation::{AllocationSnapshot, resolve_allocation};
use super::presets::PresetRegistry;
use super::solver::sustainable_withdrawal_for_period;
use super::timeline::EventTimeline;
use super::types::{
    AgeMonth, Event, EventKind, HoldingBreakdown, MONTHS_PER_YEAR, MonthSnapshot, PeriodResult,
    ProjectionInputs, ProjectionResult,
};

const UNINVESTED_CASH_LABEL: &str = "Uninvested cash";

#[derive(Debug, Clone, PartialEq)]
struct Holding {
    preset_id: String,
    target_weight: f64,
    balance: f64,
    year_return: f64,
    year_dividend: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PortfolioState {
    holdings: Vec<Holding>,
    uninvested_cash: f64,
    // Presets dropped by a rebalance this year, kept at zero balance.
    retired: Vec<Holding>,
}

impl PortfolioState {
    fn invested(&self) -> f64 {
        self.holdings.iter().map(|h| h.balance).sum()
    }

    fn total(&self) -> f64 {
        self.invested() + self.uninvested_cash
    }

    fn reset_year_accruals(&mut self) {
        for holding in &mut self.holdings {
            holding.year_return = 0.0;
            holding.year_dividend = 0.0;
        }
        self.retired.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct MonthContext<'a> {
    at: AgeMonth,
    allocation: &'a AllocationSnapshot,
    allocation_changed: bool,
    contribution: f64,
    lump_sum: f64,
    recurring_withdrawal: f64,
    recurring_income: f64,
    registry: &'a PresetRegistry,
    dividend_tax_rate: f64,
}

#[derive(Debug)]
struct MonthOutcome {
    state: PortfolioState,
    snapshot: MonthSnapshot,
}

pub fn run_projection(inputs: &ProjectionInputs) -> Vec<PeriodResult> {
    let registry = PresetRegistry::new(inputs.presets.clone());
    let events = events_with_initial_lump_sum(inputs);
    project(inputs, &registry, &events)
}

pub fn run_projection_with_summary(inputs: &ProjectionInputs) -> ProjectionResult {
    let registry = PresetRegistry::new(inputs.presets.clone());
    let events = events_with_initial_lump_sum(inputs);
    let periods = project(inputs, &registry, &events);

    let sustainable_monthly_withdrawal = periods
        .iter()
        .find(|p| p.age == inputs.retire_age)
        .map(|p| sustainable_withdrawal_for_period(p, &registry, inputs.dividend_tax_rate))
        .unwrap_or(0.0);

    ProjectionResult {
        start_age: inputs.start_age,
        retire_age: inputs.retire_age,
        max_age: inputs.max_age,
        periods,
        sustainable_monthly_withdrawal,
    }
}

fn events_with_initial_lump_sum(inputs: &ProjectionInputs) -> Cow<'_, [Event]> {
    if inputs.initial_lump_sum == 0.0 {
        return Cow::Borrowed(&inputs.events);
    }
    let mut events = inputs.events.clone();
    events.push(Event::new(
        "initial-investment",
        inputs.start_age,
        1,
        EventKind::LumpSum {
            amount: inputs.initial_lump_sum,
        },
    ));
    Cow::Owned(events)
}

fn project(
    inputs: &ProjectionInputs,
    registry: &PresetRegistry,
    events: &[Event],
) -> Vec<PeriodResult> {
    for preset_id in registry.dangling_references(events) {
        warn!(preset_id, "allocation references unknown preset; using zero-rate placeholder");
    }

    if inputs.max_age < inputs.start_age {
        return Vec::new();
    }

    let timeline = EventTimeline::new(events);
    let mut state = PortfolioState::default();
    let mut last_signature = String::new();
    let mut periods = Vec::with_capacity((inputs.max_age - inputs.start_age + 1) as usize);

    for age in inputs.start_age..=inputs.max_age {
        state.reset_year_accruals();
        let mut monthly = Vec::with_capacity(MONTHS_PER_YEAR as usize);
        let mut allocation = AllocationSnapshot::empty();

        for month in 1..=MONTHS_PER_YEAR {
            let at = AgeMonth::new(age, month);
            allocation = resolve_allocation(&timeline, at);
            let signature = allocation.signature();
            let allocation_changed = signature != last_signature;
            if allocation_changed && !allocation.is_empty() {
                last_signature = signature;
            }

            let ctx = MonthContext {
                at,
                allocation: &allocation,
                allocation_changed,
                contribution: timeline.monthly_contribution(at),
                lump_sum: timeline.lump_sum_at(at),
                recurring_withdrawal: timeline.recurring_withdrawal(at),
                recurring_income: timeline.recurring_income(at),
                registry,
                dividend_tax_rate: inputs.dividend_tax_rate,
            };
            let outcome = advance_month(state, &ctx);
            state = outcome.state;
            monthly.push(outcome.snapshot);
        }

        periods.push(build_period(
            inputs, age, monthly, allocation, &state, registry,
        ));
    }

    debug!(
        start_age = inputs.start_age,
        max_age = inputs.max_age,
        final_balance = periods.last().map(|p| p.end_balance).unwrap_or(0.0),
        "projection finished"
    );
    periods
}

fn build_period(
    inputs: &ProjectionInputs,
    age: u32,
    monthly: Vec<MonthSnapshot>,
    allocation: AllocationSnapshot,
    state: &PortfolioState,
    registry: &PresetRegistry,
) -> PeriodResult {
    let mut holdings: Vec<HoldingBreakdown> = state
        .holdings
        .iter()
        .chain(&state.retired)
        .map(|h| HoldingBreakdown {
            preset_id: Some(h.preset_id.clone()),
            name: registry.resolve(&h.preset_id).name.clone(),
            balance: h.balance,
            return_earned: h.year_return,
            dividends: h.year_dividend,
        })
        .collect();
    if state.uninvested_cash > 0.0 {
        holdings.push(HoldingBreakdown {
            preset_id: None,
            name: UNINVESTED_CASH_LABEL.to_string(),
            balance: state.uninvested_cash,
            return_earned: 0.0,
            dividends: 0.0,
        });
    }

    PeriodResult {
        age,
        year: inputs.start_year + (age - inputs.start_age) as i32,
        annual_contribution: sum_months(&monthly, |m| m.contribution),
        annual_return: sum_months(&monthly, |m| m.return_earned),
        annual_dividend: sum_months(&monthly, |m| m.dividends),
        annual_withdrawal: sum_months(&monthly, |m| m.withdrawal),
        annual_cash_flow: sum_months(&monthly, |m| m.cash_flow),
        end_balance: monthly.last().map(|m| m.balance).unwrap_or(0.0),
        monthly,
        allocation,
        holdings,
        retirement_year: age == inputs.retire_age,
    }
}

fn sum_months(monthly: &[MonthSnapshot], field: impl Fn(&MonthSnapshot) -> f64) -> f64 {
    monthly.iter().map(field).sum()
}

fn advance_month(state: PortfolioState, ctx: &MonthContext<'_>) -> MonthOutcome {
    let mut state = state;

    let rebalanced = ctx.allocation_changed && !ctx.allocation.is_empty();
    if rebalanced {
        debug!(
            age = ctx.at.age,
            month = ctx.at.month,
            pool = state.total(),
            signature = %ctx.allocation.signature(),
            "rebalancing into new allocation"
        );
        rebalance(&mut state, ctx.allocation);
    }

    let (contribution, deferred_withdrawal) = apply_cash_intake(&mut state, ctx);
    reinvest_uninvested_cash(&mut state, ctx.allocation);
    let (return_earned, dividends) = apply_monthly_growth(&mut state, ctx);

    let net_withdrawal = (ctx.recurring_withdrawal - ctx.recurring_income).max(0.0);
    let withdrawal = withdraw_pro_rata(&mut state, net_withdrawal + deferred_withdrawal);

    let snapshot = MonthSnapshot {
        month: ctx.at.month,
        contribution,
        return_earned,
        dividends,
        withdrawal,
        cash_flow: ctx.recurring_income + withdrawal,
        balance: state.total(),
        rebalanced,
    };
    MonthOutcome { state, snapshot }
}

/// Liquidates everything into one pool and splits it by target weight.
/// Yearly accruals follow the preset so the annual breakdown stays whole.
fn rebalance(state: &mut PortfolioState, allocation: &AllocationSnapshot) {
    let pool = state.total();
    let mut previous = std::mem::take(&mut state.holdings);
    previous.append(&mut state.retired);

    state.holdings = allocation
        .iter()
        .map(|slice| {
            let carried = previous.iter().filter(|h| h.preset_id == slice.preset_id);
            let (year_return, year_dividend) = carried.fold((0.0, 0.0), |(r, d), h| {
                (r + h.year_return, d + h.year_dividend)
            });
            Holding {
                preset_id: slice.preset_id.clone(),
                target_weight: slice.weight_fraction,
                balance: pool * slice.weight_fraction,
                year_return,
                year_dividend,
            }
        })
        .collect();

    state.retired = previous
        .into_iter()
        .filter(|h| !allocation.iter().any(|s| s.preset_id == h.preset_id))
        .filter(|h| h.year_return != 0.0 || h.year_dividend != 0.0)
        .map(|h| Holding {
            target_weight: 0.0,
            balance: 0.0,
            ..h
        })
        .collect();
    state.uninvested_cash = 0.0;
}

fn apply_cash_intake(state: &mut PortfolioState, ctx: &MonthContext<'_>) -> (f64, f64) {
    let contribution = ctx.contribution.max(0.0);
    let deposit = ctx.lump_sum.max(0.0);
    let deferred_withdrawal = (-ctx.lump_sum).max(0.0);

    state.uninvested_cash += contribution + deposit;
    (contribution + deposit, deferred_withdrawal)
}

fn reinvest_uninvested_cash(state: &mut PortfolioState, allocation: &AllocationSnapshot) {
    let cash = state.uninvested_cash;
    if cash <= 0.0 {
        return;
    }

    if state.holdings.is_empty() {
        if allocation.is_empty() {
            return;
        }
        state.holdings = allocation
            .iter()
            .map(|slice| Holding {
                preset_id: slice.preset_id.clone(),
                target_weight: slice.weight_fraction,
                balance: cash * slice.weight_fraction,
                year_return: 0.0,
                year_dividend: 0.0,
            })
            .collect();
        state.uninvested_cash = 0.0;
        return;
    }

    let invested = state.invested();
    for holding in &mut state.holdings {
        let share = if invested > 0.0 {
            holding.balance / invested
        } else {
            holding.target_weight
        };
        holding.balance += cash * share;
    }
    state.uninvested_cash = 0.0;
}

fn apply_monthly_growth(state: &mut PortfolioState, ctx: &MonthContext<'_>) -> (f64, f64) {
    let mut return_total = 0.0;
    let mut dividend_total = 0.0;

    for holding in &mut state.holdings {
        let preset = ctx.registry.resolve(&holding.preset_id);
        let price_return = holding.balance * (preset.annual_return_pct / 100.0 / 12.0);
        let dividend = holding.balance
            * (preset.dividend_pct / 100.0 / 12.0)
            * (1.0 - ctx.dividend_tax_rate);

        holding.balance += price_return + dividend;
        holding.year_return += price_return;
        holding.year_dividend += dividend;
        return_total += price_return;
        dividend_total += dividend;
    }

    (return_total, dividend_total)
}

/// Reduces every holding by the same fraction. Draws at most what is
/// invested; uninvested cash is not drawable.
fn withdraw_pro_rata(state: &mut PortfolioState, demand: f64) -> f64 {
    if demand <= 0.0 {
        return 0.0;
    }

    let drawable = state.invested();
    let draw = drawable.min(demand);
    if draw <= 0.0 || drawable <= 0.0 {
        return 0.0;
    }

    let fraction = draw / drawable;
    for holding in &mut state.holdings {
        holding.balance = (holding.balance - holding.balance * fraction).max(0.0);
    }
    draw
}
