use tracing::{debug, warn};

use super::presets::PresetRegistry;
use super::types::{BlendedProfile, MONTHS_PER_YEAR, PeriodResult};
use crate::error::{Error, Result};

pub const SUSTAINABLE_HORIZON_AGE: u32 = 90;
pub const SUSTAINABLE_FLOOR_RATIO: f64 = 0.2;
pub const SOLVER_ITERATIONS: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalSolveConfig {
    pub retirement_balance: f64,
    pub retirement_age: u32,
    pub profile: BlendedProfile,
    pub dividend_tax_rate: f64,
    pub horizon_age: u32,
    pub floor_ratio: f64,
    pub iterations: u32,
}

impl WithdrawalSolveConfig {
    pub fn new(
        retirement_balance: f64,
        retirement_age: u32,
        profile: BlendedProfile,
        dividend_tax_rate: f64,
    ) -> Self {
        Self {
            retirement_balance,
            retirement_age,
            profile,
            dividend_tax_rate,
            horizon_age: SUSTAINABLE_HORIZON_AGE,
            floor_ratio: SUSTAINABLE_FLOOR_RATIO,
            iterations: SOLVER_ITERATIONS,
        }
    }

    fn months(&self) -> u32 {
        self.horizon_age.saturating_sub(self.retirement_age) * MONTHS_PER_YEAR
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate: f64,
    pub terminal_balance: f64,
}

#[derive(Debug, Clone)]
pub struct WithdrawalSolveResult {
    pub monthly_withdrawal: f64,
    pub floor_balance: f64,
    pub terminal_balance: f64,
    pub applicable: bool,
    pub iterations: Vec<WithdrawalSolveIteration>,
}

impl WithdrawalSolveResult {
    fn not_applicable(config: &WithdrawalSolveConfig) -> Self {
        Self {
            monthly_withdrawal: 0.0,
            floor_balance: config.retirement_balance.max(0.0) * config.floor_ratio,
            terminal_balance: config.retirement_balance.max(0.0),
            applicable: false,
            iterations: Vec::new(),
        }
    }
}

/// Bisection over `[0, balance / 12]` for the largest withdrawal that keeps
/// `floor_ratio` of the pot at `horizon_age`.
pub fn solve_sustainable_withdrawal(config: WithdrawalSolveConfig) -> Result<WithdrawalSolveResult> {
    validate_config(&config)?;

    if config.retirement_balance <= 0.0 || config.retirement_age >= config.horizon_age {
        return Ok(WithdrawalSolveResult::not_applicable(&config));
    }

    let months = config.months();
    let growth = config.profile.monthly_growth_rate(config.dividend_tax_rate);
    let floor_balance = config.retirement_balance * config.floor_ratio;

    let mut lo = 0.0;
    let mut hi = config.retirement_balance / 12.0;
    let mut iterations = Vec::with_capacity(config.iterations as usize);

    for it in 1..=config.iterations {
        let mid = (lo + hi) * 0.5;
        let terminal = terminal_balance(config.retirement_balance, months, growth, mid);
        iterations.push(WithdrawalSolveIteration {
            iteration: it,
            lower_bound: lo,
            upper_bound: hi,
            candidate: mid,
            terminal_balance: terminal,
        });

        if terminal >= floor_balance {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let terminal = terminal_balance(config.retirement_balance, months, growth, lo);
    debug!(
        retirement_age = config.retirement_age,
        monthly_withdrawal = lo,
        terminal_balance = terminal,
        "solved sustainable withdrawal"
    );

    Ok(WithdrawalSolveResult {
        monthly_withdrawal: lo,
        floor_balance,
        terminal_balance: terminal,
        applicable: true,
        iterations,
    })
}

/// Sustainable monthly withdrawal with the default horizon, floor and
/// iteration count. Returns 0 when not applicable or when the inputs are
/// rejected (logged as a warning).
pub fn sustainable_monthly_withdrawal(
    retirement_balance: f64,
    retirement_age: u32,
    profile: BlendedProfile,
    dividend_tax_rate: f64,
) -> f64 {
    let config =
        WithdrawalSolveConfig::new(retirement_balance, retirement_age, profile, dividend_tax_rate);
    match solve_sustainable_withdrawal(config) {
        Ok(result) => result.monthly_withdrawal,
        Err(e) => {
            warn!(error = %e, "sustainable withdrawal not solved; reporting 0");
            0.0
        }
    }
}

pub fn sustainable_withdrawal_for_period(
    period: &PeriodResult,
    registry: &PresetRegistry,
    dividend_tax_rate: f64,
) -> f64 {
    let profile = period.allocation.blended_profile(registry);
    sustainable_monthly_withdrawal(period.end_balance, period.age, profile, dividend_tax_rate)
}

fn terminal_balance(start: f64, months: u32, monthly_growth: f64, withdrawal: f64) -> f64 {
    let mut balance = start;
    for _ in 0..months {
        balance += balance * monthly_growth;
        balance -= withdrawal.min(balance.max(0.0));
    }
    balance
}

fn validate_config(config: &WithdrawalSolveConfig) -> Result<()> {
    if !config.retirement_balance.is_finite() {
        return Err(Error::Solver("retirement balance must be finite".to_string()));
    }
    if !(0.0..=1.0).contains(&config.floor_ratio) {
        return Err(Error::Solver("floor ratio must be between 0 and 1".to_string()));
    }
    if !(0.0..=1.0).contains(&config.dividend_tax_rate) {
        return Err(Error::Solver(
            "dividend tax rate must be between 0 and 1".to_string(),
        ));
    }
    if !config.profile.annual_return_pct.is_finite() || !config.profile.dividend_pct.is_finite() {
        return Err(Error::Solver("blended profile must be finite".to_string()));
    }
    if config.iterations == 0 {
        return Err(Error::Solver("iterations must be > 0".to_string()));
    }
    Ok(())
}
