mod allocation;
mod engine;
mod presets;
mod solver;
mod timeline;
mod types;

pub use allocation::{AllocationSlice, AllocationSnapshot, resolve_allocation};
pub use engine::{run_projection, run_projection_with_summary};
pub use presets::{PresetRegistry, builtin_events, builtin_presets};
pub use solver::{
    SOLVER_ITERATIONS, SUSTAINABLE_FLOOR_RATIO, SUSTAINABLE_HORIZON_AGE, WithdrawalSolveConfig,
    WithdrawalSolveIteration, WithdrawalSolveResult, solve_sustainable_withdrawal,
    sustainable_monthly_withdrawal, sustainable_withdrawal_for_period,
};
pub use timeline::EventTimeline;
pub use types::{
    AGE_LIMIT, AgeMonth, BlendedProfile, DEFAULT_DIVIDEND_TAX_RATE, DEFAULT_MAX_AGE, Event,
    EventFamily, EventKind, HoldingBreakdown, MONTHS_PER_YEAR, MonthSnapshot, PeriodResult,
    Preset, ProjectionInputs, ProjectionResult,
};
