use serde::Serialize;

use super::presets::PresetRegistry;
use super::timeline::EventTimeline;
use super::types::{AgeMonth, BlendedProfile};

/// Decimal places kept when comparing allocations, so rounding noise in the
/// fractions never registers as a change.
const SIGNATURE_PRECISION: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSlice {
    pub preset_id: String,
    pub weight_fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AllocationSnapshot {
    pub slices: Vec<AllocationSlice>,
}

impl AllocationSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_weights<'a>(weights: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut merged: Vec<(&str, u64)> = Vec::new();
        for (preset_id, weight) in weights {
            match merged.iter_mut().find(|(id, _)| *id == preset_id) {
                Some((_, total)) => *total += u64::from(weight),
                None => merged.push((preset_id, u64::from(weight))),
            }
        }

        let total: u64 = merged.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return Self::empty();
        }

        let slices = merged
            .into_iter()
            .filter(|(_, w)| *w > 0)
            .map(|(preset_id, weight)| AllocationSlice {
                preset_id: preset_id.to_string(),
                weight_fraction: weight as f64 / total as f64,
            })
            .collect();
        Self { slices }
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllocationSlice> {
        self.slices.iter()
    }

    pub fn fraction_of(&self, preset_id: &str) -> f64 {
        self.slices
            .iter()
            .filter(|s| s.preset_id == preset_id)
            .map(|s| s.weight_fraction)
            .sum()
    }

    /// Order-independent equality key: sorted `id:fraction` pairs joined by `|`.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = self
            .slices
            .iter()
            .map(|s| {
                format!(
                    "{}:{:.prec$}",
                    s.preset_id,
                    s.weight_fraction,
                    prec = SIGNATURE_PRECISION
                )
            })
            .collect();
        parts.sort();
        parts.join("|")
    }

    pub fn blended_profile(&self, registry: &PresetRegistry) -> BlendedProfile {
        self.slices
            .iter()
            .fold(BlendedProfile::default(), |acc, slice| {
                let preset = registry.resolve(&slice.preset_id);
                BlendedProfile {
                    annual_return_pct: acc.annual_return_pct
                        + preset.annual_return_pct * slice.weight_fraction,
                    dividend_pct: acc.dividend_pct + preset.dividend_pct * slice.weight_fraction,
                }
            })
    }
}

pub fn resolve_allocation(timeline: &EventTimeline<'_>, at: AgeMonth) -> AllocationSnapshot {
    AllocationSnapshot::from_weights(timeline.latest_portfolio_group(at))
}
