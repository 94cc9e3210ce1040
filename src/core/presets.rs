use std::borrow::Cow;

use super::types::{Event, EventKind, Preset};

pub fn builtin_presets() -> Vec<Preset> {
    vec![
        builtin("sp500", "S&P 500 (standard)", 10.0, 1.5),
        builtin("nasdaq100", "Nasdaq 100 (tech heavy)", 14.2, 0.8),
        builtin("schd", "SCHD (dividend growth)", 8.5, 3.4),
    ]
}

fn builtin(id: &str, name: &str, annual_return_pct: f64, dividend_pct: f64) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        annual_return_pct,
        dividend_pct,
        builtin: true,
    }
}

/// Demo timeline: all-in S&P 500 at 30, half SCHD at 55, drawing from 65.
pub fn builtin_events() -> Vec<Event> {
    vec![
        Event::new(
            "evt1",
            30,
            1,
            EventKind::PortfolioChange {
                preset_id: "sp500".to_string(),
                weight: 10,
            },
        ),
        Event::new(
            "evt2",
            55,
            1,
            EventKind::PortfolioChange {
                preset_id: "schd".to_string(),
                weight: 5,
            },
        ),
        Event::new(
            "evt3",
            55,
            1,
            EventKind::PortfolioChange {
                preset_id: "sp500".to_string(),
                weight: 5,
            },
        ),
        Event {
            label: Some("Start drawing down".to_string()),
            ..Event::new(
                "evt4",
                65,
                1,
                EventKind::RecurringWithdrawal { amount: 2_500_000.0 },
            )
        },
    ]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetRegistry {
    presets: Vec<Preset>,
}

impl PresetRegistry {
    pub fn new(presets: Vec<Preset>) -> Self {
        let mut registry = Self::default();
        for preset in presets {
            registry.insert(preset);
        }
        registry
    }

    pub fn with_builtins() -> Self {
        Self::new(builtin_presets())
    }

    pub fn insert(&mut self, preset: Preset) {
        match self.presets.iter_mut().find(|p| p.id == preset.id) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    /// Removing a preset that events still reference is allowed; those
    /// references resolve to [`Preset::placeholder`] afterwards.
    pub fn remove(&mut self, id: &str) -> Option<Preset> {
        let idx = self.presets.iter().position(|p| p.id == id)?;
        Some(self.presets.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn resolve(&self, id: &str) -> Cow<'_, Preset> {
        match self.get(id) {
            Some(preset) => Cow::Borrowed(preset),
            None => Cow::Owned(Preset::placeholder(id)),
        }
    }

    pub fn into_vec(self) -> Vec<Preset> {
        self.presets
    }

    pub fn dangling_references<'a>(&self, events: &'a [Event]) -> Vec<&'a str> {
        let mut missing: Vec<&str> = Vec::new();
        for event in events.iter().filter(|e| e.enabled) {
            if let EventKind::PortfolioChange { preset_id, .. } = &event.kind {
                if !self.contains(preset_id) && !missing.contains(&preset_id.as_str()) {
                    missing.push(preset_id);
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(id: &str, ret: f64) -> Preset {
        Preset {
            id: id.to_string(),
            name: format!("Custom {id}"),
            annual_return_pct: ret,
            dividend_pct: 0.0,
            builtin: false,
        }
    }

    #[test]
    fn builtin_presets_have_unique_ids() {
        let presets = builtin_presets();
        assert_eq!(presets.len(), 3);
        for (i, a) in presets.iter().enumerate() {
            assert!(a.builtin);
            for b in &presets[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn insert_replaces_preset_with_same_id() {
        let mut registry = PresetRegistry::with_builtins();
        registry.insert(custom("sp500", 7.0));
        assert_eq!(registry.get("sp500").map(|p| p.annual_return_pct), Some(7.0));
        assert_eq!(registry.into_vec().len(), 3);
    }

    #[test]
    fn resolve_missing_preset_degrades_to_zero_rate_placeholder() {
        let mut registry = PresetRegistry::new(vec![custom("mine", 5.0)]);
        assert_eq!(registry.resolve("mine").annual_return_pct, 5.0);

        registry.remove("mine");
        let resolved = registry.resolve("mine");
        assert_eq!(resolved.id, "mine");
        assert_eq!(resolved.name, "Unknown");
        assert_eq!(resolved.annual_return_pct, 0.0);
        assert_eq!(resolved.dividend_pct, 0.0);
    }

    #[test]
    fn dangling_references_lists_each_missing_id_once() {
        let registry = PresetRegistry::with_builtins();
        let mut events = builtin_events();
        for id in ["gone", "gone", "other"] {
            events.push(Event::new(
                id,
                40,
                1,
                EventKind::PortfolioChange {
                    preset_id: id.to_string(),
                    weight: 1,
                },
            ));
        }
        let mut disabled = Event::new(
            "off",
            41,
            1,
            EventKind::PortfolioChange {
                preset_id: "disabled-ref".to_string(),
                weight: 1,
            },
        );
        disabled.enabled = false;
        events.push(disabled);

        assert_eq!(registry.dangling_references(&events), vec!["gone", "other"]);
    }
}
