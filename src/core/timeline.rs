use super::types::{AgeMonth, Event, EventFamily, EventKind};

/// Enabled events, stable-sorted by instant: on a same-instant tie within a
/// family the first listed wins.
#[derive(Debug, Clone)]
pub struct EventTimeline<'a> {
    entries: Vec<&'a Event>,
}

impl<'a> EventTimeline<'a> {
    pub fn new(events: &'a [Event]) -> Self {
        let mut entries: Vec<&Event> = events.iter().filter(|e| e.enabled).collect();
        entries.sort_by_key(|e| e.at());
        Self { entries }
    }

    fn up_to(&self, at: AgeMonth) -> impl Iterator<Item = &'a Event> + '_ {
        self.entries.iter().copied().take_while(move |e| e.at() <= at)
    }

    pub fn latest(&self, family: EventFamily, at: AgeMonth) -> Option<&'a Event> {
        let mut found: Option<&Event> = None;
        for event in self.up_to(at).filter(|e| e.kind.family() == family) {
            match found {
                Some(current) if current.at() >= event.at() => {}
                _ => found = Some(event),
            }
        }
        found
    }

    fn latest_amount(&self, family: EventFamily, at: AgeMonth) -> f64 {
        self.latest(family, at)
            .and_then(|e| e.kind.amount())
            .unwrap_or(0.0)
    }

    pub fn monthly_contribution(&self, at: AgeMonth) -> f64 {
        self.latest_amount(EventFamily::Contribution, at)
    }

    pub fn recurring_withdrawal(&self, at: AgeMonth) -> f64 {
        self.latest_amount(EventFamily::Withdrawal, at)
    }

    pub fn recurring_income(&self, at: AgeMonth) -> f64 {
        self.latest_amount(EventFamily::Income, at)
    }

    pub fn lump_sum_at(&self, at: AgeMonth) -> f64 {
        self.up_to(at)
            .filter(|e| e.at() == at)
            .filter_map(|e| match e.kind {
                EventKind::LumpSum { amount } => Some(amount),
                _ => None,
            })
            .sum()
    }

    pub fn latest_portfolio_group(&self, at: AgeMonth) -> Vec<(&'a str, u32)> {
        let Some(latest) = self.latest(EventFamily::Portfolio, at) else {
            return Vec::new();
        };
        let instant = latest.at();
        self.up_to(at)
            .filter(|e| e.at() == instant)
            .filter_map(|e| match &e.kind {
                EventKind::PortfolioChange { preset_id, weight } => {
                    Some((preset_id.as_str(), *weight))
                }
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(id: &str, age: u32, month: u32, amount: f64) -> Event {
        Event::new(id, age, month, EventKind::MonthlyContribution { amount })
    }

    fn portfolio(id: &str, age: u32, month: u32, preset: &str, weight: u32) -> Event {
        Event::new(
            id,
            age,
            month,
            EventKind::PortfolioChange {
                preset_id: preset.to_string(),
                weight,
            },
        )
    }

    #[test]
    fn recurring_value_is_most_recent_at_or_before_query() {
        let events = vec![
            contribution("late", 40, 6, 300.0),
            contribution("early", 30, 1, 100.0),
            contribution("mid", 35, 12, 200.0),
        ];
        let timeline = EventTimeline::new(&events);

        assert_eq!(timeline.monthly_contribution(AgeMonth::new(29, 12)), 0.0);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(30, 1)), 100.0);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(35, 11)), 100.0);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(35, 12)), 200.0);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(40, 5)), 200.0);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(40, 6)), 300.0);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(99, 1)), 300.0);
    }

    #[test]
    fn recurring_values_replace_instead_of_accumulating() {
        let events = vec![
            Event::new("w1", 60, 1, EventKind::RecurringWithdrawal { amount: 1_000.0 }),
            Event::new("w2", 65, 1, EventKind::RecurringWithdrawal { amount: 400.0 }),
        ];
        let timeline = EventTimeline::new(&events);
        assert_eq!(timeline.recurring_withdrawal(AgeMonth::new(66, 1)), 400.0);
    }

    #[test]
    fn same_instant_tie_is_won_by_first_listed_event() {
        let events = vec![
            contribution("first", 30, 3, 111.0),
            contribution("second", 30, 3, 222.0),
        ];
        let timeline = EventTimeline::new(&events);
        assert_eq!(timeline.monthly_contribution(AgeMonth::new(30, 3)), 111.0);
        assert_eq!(
            timeline
                .latest(EventFamily::Contribution, AgeMonth::new(31, 1))
                .map(|e| e.id.as_str()),
            Some("first")
        );
    }

    #[test]
    fn disabled_events_are_ignored() {
        let mut off = Event::new("off", 30, 1, EventKind::RecurringIncome { amount: 50.0 });
        off.enabled = false;
        let events = vec![off];
        let timeline = EventTimeline::new(&events);
        assert_eq!(timeline.recurring_income(AgeMonth::new(50, 1)), 0.0);
        assert!(timeline.latest(EventFamily::Income, AgeMonth::new(50, 1)).is_none());
    }

    #[test]
    fn lump_sums_only_apply_at_their_exact_instant_and_sum() {
        let events = vec![
            Event::new("a", 40, 6, EventKind::LumpSum { amount: 1_000.0 }),
            Event::new("b", 40, 6, EventKind::LumpSum { amount: -300.0 }),
            Event::new("c", 40, 7, EventKind::LumpSum { amount: 50.0 }),
        ];
        let timeline = EventTimeline::new(&events);
        assert_eq!(timeline.lump_sum_at(AgeMonth::new(40, 5)), 0.0);
        assert_eq!(timeline.lump_sum_at(AgeMonth::new(40, 6)), 700.0);
        assert_eq!(timeline.lump_sum_at(AgeMonth::new(40, 7)), 50.0);
        assert_eq!(timeline.lump_sum_at(AgeMonth::new(41, 6)), 0.0);
    }

    #[test]
    fn portfolio_group_collects_every_event_at_latest_instant() {
        let events = vec![
            portfolio("a", 30, 1, "sp500", 10),
            portfolio("b", 55, 1, "schd", 5),
            portfolio("c", 55, 1, "sp500", 5),
            portfolio("d", 55, 2, "nasdaq100", 3),
        ];
        let timeline = EventTimeline::new(&events);
        assert_eq!(
            timeline.latest_portfolio_group(AgeMonth::new(54, 12)),
            vec![("sp500", 10)]
        );
        assert_eq!(
            timeline.latest_portfolio_group(AgeMonth::new(55, 1)),
            vec![("schd", 5), ("sp500", 5)]
        );
        assert_eq!(
            timeline.latest_portfolio_group(AgeMonth::new(55, 2)),
            vec![("nasdaq100", 3)]
        );
        assert!(
            timeline
                .latest_portfolio_group(AgeMonth::new(29, 12))
                .is_empty()
        );
    }
}
