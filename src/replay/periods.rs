use std::collections::HashMap;

use anyhow::{Result, bail};

/// Parsed `TIMEPERIOD TRANSITION` payload: `<name>;<from>;<to>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeperiodTransition {
    pub name: String,
    pub from: i32,
    pub to: i32,
}

impl TimeperiodTransition {
    pub fn parse(options: &str) -> Result<Self> {
        let fields: Vec<&str> = options.split(';').collect();
        if fields.len() != 3 {
            bail!("expected 3 fields, got {}", fields.len());
        }
        Ok(Self {
            name: fields[0].to_string(),
            from: fields[1].parse()?,
            to: fields[2].parse()?,
        })
    }
}

/// Active flags (0/1) per timeperiod name. Names never seen in a transition
/// count as active.
#[derive(Debug, Default)]
pub struct PeriodTracker {
    active: HashMap<String, i32>,
}

impl PeriodTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, transition: &TimeperiodTransition) {
        self.active
            .insert(transition.name.clone(), transition.to);
    }

    pub fn is_active(&self, name: &str) -> i32 {
        self.active.get(name).copied().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_payload() {
        let transition = TimeperiodTransition::parse("workhours;1;0").expect("parse");
        assert_eq!(transition.name, "workhours");
        assert_eq!(transition.from, 1);
        assert_eq!(transition.to, 0);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(TimeperiodTransition::parse("workhours;1").is_err());
        assert!(TimeperiodTransition::parse("workhours;1;0;extra").is_err());
        assert!(TimeperiodTransition::parse("workhours;one;0").is_err());
        assert!(TimeperiodTransition::parse("").is_err());
    }

    #[test]
    fn unknown_periods_are_active() {
        let mut tracker = PeriodTracker::new();
        assert_eq!(tracker.is_active("workhours"), 1);
        tracker.apply(&TimeperiodTransition::parse("workhours;1;0").expect("parse"));
        assert_eq!(tracker.is_active("workhours"), 0);
        tracker.apply(&TimeperiodTransition::parse("workhours;0;1").expect("parse"));
        assert_eq!(tracker.is_active("workhours"), 1);
    }
}
