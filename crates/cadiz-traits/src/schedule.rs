//! Collaborators keyed by trade date.

use std::collections::BTreeMap;

use crate::types::Date;

/// Models keyed by the first trade date they apply to.
///
/// A lookup returns the latest entry dated on or before the requested date,
/// so a single entry at [`Date::MIN`] covers the whole backtest.
#[derive(Debug, Clone)]
pub struct ModelSchedule<M> {
    entries: BTreeMap<Date, M>,
}

impl<M> ModelSchedule<M> {
    /// Creates an empty schedule.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Creates a schedule that returns `model` for every date.
    pub fn constant(model: M) -> Self {
        let mut schedule = Self::new();
        schedule.insert(Date::MIN, model);
        schedule
    }

    /// Registers a model effective from `date` onward.
    pub fn insert(&mut self, date: Date, model: M) {
        self.entries.insert(date, model);
    }

    /// The model in effect on `date`.
    pub fn at(&self, date: Date) -> Option<&M> {
        self.entries.range(..=date).next_back().map(|(_, m)| m)
    }

    /// Number of scheduled models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no model is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<M> Default for ModelSchedule<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> FromIterator<(Date, M)> for ModelSchedule<M> {
    fn from_iter<I: IntoIterator<Item = (Date, M)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2021, 3, day).unwrap()
    }

    #[test]
    fn test_lookup_uses_latest_entry() {
        let schedule: ModelSchedule<&str> = [(d(2), "a"), (d(5), "b")].into_iter().collect();

        assert_eq!(schedule.at(d(1)), None);
        assert_eq!(schedule.at(d(2)), Some(&"a"));
        assert_eq!(schedule.at(d(4)), Some(&"a"));
        assert_eq!(schedule.at(d(9)), Some(&"b"));
        assert_eq!(schedule.len(), 2);
    }

    #[test]
    fn test_constant_schedule() {
        let schedule = ModelSchedule::constant(7);
        assert_eq!(schedule.at(d(1)), Some(&7));
        assert!(!schedule.is_empty());
    }
}
