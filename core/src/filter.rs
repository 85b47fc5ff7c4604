//! Client-side date filtering of movements.

use chrono::NaiveDate;

use crate::types::Movement;

/// Inclusive calendar date range.
///
/// A range whose start is after its end is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Keep the movements whose date falls in `range`, preserving order.
///
/// Movements without a parseable entry (or exit) date are dropped.
pub fn filter_movements_by_date(movements: &[Movement], range: DateRange) -> Vec<Movement> {
    if range.is_empty() {
        return Vec::new();
    }
    movements
        .iter()
        .filter(|m| m.entry_date().is_some_and(|d| range.contains(d)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn movements() -> Vec<Movement> {
        [
            json!({"dataIngresso": "2024-02-29T07:00:00Z", "saldo": 1.0}),
            json!({"dataIngresso": "2024-03-01", "saldo": 2.0}),
            json!({"dataIngresso": null, "dataUscita": "2024-03-15T18:30:00", "saldo": 3.0}),
            json!({"dataIngresso": "not a date", "saldo": 4.0}),
            json!({"saldo": 5.0}),
            json!({"dataIngresso": "2024-03-31", "saldo": 6.0}),
            json!({"dataIngresso": "2024-04-01", "saldo": 7.0}),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
    }

    fn amounts(movements: &[Movement]) -> Vec<f64> {
        movements.iter().filter_map(Movement::charged_amount).collect()
    }

    #[test]
    fn bounds_are_inclusive_and_order_is_kept() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 31));
        let filtered = filter_movements_by_date(&movements(), range);
        assert_eq!(amounts(&filtered), vec![2.0, 3.0, 6.0]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let range = DateRange::new(d(2024, 2, 29), d(2024, 3, 15));
        let once = filter_movements_by_date(&movements(), range);
        let twice = filter_movements_by_date(&once, range);
        assert_eq!(once, twice);
        assert_eq!(amounts(&once), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let range = DateRange::new(d(2024, 4, 1), d(2024, 3, 1));
        assert!(range.is_empty());
        assert!(filter_movements_by_date(&movements(), range).is_empty());
    }

    #[test]
    fn single_day_range() {
        let range = DateRange::new(d(2024, 4, 1), d(2024, 4, 1));
        assert_eq!(amounts(&filter_movements_by_date(&movements(), range)), vec![7.0]);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = movements();
        let before = input.clone();
        let _ = filter_movements_by_date(&input, DateRange::new(d(2024, 3, 1), d(2024, 3, 1)));
        assert_eq!(input, before);
    }
}
