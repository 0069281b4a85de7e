//! Holiday table built from detected spikes, and its design-matrix expansion.
//!
//! Every spike becomes a holiday row named `spike`. Each row is active on its
//! own date plus `lower_window..=upper_window` days around it, and every
//! `(name, offset)` pair gets its own indicator column (`spike_+0`,
//! `spike_+1`, ...), shared by all rows with that name.

use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, NaiveDate};

use crate::domain::Holiday;

pub const SPIKE_HOLIDAY_NAME: &str = "spike";

/// Build the spike holiday table.
///
/// Dates in `extended_dates` get `extended_upper` days after the spike, all
/// others `default_upper`.
pub fn spike_holidays(
    spike_dates: &[NaiveDate],
    extended_dates: &[NaiveDate],
    default_upper: i64,
    extended_upper: i64,
) -> Vec<Holiday> {
    spike_dates
        .iter()
        .map(|&date| Holiday {
            name: SPIKE_HOLIDAY_NAME.to_string(),
            date,
            lower_window: 0,
            upper_window: if extended_dates.contains(&date) {
                extended_upper
            } else {
                default_upper
            },
        })
        .collect()
}

/// One indicator column of the holiday design block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HolidayFeature {
    pub name: String,
    pub offset: i64,
    dates: BTreeSet<NaiveDate>,
}

impl HolidayFeature {
    /// Column label, e.g. `spike_+1` or `spike_-2`.
    pub fn label(&self) -> String {
        format!("{}_{:+}", self.name, self.offset)
    }

    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

/// Expand holiday rows into indicator columns, ordered by name then offset.
pub fn holiday_features(holidays: &[Holiday]) -> Vec<HolidayFeature> {
    let mut keys: BTreeSet<(String, i64)> = BTreeSet::new();
    for h in holidays {
        let lower = h.lower_window.min(0);
        let upper = h.upper_window.max(0);
        for offset in lower..=upper {
            keys.insert((h.name.clone(), offset));
        }
    }

    keys.into_iter()
        .map(|(name, offset)| {
            let dates = holidays
                .iter()
                .filter(|h| h.name == name && (h.lower_window.min(0)..=h.upper_window.max(0)).contains(&offset))
                .map(|h| h.date + Duration::days(offset))
                .collect();
            HolidayFeature { name, offset, dates }
        })
        .collect()
}

/// Keep only features active on at least one of `dates`.
///
/// A column that is zero on every training row carries no information and
/// would only be held at zero by its penalty.
pub fn active_features(features: Vec<HolidayFeature>, dates: &[NaiveDate]) -> Vec<HolidayFeature> {
    let seen: HashSet<NaiveDate> = dates.iter().copied().collect();
    features
        .into_iter()
        .filter(|f| f.dates.iter().any(|d| seen.contains(d)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn extended_dates_get_two_day_window() {
        let spikes = [d(2023, 11, 24), d(2023, 12, 1), d(2023, 11, 27)];
        let extended = [d(2023, 11, 24), d(2023, 11, 27)];
        let table = spike_holidays(&spikes, &extended, 1, 2);

        assert_eq!(table.len(), 3);
        assert_eq!(table[0].upper_window, 2);
        assert_eq!(table[1].upper_window, 1);
        assert_eq!(table[2].upper_window, 2);
        assert!(table.iter().all(|h| h.lower_window == 0 && h.name == SPIKE_HOLIDAY_NAME));
    }

    #[test]
    fn features_cover_each_offset_once() {
        let table = spike_holidays(&[d(2024, 1, 10), d(2024, 2, 1)], &[d(2024, 2, 1)], 1, 2);
        let features = holiday_features(&table);
        let labels: Vec<String> = features.iter().map(HolidayFeature::label).collect();
        assert_eq!(labels, ["spike_+0", "spike_+1", "spike_+2"]);

        // +0 active on both spike dates.
        assert!(features[0].is_active(d(2024, 1, 10)));
        assert!(features[0].is_active(d(2024, 2, 1)));
        // +1 active the day after each spike.
        assert!(features[1].is_active(d(2024, 1, 11)));
        assert!(features[1].is_active(d(2024, 2, 2)));
        // +2 only for the extended spike.
        assert!(!features[2].is_active(d(2024, 1, 12)));
        assert!(features[2].is_active(d(2024, 2, 3)));
    }

    #[test]
    fn inactive_features_are_dropped() {
        let table = spike_holidays(&[d(2024, 1, 10)], &[], 1, 2);
        let features = holiday_features(&table);
        let kept = active_features(features, &[d(2024, 1, 11)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].offset, 1);
    }
}
