//! Canonical block keys.
//!
//! On weekdays other than Tuesday, grid rows 6 and 7 cover different clock
//! ranges for Senior courses than for the rest of the school. Senior bookings
//! on those rows are stored under keys 60 and 70 so they never share a
//! capacity bucket with a Junior or Middle booking of the same row. Tuesday
//! uses a single grid for everyone, so keys equal rows.

use crate::catalog::DayType;
use crate::course::CohortGroup;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const SENIOR_ROW_SIX: u8 = 6;
const SENIOR_ROW_SEVEN: u8 = 7;
const SENIOR_KEY_SIX: u8 = 60;
const SENIOR_KEY_SEVEN: u8 = 70;

/// Identifier used for capacity accounting and collision detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKey(pub u8);

impl BlockKey {
    pub fn value(self) -> u8 {
        self.0
    }

    /// True for the keys only Senior courses produce.
    pub fn is_senior_only(self) -> bool {
        self.0 == SENIOR_KEY_SIX || self.0 == SENIOR_KEY_SEVEN
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn canonical_key(block_index: u8, cohort: CohortGroup, date: NaiveDate) -> BlockKey {
    if DayType::of(date) == Some(DayType::Tuesday) {
        return BlockKey(block_index);
    }
    match (cohort, block_index) {
        (CohortGroup::Senior, SENIOR_ROW_SIX) => BlockKey(SENIOR_KEY_SIX),
        (CohortGroup::Senior, SENIOR_ROW_SEVEN) => BlockKey(SENIOR_KEY_SEVEN),
        _ => BlockKey(block_index),
    }
}

/// Grid row a stored key was booked from, ignoring cohort.
pub fn raw_index_for(key: BlockKey) -> u8 {
    match key.0 {
        SENIOR_KEY_SIX => SENIOR_ROW_SIX,
        SENIOR_KEY_SEVEN => SENIOR_ROW_SEVEN,
        other => other,
    }
}

/// Row a stored key occupies in the grid shown to `viewer`, if any.
///
/// Inverse of [`canonical_key`] for a fixed viewer cohort and date: a Senior
/// key 60 sits on row 6 for Senior viewers only, and a plain key 6 or 7 never
/// lands on a Senior grid on a non-Tuesday.
pub fn row_for_viewer(key: BlockKey, viewer: CohortGroup, date: NaiveDate) -> Option<u8> {
    if DayType::of(date) == Some(DayType::Tuesday) {
        return Some(key.0);
    }
    let senior_viewer = viewer == CohortGroup::Senior;
    if key.is_senior_only() {
        return senior_viewer.then(|| raw_index_for(key));
    }
    if senior_viewer && (key.0 == SENIOR_ROW_SIX || key.0 == SENIOR_ROW_SEVEN) {
        return None;
    }
    Some(key.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    #[test]
    fn row_for_viewer_inverts_canonical_key() {
        let date = wednesday();
        for cohort in [CohortGroup::Junior, CohortGroup::Middle, CohortGroup::Senior] {
            for index in 0..10 {
                let key = canonical_key(index, cohort, date);
                assert_eq!(row_for_viewer(key, cohort, date), Some(index));
            }
        }
    }

    #[test]
    fn senior_keys_hidden_from_other_cohorts() {
        let date = wednesday();
        assert_eq!(row_for_viewer(BlockKey(60), CohortGroup::Middle, date), None);
        assert_eq!(row_for_viewer(BlockKey(70), CohortGroup::Junior, date), None);
        assert_eq!(row_for_viewer(BlockKey(6), CohortGroup::Senior, date), None);
        assert_eq!(row_for_viewer(BlockKey(8), CohortGroup::Senior, date), Some(8));
    }

    #[test]
    fn raw_index_strips_senior_suffix() {
        assert_eq!(raw_index_for(BlockKey(60)), 6);
        assert_eq!(raw_index_for(BlockKey(70)), 7);
        assert_eq!(raw_index_for(BlockKey(3)), 3);
    }
}
