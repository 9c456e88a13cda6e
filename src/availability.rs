use crate::calendar::SchoolCalendar;
use crate::catalog::{ScheduleTemplate, TimeBlock};
use crate::course::Course;
use crate::normalizer::{self, BlockKey};
use crate::reservation::Reservation;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Units of `course`'s equipment still free at `key` on `date`.
///
/// `existing` may hold reservations for other dates or equipment types; only
/// confirmed records matching both take part.
pub fn free_units_for_key(
    course: &Course,
    date: NaiveDate,
    key: BlockKey,
    existing: &[Reservation],
) -> BTreeSet<u8> {
    let occupied: BTreeSet<u8> = relevant(course, date, existing)
        .flat_map(|reservation| reservation.slots.iter())
        .filter(|slot| slot.block_key == key)
        .map(|slot| slot.unit)
        .collect();

    course
        .equipment
        .units()
        .filter(|unit| !occupied.contains(unit))
        .collect()
}

pub fn free_units(
    course: &Course,
    date: NaiveDate,
    block_index: u8,
    existing: &[Reservation],
) -> BTreeSet<u8> {
    let key = normalizer::canonical_key(block_index, course.cohort, date);
    free_units_for_key(course, date, key, existing)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockAvailability {
    pub block: TimeBlock,
    pub key: BlockKey,
    pub free_units: BTreeSet<u8>,
    pub selectable: bool,
}

/// Availability for every block of `template` as seen by `course`.
pub fn day_grid(
    course: &Course,
    date: NaiveDate,
    template: &ScheduleTemplate,
    existing: &[Reservation],
    calendar: &SchoolCalendar,
    now: NaiveDateTime,
) -> Vec<BlockAvailability> {
    let mut occupied_by_row: BTreeMap<u8, BTreeSet<u8>> = BTreeMap::new();
    for reservation in relevant(course, date, existing) {
        for slot in &reservation.slots {
            if let Some(row) = normalizer::row_for_viewer(slot.block_key, course.cohort, date) {
                occupied_by_row.entry(row).or_default().insert(slot.unit);
            }
        }
    }

    template
        .blocks
        .iter()
        .map(|block| {
            let taken = occupied_by_row.get(&block.index);
            let free_units = course
                .equipment
                .units()
                .filter(|unit| taken.is_none_or(|taken| !taken.contains(unit)))
                .collect();
            BlockAvailability {
                block: *block,
                key: normalizer::canonical_key(block.index, course.cohort, date),
                free_units,
                selectable: !calendar.is_block_passed(block, date, now),
            }
        })
        .collect()
}

fn relevant<'a>(
    course: &'a Course,
    date: NaiveDate,
    existing: &'a [Reservation],
) -> impl Iterator<Item = &'a Reservation> + 'a {
    existing.iter().filter(move |reservation| {
        reservation.is_confirmed()
            && reservation.date == date
            && reservation.equipment == course.equipment
    })
}
