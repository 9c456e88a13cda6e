use crate::availability;
use crate::calendar::SchoolCalendar;
use crate::catalog::{Catalog, DayType};
use crate::course::Course;
use crate::normalizer;
use crate::reservation::{
    Reservation, ReservationDraft, ReservationRequest, ReservationSlot, SelectedSlot,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Most distinct blocks one reservation may span.
pub const MAX_CONCURRENT_BLOCKS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    MissingCourse,
    UnknownCourse { course: String },
    InvalidDate { date: NaiveDate },
    DateNotSelectable { date: NaiveDate },
    NoSlotsSelected,
    TermsNotAccepted,
    MissingJustification,
    TooManyConcurrentBlocks { blocks: usize, max: usize },
    TooManyUnitsPerBlock { block: u8, units: usize, max: usize },
    DuplicateSlot { block: u8, unit: u8 },
    UnknownBlock { block: u8 },
    UnknownUnit { unit: u8, max: u8 },
    BlockAlreadyEnded { block: u8 },
    SlotNoLongerAvailable { block: u8, unit: u8 },
}

impl ValidationError {
    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingCourse | ValidationError::UnknownCourse { .. } => "course",
            ValidationError::InvalidDate { .. } | ValidationError::DateNotSelectable { .. } => {
                "date"
            }
            ValidationError::TermsNotAccepted => "accepted_terms",
            ValidationError::MissingJustification => "justification",
            _ => "slots",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingCourse => write!(f, "select a course"),
            ValidationError::UnknownCourse { course } => write!(f, "unknown course '{course}'"),
            ValidationError::InvalidDate { date } => write!(f, "{date} is not a school day"),
            ValidationError::DateNotSelectable { date } => {
                write!(f, "{date} is outside the booking window")
            }
            ValidationError::NoSlotsSelected => write!(f, "select at least one block"),
            ValidationError::TermsNotAccepted => write!(f, "the terms of use must be accepted"),
            ValidationError::MissingJustification => {
                write!(f, "last-minute reservations need a justification")
            }
            ValidationError::TooManyConcurrentBlocks { blocks, max } => {
                write!(f, "at most {max} blocks per reservation (got {blocks})")
            }
            ValidationError::TooManyUnitsPerBlock { block, units, max } => {
                write!(f, "at most {max} carts per block (block {block} has {units})")
            }
            ValidationError::DuplicateSlot { block, unit } => {
                write!(f, "cart {unit} selected twice in block {block}")
            }
            ValidationError::UnknownBlock { block } => {
                write!(f, "block {block} is not part of this day's schedule")
            }
            ValidationError::UnknownUnit { unit, max } => {
                write!(f, "cart {unit} does not exist (carts 1-{max})")
            }
            ValidationError::BlockAlreadyEnded { block } => {
                write!(f, "block {block} has already ended")
            }
            ValidationError::SlotNoLongerAvailable { block, unit } => {
                write!(f, "cart {unit} in block {block} is no longer available")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Reference data and time window a submission is checked against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub catalog: &'a Catalog,
    pub calendar: &'a SchoolCalendar,
    pub now: NaiveDateTime,
    pub horizon_days: u32,
}

/// Check `request` against every rule and build the draft to persist.
///
/// `existing` must be a fresh read of confirmed reservations for the request's
/// date and equipment type; availability is recomputed from it here. All
/// violations are reported together.
pub fn build_reservation(
    ctx: &ValidationContext<'_>,
    request: &ReservationRequest,
    existing: &[Reservation],
) -> Result<ReservationDraft, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let course = if request.course.trim().is_empty() {
        errors.push(ValidationError::MissingCourse);
        None
    } else {
        match ctx.catalog.course(&request.course) {
            Ok(course) => Some(course),
            Err(_) => {
                errors.push(ValidationError::UnknownCourse {
                    course: request.course.trim().to_string(),
                });
                None
            }
        }
    };

    if request.slots.is_empty() {
        errors.push(ValidationError::NoSlotsSelected);
    }
    if !request.accepted_terms {
        errors.push(ValidationError::TermsNotAccepted);
    }
    if request.is_last_minute && request.justification.trim().is_empty() {
        errors.push(ValidationError::MissingJustification);
    }

    let date = request.date;
    let school_day = DayType::of(date).is_some() && !ctx.calendar.is_holiday(date);
    if !school_day {
        errors.push(ValidationError::InvalidDate { date });
    } else if !ctx
        .calendar
        .is_selectable(ctx.catalog, date, ctx.now, ctx.horizon_days)
    {
        errors.push(ValidationError::DateNotSelectable { date });
    }

    let mut units_by_block: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
    for slot in &request.slots {
        units_by_block.entry(slot.block).or_default().push(slot.unit);
    }
    if units_by_block.len() > MAX_CONCURRENT_BLOCKS {
        errors.push(ValidationError::TooManyConcurrentBlocks {
            blocks: units_by_block.len(),
            max: MAX_CONCURRENT_BLOCKS,
        });
    }

    let mut seen = BTreeSet::new();
    for slot in &request.slots {
        if !seen.insert(*slot) {
            errors.push(ValidationError::DuplicateSlot {
                block: slot.block,
                unit: slot.unit,
            });
        }
    }

    if let Some(course) = course {
        check_capacity(course, &units_by_block, &mut errors);
        if school_day {
            check_slots(ctx, course, date, &seen, existing, &mut errors);
        }
    }

    match course {
        Some(course) if errors.is_empty() => Ok(assemble(ctx, course, request, &seen)),
        _ => Err(errors),
    }
}

fn check_capacity(
    course: &Course,
    units_by_block: &BTreeMap<u8, Vec<u8>>,
    errors: &mut Vec<ValidationError>,
) {
    let max = course.equipment.max_units_per_block();
    for (block, units) in units_by_block {
        if units.len() > max {
            errors.push(ValidationError::TooManyUnitsPerBlock {
                block: *block,
                units: units.len(),
                max,
            });
        }
    }
}

fn check_slots(
    ctx: &ValidationContext<'_>,
    course: &Course,
    date: NaiveDate,
    selected: &BTreeSet<SelectedSlot>,
    existing: &[Reservation],
    errors: &mut Vec<ValidationError>,
) {
    let Ok(template) = ctx.catalog.template_for(course, date) else {
        return;
    };
    let unit_count = course.equipment.unit_count();

    let blocks: BTreeSet<u8> = selected.iter().map(|slot| slot.block).collect();
    let mut free_by_block = BTreeMap::new();
    for index in blocks {
        match template.block(index) {
            Some(block) => {
                if ctx.calendar.is_block_passed(block, date, ctx.now) {
                    errors.push(ValidationError::BlockAlreadyEnded { block: index });
                }
                free_by_block.insert(
                    index,
                    availability::free_units(course, date, index, existing),
                );
            }
            None => errors.push(ValidationError::UnknownBlock { block: index }),
        }
    }

    let mut reported_units = BTreeSet::new();
    for slot in selected {
        if slot.unit == 0 || slot.unit > unit_count {
            if reported_units.insert(slot.unit) {
                errors.push(ValidationError::UnknownUnit {
                    unit: slot.unit,
                    max: unit_count,
                });
            }
            continue;
        }
        if let Some(free) = free_by_block.get(&slot.block) {
            if !free.contains(&slot.unit) {
                errors.push(ValidationError::SlotNoLongerAvailable {
                    block: slot.block,
                    unit: slot.unit,
                });
            }
        }
    }
}

fn assemble(
    ctx: &ValidationContext<'_>,
    course: &Course,
    request: &ReservationRequest,
    selected: &BTreeSet<SelectedSlot>,
) -> ReservationDraft {
    let template = ctx.catalog.template_for(course, request.date).ok();
    let slots = selected
        .iter()
        .filter_map(|slot| {
            let block = template?.block(slot.block)?;
            Some(ReservationSlot {
                block_key: normalizer::canonical_key(slot.block, course.cohort, request.date),
                unit: slot.unit,
                start: block.start,
                end: block.end,
            })
        })
        .collect();

    let justification = if request.is_last_minute {
        request.justification.trim().to_string()
    } else {
        String::new()
    };

    ReservationDraft {
        course: course.name.clone(),
        cycle: course.cycle,
        equipment: course.equipment,
        date: request.date,
        slots,
        is_last_minute: request.is_last_minute,
        justification,
        accepted_terms: request.accepted_terms,
        requester: request.requester.clone(),
    }
}
