use cart_reservations::calendar::SchoolCalendar;
use cart_reservations::catalog::Catalog;
use cart_reservations::normalizer::BlockKey;
use cart_reservations::reservation::{Requester, ReservationRequest, SelectedSlot};
use cart_reservations::validation::{
    MAX_CONCURRENT_BLOCKS, ValidationContext, ValidationError, build_reservation,
};
use chrono::{NaiveDate, NaiveTime};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn request(course: &str, date: NaiveDate, slots: &[(u8, u8)]) -> ReservationRequest {
    ReservationRequest {
        course: course.to_string(),
        date,
        is_last_minute: false,
        justification: String::new(),
        accepted_terms: true,
        slots: slots.iter().map(|&(b, u)| SelectedSlot::new(b, u)).collect(),
        requester: Requester::new("u1", "teacher@school.cl", "Teacher"),
    }
}

struct Fixture {
    catalog: Catalog,
    calendar: SchoolCalendar,
}

impl Fixture {
    fn new() -> Self {
        Self {
            catalog: Catalog::school(),
            calendar: SchoolCalendar::default(),
        }
    }

    // Wednesday 2025-03-05 at 08:00
    fn ctx(&self) -> ValidationContext<'_> {
        self.ctx_at(d(2025, 3, 5), 8, 0)
    }

    fn ctx_at(&self, date: NaiveDate, h: u32, m: u32) -> ValidationContext<'_> {
        ValidationContext {
            catalog: &self.catalog,
            calendar: &self.calendar,
            now: date.and_hms_opt(h, m, 0).unwrap(),
            horizon_days: 7,
        }
    }
}

#[test]
fn valid_request_builds_canonical_slots() {
    let fx = Fixture::new();
    let draft = build_reservation(&fx.ctx(), &request("I Medio A", d(2025, 3, 6), &[(7, 2), (6, 1)]), &[])
        .expect("valid request");

    assert_eq!(draft.course, "I Medio A");
    let keys: Vec<(BlockKey, u8)> = draft.slots.iter().map(|s| (s.block_key, s.unit)).collect();
    assert_eq!(keys, vec![(BlockKey(60), 1), (BlockKey(70), 2)]);
    assert_eq!(draft.slots[1].start, NaiveTime::from_hms_opt(13, 55, 0).unwrap());
    assert!(draft.justification.is_empty());
}

#[test]
fn more_than_two_blocks_is_rejected() {
    let fx = Fixture::new();
    let errors = build_reservation(
        &fx.ctx(),
        &request("4to A", d(2025, 3, 6), &[(1, 1), (2, 1), (3, 1)]),
        &[],
    )
    .unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::TooManyConcurrentBlocks {
            blocks: 3,
            max: MAX_CONCURRENT_BLOCKS,
        }]
    );
}

#[test]
fn chromebook_capacity_is_four_per_block() {
    let fx = Fixture::new();
    let date = d(2025, 3, 6);
    let four = request("7mo B", date, &[(1, 1), (1, 2), (1, 3), (1, 4)]);
    assert!(build_reservation(&fx.ctx(), &four, &[]).is_ok());

    let five = request("7mo B", date, &[(1, 1), (1, 2), (1, 3), (1, 4), (1, 5)]);
    let errors = build_reservation(&fx.ctx(), &five, &[]).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::TooManyUnitsPerBlock {
            block: 1,
            units: 5,
            max: 4,
        }]
    );
}

#[test]
fn tablet_capacity_and_unit_range() {
    let fx = Fixture::new();
    let date = d(2025, 3, 6);
    let three = request("1ro C", date, &[(2, 1), (2, 2), (2, 3)]);
    assert!(build_reservation(&fx.ctx(), &three, &[]).is_ok());

    let four = request("1ro C", date, &[(2, 1), (2, 2), (2, 3), (2, 4)]);
    let errors = build_reservation(&fx.ctx(), &four, &[]).unwrap_err();
    assert!(errors.contains(&ValidationError::TooManyUnitsPerBlock {
        block: 2,
        units: 4,
        max: 3,
    }));
    assert!(errors.contains(&ValidationError::UnknownUnit { unit: 4, max: 3 }));
}

#[test]
fn every_violation_is_reported_together() {
    let fx = Fixture::new();
    let mut req = request("", d(2025, 3, 6), &[]);
    req.accepted_terms = false;
    req.is_last_minute = true;
    req.justification = "   ".into();

    let errors = build_reservation(&fx.ctx(), &req, &[]).unwrap_err();
    assert_eq!(
        errors,
        vec![
            ValidationError::MissingCourse,
            ValidationError::NoSlotsSelected,
            ValidationError::TermsNotAccepted,
            ValidationError::MissingJustification,
        ]
    );
    let fields: Vec<&str> = errors.iter().map(ValidationError::field).collect();
    assert_eq!(fields, vec!["course", "slots", "accepted_terms", "justification"]);
}

#[test]
fn unknown_course_and_weekend() {
    let fx = Fixture::new();
    let saturday = d(2025, 3, 8);
    let errors = build_reservation(&fx.ctx(), &request("9no Z", saturday, &[(1, 1)]), &[]).unwrap_err();
    assert_eq!(
        errors,
        vec![
            ValidationError::UnknownCourse {
                course: "9no Z".into()
            },
            ValidationError::InvalidDate { date: saturday },
        ]
    );
}

#[test]
fn dates_outside_window_are_not_selectable() {
    let fx = Fixture::new();
    let beyond = d(2025, 3, 13);
    let errors = build_reservation(&fx.ctx(), &request("4to A", beyond, &[(1, 1)]), &[]).unwrap_err();
    assert_eq!(errors, vec![ValidationError::DateNotSelectable { date: beyond }]);

    let yesterday = d(2025, 3, 4);
    let errors = build_reservation(&fx.ctx(), &request("4to A", yesterday, &[(1, 1)]), &[]).unwrap_err();
    assert_eq!(errors, vec![ValidationError::DateNotSelectable { date: yesterday }]);
}

#[test]
fn rows_missing_from_the_template_are_unknown() {
    let fx = Fixture::new();
    let errors = build_reservation(&fx.ctx(), &request("2do A", d(2025, 3, 6), &[(7, 1)]), &[]).unwrap_err();
    assert_eq!(errors, vec![ValidationError::UnknownBlock { block: 7 }]);

    let tuesday = d(2025, 3, 11);
    let errors = build_reservation(&fx.ctx(), &request("I Medio B", tuesday, &[(8, 1)]), &[]).unwrap_err();
    assert_eq!(errors, vec![ValidationError::UnknownBlock { block: 8 }]);
}

#[test]
fn duplicate_selection_is_flagged() {
    let fx = Fixture::new();
    let errors = build_reservation(&fx.ctx(), &request("5to A", d(2025, 3, 6), &[(2, 3), (2, 3)]), &[])
        .unwrap_err();
    assert_eq!(errors, vec![ValidationError::DuplicateSlot { block: 2, unit: 3 }]);
}

#[test]
fn ended_blocks_cannot_be_booked_today() {
    let fx = Fixture::new();
    let today = d(2025, 3, 5);
    let ctx = fx.ctx_at(today, 10, 0);
    let errors = build_reservation(&ctx, &request("4to B", today, &[(0, 1), (4, 1)]), &[]).unwrap_err();
    assert_eq!(errors, vec![ValidationError::BlockAlreadyEnded { block: 0 }]);
}

#[test]
fn last_minute_justification_is_trimmed() {
    let fx = Fixture::new();
    let mut req = request("6to B", d(2025, 3, 5), &[(3, 2)]);
    req.is_last_minute = true;
    req.justification = "  surprise quiz \n".into();
    let draft = build_reservation(&fx.ctx(), &req, &[]).unwrap();
    assert!(draft.is_last_minute);
    assert_eq!(draft.justification, "surprise quiz");

    req.is_last_minute = false;
    let draft = build_reservation(&fx.ctx(), &req, &[]).unwrap();
    assert!(draft.justification.is_empty());
}

#[test]
fn errors_serialize_with_a_code_tag() {
    let json = serde_json::to_value(ValidationError::SlotNoLongerAvailable { block: 6, unit: 2 }).unwrap();
    assert_eq!(json["code"], "slot_no_longer_available");
    assert_eq!(json["unit"], 2);
}
