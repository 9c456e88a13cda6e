use crate::course::{CohortGroup, Course, school_roster};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Tuesday,
    OtherWeekday,
}

impl DayType {
    /// Classify a date; weekends have no day type.
    pub fn of(date: NaiveDate) -> Option<Self> {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => None,
            Weekday::Tue => Some(DayType::Tuesday),
            _ => Some(DayType::OtherWeekday),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    UnknownCourse(String),
    InvalidDate(NaiveDate),
    /// The course's grid for that date has no such row.
    UnknownBlock { date: NaiveDate, block: u8 },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::UnknownCourse(name) => write!(f, "unknown course '{name}'"),
            CatalogError::InvalidDate(date) => {
                write!(f, "{date} ({}) is not a school day", date.weekday())
            }
            CatalogError::UnknownBlock { date, block } => {
                write!(f, "block {block} is not in the schedule for {date}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    /// Row of the block in the day's selection grid.
    pub index: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeBlock {
    fn new(index: u8, (start_h, start_m): (u32, u32), (end_h, end_m): (u32, u32)) -> Self {
        Self {
            index,
            start: clock_time(start_h, start_m),
            end: clock_time(end_h, end_m),
        }
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%-H:%M"), self.end.format("%-H:%M"))
    }
}

fn clock_time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("schedule catalog holds valid clock times")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub day_type: DayType,
    /// `None` for the Tuesday grid, which every cohort shares.
    pub cohort: Option<CohortGroup>,
    pub blocks: Vec<TimeBlock>,
}

impl ScheduleTemplate {
    fn from_rows(
        day_type: DayType,
        cohort: Option<CohortGroup>,
        rows: &[(u8, (u32, u32), (u32, u32))],
    ) -> Self {
        let blocks = rows
            .iter()
            .map(|&(index, start, end)| TimeBlock::new(index, start, end))
            .collect();
        Self {
            day_type,
            cohort,
            blocks,
        }
    }

    pub fn block(&self, index: u8) -> Option<&TimeBlock> {
        self.blocks.iter().find(|block| block.index == index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// End of the last block of the day.
    pub fn day_end(&self) -> Option<NaiveTime> {
        self.blocks.last().map(|block| block.end)
    }
}

const TUESDAY_ROWS: [(u8, (u32, u32), (u32, u32)); 7] = [
    (0, (8, 10), (8, 55)),
    (1, (8, 55), (9, 40)),
    (2, (9, 55), (10, 40)),
    (3, (10, 40), (11, 25)),
    (4, (11, 40), (12, 25)),
    (5, (12, 25), (13, 10)),
    (6, (13, 10), (13, 50)),
];

const JUNIOR_ROWS: [(u8, (u32, u32), (u32, u32)); 9] = [
    (0, (8, 10), (8, 55)),
    (1, (8, 55), (9, 40)),
    (2, (9, 55), (10, 40)),
    (3, (10, 40), (11, 25)),
    (4, (11, 25), (12, 10)),
    (5, (12, 55), (13, 35)),
    (6, (13, 35), (14, 20)),
    (8, (14, 40), (15, 20)),
    (9, (15, 20), (16, 0)),
];

const MIDDLE_ROWS: [(u8, (u32, u32), (u32, u32)); 9] = [
    (0, (8, 10), (8, 55)),
    (1, (8, 55), (9, 40)),
    (2, (9, 55), (10, 40)),
    (3, (10, 40), (11, 25)),
    (4, (11, 45), (12, 30)),
    (5, (12, 30), (13, 10)),
    (6, (13, 55), (14, 40)),
    (8, (14, 40), (15, 20)),
    (9, (15, 20), (16, 0)),
];

// Rows 6 and 7 are the periods Senior courses keep after the midday restructuring.
const SENIOR_ROWS: [(u8, (u32, u32), (u32, u32)); 10] = [
    (0, (8, 10), (8, 55)),
    (1, (8, 55), (9, 40)),
    (2, (9, 55), (10, 40)),
    (3, (10, 40), (11, 25)),
    (4, (11, 45), (12, 30)),
    (5, (12, 30), (13, 10)),
    (6, (13, 10), (13, 55)),
    (7, (13, 55), (14, 40)),
    (8, (14, 40), (15, 20)),
    (9, (15, 20), (16, 0)),
];

/// Read-only reference data: the roster and every block template.
#[derive(Debug, Clone)]
pub struct Catalog {
    courses: Vec<Course>,
    tuesday: ScheduleTemplate,
    junior: ScheduleTemplate,
    middle: ScheduleTemplate,
    senior: ScheduleTemplate,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::school()
    }
}

impl Catalog {
    pub fn school() -> Self {
        Self {
            courses: school_roster(),
            tuesday: ScheduleTemplate::from_rows(DayType::Tuesday, None, &TUESDAY_ROWS),
            junior: ScheduleTemplate::from_rows(
                DayType::OtherWeekday,
                Some(CohortGroup::Junior),
                &JUNIOR_ROWS,
            ),
            middle: ScheduleTemplate::from_rows(
                DayType::OtherWeekday,
                Some(CohortGroup::Middle),
                &MIDDLE_ROWS,
            ),
            senior: ScheduleTemplate::from_rows(
                DayType::OtherWeekday,
                Some(CohortGroup::Senior),
                &SENIOR_ROWS,
            ),
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, name: &str) -> Result<&Course, CatalogError> {
        let wanted = name.trim();
        self.courses
            .iter()
            .find(|course| course.name == wanted)
            .ok_or_else(|| CatalogError::UnknownCourse(wanted.to_string()))
    }

    pub fn day_type(&self, date: NaiveDate) -> Result<DayType, CatalogError> {
        DayType::of(date).ok_or(CatalogError::InvalidDate(date))
    }

    pub fn template_for(
        &self,
        course: &Course,
        date: NaiveDate,
    ) -> Result<&ScheduleTemplate, CatalogError> {
        Ok(match self.day_type(date)? {
            DayType::Tuesday => &self.tuesday,
            DayType::OtherWeekday => self.weekday_template(course.cohort),
        })
    }

    pub fn template_for_name(
        &self,
        course_name: &str,
        date: NaiveDate,
    ) -> Result<&ScheduleTemplate, CatalogError> {
        let course = self.course(course_name)?;
        self.template_for(course, date)
    }

    /// Grid that decides when a whole school day is over.
    pub fn generic_template(&self, date: NaiveDate) -> Result<&ScheduleTemplate, CatalogError> {
        Ok(match self.day_type(date)? {
            DayType::Tuesday => &self.tuesday,
            DayType::OtherWeekday => &self.junior,
        })
    }

    fn weekday_template(&self, cohort: CohortGroup) -> &ScheduleTemplate {
        match cohort {
            CohortGroup::Junior => &self.junior,
            CohortGroup::Middle => &self.middle,
            CohortGroup::Senior => &self.senior,
        }
    }
}
