use crate::availability::{self, BlockAvailability};
use crate::calendar::{Clock, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS, SchoolCalendar};
use crate::catalog::{Catalog, CatalogError, ScheduleTemplate};
use crate::course::Course;
use crate::normalizer;
use crate::persistence::{PersistenceError, ReservationFilter, ReservationRepository};
use crate::report::{self, ReservationStats, UpcomingReservations};
use crate::reservation::{Reservation, ReservationRequest};
use crate::validation::{self, ValidationContext, ValidationError};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub enum ServiceError {
    Catalog(CatalogError),
    Repository(PersistenceError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Catalog(err) => write!(f, "{err}"),
            ServiceError::Repository(_) => write!(f, "reservation storage is unavailable"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Catalog(err) => Some(err),
            ServiceError::Repository(err) => Some(err),
        }
    }
}

impl From<CatalogError> for ServiceError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(value: PersistenceError) -> Self {
        Self::Repository(value)
    }
}

#[derive(Debug)]
pub enum SubmitError {
    /// The request broke one or more rules; nothing was stored.
    Rejected(Vec<ValidationError>),
    Repository(PersistenceError),
}

impl SubmitError {
    /// True when availability must be fetched again before retrying.
    pub fn needs_refresh(&self) -> bool {
        match self {
            SubmitError::Rejected(errors) => errors
                .iter()
                .any(|err| matches!(err, ValidationError::SlotNoLongerAvailable { .. })),
            SubmitError::Repository(_) => false,
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Rejected(errors) => {
                let messages = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "reservation rejected: {messages}")
            }
            SubmitError::Repository(_) => {
                write!(f, "the reservation could not be saved, please try again")
            }
        }
    }
}

impl std::error::Error for SubmitError {}

/// Entry point for callers: templates, availability, submission and cancellation.
pub struct ReservationService {
    catalog: Catalog,
    calendar: SchoolCalendar,
    repository: Arc<dyn ReservationRepository>,
    clock: Arc<dyn Clock>,
    horizon_days: u32,
}

impl ReservationService {
    pub fn new(repository: Arc<dyn ReservationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: Catalog::school(),
            calendar: SchoolCalendar::default(),
            repository,
            clock,
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }

    pub fn with_calendar(mut self, calendar: SchoolCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days.min(MAX_HORIZON_DAYS);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn calendar(&self) -> &SchoolCalendar {
        &self.calendar
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn available_dates(&self) -> Vec<NaiveDate> {
        self.available_dates_within(self.horizon_days)
    }

    /// Horizons beyond [`MAX_HORIZON_DAYS`] are capped.
    pub fn available_dates_within(&self, horizon_days: u32) -> Vec<NaiveDate> {
        let horizon_days = horizon_days.min(MAX_HORIZON_DAYS);
        self.calendar
            .available_dates(&self.catalog, self.clock.now(), horizon_days)
    }

    pub fn template(
        &self,
        course_name: &str,
        date: NaiveDate,
    ) -> Result<&ScheduleTemplate, CatalogError> {
        let course = self.catalog.course(course_name)?;
        self.template_for(course, date)
    }

    /// Free units for a grid row; empty when course or date is not chosen yet.
    ///
    /// Weekends, holidays and rows missing from the course's grid that day are
    /// errors, matching [`ReservationService::day_grid`].
    pub fn free_units(
        &self,
        course_name: &str,
        date: Option<NaiveDate>,
        block_index: u8,
    ) -> Result<BTreeSet<u8>, ServiceError> {
        let Some(date) = date else {
            return Ok(BTreeSet::new());
        };
        if course_name.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        let course = self.catalog.course(course_name)?;
        let template = self.template_for(course, date)?;
        if template.block(block_index).is_none() {
            return Err(CatalogError::UnknownBlock {
                date,
                block: block_index,
            }
            .into());
        }
        let existing = self.existing_for(course, date)?;
        Ok(availability::free_units(course, date, block_index, &existing))
    }

    pub fn day_grid(
        &self,
        course_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<BlockAvailability>, ServiceError> {
        let course = self.catalog.course(course_name)?;
        let template = self.template_for(course, date)?;
        let existing = self.existing_for(course, date)?;
        Ok(availability::day_grid(
            course,
            date,
            template,
            &existing,
            &self.calendar,
            self.clock.now(),
        ))
    }

    pub fn submit(&self, request: &ReservationRequest) -> Result<Reservation, SubmitError> {
        let existing = match self.catalog.course(&request.course) {
            Ok(course) => self.existing_for(course, request.date).map_err(|err| {
                error!(error = %err, "failed to load reservations for validation");
                SubmitError::Repository(err)
            })?,
            Err(_) => Vec::new(),
        };

        let ctx = ValidationContext {
            catalog: &self.catalog,
            calendar: &self.calendar,
            now: self.clock.now(),
            horizon_days: self.horizon_days,
        };
        let draft = validation::build_reservation(&ctx, request, &existing).map_err(|errors| {
            info!(
                course = %request.course,
                date = %request.date,
                requester = %request.requester.email,
                violations = errors.len(),
                "reservation rejected"
            );
            SubmitError::Rejected(errors)
        })?;

        match self.repository.create(draft) {
            Ok(reservation) => {
                info!(
                    id = %reservation.id,
                    course = %reservation.course,
                    date = %reservation.date,
                    slots = reservation.slots.len(),
                    requester = %reservation.requester_email,
                    "reservation confirmed"
                );
                Ok(reservation)
            }
            Err(PersistenceError::Conflict {
                block_key, unit, ..
            }) => {
                warn!(
                    course = %request.course,
                    date = %request.date,
                    block_key = %block_key,
                    unit,
                    "slot taken between availability check and insert"
                );
                Err(SubmitError::Rejected(vec![
                    ValidationError::SlotNoLongerAvailable {
                        block: normalizer::raw_index_for(block_key),
                        unit,
                    },
                ]))
            }
            Err(err) => {
                error!(error = %err, course = %request.course, "failed to store reservation");
                Err(SubmitError::Repository(err))
            }
        }
    }

    /// Delete a reservation; an unknown id is not an error.
    pub fn cancel(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.repository.delete_by_id(id).inspect_err(|err| {
            error!(error = %err, %id, "failed to cancel reservation");
        })?;
        info!(%id, "reservation cancelled");
        Ok(())
    }

    pub fn reservation(&self, id: Uuid) -> Result<Option<Reservation>, PersistenceError> {
        self.repository.find_by_id(id)
    }

    /// Newest first.
    pub fn reservations_for(&self, email: &str) -> Result<Vec<Reservation>, PersistenceError> {
        let mut reservations = self
            .repository
            .list_confirmed(&ReservationFilter::for_requester(email))?;
        reservations.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(reservations)
    }

    /// Newest first.
    pub fn all_reservations(&self) -> Result<Vec<Reservation>, PersistenceError> {
        let mut reservations = self.repository.list_confirmed(&ReservationFilter::all())?;
        reservations.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(reservations)
    }

    /// Oldest first, bounds inclusive.
    pub fn reservations_between(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Reservation>, PersistenceError> {
        let mut reservations = self
            .repository
            .list_confirmed(&ReservationFilter::between(from, to))?;
        reservations.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Ok(reservations)
    }

    pub fn upcoming(&self, limit: usize) -> Result<UpcomingReservations, PersistenceError> {
        let reservations = self.repository.list_confirmed(&ReservationFilter::all())?;
        Ok(report::upcoming(&reservations, self.clock.today(), limit))
    }

    pub fn statistics(&self) -> Result<ReservationStats, PersistenceError> {
        let reservations = self.all_reservations()?;
        Ok(report::statistics(&reservations))
    }

    fn template_for(
        &self,
        course: &Course,
        date: NaiveDate,
    ) -> Result<&ScheduleTemplate, CatalogError> {
        if self.calendar.is_holiday(date) {
            return Err(CatalogError::InvalidDate(date));
        }
        self.catalog.template_for(course, date)
    }

    fn existing_for(
        &self,
        course: &Course,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, PersistenceError> {
        self.repository
            .list_confirmed(&ReservationFilter::on(date, course.equipment))
    }
}
