pub mod availability;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod course;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod logging;
pub mod normalizer;
pub mod persistence;
pub mod report;
pub mod reservation;
pub mod service;
pub mod validation;

pub use calendar::{Clock, FixedClock, SchoolCalendar, SystemClock};
pub use catalog::{Catalog, CatalogError, DayType, ScheduleTemplate, TimeBlock};
pub use config::{AppConfig, LogFormat};
pub use course::{CohortGroup, Course, Cycle, EquipmentType};
pub use normalizer::BlockKey;
pub use persistence::{
    MemoryReservationStore, PersistenceError, ReservationFilter, ReservationRepository,
};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteReservationStore;
pub use reservation::{Requester, Reservation, ReservationRequest, SelectedSlot};
pub use service::{ReservationService, ServiceError, SubmitError};
pub use validation::ValidationError;
