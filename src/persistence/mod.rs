use crate::course::EquipmentType;
use crate::normalizer::BlockKey;
use crate::reservation::{Reservation, ReservationDraft};
use chrono::NaiveDate;
use serde_json::Error as SerdeJsonError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use uuid::Uuid;

#[derive(Debug)]
pub enum PersistenceError {
    Serialization(SerdeJsonError),
    Io(io::Error),
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Error),
    Csv(csv::Error),
    InvalidData(String),
    /// A stored confirmed reservation already holds this cart at this block.
    Conflict {
        date: NaiveDate,
        equipment: EquipmentType,
        block_key: BlockKey,
        unit: u8,
    },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Serialization(err) => write!(f, "serialization error: {err}"),
            PersistenceError::Io(err) => write!(f, "io error: {err}"),
            #[cfg(feature = "sqlite")]
            PersistenceError::Sqlite(err) => write!(f, "sqlite error: {err}"),
            PersistenceError::Csv(err) => write!(f, "csv error: {err}"),
            PersistenceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            PersistenceError::Conflict {
                date,
                equipment,
                block_key,
                unit,
            } => write!(
                f,
                "{equipment} cart {unit} is already booked at block {block_key} on {date}"
            ),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<SerdeJsonError> for PersistenceError {
    fn from(value: SerdeJsonError) -> Self {
        Self::Serialization(value)
    }
}

impl From<io::Error> for PersistenceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<csv::Error> for PersistenceError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Selection applied by [`ReservationRepository::list_confirmed`]; unset
/// fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub date: Option<NaiveDate>,
    pub equipment: Option<EquipmentType>,
    pub requester_email: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReservationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn on(date: NaiveDate, equipment: EquipmentType) -> Self {
        Self {
            date: Some(date),
            equipment: Some(equipment),
            ..Self::default()
        }
    }

    pub fn for_requester(email: impl Into<String>) -> Self {
        Self {
            requester_email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn between(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    pub fn matches(&self, reservation: &Reservation) -> bool {
        reservation.is_confirmed()
            && self.date.is_none_or(|date| reservation.date == date)
            && self
                .equipment
                .is_none_or(|equipment| reservation.equipment == equipment)
            && self.requester_email.as_deref().is_none_or(|email| {
                reservation.requester_email.eq_ignore_ascii_case(email)
            })
            && self.from.is_none_or(|from| reservation.date >= from)
            && self.to.is_none_or(|to| reservation.date <= to)
    }
}

/// Storage for reservation records.
///
/// `create` must be all-or-nothing and must refuse a draft that collides with
/// a stored confirmed reservation, returning [`PersistenceError::Conflict`].
/// `delete_by_id` succeeds when the id is already gone.
pub trait ReservationRepository: Send + Sync {
    fn list_confirmed(&self, filter: &ReservationFilter) -> PersistenceResult<Vec<Reservation>>;
    fn find_by_id(&self, id: Uuid) -> PersistenceResult<Option<Reservation>>;
    fn create(&self, draft: ReservationDraft) -> PersistenceResult<Reservation>;
    fn delete_by_id(&self, id: Uuid) -> PersistenceResult<()>;
}

/// First slot of `draft` already taken by one of `stored`.
pub(crate) fn find_conflict(
    draft: &ReservationDraft,
    stored: &[Reservation],
) -> Option<PersistenceError> {
    draft.slots.iter().find_map(|slot| {
        stored
            .iter()
            .any(|existing| existing.collides_with(draft.date, draft.equipment, slot))
            .then(|| PersistenceError::Conflict {
                date: draft.date,
                equipment: draft.equipment,
                block_key: slot.block_key,
                unit: slot.unit,
            })
    })
}

/// Checks a loaded snapshot: unique ids, at least one slot each, and no cart
/// held twice at the same block by confirmed reservations.
pub(crate) fn validate_reservations(reservations: &[Reservation]) -> PersistenceResult<()> {
    let mut seen = HashSet::with_capacity(reservations.len());
    let mut held = HashMap::new();
    for reservation in reservations {
        if !seen.insert(reservation.id) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate reservation id {}",
                reservation.id
            )));
        }
        if reservation.slots.is_empty() {
            return Err(PersistenceError::InvalidData(format!(
                "reservation {} has no slots",
                reservation.id
            )));
        }
        if !reservation.is_confirmed() {
            continue;
        }
        for slot in &reservation.slots {
            let key = (
                reservation.date,
                reservation.equipment,
                slot.block_key,
                slot.unit,
            );
            if let Some(holder) = held.insert(key, reservation.id) {
                if holder != reservation.id {
                    return Err(PersistenceError::InvalidData(format!(
                        "reservations {holder} and {} both hold {} cart {} at block {} on {}",
                        reservation.id,
                        reservation.equipment,
                        slot.unit,
                        slot.block_key,
                        reservation.date
                    )));
                }
            }
        }
    }
    Ok(())
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_reservations_from_csv, load_reservations_from_json, save_reservations_to_csv,
    save_reservations_to_json,
};
pub use memory::MemoryReservationStore;
