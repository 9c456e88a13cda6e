use super::{
    PersistenceResult, ReservationFilter, ReservationRepository, find_conflict,
    validate_reservations,
};
use crate::reservation::{Reservation, ReservationDraft};
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

/// Process-local store; the mutex makes check-then-insert atomic.
#[derive(Debug, Default)]
pub struct MemoryReservationStore {
    records: Mutex<Vec<Reservation>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reservations(reservations: Vec<Reservation>) -> PersistenceResult<Self> {
        validate_reservations(&reservations)?;
        Ok(Self {
            records: Mutex::new(reservations),
        })
    }

    /// Copy of every stored record, in insertion order.
    pub fn snapshot(&self) -> Vec<Reservation> {
        self.records.lock().clone()
    }

    /// Swap the whole contents, e.g. after importing a file.
    pub fn replace_all(&self, reservations: Vec<Reservation>) -> PersistenceResult<()> {
        validate_reservations(&reservations)?;
        *self.records.lock() = reservations;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ReservationRepository for MemoryReservationStore {
    fn list_confirmed(&self, filter: &ReservationFilter) -> PersistenceResult<Vec<Reservation>> {
        let records = self.records.lock();
        Ok(records
            .iter()
            .filter(|reservation| filter.matches(reservation))
            .cloned()
            .collect())
    }

    fn find_by_id(&self, id: Uuid) -> PersistenceResult<Option<Reservation>> {
        let records = self.records.lock();
        Ok(records.iter().find(|reservation| reservation.id == id).cloned())
    }

    fn create(&self, draft: ReservationDraft) -> PersistenceResult<Reservation> {
        let mut records = self.records.lock();
        if let Some(conflict) = find_conflict(&draft, &records) {
            return Err(conflict);
        }
        let reservation = draft.into_reservation(Uuid::new_v4(), Utc::now());
        records.push(reservation.clone());
        Ok(reservation)
    }

    fn delete_by_id(&self, id: Uuid) -> PersistenceResult<()> {
        self.records.lock().retain(|reservation| reservation.id != id);
        Ok(())
    }
}
