use super::{PersistenceError, PersistenceResult};
use crate::course::{Cycle, EquipmentType};
use crate::reservation::{Reservation, ReservationSlot, ReservationStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct ReservationSnapshot {
    exported_at: DateTime<Utc>,
    reservations: Vec<Reservation>,
}

pub fn save_reservations_to_json<P: AsRef<Path>>(
    reservations: &[Reservation],
    path: P,
) -> PersistenceResult<()> {
    super::validate_reservations(reservations)?;
    let snapshot = ReservationSnapshot {
        exported_at: Utc::now(),
        reservations: reservations.to_vec(),
    };
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_reservations_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Reservation>> {
    let file = File::open(path)?;
    let snapshot: ReservationSnapshot = serde_json::from_reader(file)?;
    super::validate_reservations(&snapshot.reservations)?;
    Ok(snapshot.reservations)
}

#[derive(Default, Serialize, Deserialize)]
struct ReservationCsvRecord {
    id: String,
    date: String,
    course: String,
    cycle: String,
    equipment: String,
    slots: String,
    is_last_minute: bool,
    justification: String,
    accepted_terms: bool,
    requester_id: String,
    requester_email: String,
    requester_name: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<&Reservation> for ReservationCsvRecord {
    fn from(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id.to_string(),
            date: reservation.date.format("%Y-%m-%d").to_string(),
            course: reservation.course.clone(),
            cycle: reservation.cycle.as_str().to_string(),
            equipment: reservation.equipment.as_str().to_string(),
            slots: serde_json::to_string(&reservation.slots).unwrap_or_else(|_| "[]".to_string()),
            is_last_minute: reservation.is_last_minute,
            justification: reservation.justification.clone(),
            accepted_terms: reservation.accepted_terms,
            requester_id: reservation.requester_id.clone(),
            requester_email: reservation.requester_email.clone(),
            requester_name: reservation.requester_name.clone(),
            status: reservation.status.as_str().to_string(),
            created_at: reservation.created_at.to_rfc3339(),
            updated_at: reservation.updated_at.to_rfc3339(),
        }
    }
}

impl ReservationCsvRecord {
    fn into_reservation(self) -> PersistenceResult<Reservation> {
        let id = Uuid::parse_str(self.id.trim()).map_err(|err| {
            PersistenceError::InvalidData(format!("invalid reservation id '{}': {err}", self.id))
        })?;
        let slots: Vec<ReservationSlot> = serde_json::from_str(&self.slots).map_err(|err| {
            PersistenceError::InvalidData(format!("invalid slots for reservation {id}: {err}"))
        })?;
        Ok(Reservation {
            id,
            date: parse_date(&self.date)?,
            course: self.course,
            cycle: parse_cycle(&self.cycle)?,
            equipment: EquipmentType::from_str(&self.equipment)
                .map_err(PersistenceError::InvalidData)?,
            slots,
            is_last_minute: self.is_last_minute,
            justification: self.justification,
            accepted_terms: self.accepted_terms,
            requester_id: self.requester_id,
            requester_email: self.requester_email,
            requester_name: self.requester_name,
            status: parse_status(&self.status)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

pub fn save_reservations_to_csv<P: AsRef<Path>>(
    reservations: &[Reservation],
    path: P,
) -> PersistenceResult<()> {
    super::validate_reservations(reservations)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for reservation in reservations {
        writer.serialize(ReservationCsvRecord::from(reservation))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_reservations_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Reservation>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut reservations = Vec::new();
    for record in reader.deserialize::<ReservationCsvRecord>() {
        reservations.push(record?.into_reservation()?);
    }
    super::validate_reservations(&reservations)?;
    Ok(reservations)
}

fn parse_date(input: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn parse_timestamp(input: &str) -> PersistenceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PersistenceError::InvalidData(format!("invalid timestamp '{input}': {e}")))
}

fn parse_cycle(input: &str) -> PersistenceResult<Cycle> {
    match input.trim() {
        "basic" => Ok(Cycle::Basic),
        "major" => Ok(Cycle::Major),
        other => Err(PersistenceError::InvalidData(format!(
            "invalid cycle '{other}'"
        ))),
    }
}

fn parse_status(input: &str) -> PersistenceResult<ReservationStatus> {
    match input.trim() {
        "confirmed" => Ok(ReservationStatus::Confirmed),
        "cancelled" => Ok(ReservationStatus::Cancelled),
        other => Err(PersistenceError::InvalidData(format!(
            "invalid status '{other}'"
        ))),
    }
}
