use crate::course::{Cycle, EquipmentType};
use crate::normalizer::BlockKey;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

/// Verified identity handed over by the login provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requester {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl Requester {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

/// One cart in one block, as selected on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectedSlot {
    pub block: u8,
    pub unit: u8,
}

impl SelectedSlot {
    pub fn new(block: u8, unit: u8) -> Self {
        Self { block, unit }
    }
}

/// Submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub course: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_last_minute: bool,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub accepted_terms: bool,
    #[serde(default)]
    pub slots: Vec<SelectedSlot>,
    pub requester: Requester,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSlot {
    pub block_key: BlockKey,
    pub unit: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ReservationSlot {
    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%-H:%M"), self.end.format("%-H:%M"))
    }
}

/// A validated reservation that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub course: String,
    pub cycle: Cycle,
    pub equipment: EquipmentType,
    pub date: NaiveDate,
    pub slots: Vec<ReservationSlot>,
    pub is_last_minute: bool,
    pub justification: String,
    pub accepted_terms: bool,
    pub requester: Requester,
}

impl ReservationDraft {
    /// Attach storage-assigned identity and timestamps.
    pub fn into_reservation(self, id: Uuid, created_at: DateTime<Utc>) -> Reservation {
        Reservation {
            id,
            course: self.course,
            cycle: self.cycle,
            equipment: self.equipment,
            date: self.date,
            slots: self.slots,
            is_last_minute: self.is_last_minute,
            justification: self.justification,
            accepted_terms: self.accepted_terms,
            requester_id: self.requester.id,
            requester_email: self.requester.email,
            requester_name: self.requester.name,
            status: ReservationStatus::Confirmed,
            created_at,
            updated_at: created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub course: String,
    pub cycle: Cycle,
    pub equipment: EquipmentType,
    pub date: NaiveDate,
    pub slots: Vec<ReservationSlot>,
    pub is_last_minute: bool,
    #[serde(default)]
    pub justification: String,
    pub accepted_terms: bool,
    pub requester_id: String,
    pub requester_email: String,
    pub requester_name: String,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }

    /// Whether any slot of `self` takes the same cart at the same canonical block.
    pub fn collides_with(
        &self,
        date: NaiveDate,
        equipment: EquipmentType,
        slot: &ReservationSlot,
    ) -> bool {
        self.is_confirmed()
            && self.date == date
            && self.equipment == equipment
            && self
                .slots
                .iter()
                .any(|own| own.block_key == slot.block_key && own.unit == slot.unit)
    }
}
