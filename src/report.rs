use crate::course::EquipmentType;
use crate::reservation::Reservation;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequesterEntry {
    pub course: String,
    pub date: NaiveDate,
    pub equipment: EquipmentType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequesterSummary {
    pub name: String,
    pub email: String,
    pub count: usize,
    pub reservations: Vec<RequesterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationStats {
    pub total: usize,
    /// Most active requester first.
    pub by_requester: Vec<RequesterSummary>,
    pub by_course: BTreeMap<String, usize>,
    pub by_equipment: BTreeMap<EquipmentType, usize>,
}

impl ReservationStats {
    pub fn to_cli_summary(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("total={}", self.total));
        for (equipment, count) in &self.by_equipment {
            parts.push(format!("{equipment}={count}"));
        }
        if let Some(top) = self.by_requester.first() {
            parts.push(format!("top={} ({})", top.email, top.count));
        }
        parts.join(", ")
    }
}

pub fn statistics(reservations: &[Reservation]) -> ReservationStats {
    let confirmed: Vec<&Reservation> = reservations.iter().filter(|r| r.is_confirmed()).collect();

    let mut by_email: HashMap<String, RequesterSummary> = HashMap::new();
    let mut by_course = BTreeMap::new();
    let mut by_equipment: BTreeMap<EquipmentType, usize> =
        EquipmentType::ALL.iter().map(|e| (*e, 0)).collect();

    for reservation in &confirmed {
        let summary = by_email
            .entry(reservation.requester_email.to_ascii_lowercase())
            .or_insert_with(|| RequesterSummary {
                name: reservation.requester_name.clone(),
                email: reservation.requester_email.clone(),
                count: 0,
                reservations: Vec::new(),
            });
        summary.count += 1;
        summary.reservations.push(RequesterEntry {
            course: reservation.course.clone(),
            date: reservation.date,
            equipment: reservation.equipment,
        });

        *by_course.entry(reservation.course.clone()).or_insert(0) += 1;
        *by_equipment.entry(reservation.equipment).or_insert(0) += 1;
    }

    let mut by_requester: Vec<RequesterSummary> = by_email.into_values().collect();
    by_requester.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.email.cmp(&b.email)));

    ReservationStats {
        total: confirmed.len(),
        by_requester,
        by_course,
        by_equipment,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingReservations {
    pub chromebook: Vec<Reservation>,
    pub tablet: Vec<Reservation>,
}

/// Confirmed reservations from `today` on, earliest first, `limit` per type.
pub fn upcoming(
    reservations: &[Reservation],
    today: NaiveDate,
    limit: usize,
) -> UpcomingReservations {
    let mut pending: Vec<&Reservation> = reservations
        .iter()
        .filter(|r| r.is_confirmed() && r.date >= today)
        .collect();
    pending.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));

    let take = |equipment: EquipmentType| {
        pending
            .iter()
            .filter(|r| r.equipment == equipment)
            .take(limit)
            .map(|r| (*r).clone())
            .collect::<Vec<_>>()
    };

    UpcomingReservations {
        chromebook: take(EquipmentType::Chromebook),
        tablet: take(EquipmentType::Tablet),
    }
}

/// One row per booked slot, for tabular display.
pub fn ledger_frame(reservations: &[Reservation]) -> PolarsResult<DataFrame> {
    let rows: Vec<_> = reservations
        .iter()
        .flat_map(|r| r.slots.iter().map(move |slot| (r, slot)))
        .collect();

    let ids: Vec<String> = rows.iter().map(|(r, _)| r.id.to_string()).collect();
    let dates: Vec<String> = rows
        .iter()
        .map(|(r, _)| r.date.format("%Y-%m-%d").to_string())
        .collect();
    let courses: Vec<&str> = rows.iter().map(|(r, _)| r.course.as_str()).collect();
    let equipment: Vec<&str> = rows.iter().map(|(r, _)| r.equipment.as_str()).collect();
    let keys: Vec<i32> = rows
        .iter()
        .map(|(_, slot)| i32::from(slot.block_key.value()))
        .collect();
    let units: Vec<i32> = rows.iter().map(|(_, slot)| i32::from(slot.unit)).collect();
    let starts: Vec<String> = rows
        .iter()
        .map(|(_, slot)| slot.start.format("%H:%M").to_string())
        .collect();
    let ends: Vec<String> = rows
        .iter()
        .map(|(_, slot)| slot.end.format("%H:%M").to_string())
        .collect();
    let requesters: Vec<&str> = rows
        .iter()
        .map(|(r, _)| r.requester_email.as_str())
        .collect();
    let last_minute: Vec<bool> = rows.iter().map(|(r, _)| r.is_last_minute).collect();

    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("id"), ids).into_column(),
        Series::new(PlSmallStr::from_static("date"), dates).into_column(),
        Series::new(PlSmallStr::from_static("course"), courses).into_column(),
        Series::new(PlSmallStr::from_static("equipment"), equipment).into_column(),
        Series::new(PlSmallStr::from_static("block_key"), keys).into_column(),
        Series::new(PlSmallStr::from_static("unit"), units).into_column(),
        Series::new(PlSmallStr::from_static("start"), starts).into_column(),
        Series::new(PlSmallStr::from_static("end"), ends).into_column(),
        Series::new(PlSmallStr::from_static("requester"), requesters).into_column(),
        Series::new(PlSmallStr::from_static("last_minute"), last_minute).into_column(),
    ])
}
