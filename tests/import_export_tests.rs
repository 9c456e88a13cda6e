use cart_reservations::course::{Cycle, EquipmentType};
use cart_reservations::normalizer::BlockKey;
use cart_reservations::persistence::{
    MemoryReservationStore, PersistenceError, ReservationRepository, load_reservations_from_csv,
    load_reservations_from_json, save_reservations_to_csv, save_reservations_to_json,
};
use cart_reservations::reservation::{
    Requester, Reservation, ReservationDraft, ReservationSlot, ReservationStatus,
};
use chrono::{NaiveDate, NaiveTime};
use tempfile::NamedTempFile;
use uuid::Uuid;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_reservations() -> Vec<Reservation> {
    let store = MemoryReservationStore::new();
    let slot = |key: u8, unit: u8, start: (u32, u32), end: (u32, u32)| ReservationSlot {
        block_key: BlockKey(key),
        unit,
        start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
    };

    store
        .create(ReservationDraft {
            course: "I Medio A".into(),
            cycle: Cycle::Major,
            equipment: EquipmentType::Chromebook,
            date: d(2025, 3, 6),
            slots: vec![slot(60, 3, (13, 10), (13, 55)), slot(70, 3, (13, 55), (14, 40))],
            is_last_minute: true,
            justification: "Projector broke, moving the lab, \"urgent\"".into(),
            accepted_terms: true,
            requester: Requester::new("u1", "ana@school.cl", "Ana Rojas"),
        })
        .unwrap();
    store
        .create(ReservationDraft {
            course: "1ro B".into(),
            cycle: Cycle::Basic,
            equipment: EquipmentType::Tablet,
            date: d(2025, 3, 11),
            slots: vec![slot(2, 1, (9, 55), (10, 40))],
            is_last_minute: false,
            justification: String::new(),
            accepted_terms: true,
            requester: Requester::new("u2", "luis@school.cl", "Luis Soto"),
        })
        .unwrap();
    store.snapshot()
}

#[test]
fn json_export_round_trip() {
    let reservations = sample_reservations();
    let file = NamedTempFile::new().unwrap();
    save_reservations_to_json(&reservations, file.path()).expect("save json");

    let loaded = load_reservations_from_json(file.path()).expect("load json");
    assert_eq!(loaded, reservations);
}

#[test]
fn csv_export_round_trip() {
    let reservations = sample_reservations();
    let file = NamedTempFile::new().unwrap();
    save_reservations_to_csv(&reservations, file.path()).expect("save csv");

    let text = std::fs::read_to_string(file.path()).unwrap();
    assert!(text.starts_with("id,date,course,cycle,equipment,slots"));

    let loaded = load_reservations_from_csv(file.path()).expect("load csv");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].slots, reservations[0].slots);
    assert_eq!(loaded[0].justification, reservations[0].justification);
    assert_eq!(loaded[1].equipment, EquipmentType::Tablet);
    assert_eq!(loaded[1].cycle, Cycle::Basic);
    assert_eq!(loaded[1].id, reservations[1].id);
}

#[test]
fn duplicate_ids_are_refused() {
    let mut reservations = sample_reservations();
    reservations[1].id = reservations[0].id;
    let file = NamedTempFile::new().unwrap();
    let err = save_reservations_to_json(&reservations, file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}

#[test]
fn malformed_csv_reports_invalid_data() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        "id,date,course,cycle,equipment,slots,is_last_minute,justification,accepted_terms,requester_id,requester_email,requester_name,status,created_at,updated_at\n\
         not-a-uuid,2025-03-06,4to A,basic,chromebook,[],false,,true,u1,a@school.cl,A,confirmed,2025-03-01T10:00:00Z,2025-03-01T10:00:00Z\n",
    )
    .unwrap();
    let err = load_reservations_from_csv(file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}

#[test]
fn imported_records_feed_a_memory_store() {
    let reservations = sample_reservations();
    let store = MemoryReservationStore::from_reservations(reservations.clone()).unwrap();
    assert_eq!(store.len(), 2);

    let empty = MemoryReservationStore::new();
    empty.replace_all(reservations).unwrap();
    assert_eq!(empty.snapshot(), store.snapshot());
}

#[test]
fn snapshot_with_double_booked_cart_is_refused() {
    let mut reservations = sample_reservations();
    let mut rival = reservations[0].clone();
    rival.id = Uuid::new_v4();
    rival.course = "II Medio B".into();
    rival.requester_email = "rival@school.cl".into();
    rival.slots.truncate(1);
    reservations.push(rival);

    let file = NamedTempFile::new().unwrap();
    let snapshot = serde_json::json!({
        "exported_at": "2025-03-01T10:00:00Z",
        "reservations": reservations,
    });
    std::fs::write(file.path(), serde_json::to_vec(&snapshot).unwrap()).unwrap();
    let err = load_reservations_from_json(file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(ref msg) if msg.contains("cart 3")));

    assert!(matches!(
        MemoryReservationStore::from_reservations(reservations.clone()),
        Err(PersistenceError::InvalidData(_))
    ));
    let store = MemoryReservationStore::new();
    assert!(store.replace_all(reservations.clone()).is_err());
    assert!(store.is_empty());

    // A cancelled record does not hold the cart
    reservations[2].status = ReservationStatus::Cancelled;
    let store = MemoryReservationStore::from_reservations(reservations).unwrap();
    assert_eq!(store.len(), 3);
}
