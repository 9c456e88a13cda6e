use super::{PersistenceError, PersistenceResult, ReservationFilter, ReservationRepository};
use crate::reservation::{Reservation, ReservationDraft};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use uuid::Uuid;

/// SQLite-backed store.
///
/// Slots live in their own table with a UNIQUE index over
/// `(date, equipment, block_key, unit)`, so a colliding insert fails inside
/// the creating transaction and nothing is written.
pub struct SqliteReservationStore {
    connection: Mutex<Connection>,
}

impl SqliteReservationStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                equipment TEXT NOT NULL,
                requester_email TEXT NOT NULL,
                reservation_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS reservations_by_date
                ON reservations (date, equipment);
            CREATE TABLE IF NOT EXISTS reservation_slots (
                reservation_id TEXT NOT NULL REFERENCES reservations (id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                equipment TEXT NOT NULL,
                block_key INTEGER NOT NULL,
                unit INTEGER NOT NULL,
                UNIQUE (date, equipment, block_key, unit)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn insert(
        tx: &rusqlite::Transaction,
        reservation: &Reservation,
    ) -> PersistenceResult<()> {
        let date = reservation.date.format("%Y-%m-%d").to_string();
        let json = serde_json::to_string(reservation)?;
        tx.execute(
            "INSERT INTO reservations (id, date, equipment, requester_email, reservation_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reservation.id.to_string(),
                date,
                reservation.equipment.as_str(),
                reservation.requester_email.to_ascii_lowercase(),
                json
            ],
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO reservation_slots (reservation_id, date, equipment, block_key, unit)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for slot in &reservation.slots {
            let inserted = stmt.execute(params![
                reservation.id.to_string(),
                date,
                reservation.equipment.as_str(),
                slot.block_key.value(),
                slot.unit
            ]);
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(PersistenceError::Conflict {
                        date: reservation.date,
                        equipment: reservation.equipment,
                        block_key: slot.block_key,
                        unit: slot.unit,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

impl ReservationRepository for SqliteReservationStore {
    fn list_confirmed(&self, filter: &ReservationFilter) -> PersistenceResult<Vec<Reservation>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT reservation_json FROM reservations
             WHERE (?1 IS NULL OR date = ?1)
               AND (?2 IS NULL OR equipment = ?2)
               AND (?3 IS NULL OR requester_email = ?3)
             ORDER BY date ASC, rowid ASC",
        )?;
        let date = filter.date.map(|d| d.format("%Y-%m-%d").to_string());
        let equipment = filter.equipment.map(|e| e.as_str());
        let email = filter
            .requester_email
            .as_ref()
            .map(|email| email.to_ascii_lowercase());
        let rows = stmt.query_map(params![date, equipment, email], |row| {
            row.get::<_, String>(0)
        })?;

        let mut reservations = Vec::new();
        for json in rows {
            let reservation: Reservation = serde_json::from_str(&json?)?;
            if filter.matches(&reservation) {
                reservations.push(reservation);
            }
        }
        Ok(reservations)
    }

    fn find_by_id(&self, id: Uuid) -> PersistenceResult<Option<Reservation>> {
        let conn = self.connection.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT reservation_json FROM reservations WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| serde_json::from_str(&json).map_err(PersistenceError::from))
            .transpose()
    }

    fn create(&self, draft: ReservationDraft) -> PersistenceResult<Reservation> {
        let reservation = draft.into_reservation(Uuid::new_v4(), Utc::now());
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::insert(&tx, &reservation)?;
        tx.commit()?;
        Ok(reservation)
    }

    fn delete_by_id(&self, id: Uuid) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "DELETE FROM reservations WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }
}
