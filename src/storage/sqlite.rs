use super::{SessionStore, Store};
use crate::error::{Result, ScraperError};
use crate::types::{Availability, Club, CookieJar, Course, GeoPoint, Session, TimeslotRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS clubs (
        id           TEXT PRIMARY KEY,
        external_id  TEXT NOT NULL UNIQUE,
        name         TEXT NOT NULL,
        disabled     INTEGER NOT NULL DEFAULT 0,
        latitude     REAL,
        longitude    REAL,
        created_at   TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS courses (
        id           TEXT PRIMARY KEY,
        club_id      TEXT NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
        external_id  TEXT NOT NULL,
        name         TEXT NOT NULL,
        created_at   TEXT NOT NULL,
        UNIQUE (club_id, external_id)
    );
    CREATE TABLE IF NOT EXISTS timeslots (
        id               TEXT PRIMARY KEY,
        course_id        TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        starts_at        INTEGER NOT NULL,
        availability     TEXT NOT NULL,
        available_spots  INTEGER NOT NULL CHECK (available_spots BETWEEN 0 AND 4),
        expired          INTEGER NOT NULL,
        price_minor      INTEGER CHECK (price_minor IS NULL OR price_minor >= 0),
        last_updated     TEXT NOT NULL,
        UNIQUE (course_id, starts_at)
    );
    CREATE TABLE IF NOT EXISTS portal_cookies (
        name        TEXT PRIMARY KEY,
        value       TEXT NOT NULL,
        expires_at  TEXT NOT NULL
    );
"#;

const CLUB_COLUMNS: &str = "id, external_id, name, disabled, latitude, longitude, created_at";
const TIMESLOT_COLUMNS: &str =
    "id, course_id, starts_at, availability, available_spots, expired, price_minor, last_updated";

type ClubRow = (String, String, String, bool, Option<f64>, Option<f64>, String);
type CourseRow = (String, String, String, String, String);
type TimeslotRow = (String, String, i64, String, i64, bool, Option<i64>, String);

/// SQLite-backed store. One connection behind a mutex; every call is a
/// short synchronous statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScraperError::store("sqlite connection lock poisoned"))
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ScraperError::store(format!("Bad uuid '{}': {}", raw, e)))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScraperError::store(format!("Bad timestamp '{}': {}", raw, e)))
}

/// Fixed-width RFC 3339 so `ORDER BY created_at` sorts chronologically.
fn stamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ScraperError::store(format!("Bad unix timestamp {}", secs)))
}

fn club_from_row(row: ClubRow) -> Result<Club> {
    let (id, external_id, name, disabled, latitude, longitude, created_at) = row;
    Ok(Club {
        id: parse_uuid(&id)?,
        external_id,
        name,
        disabled,
        location: latitude.zip(longitude).map(|(lat, lon)| GeoPoint::new(lat, lon)),
        created_at: parse_time(&created_at)?,
    })
}

fn course_from_row(row: CourseRow) -> Result<Course> {
    let (id, club_id, external_id, name, created_at) = row;
    Ok(Course {
        id: parse_uuid(&id)?,
        club_id: parse_uuid(&club_id)?,
        external_id,
        name,
        created_at: parse_time(&created_at)?,
    })
}

fn timeslot_from_row(row: TimeslotRow) -> Result<TimeslotRecord> {
    let (id, course_id, starts_at, availability, spots, expired, price_minor, last_updated) = row;
    Ok(TimeslotRecord {
        id: parse_uuid(&id)?,
        course_id: parse_uuid(&course_id)?,
        starts_at: from_unix(starts_at)?,
        availability: Availability::parse(&availability),
        available_spots: u8::try_from(spots)
            .map_err(|_| ScraperError::store(format!("Bad spot count {}", spots)))?,
        expired,
        price_minor,
        last_updated: parse_time(&last_updated)?,
    })
}

fn read_timeslot(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeslotRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_club(&self, club: &Club) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            &format!("INSERT INTO clubs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", CLUB_COLUMNS),
            params![
                club.id.to_string(),
                club.external_id,
                club.name,
                club.disabled,
                club.location.map(|p| p.latitude),
                club.location.map(|p| p.longitude),
                stamp(&club.created_at),
            ],
        );
        match inserted {
            Ok(_) => {
                debug!("Created club: {} with id {}", club.name, club.id);
                Ok(())
            }
            Err(e) if is_constraint_violation(&e) => Err(ScraperError::DuplicateEntity {
                entity: "club",
                key: club.external_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_club_by_external_id(&self, external_id: &str) -> Result<Option<Club>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM clubs WHERE external_id = ?1", CLUB_COLUMNS),
                params![external_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?)),
            )
            .optional()?;
        row.map(club_from_row).transpose()
    }

    async fn list_clubs(&self) -> Result<Vec<Club>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clubs ORDER BY created_at, name",
            CLUB_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?))
            })?
            .collect::<rusqlite::Result<Vec<ClubRow>>>()?;
        rows.into_iter().map(club_from_row).collect()
    }

    async fn list_enabled_clubs(&self) -> Result<Vec<Club>> {
        Ok(self
            .list_clubs()
            .await?
            .into_iter()
            .filter(|c| !c.disabled)
            .collect())
    }

    async fn set_club_disabled(&self, club_id: Uuid, disabled: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE clubs SET disabled = ?1 WHERE id = ?2",
            params![disabled, club_id.to_string()],
        )?;
        if updated == 0 {
            return Err(ScraperError::store(format!("No club with id {}", club_id)));
        }
        Ok(())
    }

    async fn set_club_location(&self, club_id: Uuid, location: GeoPoint) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE clubs SET latitude = ?1, longitude = ?2 WHERE id = ?3",
            params![location.latitude, location.longitude, club_id.to_string()],
        )?;
        if updated == 0 {
            return Err(ScraperError::store(format!("No club with id {}", club_id)));
        }
        Ok(())
    }

    async fn create_course(&self, course: &Course) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO courses (id, club_id, external_id, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                course.id.to_string(),
                course.club_id.to_string(),
                course.external_id,
                course.name,
                stamp(&course.created_at),
            ],
        );
        match inserted {
            Ok(_) => {
                debug!("Created course: {} with id {}", course.name, course.id);
                Ok(())
            }
            Err(e) if is_constraint_violation(&e) => Err(ScraperError::DuplicateEntity {
                entity: "course",
                key: format!("{}/{}", course.club_id, course.external_id),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_courses_for_club(&self, club_id: Uuid) -> Result<Vec<Course>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, club_id, external_id, name, created_at FROM courses
             WHERE club_id = ?1 ORDER BY created_at, name",
        )?;
        let rows = stmt
            .query_map(params![club_id.to_string()], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })?
            .collect::<rusqlite::Result<Vec<CourseRow>>>()?;
        rows.into_iter().map(course_from_row).collect()
    }

    async fn find_timeslot(
        &self,
        course_id: Uuid,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<TimeslotRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM timeslots WHERE course_id = ?1 AND starts_at = ?2",
                    TIMESLOT_COLUMNS
                ),
                params![course_id.to_string(), starts_at.timestamp()],
                read_timeslot,
            )
            .optional()?;
        row.map(timeslot_from_row).transpose()
    }

    async fn upsert_timeslot(&self, record: &TimeslotRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO timeslots ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(course_id, starts_at) DO UPDATE SET
                    availability = excluded.availability,
                    available_spots = excluded.available_spots,
                    expired = excluded.expired,
                    price_minor = excluded.price_minor,
                    last_updated = excluded.last_updated",
                TIMESLOT_COLUMNS
            ),
            params![
                record.id.to_string(),
                record.course_id.to_string(),
                record.starts_at.timestamp(),
                record.availability.as_str(),
                record.available_spots,
                record.expired,
                record.price_minor,
                record.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_timeslots_for_course(&self, course_id: Uuid) -> Result<Vec<TimeslotRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM timeslots WHERE course_id = ?1 ORDER BY starts_at",
            TIMESLOT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![course_id.to_string()], read_timeslot)?
            .collect::<rusqlite::Result<Vec<TimeslotRow>>>()?;
        rows.into_iter().map(timeslot_from_row).collect()
    }

    async fn delete_timeslots_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM timeslots WHERE starts_at < ?1",
            params![cutoff.timestamp()],
        )?;
        Ok(deleted)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load_session(&self) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, value, expires_at FROM portal_cookies")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut cookies = CookieJar::new();
        let mut expires_at: Option<DateTime<Utc>> = None;
        for (name, value, expires) in rows {
            let expires = parse_time(&expires)?;
            expires_at = Some(expires_at.map_or(expires, |e| e.min(expires)));
            cookies.insert(name, value);
        }
        Ok(expires_at.map(|expires_at| Session::new(cookies, expires_at)))
    }

    async fn replace_session(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM portal_cookies", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO portal_cookies (name, value, expires_at) VALUES (?1, ?2, ?3)",
            )?;
            let expires = session.expires_at.to_rfc3339();
            for (name, value) in &session.cookies {
                insert.execute(params![name, value, expires])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
