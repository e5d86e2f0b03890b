use super::{SessionStore, Store};
use crate::error::{Result, ScraperError};
use crate::types::{Club, Course, GeoPoint, Session, TimeslotRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

type TimeslotKey = (Uuid, DateTime<Utc>);

/// In-memory store for development and tests.
#[derive(Default)]
pub struct InMemoryStore {
    clubs: Arc<Mutex<HashMap<Uuid, Club>>>,
    courses: Arc<Mutex<HashMap<Uuid, Course>>>,
    timeslots: Arc<Mutex<HashMap<TimeslotKey, TimeslotRecord>>>,
    session: Arc<Mutex<Option<Session>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ScraperError::store("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_club(&self, club: &Club) -> Result<()> {
        let mut clubs = lock(&self.clubs)?;
        if clubs.values().any(|c| c.external_id == club.external_id) {
            return Err(ScraperError::DuplicateEntity {
                entity: "club",
                key: club.external_id.clone(),
            });
        }
        clubs.insert(club.id, club.clone());
        debug!("Created club: {} with id {}", club.name, club.id);
        Ok(())
    }

    async fn find_club_by_external_id(&self, external_id: &str) -> Result<Option<Club>> {
        let clubs = lock(&self.clubs)?;
        Ok(clubs.values().find(|c| c.external_id == external_id).cloned())
    }

    async fn list_clubs(&self) -> Result<Vec<Club>> {
        let clubs = lock(&self.clubs)?;
        let mut all: Vec<Club> = clubs.values().cloned().collect();
        // Stable order so club limits pick the same clubs every run
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(all)
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
        let mut clubs = lock(&self.clubs)?;
        let club = clubs
            .get_mut(&club_id)
            .ok_or_else(|| ScraperError::store(format!("No club with id {}", club_id)))?;
        club.disabled = disabled;
        Ok(())
    }

    async fn set_club_location(&self, club_id: Uuid, location: GeoPoint) -> Result<()> {
        let mut clubs = lock(&self.clubs)?;
        let club = clubs
            .get_mut(&club_id)
            .ok_or_else(|| ScraperError::store(format!("No club with id {}", club_id)))?;
        club.location = Some(location);
        Ok(())
    }

    async fn create_course(&self, course: &Course) -> Result<()> {
        let mut courses = lock(&self.courses)?;
        if courses
            .values()
            .any(|c| c.club_id == course.club_id && c.external_id == course.external_id)
        {
            return Err(ScraperError::DuplicateEntity {
                entity: "course",
                key: format!("{}/{}", course.club_id, course.external_id),
            });
        }
        courses.insert(course.id, course.clone());
        debug!("Created course: {} with id {}", course.name, course.id);
        Ok(())
    }

    async fn list_courses_for_club(&self, club_id: Uuid) -> Result<Vec<Course>> {
        let courses = lock(&self.courses)?;
        let mut found: Vec<Course> = courses
            .values()
            .filter(|c| c.club_id == club_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(found)
    }

    async fn find_timeslot(
        &self,
        course_id: Uuid,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<TimeslotRecord>> {
        let timeslots = lock(&self.timeslots)?;
        Ok(timeslots.get(&(course_id, starts_at)).cloned())
    }

    async fn upsert_timeslot(&self, record: &TimeslotRecord) -> Result<()> {
        let mut timeslots = lock(&self.timeslots)?;
        timeslots
            .entry((record.course_id, record.starts_at))
            .and_modify(|existing| {
                existing.apply(record);
                existing.last_updated = record.last_updated;
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn list_timeslots_for_course(&self, course_id: Uuid) -> Result<Vec<TimeslotRecord>> {
        let timeslots = lock(&self.timeslots)?;
        let mut found: Vec<TimeslotRecord> = timeslots
            .values()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.starts_at);
        Ok(found)
    }

    async fn delete_timeslots_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut timeslots = lock(&self.timeslots)?;
        let before = timeslots.len();
        timeslots.retain(|(_, starts_at), _| *starts_at >= cutoff);
        Ok(before - timeslots.len())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn load_session(&self) -> Result<Option<Session>> {
        Ok(lock(&self.session)?.clone())
    }

    async fn replace_session(&self, session: &Session) -> Result<()> {
        *lock(&self.session)? = Some(session.clone());
        Ok(())
    }
}
