use crate::error::Result;
use crate::types::{Club, Course, GeoPoint, Session, TimeslotRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Persistence for the club/course catalog and tee times.
#[async_trait]
pub trait Store: Send + Sync {
    // Club operations
    /// Fails with `DuplicateEntity` when the external id is taken.
    async fn create_club(&self, club: &Club) -> Result<()>;
    async fn find_club_by_external_id(&self, external_id: &str) -> Result<Option<Club>>;
    async fn list_clubs(&self) -> Result<Vec<Club>>;
    async fn list_enabled_clubs(&self) -> Result<Vec<Club>>;
    async fn set_club_disabled(&self, club_id: Uuid, disabled: bool) -> Result<()>;
    async fn set_club_location(&self, club_id: Uuid, location: GeoPoint) -> Result<()>;

    // Course operations
    /// Fails with `DuplicateEntity` when `(club_id, external_id)` is taken.
    async fn create_course(&self, course: &Course) -> Result<()>;
    async fn list_courses_for_club(&self, club_id: Uuid) -> Result<Vec<Course>>;

    // Tee time operations
    async fn find_timeslot(
        &self,
        course_id: Uuid,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<TimeslotRecord>>;
    /// Insert or overwrite keyed by `(course_id, starts_at)`.
    async fn upsert_timeslot(&self, record: &TimeslotRecord) -> Result<()>;
    async fn list_timeslots_for_course(&self, course_id: Uuid) -> Result<Vec<TimeslotRecord>>;
    async fn delete_timeslots_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Holds the one current portal session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self) -> Result<Option<Session>>;
    /// Replaces the stored session wholesale.
    async fn replace_session(&self, session: &Session) -> Result<()>;
}
