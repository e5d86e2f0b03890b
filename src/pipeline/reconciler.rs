use crate::app::ports::Clock;
use crate::error::Result;
use crate::storage::Store;
use crate::types::TimeslotRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What an upsert did to the stored tee time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertOutcome {
    Created,
    /// Availability, spots, price or expiry changed.
    Updated,
    /// Same values as before; only `last_updated` moved.
    Refreshed,
}

/// Writes normalized tee times, keeping one record per `(course, instant)`.
pub struct Reconciler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Inserts `record`, or folds it into the existing record for the same
    /// course and instant. The existing record keeps its id.
    pub async fn upsert(&self, record: TimeslotRecord) -> Result<UpsertOutcome> {
        let now = self.clock.now();

        match self.store.find_timeslot(record.course_id, record.starts_at).await? {
            Some(mut existing) => {
                let changed = existing.apply(&record);
                existing.last_updated = now;
                self.store.upsert_timeslot(&existing).await?;
                if changed {
                    debug!(
                        course_id = %existing.course_id,
                        starts_at = %existing.starts_at,
                        availability = %existing.availability,
                        "Updated tee time"
                    );
                    Ok(UpsertOutcome::Updated)
                } else {
                    Ok(UpsertOutcome::Refreshed)
                }
            }
            None => {
                let record = TimeslotRecord {
                    last_updated: now,
                    ..record
                };
                self.store.upsert_timeslot(&record).await?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ManualClock;
    use crate::storage::InMemoryStore;
    use crate::types::Availability;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn record(course_id: Uuid, availability: Availability, spots: u8) -> TimeslotRecord {
        TimeslotRecord {
            id: Uuid::new_v4(),
            course_id,
            starts_at: Utc.with_ymd_and_hms(2025, 6, 2, 5, 0, 0).unwrap(),
            availability,
            available_spots: spots,
            expired: false,
            price_minor: Some(45_000),
            last_updated: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn reconciler() -> (Reconciler, Arc<InMemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()));
        (Reconciler::new(store.clone(), clock.clone()), store, clock)
    }

    #[tokio::test]
    async fn identical_upserts_leave_one_record() {
        let (reconciler, store, clock) = reconciler();
        let course = Uuid::new_v4();

        let first = record(course, Availability::Free, 4);
        assert_eq!(reconciler.upsert(first.clone()).await.unwrap(), UpsertOutcome::Created);
        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(reconciler.upsert(first.clone()).await.unwrap(), UpsertOutcome::Refreshed);

        let stored = store.list_timeslots_for_course(course).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first.id);
        assert_eq!(stored[0].available_spots, 4);
        assert_eq!(stored[0].last_updated, clock.now());
    }

    #[tokio::test]
    async fn second_crawl_overwrites_mutable_fields() {
        let (reconciler, store, _clock) = reconciler();
        let course = Uuid::new_v4();
        let original = record(course, Availability::Free, 4);
        reconciler.upsert(original.clone()).await.unwrap();

        let mut later = record(course, Availability::PartFree, 1);
        later.price_minor = None;
        later.expired = true;
        assert_eq!(reconciler.upsert(later).await.unwrap(), UpsertOutcome::Updated);

        let stored = store.list_timeslots_for_course(course).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, original.id);
        assert_eq!(stored[0].availability, Availability::PartFree);
        assert_eq!(stored[0].available_spots, 1);
        assert_eq!(stored[0].price_minor, None);
        assert!(stored[0].expired);
    }

    #[tokio::test]
    async fn courses_do_not_interfere() {
        let (reconciler, store, _clock) = reconciler();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        reconciler.upsert(record(a, Availability::Free, 4)).await.unwrap();
        reconciler.upsert(record(b, Availability::Full, 0)).await.unwrap();

        assert_eq!(store.list_timeslots_for_course(a).await.unwrap()[0].availability, Availability::Free);
        assert_eq!(store.list_timeslots_for_course(b).await.unwrap()[0].availability, Availability::Full);
    }
}
