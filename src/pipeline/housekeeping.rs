use crate::error::Result;
use crate::scrapers::golfbox::normalizer::localize;
use crate::storage::Store;
use crate::types::GeoPoint;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Writes configured coordinates, keyed by portal club id, onto known clubs.
/// Ids not in the store are skipped with a warning. Returns how many were set.
pub async fn apply_club_locations(store: &dyn Store, locations: &BTreeMap<String, GeoPoint>) -> Result<usize> {
    let mut applied = 0;
    for (external_id, location) in locations {
        match store.find_club_by_external_id(external_id).await? {
            Some(club) => {
                store.set_club_location(club.id, *location).await?;
                applied += 1;
            }
            None => warn!(club = %external_id, "No club with this id, location ignored"),
        }
    }
    Ok(applied)
}

/// Disables every enabled club with known coordinates farther than `max_km`
/// from `origin`. Returns how many were disabled.
pub async fn disable_distant_clubs(store: &dyn Store, origin: GeoPoint, max_km: f64) -> Result<usize> {
    let mut disabled = 0;
    for club in store.list_enabled_clubs().await? {
        let Some(location) = club.location else {
            continue;
        };
        let distance = origin.distance_km(&location);
        if distance > max_km {
            store.set_club_disabled(club.id, true).await?;
            info!(club = %club.name, distance_km = distance, "Disabled distant club");
            disabled += 1;
        }
    }
    Ok(disabled)
}

/// Deletes tee times that started before `cutoff`.
pub async fn prune_timeslots_before(store: &dyn Store, cutoff: DateTime<Utc>) -> Result<usize> {
    let deleted = store.delete_timeslots_before(cutoff).await?;
    info!(deleted, %cutoff, "Pruned past tee times");
    Ok(deleted)
}

/// Local midnight of `now`'s date in `tz`, as an instant.
pub fn start_of_today(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    localize(today, NaiveTime::MIN, tz)
        .unwrap_or_else(|_| Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN)))
}
