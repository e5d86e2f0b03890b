use crate::constants::MAX_PLAYERS;
use crate::error::{Result, ScraperError};
use crate::types::{Availability, RawSlotDescriptor, TimeslotRecord};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

static TIME_OF_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[:.](\d{2})").expect("static regex"));

/// Turns raw grid cells into typed tee time records.
#[derive(Debug, Clone)]
pub struct SlotNormalizer {
    tz: Tz,
    price_ceiling_minor: i64,
}

impl SlotNormalizer {
    pub fn new(tz: Tz, price_ceiling_minor: i64) -> Self {
        Self {
            tz,
            price_ceiling_minor,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Normalizes a cell from the grid of `date`. Cells without a usable
    /// time of day carry no instant and come back as `None`.
    pub fn normalize(
        &self,
        course_id: Uuid,
        date: NaiveDate,
        raw: &RawSlotDescriptor,
        observed_at: DateTime<Utc>,
    ) -> Option<TimeslotRecord> {
        let Some(time_text) = raw.time_text.as_deref() else {
            debug!(%date, "Dropping unanchored blocking cell");
            return None;
        };

        let starts_at = match parse_time_of_day(time_text).and_then(|t| localize(date, t, self.tz)) {
            Ok(instant) => instant,
            Err(e) => {
                warn!(%date, "Dropping cell: {}", e);
                return None;
            }
        };

        let availability = Availability::from_token(raw.availability_token.as_deref());
        let available_spots = available_spots(availability, raw.occupied_seats);

        Some(TimeslotRecord {
            id: Uuid::new_v4(),
            course_id,
            starts_at,
            availability,
            available_spots,
            expired: raw.expired,
            price_minor: self.price(raw.price_text.as_deref()),
            last_updated: observed_at,
        })
    }

    fn price(&self, text: Option<&str>) -> Option<i64> {
        match parse_price_minor(text?) {
            Ok(Some(minor)) if minor > self.price_ceiling_minor => {
                warn!(
                    price_minor = minor,
                    ceiling = self.price_ceiling_minor,
                    "Price above ceiling, leaving it out"
                );
                None
            }
            Ok(price) => price,
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}

/// Seats left out of four; a blocking slot has none whatever the seat count says.
pub fn available_spots(availability: Availability, occupied_seats: usize) -> u8 {
    if availability == Availability::Blocking {
        return 0;
    }
    let occupied = occupied_seats.min(MAX_PLAYERS as usize) as u8;
    MAX_PLAYERS - occupied
}

pub fn parse_time_of_day(text: &str) -> Result<NaiveTime> {
    let invalid = || ScraperError::ParseValue {
        field: "time of day",
        value: text.to_string(),
    };
    let caps = TIME_OF_DAY.captures(text).ok_or_else(invalid)?;
    let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
    let minute: u32 = caps[2].parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Price text such as `1,500-` to minor units (`150000`). Empty text is no
/// price, not zero.
pub fn parse_price_minor(text: &str) -> Result<Option<i64>> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '-') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    let invalid = || ScraperError::ParseValue {
        field: "price",
        value: text.to_string(),
    };
    let major: i64 = cleaned.parse().map_err(|_| invalid())?;
    major.checked_mul(100).map(Some).ok_or_else(invalid)
}

/// Localizes a wall-clock time on `date` in `tz`. On the autumn DST overlap
/// the earlier instant wins; times inside the spring gap do not exist.
pub fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ScraperError::ParseValue {
            field: "local time",
            value: format!("{} {} {}", date, time, tz),
        })
}
