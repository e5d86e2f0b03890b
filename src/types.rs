use crate::constants::{DATE_TOKEN_FORMAT, MAX_PLAYERS};
use crate::error::{Result, ScraperError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Cookie name to value, as sent back to the portal.
pub type CookieJar = BTreeMap<String, String>;

/// Renders a jar as a `Cookie` request header value.
pub fn cookie_header(jar: &CookieJar) -> String {
    jar.iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses `a=1; b=2` into a jar. Malformed pairs are skipped.
pub fn parse_cookie_pairs(raw: &str) -> CookieJar {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Authenticated portal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub cookies: CookieJar,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(cookies: CookieJar, expires_at: DateTime<Utc>) -> Self {
        Self { cookies, expires_at }
    }

    /// Valid iff expiry is strictly in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0088;
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// A golf club on the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub disabled: bool,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

impl Club {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            name: name.into(),
            disabled: false,
            location: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// A bookable resource (course) belonging to a club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub club_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn new(club_id: Uuid, external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            club_id,
            external_id: external_id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// One `(name, external id)` pair read from a selection control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub external_id: String,
}

/// A calendar day as the grid page addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortalDate(pub NaiveDate);

impl PortalDate {
    pub fn token(&self) -> String {
        self.0.and_time(NaiveTime::MIN).format(DATE_TOKEN_FORMAT).to_string()
    }

    pub fn parse_token(token: &str) -> Result<Self> {
        chrono::NaiveDateTime::parse_from_str(token, DATE_TOKEN_FORMAT)
            .map(|dt| PortalDate(dt.date()))
            .map_err(|_| ScraperError::ParseValue {
                field: "date token",
                value: token.to_string(),
            })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for PortalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot state derived from the grid cell's class tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Free,
    PartFree,
    Full,
    Blocking,
    Unknown,
}

/// Class token to state, highest priority first. A cell carrying several
/// of these tokens takes the first one listed.
pub const AVAILABILITY_PRIORITY: [(&str, Availability); 4] = [
    ("free", Availability::Free),
    ("c_partfree", Availability::PartFree),
    ("full", Availability::Full),
    ("blocking", Availability::Blocking),
];

impl Availability {
    /// Picks the highest-priority token present in `classes`.
    pub fn classify<'a, I>(classes: I) -> Option<&'static str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: Vec<&str> = classes.into_iter().collect();
        AVAILABILITY_PRIORITY
            .iter()
            .find(|(token, _)| classes.contains(token))
            .map(|(token, _)| *token)
    }

    pub fn from_token(token: Option<&str>) -> Self {
        token
            .and_then(|t| AVAILABILITY_PRIORITY.iter().find(|(known, _)| *known == t))
            .map(|(_, state)| *state)
            .unwrap_or(Availability::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Free => "free",
            Availability::PartFree => "partfree",
            Availability::Full => "full",
            Availability::Blocking => "blocking",
            Availability::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "free" => Availability::Free,
            "partfree" => Availability::PartFree,
            "full" => Availability::Full,
            "blocking" => Availability::Blocking,
            _ => Availability::Unknown,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One grid cell as read off the page, before any typing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSlotDescriptor {
    pub time_text: Option<String>,
    pub availability_token: Option<String>,
    pub occupied_seats: usize,
    pub price_text: Option<String>,
    pub expired: bool,
}

/// A normalized tee time, unique per `(course_id, starts_at)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeslotRecord {
    pub id: Uuid,
    pub course_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub availability: Availability,
    pub available_spots: u8,
    pub expired: bool,
    pub price_minor: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

impl TimeslotRecord {
    /// Copies the crawl-mutable fields from `other`. Returns whether any differed.
    pub fn apply(&mut self, other: &TimeslotRecord) -> bool {
        let changed = self.availability != other.availability
            || self.available_spots != other.available_spots
            || self.expired != other.expired
            || self.price_minor != other.price_minor;
        self.availability = other.availability;
        self.available_spots = other.available_spots.min(MAX_PLAYERS);
        self.expired = other.expired;
        self.price_minor = other.price_minor;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_table_pins_precedence() {
        assert_eq!(Availability::classify(["slot", "free", "blocking"]), Some("free"));
        assert_eq!(Availability::classify(["blocking", "c_partfree"]), Some("c_partfree"));
        assert_eq!(Availability::classify(["full", "blocking"]), Some("full"));
        assert_eq!(Availability::classify(["blocking", "expired"]), Some("blocking"));
        assert_eq!(Availability::classify(["slot", "expired"]), None);
    }

    #[test]
    fn token_maps_to_state() {
        assert_eq!(Availability::from_token(Some("c_partfree")), Availability::PartFree);
        assert_eq!(Availability::from_token(Some("weird")), Availability::Unknown);
        assert_eq!(Availability::from_token(None), Availability::Unknown);
        assert_eq!(Availability::parse(Availability::Blocking.as_str()), Availability::Blocking);
    }

    #[test]
    fn date_token_format() {
        let date = PortalDate(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(date.token(), "20250601T000000");
        assert_eq!(PortalDate::parse_token("20250601T000000").unwrap(), date);
        assert!(PortalDate::parse_token("2025-06-01").is_err());
    }

    #[test]
    fn session_expiry_is_strict() {
        let now = Utc::now();
        let session = Session::new(CookieJar::new(), now);
        assert!(!session.is_valid_at(now));
        assert!(session.is_valid_at(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn cookie_pairs_round_through_header() {
        let jar = parse_cookie_pairs("ASPSESSIONID=abc; GolfBox=u=1&t=2;  ; broken");
        assert_eq!(jar.get("ASPSESSIONID").map(String::as_str), Some("abc"));
        assert_eq!(jar.get("GolfBox").map(String::as_str), Some("u=1&t=2"));
        assert_eq!(jar.len(), 2);
        assert_eq!(cookie_header(&jar), "ASPSESSIONID=abc; GolfBox=u=1&t=2");
    }

    #[test]
    fn haversine_oslo_to_bergen() {
        let oslo = GeoPoint::new(59.9139, 10.7522);
        let bergen = GeoPoint::new(60.3913, 5.3221);
        let km = oslo.distance_km(&bergen);
        assert!((300.0..310.0).contains(&km), "got {}", km);
        assert!(oslo.distance_km(&oslo) < 1e-9);
    }
}
