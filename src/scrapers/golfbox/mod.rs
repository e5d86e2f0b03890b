pub mod availability;
pub mod catalog;
pub mod normalizer;
pub mod parser;
pub mod session;

pub use availability::{AvailabilityCrawler, CourseCrawl, DayGrid};
pub use catalog::CatalogCrawler;
pub use normalizer::SlotNormalizer;
pub use session::Authenticator;

use crate::constants::{CLUB_CHOOSER_PATH, CLUB_CHOOSER_SELECTED, GRID_PATH, LOGIN_PATH};
use crate::types::PortalDate;

/// Absolute URLs of the portal pages the crawlers use.
#[derive(Debug, Clone)]
pub struct PortalUrls {
    base: String,
}

impl PortalUrls {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login(&self) -> String {
        format!("{}{}", self.base, LOGIN_PATH)
    }

    pub fn club_chooser(&self) -> String {
        format!("{}{}", self.base, CLUB_CHOOSER_PATH)
    }

    /// Club chooser endpoint that accepts the `getClub` command.
    pub fn get_club(&self) -> String {
        format!(
            "{}{}?selected={{{}}}",
            self.base, CLUB_CHOOSER_PATH, CLUB_CHOOSER_SELECTED
        )
    }

    pub fn grid(&self, club_external_id: &str, course_external_id: &str, date: PortalDate) -> String {
        format!(
            "{}{}?SelectedDate={}&Ressource_GUID={{{}}}&Club_GUID={{{}}}",
            self.base,
            GRID_PATH,
            date.token(),
            course_external_id,
            club_external_id
        )
    }
}

/// Portal GUIDs travel wrapped in braces; the catalog stores them bare.
pub fn strip_braces(raw: &str) -> String {
    raw.trim().replace(['{', '}'], "")
}

pub fn wrap_braces(id: &str) -> String {
    format!("{{{}}}", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn urls_are_built_from_base() {
        let urls = PortalUrls::new("https://portal.test/");
        assert_eq!(urls.login(), "https://portal.test/login.asp");
        assert_eq!(
            urls.get_club(),
            "https://portal.test/site/ressources/booking/chooseclub.asp?selected={3C37481D-8C34-4E3F-BCF5-BE2693C983D8}"
        );
        let date = PortalDate(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(
            urls.grid("CLUB", "COURSE", date),
            "https://portal.test/site/my_golfbox/ressources/booking/grid.asp?SelectedDate=20250601T000000&Ressource_GUID={COURSE}&Club_GUID={CLUB}"
        );
    }

    #[test]
    fn braces_round_trip() {
        assert_eq!(strip_braces(" {ABC-123} "), "ABC-123");
        assert_eq!(wrap_braces("ABC-123"), "{ABC-123}");
    }
}
