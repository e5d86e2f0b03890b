use super::parser::{parse_select_options, SelectOption};
use super::{strip_braces, wrap_braces, Authenticator, PortalUrls};
use crate::app::ports::{PortalHttp, PortalResponse};
use crate::constants::{CLUB_SELECT_ID, COURSE_PLACEHOLDER_VALUE, COURSE_SELECT_IDS, GET_CLUB_COMMAND};
use crate::error::{Result, ScraperError};
use crate::metrics::ScrapeMetrics;
use crate::types::CatalogEntry;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Reads the club and course lists from the portal's chooser pages.
pub struct CatalogCrawler {
    auth: Arc<Authenticator>,
    portal: Arc<dyn PortalHttp>,
    urls: PortalUrls,
}

impl CatalogCrawler {
    pub fn new(auth: Arc<Authenticator>, portal: Arc<dyn PortalHttp>, urls: PortalUrls) -> Self {
        Self { auth, portal, urls }
    }

    /// Lists bookable clubs in page order, at most `max_count` of them.
    #[instrument(skip(self))]
    pub async fn discover_clubs(&self, max_count: usize) -> Result<Vec<CatalogEntry>> {
        let session = self.auth.get_valid_session().await?;
        let url = self.urls.club_chooser();
        let response = self.portal.get(&url, &session.cookies).await?;
        ensure_success(&response, &url)?;

        let options = parse_select_options(&response.body, &[CLUB_SELECT_ID]).ok_or_else(|| {
            ScrapeMetrics::record_markup_mismatch();
            ScraperError::markup("club chooser", format!("select#{} not found", CLUB_SELECT_ID))
        })?;

        let mut clubs = catalog_entries(options, |value| value.is_empty());
        clubs.truncate(max_count);
        info!(count = clubs.len(), "Discovered clubs");
        Ok(clubs)
    }

    /// Lists the courses of one club by posting the chooser's `getClub`
    /// command for it.
    #[instrument(skip(self))]
    pub async fn discover_courses(&self, club_external_id: &str) -> Result<Vec<CatalogEntry>> {
        let session = self.auth.get_valid_session().await?;
        let url = self.urls.get_club();
        let form = vec![
            ("command".to_string(), GET_CLUB_COMMAND.to_string()),
            ("commandValue".to_string(), String::new()),
            (CLUB_SELECT_ID.to_string(), wrap_braces(club_external_id)),
            ("ddlResource".to_string(), String::new()),
        ];
        let response = self.portal.post_form(&url, &form, &session.cookies).await?;
        ensure_success(&response, &url)?;

        let options = parse_select_options(&response.body, &COURSE_SELECT_IDS).ok_or_else(|| {
            ScrapeMetrics::record_markup_mismatch();
            ScraperError::markup(
                "course chooser",
                format!("none of {:?} found for club {}", COURSE_SELECT_IDS, club_external_id),
            )
        })?;

        let courses = catalog_entries(options, |value| {
            value.is_empty() || value.eq_ignore_ascii_case(COURSE_PLACEHOLDER_VALUE)
        });
        debug!(count = courses.len(), "Discovered courses");
        Ok(courses)
    }
}

fn catalog_entries(options: Vec<SelectOption>, is_placeholder: impl Fn(&str) -> bool) -> Vec<CatalogEntry> {
    options
        .into_iter()
        .filter(|option| !is_placeholder(&option.value))
        .map(|option| CatalogEntry {
            name: option.label,
            external_id: strip_braces(&option.value),
        })
        .filter(|entry| !entry.external_id.is_empty())
        .collect()
}

pub(crate) fn ensure_success(response: &PortalResponse, url: &str) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ScraperError::HttpStatus {
            status: response.status,
            url: url.to_string(),
        })
    }
}
