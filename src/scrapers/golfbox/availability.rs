use super::catalog::ensure_success;
use super::parser::parse_day_grid;
use super::{Authenticator, PortalUrls};
use crate::app::ports::PortalHttp;
use crate::error::{Result, ScraperError};
use crate::metrics::ScrapeMetrics;
use crate::types::{PortalDate, RawSlotDescriptor};
use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Raw cells of one course on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGrid {
    pub date: PortalDate,
    pub slots: Vec<RawSlotDescriptor>,
}

/// Result of crawling one course over a date window. Dates that could not
/// be read are listed with the reason instead of failing the course.
#[derive(Debug, Clone, Default)]
pub struct CourseCrawl {
    pub days: Vec<DayGrid>,
    pub failed_dates: Vec<(PortalDate, String)>,
}

impl CourseCrawl {
    pub fn slot_count(&self) -> usize {
        self.days.iter().map(|day| day.slots.len()).sum()
    }
}

/// The `days` dates starting tomorrow, `today` being the portal's local date.
pub fn crawl_dates(today: NaiveDate, days: u32) -> Vec<PortalDate> {
    (1..=u64::from(days))
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(PortalDate)
        .collect()
}

/// Fetches day grids for a course.
pub struct AvailabilityCrawler {
    auth: Arc<Authenticator>,
    portal: Arc<dyn PortalHttp>,
    urls: PortalUrls,
}

impl AvailabilityCrawler {
    pub fn new(auth: Arc<Authenticator>, portal: Arc<dyn PortalHttp>, urls: PortalUrls) -> Self {
        Self { auth, portal, urls }
    }

    /// Crawls every date in `dates`. A date that fails on the wire or comes
    /// back without a grid is skipped; only losing the session aborts.
    #[instrument(skip(self, dates), fields(dates = dates.len()))]
    pub async fn crawl_course(
        &self,
        club_external_id: &str,
        course_external_id: &str,
        dates: &[PortalDate],
    ) -> Result<CourseCrawl> {
        let mut crawl = CourseCrawl::default();

        for &date in dates {
            match self.fetch_day(club_external_id, course_external_id, date).await {
                Ok(slots) => {
                    debug!(%date, cells = slots.len(), "Read day grid");
                    crawl.days.push(DayGrid { date, slots });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%date, "Skipping date: {}", e);
                    crawl.failed_dates.push((date, e.to_string()));
                }
            }
        }

        Ok(crawl)
    }

    async fn fetch_day(
        &self,
        club_external_id: &str,
        course_external_id: &str,
        date: PortalDate,
    ) -> Result<Vec<RawSlotDescriptor>> {
        let session = self.auth.get_valid_session().await?;
        let url = self.urls.grid(club_external_id, course_external_id, date);
        let response = self.portal.post_form(&url, &[], &session.cookies).await?;
        ensure_success(&response, &url)?;

        parse_day_grid(&response.body).ok_or_else(|| {
            ScrapeMetrics::record_markup_mismatch();
            ScraperError::markup(
                format!("grid {} {}", course_external_id, date),
                "grid container not found",
            )
        })
    }
}
