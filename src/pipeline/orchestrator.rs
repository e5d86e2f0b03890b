use super::reconciler::Reconciler;
use super::{CatalogReport, CrawlReport};
use crate::app::ports::Clock;
use crate::config::CrawlConfig;
use crate::error::{Result, ScraperError};
use crate::infra::Pacer;
use crate::metrics::ScrapeMetrics;
use crate::scrapers::golfbox::availability::crawl_dates;
use crate::scrapers::golfbox::{AvailabilityCrawler, CatalogCrawler, SlotNormalizer};
use crate::storage::Store;
use crate::types::{Club, Course, PortalDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Runs discovery and crawl passes over the catalog.
///
/// Errors are contained at the smallest unit they occur in (date, course,
/// club) and reported; only authentication and store failures end a pass.
pub struct ScrapeOrchestrator {
    store: Arc<dyn Store>,
    catalog: CatalogCrawler,
    pacer: Arc<Pacer>,
    settings: CrawlConfig,
    clubs: Arc<ClubCrawler>,
}

/// Per-club crawl work, shared with the worker tasks.
struct ClubCrawler {
    store: Arc<dyn Store>,
    crawler: AvailabilityCrawler,
    normalizer: SlotNormalizer,
    reconciler: Reconciler,
    clock: Arc<dyn Clock>,
}

impl ScrapeOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: CatalogCrawler,
        crawler: AvailabilityCrawler,
        normalizer: SlotNormalizer,
        clock: Arc<dyn Clock>,
        pacer: Arc<Pacer>,
        settings: CrawlConfig,
    ) -> Self {
        let clubs = Arc::new(ClubCrawler {
            store: store.clone(),
            crawler,
            normalizer,
            reconciler: Reconciler::new(store.clone(), clock.clone()),
            clock,
        });
        Self {
            store,
            catalog,
            pacer,
            settings,
            clubs,
        }
    }

    /// Creates missing clubs from the club chooser, then discovers courses
    /// for every enabled club that has none yet.
    #[instrument(skip(self))]
    pub async fn run_catalog_discovery(&self) -> Result<CatalogReport> {
        info!("🔍 Starting catalog discovery");
        let mut report = CatalogReport::default();

        match self.catalog.discover_clubs(self.settings.max_clubs).await {
            Ok(entries) => {
                // Chooser order is kept through creation stamps
                let discovered_at = self.clubs.clock.now();
                for (position, entry) in entries.iter().enumerate() {
                    if self.store.find_club_by_external_id(&entry.external_id).await?.is_some() {
                        continue;
                    }
                    let club = Club::new(&entry.external_id, &entry.name)
                        .with_created_at(discovered_at + listing_offset(position));
                    match self.store.create_club(&club).await {
                        Ok(()) => {
                            info!(club = %entry.name, "Created club");
                            report.clubs_created += 1;
                        }
                        Err(ScraperError::DuplicateEntity { key, .. }) => {
                            debug!(%key, "Club already exists");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Club discovery failed: {}", e);
                ScrapeMetrics::record_crawl_error();
                report.errors.push(format!("club list: {}", e));
            }
        }

        for club in self.store.list_enabled_clubs().await? {
            if !self.store.list_courses_for_club(club.id).await?.is_empty() {
                continue;
            }
            self.pacer.pace().await;
            match self.discover_courses(&club).await {
                Ok(created) => report.courses_created += created,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(club = %club.name, "Course discovery failed: {}", e);
                    ScrapeMetrics::record_crawl_error();
                    report.errors.push(format!("{}: {}", club.name, e));
                }
            }
        }

        info!(
            clubs_created = report.clubs_created,
            courses_created = report.courses_created,
            errors = report.errors.len(),
            "✅ Catalog discovery finished"
        );
        Ok(report)
    }

    async fn discover_courses(&self, club: &Club) -> Result<usize> {
        let entries = self.catalog.discover_courses(&club.external_id).await?;
        if entries.is_empty() {
            return Err(ScraperError::markup(
                format!("course chooser for {}", club.name),
                "no courses listed",
            ));
        }

        let discovered_at = self.clubs.clock.now();
        let mut created = 0;
        for (position, entry) in entries.iter().enumerate() {
            let course = Course::new(club.id, &entry.external_id, &entry.name)
                .with_created_at(discovered_at + listing_offset(position));
            match self.store.create_course(&course).await {
                Ok(()) => {
                    info!(club = %club.name, course = %entry.name, "Created course");
                    created += 1;
                }
                Err(ScraperError::DuplicateEntity { key, .. }) => {
                    debug!(%key, "Course already exists");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// Crawls `days` days starting tomorrow for every enabled club, or the
    /// first `club_limit` of them.
    #[instrument(skip(self))]
    pub async fn run_availability_crawl(&self, days: u32, club_limit: Option<usize>) -> Result<CrawlReport> {
        let tz = self.clubs.normalizer.timezone();
        let today = self.clubs.clock.now().with_timezone(&tz).date_naive();
        let dates: Arc<Vec<PortalDate>> = Arc::new(crawl_dates(today, days));

        let mut clubs = self.store.list_enabled_clubs().await?;
        if let Some(limit) = club_limit {
            clubs.truncate(limit);
        }
        info!(clubs = clubs.len(), days, from = %today, "🚀 Starting availability crawl");

        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for club in clubs {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            if stop.load(Ordering::SeqCst) {
                warn!("⏹️ Not starting further clubs after a fatal error");
                break;
            }
            self.pacer.pace().await;

            let worker = self.clubs.clone();
            let dates = dates.clone();
            let stop = stop.clone();
            tasks.spawn(async move {
                let mut club_report = CrawlReport::default();
                let result = worker.crawl_club(&club, &dates, &mut club_report).await;
                if matches!(&result, Err(e) if e.is_fatal()) {
                    stop.store(true, Ordering::SeqCst);
                }
                drop(permit);
                (club.name, club_report, result)
            });
        }

        let mut report = CrawlReport::default();
        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, club_report, Ok(()))) => report.merge(club_report),
                Ok((club, club_report, Err(e))) if e.is_fatal() => {
                    error!(%club, "Crawl aborted: {}", e);
                    report.merge(club_report);
                    fatal.get_or_insert(e);
                }
                Ok((club, club_report, Err(e))) => {
                    warn!(%club, "Club crawl failed: {}", e);
                    ScrapeMetrics::record_crawl_error();
                    report.merge(club_report);
                    report.errors.push(format!("{}: {}", club, e));
                }
                Err(e) => {
                    error!("Club task failed to complete: {}", e);
                    report.errors.push(format!("club task: {}", e));
                }
            }
        }

        ScrapeMetrics::record_slots_upserted(report.slots_upserted);
        ScrapeMetrics::record_slots_dropped(report.slots_dropped);

        // Totals cover what was committed before the abort
        if let Some(e) = fatal {
            error!(
                upserted = report.slots_upserted,
                created = report.slots_created,
                updated = report.slots_updated,
                dates = report.dates_crawled,
                errors = report.errors.len(),
                "Availability crawl aborted"
            );
            return Err(e);
        }

        info!(
            upserted = report.slots_upserted,
            created = report.slots_created,
            updated = report.slots_updated,
            dates = report.dates_crawled,
            dropped = report.slots_dropped,
            errors = report.errors.len(),
            "Availability crawl finished"
        );
        Ok(report)
    }

    /// Discovery followed by a crawl.
    pub async fn run(&self, days: u32, club_limit: Option<usize>) -> Result<(CatalogReport, CrawlReport)> {
        let catalog = self.run_catalog_discovery().await?;
        let crawl = self.run_availability_crawl(days, club_limit).await?;
        Ok((catalog, crawl))
    }
}

/// Spacing between creation stamps of entries listed together.
fn listing_offset(position: usize) -> chrono::Duration {
    chrono::Duration::milliseconds(position as i64)
}

impl ClubCrawler {
    /// Crawls every course of `club` into `report`. On a fatal error the
    /// report keeps what was upserted before it.
    #[instrument(skip(self, club, dates, report), fields(club = %club.name))]
    async fn crawl_club(&self, club: &Club, dates: &[PortalDate], report: &mut CrawlReport) -> Result<()> {
        let courses = self.store.list_courses_for_club(club.id).await?;
        if courses.is_empty() {
            return Err(ScraperError::markup(
                format!("club {}", club.name),
                "no courses to crawl",
            ));
        }

        for course in courses {
            let crawl = match self
                .crawler
                .crawl_course(&club.external_id, &course.external_id, dates)
                .await
            {
                Ok(crawl) => crawl,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(course = %course.name, "Course crawl failed: {}", e);
                    ScrapeMetrics::record_crawl_error();
                    report.errors.push(format!("{} / {}: {}", club.name, course.name, e));
                    continue;
                }
            };

            report.dates_crawled += crawl.days.len();
            for (date, reason) in &crawl.failed_dates {
                ScrapeMetrics::record_crawl_error();
                report
                    .errors
                    .push(format!("{} / {} {}: {}", club.name, course.name, date, reason));
            }

            let observed_at = self.clock.now();
            for day in &crawl.days {
                for raw in &day.slots {
                    match self.normalizer.normalize(course.id, day.date.date(), raw, observed_at) {
                        Some(record) => report.record(self.reconciler.upsert(record).await?),
                        None => report.slots_dropped += 1,
                    }
                }
            }
            debug!(course = %course.name, upserted = report.slots_upserted, "Course crawled");
        }

        Ok(())
    }
}
