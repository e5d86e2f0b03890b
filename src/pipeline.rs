// Scrape pipeline: discovery, crawl, reconcile, housekeeping

pub mod housekeeping;
pub mod orchestrator;
pub mod reconciler;

pub use orchestrator::ScrapeOrchestrator;
pub use reconciler::{Reconciler, UpsertOutcome};

use serde::Serialize;

/// Outcome of one catalog discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogReport {
    pub clubs_created: usize,
    pub courses_created: usize,
    pub errors: Vec<String>,
}

/// Outcome of one availability crawl pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlReport {
    pub slots_upserted: usize,
    pub slots_created: usize,
    pub slots_updated: usize,
    pub dates_crawled: usize,
    pub slots_dropped: usize,
    pub errors: Vec<String>,
}

impl CrawlReport {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        self.slots_upserted += 1;
        match outcome {
            UpsertOutcome::Created => self.slots_created += 1,
            UpsertOutcome::Updated => self.slots_updated += 1,
            UpsertOutcome::Refreshed => {}
        }
    }

    pub fn merge(&mut self, other: CrawlReport) {
        self.slots_upserted += other.slots_upserted;
        self.slots_created += other.slots_created;
        self.slots_updated += other.slots_updated;
        self.dates_crawled += other.dates_crawled;
        self.slots_dropped += other.slots_dropped;
        self.errors.extend(other.errors);
    }
}
