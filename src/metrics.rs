//! Scrape metrics.
//!
//! Counters are recorded through the `metrics` facade; they are no-ops until
//! the host installs a recorder.

macro_rules! scrape_metric {
    ($phase:literal, $name:literal) => {
        concat!("tee_", $phase, "_", $name, "_total")
    };
}

pub struct ScrapeMetrics;

impl ScrapeMetrics {
    pub fn record_login() {
        ::metrics::counter!(scrape_metric!("portal", "logins")).increment(1);
    }

    pub fn record_login_failure() {
        ::metrics::counter!(scrape_metric!("portal", "login_failures")).increment(1);
    }

    pub fn record_request() {
        ::metrics::counter!(scrape_metric!("portal", "requests")).increment(1);
    }

    pub fn record_markup_mismatch() {
        ::metrics::counter!(scrape_metric!("parse", "markup_mismatches")).increment(1);
    }

    pub fn record_slots_dropped(count: usize) {
        ::metrics::counter!(scrape_metric!("normalize", "slots_dropped")).increment(count as u64);
    }

    pub fn record_slots_upserted(count: usize) {
        ::metrics::counter!(scrape_metric!("reconcile", "slots_upserted")).increment(count as u64);
    }

    pub fn record_crawl_error() {
        ::metrics::counter!(scrape_metric!("crawl", "errors")).increment(1);
    }
}
