#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tee_scraper::app::ports::{ManualClock, PortalHttp, PortalResponse};
use tee_scraper::config::{CrawlConfig, Credentials};
use tee_scraper::error::{Result, ScraperError};
use tee_scraper::infra::Pacer;
use tee_scraper::pipeline::ScrapeOrchestrator;
use tee_scraper::scrapers::golfbox::{
    AvailabilityCrawler, Authenticator, CatalogCrawler, PortalUrls, SlotNormalizer,
};
use tee_scraper::storage::InMemoryStore;
use tee_scraper::types::CookieJar;

pub const GRID_DAY: &str = include_str!("../fixtures/grid_day.html");
pub const CLUB_CHOOSER: &str = include_str!("../fixtures/club_chooser.html");
pub const COURSE_CHOOSER: &str = include_str!("../fixtures/course_chooser.html");
pub const LOGIN_PAGE: &str = include_str!("../fixtures/login_page.html");

/// Club from the chooser fixture whose course list is empty.
pub const COURSELESS_CLUB: &str = "CCCC-3333";

const EMPTY_COURSE_CHOOSER: &str = r#"<html><body>
<select id="ddlRessoruce"><option value="x">Velg fasilitet</option></select>
</body></html>"#;

/// In-process portal serving the HTML fixtures by URL.
#[derive(Default)]
pub struct FakePortal {
    pub logins: AtomicUsize,
    pub grid_requests: AtomicUsize,
    pub login_fails: AtomicBool,
    /// Grid requests whose URL contains one of these get the login page.
    pub broken_grids: Mutex<Vec<String>>,
    /// Grid requests past this count are rejected as unauthenticated.
    pub grid_limit: Mutex<Option<usize>>,
}

impl FakePortal {
    pub fn break_grid(&self, url_fragment: &str) {
        self.broken_grids.lock().unwrap().push(url_fragment.to_string());
    }

    pub fn reject_grids_after(&self, served: usize) {
        *self.grid_limit.lock().unwrap() = Some(served);
    }

    fn page(body: &str) -> PortalResponse {
        PortalResponse {
            status: 200,
            body: body.to_string(),
            cookies: CookieJar::new(),
        }
    }
}

#[async_trait]
impl PortalHttp for FakePortal {
    async fn login(&self, url: &str, _form: &[(String, String)]) -> Result<PortalResponse> {
        assert!(url.ends_with("/login.asp"));
        if self.login_fails.load(Ordering::SeqCst) {
            return Ok(PortalResponse { status: 403, ..Default::default() });
        }
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let mut cookies = CookieJar::new();
        cookies.insert("ASP.NET_SessionId".to_string(), format!("session-{}", n));
        Ok(PortalResponse { status: 200, body: String::new(), cookies })
    }

    async fn get(&self, url: &str, cookies: &CookieJar) -> Result<PortalResponse> {
        assert!(!cookies.is_empty(), "request without session cookies");
        if url.ends_with("chooseclub.asp") {
            Ok(Self::page(CLUB_CHOOSER))
        } else {
            Ok(PortalResponse { status: 404, ..Default::default() })
        }
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        cookies: &CookieJar,
    ) -> Result<PortalResponse> {
        assert!(!cookies.is_empty(), "request without session cookies");

        if url.contains("chooseclub.asp?selected=") {
            let club = form
                .iter()
                .find(|(name, _)| name == "ddlClub")
                .map(|(_, value)| value.as_str())
                .unwrap_or_default();
            if club == format!("{{{}}}", COURSELESS_CLUB) {
                return Ok(Self::page(EMPTY_COURSE_CHOOSER));
            }
            return Ok(Self::page(COURSE_CHOOSER));
        }

        if url.contains("grid.asp") {
            let n = self.grid_requests.fetch_add(1, Ordering::SeqCst) + 1;
            if matches!(*self.grid_limit.lock().unwrap(), Some(limit) if n > limit) {
                return Err(ScraperError::Authentication("session rejected by portal".into()));
            }
            let broken = self.broken_grids.lock().unwrap().iter().any(|f| url.contains(f.as_str()));
            return Ok(Self::page(if broken { LOGIN_PAGE } else { GRID_DAY }));
        }

        Ok(PortalResponse { status: 404, ..Default::default() })
    }
}

pub struct Harness {
    pub portal: Arc<FakePortal>,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: ScrapeOrchestrator,
}

/// Wires the real crawlers and orchestrator to the fake portal and an
/// in-memory store. The clock starts at 2025-06-01 08:00 UTC.
pub fn harness(concurrency: usize) -> Harness {
    let portal = Arc::new(FakePortal::default());
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()));
    let urls = PortalUrls::new("https://portal.test");

    let auth = Arc::new(Authenticator::new(
        portal.clone(),
        store.clone(),
        clock.clone(),
        Credentials::new("player", "secret"),
        urls.clone(),
        chrono::Duration::minutes(10),
    ));

    let settings = CrawlConfig {
        concurrency,
        club_delay_ms: 0,
        ..CrawlConfig::default()
    };

    let orchestrator = ScrapeOrchestrator::new(
        store.clone(),
        CatalogCrawler::new(auth.clone(), portal.clone(), urls.clone()),
        AvailabilityCrawler::new(auth, portal.clone(), urls),
        SlotNormalizer::new(chrono_tz::Europe::Oslo, settings.price_ceiling_minor),
        clock.clone(),
        Arc::new(Pacer::new(Duration::ZERO)),
        settings,
    );

    Harness {
        portal,
        store,
        clock,
        orchestrator,
    }
}
