use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use tee_scraper::app::ports::{Clock, PortalHttp, SystemClock};
use tee_scraper::config::{Config, Credentials};
use tee_scraper::infra::{Pacer, ReqwestPortal};
use tee_scraper::logging;
use tee_scraper::pipeline::housekeeping::{
    apply_club_locations, disable_distant_clubs, prune_timeslots_before, start_of_today,
};
use tee_scraper::pipeline::{CatalogReport, CrawlReport, ScrapeOrchestrator};
use tee_scraper::scrapers::golfbox::{
    AvailabilityCrawler, Authenticator, CatalogCrawler, PortalUrls, SlotNormalizer,
};
use tee_scraper::storage::{SqliteStore, Store};
use tee_scraper::types::GeoPoint;

#[derive(Parser)]
#[command(name = "tee_scraper")]
#[command(about = "Tee time scraper for the GolfBox booking portal")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Print reports as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover clubs and their courses
    Discover,
    /// Crawl tee time availability for enabled clubs
    Crawl {
        /// Days to crawl, starting tomorrow
        #[arg(long)]
        days: Option<u32>,
        /// Only crawl the first N enabled clubs
        #[arg(long)]
        clubs: Option<usize>,
    },
    /// Run discovery followed by a crawl
    Run {
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        clubs: Option<usize>,
    },
    /// Disable clubs located too far from the configured origin
    DisableDistant {
        #[arg(long)]
        max_km: Option<f64>,
    },
    /// Record a club's coordinates
    SetLocation {
        /// Portal club id
        #[arg(long)]
        club: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Delete tee times that started before today
    Prune,
}

fn build_orchestrator(config: &Config, store: Arc<SqliteStore>) -> anyhow::Result<ScrapeOrchestrator> {
    let credentials = Credentials::from_env()?;
    let tz = config.portal.tz()?;
    let urls = PortalUrls::new(&config.portal.base_url);
    let portal: Arc<dyn PortalHttp> = Arc::new(ReqwestPortal::new(config.portal.request_timeout())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let auth = Arc::new(Authenticator::new(
        portal.clone(),
        store.clone(),
        clock.clone(),
        credentials,
        urls.clone(),
        config.portal.session_ttl(),
    ));

    Ok(ScrapeOrchestrator::new(
        store,
        CatalogCrawler::new(auth.clone(), portal.clone(), urls.clone()),
        AvailabilityCrawler::new(auth, portal, urls),
        SlotNormalizer::new(tz, config.crawl.price_ceiling_minor),
        clock,
        Arc::new(Pacer::new(config.crawl.club_delay())),
        config.crawl.clone(),
    ))
}

fn print_json<T: serde::Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn print_catalog_report(report: &CatalogReport) {
    println!("\n📊 Catalog discovery:");
    println!("   Clubs created: {}", report.clubs_created);
    println!("   Courses created: {}", report.courses_created);
    print_errors(&report.errors);
}

fn print_crawl_report(report: &CrawlReport) {
    println!("\n📊 Availability crawl:");
    println!("   Dates crawled: {}", report.dates_crawled);
    println!(
        "   Tee times upserted: {} ({} new, {} changed)",
        report.slots_upserted, report.slots_created, report.slots_updated
    );
    println!("   Cells dropped: {}", report.slots_dropped);
    print_errors(&report.errors);
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("\n⚠️  {} errors encountered:", errors.len());
    for error in errors {
        println!("   - {}", error);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let store = Arc::new(
        SqliteStore::open(&config.storage.sqlite_path)
            .with_context(|| format!("opening {}", config.storage.sqlite_path.display()))?,
    );

    match cli.command {
        Commands::Discover => {
            let report = build_orchestrator(&config, store)?.run_catalog_discovery().await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_catalog_report(&report);
            }
        }
        Commands::Crawl { days, clubs } => {
            let days = days.unwrap_or(config.crawl.days);
            let report = build_orchestrator(&config, store)?
                .run_availability_crawl(days, clubs)
                .await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_crawl_report(&report);
            }
        }
        Commands::Run { days, clubs } => {
            let days = days.unwrap_or(config.crawl.days);
            let (catalog, crawl) = build_orchestrator(&config, store)?.run(days, clubs).await?;
            if cli.json {
                print_json(&serde_json::json!({ "catalog": catalog, "crawl": crawl }))?;
            } else {
                print_catalog_report(&catalog);
                print_crawl_report(&crawl);
            }
        }
        Commands::DisableDistant { max_km } => {
            let housekeeping = &config.housekeeping;
            let located = apply_club_locations(store.as_ref(), &housekeeping.locations).await?;
            info!(located, "Applied configured club locations");
            let origin = GeoPoint::new(housekeeping.origin_latitude, housekeeping.origin_longitude);
            let max_km = max_km.unwrap_or(housekeeping.max_distance_km);
            let disabled = disable_distant_clubs(store.as_ref(), origin, max_km).await?;
            println!("🧹 Disabled {} clubs farther than {} km", disabled, max_km);
        }
        Commands::SetLocation { club, lat, lon } => {
            let found = store
                .find_club_by_external_id(&club)
                .await?
                .with_context(|| format!("no club with id {}", club))?;
            store.set_club_location(found.id, GeoPoint::new(lat, lon)).await?;
            println!("📍 {} is at {}, {}", found.name, lat, lon);
        }
        Commands::Prune => {
            let cutoff = start_of_today(SystemClock.now(), config.portal.tz()?);
            let deleted = prune_timeslots_before(store.as_ref(), cutoff).await?;
            println!("🧹 Deleted {} tee times before {}", deleted, cutoff);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    info!("Starting tee_scraper");

    // Per-unit failures are in the printed reports; only fatal ones land here
    if let Err(e) = run(cli).await {
        error!("Run failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
