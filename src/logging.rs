use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "tee_scraper.log";
const DEFAULT_FILTER: &str = "tee_scraper=info,warn";

/// `RUST_LOG` when it parses, otherwise the crate at info and the rest at warn.
fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Console output plus a daily JSON file under `logs/`.
///
/// File lines are written by a background worker; hold the returned guard
/// until exit or the tail of a run is lost.
pub fn init_logging() -> WorkerGuard {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("cannot create {}: {}", LOG_DIR, e);
    }
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, LOG_FILE));

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::registry()
        .with(build_filter(rust_log.as_deref()))
        .with(fmt::layer().json().with_writer(writer))
        .with(fmt::layer().with_target(true))
        .init();

    guard
}
