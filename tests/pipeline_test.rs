mod common;

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use tee_scraper::app::ports::Clock;
use tee_scraper::error::ScraperError;
use tee_scraper::pipeline::housekeeping::{apply_club_locations, disable_distant_clubs};
use tee_scraper::storage::Store;
use tee_scraper::types::{Availability, Club, Course, GeoPoint};

use common::{harness, COURSELESS_CLUB};

// Per fixture grid: 7 cells, one without a time of day
const RECORDS_PER_DAY: usize = 6;

async fn course_named(store: &dyn Store, club_ext: &str, name: &str) -> Course {
    let club = store.find_club_by_external_id(club_ext).await.unwrap().unwrap();
    store
        .list_courses_for_club(club.id)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.name == name)
        .unwrap()
}

#[tokio::test]
async fn discovery_creates_clubs_and_courses() {
    let h = harness(1);
    let report = h.orchestrator.run_catalog_discovery().await.unwrap();

    assert_eq!(report.clubs_created, 3);
    assert_eq!(report.courses_created, 4);
    // The club without courses is a per-club failure, not an abort
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Miklagard"));

    let clubs = h.store.list_clubs().await.unwrap();
    assert_eq!(clubs.len(), 3);
    let courseless = h.store.find_club_by_external_id(COURSELESS_CLUB).await.unwrap().unwrap();
    assert!(h.store.list_courses_for_club(courseless.id).await.unwrap().is_empty());

    // Second pass finds everything in place
    let again = h.orchestrator.run_catalog_discovery().await.unwrap();
    assert_eq!(again.clubs_created, 0);
    assert_eq!(again.courses_created, 0);
    assert_eq!(h.store.list_clubs().await.unwrap().len(), 3);
}

#[tokio::test]
async fn full_pass_stores_normalized_tee_times() {
    let h = harness(1);
    let (catalog, crawl) = h.orchestrator.run(2, None).await.unwrap();
    assert_eq!(catalog.courses_created, 4);

    // 2 clubs x 2 courses x 2 days
    assert_eq!(crawl.dates_crawled, 8);
    assert_eq!(crawl.slots_upserted, 8 * RECORDS_PER_DAY);
    assert_eq!(crawl.slots_created, 8 * RECORDS_PER_DAY);
    assert_eq!(crawl.slots_dropped, 8);
    assert_eq!(crawl.errors.len(), 1);
    assert_eq!(h.portal.logins.load(Ordering::SeqCst), 1);

    let course = course_named(h.store.as_ref(), "AAAA-1111", "18 hull").await;
    let slots = h.store.list_timeslots_for_course(course.id).await.unwrap();
    assert_eq!(slots.len(), 2 * RECORDS_PER_DAY);

    // 07:00 Oslo on the first crawled day (tomorrow) is 05:00 UTC
    let first = slots
        .iter()
        .find(|s| s.starts_at == Utc.with_ymd_and_hms(2025, 6, 2, 5, 0, 0).unwrap())
        .unwrap();
    assert_eq!(first.availability, Availability::Free);
    assert_eq!(first.available_spots, 4);
    assert_eq!(first.price_minor, Some(45_000));
    assert!(first.expired);

    let blocked = slots
        .iter()
        .find(|s| s.starts_at == Utc.with_ymd_and_hms(2025, 6, 2, 5, 30, 0).unwrap())
        .unwrap();
    assert_eq!(blocked.availability, Availability::Blocking);
    assert_eq!(blocked.available_spots, 0);

    assert!(slots.iter().all(|s| s.available_spots <= 4));
    assert!(slots.iter().all(|s| s.starts_at >= Utc.with_ymd_and_hms(2025, 6, 1, 22, 0, 0).unwrap()));
}

#[tokio::test]
async fn crawl_rerun_is_idempotent() {
    let h = harness(1);
    h.orchestrator.run_catalog_discovery().await.unwrap();
    let first = h.orchestrator.run_availability_crawl(2, None).await.unwrap();

    h.clock.advance(chrono::Duration::minutes(5));
    let second = h.orchestrator.run_availability_crawl(2, None).await.unwrap();

    assert_eq!(second.slots_upserted, first.slots_upserted);
    assert_eq!(second.slots_created, 0);
    assert_eq!(second.slots_updated, 0);

    let course = course_named(h.store.as_ref(), "BBBB-2222", "Par 3").await;
    let slots = h.store.list_timeslots_for_course(course.id).await.unwrap();
    assert_eq!(slots.len(), 2 * RECORDS_PER_DAY);
    assert!(slots.iter().all(|s| s.last_updated == h.clock.now()));
}

#[tokio::test]
async fn missing_grid_skips_only_that_date() {
    let h = harness(1);
    h.orchestrator.run_catalog_discovery().await.unwrap();
    h.portal.break_grid("SelectedDate=20250602T000000");

    let report = h.orchestrator.run_availability_crawl(3, None).await.unwrap();

    // 4 courses, 2 of 3 dates readable each
    assert_eq!(report.dates_crawled, 8);
    assert_eq!(report.slots_upserted, 8 * RECORDS_PER_DAY);
    // 4 failed dates plus the courseless club
    assert_eq!(report.errors.len(), 5);
    assert_eq!(
        report.errors.iter().filter(|e| e.contains("2025-06-02")).count(),
        4
    );

    let course = course_named(h.store.as_ref(), "AAAA-1111", "Par 3").await;
    let slots = h.store.list_timeslots_for_course(course.id).await.unwrap();
    assert!(slots
        .iter()
        .all(|s| s.starts_at > Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap()));
}

#[tokio::test]
async fn club_limit_and_disabled_clubs_restrict_the_crawl() {
    let h = harness(1);
    h.orchestrator.run_catalog_discovery().await.unwrap();

    let limited = h.orchestrator.run_availability_crawl(1, Some(1)).await.unwrap();
    assert_eq!(limited.dates_crawled, 2);

    let bogstad = h.store.find_club_by_external_id("BBBB-2222").await.unwrap().unwrap();
    h.store.set_club_disabled(bogstad.id, true).await.unwrap();
    let before = h.portal.grid_requests.load(Ordering::SeqCst);
    h.orchestrator.run_availability_crawl(1, None).await.unwrap();
    // Only Oslo Golfklubb's two courses are fetched
    assert_eq!(h.portal.grid_requests.load(Ordering::SeqCst) - before, 2);
}

#[tokio::test]
async fn parallel_workers_reach_the_same_result() {
    let h = harness(3);
    h.orchestrator.run_catalog_discovery().await.unwrap();
    let report = h.orchestrator.run_availability_crawl(2, None).await.unwrap();

    assert_eq!(report.dates_crawled, 8);
    assert_eq!(report.slots_created, 8 * RECORDS_PER_DAY);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(h.portal.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn authentication_failure_surfaces_to_the_caller() {
    let h = harness(1);
    let club = Club::new("AAAA-1111", "Oslo Golfklubb");
    h.store.create_club(&club).await.unwrap();
    h.store
        .create_course(&Course::new(club.id, "R-0001", "18 hull"))
        .await
        .unwrap();
    h.portal.login_fails.store(true, Ordering::SeqCst);

    let err = h.orchestrator.run_availability_crawl(2, None).await.unwrap_err();
    assert!(matches!(err, ScraperError::Authentication(_)));
    assert!(err.is_fatal());

    let err = h.orchestrator.run_catalog_discovery().await.unwrap_err();
    assert!(matches!(err, ScraperError::Authentication(_)));
    assert_eq!(h.portal.grid_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clubs_keep_chooser_order_for_the_club_limit() {
    let h = harness(1);
    h.orchestrator.run_catalog_discovery().await.unwrap();

    let clubs = h.store.list_clubs().await.unwrap();
    let order: Vec<&str> = clubs.iter().map(|c| c.external_id.as_str()).collect();
    // Alphabetical would put Bogstad first
    assert_eq!(order, vec!["AAAA-1111", "BBBB-2222", COURSELESS_CLUB]);
    assert_eq!(clubs[0].created_at, h.clock.now());
    assert!(clubs[0].created_at < clubs[1].created_at);

    h.orchestrator.run_availability_crawl(1, Some(1)).await.unwrap();
    let oslo = course_named(h.store.as_ref(), "AAAA-1111", "18 hull").await;
    let bogstad = course_named(h.store.as_ref(), "BBBB-2222", "18 hull").await;
    assert_eq!(h.store.list_timeslots_for_course(oslo.id).await.unwrap().len(), RECORDS_PER_DAY);
    assert!(h.store.list_timeslots_for_course(bogstad.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn configured_location_disables_a_discovered_club() {
    let h = harness(1);
    h.orchestrator.run_catalog_discovery().await.unwrap();

    let origin = GeoPoint::new(59.9220295, 10.6053933);
    // Nothing is known about discovered clubs yet
    assert_eq!(disable_distant_clubs(h.store.as_ref(), origin, 100.0).await.unwrap(), 0);

    let mut locations = BTreeMap::new();
    locations.insert("AAAA-1111".to_string(), GeoPoint::new(59.94, 10.68));
    locations.insert("BBBB-2222".to_string(), GeoPoint::new(60.39, 5.32));
    assert_eq!(apply_club_locations(h.store.as_ref(), &locations).await.unwrap(), 2);
    assert_eq!(disable_distant_clubs(h.store.as_ref(), origin, 100.0).await.unwrap(), 1);

    let bogstad = h.store.find_club_by_external_id("BBBB-2222").await.unwrap().unwrap();
    assert!(bogstad.disabled);

    let report = h.orchestrator.run_availability_crawl(1, None).await.unwrap();
    assert_eq!(report.dates_crawled, 2);
    assert_eq!(h.portal.grid_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_session_mid_crawl_keeps_earlier_upserts() {
    let h = harness(1);
    h.orchestrator.run_catalog_discovery().await.unwrap();
    // Oslo's two courses are served, Bogstad's first grid is refused
    h.portal.reject_grids_after(2);

    let err = h.orchestrator.run_availability_crawl(1, None).await.unwrap_err();
    assert!(matches!(err, ScraperError::Authentication(_)));
    // Bogstad stops at its first grid request
    assert_eq!(h.portal.grid_requests.load(Ordering::SeqCst), 3);

    for name in ["18 hull", "Par 3"] {
        let course = course_named(h.store.as_ref(), "AAAA-1111", name).await;
        assert_eq!(h.store.list_timeslots_for_course(course.id).await.unwrap().len(), RECORDS_PER_DAY);
    }
    let course = course_named(h.store.as_ref(), "BBBB-2222", "18 hull").await;
    assert!(h.store.list_timeslots_for_course(course.id).await.unwrap().is_empty());
}
