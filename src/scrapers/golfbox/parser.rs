//! Pure HTML parsing for portal pages.
//!
//! Grid cells are classified by their class tokens rather than by position,
//! so small markup changes around a cell do not shift the meaning of its
//! fields. Every lookup that has been seen to vary carries fallbacks.

use crate::types::{Availability, RawSlotDescriptor};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Day grid container, most specific first.
static GRID_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        selector("div.classicgrid.portal.d-flexformlist"),
        selector("div.classicgrid"),
    ]
});

static TIME_CELL: Lazy<Selector> = Lazy::new(|| selector("div.timecell"));
static PLAYERS: Lazy<Selector> = Lazy::new(|| selector("div.time-players"));

static PRICE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        selector("div.d-flex.flex-row.flex-center.pt-2.pointer div.ymPrice"),
        selector("div.flex-center.pointer div.ymPrice"),
    ]
});

static OPTION: Lazy<Selector> = Lazy::new(|| selector("option"));

const EXPIRED_CLASS: &str = "expired";

/// Parses one day's grid page. `None` when no grid container is present,
/// which usually means a stale session or changed markup.
pub fn parse_day_grid(html: &str) -> Option<Vec<RawSlotDescriptor>> {
    let document = Html::parse_document(html);
    let grid = GRID_SELECTORS
        .iter()
        .find_map(|sel| document.select(sel).next())?;

    // Only element children are cells; whitespace between them is not
    Some(grid.children().filter_map(ElementRef::wrap).map(parse_cell).collect())
}

/// Reads one grid cell.
pub fn parse_cell(cell: ElementRef<'_>) -> RawSlotDescriptor {
    let classes: Vec<&str> = cell.value().classes().collect();

    RawSlotDescriptor {
        time_text: first_text(cell, std::slice::from_ref(&*TIME_CELL)),
        availability_token: Availability::classify(classes.iter().copied()).map(str::to_string),
        occupied_seats: occupied_seats(cell),
        price_text: first_text(cell, &PRICE_SELECTORS),
        expired: classes.contains(&EXPIRED_CLASS),
    }
}

fn occupied_seats(cell: ElementRef<'_>) -> usize {
    cell.select(&PLAYERS)
        .next()
        .map(|players| players.children().filter(|child| child.value().is_element()).count())
        .unwrap_or(0)
}

fn first_text(cell: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    let element = selectors.iter().find_map(|sel| cell.select(sel).next())?;
    let text = element.text().collect::<String>().trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// One `<option>` of a selection control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Reads the options of the first `<select>` whose id matches one of `ids`,
/// tried in order. `None` when none of them is on the page.
pub fn parse_select_options(html: &str, ids: &[&str]) -> Option<Vec<SelectOption>> {
    let document = Html::parse_document(html);
    let select = ids.iter().find_map(|id| {
        let sel = Selector::parse(&format!("select#{}", id)).ok()?;
        document.select(&sel).next()
    })?;

    Some(
        select
            .select(&OPTION)
            .map(|option| SelectOption {
                value: option.value().attr("value").unwrap_or_default().trim().to_string(),
                label: option.text().collect::<String>().trim().to_string(),
            })
            .collect(),
    )
}
