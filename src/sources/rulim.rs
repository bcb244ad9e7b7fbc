//! Rulim: tabular results; a direct query URL stands in when the search form is missing.

use scraper::ElementRef;
use std::time::Duration;

use super::{scan_rows, DirectSearch, Pause, RowBatch, Site, SiteLayout, SourceId};
use crate::error::RowError;
use crate::listing::{ArticleFallback, ListingDefaults, ListingDraft, NAME_UNKNOWN};
use crate::normalize::{parse_price, resolve_image, svg_placeholder};
use crate::selector::{all_matches, attr_of, element_text, link_of, SelectorChain};

pub const BASE_URL: &str = "https://rulim.kz";

const ROW_CAP: usize = 20;
const MIN_CELLS: usize = 4;

const SEARCH_INPUT: &[&str] = &[
    "input[name='code']",
    "input[name='search']",
    "#search_input",
    ".search_input",
    "input[placeholder*='Поиск']",
    "input[placeholder*='поиск']",
    "input[placeholder*='Артикул']",
];

const RESULTS_SURFACE: &[&str] = &["table.result, .search-results, .goods-table, tr[class*='row']"];

const ROWS: &[&str] = &["tr[class*='row']", "table.result tr", ".goods-item"];

pub struct Rulim;

/// `/?part=search&code=<query>`, the site's own search-results URL.
pub fn direct_search_url(query: &str) -> String {
    format!("{}/?part=search&code={}", BASE_URL, urlencoding::encode(query))
}

impl Rulim {
    fn defaults() -> ListingDefaults {
        ListingDefaults {
            base_url: BASE_URL,
            placeholder_image: svg_placeholder("Rulim"),
            article: ArticleFallback::Dashes,
            name: NAME_UNKNOWN,
        }
    }
}

impl Site for Rulim {
    fn layout(&self) -> SiteLayout {
        SiteLayout {
            source: SourceId::Rulim,
            base_url: BASE_URL,
            locale: "ru-RU",
            timezone: "Asia/Almaty",
            stealth: false,
            navigation_timeout: Duration::from_secs(45),
            settle: Pause::between(1000, 2000),
            search_input: SelectorChain::new("search input", SEARCH_INPUT, Duration::from_secs(5)),
            typing: Pause::between(300, 700),
            direct_search: Some(direct_search_url as DirectSearch),
            results_surface: SelectorChain::new("results", RESULTS_SURFACE, Duration::from_secs(20)),
            after_results: Pause::between(500, 1500),
        }
    }

    fn extract(&self, html: &str) -> RowBatch {
        let defaults = Rulim::defaults();
        scan_rows(html, ROWS, ROW_CAP, &defaults, |row| row_draft(row, &defaults))
    }
}

/// Columns: brand, article, name, ..., price, (last column ignored).
fn row_draft(row: ElementRef<'_>, defaults: &ListingDefaults) -> Result<ListingDraft, RowError> {
    let cells: Vec<String> = all_matches(row, &["td"])
        .map(|(_, cells)| cells.into_iter().map(element_text).collect())
        .unwrap_or_default();
    if cells.len() < MIN_CELLS {
        return Err(RowError::MissingCells {
            found: cells.len(),
            needed: MIN_CELLS,
        });
    }

    let image = attr_of(row, &["img"], &["src", "data-src"]);
    Ok(ListingDraft {
        image: Some(resolve_image(image.as_deref(), BASE_URL, &defaults.placeholder_image)),
        brand: Some(cells[0].clone()),
        article: Some(cells[1].clone()),
        name: Some(cells[2].clone()),
        price: parse_price(&cells[cells.len() - 2]),
        delivery: 0,
        link: link_of(row, BASE_URL),
    })
}
