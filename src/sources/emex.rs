//! Emex: card-based results, richest selector set, masked automation flags.

use scraper::ElementRef;
use std::time::Duration;

use super::{scan_rows, Pause, RowBatch, Site, SiteLayout, SourceId};
use crate::listing::{ArticleFallback, ListingDefaults, ListingDraft};
use crate::normalize::{parse_delivery_days, parse_price, resolve_image, svg_placeholder};
use crate::selector::{attr_of, link_of, text_of, SelectorChain};

pub const BASE_URL: &str = "https://emex.ru";

const ROW_CAP: usize = 20;

const SEARCH_INPUT: &[&str] = &[
    "input[data-test='search-input']",
    "input[placeholder*='Найти']",
    "input[name='search']",
    "input[type='search']",
    ".search-input input",
    "#search-input",
    "input.header-search__input",
];

const RESULTS_SURFACE: &[&str] = &[
    "[data-test='product-card'], .search-result__item, .product-card, .goods-item, .detail-item, .catalog-item",
];

const CARDS: &[&str] = &[
    "[data-test='product-card']",
    ".search-result__item",
    ".product-card",
    ".goods-item",
    ".detail-item",
    ".catalog-item",
];

const IMAGE: &[&str] = &["[data-test='product-image']", ".product-image img", "img"];
const BRAND: &[&str] = &["[data-test='brand']", ".product-brand", ".brand-name", ".manufacturer"];
const ARTICLE: &[&str] = &["[data-test='article']", ".product-article", ".article", ".part-number"];
const NAME: &[&str] = &[
    "[data-test='product-name']",
    ".product-name",
    ".product-title",
    ".title",
    "h3",
    "h4",
];
const PRICE: &[&str] = &["[data-test='price']", ".product-price", ".price", ".cost"];
const DELIVERY: &[&str] = &["[data-test='delivery']", ".delivery-time", ".delivery", ".shipping"];

pub struct Emex;

impl Emex {
    fn defaults() -> ListingDefaults {
        ListingDefaults {
            base_url: BASE_URL,
            placeholder_image: svg_placeholder("No Image"),
            article: ArticleFallback::Timestamp,
            name: "Название не найдено",
        }
    }
}

impl Site for Emex {
    fn layout(&self) -> SiteLayout {
        SiteLayout {
            source: SourceId::Emex,
            base_url: BASE_URL,
            locale: "ru-RU",
            timezone: "Europe/Moscow",
            stealth: true,
            navigation_timeout: Duration::from_secs(30),
            settle: Pause::between(2000, 3000),
            search_input: SelectorChain::new("search input", SEARCH_INPUT, Duration::from_secs(3))
                .visible_only()
                .with_fallback("input[type='text']", Duration::from_secs(2)),
            typing: Pause::between(500, 1000),
            direct_search: None,
            results_surface: SelectorChain::new("results", RESULTS_SURFACE, Duration::from_secs(20)),
            after_results: Pause::between(3000, 5000),
        }
    }

    fn extract(&self, html: &str) -> RowBatch {
        let defaults = Emex::defaults();
        scan_rows(html, CARDS, ROW_CAP, &defaults, |card| Ok(card_draft(card, &defaults)))
    }
}

/// Cards never fail as a whole; one with no fields at all is dropped by `scan_rows`.
fn card_draft(card: ElementRef<'_>, defaults: &ListingDefaults) -> ListingDraft {
    let image = attr_of(card, IMAGE, &["src", "data-src"]);
    let price = text_of(card, PRICE).map(|t| parse_price(&t)).unwrap_or(0.0);
    let delivery = text_of(card, DELIVERY)
        .map(|t| parse_delivery_days(&t))
        .unwrap_or(0);

    ListingDraft {
        image: Some(resolve_image(image.as_deref(), BASE_URL, &defaults.placeholder_image)),
        brand: text_of(card, BRAND),
        article: text_of(card, ARTICLE),
        name: text_of(card, NAME),
        price,
        delivery,
        link: link_of(card, BASE_URL),
    }
}
