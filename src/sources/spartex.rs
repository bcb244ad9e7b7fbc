//! Spartex: rows without dependable cells, split from free text.

use scraper::ElementRef;
use std::time::Duration;

use super::freeform::split_row_text;
use super::{scan_rows, Pause, RowBatch, Site, SiteLayout, SourceId};
use crate::error::RowError;
use crate::listing::{ArticleFallback, ListingDefaults, ListingDraft, NAME_UNKNOWN};
use crate::normalize::{resolve_image, svg_placeholder};
use crate::selector::{attr_of, element_text, link_of, SelectorChain};

pub const BASE_URL: &str = "https://www.spartex.kz/front/";

const ROW_CAP: usize = 30;

const SEARCH_INPUT: &[&str] = &[
    "input[type='search']",
    "input[placeholder*='ртикул']",
    "input[placeholder*='Article']",
    "#search-input",
    ".search-field input",
    "input",
];

const RESULTS_SURFACE: &[&str] = &["table, .list-view, .products-list"];

// Document order across both kinds, like a single combined query
const ROWS: &[&str] = &["tr, .product-item"];

pub struct Spartex;

impl Spartex {
    fn defaults() -> ListingDefaults {
        ListingDefaults {
            base_url: BASE_URL,
            placeholder_image: svg_placeholder("Spartex"),
            article: ArticleFallback::Dashes,
            name: NAME_UNKNOWN,
        }
    }
}

impl Site for Spartex {
    fn layout(&self) -> SiteLayout {
        SiteLayout {
            source: SourceId::Spartex,
            base_url: BASE_URL,
            locale: "ru-RU",
            timezone: "Asia/Almaty",
            stealth: false,
            navigation_timeout: Duration::from_secs(45),
            settle: Pause::between(2000, 2500),
            search_input: SelectorChain::new("search input", SEARCH_INPUT, Duration::from_secs(2))
                .visible_only()
                .with_fallback("header input", Duration::from_secs(2)),
            typing: Pause::between(300, 700),
            direct_search: None,
            results_surface: SelectorChain::new("results", RESULTS_SURFACE, Duration::from_secs(20)),
            after_results: Pause::between(2000, 2500),
        }
    }

    fn extract(&self, html: &str) -> RowBatch {
        let defaults = Spartex::defaults();
        scan_rows(html, ROWS, ROW_CAP, &defaults, |row| row_draft(row, &defaults))
    }
}

fn row_draft(row: ElementRef<'_>, defaults: &ListingDefaults) -> Result<ListingDraft, RowError> {
    let fields = split_row_text(&element_text(row))?;
    let image = attr_of(row, &["img"], &["src", "data-src"]);

    Ok(ListingDraft {
        image: Some(resolve_image(image.as_deref(), BASE_URL, &defaults.placeholder_image)),
        brand: fields.brand,
        article: fields.article,
        name: Some(fields.name),
        price: fields.price,
        delivery: fields.delivery,
        link: link_of(row, BASE_URL),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"
        <html><body>
          <table>
            <tr><th>Бренд</th><th>Артикул</th><th>Описание</th><th>Цена</th></tr>
            <tr><td>BOSCH</td><td>0986452041</td><td>Фильтр масляный</td><td>4 500 тг</td></tr>
            <tr><td>итого</td></tr>
          </table>
          <div class="product-item">
            <a href="item/1187">SACHS 313410 Амортизатор задний</a>
            <span>27 300 ₸</span><span>2 дн</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_free_text_rows() {
        let batch = Spartex.extract(RESULTS);
        assert_eq!(batch.enumerated, 4);
        assert_eq!(batch.listings.len(), 2);
        assert_eq!(batch.skipped, 2);

        let first = &batch.listings[0];
        assert_eq!(first.brand, "BOSCH");
        assert_eq!(first.article, "0986452041");
        assert_eq!(first.price, 4500.0);
        assert_eq!(first.link, BASE_URL);
        assert!(first.image.starts_with("data:image/svg+xml"));

        let second = &batch.listings[1];
        assert_eq!(second.brand, "SACHS");
        assert_eq!(second.article, "313410");
        assert_eq!(second.price, 27300.0);
        assert_eq!(second.delivery, 2);
        assert_eq!(second.link, "https://www.spartex.kz/front/item/1187");
    }

    #[test]
    fn test_header_input_is_last_resort() {
        let chain = Spartex.layout().search_input;
        let last = chain.candidates.last().unwrap();
        assert_eq!(last.expression, "header input");
        assert!(!last.require_visible);
        assert!(chain.candidates[0].require_visible);
    }
}
