//! Diagnostic placeholder returned instead of an empty result set.
//!
//! The listing is deliberately unlike real inventory: brand `DEMO DATA`,
//! zero price, and an article naming the failure cause.

use crate::listing::{Availability, Listing};
use crate::normalize::svg_placeholder;
use crate::sources::SourceId;

pub const DIAGNOSTIC_BRAND: &str = "DEMO DATA";

/// Why a search produced no real listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeCause {
    /// The row chain matched nothing (blocked, redesigned, or truly no results)
    NoRows,
    /// Rows were found but none yielded a usable listing
    RowsUnparsed { enumerated: usize },
    /// A call-level failure the dispatcher chose to soften, tagged by the error
    Failure(&'static str),
}

impl DegradeCause {
    pub fn tag(&self) -> &'static str {
        match self {
            DegradeCause::NoRows => "NO_RESULTS",
            DegradeCause::RowsUnparsed { .. } => "ROWS_UNPARSED",
            DegradeCause::Failure(tag) => tag,
        }
    }

    fn explain(&self) -> String {
        match self {
            DegradeCause::NoRows => {
                "Результаты не найдены: сайт не вернул ни одной строки".to_string()
            }
            DegradeCause::RowsUnparsed { enumerated } => format!(
                "Не удалось разобрать {} найденных строк: разметка сайта изменилась",
                enumerated
            ),
            DegradeCause::Failure(tag) => format!("Поиск не выполнен ({})", tag),
        }
    }
}

/// The single diagnostic listing for `source`.
pub fn diagnostic_listing(source: SourceId, cause: DegradeCause) -> Listing {
    Listing {
        image: svg_placeholder("DEMO"),
        brand: DIAGNOSTIC_BRAND.to_string(),
        article: cause.tag().to_string(),
        name: format!("[{}] {}", source.display_name(), cause.explain()),
        price: 0.0,
        delivery: 0,
        link: source.base_url().to_string(),
        availability: Availability::OnOrder,
    }
}

/// Pass real listings through; replace an empty set with the diagnostic listing.
pub fn ensure_non_empty(source: SourceId, listings: Vec<Listing>, cause: DegradeCause) -> Vec<Listing> {
    if listings.is_empty() {
        vec![diagnostic_listing(source, cause)]
    } else {
        listings
    }
}

pub fn is_diagnostic(listing: &Listing) -> bool {
    listing.brand == DIAGNOSTIC_BRAND
}
