//! Normalized product listing, the unit of output of every source.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const BRAND_UNKNOWN: &str = "N/A";
pub const ARTICLE_UNKNOWN: &str = "---";
pub const NAME_UNKNOWN: &str = "Запчасть";

/// Stock status shown to the user. Derived from the price, never scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Availability {
    #[serde(rename = "В наличии")]
    InStock,
    #[serde(rename = "Под заказ")]
    OnOrder,
}

impl Availability {
    pub fn from_price(price: f64) -> Self {
        if price > 0.0 {
            Availability::InStock
        } else {
            Availability::OnOrder
        }
    }
}

/// One product result. Every field holds either a real value or a documented sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Listing {
    /// Absolute image URI or an inline placeholder
    pub image: String,
    pub brand: String,
    /// Part number
    pub article: String,
    pub name: String,
    /// 0 means the price could not be extracted
    pub price: f64,
    /// Delivery estimate in days, 0 when unknown
    pub delivery: u32,
    pub link: String,
    pub availability: Availability,
}

/// What to put in `article` when the row has no part number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleFallback {
    Dashes,
    /// `ART-<unix millis>`, unique enough to key UI rows
    Timestamp,
}

impl ArticleFallback {
    fn render(self) -> String {
        match self {
            ArticleFallback::Dashes => ARTICLE_UNKNOWN.to_string(),
            ArticleFallback::Timestamp => {
                format!("ART-{}", chrono::Utc::now().timestamp_millis())
            }
        }
    }
}

/// Per-site values used to fill in whatever a row did not yield.
#[derive(Debug, Clone)]
pub struct ListingDefaults {
    pub base_url: &'static str,
    pub placeholder_image: String,
    pub article: ArticleFallback,
    pub name: &'static str,
}

/// Fields pulled out of one result row, before sentinels are applied.
/// Text fields are expected to be already resolved (absolute links, trimmed text).
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    pub image: Option<String>,
    pub brand: Option<String>,
    pub article: Option<String>,
    pub name: Option<String>,
    pub price: f64,
    pub delivery: u32,
    pub link: Option<String>,
}

impl ListingDraft {
    /// True when the row gave us nothing a user could act on.
    pub fn is_blank(&self) -> bool {
        non_blank(&self.brand).is_none()
            && non_blank(&self.article).is_none()
            && non_blank(&self.name).is_none()
            && self.price <= 0.0
    }

    pub fn finish(self, defaults: &ListingDefaults) -> Listing {
        let price = if self.price.is_finite() && self.price > 0.0 {
            self.price
        } else {
            0.0
        };

        Listing {
            image: non_blank(&self.image)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.placeholder_image.clone()),
            brand: non_blank(&self.brand).unwrap_or(BRAND_UNKNOWN).to_string(),
            article: non_blank(&self.article)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.article.render()),
            name: non_blank(&self.name).unwrap_or(defaults.name).to_string(),
            price,
            delivery: self.delivery,
            link: non_blank(&self.link).unwrap_or(defaults.base_url).to_string(),
            availability: Availability::from_price(price),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
