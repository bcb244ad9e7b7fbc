//! Best-effort structured extraction from unstructured row text.
//!
//! Used when a results page has rows but no reliable cell structure. The
//! split is lossy by nature: it assumes rows read `brand article … price`,
//! and will misattribute brand and article when they don't.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RowError;
use crate::normalize::{parse_delivery_days, parse_price, squash_whitespace};

const MIN_ROW_CHARS: usize = 10;
const NAME_CHARS: usize = 50;

/// A number followed by a currency token: "12 500 тг", "1 234,50 ₽", "4500KZT".
static CURRENCY_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\s\d{3})*(?:[.,]\d{1,2})?)\s?(?:тг|₸|kzt|руб|rub|₽)").unwrap()
});

static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d\s]*").unwrap());

static DELIVERY_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d+\s*(?:дн|day)").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct FreeformFields {
    pub brand: Option<String>,
    pub article: Option<String>,
    pub name: String,
    pub price: f64,
    pub delivery: u32,
}

/// Split one row's visible text into listing fields.
///
/// Rows shorter than ten characters, or without any detectable price, are rejected.
pub fn split_row_text(raw: &str) -> Result<FreeformFields, RowError> {
    let text = squash_whitespace(raw);
    let chars = text.chars().count();
    if chars < MIN_ROW_CHARS {
        return Err(RowError::TooShort(chars));
    }

    let price = detect_price(&text);
    if price <= 0.0 {
        return Err(RowError::NoPrice);
    }

    let mut tokens = text.split_whitespace();
    let (brand, article) = match (tokens.next(), tokens.next()) {
        (Some(brand), Some(article)) => (Some(brand.to_string()), Some(article.to_string())),
        _ => (None, None),
    };

    let name = if chars > NAME_CHARS {
        format!("{}...", text.chars().take(NAME_CHARS).collect::<String>().trim_end())
    } else {
        text.clone()
    };

    let delivery = DELIVERY_HINT
        .find(&text)
        .map(|m| parse_delivery_days(m.as_str()))
        .unwrap_or(0);

    Ok(FreeformFields {
        brand,
        article,
        name,
        price,
        delivery,
    })
}

/// Currency-suffixed amount first, otherwise the last numeric run in the text.
fn detect_price(text: &str) -> f64 {
    if let Some(caps) = CURRENCY_PRICE.captures(text) {
        return parse_price(&caps[1]);
    }
    NUMERIC_RUN
        .find_iter(text)
        .last()
        .map(|m| parse_price(m.as_str()))
        .unwrap_or(0.0)
}
