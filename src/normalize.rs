//! Text-to-field normalization shared by every source.
//!
//! None of these functions fail: unparsable input maps to the documented
//! "unknown" value (0 for numbers, the base URL or placeholder for URIs).

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d*)?|\.\d+)").unwrap());

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Parse a human-formatted price ("1 234,56 ₽", "12 500 тг").
///
/// Keeps digits, commas and periods, treats the first comma as the decimal
/// separator, then reads the longest leading decimal number.
pub fn parse_price(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.replacen(',', ".", 1);

    LEADING_DECIMAL
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// First run of digits in a delivery string ("доставка 5 дней" -> 5).
pub fn parse_delivery_days(text: &str) -> u32 {
    DIGIT_RUN
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Whether `href` leads to another page.
pub fn is_followable(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    !(lower.is_empty()
        || lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:"))
}

/// Make `href` absolute against `base_url`. Already-absolute input is returned unchanged;
/// an href that leads nowhere becomes `base_url`.
pub fn resolve_link(href: &str, base_url: &str) -> String {
    let href = href.trim();
    if !is_followable(href) {
        return base_url.to_string();
    }
    if is_absolute(href) {
        return href.to_string();
    }

    match url::Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{}{}", base_url, href),
    }
}

/// Same rule as [`resolve_link`], with `placeholder` standing in for a missing `src`.
pub fn resolve_image(src: Option<&str>, base_url: &str, placeholder: &str) -> String {
    match src.map(str::trim).filter(|s| !s.is_empty()) {
        Some(src) => resolve_link(src, base_url),
        None => placeholder.to_string(),
    }
}

/// Inline SVG placeholder carrying a short label, for sites whose rows have no images.
pub fn svg_placeholder(label: &str) -> String {
    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"60\" height=\"60\" viewBox=\"0 0 60 60\">\
         <rect width=\"60\" height=\"60\" fill=\"#e6e6e6\"/>\
         <text x=\"50%\" y=\"50%\" dominant-baseline=\"middle\" text-anchor=\"middle\" \
         font-family=\"sans-serif\" font-size=\"10\" fill=\"#999\">{}</text></svg>",
        label
    );
    format!("data:image/svg+xml;charset=utf-8,{}", urlencoding::encode(&svg))
}

/// Collapse all whitespace runs (including NBSP) into single spaces.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_absolute(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}
