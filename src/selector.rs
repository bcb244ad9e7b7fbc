//! Ordered selector fallback chains.
//!
//! Storefront markup is unversioned, so each semantic role (search box,
//! results surface, row, cell) is described by a list of candidates tried in
//! order: data attributes first, then semantic class names, then bare element
//! types. A candidate that matches nothing is not an error; only running out
//! of a caller-supplied budget is.
//!
//! Two resolvers share the chains: [`resolve`] waits on the live page,
//! [`first_match`] / [`all_matches`] read a rendered HTML snapshot.

use scraper::{ElementRef, Selector};
use std::time::Duration;
use tracing::{debug, info};

use crate::driver::{BrowsingSession, ElementTarget};
use crate::error::{Result, ScrapeError};
use crate::normalize::{is_followable, resolve_link, squash_whitespace};

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub expression: String,
    /// How long to wait for this candidate before moving on
    pub timeout: Duration,
    pub require_visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorChain {
    /// What the chain locates, for logs and errors
    pub role: &'static str,
    pub candidates: Vec<Candidate>,
}

impl SelectorChain {
    pub fn new(role: &'static str, expressions: &[&str], per_candidate: Duration) -> Self {
        Self {
            role,
            candidates: expressions
                .iter()
                .map(|expr| Candidate {
                    expression: expr.to_string(),
                    timeout: per_candidate,
                    require_visible: false,
                })
                .collect(),
        }
    }

    /// Only accept matches that are rendered and visible (form inputs).
    pub fn visible_only(mut self) -> Self {
        for c in &mut self.candidates {
            c.require_visible = true;
        }
        self
    }

    /// Append a last-resort candidate with its own timeout, accepted even when hidden.
    pub fn with_fallback(mut self, expression: &str, timeout: Duration) -> Self {
        self.candidates.push(Candidate {
            expression: expression.to_string(),
            timeout,
            require_visible: false,
        });
        self
    }

    /// Sum of all per-candidate waits: the worst case for one resolution.
    pub fn worst_case(&self) -> Duration {
        self.candidates.iter().map(|c| c.timeout).sum()
    }
}

/// Resolve a chain against the live page.
///
/// Returns `Ok(None)` when no candidate matched. With `budget` set, running
/// past it across all candidates is a `ScrapeError::Timeout`. Session failures
/// propagate.
pub async fn resolve(
    session: &dyn BrowsingSession,
    chain: &SelectorChain,
    budget: Option<Duration>,
) -> Result<Option<ElementTarget>> {
    let walk = async {
        for candidate in &chain.candidates {
            debug!("trying {} selector: {}", chain.role, candidate.expression);
            let hit = session
                .probe(&candidate.expression, candidate.timeout, candidate.require_visible)
                .await?;
            if let Some(index) = hit {
                info!("✅ {} found with: {}", chain.role, candidate.expression);
                return Ok(Some(ElementTarget {
                    selector: candidate.expression.clone(),
                    index,
                }));
            }
        }
        Ok::<_, ScrapeError>(None)
    };

    match budget {
        None => walk.await,
        Some(budget) => tokio::time::timeout(budget, walk)
            .await
            .map_err(|_| ScrapeError::Timeout {
                stage: chain.role,
                budget,
            })?,
    }
}

fn parse(expression: &str) -> Option<Selector> {
    match Selector::parse(expression) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!("skipping unparsable selector {:?}: {:?}", expression, e);
            None
        }
    }
}

/// First element matched by the first candidate that matches anything inside `scope`.
pub fn first_match<'a>(scope: ElementRef<'a>, candidates: &[&str]) -> Option<ElementRef<'a>> {
    candidates
        .iter()
        .filter_map(|expr| parse(expr))
        .find_map(|selector| scope.select(&selector).next())
}

/// Every element matched by the first candidate that matches anything, with that candidate.
pub fn all_matches<'a, 'c>(
    scope: ElementRef<'a>,
    candidates: &[&'c str],
) -> Option<(&'c str, Vec<ElementRef<'a>>)> {
    candidates.iter().find_map(|expr| {
        let selector = parse(expr)?;
        let found: Vec<_> = scope.select(&selector).collect();
        (!found.is_empty()).then_some((*expr, found))
    })
}

/// Visible text of an element with whitespace collapsed (cells joined by a space).
pub fn element_text(element: ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first candidate match that has any text.
pub fn text_of(scope: ElementRef<'_>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|expr| parse(expr))
        .flat_map(|selector| {
            scope
                .select(&selector)
                .next()
                .map(element_text)
                .into_iter()
        })
        .find(|text| !text.is_empty())
}

/// First non-empty value of any of `attrs`, walking every match of every candidate in order.
pub fn attr_of(scope: ElementRef<'_>, candidates: &[&str], attrs: &[&str]) -> Option<String> {
    attr_where(scope, candidates, attrs, |_| true)
}

/// Like [`attr_of`], but values rejected by `accept` are skipped too.
pub fn attr_where(
    scope: ElementRef<'_>,
    candidates: &[&str],
    attrs: &[&str],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    candidates
        .iter()
        .filter_map(|expr| parse(expr))
        .find_map(|selector| {
            scope.select(&selector).find_map(|element| {
                attrs
                    .iter()
                    .filter_map(|attr| element.value().attr(attr))
                    .map(str::trim)
                    .find(|v| !v.is_empty() && accept(v))
                    .map(str::to_string)
            })
        })
}

/// Absolute URL of the first anchor in `scope` that leads to a page.
pub fn link_of(scope: ElementRef<'_>, base_url: &str) -> Option<String> {
    attr_where(scope, &["a[href]"], &["href"], is_followable).map(|href| resolve_link(&href, base_url))
}
