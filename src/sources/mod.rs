//! Site adapters.
//!
//! Every source runs the same search pipeline ([`Adapter`]); what differs per
//! site is captured by a [`Site`]: its [`SiteLayout`] (URLs, candidate chains,
//! timeouts, client identity) and its row extraction over a rendered snapshot.

pub mod emex;
pub mod freeform;
pub mod rulim;
pub mod spartex;

use async_trait::async_trait;
use rand::Rng;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument};
use utoipa::ToSchema;

use crate::config::SearchTuning;
use crate::degrade::{self, DegradeCause};
use crate::driver::{BrowsingSession, DriverHandle, DriverLauncher, SessionOptions};
use crate::error::{Result, RowError, ScrapeError};
use crate::listing::{Listing, ListingDefaults, ListingDraft};
use crate::selector::{self, SelectorChain};
use crate::stealth::{self, ClientProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Emex,
    Rulim,
    Spartex,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::Emex, SourceId::Rulim, SourceId::Spartex];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Emex => "emex",
            SourceId::Rulim => "rulim",
            SourceId::Spartex => "spartex",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::Emex => "Emex",
            SourceId::Rulim => "Rulim",
            SourceId::Spartex => "Spartex",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            SourceId::Emex => emex::BASE_URL,
            SourceId::Rulim => rulim::BASE_URL,
            SourceId::Spartex => spartex::BASE_URL,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown source '{0}' (expected one of: emex, rulim, spartex)")]
pub struct UnknownSource(pub String);

impl FromStr for SourceId {
    type Err = UnknownSource;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// The contract every source exposes to the dispatcher.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    /// Bind a shared driver, or launch a private one when `driver` is `None`.
    /// Re-binding releases a previously owned driver.
    async fn init(&self, driver: Option<DriverHandle>) -> Result<()>;

    /// Run one search. Always at least one listing (real or diagnostic) on `Ok`.
    async fn search(&self, query: &str) -> Result<Vec<Listing>>;

    /// Release a privately owned driver. No-op for a shared one; safe to repeat.
    async fn close(&self);
}

/// Randomized wait in milliseconds, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pause {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Pause {
    pub const fn between(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

/// Builds a search URL that skips the search form entirely.
pub type DirectSearch = fn(&str) -> String;

/// Everything the pipeline needs to know about a site's navigation.
#[derive(Clone)]
pub struct SiteLayout {
    pub source: SourceId,
    pub base_url: &'static str,
    pub locale: &'static str,
    pub timezone: &'static str,
    /// Inject the automation-masking script
    pub stealth: bool,
    pub navigation_timeout: Duration,
    /// After the landing page body appears
    pub settle: Pause,
    pub search_input: SelectorChain,
    /// Between typing the query and pressing Enter
    pub typing: Pause,
    /// Secondary path used when no search input resolves
    pub direct_search: Option<DirectSearch>,
    /// Optional wait; a miss is absorbed and the current page is parsed
    pub results_surface: SelectorChain,
    /// After the results surface appears (or its wait ran out)
    pub after_results: Pause,
}

/// One target site: navigation layout plus row extraction.
pub trait Site: Send + Sync + 'static {
    fn layout(&self) -> SiteLayout;

    /// Parse the rendered results page. Pure over the HTML snapshot.
    fn extract(&self, html: &str) -> RowBatch;
}

/// Outcome of row extraction over one results page.
#[derive(Debug, Default)]
pub struct RowBatch {
    pub listings: Vec<Listing>,
    /// Rows matched by the row chain, before the cap
    pub enumerated: usize,
    pub skipped: usize,
}

impl RowBatch {
    pub fn degrade_cause(&self) -> DegradeCause {
        if self.enumerated == 0 {
            DegradeCause::NoRows
        } else {
            DegradeCause::RowsUnparsed {
                enumerated: self.enumerated,
            }
        }
    }
}

/// Enumerate rows in `html` via the first productive candidate and extract up to `cap` of them.
///
/// A row whose extractor fails, or that yields nothing usable, is skipped and counted.
pub fn scan_rows<F>(
    html: &str,
    row_candidates: &[&str],
    cap: usize,
    defaults: &ListingDefaults,
    mut extract_row: F,
) -> RowBatch
where
    F: for<'a> FnMut(ElementRef<'a>) -> std::result::Result<ListingDraft, RowError>,
{
    let document = Html::parse_document(html);
    let Some((matched, rows)) = selector::all_matches(document.root_element(), row_candidates) else {
        warn!("⚠️ no result rows matched any candidate selector");
        return RowBatch::default();
    };
    debug!("{} rows matched {}", rows.len(), matched);

    let mut batch = RowBatch {
        enumerated: rows.len(),
        ..Default::default()
    };

    for (i, row) in rows.into_iter().take(cap).enumerate() {
        let draft = extract_row(row).and_then(|draft| {
            if draft.is_blank() {
                Err(RowError::NoFields)
            } else {
                Ok(draft)
            }
        });
        match draft {
            Ok(draft) => batch.listings.push(draft.finish(defaults)),
            Err(e) => {
                debug!("row {} skipped: {}", i + 1, e);
                batch.skipped += 1;
            }
        }
    }

    batch
}

enum Binding {
    Unbound,
    Shared(DriverHandle),
    Owned(DriverHandle),
}

/// Which driver an adapter talks to, and whether it is responsible for shutting it down.
pub struct DriverSlot {
    launcher: Arc<dyn DriverLauncher>,
    binding: RwLock<Binding>,
}

impl DriverSlot {
    pub fn new(launcher: Arc<dyn DriverLauncher>) -> Self {
        Self {
            launcher,
            binding: RwLock::new(Binding::Unbound),
        }
    }

    pub async fn bind(&self, shared: Option<DriverHandle>) -> Result<()> {
        let next = match shared {
            Some(handle) => Binding::Shared(handle),
            None => Binding::Owned(self.launcher.launch().await?),
        };
        let previous = std::mem::replace(&mut *self.binding.write().await, next);
        if let Binding::Owned(old) = previous {
            old.shutdown().await;
        }
        Ok(())
    }

    pub async fn handle(&self) -> Result<DriverHandle> {
        match &*self.binding.read().await {
            Binding::Shared(handle) | Binding::Owned(handle) => Ok(handle.clone()),
            Binding::Unbound => Err(ScrapeError::DriverUnavailable),
        }
    }

    pub async fn owns_driver(&self) -> bool {
        matches!(&*self.binding.read().await, Binding::Owned(_))
    }

    pub async fn release(&self) {
        let previous = std::mem::replace(&mut *self.binding.write().await, Binding::Unbound);
        if let Binding::Owned(handle) = previous {
            handle.shutdown().await;
        }
    }
}

/// The shared search pipeline, specialised by a [`Site`].
pub struct Adapter<S: Site> {
    site: S,
    layout: SiteLayout,
    slot: DriverSlot,
    tuning: SearchTuning,
}

impl<S: Site> Adapter<S> {
    pub fn new(site: S, launcher: Arc<dyn DriverLauncher>, tuning: SearchTuning) -> Self {
        let layout = site.layout();
        Self {
            site,
            layout,
            slot: DriverSlot::new(launcher),
            tuning,
        }
    }

    pub async fn owns_driver(&self) -> bool {
        self.slot.owns_driver().await
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            identity: ClientProfile::for_market(self.layout.locale, self.layout.timezone),
            stealth: self.layout.stealth,
            blocked_resources: stealth::BLOCKED_RESOURCES.iter().map(|p| p.to_string()).collect(),
        }
    }

    async fn human_pause(&self, pause: Pause) {
        if !self.tuning.human_delays {
            return;
        }
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(pause.min_ms..=pause.max_ms.max(pause.min_ms))
        };
        sleep(Duration::from_millis(millis)).await;
    }

    /// Steps 3 to 8, inside an already open session.
    async fn drive(&self, session: &dyn BrowsingSession, query: &str) -> Result<Vec<Listing>> {
        let layout = &self.layout;

        session.navigate(layout.base_url, layout.navigation_timeout).await?;
        self.human_pause(layout.settle).await;

        match selector::resolve(session, &layout.search_input, None).await? {
            Some(input) => {
                session.fill(&input, query).await?;
                self.human_pause(layout.typing).await;
                session.press_enter().await?;
            }
            None => match layout.direct_search {
                Some(direct) => {
                    let url = direct(query);
                    warn!("⚠️ search input not found, falling back to {}", url);
                    session.navigate(&url, layout.navigation_timeout).await?;
                }
                None => {
                    return Err(ScrapeError::ElementNotFound {
                        site: layout.source,
                        role: layout.search_input.role,
                    })
                }
            },
        }

        if selector::resolve(session, &layout.results_surface, None).await?.is_none() {
            warn!(
                "⚠️ results surface did not appear within {:?}, parsing current page",
                layout.results_surface.worst_case()
            );
        }
        self.human_pause(layout.after_results).await;

        let html = session.content().await?;
        let batch = self.site.extract(&html);
        info!(
            enumerated = batch.enumerated,
            extracted = batch.listings.len(),
            skipped = batch.skipped,
            "📊 rows processed"
        );

        let cause = batch.degrade_cause();
        if batch.listings.is_empty() {
            warn!("⚠️ no usable listings ({}), returning diagnostic listing", cause.tag());
        }
        Ok(degrade::ensure_non_empty(layout.source, batch.listings, cause))
    }
}

#[async_trait]
impl<S: Site> SiteAdapter for Adapter<S> {
    fn source(&self) -> SourceId {
        self.layout.source
    }

    async fn init(&self, driver: Option<DriverHandle>) -> Result<()> {
        let private = driver.is_none();
        self.slot.bind(driver).await?;
        info!(
            "✅ {} adapter ready ({} driver)",
            self.layout.source.display_name(),
            if private { "private" } else { "shared" }
        );
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Listing>> {
        let driver = self.slot.handle().await?;
        let session = driver.open_session(&self.session_options()).await?;

        let span = info_span!(
            "search",
            source = %self.layout.source,
            session = %session.id(),
            query = %query
        );
        let budget = self.tuning.budget;
        let outcome = tokio::time::timeout(budget, self.drive(session.as_ref(), query))
            .instrument(span.clone())
            .await;

        if let Err(e) = session.close().await {
            span.in_scope(|| warn!("session close failed: {}", e));
        }

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout {
                stage: "search",
                budget,
            }),
        }
    }

    async fn close(&self) {
        self.slot.release().await;
    }
}

/// Adapter for `source`, not yet bound to a driver.
pub fn adapter_for(
    source: SourceId,
    launcher: Arc<dyn DriverLauncher>,
    tuning: SearchTuning,
) -> Arc<dyn SiteAdapter> {
    match source {
        SourceId::Emex => Arc::new(Adapter::new(emex::Emex, launcher, tuning)),
        SourceId::Rulim => Arc::new(Adapter::new(rulim::Rulim, launcher, tuning)),
        SourceId::Spartex => Arc::new(Adapter::new(spartex::Spartex, launcher, tuning)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ArticleFallback;

    #[test]
    fn test_source_id_parsing() {
        assert_eq!("emex".parse::<SourceId>(), Ok(SourceId::Emex));
        assert_eq!(" Rulim ".parse::<SourceId>(), Ok(SourceId::Rulim));
        assert_eq!("SPARTEX".parse::<SourceId>(), Ok(SourceId::Spartex));
        assert_eq!(
            "exist".parse::<SourceId>(),
            Err(UnknownSource("exist".to_string()))
        );
    }

    #[test]
    fn test_source_id_wire_form() {
        assert_eq!(serde_json::to_string(&SourceId::Spartex).unwrap(), "\"spartex\"");
        assert_eq!(SourceId::Rulim.to_string(), "rulim");
    }

    fn defaults() -> ListingDefaults {
        ListingDefaults {
            base_url: "https://shop.test",
            placeholder_image: "data:image/svg+xml,x".to_string(),
            article: ArticleFallback::Dashes,
            name: "Запчасть",
        }
    }

    #[test]
    fn test_scan_rows_caps_and_counts() {
        let rows: String = (1..=5).map(|i| format!("<li class='row'>{}</li>", i)).collect();
        let html = format!("<ul>{}</ul>", rows);
        let batch = scan_rows(&html, &[".missing", "li.row"], 3, &defaults(), |row| {
            let text = selector::element_text(row);
            if text == "2" {
                return Err(RowError::NoPrice);
            }
            Ok(ListingDraft {
                name: Some(text),
                ..Default::default()
            })
        });
        assert_eq!(batch.enumerated, 5);
        assert_eq!(batch.listings.len(), 2);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.listings[0].name, "1");
        assert_eq!(batch.listings[1].name, "3");
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let batch = scan_rows("<div class='r'></div>", &[".r"], 10, &defaults(), |_| {
            Ok(ListingDraft::default())
        });
        assert!(batch.listings.is_empty());
        assert_eq!(batch.skipped, 1);
        assert_eq!(
            batch.degrade_cause(),
            DegradeCause::RowsUnparsed { enumerated: 1 }
        );
    }

    #[test]
    fn test_no_rows_cause() {
        let batch = scan_rows("<p>nothing</p>", &[".r"], 10, &defaults(), |_| {
            Ok(ListingDraft::default())
        });
        assert_eq!(batch.enumerated, 0);
        assert_eq!(batch.degrade_cause(), DegradeCause::NoRows);
    }
}
