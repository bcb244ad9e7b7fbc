//! In-memory driver that serves fixture HTML instead of launching Chrome.
#![allow(dead_code)]

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parts_crawler::config::SearchTuning;
use parts_crawler::driver::{
    BrowsingSession, Driver, DriverHandle, DriverLauncher, ElementTarget, SessionOptions,
};
use parts_crawler::error::{Result, ScrapeError};

pub const EMPTY_PAGE: &str = "<html><body></body></html>";

pub fn fast_tuning() -> SearchTuning {
    SearchTuning {
        budget: Duration::from_secs(5),
        human_delays: false,
    }
}

/// What the fake browser serves: pages by URL, and the page shown after submitting a query.
#[derive(Clone)]
pub struct FakeWeb {
    pages: HashMap<String, String>,
    broken: HashSet<String>,
    results: Arc<dyn Fn(&str) -> String + Send + Sync>,
    content_delay: Duration,
    probe_delay: Duration,
    probes_disconnect: bool,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            broken: HashSet::new(),
            results: Arc::new(|_| EMPTY_PAGE.to_string()),
            content_delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
            probes_disconnect: false,
        }
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Navigating to `url` fails outright.
    pub fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    /// Results page rendered from the typed query.
    pub fn results(mut self, render: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.results = Arc::new(render);
        self
    }

    pub fn slow_content(mut self, delay: Duration) -> Self {
        self.content_delay = delay;
        self
    }

    /// Every selector lookup takes `delay` before answering.
    pub fn slow_probes(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Selector lookups fail the way a dead tab does.
    pub fn disconnect_on_probe(mut self) -> Self {
        self.probes_disconnect = true;
        self
    }
}

#[derive(Default)]
struct Stats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    shutdowns: AtomicUsize,
    typed: Mutex<Vec<(String, String)>>,
    filled: Mutex<Vec<ElementTarget>>,
    navigations: Mutex<Vec<String>>,
}

pub struct FakeDriver {
    web: FakeWeb,
    alive: AtomicBool,
    stats: Arc<Stats>,
}

impl FakeDriver {
    pub fn new(web: FakeWeb) -> Arc<Self> {
        Arc::new(Self {
            web,
            alive: AtomicBool::new(true),
            stats: Arc::new(Stats::default()),
        })
    }

    pub fn handle(self: &Arc<Self>) -> DriverHandle {
        self.clone()
    }

    /// Simulate the browser process dying without anyone calling shutdown.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.opened() - self.closed()
    }

    pub fn shutdowns(&self) -> usize {
        self.stats.shutdowns.load(Ordering::SeqCst)
    }

    /// `(session id, text)` for every fill, in order.
    pub fn typed(&self) -> Vec<(String, String)> {
        self.stats.typed.lock().unwrap().clone()
    }

    /// Element each fill was aimed at, in order.
    pub fn filled(&self) -> Vec<ElementTarget> {
        self.stats.filled.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.stats.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open_session(&self, _options: &SessionOptions) -> Result<Box<dyn BrowsingSession>> {
        if !self.is_alive() {
            return Err(ScrapeError::session("browser disconnected"));
        }
        let n = self.stats.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeSession {
            id: format!("fake-{}", n),
            web: self.web.clone(),
            stats: self.stats.clone(),
            current: Mutex::new(EMPTY_PAGE.to_string()),
            typed: Mutex::new(String::new()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn ping(&self) -> bool {
        self.is_alive()
    }

    async fn shutdown(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeSession {
    id: String,
    web: FakeWeb,
    stats: Arc<Stats>,
    current: Mutex<String>,
    typed: Mutex<String>,
    closed: AtomicBool,
}

/// Markup-level stand-in for layout: the element or an ancestor is
/// `hidden`, `display:none` or `visibility:hidden`.
fn is_hidden(element: scraper::ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(scraper::ElementRef::wrap))
        .any(|el| {
            let style = el
                .value()
                .attr("style")
                .unwrap_or("")
                .replace(' ', "")
                .to_ascii_lowercase();
            el.value().attr("hidden").is_some()
                || style.contains("display:none")
                || style.contains("visibility:hidden")
        })
}

/// Index of the first match, or of the first visible one.
fn match_index(html: &str, selector: &str, require_visible: bool) -> Option<usize> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(html);
    let index = document
        .select(&selector)
        .position(|el| !require_visible || !is_hidden(el));
    index
}

#[async_trait]
impl BrowsingSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.stats.navigations.lock().unwrap().push(url.to_string());
        if self.web.broken.contains(url) {
            return Err(ScrapeError::session(format!("net::ERR_CONNECTION_RESET at {}", url)));
        }
        let html = self.web.pages.get(url).cloned().unwrap_or_else(|| EMPTY_PAGE.to_string());
        *self.current.lock().unwrap() = html;
        Ok(())
    }

    async fn probe(
        &self,
        selector: &str,
        _timeout: Duration,
        require_visible: bool,
    ) -> Result<Option<usize>> {
        if !self.web.probe_delay.is_zero() {
            tokio::time::sleep(self.web.probe_delay).await;
        }
        if self.web.probes_disconnect {
            return Err(ScrapeError::session("Unable to make method calls because underlying connection is closed"));
        }
        let html = self.current.lock().unwrap().clone();
        Ok(match_index(&html, selector, require_visible))
    }

    async fn fill(&self, target: &ElementTarget, text: &str) -> Result<()> {
        self.stats.filled.lock().unwrap().push(target.clone());
        *self.typed.lock().unwrap() = text.to_string();
        self.stats
            .typed
            .lock()
            .unwrap()
            .push((self.id.clone(), text.to_string()));
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        let query = self.typed.lock().unwrap().clone();
        *self.current.lock().unwrap() = (self.web.results)(&query);
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        if !self.web.content_delay.is_zero() {
            tokio::time::sleep(self.web.content_delay).await;
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Launches a fresh [`FakeDriver`] per call and remembers each one.
pub struct FakeLauncher {
    web: FakeWeb,
    launched: Mutex<Vec<Arc<FakeDriver>>>,
}

impl FakeLauncher {
    pub fn new(web: FakeWeb) -> Arc<Self> {
        Arc::new(Self {
            web,
            launched: Mutex::new(Vec::new()),
        })
    }

    pub fn launched(&self) -> Vec<Arc<FakeDriver>> {
        self.launched.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Arc<FakeDriver> {
        self.launched().last().cloned().expect("nothing launched yet")
    }
}

#[async_trait]
impl DriverLauncher for FakeLauncher {
    async fn launch(&self) -> Result<DriverHandle> {
        let driver = FakeDriver::new(self.web.clone());
        self.launched.lock().unwrap().push(driver.clone());
        Ok(driver as DriverHandle)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const EMEX_LANDING: &str =
    r#"<html><body><header><input placeholder="Найти запчасть по номеру"></header></body></html>"#;

/// A stale hidden search box ahead of the one the user actually sees.
pub const EMEX_LANDING_HIDDEN_FIRST: &str = r#"<html><body>
    <div class="mobile-search" style="display: none"><input placeholder="Найти запчасть"></div>
    <header><input placeholder="Найти запчасть" hidden><input placeholder="Найти запчасть по номеру"></header>
</body></html>"#;

pub const BLOCKED_PAGE: &str =
    r#"<html><body><h1>Access denied</h1><p>Please verify you are human</p></body></html>"#;

/// One Emex card whose brand echoes the query.
pub fn emex_card(query: &str) -> String {
    format!(
        r#"<html><body>
            <div class="search-result__item">
              <a href="/p/1"><img src="/i/1.jpg"></a>
              <span class="product-brand">{}</span>
              <span class="product-article">0986452041</span>
              <h3>Фильтр масляный</h3>
              <div class="price">1 234,56 ₽</div>
              <div class="delivery">3 дня</div>
            </div>
        </body></html>"#,
        query
    )
}

pub const RULIM_TABLE: &str = r#"<html><body>
    <table class="result">
      <tr class="row-item"><td>NGK</td><td>BKR6E</td><td>Свеча зажигания</td><td>1 850 тг</td><td></td></tr>
    </table>
</body></html>"#;
