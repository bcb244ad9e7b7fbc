//! Headless Chrome implementation of the driver seams.
//!
//! `headless_chrome` is a blocking API, so every call runs on the blocking
//! pool; a slow page never stalls other sessions' tasks.

use async_trait::async_trait;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::protocol::cdp::{Network, Page, Target};
use headless_chrome::types::{Bounds, RemoteError};
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{BrowsingSession, Driver, DriverHandle, DriverLauncher, ElementTarget, SessionOptions};
use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use crate::stealth;

/// Run a blocking browser call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ScrapeError::session)?
        .map_err(|e| ScrapeError::Session(format!("{:#}", e)))
}

/// Launches Chrome with the stealth flag set.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub idle_timeout: Duration,
}

impl ChromeLauncher {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            headless: settings.headless,
            chrome_path: settings.chrome_path.clone(),
            idle_timeout: settings.browser_idle_timeout,
        }
    }
}

#[async_trait]
impl DriverLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<DriverHandle> {
        let launcher = self.clone();
        let chrome = blocking(move || {
            let mut args: Vec<&OsStr> = stealth::LAUNCH_ARGS.iter().map(OsStr::new).collect();
            if launcher.headless {
                args.push(OsStr::new(stealth::HEADLESS_ARG));
            }

            let browser = Browser::new(LaunchOptions {
                headless: false, // headless is driven by HEADLESS_ARG
                window_size: Some((1920, 1080)),
                path: launcher.chrome_path.clone(),
                idle_browser_timeout: launcher.idle_timeout,
                args,
                ..Default::default()
            })?;
            Chrome::new(browser)
        })
        .await?;

        info!("🚀 Chrome launched (headless: {})", self.headless);
        Ok(Arc::new(ChromeDriver::new(chrome)))
    }
}

/// A running browser plus the default-context tab that carries
/// browser-level commands (`Browser::call_method` is not public).
#[derive(Clone)]
pub struct Chrome {
    browser: Arc<Browser>,
    anchor: Arc<Tab>,
}

impl Chrome {
    pub fn new(browser: Browser) -> anyhow::Result<Self> {
        let anchor = browser.new_tab()?;
        Ok(Self {
            browser: Arc::new(browser),
            anchor,
        })
    }

    fn dispose_context(&self, context_id: &str) -> anyhow::Result<()> {
        self.anchor.call_method(Target::DisposeBrowserContext {
            browser_context_id: context_id.to_string(),
        })?;
        Ok(())
    }
}

/// One Chrome process. Sessions are separate browser contexts inside it.
pub struct ChromeDriver {
    chrome: Mutex<Option<Chrome>>,
}

impl ChromeDriver {
    pub fn new(chrome: Chrome) -> Self {
        Self {
            chrome: Mutex::new(Some(chrome)),
        }
    }

    fn chrome(&self) -> Option<Chrome> {
        self.chrome.lock().ok().and_then(|guard| guard.as_ref().cloned())
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn BrowsingSession>> {
        let chrome = self.chrome().ok_or(ScrapeError::DriverUnavailable)?;
        let session_chrome = chrome.clone();
        let options = options.clone();
        let id = uuid::Uuid::new_v4().to_string();

        let (tab, context_id) = blocking(move || {
            let context = chrome.browser.new_context()?;
            let context_id = context.get_id().to_string();
            let tab = match context.new_tab() {
                Ok(tab) => tab,
                Err(e) => {
                    let _ = chrome.dispose_context(&context_id);
                    return Err(e);
                }
            };

            if let Err(e) = prepare_tab(&tab, &options) {
                let _ = tab.close(false);
                let _ = chrome.dispose_context(&context_id);
                return Err(e);
            }
            Ok((tab, context_id))
        })
        .await?;

        debug!(session = %id, "browser context {} opened", context_id);
        Ok(Box::new(ChromeSession {
            id,
            tab,
            context_id,
            chrome: session_chrome,
            closed: AtomicBool::new(false),
        }))
    }

    async fn ping(&self) -> bool {
        let Some(chrome) = self.chrome() else {
            return false;
        };
        blocking(move || chrome.browser.get_version()).await.is_ok()
    }

    async fn shutdown(&self) {
        // Chrome exits once the last reference drops; in-flight sessions hold one each.
        let taken = self.chrome.lock().ok().and_then(|mut guard| guard.take());
        if taken.is_some() {
            info!("🔒 Chrome driver released");
        }
    }
}

/// Identity, resource blocking and stealth for a fresh tab.
fn prepare_tab(tab: &Arc<Tab>, options: &SessionOptions) -> anyhow::Result<()> {
    let identity = &options.identity;
    let accept_language = identity.accept_language();
    tab.set_user_agent(&identity.user_agent, Some(accept_language.as_str()), None)?;
    stealth::apply_stealth_settings(tab, identity)?;

    let (width, height) = identity.viewport;
    tab.set_bounds(Bounds::Normal {
        left: Some(0),
        top: Some(0),
        width: Some(width as f64),
        height: Some(height as f64),
    })?;

    if !options.blocked_resources.is_empty() {
        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })?;
        tab.call_method(Network::SetBlockedURLs {
            urls: options.blocked_resources.clone(),
        })?;
    }

    if options.stealth {
        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: stealth::get_stealth_script(identity),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })?;
    }

    Ok(())
}

/// A lookup that simply found nothing yet, as opposed to a broken session.
fn is_not_found(error: &anyhow::Error) -> bool {
    error.is::<Timeout>() || error.is::<NoElementFound>()
}

pub struct ChromeSession {
    id: String,
    tab: Arc<Tab>,
    context_id: String,
    chrome: Chrome,
    closed: AtomicBool,
}

impl ChromeSession {
    fn teardown(tab: &Tab, chrome: &Chrome, context_id: &str) -> anyhow::Result<()> {
        let closed_tab = tab.close(false);
        let disposed = chrome.dispose_context(context_id);
        closed_tab?;
        disposed
    }
}

#[async_trait]
impl BrowsingSession for ChromeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        blocking(move || {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)?.wait_until_navigated()?;
            // DOM present is enough; network idleness never settles on SPA storefronts
            tab.wait_for_element_with_custom_timeout("body", timeout)?;
            Ok(())
        })
        .await
    }

    async fn probe(
        &self,
        selector: &str,
        timeout: Duration,
        require_visible: bool,
    ) -> Result<Option<usize>> {
        let tab = self.tab.clone();
        let selector = selector.to_string();
        blocking(move || {
            if !require_visible {
                return match tab.wait_for_element_with_custom_timeout(&selector, timeout) {
                    Ok(_) => Ok(Some(0)),
                    Err(e) if is_not_found(&e) => Ok(None),
                    Err(e) => Err(e),
                };
            }

            let script = visible_index_script(&selector);
            let deadline = Instant::now() + timeout;
            loop {
                let found = match tab.evaluate(&script, false) {
                    Ok(obj) => obj.value.and_then(|v| v.as_i64()).filter(|idx| *idx >= 0),
                    // the page is mid-navigation; poll again
                    Err(e) if e.is::<RemoteError>() => None,
                    Err(e) => return Err(e),
                };
                if let Some(idx) = found {
                    return Ok(Some(idx as usize));
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                std::thread::sleep(Duration::from_millis(150));
            }
        })
        .await
    }

    async fn fill(&self, target: &ElementTarget, text: &str) -> Result<()> {
        let tab = self.tab.clone();
        let script = focus_script(target);
        let text = text.to_string();
        blocking(move || {
            let focused = tab
                .evaluate(&script, false)?
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if !focused {
                anyhow::bail!("element detached before it could be filled");
            }
            tab.type_str(&text)?;
            Ok(())
        })
        .await
    }

    async fn press_enter(&self) -> Result<()> {
        let tab = self.tab.clone();
        blocking(move || {
            tab.press_key("Enter")?;
            Ok(())
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        let tab = self.tab.clone();
        blocking(move || tab.get_content()).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let tab = self.tab.clone();
        let chrome = self.chrome.clone();
        let context_id = self.context_id.clone();
        blocking(move || ChromeSession::teardown(&tab, &chrome, &context_id)).await
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(session = %self.id, "session dropped without close(), tearing down");
        let tab = self.tab.clone();
        let chrome = self.chrome.clone();
        let context_id = self.context_id.clone();
        let teardown = move || {
            if let Err(e) = ChromeSession::teardown(&tab, &chrome, &context_id) {
                warn!("teardown of dropped session failed: {:#}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(teardown);
            }
            Err(_) => teardown(),
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn visible_index_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            let els;
            try {{ els = Array.from(document.querySelectorAll({sel})); }} catch (e) {{ return -1; }}
            return els.findIndex(el => {{
                const r = el.getBoundingClientRect();
                const s = window.getComputedStyle(el);
                return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
            }});
        }})()"#,
        sel = js_string(selector)
    )
}

fn focus_script(target: &ElementTarget) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelectorAll({sel})[{idx}];
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            el.focus();
            el.value = '';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = js_string(&target.selector),
        idx = target.index
    )
}
