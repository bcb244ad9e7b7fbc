//! Routes searches to adapters and owns the process-wide browser.
//!
//! Adapters borrow the shared driver; when it stops answering pings the
//! dispatcher launches a replacement and rebinds every adapter before the
//! next search runs.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::SearchTuning;
use crate::degrade::{diagnostic_listing, DegradeCause};
use crate::driver::{DriverHandle, DriverLauncher};
use crate::error::{Result, ScrapeError};
use crate::listing::Listing;
use crate::sources::{adapter_for, SiteAdapter, SourceId, UnknownSource};

pub struct Dispatcher {
    launcher: Arc<dyn DriverLauncher>,
    driver: RwLock<Option<DriverHandle>>,
    adapters: HashMap<SourceId, Arc<dyn SiteAdapter>>,
    relaunch: Mutex<()>,
}

impl Dispatcher {
    /// One adapter per known source, none bound yet. Call [`Dispatcher::start`] next.
    pub fn new(launcher: Arc<dyn DriverLauncher>, tuning: SearchTuning) -> Self {
        let adapters = SourceId::ALL
            .into_iter()
            .map(|id| (id, adapter_for(id, launcher.clone(), tuning)))
            .collect();
        Self {
            launcher,
            driver: RwLock::new(None),
            adapters,
            relaunch: Mutex::new(()),
        }
    }

    /// Launch the shared driver and bind every adapter to it.
    pub async fn start(&self) -> Result<()> {
        self.ensure_driver().await.map(|_| ())
    }

    /// Reject identifiers no adapter is registered for.
    pub fn source(&self, raw: &str) -> std::result::Result<SourceId, UnknownSource> {
        let id: SourceId = raw.parse()?;
        if self.adapters.contains_key(&id) {
            Ok(id)
        } else {
            Err(UnknownSource(raw.to_string()))
        }
    }

    pub async fn browser_ready(&self) -> bool {
        let current = self.driver.read().await.clone();
        match current {
            Some(driver) => driver.ping().await,
            None => false,
        }
    }

    /// The live shared driver, relaunched (and adapters rebound) if it died.
    async fn ensure_driver(&self) -> Result<DriverHandle> {
        if let Some(driver) = self.live_driver().await {
            return Ok(driver);
        }

        let _guard = self.relaunch.lock().await;
        // Another caller may have relaunched while we waited
        if let Some(driver) = self.live_driver().await {
            return Ok(driver);
        }

        let stale = self.driver.write().await.take();
        if let Some(stale) = stale {
            warn!("⚠️ shared browser stopped responding, relaunching");
            stale.shutdown().await;
        }

        let driver = self.launcher.launch().await?;
        for adapter in self.adapters.values() {
            adapter.init(Some(driver.clone())).await?;
        }
        *self.driver.write().await = Some(driver.clone());
        info!("✅ shared browser ready, {} adapters bound", self.adapters.len());
        Ok(driver)
    }

    async fn live_driver(&self) -> Option<DriverHandle> {
        let current = self.driver.read().await.clone()?;
        current.ping().await.then_some(current)
    }

    /// Run one search on `source`.
    ///
    /// A missing search input or an exhausted budget comes back as a single
    /// diagnostic listing; session and driver failures are returned as errors.
    pub async fn search(&self, source: SourceId, query: &str) -> Result<Vec<Listing>> {
        let adapter = self
            .adapters
            .get(&source)
            .cloned()
            .ok_or(ScrapeError::DriverUnavailable)?;
        self.ensure_driver().await?;

        match adapter.search(query).await {
            Ok(listings) => Ok(listings),
            Err(e @ (ScrapeError::ElementNotFound { .. } | ScrapeError::Timeout { .. })) => {
                warn!("⚠️ {} search degraded: {}", source, e);
                Ok(vec![diagnostic_listing(source, DegradeCause::Failure(e.cause_tag()))])
            }
            Err(e) => Err(e),
        }
    }

    /// Close every adapter, then the shared driver.
    pub async fn shutdown(&self) {
        for adapter in self.adapters.values() {
            adapter.close().await;
        }
        let driver = self.driver.write().await.take();
        if let Some(driver) = driver {
            driver.shutdown().await;
        }
        info!("🔒 dispatcher shut down");
    }
}
