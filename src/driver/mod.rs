//! Browser seams: the long-lived driver handle and the per-call browsing session.
//!
//! Adapters only ever talk to these traits. [`chrome`] provides the real
//! headless-Chrome implementation; tests plug in an in-memory one.

pub mod chrome;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::stealth::ClientProfile;

/// Shared capability to create isolated sessions. Cheap to clone.
pub type DriverHandle = Arc<dyn Driver>;

/// A running browser process.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Create a fresh, isolated session (own cookies and storage).
    async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn BrowsingSession>>;

    /// Cheap liveness check. `false` means the process is gone or unresponsive.
    async fn ping(&self) -> bool;

    /// Terminate the browser process. Further calls are no-ops.
    async fn shutdown(&self);
}

/// Starts new driver instances. Used for private (adapter-owned) drivers and relaunches.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> Result<DriverHandle>;
}

/// How a session should present itself.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub identity: ClientProfile,
    /// Inject the automation-flag masking script
    pub stealth: bool,
    /// URL patterns to block (images, fonts)
    pub blocked_resources: Vec<String>,
}

/// A resolved element: which selector matched and which of its matches to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub selector: String,
    pub index: usize,
}

/// One isolated browser context with a single page. Owned by exactly one search call.
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    fn id(&self) -> &str;

    /// Navigate and wait for the document body, not for network idleness.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait up to `timeout` for `selector`. Returns the index of the first match,
    /// or of the first visible match when `require_visible` is set.
    /// `Ok(None)` means nothing (visible) matched in time.
    async fn probe(
        &self,
        selector: &str,
        timeout: Duration,
        require_visible: bool,
    ) -> Result<Option<usize>>;

    /// Focus the element, clear it and type `text`.
    async fn fill(&self, target: &ElementTarget, text: &str) -> Result<()>;

    async fn press_enter(&self) -> Result<()>;

    /// Current rendered HTML of the page.
    async fn content(&self) -> Result<String>;

    /// Close the page and dispose of the context. Idempotent.
    async fn close(&self) -> Result<()>;
}
