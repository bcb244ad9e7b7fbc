//! Client identity & automation masking
//!
//! - Market-matched client profiles (UA, locale, timezone, viewport)
//! - The `navigator.webdriver` masking script injected before page scripts run
//! - CDP timezone/locale overrides
//!
//! Best-effort only: none of this defeats a site that really wants to block us.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ]
});

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1536, 864), (1440, 900), (1366, 768)];

/// Chrome flags applied to every launch.
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-infobars",
];

/// Modern headless mode; passed as a flag instead of `LaunchOptions::headless`.
pub const HEADLESS_ARG: &str = "--headless=new";

/// Sub-resources nobody reads when scraping text: images and fonts.
pub const BLOCKED_RESOURCES: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.woff", "*.woff2", "*.ttf",
];

/// Who the browser claims to be for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientProfile {
    pub user_agent: String,
    /// BCP 47 tag, e.g. `ru-RU`
    pub locale: String,
    /// IANA zone, e.g. `Europe/Moscow`
    pub timezone: String,
    pub viewport: (u32, u32),
}

impl ClientProfile {
    /// Desktop Chrome identity for a market, with UA and viewport picked at random.
    pub fn for_market(locale: &str, timezone: &str) -> Self {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(DEFAULT_USER_AGENT);
        let viewport = VIEWPORTS[rng.gen_range(0..VIEWPORTS.len())];

        Self {
            user_agent: user_agent.to_string(),
            locale: locale.to_string(),
            timezone: timezone.to_string(),
            viewport,
        }
    }

    /// `Accept-Language` value matching the locale ("ru-RU" -> "ru-RU,ru;q=0.9").
    pub fn accept_language(&self) -> String {
        match self.locale.split_once('-') {
            Some((lang, _)) => format!("{},{};q=0.9", self.locale, lang),
            None => self.locale.clone(),
        }
    }

    /// JS array literal for `navigator.languages`.
    fn languages_js(&self) -> String {
        let mut langs = vec![self.locale.clone()];
        if let Some((lang, _)) = self.locale.split_once('-') {
            langs.push(lang.to_string());
        }
        serde_json::to_string(&langs).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Script evaluated before any page script (Page.addScriptToEvaluateOnNewDocument).
pub fn get_stealth_script(profile: &ClientProfile) -> String {
    let base_script = r#"
        // 1. Unmasking: remove `navigator.webdriver`
        Object.defineProperty(navigator, 'webdriver', {
            get: () => undefined,
        });

        // 2. Languages consistent with the Accept-Language header
        Object.defineProperty(navigator, 'languages', {
            get: () => __LANGUAGES__,
        });

        // 3. Chrome runtime object, missing in headless builds
        if (!window.chrome) {
            window.chrome = {
                runtime: {
                    connect: function() {
                        return {
                            onMessage: { addListener: function() {}, removeListener: function() {} },
                            postMessage: function() {},
                            disconnect: function() {}
                        };
                    },
                    sendMessage: function() {},
                    onMessage: { addListener: function() {}, removeListener: function() {} }
                },
                csi: function() {},
                loadTimes: function() { return {}; }
            };
        }

        // 4. Notifications permission reads 'default'/'denied', never 'prompt'
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications' ?
            Promise.resolve({ state: Notification.permission }) :
            originalQuery(parameters)
        );

        // 5. Standard Chrome plugin set
        Object.defineProperty(navigator, 'plugins', {
            get: () => {
                const pdf = {
                    0: { type: "application/x-google-chrome-pdf", suffixes: "pdf", description: "Portable Document Format" },
                    description: "Portable Document Format",
                    filename: "internal-pdf-viewer",
                    length: 1,
                    name: "Chrome PDF Plugin"
                };
                const p = [pdf, pdf, pdf];
                Object.setPrototypeOf(p, PluginArray.prototype);
                return p;
            }
        });
    "#;

    base_script.replace("__LANGUAGES__", &profile.languages_js())
}

// ============================================================================
// CDP overrides (Rust-side)
// ============================================================================

use headless_chrome::protocol::cdp::Emulation::{SetLocaleOverride, SetTimezoneOverride};
use headless_chrome::Tab;

/// Apply timezone and locale overrides so they match the claimed market.
pub fn apply_stealth_settings(tab: &Tab, profile: &ClientProfile) -> anyhow::Result<()> {
    tab.call_method(SetTimezoneOverride {
        timezone_id: profile.timezone.clone(),
    })?;

    tab.call_method(SetLocaleOverride {
        locale: Some(profile.locale.clone()),
    })?;

    Ok(())
}
