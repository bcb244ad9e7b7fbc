//! Environment-driven settings. `.env` is loaded by the binaries before this runs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,
    pub headless: bool,
    /// Explicit Chrome binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,
    /// The shared browser must survive quiet periods between requests
    pub browser_idle_timeout: Duration,
    pub search: SearchTuning,
}

/// Knobs applied to every adapter search.
#[derive(Debug, Clone, Copy)]
pub struct SearchTuning {
    /// Wall-clock budget for the page work of one `search()` call
    pub budget: Duration,
    /// Randomized human pacing between steps. Off in tests and probes.
    pub human_delays: bool,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(90),
            human_delays: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            headless: true,
            chrome_path: None,
            browser_idle_timeout: Duration::from_secs(3600),
            search: SearchTuning::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or unparsable keys keep their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        Settings {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parsed(&var, "PORT").unwrap_or(defaults.port),
            headless: flag(&var, "HEADLESS").unwrap_or(defaults.headless),
            chrome_path: var("CHROME_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            browser_idle_timeout: parsed(&var, "BROWSER_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.browser_idle_timeout),
            search: SearchTuning {
                budget: parsed(&var, "SEARCH_BUDGET_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.search.budget),
                human_delays: flag(&var, "HUMAN_DELAYS").unwrap_or(defaults.search.human_delays),
            },
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}

fn flag(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    match var(key)?.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
