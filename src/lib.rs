//! Auto-parts listing extraction from storefronts that expose no public API.
//!
//! A dispatcher routes each search to a per-site adapter. Adapters drive a
//! shared headless Chrome through isolated sessions, resolve page elements
//! via ordered selector fallback chains, and normalize whatever rows they
//! find into [`listing::Listing`] records. When nothing usable comes back a
//! single clearly-marked diagnostic listing is returned instead.

pub mod api;
pub mod config;
pub mod degrade;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod listing;
pub mod normalize;
pub mod selector;
pub mod sources;
pub mod stealth;

pub use dispatcher::Dispatcher;
pub use error::{Result, RowError, ScrapeError};
pub use listing::{Availability, Listing};
pub use sources::{SiteAdapter, SourceId};
