//! One-shot search against a single source, for checking selectors by hand.
//!
//! Usage: `probe <emex|rulim|spartex> <query...>`

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use parts_crawler::config::Settings;
use parts_crawler::driver::chrome::ChromeLauncher;
use parts_crawler::sources::{adapter_for, SourceId};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let source: SourceId = args
        .next()
        .context("usage: probe <emex|rulim|spartex> <query...>")?
        .parse()?;
    let query = args.collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        bail!("query is empty");
    }

    let mut settings = Settings::from_env();
    settings.search.human_delays = false;

    let adapter = adapter_for(
        source,
        Arc::new(ChromeLauncher::from_settings(&settings)),
        settings.search,
    );
    // No shared handle: the adapter launches and owns its own browser
    adapter.init(None).await?;
    let outcome = adapter.search(&query).await;
    adapter.close().await;

    let listings = outcome?;
    println!("{}", serde_json::to_string_pretty(&listings)?);
    Ok(())
}
