use partsheet_core::error::PartsheetError;
use partsheet_core::inventory::rate_limit::RateLimiter;
use partsheet_core::inventory::sortly::SortlyClient;
use partsheet_core::inventory::{sync_prices, PriceSyncConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::output;

/// Command-line overrides of the price sync defaults.
pub struct Settings {
    pub cache: PathBuf,
    pub cache_lifetime: u64,
    pub skip_rows: u32,
    pub api_base: String,
}

pub fn run(
    sheet: &Path,
    token: &str,
    settings: Settings,
    output_format: &str,
) -> Result<(), PartsheetError> {
    let sheet_bytes = std::fs::read(sheet)?;
    let config = PriceSyncConfig {
        cache_path: settings.cache,
        cache_lifetime: Duration::from_secs(settings.cache_lifetime),
        skip_rows: settings.skip_rows,
        ..PriceSyncConfig::default()
    };

    let client = SortlyClient::with_base_url(token, settings.api_base);
    let mut limiter = RateLimiter::default();
    let report = sync_prices(&client, &mut limiter, &sheet_bytes, &config)?;

    match output_format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => output::table::print_price_report(&report),
    }
    Ok(())
}
