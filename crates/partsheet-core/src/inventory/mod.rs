//! Price sync: push prices from an exported price list to the inventory
//! system, matching items by stock number.

pub mod cache;
pub mod rate_limit;
pub mod sheet;
pub mod sortly;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PartsheetError;
use rate_limit::{Clock, RateLimiter};
use sheet::PriceRow;

/// Items per page when listing the inventory.
pub const PAGE_SIZE: u32 = 100;

/// An inventory record as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// The item a stock number resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: i64,
    pub name: String,
}

/// Stock number to item.
pub type StockMap = BTreeMap<String, ItemRef>;

/// Inventory operations used by the price sync.
pub trait InventoryApi {
    /// One page of items, 1-based. An empty page ends the listing.
    fn list_items(&self, page: u32, per_page: u32) -> Result<Vec<InventoryItem>, PartsheetError>;

    /// Set the price of an item, resending its name unchanged.
    fn update_price(&self, item: &ItemRef, price: Decimal) -> Result<(), PartsheetError>;
}

/// Trim and drop the `.0` left over from spreadsheet floats.
pub fn normalize_stock_number(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// The stock number an item name starts with.
pub fn stock_number_of(name: &str) -> Option<String> {
    name.split_whitespace().next().map(normalize_stock_number)
}

/// Result of listing the whole inventory.
#[derive(Debug, Default)]
pub struct StockMapBuild {
    pub map: StockMap,
    /// Items without a name; they cannot be matched.
    pub unnamed: usize,
}

/// Add one page of items to the map. Only records of type `item` count;
/// later items win on duplicate stock numbers.
pub fn add_items(build: &mut StockMapBuild, items: Vec<InventoryItem>) {
    for item in items {
        if item.kind.as_deref() != Some("item") {
            continue;
        }
        let name = item.name.unwrap_or_default();
        match stock_number_of(&name) {
            Some(stock) => {
                build.map.insert(stock, ItemRef { id: item.id, name });
            }
            None => build.unnamed += 1,
        }
    }
}

/// Page through the whole inventory and map stock numbers to items.
pub fn fetch_stock_map<C: Clock>(
    api: &dyn InventoryApi,
    limiter: &mut RateLimiter<C>,
    per_page: u32,
) -> Result<StockMapBuild, PartsheetError> {
    let mut build = StockMapBuild::default();
    let mut page = 1;
    loop {
        limiter.wait_if_needed();
        let result = api.list_items(page, per_page);
        limiter.record_request();
        let items = result?;
        if items.is_empty() {
            break;
        }
        add_items(&mut build, items);
        info!(page, mapped = build.map.len(), "fetched inventory page");
        page += 1;
    }
    if build.unnamed > 0 {
        warn!(count = build.unnamed, "inventory items without a name were skipped");
    }
    Ok(build)
}

/// Settings for a price sync run.
#[derive(Debug, Clone)]
pub struct PriceSyncConfig {
    pub cache_path: PathBuf,
    pub cache_lifetime: Duration,
    pub skip_rows: u32,
    pub per_page: u32,
}

impl Default for PriceSyncConfig {
    fn default() -> Self {
        PriceSyncConfig {
            cache_path: PathBuf::from(cache::CACHE_FILE_NAME),
            cache_lifetime: cache::CACHE_LIFETIME,
            skip_rows: sheet::SKIP_ROWS,
            per_page: PAGE_SIZE,
        }
    }
}

/// Use the cached stock map when it is fresh, otherwise fetch and re-cache.
pub fn load_or_fetch_stock_map<C: Clock>(
    api: &dyn InventoryApi,
    limiter: &mut RateLimiter<C>,
    config: &PriceSyncConfig,
) -> Result<StockMap, PartsheetError> {
    if let Some(map) = cache::load_fresh(&config.cache_path, config.cache_lifetime) {
        info!(path = %config.cache_path.display(), items = map.len(), "loaded stock map from cache");
        return Ok(map);
    }

    info!("stock map cache is old or missing, fetching from the inventory API");
    let build = fetch_stock_map(api, limiter, config.per_page)?;
    if build.map.is_empty() {
        return Err(PartsheetError::EmptyItemMap);
    }
    cache::save(&config.cache_path, &build.map)?;
    info!(path = %config.cache_path.display(), "saved stock map cache");
    Ok(build.map)
}

/// Outcome of a price sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceUpdateReport {
    pub successful: usize,
    pub failed: usize,
    /// Stock numbers from the sheet with no matching item.
    pub not_found: Vec<String>,
}

/// Push every row's price to its item. Failed updates are counted, not fatal.
pub fn run_price_update<C: Clock>(
    api: &dyn InventoryApi,
    limiter: &mut RateLimiter<C>,
    rows: &[PriceRow],
    map: &StockMap,
) -> PriceUpdateReport {
    let mut report = PriceUpdateReport::default();

    for row in rows {
        let Some(item) = map.get(&row.stock_number) else {
            warn!(stock = %row.stock_number, "stock number not found in inventory");
            report.not_found.push(row.stock_number.clone());
            continue;
        };

        limiter.wait_if_needed();
        let result = api.update_price(item, row.price);
        limiter.record_request();
        match result {
            Ok(()) => {
                info!(id = item.id, name = %item.name, price = %row.price, "updated price");
                report.successful += 1;
            }
            Err(e) => {
                warn!(id = item.id, name = %item.name, "price update failed: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        successful = report.successful,
        failed = report.failed,
        not_found = report.not_found.len(),
        "price update complete"
    );
    report
}

/// Full run: stock map, price sheet, updates.
pub fn sync_prices<C: Clock>(
    api: &dyn InventoryApi,
    limiter: &mut RateLimiter<C>,
    sheet_bytes: &[u8],
    config: &PriceSyncConfig,
) -> Result<PriceUpdateReport, PartsheetError> {
    let map = load_or_fetch_stock_map(api, limiter, config)?;
    let rows = sheet::read_price_sheet(sheet_bytes, config.skip_rows)?;
    Ok(run_price_update(api, limiter, &rows, &map))
}
