//! HTTP client for the Sortly inventory API.

use reqwest::blocking::{Client, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PartsheetError;
use crate::inventory::{InventoryApi, InventoryItem, ItemRef};

pub const API_BASE: &str = "https://api.sortly.co/api/v1";

pub struct SortlyClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ItemsPage {
    #[serde(default)]
    data: Vec<InventoryItem>,
}

#[derive(Serialize)]
struct PriceUpdate<'a> {
    name: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(rename = "type")]
    kind: &'a str,
}

impl SortlyClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        SortlyClient {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Turn a non-success status into an error carrying the response body.
    fn check(response: Response) -> Result<Response, PartsheetError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().unwrap_or_default();
        Err(PartsheetError::Inventory(format!("{status} from {url}: {body}")))
    }
}

impl InventoryApi for SortlyClient {
    fn list_items(&self, page: u32, per_page: u32) -> Result<Vec<InventoryItem>, PartsheetError> {
        let response = self
            .client
            .get(format!("{}/items", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .query(&[("per_page", per_page), ("page", page)])
            .send()?;
        let page: ItemsPage = Self::check(response)?.json()?;
        Ok(page.data)
    }

    fn update_price(&self, item: &ItemRef, price: Decimal) -> Result<(), PartsheetError> {
        let response = self
            .client
            .put(format!("{}/items/{}", self.base_url, item.id))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&PriceUpdate {
                name: &item.name,
                price,
                kind: "item",
            })
            .send()?;
        Self::check(response)?;
        Ok(())
    }
}
