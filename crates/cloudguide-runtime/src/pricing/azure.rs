//! Azure Retail Prices API adapter.
//!
//! Builds an OData filter from the query, follows `NextPageLink` for a
//! bounded number of pages and returns the first item with a positive,
//! finite retail price.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use cloudguide_core::{PricingQuery, PricingQuote, PricingResult};

use super::PricingProvider;
use crate::config::PricingConfig;

const API_VERSION: &str = "2023-01-01-beta";

#[derive(Debug)]
pub struct AzureRetailPricingProvider {
    base_url: String,
    max_pages: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RetailPage {
    #[serde(rename = "Items", default)]
    items: Vec<RetailItem>,

    #[serde(rename = "NextPageLink", default)]
    next_page_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetailItem {
    #[serde(default)]
    arm_region_name: String,
    #[serde(default)]
    service_name: String,
    #[serde(default)]
    sku_name: String,
    #[serde(default)]
    meter_name: String,
    #[serde(default)]
    unit_of_measure: String,
    #[serde(default)]
    retail_price: Option<f64>,
    #[serde(default)]
    unit_price: Option<f64>,
    #[serde(default)]
    currency_code: Option<String>,
    #[serde(default)]
    effective_start_date: String,
    #[serde(default)]
    product_name: String,
}

impl RetailItem {
    fn into_quote(self) -> Option<PricingQuote> {
        let retail_price = self.retail_price.filter(|p| p.is_finite() && *p > 0.0)?;
        Some(PricingQuote {
            provider: "azure".to_string(),
            service_name: self.service_name,
            region: self.arm_region_name,
            sku_name: self.sku_name,
            meter_name: self.meter_name,
            unit_of_measure: self.unit_of_measure,
            unit_price: self.unit_price.unwrap_or(f64::NAN),
            retail_price,
            currency_code: self.currency_code.unwrap_or_else(|| "USD".to_string()),
            effective_start_date: self.effective_start_date,
            product_name: self.product_name,
        })
    }
}

fn escape(value: &str) -> String {
    value.trim().replace('\'', "''")
}

/// OData filter for the query; blank fields are left out.
pub(crate) fn build_filter(query: &PricingQuery) -> String {
    let clauses: Vec<String> = [
        ("serviceName", &query.service_name),
        ("armRegionName", &query.region),
        ("type", &query.price_type),
        ("currencyCode", &query.currency_code),
    ]
    .iter()
    .filter(|(_, value)| !value.trim().is_empty())
    .map(|(field, value)| format!("{} eq '{}'", field, escape(value)))
    .chain(
        Some(&query.sku_contains)
            .filter(|sku| !sku.trim().is_empty())
            .map(|sku| format!("contains(skuName, '{}')", escape(sku))),
    )
    .collect();

    if clauses.is_empty() {
        "true".to_string()
    } else {
        clauses.join(" and ")
    }
}

impl AzureRetailPricingProvider {
    pub fn from_config(config: &PricingConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.azure_base_url.clone(),
            max_pages: config.max_pages.max(1),
            client,
        })
    }

    async fn fetch_page(&self, request: reqwest::RequestBuilder) -> Result<RetailPage, String> {
        let response = request
            .send()
            .await
            .map_err(|e| format!("Azure pricing error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Azure HTTP {}", status.as_u16()));
        }

        response
            .json::<RetailPage>()
            .await
            .map_err(|e| format!("Azure pricing error: {}", e))
    }

    async fn search(&self, query: &PricingQuery) -> Result<PricingResult, String> {
        let filter = build_filter(query);
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("api-version", API_VERSION), ("$filter", filter.as_str())]);

        for page_number in 1..=self.max_pages {
            let page = self.fetch_page(request).await?;
            let items_returned = page.items.len() as u32;

            if let Some(quote) = page.items.into_iter().find_map(RetailItem::into_quote) {
                tracing::debug!(page = page_number, items = items_returned, "Azure price found");
                return Ok(PricingResult::found(quote, items_returned));
            }

            match page.next_page_link.filter(|link| !link.trim().is_empty()) {
                Some(next) => request = self.client.get(next),
                None => break,
            }
        }

        Ok(PricingResult::not_found("No matching Azure retail price found"))
    }
}

#[async_trait]
impl PricingProvider for AzureRetailPricingProvider {
    fn supports(&self, provider_key: &str) -> bool {
        provider_key.eq_ignore_ascii_case("azure")
    }

    async fn fetch(&self, query: &PricingQuery) -> PricingResult {
        match self.search(query).await {
            Ok(result) => result,
            Err(note) => {
                tracing::warn!(note = %note, "Azure pricing lookup failed");
                PricingResult::not_found(note)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> AzureRetailPricingProvider {
        AzureRetailPricingProvider::from_config(&PricingConfig {
            azure_base_url: format!("{}/api/retail/prices", server.uri()),
            ..PricingConfig::default()
        })
        .unwrap()
    }

    fn item(sku: &str, retail_price: f64) -> serde_json::Value {
        json!({
            "armRegionName": "westus2",
            "serviceName": "Storage",
            "skuName": sku,
            "meterName": format!("{} Data Stored", sku),
            "unitOfMeasure": "1 GB/Month",
            "retailPrice": retail_price,
            "unitPrice": retail_price,
            "currencyCode": "USD",
            "effectiveStartDate": "2024-01-01T00:00:00Z",
            "productName": "General Block Blob v2"
        })
    }

    fn storage_query() -> PricingQuery {
        PricingQuery::new("azure", "Storage", "westus2", "Archive GRS")
    }

    #[test]
    fn test_filter_format() {
        assert_eq!(
            build_filter(&storage_query()),
            "serviceName eq 'Storage' and armRegionName eq 'westus2' and type eq 'Consumption' \
             and currencyCode eq 'USD' and contains(skuName, 'Archive GRS')"
        );
    }

    #[test]
    fn test_filter_escapes_quotes_and_skips_blanks() {
        let query = PricingQuery::new("azure", "O'Brien DB", "", " ");
        assert_eq!(
            build_filter(&query),
            "serviceName eq 'O''Brien DB' and type eq 'Consumption' and currencyCode eq 'USD'"
        );
    }

    #[test]
    fn test_supports_azure_only() {
        let provider = AzureRetailPricingProvider::from_config(&PricingConfig::default()).unwrap();
        assert!(provider.supports("azure"));
        assert!(provider.supports("Azure"));
        assert!(!provider.supports("aws"));
    }

    #[tokio::test]
    async fn test_first_positive_price_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .and(query_param("api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [item("Archive GRS", 0.0), item("Archive GRS", 0.0045), item("Archive GRS", 0.01)],
                "NextPageLink": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server).fetch(&storage_query()).await;
        let quote = result.quote.unwrap();
        assert_eq!(quote.retail_price, 0.0045);
        assert_eq!(quote.provider, "azure");
        assert_eq!(quote.unit_of_measure, "1 GB/Month");
        assert_eq!(result.items_returned, 3);
    }

    #[tokio::test]
    async fn test_follows_next_page_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [item("Archive GRS", 0.002)],
                "NextPageLink": null
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/retail/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [],
                "NextPageLink": format!("{}/page2", server.uri())
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server).fetch(&storage_query()).await;
        assert_eq!(result.quote.map(|q| q.retail_price), Some(0.002));
    }

    #[tokio::test]
    async fn test_no_match_note() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Items": []})))
            .mount(&server)
            .await;

        let result = provider(&server).fetch(&storage_query()).await;
        assert!(!result.has_quote());
        assert_eq!(
            result.note.as_deref(),
            Some("No matching Azure retail price found")
        );
    }

    #[tokio::test]
    async fn test_page_limit_respected() {
        let server = MockServer::start().await;
        let looping = format!("{}/api/retail/prices", server.uri());
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [],
                "NextPageLink": looping
            })))
            .expect(10)
            .mount(&server)
            .await;

        let result = provider(&server).fetch(&storage_query()).await;
        assert!(!result.has_quote());
    }

    #[tokio::test]
    async fn test_http_error_becomes_note() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = provider(&server).fetch(&storage_query()).await;
        assert!(!result.has_quote());
        assert_eq!(result.note.as_deref(), Some("Azure HTTP 503"));
    }
}
