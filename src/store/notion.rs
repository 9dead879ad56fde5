use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    store::{RecordStore, TickerRecord},
    util::http,
};

pub const HOST: &str = "api.notion.com";

const NOTION_VERSION: &str = "2022-06-28";

/// Upper bound the store accepts per query page; larger collections are
/// followed cursor by cursor.
const PAGE_SIZE: usize = 100;

/// The text property holding the ticker symbol.
const SYMBOL_PROPERTY: &str = "Ticker";

/// Notion database client.
///
/// Wraps the two calls the synchronization needs: enumerating the rows of one
/// database and patching the price number property on one page.
pub struct Notion {
    base_url: String,
    token: String,
    database_id: String,
}

impl Notion {
    pub fn new(token: &str, database_id: &str) -> Self {
        Notion {
            base_url: format!("https://{}", HOST),
            token: token.to_string(),
            database_id: database_id.to_string(),
        }
    }

    fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        let bearer = format!("Bearer {}", self.token);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&bearer)?);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        Ok(headers)
    }
}

#[derive(Serialize)]
struct QueryDatabaseRequest<'a> {
    page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct QueryDatabaseResponse {
    #[serde(default)]
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Page {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Property>,
}

#[derive(Deserialize, Debug, Default)]
struct Property {
    #[serde(default)]
    rich_text: Option<Vec<TextFragment>>,
    #[serde(default)]
    title: Option<Vec<TextFragment>>,
}

#[derive(Deserialize, Debug)]
struct TextFragment {
    #[serde(default)]
    plain_text: String,
}

impl Property {
    fn plain_text(&self) -> Option<String> {
        let fragments = self.rich_text.as_ref().or(self.title.as_ref())?;

        fragments.first().map(|f| f.plain_text.clone())
    }
}

impl Page {
    fn into_record(self) -> TickerRecord {
        let symbol = self
            .properties
            .get(SYMBOL_PROPERTY)
            .and_then(|p| p.plain_text());

        TickerRecord::new(self.id, symbol)
    }
}

#[derive(Serialize)]
struct UpdatePageRequest {
    properties: PriceProperties,
}

#[derive(Serialize)]
struct PriceProperties {
    #[serde(rename = "Current Price")]
    current_price: NumberProperty,
}

#[derive(Serialize)]
struct NumberProperty {
    #[serde(with = "rust_decimal::serde::float")]
    number: Decimal,
}

impl UpdatePageRequest {
    fn new(price: Decimal) -> Self {
        UpdatePageRequest {
            properties: PriceProperties {
                current_price: NumberProperty { number: price },
            },
        }
    }
}

#[derive(Deserialize)]
struct UpdatePageResponse {
    #[serde(default)]
    #[allow(dead_code)]
    id: String,
}

#[async_trait]
impl RecordStore for Notion {
    async fn list_records(&self) -> Result<Vec<TickerRecord>> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let req = QueryDatabaseRequest {
                page_size: PAGE_SIZE,
                start_cursor: cursor.as_deref(),
            };
            let res: QueryDatabaseResponse =
                http::post_use_json(&url, Some(self.build_headers()?), Some(&req))
                    .await
                    .map_err(|why| {
                        anyhow!(
                            "Failed to query database({}) because {:?}",
                            self.database_id,
                            why
                        )
                    })?;

            records.extend(res.results.into_iter().map(Page::into_record));

            if !res.has_more {
                break;
            }

            match res.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    async fn write_price(&self, record_id: &str, price: Decimal) -> Result<()> {
        let url = format!("{}/v1/pages/{}", self.base_url, record_id);
        let req = UpdatePageRequest::new(price);

        http::patch_use_json::<UpdatePageRequest, UpdatePageResponse>(
            &url,
            Some(self.build_headers()?),
            Some(&req),
        )
        .await
        .map(|_| ())
        .map_err(|why| anyhow!("Failed to update page({}) because {:?}", record_id, why))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::Path, routing::patch, routing::post, Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn stub_client(base_url: String) -> Notion {
        Notion {
            base_url,
            token: "secret".to_string(),
            database_id: "test-db".to_string(),
        }
    }

    #[test]
    fn test_page_into_record() {
        let res: QueryDatabaseResponse = serde_json::from_str(
            r#"{
                "results": [
                    {"id": "page-1", "properties": {"Ticker": {"rich_text": [{"plain_text": "BTC"}]}}},
                    {"id": "page-2", "properties": {"Ticker": {"title": [{"plain_text": "eth"}]}}},
                    {"id": "page-3", "properties": {"Ticker": {"rich_text": []}}},
                    {"id": "page-4", "properties": {}}
                ],
                "has_more": false,
                "next_cursor": null
            }"#,
        )
        .unwrap();

        let records: Vec<TickerRecord> = res.results.into_iter().map(Page::into_record).collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].symbol.as_deref(), Some("BTC"));
        assert_eq!(records[1].symbol.as_deref(), Some("eth"));
        assert_eq!(records[2].symbol, None);
        assert_eq!(records[3].symbol, None);
    }

    #[test]
    fn test_update_request_serializes_price_as_number() {
        let req = UpdatePageRequest::new(dec!(3200.12));
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["properties"]["Current Price"]["number"], json!(3200.12));
    }

    #[tokio::test]
    async fn test_list_records_follows_pagination() {
        let cursors = Arc::new(Mutex::new(Vec::<Option<String>>::new()));
        let recorded = cursors.clone();
        let router = Router::new().route(
            "/v1/databases/test-db/query",
            post(move |Json(body): Json<serde_json::Value>| {
                let recorded = recorded.clone();
                async move {
                    let cursor = body
                        .get("start_cursor")
                        .and_then(|v| v.as_str())
                        .map(String::from);
                    let first = cursor.is_none();
                    recorded.lock().unwrap().push(cursor);

                    if first {
                        Json(json!({
                            "results": [
                                {"id": "page-1", "properties": {"Ticker": {"rich_text": [{"plain_text": "BTC"}]}}}
                            ],
                            "has_more": true,
                            "next_cursor": "cursor-2"
                        }))
                    } else {
                        Json(json!({
                            "results": [
                                {"id": "page-2", "properties": {"Ticker": {"rich_text": [{"plain_text": "ETH"}]}}}
                            ],
                            "has_more": false,
                            "next_cursor": null
                        }))
                    }
                }
            }),
        );
        let client = stub_client(spawn_stub(router).await);

        let records = client.list_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "page-1");
        assert_eq!(records[1].id, "page-2");

        let cursors = cursors.lock().unwrap();
        assert_eq!(*cursors, vec![None, Some("cursor-2".to_string())]);
    }

    #[tokio::test]
    async fn test_write_price_patches_number_property() {
        let writes = Arc::new(Mutex::new(Vec::<(String, serde_json::Value)>::new()));
        let recorded = writes.clone();
        let router = Router::new().route(
            "/v1/pages/{page_id}",
            patch(
                move |Path(page_id): Path<String>, Json(body): Json<serde_json::Value>| {
                    let recorded = recorded.clone();
                    async move {
                        let number = body["properties"]["Current Price"]["number"].clone();
                        recorded.lock().unwrap().push((page_id.clone(), number));

                        Json(json!({"id": page_id}))
                    }
                },
            ),
        );
        let client = stub_client(spawn_stub(router).await);

        client.write_price("page-9", dec!(67000.5)).await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(*writes, vec![("page-9".to_string(), json!(67000.5))]);
    }
}
