use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, Proxy, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::{config::SETTINGS, logging::Logger};

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
///
/// Every request carries a bounded timeout so a hung call cannot stall the
/// scheduler. An outbound proxy is applied when one is configured; otherwise
/// requests go direct.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        let mut builder = Client::builder()
            .brotli(true)
            .gzip(true)
            .connect_timeout(Duration::from_secs(8))
            .timeout(Duration::from_secs(10))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        let proxy_url = SETTINGS.system.proxy.trim();
        if !proxy_url.is_empty() {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| anyhow!("Failed to configure proxy({}) because {:?}", proxy_url, e))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and returns the raw response.
///
/// The response status is not inspected here; callers that need to classify
/// non-success statuses do so themselves.
pub async fn get_response(url: &str, headers: Option<header::HeaderMap>) -> Result<Response> {
    send(Method::GET, url, headers, None::<fn(_) -> _>).await
}

/// Performs an HTTP GET request and deserializes the JSON response into the specified type.
pub async fn get_json<RES: DeserializeOwned>(
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<RES> {
    let res = get_response(url, headers).await?;
    let status = res.status();

    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(anyhow!("Request to {} returned {}: {}", url, status, body));
    }

    res.json::<RES>()
        .await
        .map_err(|e| anyhow!("Error parsing response JSON: {:?}", e))
}

/// Performs an HTTP POST request with JSON request and response, and specified headers.
pub async fn post_use_json<REQ, RES>(
    url: &str,
    headers: Option<header::HeaderMap>,
    req: Option<&REQ>,
) -> Result<RES>
where
    REQ: Serialize,
    RES: DeserializeOwned,
{
    send_use_json(Method::POST, url, headers, req).await
}

/// Performs an HTTP PATCH request with JSON request and response, and specified headers.
pub async fn patch_use_json<REQ, RES>(
    url: &str,
    headers: Option<header::HeaderMap>,
    req: Option<&REQ>,
) -> Result<RES>
where
    REQ: Serialize,
    RES: DeserializeOwned,
{
    send_use_json(Method::PATCH, url, headers, req).await
}

async fn send_use_json<REQ, RES>(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    req: Option<&REQ>,
) -> Result<RES>
where
    REQ: Serialize,
    RES: DeserializeOwned,
{
    let res = send(
        method,
        url,
        headers,
        Some(|rb: RequestBuilder| {
            if let Some(r) = req {
                rb.json(r)
            } else {
                rb
            }
        }),
    )
    .await?;

    let status = res.status();
    let res_body = res
        .text()
        .await
        .map_err(|e| anyhow!("Error reading response body: {}", e))?;

    if !status.is_success() {
        return Err(anyhow!(
            "Request to {} returned {}: {}",
            url,
            status,
            res_body
        ));
    }

    serde_json::from_str(&res_body)
        .map_err(|e| anyhow!("Error parsing response JSON({}): {:?}", &res_body, e))
}

/// Sends an HTTP request using the specified method, URL, headers, and body.
///
/// Transport errors surface to the caller unchanged; retry policy belongs to
/// the call sites that know how to classify their upstream's failures.
async fn send(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    body: Option<impl FnOnce(RequestBuilder) -> RequestBuilder>,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let mut rb = client.request(method, url);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    if let Some(body_fn) = body {
        rb = body_fn(rb);
    }

    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            LOGGER.info(format!("{} {} ms", visit_log, elapsed));
            Ok(response)
        }
        Err(why) => {
            LOGGER.error(format!(
                "{} failed because {:?}. {} ms",
                visit_log, why, elapsed
            ));
            Err(anyhow!("Failed to send request to {} because {:?}", url, why))
        }
    }
}
