use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_derive::Deserialize;
use tokio::time;

use crate::{
    crawler::PriceSource,
    logging,
    util::{self, text},
};

pub const HOST: &str = "api.binance.com";

/// Attempts per pair, the first try included.
const RETRY_CEILING: usize = 3;

/// The delay before attempt n+1 is n × this unit.
const BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Binance spot market-data client.
#[derive(Debug, Clone)]
pub struct Binance {
    base_url: String,
    backoff_unit: Duration,
}

/// Binance returns the price as a text decimal.
#[derive(Deserialize, Debug, Clone)]
struct TickerPrice {
    symbol: String,
    price: String,
}

impl Default for Binance {
    fn default() -> Self {
        Binance {
            base_url: format!("https://{}", HOST),
            backoff_unit: BACKOFF_UNIT,
        }
    }
}

impl Binance {
    pub fn new() -> Self {
        Default::default()
    }

    /// Fetches the raw ticker for one pair, retrying retryable failures.
    ///
    /// A 4xx other than 429 means the pair is presumed invalid and is never
    /// retried. 429 is logged as a rate-limit signal but retried like a 5xx.
    /// Transport failures and malformed payloads retry up to the ceiling.
    async fn fetch_ticker(&self, pair: &str) -> Result<TickerPrice> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, pair);
        let mut last_error = anyhow!("no attempt was made");

        for attempt in 1..=RETRY_CEILING {
            match util::http::get_response(&url, None).await {
                Ok(res) => {
                    let status = res.status();

                    if status.is_success() {
                        match res.json::<TickerPrice>().await {
                            Ok(ticker) => return Ok(ticker),
                            Err(why) => {
                                logging::error_file_async(format!(
                                    "Failed to parse ticker JSON for {} on attempt {} because {:?}",
                                    pair, attempt, why
                                ));
                                last_error =
                                    anyhow!("Error parsing ticker JSON for {}: {:?}", pair, why);
                            }
                        }
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        let body = res.text().await.unwrap_or_default();
                        logging::error_file_async(format!(
                            "Binance rate limit hit (429) for {} on attempt {}: {}",
                            pair, attempt, body
                        ));
                        last_error = anyhow!("Binance rate limit hit (429) for {}: {}", pair, body);
                    } else if status.is_client_error() {
                        let body = res.text().await.unwrap_or_default();
                        return Err(anyhow!(
                            "Binance rejected {} with {}: {}",
                            pair,
                            status,
                            body
                        ));
                    } else {
                        let body = res.text().await.unwrap_or_default();
                        logging::error_file_async(format!(
                            "Binance returned {} for {} on attempt {}: {}",
                            status, pair, attempt, body
                        ));
                        last_error = anyhow!("Binance returned {} for {}: {}", status, pair, body);
                    }
                }
                Err(why) => {
                    logging::error_file_async(format!(
                        "Failed to request {} on attempt {} because {:?}",
                        url, attempt, why
                    ));
                    last_error = why;
                }
            }

            if attempt < RETRY_CEILING {
                time::sleep(self.backoff_unit * attempt as u32).await;
            }
        }

        Err(anyhow!(
            "Failed to fetch {} after {} attempts; last error: {:?}",
            pair,
            RETRY_CEILING,
            last_error
        ))
    }
}

#[async_trait]
impl PriceSource for Binance {
    async fn price(&self, pair: &str) -> Result<Decimal> {
        let ticker = self.fetch_ticker(pair).await?;
        let price = text::parse_decimal(&ticker.price, None)
            .map_err(|why| anyhow!("Binance price for {} is not numeric: {:?}", pair, why))?;

        Ok(price.normalize())
    }

    async fn all_prices(&self) -> HashMap<String, Decimal> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        let tickers = match util::http::get_json::<Vec<TickerPrice>>(&url, None).await {
            Ok(tickers) => tickers,
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to fetch the bulk price snapshot because {:?}",
                    why
                ));
                return HashMap::new();
            }
        };

        let mut prices = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            match text::parse_decimal(&ticker.price, None) {
                Ok(price) => {
                    prices.insert(ticker.symbol, price.normalize());
                }
                Err(why) => {
                    logging::debug_file_async(format!(
                        "Dropping {} from the snapshot because {:?}",
                        ticker.symbol, why
                    ));
                }
            }
        }

        prices
    }
}
