use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Binance spot market data
pub mod binance;

/// A remote source of current trading-pair prices.
///
/// Implementations resolve absence structurally: a pair without a price is an
/// `Err` or a missing map key, never a numeric sentinel. Zero is a valid
/// present price.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Resolves the current price of a single trading pair.
    async fn price(&self, pair: &str) -> Result<Decimal>;

    /// Fetches every tradable pair in one request.
    ///
    /// On failure the mapping is empty and callers treat every lookup as
    /// absent.
    async fn all_prices(&self) -> HashMap<String, Decimal>;
}
