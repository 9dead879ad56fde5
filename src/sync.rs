use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::time;

use crate::{
    crawler::PriceSource,
    declare::{self, FetchMode},
    logging,
    store::RecordStore,
};

/// Outcome counts of one pass; created fresh each pass, never persisted.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PassSummary {
    /// Records whose price was written back.
    pub updated: usize,
    /// Records with a symbol but no resolvable price, or whose write failed.
    pub failed: usize,
    /// Records without a usable symbol; no fetch or write is attempted.
    pub skipped: usize,
}

/// Runs one synchronization pass: store → symbols → price source → store.
pub struct SyncDriver<'a> {
    store: &'a dyn RecordStore,
    source: &'a dyn PriceSource,
    fetch_mode: FetchMode,
    /// Pause between per-symbol quote requests, to stay under the price
    /// source's rate limit.
    request_delay: Duration,
}

impl<'a> SyncDriver<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        source: &'a dyn PriceSource,
        fetch_mode: FetchMode,
        request_delay: Duration,
    ) -> Self {
        SyncDriver {
            store,
            source,
            fetch_mode,
            request_delay,
        }
    }

    /// Processes every record sequentially and returns the pass counts.
    ///
    /// Only the enumeration call can fail the pass as a whole; everything
    /// after it is caught per record and reflected in the summary.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let records = self
            .store
            .list_records()
            .await
            .context("Failed to list records from the store")?;

        // In bulk mode the whole snapshot is fetched once, before any record.
        let bulk_snapshot = match self.fetch_mode {
            FetchMode::Bulk => Some(self.source.all_prices().await),
            FetchMode::PerSymbol => None,
        };

        let mut summary = PassSummary::default();

        for record in &records {
            let symbol = match record.normalized_symbol() {
                Some(symbol) => symbol,
                None => {
                    summary.skipped += 1;
                    logging::info_file_async(format!(
                        "Record {} has no ticker, skipping",
                        record.id
                    ));
                    continue;
                }
            };

            let pair = declare::trading_pair(&symbol);

            // Presence is the lookup/fetch succeeding, never the numeric value;
            // a price of zero is valid.
            let price = match bulk_snapshot.as_ref() {
                Some(snapshot) => snapshot
                    .get(&pair)
                    .copied()
                    .ok_or_else(|| anyhow!("{} is missing from the bulk price snapshot", pair)),
                None => self.source.price(&pair).await,
            };

            match price {
                Ok(price) => match self.store.write_price(&record.id, price).await {
                    Ok(()) => {
                        summary.updated += 1;
                        logging::info_file_async(format!(
                            "Updated {} ({}) with price {}",
                            symbol, pair, price
                        ));
                    }
                    Err(why) => {
                        summary.failed += 1;
                        logging::error_file_async(format!(
                            "Failed to write price for {} because {:?}",
                            symbol, why
                        ));
                    }
                },
                Err(why) => {
                    summary.failed += 1;
                    logging::error_file_async(format!(
                        "No price for {} ({}) because {:?}",
                        symbol, pair, why
                    ));
                }
            }

            if self.fetch_mode == FetchMode::PerSymbol && !self.request_delay.is_zero() {
                time::sleep(self.request_delay).await;
            }
        }

        Ok(summary)
    }
}
