use std::{env, time::Duration};

use anyhow::Result;
use rand::Rng;
use tokio::time;

use crate::{declare::RunMode, logging, sync::SyncDriver};

/// Runs the sync driver under the given run mode.
///
/// One-shot executes a single pass and propagates a pass-level error so the
/// process can exit non-zero. Continuous mode never returns: each pass is
/// rearmed from its own completion time, so passes cannot overlap even when
/// one runs longer than the nominal interval.
pub async fn start(
    driver: &SyncDriver<'_>,
    run_mode: RunMode,
    interval: Duration,
    jitter: Duration,
) -> Result<()> {
    logging::info_file_async(format!(
        "TickerSync started\r\nRust OS/Arch: {}/{}\r\n",
        env::consts::OS,
        env::consts::ARCH
    ));

    match run_mode {
        RunMode::OneShot => run_once(driver).await,
        RunMode::Continuous => run_forever(driver, interval, jitter).await,
    }
}

async fn run_once(driver: &SyncDriver<'_>) -> Result<()> {
    let summary = driver.run_pass().await?;
    logging::info_file_async(format!("Pass finished: {:?}", summary));

    Ok(())
}

async fn run_forever(
    driver: &SyncDriver<'_>,
    interval: Duration,
    jitter: Duration,
) -> Result<()> {
    loop {
        // A failed pass is logged and the next one is armed regardless.
        match driver.run_pass().await {
            Ok(summary) => logging::info_file_async(format!("Pass finished: {:?}", summary)),
            Err(why) => logging::error_file_async(format!("Failed to run pass because {:?}", why)),
        }

        time::sleep(next_delay(interval, jitter)).await;
    }
}

/// Interval plus a random 0..=jitter offset, to desynchronize overlapping
/// deployments.
fn next_delay(interval: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return interval;
    }

    let offset = rand::rng().random_range(0..=jitter.as_millis() as u64);

    interval + Duration::from_millis(offset)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::{
        crawler::PriceSource,
        declare::FetchMode,
        store::{RecordStore, TickerRecord},
    };

    use super::*;

    #[derive(Default)]
    struct CountingStore {
        listings: AtomicUsize,
        fail_listing: bool,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn list_records(&self) -> Result<Vec<TickerRecord>> {
            self.listings.fetch_add(1, Ordering::SeqCst);

            if self.fail_listing {
                return Err(anyhow!("store is down"));
            }

            Ok(Vec::new())
        }

        async fn write_price(&self, _record_id: &str, _price: Decimal) -> Result<()> {
            Ok(())
        }
    }

    struct EmptySource;

    #[async_trait]
    impl PriceSource for EmptySource {
        async fn price(&self, pair: &str) -> Result<Decimal> {
            Err(anyhow!("unknown pair {}", pair))
        }

        async fn all_prices(&self) -> HashMap<String, Decimal> {
            HashMap::new()
        }
    }

    #[tokio::test]
    async fn test_one_shot_runs_exactly_one_pass() {
        let store = CountingStore::default();
        let source = EmptySource;
        let driver = SyncDriver::new(&store, &source, FetchMode::PerSymbol, Duration::ZERO);

        start(&driver, RunMode::OneShot, Duration::ZERO, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(store.listings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_shot_propagates_a_pass_level_error() {
        let store = CountingStore {
            fail_listing: true,
            ..Default::default()
        };
        let source = EmptySource;
        let driver = SyncDriver::new(&store, &source, FetchMode::PerSymbol, Duration::ZERO);

        let result = start(&driver, RunMode::OneShot, Duration::ZERO, Duration::ZERO).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_next_delay_stays_within_the_jitter_window() {
        let interval = Duration::from_secs(300);
        let jitter = Duration::from_secs(30);

        for _ in 0..100 {
            let delay = next_delay(interval, jitter);
            assert!(delay >= interval);
            assert!(delay <= interval + jitter);
        }

        assert_eq!(next_delay(interval, Duration::ZERO), interval);
    }
}
