pub mod config;
pub mod crawler;
pub mod declare;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod util;

use std::time::Duration;

use anyhow::Result;

use crate::{config::SETTINGS, crawler::binance::Binance, store::notion::Notion, sync::SyncDriver};

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Missing credentials abort here, before any pass runs.
    if let Err(why) = SETTINGS.ensure_required() {
        logging::error_console(format!("Failed to start because {:?}", why));
        return Err(why);
    }

    let store = Notion::new(&SETTINGS.notion.token, &SETTINGS.notion.database_id);
    let source = Binance::new();
    let driver = SyncDriver::new(
        &store,
        &source,
        SETTINGS.fetch_mode(),
        Duration::from_millis(SETTINGS.system.request_delay_ms),
    );

    scheduler::start(
        &driver,
        SETTINGS.run_mode(),
        Duration::from_secs(SETTINGS.system.interval_secs),
        Duration::from_secs(SETTINGS.system.jitter_secs),
    )
    .await
}
