use concat_string::concat_string;

/// Quote currency every trading pair ends with.
pub const QUOTE_CURRENCY: &str = "USDT";

/// How prices are resolved within one pass.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum FetchMode {
    /// One quote request per record.
    PerSymbol,
    /// One all-pairs request per pass, looked up locally afterwards.
    Bulk,
}

/// How the process is scheduled.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum RunMode {
    /// Run exactly one pass, then terminate (CI execution).
    OneShot,
    /// Run a pass, sleep, repeat until the process is killed.
    Continuous,
}

/// Builds the trading-pair query string the price source expects.
///
/// The symbol must already be normalized (trimmed, uppercase).
pub fn trading_pair(symbol: &str) -> String {
    concat_string!(symbol, QUOTE_CURRENCY)
}
