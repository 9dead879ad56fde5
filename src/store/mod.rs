use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Notion database backend
pub mod notion;

/// One row of the target collection.
#[derive(Debug, Clone)]
pub struct TickerRecord {
    /// Opaque record key used for write-back.
    pub id: String,
    /// Raw symbol text as stored; may be absent or blank.
    pub symbol: Option<String>,
}

impl TickerRecord {
    pub fn new(id: String, symbol: Option<String>) -> Self {
        TickerRecord { id, symbol }
    }

    /// Trimmed, uppercased symbol; blank normalizes to `None`.
    ///
    /// A record that resolves to `None` here is never written to.
    pub fn normalized_symbol(&self) -> Option<String> {
        let symbol = self.symbol.as_deref()?.trim();

        if symbol.is_empty() {
            return None;
        }

        Some(symbol.to_uppercase())
    }
}

/// The collection of records being synchronized.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Full enumeration of the target collection, following pagination to completion.
    async fn list_records(&self) -> Result<Vec<TickerRecord>>;

    /// Sets the numeric price field on one record.
    async fn write_price(&self, record_id: &str, price: Decimal) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_symbol() {
        let record = TickerRecord::new("a".to_string(), Some(" eth ".to_string()));
        assert_eq!(record.normalized_symbol(), Some("ETH".to_string()));

        let record = TickerRecord::new("b".to_string(), Some("BTC".to_string()));
        assert_eq!(record.normalized_symbol(), Some("BTC".to_string()));
    }

    #[test]
    fn test_normalized_symbol_absent_or_blank() {
        let record = TickerRecord::new("a".to_string(), None);
        assert_eq!(record.normalized_symbol(), None);

        let record = TickerRecord::new("b".to_string(), Some(String::new()));
        assert_eq!(record.normalized_symbol(), None);

        let record = TickerRecord::new("c".to_string(), Some("   ".to_string()));
        assert_eq!(record.normalized_symbol(), None);
    }
}
