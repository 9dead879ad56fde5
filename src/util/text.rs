use std::str::FromStr;

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;

const NUMBER_ESCAPE_CHAR: &[char] = &[',', ' ', '"', '\r', '\n'];

/// Parses a text-decimal value, dropping thousand separators and stray whitespace.
///
/// `additional` lists extra characters to strip before parsing, e.g. wrapping
/// parentheses.
pub fn parse_decimal(text: &str, additional: Option<Vec<char>>) -> Result<Decimal> {
    let mut cleaned = text.replace(NUMBER_ESCAPE_CHAR, "");

    if let Some(chars) = additional {
        cleaned = cleaned.replace(&chars[..], "");
    }

    if cleaned.is_empty() {
        return Err(anyhow!("Failed to parse_decimal because the text is empty"));
    }

    Decimal::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse_decimal({}) because {:?}", text, why))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("67000.50000000", None).unwrap(), dec!(67000.5));
        assert_eq!(parse_decimal("1,234.56", None).unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal(" 0.00000000 ", None).unwrap(), dec!(0));
        assert_eq!(
            parse_decimal("(3200.12)", Some(vec!['(', ')'])).unwrap(),
            dec!(3200.12)
        );
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal("", None).is_err());
        assert!(parse_decimal("n/a", None).is_err());
    }
}
