use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_ASSET_LEN: usize = 12;

/// Normalized instrument symbol in `BASE-QUOTE` form, e.g. `XBT-USD`.
///
/// Parsing accepts `/` as separator too, so `XBT/USD` and `xbt-usd` both
/// normalize to `XBT-USD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_ascii_uppercase().replace('/', "-");
        let Some((base, quote)) = normalized.split_once('-') else {
            return Err(ValidationError::SymbolMissingQuote {
                value: trimmed.to_owned(),
            });
        };

        Asset::parse(base).map_err(|_| ValidationError::SymbolMissingQuote {
            value: trimmed.to_owned(),
        })?;
        if quote.is_empty() {
            return Err(ValidationError::SymbolMissingQuote {
                value: trimmed.to_owned(),
            });
        }
        for (offset, ch) in quote.chars().enumerate() {
            if !ch.is_ascii_alphanumeric() {
                return Err(ValidationError::SymbolInvalidChar {
                    ch,
                    index: base.len() + 1 + offset,
                });
            }
        }

        Ok(Self(normalized))
    }

    pub fn from_assets(base: &Asset, quote: &Asset) -> Self {
        Self(format!("{base}-{quote}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split_once('-').map_or(self.as_str(), |(base, _)| base)
    }

    pub fn quote(&self) -> &str {
        self.0.split_once('-').map_or("", |(_, quote)| quote)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

/// Normalized asset code, e.g. `XBT` or `USD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset(String);

impl Asset {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAsset);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let valid = normalized.len() <= MAX_ASSET_LEN
            && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !valid {
            return Err(ValidationError::InvalidAsset {
                value: trimmed.to_owned(),
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Asset {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Asset> for String {
    fn from(value: Asset) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_slash_symbol() {
        let parsed = Symbol::parse(" xbt/usd ").expect("symbol should parse");
        assert_eq!(parsed.as_str(), "XBT-USD");
        assert_eq!(parsed.base(), "XBT");
        assert_eq!(parsed.quote(), "USD");
    }

    #[test]
    fn rejects_symbol_without_quote() {
        let err = Symbol::parse("XBTUSD").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolMissingQuote { .. }));
    }

    #[test]
    fn rejects_invalid_chars() {
        let err = Symbol::parse("XBT-US$").expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::SymbolInvalidChar { ch: '$', index: 6 }
        ));
    }

    #[test]
    fn asset_rejects_separator() {
        let err = Asset::parse("XBT-USD").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidAsset { .. }));
    }
}
