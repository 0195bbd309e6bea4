//! A-share symbol normalization and exchange mapping

use std::fmt;

use crate::error::{MarketError, Result};

/// Listing exchange of an A-share code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    /// Derive the exchange from a normalized 6-digit code
    pub fn of(code: &str) -> Self {
        match code.as_bytes() {
            [b'9', b'2', ..] | [b'4' | b'8', ..] => Self::Beijing,
            [b'6' | b'9', ..] => Self::Shanghai,
            _ => Self::Shenzhen,
        }
    }

    /// Prefix used by Sina (`sh600970`)
    pub fn sina_prefix(self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
            Self::Beijing => "bj",
        }
    }

    /// Market id used in EastMoney `secid` values
    pub fn eastmoney_market(self) -> u8 {
        match self {
            Self::Shanghai => 1,
            Self::Shenzhen | Self::Beijing => 0,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shanghai => "SH",
            Self::Shenzhen => "SZ",
            Self::Beijing => "BJ",
        };
        f.write_str(name)
    }
}

/// Normalize user input to a 6-digit code
///
/// Non-digit characters are stripped (`"SH600970"`, `"600970.0"` from a
/// spreadsheet export) and short codes are zero-padded (`"1"` becomes
/// `"000001"`).
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    // Spreadsheet exports render integers as floats
    let integral = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    let digits: String = integral.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() || digits.len() > 6 {
        return Err(MarketError::InvalidSymbol(raw.to_string()));
    }
    Ok(format!("{digits:0>6}"))
}

/// EastMoney `secid` for a normalized code, e.g. `1.600970`
pub fn eastmoney_secid(code: &str) -> String {
    format!("{}.{code}", Exchange::of(code).eastmoney_market())
}

/// Sina symbol for a normalized code, e.g. `sh600970`
pub fn sina_symbol(code: &str) -> String {
    format!("{}{code}", Exchange::of(code).sina_prefix())
}
