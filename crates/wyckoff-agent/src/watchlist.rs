//! Watchlist of symbols to analyze
//!
//! The primary source is a CSV export of the portfolio sheet with columns
//! `Code, Date, Price, Qty, Timeframe, Bars`. When it is absent or empty the
//! agent falls back to a plain symbol list, then to the `SYMBOLS` variable.

use comfy_table::{Table, presets::UTF8_FULL};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wyckoff_market::{Timeframe, normalize_symbol};
use wyckoff_report::Position;

use crate::error::{AgentError, Result};

/// Bars requested when a row leaves the column blank
pub const DEFAULT_BARS: usize = 500;

/// Symbols used when no other source is configured
pub const DEFAULT_SYMBOLS: &str = "600970";

const HEADER: [&str; 6] = ["Code", "Date", "Price", "Qty", "Timeframe", "Bars"];

/// One row of the watchlist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistEntry {
    /// Six-digit, zero-padded code
    pub symbol: String,
    pub date: String,
    pub price: String,
    pub qty: String,
    pub timeframe: Timeframe,
    pub bars: usize,
}

impl WatchlistEntry {
    /// Entry with no position details and default timeframe and bar count
    pub fn bare(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            date: String::new(),
            price: String::new(),
            qty: String::new(),
            timeframe: Timeframe::default(),
            bars: DEFAULT_BARS,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            date: self.date.clone(),
            price: self.price.clone(),
            qty: self.qty.clone(),
        }
    }

    /// Parse one data row; `line` is only used in error messages
    ///
    /// Blank rows and unparseable symbols are skipped. A timeframe or bar
    /// count that is present but invalid rejects the whole watchlist, while
    /// blank cells fall back to the defaults.
    fn from_record(record: &csv::StringRecord, line: usize) -> Result<Option<Self>> {
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        let raw_symbol = field(0);
        if raw_symbol.is_empty() {
            return Ok(None);
        }
        let symbol = match normalize_symbol(&raw_symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!("Skipping watchlist row {}: {}", line, e);
                return Ok(None);
            }
        };

        let timeframe = match field(4) {
            tf if tf.is_empty() => Timeframe::default(),
            tf => tf.trim_end_matches(".0").parse().map_err(|e| {
                AgentError::Config(format!(
                    "watchlist row {line} ({symbol}): invalid timeframe '{tf}': {e}"
                ))
            })?,
        };

        let bars = match field(5) {
            b if b.is_empty() => DEFAULT_BARS,
            b => b
                .trim_end_matches(".0")
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AgentError::Config(format!(
                        "watchlist row {line} ({symbol}): invalid bar count '{b}'"
                    ))
                })?,
        };

        Ok(Some(Self {
            symbol,
            date: field(1),
            price: field(2),
            qty: field(3),
            timeframe,
            bars,
        }))
    }

    fn to_record(&self) -> [String; 6] {
        [
            self.symbol.clone(),
            self.date.clone(),
            self.price.clone(),
            self.qty.clone(),
            self.timeframe.minutes().to_string(),
            self.bars.to_string(),
        ]
    }
}

/// The watchlist CSV file and its rows
#[derive(Debug, Clone)]
pub struct Watchlist {
    path: PathBuf,
    entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    /// Read the watchlist; a missing file is an empty list
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();

        if path.is_file() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_path(path)?;

            for (i, record) in reader.records().enumerate() {
                // header is line 1
                if let Some(entry) = WatchlistEntry::from_record(&record?, i + 2)? {
                    entries.push(entry);
                }
            }
            debug!(rows = entries.len(), "Loaded watchlist {}", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &[WatchlistEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&WatchlistEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    /// Update the position of an existing row or append a new one
    ///
    /// Returns `true` when an existing row was updated.
    pub fn add_or_update(
        &mut self,
        symbol: &str,
        date: &str,
        price: &str,
        qty: &str,
    ) -> Result<bool> {
        let symbol = normalize_symbol(symbol)?;

        if let Some(entry) = self.entries.iter_mut().find(|e| e.symbol == symbol) {
            entry.date = date.to_string();
            entry.price = price.to_string();
            entry.qty = qty.to_string();
            info!(%symbol, "Watchlist row updated");
            return Ok(true);
        }

        self.entries.push(WatchlistEntry {
            date: date.to_string(),
            price: price.to_string(),
            qty: qty.to_string(),
            ..WatchlistEntry::bare(&symbol)
        });
        info!(%symbol, "Watchlist row added");
        Ok(false)
    }

    /// Remove every row for `symbol`; returns whether anything was removed
    pub fn remove(&mut self, symbol: &str) -> Result<bool> {
        let symbol = normalize_symbol(symbol)?;
        let before = self.entries.len();
        self.entries.retain(|e| e.symbol != symbol);
        let removed = self.entries.len() < before;
        if removed {
            info!(%symbol, "Watchlist row removed");
        }
        Ok(removed)
    }

    /// Write the rows back to the CSV file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(HEADER)?;
        for entry in &self.entries {
            writer.write_record(entry.to_record())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Tabular summary of the watchlist
    pub fn summary(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(HEADER);
        for entry in &self.entries {
            table.add_row(entry.to_record());
        }
        table
    }
}

/// Parse a plain symbol list: one per line, `#` starts a comment
pub fn parse_symbol_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| match normalize_symbol(line) {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                warn!("Skipping symbol list line: {}", e);
                None
            }
        })
        .collect()
}

/// Parse a comma separated symbol list
pub fn parse_symbols_var(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| normalize_symbol(s).ok())
        .collect()
}

/// Drop repeated symbols, keeping the first occurrence
pub fn dedup(entries: Vec<WatchlistEntry>) -> Vec<WatchlistEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.symbol.clone()))
        .collect()
}

/// Resolve the run targets
///
/// Order of precedence: watchlist CSV rows, the symbol list file, the
/// `symbols_var` value (normally `SYMBOLS`), then [`DEFAULT_SYMBOLS`].
pub fn resolve_targets(
    watchlist: &Path,
    stock_list: &Path,
    symbols_var: Option<&str>,
) -> Result<Vec<WatchlistEntry>> {
    let rows = Watchlist::load(watchlist)?;
    if !rows.is_empty() {
        info!(count = rows.entries.len(), "Targets from watchlist");
        return Ok(dedup(rows.entries));
    }

    if stock_list.is_file() {
        let symbols = parse_symbol_list(&std::fs::read_to_string(stock_list)?);
        if !symbols.is_empty() {
            info!(count = symbols.len(), "Targets from {}", stock_list.display());
            return Ok(dedup(symbols.into_iter().map(WatchlistEntry::bare).collect()));
        }
    }

    let symbols = parse_symbols_var(symbols_var.unwrap_or(DEFAULT_SYMBOLS));
    info!(count = symbols.len(), "Targets from SYMBOLS");
    Ok(dedup(symbols.into_iter().map(WatchlistEntry::bare).collect()))
}
