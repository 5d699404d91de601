use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchlistError {
    #[error("Ticker symbol must not be empty")]
    EmptySymbol,
    #[error("{0} is not a valid ticker symbol (letters, digits and . ^ = - only)")]
    InvalidSymbol(String),
    #[error("{0} is already in the watchlist")]
    Duplicate(String),
    #[error("{0} is not in the watchlist")]
    NotFound(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickerEntry {
    pub symbol: String,
    pub active: bool,
}

/// Ordered list of tickers; symbols are unique ignoring case.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Watchlist {
    entries: Vec<TickerEntry>,
}

fn canonical_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '=' | '-')
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TickerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, symbol: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.position(symbol).is_some()
    }

    /// Appends `symbol` as an active entry.
    pub fn add(&mut self, symbol: &str) -> Result<(), WatchlistError> {
        let symbol = canonical_symbol(symbol);
        if symbol.is_empty() {
            return Err(WatchlistError::EmptySymbol);
        }
        if !symbol.chars().all(is_symbol_char) {
            return Err(WatchlistError::InvalidSymbol(symbol));
        }
        if self.contains(&symbol) {
            return Err(WatchlistError::Duplicate(symbol));
        }
        self.entries.push(TickerEntry { symbol, active: true });
        Ok(())
    }

    pub fn remove(&mut self, symbol: &str) -> Result<TickerEntry, WatchlistError> {
        let idx = self
            .position(symbol)
            .ok_or_else(|| WatchlistError::NotFound(canonical_symbol(symbol)))?;
        Ok(self.entries.remove(idx))
    }

    /// Flips the active flag and returns the new value.
    pub fn toggle(&mut self, symbol: &str) -> Result<bool, WatchlistError> {
        let idx = self
            .position(symbol)
            .ok_or_else(|| WatchlistError::NotFound(canonical_symbol(symbol)))?;
        let entry = &mut self.entries[idx];
        entry.active = !entry.active;
        Ok(entry.active)
    }

    pub fn active_symbols(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.symbol.clone())
            .collect()
    }

    /// Reads one symbol per line. A missing file is an empty watchlist.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No watchlist at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("opening {}", path.display()));
            }
        };

        let mut watchlist = Self::new();
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            match watchlist.add(&line) {
                Ok(()) | Err(WatchlistError::EmptySymbol) => {}
                Err(e) => debug!("Skipping watchlist line: {}", e),
            }
        }
        info!("Loaded {} tickers from {}", watchlist.len(), path.display());
        Ok(watchlist)
    }

    /// Like `load`, but any error is logged and yields an empty watchlist.
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Could not load watchlist: {:#}", e);
            Self::new()
        })
    }

    /// Overwrites `path` with the active symbols, one per line.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for symbol in self.active_symbols() {
            writeln!(writer, "{}", symbol)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Saves, swallowing write failures.
    pub fn save_quietly(&self, path: &Path) {
        match self.save(path) {
            Ok(()) => debug!("Saved watchlist to {}", path.display()),
            Err(e) => debug!("Ignoring watchlist save failure: {:#}", e),
        }
    }
}
