use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

static DATA_PROVIDER_MODE: OnceLock<DataProviderMode> = OnceLock::new();

pub const APP_NAME: &str = "Stock Data Visualizer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory created under the platform config dir.
pub const APP_DIR_NAME: &str = "stock-data-visualizer";
pub const WATCHLIST_FILE_NAME: &str = "watchlist.txt";

/// Upper bound on series drawn on one chart.
pub const MAX_PLOTTED_SERIES: usize = 16;

/// Earliest year any time frame resolves to (the "Max" floor).
pub const MIN_READABLE_YEAR: i32 = 1970;

pub const HTTP_USER_AGENT: &str = "Mozilla/5.0";
pub const HTTP_TIMEOUT_SECS: u64 = 15;
pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataProviderMode {
    Yahoo,
    Mock,
}

impl DataProviderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Mock => "mock",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "yfinance" => Some(Self::Yahoo),
            "mock" | "offline" => Some(Self::Mock),
            _ => None,
        }
    }
}

pub fn configured_data_provider_mode() -> DataProviderMode {
    *DATA_PROVIDER_MODE.get_or_init(|| {
        let raw = std::env::var("STOCKVIS_DATA_PROVIDER").unwrap_or_else(|_| "yahoo".to_string());
        let mode = DataProviderMode::parse(&raw).unwrap_or_else(|| {
            warn!(
                "Unknown STOCKVIS_DATA_PROVIDER={} ; defaulting to yahoo. Allowed values: yahoo | mock",
                raw.trim()
            );
            DataProviderMode::Yahoo
        });
        info!("Data provider: {}", mode.as_str());
        mode
    })
}

/// Per-user application directory, e.g. `~/.config/stock-data-visualizer` on Linux.
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join(APP_DIR_NAME)
}

pub fn default_watchlist_path() -> PathBuf {
    app_config_dir().join(WATCHLIST_FILE_NAME)
}
