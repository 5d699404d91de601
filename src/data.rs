use crate::config::{
    configured_data_provider_mode, DataProviderMode, HTTP_TIMEOUT_SECS, HTTP_USER_AGENT,
    YAHOO_CHART_URL,
};
use crate::timeframe::{DateRange, SampleInterval, TimeFrame};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};

/// Represents a single candlestick data point (OHLCV).
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub struct Candle {
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Holds historical stock data for a specific symbol.
#[derive(Clone, Debug)]
pub struct StockData {
    pub symbol: String,
    pub history: Vec<Candle>,
}

/// One plotted value of a closing-price series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesPoint {
    pub date: DateTime<Utc>,
    pub value: f64,
}

/// Closing prices of one symbol, possibly rescaled.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosingSeries {
    pub symbol: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Debug)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Debug)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Deserialize, Debug, Default)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn field(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn yahoo_response_to_stock_data(symbol: &str, response: YahooChartResponse) -> Result<StockData> {
    if let Some(err) = response.chart.error {
        return Err(anyhow::anyhow!(
            "Yahoo chart error for {}: {} ({})",
            symbol,
            err.description.unwrap_or_default(),
            err.code.unwrap_or_default()
        ));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or(anyhow::anyhow!("No data found for {}", symbol))?;

    let quotes = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut history = Vec::with_capacity(result.timestamp.len());
    for (i, &timestamp) in result.timestamp.iter().enumerate() {
        if let (Some(open), Some(high), Some(low), Some(close), Some(volume), Some(date)) = (
            field(&quotes.open, i),
            field(&quotes.high, i),
            field(&quotes.low, i),
            field(&quotes.close, i),
            field(&quotes.volume, i),
            Utc.timestamp_opt(timestamp, 0).single(),
        ) {
            history.push(Candle { date, open, high, low, close, volume });
        }
    }

    Ok(StockData {
        symbol: symbol.to_uppercase(),
        history,
    })
}

/// Chart endpoint for `symbol`, with the symbol escaped as a single path segment.
fn yahoo_chart_url(symbol: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(YAHOO_CHART_URL)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("{} cannot take path segments", YAHOO_CHART_URL))?
        .push(symbol);
    Ok(url)
}

fn yahoo_history_request<Tz: TimeZone>(
    client: &reqwest::Client,
    symbol: &str,
    range: &DateRange<Tz>,
    interval: SampleInterval,
) -> Result<reqwest::Request> {
    let period1 = range.start.timestamp().to_string();
    let period2 = range.end.timestamp().to_string();
    let request = client
        .get(yahoo_chart_url(symbol)?)
        .query(&[
            ("period1", period1.as_str()),
            ("period2", period2.as_str()),
            ("interval", interval.as_yahoo_str()),
        ])
        .header("User-Agent", HTTP_USER_AGENT)
        .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;
    Ok(request)
}

async fn fetch_yahoo_history<Tz: TimeZone>(
    symbol: &str,
    range: &DateRange<Tz>,
    interval: SampleInterval,
) -> Result<StockData> {
    let client = reqwest::Client::new();
    let request = yahoo_history_request(&client, symbol, range, interval)?;
    debug!("GET {}", request.url());
    let response = client.execute(request).await?;

    // Yahoo reports unknown symbols as 404 with a chart.error body, so parse before status.
    let status = response.status();
    let body = response.text().await?;
    match serde_json::from_str::<YahooChartResponse>(&body) {
        Ok(parsed) => yahoo_response_to_stock_data(symbol, parsed),
        Err(e) if status.is_success() => Err(e.into()),
        Err(_) => Err(anyhow::anyhow!("Yahoo returned HTTP {} for {}", status, symbol)),
    }
}

/// Fetches OHLCV history for `symbol` between the bounds of `range`.
pub async fn fetch_history<Tz: TimeZone>(
    symbol: &str,
    range: &DateRange<Tz>,
    interval: SampleInterval,
) -> Result<StockData> {
    match configured_data_provider_mode() {
        DataProviderMode::Yahoo => fetch_yahoo_history(symbol, range, interval).await,
        DataProviderMode::Mock => Ok(StockData::new_mock_range(symbol, range, interval)),
    }
}

/// Resolves `time_frame` now and fetches. Any failure is logged and yields an
/// empty series for the symbol.
pub async fn fetch_series_or_empty(symbol: &str, time_frame: TimeFrame) -> StockData {
    let fetched = match time_frame.resolve() {
        Ok(range) => fetch_history(symbol, &range, time_frame.interval()).await,
        Err(e) => Err(e.into()),
    };

    match fetched {
        Ok(data) => {
            info!(
                "Fetched {} points for {} ({})",
                data.history.len(),
                data.symbol,
                time_frame
            );
            data
        }
        Err(e) => {
            warn!("Failed to fetch {} ({}): {}", symbol, time_frame, e);
            StockData::empty(symbol)
        }
    }
}

/// Where the chart pipeline gets its price history from.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch_series(&self, symbol: &str, time_frame: TimeFrame) -> StockData;
}

/// The process-wide provider selected by `STOCKVIS_DATA_PROVIDER`.
pub struct ProviderSource;

#[async_trait]
impl SeriesSource for ProviderSource {
    async fn fetch_series(&self, symbol: &str, time_frame: TimeFrame) -> StockData {
        fetch_series_or_empty(symbol, time_frame).await
    }
}

impl StockData {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            history: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn close_series(&self) -> ClosingSeries {
        ClosingSeries {
            symbol: self.symbol.clone(),
            points: self
                .history
                .iter()
                .map(|c| SeriesPoint { date: c.date, value: c.close })
                .collect(),
        }
    }

    /// Offline random walk between the range bounds, reproducible per symbol.
    pub fn new_mock_range<Tz: TimeZone>(
        symbol: &str,
        range: &DateRange<Tz>,
        interval: SampleInterval,
    ) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        symbol.to_uppercase().hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let start = range.start.with_timezone(&Utc);
        let end = range.end.with_timezone(&Utc);
        let mut history = Vec::new();
        let mut current_price: f64 = rng.gen_range(20.0..500.0);
        let mut current_date = start;

        while current_date <= end {
            let volatility = 0.02; // 2% per bar
            let change_pct: f64 = rng.gen_range(-volatility..volatility);
            let open = current_price;
            let close = open * (1.0 + change_pct);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(1000.0..10000.0);

            history.push(Candle {
                date: current_date,
                open,
                high,
                low,
                close,
                volume,
            });

            current_price = close;
            current_date += interval.step();
        }

        Self {
            symbol: symbol.to_uppercase(),
            history,
        }
    }
}

impl ClosingSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Z-score normalized copy over the same timestamps.
    pub fn normalized(&self) -> Self {
        let scaled = normalize(&self.values());
        Self {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .zip(scaled)
                .map(|(p, value)| SeriesPoint { date: p.date, value })
                .collect(),
        }
    }
}

/// `(x - mean) / std` with the sample (n - 1) standard deviation.
/// A constant series divides by zero and comes back non-finite.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();

    values.iter().map(|v| (v - mean) / std).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mean_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[test]
    fn test_normalize_zero_mean_unit_std() {
        let prices = [101.5, 99.0, 120.25, 87.0, 110.0, 95.5];
        let normalized = normalize(&prices);
        assert_eq!(normalized.len(), prices.len());

        let (mean, std) = mean_std(&normalized);
        assert!(mean.abs() < 1e-10, "mean should be ~0, got {}", mean);
        assert!((std - 1.0).abs() < 1e-10, "std should be ~1, got {}", std);
    }

    #[test]
    fn test_normalize_two_values() {
        let normalized = normalize(&[1.0, 3.0]);
        let expected = std::f64::consts::FRAC_1_SQRT_2;
        assert!((normalized[0] + expected).abs() < 1e-12);
        assert!((normalized[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_constant_series_is_not_special_cased() {
        let normalized = normalize(&[5.0, 5.0, 5.0]);
        assert!(normalized.iter().all(|v| !v.is_finite()));
    }

    #[test]
    fn test_closing_series_normalized_keeps_index() {
        let now = Utc::now();
        let range = DateRange { start: now - Duration::days(30), end: now };
        let data = StockData::new_mock_range("AAPL", &range, SampleInterval::OneDay);
        let closes = data.close_series();
        let normalized = closes.normalized();

        assert_eq!(normalized.symbol, "AAPL");
        assert_eq!(normalized.points.len(), closes.points.len());
        for (a, b) in normalized.points.iter().zip(&closes.points) {
            assert_eq!(a.date, b.date);
        }
        let (mean, _) = mean_std(&normalized.values());
        assert!(mean.abs() < 1e-9);
    }

    #[test]
    fn test_mock_range_is_bounded_and_reproducible() {
        let now = Utc::now();
        let range = DateRange { start: now - Duration::days(7), end: now };
        let a = StockData::new_mock_range("msft", &range, SampleInterval::OneHour);
        let b = StockData::new_mock_range("MSFT", &range, SampleInterval::OneHour);

        assert_eq!(a.symbol, "MSFT");
        assert_eq!(a.history.len(), 7 * 24 + 1);
        assert!(a.history.iter().all(|c| c.date >= range.start && c.date <= range.end));
        assert!(a.history.iter().all(|c| c.low <= c.high && c.close > 0.0));
        assert_eq!(a.close_series(), b.close_series());
    }

    #[test]
    fn test_parse_yahoo_response_skips_incomplete_rows() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1700000000, 1700086400, 1700172800],
                    "indicators": {
                        "quote": [{
                            "open":   [10.0, 11.0, 12.0],
                            "high":   [10.5, 11.5, 12.5],
                            "low":    [9.5, null, 11.5],
                            "close":  [10.2, 11.2, 12.2],
                            "volume": [1000, 1100, 1200]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let response: YahooChartResponse = serde_json::from_str(body).unwrap();
        let data = yahoo_response_to_stock_data("spy", response).unwrap();

        assert_eq!(data.symbol, "SPY");
        assert_eq!(data.history.len(), 2);
        assert_eq!(data.history[0].close, 10.2);
        assert_eq!(data.history[1].close, 12.2);
        assert_eq!(data.history[1].date.timestamp(), 1700172800);
    }

    #[test]
    fn test_parse_yahoo_error_response() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        let response: YahooChartResponse = serde_json::from_str(body).unwrap();
        let err = yahoo_response_to_stock_data("NOPE", response).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_chart_url_escapes_symbol() {
        let plain = yahoo_chart_url("SXR8.DE").unwrap();
        assert_eq!(plain.path(), "/v8/finance/chart/SXR8.DE");

        for symbol in ["A#B", "X?y", "../../v7/finance/quote"] {
            let url = yahoo_chart_url(symbol).unwrap();
            assert!(url.fragment().is_none(), "{} leaked a fragment", symbol);
            assert!(url.query().is_none(), "{} leaked a query", symbol);
            assert_eq!(url.path_segments().unwrap().count(), 4, "{} split the path", symbol);
        }
    }

    #[test]
    fn test_history_request_has_bounds_and_timeout() {
        let range = DateRange {
            start: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            end: Utc.timestamp_opt(1_700_086_400, 0).unwrap(),
        };
        let client = reqwest::Client::new();
        let request =
            yahoo_history_request(&client, "A#B", &range, SampleInterval::OneDay).unwrap();

        assert_eq!(request.url().path(), "/v8/finance/chart/A%23B");
        assert_eq!(
            request.url().query(),
            Some("period1=1700000000&period2=1700086400&interval=1d")
        );
        assert_eq!(
            request.timeout(),
            Some(&std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        );
    }

    #[tokio::test]
    async fn test_failed_resolution_yields_empty_series() {
        let data = fetch_series_or_empty("spy", TimeFrame::Custom).await;
        assert!(data.is_empty());
        assert_eq!(data.symbol, "SPY");
    }

    #[test]
    fn test_parse_yahoo_result_without_timestamps() {
        let body = r#"{"chart": {"result": [{"indicators": {"quote": [{}]}}], "error": null}}"#;
        let response: YahooChartResponse = serde_json::from_str(body).unwrap();
        let data = yahoo_response_to_stock_data("QQQ", response).unwrap();
        assert!(data.is_empty());
    }
}
