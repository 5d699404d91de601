use crate::config::MAX_PLOTTED_SERIES;
use crate::data::{ClosingSeries, SeriesSource};
use crate::timeframe::TimeFrame;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawRejection {
    #[error("No tickers are selected. Check at least one ticker to draw a chart.")]
    NoActiveSymbols,
    #[error("{count} tickers are selected, but at most {max} can be drawn at once.")]
    TooManySymbols { count: usize, max: usize },
}

/// A validated request to plot the active watchlist symbols.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawRequest {
    pub symbols: Vec<String>,
    pub time_frame: TimeFrame,
    pub normalize: bool,
}

impl DrawRequest {
    pub fn new(
        symbols: Vec<String>,
        time_frame: TimeFrame,
        normalize: bool,
    ) -> Result<Self, DrawRejection> {
        if symbols.is_empty() {
            return Err(DrawRejection::NoActiveSymbols);
        }
        if symbols.len() > MAX_PLOTTED_SERIES {
            return Err(DrawRejection::TooManySymbols {
                count: symbols.len(),
                max: MAX_PLOTTED_SERIES,
            });
        }
        Ok(Self { symbols, time_frame, normalize })
    }

    pub fn title(&self) -> String {
        let scale = if self.normalize { "normalized" } else { "close" };
        format!("{} · {} · {}", self.symbols.join(", "), self.time_frame, scale)
    }
}

/// Everything the chart popup needs to draw one request.
#[derive(Clone, Debug)]
pub struct ChartData {
    pub request: DrawRequest,
    pub series: Vec<ClosingSeries>,
}

impl ChartData {
    /// Series with at least one point, in request order.
    pub fn plotted(&self) -> impl Iterator<Item = &ClosingSeries> {
        self.series.iter().filter(|s| !s.points.is_empty())
    }

    /// Symbols whose fetch came back empty.
    pub fn missing(&self) -> Vec<&str> {
        self.series
            .iter()
            .filter(|s| s.points.is_empty())
            .map(|s| s.symbol.as_str())
            .collect()
    }
}

/// Fetches every requested symbol in order; a failed symbol yields an empty
/// series and does not stop the rest.
pub async fn load_chart_data<S: SeriesSource + ?Sized>(source: &S, request: DrawRequest) -> ChartData {
    let mut series = Vec::with_capacity(request.symbols.len());
    for symbol in &request.symbols {
        let closes = source.fetch_series(symbol, request.time_frame).await.close_series();
        let closes = if request.normalize && !closes.points.is_empty() {
            closes.normalized()
        } else {
            closes
        };
        series.push(closes);
    }

    let chart = ChartData { request, series };
    info!(
        "Chart ready: {} plotted, {} without data",
        chart.plotted().count(),
        chart.missing().len()
    );
    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Candle, StockData};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    /// Serves a short fixed history and records every call.
    struct FakeSource {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(failing: Vec<&'static str>) -> Self {
            Self { failing, calls: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SeriesSource for FakeSource {
        async fn fetch_series(&self, symbol: &str, _time_frame: TimeFrame) -> StockData {
            self.calls.lock().unwrap().push(symbol.to_string());
            if self.failing.iter().any(|f| *f == symbol) {
                return StockData::empty(symbol);
            }
            let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
            let history = [10.0, 12.0, 11.0, 15.0]
                .iter()
                .enumerate()
                .map(|(i, &close)| Candle {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0.0,
                })
                .collect();
            StockData { symbol: symbol.to_string(), history }
        }
    }

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{}", i)).collect()
    }

    #[test]
    fn test_request_rejects_zero_symbols() {
        assert_eq!(
            DrawRequest::new(Vec::new(), TimeFrame::Ytd, false),
            Err(DrawRejection::NoActiveSymbols)
        );
    }

    #[test]
    fn test_request_enforces_upper_bound() {
        assert!(DrawRequest::new(symbols(MAX_PLOTTED_SERIES), TimeFrame::Year1, false).is_ok());
        assert_eq!(
            DrawRequest::new(symbols(MAX_PLOTTED_SERIES + 1), TimeFrame::Year1, false),
            Err(DrawRejection::TooManySymbols { count: 17, max: 16 })
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_others() {
        let source = FakeSource::new(vec!["BAD"]);
        let request = DrawRequest::new(
            vec!["SPY".to_string(), "BAD".to_string(), "QQQ".to_string()],
            TimeFrame::Year1,
            false,
        )
        .unwrap();

        let chart = load_chart_data(&source, request).await;

        assert_eq!(source.calls(), vec!["SPY", "BAD", "QQQ"]);
        let plotted: Vec<&str> = chart.plotted().map(|s| s.symbol.as_str()).collect();
        assert_eq!(plotted, vec!["SPY", "QQQ"]);
        assert_eq!(chart.missing(), vec!["BAD"]);
        assert_eq!(chart.series[0].values(), vec![10.0, 12.0, 11.0, 15.0]);
    }

    #[tokio::test]
    async fn test_normalize_flag_rescales_each_series() {
        let source = FakeSource::new(vec!["BAD"]);
        let request = DrawRequest::new(
            vec!["SPY".to_string(), "BAD".to_string()],
            TimeFrame::Ytd,
            true,
        )
        .unwrap();

        let chart = load_chart_data(&source, request).await;
        let values = chart.series[0].values();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!(chart.series[1].points.is_empty());
    }

    #[test]
    fn test_title_mentions_scale() {
        let request = DrawRequest::new(vec!["SPY".into(), "DIA".into()], TimeFrame::Year5, true).unwrap();
        assert_eq!(request.title(), "SPY, DIA · 5Y · normalized");
    }
}
