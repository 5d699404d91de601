use crate::chart::{self, ChartData, DrawRequest};
use crate::data::SeriesSource;
use crate::timeframe::TimeFrame;
use crate::watchlist::Watchlist;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub enum AppState {
    Idle,
    Loading,
}

/// Modal message shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into() }
    }
}

/// UI-independent state behind the main window.
pub struct App {
    pub state: AppState,
    pub watchlist: Watchlist,
    pub watchlist_path: PathBuf,
    pub input: String,
    pub time_frame: TimeFrame,
    pub normalize: bool,
    pub notice: Option<Notice>,
    pub chart: Option<ChartData>,
    /// Bumped each time a new chart arrives.
    pub chart_generation: u64,
    source: Arc<dyn SeriesSource>,
    chart_rx: Option<mpsc::Receiver<ChartData>>,
}

impl App {
    pub fn new(watchlist_path: PathBuf, source: Arc<dyn SeriesSource>) -> Self {
        let watchlist = Watchlist::load_or_empty(&watchlist_path);
        Self {
            state: AppState::Idle,
            watchlist,
            watchlist_path,
            input: String::new(),
            time_frame: TimeFrame::Ytd,
            normalize: false,
            notice: None,
            chart: None,
            chart_generation: 0,
            source,
            chart_rx: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, AppState::Loading)
    }

    /// Adds the typed symbol; rejections become a notice and leave the list untouched.
    pub fn add_from_input(&mut self) {
        match self.watchlist.add(&self.input) {
            Ok(()) => {
                info!("Added {} to watchlist", self.input.trim().to_uppercase());
                self.input.clear();
            }
            Err(e) => self.notice = Some(Notice::new("Add ticker", e.to_string())),
        }
    }

    pub fn toggle(&mut self, symbol: &str) {
        if let Err(e) = self.watchlist.toggle(symbol) {
            self.notice = Some(Notice::new("Watchlist", e.to_string()));
        }
    }

    pub fn remove(&mut self, symbol: &str) {
        match self.watchlist.remove(symbol) {
            Ok(entry) => info!("Removed {} from watchlist", entry.symbol),
            Err(e) => self.notice = Some(Notice::new("Watchlist", e.to_string())),
        }
    }

    /// Switches to another watchlist file and reloads from it.
    pub fn open_watchlist(&mut self, path: PathBuf) {
        info!("Opening watchlist {}", path.display());
        self.watchlist = Watchlist::load_or_empty(&path);
        self.watchlist_path = path;
    }

    pub fn save_watchlist(&self) {
        self.watchlist.save_quietly(&self.watchlist_path);
    }

    /// Validates the active selection and starts fetching in the background.
    /// Returns false (with a notice) when the request is rejected.
    pub fn trigger_draw(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }

        let request = match DrawRequest::new(
            self.watchlist.active_symbols(),
            self.time_frame,
            self.normalize,
        ) {
            Ok(request) => request,
            Err(e) => {
                self.notice = Some(Notice::new("Draw chart", e.to_string()));
                return false;
            }
        };

        info!("Drawing {}", request.title());
        self.state = AppState::Loading;
        let (tx, rx) = mpsc::channel(1);
        self.chart_rx = Some(rx);
        let source = self.source.clone();

        tokio::spawn(async move {
            let chart = chart::load_chart_data(source.as_ref(), request).await;
            let _ = tx.send(chart).await;
        });
        true
    }

    /// Picks up a finished draw job, if any. Called once per frame.
    pub fn tick(&mut self) {
        if let Some(rx) = &mut self.chart_rx {
            match rx.try_recv() {
                Ok(chart) => {
                    self.chart = Some(chart);
                    self.chart_generation += 1;
                    self.state = AppState::Idle;
                    self.chart_rx = None;
                }
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.notice = Some(Notice::new("Draw chart", "Loading the chart data failed."));
                    self.state = AppState::Idle;
                    self.chart_rx = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_PLOTTED_SERIES;
    use crate::data::{Candle, StockData};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SeriesSource for CountingSource {
        async fn fetch_series(&self, symbol: &str, _time_frame: TimeFrame) -> StockData {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StockData {
                symbol: symbol.to_string(),
                history: vec![Candle {
                    date: Utc::now(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                }],
            }
        }
    }

    fn app_with(dir: &tempfile::TempDir) -> (App, Arc<CountingSource>) {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let app = App::new(dir.path().join("watchlist.txt"), source.clone());
        (app, source)
    }

    #[test]
    fn test_duplicate_add_raises_notice() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with(&dir);

        app.input = "spy".to_string();
        app.add_from_input();
        assert!(app.input.is_empty());
        assert!(app.notice.is_none());

        app.input = "SPY".to_string();
        app.add_from_input();
        assert_eq!(app.watchlist.len(), 1);
        assert_eq!(app.input, "SPY");
        assert_eq!(
            app.notice,
            Some(Notice::new("Add ticker", "SPY is already in the watchlist"))
        );
    }

    #[test]
    fn test_draw_with_nothing_active_is_rejected_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, source) = app_with(&dir);
        app.input = "QQQ".to_string();
        app.add_from_input();
        app.toggle("QQQ");

        assert!(!app.trigger_draw());
        assert!(!app.is_loading());
        assert!(app.notice.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_draw_with_too_many_active_is_rejected_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, source) = app_with(&dir);
        for i in 0..=MAX_PLOTTED_SERIES {
            app.watchlist.add(&format!("T{}", i)).unwrap();
        }

        assert!(!app.trigger_draw());
        assert!(app.notice.as_ref().is_some_and(|n| n.body.contains("at most 16")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_draw_delivers_chart_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, source) = app_with(&dir);
        app.watchlist.add("SPY").unwrap();
        app.watchlist.add("DIA").unwrap();

        assert!(app.trigger_draw());
        assert!(app.is_loading());

        for _ in 0..100 {
            app.tick();
            if app.chart.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let chart = app.chart.as_ref().expect("chart should arrive");
        assert_eq!(chart.plotted().count(), 2);
        assert_eq!(app.chart_generation, 1);
        assert!(!app.is_loading());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_open_and_save_watchlist() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("other.txt");
        std::fs::write(&other, "AMZN\nMETA\n").unwrap();

        let (mut app, _) = app_with(&dir);
        app.open_watchlist(other.clone());
        assert_eq!(app.watchlist.active_symbols(), vec!["AMZN", "META"]);

        app.remove("amzn");
        app.save_watchlist();
        assert_eq!(std::fs::read_to_string(&other).unwrap(), "META\n");
    }
}
