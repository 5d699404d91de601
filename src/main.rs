mod app;
mod chart;
mod config;
mod data;
mod gui;
mod timeframe;
mod watchlist;

use app::App;
use clap::{Parser, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use timeframe::TimeFrame;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use watchlist::Watchlist;

#[derive(Clone, Debug, ValueEnum)]
enum GuiRendererChoice {
    Auto,
    Wgpu,
    Glow,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stock Data Visualizer: watchlist and comparison charts for stock tickers",
    after_help = "EXAMPLES:
    # Launch the GUI
    cargo run --release

    # Use a specific watchlist file
    cargo run --release -- --config ./my_watchlist.txt

    # Edit the watchlist from the command line
    cargo run --release -- --add NVDA
    cargo run --release -- --list

    # Fetch one series without the GUI
    cargo run --release -- --fetch SPY --time-frame 5y --normalize

    # Work offline with generated prices
    STOCKVIS_DATA_PROVIDER=mock cargo run --release"
)]
struct Args {
    /// Watchlist file (default: per-user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the watchlist and exit
    #[arg(long)]
    list: bool,

    /// Add a ticker to the watchlist, save, and exit
    #[arg(long, value_name = "SYMBOL")]
    add: Option<String>,

    /// Remove a ticker from the watchlist, save, and exit
    #[arg(long, value_name = "SYMBOL")]
    remove: Option<String>,

    /// Fetch one ticker's history and log a summary
    #[arg(long, value_name = "SYMBOL")]
    fetch: Option<String>,

    /// Time frame used by --fetch
    #[arg(long, value_enum, default_value_t = TimeFrame::Ytd)]
    time_frame: TimeFrame,

    /// Z-score normalize the series fetched with --fetch
    #[arg(long)]
    normalize: bool,

    /// Initial window width; the window starts maximized when width/height are not both set.
    #[arg(long)]
    width: Option<f32>,

    /// Initial window height
    #[arg(long)]
    height: Option<f32>,

    /// GUI renderer backend (auto|wgpu|glow). Useful for RDP compatibility.
    #[arg(long, value_enum, default_value_t = GuiRendererChoice::Wgpu)]
    gui_renderer: GuiRendererChoice,

    /// Enable GUI safe mode for remote desktop (disables vsync/MSAA and hardware acceleration).
    #[arg(long)]
    gui_safe_mode: bool,
}

async fn run_fetch(symbol: &str, time_frame: TimeFrame, normalize: bool) {
    let data = data::fetch_series_or_empty(symbol, time_frame).await;
    if data.is_empty() {
        warn!("No data for {} ({})", data.symbol, time_frame);
        return;
    }

    let series = if normalize {
        data.close_series().normalized()
    } else {
        data.close_series()
    };
    if let (Some(first), Some(last)) = (series.points.first(), series.points.last()) {
        info!(
            "{} {}: {} points, {} {:.4} -> {} {:.4}",
            series.symbol,
            time_frame,
            series.points.len(),
            first.date.format("%Y-%m-%d %H:%M"),
            first.value,
            last.date.format("%Y-%m-%d %H:%M"),
            last.value
        );
    }
}

fn run_gui(args: &Args, watchlist_path: PathBuf) -> io::Result<()> {
    let mut options = eframe::NativeOptions::default();
    options.renderer = match args.gui_renderer {
        GuiRendererChoice::Auto => eframe::Renderer::Wgpu,
        GuiRendererChoice::Wgpu => eframe::Renderer::Wgpu,
        GuiRendererChoice::Glow => eframe::Renderer::Glow,
    };

    let viewport = egui::ViewportBuilder::default().with_title(config::APP_NAME);
    options.viewport = match (args.width, args.height) {
        (Some(w), Some(h)) => viewport.with_inner_size([w, h]),
        _ => viewport.with_maximized(true),
    };

    if args.gui_safe_mode {
        options.vsync = false;
        options.multisampling = 0;
        options.depth_buffer = 0;
        options.stencil_buffer = 0;
        options.hardware_acceleration = eframe::HardwareAcceleration::Off;
    }

    info!(
        "Launching GUI with renderer: {:?}, safe_mode={}",
        args.gui_renderer,
        args.gui_safe_mode
    );
    let app = App::new(watchlist_path, Arc::new(data::ProviderSource));
    eframe::run_native(
        config::APP_NAME,
        options,
        Box::new(|_cc| Ok(Box::new(gui::GuiApp::new(app)))),
    ).map_err(|e| io::Error::other(e.to_string()))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("stock_data_visualizer=info,wgpu_core=error,wgpu_hal=error")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();
    let args = Args::parse();

    info!("{} v{}", config::APP_NAME, config::APP_VERSION);
    let watchlist_path = args.config.clone().unwrap_or_else(config::default_watchlist_path);

    if let Some(ref symbol) = args.fetch {
        run_fetch(symbol, args.time_frame, args.normalize).await;
        return Ok(());
    }

    if args.add.is_some() || args.remove.is_some() {
        let mut watchlist = Watchlist::load_or_empty(&watchlist_path);
        if let Some(ref symbol) = args.add {
            match watchlist.add(symbol) {
                Ok(()) => info!("Added {}", symbol.trim().to_uppercase()),
                Err(e) => warn!("{}", e),
            }
        }
        if let Some(ref symbol) = args.remove {
            match watchlist.remove(symbol) {
                Ok(entry) => info!("Removed {}", entry.symbol),
                Err(e) => warn!("{}", e),
            }
        }
        if let Err(e) = watchlist.save(&watchlist_path) {
            error!("Failed to save watchlist: {:#}", e);
        }
        return Ok(());
    }

    if args.list {
        let watchlist = Watchlist::load_or_empty(&watchlist_path);
        println!("# {}", watchlist_path.display());
        for symbol in watchlist.active_symbols() {
            println!("{}", symbol);
        }
        return Ok(());
    }

    run_gui(&args, watchlist_path)
}
