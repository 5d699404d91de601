use crate::app::{App, Notice};
use crate::chart::ChartData;
use crate::config::{APP_NAME, APP_VERSION, MAX_PLOTTED_SERIES};
use crate::timeframe::TimeFrame;
use chrono::TimeZone;
use eframe::egui;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::path::PathBuf;
use tracing::info;

// ──────────────────────────────────────────────────────────────────────────────
// Color Palette
// ──────────────────────────────────────────────────────────────────────────────

const ACCENT_BLUE: egui::Color32 = egui::Color32::from_rgb(59, 130, 246);
const ACCENT_RED: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);

const BG_DARK: egui::Color32 = egui::Color32::from_rgb(15, 15, 20);
const BG_CARD: egui::Color32 = egui::Color32::from_rgb(24, 24, 32);
const BG_ELEVATED: egui::Color32 = egui::Color32::from_rgb(32, 32, 44);
const TEXT_PRIMARY: egui::Color32 = egui::Color32::from_rgb(226, 232, 240);
const TEXT_SECONDARY: egui::Color32 = egui::Color32::from_rgb(148, 163, 184);
const BORDER_SUBTLE: egui::Color32 = egui::Color32::from_rgb(51, 51, 68);

pub struct GuiApp {
    app: App,
    show_about: bool,
    open_dialog: Option<String>,
    confirm_quit: bool,
    allow_close: bool,
    /// Bumped by "Reset view"; part of the plot id.
    chart_view_epoch: u64,
}

impl GuiApp {
    pub fn new(app: App) -> Self {
        Self {
            app,
            show_about: false,
            open_dialog: None,
            confirm_quit: false,
            allow_close: false,
            chart_view_epoch: 0,
        }
    }

    fn apply_theme(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.window_rounding = egui::Rounding::same(8.0);
        style.visuals.widgets.noninteractive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.active.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);

        style.visuals.dark_mode = true;
        style.visuals.panel_fill = BG_DARK;
        style.visuals.window_fill = BG_CARD;
        style.visuals.faint_bg_color = BG_ELEVATED;

        style.visuals.widgets.noninteractive.bg_fill = BG_CARD;
        style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, TEXT_SECONDARY);
        style.visuals.widgets.inactive.bg_fill = BG_ELEVATED;
        style.visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, TEXT_PRIMARY);
        style.visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(45, 45, 60);
        style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);
        style.visuals.widgets.active.bg_fill = ACCENT_BLUE;
        style.visuals.widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);

        style.visuals.selection.bg_fill = ACCENT_BLUE.linear_multiply(0.4);
        style.visuals.selection.stroke = egui::Stroke::new(1.0, ACCENT_BLUE);

        style.spacing.item_spacing = egui::vec2(8.0, 6.0);

        ctx.set_style(style);
    }

    /// True while a dialog that needs an answer is open; the main window is disabled then.
    fn modal_open(&self) -> bool {
        self.app.notice.is_some() || self.confirm_quit || self.open_dialog.is_some()
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.allow_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.confirm_quit = true;
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_theme(ctx);
        self.app.tick();
        self.handle_close_request(ctx);
        let interactive = !self.modal_open();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            ui.add_enabled_ui(interactive, |ui| egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        self.open_dialog = Some(self.app.watchlist_path.display().to_string());
                        ui.close_menu();
                    }
                    if ui.button("Save").clicked() {
                        self.app.save_watchlist();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        self.confirm_quit = true;
                        ui.close_menu();
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            }));
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(self.app.watchlist_path.display().to_string())
                        .size(11.0)
                        .color(TEXT_SECONDARY),
                );
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(interactive, |ui| self.render_watchlist_panel(ui));
        });

        if self.app.is_loading() {
            ctx.request_repaint();
        }

        self.render_chart_window(ctx);
        self.render_open_dialog(ctx);
        self.render_about(ctx);
        self.render_notice(ctx);
        self.render_quit_confirmation(ctx);
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Watchlist Panel
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_watchlist_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        ui.label(egui::RichText::new(APP_NAME)
            .size(20.0)
            .strong()
            .color(ACCENT_BLUE));
        ui.add_space(8.0);

        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(16.0))
            .show(ui, |ui| {
                section_header(ui, "Watchlist");

                ui.horizontal(|ui| {
                    let input_response = ui.add(
                        egui::TextEdit::singleline(&mut self.app.input)
                            .desired_width(220.0)
                            .hint_text("e.g. NVDA, SXR8.DE..."),
                    );
                    let add_btn = ui.add(
                        egui::Button::new(egui::RichText::new("Add").color(egui::Color32::WHITE))
                            .fill(ACCENT_BLUE)
                            .rounding(egui::Rounding::same(6.0)),
                    );
                    if add_btn.clicked()
                        || (input_response.lost_focus()
                            && ui.input(|i| i.key_pressed(egui::Key::Enter)))
                    {
                        self.app.add_from_input();
                    }
                });

                ui.add_space(8.0);

                let mut toggled: Option<String> = None;
                let mut removed: Option<String> = None;
                egui::ScrollArea::vertical()
                    .max_height((ui.available_height() - 80.0).max(80.0))
                    .show(ui, |ui| {
                        if self.app.watchlist.is_empty() {
                            ui.label(egui::RichText::new("No tickers yet. Add one above.")
                                .color(TEXT_SECONDARY));
                        }
                        for entry in self.app.watchlist.entries() {
                            ui.horizontal(|ui| {
                                let mut active = entry.active;
                                if ui.checkbox(&mut active, entry.symbol.as_str()).changed() {
                                    toggled = Some(entry.symbol.clone());
                                }
                                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                    if ui.small_button("Remove").clicked() {
                                        removed = Some(entry.symbol.clone());
                                    }
                                });
                            });
                        }
                    });
                if let Some(symbol) = toggled {
                    self.app.toggle(&symbol);
                }
                if let Some(symbol) = removed {
                    self.app.remove(&symbol);
                }

                ui.add_space(8.0);
                ui.add(egui::Separator::default().spacing(4.0));
                ui.add_space(8.0);

                self.render_draw_controls(ui);
            });
    }

    fn render_draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_label("Time frame")
                .selected_text(self.app.time_frame.label())
                .show_ui(ui, |ui| {
                    for tf in TimeFrame::SELECTABLE {
                        ui.selectable_value(&mut self.app.time_frame, tf, tf.label());
                    }
                });
            ui.checkbox(&mut self.app.normalize, "Normalize");

            let active = self.app.watchlist.active_symbols().len();
            ui.label(egui::RichText::new(format!("{}/{} selected", active, MAX_PLOTTED_SERIES))
                .size(11.0)
                .color(TEXT_SECONDARY));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let draw_btn = ui.add_enabled(
                    !self.app.is_loading(),
                    egui::Button::new(
                        egui::RichText::new("Draw")
                            .size(14.0)
                            .strong()
                            .color(egui::Color32::WHITE),
                    )
                    .fill(ACCENT_BLUE)
                    .rounding(egui::Rounding::same(6.0)),
                );
                if draw_btn.clicked() {
                    self.app.trigger_draw();
                }
                if self.app.is_loading() {
                    ui.spinner();
                    ui.label(egui::RichText::new("Fetching market data...")
                        .size(11.0)
                        .color(TEXT_SECONDARY));
                }
            });
        });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Chart Popup
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_chart_window(&mut self, ctx: &egui::Context) {
        let Some(chart) = &self.app.chart else {
            return;
        };

        let mut open = true;
        let mut close_clicked = false;
        let plot_key = (self.app.chart_generation, self.chart_view_epoch);
        let mut reset_clicked = false;

        egui::Window::new(chart.request.title())
            .id(egui::Id::new("chart_window"))
            .open(&mut open)
            .default_size([900.0, 520.0])
            .resizable(true)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Reset view").clicked() {
                        reset_clicked = true;
                    }
                    if ui.button("Close").clicked() {
                        close_clicked = true;
                    }
                    ui.label(egui::RichText::new("Drag to pan, scroll to zoom, double-click to fit")
                        .size(11.0)
                        .color(TEXT_SECONDARY));
                });

                let missing = chart.missing();
                if !missing.is_empty() {
                    ui.label(egui::RichText::new(format!("No data: {}", missing.join(", ")))
                        .size(11.0)
                        .color(ACCENT_RED));
                }

                render_comparison_plot(ui, chart, plot_key);
            });

        if reset_clicked {
            self.chart_view_epoch += 1;
        }
        if !open || close_clicked {
            self.app.chart = None;
        }
    }
}

fn format_timestamp(ts: f64, pattern: &str) -> String {
    chrono::Utc.timestamp_opt(ts as i64, 0)
        .map(|dt| dt.format(pattern).to_string())
        .single()
        .unwrap_or_default()
}

/// A new `plot_key` gets a fresh plot id and therefore fitted bounds.
fn render_comparison_plot(ui: &mut egui::Ui, chart: &ChartData, plot_key: (u64, u64)) {
    let normalized = chart.request.normalize;
    let plot = Plot::new(("comparison_chart", plot_key))
        .legend(Legend::default().position(egui_plot::Corner::LeftTop))
        .x_axis_formatter(|x, _range| format_timestamp(x.value, "%Y-%m-%d"))
        .label_formatter(move |name, value| {
            let date = format_timestamp(value.x, "%Y-%m-%d %H:%M");
            if normalized {
                format!("{}\nDate: {}\nZ-score: {:.3}", name, date, value.y)
            } else {
                format!("{}\nDate: {}\nClose: {:.2}", name, date, value.y)
            }
        })
        .allow_drag(true)
        .allow_zoom(true)
        .allow_scroll(true);
    plot.show(ui, |plot_ui| {
        for series in chart.plotted() {
            let points: PlotPoints = series.points.iter()
                .filter(|p| p.value.is_finite())
                .map(|p| [p.date.timestamp() as f64, p.value])
                .collect();
            plot_ui.line(Line::new(points).name(&series.symbol).width(1.6));
        }
    });
}

// ──────────────────────────────────────────────────────────────────────────────
// Dialogs
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_open_dialog(&mut self, ctx: &egui::Context) {
        let Some(path_input) = &mut self.open_dialog else {
            return;
        };

        let mut submitted = false;
        let mut cancelled = false;
        egui::Window::new("Open watchlist")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("Watchlist file (one ticker per line):");
                let response = ui.add(egui::TextEdit::singleline(&mut *path_input).desired_width(420.0));
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submitted = true;
                }
                ui.horizontal(|ui| {
                    if ui.button("Open").clicked() {
                        submitted = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });

        if submitted {
            let path = PathBuf::from(path_input.trim());
            self.open_dialog = None;
            if path.as_os_str().is_empty() {
                self.app.notice = Some(Notice::new("Open watchlist", "No file selected."));
            } else {
                self.app.open_watchlist(path);
            }
        } else if cancelled {
            self.open_dialog = None;
        }
    }

    fn render_about(&mut self, ctx: &egui::Context) {
        if !self.show_about {
            return;
        }
        let mut open = true;
        let mut ok = false;
        egui::Window::new("About")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(APP_NAME).strong().size(16.0).color(ACCENT_BLUE));
                ui.label("A tool for evaluating stock data.");
                ui.add_space(6.0);
                ui.label(egui::RichText::new(format!("Software version {}", APP_VERSION))
                    .italics()
                    .color(TEXT_SECONDARY));
                ui.add_space(6.0);
                ok = ui.button("OK").clicked();
            });
        self.show_about = open && !ok;
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some(notice) = &self.app.notice else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new(notice.title.as_str())
            .id(egui::Id::new("notice_window"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(notice.body.as_str());
                ui.add_space(6.0);
                dismissed = ui.button("OK").clicked();
            });
        if dismissed {
            self.app.notice = None;
        }
    }

    fn render_quit_confirmation(&mut self, ctx: &egui::Context) {
        if !self.confirm_quit {
            return;
        }
        egui::Window::new(APP_NAME)
            .id(egui::Id::new("quit_window"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("Are you sure you want to quit?");
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        info!("Exiting");
                        self.app.save_watchlist();
                        self.allow_close = true;
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                    if ui.button("No").clicked() {
                        self.confirm_quit = false;
                    }
                });
            });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────────────────────────────────────

fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.label(egui::RichText::new(text)
        .size(13.0)
        .strong()
        .color(TEXT_PRIMARY));
    ui.add_space(4.0);
}
