use clap::Parser;
use eframe::egui;
use element_stylist::config::PanelConfig;
use element_stylist::{Command, SettingsStore, StylePayload};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;
use tracing::{info, warn};

const FONT_FAMILIES: [&str; 7] = [
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Verdana",
    "Microsoft YaHei",
    "SimSun",
];

const FONT_WEIGHTS: [(&str, &str); 3] = [("normal", "Normal"), ("bold", "Bold"), ("lighter", "Lighter")];

/// Results reported back from worker threads.
enum Report {
    Sent(&'static str),
    SendFailed(String),
    DataLoaded,
    DataFailed(String),
}

enum DataStatus {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

struct StylistPanel {
    config: PanelConfig,
    store: SettingsStore,
    client: reqwest::blocking::Client,
    enabled: bool,
    font_size: u32,
    text_color: [u8; 3],
    background_color: [u8; 3],
    font_family: &'static str,
    font_weight: &'static str,
    status: Option<(bool, String)>,
    data: DataStatus,
    report_tx: Sender<Report>,
    report_rx: Receiver<Report>,
}

impl StylistPanel {
    fn new(cc: &eframe::CreationContext<'_>, config: PanelConfig) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let store = config.settings_store();
        let enabled = store.load_or_default().enabled();
        let (report_tx, report_rx) = channel();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        let mut panel = Self {
            config,
            store,
            client,
            enabled,
            font_size: 16,
            text_color: [0, 0, 0],
            background_color: [255, 255, 255],
            font_family: FONT_FAMILIES[0],
            font_weight: FONT_WEIGHTS[0].0,
            status: None,
            data: DataStatus::Idle,
            report_tx,
            report_rx,
        };

        // Bring the agent in line with the stored flag, then fetch display data.
        panel.send(&cc.egui_ctx, Command::TogglePlugin { enabled });
        panel.fetch_data(&cc.egui_ctx);
        panel
    }

    fn send(&self, ctx: &egui::Context, command: Command) {
        let label = match command {
            Command::TogglePlugin { .. } => "toggle",
            Command::ApplyStyles { .. } => "apply",
            Command::ResetStyles => "reset",
        };
        let client = self.client.clone();
        let url = self.config.command_url();
        let tx = self.report_tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let report = match client
                .post(&url)
                .json(&command)
                .send()
                .and_then(|r| r.error_for_status())
            {
                Ok(_) => Report::Sent(label),
                Err(e) => Report::SendFailed(e.to_string()),
            };
            let _ = tx.send(report);
            ctx.request_repaint();
        });
    }

    fn fetch_data(&mut self, ctx: &egui::Context) {
        let Some(url) = self.config.data_url.clone() else {
            return;
        };
        self.data = DataStatus::Loading;
        let client = self.client.clone();
        let tx = self.report_tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let result = client
                .get(&url)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.json::<serde_json::Value>());
            let report = match result {
                Ok(_) => Report::DataLoaded,
                Err(e) => Report::DataFailed(e.to_string()),
            };
            let _ = tx.send(report);
            ctx.request_repaint();
        });
    }

    fn drain_reports(&mut self) {
        while let Ok(report) = self.report_rx.try_recv() {
            match report {
                Report::Sent(label) => {
                    info!(command = label, "command delivered");
                    self.status = Some((true, format!("Sent {label}")));
                }
                Report::SendFailed(e) => {
                    warn!(error = %e, "command not delivered");
                    self.status = Some((false, format!("Agent unreachable: {e}")));
                }
                Report::DataLoaded => self.data = DataStatus::Loaded,
                Report::DataFailed(e) => self.data = DataStatus::Failed(e),
            }
        }
    }

    fn payload(&self) -> StylePayload {
        StylePayload {
            font_size: format!("{}px", self.font_size),
            color: hex(self.text_color),
            background_color: hex(self.background_color),
            font_family: self.font_family.to_string(),
            font_weight: self.font_weight.to_string(),
        }
    }

    fn set_enabled(&mut self, ctx: &egui::Context) {
        if let Err(e) = self.store.set_enabled(self.enabled) {
            warn!(error = %e, "failed to persist enabled flag");
        }
        self.send(
            ctx,
            Command::TogglePlugin {
                enabled: self.enabled,
            },
        );
    }

    fn render_toggle(&mut self, ui: &mut egui::Ui) {
        let fill = if self.enabled {
            egui::Color32::from_rgb(10, 26, 10)
        } else {
            egui::Color32::from_rgb(26, 10, 10)
        };
        egui::Frame::new()
            .fill(fill)
            .corner_radius(8.0)
            .inner_margin(10.0)
            .show(ui, |ui| {
                ui.set_min_width(ui.available_width());
                if ui.checkbox(&mut self.enabled, "Enable style editing").changed() {
                    let ctx = ui.ctx().clone();
                    self.set_enabled(&ctx);
                }
            });
    }

    fn render_form(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("style_form")
            .num_columns(2)
            .spacing([16.0, 10.0])
            .show(ui, |ui| {
                ui.label("Font size");
                ui.add(egui::DragValue::new(&mut self.font_size).range(8..=72).suffix(" px"));
                ui.end_row();

                ui.label("Text color");
                ui.color_edit_button_srgb(&mut self.text_color);
                ui.end_row();

                ui.label("Background");
                ui.color_edit_button_srgb(&mut self.background_color);
                ui.end_row();

                ui.label("Font family");
                egui::ComboBox::from_id_salt("font_family")
                    .selected_text(self.font_family)
                    .show_ui(ui, |ui| {
                        for family in FONT_FAMILIES {
                            ui.selectable_value(&mut self.font_family, family, family);
                        }
                    });
                ui.end_row();

                ui.label("Font weight");
                let current = FONT_WEIGHTS
                    .iter()
                    .find(|(value, _)| *value == self.font_weight)
                    .map(|(_, label)| *label)
                    .unwrap_or("Normal");
                egui::ComboBox::from_id_salt("font_weight")
                    .selected_text(current)
                    .show_ui(ui, |ui| {
                        for (value, label) in FONT_WEIGHTS {
                            ui.selectable_value(&mut self.font_weight, value, label);
                        }
                    });
                ui.end_row();
            });
    }

    fn render_buttons(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let apply = ui.add_enabled(
                self.enabled,
                egui::Button::new(egui::RichText::new("Apply").strong())
                    .fill(egui::Color32::from_rgb(99, 102, 241))
                    .min_size(egui::vec2(120.0, 32.0)),
            );
            let reset = ui.add_enabled(
                self.enabled,
                egui::Button::new("Reset").min_size(egui::vec2(120.0, 32.0)),
            );

            let ctx = ui.ctx().clone();
            if apply.clicked() || reset.clicked() {
                if !self.enabled {
                    self.status = Some((false, "Enable style editing first".to_string()));
                } else if apply.clicked() {
                    self.send(
                        &ctx,
                        Command::ApplyStyles {
                            styles: self.payload(),
                        },
                    );
                } else {
                    self.send(&ctx, Command::ResetStyles);
                }
            }
        });
    }

    fn render_status(&self, ui: &mut egui::Ui) {
        if let Some((ok, text)) = &self.status {
            let color = if *ok {
                egui::Color32::from_rgb(134, 239, 172)
            } else {
                egui::Color32::from_rgb(252, 165, 165)
            };
            ui.label(egui::RichText::new(text).color(color));
        }
        match &self.data {
            DataStatus::Idle => {}
            DataStatus::Loading => {
                ui.label("Loading...");
            }
            DataStatus::Loaded => {
                ui.label(egui::RichText::new("Data loaded").color(egui::Color32::GREEN));
            }
            DataStatus::Failed(e) => {
                ui.label(egui::RichText::new(format!("Error: {e}")).color(egui::Color32::RED));
            }
        }
    }
}

fn hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

impl eframe::App for StylistPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_reports();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(10.0);
                ui.heading(
                    egui::RichText::new("Element Stylist")
                        .size(22.0)
                        .strong()
                        .color(egui::Color32::from_rgb(100, 149, 237)),
                );
            });
            ui.add_space(12.0);

            self.render_toggle(ui);
            ui.add_space(12.0);
            self.render_form(ui);
            ui.add_space(16.0);
            self.render_buttons(ui);
            ui.add_space(12.0);
            ui.separator();
            self.render_status(ui);
        });
    }
}

fn main() -> eframe::Result<()> {
    dotenvy::dotenv().ok();
    element_stylist::init_tracing();
    let config = PanelConfig::parse();

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([340.0, 460.0])
            .with_min_inner_size([300.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Element Stylist",
        native_options,
        Box::new(|cc| Ok(Box::new(StylistPanel::new(cc, config)))),
    )
}
