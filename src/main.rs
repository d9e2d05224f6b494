use std::path::PathBuf;

use eframe::egui;
use tmt_qc::app::TmtQcApp;
use tmt_qc::settings::AnalysisSettings;

fn main() -> eframe::Result {
    env_logger::init();

    // Optional: a table to open and a settings file to apply on start-up.
    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let table_path = args.next();
    let settings_path = args.next();

    let mut app = TmtQcApp::default();
    if let Some(path) = settings_path {
        match AnalysisSettings::load(&path) {
            Ok(s) => app.state.apply_settings(s),
            Err(e) => log::error!("Ignoring settings file: {e:#}"),
        }
    }
    if let Some(path) = table_path {
        app.state.open(&path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "tmt-qc – Proteomics QC",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
