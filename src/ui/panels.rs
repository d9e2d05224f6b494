use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::MissingPolicy;
use crate::settings::AnalysisSettings;
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – column selection, groups, cutoffs
// ---------------------------------------------------------------------------

/// Render the left settings panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            columns_section(ui, state);
            ui.separator();
            groups_section(ui, state);
            ui.separator();
            cutoffs_section(ui, state);
            ui.separator();
            summary_section(ui, state);
        });
}

fn columns_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Columns").strong())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let sel = &mut state.settings.columns;
            egui::Grid::new("column_selector").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Index");
                ui.text_edit_singleline(&mut sel.index);
                ui.end_row();

                ui.label("Prefix");
                optional_text(ui, &mut sel.prefix);
                ui.end_row();

                ui.label("Suffix");
                optional_text(ui, &mut sel.suffix);
                ui.end_row();

                ui.label("Contains");
                list_text(ui, &mut sel.contains);
                ui.end_row();

                ui.label("Excludes");
                list_text(ui, &mut sel.not_contains);
                ui.end_row();
            });

            let mut missing = state.settings.missing;
            egui::ComboBox::from_label("Missing values")
                .selected_text(missing.to_string())
                .show_ui(ui, |ui: &mut Ui| {
                    for policy in [MissingPolicy::ZeroFill, MissingPolicy::KeepMissing] {
                        ui.selectable_value(&mut missing, policy, policy.to_string());
                    }
                });
            state.settings.missing = missing;

            if ui
                .add_enabled(state.source.is_some(), egui::Button::new("Reload file"))
                .clicked()
            {
                state.reload();
            }

            if !state.available_columns.is_empty() {
                available_headers(ui, state);
            }

            if let Some(table) = &state.table {
                ui.label(format!("{} channels selected:", table.columns.len()));
                for col in &table.columns {
                    let c = state.colors.color_for_column(col);
                    ui.label(RichText::new(col).small().color(c));
                }
            }
        });
}

/// Every header of the open file; ticked ones are picked by the current
/// selection. Toggling switches the selection to an explicit list.
fn available_headers(ui: &mut Ui, state: &mut AppState) {
    let preview = state.preview_columns();
    let mut toggled = None;
    egui::CollapsingHeader::new(format!("File headers ({})", state.available_columns.len()))
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            for header in &state.available_columns {
                let mut picked = preview.contains(header);
                let text = RichText::new(header).small();
                let enabled = *header != state.settings.columns.index;
                if ui.add_enabled(enabled, egui::Checkbox::new(&mut picked, text)).changed() {
                    toggled = Some(header.clone());
                }
            }
        });
    if let Some(header) = toggled {
        state.toggle_explicit_column(&header);
        state.status_message = Some("Column selection changed; reload the file".to_string());
    }
    if !state.settings.columns.explicit.is_empty() && ui.button("Clear explicit list").clicked() {
        state.settings.columns.explicit.clear();
    }
}

fn groups_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Groups");
    ui.label(RichText::new("comma-separated column substrings").small().weak());
    let response = ui.text_edit_singleline(&mut state.group_input);
    if response.lost_focus() || response.changed() {
        state.commit_group_input();
    }
    for (group, color) in state.colors.legend_entries() {
        ui.label(RichText::new(format!("● {group}")).color(color));
    }
}

fn cutoffs_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Significance");
    let s = &mut state.settings;
    egui::Grid::new("cutoffs").num_columns(2).show(ui, |ui: &mut Ui| {
        ui.label("Fold change >");
        ui.add(
            egui::DragValue::new(&mut s.fold_change_threshold)
                .speed(0.05)
                .range(1.01..=1000.0),
        );
        ui.end_row();

        ui.label("Variance percentile");
        ui.add(
            egui::DragValue::new(&mut s.variance_percentile)
                .speed(0.5)
                .range(0.1..=100.0)
                .suffix(" %"),
        );
        ui.end_row();

        ui.label("approxZero");
        ui.horizontal(|ui: &mut Ui| {
            let mut derive = s.approx_zero.is_none();
            if ui.checkbox(&mut derive, "derive").changed() {
                s.approx_zero = if derive { None } else { Some(1.0) };
            }
            if let Some(v) = s.approx_zero.as_mut() {
                ui.add(egui::DragValue::new(v).speed(0.01).range(1e-9..=f64::MAX));
            }
        });
        ui.end_row();
    });

    let can_run = state.table.is_some() && state.settings.groups.len() >= 2;
    if ui
        .add_enabled(can_run, egui::Button::new(RichText::new("Run").strong()))
        .clicked()
    {
        state.run_analysis();
    }
}

fn summary_section(ui: &mut Ui, state: &AppState) {
    if let Some(t) = &state.abundance_thresholds {
        egui::CollapsingHeader::new("Abundance thresholds")
            .default_open(false)
            .show(ui, |ui: &mut Ui| {
                egui::Grid::new("abundance_thresholds").striped(true).show(ui, |ui: &mut Ui| {
                    ui.strong("%");
                    ui.strong("with zeros");
                    ui.strong("without");
                    ui.end_row();
                    for (p, th) in t.iter() {
                        ui.label(format!("{p}"));
                        ui.label(format!("{:.4}", th.with_zeros));
                        ui.label(format!("{:.4}", th.without_zeros));
                        ui.end_row();
                    }
                });
            });
    }

    if let Some(c) = &state.classification {
        ui.label(format!("approxZero: {:.4e}", c.statistics.approx_zero));
        if c.variance_threshold.is_finite() {
            ui.label(format!("variance cutoff: {:.4}", c.variance_threshold));
        } else {
            ui.label("variance cutoff: none (all variances zero)");
        }
        ui.label(format!("{} altered proteins", c.proteins().len()));
    }
}

/// Edit an optional string; empty means `None`.
fn optional_text(ui: &mut Ui, value: &mut Option<String>) {
    let mut text = value.clone().unwrap_or_default();
    if ui.text_edit_singleline(&mut text).changed() {
        *value = (!text.is_empty()).then_some(text);
    }
}

/// Edit a list of strings as comma-separated text.
fn list_text(ui: &mut Ui, values: &mut Vec<String>) {
    let mut text = values.join(", ");
    if ui.text_edit_singleline(&mut text).changed() {
        *values = text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
}

// ---------------------------------------------------------------------------
// Altered protein table
// ---------------------------------------------------------------------------

/// Every flagged `(pair, protein)` record, ascending by fold change.
pub fn altered_table(ui: &mut Ui, state: &AppState) {
    let Some(c) = &state.classification else {
        ui.label("No analysis yet.");
        return;
    };

    ui.label(format!(
        "{} records, {} distinct proteins",
        c.flagged.len(),
        c.proteins().len()
    ));

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(160.0))
        .column(Column::auto().at_least(120.0))
        .column(Column::auto())
        .column(Column::remainder())
        .header(20.0, |mut header| {
            for title in ["Protein", "Pair", "Fold change", "Variance"] {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, c.flagged.len(), |mut row| {
                let r = &c.flagged[row.index()];
                row.col(|ui: &mut Ui| {
                    ui.label(&r.protein);
                });
                row.col(|ui: &mut Ui| {
                    ui.label(r.pair.to_string());
                });
                row.col(|ui: &mut Ui| {
                    ui.label(format!("{:.3}", r.fold_change));
                });
                row.col(|ui: &mut Ui| {
                    ui.label(format!("{:.4}", r.variance));
                });
            });
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Load settings…").clicked() {
                load_settings_dialog(state);
                ui.close_menu();
            }
            if ui.button("Save settings…").clicked() {
                save_settings_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            let has_results = state.classification.is_some();
            if ui
                .add_enabled(has_results, egui::Button::new("Export statistics…"))
                .clicked()
            {
                export_statistics_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(has_results, egui::Button::new("Export altered proteins…"))
                .clicked()
            {
                export_classification_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(table) = &state.table {
            ui.label(format!(
                "{} proteins, {} channels",
                table.len(),
                table.columns.len()
            ));
        }

        ui.separator();

        ui.selectable_value(&mut state.view, View::Reproducibility, "Reproducibility");
        ui.selectable_value(&mut state.view, View::Volcano, "Volcano");
        ui.selectable_value(&mut state.view, View::Altered, "Altered proteins");

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open quantification table")
        .add_filter("Supported files", &["txt", "tsv", "tab", "csv", "parquet", "pq"])
        .add_filter("Tab-delimited", &["txt", "tsv", "tab"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}

fn load_settings_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new().add_filter("JSON", &["json"]).pick_file() else {
        return;
    };
    match AnalysisSettings::load(&path) {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path.display());
            state.apply_settings(settings);
        }
        Err(e) => report(state, "load settings", &e),
    }
}

fn save_settings_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .add_filter("JSON", &["json"])
        .set_file_name("tmt-qc-settings.json")
        .save_file()
    else {
        return;
    };
    if let Err(e) = state.settings.save(&path) {
        report(state, "save settings", &e);
    }
}

fn export_statistics_dialog(state: &mut AppState) {
    let Some(c) = &state.classification else {
        return;
    };
    let Some(path) = rfd::FileDialog::new()
        .add_filter("TSV", &["tsv"])
        .set_file_name("pairwise_statistics.tsv")
        .save_file()
    else {
        return;
    };
    if let Err(e) = crate::export::write_statistics(&path, &c.statistics) {
        report(state, "export statistics", &e);
    }
}

fn export_classification_dialog(state: &mut AppState) {
    let Some(c) = &state.classification else {
        return;
    };
    let Some(path) = rfd::FileDialog::new()
        .add_filter("JSON", &["json"])
        .set_file_name("altered_proteins.json")
        .save_file()
    else {
        return;
    };
    if let Err(e) = crate::export::write_classification(&path, c) {
        report(state, "export altered proteins", &e);
    }
}

fn report(state: &mut AppState, action: &str, e: &anyhow::Error) {
    log::error!("Failed to {action}: {e:#}");
    state.status_message = Some(format!("Error: {e:#}"));
}
