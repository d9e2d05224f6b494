use eframe::egui::{self, Align2, Color32, RichText, ScrollArea, Ui};
use egui_plot::{HLine, Legend, LineStyle, Plot, PlotPoint, PlotPoints, Points, Text, VLine};

use crate::data::model::QuantTable;
use crate::state::AppState;

/// Pointer distance (pixels) within which a volcano point is annotated.
const HOVER_RADIUS: f64 = 8.0;

// ---------------------------------------------------------------------------
// Reproducibility grid
// ---------------------------------------------------------------------------

/// Every channel plotted against every other channel, one small scatter per
/// cell, coloured by the group of the row channel.
pub fn reproducibility_grid(ui: &mut Ui, state: &mut AppState) {
    let Some(table) = &state.table else {
        empty_hint(ui);
        return;
    };

    let n_cols = table.columns.len();
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Channels shown");
        ui.add(egui::Slider::new(&mut state.grid_limit, 1..=n_cols.max(1)));
    });
    let k = state.grid_limit.min(n_cols);
    let cell = ((ui.available_width() - 8.0 * k as f32) / k.max(1) as f32).clamp(60.0, 220.0);

    ScrollArea::both()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("reproducibility_grid")
                .spacing([4.0, 4.0])
                .show(ui, |ui: &mut Ui| {
                    for i in 0..k {
                        let color = state.colors.color_for_column(&table.columns[i]);
                        for j in 0..k {
                            let points = scatter_points(table, i, j);
                            Plot::new(("repro", i, j))
                                .width(cell)
                                .height(cell)
                                .show_axes(false)
                                .show_grid(false)
                                .allow_drag(false)
                                .allow_zoom(false)
                                .allow_scroll(false)
                                .allow_boxed_zoom(false)
                                .show(ui, |plot_ui| {
                                    plot_ui.points(Points::new(points).color(color).radius(1.5));
                                })
                                .response
                                .on_hover_text(format!(
                                    "{}\nvs\n{}",
                                    table.columns[i], table.columns[j]
                                ));
                        }
                        ui.end_row();
                    }
                });
        });
}

/// `(column i, column j)` for every protein observed in both. Missing
/// cells (kept as NaN) are left out rather than drawn at zero. The points are
/// copied, so they outlive the table.
pub fn scatter_points(table: &QuantTable, i: usize, j: usize) -> PlotPoints<'static> {
    table
        .values
        .iter()
        .filter(|row| row[i].is_finite() && row[j].is_finite())
        .map(|row| [row[i], row[j]])
        .collect()
}

// ---------------------------------------------------------------------------
// Volcano plot
// ---------------------------------------------------------------------------

/// log2 fold change against technical variance for the selected pair, with
/// the classification cutoffs drawn as guides.
pub fn volcano_plot(ui: &mut Ui, state: &mut AppState) {
    let Some(classification) = &state.classification else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Define groups and press Run to compute fold changes");
        });
        return;
    };

    let pairs = classification.statistics.pairs();
    let log_cutoff = classification.fold_change_threshold.log2();
    let variance_cutoff = classification.variance_threshold;

    let current = state
        .volcano_pair
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_default();
    let mut selected = state.volcano_pair.clone();
    egui::ComboBox::from_id_salt("volcano_pair")
        .selected_text(current)
        .show_ui(ui, |ui: &mut Ui| {
            for pair in &pairs {
                ui.selectable_value(&mut selected, Some(pair.clone()), pair.to_string());
            }
        });
    if selected != state.volcano_pair {
        state.volcano_pair = selected;
        state.hover.clear();
    }

    let points = state.volcano_points();
    let (flagged, other): (Vec<_>, Vec<_>) = points.iter().partition(|p| p.flagged);
    let to_series = |pts: &[&crate::state::VolcanoPoint]| -> PlotPoints<'static> {
        pts.iter().map(|p| [p.x, p.y]).collect()
    };
    let flagged_series = to_series(&flagged);
    let other_series = to_series(&other);
    let n_flagged = flagged.len();

    let hover = &mut state.hover;

    Plot::new("volcano_plot")
        .legend(Legend::default())
        .x_axis_label("log2 fold change")
        .y_axis_label("technical variance")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.points(
                Points::new(other_series)
                    .name("not altered")
                    .color(Color32::GRAY)
                    .radius(2.0),
            );
            plot_ui.points(
                Points::new(flagged_series)
                    .name(format!("altered ({n_flagged})"))
                    .color(Color32::from_rgb(220, 60, 60))
                    .radius(3.0),
            );

            let guide = Color32::from_gray(140);
            plot_ui.vline(VLine::new(log_cutoff).color(guide).style(LineStyle::dashed_loose()));
            plot_ui.vline(VLine::new(-log_cutoff).color(guide).style(LineStyle::dashed_loose()));
            if variance_cutoff.is_finite() {
                plot_ui.hline(
                    HLine::new(variance_cutoff)
                        .name("variance cutoff")
                        .color(guide)
                        .style(LineStyle::dashed_loose()),
                );
            }

            match plot_ui.pointer_coordinate() {
                Some(pointer) if plot_ui.response().hovered() => {
                    let bounds = plot_ui.plot_bounds();
                    let rect = plot_ui.response().rect;
                    let scale = [
                        bounds.width() / rect.width() as f64,
                        bounds.height() / rect.height() as f64,
                    ];
                    hover.update(&points, [pointer.x, pointer.y], scale, HOVER_RADIUS);
                }
                _ => hover.clear(),
            }

            if let (Some(protein), Some([x, y])) = (&hover.protein, hover.position) {
                plot_ui.text(
                    Text::new(PlotPoint::new(x, y), RichText::new(format!("  {protein}")).strong())
                        .anchor(Align2::LEFT_BOTTOM),
                );
            }
        });
}

fn empty_hint(ui: &mut Ui) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading("Open a quantification table  (File → Open…)");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_skips_missing() {
        let table = QuantTable::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                ("P1".into(), vec![1.0, 2.0]),
                ("P2".into(), vec![f64::NAN, 3.0]),
                ("P3".into(), vec![0.0, 4.0]),
            ],
        )
        .unwrap();
        let series = scatter_points(&table, 0, 1);
        drop(table);

        let points = series.points().to_vec();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].x, 0.0);
        assert_eq!(points[1].y, 4.0);
    }
}
