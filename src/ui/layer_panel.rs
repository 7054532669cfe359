//! Left panel UI: one section per radar layer.

use super::colors;
use crate::viewer::{Panel, PanelAction, PanelContent};
use eframe::egui::{self, RichText};

/// Renders the layer panels and returns what the user asked for.
pub fn render_layer_panel(ctx: &egui::Context, panels: &[Panel]) -> Vec<PanelAction> {
    let mut actions = Vec::new();
    egui::SidePanel::left("layer_panel")
        .resizable(true)
        .default_width(250.0)
        .min_width(200.0)
        .max_width(400.0)
        .show(ctx, |ui| {
            ui.heading("Layers");
            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                for panel in panels {
                    render_panel(ui, panel, &mut actions);
                    ui.add_space(6.0);
                }
            });
        });
    actions
}

fn render_panel(ui: &mut egui::Ui, panel: &Panel, actions: &mut Vec<PanelAction>) {
    ui.group(|ui| {
        ui.horizontal(|ui| {
            let mut visible = panel.visible;
            if ui.checkbox(&mut visible, "").changed() {
                actions.push(PanelAction::ToggleHidden(panel.id.clone()));
            }
            ui.label(RichText::new(&panel.title).strong());
        });

        match &panel.content {
            PanelContent::Progress { fraction, text } => {
                ui.add(egui::ProgressBar::new(*fraction).text(text.as_str()));
            }
            PanelContent::Message(message) => {
                ui.label(RichText::new(message).color(colors::ui::ERROR));
            }
            PanelContent::Label(text) => {
                ui.label(RichText::new(text).small().color(colors::ui::VALUE));
            }
            PanelContent::Sweeps { choices, selected } => {
                ui.label(
                    RichText::new(&choices.time)
                        .small()
                        .color(colors::ui::LABEL),
                );
                egui::Grid::new(format!("sweeps_{}", panel.id))
                    .num_columns(2)
                    .show(ui, |ui| {
                        for row in &choices.rows {
                            ui.label(RichText::new(row.product.code()).monospace())
                                .on_hover_text(row.product.label());
                            ui.horizontal_wrapped(|ui| {
                                for &elevation in &row.elevations {
                                    let is_selected = selected.is_some_and(|(p, e)| {
                                        p == row.product && (e - elevation).abs() < 0.05
                                    });
                                    let label = format!("{:.1}", elevation);
                                    if ui.selectable_label(is_selected, label).clicked() {
                                        actions.push(PanelAction::SelectSweep {
                                            id: panel.id.clone(),
                                            product: row.product,
                                            elevation,
                                        });
                                    }
                                }
                            });
                            ui.end_row();
                        }
                    });
            }
        }
    });
}
