//! Top bar UI: title, viewer time, refresh and offline controls.

use super::colors;
use eframe::egui::{self, Color32, RichText};

/// Time and connectivity controls.
#[derive(Debug, Clone, Default)]
pub struct TimeControls {
    /// Minutes before "now" the viewer time is set to
    pub offset_min: u32,
    pub offline: bool,
}

/// What changed in the top bar this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TopBarResponse {
    pub time_changed: bool,
    pub refresh: bool,
    pub offline_changed: bool,
}

pub fn render_top_bar(
    ctx: &egui::Context,
    controls: &mut TimeControls,
    status: &str,
) -> TopBarResponse {
    let mut out = TopBarResponse::default();
    egui::TopBottomPanel::top("top_bar")
        .exact_height(36.0)
        .show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                ui.label(
                    RichText::new("NEXRAD Layers")
                        .strong()
                        .size(16.0)
                        .color(Color32::WHITE),
                );

                ui.separator();

                ui.label(
                    RichText::new("Minutes ago:")
                        .size(12.0)
                        .color(Color32::GRAY),
                );
                let minutes = egui::Slider::new(&mut controls.offset_min, 0..=1440).step_by(5.0);
                let slider = ui.add(minutes);
                // Only once the handle is let go, each change starts fetches
                let released = slider.drag_stopped() || (slider.changed() && !slider.dragged());
                out.time_changed = released;

                if ui.button("Refresh").clicked() {
                    out.refresh = true;
                }
                out.offline_changed = ui.checkbox(&mut controls.offline, "Offline").changed();

                ui.separator();

                ui.label(RichText::new(status).size(13.0).color(colors::ui::LABEL));
            });
        });
    out
}
