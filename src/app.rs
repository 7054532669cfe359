//! Demo viewer application.
//!
//! Hosts the radar layers in an eframe window: the [`Scene`] is the viewer
//! the layers draw into, the panels drive them, and every frame drains
//! whatever the workers finished.

use crate::plugin::{LayerContext, RadarPlugin};
use crate::settings::Settings;
use crate::ui::{self, MapView, Scene, TimeControls};
use crate::viewer::{ViewerEvent, Waker};
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;

/// Camera moves smaller than this do not notify the layers.
const LOCATION_EPSILON_M: f64 = 1.0;

pub struct LayersApp {
    scene: Scene,
    view: MapView,
    controls: TimeControls,
    /// `None` when the layer services could not be created
    plugin: Option<RadarPlugin>,
    settings: Settings,
    settings_path: Option<PathBuf>,
    status_message: String,
}

impl LayersApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: Settings,
        settings_path: Option<PathBuf>,
    ) -> Self {
        let egui_ctx = cc.egui_ctx.clone();
        let waker: Waker = {
            let ctx = egui_ctx.clone();
            Arc::new(move || ctx.request_repaint())
        };

        let controls = TimeControls {
            offset_min: 0,
            offline: settings.offline,
        };
        let mut scene = Scene::new(egui_ctx, now(), settings.offline);

        let (plugin, status_message) = match LayerContext::from_settings(settings.clone(), waker) {
            Ok(layer_ctx) => (
                Some(RadarPlugin::new(&mut scene, Arc::new(layer_ctx))),
                "Zoom in on a site to load it".to_string(),
            ),
            Err(e) => {
                log::error!("Failed to set up radar layers: {}", e);
                (None, format!("Radar layers unavailable: {}", e))
            }
        };

        Self {
            scene,
            view: MapView::default(),
            controls,
            plugin,
            settings,
            settings_path,
            status_message,
        }
    }

    fn handle_event(&mut self, event: ViewerEvent) {
        if let Some(plugin) = &mut self.plugin {
            plugin.handle_event(&mut self.scene, event);
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl eframe::App for LayersApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(plugin) = &mut self.plugin {
            plugin.poll(&mut self.scene);
        }

        // Side and top panels must be rendered before CentralPanel
        let top = ui::render_top_bar(ctx, &mut self.controls, &self.status_message);
        if top.offline_changed {
            self.scene.offline = self.controls.offline;
            self.settings.offline = self.controls.offline;
            log::info!("Offline mode {}", self.controls.offline);
        }
        if top.time_changed {
            self.scene.time = now() - i64::from(self.controls.offset_min) * 60;
            self.handle_event(ViewerEvent::TimeChanged(self.scene.time));
        }
        if top.refresh {
            if self.controls.offset_min == 0 {
                self.scene.time = now();
            }
            self.handle_event(ViewerEvent::Refresh);
        }

        let panels = self.plugin.as_ref().map(|p| p.panels()).unwrap_or_default();
        let actions = ui::render_layer_panel(ctx, &panels);
        if let Some(plugin) = &mut self.plugin {
            for action in actions {
                plugin.handle_action(&mut self.scene, action);
            }
        }

        let eye = ui::render_canvas(ctx, &self.scene, &mut self.view);
        let moved = crate::geo::distance(&eye, &self.scene.location) > LOCATION_EPSILON_M;
        if moved {
            self.scene.location = eye;
            self.handle_event(ViewerEvent::LocationChanged(eye));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(plugin) = self.plugin.take() {
            plugin.shutdown(&mut self.scene);
        }
        if let Some(path) = &self.settings_path {
            if let Err(e) = self.settings.save(path) {
                log::warn!("Failed to save settings to {}: {}", path.display(), e);
            }
        }
    }
}
