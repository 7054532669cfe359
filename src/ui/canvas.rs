//! Central canvas UI: map with mosaic tiles, radar sweeps, site markers
//! and the legend.

use super::scene::Scene;
use crate::geo::{offset, Location, MapProjection, EARTH_R};
use crate::nexrad::SweepDisplay;
use crate::plugin::legend_bars;
use crate::viewer::{Drawable, Level, Tile};
use eframe::egui::{
    self, pos2, Color32, Mesh, Painter, Pos2, Rect, RichText, Sense, Stroke, TextureId, Vec2,
};
use geo_types::Coord;

/// Pan/zoom state of the map.
#[derive(Debug, Clone)]
pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f32,
    pub pan_offset: Vec2,
}

impl Default for MapView {
    fn default() -> Self {
        let projection = MapProjection::default();
        Self {
            center_lat: projection.center_lat,
            center_lon: projection.center_lon,
            zoom: projection.zoom,
            pan_offset: projection.pan_offset,
        }
    }
}

/// Draws the scene and returns the camera eye after this frame's input.
pub fn render_canvas(ctx: &egui::Context, scene: &Scene, view: &mut MapView) -> Location {
    egui::CentralPanel::default()
        .show(ctx, |ui| {
            let available_size = ui.available_size();
            let (response, painter) =
                ui.allocate_painter(available_size, Sense::click_and_drag());
            let rect = response.rect;

            handle_canvas_interaction(&response, &rect, view);

            painter.rect_filled(rect, 0.0, Color32::from_rgb(20, 20, 35));

            let mut projection = MapProjection::new(view.center_lat, view.center_lon);
            projection.update(view.zoom, view.pan_offset, rect);

            // Lower zindex first so the west tile's edge lands on top
            let mut tiles: Vec<_> = scene
                .visible(Level::World)
                .filter_map(|o| match &o.drawable {
                    Drawable::Tile(tile) => o.texture.as_ref().map(|t| (tile, t.id())),
                    _ => None,
                })
                .collect();
            tiles.sort_by_key(|(tile, _)| tile.zindex);
            for (tile, texture) in tiles {
                render_tile(&painter, &projection, tile, texture);
            }

            for o in scene.visible(Level::World) {
                if let (Drawable::Radar(display), Some(texture)) = (&o.drawable, &o.texture) {
                    render_sweep(&painter, &projection, display, texture.id());
                }
            }

            for o in scene.visible(Level::Overlay) {
                if let Drawable::Marker(marker) = &o.drawable {
                    let coord = Coord {
                        x: marker.lon,
                        y: marker.lat,
                    };
                    if projection.is_visible(coord, 2.0) {
                        render_marker(&painter, projection.geo_to_screen(coord), &marker.label);
                    }
                }
            }

            for o in scene.visible(Level::Hud) {
                if let Drawable::Legend(colormap) = &o.drawable {
                    render_legend(&painter, &rect, colormap);
                }
            }

            draw_overlay_info(ui, &rect, scene);

            projection.camera_location()
        })
        .inner
}

fn handle_canvas_interaction(response: &egui::Response, rect: &Rect, view: &mut MapView) {
    if response.dragged() {
        view.pan_offset += response.drag_delta();
    }

    // Zoom relative to the cursor position
    if response.hovered() {
        let scroll_delta = response.ctx.input(|i| i.raw_scroll_delta);
        if scroll_delta.y != 0.0 {
            let zoom_factor = 1.0 + scroll_delta.y * 0.001;
            let old_zoom = view.zoom;
            let new_zoom = (old_zoom * zoom_factor).clamp(0.5, 200.0);

            if let Some(cursor_pos) = response.hover_pos() {
                let cursor_rel = cursor_pos - rect.center();
                let ratio = new_zoom / old_zoom;
                view.pan_offset = cursor_rel * (1.0 - ratio) + view.pan_offset * ratio;
            }

            view.zoom = new_zoom;
        }
    }

    if response.double_clicked() {
        *view = MapView::default();
    }
}

fn render_tile(painter: &Painter, projection: &MapProjection, tile: &Tile, texture: TextureId) {
    let top_left = projection.geo_to_screen(Coord {
        x: tile.west,
        y: tile.north,
    });
    let bottom_right = projection.geo_to_screen(Coord {
        x: tile.east,
        y: tile.south,
    });
    let uv = Rect::from_min_max(
        pos2(tile.coords.w, tile.coords.n),
        pos2(tile.coords.e, tile.coords.s),
    );
    let mut mesh = Mesh::with_texture(texture);
    mesh.add_rect_with_uv(
        Rect::from_min_max(top_left, bottom_right),
        uv,
        Color32::WHITE,
    );
    painter.add(mesh);
}

/// Drapes the sweep texture over its radial mesh, projected flat.
fn render_sweep(
    painter: &Painter,
    projection: &MapProjection,
    display: &SweepDisplay,
    texture: TextureId,
) {
    let origin = Coord {
        x: display.lon,
        y: display.lat,
    };
    let reach_deg = (display.mesh.radius_m() as f64 / EARTH_R).to_degrees();
    if !projection.is_visible(origin, reach_deg) {
        return;
    }
    let mut mesh = Mesh::with_texture(texture);
    mesh.vertices = display
        .mesh
        .vertices
        .iter()
        .map(|v| {
            let ground = offset(origin, v.position.x as f64, v.position.y as f64);
            egui::epaint::Vertex {
                pos: projection.geo_to_screen(ground),
                uv: pos2(v.uv.x, v.uv.y),
                color: Color32::WHITE,
            }
        })
        .collect();
    mesh.indices = display.mesh.indices.clone();
    painter.add(mesh);
}

fn render_marker(painter: &Painter, screen_pos: Pos2, label: &str) {
    painter.circle_filled(screen_pos, 4.0, Color32::from_rgb(255, 180, 80));
    painter.circle_stroke(
        screen_pos,
        4.0,
        Stroke::new(1.0, Color32::from_rgb(180, 120, 40)),
    );
    painter.text(
        screen_pos + Vec2::new(6.0, -2.0),
        egui::Align2::LEFT_CENTER,
        label,
        egui::FontId::proportional(10.0),
        Color32::from_rgb(220, 220, 240),
    );
}

/// Legend bars are in normalised coordinates: -1..1 across the canvas,
/// y up.
fn render_legend(painter: &Painter, rect: &Rect, colormap: &crate::nexrad::ColorMap) {
    let to_screen = |x: f32, y: f32| {
        pos2(
            rect.left() + (x + 1.0) / 2.0 * rect.width(),
            rect.top() + (1.0 - y) / 2.0 * rect.height(),
        )
    };
    for bar in legend_bars(colormap) {
        let [r, g, b, a] = bar.color;
        if a == 0 {
            continue;
        }
        painter.rect_filled(
            Rect::from_two_pos(to_screen(bar.x0, bar.y0), to_screen(bar.x1, bar.y1)),
            0.0,
            Color32::from_rgba_unmultiplied(r, g, b, a),
        );
    }
}

fn draw_overlay_info(ui: &mut egui::Ui, rect: &Rect, scene: &Scene) {
    let overlay_pos = rect.right_top() + Vec2::new(-190.0, 10.0);
    let overlay_rect = Rect::from_min_size(overlay_pos, Vec2::new(180.0, 50.0));

    let time = chrono::DateTime::from_timestamp(scene.time, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();
    ui.scope_builder(egui::UiBuilder::new().max_rect(overlay_rect), |ui| {
        ui.vertical(|ui| {
            ui.label(
                RichText::new(format!("Time: {}", time))
                    .monospace()
                    .size(12.0)
                    .color(Color32::from_rgb(200, 200, 220)),
            );
            ui.label(
                RichText::new(format!("Elev: {:.0} km", scene.location.elev / 1000.0))
                    .monospace()
                    .size(12.0)
                    .color(Color32::from_rgb(200, 200, 220)),
            );
        });
    });
}
