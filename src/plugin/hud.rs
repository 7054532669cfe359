//! Screen-space colormap legend.

use crate::nexrad::{ColorMap, Rgba};
use crate::viewer::{Drawable, Level, ObjectRef, Viewer};
use std::sync::Arc;

/// Left and right edge of the legend in normalised screen space.
const LEGEND_X: (f32, f32) = (-1.0, -0.9);

/// One colored bar of the legend, in normalised screen coordinates
/// (-1..1, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendBar {
    pub color: Rgba,
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
}

/// 256 bars, one per coded value, bottom to top.
pub fn legend_bars(colormap: &ColorMap) -> Vec<LegendBar> {
    colormap
        .colors()
        .iter()
        .enumerate()
        .map(|(i, color)| LegendBar {
            color: *color,
            x0: LEGEND_X.0,
            x1: LEGEND_X.1,
            y0: (i as f32 - 128.0) / 128.0,
            y1: (i as f32 + 1.0 - 128.0) / 128.0,
        })
        .collect()
}

/// Shows the legend of the most recently displayed sweep.
#[derive(Default)]
pub struct Hud {
    colormap: Option<Arc<ColorMap>>,
    legend_ref: Option<ObjectRef>,
}

impl Hud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn colormap(&self) -> Option<&Arc<ColorMap>> {
        self.colormap.as_ref()
    }

    /// Replaces the legend. Does nothing when `colormap` is already shown.
    pub fn set_colormap(&mut self, viewer: &mut dyn Viewer, colormap: Arc<ColorMap>) {
        if self
            .colormap
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &colormap))
        {
            return;
        }
        log::debug!("Hud: legend {}", colormap.name);
        let r = viewer.add(Drawable::Legend(colormap.clone()), Level::Hud, false);
        if let Some(old) = self.legend_ref.replace(r) {
            viewer.remove(old);
        }
        self.colormap = Some(colormap);
        viewer.queue_draw();
    }

    pub fn remove(&mut self, viewer: &mut dyn Viewer) {
        if let Some(r) = self.legend_ref.take() {
            viewer.remove(r);
        }
        self.colormap = None;
    }
}
