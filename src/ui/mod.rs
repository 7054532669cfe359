//! UI modules for the demo viewer.
//!
//! The UI is split into distinct panels:
//! - Top bar: title, viewer time and connectivity controls
//! - Left panel: radar layer settings
//! - Central canvas: the map with everything the layers added

mod canvas;
mod colors;
mod layer_panel;
mod scene;
mod top_bar;

pub use canvas::{render_canvas, MapView};
pub use layer_panel::render_layer_panel;
pub use scene::{Scene, SceneObject};
pub use top_bar::{render_top_bar, TimeControls, TopBarResponse};
