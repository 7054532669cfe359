//! The interface between the radar layers and the viewer that draws them.
//!
//! The layers never draw anything themselves. They hand [`Drawable`]s to a
//! [`Viewer`] at a [`Level`], keep the returned [`ObjectRef`] and remove it
//! again when the content is replaced or unloaded. All `Viewer` calls happen
//! on the UI thread.

use crate::geo::Location;
use crate::nexrad::{ColorMap, Product, RgbaBuffer, SweepChoices, SweepDisplay};
use std::sync::Arc;

/// Handle to an object added to a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub u64);

/// Draw pass an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Geometry on the globe
    World,
    /// Labels and markers on top of the world
    Overlay,
    /// Screen-space elements
    Hud,
}

/// Labelled point on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

/// Texture coordinates of the used part of a tile texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoords {
    pub n: f32,
    pub s: f32,
    pub e: f32,
    pub w: f32,
}

/// A textured geographic rectangle.
#[derive(Debug, Clone)]
pub struct Tile {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    /// Higher draws on top
    pub zindex: i32,
    pub image: Arc<RgbaBuffer>,
    pub coords: TexCoords,
}

/// Anything a layer can put in a viewer.
#[derive(Debug, Clone)]
pub enum Drawable {
    Marker(Marker),
    /// A rasterized sweep on its radial mesh
    Radar(Arc<SweepDisplay>),
    Tile(Tile),
    /// Color table bars drawn in screen space
    Legend(Arc<ColorMap>),
}

/// Viewer notifications routed to the layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    /// Viewer time changed, Unix seconds
    TimeChanged(i64),
    /// User asked for fresh data
    Refresh,
    /// Camera eye moved
    LocationChanged(Location),
}

/// Services a viewer offers to the radar layers.
pub trait Viewer {
    fn add(&mut self, object: Drawable, level: Level, cacheable: bool) -> ObjectRef;
    fn remove(&mut self, object: ObjectRef);
    fn set_hidden(&mut self, object: ObjectRef, hidden: bool);
    /// Current viewer time as Unix seconds.
    fn time(&self) -> i64;
    /// Current camera eye position.
    fn location(&self) -> Location;
    fn is_offline(&self) -> bool;
    fn queue_draw(&mut self);
}

/// Wakes the UI thread after a worker queued a result.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Body of a layer's settings panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelContent {
    Progress {
        fraction: f32,
        text: String,
    },
    Message(String),
    /// Sweep selector of a loaded site
    Sweeps {
        choices: SweepChoices,
        selected: Option<(Product, f32)>,
    },
    Label(String),
}

/// One tab of the layer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Site code, or [`CONUS_PANEL_ID`]
    pub id: String,
    pub title: String,
    pub visible: bool,
    pub content: PanelContent,
}

pub const CONUS_PANEL_ID: &str = "Conus";

/// Requests coming back from the settings panels.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    ToggleHidden(String),
    SelectSweep {
        id: String,
        product: Product,
        elevation: f32,
    },
}

/// A layer that exposes a settings panel.
pub trait Configurable {
    /// `None` while the layer has nothing to configure.
    fn panel(&self) -> Option<Panel>;
}
