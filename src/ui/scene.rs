//! The egui side of the [`Viewer`] interface.
//!
//! Objects the layers add are kept in draw order keys; raster content is
//! uploaded as an egui texture as soon as it is added, on the UI thread.

use crate::geo::Location;
use crate::nexrad::RgbaBuffer;
use crate::viewer::{Drawable, Level, ObjectRef, Viewer};
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};
use std::collections::BTreeMap;

pub struct SceneObject {
    pub drawable: Drawable,
    pub level: Level,
    pub hidden: bool,
    /// Uploaded raster for radar and tile objects
    pub texture: Option<TextureHandle>,
}

pub struct Scene {
    ctx: egui::Context,
    objects: BTreeMap<ObjectRef, SceneObject>,
    next: u64,
    /// Viewer time, Unix seconds
    pub time: i64,
    pub location: Location,
    pub offline: bool,
}

impl Scene {
    pub fn new(ctx: egui::Context, time: i64, offline: bool) -> Self {
        Self {
            ctx,
            objects: BTreeMap::new(),
            next: 1,
            time,
            location: Location::default(),
            offline,
        }
    }

    /// Visible objects at `level` in insertion order.
    pub fn visible(&self, level: Level) -> impl Iterator<Item = &SceneObject> {
        self.objects
            .values()
            .filter(move |o| o.level == level && !o.hidden)
    }

    fn upload(&self, name: String, buffer: &RgbaBuffer) -> Option<TextureHandle> {
        if buffer.is_empty() {
            return None;
        }
        let image =
            ColorImage::from_rgba_unmultiplied([buffer.width, buffer.height], &buffer.pixels);
        Some(self.ctx.load_texture(name, image, TextureOptions::LINEAR))
    }
}

impl Viewer for Scene {
    fn add(&mut self, drawable: Drawable, level: Level, cacheable: bool) -> ObjectRef {
        let r = ObjectRef(self.next);
        self.next += 1;
        let texture = match &drawable {
            Drawable::Radar(display) => self.upload(format!("radar-{}", r.0), &display.raster),
            Drawable::Tile(tile) => self.upload(format!("tile-{}", r.0), &tile.image),
            Drawable::Marker(_) | Drawable::Legend(_) => None,
        };
        log::trace!("Scene: add {:?} {:?} cacheable={}", r, level, cacheable);
        self.objects.insert(
            r,
            SceneObject {
                drawable,
                level,
                hidden: false,
                texture,
            },
        );
        r
    }

    fn remove(&mut self, object: ObjectRef) {
        // Dropping the handle frees the texture
        if self.objects.remove(&object).is_none() {
            log::debug!("Scene: remove of unknown {:?}", object);
        }
    }

    fn set_hidden(&mut self, object: ObjectRef, hidden: bool) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.hidden = hidden;
        }
    }

    fn time(&self) -> i64 {
        self.time
    }

    fn location(&self) -> Location {
        self.location
    }

    fn is_offline(&self) -> bool {
        self.offline
    }

    fn queue_draw(&mut self) {
        self.ctx.request_repaint();
    }
}
