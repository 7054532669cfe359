//! CONUS composite mosaic layer.
//!
//! The national reflectivity mosaic is a single 3400x1600 GIF. It is too
//! wide for one texture, so it is split into west and east halves, each
//! placed at (1, 1) on a 2048x2048 canvas and drawn as its own tile.

use super::LayerContext;
use crate::error::{DecodeError, RadarError};
use crate::fetch::{
    file_time, find_nearest, progress_text, FetchMode, ListQuery, CONUS_TIME_OFFSET,
    FILE_TIME_FORMAT,
};
use crate::nexrad::RgbaBuffer;
use crate::viewer::{
    Configurable, Drawable, Level, ObjectRef, Panel, PanelContent, TexCoords, Tile, Viewer,
    CONUS_PANEL_ID,
};
use regex::Regex;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

pub const CONUS_NORTH: f64 = 50.406626367301044;
pub const CONUS_WEST: f64 = -127.620375523875420;
pub const CONUS_WIDTH: usize = 3400;
pub const CONUS_HEIGHT: usize = 1600;
pub const CONUS_DEG_PER_PX: f64 = 0.017971305190311;

/// Side of the square tile canvas.
pub const CANVAS_SIZE: usize = 2048;

const CONUS_FILE_PATTERN: &str = r#"^Conus_[^"]*_N0Ronly.gif$"#;
const CONUS_INDEX_EXTRACT: &str = r#"href="([^"]*)""#;

/// Exact legend/border colors drawn translucently.
const ALPHAMAP: [[u8; 4]; 3] = [
    [0x04, 0xe9, 0xe7, 0x30],
    [0x01, 0x9f, 0xf4, 0x60],
    [0x03, 0x00, 0xf4, 0x90],
];

/// Alpha for one mosaic pixel: near-white background is transparent,
/// alphamap colors get their listed alpha, everything else is opaque.
pub fn mosaic_pixel(r: u8, g: u8, b: u8) -> [u8; 4] {
    if r > 0xe0 && g > 0xe0 && b > 0xe0 {
        return [0, 0, 0, 0];
    }
    let alpha = ALPHAMAP
        .iter()
        .find(|m| m[0] == r && m[1] == g && m[2] == b)
        .map_or(0xff, |m| m[3]);
    [r, g, b, alpha]
}

/// Splits RGBA `pixels` into west and east halves, remapping alpha.
pub fn split_hemispheres(pixels: &[u8], width: usize, height: usize) -> [RgbaBuffer; 2] {
    let half = width / 2;
    let mut out = [RgbaBuffer::new(half, height), RgbaBuffer::new(half, height)];
    if half == 0 {
        return out;
    }
    for y in 0..height {
        for x in 0..half * 2 {
            let src = (y * width + x) * 4;
            let Some(px) = pixels.get(src..src + 3) else {
                continue;
            };
            let (idx, subx) = (x / half, x % half);
            let dst = (y * half + subx) * 4;
            out[idx].pixels[dst..dst + 4].copy_from_slice(&mosaic_pixel(px[0], px[1], px[2]));
        }
    }
    out
}

/// Copies `image` into a transparent canvas at offset (1, 1).
pub fn pad_canvas(image: &RgbaBuffer) -> Result<RgbaBuffer, DecodeError> {
    if image.width + 1 > CANVAS_SIZE || image.height + 1 > CANVAS_SIZE {
        return Err(DecodeError::Invalid(format!(
            "{}x{} half image exceeds {} canvas",
            image.width, image.height, CANVAS_SIZE
        )));
    }
    let mut canvas = RgbaBuffer::new(CANVAS_SIZE, CANVAS_SIZE);
    let row = image.width * 4;
    for y in 0..image.height {
        let dst = ((y + 1) * CANVAS_SIZE + 1) * 4;
        canvas.pixels[dst..dst + row].copy_from_slice(&image.pixels[y * row..(y + 1) * row]);
    }
    Ok(canvas)
}

/// Texture coordinates of a `width` x `height` image placed at (1, 1).
pub fn canvas_coords(width: usize, height: usize) -> TexCoords {
    let n = 1.0 / CANVAS_SIZE as f32;
    let w = 1.0 / CANVAS_SIZE as f32;
    TexCoords {
        n,
        w,
        s: n + height as f32 / CANVAS_SIZE as f32,
        e: w + width as f32 / CANVAS_SIZE as f32,
    }
}

/// Geographic tiles as (north, south, east, west, zindex).
fn tile_bounds() -> [(f64, f64, f64, f64, i32); 2] {
    let south = CONUS_NORTH - CONUS_DEG_PER_PX * CONUS_HEIGHT as f64;
    let east = CONUS_WEST + CONUS_DEG_PER_PX * CONUS_WIDTH as f64;
    let mid = CONUS_WEST + CONUS_DEG_PER_PX * CONUS_WIDTH as f64 / 2.0;
    [
        (CONUS_NORTH, south, mid, CONUS_WEST, 2),
        (CONUS_NORTH, south, east, mid, 1),
    ]
}

/// Decoded and split mosaic, ready for upload.
struct MosaicImage {
    name: String,
    time: Option<i64>,
    canvases: [RgbaBuffer; 2],
    coords: TexCoords,
}

enum WorkerMessage {
    Progress {
        generation: u64,
        current: u64,
        total: u64,
    },
    Finished {
        generation: u64,
        result: Result<MosaicImage, RadarError>,
    },
}

pub struct ConusMosaic {
    ctx: Arc<LayerContext>,
    /// Set while a fetch runs; further updates are skipped
    loading: bool,
    generation: u64,
    time: i64,
    hidden: bool,
    tile_refs: [Option<ObjectRef>; 2],
    /// Name of the displayed image
    label: Option<String>,
    /// Timestamp of the displayed image, Unix seconds
    image_time: Option<i64>,
    message: Option<String>,
    progress: Option<(u64, u64)>,
    sender: Sender<WorkerMessage>,
    receiver: Receiver<WorkerMessage>,
}

impl ConusMosaic {
    pub fn new(ctx: Arc<LayerContext>) -> Self {
        let (sender, receiver) = channel();
        Self {
            ctx,
            loading: false,
            generation: 0,
            time: 0,
            hidden: false,
            tile_refs: [None, None],
            label: None,
            image_time: None,
            message: None,
            progress: None,
            sender,
            receiver,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Timestamp parsed from the name of the displayed image.
    pub fn image_time(&self) -> Option<i64> {
        self.image_time
    }

    /// Starts fetching the mosaic nearest the viewer time, unless a fetch
    /// is already running.
    pub fn update(&mut self, viewer: &mut dyn Viewer) {
        if self.loading {
            log::debug!("ConusMosaic: update already in progress");
            return;
        }
        self.loading = true;
        self.time = viewer.time();
        self.generation += 1;
        self.message = None;
        self.progress = Some((0, 0));
        log::debug!("ConusMosaic: update {}", self.time);

        let ctx = self.ctx.clone();
        let sender = self.sender.clone();
        let (time, generation, offline) = (self.time, self.generation, viewer.is_offline());
        std::thread::spawn(move || {
            let progress_sender = sender.clone();
            let waker = ctx.waker.clone();
            let result = run_update(&ctx, time, offline, &mut |current, total| {
                let _ = progress_sender.send(WorkerMessage::Progress {
                    generation,
                    current,
                    total,
                });
                waker();
            });
            let _ = sender.send(WorkerMessage::Finished { generation, result });
            (ctx.waker)();
        });
    }

    pub fn toggle_hidden(&mut self, viewer: &mut dyn Viewer) {
        self.hidden = !self.hidden;
        for r in self.tile_refs.iter().flatten() {
            viewer.set_hidden(*r, self.hidden);
        }
        viewer.queue_draw();
    }

    /// Applies finished worker messages.
    pub fn poll(&mut self, viewer: &mut dyn Viewer) {
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                WorkerMessage::Progress {
                    generation,
                    current,
                    total,
                } => {
                    if generation == self.generation && self.loading {
                        self.progress = Some((current, total));
                    }
                }
                WorkerMessage::Finished { generation, result } => {
                    if generation != self.generation {
                        log::debug!("ConusMosaic: discarding stale result {}", generation);
                        continue;
                    }
                    self.loading = false;
                    self.progress = None;
                    match result {
                        Ok(image) => self.show(viewer, image),
                        Err(e) => {
                            // Previous tiles stay up
                            log::warn!("ConusMosaic: {}", e);
                            self.message = Some(e.to_string());
                        }
                    }
                }
            }
        }
    }

    fn show(&mut self, viewer: &mut dyn Viewer, image: MosaicImage) {
        log::info!("ConusMosaic: showing {}", image.name);
        let [west, east] = image.canvases;
        for (i, (canvas, (north, south, e, w, zindex))) in
            [west, east].into_iter().zip(tile_bounds()).enumerate()
        {
            let tile = Tile {
                north,
                south,
                east: e,
                west: w,
                zindex,
                image: Arc::new(canvas),
                coords: image.coords,
            };
            let r = viewer.add(Drawable::Tile(tile), Level::World, true);
            if self.hidden {
                viewer.set_hidden(r, true);
            }
            if let Some(old) = self.tile_refs[i].replace(r) {
                viewer.remove(old);
            }
        }
        self.label = Some(image.name);
        self.image_time = image.time;
        viewer.queue_draw();
    }

    /// Removes both tiles from the viewer.
    pub fn remove(&mut self, viewer: &mut dyn Viewer) {
        for r in self.tile_refs.iter_mut() {
            if let Some(r) = r.take() {
                viewer.remove(r);
            }
        }
    }
}

impl Configurable for ConusMosaic {
    fn panel(&self) -> Option<Panel> {
        let content = match (self.progress, &self.message, &self.label) {
            (Some((current, total)), _, _) if total > 0 => PanelContent::Progress {
                fraction: (current as f32 / total as f32).min(1.0),
                text: progress_text(current, total),
            },
            (Some(_), _, _) => PanelContent::Progress {
                fraction: 0.0,
                text: "Loading...".to_string(),
            },
            (None, Some(message), _) => PanelContent::Message(message.clone()),
            (None, None, Some(label)) => PanelContent::Label(label.clone()),
            (None, None, None) => PanelContent::Label(String::new()),
        };
        Some(Panel {
            id: CONUS_PANEL_ID.to_string(),
            title: "Conus".to_string(),
            visible: !self.hidden,
            content,
        })
    }
}

/// Reads a mosaic image file and builds both tile canvases.
fn load_mosaic(path: &Path) -> Result<([RgbaBuffer; 2], TexCoords), DecodeError> {
    // Sniff the content; cached files are not always what their name says
    let image = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    let (width, height) = (image.width() as usize, image.height() as usize);
    if (width, height) != (CONUS_WIDTH, CONUS_HEIGHT) {
        log::warn!(
            "ConusMosaic: unexpected size {}x{} (expected {}x{})",
            width,
            height,
            CONUS_WIDTH,
            CONUS_HEIGHT
        );
    }
    let [west, east] = split_hemispheres(image.as_raw(), width, height);
    let coords = canvas_coords(west.width, west.height);
    Ok(([pad_canvas(&west)?, pad_canvas(&east)?], coords))
}

fn run_update(
    ctx: &LayerContext,
    time: i64,
    offline: bool,
    progress: &mut dyn FnMut(u64, u64),
) -> Result<MosaicImage, RadarError> {
    let conus_url = &ctx.settings.conus_url;
    let query = ListQuery {
        pattern: Regex::new(CONUS_FILE_PATTERN)
            .map_err(|e| RadarError::FetchFailed(e.to_string()))?,
        subdir: None,
        extract: Regex::new(CONUS_INDEX_EXTRACT)
            .map_err(|e| RadarError::FetchFailed(e.to_string()))?,
        index_url: (!offline).then(|| conus_url.clone()),
    };
    let files = ctx.conus_fetch.list_available(&query)?;
    let nearest = find_nearest(time, &files, CONUS_TIME_OFFSET, FILE_TIME_FORMAT)
        .ok_or(RadarError::NoSuitableFile)?;

    let url = format!("{}/{}", conus_url.trim_end_matches('/'), nearest);
    let path = ctx
        .conus_fetch
        .fetch(&url, nearest, FetchMode::Once, progress)?;
    let (canvases, coords) = load_mosaic(&path)?;
    Ok(MosaicImage {
        name: nearest.to_string(),
        time: file_time(nearest, CONUS_TIME_OFFSET, FILE_TIME_FORMAT),
        canvases,
        coords,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::{context_with_conus, GatedFetch, StubDecoder};
    use crate::viewer::testing::RecordingViewer;
    use std::time::{Duration, Instant};

    const T0: i64 = 1_715_031_300;

    #[test]
    fn test_pixel_rules() {
        assert_eq!(mosaic_pixel(245, 245, 245)[3], 0);
        assert_eq!(mosaic_pixel(0x04, 0xe9, 0xe7), [0x04, 0xe9, 0xe7, 0x30]);
        assert_eq!(mosaic_pixel(0x01, 0x9f, 0xf4)[3], 0x60);
        assert_eq!(mosaic_pixel(0x03, 0x00, 0xf4)[3], 0x90);
        assert_eq!(mosaic_pixel(10, 200, 30), [10, 200, 30, 0xff]);
        // Only all three channels above 0xe0 count as background
        assert_eq!(mosaic_pixel(0xff, 0xff, 0xe0)[3], 0xff);
    }

    #[test]
    fn test_split_halves() {
        // 4x1: white, legend color, plain, white
        let pixels = [
            245, 245, 245, 255, //
            0x04, 0xe9, 0xe7, 255, //
            10, 20, 30, 255, //
            250, 250, 250, 255,
        ];
        let [west, east] = split_hemispheres(&pixels, 4, 1);
        assert_eq!((west.width, west.height), (2, 1));
        assert_eq!(west.pixel(0, 0)[3], 0);
        assert_eq!(west.pixel(1, 0), [0x04, 0xe9, 0xe7, 0x30]);
        assert_eq!(east.pixel(0, 0), [10, 20, 30, 0xff]);
        assert_eq!(east.pixel(1, 0)[3], 0);
    }

    #[test]
    fn test_canvas_padding() {
        let mut half = RgbaBuffer::new(2, 2);
        half.pixels.iter_mut().for_each(|p| *p = 7);
        let canvas = pad_canvas(&half).unwrap();
        assert_eq!(canvas.width, CANVAS_SIZE);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(canvas.pixel(1, 1), [7, 7, 7, 7]);
        assert_eq!(canvas.pixel(2, 2), [7, 7, 7, 7]);
        assert_eq!(canvas.pixel(3, 3), [0, 0, 0, 0]);

        assert!(pad_canvas(&RgbaBuffer::new(CANVAS_SIZE, 1)).is_err());

        let coords = canvas_coords(CONUS_WIDTH / 2, CONUS_HEIGHT);
        assert!((coords.e - (1.0 + 1700.0) / 2048.0).abs() < 1e-6);
        assert!((coords.s - (1.0 + 1600.0) / 2048.0).abs() < 1e-6);
    }

    #[test]
    fn test_tile_bounds() {
        let [west, east] = tile_bounds();
        assert_eq!(west.3, CONUS_WEST);
        assert_eq!(west.2, east.3);
        assert_eq!((west.4, east.4), (2, 1));
        assert!((east.2 - (CONUS_WEST + 61.1024)).abs() < 1e-3);
    }

    fn write_gif(dir: &Path, name: &str) {
        let mut img = image::RgbaImage::new(8, 4);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = if x < 4 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([200, 0, 0, 255])
            };
        }
        // PNG content keeps the colors exact; the loader sniffs the format
        img.save_with_format(dir.join(name), image::ImageFormat::Png)
            .unwrap();
    }

    fn wait_idle(conus: &mut ConusMosaic, viewer: &mut RecordingViewer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while conus.is_loading() {
            assert!(Instant::now() < deadline, "timed out");
            conus.poll(viewer);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_update_adds_two_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let name = "Conus_20240506_2138_N0Ronly.gif";
        write_gif(dir.path(), name);
        let fetch = GatedFetch::closed(vec![name.into()]).with_root(dir.path());
        let ctx = context_with_conus(fetch.clone(), StubDecoder::ok());
        let mut viewer = RecordingViewer::new(T0);
        let mut conus = ConusMosaic::new(ctx);

        conus.update(&mut viewer);
        fetch.wait_for_fetches(1);
        conus.update(&mut viewer);
        assert_eq!(conus.generation(), 1);
        fetch.release();
        wait_idle(&mut conus, &mut viewer);

        let tiles = viewer.tiles();
        assert_eq!(tiles.len(), 2);
        let west = &tiles.iter().find(|(_, t)| t.zindex == 2).unwrap().1;
        assert_eq!(west.image.width, CANVAS_SIZE);
        assert_eq!(west.image.pixel(1, 1)[3], 0);
        let east = &tiles.iter().find(|(_, t)| t.zindex == 1).unwrap().1;
        assert_eq!(east.image.pixel(1, 1), [200, 0, 0, 255]);
        assert_eq!(
            conus.panel().unwrap().content,
            PanelContent::Label(name.into())
        );
        assert_eq!(conus.image_time(), Some(T0 + 180));

        conus.toggle_hidden(&mut viewer);
        assert!(tiles.iter().all(|(r, _)| viewer.is_hidden(*r)));

        // A failed refresh keeps the previous tiles
        fetch.fail_fetches();
        conus.update(&mut viewer);
        wait_idle(&mut conus, &mut viewer);
        assert_eq!(viewer.tiles().len(), 2);
        assert!(conus.message().unwrap().starts_with("Fetch failed"));
        assert_eq!(conus.image_time(), Some(T0 + 180));
        assert_eq!(fetch.fetch_modes(), vec![FetchMode::Once, FetchMode::Once]);
    }

    #[test]
    fn test_no_files() {
        let fetch = GatedFetch::open(Vec::new());
        let ctx = context_with_conus(fetch, StubDecoder::ok());
        let mut viewer = RecordingViewer::new(T0);
        let mut conus = ConusMosaic::new(ctx);
        conus.update(&mut viewer);
        wait_idle(&mut conus, &mut viewer);
        assert_eq!(conus.message(), Some("No suitable files found"));
        assert!(viewer.tiles().is_empty());
        assert_eq!(conus.image_time(), None);
    }
}
