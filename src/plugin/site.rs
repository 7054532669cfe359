//! Per-site load/unload lifecycle.
//!
//! A site starts UNLOADED with only its map marker. Moving the camera close
//! enough loads it: the site subscribes to time/refresh events and fetches
//! the volume nearest the viewer time on a worker thread. The worker reports
//! progress and its final result over a channel which the UI thread drains
//! in [`RadarSite::poll`]. Moving far away unloads it again.

use super::LayerContext;
use crate::data::NexradSite;
use crate::error::RadarError;
use crate::fetch::{
    find_nearest, progress_text, FetchMode, ListQuery, FILE_TIME_FORMAT, SITE_TIME_OFFSET,
};
use crate::geo::{distance, Location};
use crate::nexrad::{ColorMap, Level2, Product, SweepChoices, SweepDisplay};
use crate::viewer::{Configurable, Drawable, Level, Marker, ObjectRef, Panel, PanelContent, Viewer};
use regex::Regex;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Level-II file names, e.g. `KLSX_20240506_2135`.
const SITE_FILE_PATTERN: &str = r"^K\w{3}_\d{8}_\d{4}$";
/// Lines of the remote `dir.list` index: `<size> <name>`.
const SITE_INDEX_EXTRACT: &str = r"\d+ (.*)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Unloaded,
    Loading,
    Loaded,
}

/// A decoded volume and its first display.
struct LoadedVolume {
    level2: Arc<Level2>,
    display: Option<SweepDisplay>,
    choices: SweepChoices,
}

/// Messages from the worker thread.
enum WorkerMessage {
    Progress {
        generation: u64,
        current: u64,
        total: u64,
    },
    Finished {
        generation: u64,
        result: Result<LoadedVolume, RadarError>,
    },
}

/// Everything a worker needs, captured on the UI thread.
struct UpdateJob {
    code: String,
    time: i64,
    offline: bool,
    generation: u64,
}

pub struct RadarSite {
    site: &'static NexradSite,
    ctx: Arc<LayerContext>,

    status: SiteStatus,
    hidden: bool,
    /// Receives time-changed and refresh events while loaded
    subscribed: bool,
    /// Latest requested update; older results are discarded
    generation: u64,
    /// Viewer time of the latest request
    time: i64,

    level2: Option<Arc<Level2>>,
    display: Option<Arc<SweepDisplay>>,
    display_ref: Option<ObjectRef>,
    choices: SweepChoices,
    marker_ref: Option<ObjectRef>,

    message: Option<String>,
    progress: Option<(u64, u64)>,

    sender: Sender<WorkerMessage>,
    receiver: Receiver<WorkerMessage>,
}

impl RadarSite {
    /// Creates an unloaded site and adds its marker.
    pub fn new(
        site: &'static NexradSite,
        ctx: Arc<LayerContext>,
        viewer: &mut dyn Viewer,
    ) -> Self {
        let marker_ref = viewer.add(
            Drawable::Marker(Marker {
                label: site.name.to_string(),
                lat: site.lat,
                lon: site.lon,
            }),
            Level::Overlay,
            false,
        );
        let (sender, receiver) = channel();
        Self {
            site,
            ctx,
            status: SiteStatus::Unloaded,
            hidden: false,
            subscribed: false,
            generation: 0,
            time: 0,
            level2: None,
            display: None,
            display_ref: None,
            choices: SweepChoices::default(),
            marker_ref: Some(marker_ref),
            message: None,
            progress: None,
            sender,
            receiver,
        }
    }

    pub fn code(&self) -> &'static str {
        self.site.id
    }

    pub fn status(&self) -> SiteStatus {
        self.status
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
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

    /// Colormap of the sweep currently displayed.
    pub fn colormap(&self) -> Option<Arc<ColorMap>> {
        self.display.as_ref().map(|d| d.colormap.clone())
    }

    fn location(&self) -> Location {
        Location::new(self.site.lat, self.site.lon, self.site.elev)
    }

    /// Loads or unloads depending on the camera distance.
    ///
    /// Loads within the load distance when the site is also within 1.25x
    /// the camera elevation; unloads beyond twice the load distance.
    pub fn on_location_changed(&mut self, viewer: &mut dyn Viewer, eye: &Location) {
        let min_dist = self.ctx.settings.load_distance_m;
        let dist = distance(&self.location(), eye);
        if dist <= min_dist && dist < eye.elev * 1.25 && self.status == SiteStatus::Unloaded {
            self.load(viewer);
        } else if dist > 2.0 * min_dist && self.status != SiteStatus::Unloaded {
            self.unload(viewer);
        }
    }

    /// Subscribes to viewer events and starts the first update.
    pub fn load(&mut self, viewer: &mut dyn Viewer) {
        log::debug!("RadarSite {}: load", self.code());
        self.subscribed = true;
        self.update(viewer);
    }

    /// Starts fetching the volume nearest the viewer time.
    ///
    /// Dropped while a previous update is still loading.
    pub fn update(&mut self, viewer: &mut dyn Viewer) {
        if self.status == SiteStatus::Loading {
            log::debug!("RadarSite {}: update already in progress", self.code());
            return;
        }
        self.status = SiteStatus::Loading;
        self.time = viewer.time();
        self.generation += 1;
        self.message = None;
        self.progress = Some((0, 0));
        log::debug!(
            "RadarSite {}: update {} (generation {})",
            self.code(),
            self.time,
            self.generation
        );

        let job = UpdateJob {
            code: self.code().to_string(),
            time: self.time,
            offline: viewer.is_offline(),
            generation: self.generation,
        };
        let ctx = self.ctx.clone();
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            let generation = job.generation;
            let progress_sender = sender.clone();
            let waker = ctx.waker.clone();
            let result = run_update(&ctx, &job, &mut |current, total| {
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
        viewer.queue_draw();
    }

    /// Unsubscribes and removes the display. Ignored unless loaded.
    pub fn unload(&mut self, viewer: &mut dyn Viewer) {
        if self.status != SiteStatus::Loaded {
            return;
        }
        log::debug!("RadarSite {}: unload", self.code());
        self.subscribed = false;
        self.remove_display(viewer);
        self.level2 = None;
        self.choices = SweepChoices::default();
        self.message = None;
        self.progress = None;
        self.status = SiteStatus::Unloaded;
        viewer.queue_draw();
    }

    pub fn on_time_changed(&mut self, viewer: &mut dyn Viewer) {
        if self.subscribed {
            self.update(viewer);
        }
    }

    pub fn on_refresh(&mut self, viewer: &mut dyn Viewer) {
        if self.subscribed {
            self.update(viewer);
        }
    }

    pub fn toggle_hidden(&mut self, viewer: &mut dyn Viewer) {
        self.hidden = !self.hidden;
        if let Some(r) = self.display_ref {
            viewer.set_hidden(r, self.hidden);
            viewer.queue_draw();
        }
    }

    /// Replaces the display with the sweep of `product` closest to
    /// `elevation`.
    pub fn select_sweep(
        &mut self,
        viewer: &mut dyn Viewer,
        product: Product,
        elevation: f32,
    ) -> Option<Arc<ColorMap>> {
        if self.status != SiteStatus::Loaded {
            return None;
        }
        let display = self.level2.as_ref()?.set_sweep(product, elevation)?;
        self.show(viewer, display);
        self.colormap()
    }

    /// Applies finished worker messages. Returns the colormap when a new
    /// sweep was put on display.
    pub fn poll(&mut self, viewer: &mut dyn Viewer) -> Option<Arc<ColorMap>> {
        let mut shown = None;
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                WorkerMessage::Progress {
                    generation,
                    current,
                    total,
                } => {
                    if generation == self.generation && self.status == SiteStatus::Loading {
                        self.progress = Some((current, total));
                    }
                }
                WorkerMessage::Finished { generation, result } => {
                    if generation != self.generation {
                        log::debug!(
                            "RadarSite {}: discarding stale result {} (latest {})",
                            self.code(),
                            generation,
                            self.generation
                        );
                        continue;
                    }
                    shown = self.finish(viewer, result).or(shown);
                }
            }
        }
        shown
    }

    fn finish(
        &mut self,
        viewer: &mut dyn Viewer,
        result: Result<LoadedVolume, RadarError>,
    ) -> Option<Arc<ColorMap>> {
        self.status = SiteStatus::Loaded;
        self.progress = None;
        match result {
            Ok(loaded) => {
                log::info!("RadarSite {}: loaded {}", self.code(), loaded.choices.time);
                self.level2 = Some(loaded.level2);
                self.choices = loaded.choices;
                match loaded.display {
                    Some(display) => {
                        self.show(viewer, display);
                        self.colormap()
                    }
                    None => {
                        self.remove_display(viewer);
                        viewer.queue_draw();
                        None
                    }
                }
            }
            Err(e) => {
                log::warn!("RadarSite {}: {}", self.code(), e);
                self.message = Some(e.to_string());
                self.level2 = None;
                self.choices = SweepChoices::default();
                self.remove_display(viewer);
                viewer.queue_draw();
                None
            }
        }
    }

    /// Adds `display`, then removes whatever it replaces.
    fn show(&mut self, viewer: &mut dyn Viewer, display: SweepDisplay) {
        let old = self.display_ref.take();
        if display.is_empty() {
            log::debug!("RadarSite {}: empty sweep", self.code());
            self.display = None;
        } else {
            let display = Arc::new(display);
            let r = viewer.add(Drawable::Radar(display.clone()), Level::World, true);
            if self.hidden {
                viewer.set_hidden(r, true);
            }
            self.display = Some(display);
            self.display_ref = Some(r);
        }
        if let Some(old) = old {
            viewer.remove(old);
        }
        viewer.queue_draw();
    }

    fn remove_display(&mut self, viewer: &mut dyn Viewer) {
        if let Some(r) = self.display_ref.take() {
            viewer.remove(r);
        }
        self.display = None;
    }

    /// Removes everything this site added to the viewer.
    pub fn remove(mut self, viewer: &mut dyn Viewer) {
        self.remove_display(viewer);
        if let Some(r) = self.marker_ref.take() {
            viewer.remove(r);
        }
    }
}

impl Configurable for RadarSite {
    fn panel(&self) -> Option<Panel> {
        if !self.subscribed {
            return None;
        }
        let content = if let Some((current, total)) = self.progress {
            let fraction = if total > 0 {
                (current as f32 / total as f32).min(1.0)
            } else {
                0.0
            };
            let text = if total > 0 {
                progress_text(current, total)
            } else {
                "Loading...".to_string()
            };
            PanelContent::Progress { fraction, text }
        } else if let Some(message) = &self.message {
            PanelContent::Message(message.clone())
        } else {
            PanelContent::Sweeps {
                choices: self.choices.clone(),
                selected: self.display.as_ref().map(|d| (d.product, d.elevation)),
            }
        };
        Some(Panel {
            id: self.code().to_string(),
            title: self.site.name.to_string(),
            visible: !self.hidden,
            content,
        })
    }
}

/// Worker body: list, pick nearest, fetch, decode and build the display.
fn run_update(
    ctx: &LayerContext,
    job: &UpdateJob,
    progress: &mut dyn FnMut(u64, u64),
) -> Result<LoadedVolume, RadarError> {
    let nexrad_url = ctx.settings.nexrad_url.trim_end_matches('/');
    let query = ListQuery {
        pattern: Regex::new(SITE_FILE_PATTERN)
            .map_err(|e| RadarError::FetchFailed(e.to_string()))?,
        subdir: Some(job.code.clone()),
        extract: Regex::new(SITE_INDEX_EXTRACT)
            .map_err(|e| RadarError::FetchFailed(e.to_string()))?,
        index_url: (!job.offline).then(|| format!("{}/{}/dir.list", nexrad_url, job.code)),
    };
    let files = ctx.site_fetch.list_available(&query)?;
    let nearest = find_nearest(job.time, &files, SITE_TIME_OFFSET, FILE_TIME_FORMAT)
        .ok_or(RadarError::NoSuitableFile)?;

    let local = format!("{}/{}", job.code, nearest);
    let url = format!("{}/{}", nexrad_url, local);
    let mode = if job.offline {
        FetchMode::Local
    } else {
        FetchMode::Update
    };
    log::debug!("RadarSite {}: fetch {}", job.code, url);
    let path = ctx.site_fetch.fetch(&url, &local, mode, progress)?;

    log::debug!("RadarSite {}: decode {}", job.code, path.display());
    let radar = ctx.decoder.decode(&path, &job.code)?;
    let level2 = Level2::new(radar, ctx.colormaps.clone(), ctx.mesh_options());
    let display = level2.initial_sweep();
    let choices = level2.sweep_choices();
    Ok(LoadedVolume {
        level2: Arc::new(level2),
        display,
        choices,
    })
}
