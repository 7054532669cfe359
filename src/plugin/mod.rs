//! Radar layers: per-site sweeps, the CONUS mosaic and the HUD legend.
//!
//! [`RadarPlugin`] owns all three and is driven from the UI thread: viewer
//! events go through [`RadarPlugin::handle_event`], worker results are
//! applied in [`RadarPlugin::poll`] once per frame, and the settings UI
//! reads [`RadarPlugin::panels`] and reports back with
//! [`RadarPlugin::handle_action`].

pub mod conus;
pub mod hud;
pub mod site;

pub use conus::ConusMosaic;
pub use hud::{legend_bars, Hud, LegendBar};
pub use site::{RadarSite, SiteStatus};

use crate::data::NEXRAD_SITES;
use crate::error::FetchError;
use crate::fetch::{FetchService, HttpArchive};
use crate::nexrad::{ArchiveDecoder, ColorMaps, MeshOptions, VolumeDecoder};
use crate::settings::Settings;
use crate::viewer::{Configurable, Panel, PanelAction, Viewer, ViewerEvent, Waker, CONUS_PANEL_ID};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Services shared by every layer and its workers.
pub struct LayerContext {
    pub settings: Settings,
    pub site_fetch: Arc<dyn FetchService>,
    pub conus_fetch: Arc<dyn FetchService>,
    pub decoder: Arc<dyn VolumeDecoder>,
    pub colormaps: ColorMaps,
    /// Called by workers after queueing a message
    pub waker: Waker,
}

impl LayerContext {
    /// Builds the HTTP-backed services described by `settings`.
    pub fn from_settings(settings: Settings, waker: Waker) -> Result<Self, FetchError> {
        let site_fetch = HttpArchive::new(settings.cache_subdir("nexrad/level2"))?;
        let conus_fetch = HttpArchive::new(settings.cache_subdir("nexrad/conus"))?;
        log::info!("Caching radar data under {}", settings.cache_dir.display());
        let decoder = ArchiveDecoder::from_command(settings.decompress_command.as_deref());
        Ok(Self {
            settings,
            site_fetch: Arc::new(site_fetch),
            conus_fetch: Arc::new(conus_fetch),
            decoder: Arc::new(decoder),
            colormaps: ColorMaps::builtin(),
            waker,
        })
    }

    pub fn mesh_options(&self) -> MeshOptions {
        MeshOptions {
            near_height: self.settings.near_height,
            v_bias: self.settings.tex_v_bias,
        }
    }
}

pub struct RadarPlugin {
    sites: BTreeMap<String, RadarSite>,
    conus: ConusMosaic,
    hud: Hud,
}

impl RadarPlugin {
    /// Adds a marker for every known site, starts the first mosaic fetch and
    /// loads whatever sites are close to the current camera.
    pub fn new(viewer: &mut dyn Viewer, ctx: Arc<LayerContext>) -> Self {
        let mut sites = BTreeMap::new();
        for site in NEXRAD_SITES.iter() {
            let layer = RadarSite::new(site, ctx.clone(), viewer);
            sites.insert(site.id.to_string(), layer);
        }
        let mut plugin = Self {
            sites,
            conus: ConusMosaic::new(ctx),
            hud: Hud::new(),
        };
        log::info!("RadarPlugin: {} sites", plugin.sites.len());
        plugin.conus.update(viewer);
        let eye = viewer.location();
        plugin.handle_event(viewer, ViewerEvent::LocationChanged(eye));
        plugin
    }

    pub fn site(&self, code: &str) -> Option<&RadarSite> {
        self.sites.get(code)
    }

    pub fn conus(&self) -> &ConusMosaic {
        &self.conus
    }

    pub fn hud(&self) -> &Hud {
        &self.hud
    }

    pub fn handle_event(&mut self, viewer: &mut dyn Viewer, event: ViewerEvent) {
        match event {
            ViewerEvent::TimeChanged(time) => {
                log::debug!("RadarPlugin: time changed to {}", time);
                self.conus.update(viewer);
                for site in self.sites.values_mut() {
                    site.on_time_changed(viewer);
                }
            }
            ViewerEvent::Refresh => {
                self.conus.update(viewer);
                for site in self.sites.values_mut() {
                    site.on_refresh(viewer);
                }
            }
            ViewerEvent::LocationChanged(eye) => {
                for site in self.sites.values_mut() {
                    site.on_location_changed(viewer, &eye);
                }
            }
        }
    }

    /// Applies worker results. The legend follows the last sweep shown.
    pub fn poll(&mut self, viewer: &mut dyn Viewer) {
        let mut shown = None;
        for site in self.sites.values_mut() {
            if let Some(colormap) = site.poll(viewer) {
                shown = Some(colormap);
            }
        }
        self.conus.poll(viewer);
        if let Some(colormap) = shown {
            self.hud.set_colormap(viewer, colormap);
        }
    }

    /// Mosaic panel first, then one per loaded site.
    pub fn panels(&self) -> Vec<Panel> {
        std::iter::once(self.conus.panel())
            .chain(self.sites.values().map(|site| site.panel()))
            .flatten()
            .collect()
    }

    pub fn handle_action(&mut self, viewer: &mut dyn Viewer, action: PanelAction) {
        match action {
            PanelAction::ToggleHidden(id) if id == CONUS_PANEL_ID => {
                self.conus.toggle_hidden(viewer);
            }
            PanelAction::ToggleHidden(id) => {
                if let Some(site) = self.sites.get_mut(&id) {
                    site.toggle_hidden(viewer);
                }
            }
            PanelAction::SelectSweep {
                id,
                product,
                elevation,
            } => {
                let colormap = self
                    .sites
                    .get_mut(&id)
                    .and_then(|site| site.select_sweep(viewer, product, elevation));
                if let Some(colormap) = colormap {
                    self.hud.set_colormap(viewer, colormap);
                }
            }
        }
    }

    /// Removes everything the layers added to the viewer.
    pub fn shutdown(mut self, viewer: &mut dyn Viewer) {
        self.hud.remove(viewer);
        self.conus.remove(viewer);
        for (_, site) in std::mem::take(&mut self.sites) {
            site.remove(viewer);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{context, GatedFetch, StubDecoder};
    use super::*;
    use crate::data::get_site;
    use crate::geo::Location;
    use crate::nexrad::Product;
    use crate::viewer::testing::RecordingViewer;
    use crate::viewer::{Level, PanelContent};
    use std::time::{Duration, Instant};

    const T0: i64 = 1_715_031_300;

    fn wait_loaded(plugin: &mut RadarPlugin, viewer: &mut RecordingViewer, code: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while plugin.site(code).map(|s| s.status()) != Some(SiteStatus::Loaded)
            || plugin.conus().is_loading()
        {
            assert!(Instant::now() < deadline, "timed out waiting for {code}");
            plugin.poll(viewer);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_plugin_routes_events() {
        let fetch = GatedFetch::open(vec!["KLSX_20240506_2135".into()]);
        let ctx = context(fetch.clone(), StubDecoder::ok());
        let mut viewer = RecordingViewer::new(T0);
        let mut plugin = RadarPlugin::new(&mut viewer, ctx);
        assert_eq!(viewer.count(Level::Overlay), NEXRAD_SITES.len());

        // Far from everything: only the mosaic panel
        let panels = plugin.panels();
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].id, CONUS_PANEL_ID);

        let klsx = get_site("KLSX").unwrap();
        let eye = Location::new(klsx.lat, klsx.lon, klsx.elev + 50_000.0);
        plugin.handle_event(&mut viewer, ViewerEvent::LocationChanged(eye));
        wait_loaded(&mut plugin, &mut viewer, "KLSX");
        assert_eq!(viewer.radars().len(), 1);
        assert_eq!(
            plugin.hud().colormap().unwrap().product,
            Product::Reflectivity
        );
        assert_eq!(viewer.count(Level::Hud), 1);
        assert_eq!(plugin.conus().message(), Some("No suitable files found"));

        let panels = plugin.panels();
        assert_eq!(panels.len(), 2);
        assert!(matches!(panels[1].content, PanelContent::Sweeps { .. }));

        // Time change refetches the loaded site only
        viewer.time = T0 + 60;
        plugin.handle_event(&mut viewer, ViewerEvent::TimeChanged(T0 + 60));
        assert_eq!(plugin.site("KLSX").unwrap().generation(), 2);
        assert_eq!(plugin.site("KTLX").unwrap().generation(), 0);
        wait_loaded(&mut plugin, &mut viewer, "KLSX");
        assert_eq!(fetch.list_calls(), 2);
        assert_eq!(viewer.radars().len(), 1);

        plugin.handle_action(
            &mut viewer,
            PanelAction::SelectSweep {
                id: "KLSX".into(),
                product: Product::Velocity,
                elevation: 1.5,
            },
        );
        assert_eq!(plugin.hud().colormap().unwrap().product, Product::Velocity);
        assert_eq!(viewer.radars()[0].1.elevation, 1.5);

        plugin.handle_action(&mut viewer, PanelAction::ToggleHidden("KLSX".into()));
        assert!(plugin.site("KLSX").unwrap().is_hidden());
        plugin.handle_action(
            &mut viewer,
            PanelAction::ToggleHidden(CONUS_PANEL_ID.into()),
        );
        assert!(plugin.conus().is_hidden());

        plugin.shutdown(&mut viewer);
        assert!(viewer.objects.is_empty());
    }
}
