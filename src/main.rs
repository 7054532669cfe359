#![warn(clippy::all)]

//! NEXRAD Layers demo viewer.

use nexrad_layers::app::LayersApp;
use nexrad_layers::settings::Settings;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let path = Settings::default_path();
    let settings = path.as_deref().map(Settings::load).unwrap_or_default();

    let native_options = eframe::NativeOptions::default();

    eframe::run_native(
        "NEXRAD Layers",
        native_options,
        Box::new(|cc| Ok(Box::new(LayersApp::new(cc, settings, path)))),
    )
}
