//! This example shows how to load a stylesheet and render the map into an image file.
//!
//! Run it with an optional path to a stylesheet and an optional output file name. Without
//! arguments it renders `demos/countries.xml` into `output_map.png`.
//!
//! ```shell
//! cargo run --example render_to_file -- ./meridian/demos/countries.xml output_map.png
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use meridian::image::EncodeOptions;
use meridian::map::LoadOptions;
use meridian::{registry, Map, RenderOptions};

const DEFAULT_STYLESHEET: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/countries.xml");

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let stylesheet = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLESHEET));
    let output = args.next().unwrap_or_else(|| "output_map.png".to_string());
    if args.next().is_some() {
        return Err(anyhow!(
            "This example takes at most two arguments - the stylesheet and the output file"
        ));
    }

    // Fonts and plugins are picked up from MERIDIAN_FONT_PATH and MERIDIAN_PLUGIN_PATH.
    registry::init(registry::Settings::from_env())?;
    log::info!("Available datasources: {:?}", registry::datasources());

    let mut map = Map::new(1024, 512)?;
    map.load(&stylesheet, &LoadOptions::default())?;
    map.zoom_all()?;

    log::info!(
        "Rendering {} layers at 1:{:.0}",
        map.layers().len(),
        map.scale_denominator().unwrap_or_default()
    );

    let options = RenderOptions::default().with_buffer_size(16);
    map.render_to_file(&output, None, &options, &EncodeOptions::default())?;
    log::info!("Map is saved to {output}");

    registry::shutdown();
    Ok(())
}
