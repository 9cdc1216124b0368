//! Meridian composes maps out of layers and renders them into raster images on the CPU.
//!
//! # Quick start
//!
//! A map with one layer, read from inline CSV and drawn with a single style:
//!
//! ```
//! use meridian::datasource::{Datasource, Parameters};
//! use meridian::{Color, Image, Layer, Map, MarkerSymbolizer, RenderOptions, Style};
//!
//! let mut parameters = Parameters::new();
//! parameters.insert("type".into(), "csv".into());
//! parameters.insert(
//!     "inline".into(),
//!     "wkt,name\n\"POLYGON((-10 -10,10 -10,10 10,-10 10,-10 -10))\",square\n".into(),
//! );
//!
//! let mut map = Map::new(100, 100).unwrap();
//! map.set_background(Some(Color::WHITE));
//! map.add_style("markers", Style::new(MarkerSymbolizer::new(Color::RED, 8.0)))
//!     .unwrap();
//! map.add_layer(
//!     Layer::new("squares")
//!         .with_datasource(Datasource::new(parameters).unwrap())
//!         .with_style("markers"),
//! )
//! .unwrap();
//! map.zoom_all().unwrap();
//!
//! let mut image = Image::new(100, 100).unwrap();
//! map.render(&mut image, &RenderOptions::default()).unwrap();
//! assert_eq!(image.get_pixel(50, 50), Some(Color::RED));
//! assert_eq!(image.get_pixel(2, 2), Some(Color::WHITE));
//! ```
//!
//! # Main components
//!
//! * [`Map`] holds the size of the output, the projection and extent of the view, named
//!   [`Style`]s and an ordered collection of [`Layer`]s. Maps are built in code, with
//!   [`MapBuilder`](map::MapBuilder), or loaded from an XML stylesheet.
//! * [`Layer`]s bind a [`Datasource`] to style names and a visibility range.
//! * [`datasource`]s read [`Feature`]s. `csv` and `memory` are built in, other types are
//!   provided by plugins through the [`registry`].
//! * [`Image`] is the RGBA raster the map is rendered into. It can be composited, encoded and
//!   saved.
//! * [`tile`] splits a map into a grid of tiles and [`task`] runs rendering on a background
//!   thread pool.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

mod color;
pub mod datasource;
pub mod error;
pub mod feature;
pub mod image;
pub mod layer;
pub mod map;
pub mod palette;
pub mod registry;
pub mod render;
pub mod style;
pub mod task;
pub mod tile;

pub use color::Color;
pub use datasource::Datasource;
pub use error::MapError;
pub use feature::{Feature, Featureset, Value};
pub use image::{CompositeOp, CompositeOptions, EncodeOptions, Image, ImageFormat, ImageView};
pub use layer::Layer;
pub use map::{Map, MapBuilder, QueryOptions, QueryResult};
pub use palette::Palette;
pub use render::RenderOptions;
pub use style::{LineSymbolizer, MarkerSymbolizer, PolygonSymbolizer, Style, Symbolizer};
pub use task::{CancelToken, EncodeTask, RenderTask};
pub use tile::{TileGrid, TileIndex};

// Reexport meridian_types
pub use meridian_types;
