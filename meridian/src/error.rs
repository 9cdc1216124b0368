//! Error types used by the crate.

use meridian_types::TypesError;
use thiserror::Error;

/// Meridian error type.
#[derive(Debug, Error)]
pub enum MapError {
    /// Malformed or unsupported spatial reference string.
    #[error("invalid spatial reference '{srs}': {reason}")]
    InvalidCrs {
        /// The rejected definition.
        srs: String,
        /// What is wrong with it.
        reason: String,
    },
    /// An item with this name is already present.
    #[error("duplicate name '{0}'")]
    DuplicateName(String),
    /// Item not found.
    #[error("{0} not found")]
    NotFound(String),
    /// A box is not well-formed or an extent is required but not set.
    #[error("invalid extent: {0}")]
    InvalidExtent(String),
    /// Pixel coordinates outside of the image.
    #[error("pixel ({x}, {y}) is outside of {width}x{height} image")]
    OutOfBounds {
        /// Pixel x.
        x: i64,
        /// Pixel y.
        y: i64,
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },
    /// Unknown composite operator name.
    #[error("unsupported composite operator '{0}'")]
    UnsupportedOperator(String),
    /// A palette-based encoding was requested without a palette.
    #[error("format '{0}' requires a palette")]
    MissingPalette(String),
    /// Unknown or malformed image format string.
    #[error("unsupported image format '{0}'")]
    UnsupportedFormat(String),
    /// All pooled connections are in use.
    #[error("connection pool exhausted (max size {max_size})")]
    PoolExhausted {
        /// Configured pool size.
        max_size: usize,
    },
    /// A datasource option is missing or has a wrong value.
    #[error("datasource '{datasource}': invalid parameter '{key}': {reason}")]
    InvalidParameter {
        /// Datasource type tag.
        datasource: String,
        /// Option name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Image or map size out of the allowed range.
    #[error("invalid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Why the size was rejected.
        reason: &'static str,
    },
    /// Color string cannot be parsed.
    #[error("invalid color '{0}'")]
    InvalidColor(String),
    /// Palette bytes cannot be decoded.
    #[error("invalid palette: {0}")]
    InvalidPalette(String),
    /// Coordinates cannot be used or transformed.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    /// Geometry cannot be read.
    #[error("invalid geometry: {0}")]
    Geometry(String),
    /// Stylesheet cannot be read or contains invalid values.
    #[error("stylesheet error: {0}")]
    Stylesheet(String),
    /// Process-wide registry is used in a wrong state.
    #[error("registry error: {0}")]
    Registry(String),
    /// Operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
    /// Rendering of a layer failed.
    #[error("failed to render layer '{layer}' (index {index}): {source}")]
    Layer {
        /// Layer name.
        layer: String,
        /// Layer index in the map.
        index: usize,
        /// The cause.
        #[source]
        source: Box<MapError>,
    },
    /// Processing of a feature failed.
    #[error("feature {id}: {source}")]
    Feature {
        /// Feature id.
        id: i64,
        /// The cause.
        #[source]
        source: Box<MapError>,
    },
    /// Background task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
    /// Error reading/writing data to the FS.
    #[error("i/o error: {0}")]
    FsIo(#[from] std::io::Error),
    /// Image decoding or encoding error.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    /// Indexed PNG encoding error.
    #[error("png encoding error: {0}")]
    PngEncoding(#[from] png::EncodingError),
    /// CSV reading error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// XML syntax error.
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl From<TypesError> for MapError {
    fn from(value: TypesError) -> Self {
        match value {
            TypesError::InvalidCrs { srs, reason } => MapError::InvalidCrs { srs, reason },
            TypesError::InvalidExtent {
                x_min,
                y_min,
                x_max,
                y_max,
            } => MapError::InvalidExtent(format!("[{x_min}, {y_min}, {x_max}, {y_max}]")),
            TypesError::InvalidCoordinates(message) => MapError::InvalidCoordinates(message),
            TypesError::Conversion(message) => MapError::Geometry(message),
        }
    }
}

impl MapError {
    pub(crate) fn in_layer(self, layer: &str, index: usize) -> Self {
        match self {
            MapError::Cancelled => MapError::Cancelled,
            other => MapError::Layer {
                layer: layer.to_string(),
                index,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn in_feature(self, id: i64) -> Self {
        MapError::Feature {
            id,
            source: Box::new(self),
        }
    }

    pub(crate) fn invalid_parameter(
        datasource: &str,
        key: &str,
        reason: impl Into<String>,
    ) -> Self {
        MapError::InvalidParameter {
            datasource: datasource.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
