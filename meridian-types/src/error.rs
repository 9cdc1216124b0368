//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypesError {
    /// The spatial reference string could not be parsed or describes an unsupported projection.
    #[error("invalid spatial reference '{srs}': {reason}")]
    InvalidCrs {
        /// The rejected definition.
        srs: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A box is not well-formed (`min > max` or non-finite values).
    #[error("invalid extent [{x_min}, {y_min}, {x_max}, {y_max}]")]
    InvalidExtent {
        /// Minimal x.
        x_min: f64,
        /// Minimal y.
        y_min: f64,
        /// Maximal x.
        x_max: f64,
        /// Maximal y.
        y_max: f64,
    },
    /// Coordinates cannot be transformed, or a coordinate array has a wrong length.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    /// Geometry text could not be parsed.
    #[error("invalid geometry: {0}")]
    Conversion(String),
}
