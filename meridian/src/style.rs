//! Styles describe how features of a layer are drawn.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::image::CompositeOp;

/// Shape of line ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    /// Round caps.
    Round,
    /// Line ends exactly at its end points.
    #[default]
    Butt,
    /// Square caps extending past the end points.
    Square,
}

/// Fills polygons and optionally draws their outline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonSymbolizer {
    /// Color of the inner area of the polygon.
    pub fill_color: Color,
    /// Color of the outline.
    pub stroke_color: Color,
    /// Width of the outline in pixels.
    pub stroke_width: f64,
}

impl PolygonSymbolizer {
    /// Creates a new instance without outline.
    pub fn new(fill_color: Color) -> Self {
        Self {
            fill_color,
            stroke_color: Color::TRANSPARENT,
            stroke_width: 0.0,
        }
    }

    /// Creates a new instance from a copy of the current, but with the given stroke color.
    pub fn with_stroke_color(&self, stroke_color: Color) -> Self {
        Self {
            stroke_color,
            ..*self
        }
    }

    /// Creates a new instance from a copy of the current, but with the given stroke width.
    pub fn with_stroke_width(&self, stroke_width: f64) -> Self {
        Self {
            stroke_width,
            ..*self
        }
    }
}

/// Draws lines and polygon outlines with a fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSymbolizer {
    /// Color of the line.
    pub color: Color,
    /// Width of the line in pixels.
    pub width: f64,
    /// Line end shape.
    #[serde(default)]
    pub line_cap: LineCap,
}

impl LineSymbolizer {
    /// Creates a new instance.
    pub fn new(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            line_cap: LineCap::Butt,
        }
    }
}

/// Draws a circle at every point, at every vertex of a line and at the center of a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerSymbolizer {
    /// Fill color of the circle.
    pub color: Color,
    /// Diameter in pixels.
    pub size: f64,
}

impl MarkerSymbolizer {
    /// Creates a new instance.
    pub fn new(color: Color, size: f64) -> Self {
        Self { color, size }
    }
}

/// A single drawing instruction of a style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Symbolizer {
    /// Polygon fill.
    Polygon(PolygonSymbolizer),
    /// Line stroke.
    Line(LineSymbolizer),
    /// Circle marker.
    Marker(MarkerSymbolizer),
}

impl From<PolygonSymbolizer> for Symbolizer {
    fn from(value: PolygonSymbolizer) -> Self {
        Self::Polygon(value)
    }
}

impl From<LineSymbolizer> for Symbolizer {
    fn from(value: LineSymbolizer) -> Self {
        Self::Line(value)
    }
}

impl From<MarkerSymbolizer> for Symbolizer {
    fn from(value: MarkerSymbolizer) -> Self {
        Self::Marker(value)
    }
}

/// Named set of symbolizers referenced by layers.
///
/// Every style of a layer is drawn into its own buffer, which is then composited onto the
/// target with the style operator and opacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Symbolizers applied to every feature, in order.
    pub symbolizers: Vec<Symbolizer>,
    /// Opacity of the whole style, `1.0` by default.
    pub opacity: f32,
    /// Operator used to composite the style, the render default when not set.
    pub comp_op: Option<CompositeOp>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            symbolizers: Vec::new(),
            opacity: 1.0,
            comp_op: None,
        }
    }
}

impl Style {
    /// Style with a single symbolizer.
    pub fn new(symbolizer: impl Into<Symbolizer>) -> Self {
        Self::default().with_symbolizer(symbolizer)
    }

    /// Appends a symbolizer.
    pub fn with_symbolizer(mut self, symbolizer: impl Into<Symbolizer>) -> Self {
        self.symbolizers.push(symbolizer.into());
        self
    }

    /// Sets the style opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Sets the composite operator.
    pub fn with_comp_op(mut self, comp_op: CompositeOp) -> Self {
        self.comp_op = Some(comp_op);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_serialization() {
        let style = Style::new(PolygonSymbolizer::new(Color::GREEN).with_stroke_width(2.0))
            .with_symbolizer(LineSymbolizer::new(Color::BLACK, 0.5))
            .with_comp_op(CompositeOp::Multiply);

        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["symbolizers"][0]["type"], "polygon");
        assert_eq!(json["symbolizers"][0]["fill_color"], "#008000");
        assert_eq!(json["comp_op"], "multiply");

        let restored: Style = serde_json::from_value(json).unwrap();
        assert_eq!(restored, style);
    }
}
