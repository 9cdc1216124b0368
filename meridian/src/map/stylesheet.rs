//! XML stylesheet reading and writing.
//!
//! ```xml
//! <Map srs="+proj=longlat +datum=WGS84" background-color="#ffffff" buffer-size="16">
//!   <Parameters>
//!     <Parameter name="attribution">OSM contributors</Parameter>
//!   </Parameters>
//!   <Style name="countries" opacity="0.8" comp-op="multiply">
//!     <Rule>
//!       <PolygonSymbolizer fill="#008000" stroke="#000000" stroke-width="0.5"/>
//!     </Rule>
//!   </Style>
//!   <Layer name="countries" srs="+proj=longlat +datum=WGS84" status="on">
//!     <StyleName>countries</StyleName>
//!     <Datasource>
//!       <Parameter name="type">csv</Parameter>
//!       <Parameter name="file">countries.csv</Parameter>
//!     </Datasource>
//!   </Layer>
//! </Map>
//! ```

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use meridian_types::cartesian::Rect;
use roxmltree::Node;

use super::Map;
use crate::color::Color;
use crate::datasource::{Datasource, Parameters};
use crate::error::MapError;
use crate::image::CompositeOp;
use crate::layer::Layer;
use crate::style::{
    LineCap, LineSymbolizer, MarkerSymbolizer, PolygonSymbolizer, Style, Symbolizer,
};

/// Options of stylesheet loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Fail on datasources that cannot be opened and on unknown elements instead of logging
    /// and skipping them.
    pub strict: bool,
    /// Directory relative datasource files are resolved against. When loading from a file,
    /// defaults to the directory of that file.
    pub base: Option<PathBuf>,
}

impl Map {
    /// Reads a stylesheet file into the map.
    ///
    /// Styles and layers are added to the ones the map already has, map properties present
    /// in the stylesheet replace the current values.
    pub fn load(&mut self, path: impl AsRef<Path>, options: &LoadOptions) -> Result<(), MapError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)?;
        let mut options = options.clone();
        if options.base.is_none() {
            options.base = path.parent().map(Path::to_path_buf);
        }

        self.from_string(&xml, &options)
    }

    /// Reads a stylesheet from a string into the map. See [`Map::load`].
    #[allow(clippy::wrong_self_convention)]
    pub fn from_string(&mut self, xml: &str, options: &LoadOptions) -> Result<(), MapError> {
        let document = roxmltree::Document::parse(xml)?;
        let root = document.root_element();
        if root.tag_name().name() != "Map" {
            return Err(MapError::Stylesheet(format!(
                "root element must be <Map>, got <{}>",
                root.tag_name().name()
            )));
        }

        let mut loader = Loader {
            map: self,
            options,
        };
        loader.read_map_attributes(root)?;

        for child in root.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "Parameters" => loader.read_parameters(child)?,
                "Style" => loader.read_style(child)?,
                "Layer" => loader.read_layer(child)?,
                other => loader.unknown(other, "Map")?,
            }
        }

        Ok(())
    }

    /// Writes the map properties, styles and layers as a stylesheet.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let _ = write!(xml, "<Map srs=\"{}\"", escape(self.srs()));
        if let Some(background) = self.background {
            let _ = write!(xml, " background-color=\"{}\"", background.hex());
        }
        if self.buffer_size > 0 {
            let _ = write!(xml, " buffer-size=\"{}\"", self.buffer_size);
        }
        if let Some(maximum) = self.maximum_extent {
            let _ = write!(xml, " maximum-extent=\"{}\"", format_box(&maximum));
        }
        xml.push_str(">\n");

        if !self.parameters.is_empty() {
            xml.push_str("  <Parameters>\n");
            for (name, value) in &self.parameters {
                let _ = writeln!(
                    xml,
                    "    <Parameter name=\"{}\">{}</Parameter>",
                    escape(name),
                    escape(value)
                );
            }
            xml.push_str("  </Parameters>\n");
        }

        for (name, style) in &self.styles {
            write_style(&mut xml, name, style);
        }

        for layer in self.layers.iter() {
            write_layer(&mut xml, layer);
        }

        xml.push_str("</Map>\n");
        xml
    }

    /// Writes the stylesheet into a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MapError> {
        std::fs::write(path, self.to_xml())?;
        Ok(())
    }
}

struct Loader<'a> {
    map: &'a mut Map,
    options: &'a LoadOptions,
}

impl Loader<'_> {
    fn unknown(&self, element: &str, parent: &str) -> Result<(), MapError> {
        let message = format!("unknown element <{element}> in <{parent}>");
        if self.options.strict {
            return Err(MapError::Stylesheet(message));
        }

        log::warn!("Stylesheet: {message}, ignored");
        Ok(())
    }

    fn read_map_attributes(&mut self, node: Node) -> Result<(), MapError> {
        if let Some(srs) = node.attribute("srs") {
            self.map.set_srs(srs)?;
        }
        if let Some(color) = attribute::<Color>(node, "background-color")? {
            self.map.set_background(Some(color));
        }
        if let Some(buffer_size) = attribute::<u32>(node, "buffer-size")? {
            self.map.set_buffer_size(buffer_size);
        }
        if let Some(value) = node.attribute("maximum-extent") {
            self.map.set_maximum_extent(Some(parse_box(value)?))?;
        }

        Ok(())
    }

    fn read_parameters(&mut self, node: Node) -> Result<(), MapError> {
        for parameter in node.children().filter(Node::is_element) {
            if parameter.tag_name().name() != "Parameter" {
                self.unknown(parameter.tag_name().name(), "Parameters")?;
                continue;
            }

            let (name, value) = read_parameter(parameter)?;
            self.map.parameters_mut().insert(name, value);
        }

        Ok(())
    }

    fn read_style(&mut self, node: Node) -> Result<(), MapError> {
        let name = required_attribute(node, "name")?;
        let mut style = Style::default();
        if let Some(opacity) = attribute::<f32>(node, "opacity")? {
            style.opacity = opacity;
        }
        style.comp_op = attribute::<CompositeOp>(node, "comp-op")?;

        for rule in node.children().filter(Node::is_element) {
            if rule.tag_name().name() != "Rule" {
                self.unknown(rule.tag_name().name(), "Style")?;
                continue;
            }

            for symbolizer in rule.children().filter(Node::is_element) {
                match read_symbolizer(symbolizer)? {
                    Some(symbolizer) => style.symbolizers.push(symbolizer),
                    None => self.unknown(symbolizer.tag_name().name(), "Rule")?,
                }
            }
        }

        self.map.add_style(name, style)
    }

    fn read_layer(&mut self, node: Node) -> Result<(), MapError> {
        let name = required_attribute(node, "name")?;
        let mut layer = match node.attribute("srs") {
            Some(srs) => Layer::with_srs(name, srs)?,
            None => Layer::new(name),
        };

        match node.attribute("status") {
            None | Some("on") => {}
            Some("off") => layer.set_active(false),
            Some(other) => {
                return Err(MapError::Stylesheet(format!(
                    "layer '{name}': invalid status '{other}'"
                )))
            }
        }

        let minimum = attribute::<f64>(node, "minimum-scale-denominator")?;
        let maximum = attribute::<f64>(node, "maximum-scale-denominator")?;
        if minimum.is_some() || maximum.is_some() {
            layer.set_scale_range(
                minimum.unwrap_or(layer.minimum_scale_denominator()),
                maximum.unwrap_or(layer.maximum_scale_denominator()),
            );
        }

        for child in node.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "StyleName" => layer.add_style(child.text().unwrap_or_default().trim()),
                "Datasource" => {
                    if let Some(datasource) = self.read_datasource(name, child)? {
                        layer.set_datasource(datasource);
                    }
                }
                other => self.unknown(other, "Layer")?,
            }
        }

        self.map.add_layer(layer)
    }

    fn read_datasource(&self, layer: &str, node: Node) -> Result<Option<Datasource>, MapError> {
        let mut parameters = Parameters::new();
        for parameter in node.children().filter(Node::is_element) {
            if parameter.tag_name().name() != "Parameter" {
                self.unknown(parameter.tag_name().name(), "Datasource")?;
                continue;
            }

            let (name, value) = read_parameter(parameter)?;
            parameters.insert(name, value);
        }

        match Datasource::with_base(parameters, self.options.base.as_deref()) {
            Ok(datasource) => Ok(Some(datasource)),
            Err(err) if !self.options.strict => {
                log::warn!("Stylesheet: datasource of layer '{layer}' is skipped: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn read_symbolizer(node: Node) -> Result<Option<Symbolizer>, MapError> {
    let symbolizer = match node.tag_name().name() {
        "PolygonSymbolizer" => PolygonSymbolizer {
            fill_color: attribute(node, "fill")?.unwrap_or(Color::GRAY),
            stroke_color: attribute(node, "stroke")?.unwrap_or(Color::TRANSPARENT),
            stroke_width: attribute(node, "stroke-width")?.unwrap_or(0.0),
        }
        .into(),
        "LineSymbolizer" => LineSymbolizer {
            color: attribute(node, "stroke")?.unwrap_or(Color::BLACK),
            width: attribute(node, "stroke-width")?.unwrap_or(1.0),
            line_cap: match node.attribute("stroke-linecap") {
                None | Some("butt") => LineCap::Butt,
                Some("round") => LineCap::Round,
                Some("square") => LineCap::Square,
                Some(other) => {
                    return Err(MapError::Stylesheet(format!(
                        "invalid stroke-linecap '{other}'"
                    )))
                }
            },
        }
        .into(),
        "MarkerSymbolizer" => MarkerSymbolizer {
            color: attribute(node, "fill")?.unwrap_or(Color::BLUE),
            size: attribute(node, "width")?.unwrap_or(10.0),
        }
        .into(),
        _ => return Ok(None),
    };

    Ok(Some(symbolizer))
}

fn read_parameter(node: Node) -> Result<(String, String), MapError> {
    let name = required_attribute(node, "name")?;
    Ok((
        name.to_string(),
        node.text().unwrap_or_default().trim().to_string(),
    ))
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, MapError> {
    node.attribute(name).ok_or_else(|| {
        MapError::Stylesheet(format!(
            "<{}> has no '{name}' attribute",
            node.tag_name().name()
        ))
    })
}

fn attribute<T>(node: Node, name: &str) -> Result<Option<T>, MapError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    node.attribute(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|err| {
                MapError::Stylesheet(format!(
                    "<{}> attribute '{name}'='{value}': {err}",
                    node.tag_name().name()
                ))
            })
        })
        .transpose()
}

fn parse_box(value: &str) -> Result<Rect, MapError> {
    let numbers = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| MapError::Stylesheet(format!("invalid box '{value}': {err}")))?;
    Ok(Rect::from_slice(&numbers)?)
}

fn format_box(rect: &Rect) -> String {
    format!(
        "{},{},{},{}",
        rect.x_min(),
        rect.y_min(),
        rect.x_max(),
        rect.y_max()
    )
}

fn write_style(xml: &mut String, name: &str, style: &Style) {
    let _ = write!(xml, "  <Style name=\"{}\"", escape(name));
    if style.opacity != 1.0 {
        let _ = write!(xml, " opacity=\"{}\"", style.opacity);
    }
    if let Some(comp_op) = style.comp_op {
        let _ = write!(xml, " comp-op=\"{comp_op}\"");
    }
    xml.push_str(">\n    <Rule>\n");

    for symbolizer in &style.symbolizers {
        let _ = match symbolizer {
            Symbolizer::Polygon(s) => writeln!(
                xml,
                "      <PolygonSymbolizer fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
                s.fill_color.hex(),
                s.stroke_color.hex(),
                s.stroke_width
            ),
            Symbolizer::Line(s) => writeln!(
                xml,
                "      <LineSymbolizer stroke=\"{}\" stroke-width=\"{}\" stroke-linecap=\"{}\"/>",
                s.color.hex(),
                s.width,
                match s.line_cap {
                    LineCap::Round => "round",
                    LineCap::Butt => "butt",
                    LineCap::Square => "square",
                }
            ),
            Symbolizer::Marker(s) => writeln!(
                xml,
                "      <MarkerSymbolizer fill=\"{}\" width=\"{}\"/>",
                s.color.hex(),
                s.size
            ),
        };
    }

    xml.push_str("    </Rule>\n  </Style>\n");
}

fn write_layer(xml: &mut String, layer: &Layer) {
    let _ = write!(
        xml,
        "  <Layer name=\"{}\" srs=\"{}\" status=\"{}\"",
        escape(layer.name()),
        escape(layer.srs()),
        if layer.active() { "on" } else { "off" }
    );
    if layer.minimum_scale_denominator() > 0.0 {
        let _ = write!(
            xml,
            " minimum-scale-denominator=\"{}\"",
            layer.minimum_scale_denominator()
        );
    }
    if layer.maximum_scale_denominator().is_finite() {
        let _ = write!(
            xml,
            " maximum-scale-denominator=\"{}\"",
            layer.maximum_scale_denominator()
        );
    }
    xml.push_str(">\n");

    for style in layer.styles() {
        let _ = writeln!(xml, "    <StyleName>{}</StyleName>", escape(style));
    }

    if let Some(datasource) = layer.datasource() {
        xml.push_str("    <Datasource>\n");
        for (name, value) in datasource.parameters() {
            let _ = writeln!(
                xml,
                "      <Parameter name=\"{}\">{}</Parameter>",
                escape(name),
                escape(value)
            );
        }
        xml.push_str("    </Datasource>\n");
    }

    xml.push_str("  </Layer>\n");
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            c => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const STYLESHEET: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<Map srs="+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs" background-color="steelblue" buffer-size="8">
  <Parameters>
    <Parameter name="attribution">Natural Earth &amp; friends</Parameter>
  </Parameters>
  <Style name="cities" comp-op="multiply" opacity="0.5">
    <Rule>
      <MarkerSymbolizer fill="#ff0000" width="6"/>
      <LineSymbolizer stroke="black" stroke-width="2" stroke-linecap="round"/>
    </Rule>
  </Style>
  <Layer name="cities" status="off" maximum-scale-denominator="500000">
    <StyleName>cities</StyleName>
    <Datasource>
      <Parameter name="type">csv</Parameter>
      <Parameter name="inline">x,y,name
10.75,59.91,Oslo
</Parameter>
    </Datasource>
  </Layer>
</Map>
"##;

    #[test]
    fn load_stylesheet() {
        let mut map = Map::new(100, 100).unwrap();
        map.from_string(STYLESHEET, &LoadOptions::default()).unwrap();

        assert_eq!(map.background(), Some("steelblue".parse().unwrap()));
        assert_eq!(map.buffer_size(), 8);
        assert_eq!(
            map.parameters().get("attribution").map(String::as_str),
            Some("Natural Earth & friends")
        );

        let style = map.style("cities").unwrap();
        assert_eq!(style.comp_op, Some(CompositeOp::Multiply));
        assert_eq!(style.opacity, 0.5);
        assert_eq!(
            style.symbolizers[0],
            Symbolizer::Marker(MarkerSymbolizer::new(Color::RED, 6.0))
        );
        assert_matches!(
            style.symbolizers[1],
            Symbolizer::Line(LineSymbolizer {
                line_cap: LineCap::Round,
                ..
            })
        );

        let layer = map.get_layer("cities").unwrap();
        assert!(!layer.active());
        assert_eq!(layer.maximum_scale_denominator(), 500000.0);
        assert_eq!(layer.styles(), ["cities"]);
        let datasource = layer.datasource().unwrap();
        assert_eq!(datasource.type_name(), "csv");
        assert_eq!(datasource.featureset().unwrap().count(), 1);
    }

    #[test]
    fn save_and_load_again() {
        let mut map = Map::new(100, 100).unwrap();
        map.from_string(STYLESHEET, &LoadOptions::default()).unwrap();
        let xml = map.to_xml();

        let mut restored = Map::new(100, 100).unwrap();
        restored.from_string(&xml, &LoadOptions::default()).unwrap();
        assert_eq!(restored.to_xml(), xml);
        assert_eq!(restored.styles(), map.styles());
        assert_eq!(
            restored.get_layer(0).unwrap().describe(),
            map.get_layer(0).unwrap().describe()
        );
    }

    #[test]
    fn repeated_loads_accumulate() {
        let mut map = Map::new(100, 100).unwrap();
        map.from_string(STYLESHEET, &LoadOptions::default()).unwrap();
        let second = r#"<Map buffer-size="2"><Layer name="other"/></Map>"#;
        map.from_string(second, &LoadOptions::default()).unwrap();

        assert_eq!(map.layers().len(), 2);
        assert_eq!(map.buffer_size(), 2);
        assert!(map.style("cities").is_some());

        assert_matches!(
            map.from_string(second, &LoadOptions::default()),
            Err(MapError::DuplicateName(_))
        );
    }

    #[test]
    fn strict_loading_fails_on_bad_datasource() {
        let xml = r#"<Map>
            <Layer name="roads">
                <Datasource><Parameter name="type">shape</Parameter></Datasource>
            </Layer>
            <Unknown/>
        </Map>"#;

        let mut map = Map::new(100, 100).unwrap();
        map.from_string(xml, &LoadOptions::default()).unwrap();
        assert!(map.get_layer("roads").unwrap().datasource().is_none());

        let mut strict_map = Map::new(100, 100).unwrap();
        let strict = LoadOptions {
            strict: true,
            base: None,
        };
        assert!(strict_map.from_string(xml, &strict).is_err());
    }

    #[test]
    fn invalid_documents() {
        let mut map = Map::new(100, 100).unwrap();
        assert_matches!(
            map.from_string("<Map>", &LoadOptions::default()),
            Err(MapError::Xml(_))
        );
        assert_matches!(
            map.from_string("<Style/>", &LoadOptions::default()),
            Err(MapError::Stylesheet(_))
        );
        assert_matches!(
            map.from_string(
                r#"<Map><Style name="s"><Rule><PolygonSymbolizer fill="nope"/></Rule></Style></Map>"#,
                &LoadOptions::default()
            ),
            Err(MapError::Stylesheet(_))
        );
    }

    #[test]
    fn load_from_file_resolves_against_its_directory() {
        let dir = std::env::temp_dir().join(format!("meridian-stylesheet-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("points.csv"), "x,y\n1,2\n").unwrap();
        let xml = r#"<Map><Layer name="points"><Datasource>
            <Parameter name="type">csv</Parameter>
            <Parameter name="file">points.csv</Parameter>
        </Datasource></Layer></Map>"#;
        std::fs::write(dir.join("map.xml"), xml).unwrap();

        let mut map = Map::new(100, 100).unwrap();
        map.load(dir.join("map.xml"), &LoadOptions::default())
            .unwrap();
        let datasource = map.get_layer("points").unwrap().datasource().unwrap();
        assert_eq!(datasource.featureset().unwrap().count(), 1);
        assert!(!datasource.parameters().contains_key("base"));

        map.save(dir.join("saved.xml")).unwrap();
        let saved = std::fs::read_to_string(dir.join("saved.xml")).unwrap();
        assert!(!saved.contains("\"base\""));
        assert!(saved.contains("<Parameter name=\"file\">points.csv</Parameter>"));

        let mut reloaded = Map::new(100, 100).unwrap();
        reloaded
            .load(dir.join("saved.xml"), &LoadOptions::default())
            .unwrap();
        let datasource = reloaded.get_layer("points").unwrap().datasource().unwrap();
        assert_eq!(datasource.featureset().unwrap().count(), 1);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
