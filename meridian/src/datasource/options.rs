//! Typed datasource options parsed from string parameter maps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::AHashSet;
use meridian_types::cartesian::Rect;

use crate::error::MapError;

/// Free-form datasource parameters, as given by the user or a stylesheet.
pub type Parameters = BTreeMap<String, String>;

const DEFAULT_ENCODING: &str = "utf-8";

/// Reads typed values from [`Parameters`] and remembers which keys were used.
struct OptionReader<'a> {
    datasource: &'static str,
    params: &'a Parameters,
    used: AHashSet<&'a str>,
}

impl<'a> OptionReader<'a> {
    fn new(datasource: &'static str, params: &'a Parameters) -> Self {
        let mut used = AHashSet::new();
        used.insert("type");
        Self {
            datasource,
            params,
            used,
        }
    }

    fn optional(&mut self, key: &'a str) -> Option<String> {
        self.used.insert(key);
        self.params
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &'a str) -> Result<String, MapError> {
        self.optional(key)
            .ok_or_else(|| MapError::invalid_parameter(self.datasource, key, "required"))
    }

    fn parse<T: FromStr>(&mut self, key: &'a str, default: T) -> Result<T, MapError> {
        match self.optional(key) {
            Some(value) => value.parse().map_err(|_| {
                MapError::invalid_parameter(self.datasource, key, format!("cannot parse '{value}'"))
            }),
            None => Ok(default),
        }
    }

    fn parse_optional<T: FromStr>(&mut self, key: &'a str) -> Result<Option<T>, MapError> {
        self.optional(key)
            .map(|value| {
                value.parse().map_err(|_| {
                    MapError::invalid_parameter(
                        self.datasource,
                        key,
                        format!("cannot parse '{value}'"),
                    )
                })
            })
            .transpose()
    }

    fn flag(&mut self, key: &'a str, default: bool) -> Result<bool, MapError> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            Some(other) => Err(MapError::invalid_parameter(
                self.datasource,
                key,
                format!("'{other}' is not a boolean"),
            )),
        }
    }

    fn extent(&mut self, key: &'a str) -> Result<Option<Rect>, MapError> {
        let Some(value) = self.optional(key) else {
            return Ok(None);
        };

        let numbers = value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| MapError::invalid_parameter(self.datasource, key, err.to_string()))?;

        Rect::from_slice(&numbers)
            .map(Some)
            .map_err(|err| MapError::invalid_parameter(self.datasource, key, err.to_string()))
    }

    fn path(&mut self, key: &'a str) -> Result<PathBuf, MapError> {
        self.required(key).map(PathBuf::from)
    }

    fn encoding(&mut self) -> String {
        let encoding = self
            .optional("encoding")
            .unwrap_or_else(|| DEFAULT_ENCODING.to_string());
        if !encoding.eq_ignore_ascii_case(DEFAULT_ENCODING) {
            log::warn!(
                "Datasource '{}': encoding '{encoding}' is not supported, text is read as utf-8",
                self.datasource
            );
        }
        encoding
    }

    fn finish(self) {
        for key in self.params.keys() {
            if !self.used.contains(key.as_str()) {
                log::debug!(
                    "Datasource '{}': ignoring unknown parameter '{key}'",
                    self.datasource
                );
            }
        }
    }
}

fn resolve(base: &Option<PathBuf>, file: &Path) -> PathBuf {
    match base {
        Some(base) if file.is_relative() => base.join(file),
        _ => file.to_path_buf(),
    }
}

/// Options of the `shape` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeOptions {
    /// Shape file path.
    pub file: PathBuf,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Text encoding of the attribute table, `utf-8` by default.
    pub encoding: String,
    /// Maximum number of features to read, `0` for no limit.
    pub row_limit: usize,
}

impl ShapeOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        Ok(Self {
            file: reader.path("file")?,
            base: reader.optional("base").map(PathBuf::from),
            encoding: reader.encoding(),
            row_limit: reader.parse("row_limit", 0)?,
        })
    }

    /// File path with the base directory applied.
    pub fn resolved_file(&self) -> PathBuf {
        resolve(&self.base, &self.file)
    }
}

/// How the extent of a database table is determined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtentStrategy {
    /// Extent given in the options.
    Explicit(Rect),
    /// Estimate from table statistics.
    Estimated {
        /// Measure the subquery instead of the base table.
        from_subquery: bool,
    },
    /// Exact extent computed over all rows.
    Exact {
        /// Measure the subquery instead of the base table.
        from_subquery: bool,
    },
}

/// Options of the `postgis` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgisOptions {
    /// Table name or subquery.
    pub table: String,
    /// Database name.
    pub dbname: String,
    /// User name.
    pub user: String,
    /// Host, `None` for the default.
    pub host: Option<String>,
    /// Port, `None` for the default.
    pub port: Option<u16>,
    /// Password.
    pub password: Option<String>,
    /// Known extent of the data.
    pub extent: Option<Rect>,
    /// Maximum number of pooled connections, `10` by default.
    pub max_size: usize,
    /// Number of connections opened up front, `1` by default.
    pub initial_size: usize,
    /// Keep connections open between queries, `true` by default.
    pub persist_connection: bool,
    /// Measure the extent of the subquery rather than of the table, `false` by default.
    pub extent_from_subquery: bool,
    /// Connections a single query may use concurrently, `1` by default. At most `max_size`.
    pub max_async_connection: usize,
    /// Seconds to wait for a connection, `4` by default.
    pub connect_timeout: u64,
    /// Table that holds the geometry column.
    pub geometry_table: Option<String>,
    /// Geometry column.
    pub geometry_field: Option<String>,
    /// Column with feature ids.
    pub key_field: Option<String>,
    /// Fetch rows with a cursor of this size, `0` to disable.
    pub cursor_size: usize,
    /// Maximum number of features to read, `0` for no limit.
    pub row_limit: usize,
    /// SRID of the geometries, `0` to detect.
    pub srid: i32,
    /// Detect the primary key when `key_field` is not given.
    pub autodetect_key_field: bool,
    /// Use table statistics for the extent when it is not given.
    pub estimate_extent: bool,
    /// Simplify geometries on the server.
    pub simplify_geometries: bool,
}

impl PostgisOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        let options = Self {
            table: reader.required("table")?,
            dbname: reader.required("dbname")?,
            user: reader.required("user")?,
            host: reader.optional("host"),
            port: reader.parse_optional("port")?,
            password: reader.optional("password"),
            extent: reader.extent("extent")?,
            max_size: reader.parse("max_size", 10)?,
            initial_size: reader.parse("initial_size", 1)?,
            persist_connection: reader.flag("persist_connection", true)?,
            extent_from_subquery: reader.flag("extent_from_subquery", false)?,
            max_async_connection: reader.parse("max_async_connection", 1)?,
            connect_timeout: reader.parse("connect_timeout", 4)?,
            geometry_table: reader.optional("geometry_table"),
            geometry_field: reader.optional("geometry_field"),
            key_field: reader.optional("key_field"),
            cursor_size: reader.parse("cursor_size", 0)?,
            row_limit: reader.parse("row_limit", 0)?,
            srid: reader.parse("srid", 0)?,
            autodetect_key_field: reader.flag("autodetect_key_field", false)?,
            estimate_extent: reader.flag("estimate_extent", false)?,
            simplify_geometries: reader.flag("simplify_geometries", false)?,
        };

        if options.max_size == 0 {
            return Err(MapError::invalid_parameter(
                "postgis",
                "max_size",
                "must be positive",
            ));
        }
        if options.initial_size > options.max_size {
            return Err(MapError::invalid_parameter(
                "postgis",
                "initial_size",
                "must not exceed max_size",
            ));
        }
        if options.max_async_connection == 0 || options.max_async_connection > options.max_size {
            return Err(MapError::invalid_parameter(
                "postgis",
                "max_async_connection",
                "must be between 1 and max_size",
            ));
        }

        Ok(options)
    }

    /// An explicit extent always wins. Otherwise `estimate_extent` picks between estimated and
    /// exact measurement, and `extent_from_subquery` picks what is measured.
    pub fn extent_strategy(&self) -> ExtentStrategy {
        match (self.extent, self.estimate_extent) {
            (Some(extent), _) => ExtentStrategy::Explicit(extent),
            (None, true) => ExtentStrategy::Estimated {
                from_subquery: self.extent_from_subquery,
            },
            (None, false) => ExtentStrategy::Exact {
                from_subquery: self.extent_from_subquery,
            },
        }
    }
}

/// Where CSV text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CsvSource {
    /// CSV file.
    File(PathBuf),
    /// CSV text given in the options.
    Inline(String),
}

/// Options of the `csv` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    /// File or inline text.
    pub source: CsvSource,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Text encoding, `utf-8` by default.
    pub encoding: String,
    /// Maximum number of features to read, `0` for no limit.
    pub row_limit: usize,
    /// Field separator, detected from the header line when not given.
    pub separator: Option<u8>,
    /// Quote character, `"` by default.
    pub quote: u8,
    /// Column names to use when the data has no header line.
    pub headers: Option<Vec<String>>,
    /// Known extent of the data.
    pub extent: Option<Rect>,
    /// Fail on rows with invalid geometry instead of skipping them.
    pub strict: bool,
}

fn single_byte(datasource: &'static str, key: &str, value: &str) -> Result<u8, MapError> {
    let value = match value {
        "\\t" => "\t",
        other => other,
    };

    match value.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(MapError::invalid_parameter(
            datasource,
            key,
            "must be a single character",
        )),
    }
}

impl CsvOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        let source = match (reader.optional("inline"), reader.optional("file")) {
            (Some(text), _) => CsvSource::Inline(text),
            (None, Some(file)) => CsvSource::File(PathBuf::from(file)),
            (None, None) => {
                return Err(MapError::invalid_parameter(
                    "csv",
                    "file",
                    "either 'file' or 'inline' is required",
                ))
            }
        };

        Ok(Self {
            source,
            base: reader.optional("base").map(PathBuf::from),
            encoding: reader.encoding(),
            row_limit: reader.parse("row_limit", 0)?,
            separator: reader
                .optional("separator")
                .map(|s| single_byte("csv", "separator", &s))
                .transpose()?,
            quote: reader
                .optional("quote")
                .map(|s| single_byte("csv", "quote", &s))
                .transpose()?
                .unwrap_or(b'"'),
            headers: reader
                .optional("headers")
                .map(|h| h.split(',').map(|s| s.trim().to_string()).collect()),
            extent: reader.extent("extent")?,
            strict: reader.flag("strict", false)?,
        })
    }

    /// File path with the base directory applied, `None` for inline data.
    pub fn resolved_file(&self) -> Option<PathBuf> {
        match &self.source {
            CsvSource::File(file) => Some(resolve(&self.base, file)),
            CsvSource::Inline(_) => None,
        }
    }
}

/// Options of the `osm` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmOptions {
    /// OSM XML file.
    pub file: PathBuf,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Limit features to this box.
    pub bbox: Option<Rect>,
    /// Text encoding, `utf-8` by default.
    pub encoding: String,
}

impl OsmOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        Ok(Self {
            file: reader.path("file")?,
            base: reader.optional("base").map(PathBuf::from),
            bbox: reader.extent("bbox")?,
            encoding: reader.encoding(),
        })
    }
}

/// Options of the `sqlite` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteOptions {
    /// Database file.
    pub file: PathBuf,
    /// Table name or subquery.
    pub table: String,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Geometry column, detected when not given.
    pub geometry_field: Option<String>,
    /// Column with feature ids, `rowid` when not given.
    pub key_field: Option<String>,
    /// Known extent of the data.
    pub extent: Option<Rect>,
    /// Maximum number of features to read, `0` for no limit.
    pub row_limit: usize,
    /// Use the spatial index when present, `true` by default.
    pub use_spatial_index: bool,
}

impl SqliteOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        Ok(Self {
            file: reader.path("file")?,
            table: reader.required("table")?,
            base: reader.optional("base").map(PathBuf::from),
            geometry_field: reader.optional("geometry_field"),
            key_field: reader.optional("key_field"),
            extent: reader.extent("extent")?,
            row_limit: reader.parse("row_limit", 0)?,
            use_spatial_index: reader.flag("use_spatial_index", true)?,
        })
    }
}

/// Options of the `geojson` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct GeojsonOptions {
    /// GeoJSON file, `None` when `inline` is given.
    pub file: Option<PathBuf>,
    /// GeoJSON text given in the options.
    pub inline: Option<String>,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Text encoding, `utf-8` by default.
    pub encoding: String,
    /// Keep parsed features in memory, `true` by default.
    pub cache_features: bool,
}

impl GeojsonOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        let inline = reader.optional("inline");
        let file = reader.optional("file").map(PathBuf::from);
        if inline.is_none() && file.is_none() {
            return Err(MapError::invalid_parameter(
                "geojson",
                "file",
                "either 'file' or 'inline' is required",
            ));
        }

        Ok(Self {
            file,
            inline,
            base: reader.optional("base").map(PathBuf::from),
            encoding: reader.encoding(),
            cache_features: reader.flag("cache_features", true)?,
        })
    }
}

/// Which layer of a multi-layer source to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OgrLayer {
    /// Layer by name.
    Name(String),
    /// Layer by position.
    Index(usize),
}

/// Options of the `ogr` datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct OgrOptions {
    /// Source file.
    pub file: PathBuf,
    /// Layer to read.
    pub layer: OgrLayer,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Text encoding, `utf-8` by default.
    pub encoding: String,
    /// Known extent of the data.
    pub extent: Option<Rect>,
}

impl OgrOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        let file = reader.path("file")?;
        let layer = match (reader.optional("layer"), reader.parse_optional("layer_by_index")?) {
            (Some(name), _) => OgrLayer::Name(name),
            (None, Some(index)) => OgrLayer::Index(index),
            (None, None) => {
                return Err(MapError::invalid_parameter(
                    "ogr",
                    "layer",
                    "either 'layer' or 'layer_by_index' is required",
                ))
            }
        };

        Ok(Self {
            file,
            layer,
            base: reader.optional("base").map(PathBuf::from),
            encoding: reader.encoding(),
            extent: reader.extent("extent")?,
        })
    }
}

/// Options of the `gdal` raster datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct GdalOptions {
    /// Raster file.
    pub file: PathBuf,
    /// Directory relative paths are resolved against.
    pub base: Option<PathBuf>,
    /// Band to read, all bands when not given.
    pub band: Option<u32>,
    /// Value treated as missing data.
    pub nodata: Option<f64>,
    /// Share the opened dataset between layers, `false` by default.
    pub shared: bool,
}

impl GdalOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        Ok(Self {
            file: reader.path("file")?,
            base: reader.optional("base").map(PathBuf::from),
            band: reader.parse_optional("band")?,
            nodata: reader.parse_optional("nodata")?,
            shared: reader.flag("shared", false)?,
        })
    }
}

/// Options of the in-process `memory` datasource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryOptions {
    /// Known extent of the data.
    pub extent: Option<Rect>,
}

impl MemoryOptions {
    fn read(reader: &mut OptionReader) -> Result<Self, MapError> {
        Ok(Self {
            extent: reader.extent("extent")?,
        })
    }
}

/// Validated options of a datasource, one variant per datasource type.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasourceOptions {
    /// ESRI shape file.
    Shape(ShapeOptions),
    /// PostGIS table.
    Postgis(PostgisOptions),
    /// CSV file or text.
    Csv(CsvOptions),
    /// OpenStreetMap XML.
    Osm(OsmOptions),
    /// SQLite database.
    Sqlite(SqliteOptions),
    /// GeoJSON file or text.
    Geojson(GeojsonOptions),
    /// Any vector source readable by OGR.
    Ogr(OgrOptions),
    /// Raster source readable by GDAL.
    Gdal(GdalOptions),
    /// Features held in memory.
    Memory(MemoryOptions),
}

impl DatasourceOptions {
    /// Validates parameters. The `type` key selects the variant.
    pub fn from_parameters(params: &Parameters) -> Result<Self, MapError> {
        let type_name = params
            .get("type")
            .map(|t| t.trim())
            .ok_or_else(|| MapError::invalid_parameter("unknown", "type", "required"))?;

        let options = match type_name {
            "shape" => {
                let mut reader = OptionReader::new("shape", params);
                let options = Self::Shape(ShapeOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "postgis" => {
                let mut reader = OptionReader::new("postgis", params);
                let options = Self::Postgis(PostgisOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "csv" => {
                let mut reader = OptionReader::new("csv", params);
                let options = Self::Csv(CsvOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "osm" => {
                let mut reader = OptionReader::new("osm", params);
                let options = Self::Osm(OsmOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "sqlite" => {
                let mut reader = OptionReader::new("sqlite", params);
                let options = Self::Sqlite(SqliteOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "geojson" => {
                let mut reader = OptionReader::new("geojson", params);
                let options = Self::Geojson(GeojsonOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "ogr" => {
                let mut reader = OptionReader::new("ogr", params);
                let options = Self::Ogr(OgrOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "gdal" => {
                let mut reader = OptionReader::new("gdal", params);
                let options = Self::Gdal(GdalOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            "memory" => {
                let mut reader = OptionReader::new("memory", params);
                let options = Self::Memory(MemoryOptions::read(&mut reader)?);
                reader.finish();
                options
            }
            other => {
                return Err(MapError::invalid_parameter(
                    other,
                    "type",
                    format!("unknown datasource type '{other}'"),
                ))
            }
        };

        Ok(options)
    }

    /// Type tag of the datasource.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Shape(_) => "shape",
            Self::Postgis(_) => "postgis",
            Self::Csv(_) => "csv",
            Self::Osm(_) => "osm",
            Self::Sqlite(_) => "sqlite",
            Self::Geojson(_) => "geojson",
            Self::Ogr(_) => "ogr",
            Self::Gdal(_) => "gdal",
            Self::Memory(_) => "memory",
        }
    }

    /// Extent given explicitly in the options, if the datasource type supports one.
    pub fn explicit_extent(&self) -> Option<Rect> {
        match self {
            Self::Postgis(o) => o.extent,
            Self::Csv(o) => o.extent,
            Self::Osm(o) => o.bbox,
            Self::Sqlite(o) => o.extent,
            Self::Ogr(o) => o.extent,
            Self::Memory(o) => o.extent,
            Self::Shape(_) | Self::Geojson(_) | Self::Gdal(_) => None,
        }
    }

    /// Returns true for raster datasources.
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Gdal(_))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn shape_requires_file() {
        assert_matches!(
            DatasourceOptions::from_parameters(&params(&[("type", "shape")])),
            Err(MapError::InvalidParameter { key, .. }) if key == "file"
        );

        let options = DatasourceOptions::from_parameters(&params(&[
            ("type", "shape"),
            ("file", "world_merc.shp"),
            ("base", "/data"),
        ]))
        .unwrap();
        let DatasourceOptions::Shape(shape) = options else {
            panic!("expected shape options");
        };
        assert_eq!(shape.resolved_file(), PathBuf::from("/data/world_merc.shp"));
        assert_eq!(shape.encoding, "utf-8");
        assert_eq!(shape.row_limit, 0);
    }

    #[test]
    fn postgis_defaults() {
        let options = DatasourceOptions::from_parameters(&params(&[
            ("type", "postgis"),
            ("table", "world_merc"),
            ("dbname", "gis"),
            ("user", "postgres"),
            ("shape_only_key", "ignored"),
        ]))
        .unwrap();
        let DatasourceOptions::Postgis(pg) = options else {
            panic!("expected postgis options");
        };

        assert_eq!(pg.max_size, 10);
        assert_eq!(pg.initial_size, 1);
        assert_eq!(pg.max_async_connection, 1);
        assert_eq!(pg.connect_timeout, 4);
        assert!(pg.persist_connection);
        assert_eq!(
            pg.extent_strategy(),
            ExtentStrategy::Exact {
                from_subquery: false
            }
        );
    }

    #[test]
    fn postgis_extent_strategy() {
        let base = [
            ("type", "postgis"),
            ("table", "t"),
            ("dbname", "gis"),
            ("user", "u"),
            ("estimate_extent", "true"),
            ("extent_from_subquery", "true"),
        ];
        let DatasourceOptions::Postgis(pg) =
            DatasourceOptions::from_parameters(&params(&base)).unwrap()
        else {
            panic!("expected postgis options");
        };
        assert_eq!(
            pg.extent_strategy(),
            ExtentStrategy::Estimated {
                from_subquery: true
            }
        );

        let mut with_extent = params(&base);
        with_extent.insert("extent".into(), "-20,-10,20,10".into());
        let options = DatasourceOptions::from_parameters(&with_extent).unwrap();
        assert_eq!(
            options.explicit_extent(),
            Some(Rect::new(-20.0, -10.0, 20.0, 10.0))
        );
    }

    #[test]
    fn postgis_pool_validation() {
        let result = DatasourceOptions::from_parameters(&params(&[
            ("type", "postgis"),
            ("table", "t"),
            ("dbname", "gis"),
            ("user", "u"),
            ("max_size", "2"),
            ("max_async_connection", "3"),
        ]));
        assert_matches!(
            result,
            Err(MapError::InvalidParameter { key, .. }) if key == "max_async_connection"
        );
    }

    #[test]
    fn invalid_values() {
        assert_matches!(
            DatasourceOptions::from_parameters(&params(&[("type", "wms")])),
            Err(MapError::InvalidParameter { .. })
        );
        assert_matches!(
            DatasourceOptions::from_parameters(&params(&[])),
            Err(MapError::InvalidParameter { key, .. }) if key == "type"
        );
        assert_matches!(
            DatasourceOptions::from_parameters(&params(&[
                ("type", "csv"),
                ("inline", "x,y\n1,2"),
                ("strict", "maybe")
            ])),
            Err(MapError::InvalidParameter { key, .. }) if key == "strict"
        );
        assert_matches!(
            DatasourceOptions::from_parameters(&params(&[
                ("type", "csv"),
                ("inline", "x,y\n1,2"),
                ("extent", "1,2,3")
            ])),
            Err(MapError::InvalidParameter { key, .. }) if key == "extent"
        );
    }

    #[test]
    fn csv_source() {
        let options = DatasourceOptions::from_parameters(&params(&[
            ("type", "csv"),
            ("inline", "x|y\n1|2"),
            ("separator", "|"),
        ]))
        .unwrap();
        let DatasourceOptions::Csv(csv) = options else {
            panic!("expected csv options");
        };
        assert_eq!(csv.source, CsvSource::Inline("x|y\n1|2".into()));
        assert_eq!(csv.separator, Some(b'|'));
        assert_eq!(csv.resolved_file(), None);
    }

    #[test]
    fn ogr_requires_layer() {
        assert_matches!(
            DatasourceOptions::from_parameters(&params(&[("type", "ogr"), ("file", "a.gpkg")])),
            Err(MapError::InvalidParameter { key, .. }) if key == "layer"
        );
        let options = DatasourceOptions::from_parameters(&params(&[
            ("type", "ogr"),
            ("file", "a.gpkg"),
            ("layer_by_index", "2"),
        ]))
        .unwrap();
        assert_matches!(options, DatasourceOptions::Ogr(OgrOptions { layer: OgrLayer::Index(2), .. }));
    }
}
