//! Built-in CSV datasource.

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::{wkt, Geometry};

use crate::datasource::options::{CsvOptions, CsvSource};
use crate::datasource::provider::FeatureProvider;
use crate::error::MapError;
use crate::feature::{Feature, Featureset, Value};

const SEPARATOR_CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Columns the geometry of a row is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeometryColumns {
    Wkt(usize),
    XY { x: usize, y: usize },
}

impl GeometryColumns {
    fn detect(headers: &[String]) -> Option<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        };

        if let Some(index) = find(&["wkt", "geom", "geometry"]) {
            return Some(Self::Wkt(index));
        }

        Some(Self::XY {
            x: find(&["x", "lon", "lng", "long", "longitude"])?,
            y: find(&["y", "lat", "latitude"])?,
        })
    }

    fn contains(&self, index: usize) -> bool {
        match *self {
            Self::Wkt(column) => column == index,
            Self::XY { x, y } => x == index || y == index,
        }
    }
}

/// Features read from CSV text. The whole source is parsed when the provider is created.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    features: Vec<Feature>,
    fields: Vec<(String, &'static str)>,
}

impl CsvProvider {
    /// Reads the file or the inline text given in the options.
    pub fn open(options: &CsvOptions) -> Result<Self, MapError> {
        let text = match &options.source {
            CsvSource::Inline(text) => text.clone(),
            CsvSource::File(_) => {
                let path = options.resolved_file().unwrap_or_default();
                log::debug!("Reading csv datasource from {}", path.display());
                std::fs::read_to_string(path)?
            }
        };

        Self::parse(&text, options)
    }

    fn parse(text: &str, options: &CsvOptions) -> Result<Self, MapError> {
        let separator = options
            .separator
            .unwrap_or_else(|| detect_separator(text.lines().next().unwrap_or_default()));

        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(separator)
            .quote(options.quote)
            .has_headers(options.headers.is_none())
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = match &options.headers {
            Some(headers) => headers.clone(),
            None => reader.headers()?.iter().map(str::to_string).collect(),
        };

        let geometry_columns = GeometryColumns::detect(&headers).ok_or_else(|| {
            MapError::invalid_parameter(
                "csv",
                "file",
                "no geometry column found, expected 'wkt' or 'x'/'y' columns",
            )
        })?;

        let mut features = Vec::new();
        let mut fields: Vec<(String, &'static str)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !geometry_columns.contains(*i))
            .map(|(_, name)| (name.clone(), "Null"))
            .collect();

        for (row, record) in reader.records().enumerate() {
            if options.row_limit > 0 && features.len() >= options.row_limit {
                break;
            }

            let record = record?;
            let id = row as i64 + 1;
            let geometries = match read_geometry(&record, geometry_columns) {
                Ok(geometries) => geometries,
                Err(err) if options.strict => return Err(err.in_feature(id)),
                Err(err) => {
                    log::warn!("Skipping csv row {id}: {err}");
                    continue;
                }
            };

            let mut feature = Feature::new(id);
            for geometry in geometries {
                feature.add_geometry(geometry);
            }

            let mut field_index = 0;
            for (column, name) in headers.iter().enumerate() {
                if geometry_columns.contains(column) {
                    continue;
                }

                let value = Value::infer(record.get(column).unwrap_or_default());
                if let Some(field) = fields.get_mut(field_index) {
                    if field.1 == "Null" {
                        field.1 = value.type_name();
                    }
                }
                field_index += 1;
                feature.add_attributes([(name.as_str(), value)]);
            }

            features.push(feature);
        }

        log::debug!("Read {} features from csv", features.len());
        Ok(Self { features, fields })
    }

    /// Attribute columns with the type of their first non-empty value.
    pub fn field_types(&self) -> &[(String, &'static str)] {
        &self.fields
    }
}

fn detect_separator(header: &str) -> u8 {
    SEPARATOR_CANDIDATES
        .iter()
        .copied()
        .max_by_key(|candidate| header.bytes().filter(|b| b == candidate).count())
        .filter(|candidate| header.as_bytes().contains(candidate))
        .unwrap_or(b',')
}

fn read_geometry(
    record: &::csv::StringRecord,
    columns: GeometryColumns,
) -> Result<Vec<Geometry>, MapError> {
    match columns {
        GeometryColumns::Wkt(index) => {
            let text = record.get(index).unwrap_or_default();
            Ok(wkt::parse(text)?)
        }
        GeometryColumns::XY { x, y } => {
            let coordinate = |index: usize| -> Result<f64, MapError> {
                let text = record.get(index).unwrap_or_default();
                text.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| MapError::Geometry(format!("invalid coordinate '{text}'")))
            };

            Ok(vec![Geometry::Point(Point2::new(coordinate(x)?, coordinate(y)?))])
        }
    }
}

impl FeatureProvider for CsvProvider {
    fn featureset(&self) -> Result<Featureset<'_>, MapError> {
        Ok(Featureset::new(self.features.iter().cloned()))
    }

    fn extent(&self) -> Result<Option<Rect>, MapError> {
        Ok(Rect::union_all(self.features.iter().filter_map(Feature::extent)))
    }

    fn fields(&self) -> Result<std::collections::BTreeMap<String, String>, MapError> {
        Ok(self
            .fields
            .iter()
            .map(|(name, kind)| (name.clone(), kind.to_string()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::datasource::options::{DatasourceOptions, Parameters};

    fn options(pairs: &[(&str, &str)]) -> CsvOptions {
        let mut params: Parameters = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.insert("type".into(), "csv".into());
        match DatasourceOptions::from_parameters(&params).unwrap() {
            DatasourceOptions::Csv(options) => options,
            other => panic!("unexpected options {other:?}"),
        }
    }

    #[test]
    fn xy_columns() {
        let provider = CsvProvider::open(&options(&[(
            "inline",
            "name,lon,lat,pop\nOslo,10.75,59.91,700000\nBergen,5.32,60.39,\n",
        )]))
        .unwrap();

        let features: Vec<Feature> = provider.featureset().unwrap().collect();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id(), 1);
        assert_eq!(
            features[0].attribute("name"),
            Some(&Value::String("Oslo".into()))
        );
        assert_eq!(features[0].attribute("pop"), Some(&Value::Integer(700000)));
        assert_eq!(features[1].attribute("pop"), Some(&Value::Null));
        assert_eq!(features[0].attribute("lon"), None);

        assert_eq!(
            provider.extent().unwrap(),
            Some(Rect::new(5.32, 59.91, 10.75, 60.39))
        );
        let fields = provider.fields().unwrap();
        assert_eq!(fields["name"], "String");
        assert_eq!(fields["pop"], "Number");
    }

    #[test]
    fn wkt_column_and_separator_detection() {
        let provider = CsvProvider::open(&options(&[(
            "inline",
            "id;wkt\n1;\"POLYGON((0 0,4 0,4 4,0 4,0 0))\"\n2;\"MULTIPOINT(1 1,2 2)\"\n",
        )]))
        .unwrap();

        let features: Vec<Feature> = provider.featureset().unwrap().collect();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1].num_geometries(), 2);
        assert_eq!(features[0].attribute("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn invalid_rows() {
        let text = "x,y\n1,2\nfoo,3\n4,5\n";
        let lenient = CsvProvider::open(&options(&[("inline", text)])).unwrap();
        let ids: Vec<i64> = lenient.featureset().unwrap().map(|f| f.id()).collect();
        assert_eq!(ids, vec![1, 3]);

        assert_matches!(
            CsvProvider::open(&options(&[("inline", text), ("strict", "true")])),
            Err(MapError::Feature { id: 2, .. })
        );
    }

    #[test]
    fn explicit_headers_and_row_limit() {
        let provider = CsvProvider::open(&options(&[
            ("inline", "1,2,a\n3,4,b\n5,6,c\n"),
            ("headers", "x,y,label"),
            ("row_limit", "2"),
        ]))
        .unwrap();
        let labels: Vec<String> = provider
            .featureset()
            .unwrap()
            .map(|f| f.attribute("label").map(|v| v.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn missing_geometry_columns() {
        assert_matches!(
            CsvProvider::open(&options(&[("inline", "name,pop\na,1\n")])),
            Err(MapError::InvalidParameter { .. })
        );
    }
}
