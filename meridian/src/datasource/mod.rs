//! Datasources: typed options, feature providers and the [`Datasource`] that binds them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use meridian_types::cartesian::Rect;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::feature::{Feature, Featureset};

mod csv;
mod options;
mod pool;
mod provider;

pub use self::csv::CsvProvider;
pub use options::{
    CsvOptions, CsvSource, DatasourceOptions, ExtentStrategy, GdalOptions, GeojsonOptions,
    MemoryOptions, OgrLayer, OgrOptions, OsmOptions, Parameters, PostgisOptions, ShapeOptions,
    SqliteOptions,
};
pub use pool::{
    ConnectionPool, PoolConfig, PoolPolicy, PooledConnection, PooledProvider, StoreConnection,
};
pub use provider::{
    DatasourceKind, DescribedGeometry, FeatureProvider, MemoryProvider, ProviderFactory, Query,
};

/// Summary of a datasource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceDescription {
    /// Vector or raster.
    #[serde(rename = "type")]
    pub kind: DatasourceKind,
    /// Text encoding of attributes.
    pub encoding: String,
    /// Attribute names with their type names.
    pub fields: BTreeMap<String, String>,
    /// Common geometry type of the features.
    pub geometry_type: Option<DescribedGeometry>,
}

/// Source of features for a layer.
///
/// The type tag in the parameters selects the variant of [`DatasourceOptions`] and the provider
/// that reads the data. `csv` and `memory` are built in, other types need a provider factory
/// registered in the [`registry`](crate::registry).
pub struct Datasource {
    parameters: Parameters,
    options: DatasourceOptions,
    provider: Box<dyn FeatureProvider>,
    extent: OnceLock<Option<Rect>>,
}

impl Datasource {
    /// Validates the parameters and opens the datasource.
    ///
    /// ```
    /// use meridian::datasource::{Datasource, Parameters};
    ///
    /// let mut parameters = Parameters::new();
    /// parameters.insert("type".into(), "csv".into());
    /// parameters.insert("inline".into(), "x,y,name\n10,60,Oslo\n".into());
    ///
    /// let datasource = Datasource::new(parameters).unwrap();
    /// assert_eq!(datasource.featureset().unwrap().count(), 1);
    /// ```
    pub fn new(parameters: Parameters) -> Result<Self, MapError> {
        Self::with_base(parameters, None)
    }

    /// Opens the datasource, resolving relative file names against `base` unless the
    /// parameters name their own `base`. The directory is not added to [`Datasource::parameters`].
    pub fn with_base(parameters: Parameters, base: Option<&Path>) -> Result<Self, MapError> {
        let options = match base {
            Some(base) if !parameters.contains_key("base") => {
                let mut resolved = parameters.clone();
                resolved.insert("base".into(), base.display().to_string());
                DatasourceOptions::from_parameters(&resolved)?
            }
            _ => DatasourceOptions::from_parameters(&parameters)?,
        };
        let provider: Box<dyn FeatureProvider> = match &options {
            DatasourceOptions::Csv(csv) => Box::new(CsvProvider::open(csv)?),
            DatasourceOptions::Memory(_) => Box::new(MemoryProvider::default()),
            other => crate::registry::create_provider(other)?,
        };

        Ok(Self {
            parameters,
            options,
            provider,
            extent: OnceLock::new(),
        })
    }

    /// Creates an in-memory datasource.
    pub fn memory(features: Vec<Feature>) -> Self {
        let mut parameters = Parameters::new();
        parameters.insert("type".into(), "memory".into());
        Self::with_provider(
            parameters,
            DatasourceOptions::Memory(MemoryOptions::default()),
            Box::new(MemoryProvider::new(features)),
        )
    }

    /// Binds already validated options to a provider.
    pub fn with_provider(
        parameters: Parameters,
        options: DatasourceOptions,
        provider: Box<dyn FeatureProvider>,
    ) -> Self {
        Self {
            parameters,
            options,
            provider,
            extent: OnceLock::new(),
        }
    }

    /// Parameters the datasource was created with.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Validated options.
    pub fn options(&self) -> &DatasourceOptions {
        &self.options
    }

    /// Type tag.
    pub fn type_name(&self) -> &'static str {
        self.options.type_name()
    }

    /// Summary of the data.
    pub fn describe(&self) -> Result<DatasourceDescription, MapError> {
        let encoding = match &self.options {
            DatasourceOptions::Shape(o) => o.encoding.clone(),
            DatasourceOptions::Csv(o) => o.encoding.clone(),
            DatasourceOptions::Osm(o) => o.encoding.clone(),
            DatasourceOptions::Geojson(o) => o.encoding.clone(),
            DatasourceOptions::Ogr(o) => o.encoding.clone(),
            _ => "utf-8".to_string(),
        };

        Ok(DatasourceDescription {
            kind: self.provider.kind(),
            encoding,
            fields: self.provider.fields()?,
            geometry_type: self.provider.geometry_type()?,
        })
    }

    /// All features, starting from the first one.
    pub fn featureset(&self) -> Result<Featureset<'_>, MapError> {
        self.provider.featureset()
    }

    /// Features matching the query.
    pub fn features(&self, query: &Query) -> Result<Featureset<'_>, MapError> {
        self.provider.features(query)
    }

    /// Extent of the data. An extent given in the options is used as is, otherwise it is
    /// computed on the first call and cached.
    pub fn extent(&self) -> Result<Option<Rect>, MapError> {
        if let Some(extent) = self.options.explicit_extent() {
            return Ok(Some(extent));
        }

        if let Some(extent) = self.extent.get() {
            return Ok(*extent);
        }

        let extent = self.provider.extent()?;
        Ok(*self.extent.get_or_init(|| extent))
    }
}

impl std::fmt::Debug for Datasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datasource")
            .field("type", &self.type_name())
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
