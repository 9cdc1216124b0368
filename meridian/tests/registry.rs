//! The registry is process-wide, so the whole lifecycle is checked by a single test.

use std::path::PathBuf;
use std::sync::Arc;

use assert_matches::assert_matches;
use meridian::datasource::{
    DatasourceOptions, FeatureProvider, MemoryProvider, Parameters, ProviderFactory,
};
use meridian::{registry, Datasource, Feature, MapError};
use meridian_types::cartesian::Point2;
use meridian_types::Geometry;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meridian-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn shape_parameters() -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("type".into(), "shape".into());
    parameters.insert("file".into(), "world.shp".into());
    parameters
}

fn shape_factory() -> ProviderFactory {
    Arc::new(|options: &DatasourceOptions| {
        let DatasourceOptions::Shape(shape) = options else {
            return Err(MapError::Registry("expected shape options".into()));
        };

        let feature = Feature::new(1)
            .with_geometry(Geometry::Point(Point2::new(10.0, 20.0)))
            .with_attribute("file", shape.file.display().to_string());
        Ok(Box::new(MemoryProvider::new(vec![feature])) as Box<dyn FeatureProvider>)
    })
}

#[test]
fn registry_lifecycle() {
    let _ = env_logger::builder().is_test(true).try_init();

    assert!(!registry::is_initialized());
    assert_matches!(
        registry::register_datasource("shape", shape_factory()),
        Err(MapError::Registry(_))
    );
    assert_matches!(
        Datasource::new(shape_parameters()),
        Err(MapError::NotFound(_))
    );
    assert_eq!(registry::datasources(), ["csv", "memory"]);

    let plugins = scratch_dir("plugins");
    for file in ["shape.input", "postgis.input", "csv.input", "readme.txt"] {
        std::fs::write(plugins.join(file), b"").unwrap();
    }

    registry::init(registry::Settings {
        font_path: None,
        plugin_path: Some(plugins.clone()),
    })
    .unwrap();
    assert!(registry::is_initialized());
    assert_matches!(
        registry::init(registry::Settings::default()),
        Err(MapError::Registry(_))
    );
    assert_eq!(
        registry::datasources(),
        ["csv", "memory", "postgis", "shape"]
    );
    assert!(registry::register_datasources(&plugins).unwrap().is_empty());

    // Plugins found on disk still need a factory.
    assert_matches!(
        Datasource::new(shape_parameters()),
        Err(MapError::NotFound(_))
    );

    registry::register_datasource("shape", shape_factory()).unwrap();
    assert_matches!(
        registry::register_datasource("shape", shape_factory()),
        Err(MapError::DuplicateName(_))
    );
    assert_matches!(
        registry::register_datasource("csv", shape_factory()),
        Err(MapError::Registry(_))
    );

    let datasource = Datasource::new(shape_parameters()).unwrap();
    assert_eq!(datasource.type_name(), "shape");
    let features: Vec<_> = datasource.featureset().unwrap().collect();
    assert_eq!(features.len(), 1);
    assert_eq!(
        features[0].attribute("file").map(|v| v.to_string()),
        Some("world.shp".to_string())
    );

    let fonts = scratch_dir("fonts");
    std::fs::create_dir_all(fonts.join("nested")).unwrap();
    std::fs::write(fonts.join("broken.ttf"), b"not a font").unwrap();
    std::fs::write(fonts.join("nested").join("notes.txt"), b"").unwrap();
    assert_eq!(registry::register_fonts(&fonts, true).unwrap(), 0);
    assert!(registry::fonts().is_empty());
    assert!(registry::font_files().is_empty());
    assert_matches!(
        registry::register_fonts(fonts.join("missing"), false),
        Err(MapError::FsIo(_))
    );

    assert!(registry::shutdown());
    assert!(!registry::shutdown());
    assert_eq!(registry::datasources(), ["csv", "memory"]);

    // Datasources created before shutdown keep working.
    assert_eq!(datasource.featureset().unwrap().count(), 1);
    assert_matches!(
        Datasource::new(shape_parameters()),
        Err(MapError::NotFound(_))
    );

    registry::init(registry::Settings::default()).unwrap();
    assert_eq!(registry::settings(), Some(registry::Settings::default()));
    assert!(registry::shutdown());

    let _ = std::fs::remove_dir_all(plugins);
    let _ = std::fs::remove_dir_all(fonts);
}
