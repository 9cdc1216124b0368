//! Process-wide registry of fonts and datasource plugins.
//!
//! The registry is explicit global state: it is created by [`init`] before any map is rendered
//! and destroyed by [`shutdown`]. Registrations only ever add entries.
//!
//! `csv` and `memory` datasources are built in and work without the registry. Every other
//! datasource type needs a provider factory attached with [`register_datasource`].
//!
//! ```
//! use std::sync::Arc;
//! use meridian::datasource::{DatasourceOptions, FeatureProvider, MemoryProvider, Parameters};
//! use meridian::{registry, Datasource};
//!
//! registry::init(registry::Settings::default()).unwrap();
//! registry::register_datasource(
//!     "geojson",
//!     Arc::new(|_options: &DatasourceOptions| {
//!         Ok(Box::new(MemoryProvider::default()) as Box<dyn FeatureProvider>)
//!     }),
//! )
//! .unwrap();
//!
//! let mut parameters = Parameters::new();
//! parameters.insert("type".into(), "geojson".into());
//! parameters.insert("inline".into(), "{}".into());
//! assert!(Datasource::new(parameters).is_ok());
//!
//! registry::shutdown();
//! ```

use std::collections::BTreeMap;
#[cfg(feature = "fonts")]
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::datasource::{DatasourceOptions, FeatureProvider, ProviderFactory};
use crate::error::MapError;

/// Environment variable with the default font directory.
pub const FONT_PATH_ENV: &str = "MERIDIAN_FONT_PATH";
/// Environment variable with the default plugin directory.
pub const PLUGIN_PATH_ENV: &str = "MERIDIAN_PLUGIN_PATH";

const BUILT_IN_DATASOURCES: [&str; 2] = ["csv", "memory"];
const PLUGIN_EXTENSION: &str = "input";

/// Directories scanned when the registry is initialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Fonts in this directory and its subdirectories are registered.
    pub font_path: Option<PathBuf>,
    /// `*.input` plugin names in this directory are registered.
    pub plugin_path: Option<PathBuf>,
}

impl Settings {
    /// Reads directories from `MERIDIAN_FONT_PATH` and `MERIDIAN_PLUGIN_PATH`.
    pub fn from_env() -> Self {
        Self {
            font_path: std::env::var_os(FONT_PATH_ENV).map(PathBuf::from),
            plugin_path: std::env::var_os(PLUGIN_PATH_ENV).map(PathBuf::from),
        }
    }
}

struct Registry {
    settings: Settings,
    datasources: BTreeMap<String, Option<ProviderFactory>>,
    fonts: BTreeMap<String, PathBuf>,
    #[cfg(feature = "fonts")]
    font_files: BTreeSet<PathBuf>,
    #[cfg(feature = "fonts")]
    font_db: fontdb::Database,
}

impl Registry {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            datasources: BTreeMap::new(),
            fonts: BTreeMap::new(),
            #[cfg(feature = "fonts")]
            font_files: BTreeSet::new(),
            #[cfg(feature = "fonts")]
            font_db: fontdb::Database::new(),
        }
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<Option<Registry>> = RwLock::new(None);
}

fn not_initialized() -> MapError {
    MapError::Registry("registry is not initialized".into())
}

fn with_registry<T>(f: impl FnOnce(&mut Registry) -> Result<T, MapError>) -> Result<T, MapError> {
    let mut guard = REGISTRY.write();
    let registry = guard.as_mut().ok_or_else(not_initialized)?;
    f(registry)
}

/// Creates the registry and scans the directories of the settings.
///
/// Fails if the registry is already initialized or a directory cannot be read.
pub fn init(settings: Settings) -> Result<(), MapError> {
    let mut guard = REGISTRY.write();
    if guard.is_some() {
        return Err(MapError::Registry("registry is already initialized".into()));
    }

    let mut registry = Registry::new(settings.clone());
    if let Some(plugin_path) = &settings.plugin_path {
        scan_plugins(&mut registry, plugin_path)?;
    }
    if let Some(font_path) = &settings.font_path {
        load_fonts(&mut registry, font_path, true)?;
    }

    log::info!(
        "Registry initialized with {} plugins and {} fonts",
        registry.datasources.len(),
        registry.fonts.len()
    );
    *guard = Some(registry);
    Ok(())
}

/// Returns true if [`init`] was called and [`shutdown`] was not.
pub fn is_initialized() -> bool {
    REGISTRY.read().is_some()
}

/// Settings the registry was initialized with.
pub fn settings() -> Option<Settings> {
    REGISTRY.read().as_ref().map(|r| r.settings.clone())
}

/// Drops all registrations. Returns false if the registry was not initialized.
///
/// Datasources created before the call keep working.
pub fn shutdown() -> bool {
    let previous = REGISTRY.write().take();
    if previous.is_some() {
        log::info!("Registry shut down");
    }

    previous.is_some()
}

/// Attaches a provider factory to a datasource type.
///
/// The type may have been found by [`register_datasources`] before. Built-in types and
/// types that already have a factory cannot be registered.
pub fn register_datasource(name: &str, factory: ProviderFactory) -> Result<(), MapError> {
    if BUILT_IN_DATASOURCES.contains(&name) {
        return Err(MapError::Registry(format!(
            "datasource '{name}' is built in"
        )));
    }

    with_registry(|registry| {
        let entry = registry.datasources.entry(name.to_string()).or_default();
        if entry.is_some() {
            return Err(MapError::DuplicateName(name.to_string()));
        }

        *entry = Some(factory);
        log::debug!("Registered datasource '{name}'");
        Ok(())
    })
}

/// Records names of `*.input` plugins found in the directory. Returns the newly found names.
pub fn register_datasources(dir: impl AsRef<Path>) -> Result<Vec<String>, MapError> {
    with_registry(|registry| scan_plugins(registry, dir.as_ref()))
}

fn scan_plugins(registry: &mut Registry, dir: &Path) -> Result<Vec<String>, MapError> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PLUGIN_EXTENSION) {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if BUILT_IN_DATASOURCES.contains(&name) || registry.datasources.contains_key(name) {
            continue;
        }

        registry.datasources.insert(name.to_string(), None);
        found.push(name.to_string());
    }

    found.sort();
    log::debug!("Found plugins {found:?} in {}", dir.display());
    Ok(found)
}

/// Names of all datasource types that can be used or have been found as plugins.
pub fn datasources() -> Vec<String> {
    let mut names: Vec<String> = BUILT_IN_DATASOURCES.iter().map(|s| s.to_string()).collect();
    if let Some(registry) = REGISTRY.read().as_ref() {
        names.extend(registry.datasources.keys().cloned());
    }

    names.sort();
    names
}

/// Creates a provider for a plugin datasource type.
pub(crate) fn create_provider(
    options: &DatasourceOptions,
) -> Result<Box<dyn FeatureProvider>, MapError> {
    let name = options.type_name();
    let factory = REGISTRY
        .read()
        .as_ref()
        .and_then(|registry| registry.datasources.get(name).cloned().flatten());

    match factory {
        Some(factory) => factory(options),
        None => Err(MapError::NotFound(format!(
            "provider for datasource type '{name}'"
        ))),
    }
}

/// Registers font faces from files in the directory. Returns the number of new faces.
///
/// Files that are not fonts are skipped. Without the `fonts` feature nothing is registered.
pub fn register_fonts(dir: impl AsRef<Path>, recurse: bool) -> Result<usize, MapError> {
    with_registry(|registry| load_fonts(registry, dir.as_ref(), recurse))
}

/// Names of registered font faces.
pub fn fonts() -> Vec<String> {
    REGISTRY
        .read()
        .as_ref()
        .map(|r| r.fonts.keys().cloned().collect())
        .unwrap_or_default()
}

/// Registered font faces with the files they are loaded from.
pub fn font_files() -> BTreeMap<String, PathBuf> {
    REGISTRY
        .read()
        .as_ref()
        .map(|r| r.fonts.clone())
        .unwrap_or_default()
}

fn font_candidates(dir: &Path, recurse: bool, files: &mut Vec<PathBuf>) -> Result<(), MapError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recurse {
                font_candidates(&path, recurse, files)?;
            }
            continue;
        }

        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc" | "otc"))
            .unwrap_or(false);
        if is_font {
            files.push(path);
        }
    }

    Ok(())
}

#[cfg(feature = "fonts")]
fn load_fonts(registry: &mut Registry, dir: &Path, recurse: bool) -> Result<usize, MapError> {
    let mut files = Vec::new();
    font_candidates(dir, recurse, &mut files)?;
    files.sort();

    let faces_before = registry.fonts.len();
    for file in files {
        if registry.font_files.contains(&file) {
            continue;
        }

        if let Err(err) = registry.font_db.load_font_file(&file) {
            log::warn!("Failed to load font file {}: {err}", file.display());
            continue;
        }

        registry.font_files.insert(file);
    }

    for face in registry.font_db.faces() {
        let path = match &face.source {
            fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => path,
            _ => continue,
        };

        let name = face_name(face);
        registry.fonts.entry(name).or_insert_with(|| path.clone());
    }

    let added = registry.fonts.len() - faces_before;
    log::debug!("Registered {added} font faces from {}", dir.display());
    Ok(added)
}

#[cfg(feature = "fonts")]
fn face_name(face: &fontdb::FaceInfo) -> String {
    let family = face
        .families
        .first()
        .map(|(family, _)| family.clone())
        .unwrap_or_else(|| face.post_script_name.clone());

    let weight = match face.weight.0 {
        0..=349 => Some("Light"),
        350..=549 => None,
        550..=649 => Some("SemiBold"),
        _ => Some("Bold"),
    };
    let style = match face.style {
        fontdb::Style::Normal => None,
        fontdb::Style::Italic => Some("Italic"),
        fontdb::Style::Oblique => Some("Oblique"),
    };

    let mut name = family;
    match (weight, style) {
        (None, None) => name.push_str(" Regular"),
        (weight, style) => {
            for part in [weight, style].into_iter().flatten() {
                name.push(' ');
                name.push_str(part);
            }
        }
    }

    name
}

#[cfg(not(feature = "fonts"))]
fn load_fonts(_registry: &mut Registry, dir: &Path, recurse: bool) -> Result<usize, MapError> {
    let mut files = Vec::new();
    font_candidates(dir, recurse, &mut files)?;
    if !files.is_empty() {
        log::warn!(
            "{} font files in {} are ignored, `fonts` feature is disabled",
            files.len(),
            dir.display()
        );
    }

    Ok(0)
}
