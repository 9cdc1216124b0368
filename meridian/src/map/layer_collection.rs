use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};

use crate::error::MapError;
use crate::layer::Layer;

/// Reference to a layer of a map either by its name or by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSelector {
    /// Layer with the given name.
    Name(String),
    /// Layer at the given position in the drawing order.
    Index(usize),
}

impl From<&str> for LayerSelector {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for LayerSelector {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<usize> for LayerSelector {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl Display for LayerSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerSelector::Name(name) => write!(f, "layer '{name}'"),
            LayerSelector::Index(index) => write!(f, "layer #{index}"),
        }
    }
}

/// Ordered collection of uniquely named layers.
///
/// When a map is rendered, it draws all visible layers in the order they are stored in the
/// collection. Layers that are inactive or outside of their scale range are ignored by the
/// renderer, but retain their place in the collection.
///
/// ```
/// use meridian::map::LayerCollection;
/// use meridian::Layer;
///
/// let mut collection = LayerCollection::default();
/// collection.push(Layer::new("countries")).unwrap();
/// collection.push(Layer::new("roads")).unwrap();
///
/// assert!(collection.push(Layer::new("roads")).is_err());
/// assert_eq!(collection.get("roads").map(|l| l.name()), Some("roads"));
/// assert_eq!(collection[0].name(), "countries");
/// ```
#[derive(Debug, Default)]
pub struct LayerCollection(Vec<Layer>);

impl LayerCollection {
    /// Removes all layers from the collection.
    pub fn clear(&mut self) {
        self.0.clear()
    }

    /// Appends a layer to the end of the drawing order.
    ///
    /// Fails with [`MapError::DuplicateName`] if a layer with the same name is already present.
    pub fn push(&mut self, layer: Layer) -> Result<(), MapError> {
        self.check_unique(layer.name())?;
        self.0.push(layer);
        Ok(())
    }

    /// Inserts a layer at position `index`, shifting all layers after it.
    ///
    /// # Examples
    ///
    /// ```
    /// use meridian::map::LayerCollection;
    /// use meridian::Layer;
    ///
    /// let mut collection = LayerCollection::default();
    /// collection.push(Layer::new("A")).unwrap();
    /// collection.push(Layer::new("C")).unwrap();
    /// collection.insert(1, Layer::new("B")).unwrap();
    ///
    /// let names: Vec<_> = collection.iter().map(|l| l.name()).collect();
    /// assert_eq!(names, ["A", "B", "C"]);
    /// ```
    pub fn insert(&mut self, index: usize, layer: Layer) -> Result<(), MapError> {
        if index > self.0.len() {
            return Err(MapError::NotFound(LayerSelector::Index(index).to_string()));
        }

        self.check_unique(layer.name())?;
        self.0.insert(index, layer);
        Ok(())
    }

    /// Removes a layer and returns it.
    pub fn remove(&mut self, selector: impl Into<LayerSelector>) -> Result<Layer, MapError> {
        let selector = selector.into();
        let index = self
            .position(&selector)
            .ok_or_else(|| MapError::NotFound(selector.to_string()))?;
        Ok(self.0.remove(index))
    }

    /// Retains only layers for which `f` returns true.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&Layer) -> bool,
    {
        self.0.retain(f)
    }

    /// Returns the number of layers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the collection has no layers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the selected layer.
    pub fn position(&self, selector: &LayerSelector) -> Option<usize> {
        match selector {
            LayerSelector::Index(index) => (*index < self.0.len()).then_some(*index),
            LayerSelector::Name(name) => self.0.iter().position(|layer| layer.name() == name),
        }
    }

    /// Returns the selected layer.
    pub fn get(&self, selector: impl Into<LayerSelector>) -> Option<&Layer> {
        self.position(&selector.into()).map(|index| &self.0[index])
    }

    /// Returns a mutable reference to the selected layer.
    ///
    /// Renaming the layer through this reference can break the uniqueness of names; use
    /// [`LayerCollection::rename`] for that.
    pub fn get_mut(&mut self, selector: impl Into<LayerSelector>) -> Option<&mut Layer> {
        self.position(&selector.into())
            .map(move |index| &mut self.0[index])
    }

    /// Renames the selected layer, keeping names unique.
    pub fn rename(
        &mut self,
        selector: impl Into<LayerSelector>,
        name: impl Into<String>,
    ) -> Result<(), MapError> {
        let selector = selector.into();
        let name = name.into();
        let index = self
            .position(&selector)
            .ok_or_else(|| MapError::NotFound(selector.to_string()))?;
        if self.0[index].name() != name {
            self.check_unique(&name)?;
        }

        self.0[index].set_name(name);
        Ok(())
    }

    /// Swaps two layers in the drawing order.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.0.swap(a, b)
    }

    /// Iterates over all layers in the drawing order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.0.iter()
    }

    /// Iterates over mutable references to all layers.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> + '_ {
        self.0.iter_mut()
    }

    /// Iterates over layers drawn at the given scale denominator, together with their
    /// positions in the collection.
    ///
    /// ```
    /// use meridian::map::LayerCollection;
    /// use meridian::Layer;
    ///
    /// let mut hidden = Layer::new("hidden");
    /// hidden.set_active(false);
    /// let mut detailed = Layer::new("detailed");
    /// detailed.set_scale_range(0.0, 50_000.0);
    ///
    /// let collection = LayerCollection::from_iter([Layer::new("base"), hidden, detailed]);
    /// let visible: Vec<_> = collection
    ///     .iter_visible(1_000_000.0)
    ///     .map(|(index, layer)| (index, layer.name()))
    ///     .collect();
    /// assert_eq!(visible, [(0, "base")]);
    /// ```
    pub fn iter_visible(
        &self,
        scale_denominator: f64,
    ) -> impl Iterator<Item = (usize, &Layer)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(move |(_, layer)| layer.is_visible(scale_denominator))
    }

    fn check_unique(&self, name: &str) -> Result<(), MapError> {
        if self.0.iter().any(|layer| layer.name() == name) {
            return Err(MapError::DuplicateName(name.to_string()));
        }

        Ok(())
    }
}

impl Index<usize> for LayerCollection {
    type Output = Layer;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for LayerCollection {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

/// Collects layers, keeping the first layer of every name.
impl FromIterator<Layer> for LayerCollection {
    fn from_iter<T: IntoIterator<Item = Layer>>(iter: T) -> Self {
        let mut collection = Self::default();
        for layer in iter {
            if let Err(err) = collection.push(layer) {
                log::warn!("Layer is not added to the collection: {err}");
            }
        }

        collection
    }
}
