//! Model catalog and the active-model selection
//!
//! The catalog is the closed enumeration of models the viewer knows about.
//! Both the selectable options and the scene's model instances are built from
//! it, so an index handed out by the catalog always has a backing instance.

use glam::Vec3;
use std::path::PathBuf;

/// One selectable model: identity, display label, file and placement
#[derive(Debug, Clone)]
pub struct ModelEntry {
    /// Stable identifier (e.g. "model-1")
    pub id: String,
    /// Human-readable label shown in the UI
    pub label: String,
    /// Path of the glTF/GLB file
    pub path: PathBuf,
    /// World-space offset of the model's root
    pub position: Vec3,
}

impl ModelEntry {
    pub fn new(id: &str, label: &str, path: impl Into<PathBuf>, position: Vec3) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            path: path.into(),
            position,
        }
    }
}

/// Index of a catalog entry. Only the catalog can produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelIndex(usize);

impl ModelIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// Ordered, fixed list of known models
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn entry(&self, index: ModelIndex) -> &ModelEntry {
        &self.entries[index.0]
    }

    /// Look up a model by identifier
    pub fn index_of(&self, id: &str) -> Option<ModelIndex> {
        self.entries.iter().position(|e| e.id == id).map(ModelIndex)
    }

    /// The `n`-th entry (zero based), if the catalog has one
    pub fn nth(&self, n: usize) -> Option<ModelIndex> {
        (n < self.entries.len()).then_some(ModelIndex(n))
    }

    pub fn indices(&self) -> impl Iterator<Item = ModelIndex> + '_ {
        (0..self.entries.len()).map(ModelIndex)
    }
}

/// The single active model. Exactly one catalog entry is active at any time.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    active: ModelIndex,
    count: usize,
}

impl Selection {
    /// Start with `default` active
    pub fn new(catalog: &ModelCatalog, default: ModelIndex) -> Self {
        Self {
            active: default,
            count: catalog.len(),
        }
    }

    pub fn active(&self) -> ModelIndex {
        self.active
    }

    pub fn is_active(&self, index: ModelIndex) -> bool {
        self.active == index
    }

    /// Make `index` the active model. Re-selecting the active model is a no-op.
    pub fn select(&mut self, index: ModelIndex) {
        self.active = index;
    }

    /// Advance to the next model, wrapping at the end of the catalog
    pub fn select_next(&mut self) {
        self.active = ModelIndex((self.active.0 + 1) % self.count);
    }

    /// Visibility flag per catalog entry, in catalog order
    pub fn visibility(&self) -> Vec<bool> {
        (0..self.count).map(|i| i == self.active.0).collect()
    }
}
