//! Viewer scene: model instances, lights, ground and camera
//!
//! Every catalog model is loaded once and kept for the whole run. Switching
//! models only flips visibility flags, driven by the `Selection`.

pub mod camera;
pub mod config;
pub mod lighting;

pub use camera::{OrbitCamera, OrbitControls};
pub use config::{GroundConfig, SceneConfig};
pub use lighting::FrameUniforms;

use glam::Mat4;
use rayon::prelude::*;

use crate::assets::{AnimationPlayer, ModelAsset, load_model};
use crate::error::ViewerError;
use crate::selection::{ModelCatalog, ModelEntry, ModelIndex, Selection};

/// A loaded, positioned, visibility-toggleable model
#[derive(Debug)]
pub struct ModelInstance {
    pub entry: ModelEntry,
    pub visible: bool,
    /// `None` when the file failed to load; the instance then never draws
    pub asset: Option<ModelAsset>,
    pub player: Option<AnimationPlayer>,
}

impl ModelInstance {
    pub fn new(entry: ModelEntry, asset: Option<ModelAsset>) -> Self {
        let (asset, player) = match asset {
            Some(mut asset) => {
                let clips = std::mem::take(&mut asset.animations);
                (Some(asset), AnimationPlayer::new(clips))
            }
            None => (None, None),
        };
        Self {
            entry,
            visible: false,
            asset,
            player,
        }
    }

    pub fn placement(&self) -> Mat4 {
        Mat4::from_translation(self.entry.position)
    }

    /// Advance animation playback by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        if let (Some(player), Some(asset)) = (self.player.as_mut(), self.asset.as_mut()) {
            player.advance(dt, &mut asset.nodes);
        }
    }
}

/// Application state: the catalog, its instances and the active selection
pub struct SceneState {
    pub config: SceneConfig,
    catalog: ModelCatalog,
    instances: Vec<ModelInstance>,
    selection: Selection,
}

impl SceneState {
    /// Build the scene with one instance per catalog entry.
    ///
    /// `assets[i]` is the decoded asset for `config.models[i]`, or `None` if it
    /// failed to load.
    pub fn new(config: SceneConfig, assets: Vec<Option<ModelAsset>>) -> Result<Self, ViewerError> {
        let catalog = ModelCatalog::new(config.models.clone());
        let default = catalog
            .index_of(&config.default_model)
            .ok_or_else(|| ViewerError::UnknownModel(config.default_model.clone()))?;

        let mut assets = assets.into_iter();
        let instances = catalog
            .entries()
            .iter()
            .map(|entry| ModelInstance::new(entry.clone(), assets.next().flatten()))
            .collect();

        let selection = Selection::new(&catalog, default);
        let mut scene = Self {
            config,
            catalog,
            instances,
            selection,
        };
        scene.apply_selection();
        Ok(scene)
    }

    /// Load every catalog model in parallel, then build the scene
    pub fn load(config: SceneConfig) -> Result<Self, ViewerError> {
        let assets = load_all(&config.models);
        Self::new(config, assets)
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    pub fn instance(&self, index: ModelIndex) -> &ModelInstance {
        &self.instances[index.get()]
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Make `index` the active model and update visibility
    pub fn select(&mut self, index: ModelIndex) {
        self.selection.select(index);
        self.apply_selection();
    }

    /// Select by identifier. Returns false for an unknown identifier.
    pub fn select_id(&mut self, id: &str) -> bool {
        match self.catalog.index_of(id) {
            Some(index) => {
                self.select(index);
                true
            }
            None => false,
        }
    }

    pub fn select_next(&mut self) {
        self.selection.select_next();
        self.apply_selection();
    }

    /// `visible = (instance == selection)` for every instance
    pub fn apply_selection(&mut self) {
        for (instance, visible) in self.instances.iter_mut().zip(self.selection.visibility()) {
            instance.visible = visible;
        }
    }

    /// Per-frame update: advance every animation (hidden models keep playing)
    /// and refresh visibility
    pub fn advance(&mut self, dt: f32) {
        for instance in &mut self.instances {
            instance.advance(dt);
        }
        self.apply_selection();
    }

    pub fn visible_instances(&self) -> impl Iterator<Item = (ModelIndex, &ModelInstance)> {
        self.catalog
            .indices()
            .zip(self.instances.iter())
            .filter(|(_, instance)| instance.visible)
    }
}

/// Decode every model file; failures are logged and yield `None`
pub fn load_all(entries: &[ModelEntry]) -> Vec<Option<ModelAsset>> {
    entries
        .par_iter()
        .map(|entry| match load_model(&entry.path) {
            Ok(asset) => {
                log::info!(
                    "Loaded {} ({} nodes, {} primitives, {} animations)",
                    entry.path.display(),
                    asset.nodes.len(),
                    asset.primitive_count(),
                    asset.animations.len()
                );
                Some(asset)
            }
            Err(e) => {
                log::error!("Failed to load model '{}': {:#}", entry.id, e);
                None
            }
        })
        .collect()
}
