use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::OnceCell;

use crate::model::{declared_models, ModelDescriptor};
use crate::seed::error::{SeedError, SeedResult};

static REGISTRY: OnceCell<Registry> = OnceCell::new();

/// Maps normalized model names to model descriptors.
///
/// Every model is reachable under three spellings: its declared name, its table
/// name and the snake_case form of its declared name. Lookups trim whitespace and
/// ignore case.
#[derive(Debug, Default)]
pub struct Registry {
    by_name: HashMap<String, Arc<ModelDescriptor>>,
    models: Vec<Arc<ModelDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of models, failing on the first naming collision
    pub fn from_models<I>(models: I) -> SeedResult<Self>
    where
        I: IntoIterator<Item = ModelDescriptor>,
    {
        let mut registry = Self::new();
        for model in models {
            registry.register(model)?;
        }
        Ok(registry)
    }

    /// Register a model under its three accepted spellings
    pub fn register(&mut self, model: ModelDescriptor) -> SeedResult<Arc<ModelDescriptor>> {
        let model = Arc::new(model);
        self.add(&model.name, &model)?;
        if let Some(table_name) = model.table_name.as_deref() {
            self.add(table_name, &model)?;
        }
        self.add(&snake_case(&model.name), &model)?;
        self.models.push(model.clone());
        Ok(model)
    }

    fn add(&mut self, key: &str, model: &Arc<ModelDescriptor>) -> SeedResult<()> {
        let normalized = normalize(key);
        if normalized.is_empty() {
            return Ok(());
        }

        if let Some(existing) = self.by_name.get(&normalized) {
            if Arc::ptr_eq(existing, model) {
                return Ok(());
            }
            return Err(SeedError::Configuration(format!(
                "key '{}' (normalized: '{}') is already bound to {}, cannot bind it to {}",
                key, normalized, existing, model
            )));
        }

        self.by_name.insert(normalized, model.clone());
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.by_name.get(&normalize(name))
    }

    /// Registered models in registration order
    pub fn models(&self) -> &[Arc<ModelDescriptor>] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Registry of the service's declared models, built on first use and kept for the
/// lifetime of the process
pub fn collect_models_registry() -> SeedResult<&'static Registry> {
    REGISTRY.get_or_try_init(|| -> SeedResult<Registry> {
        let registry = Registry::from_models(declared_models())?;
        log::debug!(
            "Model registry built: {}",
            registry.models().iter().map(|model| model.name.as_str()).join(", ")
        );
        Ok(registry)
    })
}

pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// `ProjectTemplates` -> `project_templates`
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_uppercase() && !out.is_empty() {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}
