//! Module discovery.
//!
//! The engine does not walk the file system itself: a [ModuleLoader] turns glob patterns
//! into a list of named modules. [CatalogLoader] serves modules registered in memory under
//! path-like keys.

use std::collections::BTreeMap;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{BrickError, Result};
use crate::model::Module;

/// A module found by a loader, with the key it was found under
#[derive(Clone, Debug)]
pub struct LoadedModule {
    pub name: String,
    pub module: Module,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Patterns excluded from the matches
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl LoadOptions {
    pub fn ignoring<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Options of a call, completed with the defaults of the engine
    pub(crate) fn merged(&self, defaults: &LoadOptions) -> LoadOptions {
        let mut ignore = self.ignore.clone();
        ignore.extend(defaults.ignore.iter().cloned());
        LoadOptions { ignore }
    }
}

/// Source of modules matching a set of patterns.
///
/// Loading the same patterns twice yields the same modules in the same order.
pub trait ModuleLoader {
    fn load(&self, patterns: &[String], options: &LoadOptions) -> Result<Vec<LoadedModule>>;
}

/// In-memory loader matching glob patterns against the keys of its catalog
#[derive(Clone, Debug, Default)]
pub struct CatalogLoader {
    modules: BTreeMap<String, Module>,
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, module: Module) -> Self {
        self.insert(path, module);
        self
    }

    /// Add a module, returns the module previously stored under the same key
    pub fn insert(&mut self, path: impl Into<String>, module: Module) -> Option<Module> {
        self.modules.insert(path.into(), module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for CatalogLoader {
    fn load(&self, patterns: &[String], options: &LoadOptions) -> Result<Vec<LoadedModule>> {
        let include = compile(patterns)?;
        let exclude = compile(&options.ignore)?;
        let found: Vec<LoadedModule> = self
            .modules
            .iter()
            .filter(|(path, _)| include.is_match(path.as_str()) && !exclude.is_match(path.as_str()))
            .map(|(path, module)| LoadedModule {
                name: path.clone(),
                module: module.clone(),
            })
            .collect();
        trace!(?patterns, found = found.len(), "modules loaded");
        Ok(found)
    }
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            BrickError::InvalidArgument(format!("invalid pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| BrickError::InvalidArgument(format!("invalid patterns: {e}")))
}
