//! Dependency descriptors and the declarative inject/provide metadata.
//!
//! Modules do not carry their own annotations: declarations made with [inject] and [provide]
//! are stored in a process-scoped side-table keyed by the [ModuleId] of the module, and read
//! back with [get_inject_info] and [get_provide_info]. Entries are dropped together with the
//! last handle on the module.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{BrickError, Result};
use crate::model::{Model, Module, ModuleId};

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Unique identity with a human-readable description.
///
/// Two symbols created with the same description are still different identifiers.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    pub fn new(description: &str) -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Identifier of a provider: either a plain name or a [Symbol]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepId {
    Name(String),
    Symbol(Symbol),
}

impl fmt::Display for DepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepId::Name(name) => f.write_str(name),
            DepId::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

impl From<&str> for DepId {
    fn from(name: &str) -> Self {
        DepId::Name(name.to_string())
    }
}

impl From<String> for DepId {
    fn from(name: String) -> Self {
        DepId::Name(name)
    }
}

impl From<Symbol> for DepId {
    fn from(symbol: Symbol) -> Self {
        DepId::Symbol(symbol)
    }
}

impl From<&Symbol> for DepId {
    fn from(symbol: &Symbol) -> Self {
        DepId::Symbol(symbol.clone())
    }
}

/// Function applied to a resolved model before it is handed to the consumer
pub type Transform = Arc<dyn Fn(Model) -> Model + Send + Sync>;

/// Normalized description of one declared dependency.
///
/// Created once, never mutated. The transform is the identity unless one was given.
#[derive(Clone)]
pub struct Dependency {
    id: DepId,
    required: bool,
    transform: Option<Transform>,
}

impl Dependency {
    /// A required dependency without transform
    pub fn new(id: impl Into<DepId>) -> Self {
        Self {
            id: id.into(),
            required: true,
            transform: None,
        }
    }

    /// A dependency that resolves to `None` when no provider is registered under its id
    pub fn optional(id: impl Into<DepId>) -> Self {
        Self::new(id).required(false)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Model) -> Model + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn id(&self) -> &DepId {
        &self.id
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Apply the transform of this dependency to a resolved model
    pub fn apply(&self, model: Model) -> Model {
        match &self.transform {
            Some(transform) => transform(model),
            None => model,
        }
    }

    /// Same dependency with the identity transform
    pub(crate) fn untransformed(&self) -> Self {
        Self {
            id: self.id.clone(),
            required: self.required,
            transform: None,
        }
    }

    /// Fill in the defaults of a dependency specification and validate its identifier.
    pub fn normalize(spec: impl Into<DependencySpec>) -> Result<Self> {
        let dep = match spec.into() {
            DependencySpec::Id(id) => Dependency::new(id),
            DependencySpec::Descriptor(dep) => dep,
            DependencySpec::Declared(DependencyDecl::Name(name)) => Dependency::new(name),
            DependencySpec::Declared(DependencyDecl::Table { id, required }) => {
                Dependency::new(id).required(required)
            }
        };
        dep.validate()?;
        Ok(dep)
    }

    /// Check that the identifier can name a provider
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)
    }
}

/// Names must be non-empty and free of whitespace, symbols are always valid
pub(crate) fn validate_id(id: &DepId) -> Result<()> {
    if let DepId::Name(name) = id {
        if name.is_empty() {
            return Err(BrickError::InvalidDependencyKind(
                "dependency name is empty".to_string(),
            ));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(BrickError::InvalidDependencyKind(format!(
                "dependency name '{name}' contains whitespace"
            )));
        }
    }
    Ok(())
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        let same_transform = match (&self.transform, &other.transform) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.id == other.id && self.required == other.required && same_transform
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("required", &self.required)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Dependency as written in a configuration file: a bare name or an `{ id, required }` table
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencyDecl {
    Name(String),
    Table {
        id: String,
        #[serde(default = "required_by_default")]
        required: bool,
    },
}

fn required_by_default() -> bool {
    true
}

/// Unnormalized dependency specification accepted by [inject] and [provide]
#[derive(Clone, Debug)]
pub enum DependencySpec {
    Id(DepId),
    Descriptor(Dependency),
    Declared(DependencyDecl),
}

impl From<&str> for DependencySpec {
    fn from(name: &str) -> Self {
        DependencySpec::Id(name.into())
    }
}

impl From<String> for DependencySpec {
    fn from(name: String) -> Self {
        DependencySpec::Id(name.into())
    }
}

impl From<Symbol> for DependencySpec {
    fn from(symbol: Symbol) -> Self {
        DependencySpec::Id(symbol.into())
    }
}

impl From<&Symbol> for DependencySpec {
    fn from(symbol: &Symbol) -> Self {
        DependencySpec::Id(symbol.into())
    }
}

impl From<DepId> for DependencySpec {
    fn from(id: DepId) -> Self {
        DependencySpec::Id(id)
    }
}

impl From<Dependency> for DependencySpec {
    fn from(dep: Dependency) -> Self {
        DependencySpec::Descriptor(dep)
    }
}

impl From<DependencyDecl> for DependencySpec {
    fn from(decl: DependencyDecl) -> Self {
        DependencySpec::Declared(decl)
    }
}

/// Consumer-side declaration: the name under which the module is provided and what it needs
#[derive(Clone, Debug, Default)]
pub struct InjectOpts {
    pub name: Option<DepId>,
    pub deps: Vec<DependencySpec>,
}

/// Provider-side declaration: one property to assign after the model is built
#[derive(Clone, Debug)]
pub struct ProvideOpts {
    pub dep: DependencySpec,
    pub property: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InjectInfo {
    pub name: Option<DepId>,
    pub deps: Vec<Dependency>,
}

/// `properties[i]` receives the value of `deps[i]`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProvideInfo {
    pub deps: Vec<Dependency>,
    pub properties: Vec<String>,
}

#[derive(Default)]
struct Metadata {
    inject: InjectInfo,
    provide: ProvideInfo,
}

static METADATA: Lazy<RwLock<HashMap<ModuleId, Metadata>>> = Lazy::new(Default::default);

/// Declare the name and the dependencies of a module, replacing any previous declaration.
pub fn inject(module: &Module, opts: InjectOpts) -> Result<()> {
    let deps = opts
        .deps
        .into_iter()
        .map(Dependency::normalize)
        .collect::<Result<Vec<_>>>()?;
    let info = InjectInfo {
        name: opts.name,
        deps,
    };
    let mut table = METADATA.write().unwrap_or_else(PoisonError::into_inner);
    let previous = std::mem::replace(&mut table.entry(module.id()).or_default().inject, info);
    // transforms may own module handles whose drop takes the lock again
    drop(table);
    drop(previous);
    Ok(())
}

/// Declare one property of the module model to be filled with a dependency after construction.
pub fn provide(module: &Module, opts: ProvideOpts) -> Result<()> {
    if opts.property.is_empty() {
        return Err(BrickError::InvalidArgument(
            "provided property name is empty".to_string(),
        ));
    }
    let dep = Dependency::normalize(opts.dep)?;
    let mut table = METADATA.write().unwrap_or_else(PoisonError::into_inner);
    let info = &mut table.entry(module.id()).or_default().provide;
    info.deps.push(dep);
    info.properties.push(opts.property);
    Ok(())
}

pub fn get_inject_info(module: &Module) -> InjectInfo {
    let table = METADATA.read().unwrap_or_else(PoisonError::into_inner);
    table
        .get(&module.id())
        .map(|meta| meta.inject.clone())
        .unwrap_or_default()
}

pub fn get_provide_info(module: &Module) -> ProvideInfo {
    let table = METADATA.read().unwrap_or_else(PoisonError::into_inner);
    table
        .get(&module.id())
        .map(|meta| meta.provide.clone())
        .unwrap_or_default()
}

/// Drop the declarations of a module that no longer exists
pub(crate) fn forget(id: ModuleId) {
    let mut table = METADATA.write().unwrap_or_else(PoisonError::into_inner);
    let removed = table.remove(&id);
    drop(table);
    drop(removed);
}
