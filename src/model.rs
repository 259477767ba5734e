//! Modules and the construction of their models.
//!
//! A [Module] pairs a process-unique identity with a [Factory] telling how its model is
//! obtained from the resolved dependencies:
//!
//! * [Factory::Constructor] builds a fresh instance on every call,
//! * [Factory::Function] returns whatever model the function produces (possibly shared),
//! * [Factory::Value] is a ready-made model, returned as is.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::engine::Engine;
use crate::error::{BoxError, BrickError, Result};
use crate::inject::{self, DepId, Dependency, DependencySpec, InjectOpts, ProvideOpts};

/// Type-erased model shared between consumers
pub type Model = Arc<dyn Any + Send + Sync>;

/// A resolved dependency: `None` for an absent optional dependency
pub type Resolved = Option<Model>;

type BuildFn = Arc<dyn Fn(&Args) -> Result<Model, BoxError> + Send + Sync>;

/// How the model of a module is obtained
#[derive(Clone)]
pub enum Factory {
    Constructor(BuildFn),
    Function(BuildFn),
    Value(Model),
}

impl Factory {
    /// Each call allocates a new instance of `T`
    pub fn constructor<T, F>(build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Factory::Constructor(Arc::new(move |args| {
            build(args).map(|instance| Arc::new(instance) as Model)
        }))
    }

    pub fn function<F>(build: F) -> Self
    where
        F: Fn(&Args) -> Result<Model, BoxError> + Send + Sync + 'static,
    {
        Factory::Function(Arc::new(build))
    }

    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Factory::Value(Arc::new(value))
    }

    /// True for constructors and functions, false for plain values
    pub fn is_callable(&self) -> bool {
        !matches!(self, Factory::Value(_))
    }

    pub(crate) fn invoke(&self, args: &Args) -> Result<Model, BoxError> {
        match self {
            Factory::Constructor(build) | Factory::Function(build) => build(args),
            Factory::Value(model) => Ok(model.clone()),
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Constructor(_) => f.write_str("Constructor"),
            Factory::Function(_) => f.write_str("Function"),
            Factory::Value(_) => f.write_str("Value"),
        }
    }
}

/// Resolved arguments passed to a constructor or a factory function, in declaration order
#[derive(Default)]
pub struct Args {
    values: Vec<Resolved>,
    engine: Option<Engine>,
}

impl Args {
    pub fn new(values: Vec<Resolved>) -> Self {
        Self {
            values,
            engine: None,
        }
    }

    pub(crate) fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw model at the given position, `None` if out of range or absent
    pub fn model(&self, index: usize) -> Option<&Model> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Typed access to a required argument
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        self.optional(index)?.ok_or_else(|| {
            BrickError::InvalidArgument(format!("argument {index} is undefined"))
        })
    }

    /// Typed access to an optional argument
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> Result<Option<Arc<T>>> {
        match self.model(index) {
            None => Ok(None),
            Some(model) => model.clone().downcast::<T>().map(Some).map_err(|_| {
                BrickError::InvalidArgument(format!(
                    "argument {index} is not a {}",
                    type_name::<T>()
                ))
            }),
        }
    }

    /// Engine using a module that declares no dependency
    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    pub fn into_values(self) -> Vec<Resolved> {
        self.values
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field(
                "values",
                &self.values.iter().map(Option::is_some).collect::<Vec<_>>(),
            )
            .field("engine", &self.engine.is_some())
            .finish()
    }
}

/// Models accepting property injection after construction
pub trait Slots: Send + Sync {
    fn assign(&self, property: &str, value: Resolved) -> Result<(), BoxError>;
}

type SlotAccess = for<'a> fn(&'a (dyn Any + Send + Sync + 'static)) -> Option<&'a dyn Slots>;

fn slots_of<'a, T: Slots + 'static>(
    model: &'a (dyn Any + Send + Sync + 'static),
) -> Option<&'a dyn Slots> {
    model.downcast_ref::<T>().map(|slots| slots as &dyn Slots)
}

static NEXT_MODULE: AtomicU64 = AtomicU64::new(1);

/// Identity of a module, used as key of the declaration side-table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

struct ModuleInner {
    id: ModuleId,
    factory: Factory,
    slots: OnceCell<SlotAccess>,
}

impl Drop for ModuleInner {
    fn drop(&mut self) {
        inject::forget(self.id);
    }
}

/// Shared handle on a module value
#[derive(Clone)]
pub struct Module(Arc<ModuleInner>);

impl Module {
    pub fn new(factory: Factory) -> Self {
        Module(Arc::new(ModuleInner {
            id: ModuleId(NEXT_MODULE.fetch_add(1, Ordering::Relaxed)),
            factory,
            slots: OnceCell::new(),
        }))
    }

    pub fn constructor<T, F>(build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(Factory::constructor(build))
    }

    pub fn function<F>(build: F) -> Self
    where
        F: Fn(&Args) -> Result<Model, BoxError> + Send + Sync + 'static,
    {
        Self::new(Factory::function(build))
    }

    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(Factory::value(value))
    }

    pub fn id(&self) -> ModuleId {
        self.0.id
    }

    pub fn factory(&self) -> &Factory {
        &self.0.factory
    }

    /// Declare the name and dependencies of this module, see [inject::inject]
    pub fn injected<I, D>(self, name: Option<DepId>, deps: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<DependencySpec>,
    {
        let opts = InjectOpts {
            name,
            deps: deps.into_iter().map(Into::into).collect(),
        };
        inject::inject(&self, opts)?;
        Ok(self)
    }

    /// Shorthand for a named module
    pub fn named<I, D>(self, name: impl Into<DepId>, deps: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<DependencySpec>,
    {
        self.injected(Some(name.into()), deps)
    }

    /// Declare a property filled after construction, see [inject::provide]
    pub fn provided(self, dep: impl Into<DependencySpec>, property: &str) -> Result<Self> {
        inject::provide(
            &self,
            ProvideOpts {
                dep: dep.into(),
                property: property.to_string(),
            },
        )?;
        Ok(self)
    }

    /// Models of this module are `T` values accepting property injection.
    ///
    /// The first declaration wins.
    pub fn with_slots<T: Slots + 'static>(self) -> Self {
        let _ = self.0.slots.set(slots_of::<T>);
        self
    }

    fn slots<'a>(&self, model: &'a Model) -> Option<&'a dyn Slots> {
        self.0.slots.get().and_then(|access| access(model.as_ref()))
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.0.id)
            .field("factory", &self.0.factory)
            .finish()
    }
}

/// A model along with the module it was built from
#[derive(Clone)]
pub struct Built {
    pub name: Option<DepId>,
    pub module: Module,
    pub model: Model,
}

impl fmt::Debug for Built {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Built")
            .field("name", &self.name)
            .field("module", &self.module)
            .finish()
    }
}

/// Build a model from its factory and the resolved arguments.
///
/// Plain values ignore the arguments.
pub fn build_model(factory: &Factory, args: Args) -> Result<Model> {
    build_named(None, factory, args)
}

pub(crate) fn build_named(name: Option<&DepId>, factory: &Factory, args: Args) -> Result<Model> {
    factory
        .invoke(&args)
        .map_err(|source| BrickError::ConstructionFailure {
            name: name.cloned(),
            source,
        })
}

/// Assign the resolved `modules` to the `properties` of an already built model.
///
/// The transform of `deps[i]` is applied to `modules[i]` before it is assigned to
/// `properties[i]`, in declaration order.
pub fn init_model(
    target: Built,
    properties: &[String],
    deps: &[Dependency],
    modules: Vec<Resolved>,
) -> Result<Built> {
    if properties.len() != deps.len() || deps.len() != modules.len() {
        return Err(BrickError::InvalidArgument(format!(
            "{} properties, {} dependencies and {} modules do not line up",
            properties.len(),
            deps.len(),
            modules.len()
        )));
    }
    if properties.is_empty() {
        return Ok(target);
    }

    let slots = target.module.slots(&target.model).ok_or_else(|| {
        BrickError::InvalidArgument(format!(
            "model of {:?} does not accept property injection",
            target.module.id()
        ))
    })?;
    for ((property, dep), module) in properties.iter().zip(deps).zip(modules) {
        let value = module.map(|m| dep.apply(m));
        slots
            .assign(property, value)
            .map_err(|source| BrickError::ConstructionFailure {
                name: target.name.clone(),
                source,
            })?;
    }
    Ok(target)
}
