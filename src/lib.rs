//! Asynchronous dependency resolution for incrementally discovered modules.
//!
//! Modules declare the name they are provided under and the dependencies they need. Consumers
//! request dependencies by name and are called back once all of them are available, whether
//! the providers were registered before or after the request.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use std::cell::Cell;
//! # use std::rc::Rc;
//! # use brick_engine::*;
//! struct Database {
//!     url: String,
//! }
//!
//! struct Repository {
//!     db: Arc<Database>,
//! }
//!
//! # fn main() -> Result<(), BrickError> {
//! let engine = Engine::with_config(EngineConfig::default(), CatalogLoader::new());
//!
//! // the consumer comes first and is parked
//! let repository = Module::constructor(|args: &Args| Ok(Repository { db: args.get(0)? }))
//!     .named("repository", deps!["db"])?;
//! let found = Rc::new(Cell::new(false));
//! let done = found.clone();
//! engine.use_module(
//!     &repository,
//!     move |built| {
//!         let repository = built.model.downcast::<Repository>().ok();
//!         done.set(repository.is_some_and(|r| r.db.url == "memory://"));
//!     },
//!     |e| panic!("{e}"),
//! )?;
//! assert!(!found.get());
//!
//! // registering the provider satisfies the pending request
//! let db = Module::constructor(|_: &Args| Ok(Database { url: "memory://".to_string() }))
//!     .named("db", deps![])?;
//! engine.install(&db, false)?;
//! assert!(found.get());
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! * [inject] and [provide] record declarations in a side-table keyed by module identity,
//!   read back with [get_inject_info] and [get_provide_info].
//! * The [ProviderRegistry] stores named providers and parks requests until the providers
//!   they need, directly or transitively, are defined. Cycles fail with
//!   [BrickError::CircularDependency].
//! * [build_model] and [init_model] turn a [Factory] and resolved arguments into a model,
//!   then fill the properties declared with [provide].
//! * The [Engine] ties these to the configuration and a [ModuleLoader].

mod config;
mod engine;
mod error;
mod helpers;
mod inject;
mod loader;
pub mod logging;
mod model;
mod resolve;

pub use config::{
    ConfigLoader, EngineConfig, EngineSection, Environment, InjectSection, LoggingConfig,
};
pub use engine::{Engine, EngineOptions, EngineState};
pub use error::{BoxError, BrickError, Result};
pub use helpers::PropertyBag;
pub use inject::{
    get_inject_info, get_provide_info, inject, provide, DepId, Dependency, DependencyDecl,
    DependencySpec, InjectInfo, InjectOpts, ProvideInfo, ProvideOpts, Symbol, Transform,
};
pub use loader::{CatalogLoader, LoadOptions, LoadedModule, ModuleLoader};
pub use model::{
    build_model, init_model, Args, Built, Factory, Model, Module, ModuleId, Resolved, Slots,
};
pub use resolve::{OnFatal, OnSatisfied, ProviderRegistry};

#[cfg(test)]
mod tests;
