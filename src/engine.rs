//! Engine facade: environment, configuration, module loading and the provider registry.

use std::cell::Cell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::{
    ConfigLoader, EngineConfig, Environment, DEFAULT_CONFIG_DIR, DEFAULT_ENV_PREFIX,
};
use crate::error::{BrickError, Result};
use crate::inject::{get_inject_info, get_provide_info, Dependency, InjectInfo, ProvideInfo};
use crate::loader::{LoadOptions, LoadedModule, ModuleLoader};
use crate::model::{build_named, init_model, Args, Built, Module};
use crate::resolve::{OnFatal, ProviderRegistry};

type OnBuilt = Box<dyn FnOnce(Built)>;

/// Lifecycle of an [Engine]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Environment and configuration being assembled, [Engine::new] never returns it
    Created,
    Prepared,
    Running,
}

/// Where the engine finds its configuration
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub root: PathBuf,
    pub config_dir: String,
    pub env_prefix: String,
    /// Defaults merged into every load
    pub load: LoadOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            config_dir: DEFAULT_CONFIG_DIR.to_string(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            load: LoadOptions::default(),
        }
    }
}

struct EngineInner {
    load_options: LoadOptions,
    env: Environment,
    config: EngineConfig,
    registry: ProviderRegistry,
    loader: Box<dyn ModuleLoader>,
    state: Cell<EngineState>,
}

/// Cheap handle on an engine.
///
/// Callbacks run on the thread driving the engine and may use it again.
#[derive(Clone)]
pub struct Engine(Rc<EngineInner>);

impl Engine {
    /// Load environment and configuration, and prepare an empty registry.
    pub fn new(options: EngineOptions, loader: impl ModuleLoader + 'static) -> Result<Self> {
        let env = Environment::load(&options.env_prefix)?;
        let config = ConfigLoader::new(&options.root)
            .with_config_dir(options.config_dir)
            .with_env_prefix(options.env_prefix)
            .load(&env)?;
        Ok(Self::prepare(env, config, options.load, loader))
    }

    /// Engine using an already assembled configuration
    pub fn with_config(config: EngineConfig, loader: impl ModuleLoader + 'static) -> Self {
        Self::prepare(Environment::default(), config, LoadOptions::default(), loader)
    }

    fn prepare(
        env: Environment,
        config: EngineConfig,
        load_options: LoadOptions,
        loader: impl ModuleLoader + 'static,
    ) -> Self {
        let engine = Engine(Rc::new(EngineInner {
            load_options,
            env,
            config,
            registry: ProviderRegistry::new(),
            loader: Box::new(loader),
            state: Cell::new(EngineState::Created),
        }));
        engine.0.state.set(EngineState::Prepared);
        debug!(profile = %engine.0.env.config, "engine prepared");
        engine
    }

    pub fn env(&self) -> &Environment {
        &self.0.env
    }

    pub fn config(&self) -> &EngineConfig {
        &self.0.config
    }

    pub fn state(&self) -> EngineState {
        self.0.state.get()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.0.registry
    }

    /// Register a module as a named provider.
    ///
    /// Anonymous modules are never registered: `Ok(false)` is returned, with a warning
    /// unless `silent` is set.
    pub fn install(&self, module: &Module, silent: bool) -> Result<bool> {
        let InjectInfo { name, deps } = get_inject_info(module);
        if name.is_none() {
            if !silent {
                warn!(module = ?module.id(), "cannot install a module without name");
            }
            return Ok(false);
        }
        let factory = module.factory().clone();
        self.0
            .registry
            .define(name, deps, move |args| factory.invoke(&args))
    }

    /// Resolve the dependencies of a module and build its model
    pub fn use_module<S, F>(&self, module: &Module, on_success: S, on_fatal: F) -> Result<()>
    where
        S: FnOnce(Built) + 'static,
        F: FnOnce(BrickError) + 'static,
    {
        self.dispatch_use(module, Some(Box::new(on_success)), Some(Box::new(on_fatal)))
    }

    /// Like [Engine::use_module], failures going to [Engine::take_unhandled]
    pub fn use_detached(&self, module: &Module) -> Result<()> {
        self.dispatch_use(module, None, None)
    }

    /// Fill the properties declared with `provide` on the model of a built module
    pub fn model<S, F>(&self, target: Built, on_success: S, on_fatal: F) -> Result<()>
    where
        S: FnOnce(Built) + 'static,
        F: FnOnce(BrickError) + 'static,
    {
        self.dispatch_model(target, Some(Box::new(on_success)), Some(Box::new(on_fatal)))
    }

    /// Find the modules matching the patterns with the engine loader
    pub fn load<S: AsRef<str>>(
        &self,
        patterns: &[S],
        options: &LoadOptions,
    ) -> Result<Vec<LoadedModule>> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        let options = options.merged(&self.0.load_options);
        self.0.loader.load(&patterns, &options)
    }

    /// Load, install, use and initialize all modules matching the patterns.
    ///
    /// Each model is delivered to `on_done` once its dependencies are available, which
    /// may happen after this call returns. A module whose name is already provided is
    /// reported to `on_fatal` and skipped, the others are still wired.
    /// Returns the number of loaded modules.
    pub fn build<S, D, F>(
        &self,
        patterns: &[S],
        options: &LoadOptions,
        on_done: D,
        on_fatal: F,
    ) -> Result<usize>
    where
        S: AsRef<str>,
        D: Fn(Built) + 'static,
        F: Fn(BrickError) + 'static,
    {
        let modules = self.load(patterns, options)?;
        let on_done: Rc<dyn Fn(Built)> = Rc::new(on_done);
        let on_fatal: Rc<dyn Fn(BrickError)> = Rc::new(on_fatal);

        for LoadedModule { name, module } in &modules {
            let installed = match self.install(module, true) {
                Ok(installed) => installed,
                Err(e) => {
                    warn!(module = %name, error = %e, "skipping module");
                    on_fatal(e);
                    continue;
                }
            };
            debug!(module = %name, installed, "module loaded");

            let engine = self.clone();
            let done = on_done.clone();
            let fatal = on_fatal.clone();
            let initialize: OnBuilt = Box::new(move |built: Built| {
                let model_fatal = fatal.clone();
                let dispatched = engine.dispatch_model(
                    built,
                    Some(Box::new(move |built: Built| done(built))),
                    Some(Box::new(move |e: BrickError| model_fatal(e))),
                );
                if let Err(e) = dispatched {
                    fatal(e);
                }
            });
            let fatal = on_fatal.clone();
            self.dispatch_use(
                module,
                Some(initialize),
                Some(Box::new(move |e: BrickError| fatal(e))),
            )?;
        }
        Ok(modules.len())
    }

    /// Build the modules of a configured `[inject.<section>]`
    pub fn build_section<D, F>(&self, section: &str, on_done: D, on_fatal: F) -> Result<usize>
    where
        D: Fn(Built) + 'static,
        F: Fn(BrickError) + 'static,
    {
        let Some(config) = self.0.config.inject.get(section) else {
            return Err(BrickError::InvalidArgument(format!(
                "no inject section named '{section}'"
            )));
        };
        let options = LoadOptions {
            ignore: config.ignore.clone(),
        };
        self.build(&[config.pattern.as_str()], &options, on_done, on_fatal)
    }

    /// Use the application entry modules configured in `engine.app`.
    ///
    /// Plain values are skipped, constructors and functions receive the engine.
    pub fn start(&self) -> Result<()> {
        if self.state() != EngineState::Prepared {
            return Err(BrickError::InvalidArgument(format!(
                "cannot start an engine in state {:?}",
                self.state()
            )));
        }
        let apps = self.load(&[self.0.config.engine.app.as_str()], &LoadOptions::default())?;
        self.0.state.set(EngineState::Running);
        for LoadedModule { name, module } in &apps {
            if module.factory().is_callable() {
                self.dispatch_use(module, None, None)?;
            } else {
                debug!(module = %name, "skipping app module without factory");
            }
        }
        info!(apps = apps.len(), "engine started");
        Ok(())
    }

    /// Failures that had no handler, see [ProviderRegistry::take_unhandled]
    pub fn take_unhandled(&self) -> Vec<BrickError> {
        self.0.registry.take_unhandled()
    }

    fn dispatch_use(
        &self,
        module: &Module,
        on_success: Option<OnBuilt>,
        on_fatal: Option<OnFatal>,
    ) -> Result<()> {
        let InjectInfo { name, deps } = get_inject_info(module);
        if deps.is_empty() {
            let args = Args::default().with_engine(self.clone());
            match build_named(name.as_ref(), module.factory(), args) {
                Ok(model) => {
                    if let Some(on_success) = on_success {
                        on_success(Built {
                            name,
                            module: module.clone(),
                            model,
                        });
                    }
                }
                Err(e) => self.0.registry.report(on_fatal, e),
            }
            return Ok(());
        }

        let module = module.clone();
        self.0.registry.require(
            deps,
            move |args| {
                let model = build_named(name.as_ref(), module.factory(), args)?;
                if let Some(on_success) = on_success {
                    on_success(Built {
                        name,
                        module,
                        model,
                    });
                }
                Ok(())
            },
            on_fatal,
        )
    }

    fn dispatch_model(
        &self,
        target: Built,
        on_success: Option<OnBuilt>,
        on_fatal: Option<OnFatal>,
    ) -> Result<()> {
        let ProvideInfo { deps, properties } = get_provide_info(&target.module);
        if deps.is_empty() {
            if let Some(on_success) = on_success {
                on_success(target);
            }
            return Ok(());
        }

        // transforms are applied once, when assigning the properties
        let plain = deps.iter().map(Dependency::untransformed).collect();
        self.0.registry.require(
            plain,
            move |args| {
                let built = init_model(target, &properties, &deps, args.into_values())?;
                if let Some(on_success) = on_success {
                    on_success(built);
                }
                Ok(())
            },
            on_fatal,
        )
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("env", &self.0.env)
            .field("registry", &self.0.registry)
            .finish()
    }
}
