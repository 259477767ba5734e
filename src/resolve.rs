//! The provider registry: named factories and the requests waiting for them.
//!
//! Providers are registered with [ProviderRegistry::define] and consumed with
//! [ProviderRegistry::require], in any order.
//!
//! * A request whose dependencies are all available is satisfied immediately.
//! * Otherwise it is parked, each unresolved slot remembering the provider name it waits for
//!   (possibly a transitive dependency). Defining that name re-evaluates the request, which
//!   fires once its last slot is filled.
//! * Resolved slots are kept until the request settles. Models are transient: every request
//!   builds its own instances.
//!
//! A parked request cannot be withdrawn: if its provider never shows up, it stays parked for
//! the lifetime of the registry. [ProviderRegistry::pending_names] lists what is missing.
//!
//! The registry is meant to be driven from a single thread. Callbacks are invoked without
//! holding any internal borrow, so they may define or require further providers.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, trace};

use crate::error::{BoxError, BrickError, Result};
use crate::inject::{validate_id, DepId, Dependency};
use crate::model::{Args, Model, Resolved};

/// Called with the resolved dependencies of a request, in declaration order.
///
/// An error returned here is delivered to the fatal handler of the same request.
pub type OnSatisfied = Box<dyn FnOnce(Args) -> Result<()>>;

/// Receives the failure of a request
pub type OnFatal = Box<dyn FnOnce(BrickError)>;

type ProviderFn = Rc<dyn Fn(Args) -> Result<Model, BoxError>>;

#[derive(Clone)]
struct ProviderEntry {
    deps: Vec<Dependency>,
    factory: ProviderFn,
}

enum Slot {
    Ready(Resolved),
    Blocked(DepId),
}

/// Outcome of a resolution attempt that did not fail
enum Outcome {
    Ready(Resolved),
    Blocked(DepId),
}

struct PendingRequest {
    deps: Vec<Dependency>,
    slots: Vec<Slot>,
    on_satisfied: OnSatisfied,
    on_fatal: Option<OnFatal>,
}

impl PendingRequest {
    fn is_blocked_on(&self, name: &DepId) -> bool {
        self.slots
            .iter()
            .any(|slot| matches!(slot, Slot::Blocked(blocker) if blocker == name))
    }
}

#[derive(Default)]
struct RegistryState {
    providers: HashMap<DepId, ProviderEntry>,
    pending: BTreeMap<u64, PendingRequest>,
    next_request: u64,
    unhandled: Vec<BrickError>,
}

/// Registry of named providers and pending requests
#[derive(Default)]
pub struct ProviderRegistry {
    state: RefCell<RegistryState>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named provider and re-evaluate the requests waiting for it.
    ///
    /// Anonymous providers cannot be resolved by name: they are skipped and `Ok(false)` is
    /// returned. Defining a name twice fails with [BrickError::DuplicateProvider], and malformed
    /// names with [BrickError::InvalidDependencyKind].
    /// Failures of the re-evaluated requests go to their own fatal handlers.
    pub fn define<F>(&self, name: Option<DepId>, deps: Vec<Dependency>, factory: F) -> Result<bool>
    where
        F: Fn(Args) -> Result<Model, BoxError> + 'static,
    {
        let Some(name) = name else {
            debug!("skipping anonymous provider");
            return Ok(false);
        };
        validate_id(&name)?;
        for dep in &deps {
            dep.validate()?;
        }

        {
            let mut state = self.state.borrow_mut();
            if state.providers.contains_key(&name) {
                return Err(BrickError::DuplicateProvider(name));
            }
            let entry = ProviderEntry {
                deps,
                factory: Rc::new(factory),
            };
            state.providers.insert(name.clone(), entry);
        }
        debug!(provider = %name, "provider defined");

        let waiting: Vec<u64> = self
            .state
            .borrow()
            .pending
            .iter()
            .filter(|(_, request)| request.is_blocked_on(&name))
            .map(|(id, _)| *id)
            .collect();

        for id in waiting {
            // a callback fired earlier in this loop may have settled it already
            let removed = self.state.borrow_mut().pending.remove(&id);
            let Some(mut request) = removed else {
                continue;
            };
            match self.evaluate(&mut request) {
                Ok(true) => {
                    trace!(request = id, provider = %name, "request satisfied");
                    self.settle(request);
                }
                Ok(false) => {
                    self.state.borrow_mut().pending.insert(id, request);
                }
                Err(e) => self.report(request.on_fatal, e),
            }
        }
        Ok(true)
    }

    /// Request a list of dependencies.
    ///
    /// `on_satisfied` is invoked once, with the models in declaration order: right away if
    /// everything is available, or from the [ProviderRegistry::define] call registering the
    /// last missing provider. Absent optional dependencies resolve to `None`.
    ///
    /// Without a fatal handler, failures are logged and kept for
    /// [ProviderRegistry::take_unhandled]. Malformed dependency names fail the call itself,
    /// before anything is resolved.
    pub fn require<S>(
        &self,
        deps: Vec<Dependency>,
        on_satisfied: S,
        on_fatal: Option<OnFatal>,
    ) -> Result<()>
    where
        S: FnOnce(Args) -> Result<()> + 'static,
    {
        for dep in &deps {
            dep.validate()?;
        }
        let mut request = PendingRequest {
            slots: deps.iter().map(|dep| Slot::Blocked(dep.id().clone())).collect(),
            deps,
            on_satisfied: Box::new(on_satisfied),
            on_fatal,
        };
        match self.evaluate(&mut request) {
            Ok(true) => self.settle(request),
            Ok(false) => {
                let mut state = self.state.borrow_mut();
                let id = state.next_request;
                state.next_request += 1;
                trace!(request = id, "request parked");
                state.pending.insert(id, request);
            }
            Err(e) => self.report(request.on_fatal, e),
        }
        Ok(())
    }

    pub fn is_defined(&self, name: &DepId) -> bool {
        self.state.borrow().providers.contains_key(name)
    }

    /// Number of parked requests
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Provider names that parked requests are waiting for
    pub fn pending_names(&self) -> Vec<DepId> {
        let state = self.state.borrow();
        let names: BTreeSet<&DepId> = state
            .pending
            .values()
            .flat_map(|request| request.slots.iter())
            .filter_map(|slot| match slot {
                Slot::Blocked(name) => Some(name),
                Slot::Ready(_) => None,
            })
            .collect();
        names.into_iter().cloned().collect()
    }

    /// Drain the failures that had no fatal handler to go to
    pub fn take_unhandled(&self) -> Vec<BrickError> {
        std::mem::take(&mut self.state.borrow_mut().unhandled)
    }

    /// Deliver a failure to its handler, or keep it when there is none
    pub(crate) fn report(&self, on_fatal: Option<OnFatal>, e: BrickError) {
        match on_fatal {
            Some(on_fatal) => on_fatal(e),
            None => {
                error!(error = %e, "unhandled resolution failure");
                self.state.borrow_mut().unhandled.push(e);
            }
        }
    }

    /// Try to fill the unresolved slots of a request, returns true when all are filled.
    ///
    /// The request is not parked while this runs, so a factory defining a provider that an
    /// earlier slot is blocked on cannot wake it up: slots are evaluated again until every
    /// remaining blocker is undefined.
    fn evaluate(&self, request: &mut PendingRequest) -> Result<bool> {
        loop {
            let mut complete = true;
            for (dep, slot) in request.deps.iter().zip(request.slots.iter_mut()) {
                if let Slot::Ready(_) = slot {
                    continue;
                }
                match self.resolve(dep, &mut Vec::new())? {
                    Outcome::Ready(value) => *slot = Slot::Ready(value),
                    Outcome::Blocked(name) => {
                        *slot = Slot::Blocked(name);
                        complete = false;
                    }
                }
            }
            if complete {
                return Ok(true);
            }
            let stale = request.slots.iter().any(|slot| {
                matches!(slot, Slot::Blocked(name) if self.is_defined(name))
            });
            if !stale {
                return Ok(false);
            }
            trace!("provider defined during evaluation, evaluating again");
        }
    }

    fn settle(&self, request: PendingRequest) {
        let values = request
            .slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Ready(value) => value,
                Slot::Blocked(_) => None,
            })
            .collect();
        if let Err(e) = (request.on_satisfied)(Args::new(values)) {
            self.report(request.on_fatal, e);
        }
    }

    fn resolve(&self, dep: &Dependency, stack: &mut Vec<DepId>) -> Result<Outcome> {
        if !dep.is_required() && !self.is_defined(dep.id()) {
            return Ok(Outcome::Ready(None));
        }
        Ok(match self.build(dep.id(), stack)? {
            Outcome::Ready(value) => Outcome::Ready(value.map(|model| dep.apply(model))),
            blocked => blocked,
        })
    }

    /// Build the model of a provider after resolving its own dependencies.
    ///
    /// `stack` holds the providers being built, to detect cycles.
    fn build(&self, name: &DepId, stack: &mut Vec<DepId>) -> Result<Outcome> {
        if let Some(start) = stack.iter().position(|building| building == name) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(name.clone());
            return Err(BrickError::CircularDependency { cycle });
        }
        let entry = self.state.borrow().providers.get(name).cloned();
        let Some(entry) = entry else {
            return Ok(Outcome::Blocked(name.clone()));
        };

        stack.push(name.clone());
        let mut values = Vec::with_capacity(entry.deps.len());
        for dep in &entry.deps {
            match self.resolve(dep, stack)? {
                Outcome::Ready(value) => values.push(value),
                blocked => return Ok(blocked),
            }
        }
        stack.pop();

        trace!(provider = %name, "building model");
        let model = (entry.factory)(Args::new(values)).map_err(|source| {
            BrickError::ConstructionFailure {
                name: Some(name.clone()),
                source,
            }
        })?;
        Ok(Outcome::Ready(Some(model)))
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        let mut providers: Vec<&DepId> = state.providers.keys().collect();
        providers.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &providers)
            .field("pending", &state.pending.len())
            .finish()
    }
}
