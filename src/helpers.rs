use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::BoxError;
use crate::model::{Model, Resolved, Slots};

/// Generic model storing injected properties by name.
///
/// Use it as the model of a module, or as a field of a model implementing [Slots]
/// by delegation.
#[derive(Default)]
pub struct PropertyBag(RwLock<BTreeMap<String, Model>>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed access to a property, `None` if it is unset or of another type
    pub fn get<T: Any + Send + Sync>(&self, property: &str) -> Option<Arc<T>> {
        let properties = self.0.read().unwrap_or_else(PoisonError::into_inner);
        properties
            .get(property)
            .and_then(|model| model.clone().downcast::<T>().ok())
    }

    pub fn contains(&self, property: &str) -> bool {
        let properties = self.0.read().unwrap_or_else(PoisonError::into_inner);
        properties.contains_key(property)
    }

    /// Names of the properties currently set
    pub fn properties(&self) -> Vec<String> {
        let properties = self.0.read().unwrap_or_else(PoisonError::into_inner);
        properties.keys().cloned().collect()
    }
}

/// Assigning `None` removes the property
impl Slots for PropertyBag {
    fn assign(&self, property: &str, value: Resolved) -> Result<(), BoxError> {
        let mut properties = self.0.write().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(model) => properties.insert(property.to_string(), model),
            None => properties.remove(property),
        };
        Ok(())
    }
}

/// Build a list of dependency specifications from names, symbols or descriptors.
///
/// ```
/// # use brick_engine::*;
/// let deps: Vec<DependencySpec> = deps!["db", Dependency::optional("cache")];
/// assert_eq!(deps.len(), 2);
/// ```
#[macro_export]
macro_rules! deps {
    () => {
        ::std::vec::Vec::<$crate::DependencySpec>::new()
    };
    ($($dep:expr),+ $(,)?) => {
        ::std::vec![$($crate::DependencySpec::from($dep)),+]
    };
}
