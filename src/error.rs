use std::error::Error;

use thiserror::Error;

use crate::inject::DepId;

/// Boxed error returned by user-supplied constructors and factories
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Result alias used throughout the engine
pub type Result<T, E = BrickError> = std::result::Result<T, E>;

/// Errors triggered while declaring, resolving or building modules
#[derive(Error, Debug)]
pub enum BrickError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid dependency: {0}")]
    InvalidDependencyKind(String),

    #[error("Cyclic dependencies: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<DepId> },

    #[error("Failed to build {}: {source}", describe(.name))]
    ConstructionFailure {
        name: Option<DepId>,
        #[source]
        source: BoxError,
    },

    #[error("Consistency error: provider '{0}' is already defined")]
    DuplicateProvider(DepId),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for BrickError {
    fn from(e: figment::Error) -> Self {
        BrickError::Config(Box::new(e))
    }
}

fn format_cycle(cycle: &[DepId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn describe(name: &Option<DepId>) -> String {
    match name {
        Some(name) => format!("'{name}'"),
        None => "anonymous module".to_string(),
    }
}
