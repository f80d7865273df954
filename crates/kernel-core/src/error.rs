use contracts::ConfigIssue;
use thiserror::Error;

use crate::network::{EdgeKind, NodeId};
use crate::state::StateKey;

/// Malformed pipeline or parameter set. Always raised before the first substep
/// runs, except for signal checks that can only be made once a policy has
/// produced output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("pipeline has no stages")]
    EmptyPipeline,

    #[error("stage {index} has an empty label")]
    EmptyLabel { index: usize },

    #[error("stage '{label}' has more than one update writing {key}")]
    DuplicateStateKey { label: String, key: StateKey },

    #[error("stage '{label}': signal '{signal}' is claimed by both '{first}' and '{second}'")]
    SignalCollision {
        label: String,
        signal: String,
        first: String,
        second: String,
    },

    #[error("stage '{label}': policy '{policy}' emitted undeclared signal '{signal}'")]
    UndeclaredSignal {
        label: String,
        policy: String,
        signal: String,
    },

    #[error("update '{update}' runs once per timestep but is scheduled in '{first}' and '{second}'")]
    RepeatedTimestepUpdate {
        update: String,
        first: String,
        second: String,
    },

    #[error("stage '{label}': update '{update}' owns {declared} but produced {produced}")]
    KeyMismatch {
        label: String,
        update: String,
        declared: StateKey,
        produced: StateKey,
    },

    #[error("invalid parameter {field}: {message}")]
    InvalidParameter { field: String, message: String },
}

impl From<ConfigIssue> for ConfigurationError {
    fn from(issue: ConfigIssue) -> Self {
        Self::InvalidParameter {
            field: issue.field,
            message: issue.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invalid topology: {kind} edge {src} -> {dst}: {reason}")]
    InvalidTopology {
        kind: EdgeKind,
        src: NodeId,
        dst: NodeId,
        reason: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("numeric instability at timestep {timestep} substep {substep}: {quantity} of {subject} is {value}")]
    NumericInstability {
        timestep: u64,
        substep: usize,
        subject: String,
        quantity: String,
        value: f64,
    },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },

    #[error("invalid {operation} amount: {amount}")]
    InvalidAmount {
        operation: &'static str,
        amount: f64,
    },
}

impl From<ConfigIssue> for SimulationError {
    fn from(issue: ConfigIssue) -> Self {
        Self::Configuration(issue.into())
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
