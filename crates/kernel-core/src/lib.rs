//! Deterministic partial-state-update engine for a conviction-voting commons.
//!
//! A run is a fixed number of timesteps. Each timestep executes every stage of
//! a [`Psub`] in order; a stage evaluates its policies against the current
//! snapshot, then its state-update functions commit the keys they own. One
//! [`EventRow`] is appended per executed substep.

pub mod blocks;
pub mod commons;
pub mod conviction;
pub mod error;
pub mod holdings;
pub mod network;
pub mod participant;
pub mod proposal;
pub mod psub;
pub mod random;
pub mod simulation;
pub mod state;

pub use commons::{create_token_batches, Commons};
pub use error::{ConfigurationError, Result, SimulationError};
pub use holdings::{Holdings, TokenBatch};
pub use network::{Edge, EdgeKind, InfluenceEdge, Network, Node, NodeId, NodeKind, SupportEdge};
pub use participant::Participant;
pub use proposal::{Proposal, ProposalStatus};
pub use psub::{label_index, Policy, Psub, Signal, Signals, Stage, StageContext, StateUpdate};
pub use random::{RandomSource, SeededRandom};
pub use simulation::{bootstrap_state, EventLog, EventRow, LogStatus, Simulation};
pub use state::{StateKey, StateValue, SystemState};
