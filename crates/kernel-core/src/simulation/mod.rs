//! The PSUB run loop.
//!
//! A [`Simulation`] owns one run: its configuration, pipeline, the initial
//! state (timestep 0, substep 0), the current state and the event log. Every
//! substep is evaluated against an immutable snapshot and committed in one
//! piece, so the log only ever holds fully applied rows.

mod commit;
mod events;
mod init;
mod step;

use std::marker::PhantomData;

use contracts::{RunMode, RunStatus, SimulationConfig, SCHEMA_VERSION_V1};
use tracing::{debug, info, warn};

use crate::error::{Result, SimulationError};
use crate::psub::Psub;
use crate::random::{RandomSource, SeededRandom};
use crate::state::{StateValue, SystemState};

pub use events::{EventLog, EventRow, LogStatus};
pub use init::bootstrap_state;

#[derive(Debug)]
pub struct Simulation<R: RandomSource = SeededRandom> {
    config: SimulationConfig,
    psub: Psub,
    status: RunStatus,
    initial_state: SystemState,
    state: SystemState,
    event_log: EventLog,
    replay_hash: u64,
    policy_pool: Option<rayon::ThreadPool>,
    random: PhantomData<fn() -> R>,
}

fn mix_replay_hash(current: u64, label: &str, timestep: u64, substep: usize) -> u64 {
    let mut hash = current ^ timestep.wrapping_mul(0xA24B_1C62_5B93_2D47);
    hash ^= (substep as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for byte in label.as_bytes() {
        hash = hash.rotate_left(7) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x517C_C1B7_2722_0A95);
    }
    hash
}

/// Folds the quantities a row is usually compared on into the replay hash.
fn mix_state_fingerprint(current: u64, state: &SystemState) -> u64 {
    let quantities = [
        state.funding_pool().to_bits(),
        state.token_supply().to_bits(),
        state.sentiment.to_bits(),
        state.network.node_count() as u64,
        state.network.edge_count() as u64,
    ];
    let convictions = state.network.conviction_list();
    quantities
        .into_iter()
        .chain(convictions.into_iter().map(f64::to_bits))
        .fold(current, |hash, value| {
            (hash ^ value).wrapping_mul(0x517C_C1B7_2722_0A95).rotate_left(17)
        })
}

fn first_violation(state: &SystemState) -> Option<(String, String, f64)> {
    [
        StateValue::Network(state.network.clone()),
        StateValue::Commons(state.commons.clone()),
        StateValue::Sentiment(state.sentiment),
    ]
    .iter()
    .find_map(StateValue::numeric_violation)
}
