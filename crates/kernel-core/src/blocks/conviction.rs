use tracing::trace;

use crate::conviction::accumulate;
use crate::error::Result;
use crate::psub::{Signals, Stage, StageContext, StateUpdate};
use crate::state::{StateKey, StateValue, SystemState};

use super::allocation::{apply_allocations, plan_allocations};
use super::CONVICTION_LABEL;

pub fn stage() -> Stage {
    Stage::new(CONVICTION_LABEL).update(StateUpdate {
        name: "calculate_conviction",
        key: StateKey::Network,
        once_per_timestep: true,
        func: su_calculate_conviction,
    })
}

/// Refreshes every support edge's weight from current stake, then runs one
/// accumulation pass. Edges towards closed proposals carry zero weight and
/// decay.
fn su_calculate_conviction(
    ctx: &StageContext<'_>,
    state: &SystemState,
    _: &Signals,
) -> Result<StateValue> {
    let mut network = state.network.clone();
    let allocations = plan_allocations(&network, ctx.config.conviction.min_affinity_to_vote);
    apply_allocations(&mut network, &allocations)?;
    accumulate(&mut network, ctx.config.conviction.alpha);
    trace!(
        timestep = ctx.timestep,
        edges = network.edge_count(),
        "conviction accumulated"
    );
    Ok(StateValue::Network(network))
}
