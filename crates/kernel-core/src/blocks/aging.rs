use crate::error::Result;
use crate::psub::{Signals, Stage, StageContext, StateUpdate};
use crate::state::{StateKey, StateValue, SystemState};

use super::AGE_LABEL;

pub fn stage() -> Stage {
    Stage::new(AGE_LABEL).update(StateUpdate {
        name: "age_holdings",
        key: StateKey::Network,
        once_per_timestep: true,
        func: su_age_holdings,
    })
}

/// One day passes for every held batch and every open proposal.
fn su_age_holdings(
    ctx: &StageContext<'_>,
    state: &SystemState,
    _: &Signals,
) -> Result<StateValue> {
    let mut network = state.network.clone();
    network.age_holdings(ctx.timestep);
    Ok(StateValue::Network(network))
}
