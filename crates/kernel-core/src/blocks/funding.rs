use tracing::trace;

use crate::conviction::select_fundable;
use crate::error::Result;
use crate::network::NodeId;
use crate::proposal::ProposalStatus;
use crate::psub::{Policy, Signal, Signals, Stage, StageContext, StateUpdate};
use crate::random::RandomSource;
use crate::state::{StateKey, StateValue, SystemState};

use super::{pairs, EXPIRED, FUNDABLE, FUNDING_LABEL};

pub fn stage() -> Stage {
    Stage::new(FUNDING_LABEL)
        .policy(Policy {
            name: "check_trigger",
            emits: &[FUNDABLE],
            func: p_fundable,
        })
        .policy(Policy {
            name: "expire_stale_proposals",
            emits: &[EXPIRED],
            func: p_expired,
        })
        .update(StateUpdate {
            name: "close_proposals",
            key: StateKey::Network,
            once_per_timestep: false,
            func: su_close_proposals,
        })
        .update(StateUpdate {
            name: "spend_funding_pool",
            key: StateKey::Commons,
            once_per_timestep: false,
            func: su_spend_funding_pool,
        })
}

fn p_fundable(
    ctx: &StageContext<'_>,
    state: &SystemState,
    _: &mut dyn RandomSource,
) -> Result<Signals> {
    let fundable = select_fundable(&state.network, &state.commons, &ctx.config.conviction);
    if fundable.is_empty() {
        return Ok(Signals::new());
    }
    trace!(
        timestep = ctx.timestep,
        proposals = fundable.len(),
        "trigger passed"
    );
    Ok(Signals::single(FUNDABLE, Signal::Fundable(fundable)))
}

/// Open proposals older than `max_proposal_age_days`.
fn p_expired(
    ctx: &StageContext<'_>,
    state: &SystemState,
    _: &mut dyn RandomSource,
) -> Result<Signals> {
    let max_age = ctx.config.conviction.max_proposal_age_days;
    let expired = state
        .network
        .open_proposals()
        .filter(|(_, proposal)| proposal.has_aged_out(max_age))
        .map(|(id, _)| id)
        .collect::<Vec<NodeId>>();
    if expired.is_empty() {
        Ok(Signals::new())
    } else {
        Ok(Signals::single(EXPIRED, Signal::Expired(expired)))
    }
}

/// Funding wins over expiry when a proposal qualifies for both.
fn su_close_proposals(
    ctx: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let mut network = state.network.clone();
    for (id, _) in pairs(signals, FUNDABLE) {
        network.proposal_mut(*id)?.mark_funded(ctx.timestep);
    }
    if let Some(Signal::Expired(expired)) = signals.get(EXPIRED) {
        for id in expired {
            let proposal = network.proposal_mut(*id)?;
            if proposal.is_open() {
                proposal.status = ProposalStatus::Failed;
            }
        }
    }
    Ok(StateValue::Network(network))
}

fn su_spend_funding_pool(
    _: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let mut commons = state.commons.clone();
    for (_, funds) in pairs(signals, FUNDABLE) {
        commons.spend(*funds)?;
    }
    Ok(StateValue::Commons(commons))
}
