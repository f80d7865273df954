use tracing::trace;

use crate::error::Result;
use crate::holdings::{Holdings, TokenBatch};
use crate::network::{Edge, InfluenceEdge, SupportEdge};
use crate::participant::Participant;
use crate::psub::{Policy, Signal, Signals, Stage, StageContext, StateUpdate};
use crate::random::RandomSource;
use crate::state::{StateKey, StateValue, SystemState};

use super::{new_participants, ParticipantDraft, NEW_PARTICIPANTS, NEW_PARTICIPANTS_LABEL};

pub fn stage() -> Stage {
    Stage::new(NEW_PARTICIPANTS_LABEL)
        .policy(Policy {
            name: "gen_new_participant",
            emits: &[NEW_PARTICIPANTS],
            func: p_new_participant,
        })
        .update(StateUpdate {
            name: "add_participants",
            key: StateKey::Network,
            once_per_timestep: false,
            func: su_add_participants,
        })
        .update(StateUpdate {
            name: "deposit_investments",
            key: StateKey::Commons,
            once_per_timestep: false,
            func: su_deposit_investments,
        })
}

/// A newcomer arrives with probability `sentiment * new_participant_rate` and
/// buys into the curve with a gamma-distributed investment.
fn p_new_participant(
    ctx: &StageContext<'_>,
    state: &SystemState,
    rng: &mut dyn RandomSource,
) -> Result<Signals> {
    let behavior = &ctx.config.behavior;
    if !rng.probability(state.sentiment * behavior.new_participant_rate) {
        return Ok(Signals::new());
    }

    let investment = rng.gamma(
        behavior.investment_shape,
        behavior.investment_loc,
        behavior.investment_scale,
    );
    if !(investment.is_finite() && investment > 0.0) {
        return Ok(Signals::new());
    }
    let (tokens, price) = state.commons.quote_deposit(investment)?;
    let sentiment = rng.random_number();

    let mut affinities = Vec::new();
    for (proposal, _) in state.network.open_proposals() {
        affinities.push((proposal, rng.random_number()));
    }
    let mut influencers = Vec::new();
    for (participant, _) in state.network.active_participants() {
        if rng.probability(ctx.config.network.influence_probability) {
            influencers.push((participant, rng.random_number()));
        }
    }

    trace!(
        timestep = ctx.timestep,
        investment,
        tokens,
        price,
        influencers = influencers.len(),
        "new participant"
    );
    Ok(Signals::single(
        NEW_PARTICIPANTS,
        Signal::NewParticipants(vec![ParticipantDraft {
            investment,
            tokens,
            sentiment,
            affinities,
            influencers,
        }]),
    ))
}

fn su_add_participants(
    ctx: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let drafts = new_participants(signals);
    let mut network = state.network.clone();
    for draft in drafts {
        let holdings = Holdings::from_batches(vec![TokenBatch::new(draft.tokens, ctx.timestep)]);
        let id = network.add_participant(Participant::new(holdings, draft.sentiment, ctx.timestep));
        for (proposal, affinity) in &draft.affinities {
            network.add_edge(id, *proposal, Edge::Support(SupportEdge::new(*affinity)))?;
        }
        for (influencer, influence) in &draft.influencers {
            network.add_edge(
                *influencer,
                id,
                Edge::Influence(InfluenceEdge {
                    influence: *influence,
                }),
            )?;
        }
    }
    Ok(StateValue::Network(network))
}

fn su_deposit_investments(
    _: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let mut commons = state.commons.clone();
    for draft in new_participants(signals) {
        commons.deposit(draft.investment)?;
    }
    Ok(StateValue::Commons(commons))
}
