use tracing::trace;

use crate::error::Result;
use crate::network::{Edge, NodeId, SupportEdge};
use crate::proposal::Proposal;
use crate::psub::{Policy, Signal, Signals, Stage, StageContext, StateUpdate};
use crate::random::RandomSource;
use crate::state::{StateKey, StateValue, SystemState};

use super::{draw_request_share, new_proposals, ProposalDraft, NEW_PROPOSALS, NEW_PROPOSALS_LABEL};

pub fn stage() -> Stage {
    Stage::new(NEW_PROPOSALS_LABEL)
        .policy(Policy {
            name: "gen_new_proposals",
            emits: &[NEW_PROPOSALS],
            func: p_new_proposals,
        })
        .update(StateUpdate {
            name: "add_proposals",
            key: StateKey::Network,
            once_per_timestep: false,
            func: su_add_proposals,
        })
}

/// Each active participant proposes with probability
/// `sentiment * proposal_rate`, asking for a drawn share of the pool.
fn p_new_proposals(
    ctx: &StageContext<'_>,
    state: &SystemState,
    rng: &mut dyn RandomSource,
) -> Result<Signals> {
    let pool = state.funding_pool();
    if pool <= 0.0 {
        return Ok(Signals::new());
    }

    let voters = state
        .network
        .active_participants()
        .map(|(id, participant)| (id, participant.sentiment))
        .collect::<Vec<(NodeId, f64)>>();

    let mut drafts = Vec::new();
    for (proposer, sentiment) in &voters {
        if !rng.probability(sentiment * ctx.config.behavior.proposal_rate) {
            continue;
        }
        let share = draw_request_share(rng, &ctx.config.behavior, &ctx.config.conviction);
        let mut affinities = Vec::with_capacity(voters.len());
        for (voter, _) in &voters {
            let affinity = if voter == proposer {
                1.0
            } else {
                rng.random_number()
            };
            affinities.push((*voter, affinity));
        }
        trace!(
            timestep = ctx.timestep,
            proposer = %proposer,
            share,
            "new proposal"
        );
        drafts.push(ProposalDraft {
            proposer: *proposer,
            funds_requested: share * pool,
            affinities,
        });
    }

    if drafts.is_empty() {
        Ok(Signals::new())
    } else {
        Ok(Signals::single(NEW_PROPOSALS, Signal::NewProposals(drafts)))
    }
}

/// Appends each proposal and its support edges; existing edges keep their
/// position and conviction.
fn su_add_proposals(
    ctx: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let mut network = state.network.clone();
    for draft in new_proposals(signals) {
        let id = network.add_proposal(Proposal::new(
            Some(draft.proposer),
            draft.funds_requested,
            ctx.timestep,
        ));
        for (voter, affinity) in &draft.affinities {
            network.add_edge(*voter, id, Edge::Support(SupportEdge::new(*affinity)))?;
        }
    }
    Ok(StateValue::Network(network))
}
