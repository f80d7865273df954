use std::collections::BTreeSet;

use tracing::trace;

use crate::error::Result;
use crate::network::{Network, NodeId};
use crate::participant::allocate_stake;
use crate::proposal::ProposalStatus;
use crate::psub::{Policy, Signal, Signals, Stage, StageContext, StateUpdate};
use crate::random::RandomSource;
use crate::state::{StateKey, StateValue, SystemState};

use super::{ALLOCATE_LABEL, ALLOCATIONS};

pub fn stage() -> Stage {
    Stage::new(ALLOCATE_LABEL)
        .policy(Policy {
            name: "allocate_support",
            emits: &[ALLOCATIONS],
            func: p_allocate_support,
        })
        .update(StateUpdate {
            name: "apply_allocations",
            key: StateKey::Network,
            once_per_timestep: false,
            func: su_apply_allocations,
        })
}

/// Every active participant spreads its whole stake over the open proposals
/// it supports, proportionally to affinity. Edges towards closed proposals
/// get zero weight.
pub fn plan_allocations(network: &Network, min_affinity: f64) -> Vec<(NodeId, NodeId, f64)> {
    let mut allocations = Vec::new();
    for (participant_id, participant) in network.active_participants() {
        let supports = network.supports_of(participant_id);
        let candidates = supports
            .iter()
            .filter(|(proposal, _)| {
                network
                    .proposal(*proposal)
                    .map(|proposal| proposal.is_open())
                    .unwrap_or(false)
            })
            .map(|(proposal, edge)| (*proposal, edge.affinity))
            .collect::<Vec<_>>();
        let weights = allocate_stake(participant.stake(), &candidates, min_affinity);
        let open = weights.iter().map(|(proposal, _)| *proposal).collect::<BTreeSet<_>>();

        allocations.extend(
            weights
                .into_iter()
                .map(|(proposal, weight)| (participant_id, proposal, weight)),
        );
        allocations.extend(
            supports
                .iter()
                .filter(|(proposal, _)| !open.contains(proposal))
                .map(|(proposal, _)| (participant_id, *proposal, 0.0)),
        );
    }
    allocations
}

/// Writes the planned weights onto their edges and marks every open proposal
/// that now holds stake as Active.
pub fn apply_allocations(network: &mut Network, allocations: &[(NodeId, NodeId, f64)]) -> Result<()> {
    let mut backed = BTreeSet::new();
    for (participant, proposal, weight) in allocations {
        network.support_edge_mut(*participant, *proposal)?.weight = *weight;
        if *weight > 0.0 {
            backed.insert(*proposal);
        }
    }
    for proposal_id in backed {
        let proposal = network.proposal_mut(proposal_id)?;
        if proposal.status == ProposalStatus::Candidate {
            proposal.status = ProposalStatus::Active;
        }
    }
    Ok(())
}

fn p_allocate_support(
    ctx: &StageContext<'_>,
    state: &SystemState,
    _: &mut dyn RandomSource,
) -> Result<Signals> {
    let allocations = plan_allocations(&state.network, ctx.config.conviction.min_affinity_to_vote);
    trace!(
        timestep = ctx.timestep,
        edges = allocations.len(),
        "support allocated"
    );
    Ok(Signals::single(ALLOCATIONS, Signal::Allocations(allocations)))
}

fn su_apply_allocations(
    _: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let mut network = state.network.clone();
    if let Some(Signal::Allocations(allocations)) = signals.get(ALLOCATIONS) {
        apply_allocations(&mut network, allocations)?;
    }
    Ok(StateValue::Network(network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holdings::{Holdings, TokenBatch};
    use crate::network::{Edge, SupportEdge};
    use crate::participant::Participant;
    use crate::proposal::Proposal;

    #[test]
    fn stake_moves_only_to_open_proposals_above_cutoff() {
        let mut network = Network::new();
        let voter = network.add_participant(Participant::new(
            Holdings::from_batches(vec![TokenBatch::new(60.0, 0)]),
            0.5,
            0,
        ));
        let liked = network.add_proposal(Proposal::new(None, 10.0, 0));
        let disliked = network.add_proposal(Proposal::new(None, 10.0, 0));
        let mut closed = Proposal::new(None, 10.0, 0);
        closed.mark_funded(1);
        let closed = network.add_proposal(closed);
        for (proposal, affinity) in [(liked, 0.9), (disliked, 0.1), (closed, 0.9)] {
            network
                .add_edge(voter, proposal, Edge::Support(SupportEdge::new(affinity)))
                .expect("edge");
        }
        network.support_edge_mut(voter, closed).expect("edge").weight = 30.0;

        let allocations = plan_allocations(&network, 0.3);
        apply_allocations(&mut network, &allocations).expect("apply");

        assert_eq!(network.support_edge(voter, liked).expect("edge").weight, 60.0);
        assert_eq!(network.support_edge(voter, disliked).expect("edge").weight, 0.0);
        assert_eq!(network.support_edge(voter, closed).expect("edge").weight, 0.0);
        assert_eq!(
            network.proposal(liked).expect("proposal").status,
            ProposalStatus::Active
        );
        assert_eq!(
            network.proposal(disliked).expect("proposal").status,
            ProposalStatus::Candidate
        );
        assert_eq!(network.edge_count(), 3);
    }
}
