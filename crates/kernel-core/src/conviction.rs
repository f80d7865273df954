//! Conviction accumulation and the funding trigger.
//!
//! Each support edge carries `c_t = alpha * c_{t-1} + weight_t`; a proposal's
//! conviction is the sum over its incoming edges. The trigger threshold grows
//! without bound as the requested share of the pool approaches
//! `max_request_share`.

use std::collections::BTreeMap;

use contracts::ConvictionConfig;

use crate::commons::Commons;
use crate::network::{Network, NodeId};
use crate::proposal::Proposal;

/// Conviction a proposal needs before `requested` may leave a pool of
/// `funding_pool`. Infinite when the pool is empty or the share reaches the
/// curve's asymptote.
pub fn trigger_threshold(
    requested: f64,
    funding_pool: f64,
    supply: f64,
    params: &ConvictionConfig,
) -> f64 {
    if funding_pool <= 0.0 {
        return f64::INFINITY;
    }
    let share = requested / funding_pool;
    if share >= params.max_request_share {
        return f64::INFINITY;
    }
    let gap = params.max_request_share - share;
    params.min_stake_share * supply / ((1.0 - params.alpha) * gap * gap)
}

pub fn should_fund(proposal: &Proposal, commons: &Commons, params: &ConvictionConfig) -> bool {
    proposal.is_open()
        && proposal.funds_requested <= commons.funding_pool()
        && proposal.conviction
            > trigger_threshold(
                proposal.funds_requested,
                commons.funding_pool(),
                commons.token_supply(),
                params,
            )
}

/// One decay-and-accumulate pass over every support edge, followed by the
/// proposal-level sums. Edge membership is left untouched.
pub fn accumulate(network: &mut Network, alpha: f64) {
    let mut totals = BTreeMap::<NodeId, f64>::new();
    for (_, proposal, edge) in network.support_edges_mut() {
        edge.conviction = edge.conviction * alpha + edge.weight;
        *totals.entry(proposal).or_insert(0.0) += edge.conviction;
    }

    let proposal_ids = network
        .proposals()
        .map(|(id, _)| id)
        .collect::<Vec<_>>();
    for id in proposal_ids {
        let total = totals.get(&id).copied().unwrap_or(0.0);
        if let Ok(proposal) = network.proposal_mut(id) {
            proposal.conviction = total;
        }
    }
}

/// Open proposals that pass their trigger, in id order, each checked against
/// the pool left after the ones before it.
pub fn select_fundable(
    network: &Network,
    commons: &Commons,
    params: &ConvictionConfig,
) -> Vec<(NodeId, f64)> {
    let mut remaining = commons.clone();
    let mut funded = Vec::new();
    for (id, proposal) in network.open_proposals() {
        if should_fund(proposal, &remaining, params)
            && remaining.spend(proposal.funds_requested).is_ok()
        {
            funded.push((id, proposal.funds_requested));
        }
    }
    funded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holdings::{Holdings, TokenBatch};
    use crate::network::{Edge, SupportEdge};
    use crate::participant::Participant;
    use contracts::HatchConfig;

    fn params() -> ConvictionConfig {
        ConvictionConfig {
            alpha: 0.5,
            max_request_share: 0.2,
            min_stake_share: 0.01,
            min_affinity_to_vote: 0.0,
            max_proposal_age_days: 30,
        }
    }

    fn commons() -> Commons {
        Commons::hatch(&HatchConfig {
            total_hatch_raise: 10_000.0,
            hatch_price: 1.0,
            hatch_tribute: 0.5,
            kappa: 2.0,
        })
        .expect("hatch")
    }

    #[test]
    fn threshold_is_infinite_past_max_share() {
        let params = params();
        assert!(trigger_threshold(1_000.0, 5_000.0, 10_000.0, &params).is_infinite());
        assert!(trigger_threshold(1.0, 0.0, 10_000.0, &params).is_infinite());
    }

    #[test]
    fn threshold_grows_with_requested_share() {
        let params = params();
        let small = trigger_threshold(50.0, 5_000.0, 10_000.0, &params);
        let large = trigger_threshold(500.0, 5_000.0, 10_000.0, &params);
        assert!(small.is_finite());
        assert!(large > small);
        // share 0.1: 0.01 * 10_000 / (0.5 * 0.1^2)
        let expected = 100.0 / (0.5 * 0.1 * 0.1);
        assert!((large - expected).abs() < 1e-6);
    }

    #[test]
    fn accumulate_decays_then_adds_weight() {
        let mut network = Network::new();
        let voter = network.add_participant(Participant::new(
            Holdings::from_batches(vec![TokenBatch::new(10.0, 0)]),
            0.5,
            0,
        ));
        let proposal = network.add_proposal(Proposal::new(Some(voter), 10.0, 0));
        network
            .add_edge(
                voter,
                proposal,
                Edge::Support(SupportEdge {
                    affinity: 1.0,
                    weight: 10.0,
                    conviction: 0.0,
                }),
            )
            .expect("edge");

        accumulate(&mut network, 0.5);
        assert_eq!(network.conviction_list(), vec![10.0]);
        accumulate(&mut network, 0.5);
        assert_eq!(network.conviction_list(), vec![15.0]);
        assert_eq!(network.proposal(proposal).expect("proposal").conviction, 15.0);
        assert_eq!(network.edge_count(), 1);
    }

    #[test]
    fn select_fundable_respects_remaining_pool() {
        let commons = commons();
        let mut network = Network::new();
        let threshold = trigger_threshold(900.0, commons.funding_pool(), commons.token_supply(), &params());
        for _ in 0..7 {
            let mut proposal = Proposal::new(None, 900.0, 0);
            proposal.conviction = threshold * 10.0;
            network.add_proposal(proposal);
        }

        let funded = select_fundable(&network, &commons, &params());
        let spent = funded.iter().map(|(_, amount)| amount).sum::<f64>();
        assert!(!funded.is_empty());
        assert!(spent <= commons.funding_pool());
        assert!(funded.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn closed_proposals_are_never_funded() {
        let commons = commons();
        let mut proposal = Proposal::new(None, 10.0, 0);
        proposal.conviction = f64::MAX;
        assert!(should_fund(&proposal, &commons, &params()));
        proposal.mark_funded(1);
        assert!(!should_fund(&proposal, &commons, &params()));
    }
}
