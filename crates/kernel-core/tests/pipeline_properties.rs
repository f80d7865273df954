use std::collections::BTreeSet;

use contracts::SimulationConfig;
use kernel_core::blocks::{
    self, CONVICTION_LABEL, NEW_PARTICIPANTS_LABEL, NEW_PROPOSALS_LABEL,
};
use kernel_core::{
    EventRow, LogStatus, NodeId, ProposalStatus, Psub, SeededRandom, Simulation, SystemState,
};
use proptest::prelude::*;

fn base_config(seed: u64, timesteps: u64) -> SimulationConfig {
    SimulationConfig {
        seed,
        timesteps,
        ..SimulationConfig::default()
    }
}

fn run(config: SimulationConfig, psub: Psub) -> Simulation {
    let mut simulation =
        Simulation::<SeededRandom>::bootstrap(config, psub).expect("bootstrap");
    simulation.run().expect("run");
    simulation
}

fn run_default(seed: u64, timesteps: u64) -> Simulation {
    run(
        base_config(seed, timesteps),
        blocks::default_psub().expect("default pipeline"),
    )
}

fn run_core(seed: u64, timesteps: u64) -> Simulation {
    run(
        base_config(seed, timesteps),
        blocks::core_psub().expect("core pipeline"),
    )
}

/// `(initial, row 1), (row 1, row 2), ...` for a finished run, paired with the
/// later row.
fn transitions(simulation: &Simulation) -> Vec<(Vec<f64>, &EventRow)> {
    let mut prior = simulation.initial_state().network.conviction_list();
    let mut pairs = Vec::new();
    for row in simulation.event_log().rows() {
        let current = row.state.network.conviction_list();
        pairs.push((prior, row));
        prior = current;
    }
    pairs
}

fn funded_ids(row_state: &SystemState) -> BTreeSet<NodeId> {
    row_state
        .network
        .proposals()
        .filter(|(_, proposal)| proposal.status == ProposalStatus::Funded)
        .map(|(id, _)| id)
        .collect()
}

fn assert_funding_pool_accounting(simulation: &Simulation) {
    let mut before = simulation.initial_state().clone();
    for row in simulation.event_log().rows() {
        let after = &row.state;
        let previously_funded = funded_ids(&before);
        let newly_funded = after
            .network
            .proposals()
            .filter(|(id, proposal)| {
                proposal.status == ProposalStatus::Funded && !previously_funded.contains(id)
            })
            .map(|(_, proposal)| proposal.funds_requested)
            .sum::<f64>();
        let expected = before.funding_pool() - newly_funded;
        assert!(
            (after.funding_pool() - expected).abs() <= 1e-9 * before.funding_pool().max(1.0),
            "t={} s={} pool {} expected {}",
            row.timestep,
            row.substep,
            after.funding_pool(),
            expected
        );
        assert!(after.funding_pool() >= 0.0);
        before = after.clone();
    }
}

#[test]
fn hatch_batches_age_with_the_run() {
    let simulation = run_default(1, 10);
    for row in simulation.event_log().rows() {
        let oldest = row
            .state
            .network
            .active_participants()
            .filter(|(_, participant)| participant.joined_at == 0)
            .filter_map(|(_, participant)| participant.holdings.oldest_age())
            .max()
            .expect("hatchers stay in the commons");
        assert_eq!(oldest, row.timestep, "substep {}", row.substep);
    }
}

#[test]
fn conviction_list_changes_only_where_expected() {
    let simulation = run_default(1, 10);
    for (prior, row) in transitions(&simulation) {
        let current = row.state.network.conviction_list();
        match row.label.as_str() {
            NEW_PROPOSALS_LABEL | NEW_PARTICIPANTS_LABEL => {
                assert!(current.len() >= prior.len());
                assert_eq!(&current[..prior.len()], &prior[..]);
                assert!(current[prior.len()..].iter().all(|value| *value == 0.0));
            }
            CONVICTION_LABEL => {
                assert_eq!(current.len(), prior.len());
                let has_support = row
                    .state
                    .network
                    .support_edges()
                    .any(|(_, _, edge)| edge.weight > 0.0);
                if has_support {
                    assert_ne!(current, prior, "timestep {}", row.timestep);
                }
            }
            _ => assert_eq!(current, prior, "{} at timestep {}", row.label, row.timestep),
        }
    }
}

#[test]
fn new_proposals_append_one_edge_per_participant() {
    let simulation = run_default(11, 10);
    let mut before = simulation.initial_state().network.clone();
    for row in simulation.event_log().rows() {
        let after = &row.state.network;
        if row.label == NEW_PROPOSALS_LABEL {
            let added = after.proposals().count() - before.proposals().count();
            let voters = before.active_participants().count();
            assert_eq!(
                after.conviction_list().len(),
                before.conviction_list().len() + added * voters
            );
        }
        before = after.clone();
    }
}

#[test]
fn funding_pool_only_moves_by_funded_requests() {
    for seed in [1, 2, 3, 17] {
        assert_funding_pool_accounting(&run_default(seed, 15));
    }
}

#[test]
fn long_run_never_refills_the_pool() {
    let simulation = run_default(1, 40);
    let initial_pool = simulation.initial_state().funding_pool();
    for summary in simulation.event_log().summaries() {
        assert!(summary.funding_pool <= initial_pool);
        assert!(summary.token_price > 0.0);
    }
}

#[test]
fn core_scenario_seed_one() {
    let simulation = run_core(1, 10);
    let log = simulation.event_log();
    assert_eq!(log.len(), 10 * 4);
    assert_eq!(log.status(), &LogStatus::Complete);

    let at = |timestep: u64| {
        log.rows_for_label(CONVICTION_LABEL)
            .find(|row| row.timestep == timestep)
            .expect("conviction row")
            .state
            .network
            .conviction_list()
    };
    assert!(simulation
        .initial_state()
        .network
        .support_edges()
        .any(|(_, _, edge)| edge.weight > 0.0));
    assert_ne!(at(2), at(1));
    assert_funding_pool_accounting(&simulation);
}

#[test]
fn core_pipeline_backs_new_proposals_and_releases_closed_ones() {
    let timesteps = 40;
    let mut mid_run = 0;
    for seed in [1, 2, 3] {
        let simulation = run_core(seed, timesteps);

        for (id, proposal) in simulation.current_state().network.proposals() {
            if proposal.created_at > 0 && proposal.created_at < timesteps {
                mid_run += 1;
                assert!(
                    proposal.conviction > 0.0,
                    "seed {seed}: {id} created at {} has no conviction",
                    proposal.created_at
                );
            }
        }

        let mut previous: Option<&SystemState> = None;
        for row in simulation.event_log().rows_for_label(CONVICTION_LABEL) {
            let network = &row.state.network;
            for (src, dst, edge) in network.support_edges() {
                if !network.proposal(dst).expect("proposal").is_open() {
                    assert_eq!(
                        edge.weight, 0.0,
                        "seed {seed} t={}: {src} -> {dst}",
                        row.timestep
                    );
                }
            }
            if let Some(prior) = previous {
                for (id, proposal) in prior.network.proposals() {
                    if !proposal.is_open() {
                        let now = network.proposal(id).expect("proposal").conviction;
                        assert!(
                            now <= proposal.conviction,
                            "seed {seed} t={}: closed {id} grew to {now}",
                            row.timestep
                        );
                    }
                }
            }
            previous = Some(&row.state);
        }
    }
    assert!(mid_run > 0);
}

#[test]
fn identical_seeds_give_identical_logs() {
    let a = run_default(1, 10);
    let b = run_default(1, 10);
    assert_eq!(a.event_log(), b.event_log());
    assert_eq!(a.replay_hash(), b.replay_hash());
    assert_eq!(a.event_log().summaries(), b.event_log().summaries());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn deterministic_for_any_seed(seed in 1_u64..10_000, timesteps in 1_u64..6) {
        let a = run_default(seed, timesteps);
        let b = run_default(seed, timesteps);
        prop_assert_eq!(a.event_log(), b.event_log());
        prop_assert_eq!(a.replay_hash(), b.replay_hash());
    }

    #[test]
    fn worker_count_does_not_change_the_log(seed in 1_u64..10_000) {
        let psub = blocks::default_psub().expect("default pipeline");
        let sequential = run(base_config(seed, 4), psub.clone());
        let parallel = run(
            SimulationConfig {
                policy_worker_threads: 4,
                ..base_config(seed, 4)
            },
            psub,
        );
        prop_assert_eq!(sequential.event_log(), parallel.event_log());
    }

    #[test]
    fn funding_pool_never_negative(seed in 1_u64..10_000) {
        let simulation = run_default(seed, 8);
        for row in simulation.event_log().rows() {
            prop_assert!(row.state.funding_pool() >= 0.0);
            prop_assert!(row.state.token_price() > 0.0);
            prop_assert!((0.0..=1.0).contains(&row.state.sentiment));
        }
    }
}
