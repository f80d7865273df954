use super::*;

use crate::blocks::allocation::{apply_allocations, plan_allocations};
use crate::blocks::draw_request_share;
use crate::commons::{create_token_batches, Commons};
use crate::holdings::Holdings;
use crate::network::{Edge, InfluenceEdge, Network, SupportEdge};
use crate::participant::Participant;
use crate::proposal::Proposal;
use crate::random::{choose, BOOTSTRAP_STREAM};

/// Hatches the commons and seeds the network from `config`: hatchers with
/// their initial batches, influence links between them, the opening proposals
/// and one round of stake allocation.
pub fn bootstrap_state<R: RandomSource>(config: &SimulationConfig) -> Result<SystemState> {
    config.validate()?;
    let mut rng = R::from_stream(config.seed, BOOTSTRAP_STREAM);
    let commons = Commons::hatch(&config.hatch)?;

    let shares = (0..config.network.initial_participants)
        .map(|_| 0.5 + rng.random_number())
        .collect::<Vec<_>>();
    let total_share = shares.iter().sum::<f64>();
    let contributions = shares
        .iter()
        .map(|share| config.hatch.total_hatch_raise * share / total_share)
        .collect::<Vec<_>>();

    let mut network = Network::new();
    let mut hatchers = Vec::with_capacity(contributions.len());
    for batch in create_token_batches(&contributions, config.hatch.hatch_price) {
        let sentiment = rng.random_number();
        let holdings = Holdings::from_batches(vec![batch]);
        hatchers.push(network.add_participant(Participant::new(holdings, sentiment, 0)));
    }

    for &src in &hatchers {
        for &dst in &hatchers {
            if src != dst && rng.probability(config.network.influence_probability) {
                let influence = rng.random_number();
                network.add_edge(src, dst, Edge::Influence(InfluenceEdge { influence }))?;
            }
        }
    }

    let pool = commons.funding_pool();
    if pool > 0.0 {
        for _ in 0..config.network.initial_proposals {
            let proposer = *choose(&mut rng, &hatchers)
                .ok_or_else(|| SimulationError::NotFound("initial proposer".to_string()))?;
            let share = draw_request_share(&mut rng, &config.behavior, &config.conviction);
            let proposal = network.add_proposal(Proposal::new(Some(proposer), share * pool, 0));
            for &voter in &hatchers {
                let affinity = if voter == proposer {
                    1.0
                } else {
                    rng.random_number()
                };
                network.add_edge(voter, proposal, Edge::Support(SupportEdge::new(affinity)))?;
            }
        }
    }

    let allocations = plan_allocations(&network, config.conviction.min_affinity_to_vote);
    apply_allocations(&mut network, &allocations)?;

    let sentiment = network.mean_sentiment();
    Ok(SystemState {
        network,
        commons,
        sentiment,
    })
}

impl<R: RandomSource> Simulation<R> {
    /// Validates the configuration and the initial state and prepares an idle
    /// run at timestep 0. Nothing is evaluated until the first [`step`].
    ///
    /// [`step`]: Simulation::step
    pub fn new(config: SimulationConfig, initial_state: SystemState, psub: Psub) -> Result<Self> {
        config.validate()?;
        if let Some((subject, quantity, value)) = first_violation(&initial_state) {
            return Err(SimulationError::NumericInstability {
                timestep: 0,
                substep: 0,
                subject,
                quantity,
                value,
            });
        }

        let policy_worker_threads = config.policy_worker_threads.max(1);
        let policy_pool = if policy_worker_threads > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(policy_worker_threads)
                .build()
                .ok()
        } else {
            None
        };

        let status = RunStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: config.run_id.clone(),
            current_timestep: 0,
            max_timesteps: config.timesteps,
            substeps_per_timestep: psub.len(),
            mode: RunMode::Paused,
        };
        info!(
            run_id = %config.run_id,
            seed = config.seed,
            timesteps = config.timesteps,
            substeps = psub.len(),
            policy_workers = policy_worker_threads,
            "simulation prepared"
        );

        Ok(Self {
            replay_hash: mix_state_fingerprint(config.seed, &initial_state),
            config,
            psub,
            status,
            state: initial_state.clone(),
            initial_state,
            event_log: EventLog::default(),
            policy_pool,
            random: PhantomData,
        })
    }

    /// [`bootstrap_state`] followed by [`Simulation::new`].
    pub fn bootstrap(config: SimulationConfig, psub: Psub) -> Result<Self> {
        let initial_state = bootstrap_state::<R>(&config)?;
        Self::new(config, initial_state, psub)
    }
}
