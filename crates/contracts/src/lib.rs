//! v1 cross-boundary contracts for the commons kernel and its runners.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod serde_u64_string;

pub const SCHEMA_VERSION_V1: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub schema_version: String,
    pub run_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub timesteps: u64,
    #[serde(default)]
    pub policy_worker_threads: usize,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub hatch: HatchConfig,
    #[serde(default)]
    pub conviction: ConvictionConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    pub notes: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "commons_local_001".to_string(),
            seed: 1,
            timesteps: 10,
            policy_worker_threads: 1,
            network: NetworkConfig::default(),
            hatch: HatchConfig::default(),
            conviction: ConvictionConfig::default(),
            behavior: BehaviorConfig::default(),
            notes: None,
        }
    }
}

impl SimulationConfig {
    /// Checks ranges the kernel relies on. Reports the first offending field.
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if self.timesteps == 0 {
            return Err(ConfigIssue::new("timesteps", "must be at least 1"));
        }
        if self.network.initial_participants == 0 {
            return Err(ConfigIssue::new(
                "network.initial_participants",
                "a commons needs at least one hatcher",
            ));
        }
        unit_interval(
            "network.influence_probability",
            self.network.influence_probability,
        )?;

        positive("hatch.total_hatch_raise", self.hatch.total_hatch_raise)?;
        positive("hatch.hatch_price", self.hatch.hatch_price)?;
        positive("hatch.kappa", self.hatch.kappa)?;
        if !(0.0..1.0).contains(&self.hatch.hatch_tribute) {
            return Err(ConfigIssue::new("hatch.hatch_tribute", "must be in [0, 1)"));
        }

        let conviction = &self.conviction;
        if !(conviction.alpha > 0.0 && conviction.alpha < 1.0) {
            return Err(ConfigIssue::new("conviction.alpha", "must be in (0, 1)"));
        }
        if !(conviction.max_request_share > 0.0 && conviction.max_request_share <= 1.0) {
            return Err(ConfigIssue::new(
                "conviction.max_request_share",
                "must be in (0, 1]",
            ));
        }
        positive("conviction.min_stake_share", conviction.min_stake_share)?;
        unit_interval(
            "conviction.min_affinity_to_vote",
            conviction.min_affinity_to_vote,
        )?;

        let behavior = &self.behavior;
        unit_interval("behavior.new_participant_rate", behavior.new_participant_rate)?;
        unit_interval("behavior.proposal_rate", behavior.proposal_rate)?;
        unit_interval("behavior.sentiment_decay", behavior.sentiment_decay)?;
        unit_interval("behavior.sentiment_bonus_funded", behavior.sentiment_bonus_funded)?;
        unit_interval("behavior.influence_pull", behavior.influence_pull)?;
        positive("behavior.investment_shape", behavior.investment_shape)?;
        positive("behavior.investment_scale", behavior.investment_scale)?;
        positive("behavior.request_share_shape", behavior.request_share_shape)?;
        positive("behavior.request_share_scale", behavior.request_share_scale)?;
        if !(behavior.min_request_share > 0.0
            && behavior.min_request_share < conviction.max_request_share)
        {
            return Err(ConfigIssue::new(
                "behavior.min_request_share",
                "must be positive and below conviction.max_request_share",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub initial_participants: usize,
    pub initial_proposals: usize,
    pub influence_probability: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            initial_participants: 8,
            initial_proposals: 4,
            influence_probability: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HatchConfig {
    pub total_hatch_raise: f64,
    pub hatch_price: f64,
    pub hatch_tribute: f64,
    pub kappa: f64,
}

impl Default for HatchConfig {
    fn default() -> Self {
        Self {
            total_hatch_raise: 100_000.0,
            hatch_price: 0.3,
            hatch_tribute: 0.2,
            kappa: 2.0,
        }
    }
}

/// Trigger-curve and decay parameters.
///
/// `alpha` is the per-timestep decay factor, `max_request_share` is the
/// curve's asymptote (beta) and `min_stake_share` scales the threshold (rho).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvictionConfig {
    pub alpha: f64,
    pub max_request_share: f64,
    pub min_stake_share: f64,
    pub min_affinity_to_vote: f64,
    pub max_proposal_age_days: u64,
}

impl Default for ConvictionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            max_request_share: 0.2,
            min_stake_share: 0.0025,
            min_affinity_to_vote: 0.3,
            max_proposal_age_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BehaviorConfig {
    pub new_participant_rate: f64,
    pub investment_shape: f64,
    pub investment_loc: f64,
    pub investment_scale: f64,
    pub proposal_rate: f64,
    pub request_share_shape: f64,
    pub request_share_scale: f64,
    pub min_request_share: f64,
    pub sentiment_decay: f64,
    pub sentiment_bonus_funded: f64,
    pub influence_pull: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            new_participant_rate: 0.5,
            investment_shape: 3.0,
            investment_loc: 10.0,
            investment_scale: 300.0,
            proposal_rate: 0.05,
            request_share_shape: 2.0,
            request_share_scale: 0.02,
            min_request_share: 0.001,
            sentiment_decay: 0.02,
            sentiment_bonus_funded: 0.1,
            influence_pull: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigIssue> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigIssue::new(field, format!("must be positive, got {value}")))
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), ConfigIssue> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigIssue::new(field, format!("must be in [0, 1], got {value}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Running,
    Paused,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStatus {
    pub schema_version: String,
    pub run_id: String,
    pub current_timestep: u64,
    pub max_timesteps: u64,
    pub substeps_per_timestep: usize,
    pub mode: RunMode,
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        self.current_timestep >= self.max_timesteps
    }

    pub fn is_aborted(&self) -> bool {
        self.mode == RunMode::Aborted
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={} timestep={}/{} substeps={} mode={:?}",
            self.run_id,
            self.current_timestep,
            self.max_timesteps,
            self.substeps_per_timestep,
            self.mode
        )
    }
}

/// Flat, tabular view of one event-log row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstepSummary {
    pub timestep: u64,
    pub substep: usize,
    pub label: String,
    pub funding_pool: f64,
    pub token_price: f64,
    pub token_supply: f64,
    pub sentiment: f64,
    pub participants: usize,
    pub open_proposals: usize,
    pub funded_proposals: usize,
    pub failed_proposals: usize,
    pub support_edges: usize,
    pub total_conviction: f64,
}

impl fmt::Display for SubstepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={} s={} [{}] pool={:.2} price={:.4} supply={:.2} sentiment={:.3} participants={} open={} funded={} failed={} conviction={:.2}",
            self.timestep,
            self.substep,
            self.label,
            self.funding_pool,
            self.token_price,
            self.token_supply,
            self.sentiment,
            self.participants,
            self.open_proposals,
            self.funded_proposals,
            self.failed_proposals,
            self.total_conviction
        )
    }
}
