//! The commons model expressed as PSUB stages.
//!
//! Each submodule contributes one [`Stage`]: its policies read the pre-stage
//! snapshot and emit signals, its updates turn those signals into new values
//! for the network, the commons or the aggregate sentiment.

pub mod aging;
pub mod allocation;
pub mod conviction;
pub mod funding;
pub mod participants;
pub mod proposals;
pub mod sentiment;

use contracts::{BehaviorConfig, ConvictionConfig};

use crate::error::ConfigurationError;
use crate::network::NodeId;
use crate::psub::{Psub, Signal, SignalKey, Signals};
use crate::random::RandomSource;

pub const AGE_LABEL: &str = "Age token batches and proposals";
pub const NEW_PARTICIPANTS_LABEL: &str = "Generate new participants";
pub const NEW_PROPOSALS_LABEL: &str = "Generate new proposals";
pub const ALLOCATE_LABEL: &str = "Participants allocate support to proposals";
pub const CONVICTION_LABEL: &str = "Calculate proposals' conviction";
pub const FUNDING_LABEL: &str = "Fund proposals whose conviction passed the trigger";
pub const SENTIMENT_LABEL: &str = "Update participants' sentiment";

pub const NEW_PARTICIPANTS: SignalKey = "new_participants";
pub const NEW_PROPOSALS: SignalKey = "new_proposals";
pub const ALLOCATIONS: SignalKey = "allocations";
pub const FUNDABLE: SignalKey = "fundable_proposals";
pub const EXPIRED: SignalKey = "expired_proposals";
pub const SENTIMENTS: SignalKey = "sentiments";

/// A newcomer as drawn by the participant policy, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantDraft {
    pub investment: f64,
    pub tokens: f64,
    pub sentiment: f64,
    /// Affinity towards each proposal open at the time of joining.
    pub affinities: Vec<(NodeId, f64)>,
    /// Existing participants that will influence the newcomer.
    pub influencers: Vec<(NodeId, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposalDraft {
    pub proposer: NodeId,
    pub funds_requested: f64,
    /// Affinity of every active participant, the proposer's being 1.
    pub affinities: Vec<(NodeId, f64)>,
}

/// The full commons model: aging, arrivals, proposals, allocation, conviction,
/// funding, sentiment.
pub fn default_psub() -> Result<Psub, ConfigurationError> {
    Psub::new(vec![
        aging::stage(),
        participants::stage(),
        proposals::stage(),
        allocation::stage(),
        conviction::stage(),
        funding::stage(),
        sentiment::stage(),
    ])
}

/// Reduced pipeline that exercises aging, conviction, proposal arrival and
/// the funding check only.
pub fn core_psub() -> Result<Psub, ConfigurationError> {
    Psub::new(vec![
        aging::stage(),
        conviction::stage(),
        proposals::stage(),
        funding::stage(),
    ])
}

/// Share of the funding pool a new proposal asks for: gamma-distributed,
/// then held between `min_request_share` and 90% of the trigger asymptote.
pub fn draw_request_share(
    rng: &mut dyn RandomSource,
    behavior: &BehaviorConfig,
    conviction: &ConvictionConfig,
) -> f64 {
    let ceiling = (conviction.max_request_share * 0.9).max(behavior.min_request_share);
    rng.gamma(
        behavior.request_share_shape,
        0.0,
        behavior.request_share_scale,
    )
    .clamp(behavior.min_request_share, ceiling)
}

fn new_participants(signals: &Signals) -> &[ParticipantDraft] {
    match signals.get(NEW_PARTICIPANTS) {
        Some(Signal::NewParticipants(drafts)) => drafts,
        _ => &[],
    }
}

fn new_proposals(signals: &Signals) -> &[ProposalDraft] {
    match signals.get(NEW_PROPOSALS) {
        Some(Signal::NewProposals(drafts)) => drafts,
        _ => &[],
    }
}

fn pairs(signals: &Signals, key: SignalKey) -> &[(NodeId, f64)] {
    match signals.get(key) {
        Some(Signal::Fundable(pairs)) | Some(Signal::Sentiments(pairs)) => pairs,
        _ => &[],
    }
}
