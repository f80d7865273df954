use tracing::trace;

use contracts::BehaviorConfig;

use crate::error::Result;
use crate::network::{Network, NodeId};
use crate::psub::{Policy, Signal, Signals, Stage, StageContext, StateUpdate};
use crate::random::RandomSource;
use crate::state::{StateKey, StateValue, SystemState};

use super::{pairs, SENTIMENTS, SENTIMENT_LABEL};

pub fn stage() -> Stage {
    Stage::new(SENTIMENT_LABEL)
        .policy(Policy {
            name: "drift_sentiment",
            emits: &[SENTIMENTS],
            func: p_drift_sentiment,
        })
        .update(StateUpdate {
            name: "participant_sentiment",
            key: StateKey::Network,
            once_per_timestep: false,
            func: su_participant_sentiment,
        })
        .update(StateUpdate {
            name: "commons_sentiment",
            key: StateKey::Sentiment,
            once_per_timestep: false,
            func: su_commons_sentiment,
        })
}

/// Next sentiment of one participant: decay, a bonus for backing something
/// funded at `timestep`, then a pull towards whoever influences it.
pub fn next_sentiment(
    network: &Network,
    participant: NodeId,
    current: f64,
    timestep: u64,
    behavior: &BehaviorConfig,
) -> f64 {
    let backed_funded = network.supports_of(participant).iter().any(|(proposal, edge)| {
        edge.weight > 0.0
            && network
                .proposal(*proposal)
                .map(|proposal| proposal.funded_at == Some(timestep))
                .unwrap_or(false)
    });

    let (pull_sum, influence_sum) = network
        .influencers_of(participant)
        .into_iter()
        .filter_map(|(influencer, influence)| {
            network
                .participant(influencer)
                .ok()
                .filter(|other| other.active)
                .map(|other| (other.sentiment * influence, influence))
        })
        .fold((0.0, 0.0), |(pull, total), (weighted, influence)| {
            (pull + weighted, total + influence)
        });

    let mut next = current * (1.0 - behavior.sentiment_decay);
    if backed_funded {
        next += behavior.sentiment_bonus_funded;
    }
    if influence_sum > 0.0 {
        next += behavior.influence_pull * (pull_sum / influence_sum - next);
    }
    next.clamp(0.0, 1.0)
}

fn p_drift_sentiment(
    ctx: &StageContext<'_>,
    state: &SystemState,
    _: &mut dyn RandomSource,
) -> Result<Signals> {
    let sentiments = state
        .network
        .active_participants()
        .map(|(id, participant)| {
            (
                id,
                next_sentiment(
                    &state.network,
                    id,
                    participant.sentiment,
                    ctx.timestep,
                    &ctx.config.behavior,
                ),
            )
        })
        .collect::<Vec<_>>();
    trace!(
        timestep = ctx.timestep,
        participants = sentiments.len(),
        "sentiment drifted"
    );
    Ok(Signals::single(SENTIMENTS, Signal::Sentiments(sentiments)))
}

fn su_participant_sentiment(
    _: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let mut network = state.network.clone();
    for (id, sentiment) in pairs(signals, SENTIMENTS) {
        network.participant_mut(*id)?.sentiment = *sentiment;
    }
    Ok(StateValue::Network(network))
}

/// Mean of the new participant sentiments; unchanged when nobody drifted.
fn su_commons_sentiment(
    _: &StageContext<'_>,
    state: &SystemState,
    signals: &Signals,
) -> Result<StateValue> {
    let sentiments = pairs(signals, SENTIMENTS);
    if sentiments.is_empty() {
        return Ok(StateValue::Sentiment(state.sentiment));
    }
    let mean = sentiments.iter().map(|(_, value)| value).sum::<f64>() / sentiments.len() as f64;
    Ok(StateValue::Sentiment(mean))
}
