//! Partial state update blocks.
//!
//! A [`Psub`] is an ordered list of [`Stage`]s. Within a stage every policy
//! reads the same pre-stage snapshot and emits named signals; the merged
//! signals then feed the stage's state updates, each of which owns exactly one
//! [`StateKey`]. The structure is validated once, when the pipeline is built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use contracts::SimulationConfig;

use crate::blocks::{ParticipantDraft, ProposalDraft};
use crate::error::{ConfigurationError, Result};
use crate::network::NodeId;
use crate::random::RandomSource;
use crate::state::{StateKey, StateValue, SystemState};

pub type SignalKey = &'static str;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    NewParticipants(Vec<ParticipantDraft>),
    NewProposals(Vec<ProposalDraft>),
    /// `(participant, proposal, weight)` for every support edge of every
    /// active participant.
    Allocations(Vec<(NodeId, NodeId, f64)>),
    /// `(proposal, funds)` in funding order.
    Fundable(Vec<(NodeId, f64)>),
    Expired(Vec<NodeId>),
    Sentiments(Vec<(NodeId, f64)>),
}

/// Merged policy output of one stage. A missing key means "no change".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    entries: BTreeMap<SignalKey, Signal>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: SignalKey, signal: Signal) -> Self {
        let mut signals = Self::new();
        signals.insert(key, signal);
        signals
    }

    pub fn insert(&mut self, key: SignalKey, signal: Signal) -> Option<Signal> {
        self.entries.insert(key, signal)
    }

    pub fn get(&self, key: SignalKey) -> Option<&Signal> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = SignalKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a policy or update knows about where it runs.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub timestep: u64,
    pub substep: usize,
    pub label: &'a str,
    pub config: &'a SimulationConfig,
}

pub type PolicyFn =
    fn(&StageContext<'_>, &SystemState, &mut dyn RandomSource) -> Result<Signals>;

pub type UpdateFn = fn(&StageContext<'_>, &SystemState, &Signals) -> Result<StateValue>;

#[derive(Clone, Copy)]
pub struct Policy {
    pub name: &'static str,
    pub emits: &'static [SignalKey],
    pub func: PolicyFn,
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("name", &self.name)
            .field("emits", &self.emits)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy)]
pub struct StateUpdate {
    pub name: &'static str,
    pub key: StateKey,
    /// Must not appear in more than one stage of a pipeline.
    pub once_per_timestep: bool,
    pub func: UpdateFn,
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUpdate")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("once_per_timestep", &self.once_per_timestep)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Stage {
    pub label: String,
    pub policies: Vec<Policy>,
    pub updates: Vec<StateUpdate>,
}

impl Stage {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            policies: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn update(mut self, update: StateUpdate) -> Self {
        self.updates.push(update);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Psub {
    stages: Vec<Stage>,
}

impl Psub {
    pub fn new(stages: Vec<Stage>) -> std::result::Result<Self, ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::EmptyPipeline);
        }

        let mut once_owner = BTreeMap::<&'static str, &str>::new();
        for (index, stage) in stages.iter().enumerate() {
            if stage.label.trim().is_empty() {
                return Err(ConfigurationError::EmptyLabel { index });
            }

            let mut keys = BTreeSet::new();
            for update in &stage.updates {
                if !keys.insert(update.key) {
                    return Err(ConfigurationError::DuplicateStateKey {
                        label: stage.label.clone(),
                        key: update.key,
                    });
                }
                if update.once_per_timestep {
                    if let Some(first) = once_owner.insert(update.name, &stage.label) {
                        return Err(ConfigurationError::RepeatedTimestepUpdate {
                            update: update.name.to_string(),
                            first: first.to_string(),
                            second: stage.label.clone(),
                        });
                    }
                }
            }

            let mut signal_owner = BTreeMap::<SignalKey, &'static str>::new();
            for policy in &stage.policies {
                for &signal in policy.emits {
                    if let Some(first) = signal_owner.insert(signal, policy.name) {
                        return Err(ConfigurationError::SignalCollision {
                            label: stage.label.clone(),
                            signal: signal.to_string(),
                            first: first.to_string(),
                            second: policy.name.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Substeps per timestep.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The stage run as `substep` (1-based).
    pub fn stage(&self, substep: usize) -> Option<&Stage> {
        substep.checked_sub(1).and_then(|index| self.stages.get(index))
    }
}

/// 1-based substep to stage label.
pub fn label_index(psub: &Psub) -> BTreeMap<usize, String> {
    psub.stages
        .iter()
        .enumerate()
        .map(|(index, stage)| (index + 1, stage.label.clone()))
        .collect()
}

/// Folds per-policy outputs, in policy order, into one [`Signals`]. Keys must
/// be declared by the emitting policy and emitted by at most one policy.
pub(crate) fn merge_signals(
    stage: &Stage,
    outputs: Vec<Signals>,
) -> std::result::Result<Signals, ConfigurationError> {
    let mut merged = Signals::new();
    let mut owner = BTreeMap::<SignalKey, &'static str>::new();
    for (policy, output) in stage.policies.iter().zip(outputs) {
        for (key, signal) in output.entries {
            if !policy.emits.contains(&key) {
                return Err(ConfigurationError::UndeclaredSignal {
                    label: stage.label.clone(),
                    policy: policy.name.to_string(),
                    signal: key.to_string(),
                });
            }
            if let Some(first) = owner.insert(key, policy.name) {
                return Err(ConfigurationError::SignalCollision {
                    label: stage.label.clone(),
                    signal: key.to_string(),
                    first: first.to_string(),
                    second: policy.name.to_string(),
                });
            }
            merged.insert(key, signal);
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(
        _: &StageContext<'_>,
        _: &SystemState,
        _: &mut dyn RandomSource,
    ) -> Result<Signals> {
        Ok(Signals::new())
    }

    fn keep_sentiment(
        _: &StageContext<'_>,
        state: &SystemState,
        _: &Signals,
    ) -> Result<StateValue> {
        Ok(StateValue::Sentiment(state.sentiment))
    }

    fn policy(name: &'static str, emits: &'static [SignalKey]) -> Policy {
        Policy {
            name,
            emits,
            func: quiet,
        }
    }

    fn update(name: &'static str, key: StateKey, once_per_timestep: bool) -> StateUpdate {
        StateUpdate {
            name,
            key,
            once_per_timestep,
            func: keep_sentiment,
        }
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        assert_eq!(
            Psub::new(Vec::new()).unwrap_err(),
            ConfigurationError::EmptyPipeline
        );
    }

    #[test]
    fn blank_label_is_rejected() {
        let err = Psub::new(vec![Stage::new("first"), Stage::new("  ")]).unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyLabel { index: 1 });
    }

    #[test]
    fn two_updates_for_one_key_are_rejected() {
        let stage = Stage::new("twice")
            .update(update("a", StateKey::Sentiment, false))
            .update(update("b", StateKey::Sentiment, false));
        let err = Psub::new(vec![stage]).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::DuplicateStateKey {
                key: StateKey::Sentiment,
                ..
            }
        ));
    }

    #[test]
    fn once_per_timestep_update_in_two_stages_is_rejected() {
        let err = Psub::new(vec![
            Stage::new("one").update(update("age", StateKey::Network, true)),
            Stage::new("two").update(update("age", StateKey::Network, true)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::RepeatedTimestepUpdate {
                update: "age".to_string(),
                first: "one".to_string(),
                second: "two".to_string(),
            }
        );
    }

    #[test]
    fn declared_signal_collision_is_rejected() {
        let stage = Stage::new("clash")
            .policy(policy("p1", &["shared"]))
            .policy(policy("p2", &["shared"]));
        assert!(matches!(
            Psub::new(vec![stage]).unwrap_err(),
            ConfigurationError::SignalCollision { .. }
        ));
    }

    #[test]
    fn labels_are_indexed_from_one() {
        let psub = Psub::new(vec![Stage::new("a"), Stage::new("b")]).expect("valid");
        let labels = label_index(&psub);
        assert_eq!(labels.get(&1).map(String::as_str), Some("a"));
        assert_eq!(labels.get(&2).map(String::as_str), Some("b"));
        assert_eq!(psub.stage(0).map(|stage| stage.label.as_str()), None);
        assert_eq!(psub.stage(2).map(|stage| stage.label.as_str()), Some("b"));
    }

    #[test]
    fn merge_rejects_undeclared_keys() {
        let stage = Stage::new("merge").policy(policy("p1", &["declared"]));
        let output = Signals::single("other", Signal::Expired(Vec::new()));
        let err = merge_signals(&stage, vec![output]).unwrap_err();
        assert!(matches!(err, ConfigurationError::UndeclaredSignal { .. }));
    }

    #[test]
    fn merge_keeps_every_declared_signal() {
        let stage = Stage::new("merge")
            .policy(policy("p1", &["a"]))
            .policy(policy("p2", &["b"]));
        let merged = merge_signals(
            &stage,
            vec![
                Signals::single("a", Signal::Expired(vec![NodeId(1)])),
                Signals::single("b", Signal::Fundable(Vec::new())),
            ],
        )
        .expect("merge");
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
