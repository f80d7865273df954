use std::fmt;

use serde::Serialize;

use crate::commons::Commons;
use crate::network::{Edge, EdgeKind, Network};

/// Keys a state-update function may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    Network,
    Commons,
    Sentiment,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Commons => "commons",
            Self::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value for exactly one key.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Network(Network),
    Commons(Commons),
    Sentiment(f64),
}

impl StateValue {
    pub fn key(&self) -> StateKey {
        match self {
            Self::Network(_) => StateKey::Network,
            Self::Commons(_) => StateKey::Commons,
            Self::Sentiment(_) => StateKey::Sentiment,
        }
    }

    /// First value outside its domain, as `(subject, quantity, value)`.
    pub(crate) fn numeric_violation(&self) -> Option<(String, String, f64)> {
        match self {
            Self::Network(network) => network_violation(network),
            Self::Commons(commons) => commons_violation(commons),
            Self::Sentiment(value) => {
                if value.is_finite() && (0.0..=1.0).contains(value) {
                    None
                } else {
                    Some(("commons".to_string(), "sentiment".to_string(), *value))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemState {
    pub network: Network,
    pub commons: Commons,
    pub sentiment: f64,
}

impl SystemState {
    pub fn funding_pool(&self) -> f64 {
        self.commons.funding_pool()
    }

    pub fn token_price(&self) -> f64 {
        self.commons.token_price()
    }

    pub fn token_supply(&self) -> f64 {
        self.commons.token_supply()
    }

    pub(crate) fn apply(&mut self, value: StateValue) {
        match value {
            StateValue::Network(network) => self.network = network,
            StateValue::Commons(commons) => self.commons = commons,
            StateValue::Sentiment(sentiment) => self.sentiment = sentiment,
        }
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn network_violation(network: &Network) -> Option<(String, String, f64)> {
    for (id, proposal) in network.proposals() {
        if !non_negative(proposal.conviction) {
            return Some((id.to_string(), "conviction".to_string(), proposal.conviction));
        }
    }
    for (id, participant) in network.participants() {
        if !participant.sentiment.is_finite() || !(0.0..=1.0).contains(&participant.sentiment) {
            return Some((id.to_string(), "sentiment".to_string(), participant.sentiment));
        }
        if let Some(batch) = participant
            .holdings
            .batches()
            .iter()
            .find(|batch| !non_negative(batch.amount))
        {
            return Some((id.to_string(), "token batch amount".to_string(), batch.amount));
        }
    }
    for (src, dst, edge) in network.support_edges() {
        let subject = format!("{src} -> {dst}");
        if !non_negative(edge.conviction) {
            return Some((subject, "edge conviction".to_string(), edge.conviction));
        }
        if !non_negative(edge.weight) {
            return Some((subject, "edge weight".to_string(), edge.weight));
        }
    }
    for (src, dst) in network.edges_by_kind(EdgeKind::Influence) {
        if let Ok(Edge::Influence(edge)) = network.get_edge(EdgeKind::Influence, src, dst) {
            if !non_negative(edge.influence) {
                return Some((format!("{src} -> {dst}"), "influence".to_string(), edge.influence));
            }
        }
    }
    None
}

fn commons_violation(commons: &Commons) -> Option<(String, String, f64)> {
    let checks = [
        ("funding_pool", commons.funding_pool(), non_negative(commons.funding_pool())),
        ("reserve", commons.reserve(), commons.reserve().is_finite() && commons.reserve() > 0.0),
        (
            "token_supply",
            commons.token_supply(),
            commons.token_supply().is_finite() && commons.token_supply() > 0.0,
        ),
        (
            "token_price",
            commons.token_price(),
            commons.token_price().is_finite() && commons.token_price() > 0.0,
        ),
    ];
    checks
        .into_iter()
        .find(|(_, _, ok)| !ok)
        .map(|(quantity, value, _)| ("commons".to_string(), quantity.to_string(), value))
}
