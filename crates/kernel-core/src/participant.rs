use serde::Serialize;

use crate::holdings::Holdings;
use crate::network::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub holdings: Holdings,
    pub sentiment: f64,
    pub joined_at: u64,
    pub active: bool,
}

impl Participant {
    pub fn new(holdings: Holdings, sentiment: f64, joined_at: u64) -> Self {
        Self {
            holdings,
            sentiment,
            joined_at,
            active: true,
        }
    }

    pub fn stake(&self) -> f64 {
        self.holdings.total()
    }
}

/// Splits `stake` across the candidate proposals whose affinity reaches
/// `min_affinity`, proportionally to affinity. Candidates below the cutoff get
/// zero weight; the output keeps the input order.
pub fn allocate_stake(
    stake: f64,
    candidates: &[(NodeId, f64)],
    min_affinity: f64,
) -> Vec<(NodeId, f64)> {
    let eligible_affinity = candidates
        .iter()
        .filter(|(_, affinity)| *affinity >= min_affinity)
        .map(|(_, affinity)| *affinity)
        .sum::<f64>();

    candidates
        .iter()
        .map(|(proposal, affinity)| {
            let weight = if eligible_affinity > 0.0 && *affinity >= min_affinity && stake > 0.0 {
                stake * affinity / eligible_affinity
            } else {
                0.0
            };
            (*proposal, weight)
        })
        .collect()
}
