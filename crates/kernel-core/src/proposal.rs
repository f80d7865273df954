use std::fmt;

use serde::Serialize;

use crate::network::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Open, with no stake allocated yet.
    Candidate,
    /// Open and backed by allocated stake.
    Active,
    Funded,
    Failed,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Candidate => "candidate",
            Self::Active => "active",
            Self::Funded => "funded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub proposer: Option<NodeId>,
    pub funds_requested: f64,
    pub conviction: f64,
    pub status: ProposalStatus,
    pub age_days: u64,
    pub created_at: u64,
    pub funded_at: Option<u64>,
}

impl Proposal {
    pub fn new(proposer: Option<NodeId>, funds_requested: f64, created_at: u64) -> Self {
        Self {
            proposer,
            funds_requested,
            conviction: 0.0,
            status: ProposalStatus::Candidate,
            age_days: 0,
            created_at,
            funded_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            ProposalStatus::Candidate | ProposalStatus::Active
        )
    }

    pub fn has_aged_out(&self, max_age_days: u64) -> bool {
        self.is_open() && self.age_days > max_age_days
    }

    pub(crate) fn mark_funded(&mut self, timestep: u64) {
        self.status = ProposalStatus::Funded;
        self.funded_at = Some(timestep);
    }
}
