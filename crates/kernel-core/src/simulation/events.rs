use std::fmt;

use contracts::SubstepSummary;
use serde::Serialize;

use super::*;
use crate::proposal::ProposalStatus;

/// Full state after one committed substep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRow {
    pub timestep: u64,
    pub substep: usize,
    pub label: String,
    pub state: SystemState,
}

impl EventRow {
    pub fn summary(&self) -> SubstepSummary {
        let network = &self.state.network;
        let count = |status: ProposalStatus| {
            network
                .proposals()
                .filter(|(_, proposal)| proposal.status == status)
                .count()
        };
        SubstepSummary {
            timestep: self.timestep,
            substep: self.substep,
            label: self.label.clone(),
            funding_pool: self.state.funding_pool(),
            token_price: self.state.token_price(),
            token_supply: self.state.token_supply(),
            sentiment: self.state.sentiment,
            participants: network.active_participants().count(),
            open_proposals: network.open_proposals().count(),
            funded_proposals: count(ProposalStatus::Funded),
            failed_proposals: count(ProposalStatus::Failed),
            support_edges: network.support_edges().count(),
            total_conviction: network.proposal_convictions().iter().sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LogStatus {
    #[default]
    InProgress,
    Complete,
    /// The run aborted while evaluating this substep; rows before it are
    /// intact.
    Incomplete {
        timestep: u64,
        substep: usize,
        label: String,
        reason: String,
    },
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("in progress"),
            Self::Complete => f.write_str("complete"),
            Self::Incomplete {
                timestep,
                substep,
                label,
                reason,
            } => write!(
                f,
                "incomplete at timestep {timestep} substep {substep} ({label}): {reason}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventLog {
    rows: Vec<EventRow>,
    status: LogStatus,
}

impl EventLog {
    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn status(&self) -> &LogStatus {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.status == LogStatus::Complete
    }

    pub fn row(&self, timestep: u64, substep: usize) -> Option<&EventRow> {
        self.rows
            .iter()
            .find(|row| row.timestep == timestep && row.substep == substep)
    }

    /// Rows written by the stage labelled `label`, in timestep order.
    pub fn rows_for_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a EventRow> + 'a {
        self.rows.iter().filter(move |row| row.label == label)
    }

    pub fn summaries(&self) -> Vec<SubstepSummary> {
        self.rows.iter().map(EventRow::summary).collect()
    }

    pub fn into_rows(self) -> Vec<EventRow> {
        self.rows
    }
}

impl<R: RandomSource> Simulation<R> {
    pub(super) fn push_row(&mut self, timestep: u64, substep: usize, label: String) {
        self.replay_hash = mix_replay_hash(self.replay_hash, &label, timestep, substep);
        self.replay_hash = mix_state_fingerprint(self.replay_hash, &self.state);
        debug!(timestep, substep, label = %label, "substep committed");
        self.event_log.rows.push(EventRow {
            timestep,
            substep,
            label,
            state: self.state.clone(),
        });
    }

    pub(super) fn mark_log(&mut self, status: LogStatus) {
        self.event_log.status = status;
    }
}
