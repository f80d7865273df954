//! Typed participant/proposal graph.
//!
//! Nodes live in an id-indexed arena; edges live in an insertion-ordered table
//! keyed by `(kind, src, dst)`. Nodes never hold references to each other, so
//! every traversal goes through id lookup.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Result, SimulationError};
use crate::participant::Participant;
use crate::proposal::Proposal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Participant,
    Proposal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Participant(Participant),
    Proposal(Proposal),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Participant(_) => NodeKind::Participant,
            Self::Proposal(_) => NodeKind::Proposal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Support,
    Influence,
}

impl EdgeKind {
    /// The only `(src, dst)` node kinds this edge may connect.
    pub fn endpoints(self) -> (NodeKind, NodeKind) {
        match self {
            Self::Support => (NodeKind::Participant, NodeKind::Proposal),
            Self::Influence => (NodeKind::Participant, NodeKind::Participant),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => f.write_str("support"),
            Self::Influence => f.write_str("influence"),
        }
    }
}

/// Participant -> proposal. `weight` is the stake currently allocated,
/// `conviction` the decayed accumulation of past weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportEdge {
    pub affinity: f64,
    pub weight: f64,
    pub conviction: f64,
}

impl SupportEdge {
    pub fn new(affinity: f64) -> Self {
        Self {
            affinity,
            weight: 0.0,
            conviction: 0.0,
        }
    }
}

/// Participant -> participant: how strongly `src` sways `dst`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfluenceEdge {
    pub influence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edge {
    Support(SupportEdge),
    Influence(InfluenceEdge),
}

impl Edge {
    pub fn kind(&self) -> EdgeKind {
        match self {
            Self::Support(_) => EdgeKind::Support,
            Self::Influence(_) => EdgeKind::Influence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub src: NodeId,
    pub dst: NodeId,
    pub edge: Edge,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Network {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    edges: Vec<EdgeRecord>,
    #[serde(skip)]
    edge_index: BTreeMap<(EdgeKind, NodeId, NodeId), usize>,
    aged_through: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub fn add_participant(&mut self, participant: Participant) -> NodeId {
        self.add_node(Node::Participant(participant))
    }

    pub fn add_proposal(&mut self, proposal: Proposal) -> NodeId {
        self.add_node(Node::Proposal(proposal))
    }

    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, edge: Edge) -> Result<()> {
        let kind = edge.kind();
        let src_kind = self.node_kind(src)?;
        let dst_kind = self.node_kind(dst)?;
        let (expected_src, expected_dst) = kind.endpoints();
        if src_kind != expected_src || dst_kind != expected_dst {
            return Err(SimulationError::InvalidTopology {
                kind,
                src,
                dst,
                reason: format!(
                    "expected {expected_src:?} -> {expected_dst:?}, got {src_kind:?} -> {dst_kind:?}"
                ),
            });
        }
        if src == dst {
            return Err(SimulationError::InvalidTopology {
                kind,
                src,
                dst,
                reason: "self loop".to_string(),
            });
        }
        if self.edge_index.contains_key(&(kind, src, dst)) {
            return Err(SimulationError::InvalidTopology {
                kind,
                src,
                dst,
                reason: "edge already exists".to_string(),
            });
        }

        self.edge_index.insert((kind, src, dst), self.edges.len());
        self.edges.push(EdgeRecord { src, dst, edge });
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes of `kind` in id order.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<(NodeId, &Node)> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.kind() == kind)
            .map(|(id, node)| (*id, node))
            .collect()
    }

    /// `(src, dst)` pairs of `kind` in insertion order.
    pub fn edges_by_kind(&self, kind: EdgeKind) -> Vec<(NodeId, NodeId)> {
        self.edges
            .iter()
            .filter(|record| record.edge.kind() == kind)
            .map(|record| (record.src, record.dst))
            .collect()
    }

    pub fn get_edge(&self, kind: EdgeKind, src: NodeId, dst: NodeId) -> Result<&Edge> {
        self.edge_index
            .get(&(kind, src, dst))
            .map(|index| &self.edges[*index].edge)
            .ok_or_else(|| SimulationError::NotFound(format!("{kind} edge {src} -> {dst}")))
    }

    pub fn support_edge(&self, participant: NodeId, proposal: NodeId) -> Result<&SupportEdge> {
        match self.get_edge(EdgeKind::Support, participant, proposal)? {
            Edge::Support(edge) => Ok(edge),
            Edge::Influence(_) => Err(SimulationError::NotFound(format!(
                "support edge {participant} -> {proposal}"
            ))),
        }
    }

    pub fn participant(&self, id: NodeId) -> Result<&Participant> {
        match self.nodes.get(&id) {
            Some(Node::Participant(participant)) => Ok(participant),
            _ => Err(SimulationError::NotFound(format!("participant {id}"))),
        }
    }

    pub fn proposal(&self, id: NodeId) -> Result<&Proposal> {
        match self.nodes.get(&id) {
            Some(Node::Proposal(proposal)) => Ok(proposal),
            _ => Err(SimulationError::NotFound(format!("proposal {id}"))),
        }
    }

    pub(crate) fn participant_mut(&mut self, id: NodeId) -> Result<&mut Participant> {
        match self.nodes.get_mut(&id) {
            Some(Node::Participant(participant)) => Ok(participant),
            _ => Err(SimulationError::NotFound(format!("participant {id}"))),
        }
    }

    pub(crate) fn proposal_mut(&mut self, id: NodeId) -> Result<&mut Proposal> {
        match self.nodes.get_mut(&id) {
            Some(Node::Proposal(proposal)) => Ok(proposal),
            _ => Err(SimulationError::NotFound(format!("proposal {id}"))),
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = (NodeId, &Participant)> {
        self.nodes.iter().filter_map(|(id, node)| match node {
            Node::Participant(participant) => Some((*id, participant)),
            Node::Proposal(_) => None,
        })
    }

    pub fn active_participants(&self) -> impl Iterator<Item = (NodeId, &Participant)> {
        self.participants()
            .filter(|(_, participant)| participant.active)
    }

    pub fn proposals(&self) -> impl Iterator<Item = (NodeId, &Proposal)> {
        self.nodes.iter().filter_map(|(id, node)| match node {
            Node::Proposal(proposal) => Some((*id, proposal)),
            Node::Participant(_) => None,
        })
    }

    pub fn open_proposals(&self) -> impl Iterator<Item = (NodeId, &Proposal)> {
        self.proposals().filter(|(_, proposal)| proposal.is_open())
    }

    /// Support edges in insertion order.
    pub fn support_edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &SupportEdge)> {
        self.edges.iter().filter_map(|record| match &record.edge {
            Edge::Support(edge) => Some((record.src, record.dst, edge)),
            Edge::Influence(_) => None,
        })
    }

    pub(crate) fn support_edges_mut(
        &mut self,
    ) -> impl Iterator<Item = (NodeId, NodeId, &mut SupportEdge)> {
        self.edges.iter_mut().filter_map(|record| match &mut record.edge {
            Edge::Support(edge) => Some((record.src, record.dst, edge)),
            Edge::Influence(_) => None,
        })
    }

    pub(crate) fn support_edge_mut(
        &mut self,
        participant: NodeId,
        proposal: NodeId,
    ) -> Result<&mut SupportEdge> {
        let index = self
            .edge_index
            .get(&(EdgeKind::Support, participant, proposal))
            .copied()
            .ok_or_else(|| {
                SimulationError::NotFound(format!("support edge {participant} -> {proposal}"))
            })?;
        match &mut self.edges[index].edge {
            Edge::Support(edge) => Ok(edge),
            Edge::Influence(_) => Err(SimulationError::NotFound(format!(
                "support edge {participant} -> {proposal}"
            ))),
        }
    }

    /// Support edges leaving `participant`, in insertion order.
    pub fn supports_of(&self, participant: NodeId) -> Vec<(NodeId, &SupportEdge)> {
        self.support_edges()
            .filter(|(src, _, _)| *src == participant)
            .map(|(_, dst, edge)| (dst, edge))
            .collect()
    }

    /// Support edges arriving at `proposal`, in insertion order.
    pub fn support_edges_of(&self, proposal: NodeId) -> Vec<(NodeId, &SupportEdge)> {
        self.support_edges()
            .filter(|(_, dst, _)| *dst == proposal)
            .map(|(src, _, edge)| (src, edge))
            .collect()
    }

    pub fn total_support_weight(&self) -> f64 {
        self.support_edges().map(|(_, _, edge)| edge.weight).sum()
    }

    /// `(influencer, influence)` pairs for edges pointing at `participant`.
    pub fn influencers_of(&self, participant: NodeId) -> Vec<(NodeId, f64)> {
        self.edges
            .iter()
            .filter_map(|record| match &record.edge {
                Edge::Influence(edge) if record.dst == participant => {
                    Some((record.src, edge.influence))
                }
                _ => None,
            })
            .collect()
    }

    /// Edge-level conviction values in support-edge insertion order.
    pub fn conviction_list(&self) -> Vec<f64> {
        self.support_edges()
            .map(|(_, _, edge)| edge.conviction)
            .collect()
    }

    /// Proposal-level conviction values in proposal id order.
    pub fn proposal_convictions(&self) -> Vec<f64> {
        self.proposals()
            .map(|(_, proposal)| proposal.conviction)
            .collect()
    }

    pub fn total_stake(&self) -> f64 {
        self.active_participants()
            .map(|(_, participant)| participant.stake())
            .sum()
    }

    pub fn mean_sentiment(&self) -> f64 {
        let (sum, count) = self
            .active_participants()
            .fold((0.0, 0_usize), |(sum, count), (_, participant)| {
                (sum + participant.sentiment, count + 1)
            });
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn aged_through(&self) -> u64 {
        self.aged_through
    }

    /// Ages every active participant's batches and every open proposal by
    /// one day. A second call for the same timestep is a no-op.
    pub fn age_holdings(&mut self, timestep: u64) {
        if timestep <= self.aged_through {
            return;
        }
        for node in self.nodes.values_mut() {
            match node {
                Node::Participant(participant) if participant.active => {
                    participant.holdings.age(timestep);
                }
                Node::Proposal(proposal) if proposal.is_open() => {
                    proposal.age_days = proposal.age_days.saturating_add(1);
                }
                _ => {}
            }
        }
        self.aged_through = timestep;
    }

    fn node_kind(&self, id: NodeId) -> Result<NodeKind> {
        self.nodes
            .get(&id)
            .map(Node::kind)
            .ok_or_else(|| SimulationError::NotFound(format!("node {id}")))
    }
}
