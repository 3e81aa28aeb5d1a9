// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage graph construction and validation.
//!
//! The graph has a fixed vocabulary of node roles:
//!
//! * an **iterable** (at most one) runs once and publishes a list; every element opens a
//!   configuration *branch*,
//! * plain **stages** run once per scope of their deepest input (shared or per branch),
//! * **mapped** stages run once per subject inside each branch, iterating the list
//!   inputs they name and aligning with other mapped upstreams by subject index,
//! * **joins** gather a fan-out back into one ordered list, either the subjects of a
//!   mapped stage (one join instance per branch) or the branches of the iterable.
//!
//! [`GraphBuilder::build`] resolves every edge against the declared ports and rejects
//! anything the executor could not run, so no wiring problem surfaces mid-run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::engine::{PortShape, PortSpec};
use crate::errors::GraphError;
use crate::traits::Stage;

/// How many instances of a node exist and what they are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// One instance for the whole run
    Shared,
    /// One instance per configuration branch
    Branch,
    /// One instance per (branch, subject)
    Subject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRole {
    Stage,
    Iterable { port: String },
    Mapped { iterate: Vec<String> },
    Join { over: String },
}

/// How an edge's upstream value reaches the downstream port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Passed through as is (aligned by branch and subject where both sides have them)
    Direct,
    /// One element of an upstream list per branch or subject
    Element,
    /// Every iteration of the upstream collected into an ordered list
    Gather,
}

pub struct GraphNode {
    pub name: String,
    pub stage: Arc<dyn Stage>,
    pub role: NodeRole,
    pub scope: Scope,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

impl GraphNode {
    /// Indices of edges ending at this node.
    pub fn incoming(&self) -> &[usize] {
        &self.inputs
    }

    /// Indices of edges starting at this node.
    pub fn outgoing(&self) -> &[usize] {
        &self.outputs
    }

    pub fn is_join(&self) -> bool {
        matches!(self.role, NodeRole::Join { .. })
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.name)
            .field("stage", &self.stage.name())
            .field("role", &self.role)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub from_port: String,
    pub to: usize,
    pub to_port: String,
    pub binding: Binding,
    /// Scope of the value leaving `from`. Elements of the iterable's list are
    /// branch-scoped even though the iterable itself is shared.
    pub source_scope: Scope,
}

/// A validated, topologically ordered stage graph.
#[derive(Debug)]
pub struct StageGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<Edge>,
    order: Vec<usize>,
    iterable: Option<usize>,
}

impl StageGraph {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    /// Node indices in dependency order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn iterable(&self) -> Option<usize> {
        self.iterable
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct PendingNode {
    name: String,
    stage: Arc<dyn Stage>,
    role: NodeRole,
}

struct PendingEdge {
    from: String,
    from_port: String,
    to: String,
    to_port: String,
}

/// Collects nodes and edges; all validation happens in [`GraphBuilder::build`].
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<PendingNode>,
    edges: Vec<PendingEdge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, name: &str, stage: Arc<dyn Stage>, role: NodeRole) -> Self {
        self.nodes.push(PendingNode {
            name: name.to_string(),
            stage,
            role,
        });
        self
    }

    /// A stage whose list output `port` opens one branch per element.
    pub fn add_iterable(self, name: &str, stage: Arc<dyn Stage>, port: &str) -> Self {
        self.add(
            name,
            stage,
            NodeRole::Iterable {
                port: port.to_string(),
            },
        )
    }

    pub fn add_stage(self, name: &str, stage: Arc<dyn Stage>) -> Self {
        self.add(name, stage, NodeRole::Stage)
    }

    /// A per-subject stage iterating the list inputs named in `iterate`.
    pub fn add_mapped(self, name: &str, stage: Arc<dyn Stage>, iterate: &[&str]) -> Self {
        self.add(
            name,
            stage,
            NodeRole::Mapped {
                iterate: iterate.iter().map(|port| port.to_string()).collect(),
            },
        )
    }

    /// A join collecting the fan-out of `over` (the iterable or a mapped stage).
    pub fn add_join(self, name: &str, stage: Arc<dyn Stage>, over: &str) -> Self {
        self.add(
            name,
            stage,
            NodeRole::Join {
                over: over.to_string(),
            },
        )
    }

    pub fn connect(mut self, from: &str, from_port: &str, to: &str, to_port: &str) -> Self {
        self.edges.push(PendingEdge {
            from: from.to_string(),
            from_port: from_port.to_string(),
            to: to.to_string(),
            to_port: to_port.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<StageGraph, GraphError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut iterable: Option<usize> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if index.insert(node.name.clone(), i).is_some() {
                return Err(GraphError::DuplicateStage {
                    stage: node.name.clone(),
                });
            }
            if let NodeRole::Iterable { port } = &node.role {
                if let Some(first) = iterable {
                    return Err(GraphError::MultipleIterables {
                        first: self.nodes[first].name.clone(),
                        second: node.name.clone(),
                    });
                }
                let declared = output_spec(node, port).ok_or_else(|| GraphError::UnknownPort {
                    stage: node.name.clone(),
                    port: port.clone(),
                })?;
                if declared.shape != PortShape::List {
                    return Err(GraphError::PortKindMismatch {
                        from: format!("{}.{}", node.name, port),
                        to: node.name.clone(),
                        expected: format!("list<{}>", declared.kind),
                        found: declared.signature(),
                    });
                }
                iterable = Some(i);
            }
        }

        for node in &self.nodes {
            match &node.role {
                NodeRole::Mapped { iterate } => {
                    for port in iterate {
                        if input_spec(node, port).is_none() {
                            return Err(GraphError::UnknownPort {
                                stage: node.name.clone(),
                                port: port.clone(),
                            });
                        }
                    }
                }
                NodeRole::Join { over } => {
                    let valid = index.get(over).is_some_and(|&i| {
                        matches!(
                            self.nodes[i].role,
                            NodeRole::Iterable { .. } | NodeRole::Mapped { .. }
                        )
                    });
                    if !valid {
                        return Err(GraphError::InvalidJoinSource {
                            stage: node.name.clone(),
                            source: over.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        let mut edges: Vec<(usize, usize, PendingEdge)> = Vec::with_capacity(self.edges.len());
        let mut bound: HashSet<(usize, String)> = HashSet::new();
        for edge in self.edges {
            let from = lookup(&index, &edge.from)?;
            let to = lookup(&index, &edge.to)?;
            if output_spec(&self.nodes[from], &edge.from_port).is_none() {
                return Err(GraphError::UnknownPort {
                    stage: edge.from,
                    port: edge.from_port,
                });
            }
            if input_spec(&self.nodes[to], &edge.to_port).is_none() {
                return Err(GraphError::UnknownPort {
                    stage: edge.to,
                    port: edge.to_port,
                });
            }
            if !bound.insert((to, edge.to_port.clone())) {
                return Err(GraphError::DuplicateBinding {
                    stage: edge.to,
                    port: edge.to_port,
                });
            }
            edges.push((from, to, edge));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            for spec in node.stage.inputs() {
                if !bound.contains(&(i, spec.name.to_string())) {
                    return Err(GraphError::UnboundInput {
                        stage: node.name.clone(),
                        port: spec.name.to_string(),
                    });
                }
            }
        }

        let order = topological_order(&self.nodes, &edges)?;

        // Scopes follow dependency order so every upstream scope is known.
        let mut scopes = vec![Scope::Shared; self.nodes.len()];
        let mut resolved: Vec<Option<Edge>> = vec![None; edges.len()];
        for &n in &order {
            let node = &self.nodes[n];
            let incoming: Vec<usize> = (0..edges.len()).filter(|&e| edges[e].1 == n).collect();

            let source_scope = |e: usize| {
                let (from, _, edge) = &edges[e];
                match &self.nodes[*from].role {
                    NodeRole::Iterable { port } if *port == edge.from_port => Scope::Branch,
                    _ => scopes[*from],
                }
            };

            let scope = match &node.role {
                NodeRole::Mapped { .. } => Scope::Subject,
                NodeRole::Join { over } => {
                    let over_index = index[over];
                    match self.nodes[over_index].role {
                        NodeRole::Mapped { .. } if iterable.is_some() => Scope::Branch,
                        _ => Scope::Shared,
                    }
                }
                NodeRole::Stage | NodeRole::Iterable { .. } => incoming
                    .iter()
                    .map(|&e| source_scope(e))
                    .max()
                    .unwrap_or(Scope::Shared),
            };

            // Only mapped stages may consume per-subject values without a join, and the
            // iterable itself must stay outside every fan-out.
            let limit = match node.role {
                NodeRole::Iterable { .. } => Scope::Shared,
                NodeRole::Stage => Scope::Branch,
                _ => Scope::Subject,
            };
            if scope > limit {
                let e = incoming.iter().copied().find(|&e| source_scope(e) > limit);
                if let Some(e) = e {
                    return Err(GraphError::UnjoinedFanOut {
                        from: self.nodes[edges[e].0].name.clone(),
                        to: node.name.clone(),
                    });
                }
            }

            // A join collects exactly the fan-out it names: branches of the iterable or
            // subjects of a mapped stage.
            let gathered_scope = match &node.role {
                NodeRole::Join { over } => match self.nodes[index[over]].role {
                    NodeRole::Iterable { .. } => Some(Scope::Branch),
                    _ => Some(Scope::Subject),
                },
                _ => None,
            };

            let mut saw_subject_source = false;
            for &e in &incoming {
                let (from, _, pending) = &edges[e];
                let from_node = &self.nodes[*from];
                let from_scope = source_scope(e);
                let iterated = match &node.role {
                    NodeRole::Mapped { iterate } => iterate.contains(&pending.to_port),
                    _ => false,
                };

                let binding = if iterated {
                    if from_scope == Scope::Subject {
                        return Err(GraphError::UnjoinedFanOut {
                            from: from_node.name.clone(),
                            to: node.name.clone(),
                        });
                    }
                    Binding::Element
                } else if from_scope > scope {
                    if gathered_scope != Some(from_scope) {
                        return Err(GraphError::UnjoinedFanOut {
                            from: from_node.name.clone(),
                            to: node.name.clone(),
                        });
                    }
                    Binding::Gather
                } else {
                    Binding::Direct
                };
                if from_scope == Scope::Subject && binding == Binding::Direct {
                    saw_subject_source = true;
                }

                let produced = output_spec(from_node, &pending.from_port).ok_or_else(|| {
                    GraphError::UnknownPort {
                        stage: from_node.name.clone(),
                        port: pending.from_port.clone(),
                    }
                })?;
                let consumed = input_spec(node, &pending.to_port).ok_or_else(|| GraphError::UnknownPort {
                    stage: node.name.clone(),
                    port: pending.to_port.clone(),
                })?;
                let produced_shape = match &from_node.role {
                    NodeRole::Iterable { port } if *port == pending.from_port => PortShape::Single,
                    _ => produced.shape,
                };
                let (expected_shape, consumed_ok) = match binding {
                    Binding::Direct => (consumed.shape, true),
                    Binding::Element => (PortShape::List, consumed.shape == PortShape::Single),
                    Binding::Gather => (PortShape::Single, consumed.shape == PortShape::List),
                };
                if produced.kind != consumed.kind || produced_shape != expected_shape || !consumed_ok {
                    let expected = PortSpec {
                        shape: expected_shape,
                        ..consumed
                    };
                    let found = PortSpec {
                        shape: produced_shape,
                        ..produced
                    };
                    return Err(GraphError::PortKindMismatch {
                        from: format!("{}.{}", from_node.name, pending.from_port),
                        to: format!("{}.{}", node.name, pending.to_port),
                        expected: expected.signature(),
                        found: found.signature(),
                    });
                }

                resolved[e] = Some(Edge {
                    from: *from,
                    from_port: pending.from_port.clone(),
                    to: n,
                    to_port: pending.to_port.clone(),
                    binding,
                    source_scope: from_scope,
                });
            }

            if let NodeRole::Mapped { iterate } = &node.role {
                if iterate.is_empty() && !saw_subject_source {
                    return Err(GraphError::NothingToIterate {
                        stage: node.name.clone(),
                    });
                }
            }
            scopes[n] = scope;
        }

        let edges: Vec<Edge> = resolved.into_iter().flatten().collect();
        let mut nodes: Vec<GraphNode> = self
            .nodes
            .into_iter()
            .zip(scopes)
            .map(|(node, scope)| GraphNode {
                name: node.name,
                stage: node.stage,
                role: node.role,
                scope,
                inputs: Vec::new(),
                outputs: Vec::new(),
            })
            .collect();
        for (e, edge) in edges.iter().enumerate() {
            nodes[edge.from].outputs.push(e);
            nodes[edge.to].inputs.push(e);
        }

        Ok(StageGraph {
            nodes,
            edges,
            order,
            iterable,
        })
    }
}

fn lookup(index: &HashMap<String, usize>, name: &str) -> Result<usize, GraphError> {
    index.get(name).copied().ok_or_else(|| GraphError::UnknownStage {
        stage: name.to_string(),
    })
}

fn output_spec(node: &PendingNode, port: &str) -> Option<PortSpec> {
    node.stage.outputs().into_iter().find(|spec| spec.name == port)
}

fn input_spec(node: &PendingNode, port: &str) -> Option<PortSpec> {
    node.stage.inputs().into_iter().find(|spec| spec.name == port)
}

/// Kahn's algorithm. Ties are broken by insertion order so the result is stable.
fn topological_order(
    nodes: &[PendingNode],
    edges: &[(usize, usize, PendingEdge)],
) -> Result<Vec<usize>, GraphError> {
    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (from, to, _) in edges {
        in_degree[*to] += 1;
        dependents[*from].push(*to);
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(n) = queue.pop_front() {
        order.push(n);
        for &d in &dependents[n] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                queue.push_back(d);
            }
        }
    }

    if order.len() != nodes.len() {
        let cycle = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].name.clone())
            .collect();
        return Err(GraphError::CyclicDependency { cycle });
    }
    Ok(order)
}
