//! Dependency graph of a sealed registry.
//!
//! The graph is an arena of nodes, one per binding, in registration order. Edges follow the
//! declared dependencies of each binding. A depth-first traversal marks nodes as in progress
//! while their dependencies are visited: reaching an in-progress node reveals a cycle, and the
//! post-order of the traversal is a valid instantiation order.

use std::collections::HashMap;

use tracing::trace;

use crate::binding::Binding;
use crate::error::{Result, WiringError};
use crate::key::TypeKey;

/// Index of a node in the graph arena
pub(crate) type NodeId = usize;

struct Node {
    binding: Binding,
    /// Resolved dependency edges, `None` for an unbound key
    edges: Vec<Option<NodeId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

pub(crate) struct ResolutionGraph {
    nodes: Vec<Node>,
    index: HashMap<TypeKey, NodeId>,
}

impl ResolutionGraph {
    /// Build the graph from bindings with unique keys, in registration order
    pub(crate) fn new(bindings: Vec<Binding>) -> Self {
        let index: HashMap<TypeKey, NodeId> = bindings
            .iter()
            .enumerate()
            .map(|(id, b)| (b.key().clone(), id))
            .collect();
        let nodes = bindings
            .into_iter()
            .map(|binding| {
                let edges = binding
                    .dependencies()
                    .iter()
                    .map(|dep| index.get(dep).copied())
                    .collect();
                Node { binding, edges }
            })
            .collect();
        Self { nodes, index }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn lookup(&self, key: &TypeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub(crate) fn binding(&self, node: NodeId) -> &Binding {
        &self.nodes[node].binding
    }

    /// Dependencies of a node which belongs to a validated plan
    pub(crate) fn edges(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node].edges.iter().flatten().copied()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.nodes.iter().map(|n| n.binding.key())
    }

    /// Check the whole graph for unbound dependencies and cycles.
    ///
    /// Roots are visited in registration order and dependencies in declaration order:
    /// the reported error is the first one found along this traversal.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut walk = Walk::new(self);
        for node in 0..self.nodes.len() {
            walk.visit(node)?;
        }
        trace!(nodes = self.nodes.len(), "Validated dependency graph");
        Ok(())
    }

    /// Compute the instantiation order of the transitive closure of a node.
    ///
    /// Every dependency strictly precedes its dependents, the requested node comes last.
    pub(crate) fn plan(&self, root: NodeId) -> Result<Vec<NodeId>> {
        let mut walk = Walk::new(self);
        walk.visit(root)?;
        Ok(walk.order)
    }

    fn unbound(&self, node: NodeId, dep: usize) -> WiringError {
        let binding = &self.nodes[node].binding;
        WiringError::UnboundDependency {
            key: binding.dependencies()[dep].clone(),
            requested_by: Some(binding.key().clone()),
            registered: self.keys().cloned().collect(),
        }
    }
}

/// State of a depth-first traversal
struct Walk<'a> {
    graph: &'a ResolutionGraph,
    marks: Vec<Mark>,
    /// Nodes currently in progress, from the root of the traversal
    stack: Vec<NodeId>,
    /// Post-order of the done nodes
    order: Vec<NodeId>,
}

impl<'a> Walk<'a> {
    fn new(graph: &'a ResolutionGraph) -> Self {
        Self {
            graph,
            marks: vec![Mark::Unvisited; graph.nodes.len()],
            stack: Vec::new(),
            order: Vec::new(),
        }
    }

    fn visit(&mut self, node: NodeId) -> Result<()> {
        match self.marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(self.cycle(node)),
            Mark::Unvisited => (),
        }

        self.marks[node] = Mark::InProgress;
        self.stack.push(node);
        let graph = self.graph;
        for (pos, edge) in graph.nodes[node].edges.iter().enumerate() {
            match edge {
                Some(dep) => self.visit(*dep)?,
                None => return Err(graph.unbound(node, pos)),
            }
        }
        self.stack.pop();
        self.marks[node] = Mark::Done;
        self.order.push(node);
        Ok(())
    }

    /// Path from the first occurrence of the node on the stack back to itself
    fn cycle(&self, node: NodeId) -> WiringError {
        let start = self.stack.iter().position(|n| *n == node).unwrap_or(0);
        let path = self.stack[start..]
            .iter()
            .chain(std::iter::once(&node))
            .map(|n| self.graph.nodes[*n].binding.key().clone())
            .collect();
        WiringError::CyclicDependency { path }
    }
}
