//! A generic directed graph with forward and reverse adjacency.
//!
//! The same structure serves two purposes: synthesizing random causal
//! histories for the fuzz harness, and holding the precedence relation inside
//! the [`PartialEffectRelation`](crate::oracle::PartialEffectRelation) oracle.
//!
//! Complexity:
//! - add_node / add_edge / remove_edge / has_edge: O(1)
//! - successors / predecessors: O(V + E), lazily
//! - transitive_reduce: O(V * (V + E))

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::random::Random;

/// Probability of an edge between a node and the node immediately before it.
const ADJACENT_EDGE_PROBABILITY: f64 = 0.5;

/// Probability of an edge from any earlier node that is not yet a transitive
/// predecessor.
const DISTANT_EDGE_PROBABILITY: f64 = 0.25;

type Adjacency<N> = FxHashMap<N, FxHashSet<N>>;

/// A directed graph over nodes of type `N`.
///
/// Nodes are kept in insertion order. Edges are tracked twice, once per
/// direction, and [`Digraph::has_edge`] checks that both agree.
#[derive(Clone, Debug)]
pub struct Digraph<N> {
    order: Vec<N>,
    nodes: FxHashSet<N>,
    forward: Adjacency<N>,
    reverse: Adjacency<N>,
}

impl<N: Clone + Eq + Hash> Digraph<N> {
    /// Create an empty graph.
    pub fn new() -> Digraph<N> {
        return Digraph {
            order: Vec::new(),
            nodes: FxHashSet::default(),
            forward: FxHashMap::default(),
            reverse: FxHashMap::default(),
        };
    }

    /// Add a node. Adding a node twice is a no-op.
    pub fn add_node(&mut self, node: N) {
        if self.nodes.insert(node.clone()) {
            self.order.push(node);
        }
    }

    /// Whether the node has been added.
    pub fn contains(&self, node: &N) -> bool {
        return self.nodes.contains(node);
    }

    /// All nodes, in the order they were added.
    pub fn nodes(&self) -> &[N] {
        return &self.order;
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        return self.order.len();
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        return self.order.is_empty();
    }

    fn validate(&self, src: &N, dest: &N) -> Result<()> {
        if !self.nodes.contains(src) {
            return Err(Error::MissingNode { end: "src" });
        }
        if !self.nodes.contains(dest) {
            return Err(Error::MissingNode { end: "dest" });
        }
        return Ok(());
    }

    /// A graph holding `src`, `dest` and the edge between them.
    pub fn from_edge(src: N, dest: N) -> Digraph<N> {
        let mut digraph = Digraph::new();
        digraph.add_node(src.clone());
        digraph.add_node(dest.clone());
        digraph.link(src, dest);
        return digraph;
    }

    fn link(&mut self, src: N, dest: N) {
        self.forward.entry(src.clone()).or_default().insert(dest.clone());
        self.reverse.entry(dest).or_default().insert(src);
    }

    /// Add an edge. Both endpoints must already be nodes.
    pub fn add_edge(&mut self, src: N, dest: N) -> Result<()> {
        self.validate(&src, &dest)?;
        self.link(src, dest);
        return Ok(());
    }

    /// Remove an edge. Removing an absent edge is a no-op.
    pub fn remove_edge(&mut self, src: &N, dest: &N) -> Result<()> {
        self.validate(src, dest)?;
        if let Some(successors) = self.forward.get_mut(src) {
            successors.remove(dest);
            if successors.is_empty() {
                self.forward.remove(src);
            }
        }
        if let Some(predecessors) = self.reverse.get_mut(dest) {
            predecessors.remove(src);
            if predecessors.is_empty() {
                self.reverse.remove(dest);
            }
        }
        return Ok(());
    }

    /// Whether the edge `src -> dest` exists.
    ///
    /// Fails if forward and reverse adjacency disagree.
    pub fn has_edge(&self, src: &N, dest: &N) -> Result<bool> {
        self.validate(src, dest)?;
        let has_forward = self.forward.get(src).is_some_and(|s| s.contains(dest));
        let has_reverse = self.reverse.get(dest).is_some_and(|s| s.contains(src));
        if has_forward && !has_reverse {
            return Err(Error::AdjacencyMismatch { tracked: "forward" });
        }
        if !has_forward && has_reverse {
            return Err(Error::AdjacencyMismatch { tracked: "reverse" });
        }
        return Ok(has_forward);
    }

    /// Nodes reachable from `node` by one forward edge.
    pub fn immediate_successors(&self, node: &N) -> impl Iterator<Item = &N> + '_ {
        return self.forward.get(node).into_iter().flatten();
    }

    /// Nodes reachable from `node` by one reverse edge.
    pub fn immediate_predecessors(&self, node: &N) -> impl Iterator<Item = &N> + '_ {
        return self.reverse.get(node).into_iter().flatten();
    }

    /// Number of outgoing edges.
    pub fn outdegree(&self, node: &N) -> usize {
        return self.forward.get(node).map_or(0, |s| s.len());
    }

    /// Number of incoming edges.
    pub fn indegree(&self, node: &N) -> usize {
        return self.reverse.get(node).map_or(0, |s| s.len());
    }

    /// Every node reachable from `node` through one or more forward edges.
    ///
    /// The iteration is lazy and restartable. A visited set prevents
    /// revisiting nodes, so cycles terminate, but the order is not
    /// topological.
    pub fn successors(&self, node: &N) -> Reachable<'_, N> {
        return Reachable::new(&self.forward, node);
    }

    /// Every node that reaches `node` through one or more forward edges.
    pub fn predecessors(&self, node: &N) -> Reachable<'_, N> {
        return Reachable::new(&self.reverse, node);
    }

    /// Nodes with no outgoing edges, in insertion order.
    pub fn nodes_with_outdegree_zero(&self) -> Vec<N> {
        return self
            .order
            .iter()
            .filter(|n| self.outdegree(n) == 0)
            .cloned()
            .collect();
    }

    /// Remove every edge `u -> v` for which another path `u -> ... -> v`
    /// exists.
    ///
    /// Only meaningful on acyclic graphs.
    pub fn transitive_reduce(&mut self) {
        for node in self.order.clone() {
            let immediate: FxHashSet<N> = self.immediate_successors(&node).cloned().collect();
            let mut redundant: FxHashSet<N> = FxHashSet::default();
            for successor in &immediate {
                for transitive in self.successors(successor) {
                    if immediate.contains(transitive) {
                        redundant.insert(transitive.clone());
                    }
                }
            }
            for dest in redundant {
                if let Some(successors) = self.forward.get_mut(&node) {
                    successors.remove(&dest);
                    if successors.is_empty() {
                        self.forward.remove(&node);
                    }
                }
                if let Some(predecessors) = self.reverse.get_mut(&dest) {
                    predecessors.remove(&node);
                    if predecessors.is_empty() {
                        self.reverse.remove(&dest);
                    }
                }
            }
        }
    }
}

impl<N: Clone + Eq + Hash> Default for Digraph<N> {
    fn default() -> Self {
        return Digraph::new();
    }
}

/// Lazy traversal over one direction of a [`Digraph`].
pub struct Reachable<'a, N> {
    edges: &'a Adjacency<N>,
    visited: FxHashSet<&'a N>,
    to_visit: SmallVec<[&'a N; 8]>,
}

impl<'a, N: Eq + Hash> Reachable<'a, N> {
    fn new(edges: &'a Adjacency<N>, start: &N) -> Reachable<'a, N> {
        let mut reachable = Reachable {
            edges,
            visited: FxHashSet::default(),
            to_visit: SmallVec::new(),
        };
        // The start node counts as visited so it is never yielded, even when
        // a cycle leads back to it.
        if let Some((key, _)) = edges.get_key_value(start) {
            reachable.visited.insert(key);
            reachable.push_unvisited(key);
        }
        return reachable;
    }

    fn push_unvisited(&mut self, node: &N) {
        if let Some(next) = self.edges.get(node) {
            for successor in next {
                if self.visited.insert(successor) {
                    self.to_visit.push(successor);
                }
            }
        }
    }
}

impl<'a, N: Eq + Hash> Iterator for Reachable<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<&'a N> {
        let current = self.to_visit.pop()?;
        self.push_unvisited(current);
        return Some(current);
    }
}

/// Build a random acyclic graph over `sequence`, where every edge `u -> v`
/// has `u` before `v` in the input.
///
/// Each node gets an edge from its immediate predecessor with probability
/// one half, and from any other earlier node that does not already reach it
/// with probability one quarter. The result is not transitively reduced.
pub fn random_minimum_digraph_from_sequence<N: Clone + Eq + Hash>(
    sequence: &[N],
    random: &mut Random,
) -> Result<Digraph<N>> {
    let mut digraph = Digraph::new();
    for node in sequence {
        digraph.add_node(node.clone());
    }
    for (j, node) in sequence.iter().enumerate() {
        for i in (0..j).rev() {
            let candidate = &sequence[i];
            let probability = if i + 1 == j {
                ADJACENT_EDGE_PROBABILITY
            } else {
                DISTANT_EDGE_PROBABILITY
            };
            // Draw unconditionally so the stream consumed per node is fixed.
            let draw = random.double();
            if draw >= probability {
                continue;
            }
            let already_reaches = digraph.predecessors(node).any(|p| p == candidate);
            if !already_reaches {
                digraph.add_edge(candidate.clone(), node.clone())?;
            }
        }
    }
    return Ok(digraph);
}
