//! 可达图：节点为标识，边为一次迁移发生，附带 token 变化与参与弧，可导出 DOT。
use std::collections::VecDeque;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::Path;

use petgraph::algo::astar;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::{EdgeReference, StableGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::analysis::ArcKind;
use crate::net::{Idx, Marking, Net, PlaceId, TransitionId, Weight};

#[derive(Debug, Clone, Serialize)]
pub struct TokenChange {
    pub place: PlaceId,
    pub name: String,
    pub before: Weight,
    pub after: Weight,
}

impl TokenChange {
    pub fn delta(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcSnapshot {
    pub place: PlaceId,
    pub name: String,
    pub kind: ArcKind,
    pub weight: Weight,
}

/// marking 保留完整标识, enabled 仅用于可视化.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub index: usize,
    pub marking: Marking,
    pub enabled: Vec<TransitionId>,
}

#[derive(Debug, Clone)]
pub struct StateEdge {
    pub transition: TransitionId,
    pub name: String,
    pub changes: Vec<TokenChange>,
    pub arcs: Vec<ArcSnapshot>,
}

impl StateEdge {
    fn new(net: &Net, transition: TransitionId, before: &Marking, after: &Marking) -> Self {
        let changes = net
            .places
            .iter_enumerated()
            .filter(|(place, _)| before.tokens(*place) != after.tokens(*place))
            .map(|(place, info)| TokenChange {
                place,
                name: info.name.clone(),
                before: before.tokens(place),
                after: after.tokens(place),
            })
            .collect();

        let incidence = net.incidence();
        let inputs = incidence
            .pre(transition)
            .iter()
            .map(|&(place, weight)| (place, weight, ArcKind::Input));
        let outputs = incidence
            .post(transition)
            .iter()
            .map(|&(place, weight)| (place, weight, ArcKind::Output));
        let arcs = inputs
            .chain(outputs)
            .map(|(place, weight, kind)| ArcSnapshot {
                place,
                name: net.places[place].name.clone(),
                kind,
                weight,
            })
            .collect();

        Self {
            transition,
            name: net.transitions[transition].name.clone(),
            changes,
            arcs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateGraphStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlock_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StateGraphConfig {
    /// 最多探索的状态数量.None表示不设上限.
    pub state_limit: Option<usize>,
    /// DOT 标签中是否保留 token 为 0 的库所.
    pub include_zero_tokens: bool,
}

#[derive(Debug)]
pub struct StateGraph {
    pub graph: StableGraph<StateNode, StateEdge>,
    pub initial: NodeIndex,
    pub deadlocks: FxHashSet<NodeIndex>,
    pub truncated: bool,
    markings: FxHashMap<Marking, NodeIndex>,
    place_names: Vec<String>,
    transition_names: Vec<String>,
    include_zero_tokens: bool,
}

impl StateGraph {
    pub fn from_net(net: &Net) -> Self {
        Self::with_config(net, StateGraphConfig::default())
    }

    pub fn with_config(net: &Net, config: StateGraphConfig) -> Self {
        let mut graph = StableGraph::new();
        let mut markings: FxHashMap<Marking, NodeIndex> = FxHashMap::default();
        let mut queue = VecDeque::new();
        let mut deadlocks = FxHashSet::default();
        let mut truncated = false;

        let initial_marking = net.initial_marking();
        let initial = graph.add_node(StateNode {
            index: 0,
            marking: initial_marking.clone(),
            enabled: Vec::new(),
        });
        markings.insert(initial_marking, initial);
        queue.push_back(initial);

        while let Some(state) = queue.pop_front() {
            let current = graph[state].marking.clone();
            let enabled = net.enabled_transitions(&current);
            graph[state].enabled = enabled.clone();

            if enabled.is_empty() {
                deadlocks.insert(state);
                continue;
            }

            for transition in enabled {
                let next = match net.fire_transition(&current, transition) {
                    Ok(next) => next,
                    Err(err) => {
                        log::warn!("state s{}: {err}", graph[state].index);
                        continue;
                    }
                };
                let target = match markings.entry(next.clone()) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        if config
                            .state_limit
                            .is_some_and(|limit| graph.node_count() >= limit)
                        {
                            truncated = true;
                            continue;
                        }
                        let index = graph.add_node(StateNode {
                            index: graph.node_count(),
                            marking: next.clone(),
                            enabled: Vec::new(),
                        });
                        entry.insert(index);
                        queue.push_back(index);
                        index
                    }
                };
                let edge = StateEdge::new(net, transition, &current, &next);
                graph.add_edge(state, target, edge);
            }
        }

        Self {
            graph,
            initial,
            deadlocks,
            truncated,
            markings,
            place_names: net.places.iter().map(|p| p.name.clone()).collect(),
            transition_names: net.transitions.iter().map(|t| t.name.clone()).collect(),
            include_zero_tokens: config.include_zero_tokens,
        }
    }

    pub fn stats(&self) -> StateGraphStats {
        StateGraphStats {
            state_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            deadlock_count: self.deadlocks.len(),
            truncated: self.truncated,
        }
    }

    pub fn node(&self, index: NodeIndex) -> &StateNode {
        &self.graph[index]
    }

    /// 死锁标识，按节点编号排序.
    pub fn deadlock_markings(&self) -> Vec<&Marking> {
        let mut nodes: Vec<_> = self.deadlocks.iter().map(|&idx| &self.graph[idx]).collect();
        nodes.sort_by_key(|node| node.index);
        nodes.into_iter().map(|node| &node.marking).collect()
    }

    /// 从初始标识到 `marking` 的最短发生序列；不可达时返回 `None`.
    pub fn trace_to(&self, marking: &Marking) -> Option<Vec<TransitionId>> {
        let goal = *self.markings.get(marking)?;
        let (_, path) = astar(&self.graph, self.initial, |n| n == goal, |_| 1usize, |_| 0)?;
        path.windows(2)
            .map(|pair| {
                self.graph
                    .find_edge(pair[0], pair[1])
                    .map(|edge| self.graph[edge].transition)
            })
            .collect()
    }

    pub fn dot(&self) -> String {
        fn escape(s: &str) -> String {
            s.replace('\\', "\\\\").replace('"', "\\\"")
        }

        let edge_attr = |_: &StableGraph<StateNode, StateEdge>,
                         edge: EdgeReference<'_, StateEdge>|
         -> String { format!("label=\"{}\"", escape(&edge.weight().name)) };

        let node_attr = |_: &StableGraph<StateNode, StateEdge>,
                         (idx, node): (NodeIndex, &StateNode)|
         -> String {
            let marking = node
                .marking
                .iter()
                .filter(|(_, tokens)| self.include_zero_tokens || **tokens > 0)
                .map(|(place, tokens)| {
                    let name = self
                        .place_names
                        .get(place.index())
                        .map(String::as_str)
                        .unwrap_or("?");
                    format!("{}:{}", name, tokens)
                })
                .collect::<Vec<_>>()
                .join(", ");
            let enabled = node
                .enabled
                .iter()
                .filter_map(|t| self.transition_names.get(t.index()))
                .map(|name| escape(name))
                .collect::<Vec<_>>();
            let mut label = format!("s{}\\nmarking: {}", node.index, escape(&marking));
            if !enabled.is_empty() {
                label.push_str(&format!("\\nenabled: {}", enabled.join(", ")));
            }
            if self.deadlocks.contains(&idx) {
                format!("label=\"{}\", color=red, penwidth=2", label)
            } else {
                format!("label=\"{}\"", label)
            }
        };

        format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::EdgeNoLabel, Config::NodeNoLabel],
                &edge_attr,
                &node_attr
            )
        )
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.dot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Transition};
    use petgraph::visit::IntoEdgeReferences;

    /// a -> {left | right} -> done, plus a stuck branch from left.
    fn branching_net() -> Net {
        let mut net = Net::named("branch");
        let a = net.add_place(Place::new("a", 1));
        let b = net.add_place(Place::new("b", 0));
        let c = net.add_place(Place::new("c", 0));
        let done = net.add_place(Place::new("done", 0));
        let left = net.add_transition(Transition::new("left"));
        let right = net.add_transition(Transition::new("right"));
        let finish = net.add_transition(Transition::new("finish"));
        net.add_input_arc(a, left, 1);
        net.add_output_arc(b, left, 1);
        net.add_input_arc(a, right, 1);
        net.add_output_arc(c, right, 1);
        net.add_input_arc(c, finish, 1);
        net.add_output_arc(done, finish, 1);
        net
    }

    #[test]
    fn state_limit_truncates_graph() {
        let net = branching_net();
        let config = StateGraphConfig {
            state_limit: Some(1),
            include_zero_tokens: false,
        };
        let state_graph = StateGraph::with_config(&net, config);
        assert!(state_graph.truncated);
        assert_eq!(state_graph.graph.node_count(), 1);
    }

    #[test]
    fn deadlocks_and_traces() {
        let net = branching_net();
        let state_graph = StateGraph::from_net(&net);
        let stats = state_graph.stats();
        assert_eq!(stats.state_count, 4);
        assert_eq!(stats.edge_count, 3);
        assert_eq!(stats.deadlock_count, 2);

        let done = Marking::from(vec![0, 0, 0, 1]);
        let trace = state_graph.trace_to(&done).unwrap();
        let names: Vec<_> = trace
            .iter()
            .map(|t| net.transitions[*t].name.as_str())
            .collect();
        assert_eq!(names, vec!["right", "finish"]);
        assert_eq!(state_graph.trace_to(&net.initial_marking()), Some(vec![]));
        assert_eq!(state_graph.trace_to(&Marking::from(vec![1, 1, 1, 1])), None);
    }

    #[test]
    fn edges_record_token_changes() {
        let net = branching_net();
        let state_graph = StateGraph::from_net(&net);
        let edge = state_graph
            .graph
            .edge_references()
            .find(|edge| edge.weight().name == "left")
            .unwrap();
        let changes = &edge.weight().changes;
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| c.name == "a" && c.delta() == -1));
        assert_eq!(edge.weight().arcs.len(), 2);
    }

    #[test]
    fn dot_marks_deadlocks() {
        let state_graph = StateGraph::from_net(&branching_net());
        let dot = state_graph.dot();
        assert!(dot.contains("digraph"));
        assert!(dot.contains("color=red"));
        assert!(dot.contains("label=\"finish\""));
    }
}
