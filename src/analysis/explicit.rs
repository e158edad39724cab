//! 显式状态空间枚举：带深度的 BFS 可达集，以及严格规则下的死锁搜索。
//!
//! 两条搜索使用的发生规则不同：
//! * [`explore_with_depth`] 使用一般规则 `M[p] ≥ Pre[p, t]`；
//! * [`explicit_deadlocks`] 使用严格的布尔规则（前集弧权重恰为 1 且库所有 token，
//!   发生后前集清零、后集置 1），仅适用于安全网。
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};

use crate::analysis::{AnalysisError, ensure_safe};
use crate::net::{Marking, Net, TransitionId};

/// 可达标识 → BFS 深度，按发现顺序迭代。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachableSet {
    depth: IndexMap<Marking, usize>,
}

impl ReachableSet {
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn markings(&self) -> impl Iterator<Item = &Marking> {
        self.depth.keys()
    }

    pub fn depth(&self, marking: &Marking) -> Option<usize> {
        self.depth.get(marking).copied()
    }

    /// Deepest BFS layer reached, `0` for an empty set.
    pub fn max_depth(&self) -> usize {
        self.depth.values().copied().max().unwrap_or(0)
    }

    pub fn contains(&self, marking: &Marking) -> bool {
        self.depth.contains_key(marking)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Marking, usize)> {
        self.depth.iter().map(|(marking, depth)| (marking, *depth))
    }

    /// Markings without any enabled transition under the general firing rule.
    pub fn dead_markings<'a>(&'a self, net: &'a Net) -> impl Iterator<Item = &'a Marking> + 'a {
        self.markings()
            .filter(move |marking| net.enabled_transitions(marking).is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Exploration {
    pub reachable: ReachableSet,
    /// 达到状态上限后仍有未探索的后继。
    pub truncated: bool,
    pub elapsed: Duration,
}

/// 广度优先可达集构造器，可选状态上限。
#[derive(Debug, Clone, Default)]
pub struct Explorer {
    state_limit: Option<usize>,
}

impl Explorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_limit(mut self, limit: Option<usize>) -> Self {
        self.state_limit = limit;
        self
    }

    pub fn explore(&self, net: &Net) -> Exploration {
        let start = Instant::now();
        let mut depth: IndexMap<Marking, usize> = IndexMap::new();
        let mut queue = VecDeque::new();
        let mut truncated = false;

        let initial = net.initial_marking();
        depth.insert(initial.clone(), 0);
        queue.push_back((initial, 0usize));

        'search: while let Some((current, level)) = queue.pop_front() {
            for transition in net.enabled_transitions(&current) {
                let next = match net.fire_transition(&current, transition) {
                    Ok(next) => next,
                    Err(err) => {
                        log::warn!("skipping {transition:?}: {err}");
                        continue;
                    }
                };
                if depth.contains_key(&next) {
                    continue;
                }
                if self.state_limit.is_some_and(|limit| depth.len() >= limit) {
                    truncated = true;
                    break 'search;
                }
                depth.insert(next.clone(), level + 1);
                queue.push_back((next, level + 1));
            }
        }

        let reachable = ReachableSet { depth };
        let elapsed = start.elapsed();
        if truncated {
            log::warn!(
                "net '{}': exploration truncated at {} states",
                net.name,
                reachable.len()
            );
        }
        log::info!(
            "net '{}': {} reachable markings, max depth {}, {:.3}s",
            net.name,
            reachable.len(),
            reachable.max_depth(),
            elapsed.as_secs_f64()
        );
        Exploration {
            reachable,
            truncated,
            elapsed,
        }
    }
}

/// 从初始标识出发的完整 BFS 可达集（一般发生规则，无状态上限）。
pub fn explore_with_depth(net: &Net) -> ReachableSet {
    Explorer::new().explore(net).reachable
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitDeadlocks {
    /// 按 BFS 处理顺序排列的死锁标识。
    pub witnesses: Vec<Marking>,
    /// 停止时已见过（入队或已处理）的不同标识数。
    pub visited: usize,
}

/// Strict boolean enabling: every preset arc has weight 1 and its place is marked.
pub(crate) fn strict_enabled(net: &Net, transition: TransitionId, marking: &Marking) -> bool {
    net.incidence()
        .pre(transition)
        .iter()
        .all(|&(place, weight)| weight == 1 && marking.tokens(place) >= 1)
}

/// Preset places go to 0, then postset places go to 1.
pub(crate) fn strict_fire(net: &Net, transition: TransitionId, marking: &Marking) -> Marking {
    let mut next = marking.clone();
    for &(place, _) in net.incidence().pre(transition) {
        *next.tokens_mut(place) = 0;
    }
    for &(place, _) in net.incidence().post(transition) {
        *next.tokens_mut(place) = 1;
    }
    next
}

/// 严格规则下的 BFS 死锁搜索，收集到 `limit` 个见证后立即停止。
///
/// `limit` 小于 1 时按 1 处理。
pub fn explicit_deadlocks(net: &Net, limit: usize) -> Result<ExplicitDeadlocks, AnalysisError> {
    ensure_safe(net)?;
    let limit = limit.max(1);

    let mut seen: IndexSet<Marking> = IndexSet::new();
    let mut queue = VecDeque::new();
    let mut witnesses = Vec::new();

    let initial = net.initial_marking();
    seen.insert(initial.clone());
    queue.push_back(initial);

    while let Some(current) = queue.pop_front() {
        let successors: Vec<Marking> = net
            .transitions
            .indices()
            .filter(|&transition| strict_enabled(net, transition, &current))
            .map(|transition| strict_fire(net, transition, &current))
            .collect();

        if successors.is_empty() {
            witnesses.push(current);
            if witnesses.len() >= limit {
                break;
            }
            continue;
        }
        for next in successors {
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }

    log::debug!(
        "net '{}': explicit deadlock search visited {} markings, {} witnesses",
        net.name,
        seen.len(),
        witnesses.len()
    );
    Ok(ExplicitDeadlocks {
        witnesses,
        visited: seen.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Transition};

    /// p1(1) --t1--> p2(0)
    fn hand_off() -> Net {
        let mut net = Net::named("hand-off");
        let p1 = net.add_place(Place::new("p1", 1));
        let p2 = net.add_place(Place::new("p2", 0));
        let t1 = net.add_transition(Transition::new("t1"));
        net.add_input_arc(p1, t1, 1);
        net.add_output_arc(p2, t1, 1);
        net
    }

    /// s(1) 经 ta/tb/tc 之一流向 a、b 或 c，三个终止标识
    fn fan_out() -> Net {
        let mut net = Net::named("fan-out");
        let s = net.add_place(Place::new("s", 1));
        for name in ["a", "b", "c"] {
            let sink = net.add_place(Place::new(name, 0));
            let t = net.add_transition(Transition::new(format!("t{name}")));
            net.add_input_arc(s, t, 1);
            net.add_output_arc(sink, t, 1);
        }
        net
    }

    fn cycle(places: usize) -> Net {
        let mut net = Net::named("ring");
        let ids: Vec<_> = (0..places)
            .map(|i| net.add_place(Place::new(format!("q{i}"), u64::from(i == 0))))
            .collect();
        for i in 0..places {
            let t = net.add_transition(Transition::new(format!("step{i}")));
            net.add_input_arc(ids[i], t, 1);
            net.add_output_arc(ids[(i + 1) % places], t, 1);
        }
        net
    }

    #[test]
    fn depths_follow_bfs_layers() {
        let net = hand_off();
        let reachable = explore_with_depth(&net);
        assert_eq!(reachable.len(), 2);
        assert_eq!(reachable.depth(&Marking::from(vec![1, 0])), Some(0));
        assert_eq!(reachable.depth(&Marking::from(vec![0, 1])), Some(1));
        assert_eq!(reachable.max_depth(), 1);
        let order: Vec<_> = reachable.markings().cloned().collect();
        assert_eq!(order[0], net.initial_marking());
    }

    #[test]
    fn explorer_respects_state_limit() {
        let net = cycle(5);
        let exploration = Explorer::new().with_state_limit(Some(3)).explore(&net);
        assert!(exploration.truncated);
        assert_eq!(exploration.reachable.len(), 3);

        let full = Explorer::new().explore(&net);
        assert!(!full.truncated);
        assert_eq!(full.reachable.len(), 5);
    }

    #[test]
    fn strict_search_finds_terminal_marking() {
        let net = hand_off();
        let result = explicit_deadlocks(&net, 10).unwrap();
        assert_eq!(result.witnesses, vec![Marking::from(vec![0, 1])]);
        assert_eq!(result.visited, 2);
    }

    #[test]
    fn live_cycle_has_no_deadlock() {
        let result = explicit_deadlocks(&cycle(4), 10).unwrap();
        assert!(result.witnesses.is_empty());
        assert_eq!(result.visited, 4);
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        let result = explicit_deadlocks(&hand_off(), 0).unwrap();
        assert_eq!(result.witnesses.len(), 1);
    }

    #[test]
    fn search_stops_at_witness_limit() {
        let net = fan_out();
        let capped = explicit_deadlocks(&net, 1).unwrap();
        assert_eq!(capped.witnesses, vec![Marking::from(vec![0, 1, 0, 0])]);
        assert_eq!(capped.visited, 4);

        let all = explicit_deadlocks(&net, 10).unwrap();
        assert_eq!(all.witnesses.len(), 3);
        assert_eq!(all.visited, 4);
    }

    #[test]
    fn weighted_arc_is_rejected() {
        let mut net = hand_off();
        let p1 = net.place_by_name("p1").unwrap();
        let t = net.add_transition(Transition::new("bulk"));
        net.add_input_arc(p1, t, 2);
        assert!(matches!(
            explicit_deadlocks(&net, 5),
            Err(AnalysisError::UnsafeNet { weight: 2, .. })
        ));
    }
}
