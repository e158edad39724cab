//! 符号死锁求解：`Dead = Reach ∧ ¬∨_t enabled(t)`，并枚举若干完整赋值作为见证。
use num_bigint::BigUint;

use crate::analysis::AnalysisError;
use crate::net::{Marking, Net};
use crate::symbolic::encoding::SymbolicNet;

#[derive(Debug, Clone)]
pub struct SymbolicDeadlocks {
    /// 当前态变量上按库所顺序字典序枚举的死锁标识（0 先于 1）.
    pub witnesses: Vec<Marking>,
    pub reachable_states: Option<BigUint>,
    pub deadlock_states: Option<BigUint>,
    /// 可达集 BDD 的节点数.
    pub node_count: usize,
    pub iterations: usize,
}

pub struct SymbolicDeadlockSolver {
    symbolic: SymbolicNet,
}

impl SymbolicDeadlockSolver {
    pub fn new(net: &Net) -> Result<Self, AnalysisError> {
        Ok(Self {
            symbolic: SymbolicNet::new(net)?,
        })
    }

    /// `sample_limit` 小于 1 时按 1 处理.
    pub fn solve(mut self, sample_limit: usize) -> SymbolicDeadlocks {
        let fixed = self.symbolic.reachable();
        let dead = self.symbolic.deadlocks(fixed.reach);
        let witnesses = self.symbolic.markings(dead, sample_limit.max(1));
        SymbolicDeadlocks {
            witnesses,
            reachable_states: self.symbolic.state_count(fixed.reach),
            deadlock_states: self.symbolic.state_count(dead),
            node_count: self.symbolic.manager().node_count(fixed.reach),
            iterations: fixed.iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Transition};

    /// Two philosophers each grabbing the left fork first.
    fn philosophers() -> Net {
        let mut net = Net::named("philosophers");
        let forks: Vec<_> = (0..2)
            .map(|i| net.add_place(Place::new(format!("fork{i}"), 1)))
            .collect();
        for i in 0..2 {
            let thinking = net.add_place(Place::new(format!("think{i}"), 1));
            let holding = net.add_place(Place::new(format!("hold{i}"), 0));
            let eating = net.add_place(Place::new(format!("eat{i}"), 0));
            let left = forks[i];
            let right = forks[(i + 1) % 2];

            let take_left = net.add_transition(Transition::new(format!("take_left{i}")));
            net.add_input_arc(thinking, take_left, 1);
            net.add_input_arc(left, take_left, 1);
            net.add_output_arc(holding, take_left, 1);

            let take_right = net.add_transition(Transition::new(format!("take_right{i}")));
            net.add_input_arc(holding, take_right, 1);
            net.add_input_arc(right, take_right, 1);
            net.add_output_arc(eating, take_right, 1);

            let release = net.add_transition(Transition::new(format!("release{i}")));
            net.add_input_arc(eating, release, 1);
            net.add_output_arc(thinking, release, 1);
            net.add_output_arc(left, release, 1);
            net.add_output_arc(right, release, 1);
        }
        net
    }

    #[test]
    fn finds_the_circular_wait() {
        let net = philosophers();
        let result = SymbolicDeadlockSolver::new(&net).unwrap().solve(10);
        assert_eq!(result.witnesses.len(), 1);
        assert_eq!(result.deadlock_states, Some(BigUint::from(1u32)));

        let dead = &result.witnesses[0];
        let hold0 = net.place_by_name("hold0").unwrap();
        let hold1 = net.place_by_name("hold1").unwrap();
        assert_eq!(dead.tokens(hold0), 1);
        assert_eq!(dead.tokens(hold1), 1);
        assert_eq!(dead.total_tokens(), 2);
        assert!(net.enabled_transitions(dead).is_empty());
    }

    #[test]
    fn reachable_count_matches_enumeration() {
        let net = philosophers();
        let explicit = crate::analysis::explore_with_depth(&net);
        let result = SymbolicDeadlockSolver::new(&net).unwrap().solve(1);
        assert_eq!(
            result.reachable_states,
            Some(BigUint::from(explicit.len()))
        );
    }

    #[test]
    fn witness_limit_caps_extraction_not_count() {
        let mut net = Net::named("fan-out");
        let s = net.add_place(Place::new("s", 1));
        for name in ["a", "b", "c"] {
            let sink = net.add_place(Place::new(name, 0));
            let t = net.add_transition(Transition::new(format!("t{name}")));
            net.add_input_arc(s, t, 1);
            net.add_output_arc(sink, t, 1);
        }

        let result = SymbolicDeadlockSolver::new(&net).unwrap().solve(2);
        assert_eq!(result.witnesses.len(), 2);
        assert_eq!(result.deadlock_states, Some(BigUint::from(3u32)));
        assert_eq!(result.reachable_states, Some(BigUint::from(4u32)));
        for dead in &result.witnesses {
            assert_eq!(dead.total_tokens(), 1);
            assert!(net.enabled_transitions(dead).is_empty());
        }
    }
}
