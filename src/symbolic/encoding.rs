//! 安全网的布尔编码：每个库所对应一个当前态变量与一个次态变量（交错排列）。
//!
//! * `cur(p_i) = 2i`, `next(p_i) = 2i + 1`;
//! * `enabled(t) = ∧_{p ∈ •t} cur(p)`;
//! * `R_t = enabled(t) ∧ frame(t)`，其中 frame 对每个库所给出：只消耗 → `¬next(p)`，
//!   只产生 → `next(p)`，其余 → `next(p) ↔ cur(p)`。
use std::time::{Duration, Instant};

use num_bigint::BigUint;
use rustc_hash::FxHashMap;

use crate::analysis::{AnalysisError, ensure_safe};
use crate::net::{IndexVec, Marking, Net, PlaceId, TransitionId};
use crate::symbolic::bdd::{BddManager, BddRef, VarSet};

pub fn cur_var(place: usize) -> u32 {
    (2 * place) as u32
}

pub fn next_var(place: usize) -> u32 {
    (2 * place + 1) as u32
}

/// 不动点迭代的结果.
#[derive(Debug, Clone, Copy)]
pub struct FixedPoint {
    pub reach: BddRef,
    /// 前沿非空的轮数（即 BFS 层数）.
    pub iterations: usize,
    pub elapsed: Duration,
}

/// 一个网在单次分析中的符号表示，独占其 [`BddManager`].
pub struct SymbolicNet {
    manager: BddManager,
    places: usize,
    cur_vars: Vec<u32>,
    cur_set: VarSet,
    next_to_cur: FxHashMap<u32, u32>,
    enabled: IndexVec<TransitionId, BddRef>,
    relations: IndexVec<TransitionId, BddRef>,
    any_enabled: BddRef,
    initial: BddRef,
}

impl SymbolicNet {
    pub fn new(net: &Net) -> Result<Self, AnalysisError> {
        ensure_safe(net)?;
        let initial_marking = net.initial_marking();
        if let Some((place, &tokens)) = initial_marking.iter().find(|(_, tokens)| **tokens > 1) {
            return Err(AnalysisError::NonBooleanMarking {
                place: net.places[place].name.clone(),
                tokens,
            });
        }

        let places = net.places_len();
        let mut manager = BddManager::new();
        let cur_vars: Vec<u32> = (0..places).map(cur_var).collect();
        let cur_set = manager.var_set(cur_vars.iter().copied());
        let next_to_cur = (0..places).map(|i| (next_var(i), cur_var(i))).collect();

        let incidence = net.incidence();
        let mut enabled = IndexVec::with_capacity(net.transitions_len());
        let mut relations = IndexVec::with_capacity(net.transitions_len());
        for transition in net.transitions.indices() {
            let pre = incidence.pre(transition);
            let post = incidence.post(transition);

            let mut guard = BddRef::TRUE;
            for &(place, _) in pre.iter().rev() {
                let var = manager.mk_var(cur_var(place.raw() as usize));
                guard = manager.apply_and(var, guard);
            }

            // Conjoin bottom-up so each step only adds nodes above the current root.
            let mut frame = BddRef::TRUE;
            for i in (0..places).rev() {
                let place = PlaceId::new(i as u32);
                let consumed = pre.iter().any(|&(p, _)| p == place);
                let produced = post.iter().any(|&(p, _)| p == place);
                let constraint = match (consumed, produced) {
                    (true, false) => manager.mk_nvar(next_var(i)),
                    (false, true) => manager.mk_var(next_var(i)),
                    _ => {
                        let cur = manager.mk_var(cur_var(i));
                        let next = manager.mk_var(next_var(i));
                        manager.apply_eq(cur, next)
                    }
                };
                frame = manager.apply_and(constraint, frame);
            }

            let relation = manager.apply_and(guard, frame);
            enabled.push(guard);
            relations.push(relation);
        }

        let mut any_enabled = BddRef::FALSE;
        for &guard in enabled.iter() {
            any_enabled = manager.apply_or(any_enabled, guard);
        }

        let mut symbolic = Self {
            manager,
            places,
            cur_vars,
            cur_set,
            next_to_cur,
            enabled,
            relations,
            any_enabled,
            initial: BddRef::FALSE,
        };
        symbolic.initial = symbolic.encode_marking(&initial_marking)?;
        log::debug!(
            "net '{}': symbolic encoding with {} variables, {} relation nodes",
            net.name,
            2 * places,
            symbolic.manager.len()
        );
        Ok(symbolic)
    }

    pub fn manager(&self) -> &BddManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut BddManager {
        &mut self.manager
    }

    pub fn places(&self) -> usize {
        self.places
    }

    pub fn cur_vars(&self) -> &[u32] {
        &self.cur_vars
    }

    pub fn initial(&self) -> BddRef {
        self.initial
    }

    pub fn any_enabled(&self) -> BddRef {
        self.any_enabled
    }

    pub fn enabled(&self, transition: TransitionId) -> BddRef {
        self.enabled[transition]
    }

    pub fn relation(&self, transition: TransitionId) -> BddRef {
        self.relations[transition]
    }

    /// 单个标识的最小项（所有当前态变量均被赋值）.
    pub fn encode_marking(&mut self, marking: &Marking) -> Result<BddRef, AnalysisError> {
        let mut cube = BddRef::TRUE;
        for (place, &tokens) in marking.iter().collect::<Vec<_>>().into_iter().rev() {
            if tokens > 1 {
                return Err(AnalysisError::NonBooleanMarking {
                    place: place.to_string(),
                    tokens,
                });
            }
            let literal = self
                .manager
                .mk_literal(cur_var(place.raw() as usize), tokens == 1);
            cube = self.manager.apply_and(literal, cube);
        }
        Ok(cube)
    }

    /// `Img(X) = rename_{next→cur}( ∨_t ∃cur. X ∧ R_t )`
    pub fn image(&mut self, states: BddRef) -> BddRef {
        let mut successors = BddRef::FALSE;
        for &relation in self.relations.iter() {
            let step = self.manager.and_exists(states, relation, self.cur_set);
            successors = self.manager.apply_or(successors, step);
        }
        self.manager.rename(successors, &self.next_to_cur)
    }

    /// 前沿式最小不动点：`Reach = Frontier = M0`；每轮 `New = Img(Frontier) ∧ ¬Reach`.
    pub fn reachable(&mut self) -> FixedPoint {
        let start = Instant::now();
        let mut reach = self.initial;
        let mut frontier = self.initial;
        let mut iterations = 0;

        while !frontier.is_false() {
            log::debug!(
                "[iteration {}] frontier BDD nodes = {}",
                iterations,
                self.manager.node_count(frontier)
            );
            let image = self.image(frontier);
            let new = self.manager.apply_diff(image, reach);
            reach = self.manager.apply_or(reach, new);
            frontier = new;
            iterations += 1;
        }

        FixedPoint {
            reach,
            iterations,
            elapsed: start.elapsed(),
        }
    }

    /// `Reach ∧ ¬∨_t enabled(t)`
    pub fn deadlocks(&mut self, reach: BddRef) -> BddRef {
        self.manager.apply_diff(reach, self.any_enabled)
    }

    /// 当前态变量上的精确模型数.
    pub fn state_count(&self, states: BddRef) -> Option<BigUint> {
        self.manager.sat_count(states, &self.cur_vars)
    }

    /// Maps a full assignment of the current-state variables back to a marking.
    pub fn decode(&self, assignment: &[bool]) -> Marking {
        Marking::from(
            assignment
                .iter()
                .map(|&bit| u64::from(bit))
                .collect::<Vec<_>>(),
        )
    }

    /// 至多 `limit` 个标识，按库所顺序字典序（0 先于 1）.
    pub fn markings(&mut self, states: BddRef, limit: usize) -> Vec<Marking> {
        let vars = self.cur_vars.clone();
        self.manager
            .sat_assignments(states, &vars, limit)
            .iter()
            .map(|assignment| self.decode(assignment))
            .collect()
    }

    pub fn contains(&self, states: BddRef, marking: &Marking) -> bool {
        marking.len() == self.places
            && self.manager.eval(states, |var| {
                var % 2 == 0 && marking.tokens(PlaceId::new(var / 2)) == 1
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Transition};

    /// a(1) -> t -> b(0), plus self-loop `keep` on b.
    fn net_with_loop() -> Net {
        let mut net = Net::named("loop");
        let a = net.add_place(Place::new("a", 1));
        let b = net.add_place(Place::new("b", 0));
        let t = net.add_transition(Transition::new("t"));
        let keep = net.add_transition(Transition::new("keep"));
        net.add_input_arc(a, t, 1);
        net.add_output_arc(b, t, 1);
        net.add_input_arc(b, keep, 1);
        net.add_output_arc(b, keep, 1);
        net
    }

    #[test]
    fn image_follows_firing() {
        let net = net_with_loop();
        let mut symbolic = SymbolicNet::new(&net).unwrap();
        let initial = symbolic.initial();
        let image = symbolic.image(initial);
        let expected = symbolic.encode_marking(&Marking::from(vec![0, 1])).unwrap();
        assert_eq!(image, expected);
        // the self-loop maps {b} onto itself
        assert_eq!(symbolic.image(expected), expected);
    }

    #[test]
    fn fixed_point_and_count() {
        let net = net_with_loop();
        let mut symbolic = SymbolicNet::new(&net).unwrap();
        let fixed = symbolic.reachable();
        assert_eq!(fixed.iterations, 2);
        assert_eq!(symbolic.state_count(fixed.reach), Some(BigUint::from(2u32)));
        assert!(symbolic.contains(fixed.reach, &Marking::from(vec![1, 0])));
        assert!(symbolic.contains(fixed.reach, &Marking::from(vec![0, 1])));
        assert!(!symbolic.contains(fixed.reach, &Marking::from(vec![1, 1])));

        let dead = symbolic.deadlocks(fixed.reach);
        assert!(dead.is_false());
    }

    #[test]
    fn rejects_multi_token_initial_marking() {
        let mut net = net_with_loop();
        net.places[PlaceId::new(0)].tokens = 2;
        assert!(matches!(
            SymbolicNet::new(&net),
            Err(AnalysisError::NonBooleanMarking { tokens: 2, .. })
        ));
    }

    #[test]
    fn source_transition_makes_everything_enabled() {
        let mut net = net_with_loop();
        let b = net.place_by_name("b").unwrap();
        let spawn = net.add_transition(Transition::new("spawn"));
        net.add_output_arc(b, spawn, 1);
        let symbolic = SymbolicNet::new(&net).unwrap();
        assert!(symbolic.any_enabled().is_true());
    }
}
