//! 整数规划死锁候选：状态方程 + "每个迁移至少缺一个前集 token"。
//!
//! ```text
//! min  Σ_t σ_t
//! s.t. m_p − Σ_t (Post[p,t] − Pre[p,t])·σ_t = M0[p]     ∀p
//!      Σ_{p ∈ •t} m_p ≤ |•t| − 1                         ∀t, •t ≠ ∅
//!      m_p ∈ {0,1},  σ_t ∈ {0..bound}
//! ```
//!
//! 状态方程只是可达性的必要条件，解出的标识可能不可达，因此结果只是 *候选*，
//! 调用方可用 [`IlpReport::classify_against`] 与已知死锁集比对。
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::net::{Marking, Net};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IlpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error(String),
    /// 求解器未编译进来（关闭了 `ilp` feature）。
    Unavailable,
}

impl IlpStatus {
    pub fn is_feasible(&self) -> bool {
        matches!(self, IlpStatus::Optimal)
    }
}

impl fmt::Display for IlpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IlpStatus::Optimal => write!(f, "Optimal"),
            IlpStatus::Infeasible => write!(f, "Infeasible"),
            IlpStatus::Unbounded => write!(f, "Unbounded"),
            IlpStatus::Error(msg) => write!(f, "Error ({msg})"),
            IlpStatus::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// 候选标识与真实死锁集的比对结果.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateVerdict {
    Confirmed,
    Spurious,
    NoCandidate,
}

#[derive(Debug, Clone)]
pub struct IlpReport {
    pub status: IlpStatus,
    pub marking: Option<Marking>,
    pub firing_counts: Option<Vec<u64>>,
    pub objective: Option<f64>,
    pub elapsed: Duration,
    pub num_vars: usize,
    pub num_constraints: usize,
}

impl IlpReport {
    fn unsolved(status: IlpStatus, num_vars: usize, num_constraints: usize) -> Self {
        Self {
            status,
            marking: None,
            firing_counts: None,
            objective: None,
            elapsed: Duration::ZERO,
            num_vars,
            num_constraints,
        }
    }

    pub fn classify_against<'a>(
        &self,
        deadlocks: impl IntoIterator<Item = &'a Marking>,
    ) -> CandidateVerdict {
        match &self.marking {
            None => CandidateVerdict::NoCandidate,
            Some(candidate) if deadlocks.into_iter().any(|m| m == candidate) => {
                CandidateVerdict::Confirmed
            }
            Some(_) => CandidateVerdict::Spurious,
        }
    }
}

/// Firing bound used when the caller gives none: the number of places.
pub fn default_firing_bound(net: &Net) -> u64 {
    net.places_len() as u64
}

#[cfg(feature = "ilp")]
pub use solver::DeadlockProgram;

#[cfg(feature = "ilp")]
mod solver {
    use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};

    use super::*;
    use crate::net::{IndexVec, PlaceId, TransitionId};

    /// 已建好的 ILP 模型，变量按库所/迁移顺序编号.
    pub struct DeadlockProgram {
        problem: Problem,
        places: IndexVec<PlaceId, Variable>,
        firings: IndexVec<TransitionId, Variable>,
        num_constraints: usize,
    }

    impl DeadlockProgram {
        pub fn build(net: &Net, firing_bound: Option<u64>) -> Self {
            let bound = firing_bound.unwrap_or_else(|| default_firing_bound(net));
            let bound = i32::try_from(bound).unwrap_or(i32::MAX);
            let incidence = net.incidence();

            let mut problem = Problem::new(OptimizationDirection::Minimize);
            let places: IndexVec<PlaceId, Variable> =
                net.places.iter().map(|_| problem.add_binary_var(0.0)).collect();
            let firings: IndexVec<TransitionId, Variable> = net
                .transitions
                .iter()
                .map(|_| problem.add_integer_var(1.0, (0, bound)))
                .collect();
            let mut num_constraints = 0;

            for (place, info) in net.places.iter_enumerated() {
                let mut lhs = LinearExpr::empty();
                lhs.add(places[place], 1.0);
                for transition in net.transitions.indices() {
                    let effect = incidence.effect(transition, place);
                    if effect != 0 {
                        lhs.add(firings[transition], -(effect as f64));
                    }
                }
                problem.add_constraint(lhs, ComparisonOp::Eq, info.tokens as f64);
                num_constraints += 1;
            }

            for transition in net.transitions.indices() {
                let preset = incidence.pre(transition);
                if preset.is_empty() {
                    continue;
                }
                let lhs: LinearExpr = preset
                    .iter()
                    .map(|&(place, _)| (places[place], 1.0))
                    .collect();
                problem.add_constraint(lhs, ComparisonOp::Le, preset.len() as f64 - 1.0);
                num_constraints += 1;
            }

            Self {
                problem,
                places,
                firings,
                num_constraints,
            }
        }

        pub fn num_vars(&self) -> usize {
            self.places.len() + self.firings.len()
        }

        pub fn num_constraints(&self) -> usize {
            self.num_constraints
        }

        pub fn solve(&self) -> IlpReport {
            let start = Instant::now();
            if self.num_vars() == 0 {
                return IlpReport {
                    status: IlpStatus::Optimal,
                    marking: Some(Marking::from(Vec::new())),
                    firing_counts: Some(Vec::new()),
                    objective: Some(0.0),
                    ..IlpReport::unsolved(IlpStatus::Optimal, 0, 0)
                };
            }

            let outcome = self.problem.solve();
            let elapsed = start.elapsed();
            let mut report = match outcome {
                Ok(solution) => IlpReport {
                    status: IlpStatus::Optimal,
                    marking: Some(Marking::from(
                        self.places
                            .iter()
                            .map(|&var| solution[var].round().max(0.0) as u64)
                            .collect::<Vec<_>>(),
                    )),
                    firing_counts: Some(
                        self.firings
                            .iter()
                            .map(|&var| solution[var].round().max(0.0) as u64)
                            .collect(),
                    ),
                    objective: Some(solution.objective()),
                    ..IlpReport::unsolved(IlpStatus::Optimal, 0, 0)
                },
                Err(microlp::Error::Infeasible) => IlpReport::unsolved(IlpStatus::Infeasible, 0, 0),
                Err(microlp::Error::Unbounded) => IlpReport::unsolved(IlpStatus::Unbounded, 0, 0),
                Err(microlp::Error::InternalError(msg)) => {
                    IlpReport::unsolved(IlpStatus::Error(msg), 0, 0)
                }
            };
            report.elapsed = elapsed;
            report.num_vars = self.num_vars();
            report.num_constraints = self.num_constraints;
            report
        }
    }
}

/// 构建并求解死锁 ILP；`firing_bound` 缺省为库所数.
pub fn ilp_deadlock(net: &Net, firing_bound: Option<u64>) -> IlpReport {
    #[cfg(feature = "ilp")]
    {
        let program = DeadlockProgram::build(net, firing_bound);
        log::info!(
            "net '{}': ILP with {} variables, {} constraints, firing bound {}",
            net.name,
            program.num_vars(),
            program.num_constraints(),
            firing_bound.unwrap_or_else(|| default_firing_bound(net))
        );
        let report = program.solve();
        log::info!(
            "net '{}': ILP status {} in {:.3}s",
            net.name,
            report.status,
            report.elapsed.as_secs_f64()
        );
        report
    }
    #[cfg(not(feature = "ilp"))]
    {
        let _ = firing_bound;
        log::warn!("net '{}': ILP solver not compiled in", net.name);
        IlpReport::unsolved(
            IlpStatus::Unavailable,
            net.places_len() + net.transitions_len(),
            0,
        )
    }
}

#[cfg(all(test, feature = "ilp"))]
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

    #[test]
    fn finds_terminal_marking() {
        let net = hand_off();
        let report = ilp_deadlock(&net, None);
        assert_eq!(report.status, IlpStatus::Optimal);
        assert_eq!(report.marking, Some(Marking::from(vec![0, 1])));
        assert_eq!(report.firing_counts, Some(vec![1]));
        assert_eq!(report.num_vars, 3);
        assert_eq!(report.num_constraints, 3);
        let deadlocks = [Marking::from(vec![0, 1])];
        assert_eq!(report.classify_against(&deadlocks), CandidateVerdict::Confirmed);
    }

    #[test]
    fn live_cycle_is_infeasible() {
        let mut net = Net::named("ring");
        let a = net.add_place(Place::new("a", 1));
        let b = net.add_place(Place::new("b", 0));
        let ab = net.add_transition(Transition::new("ab"));
        let ba = net.add_transition(Transition::new("ba"));
        net.add_input_arc(a, ab, 1);
        net.add_output_arc(b, ab, 1);
        net.add_input_arc(b, ba, 1);
        net.add_output_arc(a, ba, 1);

        let report = ilp_deadlock(&net, None);
        assert_eq!(report.status, IlpStatus::Infeasible);
        assert_eq!(report.marking, None);
        assert_eq!(report.classify_against(&[]), CandidateVerdict::NoCandidate);
    }

    #[test]
    fn zero_bound_forces_initial_marking() {
        let net = hand_off();
        let report = ilp_deadlock(&net, Some(0));
        // M0 enables t1, so with no firings there is no deadlock candidate.
        assert_eq!(report.status, IlpStatus::Infeasible);
    }

    #[test]
    fn spurious_candidate_is_labelled() {
        let net = hand_off();
        let report = ilp_deadlock(&net, None);
        assert_eq!(report.classify_against(&[]), CandidateVerdict::Spurious);
    }
}
