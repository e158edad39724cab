//! 状态空间分析：显式可达集、可达图、ILP 死锁候选、可达集加权优化与随机令牌博弈。
//!
//! 所有入口对参数纯函数式求值，每次调用都从网重新派生所需结构。
use serde::Serialize;
use thiserror::Error;

use crate::net::{ArcDirection, Net, UnsafeArc, Weight};

pub mod explicit;
pub mod ilp;
pub mod optimize;
pub mod simulation;
pub mod state_graph;

pub use explicit::{
    Exploration, ExplicitDeadlocks, Explorer, ReachableSet, explicit_deadlocks,
    explore_with_depth,
};
pub use ilp::{CandidateVerdict, IlpReport, IlpStatus, default_firing_bound, ilp_deadlock};
pub use optimize::{OptimizationReport, OptimizationStatus, PlaceWeights, optimize_reachable};
pub use simulation::{SimulationRun, simulate};
pub use state_graph::{StateGraph, StateGraphConfig, StateGraphStats};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// 某条弧权重 > 1，符号引擎与严格死锁搜索均不适用。
    #[error(
        "net is not safe: arc {direction} between `{place}` and `{transition}` has weight {weight}"
    )]
    UnsafeNet {
        transition: String,
        place: String,
        weight: Weight,
        direction: ArcKind,
    },
    #[error("initial marking puts {tokens} tokens on `{place}`, boolean encoding needs 0 or 1")]
    NonBooleanMarking { place: String, tokens: Weight },
    #[error("decision-diagram backend is not compiled in (enable the `symbolic` feature)")]
    BackendUnavailable,
}

/// Arc direction, as rendered in [`AnalysisError::UnsafeNet`] and in state-graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArcKind {
    Input,
    Output,
}

impl std::fmt::Display for ArcKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArcKind::Input => write!(f, "place->transition"),
            ArcKind::Output => write!(f, "transition->place"),
        }
    }
}

impl AnalysisError {
    pub(crate) fn unsafe_arc(net: &Net, arc: UnsafeArc) -> Self {
        AnalysisError::UnsafeNet {
            transition: net.transitions[arc.transition].name.clone(),
            place: net.places[arc.place].name.clone(),
            weight: arc.weight,
            direction: match arc.direction {
                ArcDirection::PlaceToTransition => ArcKind::Input,
                ArcDirection::TransitionToPlace => ArcKind::Output,
            },
        }
    }
}

/// Fails with [`AnalysisError::UnsafeNet`] on the first arc of weight > 1.
pub(crate) fn ensure_safe(net: &Net) -> Result<(), AnalysisError> {
    match net.incidence().first_unsafe_arc() {
        Some(arc) => Err(AnalysisError::unsafe_arc(net, arc)),
        None => Ok(()),
    }
}
