//! 符号可达性分析入口，以及与显式可达集的状态数/内存对比。
use std::fmt;
use std::mem;
use std::time::Duration;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::Serialize;

use crate::analysis::{AnalysisError, ReachableSet};
use crate::net::{Marking, Net, Weight};

/// 可与符号结果对比的显式状态集合.
pub trait ExplicitStates {
    fn state_count(&self) -> usize;

    /// Approximate heap footprint of the stored markings.
    fn memory_bytes(&self) -> usize;
}

fn marking_bytes(marking: &Marking) -> usize {
    mem::size_of::<Marking>() + marking.len() * mem::size_of::<Weight>()
}

impl ExplicitStates for Vec<Marking> {
    fn state_count(&self) -> usize {
        self.len()
    }

    fn memory_bytes(&self) -> usize {
        self.iter().map(marking_bytes).sum()
    }
}

impl ExplicitStates for ReachableSet {
    fn state_count(&self) -> usize {
        self.len()
    }

    fn memory_bytes(&self) -> usize {
        self.markings()
            .map(|marking| marking_bytes(marking) + mem::size_of::<usize>())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplicitComparison {
    pub explicit_states: usize,
    pub explicit_memory_bytes: usize,
    /// 显式状态数 ÷ 符号状态数.
    pub state_compression_ratio: Option<f64>,
    /// 显式内存 ÷ 符号内存.
    pub memory_compression_ratio: Option<f64>,
    pub counts_agree: bool,
}

impl ExplicitComparison {
    fn new(
        explicit: &dyn ExplicitStates,
        symbolic_states: Option<&BigUint>,
        symbolic_bytes: usize,
    ) -> Self {
        let explicit_states = explicit.state_count();
        let explicit_memory_bytes = explicit.memory_bytes();
        let symbolic_f64 = symbolic_states.and_then(|count| count.to_f64());
        Self {
            explicit_states,
            explicit_memory_bytes,
            state_compression_ratio: symbolic_f64
                .filter(|count| *count > 0.0)
                .map(|count| explicit_states as f64 / count),
            memory_compression_ratio: (symbolic_bytes > 0)
                .then(|| explicit_memory_bytes as f64 / symbolic_bytes as f64),
            counts_agree: symbolic_states
                .is_some_and(|count| *count == BigUint::from(explicit_states)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolicReachabilityReport {
    /// `None` 表示计数未定义.
    pub state_count: Option<BigUint>,
    pub node_count: usize,
    pub iterations: usize,
    pub elapsed: Duration,
    /// 可达集 BDD 本身的近似字节数.
    pub memory_bytes: usize,
    /// 整个管理器（节点表与缓存）的近似字节数.
    pub manager_memory_bytes: usize,
    pub comparison: Option<ExplicitComparison>,
}

impl fmt::Display for SymbolicReachabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state_count {
            Some(count) => writeln!(f, "reachable states: {}", count)?,
            None => writeln!(f, "reachable states: undefined")?,
        }
        writeln!(f, "BDD nodes: {}", self.node_count)?;
        writeln!(f, "iterations: {}", self.iterations)?;
        writeln!(f, "time: {:.6}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "memory: {} bytes", self.memory_bytes)?;
        if let Some(cmp) = &self.comparison {
            writeln!(
                f,
                "explicit: {} states, {} bytes, state ratio {}, memory ratio {}{}",
                cmp.explicit_states,
                cmp.explicit_memory_bytes,
                fmt_ratio(cmp.state_compression_ratio),
                fmt_ratio(cmp.memory_compression_ratio),
                if cmp.counts_agree { "" } else { " (COUNT MISMATCH)" }
            )?;
        }
        Ok(())
    }
}

fn fmt_ratio(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"))
}

/// 对安全网计算完整可达集的 BDD，并可选地与显式枚举结果对比.
pub fn symbolic_reachability(
    net: &Net,
    explicit: Option<&dyn ExplicitStates>,
) -> Result<SymbolicReachabilityReport, AnalysisError> {
    #[cfg(feature = "symbolic")]
    {
        let mut symbolic = crate::symbolic::SymbolicNet::new(net)?;
        let fixed = symbolic.reachable();
        let state_count = symbolic.state_count(fixed.reach);
        let manager = symbolic.manager();
        let memory_bytes = manager.memory_bytes_of(fixed.reach);
        let report = SymbolicReachabilityReport {
            node_count: manager.node_count(fixed.reach),
            iterations: fixed.iterations,
            elapsed: fixed.elapsed,
            memory_bytes,
            manager_memory_bytes: manager.memory_bytes(),
            comparison: explicit
                .map(|states| ExplicitComparison::new(states, state_count.as_ref(), memory_bytes)),
            state_count,
        };
        log::info!(
            "net '{}': symbolic reachability {} states, {} nodes, {} iterations, {:.3}s",
            net.name,
            report
                .state_count
                .as_ref()
                .map_or_else(|| "?".to_string(), |c| c.to_string()),
            report.node_count,
            report.iterations,
            report.elapsed.as_secs_f64()
        );
        if let Some(cmp) = &report.comparison {
            if !cmp.counts_agree {
                log::warn!(
                    "net '{}': explicit enumeration found {} states, symbolic count differs",
                    net.name,
                    cmp.explicit_states
                );
            }
        }
        Ok(report)
    }
    #[cfg(not(feature = "symbolic"))]
    {
        let _ = (net, explicit);
        Err(AnalysisError::BackendUnavailable)
    }
}
