//! 死锁检测：能力探测后选择符号（BDD）或显式 BFS 模式，二者返回同一种报告。
//!
//! 选择规则：决策图后端已编译、网安全且初始标识为 0/1 时走符号模式，否则走显式模式。
//! 显式模式对非安全网同样报错，不会静默地降级分析。
pub mod report;

use std::fmt;
use std::time::Instant;

use num_bigint::BigUint;
use serde::Serialize;

use crate::analysis::{AnalysisError, explicit_deadlocks};
use crate::net::Net;

pub use report::{DeadlockReport, DeadlockReportDisplay, DeadlockStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisMode {
    #[serde(rename = "BDD")]
    Symbolic,
    #[serde(rename = "EXPLICIT")]
    Explicit,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Symbolic => write!(f, "BDD"),
            AnalysisMode::Explicit => write!(f, "EXPLICIT"),
        }
    }
}

/// 符号后端可用且网安全（所有弧权重为 1）时选 BDD 模式.
///
/// 第三个条件是有意加上的：初始标识必须是 0/1 向量，否则 BDD 编码
/// 无法表示它，多令牌的安全网同样走显式搜索.
pub fn select_mode(net: &Net) -> AnalysisMode {
    if cfg!(feature = "symbolic") && net.is_safe() && net.initial_marking().is_boolean() {
        AnalysisMode::Symbolic
    } else {
        AnalysisMode::Explicit
    }
}

/// 按 [`select_mode`] 的结果求死锁，至多列出 `sample_limit` 个见证.
pub fn symbolic_or_fallback_deadlock(
    net: &Net,
    sample_limit: usize,
) -> Result<DeadlockReport, AnalysisError> {
    let start = Instant::now();
    let mode = select_mode(net);
    log::info!("net '{}': deadlock analysis in {} mode", net.name, mode);

    let report = match mode {
        AnalysisMode::Symbolic => run_symbolic(net, sample_limit, start)?,
        AnalysisMode::Explicit => {
            let result = explicit_deadlocks(net, sample_limit)?;
            DeadlockReport::new(
                result.witnesses,
                Some(BigUint::from(result.visited)),
                None,
                start.elapsed(),
                AnalysisMode::Explicit,
            )
        }
    };

    log::info!(
        "net '{}': {} with {} witness(es) in {:.3}s",
        net.name,
        report.status,
        report.witness_count,
        report.elapsed.as_secs_f64()
    );
    Ok(report)
}

#[cfg(feature = "symbolic")]
fn run_symbolic(
    net: &Net,
    sample_limit: usize,
    start: Instant,
) -> Result<DeadlockReport, AnalysisError> {
    use crate::symbolic::SymbolicDeadlockSolver;

    let result = SymbolicDeadlockSolver::new(net)?.solve(sample_limit);
    Ok(DeadlockReport::new(
        result.witnesses,
        result.reachable_states,
        Some(result.node_count),
        start.elapsed(),
        AnalysisMode::Symbolic,
    ))
}

#[cfg(not(feature = "symbolic"))]
fn run_symbolic(
    net: &Net,
    sample_limit: usize,
    start: Instant,
) -> Result<DeadlockReport, AnalysisError> {
    let _ = (net, sample_limit, start);
    Err(AnalysisError::BackendUnavailable)
}
