//! # 符号状态空间分析
//!
//! 安全网（弧权重 0/1、初始标识 0/1）的可达集与死锁集用 ROBDD 表示：
//!
//! * [`bdd`]：哈希共享的 BDD 管理器（与、或、非、关系积、变量替换、模型计数）；
//! * [`encoding`]：网到转移关系的编码、像运算与前沿式不动点；
//! * [`deadlock`]：死锁集与见证枚举；
//! * [`reachability`]：对外的可达性报告与显式对比。
//!
//! 决策图后端由 `symbolic` feature 控制；关闭时 [`symbolic_reachability`]
//! 返回 [`AnalysisError::BackendUnavailable`](crate::analysis::AnalysisError::BackendUnavailable).

#[cfg(feature = "symbolic")]
pub mod bdd;
#[cfg(feature = "symbolic")]
pub mod deadlock;
#[cfg(feature = "symbolic")]
pub mod encoding;
pub mod reachability;

#[cfg(feature = "symbolic")]
pub use bdd::{BddManager, BddRef, VarSet};
#[cfg(feature = "symbolic")]
pub use deadlock::{SymbolicDeadlockSolver, SymbolicDeadlocks};
#[cfg(feature = "symbolic")]
pub use encoding::{FixedPoint, SymbolicNet};
pub use reachability::{
    ExplicitComparison, ExplicitStates, SymbolicReachabilityReport, symbolic_reachability,
};
