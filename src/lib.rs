//! Petri 网状态空间分析：显式 BFS、符号（BDD）可达性与死锁求解、ILP 死锁候选，
//! 以及可达集上的加权优化。
//!
//! 入口 [`net::io::load_net`] 读入 JSON/RON 网描述，随后各阶段均以 `&Net` 为输入、
//! 返回不可变报告；[`report::AnalysisSummary`] 汇总一个网的全部结果。

pub mod analysis;
pub mod config;
pub mod detector;
pub mod net;
pub mod options;
pub mod report;
pub mod symbolic;
