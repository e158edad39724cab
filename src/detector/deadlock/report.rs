use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use num_bigint::BigUint;
use serde::Serialize;

use crate::net::{Marking, Net, Weight};

use super::AnalysisMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadlockStatus {
    /// 找到至少一个死锁见证.
    Ok,
    NoDeadlock,
}

impl fmt::Display for DeadlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlockStatus::Ok => write!(f, "OK"),
            DeadlockStatus::NoDeadlock => write!(f, "NO_DEADLOCK"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeadlockReport {
    pub status: DeadlockStatus,
    pub witnesses: Vec<Marking>,
    pub witness_count: usize,
    /// 符号模式下为精确可达状态数；显式模式下为停止时已见过的标识数.
    pub reachable_states: Option<BigUint>,
    /// 仅符号模式.
    pub node_count: Option<usize>,
    pub elapsed: Duration,
    pub mode: AnalysisMode,
}

impl DeadlockReport {
    pub(crate) fn new(
        witnesses: Vec<Marking>,
        reachable_states: Option<BigUint>,
        node_count: Option<usize>,
        elapsed: Duration,
        mode: AnalysisMode,
    ) -> Self {
        let status = if witnesses.is_empty() {
            DeadlockStatus::NoDeadlock
        } else {
            DeadlockStatus::Ok
        };
        Self {
            status,
            witness_count: witnesses.len(),
            witnesses,
            reachable_states,
            node_count,
            elapsed,
            mode,
        }
    }

    pub fn has_deadlock(&self) -> bool {
        self.status == DeadlockStatus::Ok
    }

    pub fn named_witnesses(&self, net: &Net) -> Vec<IndexMap<String, Weight>> {
        self.witnesses.iter().map(|m| m.to_named(net)).collect()
    }

    pub fn display<'a>(&'a self, net: &'a Net) -> DeadlockReportDisplay<'a> {
        DeadlockReportDisplay { report: self, net }
    }
}

pub struct DeadlockReportDisplay<'a> {
    report: &'a DeadlockReport,
    net: &'a Net,
}

impl fmt::Display for DeadlockReportDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(f, "死锁分析报告 ({})", report.mode)?;
        writeln!(f, "状态: {}", report.status)?;
        writeln!(f, "分析时间: {:.6}s", report.elapsed.as_secs_f64())?;
        match &report.reachable_states {
            Some(count) => writeln!(f, "可达状态数: {}", count)?,
            None => writeln!(f, "可达状态数: 未知")?,
        }
        if let Some(nodes) = report.node_count {
            writeln!(f, "BDD 节点数: {}", nodes)?;
        }
        if report.has_deadlock() {
            writeln!(f, "\n列出 {} 个死锁标识:", report.witness_count)?;
            for (i, marking) in report.witnesses.iter().enumerate() {
                writeln!(f, "  #{} {}", i + 1, marking.display(self.net))?;
            }
        }
        Ok(())
    }
}
