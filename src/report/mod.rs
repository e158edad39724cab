//! 分析汇总：把各阶段的不可变结果整理为可序列化、可打印的记录。
//!
//! 标识一律以 `库所名 → token` 的有序映射呈现，状态数以字符串保存（可能超出 `u64`），
//! 耗时以秒为单位。
use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::analysis::{
    CandidateVerdict, Exploration, IlpReport, OptimizationReport, OptimizationStatus,
    SimulationRun, StateGraph,
};
use crate::detector::deadlock::{AnalysisMode, DeadlockReport, DeadlockStatus};
use crate::net::io::{self, IoError};
use crate::net::{DiagnosticReport, Net, Weight};
use crate::symbolic::{ExplicitComparison, SymbolicReachabilityReport};

pub type NamedMarking = IndexMap<String, Weight>;

#[derive(Debug, Clone, Serialize)]
pub struct NetInfo {
    pub name: String,
    pub places: usize,
    pub transitions: usize,
    pub arcs: usize,
    pub safe: bool,
    pub initial_marking: NamedMarking,
}

impl NetInfo {
    pub fn new(net: &Net) -> Self {
        Self {
            name: net.name.clone(),
            places: net.places_len(),
            transitions: net.transitions_len(),
            arcs: net.arcs().len(),
            safe: net.is_safe(),
            initial_marking: net.initial_marking().to_named(net),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectivityRecord {
    pub isolated_places: Vec<String>,
    pub isolated_transitions: Vec<String>,
    pub source_transitions: Vec<String>,
    pub warnings: Vec<String>,
}

fn names<I>(items: &[(I, String)]) -> Vec<String> {
    items.iter().map(|(_, name)| name.clone()).collect()
}

impl From<&DiagnosticReport> for ConnectivityRecord {
    fn from(report: &DiagnosticReport) -> Self {
        Self {
            isolated_places: names(&report.isolated_places),
            isolated_transitions: names(&report.isolated_transitions),
            source_transitions: names(&report.source_transitions),
            warnings: report.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExploreRecord {
    pub reachable_states: usize,
    pub max_depth: usize,
    pub dead_markings: usize,
    pub truncated: bool,
    pub elapsed_sec: f64,
}

impl ExploreRecord {
    pub fn new(net: &Net, exploration: &Exploration) -> Self {
        Self {
            reachable_states: exploration.reachable.len(),
            max_depth: exploration.reachable.max_depth(),
            dead_markings: exploration.reachable.dead_markings(net).count(),
            truncated: exploration.truncated,
            elapsed_sec: exploration.elapsed.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolicRecord {
    pub reachable_states: Option<String>,
    pub bdd_nodes: usize,
    pub iterations: usize,
    pub elapsed_sec: f64,
    pub memory_bytes: usize,
    pub explicit: Option<ExplicitComparison>,
}

impl From<&SymbolicReachabilityReport> for SymbolicRecord {
    fn from(report: &SymbolicReachabilityReport) -> Self {
        Self {
            reachable_states: report.state_count.as_ref().map(|c| c.to_string()),
            bdd_nodes: report.node_count,
            iterations: report.iterations,
            elapsed_sec: report.elapsed.as_secs_f64(),
            memory_bytes: report.memory_bytes,
            explicit: report.comparison.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadlockRecord {
    pub status: DeadlockStatus,
    pub mode: AnalysisMode,
    pub deadlock_markings: Vec<NamedMarking>,
    pub num_deadlocks_listed: usize,
    pub reachable_states: Option<String>,
    pub bdd_nodes: Option<usize>,
    pub elapsed_sec: f64,
    /// 每个见证的最短发生序列（仅在构造了可达图时给出）.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traces: Vec<Vec<String>>,
}

impl DeadlockRecord {
    pub fn new(net: &Net, report: &DeadlockReport) -> Self {
        Self {
            status: report.status,
            mode: report.mode,
            deadlock_markings: report.named_witnesses(net),
            num_deadlocks_listed: report.witness_count,
            reachable_states: report.reachable_states.as_ref().map(|c| c.to_string()),
            bdd_nodes: report.node_count,
            elapsed_sec: report.elapsed.as_secs_f64(),
            traces: Vec::new(),
        }
    }

    /// 用可达图为每个见证补充最短路径；不在图中的见证得到空序列.
    pub fn with_traces(mut self, net: &Net, graph: &StateGraph, report: &DeadlockReport) -> Self {
        self.traces = report
            .witnesses
            .iter()
            .map(|witness| {
                graph
                    .trace_to(witness)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|t| net.transitions[t].name.clone())
                    .collect()
            })
            .collect();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IlpRecord {
    pub status: String,
    pub deadlock_marking: Option<NamedMarking>,
    pub firing_counts: Option<IndexMap<String, u64>>,
    pub objective: Option<f64>,
    pub elapsed_sec: f64,
    pub num_vars: usize,
    pub num_constraints: usize,
    pub verdict: Option<CandidateVerdict>,
}

impl IlpRecord {
    pub fn new(net: &Net, report: &IlpReport) -> Self {
        Self {
            status: report.status.to_string(),
            deadlock_marking: report.marking.as_ref().map(|m| m.to_named(net)),
            firing_counts: report.firing_counts.as_ref().map(|counts| {
                net.transitions
                    .iter()
                    .zip(counts)
                    .map(|(t, &count)| (t.name.clone(), count))
                    .collect()
            }),
            objective: report.objective,
            elapsed_sec: report.elapsed.as_secs_f64(),
            num_vars: report.num_vars,
            num_constraints: report.num_constraints,
            verdict: None,
        }
    }

    pub fn with_verdict(mut self, verdict: CandidateVerdict) -> Self {
        self.verdict = Some(verdict);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationRecord {
    pub status: OptimizationStatus,
    pub best_marking: Option<NamedMarking>,
    pub best_value: Option<i64>,
    pub elapsed_sec: f64,
    pub num_states: usize,
}

impl OptimizationRecord {
    pub fn new(net: &Net, report: &OptimizationReport) -> Self {
        Self {
            status: report.status,
            best_marking: report.best_marking.as_ref().map(|m| m.to_named(net)),
            best_value: report.best_value,
            elapsed_sec: report.elapsed.as_secs_f64(),
            num_states: report.state_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationRecord {
    pub seed: u64,
    pub fired: Vec<String>,
    pub final_marking: NamedMarking,
    pub deadlocked: bool,
}

impl SimulationRecord {
    pub fn new(net: &Net, run: &SimulationRun, seed: u64) -> Self {
        Self {
            seed,
            fired: run
                .fired
                .iter()
                .map(|&t| net.transitions[t].name.clone())
                .collect(),
            final_marking: run.marking.to_named(net),
            deadlocked: run.deadlocked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageError {
    pub stage: String,
    pub message: String,
}

/// 单个网的全部分析结果；未运行的阶段为 `None`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub file: String,
    pub net: Option<NetInfo>,
    pub connectivity: Option<ConnectivityRecord>,
    pub explore: Option<ExploreRecord>,
    pub symbolic: Option<SymbolicRecord>,
    pub deadlock: Option<DeadlockRecord>,
    pub ilp: Option<IlpRecord>,
    pub optimization: Option<OptimizationRecord>,
    pub simulation: Option<SimulationRecord>,
    pub errors: Vec<StageError>,
}

impl AnalysisSummary {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            net: None,
            connectivity: None,
            explore: None,
            symbolic: None,
            deadlock: None,
            ilp: None,
            optimization: None,
            simulation: None,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, stage: &str, error: impl fmt::Display) {
        log::error!("{}: {} stage failed: {}", self.file, stage, error);
        self.errors.push(StageError {
            stage: stage.to_string(),
            message: error.to_string(),
        });
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn write_marking(f: &mut fmt::Formatter<'_>, marking: &NamedMarking) -> fmt::Result {
    let marked: Vec<String> = marking
        .iter()
        .filter(|(_, tokens)| **tokens > 0)
        .map(|(name, tokens)| format!("{name}:{tokens}"))
        .collect();
    write!(f, "{{{}}}", marked.join(", "))
}

impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.file)?;
        if let Some(net) = &self.net {
            writeln!(
                f,
                "网 '{}': {} 库所, {} 变迁, {} 弧, 安全: {}",
                net.name, net.places, net.transitions, net.arcs, net.safe
            )?;
        }
        if let Some(conn) = &self.connectivity {
            if !conn.source_transitions.is_empty() {
                writeln!(f, "源变迁: {}", conn.source_transitions.join(", "))?;
            }
            if !conn.isolated_places.is_empty() {
                writeln!(f, "孤立库所: {}", conn.isolated_places.join(", "))?;
            }
        }
        if let Some(explore) = &self.explore {
            writeln!(
                f,
                "[explore] {} states, max depth {}, {} dead{}, {:.6}s",
                explore.reachable_states,
                explore.max_depth,
                explore.dead_markings,
                if explore.truncated { " (truncated)" } else { "" },
                explore.elapsed_sec
            )?;
        }
        if let Some(symbolic) = &self.symbolic {
            write!(
                f,
                "[symbolic] {} states, {} BDD nodes, {} iterations, {:.6}s",
                symbolic.reachable_states.as_deref().unwrap_or("?"),
                symbolic.bdd_nodes,
                symbolic.iterations,
                symbolic.elapsed_sec
            )?;
            if let Some(cmp) = &symbolic.explicit {
                write!(
                    f,
                    ", explicit/symbolic states {:?}, memory {:?}",
                    cmp.state_compression_ratio, cmp.memory_compression_ratio
                )?;
            }
            writeln!(f)?;
        }
        if let Some(deadlock) = &self.deadlock {
            writeln!(
                f,
                "[deadlock] {} ({}), {} listed, {:.6}s",
                deadlock.status, deadlock.mode, deadlock.num_deadlocks_listed, deadlock.elapsed_sec
            )?;
            for (i, marking) in deadlock.deadlock_markings.iter().enumerate() {
                write!(f, "  #{} ", i + 1)?;
                write_marking(f, marking)?;
                if let Some(trace) = deadlock.traces.get(i) {
                    write!(f, " via [{}]", trace.join(" "))?;
                }
                writeln!(f)?;
            }
        }
        if let Some(ilp) = &self.ilp {
            write!(
                f,
                "[ilp] {}, {} vars, {} constraints, {:.6}s",
                ilp.status, ilp.num_vars, ilp.num_constraints, ilp.elapsed_sec
            )?;
            if let Some(marking) = &ilp.deadlock_marking {
                write!(f, ", candidate ")?;
                write_marking(f, marking)?;
            }
            if let Some(verdict) = ilp.verdict {
                write!(f, " ({verdict:?})")?;
            }
            writeln!(f)?;
        }
        if let Some(opt) = &self.optimization {
            write!(f, "[optimize] {}", opt.status)?;
            if let (Some(value), Some(marking)) = (opt.best_value, &opt.best_marking) {
                write!(f, ", best {value} at ")?;
                write_marking(f, marking)?;
            }
            writeln!(f, " over {} states", opt.num_states)?;
        }
        if let Some(sim) = &self.simulation {
            write!(
                f,
                "[simulate] seed {}, {} firings, deadlocked: {}, final ",
                sim.seed,
                sim.fired.len(),
                sim.deadlocked
            )?;
            write_marking(f, &sim.final_marking)?;
            writeln!(f)?;
        }
        for error in &self.errors {
            writeln!(f, "错误 [{}]: {}", error.stage, error.message)?;
        }
        Ok(())
    }
}

/// 写出 JSON 汇总，并在旁边写一份同名 `.txt` 文本报告.
pub fn save_summaries<P: AsRef<Path>>(path: P, summaries: &[AnalysisSummary]) -> Result<(), IoError> {
    let path = path.as_ref();
    io::write_json(path, &summaries)?;
    let text: String = summaries.iter().map(|s| s.to_string()).collect();
    fs::write(path.with_extension("txt"), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Explorer, PlaceWeights, ilp_deadlock, optimize_reachable};
    use crate::detector::deadlock::symbolic_or_fallback_deadlock;
    use crate::net::{Place, Transition};

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
    fn summary_serializes_stage_records() {
        let net = hand_off();
        let mut summary = AnalysisSummary::new("hand-off.json");
        summary.net = Some(NetInfo::new(&net));

        let exploration = Explorer::new().explore(&net);
        summary.explore = Some(ExploreRecord::new(&net, &exploration));

        let deadlock = symbolic_or_fallback_deadlock(&net, 10).unwrap();
        let graph = StateGraph::from_net(&net);
        summary.deadlock = Some(DeadlockRecord::new(&net, &deadlock).with_traces(&net, &graph, &deadlock));

        let weights = PlaceWeights::uniform(&net, 1);
        let optimization = optimize_reachable(&net, exploration.reachable.markings(), &weights);
        summary.optimization = Some(OptimizationRecord::new(&net, &optimization));

        let ilp = ilp_deadlock(&net, None);
        summary.ilp = Some(IlpRecord::new(&net, &ilp));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["deadlock"]["status"], "OK");
        assert_eq!(json["deadlock"]["deadlock_markings"][0]["p2"], 1);
        assert_eq!(json["deadlock"]["traces"][0][0], "t1");
        assert_eq!(json["explore"]["reachable_states"], 2);
        assert_eq!(json["optimization"]["status"], "OPTIMAL");

        let text = summary.to_string();
        assert!(text.contains("[deadlock] OK"));
        assert!(text.contains("{p2:1}"));
    }

    #[test]
    fn errors_are_recorded_per_stage() {
        let mut summary = AnalysisSummary::new("broken.json");
        summary.record_error("load", "duplicate node id `p`");
        assert!(!summary.is_ok());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["errors"][0]["stage"], "load");
        assert!(json["deadlock"].is_null());
    }
}
