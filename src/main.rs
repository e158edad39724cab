use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use pnreach::analysis::{
    Exploration, Explorer, StateGraph, StateGraphConfig, default_firing_bound, ilp_deadlock,
    optimize_reachable, simulate,
};
use pnreach::config::AnalysisConfig;
use pnreach::detector::deadlock::symbolic_or_fallback_deadlock;
use pnreach::net::{Net, io};
use pnreach::options::Options;
use pnreach::report::{
    AnalysisSummary, DeadlockRecord, ExploreRecord, IlpRecord, NetInfo, OptimizationRecord,
    SimulationRecord, SymbolicRecord, save_summaries,
};
use pnreach::symbolic::{ExplicitStates, symbolic_reachability};

fn main() {
    if std::env::var("PN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let exit_code = match run() {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("error: {err:#}");
            2
        }
    };
    std::process::exit(exit_code);
}

/// 返回值表示所有网是否都分析成功.
fn run() -> Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match Options::parse_from_args(&args) {
        Ok(options) => options,
        Err(err) => match err.downcast::<clap::Error>() {
            Ok(clap_err) => clap_err.exit(),
            Err(err) => anyhow::bail!("{err}"),
        },
    };
    debug!("PN options: {:?}", options);

    let config = AnalysisConfig::load_from_file(&options.config)?;
    debug!("PN config: {:?}", config);

    let summaries: Vec<AnalysisSummary> = options
        .nets
        .iter()
        .map(|path| analyze(path, &options, &config))
        .collect();

    for summary in &summaries {
        print!("{summary}");
    }
    if let Some(output) = &options.output {
        save_summaries(output, &summaries)
            .with_context(|| format!("Failed to write summary: {:?}", output))?;
        log::info!("summary written to {:?}", output);
    }
    Ok(summaries.iter().all(AnalysisSummary::is_ok))
}

fn analyze(path: &Path, options: &Options, config: &AnalysisConfig) -> AnalysisSummary {
    let mut summary = AnalysisSummary::new(path.display().to_string());
    let net = match io::load_net(path) {
        Ok(net) => net,
        Err(err) => {
            summary.record_error("load", err);
            return summary;
        }
    };
    net.log_diagnostics();
    summary.net = Some(NetInfo::new(&net));
    summary.connectivity = Some((&net.diagnose_connectivity()).into());

    let kind = options.analysis;
    let sample_limit = options.sample_limit.unwrap_or(config.sample_limit);

    let exploration = kind.runs_explore().then(|| {
        Explorer::new()
            .with_state_limit(config.state_limit)
            .explore(&net)
    });
    if let Some(exploration) = &exploration {
        summary.explore = Some(ExploreRecord::new(&net, exploration));
    }

    if kind.runs_symbolic() {
        let explicit = exploration
            .as_ref()
            .filter(|e| !e.truncated)
            .map(|e| &e.reachable as &dyn ExplicitStates);
        match symbolic_reachability(&net, explicit) {
            Ok(report) => summary.symbolic = Some(SymbolicRecord::from(&report)),
            Err(err) => summary.record_error("symbolic", err),
        }
    }

    if kind.runs_deadlock() {
        match symbolic_or_fallback_deadlock(&net, sample_limit) {
            Ok(report) => {
                let mut record = DeadlockRecord::new(&net, &report);
                if options.traces {
                    let graph = state_graph(&net, config);
                    record = record.with_traces(&net, &graph, &report);
                }
                summary.deadlock = Some(record);
            }
            Err(err) => summary.record_error("deadlock", err),
        }
    }

    if kind.runs_ilp() {
        let bound = firing_bound(&net, options, config, exploration.as_ref());
        let report = ilp_deadlock(&net, Some(bound));
        let mut record = IlpRecord::new(&net, &report);
        if let Some(exploration) = exploration.as_ref().filter(|e| !e.truncated) {
            let verdict = report.classify_against(exploration.reachable.dead_markings(&net));
            record = record.with_verdict(verdict);
        }
        summary.ilp = Some(record);
    }

    if kind.runs_optimize() {
        if let Some(exploration) = &exploration {
            match config.place_weights(&net) {
                Ok(weights) => {
                    let report =
                        optimize_reachable(&net, exploration.reachable.markings(), &weights);
                    summary.optimization = Some(OptimizationRecord::new(&net, &report));
                }
                Err(err) => summary.record_error("optimize", format!("{err:#}")),
            }
        }
    }

    if let Some(steps) = options.simulate {
        let run = simulate(&net, steps, options.seed);
        summary.simulation = Some(SimulationRecord::new(&net, &run, options.seed));
    }

    if let Some(dir) = &options.dot_dir {
        if let Err(err) = write_dot_files(&net, dir, config) {
            summary.record_error("dot", err);
        }
    }

    summary
}

/// 命令行优先于配置；开启收紧时取完整探索的最大 BFS 深度与原上界的较小者.
fn firing_bound(
    net: &Net,
    options: &Options,
    config: &AnalysisConfig,
    exploration: Option<&Exploration>,
) -> u64 {
    let bound = options
        .firing_bound
        .or(config.firing_bound)
        .unwrap_or_else(|| default_firing_bound(net));
    match exploration.filter(|e| config.tighten_firing_bound && !e.truncated) {
        Some(exploration) => {
            let depth = exploration.reachable.max_depth() as u64;
            debug!(
                "net '{}': firing bound tightened {} -> {}",
                net.name,
                bound,
                bound.min(depth)
            );
            bound.min(depth)
        }
        None => bound,
    }
}

fn state_graph(net: &Net, config: &AnalysisConfig) -> StateGraph {
    StateGraph::with_config(
        net,
        StateGraphConfig {
            state_limit: config.state_limit,
            ..StateGraphConfig::default()
        },
    )
}

fn write_dot_files(net: &Net, dir: &Path, config: &AnalysisConfig) -> std::io::Result<()> {
    let stem = if net.name.is_empty() { "net" } else { net.name.as_str() };
    net.write_dot(dir.join(format!("{stem}.dot")))?;
    state_graph(net, config).write_dot(dir.join(format!("{stem}.states.dot")))?;
    log::info!("DOT files for '{}' written to {:?}", net.name, dir);
    Ok(())
}
