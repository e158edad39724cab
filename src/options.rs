//! Parsing Options.
//! `pn-analyze [OPTIONS] <NET>...`, `-k` selects the analysis stages.

use clap::{Arg, ArgAction, Command, value_parser};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnalysisKind {
    All,
    Explore,
    Symbolic,
    Deadlock,
    Ilp,
    Optimize,
}

impl AnalysisKind {
    /// `optimize` 需要显式可达集，因此隐含 `explore`.
    pub fn runs_explore(self) -> bool {
        matches!(
            self,
            AnalysisKind::All | AnalysisKind::Explore | AnalysisKind::Optimize
        )
    }

    pub fn runs_symbolic(self) -> bool {
        matches!(self, AnalysisKind::All | AnalysisKind::Symbolic)
    }

    pub fn runs_deadlock(self) -> bool {
        matches!(self, AnalysisKind::All | AnalysisKind::Deadlock)
    }

    pub fn runs_ilp(self) -> bool {
        matches!(self, AnalysisKind::All | AnalysisKind::Ilp)
    }

    pub fn runs_optimize(self) -> bool {
        matches!(self, AnalysisKind::All | AnalysisKind::Optimize)
    }
}

fn make_options_parser() -> clap::Command {
    Command::new("pn-analyze")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Reachability, deadlock and optimization analysis for Petri nets")
        .arg(
            Arg::new("nets")
                .value_name("NET")
                .help("Net description files (.json, .ron or .pnml)")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML analysis configuration")
                .default_value("pn-analyze.toml")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("kind")
                .short('k')
                .long("analysis")
                .help("The analysis stages to run")
                .default_value("all")
                .value_parser(["all", "explore", "symbolic", "deadlock", "ilp", "optimize"]),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path to file where the JSON summary will be stored")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("sample-limit")
                .long("sample-limit")
                .value_name("N")
                .help("Maximum number of deadlock witnesses to list")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("firing-bound")
                .long("firing-bound")
                .value_name("N")
                .help("Upper bound on each transition's firing count in the ILP")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("dot")
                .long("dot")
                .value_name("DIR")
                .help("Write net and state graph DOT files into DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .value_name("STEPS")
                .help("Run a random token game of at most STEPS firings")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .default_value("0")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("traces")
                .long("traces")
                .help("Explain deadlock witnesses with shortest firing sequences")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub nets: Vec<PathBuf>,
    pub config: PathBuf,
    pub analysis: AnalysisKind,
    pub output: Option<PathBuf>,
    /// 命令行覆盖配置文件中的同名字段.
    pub sample_limit: Option<usize>,
    pub firing_bound: Option<u64>,
    pub dot_dir: Option<PathBuf>,
    pub simulate: Option<usize>,
    pub seed: u64,
    pub traces: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            nets: Vec::new(),
            config: PathBuf::from("pn-analyze.toml"),
            analysis: AnalysisKind::All,
            output: None,
            sample_limit: None,
            firing_bound: None,
            dot_dir: None,
            simulate: None,
            seed: 0,
            traces: false,
        }
    }
}

impl Options {
    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;
        let analysis = match matches.get_one::<String>("kind").map(String::as_str) {
            Some("all") => AnalysisKind::All,
            Some("explore") => AnalysisKind::Explore,
            Some("symbolic") => AnalysisKind::Symbolic,
            Some("deadlock") => AnalysisKind::Deadlock,
            Some("ilp") => AnalysisKind::Ilp,
            Some("optimize") => AnalysisKind::Optimize,
            _ => return Err("UnsupportedAnalysisKind")?,
        };

        let nets = matches
            .get_many::<PathBuf>("nets")
            .map(|paths| paths.cloned().collect())
            .unwrap_or_default();
        let config = matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("pn-analyze.toml"));

        Ok(Options {
            nets,
            config,
            analysis,
            output: matches.get_one::<PathBuf>("output").cloned(),
            sample_limit: matches.get_one::<usize>("sample-limit").copied(),
            firing_bound: matches.get_one::<u64>("firing-bound").copied(),
            dot_dir: matches.get_one::<PathBuf>("dot").cloned(),
            simulate: matches.get_one::<usize>("simulate").copied(),
            seed: matches.get_one::<u64>("seed").copied().unwrap_or(0),
            traces: matches.get_flag("traces"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn test_parse_defaults() {
        let options = Options::parse_from_args(&args("mutex.json")).unwrap();
        assert_eq!(options.nets, vec![PathBuf::from("mutex.json")]);
        assert_eq!(options.analysis, AnalysisKind::All);
        assert_eq!(options.config, PathBuf::from("pn-analyze.toml"));
        assert_eq!(options.output, None);
        assert_eq!(options.seed, 0);
        assert!(!options.traces);
    }

    #[test]
    fn test_parse_full() {
        let options = Options::parse_from_args(&args(
            "-k deadlock -o out/summary.json --sample-limit 3 --firing-bound 7 \
             --dot graphs --simulate 20 --seed 42 --traces a.json b.ron",
        ))
        .unwrap();
        assert_eq!(options.nets.len(), 2);
        assert_eq!(options.analysis, AnalysisKind::Deadlock);
        assert_eq!(options.output, Some(PathBuf::from("out/summary.json")));
        assert_eq!(options.sample_limit, Some(3));
        assert_eq!(options.firing_bound, Some(7));
        assert_eq!(options.dot_dir, Some(PathBuf::from("graphs")));
        assert_eq!(options.simulate, Some(20));
        assert_eq!(options.seed, 42);
        assert!(options.traces);
    }

    #[test]
    fn test_parse_from_args_err() {
        assert!(Options::parse_from_args(&args("-k unknown a.json")).is_err());
        assert!(Options::parse_from_args(&args("-k all")).is_err());
        assert!(Options::parse_from_args(&args("--sample-limit many a.json")).is_err());
    }

    #[test]
    fn optimize_implies_explore() {
        assert!(AnalysisKind::Optimize.runs_explore());
        assert!(!AnalysisKind::Ilp.runs_explore());
        assert!(AnalysisKind::All.runs_ilp());
        assert!(!AnalysisKind::Deadlock.runs_symbolic());
    }
}
