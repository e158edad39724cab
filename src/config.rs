use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::PlaceWeights;
use crate::net::Net;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WeightRule {
    pub pattern: String,
    pub weight: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// 死锁见证的最大列出数量.
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    /// 变迁发生次数上界；缺省为库所数.
    #[serde(default)]
    pub firing_bound: Option<u64>,
    /// 显式探索完成后用最大 BFS 深度收紧发生次数上界.
    #[serde(default)]
    pub tighten_firing_bound: bool,
    #[serde(default)]
    pub state_limit: Option<usize>,
    #[serde(default = "default_weight")]
    pub default_weight: i64,
    #[serde(default = "default_weight_rules")]
    pub weight_rules: Vec<WeightRule>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_limit: default_sample_limit(),
            firing_bound: None,
            tighten_firing_bound: false,
            state_limit: None,
            default_weight: default_weight(),
            weight_rules: default_weight_rules(),
        }
    }
}

impl AnalysisConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AnalysisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// 编译权重规则并应用到 `net` 的库所上.
    pub fn place_weights(&self, net: &Net) -> Result<PlaceWeights> {
        let rules = self
            .weight_rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| (regex, rule.weight))
                    .with_context(|| format!("Invalid weight rule pattern: {}", rule.pattern))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PlaceWeights::from_rules(net, self.default_weight, &rules))
    }
}

// Places where finished work accumulates score higher by default.
static DEFAULT_RULES: Lazy<Vec<WeightRule>> = Lazy::new(|| {
    vec![
        WeightRule {
            pattern: r"(?i)collect".to_string(),
            weight: 5,
        },
        WeightRule {
            pattern: r"(?i)(terminal|final|done|sink)".to_string(),
            weight: 5,
        },
        WeightRule {
            pattern: r"(?i)(quality|qc|check)".to_string(),
            weight: 5,
        },
    ]
});

fn default_sample_limit() -> usize {
    10
}

fn default_weight() -> i64 {
    1
}

fn default_weight_rules() -> Vec<WeightRule> {
    DEFAULT_RULES.clone()
}
