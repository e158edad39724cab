//! 可达集上的加权优化：`max Σ w[p]·M[p]`，并列时保留最先出现的标识。
use std::fmt;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Serialize;

use crate::net::{IndexVec, Marking, Net, PlaceId};

/// 每个库所的整数权重，默认全为 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceWeights(IndexVec<PlaceId, i64>);

impl PlaceWeights {
    pub fn uniform(net: &Net, weight: i64) -> Self {
        Self(IndexVec::from_elem(weight, net.places_len()))
    }

    /// Overrides the weight of the place called `name`; unknown names are ignored.
    pub fn with_override(mut self, net: &Net, name: &str, weight: i64) -> Self {
        match net.place_by_name(name) {
            Some(place) => self.0[place] = weight,
            None => log::warn!("weight override for unknown place `{name}` ignored"),
        }
        self
    }

    /// 按规则顺序匹配库所名，第一条命中的规则生效，未命中者取 `default`.
    pub fn from_rules(net: &Net, default: i64, rules: &[(Regex, i64)]) -> Self {
        Self(
            net.places
                .iter()
                .map(|place| {
                    rules
                        .iter()
                        .find(|(pattern, _)| pattern.is_match(&place.name))
                        .map_or(default, |(_, weight)| *weight)
                })
                .collect(),
        )
    }

    pub fn weight(&self, place: PlaceId) -> i64 {
        self.0.get(place).copied().unwrap_or(0)
    }

    pub fn objective(&self, marking: &Marking) -> i64 {
        marking
            .iter()
            .map(|(place, tokens)| self.weight(place) * *tokens as i64)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationStatus {
    Optimal,
    NoReachableState,
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Optimal => write!(f, "OPTIMAL"),
            OptimizationStatus::NoReachableState => write!(f, "NO_REACHABLE_STATE"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub status: OptimizationStatus,
    pub best_marking: Option<Marking>,
    pub best_value: Option<i64>,
    pub elapsed: Duration,
    pub state_count: usize,
}

pub fn optimize_reachable<'a>(
    net: &Net,
    markings: impl IntoIterator<Item = &'a Marking>,
    weights: &PlaceWeights,
) -> OptimizationReport {
    let start = Instant::now();
    let mut best: Option<(&Marking, i64)> = None;
    let mut state_count = 0usize;

    for marking in markings {
        state_count += 1;
        let value = weights.objective(marking);
        if best.is_none_or(|(_, current)| value > current) {
            best = Some((marking, value));
        }
    }

    let report = match best {
        Some((marking, value)) => OptimizationReport {
            status: OptimizationStatus::Optimal,
            best_marking: Some(marking.clone()),
            best_value: Some(value),
            elapsed: start.elapsed(),
            state_count,
        },
        None => OptimizationReport {
            status: OptimizationStatus::NoReachableState,
            best_marking: None,
            best_value: None,
            elapsed: Duration::ZERO,
            state_count: 0,
        },
    };
    log::info!(
        "net '{}': optimizer scanned {} markings, status {}, best {:?}",
        net.name,
        report.state_count,
        report.status,
        report.best_value
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Transition};

    fn line() -> Net {
        let mut net = Net::named("line");
        let raw = net.add_place(Place::new("raw", 1));
        let buffer = net.add_place(Place::new("buffer", 0));
        let collector = net.add_place(Place::new("collector", 0));
        let t1 = net.add_transition(Transition::new("load"));
        let t2 = net.add_transition(Transition::new("store"));
        net.add_input_arc(raw, t1, 1);
        net.add_output_arc(buffer, t1, 1);
        net.add_input_arc(buffer, t2, 1);
        net.add_output_arc(collector, t2, 1);
        net
    }

    #[test]
    fn picks_heaviest_marking() {
        let net = line();
        let weights = PlaceWeights::uniform(&net, 1).with_override(&net, "collector", 5);
        let markings = [
            Marking::from(vec![1, 0, 0]),
            Marking::from(vec![0, 1, 0]),
            Marking::from(vec![0, 0, 1]),
        ];
        let report = optimize_reachable(&net, &markings, &weights);
        assert_eq!(report.status, OptimizationStatus::Optimal);
        assert_eq!(report.best_value, Some(5));
        assert_eq!(report.best_marking, Some(Marking::from(vec![0, 0, 1])));
        assert_eq!(report.state_count, 3);
    }

    #[test]
    fn ties_keep_first_occurrence() {
        let net = line();
        let weights = PlaceWeights::uniform(&net, 1);
        let markings = [Marking::from(vec![0, 1, 0]), Marking::from(vec![1, 0, 0])];
        let report = optimize_reachable(&net, &markings, &weights);
        assert_eq!(report.best_marking, Some(Marking::from(vec![0, 1, 0])));
        assert_eq!(report.best_value, Some(1));
    }

    #[test]
    fn empty_input_reports_no_state() {
        let net = line();
        let report = optimize_reachable(&net, &[], &PlaceWeights::uniform(&net, 1));
        assert_eq!(report.status, OptimizationStatus::NoReachableState);
        assert_eq!(report.best_marking, None);
        assert_eq!(report.best_value, None);
        assert_eq!(report.state_count, 0);
    }

    #[test]
    fn first_matching_rule_wins() {
        let net = line();
        let rules = vec![
            (Regex::new("^coll").unwrap(), 7),
            (Regex::new("o").unwrap(), 3),
        ];
        let weights = PlaceWeights::from_rules(&net, 1, &rules);
        let raw = net.place_by_name("raw").unwrap();
        let collector = net.place_by_name("collector").unwrap();
        assert_eq!(weights.weight(raw), 1);
        assert_eq!(weights.weight(collector), 7);
    }

    #[test]
    fn negative_weights_are_allowed() {
        let net = line();
        let weights = PlaceWeights::uniform(&net, 1).with_override(&net, "raw", -2);
        assert_eq!(weights.objective(&Marking::from(vec![1, 1, 0])), -1);
    }
}
