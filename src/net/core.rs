//! 运行时: 可发生集、发生语义与连通性诊断.
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use itertools::Itertools;
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::ids::{Idx, IndexVec};
use crate::net::structure::{Arc, Marking, Place, Transition, Weight};

#[derive(Debug, Error)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
}

/// Petri 网连通性诊断报告
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    /// 孤立库所（无任何连接的弧）
    pub isolated_places: Vec<(PlaceId, String)>,
    /// 孤立变迁（无任何连接的弧）
    pub isolated_transitions: Vec<(TransitionId, String)>,
    /// 前集为空的变迁：始终可发生，网不可能死锁
    pub source_transitions: Vec<(TransitionId, String)>,
    pub warnings: Vec<String>,
    pub total_places: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.isolated_transitions.is_empty()
            || !self.source_transitions.is_empty()
            || !self.warnings.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Net {
    pub name: String,
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    arcs: Vec<Arc>,
    incidence: Incidence,
}

impl Net {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        self.places.push(place)
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let id = self.transitions.push(transition);
        let mirrored = self.incidence.push_transition();
        debug_assert_eq!(id, mirrored);
        id
    }

    /// 输入弧: place -> transition
    pub fn add_input_arc(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        self.add_arc(Arc::input(place, transition, weight));
    }

    /// 输出弧: transition -> place
    pub fn add_output_arc(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        self.add_arc(Arc::output(place, transition, weight));
    }

    pub fn add_arc(&mut self, arc: Arc) {
        if arc.weight == 0 {
            return;
        }
        self.incidence.add_arc(&arc);
        self.arcs.push(arc);
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn place_by_name(&self, name: &str) -> Option<PlaceId> {
        self.places
            .iter_enumerated()
            .find(|(_, place)| place.name == name)
            .map(|(id, _)| id)
    }

    pub fn transition_by_name(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter_enumerated()
            .find(|(_, transition)| transition.name == name)
            .map(|(id, _)| id)
    }

    pub fn initial_marking(&self) -> Marking {
        Marking::new(self.places.iter().map(|p| p.tokens).collect())
    }

    pub fn incidence(&self) -> &Incidence {
        &self.incidence
    }

    /// 弧权重均为 0/1.
    pub fn is_safe(&self) -> bool {
        self.incidence.is_safe()
    }

    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if transition.index() >= self.transitions_len() {
            return false;
        }
        self.incidence
            .pre(transition)
            .iter()
            .all(|&(place, weight)| marking.tokens(place) >= weight)
    }

    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|&transition| self.is_enabled(transition, marking))
            .collect()
    }

    /// `M' = M - Pre[:, t] + Post[:, t]`
    pub fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        if transition.index() >= self.transitions_len() {
            return Err(FireError::OutOfBounds(transition));
        }
        if !self.is_enabled(transition, marking) {
            return Err(FireError::NotEnabled(transition));
        }

        let mut next = marking.clone();
        for &(place, weight) in self.incidence.pre(transition) {
            *next.tokens_mut(place) -= weight;
        }
        for &(place, weight) in self.incidence.post(transition) {
            *next.tokens_mut(place) += weight;
        }
        Ok(next)
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(&mut dot, "digraph PetriNet {{");
        let _ = writeln!(&mut dot, "    rankdir=LR;");
        let _ = writeln!(&mut dot, "    node [fontname=\"Helvetica\"];");

        for (place_id, place) in self.places.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    place_{} [label=\"{}\\n{}\", shape=circle, style=filled, fillcolor=\"#e3f2fd\"];",
                place_id.index(),
                escape_label(&place.name),
                place.tokens
            );
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    trans_{} [label=\"{}\", shape=box, style=filled, fillcolor=\"#ffe0b2\"];",
                transition_id.index(),
                escape_label(&transition.name)
            );
        }

        for transition in self.transitions.indices() {
            let trans_node = format!("trans_{}", transition.index());
            for &(place, weight) in self.incidence.pre(transition) {
                let place_node = format!("place_{}", place.index());
                write_edge(&mut dot, &place_node, &trans_node, weight);
            }
            for &(place, weight) in self.incidence.post(transition) {
                let place_node = format!("place_{}", place.index());
                write_edge(&mut dot, &trans_node, &place_node, weight);
            }
        }

        let _ = writeln!(&mut dot, "}}");
        dot
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_dot())
    }

    /// 检测孤立节点、源变迁（前集为空）与汇变迁（后集为空）
    pub fn diagnose_connectivity(&self) -> DiagnosticReport {
        let mut report = DiagnosticReport {
            total_places: self.places_len(),
            total_transitions: self.transitions_len(),
            ..DiagnosticReport::default()
        };

        let mut has_input = IndexVec::<PlaceId, bool>::from_elem(false, self.places_len());
        let mut has_output = IndexVec::<PlaceId, bool>::from_elem(false, self.places_len());
        for transition in self.transitions.indices() {
            for &(place, _) in self.incidence.pre(transition) {
                has_output[place] = true;
            }
            for &(place, _) in self.incidence.post(transition) {
                has_input[place] = true;
            }
        }

        for (place_id, place) in self.places.iter_enumerated() {
            if !has_input[place_id] && !has_output[place_id] {
                report.isolated_places.push((place_id, place.name.clone()));
            } else if !has_input[place_id] && place.tokens == 0 {
                report.warnings.push(format!(
                    "库所 '{}' 无输入弧且初始标识为 0, 永远不会被标记",
                    place.name
                ));
            }
        }

        for (trans_id, trans) in self.transitions.iter_enumerated() {
            let preset = self.incidence.pre(trans_id);
            let postset = self.incidence.post(trans_id);
            match (preset.is_empty(), postset.is_empty()) {
                (true, true) => report.isolated_transitions.push((trans_id, trans.name.clone())),
                (true, false) => report.source_transitions.push((trans_id, trans.name.clone())),
                (false, true) => report.warnings.push(format!(
                    "变迁 '{}' 无后置库所, 检查是否为预期行为",
                    trans.name
                )),
                (false, false) => {}
            }
        }

        report
    }

    pub fn log_diagnostics(&self) {
        let report = self.diagnose_connectivity();
        if !report.has_issues() {
            log::info!(
                "net '{}': connectivity check passed ({} places, {} transitions)",
                self.name,
                report.total_places,
                report.total_transitions
            );
            return;
        }

        if !report.isolated_places.is_empty() {
            log::warn!(
                "发现 {} 个孤立库所: {}",
                report.isolated_places.len(),
                report.isolated_places.iter().map(|(_, name)| name).join(", ")
            );
        }
        if !report.isolated_transitions.is_empty() {
            log::warn!(
                "发现 {} 个孤立变迁: {}",
                report.isolated_transitions.len(),
                report.isolated_transitions.iter().map(|(_, name)| name).join(", ")
            );
        }
        if !report.source_transitions.is_empty() {
            log::warn!(
                "source transitions are always enabled, the net cannot deadlock: {}",
                report.source_transitions.iter().map(|(_, name)| name).join(", ")
            );
        }
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }
    }
}

fn write_edge(dot: &mut String, from: &str, to: &str, weight: Weight) {
    if weight == 1 {
        let _ = writeln!(dot, "    {} -> {};", from, to);
    } else {
        let _ = writeln!(dot, "    {} -> {} [label=\"{}\"];", from, to, weight);
    }
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer_consumer() -> (Net, PlaceId, PlaceId, TransitionId) {
        let mut net = Net::named("pc");
        let buffer = net.add_place(Place::new("buffer", 0));
        let ready = net.add_place(Place::new("ready", 2));
        let produce = net.add_transition(Transition::new("produce"));
        net.add_input_arc(ready, produce, 2);
        net.add_output_arc(buffer, produce, 3);
        (net, buffer, ready, produce)
    }

    #[test]
    fn general_firing_rule_uses_weights() {
        let (net, buffer, ready, produce) = producer_consumer();
        let m0 = net.initial_marking();
        assert_eq!(net.enabled_transitions(&m0), vec![produce]);

        let m1 = net.fire_transition(&m0, produce).unwrap();
        assert_eq!(m1.tokens(ready), 0);
        assert_eq!(m1.tokens(buffer), 3);
        assert!(matches!(
            net.fire_transition(&m1, produce),
            Err(FireError::NotEnabled(_))
        ));
        assert!(!net.is_safe());
    }

    #[test]
    fn out_of_bounds_transition_is_rejected() {
        let (net, ..) = producer_consumer();
        let m0 = net.initial_marking();
        assert!(matches!(
            net.fire_transition(&m0, TransitionId::new(7)),
            Err(FireError::OutOfBounds(_))
        ));
    }

    #[test]
    fn diagnostics_flag_source_and_isolated_nodes() {
        let mut net = Net::empty();
        let p = net.add_place(Place::new("p", 0));
        net.add_place(Place::new("lonely", 0));
        let source = net.add_transition(Transition::new("source"));
        net.add_transition(Transition::new("idle"));
        net.add_output_arc(p, source, 1);

        let report = net.diagnose_connectivity();
        assert_eq!(report.isolated_places.len(), 1);
        assert_eq!(report.isolated_transitions.len(), 1);
        assert_eq!(report.source_transitions[0].1, "source");
        assert!(report.has_issues());
    }

    #[test]
    fn dot_contains_weighted_edge() {
        let (net, ..) = producer_consumer();
        let dot = net.to_dot();
        assert!(dot.contains("place_1 -> trans_0 [label=\"2\"]"));
        assert!(dot.contains("trans_0 -> place_0 [label=\"3\"]"));
    }
}
