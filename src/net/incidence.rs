//! 迁移的前集/后集分解（`Pre`, `Post`），所有分析组件统一由此读取弧关系.
//!
//! 对每个迁移 `t` 保存稀疏列表 `pre(t) = {(p, w)}` 与 `post(t) = {(p, w)}`，
//! 权重为 0 的弧不记录，同一对 `(p, t)` 的平行弧权重累加。
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::ids::IndexVec;
use crate::net::structure::{Arc, ArcDirection, Weight};

pub type ArcList = SmallVec<[(PlaceId, Weight); 4]>;

/// 违反安全性（弧权重 > 1）的第一条弧.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsafeArc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub direction: ArcDirection,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incidence {
    pre: IndexVec<TransitionId, ArcList>,
    post: IndexVec<TransitionId, ArcList>,
}

impl Incidence {
    pub fn new(transitions: usize) -> Self {
        Self {
            pre: IndexVec::from_elem(ArcList::new(), transitions),
            post: IndexVec::from_elem(ArcList::new(), transitions),
        }
    }

    pub fn from_arcs<'a>(transitions: usize, arcs: impl IntoIterator<Item = &'a Arc>) -> Self {
        let mut incidence = Self::new(transitions);
        for arc in arcs {
            incidence.add_arc(arc);
        }
        incidence
    }

    pub fn push_transition(&mut self) -> TransitionId {
        self.post.push(ArcList::new());
        self.pre.push(ArcList::new())
    }

    pub fn add_arc(&mut self, arc: &Arc) {
        if arc.weight == 0 {
            return;
        }
        let list = match arc.direction {
            ArcDirection::PlaceToTransition => &mut self.pre[arc.transition],
            ArcDirection::TransitionToPlace => &mut self.post[arc.transition],
        };
        match list.iter_mut().find(|(place, _)| *place == arc.place) {
            Some((_, weight)) => *weight += arc.weight,
            None => list.push((arc.place, arc.weight)),
        }
    }

    pub fn transitions(&self) -> usize {
        self.pre.len()
    }

    pub fn pre(&self, transition: TransitionId) -> &[(PlaceId, Weight)] {
        &self.pre[transition]
    }

    pub fn post(&self, transition: TransitionId) -> &[(PlaceId, Weight)] {
        &self.post[transition]
    }

    pub fn pre_weight(&self, transition: TransitionId, place: PlaceId) -> Weight {
        lookup(&self.pre[transition], place)
    }

    pub fn post_weight(&self, transition: TransitionId, place: PlaceId) -> Weight {
        lookup(&self.post[transition], place)
    }

    /// `C[p, t] = Post[p, t] - Pre[p, t]`
    pub fn effect(&self, transition: TransitionId, place: PlaceId) -> i64 {
        self.post_weight(transition, place) as i64 - self.pre_weight(transition, place) as i64
    }

    pub fn is_safe(&self) -> bool {
        self.first_unsafe_arc().is_none()
    }

    pub fn first_unsafe_arc(&self) -> Option<UnsafeArc> {
        let scan = |lists: &IndexVec<TransitionId, ArcList>, direction: ArcDirection| {
            lists.iter_enumerated().find_map(|(transition, list)| {
                list.iter()
                    .find(|(_, weight)| *weight > 1)
                    .map(|&(place, weight)| UnsafeArc {
                        place,
                        transition,
                        weight,
                        direction,
                    })
            })
        };
        scan(&self.pre, ArcDirection::PlaceToTransition)
            .or_else(|| scan(&self.post, ArcDirection::TransitionToPlace))
    }
}

fn lookup(list: &[(PlaceId, Weight)], place: PlaceId) -> Weight {
    list.iter()
        .find(|(candidate, _)| *candidate == place)
        .map(|(_, weight)| *weight)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ids::Idx;

    fn p(i: usize) -> PlaceId {
        PlaceId::from_usize(i)
    }

    fn t(i: usize) -> TransitionId {
        TransitionId::from_usize(i)
    }

    #[test]
    fn parallel_arcs_accumulate() {
        let arcs = [Arc::input(p(0), t(0), 1), Arc::input(p(0), t(0), 1)];
        let incidence = Incidence::from_arcs(1, arcs.iter());
        assert_eq!(incidence.pre_weight(t(0), p(0)), 2);
        assert!(!incidence.is_safe());
    }

    #[test]
    fn unsafe_arc_reports_direction() {
        let arcs = [Arc::input(p(0), t(0), 1), Arc::output(p(1), t(0), 3)];
        let incidence = Incidence::from_arcs(1, arcs.iter());
        let arc = incidence.first_unsafe_arc().unwrap();
        assert_eq!(arc.place, p(1));
        assert_eq!(arc.weight, 3);
        assert_eq!(arc.direction, ArcDirection::TransitionToPlace);
    }

    #[test]
    fn zero_weight_arcs_are_ignored() {
        let arcs = [Arc::input(p(0), t(0), 0)];
        let incidence = Incidence::from_arcs(1, arcs.iter());
        assert!(incidence.pre(t(0)).is_empty());
        assert!(incidence.is_safe());
    }

    #[test]
    fn effect_of_self_loop_is_zero() {
        let arcs = [Arc::input(p(0), t(0), 1), Arc::output(p(0), t(0), 1)];
        let incidence = Incidence::from_arcs(1, arcs.iter());
        assert_eq!(incidence.effect(t(0), p(0)), 0);
    }
}
