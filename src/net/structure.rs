//! P/T 网静态结构元素：库所、迁移、弧与标识。
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::core::Net;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::ids::IndexVec;

pub type Weight = u64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    /// 初始 token 数 `M0[p]`.
    pub tokens: Weight,
}

impl Place {
    pub fn new(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub direction: ArcDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

impl Arc {
    pub fn new(
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
        direction: ArcDirection,
    ) -> Self {
        Self {
            place,
            transition,
            weight,
            direction,
        }
    }

    pub fn input(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::PlaceToTransition)
    }

    pub fn output(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::TransitionToPlace)
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            ArcDirection::PlaceToTransition => {
                write!(f, "Arc({:?} -[{}]-> {:?})", self.place, self.weight, self.transition)
            }
            ArcDirection::TransitionToPlace => {
                write!(f, "Arc({:?} -[{}]-> {:?})", self.transition, self.weight, self.place)
            }
        }
    }
}

/// 标识：按库所顺序排列的 token 向量。相等与哈希均按精确取值。
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marking(pub IndexVec<PlaceId, Weight>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Weight>) -> Self {
        Self(tokens)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &Weight)> {
        self.0.iter_enumerated()
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Weight {
        &mut self.0[place]
    }

    pub fn total_tokens(&self) -> Weight {
        self.0.iter().sum()
    }

    /// Every place holds 0 or 1 token.
    pub fn is_boolean(&self) -> bool {
        self.0.iter().all(|tokens| *tokens <= 1)
    }

    pub fn as_slice(&self) -> &[Weight] {
        self.0.as_slice()
    }

    pub fn into_inner(self) -> IndexVec<PlaceId, Weight> {
        self.0
    }

    /// `place name -> tokens`，保持网中的库所顺序。
    pub fn to_named(&self, net: &Net) -> IndexMap<String, Weight> {
        net.places
            .iter_enumerated()
            .map(|(place, info)| (info.name.clone(), self.tokens(place)))
            .collect()
    }

    /// Compact `name:tokens` rendering, skipping empty places.
    pub fn display<'a>(&'a self, net: &'a Net) -> MarkingDisplay<'a> {
        MarkingDisplay { marking: self, net }
    }
}

impl From<Vec<Weight>> for Marking {
    fn from(tokens: Vec<Weight>) -> Self {
        Self(IndexVec::from_vec(tokens))
    }
}

impl Hash for Marking {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_slice().hash(state);
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

pub struct MarkingDisplay<'a> {
    marking: &'a Marking,
    net: &'a Net,
}

impl fmt::Display for MarkingDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (place, tokens) in self.marking.iter() {
            if *tokens == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            let name = self
                .net
                .places
                .get(place)
                .map(|p| p.name.as_str())
                .unwrap_or("?");
            write!(f, "{}:{}", name, tokens)?;
        }
        write!(f, "}}")
    }
}
