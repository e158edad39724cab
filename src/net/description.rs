//! 网描述记录：解析器输出的扁平结构（字符串 id + 弧列表），经结构校验后构造 [`Net`].
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::core::Net;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::{Place, Transition, Weight};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("duplicate node id `{0}`")]
    DuplicateId(String),
    #[error("arc `{arc}` references unknown node `{node}`")]
    UnknownNode { arc: String, node: String },
    #[error("invalid arc direction in `{arc}`: {from} -> {to}")]
    InvalidDirection { arc: String, from: String, to: String },
    #[error("arc `{arc}` has zero weight")]
    ZeroWeight { arc: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceDescription {
    pub id: String,
    #[serde(default, alias = "tokens")]
    pub m0: Weight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDescription {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "source")]
    pub src: String,
    pub target: String,
    #[serde(default = "default_weight", alias = "ins")]
    pub weight: Weight,
}

fn default_weight() -> Weight {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDescription {
    #[serde(default)]
    pub name: Option<String>,
    pub places: Vec<PlaceDescription>,
    #[serde(default)]
    pub transitions: Vec<TransitionDescription>,
    #[serde(default)]
    pub arcs: Vec<ArcDescription>,
}

enum Node {
    Place(PlaceId),
    Transition(TransitionId),
}

impl NetDescription {
    /// Validates ids and arc endpoints, then builds the indexed net.
    pub fn build(&self) -> Result<Net, NetError> {
        let mut net = Net::named(self.name.clone().unwrap_or_default());
        let mut nodes: FxHashMap<&str, Node> = FxHashMap::default();

        for place in &self.places {
            let id = net.add_place(Place::new(place.id.clone(), place.m0));
            if nodes.insert(place.id.as_str(), Node::Place(id)).is_some() {
                return Err(NetError::DuplicateId(place.id.clone()));
            }
        }
        for transition in &self.transitions {
            let id = net.add_transition(Transition::new(transition.id.clone()));
            if nodes
                .insert(transition.id.as_str(), Node::Transition(id))
                .is_some()
            {
                return Err(NetError::DuplicateId(transition.id.clone()));
            }
        }

        for (index, arc) in self.arcs.iter().enumerate() {
            let arc_name = arc.id.clone().unwrap_or_else(|| format!("#{index}"));
            let resolve = |node: &str| {
                nodes.get(node).ok_or_else(|| NetError::UnknownNode {
                    arc: arc_name.clone(),
                    node: node.to_string(),
                })
            };
            let source = resolve(&arc.src)?;
            let target = resolve(&arc.target)?;
            if arc.weight == 0 {
                return Err(NetError::ZeroWeight { arc: arc_name });
            }
            match (source, target) {
                (Node::Place(place), Node::Transition(transition)) => {
                    net.add_input_arc(*place, *transition, arc.weight)
                }
                (Node::Transition(transition), Node::Place(place)) => {
                    net.add_output_arc(*place, *transition, arc.weight)
                }
                _ => {
                    return Err(NetError::InvalidDirection {
                        arc: arc_name,
                        from: arc.src.clone(),
                        to: arc.target.clone(),
                    });
                }
            }
        }

        Ok(net)
    }

    /// `M0` in place order.
    pub fn initial_vector(&self) -> Vec<Weight> {
        self.places.iter().map(|p| p.m0).collect()
    }
}

impl From<&Net> for NetDescription {
    fn from(net: &Net) -> Self {
        let arcs = net
            .transitions
            .iter_enumerated()
            .flat_map(|(transition, info)| {
                let inputs = net.incidence().pre(transition).iter().map(|&(place, weight)| {
                    ArcDescription {
                        id: None,
                        src: net.places[place].name.clone(),
                        target: info.name.clone(),
                        weight,
                    }
                });
                let outputs = net.incidence().post(transition).iter().map(|&(place, weight)| {
                    ArcDescription {
                        id: None,
                        src: info.name.clone(),
                        target: net.places[place].name.clone(),
                        weight,
                    }
                });
                inputs.chain(outputs).collect::<Vec<_>>()
            })
            .collect();

        Self {
            name: Some(net.name.clone()).filter(|name| !name.is_empty()),
            places: net
                .places
                .iter()
                .map(|place| PlaceDescription {
                    id: place.name.clone(),
                    m0: place.tokens,
                })
                .collect(),
            transitions: net
                .transitions
                .iter()
                .map(|transition| TransitionDescription {
                    id: transition.name.clone(),
                })
                .collect(),
            arcs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PLACES: &str = r#"{
        "places": [{"id": "p1", "m0": 1}, {"id": "p2", "m0": 0}],
        "transitions": [{"id": "t1"}],
        "arcs": [
            {"id": "a1", "src": "p1", "target": "t1"},
            {"id": "a2", "src": "t1", "target": "p2", "weight": 1}
        ]
    }"#;

    #[test]
    fn builds_net_from_json_record() {
        let description: NetDescription = serde_json::from_str(TWO_PLACES).unwrap();
        assert_eq!(description.initial_vector(), vec![1, 0]);
        let net = description.build().unwrap();
        assert_eq!(net.places_len(), 2);
        assert_eq!(net.transitions_len(), 1);
        assert!(net.is_safe());
        let t1 = net.transition_by_name("t1").unwrap();
        assert_eq!(net.incidence().pre(t1).len(), 1);
        assert_eq!(net.incidence().post(t1).len(), 1);
    }

    #[test]
    fn rejects_duplicate_ids_across_kinds() {
        let mut description: NetDescription = serde_json::from_str(TWO_PLACES).unwrap();
        description.transitions.push(TransitionDescription { id: "p1".into() });
        assert_eq!(
            description.build().unwrap_err(),
            NetError::DuplicateId("p1".into())
        );
    }

    #[test]
    fn rejects_same_kind_arcs_and_dangling_endpoints() {
        let mut description: NetDescription = serde_json::from_str(TWO_PLACES).unwrap();
        description.arcs.push(ArcDescription {
            id: Some("bad".into()),
            src: "p1".into(),
            target: "p2".into(),
            weight: 1,
        });
        assert!(matches!(
            description.build(),
            Err(NetError::InvalidDirection { .. })
        ));

        description.arcs.pop();
        description.arcs.push(ArcDescription {
            id: None,
            src: "t1".into(),
            target: "nowhere".into(),
            weight: 1,
        });
        assert!(matches!(
            description.build(),
            Err(NetError::UnknownNode { node, .. }) if node == "nowhere"
        ));
    }

    #[test]
    fn round_trips_through_net() {
        let description: NetDescription = serde_json::from_str(TWO_PLACES).unwrap();
        let net = description.build().unwrap();
        let rebuilt = NetDescription::from(&net).build().unwrap();
        assert_eq!(rebuilt.initial_marking(), net.initial_marking());
        assert_eq!(rebuilt.incidence(), net.incidence());
    }
}
