//! # Petri 网核心定义（Place/Transition Net）
//!
//! 设库所集合 `P` 与迁移集合 `T`。输入/输出映射 `Pre, Post ∈ ℕ^{|P|×|T|}`
//! 以稀疏的前集/后集列表保存（见 [`Incidence`]），迁移效应为 `C = Post - Pre`。
//! 对任意标识 `M ∈ ℕ^{|P|}`：
//!
//! * 迁移 `t` **可发生** 当且仅当 `∀p: M[p] ≥ Pre[p, t]`；
//! * 发生后 `M' = M + C[:, t]`。
//!
//! 若所有弧权重均为 0/1，则称网是 *安全* 的（[`Net::is_safe`]），
//! 符号分析与严格死锁搜索只接受安全网。
//!
//! ## 示例
//!
//! ```rust
//! use pnreach::net::*;
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new("p0", 1));
//! let p1 = net.add_place(Place::new("p1", 0));
//! let t0 = net.add_transition(Transition::new("t0"));
//!
//! net.add_input_arc(p0, t0, 1);
//! net.add_output_arc(p1, t0, 1);
//!
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire_transition(&marking, t0).unwrap();
//! assert_eq!(next.tokens(p0), 0);
//! assert_eq!(next.tokens(p1), 1);
//! ```

pub mod core;
pub mod description;
pub mod ids;
pub mod incidence;
pub mod io;
pub mod structure;

pub use core::{DiagnosticReport, FireError, Net};
pub use description::{
    ArcDescription, NetDescription, NetError, PlaceDescription, TransitionDescription,
};
pub use ids::{Idx, IndexVec, PlaceId, TransitionId};
pub use incidence::{ArcList, Incidence, UnsafeArc};
pub use structure::{Arc, ArcDirection, Marking, Place, Transition, Weight};
