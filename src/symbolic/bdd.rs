//! 简化的有序二元决策图（ROBDD）管理器。
//!
//! 节点通过唯一表哈希共享（hash-consing），因此同一管理器内两个 [`BddRef`] 相等
//! 当且仅当它们表示同一布尔函数。变量序即变量编号的自然序，不做动态重排。
//!
//! 所有操作都需要 `&mut self`：结果节点可能被新建，并写入运算缓存。
use std::collections::BTreeSet;
use std::mem;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rustc_hash::{FxHashMap, FxHashSet};

/// Handle to a node of one [`BddManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BddRef(u32);

impl BddRef {
    pub const FALSE: BddRef = BddRef(0);
    pub const TRUE: BddRef = BddRef(1);

    pub fn is_false(self) -> bool {
        self == Self::FALSE
    }

    pub fn is_true(self) -> bool {
        self == Self::TRUE
    }

    pub fn is_terminal(self) -> bool {
        self.0 <= 1
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// 终端节点的变量号，排在所有真实变量之后.
const TERMINAL_VAR: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Node {
    var: u32,
    low: BddRef,
    high: BddRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum BinOp {
    And,
    Or,
    /// `a ∧ ¬b`
    Diff,
    Xor,
}

impl BinOp {
    fn is_commutative(self) -> bool {
        !matches!(self, BinOp::Diff)
    }
}

/// A set of variables registered with the manager, used for quantification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarSet(usize);

#[derive(Debug, Default)]
struct VarSetData {
    vars: Vec<u32>,
    members: FxHashSet<u32>,
}

#[derive(Debug)]
pub struct BddManager {
    nodes: Vec<Node>,
    unique: FxHashMap<Node, BddRef>,
    apply_cache: FxHashMap<(BinOp, BddRef, BddRef), BddRef>,
    not_cache: FxHashMap<BddRef, BddRef>,
    quant_cache: FxHashMap<(BddRef, BddRef, VarSet), BddRef>,
    var_sets: Vec<VarSetData>,
    num_vars: u32,
}

impl Default for BddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BddManager {
    pub fn new() -> Self {
        let terminal = |value: BddRef| Node {
            var: TERMINAL_VAR,
            low: value,
            high: value,
        };
        Self {
            nodes: vec![terminal(BddRef::FALSE), terminal(BddRef::TRUE)],
            unique: FxHashMap::default(),
            apply_cache: FxHashMap::default(),
            not_cache: FxHashMap::default(),
            quant_cache: FxHashMap::default(),
            var_sets: Vec::new(),
            num_vars: 0,
        }
    }

    /// Number of nodes allocated so far, terminals included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn constant(&self, value: bool) -> BddRef {
        if value { BddRef::TRUE } else { BddRef::FALSE }
    }

    fn node(&self, f: BddRef) -> Node {
        self.nodes[f.index()]
    }

    /// Top variable of `f`; terminals report `u32::MAX`.
    pub fn var_of(&self, f: BddRef) -> u32 {
        self.node(f).var
    }

    pub fn low(&self, f: BddRef) -> BddRef {
        self.node(f).low
    }

    pub fn high(&self, f: BddRef) -> BddRef {
        self.node(f).high
    }

    fn mk(&mut self, var: u32, low: BddRef, high: BddRef) -> BddRef {
        if low == high {
            return low;
        }
        let node = Node { var, low, high };
        if let Some(&existing) = self.unique.get(&node) {
            return existing;
        }
        let id = BddRef(self.nodes.len() as u32);
        self.nodes.push(node);
        self.unique.insert(node, id);
        id
    }

    fn touch_var(&mut self, var: u32) {
        debug_assert!(var != TERMINAL_VAR);
        self.num_vars = self.num_vars.max(var + 1);
    }

    /// 变量 `x_var` 的正文字.
    pub fn mk_var(&mut self, var: u32) -> BddRef {
        self.touch_var(var);
        self.mk(var, BddRef::FALSE, BddRef::TRUE)
    }

    /// 变量 `x_var` 的负文字.
    pub fn mk_nvar(&mut self, var: u32) -> BddRef {
        self.touch_var(var);
        self.mk(var, BddRef::TRUE, BddRef::FALSE)
    }

    pub fn mk_literal(&mut self, var: u32, value: bool) -> BddRef {
        if value {
            self.mk_var(var)
        } else {
            self.mk_nvar(var)
        }
    }

    pub fn apply_not(&mut self, f: BddRef) -> BddRef {
        if f.is_terminal() {
            return if f.is_true() {
                BddRef::FALSE
            } else {
                BddRef::TRUE
            };
        }
        if let Some(&cached) = self.not_cache.get(&f) {
            return cached;
        }
        let Node { var, low, high } = self.node(f);
        let low = self.apply_not(low);
        let high = self.apply_not(high);
        let result = self.mk(var, low, high);
        self.not_cache.insert(f, result);
        result
    }

    pub fn apply_and(&mut self, a: BddRef, b: BddRef) -> BddRef {
        self.apply(BinOp::And, a, b)
    }

    pub fn apply_or(&mut self, a: BddRef, b: BddRef) -> BddRef {
        self.apply(BinOp::Or, a, b)
    }

    /// `a ∧ ¬b`
    pub fn apply_diff(&mut self, a: BddRef, b: BddRef) -> BddRef {
        self.apply(BinOp::Diff, a, b)
    }

    pub fn apply_xor(&mut self, a: BddRef, b: BddRef) -> BddRef {
        self.apply(BinOp::Xor, a, b)
    }

    /// `a ↔ b`
    pub fn apply_eq(&mut self, a: BddRef, b: BddRef) -> BddRef {
        let xor = self.apply_xor(a, b);
        self.apply_not(xor)
    }

    /// `if f then g else h`
    pub fn ite(&mut self, f: BddRef, g: BddRef, h: BddRef) -> BddRef {
        let then_part = self.apply_and(f, g);
        let else_part = self.apply_diff(h, f);
        self.apply_or(then_part, else_part)
    }

    fn apply_terminal(&mut self, op: BinOp, a: BddRef, b: BddRef) -> Option<BddRef> {
        use BddRef as R;
        let result = match op {
            BinOp::And => {
                if a.is_false() || b.is_false() {
                    R::FALSE
                } else if a.is_true() || a == b {
                    b
                } else if b.is_true() {
                    a
                } else {
                    return None;
                }
            }
            BinOp::Or => {
                if a.is_true() || b.is_true() {
                    R::TRUE
                } else if a.is_false() || a == b {
                    b
                } else if b.is_false() {
                    a
                } else {
                    return None;
                }
            }
            BinOp::Diff => {
                if a.is_false() || b.is_true() || a == b {
                    R::FALSE
                } else if b.is_false() {
                    a
                } else if a.is_true() {
                    self.apply_not(b)
                } else {
                    return None;
                }
            }
            BinOp::Xor => {
                if a == b {
                    R::FALSE
                } else if a.is_false() {
                    b
                } else if b.is_false() {
                    a
                } else if a.is_true() {
                    self.apply_not(b)
                } else if b.is_true() {
                    self.apply_not(a)
                } else {
                    return None;
                }
            }
        };
        Some(result)
    }

    fn apply(&mut self, op: BinOp, a: BddRef, b: BddRef) -> BddRef {
        if let Some(result) = self.apply_terminal(op, a, b) {
            return result;
        }
        let key = if op.is_commutative() && b < a {
            (op, b, a)
        } else {
            (op, a, b)
        };
        if let Some(&cached) = self.apply_cache.get(&key) {
            return cached;
        }

        let (na, nb) = (self.node(a), self.node(b));
        let var = na.var.min(nb.var);
        let (a0, a1) = if na.var == var { (na.low, na.high) } else { (a, a) };
        let (b0, b1) = if nb.var == var { (nb.low, nb.high) } else { (b, b) };
        let low = self.apply(op, a0, b0);
        let high = self.apply(op, a1, b1);
        let result = self.mk(var, low, high);
        self.apply_cache.insert(key, result);
        result
    }

    /// 注册一个变量集合，供 [`exists`](Self::exists) / [`and_exists`](Self::and_exists) 使用.
    pub fn var_set(&mut self, vars: impl IntoIterator<Item = u32>) -> VarSet {
        let members: FxHashSet<u32> = vars.into_iter().collect();
        let mut sorted: Vec<u32> = members.iter().copied().collect();
        sorted.sort_unstable();
        if let Some(existing) = self.var_sets.iter().position(|data| data.vars == sorted) {
            return VarSet(existing);
        }
        for &var in &sorted {
            self.touch_var(var);
        }
        self.var_sets.push(VarSetData {
            vars: sorted,
            members,
        });
        VarSet(self.var_sets.len() - 1)
    }

    /// `∃ set. f`
    pub fn exists(&mut self, f: BddRef, set: VarSet) -> BddRef {
        self.and_exists(f, BddRef::TRUE, set)
    }

    /// 关系积 `∃ set. (f ∧ g)`，合取与量词消去一次完成，不构造中间的 `f ∧ g`.
    pub fn and_exists(&mut self, f: BddRef, g: BddRef, set: VarSet) -> BddRef {
        if f.is_false() || g.is_false() {
            return BddRef::FALSE;
        }
        if f.is_true() && g.is_true() {
            return BddRef::TRUE;
        }
        let (f, g) = if g < f { (g, f) } else { (f, g) };

        let (nf, ng) = (self.node(f), self.node(g));
        let var = nf.var.min(ng.var);
        let last = self.var_sets[set.0].vars.last().copied();
        if last.is_none_or(|last| var > last) {
            return self.apply_and(f, g);
        }

        let key = (f, g, set);
        if let Some(&cached) = self.quant_cache.get(&key) {
            return cached;
        }

        let (f0, f1) = if nf.var == var { (nf.low, nf.high) } else { (f, f) };
        let (g0, g1) = if ng.var == var { (ng.low, ng.high) } else { (g, g) };
        let result = if self.var_sets[set.0].members.contains(&var) {
            let low = self.and_exists(f0, g0, set);
            if low.is_true() {
                BddRef::TRUE
            } else {
                let high = self.and_exists(f1, g1, set);
                self.apply_or(low, high)
            }
        } else {
            let low = self.and_exists(f0, g0, set);
            let high = self.and_exists(f1, g1, set);
            self.mk(var, low, high)
        };
        self.quant_cache.insert(key, result);
        result
    }

    /// 变量替换 `f[x_v := x_map(v)]`，未出现在映射中的变量保持不变.
    ///
    /// 新变量仍位于两个子图顶变量之前时直接建节点（`next → cur` 属于这种情况），
    /// 否则退回 ITE 重建，因此映射不必保持变量序.
    pub fn rename(&mut self, f: BddRef, mapping: &FxHashMap<u32, u32>) -> BddRef {
        let mut cache = FxHashMap::default();
        self.rename_rec(f, mapping, &mut cache)
    }

    fn rename_rec(
        &mut self,
        f: BddRef,
        mapping: &FxHashMap<u32, u32>,
        cache: &mut FxHashMap<BddRef, BddRef>,
    ) -> BddRef {
        if f.is_terminal() {
            return f;
        }
        if let Some(&cached) = cache.get(&f) {
            return cached;
        }
        let Node { var, low, high } = self.node(f);
        let low = self.rename_rec(low, mapping, cache);
        let high = self.rename_rec(high, mapping, cache);
        let target = mapping.get(&var).copied().unwrap_or(var);
        let result = if target < self.var_of(low) && target < self.var_of(high) {
            self.touch_var(target);
            self.mk(target, low, high)
        } else {
            let literal = self.mk_var(target);
            self.ite(literal, high, low)
        };
        cache.insert(f, result);
        result
    }

    /// 在 `f` 中出现的全部变量.
    pub fn support(&self, f: BddRef) -> BTreeSet<u32> {
        let mut support = BTreeSet::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![f];
        while let Some(node) = stack.pop() {
            if node.is_terminal() || !seen.insert(node) {
                continue;
            }
            let Node { var, low, high } = self.node(node);
            support.insert(var);
            stack.push(low);
            stack.push(high);
        }
        support
    }

    /// 以 `f` 为根的 DAG 中的不同节点数（含终端）.
    pub fn node_count(&self, f: BddRef) -> usize {
        let mut seen = FxHashSet::default();
        let mut stack = vec![f];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) || node.is_terminal() {
                continue;
            }
            let Node { low, high, .. } = self.node(node);
            stack.push(low);
            stack.push(high);
        }
        seen.len()
    }

    /// 在变量集 `vars` 上的精确模型计数；若 `f` 依赖 `vars` 之外的变量则返回 `None`.
    pub fn sat_count(&self, f: BddRef, vars: &[u32]) -> Option<BigUint> {
        let mut order: Vec<u32> = vars.to_vec();
        order.sort_unstable();
        order.dedup();
        let position: FxHashMap<u32, usize> =
            order.iter().enumerate().map(|(pos, &var)| (var, pos)).collect();
        if !self.support(f).iter().all(|var| position.contains_key(var)) {
            return None;
        }

        let level = |node: BddRef| -> usize {
            if node.is_terminal() {
                order.len()
            } else {
                position[&self.var_of(node)]
            }
        };
        let mut memo: FxHashMap<BddRef, BigUint> = FxHashMap::default();
        let count = self.count_rec(f, &level, &mut memo);
        Some(count << level(f))
    }

    fn count_rec(
        &self,
        f: BddRef,
        level: &dyn Fn(BddRef) -> usize,
        memo: &mut FxHashMap<BddRef, BigUint>,
    ) -> BigUint {
        if f.is_false() {
            return BigUint::zero();
        }
        if f.is_true() {
            return BigUint::one();
        }
        if let Some(count) = memo.get(&f) {
            return count.clone();
        }
        let Node { low, high, .. } = self.node(f);
        let here = level(f);
        let low_count = self.count_rec(low, level, memo) << (level(low) - here - 1);
        let high_count = self.count_rec(high, level, memo) << (level(high) - here - 1);
        let count = low_count + high_count;
        memo.insert(f, count.clone());
        count
    }

    /// 按变量升序枚举 `f` 在 `vars` 上的完整赋值（0 先于 1，无关变量展开），最多 `limit` 个.
    ///
    /// `vars` 之外的变量先被存在量化消去.
    pub fn sat_assignments(&mut self, f: BddRef, vars: &[u32], limit: usize) -> Vec<Vec<bool>> {
        let mut order: Vec<u32> = vars.to_vec();
        order.sort_unstable();
        order.dedup();

        let extra: Vec<u32> = self
            .support(f)
            .into_iter()
            .filter(|var| order.binary_search(var).is_err())
            .collect();
        let f = if extra.is_empty() {
            f
        } else {
            let set = self.var_set(extra);
            self.exists(f, set)
        };

        let mut out = Vec::new();
        let mut current = vec![false; order.len()];
        self.walk_assignments(f, &order, 0, &mut current, &mut out, limit);
        out
    }

    fn walk_assignments(
        &self,
        f: BddRef,
        order: &[u32],
        pos: usize,
        current: &mut Vec<bool>,
        out: &mut Vec<Vec<bool>>,
        limit: usize,
    ) {
        if out.len() >= limit || f.is_false() {
            return;
        }
        if pos == order.len() {
            if f.is_true() {
                out.push(current.clone());
            }
            return;
        }
        let node = self.node(f);
        let (low, high) = if node.var == order[pos] {
            (node.low, node.high)
        } else {
            (f, f)
        };
        current[pos] = false;
        self.walk_assignments(low, order, pos + 1, current, out, limit);
        current[pos] = true;
        self.walk_assignments(high, order, pos + 1, current, out, limit);
        current[pos] = false;
    }

    /// Evaluates `f` under `assignment`.
    pub fn eval(&self, f: BddRef, assignment: impl Fn(u32) -> bool) -> bool {
        let mut node = f;
        while !node.is_terminal() {
            let Node { var, low, high } = self.node(node);
            node = if assignment(var) { high } else { low };
        }
        node.is_true()
    }

    /// 节点表、唯一表与各缓存的近似内存占用（字节）.
    pub fn memory_bytes(&self) -> usize {
        let node = mem::size_of::<Node>();
        let handle = mem::size_of::<BddRef>();
        self.nodes.capacity() * node
            + self.unique.capacity() * (node + handle)
            + self.apply_cache.capacity() * (mem::size_of::<(BinOp, BddRef, BddRef)>() + handle)
            + self.not_cache.capacity() * 2 * handle
            + self.quant_cache.capacity()
                * (mem::size_of::<(BddRef, BddRef, VarSet)>() + handle)
    }

    /// `f` 自身 DAG 的近似内存占用（字节），与管理器中的其他节点无关.
    pub fn memory_bytes_of(&self, f: BddRef) -> usize {
        self.node_count(f) * mem::size_of::<Node>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_consing_gives_canonical_handles() {
        let mut bdd = BddManager::new();
        let x = bdd.mk_var(0);
        let y = bdd.mk_var(1);
        let xy = bdd.apply_and(x, y);
        let yx = bdd.apply_and(y, x);
        assert_eq!(xy, yx);

        // De Morgan: ¬(x ∧ y) == ¬x ∨ ¬y
        let lhs = bdd.apply_not(xy);
        let nx = bdd.apply_not(x);
        let ny = bdd.apply_not(y);
        let rhs = bdd.apply_or(nx, ny);
        assert_eq!(lhs, rhs);

        let taut = bdd.apply_or(x, nx);
        assert_eq!(taut, BddRef::TRUE);
        assert_eq!(bdd.apply_diff(x, x), BddRef::FALSE);
    }

    #[test]
    fn counts_models_over_requested_vars() {
        let mut bdd = BddManager::new();
        let x = bdd.mk_var(0);
        let z = bdd.mk_var(2);
        let f = bdd.apply_or(x, z);
        assert_eq!(bdd.sat_count(f, &[0, 2]), Some(BigUint::from(3u32)));
        assert_eq!(bdd.sat_count(f, &[0, 1, 2]), Some(BigUint::from(6u32)));
        assert_eq!(bdd.sat_count(f, &[0]), None);
        assert_eq!(bdd.sat_count(BddRef::TRUE, &[0, 1, 2, 3]), Some(BigUint::from(16u32)));
        assert_eq!(bdd.sat_count(BddRef::FALSE, &[0]), Some(BigUint::zero()));
    }

    #[test]
    fn relational_product_matches_conjunction_then_exists() {
        let mut bdd = BddManager::new();
        let a = bdd.mk_var(0);
        let b = bdd.mk_var(1);
        let c = bdd.mk_var(2);
        let ab = bdd.apply_eq(a, b);
        let bc = bdd.apply_xor(b, c);
        let set = bdd.var_set([1]);

        let fused = bdd.and_exists(ab, bc, set);
        let conj = bdd.apply_and(ab, bc);
        let separate = bdd.exists(conj, set);
        assert_eq!(fused, separate);

        // ∃b. (a ↔ b) ∧ (b ⊕ c) == a ⊕ c
        let expected = bdd.apply_xor(a, c);
        assert_eq!(fused, expected);
    }

    #[test]
    fn rename_moves_function_between_vars() {
        let mut bdd = BddManager::new();
        let x1 = bdd.mk_var(1);
        let nx3 = bdd.mk_nvar(3);
        let f = bdd.apply_and(x1, nx3);
        let mapping: FxHashMap<u32, u32> = [(1, 0), (3, 2)].into_iter().collect();
        let renamed = bdd.rename(f, &mapping);

        let x0 = bdd.mk_var(0);
        let nx2 = bdd.mk_nvar(2);
        let expected = bdd.apply_and(x0, nx2);
        assert_eq!(renamed, expected);
        assert_eq!(bdd.support(renamed), BTreeSet::from([0, 2]));
        assert_eq!(bdd.node_count(renamed), bdd.node_count(f));
    }

    #[test]
    fn rename_against_variable_order_falls_back_to_ite() {
        let mut bdd = BddManager::new();
        let x0 = bdd.mk_var(0);
        let nx1 = bdd.mk_nvar(1);
        let f = bdd.apply_and(x0, nx1);
        // x0 移到 x1 之后，直接建节点会破坏变量序
        let mapping: FxHashMap<u32, u32> = [(0, 5)].into_iter().collect();
        let renamed = bdd.rename(f, &mapping);

        let x5 = bdd.mk_var(5);
        let expected = bdd.apply_and(x5, nx1);
        assert_eq!(renamed, expected);
        assert_eq!(bdd.var_of(renamed), 1);
        assert_eq!(bdd.num_vars(), 6);
    }

    #[test]
    fn assignments_expand_dont_cares_in_order() {
        let mut bdd = BddManager::new();
        let f = bdd.mk_var(2);
        let all = bdd.sat_assignments(f, &[0, 2], 10);
        assert_eq!(all, vec![vec![false, true], vec![true, true]]);

        let limited = bdd.sat_assignments(BddRef::TRUE, &[0, 1], 3);
        assert_eq!(
            limited,
            vec![vec![false, false], vec![false, true], vec![true, false]]
        );
        assert!(bdd.sat_assignments(BddRef::FALSE, &[0], 5).is_empty());
    }

    #[test]
    fn eval_and_node_count() {
        let mut bdd = BddManager::new();
        let x = bdd.mk_var(0);
        let y = bdd.mk_var(1);
        let f = bdd.apply_xor(x, y);
        assert!(bdd.eval(f, |var| var == 0));
        assert!(!bdd.eval(f, |_| true));
        // x node, two y nodes, two terminals
        assert_eq!(bdd.node_count(f), 5);
        assert_eq!(bdd.node_count(BddRef::TRUE), 1);
    }
}
