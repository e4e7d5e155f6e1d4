//! Monte Carlo Tree Search (MCTS) shared between search workers.
//!
//! Each node is one step away from its parent; a turn is a path of steps
//! ending in a pass child. The tree is shared through `Arc`s: statistics
//! are atomics, a node's child list sits behind a lock and is written once
//! by whichever worker expands it. Workers walk the tree with their own
//! copy of the root position, stepping and unstepping along the path.
//!
//! Weights are stored from the point of view of the side to move at the
//! root. A node's `side` is `+1` when its own side to move is the root's,
//! `-1` otherwise, and selection at a node maximises `side * mean`.
//!
//! Selection uses UCT plus the parent's policy prior:
//!
//! ```text
//! priority = side * mean + c * sqrt(ln(parent_runs + 1) / runs) + policy[step]
//! ```
//!
//! Unvisited children are tried first; ties go to the earliest child.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::constants::{POLICY_SIZE, UCT_C, WIN_SENTINEL};
use crate::eval::order_moves;
use crate::evaluator::PositionEvaluator;
use crate::movegen::{legal_steps, root_moves};
use crate::piece::Color;
use crate::position::Position;
use crate::step::{Move, Step};
use crate::table::Table;

// =============================================================================
// Policy Pool
// =============================================================================

/// Free list of policy vectors. Nodes take a vector when they get a policy
/// and hand it back when dropped.
#[derive(Default)]
pub struct PolicyPool {
    free: Mutex<Vec<Vec<f32>>>,
}

impl PolicyPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A vector of [`POLICY_SIZE`] slots. Contents are unspecified.
    pub fn take(&self) -> Vec<f32> {
        self.free
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0.0; POLICY_SIZE])
    }

    pub fn give(&self, v: Vec<f32>) {
        if v.len() == POLICY_SIZE {
            self.free.lock().push(v);
        }
    }

    /// Number of vectors waiting for reuse.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

// =============================================================================
// Tree Node
// =============================================================================

pub struct TreeNode {
    parent: Weak<TreeNode>,
    children: Mutex<Vec<Arc<TreeNode>>>,
    expanded: AtomicBool,
    /// Set when expansion found neither a legal step nor a legal pass.
    dead_end: AtomicBool,
    /// Step played to reach this node. `Pass` for the root.
    step: Step,
    /// +1 if the side to move here is the root's side to move, else -1.
    side: f64,
    /// Whether this node is still within the root's turn.
    root_turn: bool,
    /// Game-theoretic value (root point of view) of a terminal node.
    eval: Option<f64>,
    /// Sum of back-propagated values as `f64` bits.
    weight: AtomicU64,
    runs: AtomicU32,
    policy: Mutex<Option<Vec<f32>>>,
    pool: Arc<PolicyPool>,
}

impl TreeNode {
    fn new(
        parent: Weak<TreeNode>,
        step: Step,
        side: f64,
        root_turn: bool,
        leaf: Leaf,
        pool: Arc<PolicyPool>,
    ) -> Self {
        TreeNode {
            parent,
            children: Mutex::new(Vec::new()),
            expanded: AtomicBool::new(false),
            dead_end: AtomicBool::new(false),
            step,
            side,
            root_turn,
            eval: leaf.eval,
            weight: AtomicU64::new(leaf.weight.to_bits()),
            runs: AtomicU32::new(leaf.runs),
            policy: Mutex::new(leaf.policy),
            pool,
        }
    }

    #[inline]
    pub fn step(&self) -> Step {
        self.step
    }

    #[inline]
    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::Acquire)
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        f64::from_bits(self.weight.load(Ordering::Acquire))
    }

    /// Mean value from the root's point of view. A win reached within the
    /// root's turn is scaled so that selection never leaves it.
    pub fn mean(&self) -> f64 {
        if let Some(e) = self.eval {
            return if self.root_turn && e > 0.0 { e * WIN_SENTINEL } else { e };
        }
        match self.runs() {
            0 => 0.0,
            n => self.weight() / n as f64,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.eval.is_some()
    }

    #[inline]
    pub fn is_root_turn(&self) -> bool {
        self.root_turn
    }

    #[inline]
    pub fn side(&self) -> f64 {
        self.side
    }

    pub fn parent(&self) -> Option<Arc<TreeNode>> {
        self.parent.upgrade()
    }

    /// Snapshot of the children in insertion order.
    pub fn children(&self) -> Vec<Arc<TreeNode>> {
        self.children.lock().clone()
    }

    /// Snapshot of the children, most visited first. Stable.
    pub fn children_by_runs(&self) -> Vec<Arc<TreeNode>> {
        let mut v = self.children();
        v.sort_by_key(|c| std::cmp::Reverse(c.runs()));
        v
    }

    fn policy_at(&self, index: usize) -> f64 {
        self.policy
            .lock()
            .as_ref()
            .and_then(|p| p.get(index).copied())
            .unwrap_or(0.0) as f64
    }

    fn has_policy(&self) -> bool {
        self.policy.lock().is_some()
    }

    fn add(&self, value: f64, runs: u32) {
        let _ = self
            .weight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        self.runs.fetch_add(runs, Ordering::AcqRel);
    }

    /// Selection priority of this node as a child of `parent`.
    fn priority(&self, parent: &TreeNode, parent_runs: u32) -> f64 {
        let runs = self.runs();
        if runs == 0 {
            return f64::INFINITY;
        }
        let explore = UCT_C * ((parent_runs as f64 + 1.0).ln() / runs as f64).sqrt();
        parent.side * self.mean() + explore + parent.policy_at(self.step.policy_index())
    }

    /// The child to descend into, if any.
    fn select_child(&self) -> Option<Arc<TreeNode>> {
        let children = self.children.lock();
        let parent_runs = self.runs();
        let mut best: Option<(&Arc<TreeNode>, f64)> = None;
        for child in children.iter() {
            let p = child.priority(self, parent_runs);
            if best.is_none_or(|(_, b)| p > b) {
                best = Some((child, p));
            }
        }
        best.map(|(c, _)| Arc::clone(c))
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        if let Some(p) = self.policy.get_mut().take() {
            self.pool.give(p);
        }
    }
}

/// Initial statistics of a new node.
struct Leaf {
    eval: Option<f64>,
    weight: f64,
    runs: u32,
    policy: Option<Vec<f32>>,
}

/// Add `(value, runs)` to `node` and all its ancestors, root first, so a
/// parent's runs never trail the sum over its children.
fn backprop(node: &Arc<TreeNode>, value: f64, runs: u32) {
    let mut path = vec![Arc::clone(node)];
    while let Some(parent) = path.last().and_then(|n| n.parent()) {
        path.push(parent);
    }
    for n in path.iter().rev() {
        n.add(value, runs);
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Shared search tree for one root position.
pub struct Tree {
    root: Arc<TreeNode>,
    root_pos: Position,
    root_side: Color,
    pool: Arc<PolicyPool>,
    use_table: bool,
    nodes: AtomicU64,
}

impl Tree {
    /// Build a tree for `pos` and expand its root.
    pub fn new(
        pos: &Position,
        evaluator: &mut dyn PositionEvaluator,
        table: Option<&Table>,
    ) -> Self {
        let pool = PolicyPool::new();
        let root = Arc::new(TreeNode::new(
            Weak::new(),
            Step::Pass,
            1.0,
            true,
            Leaf {
                eval: None,
                weight: 0.0,
                runs: 0,
                policy: None,
            },
            Arc::clone(&pool),
        ));
        let tree = Tree {
            root,
            root_pos: pos.clone(),
            root_side: pos.side(),
            pool,
            use_table: table.is_some(),
            nodes: AtomicU64::new(1),
        };
        let mut scratch = pos.clone();
        if let Some((value, runs)) = tree.expand(&tree.root, &mut scratch, evaluator, table) {
            backprop(&tree.root, value, runs);
        }
        tree
    }

    /// Keep the tree if `pos` has the root's hash, otherwise rebuild it.
    /// Returns whether the tree was rebuilt.
    pub fn update_root(
        &mut self,
        pos: &Position,
        evaluator: &mut dyn PositionEvaluator,
        table: Option<&Table>,
    ) -> bool {
        if pos.zhash() == self.root_pos.zhash() {
            return false;
        }
        *self = Tree::new(pos, evaluator, table);
        true
    }

    #[inline]
    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    #[inline]
    pub fn root_position(&self) -> &Position {
        &self.root_pos
    }

    /// Number of nodes created so far.
    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    pub fn pool(&self) -> &Arc<PolicyPool> {
        &self.pool
    }

    /// Value in `[-1, 1]` for the root side of a position where `winner`
    /// won.
    fn terminal_value(&self, winner: Color) -> f64 {
        if winner == self.root_side { 1.0 } else { -1.0 }
    }

    /// Initial statistics for a freshly reached child position.
    fn leaf(
        &self,
        pos: &Position,
        side: f64,
        evaluator: &mut dyn PositionEvaluator,
        table: Option<&Table>,
    ) -> Leaf {
        if let Some(winner) = pos.winner() {
            let v = self.terminal_value(winner);
            return Leaf {
                eval: Some(v),
                weight: v,
                runs: 1,
                policy: None,
            };
        }
        if let Some(e) = table.and_then(|t| t.probe(pos.zhash())) {
            return Leaf {
                eval: None,
                weight: side * e.value as f64 * e.runs as f64,
                runs: e.runs,
                policy: None,
            };
        }
        evaluator.evaluate_position(pos);
        let value = evaluator.value();
        let mut policy = self.pool.take();
        evaluator.policy(&mut policy);
        if let Some(t) = table {
            t.save(pos.zhash(), value, false, 1, None);
        }
        Leaf {
            eval: None,
            weight: side * value as f64,
            runs: 1,
            policy: Some(policy),
        }
    }

    /// Expand `node`, whose position is `pos`, and return the statistics to
    /// back-propagate. Returns `None` if another worker got there first.
    fn expand(
        &self,
        node: &Arc<TreeNode>,
        pos: &mut Position,
        evaluator: &mut dyn PositionEvaluator,
        table: Option<&Table>,
    ) -> Option<(f64, u32)> {
        if node.expanded.swap(true, Ordering::AcqRel) {
            return None;
        }
        if !node.has_policy() {
            evaluator.evaluate_position(pos);
            let mut policy = self.pool.take();
            evaluator.policy(&mut policy);
            *node.policy.lock() = Some(policy);
        }

        let mut children = Vec::new();
        let (mut value, mut runs) = (0.0, 0u32);
        for step in legal_steps(pos) {
            let (side, root_turn) = if step.is_pass() {
                (-node.side, false)
            } else {
                (node.side, node.root_turn)
            };
            if pos.step(step).is_err() {
                continue;
            }
            let leaf = self.leaf(pos, side, evaluator, table);
            let undone = if step.is_pass() { pos.unpass() } else { pos.unstep().map(|_| ()) };
            debug_assert!(undone.is_ok());
            value += leaf.weight;
            runs += leaf.runs;
            children.push(Arc::new(TreeNode::new(
                Arc::downgrade(node),
                step,
                side,
                root_turn,
                leaf,
                Arc::clone(&self.pool),
            )));
        }

        if children.is_empty() {
            // At the start of a turn the mover is immobilised and loses.
            // Mid-turn the line cannot be finished as a legal move; it is
            // scored the same so selection leaves it.
            if !pos.turn_fresh() {
                debug!(steps_left = pos.steps_left(), "turn cannot be completed");
            }
            node.dead_end.store(true, Ordering::Release);
            return Some((-node.side, 1));
        }
        self.nodes.fetch_add(children.len() as u64, Ordering::Relaxed);
        *node.children.lock() = children;
        Some((value, runs))
    }

    /// One iteration: select a leaf, expand it and back-propagate.
    /// `pos` must equal the root position and is restored on return.
    pub fn playout(
        &self,
        pos: &mut Position,
        evaluator: &mut dyn PositionEvaluator,
        table: Option<&Table>,
    ) {
        let table = if self.use_table { table } else { None };
        let mut node = Arc::clone(&self.root);
        let mut trail: Vec<bool> = Vec::new();
        while let Some(child) = node.select_child() {
            let applied = match child.step {
                Step::Pass => pos.pass(),
                step => pos.step(step).map(|_| ()),
            };
            if let Err(e) = applied {
                warn!(step = %child.step, error = %e, "tree step rejected");
                break;
            }
            trail.push(child.step.is_pass());
            node = child;
        }

        if let Some(e) = node.eval {
            backprop(&node, e, 1);
        } else if let Some((value, runs)) = self.expand(&node, pos, evaluator, table) {
            backprop(&node, value, runs);
        } else if node.dead_end.load(Ordering::Acquire) {
            backprop(&node, -node.side, 1);
        } else {
            // Expanded by another worker in the meantime.
            backprop(&node, node.mean(), 1);
        }

        for pass in trail.into_iter().rev() {
            let undone = if pass { pos.unpass() } else { pos.unstep().map(|_| ()) };
            debug_assert!(undone.is_ok());
        }
    }

    /// Steps along the most visited line within the root's turn, the first
    /// child on it and the node it ends at.
    fn best_line(&self) -> (Vec<Step>, Option<Arc<TreeNode>>, Arc<TreeNode>) {
        let mut steps = Vec::new();
        let mut first = None;
        let mut node = Arc::clone(&self.root);
        while node.root_turn {
            let Some(child) = node.children_by_runs().into_iter().next() else {
                break;
            };
            if first.is_none() {
                first = Some(Arc::clone(&child));
            }
            if child.step.is_pass() {
                break;
            }
            steps.push(child.step);
            node = child;
            if node.is_terminal() {
                break;
            }
        }
        (steps, first, node)
    }

    /// Number of steps in the most visited line of the root's turn.
    pub fn best_line_len(&self) -> usize {
        self.best_line().0.iter().map(|s| s.len() as usize).sum()
    }

    /// Whether more search cannot change the outcome: the root has no
    /// legal step, or the most visited line already wins.
    pub fn is_decided(&self) -> bool {
        if self.root.children.lock().is_empty() {
            return true;
        }
        let (_, _, last) = self.best_line();
        last.eval.is_some_and(|e| e > 0.0)
    }

    pub fn uses_table(&self) -> bool {
        self.use_table
    }

    /// The move to play and its value for the root side. Falls back to the
    /// statically best move when the most visited line is not a legal turn.
    pub fn best_move(&self) -> Option<(Move, f64)> {
        let (steps, first, _) = self.best_line();
        let value = first.map_or(0.0, |c| c.mean().clamp(-1.0, 1.0));
        let mut mv = Move::new(steps);
        let mut scratch = self.root_pos.clone();
        while !mv.is_empty() {
            if scratch.make_move(&mv).is_ok() {
                return Some((mv, value));
            }
            mv.steps.pop();
        }
        debug!("most visited line is not a legal turn; using static ordering");
        let ordered = order_moves(&self.root_pos, root_moves(&self.root_pos, 2));
        ordered.into_iter().next().map(|(mv, _)| (mv, value))
    }

    /// Record the root result in `table` as a principal variation entry.
    pub fn save_root(&self, table: &Table) {
        let Some(best) = self.root.children_by_runs().into_iter().next() else {
            return;
        };
        let value = self.root.mean().clamp(-1.0, 1.0) as f32;
        table.save(
            self.root_pos.zhash(),
            value,
            true,
            self.root.runs(),
            Some(best.step.policy_index()),
        );
    }
}
