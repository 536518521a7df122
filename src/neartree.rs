//! ## NearTree Implementation
//!
//! This module implements a metric-space nearest-neighbor index: a binary tree
//! over points from a user-chosen metric space, pruned with the triangle
//! inequality. The tree supports immediate and deferred insertion, nearest and
//! farthest neighbor search, in-sphere/out-sphere/in-annulus range search, and
//! bounded k-nearest/k-farthest search.
//!
//! Every traversal is implemented with an explicit work stack rather than
//! native recursion, since adversarial insertion orders can leave the tree
//! deeply left- or right-skewed even with deferred, randomized insertion.
//!
//! ### Example
//!
//! ```
//! use spart::errors::NearTreeError;
//! use spart::geometry::{ElementKind, MetricKind, Point};
//! use spart::neartree::{NearTree, NearTreeConfig, Sink};
//!
//! fn main() -> Result<(), NearTreeError> {
//!     let config = NearTreeConfig::new(ElementKind::Float, MetricKind::L2);
//!     let mut tree: NearTree<Point<1>, ()> = NearTree::new(1, config)?;
//!     for i in 1..=9 {
//!         tree.immediate_insert(Point::new([i as f64]), None)?;
//!     }
//!     let (nearest, _) = tree.nearest_neighbor(f64::MAX, &Point::new([18.0]))?.unwrap();
//!     assert_eq!(nearest.coords[0], 9.0);
//!     Ok(())
//! }
//! ```

use crate::errors::NearTreeError;
use crate::geometry::{ElementKind, HeapItem, MetricKind, NearPoint};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// The seed the test harness this crate's behavior is modeled on always uses,
/// so that deferred-insert flush order is deterministic by default.
pub const DEFAULT_SEED: u64 = 0;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// The "type-and-metric word" used to create a tree: an element kind, a
/// metric, and the `flip` tie-break bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NearTreeConfig {
    pub element: ElementKind,
    pub metric: MetricKind,
    pub flip: bool,
}

impl NearTreeConfig {
    /// Creates a configuration with `flip` disabled.
    pub fn new(element: ElementKind, metric: MetricKind) -> Self {
        NearTreeConfig {
            element,
            metric,
            flip: false,
        }
    }

    /// Returns a copy of this configuration with the `flip` tie-break bit set.
    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    fn validate(&self) -> Result<(), NearTreeError> {
        if !self.metric.supports(self.element) {
            return Err(NearTreeError::InvalidConfig {
                kind: self.element,
                metric: self.metric,
            });
        }
        Ok(())
    }
}

/// A node in the NearTree, holding up to two pivot points and the subtrees
/// hanging off each.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Node<P, T> {
    left_point: Option<P>,
    left_payload: Option<T>,
    left_child: Option<Box<Node<P, T>>>,
    left_max_radius: f64,
    right_point: Option<P>,
    right_payload: Option<T>,
    right_child: Option<Box<Node<P, T>>>,
    right_max_radius: f64,
}

impl<P: NearPoint, T: Clone> Node<P, T> {
    fn leaf(point: P, payload: Option<T>) -> Self {
        Node {
            left_point: Some(point),
            left_payload: payload,
            left_child: None,
            left_max_radius: 0.0,
            right_point: None,
            right_payload: None,
            right_child: None,
            right_max_radius: 0.0,
        }
    }
}

/// Where a range query's matches are written: a flat sequence of point/payload
/// pairs, or a freshly-built tree that can itself be queried further.
#[derive(Debug)]
pub enum Sink<P: NearPoint, T: Clone> {
    Flat(Vec<(P, Option<T>)>),
    Tree(Box<NearTree<P, T>>),
}

impl<P: NearPoint, T: Clone> Sink<P, T> {
    pub fn new_flat() -> Self {
        Sink::Flat(Vec::new())
    }

    pub fn new_tree(dimension: usize, config: NearTreeConfig) -> Result<Self, NearTreeError> {
        Ok(Sink::Tree(Box::new(NearTree::new(dimension, config)?)))
    }

    fn push(&mut self, point: P, payload: Option<T>) -> Result<(), NearTreeError> {
        match self {
            Sink::Flat(v) => {
                v.push((point, payload));
                Ok(())
            }
            Sink::Tree(t) => t.immediate_insert(point, payload),
        }
    }

    /// Returns the flat results, panicking if this sink is tree-backed.
    /// Use [`Sink::into_tree`] for the tree-backed variant.
    pub fn into_flat(self) -> Vec<(P, Option<T>)> {
        match self {
            Sink::Flat(v) => v,
            Sink::Tree(t) => t.collect_points(),
        }
    }

    pub fn into_tree(self) -> Option<NearTree<P, T>> {
        match self {
            Sink::Tree(t) => Some(*t),
            Sink::Flat(_) => None,
        }
    }
}

/// A metric-space nearest-neighbor index.
///
/// `P` is the point type (see [`crate::geometry::NearPoint`]); `T` is an
/// optional, non-owning payload cloned into query results.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NearTree<P: NearPoint, T: Clone> {
    root: Option<Box<Node<P, T>>>,
    config: NearTreeConfig,
    dimension: usize,
    len: usize,
    pending: Vec<(P, Option<T>)>,
    seed: u64,
}

impl<P: NearPoint, T: Clone> NearTree<P, T> {
    /// Creates an empty tree for points of the given dimension and configuration.
    pub fn new(dimension: usize, config: NearTreeConfig) -> Result<Self, NearTreeError> {
        if dimension == 0 {
            return Err(NearTreeError::InvalidCapacity { capacity: 0 });
        }
        config.validate()?;
        info!(
            "creating NearTree: dimension={}, metric={:?}, flip={}",
            dimension, config.metric, config.flip
        );
        Ok(NearTree {
            root: None,
            config,
            dimension,
            len: 0,
            pending: Vec::new(),
            seed: DEFAULT_SEED,
        })
    }

    /// Creates an empty tree whose deferred-insert flush uses the given PRNG seed
    /// instead of [`DEFAULT_SEED`].
    pub fn with_seed(
        dimension: usize,
        config: NearTreeConfig,
        seed: u64,
    ) -> Result<Self, NearTreeError> {
        let mut tree = Self::new(dimension, config)?;
        tree.seed = seed;
        Ok(tree)
    }

    /// Total number of points inserted (immediately or deferred), excluding none:
    /// there is no deletion, so this only grows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Alias for [`NearTree::len`], matching the name used in spec.md's interface table.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Returns `true` iff the tree holds no points (the Rust rendering of
    /// `zero_if_empty`).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn config(&self) -> NearTreeConfig {
        self.config
    }

    /// Distance between two points under this tree's metric.
    pub fn distance(&self, a: &P, b: &P) -> f64 {
        self.config.metric.distance(a, b)
    }

    /// Length of the longest root-to-leaf path over tree nodes.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        if let Some(root) = &self.root {
            let mut stack: Vec<(&Node<P, T>, usize)> = vec![(root.as_ref(), 1)];
            while let Some((node, d)) = stack.pop() {
                max_depth = max_depth.max(d);
                if let Some(c) = &node.left_child {
                    stack.push((c.as_ref(), d + 1));
                }
                if let Some(c) = &node.right_child {
                    stack.push((c.as_ref(), d + 1));
                }
            }
        }
        max_depth
    }

    fn check_dimension(&self, point: &P) -> Result<(), NearTreeError> {
        if point.dims() != self.dimension {
            return Err(NearTreeError::DimensionMismatch {
                expected: self.dimension,
                actual: point.dims(),
            });
        }
        Ok(())
    }

    /// Appends `(point, payload)` to the deferred-insert queue. The point is
    /// not inserted into the tree until the next flush or query.
    pub fn insert(&mut self, point: P, payload: Option<T>) -> Result<(), NearTreeError> {
        self.check_dimension(&point)?;
        if self.pending.len() == self.pending.capacity() {
            self.pending
                .try_reserve(1)
                .map_err(|_| NearTreeError::AllocationFailed)?;
        }
        debug!("queued deferred insert");
        self.pending.push((point, payload));
        self.len += 1;
        Ok(())
    }

    /// Inserts a single point into the tree immediately, without consulting
    /// the deferred queue.
    pub fn immediate_insert(&mut self, point: P, payload: Option<T>) -> Result<(), NearTreeError> {
        self.check_dimension(&point)?;
        trace!("immediate insert");
        Self::insert_into_root(&mut self.root, point, payload, self.config.metric, self.config.flip);
        self.len += 1;
        Ok(())
    }

    /// Walks from `root` down to the point's eventual resting node and stores
    /// it there. Implemented as an explicit pointer-chasing loop rather than
    /// recursion: an adversarial (e.g. monotone, non-`flip`) insertion order
    /// leaves this chain arbitrarily deep, and the loop reassigns `current`
    /// to successively deeper nodes instead of growing a call frame per level.
    fn insert_into_root(
        root: &mut Option<Box<Node<P, T>>>,
        point: P,
        payload: Option<T>,
        metric: MetricKind,
        flip: bool,
    ) {
        let mut current = match root.as_deref_mut() {
            Some(node) => node,
            None => {
                *root = Some(Box::new(Node::leaf(point, payload)));
                return;
            }
        };

        loop {
            if current.left_point.is_none() {
                current.left_point = Some(point);
                current.left_payload = payload;
                current.left_max_radius = 0.0;
                return;
            }
            let d_left = metric.distance(&point, current.left_point.as_ref().unwrap());

            if current.right_point.is_none() {
                current.right_point = Some(point);
                current.right_payload = payload;
                current.right_max_radius = 0.0;
                return;
            }
            let d_right = metric.distance(&point, current.right_point.as_ref().unwrap());

            let go_left = if approx_eq(d_left, d_right) {
                !flip
            } else {
                d_left < d_right
            };

            if go_left {
                current.left_max_radius = current.left_max_radius.max(d_left);
                if current.left_child.is_none() {
                    current.left_child = Some(Box::new(Node::leaf(point, payload)));
                    return;
                }
                current = current.left_child.as_deref_mut().unwrap();
            } else {
                current.right_max_radius = current.right_max_radius.max(d_right);
                if current.right_child.is_none() {
                    current.right_child = Some(Box::new(Node::leaf(point, payload)));
                    return;
                }
                current = current.right_child.as_deref_mut().unwrap();
            }
        }
    }

    /// Drains the deferred-insert queue in a uniformly shuffled order and
    /// inserts each element immediately. Uses the tree's own seeded PRNG
    /// (see [`NearTree::with_seed`]), never a process-global source, so
    /// multiple trees in one process stay independent and reproducible.
    pub fn complete_delayed_insert(&mut self) -> Result<(), NearTreeError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        info!("flushing {} deferred inserts", self.pending.len());
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.pending.shuffle(&mut rng);
        let drained: Vec<(P, Option<T>)> = self.pending.drain(..).collect();
        for (point, payload) in drained {
            Self::insert_into_root(
                &mut self.root,
                point,
                payload,
                self.config.metric,
                self.config.flip,
            );
        }
        Ok(())
    }

    fn ensure_flushed(&mut self) -> Result<(), NearTreeError> {
        self.complete_delayed_insert()
    }

    /// A read-only, already-flushed view that can be queried without `&mut`.
    /// Returns `None` if the deferred-insert queue is non-empty; call
    /// [`NearTree::complete_delayed_insert`] first.
    pub fn as_frozen(&self) -> Option<FrozenNearTree<'_, P, T>> {
        if self.pending.is_empty() {
            Some(FrozenNearTree { tree: self })
        } else {
            None
        }
    }

    /// Collects every stored point (used by [`Sink::into_flat`] when the sink
    /// turned out to be tree-backed).
    fn collect_points(&self) -> Vec<(P, Option<T>)> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            let mut stack = vec![root.as_ref()];
            while let Some(node) = stack.pop() {
                if let Some(p) = &node.left_point {
                    out.push((p.clone(), node.left_payload.clone()));
                }
                if let Some(p) = &node.right_point {
                    out.push((p.clone(), node.right_payload.clone()));
                }
                if let Some(c) = &node.left_child {
                    stack.push(c.as_ref());
                }
                if let Some(c) = &node.right_child {
                    stack.push(c.as_ref());
                }
            }
        }
        out
    }

    /// Finds the stored point nearest to `probe`, provided it is strictly
    /// closer than `initial_radius`.
    pub fn nearest_neighbor(
        &mut self,
        initial_radius: f64,
        probe: &P,
    ) -> Result<Option<(P, Option<T>)>, NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("nearest_neighbor search, initial_radius={}", initial_radius);
        if self.root.is_none() {
            return Err(NearTreeError::EmptyTree);
        }
        Ok(Self::nearest_neighbor_in(
            &self.root,
            self.config.metric,
            initial_radius,
            probe,
        ))
    }

    fn nearest_neighbor_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        initial_radius: f64,
        probe: &P,
    ) -> Option<(P, Option<T>)> {
        let root = root.as_ref()?;
        let mut best: Option<(P, Option<T>)> = None;
        let mut bound = initial_radius;
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];

        while let Some(node) = stack.pop() {
            let dl = node.left_point.as_ref().map(|lp| metric.distance(probe, lp));
            let dr = node.right_point.as_ref().map(|rp| metric.distance(probe, rp));

            if let Some(dl) = dl {
                if dl < bound {
                    bound = dl;
                    best = Some((node.left_point.clone().unwrap(), node.left_payload.clone()));
                }
            }
            if let Some(dr) = dr {
                if dr < bound {
                    bound = dr;
                    best = Some((node.right_point.clone().unwrap(), node.right_payload.clone()));
                }
            }

            let mut to_push: Vec<(f64, &Node<P, T>)> = Vec::new();
            if let (Some(dl), Some(child)) = (dl, node.left_child.as_deref()) {
                if dl - node.left_max_radius < bound {
                    to_push.push((dl, child));
                }
            }
            if let (Some(dr), Some(child)) = (dr, node.right_child.as_deref()) {
                if dr - node.right_max_radius < bound {
                    to_push.push((dr, child));
                }
            }
            // Explore the closer pivot's subtree first: push the farther one
            // first so the closer one is on top of the stack (popped next).
            to_push.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
            for (_, child) in to_push {
                stack.push(child);
            }
        }

        best
    }

    /// Finds the stored point farthest from `probe`.
    pub fn farthest_neighbor(&mut self, probe: &P) -> Result<Option<(P, Option<T>)>, NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("farthest_neighbor search");
        if self.root.is_none() {
            return Err(NearTreeError::EmptyTree);
        }
        Ok(Self::farthest_neighbor_in(&self.root, self.config.metric, probe))
    }

    fn farthest_neighbor_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        probe: &P,
    ) -> Option<(P, Option<T>)> {
        let root = root.as_ref()?;
        let mut best: Option<(P, Option<T>)> = None;
        let mut bound = 0.0_f64;
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];

        while let Some(node) = stack.pop() {
            let dl = node.left_point.as_ref().map(|lp| metric.distance(probe, lp));
            let dr = node.right_point.as_ref().map(|rp| metric.distance(probe, rp));

            if let Some(dl) = dl {
                if best.is_none() || dl > bound {
                    bound = dl;
                    best = Some((node.left_point.clone().unwrap(), node.left_payload.clone()));
                }
            }
            if let Some(dr) = dr {
                if best.is_none() || dr > bound {
                    bound = dr;
                    best = Some((node.right_point.clone().unwrap(), node.right_payload.clone()));
                }
            }

            let mut to_push: Vec<(f64, &Node<P, T>)> = Vec::new();
            if let (Some(dl), Some(child)) = (dl, node.left_child.as_deref()) {
                if dl + node.left_max_radius > bound {
                    to_push.push((dl, child));
                }
            }
            if let (Some(dr), Some(child)) = (dr, node.right_child.as_deref()) {
                if dr + node.right_max_radius > bound {
                    to_push.push((dr, child));
                }
            }
            // Explore the farther pivot's subtree first to tighten the bound sooner.
            to_push.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            for (_, child) in to_push {
                stack.push(child);
            }
        }

        best
    }

    /// Collects every point within `radius` of `probe` into `sink`. A
    /// negative radius yields an empty result.
    pub fn find_in_sphere(
        &mut self,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("find_in_sphere radius={}", radius);
        if radius < 0.0 {
            return Ok(());
        }
        Self::find_in_sphere_in(&self.root, self.config.metric, radius, probe, sink)
    }

    fn find_in_sphere_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        let Some(root) = root.as_ref() else {
            return Ok(());
        };
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];
        while let Some(node) = stack.pop() {
            if let Some(lp) = &node.left_point {
                let dl = metric.distance(probe, lp);
                if dl <= radius {
                    sink.push(lp.clone(), node.left_payload.clone())?;
                }
                if let Some(child) = &node.left_child {
                    if dl - node.left_max_radius <= radius {
                        stack.push(child.as_ref());
                    }
                }
            }
            if let Some(rp) = &node.right_point {
                let dr = metric.distance(probe, rp);
                if dr <= radius {
                    sink.push(rp.clone(), node.right_payload.clone())?;
                }
                if let Some(child) = &node.right_child {
                    if dr - node.right_max_radius <= radius {
                        stack.push(child.as_ref());
                    }
                }
            }
        }
        Ok(())
    }

    /// Collects every point at distance `>= radius` from `probe` into `sink`.
    pub fn find_out_sphere(
        &mut self,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("find_out_sphere radius={}", radius);
        Self::find_out_sphere_in(&self.root, self.config.metric, radius, probe, sink)
    }

    fn find_out_sphere_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        let Some(root) = root.as_ref() else {
            return Ok(());
        };
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];
        while let Some(node) = stack.pop() {
            if let Some(lp) = &node.left_point {
                let dl = metric.distance(probe, lp);
                if dl >= radius {
                    sink.push(lp.clone(), node.left_payload.clone())?;
                }
                if let Some(child) = &node.left_child {
                    if dl + node.left_max_radius >= radius {
                        stack.push(child.as_ref());
                    }
                }
            }
            if let Some(rp) = &node.right_point {
                let dr = metric.distance(probe, rp);
                if dr >= radius {
                    sink.push(rp.clone(), node.right_payload.clone())?;
                }
                if let Some(child) = &node.right_child {
                    if dr + node.right_max_radius >= radius {
                        stack.push(child.as_ref());
                    }
                }
            }
        }
        Ok(())
    }

    /// Collects every point at distance within `[r_lo, r_hi]` of `probe` into `sink`.
    pub fn find_in_annulus(
        &mut self,
        r_lo: f64,
        r_hi: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("find_in_annulus [{}, {}]", r_lo, r_hi);
        if r_hi < 0.0 || r_lo > r_hi {
            return Ok(());
        }
        let lo = r_lo.max(0.0);
        Self::find_in_annulus_in(&self.root, self.config.metric, lo, r_hi, probe, sink)
    }

    fn find_in_annulus_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        r_lo: f64,
        r_hi: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        let Some(root) = root.as_ref() else {
            return Ok(());
        };
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];
        while let Some(node) = stack.pop() {
            if let Some(lp) = &node.left_point {
                let dl = metric.distance(probe, lp);
                if dl >= r_lo && dl <= r_hi {
                    sink.push(lp.clone(), node.left_payload.clone())?;
                }
                if let Some(child) = &node.left_child {
                    let beyond_hi = dl - node.left_max_radius > r_hi;
                    let below_lo = dl + node.left_max_radius < r_lo;
                    if !beyond_hi && !below_lo {
                        stack.push(child.as_ref());
                    }
                }
            }
            if let Some(rp) = &node.right_point {
                let dr = metric.distance(probe, rp);
                if dr >= r_lo && dr <= r_hi {
                    sink.push(rp.clone(), node.right_payload.clone())?;
                }
                if let Some(child) = &node.right_child {
                    let beyond_hi = dr - node.right_max_radius > r_hi;
                    let below_lo = dr + node.right_max_radius < r_lo;
                    if !beyond_hi && !below_lo {
                        stack.push(child.as_ref());
                    }
                }
            }
        }
        Ok(())
    }

    /// Collects up to `k` points closest to `probe` among those within `radius`,
    /// ordered nearest-to-farthest.
    pub fn find_k_nearest(
        &mut self,
        k: usize,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("find_k_nearest k={}, radius={}", k, radius);
        if k == 0 {
            return Ok(());
        }
        let items = Self::find_k_nearest_in(&self.root, self.config.metric, k, radius, probe);
        for item in items {
            sink.push(item.point, item.payload)?;
        }
        Ok(())
    }

    fn find_k_nearest_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        k: usize,
        radius: f64,
        probe: &P,
    ) -> Vec<HeapItem<P, T>> {
        let Some(root) = root.as_ref() else {
            return Vec::new();
        };
        let mut heap: BinaryHeap<HeapItem<P, T>> = BinaryHeap::new();
        let mut bound = radius;
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];

        while let Some(node) = stack.pop() {
            let dl = node.left_point.as_ref().map(|lp| metric.distance(probe, lp));
            let dr = node.right_point.as_ref().map(|rp| metric.distance(probe, rp));

            if let Some(dl) = dl {
                if dl < bound {
                    heap.push(HeapItem {
                        key: OrderedFloat(dl),
                        point: node.left_point.clone().unwrap(),
                        payload: node.left_payload.clone(),
                    });
                    if heap.len() > k {
                        heap.pop();
                    }
                    if heap.len() == k {
                        bound = heap.peek().unwrap().key.into_inner();
                    }
                }
            }
            if let Some(dr) = dr {
                if dr < bound {
                    heap.push(HeapItem {
                        key: OrderedFloat(dr),
                        point: node.right_point.clone().unwrap(),
                        payload: node.right_payload.clone(),
                    });
                    if heap.len() > k {
                        heap.pop();
                    }
                    if heap.len() == k {
                        bound = heap.peek().unwrap().key.into_inner();
                    }
                }
            }

            let mut to_push: Vec<(f64, &Node<P, T>)> = Vec::new();
            if let (Some(dl), Some(child)) = (dl, node.left_child.as_deref()) {
                if dl - node.left_max_radius < bound {
                    to_push.push((dl, child));
                }
            }
            if let (Some(dr), Some(child)) = (dr, node.right_child.as_deref()) {
                if dr - node.right_max_radius < bound {
                    to_push.push((dr, child));
                }
            }
            to_push.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
            for (_, child) in to_push {
                stack.push(child);
            }
        }

        let mut items: Vec<HeapItem<P, T>> = heap.into_vec();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        items
    }

    /// Collects up to `k` points farthest from `probe` among those beyond `radius`,
    /// ordered farthest-to-nearest.
    pub fn find_k_farthest(
        &mut self,
        k: usize,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        self.check_dimension(probe)?;
        self.ensure_flushed()?;
        info!("find_k_farthest k={}, radius={}", k, radius);
        if k == 0 {
            return Ok(());
        }
        let items = Self::find_k_farthest_in(&self.root, self.config.metric, k, radius, probe);
        for item in items {
            sink.push(item.point, item.payload)?;
        }
        Ok(())
    }

    fn find_k_farthest_in(
        root: &Option<Box<Node<P, T>>>,
        metric: MetricKind,
        k: usize,
        radius: f64,
        probe: &P,
    ) -> Vec<HeapItem<P, T>> {
        let Some(root) = root.as_ref() else {
            return Vec::new();
        };
        let mut heap: BinaryHeap<HeapItem<P, T>> = BinaryHeap::new();
        let mut bound = radius;
        let mut stack: Vec<&Node<P, T>> = vec![root.as_ref()];

        while let Some(node) = stack.pop() {
            let dl = node.left_point.as_ref().map(|lp| metric.distance(probe, lp));
            let dr = node.right_point.as_ref().map(|rp| metric.distance(probe, rp));

            if let Some(dl) = dl {
                if dl >= bound {
                    heap.push(HeapItem {
                        key: OrderedFloat(-dl),
                        point: node.left_point.clone().unwrap(),
                        payload: node.left_payload.clone(),
                    });
                    if heap.len() > k {
                        heap.pop();
                    }
                    if heap.len() == k {
                        bound = -heap.peek().unwrap().key.into_inner();
                    }
                }
            }
            if let Some(dr) = dr {
                if dr >= bound {
                    heap.push(HeapItem {
                        key: OrderedFloat(-dr),
                        point: node.right_point.clone().unwrap(),
                        payload: node.right_payload.clone(),
                    });
                    if heap.len() > k {
                        heap.pop();
                    }
                    if heap.len() == k {
                        bound = -heap.peek().unwrap().key.into_inner();
                    }
                }
            }

            let mut to_push: Vec<(f64, &Node<P, T>)> = Vec::new();
            if let (Some(dl), Some(child)) = (dl, node.left_child.as_deref()) {
                if dl + node.left_max_radius >= bound {
                    to_push.push((dl, child));
                }
            }
            if let (Some(dr), Some(child)) = (dr, node.right_child.as_deref()) {
                if dr + node.right_max_radius >= bound {
                    to_push.push((dr, child));
                }
            }
            to_push.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            for (_, child) in to_push {
                stack.push(child);
            }
        }

        let mut items: Vec<HeapItem<P, T>> = heap.into_vec();
        items.sort_by(|a, b| b.key.cmp(&a.key));
        items
    }
}

/// A read-only, already-flushed view of a [`NearTree`]. Exposes the same
/// query methods, but borrows immutably and never triggers a flush — callers
/// must flush (`complete_delayed_insert`) before obtaining one.
pub struct FrozenNearTree<'a, P: NearPoint, T: Clone> {
    tree: &'a NearTree<P, T>,
}

impl<'a, P: NearPoint, T: Clone> FrozenNearTree<'a, P, T> {
    pub fn nearest_neighbor(
        &self,
        initial_radius: f64,
        probe: &P,
    ) -> Result<Option<(P, Option<T>)>, NearTreeError> {
        self.tree.check_dimension(probe)?;
        if self.tree.root.is_none() {
            return Err(NearTreeError::EmptyTree);
        }
        Ok(NearTree::nearest_neighbor_in(
            &self.tree.root,
            self.tree.config.metric,
            initial_radius,
            probe,
        ))
    }

    pub fn farthest_neighbor(&self, probe: &P) -> Result<Option<(P, Option<T>)>, NearTreeError> {
        self.tree.check_dimension(probe)?;
        if self.tree.root.is_none() {
            return Err(NearTreeError::EmptyTree);
        }
        Ok(NearTree::farthest_neighbor_in(
            &self.tree.root,
            self.tree.config.metric,
            probe,
        ))
    }

    pub fn find_in_sphere(
        &self,
        radius: f64,
        probe: &P,
        sink: &mut Sink<P, T>,
    ) -> Result<(), NearTreeError> {
        self.tree.check_dimension(probe)?;
        if radius < 0.0 {
            return Ok(());
        }
        NearTree::find_in_sphere_in(&self.tree.root, self.tree.config.metric, radius, probe, sink)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }
}
