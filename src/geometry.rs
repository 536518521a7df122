//! ## Points and metrics for NearTree
//!
//! This module provides the point types NearTree can index (fixed-width numeric
//! vectors and fixed-length character strings, plus a runtime-dimensioned variant
//! of each) and the metrics (`L1`, `L2`, `L-infinity`, spherical, Hamming) that can
//! be selected for a tree at creation time.

use ordered_float::OrderedFloat;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A point that can be stored in a [`crate::neartree::NearTree`].
///
/// Implementors expose their coordinates as either a slice of `f64` (numeric
/// points) or a slice of `char` (string points); a metric only reads the slice
/// it needs, so a single point type only has to implement the representation
/// its intended metrics use.
pub trait NearPoint: Clone + PartialEq + std::fmt::Debug {
    /// Number of coordinates/positions in this point.
    fn dims(&self) -> usize;

    /// Coordinates for numeric metrics (`L1`, `L2`, `L-infinity`, spherical).
    fn as_f64_slice(&self) -> Option<&[f64]> {
        None
    }

    /// Characters for the Hamming metric.
    fn as_char_slice(&self) -> Option<&[char]> {
        None
    }
}

/// A fixed-width numeric point with dimension known at compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point<const N: usize> {
    pub coords: [f64; N],
}

impl<const N: usize> Point<N> {
    pub fn new(coords: [f64; N]) -> Self {
        Point { coords }
    }
}

impl<const N: usize> NearPoint for Point<N> {
    fn dims(&self) -> usize {
        N
    }
    fn as_f64_slice(&self) -> Option<&[f64]> {
        Some(&self.coords)
    }
}

/// A fixed-length character-string point with dimension known at compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StringPoint<const N: usize> {
    pub chars: [char; N],
}

impl<const N: usize> StringPoint<N> {
    /// Builds a point from a string, padding with spaces or truncating to width `N`.
    pub fn from_str(s: &str) -> Self {
        let mut chars = [' '; N];
        for (slot, c) in chars.iter_mut().zip(s.chars()) {
            *slot = c;
        }
        StringPoint { chars }
    }
}

impl<const N: usize> NearPoint for StringPoint<N> {
    fn dims(&self) -> usize {
        N
    }
    fn as_char_slice(&self) -> Option<&[char]> {
        Some(&self.chars)
    }
}

/// A point whose dimension is only known at runtime, used by the
/// [`crate::neartree::NearTreeConfig`]-driven constructor API.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DynPoint {
    Floats(Vec<f64>),
    Chars(Vec<char>),
}

impl NearPoint for DynPoint {
    fn dims(&self) -> usize {
        match self {
            DynPoint::Floats(v) => v.len(),
            DynPoint::Chars(v) => v.len(),
        }
    }
    fn as_f64_slice(&self) -> Option<&[f64]> {
        match self {
            DynPoint::Floats(v) => Some(v),
            DynPoint::Chars(_) => None,
        }
    }
    fn as_char_slice(&self) -> Option<&[char]> {
        match self {
            DynPoint::Chars(v) => Some(v),
            DynPoint::Floats(_) => None,
        }
    }
}

/// The declared element type of the values a tree stores; part of the
/// "type-and-metric word" used by [`crate::neartree::NearTreeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementKind {
    Integer,
    Float,
    Str,
}

/// The metric a tree prunes and ranks with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetricKind {
    /// Euclidean (L2) distance. Default for numeric element types.
    L2,
    /// Manhattan (L1) distance.
    L1,
    /// Chebyshev (L-infinity) distance.
    LInf,
    /// Chord distance between operands projected onto the unit hypersphere.
    Spherical,
    /// Number of positions at which two equal-length strings differ. Default for strings.
    Hamming,
}

impl MetricKind {
    /// Returns whether this metric can be used with the given element kind.
    pub fn supports(self, kind: ElementKind) -> bool {
        match self {
            MetricKind::Hamming => matches!(kind, ElementKind::Str),
            MetricKind::L1 | MetricKind::L2 | MetricKind::LInf | MetricKind::Spherical => {
                matches!(kind, ElementKind::Integer | ElementKind::Float)
            }
        }
    }

    /// Dispatches to the concrete metric implementation for this tag.
    pub fn distance<P: NearPoint>(self, a: &P, b: &P) -> f64 {
        match self {
            MetricKind::L2 => Euclidean::distance(a, b),
            MetricKind::L1 => Manhattan::distance(a, b),
            MetricKind::LInf => Chebyshev::distance(a, b),
            MetricKind::Spherical => Spherical::distance(a, b),
            MetricKind::Hamming => Hamming::distance(a, b),
        }
    }
}

/// A metric over points of type `P`. Implementations must be nonnegative,
/// return 0 for identical points, and satisfy the triangle inequality.
pub trait Metric<P: NearPoint> {
    fn distance(a: &P, b: &P) -> f64;
}

/// Euclidean (L2) distance.
pub struct Euclidean;

impl<P: NearPoint> Metric<P> for Euclidean {
    fn distance(a: &P, b: &P) -> f64 {
        match (a.as_f64_slice(), b.as_f64_slice()) {
            (Some(xa), Some(xb)) => xa
                .iter()
                .zip(xb.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            _ => f64::INFINITY,
        }
    }
}

/// Manhattan (L1) distance.
pub struct Manhattan;

impl<P: NearPoint> Metric<P> for Manhattan {
    fn distance(a: &P, b: &P) -> f64 {
        match (a.as_f64_slice(), b.as_f64_slice()) {
            (Some(xa), Some(xb)) => xa.iter().zip(xb.iter()).map(|(x, y)| (x - y).abs()).sum(),
            _ => f64::INFINITY,
        }
    }
}

/// Chebyshev (L-infinity) distance.
pub struct Chebyshev;

impl<P: NearPoint> Metric<P> for Chebyshev {
    fn distance(a: &P, b: &P) -> f64 {
        match (a.as_f64_slice(), b.as_f64_slice()) {
            (Some(xa), Some(xb)) => xa
                .iter()
                .zip(xb.iter())
                .map(|(x, y)| (x - y).abs())
                .fold(0.0_f64, f64::max),
            _ => f64::INFINITY,
        }
    }
}

/// Chord distance between operands projected onto the unit hypersphere: each
/// operand is normalized to unit length, then the two normalized vectors are
/// compared with plain Euclidean distance. A zero vector has no defined
/// direction and is left unprojected (at the center) rather than normalized,
/// matching `test4Sphere` in the original CNearTree test harness, where an
/// explicitly inserted origin point must still compare against directional
/// points with a finite, usable distance.
pub struct Spherical;

impl<P: NearPoint> Metric<P> for Spherical {
    fn distance(a: &P, b: &P) -> f64 {
        match (a.as_f64_slice(), b.as_f64_slice()) {
            (Some(xa), Some(xb)) => {
                let norm_a = xa.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b = xb.iter().map(|x| x * x).sum::<f64>().sqrt();
                xa.iter()
                    .zip(xb.iter())
                    .map(|(x, y)| {
                        let ux = if norm_a == 0.0 { *x } else { x / norm_a };
                        let uy = if norm_b == 0.0 { *y } else { y / norm_b };
                        (ux - uy).powi(2)
                    })
                    .sum::<f64>()
                    .sqrt()
            }
            _ => f64::INFINITY,
        }
    }
}

/// Number of positions at which two (space-padded) equal-length strings differ.
pub struct Hamming;

impl<P: NearPoint> Metric<P> for Hamming {
    fn distance(a: &P, b: &P) -> f64 {
        match (a.as_char_slice(), b.as_char_slice()) {
            (Some(ca), Some(cb)) => {
                let width = ca.len().max(cb.len());
                (0..width)
                    .filter(|&i| {
                        ca.get(i).copied().unwrap_or(' ') != cb.get(i).copied().unwrap_or(' ')
                    })
                    .count() as f64
            }
            _ => f64::INFINITY,
        }
    }
}

/// An entry in the bounded priority structure used by k-nearest/k-farthest search.
///
/// For k-nearest, `key` is the plain distance to the probe (a max-heap then evicts
/// the farthest candidate once full). For k-farthest, `key` is the *negated*
/// distance, so the same max-heap evicts the nearest (i.e. worst) candidate once full.
#[derive(Debug)]
pub(crate) struct HeapItem<P, T> {
    pub key: OrderedFloat<f64>,
    pub point: P,
    pub payload: Option<T>,
}

impl<P, T> PartialEq for HeapItem<P, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key.eq(&other.key)
    }
}

impl<P, T> Eq for HeapItem<P, T> {}

impl<P, T> PartialOrd for HeapItem<P, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P, T> Ord for HeapItem<P, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_matches_pythagoras() {
        let a = Point::new([0.0, 0.0]);
        let b = Point::new([3.0, 4.0]);
        assert_eq!(MetricKind::L2.distance(&a, &b), 5.0);
    }

    #[test]
    fn manhattan_sums_absolute_differences() {
        let a = Point::new([0.0, 0.0]);
        let b = Point::new([3.0, 4.0]);
        assert_eq!(MetricKind::L1.distance(&a, &b), 7.0);
    }

    #[test]
    fn chebyshev_takes_the_max_component() {
        let a = Point::new([0.0, 0.0]);
        let b = Point::new([3.0, 4.0]);
        assert_eq!(MetricKind::LInf.distance(&a, &b), 4.0);
    }

    #[test]
    fn spherical_handles_antipodal_points() {
        // Antipodal unit vectors are as far apart as two points on a sphere
        // can be: the chord spanning a full diameter.
        let a = Point::new([1.0, 0.0]);
        let b = Point::new([-1.0, 0.0]);
        assert!((MetricKind::Spherical.distance(&a, &b) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn spherical_leaves_the_degenerate_origin_unprojected() {
        // The origin has no direction to normalize, so it is compared as-is
        // against the unit circle rather than mapped to +infinity.
        let a = Point::new([0.0, 0.0]);
        let b = Point::new([1.0, 0.0]);
        let d = MetricKind::Spherical.distance(&a, &b);
        assert!(!d.is_nan());
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hamming_counts_mismatches() {
        let a = StringPoint::<4>::from_str("abcd");
        let b = StringPoint::<4>::from_str("abXd");
        assert_eq!(MetricKind::Hamming.distance(&a, &b), 1.0);
    }

    #[test]
    fn hamming_pads_short_strings_with_space() {
        let a = StringPoint::<4>::from_str("ab");
        let b = StringPoint::<4>::from_str("ab  ");
        assert_eq!(MetricKind::Hamming.distance(&a, &b), 0.0);
    }

    #[test]
    fn metric_kind_supports_rejects_mismatched_element_kind() {
        assert!(!MetricKind::Hamming.supports(ElementKind::Float));
        assert!(!MetricKind::L2.supports(ElementKind::Str));
        assert!(MetricKind::Hamming.supports(ElementKind::Str));
        assert!(MetricKind::Spherical.supports(ElementKind::Float));
    }
}
