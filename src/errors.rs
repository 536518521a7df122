//! ## Custom Errors for NearTree
//!
//! This module defines custom errors and exceptions that are used internally by NearTree.

use crate::geometry::{ElementKind, MetricKind};
use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents errors specific to invalid operations or parameters in NearTree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub enum NearTreeError {
    /// Occurs when an invalid dimension is requested.
    InvalidDimension {
        /// The dimension that was requested.
        requested: usize,
        /// The maximum number of dimensions available.
        available: usize,
    },
    /// Occurs when an invalid capacity (e.g. a zero dimension at creation) is given.
    InvalidCapacity {
        /// The capacity value that was provided.
        capacity: usize,
    },
    /// A point's dimension does not match the dimension the tree was created with.
    DimensionMismatch {
        /// The dimension the tree expects.
        expected: usize,
        /// The dimension the offending point actually has.
        actual: usize,
    },
    /// The element-type / metric combination requested at creation time is not supported.
    InvalidConfig {
        /// The element type that was requested.
        kind: ElementKind,
        /// The metric that was requested.
        metric: MetricKind,
    },
    /// Growing the deferred-insert queue failed; the item that triggered the growth was
    /// rejected and previously inserted points are unaffected.
    AllocationFailed,
    /// A query that requires at least one qualifying point found none.
    NotFound,
    /// A whole-tree predicate was evaluated against an empty tree.
    EmptyTree,
    /// A negative `k` or a null/uninitialized handle was supplied.
    BadArgument {
        /// A short description of which argument was invalid and why.
        reason: &'static str,
    },
}

impl fmt::Display for NearTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NearTreeError::InvalidDimension {
                requested,
                available,
            } => write!(
                f,
                "invalid dimension: requested {requested}, but only {available} dimensions available"
            ),
            NearTreeError::InvalidCapacity { capacity } => write!(
                f,
                "invalid capacity: {capacity}. capacity (dimension) must be greater than zero"
            ),
            NearTreeError::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: tree expects {expected}, point has {actual}"
            ),
            NearTreeError::InvalidConfig { kind, metric } => write!(
                f,
                "invalid configuration: element kind {kind:?} is not supported with metric {metric:?}"
            ),
            NearTreeError::AllocationFailed => {
                write!(f, "allocation failed while growing the deferred-insert queue")
            }
            NearTreeError::NotFound => write!(f, "no point satisfies the query"),
            NearTreeError::EmptyTree => write!(f, "the tree is empty"),
            NearTreeError::BadArgument { reason } => write!(f, "bad argument: {reason}"),
        }
    }
}

impl Error for NearTreeError {}
