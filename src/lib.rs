#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod typed_vec;

mod angle;
mod coincidence;
mod context;
mod curve;
mod disjoint_sets;
mod intersect;
mod segment;
mod walk;
mod winding;
mod writer;

#[cfg(feature = "generators")]
pub mod generators;

use kurbo::{BezPath, Shape};

use context::OpContext;
use winding::Operation;
pub use writer::{Contour, ContourIdx, Contours};

/// A fill rule tells us how to decide whether a point is "inside" a path.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FillRule {
    /// The point is "inside" if its winding number is odd.
    EvenOdd,
    /// The point is "inside" if its winding number is non-zero.
    NonZero,
}

/// Binary operations between sets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    /// A point is in the union of two sets if it is in either one.
    Union,
    /// A point is in the intersection of two sets if it is in both.
    Intersection,
    /// A point is in the difference of two sets if it is in the first but not the second.
    Difference,
    /// A point is in the exclusive-or of two sets if it is in one or the other, but not both.
    Xor,
}

/// Why an operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// At least one of the inputs was infinite.
    Infinity,
    /// At least one of the inputs was not a number.
    NaN,
    /// Two routes around the same region gave it different winding numbers.
    WindingConflict,
    /// Some part of the boundary never got a winding number.
    UnresolvedWinding,
    /// The output passes through a junction where the edges can't be ordered.
    Unsortable,
    /// The coincident parts of the inputs couldn't be reconciled.
    Coincidence,
    /// We couldn't reliably find where two of the input curves meet.
    Intersection,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Infinity => write!(f, "one of the inputs was infinite"),
            Error::NaN => write!(f, "one of the inputs had a NaN"),
            Error::WindingConflict => write!(f, "inconsistent winding numbers"),
            Error::UnresolvedWinding => write!(f, "failed to compute a winding number"),
            Error::Unsortable => write!(f, "the output passes through an unorderable junction"),
            Error::Coincidence => write!(f, "failed to resolve coincident edges"),
            Error::Intersection => write!(f, "failed to intersect a pair of curves"),
        }
    }
}

impl std::error::Error for Error {}

/// Picks the tolerance for an operation on these paths.
///
/// The tolerance grows with the magnitude of the coordinates, because that's
/// how the precision of their sums and differences shrinks.
fn tolerance(paths: &[&BezPath]) -> Result<f64, Error> {
    let mut bbox: Option<kurbo::Rect> = None;
    for p in paths {
        if p.elements().is_empty() {
            continue;
        }
        let b = p.bounding_box();
        bbox = Some(bbox.map_or(b, |bbox| bbox.union(b)));
    }
    let Some(bbox) = bbox else {
        return Ok(1e-6);
    };

    // Find the extremal values, to figure out how much precision we can support.
    let min = bbox.min_x().min(bbox.min_y());
    let max = bbox.max_x().max(bbox.max_y());
    // NaN doesn't always survive min and max, so check the points themselves too.
    let has_nan = paths
        .iter()
        .flat_map(|p| p.segments())
        .flat_map(|seg| curve::control_points(&seg))
        .any(|pt| pt.is_nan());
    if has_nan || min.is_nan() || max.is_nan() {
        return Err(Error::NaN);
    }
    if min.is_infinite() || max.is_infinite() {
        return Err(Error::Infinity);
    }

    let m = min.abs().max(max.abs());
    let eps = m * (f64::EPSILON * 64.0);
    let eps = eps.max(1e-6);

    debug_assert!(eps.is_finite());
    Ok(eps)
}

/// Computes a boolean operation between two sets, each of which is described as a path.
///
/// Both paths are interpreted with the same fill rule. Open subpaths are
/// treated as if they were closed with a straight line.
pub fn binary_op(
    set_a: &BezPath,
    set_b: &BezPath,
    fill_rule: FillRule,
    op: BinaryOp,
) -> Result<Contours, Error> {
    binary_op_with_fill_rules(set_a, fill_rule, set_b, fill_rule, op)
}

/// Like [`binary_op`], but with a separate fill rule for each input.
pub fn binary_op_with_fill_rules(
    set_a: &BezPath,
    fill_a: FillRule,
    set_b: &BezPath,
    fill_b: FillRule,
    op: BinaryOp,
) -> Result<Contours, Error> {
    let eps = tolerance(&[set_a, set_b])?;
    log::debug!("{op:?} with tolerance {eps}");

    let mut ctx = OpContext::new(eps, [fill_a, fill_b]);
    ctx.add_path(set_a, false);
    ctx.add_path(set_b, true);
    ctx.run(Operation::Binary(op))
}

/// Resolves a path into non-overlapping contours.
///
/// The result covers the same area as the input (according to its fill rule),
/// but none of its contours cross one another or themselves.
pub fn simplify(path: &BezPath, fill_rule: FillRule) -> Result<Contours, Error> {
    let eps = tolerance(&[path])?;
    log::debug!("simplify with tolerance {eps}");

    let mut ctx = OpContext::new(eps, [fill_rule, FillRule::NonZero]);
    ctx.add_path(path, false);
    ctx.run(Operation::Simplify)
}
