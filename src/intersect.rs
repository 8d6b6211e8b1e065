//! Intersections between pairs of (monotone) segments.
//!
//! This returns either a list of parameter pairs where the two segments meet,
//! or a description of the parameter ranges over which they coincide. Points
//! within `eps` of a segment's endpoint are snapped to exactly `0` or `1`, and
//! points that belong to the same contact are reported only once.

use arrayvec::ArrayVec;
use kurbo::{Line, ParamCurve, PathSeg, Point};

use crate::{
    curve::{self, bounds, flatness, is_close, nearest, rects_overlap},
    Error,
};

/// Curve-curve subdivision gives up (with an error) after this many recursive calls.
const CALL_BUDGET: u32 = 4096;

pub const MAX_POINTS: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum Intersections {
    /// The segments trace the same geometry over these ranges.
    ///
    /// `a.0 < a.1`, and `b.0` is the parameter on the second segment that
    /// corresponds to `a.0` (so `b` runs backwards if the segments have
    /// opposite orientations).
    Overlap { a: (f64, f64), b: (f64, f64) },
    /// Isolated meeting points, as `(t_a, t_b)` pairs sorted by `t_a`.
    Points(ArrayVec<(f64, f64), MAX_POINTS>),
}

impl Intersections {
    fn empty() -> Self {
        Intersections::Points(ArrayVec::new())
    }
}

/// Intersects two segments.
///
/// Fails if curve subdivision runs out of budget, or if it finds more contacts
/// than we have room for: a partial answer would silently give wrong windings.
pub fn intersect(a: &PathSeg, b: &PathSeg, eps: f64) -> Result<Intersections, Error> {
    if !rects_overlap(&bounds(a), &bounds(b), eps) {
        return Ok(Intersections::empty());
    }

    if let Some(overlap) = find_overlap(a, b, eps) {
        return Ok(overlap);
    }

    let mut candidates = Vec::new();
    // Endpoint contacts first, so that they win when deduplicating.
    for (ta, p) in [(0.0, a.start()), (1.0, a.end())] {
        let (tb, dist) = nearest(b, p);
        if dist <= eps {
            candidates.push((ta, snap(b, tb, p, eps)));
        }
    }
    for (tb, p) in [(0.0, b.start()), (1.0, b.end())] {
        let (ta, dist) = nearest(a, p);
        if dist <= eps {
            candidates.push((snap(a, ta, p, eps), tb));
        }
    }

    match (a, b) {
        (_, PathSeg::Line(line)) => {
            for hit in a.intersect_line(*line) {
                candidates.push((hit.segment_t, hit.line_t));
            }
        }
        (PathSeg::Line(line), _) => {
            for hit in b.intersect_line(*line) {
                candidates.push((hit.line_t, hit.segment_t));
            }
        }
        _ => {
            let mut budget = CALL_BUDGET;
            subdivide(a, 0.0..1.0, b, 0.0..1.0, eps, &mut budget, &mut candidates)?;
        }
    }

    // Every contact must name one point on both segments.
    for &(ta, tb) in &candidates {
        let gap = (a.eval(ta) - b.eval(tb)).hypot();
        if gap > 2.0 * eps {
            log::debug!("contact ({ta}, {tb}) is {gap} apart");
            return Err(Error::Intersection);
        }
    }

    let mut snapped: Vec<(f64, f64)> = candidates
        .into_iter()
        .filter(|(ta, tb)| ta.is_finite() && tb.is_finite())
        .map(|(ta, tb)| {
            let ta = ta.clamp(0.0, 1.0);
            let tb = tb.clamp(0.0, 1.0);
            (snap(a, ta, a.eval(ta), eps), snap(b, tb, b.eval(tb), eps))
        })
        .collect();
    dedup_contacts(a, b, &mut snapped, eps);

    let mut ret = ArrayVec::new();
    for pair in snapped {
        if ret.try_push(pair).is_err() {
            log::debug!("too many intersections between {a:?} and {b:?}");
            return Err(Error::Intersection);
        }
    }
    Ok(Intersections::Points(ret))
}

fn is_endpoint(t: f64) -> bool {
    t == 0.0 || t == 1.0
}

fn snap(seg: &PathSeg, t: f64, p: Point, eps: f64) -> f64 {
    if is_endpoint(t) {
        t
    } else if (p - seg.start()).hypot() <= eps {
        0.0
    } else if (p - seg.end()).hypot() <= eps {
        1.0
    } else {
        t
    }
}

/// Collapses contacts that are really the same meeting point.
///
/// Two contacts are the same if their points are within `eps`, or if the
/// segments stay within `eps` of one another all the way between them (which
/// is what happens near a tangency). Endpoint contacts are preferred over
/// interior ones.
fn dedup_contacts(a: &PathSeg, b: &PathSeg, pts: &mut Vec<(f64, f64)>, eps: f64) {
    pts.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.total_cmp(&y.1)));
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &(ta, tb) in pts.iter() {
        if let Some(last) = out.last_mut() {
            let close = (a.eval(ta) - a.eval(last.0)).hypot() <= eps
                || (b.eval(tb) - b.eval(last.1)).hypot() <= eps
                || same_contact(a, b, *last, (ta, tb), eps);
            if close {
                let last_rank = is_endpoint(last.0) as u8 + is_endpoint(last.1) as u8;
                let rank = is_endpoint(ta) as u8 + is_endpoint(tb) as u8;
                if rank > last_rank {
                    *last = (ta, tb);
                }
                continue;
            }
        }
        out.push((ta, tb));
    }
    *pts = out;
}

fn same_contact(a: &PathSeg, b: &PathSeg, x: (f64, f64), y: (f64, f64), eps: f64) -> bool {
    [0.25, 0.5, 0.75].iter().all(|&s| {
        let ta = x.0 + (y.0 - x.0) * s;
        let tb = x.1 + (y.1 - x.1) * s;
        (a.eval(ta) - b.eval(tb)).hypot() <= eps
    })
}

/// Looks for a range over which `a` and `b` trace the same geometry.
///
/// Overlapping curves either have both endpoints of one lying on the other, or
/// one endpoint of each lying on the other. We project endpoints, and then
/// confirm with samples from the interior of the candidate range.
fn find_overlap(a: &PathSeg, b: &PathSeg, eps: f64) -> Option<Intersections> {
    let mut hits: ArrayVec<(f64, f64), 4> = ArrayVec::new();
    for (ta, p) in [(0.0, a.start()), (1.0, a.end())] {
        let (tb, dist) = nearest(b, p);
        if dist <= eps {
            hits.push((ta, snap(b, tb, p, eps)));
        }
    }
    for (tb, p) in [(0.0, b.start()), (1.0, b.end())] {
        let (ta, dist) = nearest(a, p);
        if dist <= eps {
            hits.push((snap(a, ta, p, eps), tb));
        }
    }
    if hits.len() < 2 {
        return None;
    }
    let lo = *hits.iter().min_by(|x, y| x.0.total_cmp(&y.0))?;
    let hi = *hits.iter().max_by(|x, y| x.0.total_cmp(&y.0))?;
    if (a.eval(hi.0) - a.eval(lo.0)).hypot() <= eps {
        return None;
    }

    for s in [0.25, 0.5, 0.75] {
        let ta = lo.0 + (hi.0 - lo.0) * s;
        let tb = is_close(a, ta, b, eps)?;
        if tb < lo.1.min(hi.1) || tb > lo.1.max(hi.1) {
            return None;
        }
    }
    // ...and the other way, in case `b` wanders off and comes back.
    for s in [0.25, 0.5, 0.75] {
        let tb = lo.1 + (hi.1 - lo.1) * s;
        is_close(b, tb, a, eps)?;
    }

    Some(Intersections::Overlap {
        a: (lo.0, hi.0),
        b: (lo.1, hi.1),
    })
}

fn subdivide(
    a: &PathSeg,
    ra: std::ops::Range<f64>,
    b: &PathSeg,
    rb: std::ops::Range<f64>,
    eps: f64,
    budget: &mut u32,
    out: &mut Vec<(f64, f64)>,
) -> Result<(), Error> {
    if *budget == 0 {
        log::debug!("curve intersection ran out of budget");
        return Err(Error::Intersection);
    }
    *budget -= 1;

    let sa = a.subsegment(ra.clone());
    let sb = b.subsegment(rb.clone());
    if !rects_overlap(&bounds(&sa), &bounds(&sb), eps) {
        return Ok(());
    }

    let flat_a = flatness(&sa) <= eps * 0.25;
    let flat_b = flatness(&sb) <= eps * 0.25;
    let tiny = ra.end - ra.start < 1e-14 && rb.end - rb.start < 1e-14;
    if (flat_a && flat_b) || tiny {
        let chord_a = Line::new(sa.start(), sa.end());
        let chord_b = Line::new(sb.start(), sb.end());
        if let Some((s, _)) = chord_crossing(chord_a, chord_b) {
            // A flat piece needn't be traced at constant speed (think of a
            // quad whose control point sits on its chord), so the position
            // along the chord isn't the parameter. Project instead.
            let p = chord_a.eval(s);
            out.push((
                local_to_range(&sa, &ra, p),
                local_to_range(&sb, &rb, p),
            ));
        }
        return Ok(());
    }

    // Split whichever one is less flat.
    if !flat_a && (flat_b || flatness(&sa) >= flatness(&sb)) {
        let mid = 0.5 * (ra.start + ra.end);
        subdivide(a, ra.start..mid, b, rb.clone(), eps, budget, out)?;
        subdivide(a, mid..ra.end, b, rb, eps, budget, out)
    } else {
        let mid = 0.5 * (rb.start + rb.end);
        subdivide(a, ra.clone(), b, rb.start..mid, eps, budget, out)?;
        subdivide(a, ra, b, mid..rb.end, eps, budget, out)
    }
}

/// The parameter, in the whole segment's terms, of the point on the piece
/// `piece` (which covers `range` of the segment) nearest to `p`.
fn local_to_range(piece: &PathSeg, range: &std::ops::Range<f64>, p: Point) -> f64 {
    let (t, _) = nearest(piece, p);
    range.start + t * (range.end - range.start)
}

/// Where two line segments cross, as parameters along each.
fn chord_crossing(a: Line, b: Line) -> Option<(f64, f64)> {
    let r = a.p1 - a.p0;
    let v = b.p1 - b.p0;
    let denom = r.cross(v);
    if denom.abs() <= 1e-12 * r.hypot() * v.hypot() {
        return None;
    }
    let w = b.p0 - a.p0;
    let s = w.cross(v) / denom;
    let u = w.cross(r) / denom;
    let slack = 1e-9;
    if (-slack..=1.0 + slack).contains(&s) && (-slack..=1.0 + slack).contains(&u) {
        Some((s.clamp(0.0, 1.0), u.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// The parameter on `seg` closest to `p`, snapped to an endpoint if it's within `eps` of one.
pub fn project(seg: &PathSeg, p: Point, eps: f64) -> Option<f64> {
    let (t, dist) = curve::nearest(seg, p);
    (dist <= eps).then(|| snap(seg, t, p, eps))
}
