//! Winding numbers, and deciding which spans belong in the output.
//!
//! Every live span gets the winding number of the region just to its left
//! (looking in the direction of increasing `t`). The winding number on its
//! right follows from that and the span's winding value. We find them by
//! casting a ray from the topmost unresolved span to get one winding number
//! from scratch, and then carrying it around the angle rings at each
//! junction. Once every span has a winding number, the activity tables
//! decide which spans separate the inside of the result from the outside.

use kurbo::ParamCurve;

use crate::{
    context::OpContext,
    curve::{deriv, solve_monotone, Axis},
    segment::SpanIdx,
    BinaryOp, Error, FillRule,
};

/// The parameters (relative to a span) that we try to cast rays from, in order.
const RAY_SAMPLES: [f64; 7] = [0.5, 0.25, 0.75, 0.375, 0.625, 0.125, 0.875];

/// We support boolean operations, so a "winding number" for us is two winding
/// numbers, one for each shape.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct WindingNumber {
    /// The winding number of the first shape.
    pub shape_a: i32,
    /// The winding number of the second shape.
    pub shape_b: i32,
}

impl std::fmt::Debug for WindingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}a + {}b", self.shape_a, self.shape_b)
    }
}

impl std::ops::Add for WindingNumber {
    type Output = WindingNumber;

    fn add(self, rhs: WindingNumber) -> WindingNumber {
        WindingNumber {
            shape_a: self.shape_a + rhs.shape_a,
            shape_b: self.shape_b + rhs.shape_b,
        }
    }
}

impl std::ops::Sub for WindingNumber {
    type Output = WindingNumber;

    fn sub(self, rhs: WindingNumber) -> WindingNumber {
        WindingNumber {
            shape_a: self.shape_a - rhs.shape_a,
            shape_b: self.shape_b - rhs.shape_b,
        }
    }
}

impl std::ops::Mul<i32> for WindingNumber {
    type Output = WindingNumber;

    fn mul(self, rhs: i32) -> WindingNumber {
        WindingNumber {
            shape_a: self.shape_a * rhs,
            shape_b: self.shape_b * rhs,
        }
    }
}

impl WindingNumber {
    /// Converts from a segment's point of view (its own operand, then the other one).
    pub fn from_operand(operand: bool, own: i32, opp: i32) -> WindingNumber {
        if operand {
            WindingNumber {
                shape_a: opp,
                shape_b: own,
            }
        } else {
            WindingNumber {
                shape_a: own,
                shape_b: opp,
            }
        }
    }

    /// Converts to a segment's point of view: its own operand, then the other one.
    pub fn to_operand(self, operand: bool) -> (i32, i32) {
        if operand {
            (self.shape_b, self.shape_a)
        } else {
            (self.shape_a, self.shape_b)
        }
    }
}

/// The winding numbers on both sides of a span.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct SpanWindings {
    /// Just to the left, looking in the direction of increasing `t`.
    pub left: WindingNumber,
    /// Just to the right, looking in the direction of increasing `t`.
    pub right: WindingNumber,
}

impl std::fmt::Debug for SpanWindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} | {:?}", self.right, self.left)
    }
}

/// What we're computing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Resolve the first shape into non-overlapping contours.
    Simplify,
    /// Combine the two shapes.
    Binary(BinaryOp),
}

const F: bool = false;
const T: bool = true;

/// Does an edge separating `from` from `to` belong to the result of a binary op?
///
/// Indexed by `[op][mi_from][mi_to][su_from][su_to]`, where "mi" is whether
/// we're inside the first shape (the minuend) and "su" is whether we're inside
/// the second (the subtrahend). The ops are in the order difference,
/// intersection, union, xor.
#[rustfmt::skip]
pub const ACTIVE_EDGE: [[[[[bool; 2]; 2]; 2]; 2]; 4] = [
    //        mi_from = 0                          mi_from = 1
    //  mi_to = 0           mi_to = 1          mi_to = 0           mi_to = 1
    [[[[F, F], [F, F]], [[T, F], [T, F]]], [[[T, T], [F, F]], [[F, T], [T, F]]]], // mi - su
    [[[[F, F], [F, F]], [[F, T], [F, T]]], [[[F, F], [T, T]], [[F, T], [T, F]]]], // mi & su
    [[[[F, T], [T, F]], [[T, T], [F, F]]], [[[T, F], [T, F]], [[F, F], [F, F]]]], // mi | su
    [[[[F, T], [T, F]], [[T, F], [F, T]]], [[[T, F], [F, T]], [[F, T], [T, F]]]], // mi ^ su
];

/// Does an edge separating `from` from `to` belong to a simplified shape?
pub const UNARY_ACTIVE_EDGE: [[bool; 2]; 2] = [[F, T], [T, F]];

fn op_index(op: BinaryOp) -> usize {
    match op {
        BinaryOp::Difference => 0,
        BinaryOp::Intersection => 1,
        BinaryOp::Union => 2,
        BinaryOp::Xor => 3,
    }
}

fn inside_shape(fill: FillRule, winding: i32) -> bool {
    match fill {
        FillRule::EvenOdd => winding % 2 != 0,
        FillRule::NonZero => winding != 0,
    }
}

impl OpContext {
    fn normalize(&self, w: WindingNumber) -> WindingNumber {
        let norm = |fill, x: i32| match fill {
            FillRule::EvenOdd => x & 1,
            FillRule::NonZero => x,
        };
        WindingNumber {
            shape_a: norm(self.fill[0], w.shape_a),
            shape_b: norm(self.fill[1], w.shape_b),
        }
    }

    /// Is a region with this winding number part of the result?
    pub fn inside(&self, op: Operation, w: WindingNumber) -> bool {
        let a = inside_shape(self.fill[0], w.shape_a);
        let b = inside_shape(self.fill[1], w.shape_b);
        match op {
            Operation::Simplify => a,
            Operation::Binary(BinaryOp::Union) => a || b,
            Operation::Binary(BinaryOp::Intersection) => a && b,
            Operation::Binary(BinaryOp::Difference) => a && !b,
            Operation::Binary(BinaryOp::Xor) => a != b,
        }
    }

    /// The winding value of a span, as a difference between its left and right winding numbers.
    pub fn span_value(&self, span: SpanIdx) -> Result<WindingNumber, Error> {
        let operand = self.segments[self.spans[span].segment].operand;
        let s = self.upcast(span)?;
        Ok(WindingNumber::from_operand(operand, s.wind_value, s.opp_value))
    }

    pub fn left_winding(&self, span: SpanIdx) -> Option<WindingNumber> {
        let operand = self.segments[self.spans[span].segment].operand;
        let s = self.spans[span].span.as_ref()?;
        Some(WindingNumber::from_operand(operand, s.wind_sum?, s.opp_sum?))
    }

    pub fn windings(&self, span: SpanIdx) -> Result<Option<SpanWindings>, Error> {
        let value = self.span_value(span)?;
        Ok(self.left_winding(span).map(|left| SpanWindings {
            left,
            right: left - value,
        }))
    }

    /// Records the winding number to the left of a span.
    ///
    /// Returns true if it was new, and fails if the span already had a
    /// different one.
    pub fn set_left_winding(&mut self, span: SpanIdx, w: WindingNumber) -> Result<bool, Error> {
        let w = self.normalize(w);
        if let Some(old) = self.left_winding(span) {
            if old == w {
                return Ok(false);
            }
            log::debug!("{span:?} has winding {old:?}, but we also got {w:?}");
            return Err(Error::WindingConflict);
        }
        let operand = self.segments[self.spans[span].segment].operand;
        let (own, opp) = w.to_operand(operand);
        let s = self.upcast_mut(span)?;
        s.wind_sum = Some(own);
        s.opp_sum = Some(opp);
        log::trace!("{span:?} gets winding {w:?} on its left");
        Ok(true)
    }

    /// The live span with the topmost (and then leftmost) point, among those
    /// satisfying `pred`.
    pub fn find_top(&self, pred: impl Fn(&OpContext, SpanIdx) -> bool) -> Option<SpanIdx> {
        let mut best: Option<(f64, f64, SpanIdx)> = None;
        for (seg_idx, seg) in self.segments.iter() {
            if seg.done() {
                continue;
            }
            for span in self.live_spans(seg_idx) {
                if !pred(self, span) {
                    continue;
                }
                let Some(next) = self.spans[span].next else {
                    continue;
                };
                let (p, q) = (self.span_pt(span), self.span_pt(next));
                let top = if (q.y, q.x) < (p.y, p.x) { q } else { p };
                let better = match best {
                    None => true,
                    Some((y, x, _)) => (top.y, top.x) < (y, x),
                };
                if better {
                    best = Some((top.y, top.x, span));
                }
            }
        }
        best.map(|(_, _, span)| span)
    }

    /// Casts a ray from somewhere on `span`, and returns the winding number on its left.
    ///
    /// Returns `None` if every ray we tried passed too close to some other
    /// span's crossing point to be trusted.
    pub fn ray_cast(&self, span: SpanIdx) -> Result<Option<WindingNumber>, Error> {
        let Some(next) = self.spans[span].next else {
            return Err(Error::Coincidence);
        };
        let curve = &self.segments[self.spans[span].segment].curve;
        let (t0, t1) = (self.span_t(span), self.span_t(next));
        let value = self.span_value(span)?;

        for s in RAY_SAMPLES {
            let t = t0 + s * (t1 - t0);
            let p = curve.eval(t);
            let d = deriv(curve, t);
            if d.hypot() == 0.0 {
                continue;
            }
            // Cast across the span, in whichever axis it's steeper.
            let ray = if d.y.abs() >= d.x.abs() { Axis::X } else { Axis::Y };
            let Some(beyond) = self.cast(span, p, ray)? else {
                log::trace!("ambiguous ray from {span:?} at t={t}");
                continue;
            };
            // The left normal is (-d.y, d.x).
            let left_is_beyond = match ray {
                Axis::X => d.y < 0.0,
                Axis::Y => d.x > 0.0,
            };
            let left = if left_is_beyond { beyond } else { beyond + value };
            log::trace!("ray from {span:?} at t={t} along {ray:?}: {left:?} on the left");
            return Ok(Some(left));
        }
        Ok(None)
    }

    /// The winding number just beyond `p`, looking from `p` in the positive `ray` direction.
    fn cast(&self, exclude: SpanIdx, p: kurbo::Point, ray: Axis) -> Result<Option<WindingNumber>, Error> {
        let level = ray.other();
        let (x0, y0) = (ray.of(p), level.of(p));
        let mut w = WindingNumber::default();
        for (seg_idx, seg) in self.segments.iter() {
            let (lo, hi) = match level {
                Axis::X => (seg.bounds.x0, seg.bounds.x1),
                Axis::Y => (seg.bounds.y0, seg.bounds.y1),
            };
            let far = match ray {
                Axis::X => seg.bounds.x1,
                Axis::Y => seg.bounds.y1,
            };
            if seg.done() || y0 < lo - self.eps || y0 > hi + self.eps || far < x0 - self.eps {
                continue;
            }
            for b in self.live_spans(seg_idx) {
                if b == exclude {
                    continue;
                }
                let Some(next) = self.spans[b].next else {
                    continue;
                };
                let ys = level.of(self.span_pt(b));
                let ye = level.of(self.span_pt(next));
                // Half-open, so that a ray through a vertex counts exactly one of
                // the spans meeting there.
                if !(ys.min(ye) <= y0 && y0 < ys.max(ye)) {
                    continue;
                }
                let tc = solve_monotone(&seg.curve, self.span_t(b), self.span_t(next), level, y0);
                let xc = ray.of(seg.curve.eval(tc));
                if (xc - x0).abs() <= self.eps {
                    return Ok(None);
                }
                if xc < x0 {
                    continue;
                }
                let sign = if ye > ys { 1 } else { -1 };
                let sign = match ray {
                    Axis::X => sign,
                    Axis::Y => -sign,
                };
                w = w + self.span_value(b)? * sign;
            }
        }
        Ok(Some(w))
    }

    /// Carries winding numbers around an angle ring.
    ///
    /// If some span in the ring already has a winding number, this assigns
    /// winding numbers to all the others and returns the ones that were new.
    /// Returns `None` if the ring's order can't be trusted.
    pub fn compute_sum(&mut self, ring: usize) -> Result<Option<Vec<SpanIdx>>, Error> {
        if self.angle_rings[ring].unorderable {
            return Ok(None);
        }
        let ids = self.angle_rings[ring].angles.clone();
        let n = ids.len();
        let Some(start) = (0..n).find(|&i| self.left_winding(self.angles[ids[i]].span).is_some())
        else {
            return Ok(Some(Vec::new()));
        };

        // sectors[i] is the winding number just counter-clockwise of angle i.
        let mut sectors = vec![WindingNumber::default(); n];
        let first = &self.angles[ids[start]];
        let left = self.left_winding(first.span).unwrap_or_default();
        let value = self.span_value(first.span)?;
        // Standing at the junction and looking out along a forward angle, the
        // span's left is counter-clockwise of it. For a backward angle, it's clockwise.
        sectors[start] = if first.forward { left } else { left - value };

        for k in 1..=n {
            let i = (start + k) % n;
            let prev = (start + k - 1) % n;
            let angle = &self.angles[ids[i]];
            let value = self.span_value(angle.span)?;
            let crossed = if angle.forward { value } else { value * -1 };
            let w = sectors[prev] + crossed;
            if i == start {
                if self.normalize(w) != self.normalize(sectors[start]) {
                    log::debug!("windings don't balance around ring {ring}");
                    return Err(Error::WindingConflict);
                }
            } else {
                sectors[i] = w;
            }
        }

        let mut newly_set = Vec::new();
        for (i, &a) in ids.iter().enumerate() {
            let angle = &self.angles[a];
            let span = angle.span;
            let left = if angle.forward {
                sectors[i]
            } else {
                sectors[(i + n - 1) % n]
            };
            if self.set_left_winding(span, left)? {
                newly_set.push(span);
            }
        }
        Ok(Some(newly_set))
    }

    /// Spreads a span's winding number to everything reachable from it
    /// through orderable junctions.
    pub fn mark_and_chase_winding(&mut self, span: SpanIdx) -> Result<(), Error> {
        let mut stack = vec![span];
        while let Some(s) = stack.pop() {
            let Some(data) = self.spans[s].span.as_ref() else {
                continue;
            };
            let angles = [data.from_angle, data.to_angle];
            for angle in angles.into_iter().flatten() {
                let ring = self.angles[angle].ring;
                if let Some(newly_set) = self.compute_sum(ring)? {
                    stack.extend(newly_set);
                }
            }
        }
        Ok(())
    }

    /// Gives every live span a winding number.
    pub fn resolve_windings(&mut self) -> Result<(), Error> {
        let unresolved =
            |ctx: &OpContext, s: SpanIdx| ctx.left_winding(s).is_none() && ctx.upcast(s).is_ok_and(|s| !s.unsortable);
        while let Some(top) = self.find_top(unresolved) {
            match self.ray_cast(top)? {
                Some(w) => {
                    self.set_left_winding(top, w)?;
                    self.mark_and_chase_winding(top)?;
                }
                None => {
                    log::debug!("no clean ray from {top:?}");
                    self.upcast_mut(top)?.unsortable = true;
                }
            }
        }

        if let Some(dropped) = self.find_top(|ctx, s| ctx.left_winding(s).is_none()) {
            log::debug!("couldn't find a winding number for {dropped:?}");
            return Err(Error::UnresolvedWinding);
        }
        Ok(())
    }

    /// Does this span separate the inside of the result from the outside?
    pub fn is_active(&self, op: Operation, span: SpanIdx) -> Result<bool, Error> {
        let Some(w) = self.windings(span)? else {
            return Err(Error::UnresolvedWinding);
        };
        let inside_a = |x: WindingNumber| inside_shape(self.fill[0], x.shape_a) as usize;
        let inside_b = |x: WindingNumber| inside_shape(self.fill[1], x.shape_b) as usize;
        Ok(match op {
            Operation::Simplify => UNARY_ACTIVE_EDGE[inside_a(w.right)][inside_a(w.left)],
            Operation::Binary(op) => {
                ACTIVE_EDGE[op_index(op)][inside_a(w.right)][inside_a(w.left)][inside_b(w.right)]
                    [inside_b(w.left)]
            }
        })
    }

    /// Marks every span that isn't part of the result's boundary as done.
    pub fn mark_inactive(&mut self, op: Operation) -> Result<(), Error> {
        let mut inactive = 0;
        for seg in self.segments.indices().collect::<Vec<_>>() {
            for span in self.live_spans(seg).collect::<Vec<_>>() {
                if !self.is_active(op, span)? {
                    self.mark_done(span);
                    inactive += 1;
                }
            }
        }
        log::debug!("{inactive} inactive spans");
        Ok(())
    }
}
