//! Tracing the boundary of the result.
//!
//! After [`OpContext::mark_inactive`], the spans that aren't done are exactly
//! the ones separating the inside of the result from the outside. We string
//! them into closed loops, always travelling with the inside on our left. At
//! each junction the next span is the first one clockwise from the one we
//! arrived along.

use crate::{
    angle::AngleIdx,
    context::OpContext,
    segment::SpanIdx,
    winding::Operation,
    writer::Contours,
    Error,
};

/// A span, traversed in one direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    pub span: SpanIdx,
    /// True if we walk this span in the direction of increasing `t`.
    pub forward: bool,
}

impl OpContext {
    /// Should this active span be walked forwards?
    fn walk_forward(&self, op: Operation, span: SpanIdx) -> Result<bool, Error> {
        let w = self.windings(span)?.ok_or(Error::UnresolvedWinding)?;
        Ok(self.inside(op, w.left))
    }

    fn is_done(&self, span: SpanIdx) -> bool {
        self.spans[span].span.as_ref().map_or(true, |s| s.done)
    }

    /// The angle leaving the junction we start from, when walking `span` in this direction.
    fn departure(&self, span: SpanIdx, forward: bool) -> Result<AngleIdx, Error> {
        let s = self.upcast(span)?;
        let angle = if forward { s.from_angle } else { s.to_angle };
        angle.ok_or(Error::UnresolvedWinding)
    }

    fn arrival(&self, span: SpanIdx, forward: bool) -> Result<AngleIdx, Error> {
        self.departure(span, !forward)
    }

    /// Picks a span to start the next loop from.
    ///
    /// Junctions we passed through with spans left over come first, so that
    /// loops touching ones we already have get traced next.
    fn next_start(&self, op: Operation, chase: &mut Vec<usize>) -> Result<Option<Piece>, Error> {
        while let Some(ring) = chase.pop() {
            for &a in &self.angle_rings[ring].angles {
                let span = self.angles[a].span;
                if !self.is_done(span) {
                    return Ok(Some(Piece {
                        span,
                        forward: self.walk_forward(op, span)?,
                    }));
                }
            }
        }
        match self.find_top(|_, _| true) {
            Some(span) => Ok(Some(Piece {
                span,
                forward: self.walk_forward(op, span)?,
            })),
            None => Ok(None),
        }
    }

    fn walk_loop(
        &mut self,
        op: Operation,
        start: Piece,
        chase: &mut Vec<usize>,
    ) -> Result<Vec<Piece>, Error> {
        let start_angle = self.departure(start.span, start.forward)?;
        let mut cur = start;
        let mut pieces = Vec::new();

        for _ in 0..self.spans.len() {
            self.mark_done(cur.span);
            pieces.push(cur);

            let arrived = self.arrival(cur.span, cur.forward)?;
            let ring = &self.angle_rings[self.angles[arrived].ring];
            if ring.unorderable {
                log::debug!("walked into unorderable junction {:?} at {:?}", ring.junction, ring.pt);
                return Err(Error::Unsortable);
            }
            let n = ring.angles.len();
            let pos = ring.position(arrived).ok_or(Error::Unsortable)?;

            let mut next = None;
            for k in 1..n {
                let cand = ring.angles[(pos + n - k) % n];
                if cand == start_angle {
                    log::trace!("closed a loop of {} pieces", pieces.len());
                    return Ok(pieces);
                }
                if !self.is_done(self.angles[cand].span) {
                    next = Some(cand);
                    break;
                }
            }
            let Some(next) = next else {
                log::debug!("dead end at {:?} after {cur:?}", ring.pt);
                return Err(Error::WindingConflict);
            };

            let angle = &self.angles[next];
            let piece = Piece {
                span: angle.span,
                forward: angle.forward,
            };
            if self.walk_forward(op, piece.span)? != piece.forward {
                log::debug!("{piece:?} would put the inside on the right");
                return Err(Error::WindingConflict);
            }
            let ring_idx = angle.ring;
            let leftover = self.angle_rings[ring_idx]
                .angles
                .iter()
                .filter(|&&a| a != next && !self.is_done(self.angles[a].span))
                .count();
            if leftover > 0 {
                chase.push(ring_idx);
            }
            cur = piece;
        }
        log::debug!("a loop starting at {start:?} never closed");
        Err(Error::WindingConflict)
    }

    /// Traces all the active spans into closed contours.
    pub fn walk(&mut self, op: Operation) -> Result<Contours, Error> {
        let mut chase = Vec::new();
        let mut loops = Vec::new();
        while let Some(start) = self.next_start(op, &mut chase)? {
            loops.push(self.walk_loop(op, start, &mut chase)?);
        }
        log::debug!("walked {} loops", loops.len());
        Ok(self.write_contours(&loops))
    }
}

#[cfg(test)]
mod tests {
    use kurbo::BezPath;

    use super::*;
    use crate::{BinaryOp, FillRule};

    fn square(x: f64, y: f64, size: f64) -> BezPath {
        let mut p = BezPath::new();
        p.move_to((x, y));
        p.line_to((x + size, y));
        p.line_to((x + size, y + size));
        p.line_to((x, y + size));
        p.close_path();
        p
    }

    fn walked(a: &BezPath, b: &BezPath, op: Operation) -> (OpContext, Vec<Vec<Piece>>) {
        let mut ctx = OpContext::new(1e-9, [FillRule::NonZero; 2]);
        ctx.add_path(a, false);
        ctx.add_path(b, true);
        ctx.intersect_all().unwrap();
        ctx.move_all_nearby();
        ctx.resolve_coincidences().unwrap();
        for seg in ctx.segments.indices().collect::<Vec<_>>() {
            ctx.align(seg);
        }
        ctx.apply().unwrap();
        ctx.calc_angles();
        ctx.sort_angles();
        ctx.resolve_windings().unwrap();
        ctx.mark_inactive(op).unwrap();

        let mut chase = Vec::new();
        let mut loops = Vec::new();
        while let Some(start) = ctx.next_start(op, &mut chase).unwrap() {
            loops.push(ctx.walk_loop(op, start, &mut chase).unwrap());
        }
        (ctx, loops)
    }

    #[test]
    fn union_of_disjoint_squares() {
        let (ctx, loops) = walked(
            &square(0.0, 0.0, 1.0),
            &square(3.0, 0.0, 1.0),
            Operation::Binary(BinaryOp::Union),
        );
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.len() == 4));
        // Everything got used.
        assert!(ctx.find_top(|_, _| true).is_none());
    }

    #[test]
    fn intersection_walks_inner_boundary() {
        let (ctx, loops) = walked(
            &square(0.0, 0.0, 1.0),
            &square(0.5, 0.5, 1.0),
            Operation::Binary(BinaryOp::Intersection),
        );
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 4);
        // Consecutive pieces meet.
        let ends = |p: &Piece| {
            let next = ctx.spans[p.span].next.unwrap();
            let (a, b) = (ctx.span_pt(p.span), ctx.span_pt(next));
            if p.forward {
                (a, b)
            } else {
                (b, a)
            }
        };
        for i in 0..4 {
            let (_, end) = ends(&loops[0][i]);
            let (start, _) = ends(&loops[0][(i + 1) % 4]);
            assert_eq!(end, start);
        }
    }

    #[test]
    fn difference_with_hole() {
        let (_, loops) = walked(
            &square(0.0, 0.0, 4.0),
            &square(1.0, 1.0, 2.0),
            Operation::Binary(BinaryOp::Difference),
        );
        assert_eq!(loops.len(), 2);
        // The hole is walked backwards along the second square.
        assert!(loops.iter().any(|l| l.iter().all(|p| !p.forward)));
        assert!(loops.iter().any(|l| l.iter().all(|p| p.forward)));
    }

    #[test]
    fn corner_touching_squares_make_two_loops() {
        let (_, loops) = walked(
            &square(0.0, 0.0, 1.0),
            &square(1.0, 1.0, 1.0),
            Operation::Binary(BinaryOp::Union),
        );
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.len() == 4));
    }
}
