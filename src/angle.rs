//! The circular order of edges around each junction.
//!
//! Every live span contributes two angles: one leaving its start toward its
//! end, and one leaving its end toward its start. The angles at a junction
//! (a PtT ring) are sorted counter-clockwise (in the mathematical sense: by
//! increasing `atan2`) into an [`AngleRing`]. Winding numbers are carried
//! around rings, and the walker uses them to pick its next edge.

use std::collections::BTreeMap;

use kurbo::{Point, Vec2};

use crate::{
    context::OpContext,
    curve::{curvature_out, tangent_out},
    segment::{PtTIdx, SpanIdx},
};

typed_vec!(
    /// The arena of angles.
    AngleVec,
    /// A handle to an [`Angle`].
    AngleIdx,
    "a"
);

/// Tangent directions closer than this (as the sine of the angle between them) are tied.
const TANGENT_TOLERANCE: f64 = 1e-9;

/// Tied angles whose curvatures are this close (relative to their size) can't be ordered.
const CURVATURE_TOLERANCE: f64 = 1e-9;

/// One end of a span, seen from the junction at that end.
#[derive(Clone, Debug)]
pub struct Angle {
    /// The boundary starting the span this angle runs along.
    pub span: SpanIdx,
    /// The boundary at the junction.
    pub start: SpanIdx,
    /// True if leaving the junction means increasing `t`.
    pub forward: bool,
    pub dir: Vec2,
    pub theta: f64,
    pub curvature: f64,
    /// Index into [`OpContext::angle_rings`].
    pub ring: usize,
}

/// All the angles at one junction, counter-clockwise.
#[derive(Clone, Debug)]
pub struct AngleRing {
    /// The root of the junction's PtT ring.
    pub junction: PtTIdx,
    pub pt: Point,
    pub angles: Vec<AngleIdx>,
    /// Some of the angles here are tied in both tangent and curvature, so
    /// the order is a guess.
    ///
    /// Only set for rings with at least three angles: with two, every order is the same.
    pub unorderable: bool,
}

impl AngleRing {
    /// The position of `angle` in this ring.
    pub fn position(&self, angle: AngleIdx) -> Option<usize> {
        self.angles.iter().position(|&a| a == angle)
    }
}

impl OpContext {
    /// Builds the angles at both ends of every span that isn't done.
    pub fn calc_angles(&mut self) {
        for seg in self.segments.indices().collect::<Vec<_>>() {
            if self.segments[seg].done() {
                continue;
            }
            for span in self.live_spans(seg).collect::<Vec<_>>() {
                let Some(next) = self.spans[span].next else {
                    continue;
                };
                let from = self.new_angle(span, span, true);
                let to = self.new_angle(span, next, false);
                if let Some(s) = self.spans[span].span.as_mut() {
                    s.from_angle = Some(from);
                    s.to_angle = Some(to);
                }
            }
        }
    }

    fn new_angle(&mut self, span: SpanIdx, start: SpanIdx, forward: bool) -> AngleIdx {
        let curve = &self.segments[self.spans[span].segment].curve;
        let t = self.span_t(start);
        let dir = tangent_out(curve, t, forward);
        let curvature = curvature_out(curve, t, forward);
        self.angles.push(Angle {
            span,
            start,
            forward,
            dir,
            theta: dir.y.atan2(dir.x),
            curvature,
            ring: usize::MAX,
        })
    }

    fn tangent_tied(&self, a: AngleIdx, b: AngleIdx) -> bool {
        let (u, v) = (self.angles[a].dir, self.angles[b].dir);
        u.dot(v) > 0.0 && (u.cross(v) / (u.hypot() * v.hypot())).abs() < TANGENT_TOLERANCE
    }

    fn curvature_tied(&self, a: AngleIdx, b: AngleIdx) -> bool {
        let (ka, kb) = (self.angles[a].curvature, self.angles[b].curvature);
        (ka - kb).abs() <= CURVATURE_TOLERANCE * (1.0 + ka.abs().max(kb.abs()))
    }

    /// Groups the angles by junction and sorts each group.
    pub fn sort_angles(&mut self) {
        let mut groups: BTreeMap<PtTIdx, Vec<AngleIdx>> = BTreeMap::new();
        for (idx, angle) in self.angles.iter() {
            let root = self.rings.find(self.spans[angle.start].ptt);
            groups.entry(root).or_default().push(idx);
        }

        for (junction, mut ids) in groups {
            ids.sort_by(|&a, &b| {
                let (a, b) = (&self.angles[a], &self.angles[b]);
                a.theta.total_cmp(&b.theta)
            });

            // A tied cluster can straddle the place where atan2 wraps around.
            // Rotate so that the ring starts right after a gap between clusters.
            let n = ids.len();
            if let Some(gap) = (0..n).find(|&i| !self.tangent_tied(ids[i], ids[(i + 1) % n])) {
                ids.rotate_left((gap + 1) % n);
            }

            let mut unorderable = false;
            let mut i = 0;
            while i < n {
                let mut j = i + 1;
                while j < n && self.tangent_tied(ids[j - 1], ids[j]) {
                    j += 1;
                }
                // Among angles leaving in the same direction, the ones turning
                // more to the left come later counter-clockwise.
                ids[i..j].sort_by(|&a, &b| {
                    self.angles[a]
                        .curvature
                        .total_cmp(&self.angles[b].curvature)
                });
                if n >= 3 && ids[i..j].windows(2).any(|w| self.curvature_tied(w[0], w[1])) {
                    unorderable = true;
                }
                i = j;
            }

            let ring = self.angle_rings.len();
            for &a in &ids {
                self.angles[a].ring = ring;
            }
            if unorderable {
                log::debug!("unorderable angles at {junction:?}: {ids:?}");
            }
            self.angle_rings.push(AngleRing {
                junction,
                pt: self.ptts[junction].pt,
                angles: ids,
                unorderable,
            });
        }
        log::debug!("sorted {} angles into {} rings", self.angles.len(), self.angle_rings.len());
    }
}
