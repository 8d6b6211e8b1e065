//! Utilities for generating examples, benchmarks, and test cases.

use kurbo::{BezPath, Point};

fn polygon(path: &mut BezPath, pts: &[Point]) {
    if let Some((first, rest)) = pts.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
        path.close_path();
    }
}

/// Generate a bunch of squares, arranged in a grid.
///
/// The top-left of the first square is at (x0, y0). Each square has size `size
/// x size`, and the distance between squares (both horizontally and vertically)
/// is `offset`.
///
/// If `slant` is non-zero, generates parallelograms instead of squares: the
/// right-hand side of each square gets translated down by `slant`.
fn squares((x0, y0): (f64, f64), size: f64, offset: f64, slant: f64, count: usize) -> BezPath {
    let mut ret = BezPath::new();
    for i in 0..count {
        let x = x0 + i as f64 * offset;
        for j in 0..count {
            let y = y0 + j as f64 * offset;
            polygon(
                &mut ret,
                &[
                    Point::new(x, y),
                    Point::new(x, y + size),
                    Point::new(x + size, y + size + slant),
                    Point::new(x + size, y + slant),
                ],
            );
        }
    }
    ret
}

/// Generate an `n` by `n` checkerboard-like pattern with overlapping squares.
/// For `n = 3`, it looks like:
///
/// ```text
/// +----+ +----+ +----+
/// |    | |    | |    |
/// |  +-+-+-++-+-+-+  |
/// +--+-+ +-++-+ +-+--+
/// +--+-+ +-++-+ +-+--+
/// |  +-+-+-++-+-+-+  |
/// |  +-+-+-++-+-+-+  |
/// +--+-+ +-++-+ +-+--+
/// +--+-+ +-++-+ +-+--+
/// |  +-+-+-++-+-+-+  |
/// |    | |    | |    |
/// +----+ +----+ +----+
/// ```
///
/// We return the pattern in two parts: the outer collection of `n x n`
/// non-overlapping squares, and the inner collection of `(n - 1) x (n - 1)`
/// non-overlapping squares.
pub fn checkerboard(n: usize) -> (BezPath, BezPath) {
    (
        squares((0.0, 0.0), 30.0, 40.0, 0.0, n),
        squares((20.0, 20.0), 30.0, 40.0, 0.0, n.saturating_sub(1)),
    )
}

/// Like `checkerboard`, but with no exactly-horizontal lines.
pub fn slanted_checkerboard(n: usize) -> (BezPath, BezPath) {
    (
        squares((0.0, 0.0), 30.0, 40.0, 1.0, n),
        squares((20.0, 20.0), 30.0, 40.0, 1.0, n.saturating_sub(1)),
    )
}

/// Like `checkerboard`, but with circles (made of cubic Béziers) instead of squares.
pub fn circles(n: usize) -> (BezPath, BezPath) {
    use kurbo::Shape;

    let grid = |c0: f64, count: usize| {
        let mut ret = BezPath::new();
        for i in 0..count {
            for j in 0..count {
                let center = Point::new(c0 + 40.0 * i as f64, c0 + 40.0 * j as f64);
                ret.extend(kurbo::Circle::new(center, 15.0).path_elements(0.1));
            }
        }
        ret
    };
    (grid(15.0, n), grid(35.0, n.saturating_sub(1)))
}
