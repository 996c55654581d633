//! Polygon moments for contour centroids.
//!
//! First-order moments of the region enclosed by a closed polyline,
//! computed with Green's theorem over the vertex sequence. The centroid is
//! `(m10/m00, m01/m00)`; a zero-area contour has no centroid and callers
//! must skip it rather than divide.

use imageproc::point::Point;

/// Area-weighted moments of a closed contour.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContourMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl ContourMoments {
    /// Moments of the polygon described by `points`, treated as closed.
    /// Signed; orientation cancels out of the centroid.
    pub fn of_polygon(points: &[Point<i32>]) -> Self {
        let n = points.len();
        if n < 3 {
            return Self::default();
        }
        let mut m00 = 0.0;
        let mut m10 = 0.0;
        let mut m01 = 0.0;
        for i in 0..n {
            let p = points[i];
            let q = points[(i + 1) % n];
            let (x0, y0) = (p.x as f64, p.y as f64);
            let (x1, y1) = (q.x as f64, q.y as f64);
            let cross = x0 * y1 - x1 * y0;
            m00 += cross;
            m10 += (x0 + x1) * cross;
            m01 += (y0 + y1) * cross;
        }
        Self {
            m00: m00 / 2.0,
            m10: m10 / 6.0,
            m01: m01 / 6.0,
        }
    }

    /// Centroid in pixel coordinates, or `None` for zero-area contours.
    pub fn centroid(&self) -> Option<(i32, i32)> {
        if self.m00 == 0.0 {
            return None;
        }
        Some((
            (self.m10 / self.m00).round() as i32,
            (self.m01 / self.m00).round() as i32,
        ))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
