//! Shape classification.
//!
//! A deliberately coarse heuristic: reduce the contour to a simplified
//! polygon and look only at the vertex count. Tolerant of pixel noise
//! (the simplification tolerance scales with perimeter), intolerant of
//! ambiguous shapes: pentagons and octagons alike land in `Unclassified`.

use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

/// Simplification tolerance as a fraction of the contour perimeter. Scaling
/// with perimeter keeps the vertex count stable across target sizes.
const APPROX_EPSILON_RATIO: f64 = 0.02;

/// Discrete classification of a contour, used only for annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeLabel {
    Triangle,
    /// Six-sided silhouette: the hexagonal goal target.
    HexagonGoal,
    Unclassified,
}

impl ShapeLabel {
    /// Overlay text for this label.
    pub fn text(self) -> &'static str {
        match self {
            ShapeLabel::Triangle => "triangle",
            ShapeLabel::HexagonGoal => "goal",
            ShapeLabel::Unclassified => "unknown",
        }
    }
}

/// Classify a closed contour by simplified vertex count. Total function:
/// every contour gets a label, degenerate ones are `Unclassified`.
pub fn classify(contour: &[Point<i32>]) -> ShapeLabel {
    if contour.len() < 3 {
        return ShapeLabel::Unclassified;
    }
    let perimeter = arc_length(contour, true);
    // Coincident points have zero perimeter; simplification needs a
    // positive tolerance.
    if perimeter <= 0.0 {
        return ShapeLabel::Unclassified;
    }
    let approx = approximate_polygon_dp(contour, APPROX_EPSILON_RATIO * perimeter, true);
    match approx.len() {
        3 => ShapeLabel::Triangle,
        6 => ShapeLabel::HexagonGoal,
        _ => ShapeLabel::Unclassified,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
