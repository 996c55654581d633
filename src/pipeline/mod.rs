//! Per-frame vision processing.
//!
//! One invocation turns a raw frame into two new frames: a binary `mask`
//! (intensity above the shared threshold) and an annotated `overlay`
//! (centroid markers, contour outlines, shape labels, and the threshold
//! value as diagnostic text). The threshold is re-read from the parameter
//! store at the start of every invocation, so a remote change takes effect
//! on the next frame boundary and never retroactively.
//!
//! The pipeline never fails per-frame: malformed input degrades to an
//! all-background mask and a text-only overlay, and degenerate contours
//! are skipped one by one.

mod glyphs;
mod moments;

pub use moments::ContourMoments;

use std::sync::Arc;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::drawing::draw_filled_circle_mut;
use imageproc::filter::gaussian_blur_f32;

use crate::frame::Frame;
use crate::params::ParamStore;
use crate::shape::{self, ShapeLabel};

/// Smoothing applied before binarization, the sigma a fixed 5x5 Gaussian
/// kernel implies. Not configurable: it exists to make contour extraction
/// robust to sensor noise, not to be tuned per scene.
const BLUR_SIGMA: f32 = 1.1;

/// Overlay palette and geometry.
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CENTROID_COLOR: Rgb<u8> = Rgb([0, 0, 250]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([249, 165, 95]);
const LABEL_COLOR: Rgb<u8> = Rgb([57, 255, 20]);
const TEXT_ANCHOR: (i32, i32) = (15, 15);
const CENTROID_RADIUS: i32 = 4;
const LABEL_OFFSET_X: i32 = 10;

/// One annotated region found in a frame.
#[derive(Clone, Debug)]
pub struct Region {
    pub centroid: (i32, i32),
    pub label: ShapeLabel,
}

/// The two output frames plus the per-region annotations that went into
/// the overlay.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub mask: Frame,
    pub overlay: Frame,
    pub regions: Vec<Region>,
}

/// The frame processing pipeline. Owns nothing but its invocation counter;
/// the threshold lives in the shared parameter store.
pub struct FramePipeline {
    store: Arc<ParamStore>,
    frames_processed: u64,
}

impl FramePipeline {
    pub fn new(store: Arc<ParamStore>) -> Self {
        Self {
            store,
            frames_processed: 0,
        }
    }

    /// Number of `process` invocations so far. Observability only; has no
    /// effect on output pixels.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Process one frame. Deterministic given the frame and the threshold
    /// snapshot taken at entry.
    pub fn process(&mut self, frame: &Frame) -> PipelineOutput {
        self.frames_processed += 1;
        let thresh = self.store.threshold();

        let mask_img = self.binarize(frame, thresh);
        let mut overlay_img = RgbImage::new(frame.width(), frame.height());
        glyphs::draw_text(
            &mut overlay_img,
            &format!("{thresh:.1}"),
            TEXT_ANCHOR.0,
            TEXT_ANCHOR.1,
            2,
            TEXT_COLOR,
        );

        let mut regions = Vec::new();
        for contour in outer_contours(&mask_img) {
            if let Some(region) = annotate_contour(&mut overlay_img, &contour) {
                regions.push(region);
            }
        }

        PipelineOutput {
            mask: Frame::from_gray(mask_img),
            overlay: Frame::from_rgb(overlay_img),
            regions,
        }
    }

    /// Luma, fixed Gaussian smoothing, then binarize against `thresh`.
    /// Malformed or empty input degrades to an all-background mask.
    fn binarize(&self, frame: &Frame, thresh: f64) -> GrayImage {
        if frame.is_empty() {
            return GrayImage::new(frame.width(), frame.height());
        }
        let gray = match frame.to_luma() {
            Ok(gray) => gray,
            Err(e) => {
                log::warn!("frame failed intensity conversion: {e:#}");
                return GrayImage::new(frame.width(), frame.height());
            }
        };
        let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
        let cutoff = thresh.clamp(0.0, 255.0) as u8;
        threshold(&blurred, cutoff, ThresholdType::Binary)
    }
}

/// External-only contours of a binary mask. Holes and internal borders are
/// ignored: only outer silhouettes matter for target detection.
fn outer_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .collect()
}

/// Draw one contour's marker, outline and label. Returns `None` for
/// zero-area contours, which have no centroid and are skipped.
fn annotate_contour(overlay: &mut RgbImage, contour: &Contour<i32>) -> Option<Region> {
    let Some((cx, cy)) = ContourMoments::of_polygon(&contour.points).centroid() else {
        log::debug!("skipping zero-area contour ({} points)", contour.points.len());
        return None;
    };

    draw_filled_circle_mut(overlay, (cx, cy), CENTROID_RADIUS, CENTROID_COLOR);
    for point in &contour.points {
        if point.x >= 0
            && point.y >= 0
            && (point.x as u32) < overlay.width()
            && (point.y as u32) < overlay.height()
        {
            overlay.put_pixel(point.x as u32, point.y as u32, OUTLINE_COLOR);
        }
    }

    let label = shape::classify(&contour.points);
    glyphs::draw_text(
        overlay,
        label.text(),
        cx + LABEL_OFFSET_X,
        cy,
        1,
        LABEL_COLOR,
    );

    Some(Region {
        centroid: (cx, cy),
        label,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::triangle_test_frame;
    use crate::params::{ParamValue, StoreRole};

    fn store_with_threshold(t: f64) -> Arc<ParamStore> {
        let store = Arc::new(ParamStore::new(StoreRole::Follower, "vision"));
        store.apply("vision/threshold", ParamValue::Number(t));
        store
    }

    fn foreground_count(mask: &Frame) -> usize {
        mask.data().iter().filter(|&&p| p > 0).count()
    }

    #[test]
    fn binarization_is_monotonic_in_threshold() {
        let frame = triangle_test_frame(160, 120);
        let mut previous = usize::MAX;
        for t in [0.0, 64.0, 126.0, 200.0, 255.0] {
            let mut pipeline = FramePipeline::new(store_with_threshold(t));
            let out = pipeline.process(&frame);
            let count = foreground_count(&out.mask);
            assert!(
                count <= previous,
                "raising threshold to {t} grew the foreground"
            );
            previous = count;
        }
    }

    #[test]
    fn outputs_match_input_geometry_and_do_not_alias() {
        let frame = triangle_test_frame(160, 120);
        let mut pipeline = FramePipeline::new(store_with_threshold(126.0));
        let out = pipeline.process(&frame);
        assert_eq!(out.mask.width(), 160);
        assert_eq!(out.mask.height(), 120);
        assert_eq!(out.overlay.width(), 160);
        assert_eq!(out.overlay.layout().channels(), 3);
        // Input is untouched.
        assert_eq!(frame.width(), 160);
    }

    #[test]
    fn triangle_scene_yields_one_triangle_region() {
        let frame = triangle_test_frame(320, 240);
        let mut pipeline = FramePipeline::new(store_with_threshold(126.0));
        let out = pipeline.process(&frame);

        assert_eq!(out.regions.len(), 1, "expected exactly one region");
        let region = &out.regions[0];
        assert_eq!(region.label, ShapeLabel::Triangle);

        // Centroid of the synthetic triangle: x at mid-width, y at 11/18 of
        // the height (mean of the three vertices).
        let (cx, cy) = region.centroid;
        assert!((cx - 160).abs() <= 6, "centroid x {cx} off-center");
        let expected_y = (240.0 * 11.0 / 18.0) as i32;
        assert!((cy - expected_y).abs() <= 6, "centroid y {cy} off");
    }

    #[test]
    fn overlay_carries_threshold_text_at_the_anchor() {
        let frame = triangle_test_frame(160, 120);
        let mut pipeline = FramePipeline::new(store_with_threshold(126.0));
        let out = pipeline.process(&frame);

        let overlay = out.overlay;
        let data = overlay.data();
        let stride = (overlay.width() * 3) as usize;
        let mut text_pixels = 0;
        for y in TEXT_ANCHOR.1..(TEXT_ANCHOR.1 + 14) {
            for x in TEXT_ANCHOR.0..(TEXT_ANCHOR.0 + 70) {
                let i = y as usize * stride + x as usize * 3;
                if data[i..i + 3] == [255, 0, 0] {
                    text_pixels += 1;
                }
            }
        }
        assert!(text_pixels > 0, "no diagnostic text at the anchor");
    }

    #[test]
    fn empty_frame_degrades_to_text_only_overlay() {
        let frame = Frame::new(0, 0, crate::frame::PixelLayout::Gray, vec![]).unwrap();
        let mut pipeline = FramePipeline::new(store_with_threshold(126.0));
        let out = pipeline.process(&frame);
        assert!(out.regions.is_empty());
        assert_eq!(out.mask.data().len(), 0);
        assert_eq!(pipeline.frames_processed(), 1);
    }

    #[test]
    fn flat_frame_yields_empty_mask_but_keeps_text() {
        let flat = Frame::new(
            64,
            48,
            crate::frame::PixelLayout::Gray,
            vec![10u8; 64 * 48],
        )
        .unwrap();
        let mut pipeline = FramePipeline::new(store_with_threshold(126.0));
        let out = pipeline.process(&flat);
        assert_eq!(foreground_count(&out.mask), 0);
        assert!(out.regions.is_empty());
        assert!(out.overlay.data().iter().any(|&b| b > 0));
    }

    #[test]
    fn threshold_change_applies_on_the_next_frame_only() {
        let frame = triangle_test_frame(160, 120);
        let store = store_with_threshold(126.0);
        let mut pipeline = FramePipeline::new(store.clone());

        let before = pipeline.process(&frame);
        let before_count = foreground_count(&before.mask);
        assert!(before_count > 0);

        store.apply("vision/threshold", ParamValue::Number(250.0));
        let after = pipeline.process(&frame);
        assert_eq!(foreground_count(&after.mask), 0);

        // The frame produced earlier is untouched by the update.
        assert_eq!(foreground_count(&before.mask), before_count);
    }

    #[test]
    fn invocation_counter_increments_per_call() {
        let frame = triangle_test_frame(64, 48);
        let mut pipeline = FramePipeline::new(store_with_threshold(126.0));
        assert_eq!(pipeline.frames_processed(), 0);
        pipeline.process(&frame);
        pipeline.process(&frame);
        assert_eq!(pipeline.frames_processed(), 2);
    }
}
