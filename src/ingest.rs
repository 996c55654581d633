//! Frame sources.
//!
//! The capture transport for real hardware (USB, CSI, network cameras) is
//! an external collaborator; the core only needs something that blocks for
//! the next frame. `stub://` paths are served in-process by a synthetic
//! source so the daemon and tests run without camera hardware:
//!
//! - `stub://triangle` — dark scene with one bright triangular target
//! - `stub://flat` (or any other scene name) — featureless dark scene
//!
//! A synthetic source paces itself to the configured frame rate, so the
//! frame loop's blocking wait is bounded by the source cadence.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::GrayImage;

use crate::frame::Frame;
use crate::registry::CameraEntry;

const STUB_SCHEME: &str = "stub://";
const BACKGROUND_INTENSITY: u8 = 10;
const TARGET_INTENSITY: u8 = 230;

/// A camera feed. `next_frame` blocks up to the source's own cadence;
/// `Ok(None)` means the source is closed and will produce nothing more.
pub trait FrameSource: Send + std::fmt::Debug {
    fn name(&self) -> &str;
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Map a registry entry onto a concrete source.
pub fn open_source(entry: &CameraEntry) -> Result<Box<dyn FrameSource>> {
    if let Some(scene) = entry.path().strip_prefix(STUB_SCHEME) {
        log::info!(
            "starting camera '{}' on {} (synthetic)",
            entry.name(),
            entry.path()
        );
        return Ok(Box::new(SyntheticSource::new(entry, scene)));
    }
    Err(anyhow!(
        "camera '{}': no capture transport for '{}'; this build serves stub:// sources only",
        entry.name(),
        entry.path()
    ))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scene {
    Flat,
    Triangle,
}

/// Synthetic frame source for `stub://` cameras.
#[derive(Debug)]
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_interval: Duration,
    scene: Scene,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    fn new(entry: &CameraEntry, scene: &str) -> Self {
        let settings = entry.settings();
        let scene = match scene {
            "triangle" => Scene::Triangle,
            "flat" => Scene::Flat,
            other => {
                log::warn!(
                    "camera '{}': unknown synthetic scene '{}', serving a flat scene",
                    entry.name(),
                    other
                );
                Scene::Flat
            }
        };
        let fps = settings.fps.max(1);
        Self {
            name: entry.name().to_string(),
            width: settings.width,
            height: settings.height,
            frame_interval: Duration::from_secs(1) / fps,
            scene,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    pub fn frames_served(&self) -> u64 {
        self.frame_count
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.pace();
        self.frame_count += 1;
        let frame = match self.scene {
            Scene::Triangle => triangle_test_frame(self.width, self.height),
            Scene::Flat => flat_test_frame(self.width, self.height),
        };
        Ok(Some(frame))
    }
}

/// Featureless dark frame.
pub fn flat_test_frame(width: u32, height: u32) -> Frame {
    let image = GrayImage::from_pixel(width, height, image::Luma([BACKGROUND_INTENSITY]));
    Frame::from_gray(image)
}

/// Dark frame with one bright triangular target: apex at top-center, base
/// across the lower third. Shared with tests that exercise the pipeline
/// end to end.
pub fn triangle_test_frame(width: u32, height: u32) -> Frame {
    let apex = (width as f64 / 2.0, height as f64 / 6.0);
    let left = (width as f64 / 6.0, height as f64 * 5.0 / 6.0);
    let right = (width as f64 * 5.0 / 6.0, height as f64 * 5.0 / 6.0);

    let image = GrayImage::from_fn(width, height, |x, y| {
        let p = (x as f64 + 0.5, y as f64 + 0.5);
        if point_in_triangle(p, apex, left, right) {
            image::Luma([TARGET_INTENSITY])
        } else {
            image::Luma([BACKGROUND_INTENSITY])
        }
    });
    Frame::from_gray(image)
}

fn point_in_triangle(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let sign = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| {
        (p.0 - r.0) * (q.1 - r.1) - (q.0 - r.0) * (p.1 - r.1)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CameraSettings;

    fn stub_entry(path: &str) -> CameraEntry {
        CameraEntry::new(
            "front",
            path,
            CameraSettings {
                width: 64,
                height: 48,
                fps: 1000, // keep the pacing negligible in tests
            },
        )
    }

    #[test]
    fn stub_paths_open_synthetic_sources() {
        let mut source = open_source(&stub_entry("stub://triangle")).unwrap();
        let frame = source.next_frame().unwrap().expect("frame");
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
    }

    #[test]
    fn non_stub_paths_name_the_missing_transport() {
        let err = open_source(&stub_entry("/dev/video0")).unwrap_err();
        assert!(err.to_string().contains("/dev/video0"));
    }

    #[test]
    fn triangle_scene_has_bright_and_dark_pixels() {
        let frame = triangle_test_frame(64, 48);
        let bright = frame.data().iter().filter(|&&p| p == TARGET_INTENSITY).count();
        let dark = frame.data().iter().filter(|&&p| p == BACKGROUND_INTENSITY).count();
        assert!(bright > 0);
        assert!(dark > bright, "target should not dominate the scene");
    }

    #[test]
    fn flat_scene_is_featureless() {
        let frame = flat_test_frame(32, 32);
        assert!(frame.data().iter().all(|&p| p == BACKGROUND_INTENSITY));
    }

    #[test]
    fn source_counts_frames_served() {
        let entry = stub_entry("stub://flat");
        let mut source = SyntheticSource::new(&entry, "flat");
        source.next_frame().unwrap();
        source.next_frame().unwrap();
        assert_eq!(source.frames_served(), 2);
    }
}
