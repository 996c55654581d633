//! Pipeline driver.
//!
//! Owns a dedicated thread that pulls frames from one camera source, runs
//! the processing pipeline, and forwards the mask and overlay to their
//! sinks. A fault in a single frame is logged and skipped; the loop only
//! ends when the source closes or the stop flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;

use crate::ingest::FrameSource;
use crate::pipeline::FramePipeline;
use crate::sink::FrameSink;

pub struct PipelineDriver {
    source: Box<dyn FrameSource>,
    pipeline: FramePipeline,
    mask_sink: Box<dyn FrameSink>,
    overlay_sink: Box<dyn FrameSink>,
    stop: Arc<AtomicBool>,
}

impl PipelineDriver {
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: FramePipeline,
        mask_sink: Box<dyn FrameSink>,
        overlay_sink: Box<dyn FrameSink>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            pipeline,
            mask_sink,
            overlay_sink,
            stop,
        }
    }

    /// Start the frame loop on its own named thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name("pipeline-driver".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    fn run(mut self) {
        log::info!("pipeline driver started on camera '{}'", self.source.name());
        while !self.stop.load(Ordering::Relaxed) {
            // The only blocking point in the loop: bounded by the source's
            // own frame cadence, so a raised stop flag is seen promptly.
            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    let output = self.pipeline.process(&frame);
                    self.overlay_sink.publish(&output.overlay);
                    self.mask_sink.publish(&output.mask);
                }
                Ok(None) => {
                    log::info!("camera '{}' closed, stopping driver", self.source.name());
                    break;
                }
                Err(e) => {
                    // Frame-level isolation: a corrupt frame must not kill
                    // the stream.
                    log::warn!(
                        "skipping frame from camera '{}': {:#}",
                        self.source.name(),
                        e
                    );
                }
            }
        }
        log::info!(
            "pipeline driver stopped after {} frames",
            self.pipeline.frames_processed()
        );
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PixelLayout};
    use crate::ingest::triangle_test_frame;
    use crate::params::{ParamStore, StoreRole};
    use crate::sink::ChannelSink;
    use std::time::Duration;

    /// Source that yields a fixed number of frames, then closes. The third
    /// frame "fails to decode" to exercise frame-level isolation.
    #[derive(Debug)]
    struct ScriptedSource {
        remaining: u32,
    }

    impl FrameSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            if self.remaining == 2 {
                return Err(anyhow::anyhow!("decode failed"));
            }
            Ok(Some(triangle_test_frame(64, 48)))
        }
    }

    #[test]
    fn faulty_frames_are_skipped_not_fatal() {
        let store = Arc::new(ParamStore::new(StoreRole::Follower, "vision"));
        let (mask_tx, mask_rx) = crossbeam_channel::unbounded();
        let (overlay_tx, overlay_rx) = crossbeam_channel::unbounded();

        let driver = PipelineDriver::new(
            Box::new(ScriptedSource { remaining: 5 }),
            FramePipeline::new(store),
            Box::new(ChannelSink::new(mask_tx)),
            Box::new(ChannelSink::new(overlay_tx)),
            Arc::new(AtomicBool::new(false)),
        );
        driver.spawn().unwrap().join().unwrap();

        // 5 pulls, one faulty: four frames reach each sink.
        assert_eq!(mask_rx.try_iter().count(), 4);
        assert_eq!(overlay_rx.try_iter().count(), 4);
    }

    #[test]
    fn published_masks_are_single_channel() {
        let store = Arc::new(ParamStore::new(StoreRole::Follower, "vision"));
        let (mask_tx, mask_rx) = crossbeam_channel::unbounded();
        let (overlay_tx, overlay_rx) = crossbeam_channel::unbounded();

        let driver = PipelineDriver::new(
            Box::new(ScriptedSource { remaining: 1 }),
            FramePipeline::new(store),
            Box::new(ChannelSink::new(mask_tx)),
            Box::new(ChannelSink::new(overlay_tx)),
            Arc::new(AtomicBool::new(false)),
        );
        driver.spawn().unwrap().join().unwrap();

        assert_eq!(mask_rx.recv().unwrap().layout(), PixelLayout::Gray);
        assert_eq!(overlay_rx.recv().unwrap().layout(), PixelLayout::Rgb);
    }

    /// Endless source for the stop-flag test.
    #[derive(Debug)]
    struct EndlessSource;

    impl FrameSource for EndlessSource {
        fn name(&self) -> &str {
            "endless"
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(Some(triangle_test_frame(16, 16)))
        }
    }

    #[test]
    fn stop_flag_ends_the_loop() {
        let store = Arc::new(ParamStore::new(StoreRole::Follower, "vision"));
        let (mask_tx, _mask_rx) = crossbeam_channel::unbounded();
        let (overlay_tx, _overlay_rx) = crossbeam_channel::unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let driver = PipelineDriver::new(
            Box::new(EndlessSource),
            FramePipeline::new(store),
            Box::new(ChannelSink::new(mask_tx)),
            Box::new(ChannelSink::new(overlay_tx)),
            stop.clone(),
        );
        let handle = driver.spawn().unwrap();

        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
