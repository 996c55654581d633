//! Publishing sinks.
//!
//! The pipeline pushes its output frames into sinks; what happens beyond
//! (MJPEG serving, recording) belongs to the streaming transport
//! collaborator. `StreamHub` is the boundary it pulls from: a set of named
//! latest-frame cells, one per output stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::Sender;

use crate::frame::Frame;

/// Receives published frames. Implementations must never block the frame
/// loop for long; publishing is fire-and-forget.
pub trait FrameSink: Send {
    fn publish(&self, frame: &Frame);
}

impl<S: FrameSink + Sync + ?Sized> FrameSink for Arc<S> {
    fn publish(&self, frame: &Frame) {
        (**self).publish(frame);
    }
}

/// Most recent frame of one named output stream. Writers swap the slot,
/// readers clone the latest frame at their own cadence.
pub struct LatestFrameCell {
    name: String,
    slot: Mutex<Option<Frame>>,
}

impl LatestFrameCell {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest published frame, if any has arrived yet.
    pub fn latest(&self) -> Option<Frame> {
        // A poisoned slot still holds a complete frame; recover it.
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FrameSink for LatestFrameCell {
    fn publish(&self, frame: &Frame) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
    }
}

/// Named registry of output streams, built once at startup and handed to
/// the streaming transport.
#[derive(Default)]
pub struct StreamHub {
    cells: HashMap<String, Arc<LatestFrameCell>>,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named stream, returning its cell. Re-registering a name
    /// returns the existing cell.
    pub fn register(&mut self, name: &str) -> Arc<LatestFrameCell> {
        self.cells
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(LatestFrameCell::new(name)))
            .clone()
    }

    pub fn cell(&self, name: &str) -> Option<Arc<LatestFrameCell>> {
        self.cells.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Test sink: forwards every frame into a channel. Disconnected receivers
/// are ignored; a sink never fails the frame loop.
pub struct ChannelSink {
    tx: Sender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Frame>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn publish(&self, frame: &Frame) {
        let _ = self.tx.send(frame.clone());
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
