//! Switched-source routing.
//!
//! Each virtual output stream starts unbound and binds to a camera index
//! when its routing selector changes in the parameter store. A numeric
//! selector is an index into the registry; a text selector is matched
//! against camera names in registration order, first match wins. Anything
//! that does not resolve (out-of-range index, unknown name, non-finite
//! number) leaves the current binding untouched: last-known-good routing.
//!
//! The router runs on its own thread, consuming the store's event channel;
//! the binding itself is a single atomic slot, written only here and read
//! whenever a new frame is requested for the output.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::Receiver;

use crate::params::{ParamEvent, ParamValue};
use crate::registry::{CameraEntry, CameraRegistry};

const UNBOUND: usize = usize::MAX;

/// One virtual output stream and its current camera binding.
pub struct SwitchedOutput {
    name: String,
    binding: AtomicUsize,
}

impl SwitchedOutput {
    /// A fresh output in the unbound state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: AtomicUsize::new(UNBOUND),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Currently bound camera index, if any.
    pub fn binding(&self) -> Option<usize> {
        match self.binding.load(Ordering::Acquire) {
            UNBOUND => None,
            index => Some(index),
        }
    }

    /// Registry entry this output currently shows, if bound.
    pub fn resolve<'a>(&self, registry: &'a CameraRegistry) -> Option<&'a CameraEntry> {
        registry.get(self.binding()?)
    }

    fn bind(&self, index: usize) {
        self.binding.store(index, Ordering::Release);
    }
}

/// Applies routing selector changes to one switched output.
pub struct SourceRouter {
    registry: Arc<CameraRegistry>,
    output: Arc<SwitchedOutput>,
    events: Receiver<ParamEvent>,
}

impl SourceRouter {
    pub fn new(
        registry: Arc<CameraRegistry>,
        output: Arc<SwitchedOutput>,
        events: Receiver<ParamEvent>,
    ) -> Self {
        Self {
            registry,
            output,
            events,
        }
    }

    /// Apply one selector value. Initial values, creations and updates are
    /// all treated identically.
    pub fn apply(&self, value: &ParamValue) {
        match value {
            ParamValue::Number(n) => {
                if !n.is_finite() {
                    log::debug!("output '{}': non-finite selector ignored", self.output.name());
                    return;
                }
                let index = *n as i64;
                if index >= 0 && (index as usize) < self.registry.len() {
                    self.rebind(index as usize);
                } else {
                    log::debug!(
                        "output '{}': selector index {} out of range, keeping current binding",
                        self.output.name(),
                        index
                    );
                }
            }
            ParamValue::Text(name) => match self.registry.index_of_name(name) {
                Some(index) => self.rebind(index),
                None => {
                    log::debug!(
                        "output '{}': no camera named '{}', keeping current binding",
                        self.output.name(),
                        name
                    );
                }
            },
        }
    }

    fn rebind(&self, index: usize) {
        if self.output.binding() != Some(index) {
            let name = self
                .registry
                .get(index)
                .map(CameraEntry::name)
                .unwrap_or("?");
            log::info!(
                "output '{}' now showing camera {} ('{}')",
                self.output.name(),
                index,
                name
            );
        }
        self.output.bind(index);
    }

    /// Consume events until the store side closes the channel.
    pub fn run(self) {
        for event in self.events.iter() {
            self.apply(&event.value);
        }
        log::info!("router for output '{}' stopped", self.output.name());
    }

    /// Run on a dedicated named thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("router-{}", self.output.name());
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || self.run())?;
        Ok(handle)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
