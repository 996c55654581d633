//! Camera registry.
//!
//! The ordered list of configured camera sources. Built once at startup from
//! configuration and immutable afterwards, so it is shared across threads as
//! a plain `Arc<CameraRegistry>` with no further synchronization. Other
//! components refer to cameras by index or by name, never by copy.

use anyhow::{anyhow, Result};

/// Capture geometry and cadence for a camera, defaulted when the
/// configuration leaves them out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// One configured camera source.
#[derive(Clone, Debug)]
pub struct CameraEntry {
    name: String,
    path: String,
    index: usize,
    settings: CameraSettings,
}

impl CameraEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, settings: CameraSettings) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            index: 0, // assigned by the registry
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Position of this entry in the registry.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn settings(&self) -> CameraSettings {
        self.settings
    }
}

/// Ordered, immutable collection of camera entries.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    entries: Vec<CameraEntry>,
}

impl CameraRegistry {
    /// Build the registry, assigning indices in registration order.
    /// Duplicate names are rejected: name lookup must be unambiguous.
    pub fn new(entries: Vec<CameraEntry>) -> Result<Self> {
        let mut registry = Self {
            entries: Vec::with_capacity(entries.len()),
        };
        for (index, mut entry) in entries.into_iter().enumerate() {
            if registry.index_of_name(&entry.name).is_some() {
                return Err(anyhow!("duplicate camera name '{}'", entry.name));
            }
            entry.index = index;
            registry.entries.push(entry);
        }
        Ok(registry)
    }

    pub fn get(&self, index: usize) -> Option<&CameraEntry> {
        self.entries.get(index)
    }

    /// First entry with the given name, in registration order.
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CameraEntry> {
        self.entries.iter()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
