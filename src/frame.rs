//! Pixel buffers exchanged between sources, the pipeline and sinks.
//!
//! A `Frame` is immutable once built: sources hand frames to the pipeline,
//! the pipeline produces fresh output frames (mask, overlay), and sinks
//! receive them by reference. Nothing downstream can alias into an input
//! frame's storage.

use anyhow::{anyhow, Result};
use image::{GrayImage, RgbImage};

/// Channel layout of a frame. The appliance only moves single-channel
/// masks and 3-channel colour frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
}

impl PixelLayout {
    pub fn channels(self) -> u32 {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb => 3,
        }
    }
}

/// Immutable 2D pixel buffer with width/height/channel metadata.
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl Frame {
    /// Build a frame from raw bytes. Fails if the byte count does not match
    /// the stated geometry.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * (layout.channels() as usize);
        if data.len() != expected {
            return Err(anyhow!(
                "frame data is {} bytes, expected {} for {}x{}x{}",
                data.len(),
                expected,
                width,
                height,
                layout.channels()
            ));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn from_gray(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Gray,
            data: image.into_raw(),
        }
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb,
            data: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True when the frame has no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Single-channel intensity view of this frame, standard luma weighting
    /// for colour input. Copies; the original frame is left untouched.
    pub fn to_luma(&self) -> Result<GrayImage> {
        match self.layout {
            PixelLayout::Gray => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .ok_or_else(|| anyhow!("gray frame geometry does not match its data")),
            PixelLayout::Rgb => {
                let rgb = RgbImage::from_raw(self.width, self.height, self.data.clone())
                    .ok_or_else(|| anyhow!("rgb frame geometry does not match its data"))?;
                Ok(image::imageops::grayscale(&rgb))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
