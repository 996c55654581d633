//! goalsight — robot-mounted vision appliance.
//!
//! The daemon reads a static JSON configuration describing one or more
//! camera feeds, runs a contour-extraction pipeline over one of them, and
//! publishes two annotated output streams (binary mask, overlay). A shared
//! distributed parameter store provides the runtime control surface: one
//! numeric binarization threshold, and per-virtual-output routing
//! selectors that re-target switched camera streams without a restart.
//!
//! # Module structure
//!
//! - `config`: JSON configuration document, env overrides, fatal validation
//! - `registry`: ordered, immutable camera registry
//! - `frame`: immutable pixel buffers
//! - `ingest`: frame sources (`stub://` synthetic scenes in this build)
//! - `params`: parameter store adapter + MQTT link to the external store
//! - `pipeline`: per-frame processing (blur, binarize, contours, annotate)
//! - `shape`: vertex-count shape classification
//! - `router`: switched-source routing state machine
//! - `driver`: the frame loop thread
//! - `sink`: publishing sinks and the stream hub

pub mod config;
pub mod driver;
pub mod frame;
pub mod ingest;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod router;
pub mod shape;
pub mod sink;

pub use config::{GoalsightConfig, StoreSettings, SwitchedCameraConfig};
pub use driver::PipelineDriver;
pub use frame::{Frame, PixelLayout};
pub use ingest::{open_source, triangle_test_frame, FrameSource};
pub use params::{
    mqtt::{MqttLink, MqttLinkConfig},
    ParamEvent, ParamStore, ParamValue, StoreRole, DEFAULT_THRESHOLD,
};
pub use pipeline::{FramePipeline, PipelineOutput, Region};
pub use registry::{CameraEntry, CameraRegistry, CameraSettings};
pub use router::{SourceRouter, SwitchedOutput};
pub use shape::{classify, ShapeLabel};
pub use sink::{ChannelSink, FrameSink, LatestFrameCell, StreamHub};
