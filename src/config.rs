//! Daemon configuration.
//!
//! A single JSON document describes the parameter store link, the physical
//! cameras, and the switched (virtual) outputs:
//!
//! ```json
//! {
//!     "store": {
//!         "role": "authority" | "follower",
//!         "broker": "host:port",
//!         "namespace": "vision"
//!     },
//!     "cameras": [
//!         {
//!             "name": "front",
//!             "path": "/dev/video0",
//!             "pixel format": "MJPEG",        // optional, passthrough
//!             "width": 640,                    // optional
//!             "height": 480,                   // optional
//!             "fps": 30,                       // optional
//!             "brightness": 50,                // optional, passthrough
//!             "white balance": "auto",         // optional, passthrough
//!             "exposure": "auto",              // optional, passthrough
//!             "properties": [ {"name": ..., "value": ...} ],   // optional
//!             "stream": { "properties": [ ... ] }              // optional
//!         }
//!     ],
//!     "switched cameras": [
//!         { "name": "driver", "key": "vision/driver_cam" }
//!     ]
//! }
//! ```
//!
//! Missing required fields are fatal at startup: the daemon refuses to
//! stream on a half-understood document. Device-tuning fields (pixel
//! format, brightness, exposure, properties, stream properties) are kept
//! as opaque JSON for the capture transport; the core only types the
//! fields it consumes.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::params::StoreRole;
use crate::registry::{CameraEntry, CameraSettings};

const DEFAULT_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_NAMESPACE: &str = "vision";

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    store: Option<StoreConfigFile>,
    cameras: Option<Vec<CameraConfigFile>>,
    #[serde(rename = "switched cameras")]
    switched_cameras: Option<Vec<SwitchedCameraConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct StoreConfigFile {
    role: Option<String>,
    broker: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CameraConfigFile {
    name: Option<String>,
    path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    stream: Option<Value>,
    /// Everything else (pixel format, brightness, exposure, properties...)
    /// rides along untyped for the capture transport.
    #[serde(flatten)]
    device: Value,
}

#[derive(Debug, Deserialize)]
struct SwitchedCameraConfigFile {
    name: Option<String>,
    key: Option<String>,
}

/// Resolved store link settings.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub role: StoreRole,
    pub broker: String,
    pub namespace: String,
}

/// Resolved camera settings: the typed entry the registry consumes plus the
/// opaque device/stream JSON for the transport collaborator.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub name: String,
    pub path: String,
    pub settings: CameraSettings,
    pub device_json: Value,
    pub stream_json: Option<Value>,
}

/// One virtual switched output: a named stream plus the store key whose
/// value selects its backing camera.
#[derive(Clone, Debug)]
pub struct SwitchedCameraConfig {
    pub name: String,
    pub key: String,
}

#[derive(Clone, Debug)]
pub struct GoalsightConfig {
    pub store: StoreSettings,
    pub cameras: Vec<CameraConfig>,
    pub switched_cameras: Vec<SwitchedCameraConfig>,
}

impl GoalsightConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("could not open '{}': {}", path.display(), e))?;
        let file: ConfigFile = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("config error in '{}': {}", path.display(), e))?;
        let mut cfg = Self::from_file(file)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let store_file = file.store.unwrap_or_default();
        let role = match store_file.role {
            Some(role) => role.parse::<StoreRole>()?,
            None => StoreRole::Follower,
        };
        let store = StoreSettings {
            role,
            broker: store_file
                .broker
                .unwrap_or_else(|| DEFAULT_BROKER.to_string()),
            namespace: store_file
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        };

        let camera_files = file
            .cameras
            .ok_or_else(|| anyhow!("could not read cameras"))?;
        let mut cameras = Vec::with_capacity(camera_files.len());
        for camera in camera_files {
            cameras.push(read_camera_config(camera)?);
        }

        let mut switched_cameras = Vec::new();
        for switched in file.switched_cameras.unwrap_or_default() {
            switched_cameras.push(read_switched_camera_config(switched)?);
        }

        let cfg = Self {
            store,
            cameras,
            switched_cameras,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(broker) = std::env::var("GOALSIGHT_BROKER") {
            if !broker.trim().is_empty() {
                self.store.broker = broker;
            }
        }
        if let Ok(namespace) = std::env::var("GOALSIGHT_NAMESPACE") {
            if !namespace.trim().is_empty() {
                self.store.namespace = namespace;
            }
        }
        if let Ok(role) = std::env::var("GOALSIGHT_STORE_ROLE") {
            if !role.trim().is_empty() {
                self.store.role = role.parse::<StoreRole>()?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.store.broker.trim().is_empty() {
            return Err(anyhow!("store broker must not be empty"));
        }
        if self.store.namespace.trim().is_empty() {
            return Err(anyhow!("store namespace must not be empty"));
        }
        // Duplicate names would make name-based routing ambiguous; the
        // registry rejects them too, but fail here with config context.
        for (i, camera) in self.cameras.iter().enumerate() {
            if self.cameras[..i].iter().any(|c| c.name == camera.name) {
                return Err(anyhow!("duplicate camera name '{}'", camera.name));
            }
        }
        Ok(())
    }

    /// Typed entries for the camera registry, in document order.
    pub fn camera_entries(&self) -> Vec<CameraEntry> {
        self.cameras
            .iter()
            .map(|camera| CameraEntry::new(&camera.name, &camera.path, camera.settings))
            .collect()
    }
}

fn read_camera_config(file: CameraConfigFile) -> Result<CameraConfig> {
    let name = file
        .name
        .ok_or_else(|| anyhow!("could not read camera name"))?;
    let path = file
        .path
        .ok_or_else(|| anyhow!("camera '{}': could not read path", name))?;

    let defaults = CameraSettings::default();
    let settings = CameraSettings {
        width: file.width.unwrap_or(defaults.width),
        height: file.height.unwrap_or(defaults.height),
        fps: file.fps.unwrap_or(defaults.fps),
    };

    Ok(CameraConfig {
        name,
        path,
        settings,
        device_json: file.device,
        stream_json: file.stream,
    })
}

fn read_switched_camera_config(file: SwitchedCameraConfigFile) -> Result<SwitchedCameraConfig> {
    let name = file
        .name
        .ok_or_else(|| anyhow!("could not read switched camera name"))?;
    let key = file
        .key
        .ok_or_else(|| anyhow!("switched camera '{}': could not read key", name))?;
    Ok(SwitchedCameraConfig { name, key })
}

/// Convenience used by tests and tools: parse a document from a string
/// without env overrides.
pub fn parse_config_str(raw: &str) -> Result<GoalsightConfig> {
    let file: ConfigFile = serde_json::from_str(raw).context("config must be a JSON object")?;
    GoalsightConfig::from_file(file)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_loads_with_defaults() {
        let cfg = parse_config_str(
            r#"{ "cameras": [ { "name": "front", "path": "stub://front" } ] }"#,
        )
        .unwrap();
        assert_eq!(cfg.store.role, StoreRole::Follower);
        assert_eq!(cfg.store.broker, DEFAULT_BROKER);
        assert_eq!(cfg.store.namespace, "vision");
        assert_eq!(cfg.cameras.len(), 1);
        assert_eq!(cfg.cameras[0].settings.width, 640);
        assert!(cfg.switched_cameras.is_empty());
    }

    #[test]
    fn missing_cameras_key_is_fatal() {
        let err = parse_config_str(r#"{ "store": {} }"#).unwrap_err();
        assert!(err.to_string().contains("could not read cameras"));
    }

    #[test]
    fn camera_without_path_is_fatal() {
        let err =
            parse_config_str(r#"{ "cameras": [ { "name": "front" } ] }"#).unwrap_err();
        assert!(err.to_string().contains("camera 'front'"));
    }

    #[test]
    fn switched_camera_without_key_is_fatal() {
        let err = parse_config_str(
            r#"{
                "cameras": [ { "name": "front", "path": "stub://front" } ],
                "switched cameras": [ { "name": "driver" } ]
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("switched camera 'driver'"));
    }

    #[test]
    fn duplicate_camera_names_are_fatal() {
        let err = parse_config_str(
            r#"{ "cameras": [
                { "name": "front", "path": "stub://a" },
                { "name": "front", "path": "stub://b" }
            ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate camera name"));
    }

    #[test]
    fn device_tuning_fields_ride_along_untyped() {
        let cfg = parse_config_str(
            r#"{ "cameras": [ {
                "name": "front",
                "path": "stub://front",
                "pixel format": "MJPEG",
                "brightness": 60,
                "white balance": "hold",
                "properties": [ { "name": "gain", "value": 3 } ],
                "stream": { "properties": [ { "name": "compression", "value": 70 } ] }
            } ] }"#,
        )
        .unwrap();
        let camera = &cfg.cameras[0];
        assert_eq!(camera.device_json["pixel format"], "MJPEG");
        assert_eq!(camera.device_json["brightness"], 60);
        assert!(camera.stream_json.is_some());
    }

    #[test]
    fn store_section_parses_role_and_namespace() {
        let cfg = parse_config_str(
            r#"{
                "store": { "role": "authority", "broker": "10.0.0.2:1883", "namespace": "george" },
                "cameras": [ { "name": "front", "path": "stub://front" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.store.role, StoreRole::Authority);
        assert_eq!(cfg.store.broker, "10.0.0.2:1883");
        assert_eq!(cfg.store.namespace, "george");
    }
}
