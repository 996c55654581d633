use std::sync::Mutex;

use tempfile::NamedTempFile;

use goalsight::{GoalsightConfig, StoreRole};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in ["GOALSIGHT_BROKER", "GOALSIGHT_NAMESPACE", "GOALSIGHT_STORE_ROLE"] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "store": {
                "role": "follower",
                "broker": "10.46.12.2:1883",
                "namespace": "george"
            },
            "cameras": [
                {
                    "name": "front",
                    "path": "stub://triangle",
                    "width": 800,
                    "height": 600,
                    "fps": 15
                },
                { "name": "rear", "path": "stub://flat" }
            ],
            "switched cameras": [
                { "name": "driver", "key": "george/driver_cam" }
            ]
        }"#,
    );

    std::env::set_var("GOALSIGHT_BROKER", "127.0.0.1:2883");
    std::env::set_var("GOALSIGHT_STORE_ROLE", "authority");

    let cfg = GoalsightConfig::load(file.path()).expect("load config");
    assert_eq!(cfg.store.broker, "127.0.0.1:2883");
    assert_eq!(cfg.store.role, StoreRole::Authority);
    assert_eq!(cfg.store.namespace, "george");

    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[0].settings.width, 800);
    assert_eq!(cfg.cameras[0].settings.fps, 15);
    assert_eq!(cfg.cameras[1].settings.width, 640); // defaulted

    assert_eq!(cfg.switched_cameras.len(), 1);
    assert_eq!(cfg.switched_cameras[0].key, "george/driver_cam");

    let entries = cfg.camera_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name(), "front");

    clear_env();
}

#[test]
fn missing_file_is_fatal() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = GoalsightConfig::load(std::path::Path::new("/nonexistent/vision.json")).unwrap_err();
    assert!(err.to_string().contains("could not open"));
}

#[test]
fn malformed_json_is_fatal() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("{ not json");
    let err = GoalsightConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("config error"));
}

#[test]
fn missing_camera_name_is_fatal() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "cameras": [ { "path": "stub://x" } ] }"#);
    let err = GoalsightConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("could not read camera name"));
}

#[test]
fn bad_role_env_override_is_fatal() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "cameras": [ { "name": "front", "path": "stub://x" } ] }"#);
    std::env::set_var("GOALSIGHT_STORE_ROLE", "peer");
    let err = GoalsightConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("unknown store role"));
    clear_env();
}

#[test]
fn empty_camera_list_is_allowed() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    // Control-plane-only deployments route switched outputs with no local
    // pipeline camera.
    let file = write_config(r#"{ "cameras": [] }"#);
    let cfg = GoalsightConfig::load(file.path()).expect("load config");
    assert!(cfg.cameras.is_empty());
}
