use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use handtrack_o2::config::BridgeConfig;
use handtrack_o2::{DetectFailurePolicy, MessengerKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HTO2_CONFIG",
        "HTO2_ENSEMBLE",
        "HTO2_ADDRESS",
        "HTO2_VIDEO_URL",
        "HTO2_MQTT_BROKER",
        "HTO2_MESSENGER",
        "HTO2_REFRESH_HZ",
        "HTO2_ON_DETECT_ERROR",
        "HTO2_SCORE_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "ensemble": "studio",
        "address": "/htclient/hands",
        "refresh_hz": 30,
        "on_detect_error": "skip",
        "video": {
            "url": "stub://desk",
            "width": 320,
            "height": 240
        },
        "model": {
            "flip_horizontal": false,
            "max_num_boxes": 4
        },
        "messenger": {
            "kind": "mqtt",
            "broker": "10.0.0.2:1883",
            "client_id": "hto2-studio"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("HTO2_CONFIG", file.path());
    std::env::set_var("HTO2_ENSEMBLE", "stage");
    std::env::set_var("HTO2_SCORE_THRESHOLD", "0.8");

    let cfg = BridgeConfig::load().expect("load config");

    assert_eq!(cfg.ensemble, "stage");
    assert_eq!(cfg.address, "/htclient/hands");
    assert_eq!(cfg.refresh_hz, 30);
    assert_eq!(cfg.on_detect_error, DetectFailurePolicy::Skip);
    assert_eq!(cfg.video.url, "stub://desk");
    assert_eq!((cfg.video.width, cfg.video.height), (320, 240));
    assert_eq!(cfg.video.target_fps, 30);
    assert!(!cfg.model.flip_horizontal);
    assert_eq!(cfg.model.max_num_boxes, 4);
    assert_eq!(cfg.model.iou_threshold, 0.5);
    assert_eq!(cfg.model.score_threshold, 0.8);
    assert_eq!(cfg.messenger.kind, MessengerKind::Mqtt);
    assert_eq!(cfg.messenger.broker, "10.0.0.2:1883");
    assert_eq!(cfg.messenger.client_id, "hto2-studio");

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
        ensemble = "lab"

        [model]
        score_threshold = 0.7
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = BridgeConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.ensemble, "lab");
    assert_eq!(cfg.model.score_threshold, 0.7);
    assert_eq!(cfg.model.max_num_boxes, 20);
    assert_eq!(cfg.messenger.kind, MessengerKind::Log);

    clear_env();
}

#[test]
fn broker_env_selects_mqtt_and_bad_values_fail() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HTO2_MQTT_BROKER", "127.0.0.1:1883");
    let cfg = BridgeConfig::load().expect("load config");
    assert_eq!(cfg.messenger.kind, MessengerKind::Mqtt);

    std::env::set_var("HTO2_ON_DETECT_ERROR", "retry");
    assert!(BridgeConfig::load().is_err());
    std::env::remove_var("HTO2_ON_DETECT_ERROR");

    std::env::set_var("HTO2_ENSEMBLE", "bad ensemble");
    assert!(BridgeConfig::load().is_err());

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HTO2_CONFIG", "/nonexistent/hto2.json");
    let err = BridgeConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
