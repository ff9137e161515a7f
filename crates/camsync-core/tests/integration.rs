//! End-to-end session tests for camsync-core using the mock transport.
//!
//! These drive the public API the way a schedule front end does: configure,
//! connect, feed stage titles, close. No Bluetooth hardware is needed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use camsync_core::protocol::{START_RECORDING, STOP_RECORDING};
use camsync_core::{
    AckMode, CommandBridge, CommandKind, LinkStatus, MockTransport, Outcome, SessionConfig,
    Trigger, TriggerState,
};

fn session_config(names: &[&str]) -> SessionConfig {
    SessionConfig {
        device_names: names.iter().map(|n| n.to_string()).collect(),
        stop_delay_secs: 0,
        ack_timeout_ms: 200,
        reconnect_delay_ms: 50,
        ..Default::default()
    }
}

#[test]
fn test_full_schedule() {
    let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
    let config = session_config(&["GoPro A", "GoPro B"]);
    let mut trigger = Trigger::from_config(&config, Arc::new(transport.clone()));

    let result = trigger.connect();
    assert_eq!(result.outcome(), Outcome::Total);
    assert_eq!(trigger.status(), "Connected");

    let schedule = [
        "Intro",
        "Task A (recording)",
        "Task A (recording)",
        "Break",
        "Task B (recording)",
        "Outro",
    ];
    // each stage outlasts the grace period, so every stop is sent
    for title in schedule {
        trigger.trigger_in(title);
        if let Some(stop) = trigger.trigger_out(title) {
            assert_eq!(stop.join().unwrap().success_count, 2);
        }
    }
    assert_eq!(trigger.state(), TriggerState::Idle);

    for camera in transport.cameras() {
        assert_eq!(camera.count_writes(&START_RECORDING), 2);
        assert_eq!(camera.count_writes(&STOP_RECORDING), 2);
    }

    trigger.close();
    assert_eq!(trigger.status(), "Disconnected");
    for camera in transport.cameras() {
        assert!(!camera.is_connected_sync());
    }
}

#[test]
fn test_schedule_ending_while_recording() {
    let transport = MockTransport::with_names(&["GoPro A"]);
    let mut trigger =
        Trigger::from_config(&session_config(&["GoPro A"]), Arc::new(transport.clone()));
    trigger.connect();

    trigger.trigger_in("Finale (recording)").unwrap();
    let result = trigger.trigger_end().unwrap();
    assert_eq!(result.kind, CommandKind::Disconnect);

    let camera = transport.camera("GoPro A").unwrap();
    assert_eq!(camera.count_writes(&STOP_RECORDING), 1);
    assert!(!camera.is_connected_sync());
}

#[test]
fn test_degraded_fleet_keeps_recording_reachable_cameras() {
    let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
    let b = transport.camera("GoPro B").unwrap();
    b.set_ack_mode(AckMode::Silent);

    let mut trigger = Trigger::from_config(
        &session_config(&["GoPro A", "GoPro B"]),
        Arc::new(transport.clone()),
    );
    trigger.connect();
    assert_eq!(trigger.link_status(), LinkStatus::Partial { ok: 1, total: 2 });

    // B is tracked even though it never acknowledged, so it still records
    let result = trigger.trigger_in("Task (recording)").unwrap();
    assert_eq!(result.success_count, 2);
    assert_eq!(b.count_writes(&START_RECORDING), 1);
    trigger.close();
}

#[test]
fn test_dropped_camera_recovered_by_keep_alive() {
    let transport = MockTransport::with_names(&["GoPro A"]);
    let camera = transport.camera("GoPro A").unwrap();
    let bridge = CommandBridge::new(
        session_config(&[]).link_options(),
        Default::default(),
    );
    bridge
        .start(
            Box::new(transport.clone()),
            camsync_core::AllowList::new(["GoPro A"]),
        )
        .unwrap();
    assert_eq!(
        bridge
            .execute_default(CommandKind::Connect, None)
            .success_count,
        1
    );

    camera.drop_link();
    let result = bridge.execute_default(CommandKind::KeepAlive, None);
    assert_eq!(result.outcome(), Outcome::Total);
    assert!(camera.is_connected_sync());
    assert_eq!(camera.connect_attempts(), 2);
    bridge.stop();
}

#[test]
fn test_worker_not_started() {
    let bridge = CommandBridge::default();
    let start = Instant::now();
    let result = bridge.execute(CommandKind::Connect, None, Duration::from_secs(1));

    assert_eq!(
        (result.kind, result.success_count, result.message.as_str()),
        (CommandKind::Connect, 0, "Thread not running")
    );
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_config_from_toml_drives_session() {
    let config: SessionConfig = toml::from_str(
        r#"
        device_names = ["GoPro A"]
        keyword = "[REC]"
        stop_delay_secs = 0
        "#,
    )
    .unwrap();
    config.validate().unwrap();

    let transport = MockTransport::with_names(&["GoPro A"]);
    let mut trigger = Trigger::from_config(&config, Arc::new(transport.clone()));
    trigger.connect();

    assert!(trigger.trigger_in("Task (recording)").is_none());
    assert!(trigger.trigger_in("Task [REC]").is_some());
    trigger.close();
}
