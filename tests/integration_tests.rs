//! Integration tests: end-to-end session scenarios and CLI smoke tests.

mod common;

use std::fs;
use std::time::Duration;

use serde_json::Value;
use ui_arbiter::arbiter::input_mode::InputMode;
use ui_arbiter::core::config::Config;
use ui_arbiter::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use ui_arbiter::screen::ScreenEvent;
use ui_arbiter::screen::toast::ToastView;
use ui_arbiter::session::SessionBuilder;
use ui_arbiter::session::headless::ScriptedLoader;
use ui_arbiter::settings::storage::JsonFileStorage;

const FRAME: Duration = Duration::from_millis(16);

fn click(control: &str) -> ScreenEvent {
    ScreenEvent::click(control)
}

// ──────────────────── session scenarios ────────────────────

#[test]
fn pause_and_settings_claims_unwind_in_order() {
    let mut h = common::harness();
    h.session.load_scene("Game");
    h.session.tick(FRAME);
    assert_eq!(h.session.input_mode(), InputMode::Gameplay);

    assert!(h.session.toggle_pause_menu());
    assert!(h.session.is_paused());
    assert_eq!(h.session.input_mode(), InputMode::Ui);

    assert!(h.session.dispatch(&click("settings")));
    assert_eq!(h.session.stack().kinds(), vec!["pause_menu", "settings"]);
    assert_eq!(h.session.services().input().claim_count(), 2);
    assert_eq!(h.session.input_mode(), InputMode::Ui);

    assert!(h.session.dispatch(&ScreenEvent::Back));
    assert_eq!(h.session.stack().kinds(), vec!["pause_menu"]);
    assert_eq!(h.session.input_mode(), InputMode::Ui);
    assert!(h.session.is_paused());

    assert!(h.session.dispatch(&click("resume")));
    assert!(h.session.stack().is_empty());
    assert!(!h.session.is_paused());
    assert_eq!(h.session.input_mode(), InputMode::Gameplay);

    let log = h.recorder.snapshot();
    assert_eq!(log.pause, vec![true, false]);
    assert_eq!(log.input_modes.last(), Some(&InputMode::Gameplay));
}

#[test]
fn display_gate_times_out_while_paused_and_reverts_once() {
    let mut h = common::harness();
    h.session.toggle_pause_menu();
    h.session.dispatch(&click("settings"));
    h.session.dispatch(&ScreenEvent::Toggle {
        control: "fullscreen".into(),
        on: false,
    });
    assert_eq!(
        h.session.stack().kinds(),
        vec!["pause_menu", "settings", "confirm_gate"]
    );
    assert_eq!(h.recorder.last_video().map(|v| v.fullscreen), Some(false));

    for _ in 0..9 {
        let times = h.session.tick(Duration::from_secs(1));
        assert_eq!(times.scaled, Duration::ZERO);
        assert_eq!(h.session.stack().len(), 3);
    }
    h.session.tick(Duration::from_secs(1));
    assert_eq!(h.session.stack().kinds(), vec!["pause_menu", "settings"]);
    assert!(h.session.services().settings().current().video.fullscreen);
    assert_eq!(h.recorder.last_video().map(|v| v.fullscreen), Some(true));

    let toast = h.session.overlays().get::<ToastView>("Toast").unwrap();
    assert_eq!(toast.message(), "Display reverted");

    // Nothing else resolves or pops later.
    h.session.tick(Duration::from_secs(30));
    assert_eq!(h.session.stack().kinds(), vec!["pause_menu", "settings"]);
}

#[test]
fn keeping_a_display_change_survives_apply() {
    let mut h = common::harness();
    h.session.push("settings");
    h.session.dispatch(&ScreenEvent::Select {
        control: "resolution".into(),
        index: 0,
    });
    assert_eq!(h.session.stack().top_kind(), Some("confirm_gate"));
    h.session.dispatch(&click("confirm"));
    assert_eq!(h.session.stack().top_kind(), Some("settings"));
    h.session.dispatch(&click("apply"));

    let stored = h.storage.get("settings_main").unwrap();
    let value: Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(value["video"]["width"], 1280);
    assert_eq!(value["video"]["height"], 720);
    assert!(!h.session.services().settings().is_dirty());
}

#[test]
fn replacing_the_hud_closes_the_old_one_exactly_once() {
    let (activity, events) = ActivityLoggerHandle::capture(256);
    let mut session = SessionBuilder::new(Config::with_default_scenes())
        .activity(activity)
        .build();
    session.toast("hello", None);
    let first = session.show_overlay("HUD", "hud").unwrap();
    let second = session.show_overlay("HUD", "hud").unwrap();
    assert_ne!(first, second);
    assert_eq!(session.overlays().occupant("HUD"), Some(second));
    assert_eq!(session.overlays().occupant_kind("Toast"), Some("toast"));

    let hud_closes = events
        .try_iter()
        .filter(|event| matches!(event, ActivityEvent::ScreenClosed { kind, .. } if kind == "hud"))
        .count();
    assert_eq!(hud_closes, 1);
}

#[test]
fn snapshot_round_trip_never_touches_storage() {
    let mut h = common::harness();
    let writes = h.storage.write_count();
    let settings = h.session.services_mut().settings_mut();
    let snap = settings.export_snapshot();
    settings.edit(|d| d.audio.master = 0.1);
    assert!(settings.is_dirty());
    settings.import_snapshot(&snap, false);
    assert!((settings.current().audio.master - 1.0).abs() < f32::EPSILON);
    assert!(!settings.is_dirty());
    assert_eq!(h.storage.write_count(), writes);
}

#[test]
fn superseded_scene_load_is_cancelled_and_never_applied() {
    let loader = ScriptedLoader::new(2);
    let log = loader.log();
    let mut h = common::harness_with(Config::with_default_scenes(), loader);

    h.session.load_scene("Game");
    h.session.tick(FRAME);
    assert_eq!(h.session.overlays().occupant_kind("Loading"), Some("loading"));
    h.session.load_scene("MainMenu");
    h.session.tick(FRAME);
    h.session.tick(FRAME);
    assert_eq!(h.session.loading_scene(), Some("MainMenu"));
    h.session.tick(FRAME);

    assert_eq!(h.session.active_scene(), Some("MainMenu"));
    assert!(!h.session.is_loading());
    assert_eq!(h.session.overlays().occupant_kind("Loading"), None);
    assert_eq!(h.session.overlays().occupant_kind("HUD"), None);
    assert_eq!(h.session.stack().kinds(), vec!["main_menu"]);
    assert_eq!(h.session.input_mode(), InputMode::Ui);

    let log = log.lock();
    assert_eq!(log.begun, vec!["Game", "MainMenu"]);
    assert_eq!(log.cancelled, vec!["Game"]);
}

#[test]
fn revert_toast_from_a_torn_down_gate_waits_for_the_load() {
    let mut h = common::harness_with(Config::with_default_scenes(), ScriptedLoader::new(1));
    h.session.push("settings");
    h.session.dispatch(&ScreenEvent::Toggle {
        control: "fullscreen".into(),
        on: false,
    });
    assert_eq!(h.session.stack().top_kind(), Some("confirm_gate"));

    h.session.load_scene("Game");
    assert!(h.session.services().settings().current().video.fullscreen);
    assert_eq!(h.session.overlays().channels(), vec!["Loading"]);
    assert_eq!(h.session.services().toasts().pending(), 1);

    h.session.tick(FRAME);
    assert!(h.session.is_loading());
    assert_eq!(h.session.overlays().occupant_kind("Toast"), None);

    h.session.tick(FRAME);
    assert!(!h.session.is_loading());
    assert_eq!(h.session.overlays().occupant_kind("Loading"), None);
    let toast = h.session.overlays().get::<ToastView>("Toast").unwrap();
    assert_eq!(toast.message(), "Display reverted");
}

#[test]
fn quitting_from_pause_menu_loads_the_menu_scene() {
    let mut h = common::harness();
    h.session.load_scene("Game");
    h.session.tick(FRAME);
    h.session.toggle_pause_menu();
    h.session.dispatch(&click("quit"));
    assert!(h.session.stack().is_empty());
    assert!(!h.session.is_paused());
    h.session.tick(FRAME);
    assert_eq!(h.session.active_scene(), Some("MainMenu"));

    h.session.dispatch(&click("quit"));
    assert!(h.session.quit_requested());
}

#[test]
fn file_storage_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        SessionBuilder::new(Config::with_default_scenes())
            .storage(Box::new(JsonFileStorage::new(dir.path())))
            .build()
    };

    let mut session = open();
    assert_eq!(
        session.services().settings().load_report().outcome.label(),
        "missing"
    );
    session.push("settings");
    session.dispatch(&ScreenEvent::Slider {
        control: "bgm".into(),
        value: 0.3,
    });
    session.dispatch(&click("apply"));
    session.shutdown("test");

    let reopened = open();
    let current = reopened.services().settings().current();
    assert_eq!(
        reopened.services().settings().load_report().outcome.label(),
        "loaded"
    );
    assert!((current.audio.bgm - 0.3).abs() < 1e-6);
}

#[test]
fn progress_persists_next_to_settings() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        SessionBuilder::new(Config::with_default_scenes())
            .storage(Box::new(JsonFileStorage::new(dir.path())))
            .build()
    };

    let mut session = open();
    assert_eq!(session.save_keys(), vec!["settings_main", "progress_main"]);
    let progress = session.services_mut().progress_mut();
    progress.add_coins(30).unwrap();
    assert!(progress.try_spend_coins(12).unwrap());
    progress.unlock_level(4).unwrap();
    session.shutdown("test");
    assert!(dir.path().join("progress_main.json").exists());

    let reopened = open();
    let data = reopened.services().progress().data();
    assert_eq!(reopened.services().progress().load_report().outcome.label(), "loaded");
    assert_eq!((data.coins, data.unlocked_level), (18, 4));
}

#[test]
fn corrupt_settings_file_falls_back_to_defaults_and_is_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings_main.json");
    fs::write(&path, "{not json").unwrap();

    let session = SessionBuilder::new(Config::with_default_scenes())
        .storage(Box::new(JsonFileStorage::new(dir.path())))
        .build();
    assert_eq!(
        session.services().settings().load_report().outcome.label(),
        "corrupt"
    );
    let rewritten: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(rewritten["initialized"], true);
}

// ──────────────────── CLI smoke tests ────────────────────

fn json_line(stdout: &str) -> Value {
    serde_json::from_str(stdout.trim()).expect("stdout is one JSON document")
}

#[test]
fn help_command_prints_usage() {
    let home = tempfile::tempdir().unwrap();
    let result = common::run_cli_case("help_command_prints_usage", home.path(), &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: uiarb [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_path_reports_default_location() {
    let home = tempfile::tempdir().unwrap();
    let result = common::run_cli_case(
        "config_path_reports_default_location",
        home.path(),
        &["config", "path", "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["command"], "config path");
    assert_eq!(payload["exists"], false);
    assert!(
        payload["path"]
            .as_str()
            .unwrap()
            .ends_with(".config/uiarb/config.toml")
    );
}

#[test]
fn config_validate_rejects_blank_toast_channel() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "[toast]\nchannel = \"  \"\n").unwrap();
    let result = common::run_cli_case(
        "config_validate_rejects_blank_toast_channel",
        home.path(),
        &["--json", "--config", config.to_str().unwrap(), "config", "validate"],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["valid"], false);
    assert_eq!(payload["code"], "UIA-1001");
}

#[test]
fn settings_show_and_reset_use_configured_storage() {
    let home = tempfile::tempdir().unwrap();
    let saves = home.path().join("saves");
    let config = home.path().join("uiarb.toml");
    fs::write(
        &config,
        format!("[storage]\ndir = \"{}\"\n", saves.display()),
    )
    .unwrap();
    let config = config.to_str().unwrap();

    let show = common::run_cli_case(
        "settings_show_before_reset",
        home.path(),
        &["--json", "--config", config, "settings", "show"],
    );
    assert!(show.status.success(), "log: {}", show.log_path.display());
    let payload = json_line(&show.stdout);
    assert_eq!(payload["source"], "defaults (nothing stored)");
    assert!(!saves.join("settings_main.json").exists());

    let reset = common::run_cli_case(
        "settings_reset",
        home.path(),
        &["--json", "--config", config, "settings", "reset"],
    );
    assert!(reset.status.success(), "log: {}", reset.log_path.display());
    assert!(saves.join("settings_main.json").exists());

    let show = common::run_cli_case(
        "settings_show_after_reset",
        home.path(),
        &["--json", "--config", config, "settings", "show"],
    );
    let payload = json_line(&show.stdout);
    assert_eq!(payload["source"], "stored");
    assert_eq!(payload["settings"]["audio"]["master"], 1.0);
}

#[test]
fn replay_drives_a_headless_session() {
    let home = tempfile::tempdir().unwrap();
    let script = home.path().join("script.toml");
    fs::write(
        &script,
        r#"
[[steps]]
op = "load_scene"
scene = "Game"

[[steps]]
op = "tick"
secs = 0.016

[[steps]]
op = "toggle_pause"

[[steps]]
op = "event"
event = { type = "click", control = "settings" }

[[steps]]
op = "event"
event = { type = "slider", control = "master", value = 0.25 }

[[steps]]
op = "event"
event = { type = "click", control = "apply" }

[[steps]]
op = "event"
event = { type = "back" }

[[steps]]
op = "event"
event = { type = "click", control = "resume" }
"#,
    )
    .unwrap();

    let result = common::run_cli_case(
        "replay_drives_a_headless_session",
        home.path(),
        &["replay", script.to_str().unwrap(), "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["command"], "replay");
    assert_eq!(payload["steps"].as_array().map(Vec::len), Some(8));

    let state = &payload["state"];
    assert_eq!(state["paused"], false);
    assert_eq!(state["input_mode"], "gameplay");
    assert_eq!(state["active_scene"], "Game");
    assert_eq!(state["stack"].as_array().map(Vec::len), Some(0));
    assert_eq!(state["settings"]["dirty"], false);
    assert_eq!(state["settings"]["current"]["audio"]["master"], 0.25);
    assert_eq!(payload["runtime"]["pause"], serde_json::json!([true, false]));
}

#[test]
fn replay_reports_bad_scripts_as_user_errors() {
    let home = tempfile::tempdir().unwrap();
    let script = home.path().join("bad.toml");
    fs::write(&script, "[[steps]]\nop = \"tick\"\nsecs = -1.0\n").unwrap();
    let result = common::run_cli_case(
        "replay_reports_bad_scripts_as_user_errors",
        home.path(),
        &["replay", script.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("step 1"));
}

#[test]
fn replay_can_append_activity_to_the_jsonl_log() {
    let home = tempfile::tempdir().unwrap();
    let log_path = home.path().join("activity.jsonl");
    let config = home.path().join("uiarb.toml");
    fs::write(
        &config,
        format!("[logging]\njsonl_path = \"{}\"\n", log_path.display()),
    )
    .unwrap();
    let script = home.path().join("script.toml");
    fs::write(&script, "[[steps]]\nop = \"push\"\nkind = \"pause_menu\"\n").unwrap();

    let result = common::run_cli_case(
        "replay_can_append_activity_to_the_jsonl_log",
        home.path(),
        &[
            "--json",
            "--config",
            config.to_str().unwrap(),
            "replay",
            script.to_str().unwrap(),
            "--log",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["log_sink"], "primary");

    let lines: Vec<Value> = fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), payload["activity"].as_array().unwrap().len());
    assert!(lines.iter().any(|l| l["event"] == "pause_changed"));
    assert_eq!(lines.last().unwrap()["event"], "session_stop");
}
