#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use ui_arbiter::core::config::Config;
use ui_arbiter::session::headless::{RuntimeRecorder, ScriptedLoader};
use ui_arbiter::session::{Session, SessionBuilder};
use ui_arbiter::settings::storage::MemoryStorage;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

/// A session wired to recording collaborators, plus handles to inspect them.
pub struct Harness {
    pub session: Session,
    pub recorder: RuntimeRecorder,
    pub storage: MemoryStorage,
}

pub fn harness() -> Harness {
    harness_with(Config::with_default_scenes(), ScriptedLoader::new(0))
}

pub fn harness_with(config: Config, loader: ScriptedLoader) -> Harness {
    let recorder = RuntimeRecorder::new();
    let storage = MemoryStorage::new();
    let session = SessionBuilder::new(config)
        .storage(Box::new(storage.clone()))
        .appliers(recorder.appliers())
        .input_backend(recorder.input_backend())
        .pause_effect(recorder.pause_effect())
        .scene_loader(Box::new(loader))
        .build();
    Harness {
        session,
        recorder,
        storage,
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_uiarb") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "uiarb.exe" } else { "uiarb" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve uiarb binary path for integration test"),
    }
}

/// Run the binary with `home` as `HOME` so default paths stay inside the test dir.
pub fn run_cli_case(case_name: &str, home: &Path, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("uiarb-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", home)
        .env("RUST_BACKTRACE", "1")
        .env_remove("UIARB_OUTPUT_FORMAT");
    for (key, _) in std::env::vars() {
        if key.starts_with("UIARB_") {
            command.env_remove(key);
        }
    }
    let output = command.output().expect("execute uiarb command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
