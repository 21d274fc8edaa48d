//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use ui_arbiter::core::config::Config;
use ui_arbiter::logger::activity::{ActivityEvent, ActivityLoggerHandle, event_to_log_entry};
use ui_arbiter::logger::jsonl::{JsonlConfig, JsonlWriter, LogEntry};
use ui_arbiter::progress::store::ProgressStore;
use ui_arbiter::screen::ScreenEvent;
use ui_arbiter::session::headless::{RuntimeRecorder, ScriptedLoader};
use ui_arbiter::session::{Session, SessionBuilder};
use ui_arbiter::settings::appliers::Appliers;
use ui_arbiter::settings::data::{SettingsData, VideoLimits};
use ui_arbiter::settings::storage::{JsonFileStorage, MemoryStorage, Storage, StoredBlob};
use ui_arbiter::settings::transaction::{SettingsSnapshot, SettingsTransaction};

/// Activity events buffered during a replay before further ones are counted as dropped.
const REPLAY_EVENT_CAPACITY: usize = 4096;

/// UI claim arbiter: inspect configuration and settings, replay scripted sessions.
#[derive(Debug, Parser)]
#[command(
    name = "uiarb",
    author,
    version,
    about = "UI claim arbiter - pause, input mode, screens and settings",
    long_about = None,
    arg_required_else_help = true
)]
/// Command-line arguments for `uiarb`.
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Inspect or reset persisted settings.
    Settings(SettingsArgs),
    /// Drive a headless session through a scripted sequence of steps.
    Replay(ReplayArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct SettingsArgs {
    /// Settings operation to run.
    #[command(subcommand)]
    command: Option<SettingsCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum SettingsCommand {
    /// Print the persisted settings (defaults if nothing is stored).
    Show,
    /// Overwrite the persisted settings with defaults.
    Reset,
    /// Print the settings file path.
    Path,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// TOML script with `[[steps]]` entries.
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,
    /// Read and save settings and progress in the configured storage directory
    /// instead of memory.
    #[arg(long)]
    persist: bool,
    /// Append the replay's activity to the configured JSONL log.
    #[arg(long)]
    log: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Config(args) => run_config(cli, args),
        Command::Settings(args) => run_settings(cli, args),
        Command::Replay(args) => run_replay(cli, args),
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                        println!("  Scenes: {}", scene_names(&config).join(", "));
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                            "scenes": scene_names(&config),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red().bold());
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn scene_names(config: &Config) -> Vec<&str> {
    config.scenes.iter().map(|s| s.name.as_str()).collect()
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

// ---------------------------------------------------------------------------
// settings
// ---------------------------------------------------------------------------

fn run_settings(cli: &Cli, args: &SettingsArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let storage = JsonFileStorage::new(&config.storage.dir);
    let key = config.storage.settings_key.as_str();
    let path = storage
        .path_for(key)
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    match &args.command {
        None | Some(SettingsCommand::Show) => {
            let stored = read_stored_settings(&storage, key);
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{} {}", "Settings:".bold(), path.display());
                    println!("  Source: {}", stored.source);
                    if let Some(details) = &stored.details {
                        println!("  Details: {details}");
                    }
                    print_settings_human(&stored.data);
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "settings show",
                        "path": path.to_string_lossy(),
                        "source": stored.source,
                        "details": stored.details,
                        "settings": serde_json::to_value(&stored.data)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(SettingsCommand::Reset) => {
            let mut tx = SettingsTransaction::open(
                Box::new(storage),
                Appliers::noop(),
                key,
                VideoLimits::from(&config.video),
            );
            tx.reset_to_default()
                .map_err(|e| CliError::Runtime(e.to_string()))?;

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{} {}", "Settings reset:".green(), path.display());
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "settings reset",
                        "path": path.to_string_lossy(),
                        "settings": serde_json::to_value(tx.current())?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(SettingsCommand::Path) => {
            let exists = path.exists();
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults are written on first run)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "settings path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

struct StoredSettings {
    data: SettingsData,
    source: &'static str,
    details: Option<String>,
}

/// Read-only view of what is persisted; never writes defaults back.
fn read_stored_settings(storage: &JsonFileStorage, key: &str) -> StoredSettings {
    let defaults = |source, details| StoredSettings {
        data: SettingsData::default(),
        source,
        details,
    };
    match storage.load(key) {
        StoredBlob::Missing => defaults("defaults (nothing stored)", None),
        StoredBlob::Unreadable { details } => defaults("defaults (unreadable)", Some(details)),
        StoredBlob::Found(bytes) => {
            let parsed = String::from_utf8(bytes)
                .map_err(|e| e.to_string())
                .and_then(|raw| SettingsSnapshot::from_json(&raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(snapshot) if snapshot.data().initialized => StoredSettings {
                    data: snapshot.data().clone(),
                    source: "stored",
                    details: None,
                },
                Ok(_) => defaults("defaults (stored blob never initialized)", None),
                Err(details) => defaults("defaults (corrupt)", Some(details)),
            }
        }
    }
}

fn print_settings_human(data: &SettingsData) {
    let mute = |muted: bool| if muted { " (muted)" } else { "" };
    let audio = &data.audio;
    println!(
        "  Audio: master {:.2}{} bgm {:.2}{} sfx {:.2}{}",
        audio.master,
        mute(audio.master_muted),
        audio.bgm,
        mute(audio.bgm_muted),
        audio.sfx,
        mute(audio.sfx_muted),
    );
    let video = &data.video;
    println!(
        "  Video: {}x{} {} quality {}",
        video.width,
        video.height,
        if video.fullscreen { "fullscreen" } else { "windowed" },
        video.quality_index,
    );
    let bindings = if data.controls.binding_overrides_json.is_empty() {
        "default"
    } else {
        "overridden"
    };
    println!("  Controls: {bindings}");
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplayScript {
    #[serde(default)]
    loader: LoaderPlan,
    #[serde(default)]
    steps: Vec<ReplayStep>,
}

/// How the scripted scene loader behaves.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoaderPlan {
    /// Polls each load stays pending before resolving.
    pending_polls: u32,
    /// Scenes whose loads fail.
    failing: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ReplayStep {
    Push {
        kind: String,
    },
    Pop,
    Event {
        event: ScreenEvent,
    },
    Tick {
        secs: f64,
        #[serde(default = "one_frame")]
        frames: u32,
    },
    LoadScene {
        scene: String,
    },
    Toast {
        message: String,
        hold_secs: Option<f64>,
    },
    Overlay {
        channel: String,
        kind: String,
    },
    ClearOverlay {
        channel: String,
    },
    TogglePause,
    Save,
    AddCoins {
        amount: i64,
    },
    SpendCoins {
        amount: i64,
    },
    HighScore {
        score: i64,
    },
    UnlockLevel {
        level: i64,
    },
    SetInt {
        key: String,
        value: i64,
    },
    ResetProgress,
}

const fn one_frame() -> u32 {
    1
}

impl ReplayStep {
    const fn op(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Pop => "pop",
            Self::Event { .. } => "event",
            Self::Tick { .. } => "tick",
            Self::LoadScene { .. } => "load_scene",
            Self::Toast { .. } => "toast",
            Self::Overlay { .. } => "overlay",
            Self::ClearOverlay { .. } => "clear_overlay",
            Self::TogglePause => "toggle_pause",
            Self::Save => "save",
            Self::AddCoins { .. } => "add_coins",
            Self::SpendCoins { .. } => "spend_coins",
            Self::HighScore { .. } => "high_score",
            Self::UnlockLevel { .. } => "unlock_level",
            Self::SetInt { .. } => "set_int",
            Self::ResetProgress => "reset_progress",
        }
    }
}

fn run_replay(cli: &Cli, args: &ReplayArgs) -> Result<(), CliError> {
    let script = read_script(&args.script)?;
    let config = load_config(cli)?;

    let storage: Box<dyn Storage> = if args.persist {
        Box::new(JsonFileStorage::new(&config.storage.dir))
    } else {
        Box::new(MemoryStorage::new())
    };
    let recorder = RuntimeRecorder::new();
    let loader = script
        .loader
        .failing
        .iter()
        .fold(ScriptedLoader::new(script.loader.pending_polls), |l, scene| {
            l.failing(scene)
        });
    let loader_log = loader.log();
    let (activity, events) = ActivityLoggerHandle::capture(REPLAY_EVENT_CAPACITY);

    let logging = config.logging.clone();
    let mut session = SessionBuilder::new(config)
        .storage(storage)
        .appliers(recorder.appliers())
        .input_backend(recorder.input_backend())
        .pause_effect(recorder.pause_effect())
        .scene_loader(Box::new(loader))
        .activity(activity.clone())
        .build();

    let mut transcript = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let result = apply_step(&mut session, step)
            .map_err(|details| CliError::User(format!("step {}: {details}", index + 1)))?;
        transcript.push(json!({
            "step": index + 1,
            "op": step.op(),
            "result": result,
        }));
        if session.quit_requested() {
            break;
        }
    }

    let state = session_state(&session)?;
    session.shutdown("replay finished");

    let entries: Vec<LogEntry> = events
        .try_iter()
        .filter(|event| *event != ActivityEvent::Shutdown)
        .map(|event| event_to_log_entry(&event))
        .collect();
    let log_state = args.log.then(|| {
        let mut writer = JsonlWriter::open(JsonlConfig::from(&logging));
        for entry in &entries {
            writer.write_entry(entry);
        }
        writer.fsync();
        writer.state().as_str()
    });
    let log: Vec<Value> = entries
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    let runtime = serde_json::to_value(recorder.snapshot())?;
    let loads = serde_json::to_value(loader_log.lock().clone())?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{} {} step(s) from {}",
                "Replayed".bold(),
                transcript.len(),
                args.script.display()
            );
            for entry in &transcript {
                println!("  {:>3}. {:<14} {}", entry["step"], as_str(&entry["op"]), entry["result"]);
            }
            print_state_human(&state);
            println!("{}", "Runtime".bold());
            println!("  pause calls: {}", runtime["pause"]);
            println!("  input modes: {}", runtime["input_modes"]);
            println!(
                "  applies: audio {} video {} controls {}",
                array_len(&runtime["audio"]),
                array_len(&runtime["video"]),
                array_len(&runtime["controls"]),
            );
            println!("  scene loads: {} cancelled: {}", loads["begun"], loads["cancelled"]);
            if let Some(sink) = log_state {
                println!("  activity log: {} entries -> {sink}", log.len());
            }
            if cli.verbose {
                println!("{}", "Activity".bold());
                for entry in &log {
                    println!("  {entry}");
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "replay",
                "script": args.script.to_string_lossy(),
                "steps": transcript,
                "state": state,
                "runtime": runtime,
                "scene_loads": loads,
                "activity": log,
                "dropped_events": activity.dropped_events(),
                "log_sink": log_state,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<ReplayScript, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CliError::User(format!("cannot read script {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map_err(|e| CliError::User(format!("invalid script {}: {e}", path.display())))
}

fn apply_step(session: &mut Session, step: &ReplayStep) -> Result<Value, String> {
    let id = |id: Option<ui_arbiter::screen::ScreenId>| id.map(|id| id.to_string());
    let result = match step {
        ReplayStep::Push { kind } => json!({ "kind": kind, "id": id(session.push(kind)) }),
        ReplayStep::Pop => json!({ "id": id(session.pop()) }),
        ReplayStep::Event { event } => json!({ "handled": session.dispatch(event) }),
        ReplayStep::Tick { secs, frames } => {
            let dt = Duration::try_from_secs_f64(*secs)
                .map_err(|e| format!("invalid tick duration {secs}: {e}"))?;
            let mut scaled = Duration::ZERO;
            for _ in 0..*frames {
                scaled += session.tick(dt).scaled;
            }
            json!({
                "frames": frames,
                "unscaled_secs": dt.as_secs_f64() * f64::from(*frames),
                "scaled_secs": scaled.as_secs_f64(),
            })
        }
        ReplayStep::LoadScene { scene } => {
            session.load_scene(scene);
            json!({ "loading": session.loading_scene() })
        }
        ReplayStep::Toast { message, hold_secs } => {
            json!({ "queued": session.toast(message, *hold_secs) })
        }
        ReplayStep::Overlay { channel, kind } => {
            json!({ "channel": channel, "id": id(session.show_overlay(channel, kind)) })
        }
        ReplayStep::ClearOverlay { channel } => json!({ "cleared": session.clear_overlay(channel) }),
        ReplayStep::TogglePause => json!({ "changed": session.toggle_pause_menu() }),
        ReplayStep::Save => {
            let report = session.save_all();
            if let Some((key, err)) = report.failed.first() {
                return Err(format!("save failed for '{key}': {err}"));
            }
            json!({ "saved": report.wrote_any(), "written": report.written })
        }
        ReplayStep::AddCoins { amount } => {
            json!({ "changed": progress_step(session, |p| p.add_coins(*amount))? })
        }
        ReplayStep::SpendCoins { amount } => {
            json!({ "spent": progress_step(session, |p| p.try_spend_coins(*amount))? })
        }
        ReplayStep::HighScore { score } => {
            json!({ "changed": progress_step(session, |p| p.set_high_score_if_better(*score))? })
        }
        ReplayStep::UnlockLevel { level } => {
            json!({ "changed": progress_step(session, |p| p.unlock_level(*level))? })
        }
        ReplayStep::SetInt { key, value } => {
            json!({ "changed": progress_step(session, |p| p.set_int(key, *value))? })
        }
        ReplayStep::ResetProgress => {
            progress_step(session, |p| p.reset().map(|()| true))?;
            json!({ "reset": true })
        }
    };
    Ok(result)
}

fn progress_step(
    session: &mut Session,
    f: impl FnOnce(&mut ProgressStore) -> ui_arbiter::core::errors::Result<bool>,
) -> Result<bool, String> {
    f(session.services_mut().progress_mut()).map_err(|e| e.to_string())
}

fn session_state(session: &Session) -> Result<Value, CliError> {
    let stack: Vec<Value> = session
        .stack()
        .describe()
        .into_iter()
        .map(|(id, kind, active, status)| {
            json!({ "id": id.to_string(), "kind": kind, "active": active, "status": status })
        })
        .collect();
    let overlays: Vec<Value> = session
        .overlays()
        .describe()
        .into_iter()
        .map(|(channel, kind, status)| json!({ "channel": channel, "kind": kind, "status": status }))
        .collect();
    let settings = session.services().settings();
    let progress = session.services().progress();

    Ok(json!({
        "paused": session.is_paused(),
        "pause_holders": session.services().pause().holders(),
        "input_mode": session.input_mode().to_string(),
        "input_holders": session.services().input().holders(),
        "active_scene": session.active_scene(),
        "loading_scene": session.loading_scene(),
        "stack": stack,
        "overlays": overlays,
        "toasts_pending": session.services().toasts().pending(),
        "settings": {
            "dirty": settings.is_dirty(),
            "display_pending": settings.display_pending(),
            "current": serde_json::to_value(settings.current())?,
        },
        "progress": serde_json::to_value(progress.data())?,
        "save_keys": session.save_keys(),
        "quit_requested": session.quit_requested(),
    }))
}

fn print_state_human(state: &Value) {
    println!("{}", "State".bold());
    let paused = if state["paused"].as_bool().unwrap_or(false) {
        "yes".yellow()
    } else {
        "no".green()
    };
    println!("  paused: {paused} {}", state["pause_holders"]);
    println!("  input: {} {}", as_str(&state["input_mode"]), state["input_holders"]);
    println!(
        "  scene: {}{}",
        state["active_scene"].as_str().unwrap_or("-"),
        state["loading_scene"]
            .as_str()
            .map_or_else(String::new, |s| format!(" (loading {s})")),
    );
    println!("  stack (bottom first):");
    for entry in state["stack"].as_array().into_iter().flatten() {
        let marker = if entry["active"].as_bool().unwrap_or(false) {
            "*"
        } else {
            " "
        };
        println!(
            "    {marker} {} {} {}",
            as_str(&entry["id"]),
            as_str(&entry["kind"]),
            as_str(&entry["status"]).dimmed()
        );
    }
    println!("  overlays:");
    for entry in state["overlays"].as_array().into_iter().flatten() {
        println!(
            "    {} = {} {}",
            as_str(&entry["channel"]),
            as_str(&entry["kind"]),
            as_str(&entry["status"]).dimmed()
        );
    }
    println!(
        "  settings: dirty={} display_pending={}",
        state["settings"]["dirty"], state["settings"]["display_pending"]
    );
    println!(
        "  progress: coins={} high_score={} unlocked_level={}",
        state["progress"]["coins"], state["progress"]["high_score"], state["progress"]["unlocked_level"]
    );
}

fn as_str(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn array_len(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

// ---------------------------------------------------------------------------
// output
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("UIARB_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "uiarb",
            "--config",
            "/tmp/uiarb.toml",
            "--json",
            "--no-color",
            "-v",
            "config",
            "show",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["uiarb", "settings", "show", "--json", "--no-color"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_every_subcommand() {
        let cases = [
            vec!["uiarb", "config"],
            vec!["uiarb", "config", "path"],
            vec!["uiarb", "config", "validate"],
            vec!["uiarb", "settings", "reset"],
            vec!["uiarb", "settings", "path"],
            vec!["uiarb", "replay", "script.toml", "--persist", "--log"],
        ];
        for case in cases {
            assert!(Cli::try_parse_from(case.clone()).is_ok(), "{case:?}");
        }
        assert!(Cli::try_parse_from(["uiarb", "replay"]).is_err());
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some(" Human "), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn exit_codes_follow_contract() {
        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 2);
        assert_eq!(
            CliError::Io(io::Error::other("closed")).exit_code(),
            2
        );
    }

    #[test]
    fn script_parses_every_step_kind() {
        let raw = r#"
            [loader]
            pending_polls = 2
            failing = ["Broken"]

            [[steps]]
            op = "load_scene"
            scene = "Game"

            [[steps]]
            op = "tick"
            secs = 0.016
            frames = 4

            [[steps]]
            op = "push"
            kind = "pause_menu"

            [[steps]]
            op = "event"
            event = { type = "click", control = "settings" }

            [[steps]]
            op = "event"
            event = { type = "slider", control = "master", value = 0.25 }

            [[steps]]
            op = "event"
            event = { type = "back" }

            [[steps]]
            op = "toast"
            message = "hello"

            [[steps]]
            op = "overlay"
            channel = "HUD"
            kind = "hud"

            [[steps]]
            op = "clear_overlay"
            channel = "HUD"

            [[steps]]
            op = "toggle_pause"

            [[steps]]
            op = "pop"

            [[steps]]
            op = "save"
        "#;
        let script: ReplayScript = toml::from_str(raw).unwrap();
        assert_eq!(script.loader.pending_polls, 2);
        assert_eq!(script.steps.len(), 12);
        assert!(matches!(script.steps[1], ReplayStep::Tick { frames: 4, .. }));
        assert!(matches!(
            &script.steps[4],
            ReplayStep::Event { event: ScreenEvent::Slider { control, .. } } if control == "master"
        ));
        assert!(matches!(
            &script.steps[6],
            ReplayStep::Toast { hold_secs: None, .. }
        ));
    }

    #[test]
    fn unknown_step_is_rejected() {
        let raw = "[[steps]]\nop = \"explode\"\n";
        assert!(toml::from_str::<ReplayScript>(raw).is_err());
    }

    #[test]
    fn replay_steps_drive_a_session() {
        let mut session = SessionBuilder::new(Config::with_default_scenes()).build();
        let steps = [
            ReplayStep::LoadScene {
                scene: "Game".into(),
            },
            ReplayStep::Tick {
                secs: 0.016,
                frames: 1,
            },
            ReplayStep::TogglePause,
        ];
        for step in &steps {
            apply_step(&mut session, step).unwrap();
        }
        let state = session_state(&session).unwrap();
        assert_eq!(state["active_scene"], "Game");
        assert_eq!(state["paused"], true);
        assert_eq!(state["input_mode"], "ui");
        assert_eq!(state["stack"][0]["kind"], "pause_menu");
        assert_eq!(state["overlays"][0]["channel"], "HUD");
    }

    #[test]
    fn progress_steps_write_through_and_report() {
        let mut session = SessionBuilder::new(Config::with_default_scenes()).build();
        let steps = [
            ReplayStep::AddCoins { amount: 10 },
            ReplayStep::SpendCoins { amount: 25 },
            ReplayStep::HighScore { score: 7 },
            ReplayStep::SetInt {
                key: "tutorial_done".into(),
                value: 1,
            },
            ReplayStep::Save,
        ];
        let results: Vec<Value> = steps
            .iter()
            .map(|step| apply_step(&mut session, step).unwrap())
            .collect();
        assert_eq!(results[0]["changed"], true);
        assert_eq!(results[1]["spent"], false);
        assert_eq!(results[4]["saved"], false);

        let state = session_state(&session).unwrap();
        assert_eq!(state["progress"]["coins"], 10);
        assert_eq!(state["progress"]["high_score"], 7);
        assert_eq!(state["progress"]["ints"]["tutorial_done"], 1);
        assert_eq!(state["save_keys"], json!(["settings_main", "progress_main"]));

        apply_step(&mut session, &ReplayStep::ResetProgress).unwrap();
        let state = session_state(&session).unwrap();
        assert_eq!(state["progress"]["coins"], 0);
    }

    #[test]
    fn failed_save_is_a_step_error() {
        let storage = MemoryStorage::new();
        let mut session = SessionBuilder::new(Config::with_default_scenes())
            .storage(Box::new(storage.clone()))
            .build();
        session
            .services_mut()
            .settings_mut()
            .edit(|d| d.audio.master = 0.5);
        storage.set_fail_saves(true);
        let err = apply_step(&mut session, &ReplayStep::Save).unwrap_err();
        assert!(err.contains("settings_main"), "{err}");
    }

    #[test]
    fn invalid_tick_is_a_step_error() {
        let mut session = SessionBuilder::new(Config::with_default_scenes()).build();
        let err = apply_step(
            &mut session,
            &ReplayStep::Tick {
                secs: -1.0,
                frames: 1,
            },
        )
        .unwrap_err();
        assert!(err.contains("invalid tick duration"));
    }
}
