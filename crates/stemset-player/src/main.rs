//! stemset-player - interactive CLI for auditioning separated stems
//!
//! Loads a job manifest (the JSON status document produced by the
//! separation service), registers every stem it reports, and drives the
//! session from a line-oriented command prompt.

mod config;
mod source;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam::channel::{self, Receiver};
use env_logger::Env;

use stemset_core::provider::JobStatus;
use stemset_core::{StemKey, StemSession};

use config::PlayerConfig;
use source::RodioFactory;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let manifest_path = parse_args()?;

    let config_path = config::default_config_path();
    let cfg = config::load_config(&config_path);
    if !config_path.exists() {
        if let Err(e) = config::save_config(&cfg, &config_path) {
            log::warn!("main: could not write default config: {:#}", e);
        }
    }

    let status = load_manifest(&manifest_path)?;
    if status.is_failed() {
        bail!(
            "separation job failed: {}",
            status.error.as_deref().unwrap_or("no error reported")
        );
    }
    if !status.is_completed() {
        log::warn!(
            "main: job is not completed yet ({:?}, {}%); stems may be missing",
            status.status,
            status.progress
        );
    }

    let factory = RodioFactory::try_default().context("Failed to open audio output")?;
    let mut session = StemSession::with_tick_interval(
        Box::new(factory),
        Duration::from_millis(cfg.tick_interval_ms),
    );
    session.load_job(&status);

    println!("stemset-player - type 'help' for commands");
    print_status(&session);

    let lines = spawn_stdin_reader();
    run_loop(&mut session, &cfg, &status, lines);

    Ok(())
}

/// Single positional argument: path to the job manifest JSON
fn parse_args() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(arg) if arg == "--help" || arg == "-h" => {
            println!("Usage: stemset-player <manifest.json>");
            std::process::exit(0);
        }
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("Usage: stemset-player <manifest.json>"),
    }
}

fn load_manifest(path: &Path) -> Result<JobStatus> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid manifest: {:?}", path))
}

/// Forwards stdin lines to a channel so the control loop can keep polling
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = channel::unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

fn run_loop(
    session: &mut StemSession,
    cfg: &PlayerConfig,
    status: &JobStatus,
    lines: Receiver<String>,
) {
    loop {
        crossbeam::select! {
            recv(lines) -> line => {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match Command::parse(line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => dispatch(session, cfg, status, cmd),
                    Err(e) => println!("error: {e}"),
                }
            }
            default(Duration::from_millis(25)) => {}
        }
        session.poll(Instant::now());
    }
}

/// One parsed prompt line
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play(Target),
    Pause(Target),
    Seek(StemKey, f64),
    Volume(StemKey, f32),
    Mute(StemKey),
    Offset(StemKey, f64),
    /// Delta defaults to the configured nudge step
    Nudge(StemKey, Option<f64>),
    Download(StemKey),
    Status,
    Reset,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    All,
    One(StemKey),
}

impl Command {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        let stem_arg = |idx: usize| -> std::result::Result<StemKey, String> {
            let name = rest.get(idx).ok_or_else(|| "missing stem name".to_string())?;
            name.parse::<StemKey>().map_err(|e| e.to_string())
        };
        let num_arg = |idx: usize| -> std::result::Result<f64, String> {
            let raw = rest.get(idx).ok_or_else(|| "missing value".to_string())?;
            raw.parse::<f64>().map_err(|_| format!("not a number: {raw}"))
        };
        let target_arg = |idx: usize| -> std::result::Result<Target, String> {
            match rest.get(idx) {
                Some(&"all") => Ok(Target::All),
                _ => stem_arg(idx).map(Target::One),
            }
        };

        match verb {
            "play" => Ok(Command::Play(target_arg(0)?)),
            "pause" => Ok(Command::Pause(target_arg(0)?)),
            "seek" => Ok(Command::Seek(stem_arg(0)?, num_arg(1)?)),
            "vol" | "volume" => Ok(Command::Volume(stem_arg(0)?, num_arg(1)? as f32)),
            "mute" => Ok(Command::Mute(stem_arg(0)?)),
            "offset" => {
                let key = stem_arg(0)?;
                if rest.get(1) == Some(&"reset") {
                    Ok(Command::Offset(key, 0.0))
                } else {
                    Ok(Command::Offset(key, num_arg(1)?))
                }
            }
            "nudge" => {
                let key = stem_arg(0)?;
                let delta = if rest.len() > 1 { Some(num_arg(1)?) } else { None };
                Ok(Command::Nudge(key, delta))
            }
            "download" | "dl" => Ok(Command::Download(stem_arg(0)?)),
            "status" | "st" => Ok(Command::Status),
            "reset" => Ok(Command::Reset),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("unknown command: {other} (try 'help')")),
        }
    }
}

fn dispatch(session: &mut StemSession, cfg: &PlayerConfig, status: &JobStatus, cmd: Command) {
    match cmd {
        Command::Play(Target::All) => session.play_all(),
        Command::Play(Target::One(key)) => session.play(key),
        Command::Pause(Target::All) => session.pause_all(),
        Command::Pause(Target::One(key)) => session.pause(key),
        Command::Seek(key, t) => session.seek(key, t),
        Command::Volume(key, v) => session.set_volume(key, v),
        Command::Mute(key) => session.toggle_mute(key),
        Command::Offset(key, s) => session.set_offset(key, s),
        Command::Nudge(key, delta) => {
            session.nudge_offset(key, delta.unwrap_or(cfg.nudge_step));
        }
        Command::Download(key) => download_stem(session, cfg, key),
        Command::Status => print_status(session),
        Command::Reset => {
            session.reset_session();
            session.load_job(status);
            println!("session reset");
        }
        Command::Help => print_help(),
        Command::Quit => {}
    }
}

/// Copy the WAV rendition into the downloads directory when it is a
/// local file; otherwise just print the URL for the user to fetch.
fn download_stem(session: &StemSession, cfg: &PlayerConfig, key: StemKey) {
    let Some(url) = session.download_url(key) else {
        println!("{}: not available", key.label());
        return;
    };

    let local = Path::new(url.strip_prefix("file://").unwrap_or(url));
    if !local.is_file() {
        println!("{}: {}", key.label(), url);
        return;
    }

    let dest = cfg.downloads_dir.join(format!("{key}.wav"));
    let result = std::fs::create_dir_all(&cfg.downloads_dir)
        .and_then(|_| std::fs::copy(local, &dest));
    match result {
        Ok(_) => println!("{}: saved to {:?}", key.label(), dest),
        Err(e) => println!("{}: download failed: {}", key.label(), e),
    }
}

fn print_status(session: &StemSession) {
    println!(
        "{:<10} {:>5} {:>9} {:>9} {:>6} {:>7} {:>6}",
        "stem", "state", "position", "duration", "vol", "offset", "muted"
    );
    for view in session.views() {
        if !view.available {
            println!("{:<10} {:>5}", view.key.label(), "-");
            continue;
        }
        let state = if view.is_playing { "play" } else { "stop" };
        let duration = view
            .duration
            .map(format_time)
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<10} {:>5} {:>9} {:>9} {:>6.2} {:>+7.2} {:>6}",
            view.key.label(),
            state,
            format_time(view.position),
            duration,
            view.volume,
            view.offset,
            if view.muted { "yes" } else { "no" }
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  play <stem|all>      start a stem (aligned to running tracks)");
    println!("  pause <stem|all>     pause a stem, keeping its position");
    println!("  seek <stem> <sec>    jump a stem; running tracks follow");
    println!("  vol <stem> <0..1>    set stem volume");
    println!("  mute <stem>          toggle mute");
    println!("  offset <stem> <sec>  set the alignment offset ('reset' for 0)");
    println!("  nudge <stem> [sec]   shift the offset by a step");
    println!("  download <stem>      fetch the WAV rendition");
    println!("  status               show all tracks");
    println!("  reset                release and reload every track");
    println!("  quit                 exit");
    println!("stems: voz baixo bateria guitarra teclado outros");
}

/// "m:ss" display, matching how positions read on a transport strip
fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
