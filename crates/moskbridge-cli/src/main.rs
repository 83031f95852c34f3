//! `moskbridge` – terminal shell for the Mosketch bridge.
//!
//! This binary stands in for the host's GUI panel.  It:
//!
//! 1. Loads `~/.moskbridge/config.toml` (defaults when absent) and resolves
//!    the model profile.
//! 2. Loads the simulated host scene named by `scene_path`.
//! 3. Spawns the bridge task and prints every status line it publishes.
//! 4. Drops the user into an **interactive REPL** with slash-commands.
//! 5. Intercepts **Ctrl-C** to close the session cleanly and exit.

mod config;
mod repl;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use moskbridge_middleware::{Bridge, ShellRequest, Session, SessionSettings, StatusBus};
use moskbridge_rig::{HostRig, SimRig};

#[tokio::main]
async fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); MOSKBRIDGE_LOG_FORMAT=json
    // switches to newline-delimited JSON.  Shell output stays on println!.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("MOSKBRIDGE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            println!(
                "  No config at {}, using defaults.",
                config::config_path().display().to_string().dimmed()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let profile = match cfg.resolve_profile() {
        Ok(profile) => profile,
        Err(e) => {
            println!("{}: {}", "Profile error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Host scene ────────────────────────────────────────────────────────
    let rig = match &cfg.scene_path {
        Some(path) => match SimRig::load(path) {
            Ok(rig) => {
                println!(
                    "  Scene {} ({} nodes)",
                    path.display().to_string().bold(),
                    rig.len()
                );
                rig
            }
            Err(e) => {
                println!("{}: {}", "Scene error".red(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            println!(
                "  {}  Set {} or {} to load a host scene.",
                "Empty scene.".yellow(),
                "scene_path".bold(),
                "MOSKBRIDGE_SCENE".bold()
            );
            SimRig::new()
        }
    };

    println!(
        "  Profile {} | counterpart {} | {} space",
        profile.name.bold(),
        cfg.endpoint().bold(),
        cfg.joint_space
    );
    info!(profile = %profile.name, endpoint = %cfg.endpoint(), "starting bridge");

    // ── Bridge task ───────────────────────────────────────────────────────
    let bus = Arc::new(StatusBus::default());
    let printer = tokio::spawn(repl::print_statuses(bus.subscribe()));
    let settings = SessionSettings {
        profile,
        joint_space: cfg.joint_space,
        ambiguity: cfg.ambiguity,
    };
    let session = Session::new(settings, bus);
    let (handle, task) = Bridge::spawn(session, Box::new(rig), cfg.endpoint());

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let ctrlc_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – closing the session …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
        if let Err(e) = ctrlc_handle.try_send(ShellRequest::Shutdown) {
            warn!(error = %e, "cannot deliver shutdown to bridge task");
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(handle.clone(), &cfg, shutdown).await;

    // The task may already be gone after Ctrl-C.
    let _ = handle.send(ShellRequest::Shutdown).await;
    drop(handle);
    let code = match task.await {
        Ok(rig) => {
            info!(nodes = rig.list_nodes(moskbridge_rig::NodeKind::Transform).len(), "bridge stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Bridge task failed".red(), e);
            ExitCode::FAILURE
        }
    };
    printer.abort();
    println!("{}", "  ✓ Session closed.".green());
    code
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "  ┌──────────────────────────────────────┐".bold().cyan());
    println!("{}", "  │   moskbridge · Mosketch live link    │".bold().cyan());
    println!("{}", "  └──────────────────────────────────────┘".bold().cyan());
    println!();
}
