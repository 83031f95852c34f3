//! REPL – Read-Eval-Print Loop for the moskbridge shell.
//!
//! Supported slash-commands:
//!   /help                               – show this list
//!   /connect                            – open the link to the counterpart
//!   /disconnect                         – close it
//!   /update                             – push the host pose to the counterpart
//!   /status                             – one-line session summary
//!   /select <joint> [erase] [toggle]    – select a joint on the counterpart
//!   /sketchable <joint> on|off          – toggle sketchability of a joint
//!   /wireframe on|off                   – toggle the counterpart wireframe
//!   /effector                           – attach an IK effector
//!   /save                               – write the active settings to the config file
//!   /quit | /exit                       – close the session and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::warn;

use moskbridge_middleware::{BridgeHandle, ShellRequest, StatusReceiver};
use moskbridge_types::{Status, StatusLevel};

use crate::config::{self, Config};

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Request(ShellRequest),
    Help,
    Save,
    Quit,
}

/// Parse one line of input.  Errors are user-facing messages.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let command = match head {
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        "/save" if args.is_empty() => Command::Save,
        "/save" => return Err("/save takes no arguments".to_string()),
        "/connect" => no_args(head, &args, ShellRequest::Connect)?,
        "/disconnect" => no_args(head, &args, ShellRequest::Disconnect)?,
        "/update" => no_args(head, &args, ShellRequest::UpdateCounterpart)?,
        "/status" => no_args(head, &args, ShellRequest::Status)?,
        "/effector" => no_args(head, &args, ShellRequest::AttachEffector)?,
        "/select" => {
            let (joint, rest) = args
                .split_first()
                .ok_or("usage: /select <joint> [erase] [toggle]")?;
            if rest.len() > 2 {
                return Err("usage: /select <joint> [erase] [toggle]".to_string());
            }
            let erase_group = rest.first().map(|v| flag(v)).transpose()?.unwrap_or(true);
            let toggle_if_selected = rest.get(1).map(|v| flag(v)).transpose()?.unwrap_or(true);
            Command::Request(ShellRequest::Select {
                joint: joint.to_string(),
                erase_group,
                toggle_if_selected,
            })
        }
        "/sketchable" => match args.as_slice() {
            [joint, value] => Command::Request(ShellRequest::Sketchable {
                joint: joint.to_string(),
                sketchable: flag(value)?,
            }),
            _ => return Err("usage: /sketchable <joint> on|off".to_string()),
        },
        "/wireframe" => match args.as_slice() {
            [value] => Command::Request(ShellRequest::Wireframe(flag(value)?)),
            _ => return Err("usage: /wireframe on|off".to_string()),
        },
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(command)
}

fn no_args(head: &str, args: &[&str], request: ShellRequest) -> Result<Command, String> {
    if args.is_empty() {
        Ok(Command::Request(request))
    } else {
        Err(format!("{head} takes no arguments"))
    }
}

fn flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got '{other}'")),
    }
}

/// Entry point for the interactive REPL.
///
/// Returns when the user quits, stdin closes or the bridge task stops.
pub async fn run(handle: BridgeHandle, cfg: &Config, shutdown: Arc<AtomicBool>) {
    let mut lines = spawn_stdin_reader();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        prompt();

        let line = tokio::select! {
            line = lines.recv() => line,
            _ = handle.closed() => break,
        };
        let line = match line {
            Some(Ok(line)) => line,
            None => break, // EOF
            Some(Err(e)) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        match parse(cmd) {
            Ok(Command::Help) => cmd_help(),
            Ok(Command::Save) => cmd_save(cfg),
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(Command::Request(request)) => {
                if let Err(e) = handle.send(request).await {
                    println!("{}: {}", "Bridge error".red(), e);
                    break;
                }
            }
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Invalid command:".red(),
                e.yellow(),
                "/help".bold()
            ),
        }
    }
}

/// Blocking stdin reads live on their own thread so a pending read never
/// holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Print every status line published on the bus until it closes.
pub async fn print_statuses(mut statuses: StatusReceiver) {
    while let Some(status) = statuses.recv().await {
        println!("\r{}", render_status(&status));
        prompt();
    }
}

fn render_status(status: &Status) -> String {
    let time = status.timestamp.format("%H:%M:%S").to_string().dimmed();
    let text = status.to_string();
    let text = match status.level {
        StatusLevel::Success => text.green(),
        StatusLevel::Error => text.red().bold(),
        StatusLevel::Info => text.normal(),
    };
    format!("  {time} {text}")
}

fn prompt() {
    print!("{} ", "moskbridge>".bold().cyan());
    if let Err(e) = io::stdout().flush() {
        warn!(error = %e, "cannot flush stdout");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "moskbridge Commands".bold().underline());
    println!("  {}                          – open the link to the counterpart", "/connect".bold().cyan());
    println!("  {}                       – close the link", "/disconnect".bold().cyan());
    println!("  {}                           – push the host pose to the counterpart", "/update".bold().cyan());
    println!("  {}                           – session summary", "/status".bold().cyan());
    println!("  {}  – select a joint (flags default to on)", "/select <joint> [erase] [toggle]".bold().cyan());
    println!("  {}        – toggle joint sketchability", "/sketchable <joint> on|off".bold().cyan());
    println!("  {}                – toggle the wireframe", "/wireframe on|off".bold().cyan());
    println!("  {}                         – attach an IK effector", "/effector".bold().cyan());
    println!("  {}                             – write the active settings to the config file", "/save".bold().cyan());
    println!("  {}                     – close the session and exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_save(cfg: &Config) {
    match config::save(cfg) {
        Ok(()) => println!(
            "{} {}",
            "✓ Settings saved to".green(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(line: &str) -> ShellRequest {
        match parse(line) {
            Ok(Command::Request(r)) => r,
            other => panic!("expected a request for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn plain_commands_map_to_requests() {
        assert_eq!(request("/connect"), ShellRequest::Connect);
        assert_eq!(request("/disconnect"), ShellRequest::Disconnect);
        assert_eq!(request("/update"), ShellRequest::UpdateCounterpart);
        assert_eq!(request("/status"), ShellRequest::Status);
        assert_eq!(request("/effector"), ShellRequest::AttachEffector);
        assert_eq!(parse("/help"), Ok(Command::Help));
        assert_eq!(parse("/save"), Ok(Command::Save));
        assert_eq!(parse("/quit"), Ok(Command::Quit));
        assert_eq!(parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn select_defaults_both_flags_on() {
        assert_eq!(
            request("/select Spine1_M"),
            ShellRequest::Select {
                joint: "Spine1_M".to_string(),
                erase_group: true,
                toggle_if_selected: true,
            }
        );
        assert_eq!(
            request("/select Spine1_M off 1"),
            ShellRequest::Select {
                joint: "Spine1_M".to_string(),
                erase_group: false,
                toggle_if_selected: true,
            }
        );
    }

    #[test]
    fn toggles_accept_on_off_spellings() {
        assert_eq!(request("/wireframe on"), ShellRequest::Wireframe(true));
        assert_eq!(request("/wireframe FALSE"), ShellRequest::Wireframe(false));
        assert_eq!(
            request("/sketchable Hip_L no"),
            ShellRequest::Sketchable {
                joint: "Hip_L".to_string(),
                sketchable: false,
            }
        );
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse("/teleport").unwrap_err().contains("/teleport"));
        assert!(parse("/connect now").unwrap_err().contains("no arguments"));
        assert!(parse("/save elsewhere").unwrap_err().contains("no arguments"));
        assert!(parse("/select").unwrap_err().starts_with("usage"));
        assert!(parse("/select a 1 1 1").unwrap_err().starts_with("usage"));
        assert!(parse("/wireframe maybe").unwrap_err().contains("maybe"));
        assert!(parse("/sketchable Hip_L").unwrap_err().starts_with("usage"));
        assert!(parse("   ").is_err());
    }

    #[test]
    fn rendered_status_keeps_level_prefix() {
        colored::control::set_override(false);
        let line = render_status(&Status::error("Mosketch is not connected!"));
        assert!(line.contains("ERROR: Mosketch is not connected!"));
        let line = render_status(&Status::info("mapped 3 host joints out of 4"));
        assert!(line.ends_with("mapped 3 host joints out of 4"));
    }
}
