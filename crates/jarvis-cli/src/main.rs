//! `jarvis-cli` – Jarvis Command Line Interface
//!
//! This binary drives the adaptive recall engine end to end.  It:
//!
//! 1. Checks for `~/.jarvis/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Opens the local knowledge store and probes the remote memory service.
//! 3. Drops the user into an **interactive REPL**: plain lines are
//!    utterances, slash-commands manage teaching, feedback and login.
//! 4. Intercepts **Ctrl-C** to stop the REPL cleanly.

mod config;
mod probe;
mod repl;
mod responder;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use tracing::warn;

fn main() {
    // Logs go to stderr; user-facing output uses println!.
    let _telemetry = jarvis_runtime::init_tracing("jarvis");

    let session_id = uuid::Uuid::new_v4();
    let _session_span = tracing::info_span!("session", id = %session_id).entered();

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(_)) => println!(
            "  Config loaded from {}",
            config::config_path().display().to_string().bold()
        ),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
        }
    }
    let (stored, cfg) = config::load_layered();

    // ── Remote probe ──────────────────────────────────────────────────────
    print!("\n  Probing remote memory at {} … ", cfg.api_url.dimmed());
    let signed_in = !cfg.auth_token.is_empty();
    let token = signed_in.then_some(cfg.auth_token.as_str());
    let mut token_rejected = false;
    match probe::probe(&cfg.api_url, token) {
        probe::ProbeOutcome::Online if signed_in => println!("{}", "online, signed in".green()),
        probe::ProbeOutcome::Unauthorized if signed_in => {
            println!("{}", "online".green());
            println!(
                "  {}  Use {} to sign in again.",
                "Stored token was rejected; running anonymously.".yellow(),
                "/login <token>".bold()
            );
            token_rejected = true;
        }
        probe::ProbeOutcome::Online | probe::ProbeOutcome::Unauthorized => {
            println!("{}", "online".green());
            println!(
                "  {}  Use {} to enable remote memory.",
                "Running anonymously.".dimmed(),
                "/login <token>".bold()
            );
        }
        probe::ProbeOutcome::Offline(_) => {
            println!("{}", "offline".yellow());
            println!("  {}", "Answers come from local memory only.".dimmed());
        }
    }

    // ── Session ───────────────────────────────────────────────────────────
    let mut session = match repl::Session::new(stored, cfg) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}: {}", "Startup failed".red().bold(), e);
            std::process::exit(1);
        }
    };
    if token_rejected && let Err(e) = session.forget_credential() {
        warn!(error = %e, "failed to persist cleared credential");
    }
    println!(
        "  Memory file: {}",
        session.config().memory_path.display().to_string().dimmed()
    );

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(shutdown, session);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       Jarvis First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Jarvis.\n");

    let mut cfg = config::Config::default();

    cfg.api_url = repl::prompt_str(
        &format!("  Remote memory URL [{}]: ", cfg.api_url),
        &cfg.api_url,
    );

    let bounded = repl::prompt_str("  Cap local memory growth? (y/N): ", "n");
    if bounded.eq_ignore_ascii_case("y") {
        cfg.max_pattern_words = Some(5_000);
        cfg.max_conversations = Some(1_000);
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"       __                  _      "#.bold().cyan());
    println!("{}", r#"      / /___ _______   __(_)____ "#.bold().cyan());
    println!("{}", r#" __  / / __ `/ ___/ | / / / ___/ "#.bold().cyan());
    println!("{}", r#"/ /_/ / /_/ / /   | |/ / (__  )  "#.bold().cyan());
    println!("{}", r#"\____/\__,_/_/    |___/_/____/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Jarvis".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Adaptive voice-assistant memory");
    println!();
}
