//! REPL – Read-Eval-Print Loop for the Jarvis interactive shell.
//!
//! Plain lines are utterances and go through the recall pipeline.
//! Supported slash-commands:
//!   /help                         – show this list
//!   /teach <input> => <response>  – teach a reply explicitly
//!   /good | /bad                  – rate the last reply (/bad asks for a correction)
//!   /similar <text>               – stored questions close to <text>
//!   /memory                       – local store statistics
//!   /login <token> | /logout      – manage the remote memory credential
//!   /status                       – probe the remote memory service
//!   /settings                     – edit `~/.jarvis/config.toml`
//!   /quit | /exit                 – exit the CLI

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use jarvis_memory::{KnowledgeStore, StoreOptions};
use jarvis_runtime::{HttpRemoteMemory, RecallCoordinator, RecallPolicy};
use jarvis_types::{Credential, RemoteStatus, Reply, ReplySource};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::probe::{self, ProbeOutcome};
use crate::responder::RuleResponder;

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Help,
    Teach { input: String, response: String },
    Feedback { positive: bool },
    Similar(String),
    Memory,
    Login(String),
    Logout,
    Status,
    Settings,
    Quit,
    /// A slash-command used incorrectly; carries the usage hint.
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "help" => Command::Help,
        "teach" => match arg.split_once("=>") {
            Some((input, response)) if !input.trim().is_empty() && !response.trim().is_empty() => {
                Command::Teach {
                    input: input.trim().to_string(),
                    response: response.trim().to_string(),
                }
            }
            _ => Command::Usage("/teach <input> => <response>"),
        },
        "good" => Command::Feedback { positive: true },
        "bad" => Command::Feedback { positive: false },
        "similar" if !arg.is_empty() => Command::Similar(arg.to_string()),
        "similar" => Command::Usage("/similar <text>"),
        "memory" => Command::Memory,
        "login" if !arg.is_empty() => Command::Login(arg.to_string()),
        "login" => Command::Usage("/login <token>"),
        "logout" => Command::Logout,
        "status" => Command::Status,
        "settings" => Command::Settings,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(format!("/{other}")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one interactive session needs.
///
/// `cfg` is the effective configuration (environment overrides applied);
/// `stored` mirrors the config file and is the only copy written back.
pub struct Session {
    runtime: tokio::runtime::Runtime,
    coordinator: RecallCoordinator,
    cfg: Config,
    stored: Config,
    config_path: PathBuf,
    last_exchange: Option<(String, String)>,
}

impl Session {
    /// Open the local store, build the coordinator and the Tokio runtime.
    pub fn new(stored: Config, cfg: Config) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start async runtime: {e}"))?;

        if let Some(parent) = cfg.memory_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let options = StoreOptions {
            capacity: cfg.capacity(),
            ..StoreOptions::default()
        };
        let store = KnowledgeStore::open_with(&cfg.memory_path, options)
            .map_err(|e| format!("Failed to open memory at {}: {}", cfg.memory_path.display(), e))?;
        info!(path = %cfg.memory_path.display(), entries = store.len(), "local memory opened");

        let coordinator = RecallCoordinator::new(
            Arc::new(Mutex::new(store)),
            Arc::new(HttpRemoteMemory::new(cfg.api_url.clone())),
            Arc::new(RuleResponder),
            cfg.coordinator_config(),
        )
        .with_policy(cfg.policy());

        Ok(Self {
            runtime,
            coordinator,
            cfg,
            stored,
            config_path: config::config_path(),
            last_exchange: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn persist(&self) -> Result<(), String> {
        config::save_to(&self.stored, &self.config_path)
    }

    /// Sign in with `token` and remember it in the config file.
    fn remember_credential(&mut self, token: String) -> Result<(), String> {
        self.coordinator.set_credential(Credential::new(token.as_str()));
        self.stored.auth_token = token.clone();
        self.cfg.auth_token = token;
        self.persist()
    }

    /// Drop the credential from the coordinator and the config file.
    pub fn forget_credential(&mut self) -> Result<(), String> {
        self.coordinator.clear_credential();
        self.cfg.clear_token();
        self.stored.clear_token();
        self.persist()
    }

    /// Apply edited settings.  A field left at its effective value keeps
    /// its stored value, so environment overrides never reach the file.
    fn apply_settings(&mut self, edited: Config) -> Result<(), String> {
        if edited.api_url != self.cfg.api_url {
            self.stored.api_url = edited.api_url.clone();
        }
        if edited.remote_timeout_secs != self.cfg.remote_timeout_secs {
            self.stored.remote_timeout_secs = edited.remote_timeout_secs;
        }
        if edited.memory_path != self.cfg.memory_path {
            self.stored.memory_path = edited.memory_path.clone();
        }
        self.cfg = edited;
        self.persist()
    }
}

fn history_path() -> PathBuf {
    config::jarvis_dir().join("history.txt")
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, mut session: Session) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Line editor unavailable".red(), e);
            return;
        }
    };
    let history = history_path();
    let _ = editor.load_history(&history);

    let prompt = format!("{} ", "jarvis>".bold().cyan());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match parse_command(line) {
            Command::Say(utterance) => cmd_say(&mut session, &utterance),
            Command::Help => cmd_help(),
            Command::Teach { input, response } => cmd_teach(&mut session, &input, &response),
            Command::Feedback { positive } => cmd_feedback(&mut session, positive),
            Command::Similar(text) => cmd_similar(&session, &text),
            Command::Memory => cmd_memory(&session),
            Command::Login(token) => cmd_login(&mut session, token),
            Command::Logout => cmd_logout(&mut session),
            Command::Status => cmd_status(&session),
            Command::Settings => cmd_settings(&mut session),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Usage(hint) => println!("{} {}", "Usage:".yellow(), hint.bold()),
            Command::Unknown(other) => println!(
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "/help".bold()
            ),
        }
    }

    if let Some(dir) = history.parent() {
        let _ = fs::create_dir_all(dir);
    }
    if let Err(e) = editor.save_history(&history) {
        warn!(error = %e, "could not save command history");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_say(session: &mut Session, utterance: &str) {
    let reply = session
        .runtime
        .block_on(session.coordinator.process(utterance));
    print_reply(&reply);
    if reply.auth_expired {
        expire_credential(session);
    }
    session.last_exchange = Some((utterance.to_string(), reply.text));
}

fn print_reply(reply: &Reply) {
    let tag = match reply.source {
        ReplySource::Remote => "remote".blue(),
        ReplySource::Local => "memory".green(),
        ReplySource::Fallback => "rules".dimmed(),
    };
    println!("{} {}", format!("[{tag}]").dimmed(), reply.text.bold());
    if reply.speech != reply.text {
        println!("  {} {}", "🔊".dimmed(), reply.speech.italic());
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Jarvis Commands".bold().underline());
    println!("  {} – teach a reply", "/teach <input> => <response>".bold().cyan());
    println!("  {}                  – rate the last reply", "/good  /bad".bold().cyan());
    println!("  {}              – list similar stored questions", "/similar <text>".bold().cyan());
    println!("  {}                      – local memory statistics", "/memory".bold().cyan());
    println!("  {}      – manage the remote credential", "/login <token>  /logout".bold().cyan());
    println!("  {}                      – probe the remote memory service", "/status".bold().cyan());
    println!("  {}                    – edit ~/.jarvis/config.toml", "/settings".bold().cyan());
    println!("  {}                 – exit the CLI", "/quit  /exit".bold().cyan());
    println!("  Anything else is treated as something you said to Jarvis.");
    println!();
}

fn cmd_teach(session: &mut Session, input: &str, response: &str) {
    let status = session
        .runtime
        .block_on(session.coordinator.manual_teach(input, response));
    println!("{} {} → {}", "✓ Learned".green(), input.bold(), response);
    report_remote_status(session, status, "synced to remote memory");
}

fn cmd_feedback(session: &mut Session, positive: bool) {
    let Some((input, response)) = session.last_exchange.clone() else {
        println!("{}", "Nothing to rate yet; say something first.".yellow());
        return;
    };
    let correction =
        (!positive).then(|| prompt_str("  How should I have responded? ", &response));
    apply_feedback(session, &input, &response, positive, correction.as_deref());
}

/// Rate an exchange remotely when signed in, then act on it locally: a
/// positive rating reinforces the stored answer and a negative one teaches
/// `correction` in its place.
fn apply_feedback(
    session: &mut Session,
    input: &str,
    response: &str,
    positive: bool,
    correction: Option<&str>,
) {
    let status = session
        .runtime
        .block_on(session.coordinator.provide_feedback(input, response, positive));
    if status != RemoteStatus::Skipped {
        report_remote_status(session, status, "feedback recorded");
    }

    if positive {
        let store = session.coordinator.store();
        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
        match store.reinforce(input) {
            Ok(true) => println!("{}", "✓ Answer reinforced in local memory.".green()),
            Ok(false) => println!("  {}", "(answer not in local memory)".dimmed()),
            Err(e) => warn!(error = %e, "failed to persist reinforcement"),
        }
    } else if let Some(better) = correction {
        cmd_teach(session, input, better);
    }
}

fn report_remote_status(session: &mut Session, status: RemoteStatus, ok_message: &str) {
    match status {
        RemoteStatus::Synced => println!("  {}", ok_message.green()),
        RemoteStatus::Skipped => println!("  {}", "(anonymous: kept locally only)".dimmed()),
        RemoteStatus::Unavailable => println!("  {}", "remote memory unavailable".yellow()),
        RemoteStatus::AuthExpired => expire_credential(session),
    }
}

fn expire_credential(session: &mut Session) {
    if let Err(e) = session.forget_credential() {
        warn!(error = %e, "failed to persist cleared credential");
    }
    println!(
        "{} Use {} to sign in again.",
        "⚠  Your session has expired.".yellow().bold(),
        "/login <token>".bold()
    );
}

fn cmd_similar(session: &Session, text: &str) {
    let store = session.coordinator.store();
    let store = store.lock().unwrap_or_else(PoisonError::into_inner);
    let questions = store.find_similar_questions(text);
    if questions.is_empty() {
        println!("{}", "No similar questions stored.".dimmed());
        return;
    }
    let responses = store.suggest_responses(text);
    println!("{}", "Similar questions".bold().underline());
    for (question, response) in questions.iter().zip(responses.iter()) {
        println!("  {} → {}", question.bold(), response);
    }
}

fn cmd_memory(session: &Session) {
    let store = session.coordinator.store();
    let store = store.lock().unwrap_or_else(PoisonError::into_inner);
    let stats = store.stats();
    println!("{}", "Local Memory".bold().underline());
    println!("  Entries        : {}", stats.entries.to_string().yellow());
    println!("  Pattern words  : {}", stats.pattern_words.to_string().yellow());
    println!("  Conversations  : {}", stats.conversations.to_string().yellow());
    let recent = store.conversations().iter().rev().take(5);
    for line in recent {
        println!("    {}", line.dimmed());
    }
}

fn cmd_login(session: &mut Session, token: String) {
    match session.remember_credential(token) {
        Ok(()) => println!("{}", "✓ Signed in; remote memory enabled.".green()),
        Err(e) => println!("{}: {}", "Signed in, but saving config failed".yellow(), e),
    }
}

fn cmd_logout(session: &mut Session) {
    match session.forget_credential() {
        Ok(()) => println!("{}", "✓ Signed out; using local memory only.".green()),
        Err(e) => println!("{}: {}", "Signed out, but saving config failed".yellow(), e),
    }
}

fn cmd_status(session: &Session) {
    let policy = session.coordinator.policy();
    println!("{}", "Status".bold().underline());
    println!(
        "  Mode           : {}",
        match policy {
            RecallPolicy::Authenticated(_) => "remote-first".green(),
            RecallPolicy::Anonymous => "local only".yellow(),
        }
    );
    print!("  Probing {} … ", session.cfg.api_url.dimmed());
    io::stdout().flush().ok();
    let token = policy.credential().map(Credential::expose);
    match probe::probe(&session.cfg.api_url, token) {
        ProbeOutcome::Online => println!("{}", "online".green()),
        ProbeOutcome::Unauthorized => println!("{}", "online (not authorized)".yellow()),
        ProbeOutcome::Offline(reason) => {
            println!("{}", "offline".red());
            println!("  {}", reason.dimmed());
        }
    }
}

fn cmd_settings(session: &mut Session) {
    let mut cfg = session.cfg.clone();

    println!("{}", "Settings Editor".bold().underline());
    cfg.api_url = prompt_str(&format!("  Remote API URL      [{}]: ", cfg.api_url), &cfg.api_url);
    cfg.remote_timeout_secs = prompt_u64(
        &format!("  Remote timeout (s)  [{}]: ", cfg.remote_timeout_secs),
        cfg.remote_timeout_secs,
    );
    let memory = cfg.memory_path.display().to_string();
    cfg.memory_path = PathBuf::from(prompt_str(&format!("  Memory file         [{}]: ", memory), &memory));

    match session.apply_settings(cfg) {
        Ok(()) => println!(
            "{} {} {}",
            "✓ Settings saved to".green(),
            session.config_path.display().to_string().bold(),
            "(takes effect on next start)".dimmed()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_u64(msg: &str, default: u64) -> u64 {
    let raw = prompt_str(msg, &default.to_string());
    match raw.parse::<u64>() {
        Ok(v) => v,
        Err(_) => {
            println!(
                "  {} '{}' is not a number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_an_utterance() {
        assert_eq!(
            parse_command("  what time is it? "),
            Command::Say("what time is it?".to_string())
        );
    }

    #[test]
    fn teach_splits_on_arrow() {
        assert_eq!(
            parse_command("/teach open google => Opening Google"),
            Command::Teach {
                input: "open google".to_string(),
                response: "Opening Google".to_string(),
            }
        );
    }

    #[test]
    fn teach_without_arrow_shows_usage() {
        assert!(matches!(parse_command("/teach open google"), Command::Usage(_)));
        assert!(matches!(parse_command("/teach => only response"), Command::Usage(_)));
    }

    #[test]
    fn feedback_commands() {
        assert_eq!(parse_command("/good"), Command::Feedback { positive: true });
        assert_eq!(parse_command("/bad"), Command::Feedback { positive: false });
    }

    #[test]
    fn argument_commands_require_arguments() {
        assert!(matches!(parse_command("/login"), Command::Usage(_)));
        assert!(matches!(parse_command("/similar"), Command::Usage(_)));
        assert_eq!(parse_command("/login abc"), Command::Login("abc".to_string()));
        assert_eq!(
            parse_command("/similar what time"),
            Command::Similar("what time".to_string())
        );
    }

    #[test]
    fn quit_and_exit_are_aliases() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn unknown_slash_command() {
        assert_eq!(parse_command("/dance"), Command::Unknown("/dance".to_string()));
    }

    fn session_in(dir: &std::path::Path, stored: Config, cfg: Config) -> Session {
        let mut session = Session::new(stored, cfg).expect("session");
        session.config_path = dir.join("config.toml");
        session
    }

    fn anonymous_session(dir: &std::path::Path) -> Session {
        let cfg = Config {
            memory_path: dir.join("memory.db"),
            ..Config::default()
        };
        session_in(dir, cfg.clone(), cfg)
    }

    #[test]
    fn session_learns_anonymously() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut session = anonymous_session(dir.path());
        assert!(!session.coordinator.is_authenticated());

        cmd_say(&mut session, "xyzzy");
        let (input, _) = session.last_exchange.clone().expect("exchange recorded");
        assert_eq!(input, "xyzzy");
        let store = session.coordinator.store();
        assert!(store.lock().unwrap().entry("xyzzy").is_some());
    }

    #[test]
    fn bad_feedback_teaches_correction_without_login() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut session = anonymous_session(dir.path());

        cmd_say(&mut session, "open google");
        let (input, response) = session.last_exchange.clone().expect("exchange recorded");
        apply_feedback(&mut session, &input, &response, false, Some("Opening Google"));

        let store = session.coordinator.store();
        let store = store.lock().unwrap();
        let entry = store.entry("open google").expect("entry");
        assert_eq!(entry.response, "Opening Google");
        // Fallback learn at 0.5, correction relearns at 0.6.
        assert!((entry.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn good_feedback_reinforces_local_answer() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut session = anonymous_session(dir.path());

        cmd_say(&mut session, "xyzzy");
        let (input, response) = session.last_exchange.clone().expect("exchange recorded");
        apply_feedback(&mut session, &input, &response, true, None);

        let store = session.coordinator.store();
        let confidence = store.lock().unwrap().entry("xyzzy").unwrap().confidence;
        assert!((confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn forget_credential_clears_saved_token() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = Config {
            auth_token: "stale-token".to_string(),
            memory_path: dir.path().join("memory.db"),
            ..Config::default()
        };
        let mut session = session_in(dir.path(), cfg.clone(), cfg);
        assert!(session.coordinator.is_authenticated());

        session.forget_credential().expect("persist");

        assert!(!session.coordinator.is_authenticated());
        assert!(session.config().auth_token.is_empty());
        let saved = config::load_stored_from(&dir.path().join("config.toml"))
            .expect("load ok")
            .expect("some");
        assert!(saved.auth_token.is_empty());
    }

    #[test]
    fn settings_do_not_persist_environment_values() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let stored = Config {
            memory_path: dir.path().join("memory.db"),
            ..Config::default()
        };
        let effective = Config {
            api_url: "http://env-host:5000".to_string(),
            auth_token: "env-token".to_string(),
            ..stored.clone()
        };
        let mut session = session_in(dir.path(), stored, effective);

        let mut edited = session.config().clone();
        edited.remote_timeout_secs = 3;
        session.apply_settings(edited).expect("persist");

        let saved = config::load_stored_from(&dir.path().join("config.toml"))
            .expect("load ok")
            .expect("some");
        assert_eq!(saved.remote_timeout_secs, 3);
        assert_eq!(saved.api_url, Config::default().api_url);
        assert!(saved.auth_token.is_empty());
        assert_eq!(session.config().api_url, "http://env-host:5000");
    }

    #[test]
    fn login_writes_typed_token() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut session = anonymous_session(dir.path());

        session.remember_credential("typed-token".to_string()).expect("persist");

        assert!(session.coordinator.is_authenticated());
        let saved = config::load_stored_from(&dir.path().join("config.toml"))
            .expect("load ok")
            .expect("some");
        assert_eq!(saved.auth_token, "typed-token");
    }
}
