//! Interactive console front end — reads lines from stdin, drives the
//! account menu and the chat loop, prints replies to stdout.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin closes, or
//! the user quits. Every prompt goes through one `select!` so shutdown is
//! honoured wherever the console happens to be waiting.

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    auth::CredentialStore,
    history::{TranscriptStore, Turn, TurnKind},
    persona::{self, Persona},
    reply::ReplyProvider,
    session::Session,
};

type StdinLines = Lines<BufReader<Stdin>>;

/// How a chat session ended: back to the menu, or out of the program.
enum SessionEnd {
    Logout,
    Quit,
}

/// Console front end over the stores and the active reply provider.
pub struct Console {
    users: CredentialStore,
    transcripts: TranscriptStore,
    provider: ReplyProvider,
    default_persona: &'static Persona,
    replay: usize,
}

impl Console {
    pub fn new(
        users: CredentialStore,
        transcripts: TranscriptStore,
        provider: ReplyProvider,
        default_persona: &'static Persona,
        replay: usize,
    ) -> Self {
        Self { users, transcripts, provider, default_persona, replay }
    }

    /// Top-level loop: account menu, then one chat session per login.
    ///
    /// Store failures inside the loop are printed and logged, never fatal.
    /// The menu comes back after any single operation fails.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(provider = self.provider.name(), "console started");
        println!("────────────────────────────────────────────");
        println!(" solace — a small companion for heavy days");
        println!(" provider: {}  (Ctrl-C to quit)", self.provider.name());
        println!("────────────────────────────────────────────");

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        loop {
            let Some(choice) = prompt_line(&mut lines, "(l)ogin, (r)egister or (q)uit > ", &shutdown).await
            else {
                break;
            };
            match choice.to_ascii_lowercase().as_str() {
                "l" | "login" => {
                    if let SessionEnd::Quit = self.login_and_chat(&mut lines, &shutdown).await {
                        break;
                    }
                }
                "r" | "register" => self.register(&mut lines, &shutdown).await,
                "q" | "quit" | "/quit" => break,
                "" => continue,
                other => println!("unknown choice '{other}'"),
            }
        }

        println!("take care.");
    }

    async fn register(&mut self, lines: &mut StdinLines, shutdown: &CancellationToken) {
        let Some(username) = prompt_line(lines, "new username: ", shutdown).await else {
            return;
        };
        if username.is_empty() {
            println!("username must not be empty");
            return;
        }
        let Some(pass) = prompt_line(lines, "new password: ", shutdown).await else {
            return;
        };
        if pass.is_empty() {
            println!("password must not be empty");
            return;
        }

        match self.users.register(&username, &pass) {
            Ok(true) => println!("account created — you can log in now"),
            Ok(false) => println!("that username is taken"),
            Err(e) => {
                error!("register for '{username}' failed: {e}");
                println!("could not create the account: {e}");
            }
        }
    }

    async fn login_and_chat(
        &mut self,
        lines: &mut StdinLines,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let Some(username) = prompt_line(lines, "username: ", shutdown).await else {
            return SessionEnd::Quit;
        };
        let Some(pass) = prompt_line(lines, "password: ", shutdown).await else {
            return SessionEnd::Quit;
        };

        // One message for every failure mode. See CredentialStore::authenticate.
        let authenticated = match self.users.authenticate(&username, &pass) {
            Ok(ok) => ok,
            Err(e) => {
                error!("authentication for '{username}' errored: {e}");
                false
            }
        };
        if !authenticated {
            println!("invalid username or password");
            return SessionEnd::Logout;
        }

        let turns = match self.transcripts.compact(&username) {
            Ok(turns) => turns,
            Err(e) => {
                error!("transcript load for '{username}' failed: {e}");
                println!("could not open your conversation history: {e}");
                return SessionEnd::Logout;
            }
        };
        let replay = self.replay.min(turns.len());
        if replay > 0 {
            println!("── picking up where you left off ──");
            for turn in &turns[turns.len() - replay..] {
                print_turn(turn);
            }
        }

        let mut session = Session::start(username, self.default_persona, turns);
        println!(
            "hello {} — persona '{}' is active. /help for commands.",
            session.username(),
            session.persona().id
        );
        self.chat(&mut session, lines, shutdown).await
    }

    async fn chat(
        &mut self,
        session: &mut Session,
        lines: &mut StdinLines,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let prompt = format!("{}> ", session.username());
        loop {
            let Some(input) = prompt_line(lines, &prompt, shutdown).await else {
                return SessionEnd::Quit;
            };
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                match parse_command(&input) {
                    Command::Help => print_help(self.replay),
                    Command::History(n) => {
                        let n = n.unwrap_or(self.replay);
                        if session.turns().is_empty() {
                            println!("no history yet");
                        } else {
                            for turn in session.recent(n) {
                                print_turn(turn);
                            }
                        }
                    }
                    Command::Persona(None) => print_personas(session.persona()),
                    Command::Persona(Some(id)) => match persona::find(id) {
                        Some(p) => {
                            session.set_persona(p);
                            println!("persona set to '{}'", p.id);
                        }
                        None => {
                            println!("unknown persona '{id}' — pick one of:");
                            print_personas(session.persona());
                        }
                    },
                    Command::Logout => {
                        println!("logged out");
                        return SessionEnd::Logout;
                    }
                    Command::Quit => return SessionEnd::Quit,
                    Command::Unknown(cmd) => println!("unknown command '{cmd}' — try /help"),
                }
                continue;
            }

            debug!(user = session.username(), "message received");
            match session.exchange(&self.transcripts, &self.provider, &input).await {
                Ok(reply) => print_turn(&reply),
                Err(e) => {
                    error!("exchange for '{}' failed: {e}", session.username());
                    println!("could not record that exchange: {e}");
                }
            }
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Help,
    History(Option<usize>),
    Persona(Option<&'a str>),
    Logout,
    Quit,
    Unknown(&'a str),
}

/// Parse a `/`-prefixed console command. Anything malformed (unknown verb,
/// trailing junk, non-numeric count) comes back as `Unknown`.
fn parse_command(input: &str) -> Command<'_> {
    let mut parts = input.split_whitespace();
    let head = parts.next().unwrap_or("");
    let arg = parts.next();
    if parts.next().is_some() {
        return Command::Unknown(input);
    }
    match (head, arg) {
        ("/help", None) => Command::Help,
        ("/history", None) => Command::History(None),
        ("/history", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Command::History(Some(n)),
            _ => Command::Unknown(input),
        },
        ("/persona", id) => Command::Persona(id),
        ("/logout", None) => Command::Logout,
        ("/quit", None) | ("/exit", None) => Command::Quit,
        _ => Command::Unknown(input),
    }
}

fn print_help(replay: usize) {
    println!("/help            show this help");
    println!("/history [n]     show the last n turns (default {replay})");
    println!("/persona [id]    list personas, or switch to one");
    println!("/logout          end this session");
    println!("/quit            exit");
}

/// The catalog, with the active persona marked.
fn print_personas(active: &Persona) {
    for p in persona::all() {
        let marker = if p.id == active.id { '*' } else { ' ' };
        println!(" {marker} {:<12} {}", p.id, p.label);
    }
}

fn print_turn(turn: &Turn) {
    match turn.kind {
        TurnKind::Message => println!("[{}] {}: {}", turn.time, turn.sender, turn.text),
        TurnKind::Error => println!("[{}] {} (error): {}", turn.time, turn.sender, turn.text),
    }
}

/// Print `prompt`, then wait for one trimmed line. `None` means stop:
/// shutdown was requested, stdin closed, or reading failed.
async fn prompt_line(lines: &mut StdinLines, prompt: &str, shutdown: &CancellationToken) -> Option<String> {
    print!("{prompt}");
    use std::io::Write as _;
    let _ = std::io::stdout().flush();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            println!();
            info!("shutdown signal received");
            None
        }

        line = lines.next_line() => match line {
            Err(e) => {
                warn!("stdin read error: {e}");
                None
            }
            Ok(None) => {
                info!("stdin closed");
                None
            }
            Ok(Some(input)) => Some(input.trim().to_string()),
        },
    }
}
