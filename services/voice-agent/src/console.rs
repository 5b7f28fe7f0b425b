//! Terminal surface: reads toggle/quit commands from stdin and prints the
//! controller's snapshot as it changes.

use std::io::{self, BufRead};
use std::thread;
use tokio::sync::{mpsc, watch};
use voice_core::{AgentState, Snapshot, Speaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Quit,
}

/// An empty line or `t` toggles the session, `q` quits. Anything else is ignored.
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "t" | "toggle" => Some(Command::Toggle),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

/// Forwards parsed stdin commands from a dedicated thread until stdin closes
/// or the receiver goes away. End of input is reported as `Quit`.
pub fn spawn_command_reader(tx: mpsc::Sender<Command>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("Failed to read from stdin: {}", e);
                        return;
                    }
                };
                match parse_command(&line) {
                    Some(command) => {
                        if tx.blocking_send(command).is_err() {
                            return;
                        }
                    }
                    None => println!(
                        "Unknown command '{}'. Press Enter to toggle, 'q' to quit.",
                        line.trim()
                    ),
                }
            }
            let _ = tx.blocking_send(Command::Quit);
        })
}

fn speaker_label(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::User => "You",
        Speaker::Agent => "Agent",
    }
}

fn state_hint(state: AgentState) -> &'static str {
    match state {
        AgentState::Idle => "press Enter to start",
        AgentState::Listening => "listening, press Enter to stop",
        AgentState::Thinking => "thinking",
        AgentState::Speaking => "speaking",
        AgentState::Error => "press Enter to retry",
    }
}

/// Lines to print when the snapshot moves from `prev` to `next`.
///
/// Messages are printed once, when they become final. A transcript that
/// shrank (a new session) is treated as starting over.
pub fn render_changes(prev: &Snapshot, next: &Snapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if prev.agent_state != next.agent_state {
        lines.push(format!("[{}] {}", next.agent_state, state_hint(next.agent_state)));
    }

    let restarted = next.transcript.len() < prev.transcript.len();
    for (index, message) in next.transcript.iter().enumerate() {
        let was_final = !restarted
            && prev
                .transcript
                .get(index)
                .is_some_and(|old| old.is_final && old.speaker == message.speaker);
        if message.is_final && !was_final && !message.text.trim().is_empty() {
            lines.push(format!("{}: {}", speaker_label(message.speaker), message.text.trim()));
        }
    }

    match &next.error {
        Some(error) if next.error != prev.error => lines.push(format!("Error: {}", error)),
        _ => {}
    }

    lines
}

/// Prints snapshot changes until the controller is dropped.
pub async fn render(mut snapshots: watch::Receiver<Snapshot>) {
    let mut shown = snapshots.borrow_and_update().clone();
    println!("[{}] {}", shown.agent_state, state_hint(shown.agent_state));
    while snapshots.changed().await.is_ok() {
        let next = snapshots.borrow_and_update().clone();
        for line in render_changes(&shown, &next) {
            println!("{}", line);
        }
        shown = next;
    }
}
