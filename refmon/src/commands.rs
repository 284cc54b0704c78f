//! Operator commands read line-by-line from stdin.
//!
//! Key bindings:
//!   c        recheck the selected problem
//!   R        regenerate the selected problem's reference
//!   v        open the selected problem's diff image
//!   r        toggle reference-generation mode
//!   g        toggle graph comparison
//!   p        pause / resume
//!   s        stop the sweep / start one
//!   q        quit after the current job
//!   <number> select a problem by index

use std::io::BufRead;

use tokio::sync::mpsc;

use refmon_core::OperatorCommand;

fn parse(line: &str) -> Option<OperatorCommand> {
    match line.trim() {
        "" => None,
        "c" => Some(OperatorCommand::Recheck),
        "R" => Some(OperatorCommand::RegenerateReference),
        "v" => Some(OperatorCommand::ViewDiff),
        "r" => Some(OperatorCommand::ToggleReferenceMode),
        "g" => Some(OperatorCommand::ToggleGraphs),
        "p" => Some(OperatorCommand::PauseResume),
        "s" => Some(OperatorCommand::StopStart),
        "q" => Some(OperatorCommand::Quit),
        other => match other.parse::<usize>() {
            Ok(index) => Some(OperatorCommand::Select(index)),
            Err(_) => {
                tracing::warn!(input = other, "unknown command");
                None
            }
        },
    }
}

/// Spawn the blocking stdin reader. The task ends when stdin closes; the
/// monitor itself keeps running.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<OperatorCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse(&line) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    });
    rx
}
