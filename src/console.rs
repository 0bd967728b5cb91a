//! Line-oriented operator console for the debug host.

use tokio::io::{AsyncBufReadExt, BufReader};

use mvi_devtools::protocol::{DebugCommand, EventKind};
use mvi_devtools::server::ServerHandle;
use mvi_devtools::shutdown::ShutdownSignal;

#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Logs {
        target: Option<String>,
        kinds: Vec<EventKind>,
    },
    States,
    History,
    Suggestions,
    Apps,
    Set {
        target: String,
        index: u64,
    },
    Inject {
        target: String,
        payload: String,
    },
    Clear,
    Quit,
    Help,
}

pub fn parse(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };

    match verb {
        "logs" => {
            let mut target = None;
            let mut kinds = Vec::new();
            for word in words {
                match parse_kind(word) {
                    Some(kind) => kinds.push(kind),
                    None => target = Some(word.to_string()),
                }
            }
            Ok(ConsoleCommand::Logs { target, kinds })
        }
        "states" => Ok(ConsoleCommand::States),
        "history" => Ok(ConsoleCommand::History),
        "suggestions" => Ok(ConsoleCommand::Suggestions),
        "apps" => Ok(ConsoleCommand::Apps),
        "set" => {
            let target = words.next().ok_or("usage: set <target> <index>")?;
            let index = words
                .next()
                .and_then(|w| w.parse().ok())
                .ok_or("usage: set <target> <index>")?;
            Ok(ConsoleCommand::Set {
                target: target.to_string(),
                index,
            })
        }
        "inject" => {
            let target = words.next().ok_or("usage: inject <target> <payload>")?;
            let payload = words.collect::<Vec<_>>().join(" ");
            if payload.is_empty() {
                return Err("usage: inject <target> <payload>".to_string());
            }
            Ok(ConsoleCommand::Inject {
                target: target.to_string(),
                payload,
            })
        }
        "clear" => Ok(ConsoleCommand::Clear),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "help" => Ok(ConsoleCommand::Help),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

fn parse_kind(word: &str) -> Option<EventKind> {
    match word.to_ascii_uppercase().as_str() {
        "ACTION" => Some(EventKind::Action),
        "STATE_CHANGE" => Some(EventKind::StateChange),
        "EFFECT" => Some(EventKind::Effect),
        "ERROR" => Some(EventKind::Error),
        "NETWORK" => Some(EventKind::Network),
        _ => None,
    }
}

const HELP: &str = "\
logs [target] [KIND...]   show buffered events
states                    latest state per target
history                   numbered state history
suggestions               known action shapes per target
apps                      connected applications
set <target> <index>      restore a historical state
inject <target> <payload> inject an action
clear                     drop all buffered data
quit                      stop the host";

/// Reads commands from stdin until EOF, `quit` or shutdown.
pub async fn run(handle: ServerHandle, shutdown: ShutdownSignal) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let stopped = shutdown.wait();
    tokio::pin!(stopped);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = &mut stopped => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "console input failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Ok(ConsoleCommand::Quit) => {
                shutdown.signal();
                break;
            }
            Ok(command) => execute(&handle, command),
            Err(message) => println!("{message}"),
        }
    }
}

fn execute(handle: &ServerHandle, command: ConsoleCommand) {
    let store = handle.store();
    match command {
        ConsoleCommand::Logs { target, kinds } => {
            for event in store.filter_logs(target.as_deref(), &kinds) {
                println!(
                    "{} {:<12} {:<20} {}",
                    event.timestamp,
                    event.kind.as_str(),
                    event.target,
                    event.payload
                );
            }
        }
        ConsoleCommand::States => {
            let mut states: Vec<_> = store.snapshot_latest_states().into_iter().collect();
            states.sort();
            for (target, state) in states {
                println!("{target:<20} {state}");
            }
        }
        ConsoleCommand::History => {
            for snapshot in store.snapshot_history() {
                println!(
                    "#{:<5} {:<20} {}",
                    snapshot.index, snapshot.item.target, snapshot.item.payload
                );
            }
        }
        ConsoleCommand::Suggestions => {
            let mut targets: Vec<_> = store.snapshot_suggestions().into_iter().collect();
            targets.sort_by(|a, b| a.0.cmp(&b.0));
            for (target, actions) in targets {
                let mut tags: Vec<_> = actions.into_keys().collect();
                tags.sort();
                println!("{target:<20} {}", tags.join(", "));
            }
        }
        ConsoleCommand::Apps => {
            println!("{}", handle.connected_apps().join(", "));
        }
        ConsoleCommand::Set { target, index } => {
            let sent = handle.send_command(&DebugCommand::set_state(target, index));
            println!("sent to {sent} client(s)");
        }
        ConsoleCommand::Inject { target, payload } => {
            let sent = handle.send_command(&DebugCommand::inject_action(target, payload));
            println!("sent to {sent} client(s)");
        }
        ConsoleCommand::Clear => store.clear(),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_and_inject() {
        assert_eq!(
            parse("set CartViewModel 2"),
            Ok(ConsoleCommand::Set {
                target: "CartViewModel".to_string(),
                index: 2
            })
        );
        assert_eq!(
            parse("inject CartViewModel AddItem(id=1)"),
            Ok(ConsoleCommand::Inject {
                target: "CartViewModel".to_string(),
                payload: "AddItem(id=1)".to_string()
            })
        );
    }

    #[test]
    fn logs_split_target_and_kinds() {
        assert_eq!(
            parse("logs Cart action error"),
            Ok(ConsoleCommand::Logs {
                target: Some("Cart".to_string()),
                kinds: vec![EventKind::Action, EventKind::Error],
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("set Cart two").is_err());
        assert!(parse("inject Cart").is_err());
        assert!(parse("launch").is_err());
    }
}
