use crate::acquisition::InputEvent;
use crate::config::Config;
use crate::prediction::PredictionClient;
use crate::presenter::{render_notification, render_snapshot};
use crate::session::{Session, SessionCommand, SessionHandle};

use anyhow::Context;
use std::{error::Error, path::PathBuf};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
    sync::broadcast,
};

const HELP: &str = "commands: pick <path> | drop <path> | drag-enter | drag-over | drag-leave | analyze | clear | state | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Pick(PathBuf),
    Drop(PathBuf),
    DragEnter,
    DragOver,
    DragLeave,
    Analyze,
    Clear,
    State,
    Quit,
}

impl ConsoleCommand {
    fn into_session_command(self) -> Option<SessionCommand> {
        match self {
            ConsoleCommand::Pick(path) => Some(SessionCommand::PickPath(path)),
            ConsoleCommand::Drop(path) => Some(SessionCommand::DropPath(path)),
            ConsoleCommand::DragEnter => Some(SessionCommand::Input(InputEvent::DragEnter)),
            ConsoleCommand::DragOver => Some(SessionCommand::Input(InputEvent::DragOver)),
            ConsoleCommand::DragLeave => Some(SessionCommand::Input(InputEvent::DragLeave)),
            ConsoleCommand::Analyze => Some(SessionCommand::Analyze),
            ConsoleCommand::Clear => Some(SessionCommand::Clear),
            ConsoleCommand::State | ConsoleCommand::Quit => None,
        }
    }
}

impl TryFrom<&str> for ConsoleCommand {
    type Error = String;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let line = line.trim();
        let (verb, argument) = match line.split_once(char::is_whitespace) {
            Some((verb, argument)) => (verb, argument.trim()),
            None => (line, ""),
        };

        let path = || {
            if argument.is_empty() {
                Err(format!("`{}` needs a file path", verb))
            } else {
                Ok(PathBuf::from(argument))
            }
        };

        match verb.to_lowercase().as_str() {
            "pick" => Ok(Self::Pick(path()?)),
            "drop" => Ok(Self::Drop(path()?)),
            "drag-enter" => Ok(Self::DragEnter),
            "drag-over" => Ok(Self::DragOver),
            "drag-leave" => Ok(Self::DragLeave),
            "analyze" => Ok(Self::Analyze),
            "clear" => Ok(Self::Clear),
            "state" => Ok(Self::State),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command `{}`. {}", other, HELP)),
        }
    }
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let client = match PredictionClient::new(&config.prediction_service) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to initialize prediction client: {:?}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Using prediction service at {}", client.predict_url());

    let (session, handle) = Session::new(&config.acquisition, &config.workflow, client);

    let (shutdown_tx, _) = broadcast::channel(1);
    let session_handle = tokio::spawn(session.run(shutdown_tx.subscribe()));
    let render_handle = tokio::spawn(render_updates(handle.clone(), shutdown_tx.subscribe()));

    println!("{}", HELP);

    tokio::select! {
        result = read_commands(&handle) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
        }
    }

    let _ = shutdown_tx.send(());
    let _ = session_handle.await;
    let _ = render_handle.await;

    Ok(())
}

async fn read_commands(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read console input")?
    {
        if line.trim().is_empty() {
            continue;
        }
        match ConsoleCommand::try_from(line.as_str()) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::State) => println!("{}", render_snapshot(&handle.snapshot())),
            Ok(command) => {
                if let Some(command) = command.into_session_command() {
                    handle.send(command).context("workflow session stopped")?;
                }
            }
            Err(message) => println!("{}", message),
        }
    }

    Ok(())
}

async fn render_updates(handle: SessionHandle, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut state_rx = handle.subscribe_state();
    let mut notifications = handle.subscribe_notifications();

    println!("{}", render_snapshot(&state_rx.borrow_and_update()));

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state_rx.borrow_and_update().clone();
                println!("{}", render_snapshot(&snapshot));
            }
            notification = notifications.recv() => match notification {
                Ok(notification) => println!("{}", render_notification(&notification)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
