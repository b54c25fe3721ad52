//! Integration tests for the full session flow against a simulated board.

use anyhow::anyhow;
use async_trait::async_trait;
use btswitch::bluetooth::{
    Address, Command, ConnectError, Connector, RemoteStatus, SessionConfig, SessionEvent,
    SessionHandle, Transport,
};
use btswitch::state::SessionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Mutex;

const BOARD: Address = Address([0x00, 0x13, 0xEF, 0x12, 0x34, 0x56]);

/// Relay board firmware: answers the handshake and applies commands.
async fn run_board(stream: DuplexStream, about: &str, mut status: RemoteStatus) {
    let mut stream = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let reply = match line.trim_end() {
            "?" => Some("!".to_string()),
            "ABOUT" => Some(about.to_string()),
            "STATUS" => Some(status.encode()),
            other => {
                if let Some(command) = Command::parse(other) {
                    command.apply(&mut status);
                }
                None
            }
        };

        if let Some(reply) = reply {
            if stream.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                break;
            }
        }
    }
}

/// Hands out one simulated board per connect.
struct SimulatedBoards {
    boards: Mutex<Vec<(String, RemoteStatus)>>,
}

#[async_trait]
impl Connector for SimulatedBoards {
    async fn connect(&self, address: Address) -> anyhow::Result<Box<dyn Transport>> {
        let (about, status) = self
            .boards
            .lock()
            .await
            .pop()
            .ok_or_else(|| anyhow!("page timeout for {}", address))?;

        let (local, remote) = duplex(1024);
        tokio::spawn(async move { run_board(remote, &about, status).await });
        Ok(Box::new(local))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

fn session_with(boards: Vec<(&str, RemoteStatus)>) -> (SessionHandle, tokio::sync::mpsc::Receiver<SessionEvent>) {
    let connector = Arc::new(SimulatedBoards {
        boards: Mutex::new(
            boards
                .into_iter()
                .map(|(about, status)| (about.to_string(), status))
                .collect(),
        ),
    });
    SessionHandle::spawn(
        connector,
        SessionConfig {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
        },
    )
}

#[tokio::test]
async fn test_relay_board_end_to_end() {
    let (session, mut events) = session_with(vec![(
        "Relay board v1",
        RemoteStatus {
            output_on: true,
            leds_on: false,
        },
    )]);

    let info = session.connect(BOARD).await.unwrap();
    assert_eq!(info.about, "Relay board v1");
    assert!(info.status.output_on);
    assert!(!info.status.leds_on);

    // Switch both outputs and read them back from the board
    session.send(Command::OutOff).await.unwrap();
    session.send(Command::LedsOn).await.unwrap();
    let status = session.refresh().await.unwrap();
    assert_eq!(
        status,
        RemoteStatus {
            output_on: false,
            leds_on: true
        }
    );
    assert_eq!(session.state().get_remote_status(), Some(status));

    session.disconnect().await;
    assert_eq!(session.state().get_status(), SessionStatus::Disconnected);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(SessionEvent::Connecting { .. })));
    assert!(matches!(seen.get(1), Some(SessionEvent::Connected { .. })));
    assert!(matches!(
        seen.last(),
        Some(SessionEvent::Disconnected { address }) if *address == BOARD
    ));
}

#[tokio::test]
async fn test_commands_refused_after_disconnect() {
    let (session, _events) = session_with(vec![("Relay board v1", RemoteStatus::default())]);

    session.connect(BOARD).await.unwrap();
    session.disconnect().await;
    session.disconnect().await;

    assert!(session.send(Command::OutOn).await.is_err());
    assert!(session.refresh().await.is_err());
}

#[tokio::test]
async fn test_failed_connect_then_retry() {
    let (session, _events) = session_with(vec![("Relay board v2", RemoteStatus::default())]);

    session.connect(BOARD).await.unwrap();
    session.disconnect().await;

    // No board left to answer
    let err = session.connect(BOARD).await.unwrap_err();
    assert!(matches!(err, ConnectError::Transport(_)));
    assert!(err.to_string().contains("page timeout"));
    assert!(!session.state().is_connected());
}
