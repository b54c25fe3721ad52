// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session controller.
//!
//! A single actor task owns the link to the board. Callers talk to it through
//! a [`SessionHandle`]; every request is answered exactly once on a oneshot
//! channel, and state changes are broadcast as [`SessionEvent`]s.
//!
//! A connect attempt (open + `?`/`ABOUT`/`STATUS` handshake) runs under one
//! deadline. When it passes, the attempt is dropped, which closes the socket.
//! Requests that arrive during an attempt are still serviced, so a disconnect
//! can cancel it.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bluer::Address;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{error::Elapsed, timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::link::LineLink;
use super::protocol::{self, Command, ProtocolError, RemoteStatus, Request};
use super::transport::{Connector, Transport};
use crate::state::SharedState;

/// What a successful handshake learns about the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Free-text reply to `ABOUT`.
    pub about: String,
    /// Parsed reply to `STATUS`.
    pub status: RemoteStatus,
}

/// Outcome of a connect attempt.
pub type ConnectResult = Result<DeviceInfo, ConnectError>;

/// Why a connect attempt failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unable to connect: {0}")]
    Transport(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by remote")]
    Closed,
    #[error("unexpected handshake reply {0:?}")]
    UnexpectedGreeting(String),
    #[error("malformed status line {0:?}")]
    MalformedStatus(String),
    #[error("connection timed out")]
    Timeout,
    #[error("connection attempt cancelled")]
    Cancelled,
    #[error("another connection attempt is in progress")]
    Busy,
    #[error("session controller stopped")]
    ActorGone,
}

impl From<ProtocolError> for ConnectError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnexpectedGreeting(line) => Self::UnexpectedGreeting(line),
            ProtocolError::MalformedStatus(line) => Self::MalformedStatus(line),
        }
    }
}

/// Failures of requests on an established session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by remote")]
    Closed,
    #[error("request timed out")]
    Timeout,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("session controller stopped")]
    ActorGone,
}

/// Events emitted by the session actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connect attempt started.
    Connecting { address: Address },
    /// Handshake completed.
    Connected { address: Address, info: DeviceInfo },
    /// Connect attempt failed or was cancelled.
    ConnectFailed { address: Address, reason: String },
    /// Established session closed.
    Disconnected { address: Address },
    /// A command could not be written.
    CommandFailed { command: Command, reason: String },
}

/// Session timing.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Deadline for opening the link and completing the handshake.
    pub connect_timeout: Duration,
    /// Deadline for a single command or status refresh.
    pub command_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
        }
    }
}

/// Run the `?` / `ABOUT` / `STATUS` exchange on a fresh link.
pub async fn handshake<S>(link: &mut LineLink<S>) -> ConnectResult
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting = link.request(Request::Ping).await?.ok_or(ConnectError::Closed)?;
    protocol::check_greeting(&greeting)?;

    let about = link.request(Request::About).await?.ok_or(ConnectError::Closed)?;

    let status_line = link.request(Request::Status).await?.ok_or(ConnectError::Closed)?;
    let status = RemoteStatus::parse(&status_line)?;

    Ok(DeviceInfo { about, status })
}

enum SessionRequest {
    Connect {
        address: Address,
        reply: oneshot::Sender<ConnectResult>,
    },
    Send {
        command: Command,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Refresh {
        reply: oneshot::Sender<Result<RemoteStatus, SessionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
    state: Arc<SharedState>,
}

impl SessionHandle {
    /// Spawn the session actor on the current runtime.
    ///
    /// Returns the handle and the receiver for session events. Events are
    /// dropped while the receiver is full, so an undrained receiver never
    /// holds up requests. The actor stops, closing any open link, once every
    /// handle is dropped.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, requests) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(32);
        let state = SharedState::new();

        info!(
            "Session controller started ({} transport, {:?} connect timeout)",
            connector.name(),
            config.connect_timeout
        );

        let actor = SessionActor {
            connector,
            config,
            requests,
            event_tx,
            state: state.clone(),
            session: None,
            disconnect_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());

        (Self { tx, state }, event_rx)
    }

    /// Shared status snapshot.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Connect to `address` and run the handshake.
    ///
    /// An existing session is closed first.
    pub async fn connect(&self, address: Address) -> ConnectResult {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(SessionRequest::Connect { address, reply })
            .await
            .is_err()
        {
            return Err(ConnectError::ActorGone);
        }
        rx.await.unwrap_or(Err(ConnectError::ActorGone))
    }

    /// Write a command. No reply is expected from the board.
    pub async fn send(&self, command: Command) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Send { command, reply })
            .await
            .map_err(|_| SessionError::ActorGone)?;
        rx.await.unwrap_or(Err(SessionError::ActorGone))
    }

    /// Query `STATUS` again on the live session.
    pub async fn refresh(&self) -> Result<RemoteStatus, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Refresh { reply })
            .await
            .map_err(|_| SessionError::ActorGone)?;
        rx.await.unwrap_or(Err(SessionError::ActorGone))
    }

    /// Close the session, or cancel a connect attempt. Idempotent.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(SessionRequest::Disconnect { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

struct ActiveSession {
    address: Address,
    link: LineLink<Box<dyn Transport>>,
    info: DeviceInfo,
}

struct SessionActor {
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    requests: mpsc::Receiver<SessionRequest>,
    event_tx: mpsc::Sender<SessionEvent>,
    state: Arc<SharedState>,
    session: Option<ActiveSession>,
    /// Disconnects received mid-attempt, answered once the attempt is gone.
    disconnect_waiters: Vec<oneshot::Sender<()>>,
}

impl SessionActor {
    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            match request {
                SessionRequest::Connect { address, reply } => {
                    let result = self.connect(address).await;
                    let _ = reply.send(result);
                }
                SessionRequest::Send { command, reply } => {
                    let result = self.send(command).await;
                    let _ = reply.send(result);
                }
                SessionRequest::Refresh { reply } => {
                    let result = self.refresh().await;
                    let _ = reply.send(result);
                }
                SessionRequest::Disconnect { reply } => {
                    self.disconnect().await;
                    let _ = reply.send(());
                }
            }
        }

        self.disconnect().await;
        debug!("Session controller stopped");
    }

    /// Publish an event without waiting on the receiver.
    fn emit(&self, event: SessionEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => debug!("Event queue full, dropping {:?}", event),
            Err(TrySendError::Closed(_)) => {}
        }
    }

    async fn connect(&mut self, address: Address) -> ConnectResult {
        self.disconnect().await;

        info!("Connecting to {}", address);
        self.state.set_connecting(address);
        self.emit(SessionEvent::Connecting { address });

        let deadline = Instant::now() + self.config.connect_timeout;
        let result = self.attempt(address, deadline).await;

        let result = match result {
            Ok((link, info)) => {
                info!("Connected to {}: {} ({})", address, info.about, info.status);
                self.state.set_connected(info.clone());
                self.session = Some(ActiveSession {
                    address,
                    link,
                    info: info.clone(),
                });
                self.emit(SessionEvent::Connected {
                    address,
                    info: info.clone(),
                });
                Ok(info)
            }
            Err(e) => {
                warn!("Unable to connect to {}: {}", address, e);
                self.state.set_disconnected();
                self.emit(SessionEvent::ConnectFailed {
                    address,
                    reason: e.to_string(),
                });
                Err(e)
            }
        };

        for waiter in self.disconnect_waiters.drain(..) {
            let _ = waiter.send(());
        }
        result
    }

    async fn attempt(
        &mut self,
        address: Address,
        deadline: Instant,
    ) -> Result<(LineLink<Box<dyn Transport>>, DeviceInfo), ConnectError> {
        let connector = Arc::clone(&self.connector);
        let stream = self
            .supervise(timeout_at(deadline, connector.connect(address)))
            .await?
            .map_err(|e| ConnectError::Transport(format!("{e:#}")))?;

        self.state.set_handshaking();
        debug!("Link to {} open, starting handshake", address);

        let mut link = LineLink::new(stream);
        let info = self
            .supervise(timeout_at(deadline, handshake(&mut link)))
            .await??;

        Ok((link, info))
    }

    /// Drive one phase of a connect attempt while answering other requests.
    async fn supervise<F, T>(&mut self, phase: F) -> Result<T, ConnectError>
    where
        F: Future<Output = Result<T, Elapsed>>,
    {
        tokio::pin!(phase);

        loop {
            tokio::select! {
                outcome = &mut phase => {
                    return outcome.map_err(|_| ConnectError::Timeout);
                }
                request = self.requests.recv() => match request {
                    Some(SessionRequest::Connect { reply, .. }) => {
                        let _ = reply.send(Err(ConnectError::Busy));
                    }
                    Some(SessionRequest::Send { reply, .. }) => {
                        let _ = reply.send(Err(SessionError::NotConnected));
                    }
                    Some(SessionRequest::Refresh { reply }) => {
                        let _ = reply.send(Err(SessionError::NotConnected));
                    }
                    Some(SessionRequest::Disconnect { reply }) => {
                        info!("Connect attempt cancelled");
                        self.disconnect_waiters.push(reply);
                        return Err(ConnectError::Cancelled);
                    }
                    None => return Err(ConnectError::Cancelled),
                },
            }
        }
    }

    async fn send(&mut self, command: Command) -> Result<(), SessionError> {
        let Some(active) = self.session.as_mut() else {
            debug!("Dropping {} while not connected", command);
            return Err(SessionError::NotConnected);
        };

        let result = match timeout(
            self.config.command_timeout,
            active.link.send(Request::Command(command)),
        )
        .await
        {
            Ok(Ok(())) => {
                command.apply(&mut active.info.status);
                self.state.set_remote_status(active.info.status);
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(_) => Err(SessionError::Timeout),
        };

        if let Err(ref e) = result {
            warn!("Command {} failed: {}", command, e);
            self.emit(SessionEvent::CommandFailed {
                command,
                reason: e.to_string(),
            });
            self.disconnect().await;
        }
        result
    }

    async fn refresh(&mut self) -> Result<RemoteStatus, SessionError> {
        let Some(active) = self.session.as_mut() else {
            return Err(SessionError::NotConnected);
        };

        let result = match timeout(
            self.config.command_timeout,
            active.link.request(Request::Status),
        )
        .await
        {
            Ok(Ok(Some(line))) => RemoteStatus::parse(&line).map_err(SessionError::from),
            Ok(Ok(None)) => Err(SessionError::Closed),
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(_) => Err(SessionError::Timeout),
        };

        match result {
            Ok(status) => {
                active.info.status = status;
                self.state.set_remote_status(status);
                debug!("Status refreshed: {}", status);
                Ok(status)
            }
            Err(e) => {
                // The reply stream is out of step now
                warn!("Status refresh failed: {}", e);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        let Some(mut active) = self.session.take() else {
            debug!("Disconnect requested while not connected");
            return;
        };

        if let Err(e) = active.link.shutdown().await {
            debug!("Ignoring error while closing link: {}", e);
        }
        drop(active.link);

        info!("Disconnected from {}", active.address);
        self.state.set_disconnected();
        self.emit(SessionEvent::Disconnected {
            address: active.address,
        });
    }
}
