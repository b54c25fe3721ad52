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

//! Session state shared with the front end.

use bluer::Address;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::{DeviceInfo, RemoteStatus};

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "Disconnected",
            SessionStatus::Connecting => "Connecting...",
            SessionStatus::Handshaking => "Handshaking...",
            SessionStatus::Connected => "Connected",
        }
    }

    /// Whether a connect attempt is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Handshaking)
    }
}

/// Snapshot written by the session actor, read by everyone else.
#[derive(Debug)]
pub struct SharedState {
    /// Current session status.
    pub status: RwLock<SessionStatus>,

    /// Device being connected to, or connected.
    pub device: RwLock<Option<Address>>,

    /// Board description and last known outputs.
    pub info: RwLock<Option<DeviceInfo>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            status: RwLock::new(SessionStatus::Disconnected),
            device: RwLock::new(None),
            info: RwLock::new(None),
        }
    }
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connecting(&self, address: Address) {
        *self.status.write() = SessionStatus::Connecting;
        *self.device.write() = Some(address);
        *self.info.write() = None;
    }

    pub fn set_handshaking(&self) {
        *self.status.write() = SessionStatus::Handshaking;
    }

    pub fn set_connected(&self, info: DeviceInfo) {
        *self.status.write() = SessionStatus::Connected;
        *self.info.write() = Some(info);
    }

    pub fn set_disconnected(&self) {
        *self.status.write() = SessionStatus::Disconnected;
        *self.device.write() = None;
        *self.info.write() = None;
    }

    pub fn set_remote_status(&self, status: RemoteStatus) {
        if let Some(info) = self.info.write().as_mut() {
            info.status = status;
        }
    }

    pub fn get_status(&self) -> SessionStatus {
        *self.status.read()
    }

    pub fn is_connected(&self) -> bool {
        self.get_status() == SessionStatus::Connected
    }

    pub fn get_device(&self) -> Option<Address> {
        *self.device.read()
    }

    pub fn get_info(&self) -> Option<DeviceInfo> {
        self.info.read().clone()
    }

    pub fn get_remote_status(&self) -> Option<RemoteStatus> {
        self.info.read().as_ref().map(|info| info.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let state = SharedState::new();
        let address = Address::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(state.get_status(), SessionStatus::Disconnected);

        state.set_connecting(address);
        assert!(state.get_status().is_busy());
        assert_eq!(state.get_device(), Some(address));

        state.set_handshaking();
        assert_eq!(state.get_status(), SessionStatus::Handshaking);

        state.set_connected(DeviceInfo {
            about: "Relay board v1".to_string(),
            status: RemoteStatus::default(),
        });
        assert!(state.is_connected());

        state.set_remote_status(RemoteStatus {
            output_on: true,
            leds_on: false,
        });
        assert_eq!(state.get_remote_status().map(|s| s.output_on), Some(true));

        state.set_disconnected();
        assert!(!state.is_connected());
        assert_eq!(state.get_device(), None);
        assert_eq!(state.get_info(), None);
    }

    #[test]
    fn test_remote_status_ignored_without_session() {
        let state = SharedState::new();
        state.set_remote_status(RemoteStatus {
            output_on: true,
            leds_on: true,
        });
        assert_eq!(state.get_remote_status(), None);
    }
}
