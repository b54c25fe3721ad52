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

//! Session event processing.

use tracing::{debug, error, info};

use crate::bluetooth::SessionEvent;
use crate::config::Config;

/// Turns session events into console output and persisted settings.
pub struct EventProcessor {
    config: Config,
}

impl EventProcessor {
    /// Create a new event processor.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Persisted configuration, including the remembered device.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process a single event.
    pub fn process_event(&mut self, event: &SessionEvent) {
        debug!("Session event: {:?}", event);

        if let SessionEvent::Connected { address, .. } = event {
            if self.config.last_device() != Some(*address) {
                self.config.remember_device(*address);
                match self.config.save() {
                    Ok(()) => info!("Remembered {} as last device", address),
                    Err(e) => error!("Failed to save configuration: {:#}", e),
                }
            }
        }

        println!("{}", Self::message(event));
    }

    /// User-facing text for an event.
    pub fn message(event: &SessionEvent) -> String {
        match event {
            SessionEvent::Connecting { address } => format!("Connecting to {address}..."),
            SessionEvent::Connected { info, .. } => {
                format!("Connected: {} [{}]", info.about, info.status)
            }
            SessionEvent::ConnectFailed { address, reason } => {
                format!("Unable to connect to {address}: {reason}")
            }
            SessionEvent::Disconnected { address } => format!("Disconnected from {address}"),
            SessionEvent::CommandFailed { command, reason } => {
                format!("Command {command} failed: {reason}")
            }
        }
    }
}
