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

//! Interactive console commands.

use crate::bluetooth::Command;
use crate::state::{SessionStatus, SharedState};

pub const HELP: &str = "\
Commands:
  connect [DEVICE]   connect (picks a device when none is given)
  disconnect         close the connection
  out [on|off]       switch OUT (toggles without argument)
  leds [on|off]      switch LEDS (toggles without argument)
  status             show the last known state
  refresh            ask the board for its state again
  devices            list paired devices
  help               show this help
  quit               disconnect and exit";

/// Actions typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Connect(Option<String>),
    Disconnect,
    /// `None` toggles.
    Output(Option<bool>),
    /// `None` toggles.
    Leds(Option<bool>),
    Status,
    Refresh,
    Devices,
    Help,
    Quit,
}

impl ConsoleAction {
    /// Parse one input line. Blank lines give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(format!("unexpected argument '{extra}'"));
        }

        let action = match verb.to_lowercase().as_str() {
            "connect" | "c" => Self::Connect(arg.map(str::to_string)),
            "disconnect" | "d" => no_arg(Self::Disconnect, arg)?,
            "out" | "o" => Self::Output(parse_switch(arg)?),
            "leds" | "l" => Self::Leds(parse_switch(arg)?),
            "status" | "s" => no_arg(Self::Status, arg)?,
            "refresh" | "r" => no_arg(Self::Refresh, arg)?,
            "devices" => no_arg(Self::Devices, arg)?,
            "help" | "?" => no_arg(Self::Help, arg)?,
            "quit" | "exit" | "q" => no_arg(Self::Quit, arg)?,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(action))
    }

    /// Board command for a switch action, resolving toggles against `state`.
    pub fn command(&self, state: &SharedState) -> Option<Command> {
        let current = state.get_remote_status().unwrap_or_default();
        match self {
            Self::Output(on) => Some(Command::output(on.unwrap_or(!current.output_on))),
            Self::Leds(on) => Some(Command::leds(on.unwrap_or(!current.leds_on))),
            _ => None,
        }
    }
}

fn no_arg(action: ConsoleAction, arg: Option<&str>) -> Result<ConsoleAction, String> {
    match arg {
        Some(arg) => Err(format!("unexpected argument '{arg}'")),
        None => Ok(action),
    }
}

fn parse_switch(arg: Option<&str>) -> Result<Option<bool>, String> {
    match arg.map(str::to_lowercase).as_deref() {
        None => Ok(None),
        Some("on") | Some("1") => Ok(Some(true)),
        Some("off") | Some("0") => Ok(Some(false)),
        Some(other) => Err(format!("expected 'on' or 'off', got '{other}'")),
    }
}

/// One-line summary of the session.
pub fn status_line(state: &SharedState) -> String {
    match state.get_status() {
        SessionStatus::Connected => match (state.get_device(), state.get_info()) {
            (Some(address), Some(info)) => {
                format!("Connected to {} ({}): {}", info.about, address, info.status)
            }
            _ => SessionStatus::Connected.as_str().to_string(),
        },
        status => status.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::{Address, DeviceInfo, RemoteStatus};

    #[test]
    fn test_parse_actions() {
        assert_eq!(ConsoleAction::parse("   "), Ok(None));
        assert_eq!(
            ConsoleAction::parse("out on"),
            Ok(Some(ConsoleAction::Output(Some(true))))
        );
        assert_eq!(
            ConsoleAction::parse("LEDS off"),
            Ok(Some(ConsoleAction::Leds(Some(false))))
        );
        assert_eq!(
            ConsoleAction::parse("o"),
            Ok(Some(ConsoleAction::Output(None)))
        );
        assert_eq!(
            ConsoleAction::parse("connect 00:13:EF:12:34:56"),
            Ok(Some(ConsoleAction::Connect(Some(
                "00:13:EF:12:34:56".to_string()
            ))))
        );
        assert_eq!(
            ConsoleAction::parse("connect"),
            Ok(Some(ConsoleAction::Connect(None)))
        );
        assert_eq!(ConsoleAction::parse("q"), Ok(Some(ConsoleAction::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ConsoleAction::parse("out maybe").is_err());
        assert!(ConsoleAction::parse("status now").is_err());
        assert!(ConsoleAction::parse("leds on please").is_err());
        assert!(ConsoleAction::parse("reboot").is_err());
    }

    #[test]
    fn test_toggle_uses_known_state() {
        let state = SharedState::new();
        let toggle = ConsoleAction::Output(None);

        // Nothing known yet: toggling means switching on
        assert_eq!(toggle.command(&state), Some(Command::OutOn));

        state.set_connecting(Address::new([1, 2, 3, 4, 5, 6]));
        state.set_connected(DeviceInfo {
            about: "Relay board v1".to_string(),
            status: RemoteStatus {
                output_on: true,
                leds_on: false,
            },
        });
        assert_eq!(toggle.command(&state), Some(Command::OutOff));
        assert_eq!(
            ConsoleAction::Leds(None).command(&state),
            Some(Command::LedsOn)
        );
        assert_eq!(
            ConsoleAction::Leds(Some(false)).command(&state),
            Some(Command::LedsOff)
        );
        assert_eq!(ConsoleAction::Status.command(&state), None);
    }

    #[test]
    fn test_status_line() {
        let state = SharedState::new();
        assert_eq!(status_line(&state), "Disconnected");

        state.set_connecting(Address::new([0x00, 0x13, 0xEF, 0x12, 0x34, 0x56]));
        assert_eq!(status_line(&state), "Connecting...");

        state.set_connected(DeviceInfo {
            about: "Relay board v1".to_string(),
            status: RemoteStatus {
                output_on: false,
                leds_on: true,
            },
        });
        assert_eq!(
            status_line(&state),
            "Connected to Relay board v1 (00:13:EF:12:34:56): OUT OFF, LEDS ON"
        );
    }
}
