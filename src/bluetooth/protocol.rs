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

//! Line protocol spoken by the relay board.
//!
//! Every message is a single ASCII line terminated by `\n`. The host drives
//! the conversation; the board only answers `?`, `ABOUT` and `STATUS`.

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Expected answer to [`Request::Ping`].
pub const GREETING_REPLY: &str = "!";

/// Errors raised while decoding a reply line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unexpected greeting: {0:?}")]
    UnexpectedGreeting(String),
    #[error("malformed status line: {0:?}")]
    MalformedStatus(String),
}

/// Requests the host sends to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// `?`, answered with `!`.
    Ping,
    /// `ABOUT`, answered with a free-text description.
    About,
    /// `STATUS`, answered with `<OUT>|<LEDS>`.
    Status,
    /// One-way output command, never answered.
    Command(Command),
}

impl Request {
    /// Wire keyword without the line terminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "?",
            Self::About => "ABOUT",
            Self::Status => "STATUS",
            Self::Command(cmd) => cmd.as_str(),
        }
    }

    /// Encode as a newline-terminated line.
    pub fn encode(&self) -> String {
        format!("{}\n", self.as_str())
    }
}

/// Output commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    OutOn,
    OutOff,
    LedsOn,
    LedsOff,
}

impl Command {
    /// Command that drives the OUT relay to `on`.
    pub fn output(on: bool) -> Self {
        if on {
            Self::OutOn
        } else {
            Self::OutOff
        }
    }

    /// Command that drives the LEDs to `on`.
    pub fn leds(on: bool) -> Self {
        if on {
            Self::LedsOn
        } else {
            Self::LedsOff
        }
    }

    /// Parse from string. Accepts the wire form and the kebab-case CLI form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "OUT_ON" => Some(Self::OutOn),
            "OUT_OFF" => Some(Self::OutOff),
            "LEDS_ON" => Some(Self::LedsOn),
            "LEDS_OFF" => Some(Self::LedsOff),
            _ => None,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOn => "OUT_ON",
            Self::OutOff => "OUT_OFF",
            Self::LedsOn => "LEDS_ON",
            Self::LedsOff => "LEDS_OFF",
        }
    }

    /// Apply the expected effect of this command to a known status.
    pub fn apply(&self, status: &mut RemoteStatus) {
        match self {
            Self::OutOn => status.output_on = true,
            Self::OutOff => status.output_on = false,
            Self::LedsOn => status.leds_on = true,
            Self::LedsOff => status.leds_on = false,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the two board outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStatus {
    pub output_on: bool,
    pub leds_on: bool,
}

impl RemoteStatus {
    /// Parse a `STATUS` reply.
    ///
    /// Exactly two `|`-separated tokens, each `ON` or `OFF`.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedStatus(line.to_string());

        let mut tokens = line.split('|');
        let output_on = tokens.next().and_then(parse_switch).ok_or_else(malformed)?;
        let leds_on = tokens.next().and_then(parse_switch).ok_or_else(malformed)?;
        if tokens.next().is_some() {
            return Err(malformed());
        }

        Ok(Self { output_on, leds_on })
    }

    /// Encode in the board's `STATUS` reply format.
    pub fn encode(&self) -> String {
        format!("{}|{}", switch_str(self.output_on), switch_str(self.leds_on))
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OUT {}, LEDS {}",
            switch_str(self.output_on),
            switch_str(self.leds_on)
        )
    }
}

fn parse_switch(token: &str) -> Option<bool> {
    match token {
        "ON" => Some(true),
        "OFF" => Some(false),
        _ => None,
    }
}

fn switch_str(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

/// Check the reply to [`Request::Ping`].
pub fn check_greeting(line: &str) -> Result<(), ProtocolError> {
    if line == GREETING_REPLY {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedGreeting(line.to_string()))
    }
}

/// Strip the line terminator from a received line.
pub fn trim_line(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encoding() {
        assert_eq!(Request::Ping.encode(), "?\n");
        assert_eq!(Request::About.encode(), "ABOUT\n");
        assert_eq!(Request::Status.encode(), "STATUS\n");
        assert_eq!(Request::Command(Command::LedsOff).encode(), "LEDS_OFF\n");
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::parse("OUT_ON"), Some(Command::OutOn));
        assert_eq!(Command::parse("out-off"), Some(Command::OutOff));
        assert_eq!(Command::parse(" leds_on "), Some(Command::LedsOn));
        assert_eq!(Command::parse("LEDS"), None);
        assert_eq!(Command::output(false), Command::OutOff);
        assert_eq!(Command::leds(true), Command::LedsOn);
    }

    #[test]
    fn test_command_apply() {
        let mut status = RemoteStatus::default();
        Command::OutOn.apply(&mut status);
        Command::LedsOn.apply(&mut status);
        Command::OutOff.apply(&mut status);
        assert_eq!(
            status,
            RemoteStatus {
                output_on: false,
                leds_on: true
            }
        );
    }

    #[test]
    fn test_status_all_combinations() {
        for (line, output_on, leds_on) in [
            ("ON|ON", true, true),
            ("ON|OFF", true, false),
            ("OFF|ON", false, true),
            ("OFF|OFF", false, false),
        ] {
            let status = RemoteStatus::parse(line).unwrap();
            assert_eq!(status, RemoteStatus { output_on, leds_on });
            assert_eq!(status.encode(), line);
        }
    }

    #[test]
    fn test_status_rejects_malformed() {
        for line in ["", "ON", "ON|", "|OFF", "ON|OFF|ON", "on|off", "ON |OFF", "ON,OFF", "1|0"] {
            assert_eq!(
                RemoteStatus::parse(line),
                Err(ProtocolError::MalformedStatus(line.to_string())),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_greeting() {
        assert!(check_greeting("!").is_ok());
        assert!(matches!(
            check_greeting("!!"),
            Err(ProtocolError::UnexpectedGreeting(_))
        ));
        assert!(check_greeting("").is_err());
    }

    #[test]
    fn test_trim_line() {
        assert_eq!(trim_line("!\n"), "!");
        assert_eq!(trim_line("!\r\n"), "!");
        assert_eq!(trim_line("Relay board v1"), "Relay board v1");
        assert_eq!(trim_line("\n"), "");
    }
}
