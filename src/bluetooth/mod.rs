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

//! Bluetooth communication module.
//!
//! Lists bonded devices and drives an SPP (RFCOMM) session with a relay board.

mod adapter;
mod link;
pub mod protocol;
mod selector;
mod session;
mod transport;

pub use adapter::{AdapterError, BluetoothAdapter};
pub use link::LineLink;
pub use protocol::{Command, ProtocolError, RemoteStatus, Request, SPP_UUID};
pub use selector::{DeviceSelector, RemoteDevice};
pub use session::{
    handshake, ConnectError, ConnectResult, DeviceInfo, SessionConfig, SessionError,
    SessionEvent, SessionHandle,
};
pub use transport::{Connector, Transport};

pub use bluer::Address;
