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

//! Choosing a bonded device to connect to.

use bluer::Address;
use std::fmt;

/// A bonded Bluetooth device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    pub address: Address,
    pub name: String,
}

impl fmt::Display for RemoteDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Picks one device out of the bonded set.
#[derive(Debug, Clone, Default)]
pub struct DeviceSelector {
    devices: Vec<RemoteDevice>,
}

impl DeviceSelector {
    pub fn new(devices: Vec<RemoteDevice>) -> Self {
        Self { devices }
    }

    /// Devices in the order they were reported.
    pub fn list(&self) -> &[RemoteDevice] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Resolve a user choice to an address.
    ///
    /// `choice` is a 1-based list index, a device address (any case) or an
    /// exact device name. Blank input means no choice.
    pub fn select(&self, choice: &str) -> Option<Address> {
        let choice = choice.trim();
        if choice.is_empty() {
            return None;
        }

        if let Ok(index) = choice.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| self.devices.get(i))
                .map(|d| d.address);
        }

        if let Ok(address) = choice.to_uppercase().parse::<Address>() {
            return self
                .devices
                .iter()
                .find(|d| d.address == address)
                .map(|d| d.address);
        }

        self.devices
            .iter()
            .find(|d| d.name == choice)
            .map(|d| d.address)
    }

    /// 1-based position of `address` in the list.
    pub fn position(&self, address: Address) -> Option<usize> {
        self.devices
            .iter()
            .position(|d| d.address == address)
            .map(|i| i + 1)
    }
}
