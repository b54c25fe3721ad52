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

//! BlueZ adapter access and RFCOMM client connections.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::rfcomm::{ConnectRequest, Profile, ProfileHandle, Role, SocketAddr, Stream};
use bluer::{Address, Session};
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::protocol::SPP_UUID;
use super::selector::RemoteDevice;
use super::transport::{Connector, Transport};

/// Adapter-level failures.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No usable adapter (bluetoothd not running or no controller).
    #[error("Bluetooth is not available: {0}")]
    Unavailable(String),
    /// The adapter exists but is switched off.
    #[error("Bluetooth adapter {0} is powered off")]
    PoweredOff(String),
    #[error(transparent)]
    Bluetooth(#[from] bluer::Error),
}

/// The default local Bluetooth adapter.
pub struct BluetoothAdapter {
    session: Session,
    adapter: bluer::Adapter,
    rfcomm_channel: Option<u8>,
    profile: Mutex<Option<ProfileHandle>>,
}

impl BluetoothAdapter {
    /// Open the default adapter.
    ///
    /// With `rfcomm_channel` set, connections go straight to that channel
    /// instead of letting BlueZ resolve the SPP service record.
    pub async fn open(rfcomm_channel: Option<u8>) -> Result<Self, AdapterError> {
        let session = Session::new()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        debug!("BlueZ session created");

        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self {
            session,
            adapter,
            rfcomm_channel,
            profile: Mutex::new(None),
        })
    }

    /// Fail with [`AdapterError::PoweredOff`] unless the adapter is on.
    pub async fn ensure_powered(&self) -> Result<(), AdapterError> {
        if self.adapter.is_powered().await? {
            Ok(())
        } else {
            Err(AdapterError::PoweredOff(self.adapter.name().to_string()))
        }
    }

    /// Switch the adapter on.
    pub async fn power_on(&self) -> Result<(), AdapterError> {
        info!("Powering on Bluetooth adapter...");
        self.adapter.set_powered(true).await?;
        Ok(())
    }

    /// Bonded devices, in the order BlueZ reports them.
    pub async fn bonded_devices(&self) -> Result<Vec<RemoteDevice>, AdapterError> {
        let mut devices = Vec::new();

        for address in self.adapter.device_addresses().await? {
            let device = self.adapter.device(address)?;
            if device.is_paired().await? {
                let name = device
                    .alias()
                    .await
                    .unwrap_or_else(|_| address.to_string());
                debug!("Paired device: {} ({})", name, address);
                devices.push(RemoteDevice { address, name });
            }
        }

        Ok(devices)
    }

    async fn connect_channel(&self, address: Address, channel: u8) -> Result<Stream> {
        debug!("Connecting to {} on RFCOMM channel {}", address, channel);
        let stream = Stream::connect(SocketAddr::new(address, channel)).await?;
        Ok(stream)
    }

    /// Connect through a registered SPP client profile.
    async fn connect_spp(&self, address: Address) -> Result<Stream> {
        let mut profile = self.profile.lock().await;
        if profile.is_none() {
            let handle = self
                .session
                .register_profile(Profile {
                    uuid: SPP_UUID,
                    role: Some(Role::Client),
                    require_authentication: Some(false),
                    require_authorization: Some(false),
                    auto_connect: Some(false),
                    ..Default::default()
                })
                .await?;
            info!("SPP client profile registered (UUID: {})", SPP_UUID);
            *profile = Some(handle);
        }
        let handle = profile
            .as_mut()
            .ok_or_else(|| anyhow!("SPP profile not registered"))?;

        // Requests left over from an abandoned attempt
        while let Some(Some(stale)) = handle.next().now_or_never() {
            warn!("Dropping stale SPP connection from {}", stale.device());
        }

        let device = self.adapter.device(address)?;
        debug!("Connecting to {} via SPP profile", address);

        // BlueZ may hand over the socket before ConnectProfile returns
        let early = tokio::select! {
            request = next_request_for(handle, address) => Some(request?),
            result = device.connect_profile(&SPP_UUID) => {
                result?;
                None
            }
        };
        let request = match early {
            Some(request) => request,
            None => next_request_for(handle, address).await?,
        };

        Ok(request.accept()?)
    }
}

async fn next_request_for(handle: &mut ProfileHandle, address: Address) -> Result<ConnectRequest> {
    while let Some(request) = handle.next().await {
        if request.device() == address {
            return Ok(request);
        }
        warn!("Ignoring SPP connection from unexpected device {}", request.device());
    }
    Err(anyhow!("SPP profile closed before {} connected", address))
}

#[async_trait]
impl Connector for BluetoothAdapter {
    async fn connect(&self, address: Address) -> Result<Box<dyn Transport>> {
        let stream = match self.rfcomm_channel {
            Some(channel) => self.connect_channel(address, channel).await?,
            None => self.connect_spp(address).await?,
        };
        info!("RFCOMM link to {} open", address);
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "RFCOMM"
    }
}
