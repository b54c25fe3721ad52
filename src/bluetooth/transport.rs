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

//! Transport abstraction between the session and the RFCOMM socket.

use anyhow::Result;
use async_trait::async_trait;
use bluer::Address;
use tokio::io::{AsyncRead, AsyncWrite};

/// A connected byte stream.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Opens streams to remote devices.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a stream to the SPP service of `address`.
    async fn connect(&self, address: Address) -> Result<Box<dyn Transport>>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
