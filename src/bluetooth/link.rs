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

//! Line-oriented framing over a byte stream.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use super::protocol::{self, Request};

/// A stream that exchanges newline-terminated lines.
pub struct LineLink<S> {
    stream: BufReader<S>,
    line_buf: Vec<u8>,
}

impl<S> LineLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            line_buf: Vec::new(),
        }
    }

    /// Write one request line.
    pub async fn send(&mut self, request: Request) -> io::Result<()> {
        debug!("Sending: {}", request.as_str());
        self.stream.write_all(request.encode().as_bytes()).await?;
        self.stream.flush().await
    }

    /// Read one line without its terminator. `None` means the remote closed.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.line_buf.clear();

        if self.stream.read_until(b'\n', &mut self.line_buf).await? == 0 {
            debug!("Connection closed by remote");
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&self.line_buf);
        let line = protocol::trim_line(&text).to_string();
        debug!("Received: {}", line);
        Ok(Some(line))
    }

    /// Send a request and wait for its reply line.
    pub async fn request(&mut self, request: Request) -> io::Result<Option<String>> {
        self.send(request).await?;
        self.read_line().await
    }

    /// Close the write side.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
