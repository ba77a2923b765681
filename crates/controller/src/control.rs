// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the step runner's control server.
//!
//! The runner inside the execution pod listens on a fixed port and accepts
//! `POST /pause` and `POST /resume`. Only `204 No Content` counts as success.
//! Responses are read with Content-Length framing.

use crate::env;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("control request timed out")]
    Timeout,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Io(String),
    #[error("unexpected response {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for one execution pod's control server.
#[derive(Debug, Clone)]
pub struct ControlClient {
    pub port: u16,
    pub timeout: Duration,
}

impl Default for ControlClient {
    fn default() -> Self {
        Self { port: env::control_port(), timeout: env::control_timeout() }
    }
}

impl ControlClient {
    twc_core::setters! {
        set {
            port: u16,
            timeout: Duration,
        }
    }

    pub async fn pause(&self, ip: &str) -> Result<(), ControlError> {
        self.post(ip, "/pause").await
    }

    pub async fn resume(&self, ip: &str) -> Result<(), ControlError> {
        self.post(ip, "/resume").await
    }

    /// The timeout covers connect, write and read.
    async fn post(&self, ip: &str, path: &str) -> Result<(), ControlError> {
        tracing::debug!(ip, port = self.port, path, "control request");
        let (status, body) = tokio::time::timeout(self.timeout, self.send(ip, path))
            .await
            .map_err(|_| ControlError::Timeout)??;
        if status != 204 {
            return Err(ControlError::Status { status, body: body.trim().to_string() });
        }
        Ok(())
    }

    async fn send(&self, ip: &str, path: &str) -> Result<(u16, String), ControlError> {
        let mut stream = TcpStream::connect((ip, self.port))
            .await
            .map_err(|e| ControlError::Connect(e.to_string()))?;
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: {}:{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            path, ip, self.port
        );
        stream.write_all(request.as_bytes()).await.map_err(|e| ControlError::Io(format!("write failed: {}", e)))?;
        let mut reader = BufReader::new(&mut stream);
        read_response(&mut reader).await
    }
}

/// Read the status code and body of an HTTP/1.1 response.
async fn read_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<(u16, String), ControlError> {
    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .await
        .map_err(|e| ControlError::Io(format!("read status failed: {}", e)))?;
    let status = status_line.split_whitespace().nth(1).and_then(|s| s.parse::<u16>().ok()).unwrap_or(0);

    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| ControlError::Io(format!("read header failed: {}", e)))?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        if let Some(val) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await.map_err(|e| ControlError::Io(format!("read body failed: {}", e)))?;
    }
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
