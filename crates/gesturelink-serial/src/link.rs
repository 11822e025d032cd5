//! Async serial link wrapper for the peripheral command protocol

use std::time::Duration;

use gesturelink_core::SerialCommand;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::sleep;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

/// Baud rate expected by the peripheral firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Could not open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },
    #[error("Serial write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Port parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout applied to the port
    pub timeout_ms: u64,
    /// Wait after opening while the peer resets
    pub settle_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 100,
            settle_ms: 2000,
        }
    }
}

/// Platform default port name
pub fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM5"
    } else {
        "/dev/ttyACM0"
    }
}

/// Serial link to the peripheral
///
/// Writes are fire-and-forget: there is no acknowledgement, retry, or flow
/// control beyond what the underlying writer buffers.
pub struct SerialLink<W = SerialStream> {
    writer: W,
    name: String,
    bytes_sent: u64,
}

impl SerialLink<SerialStream> {
    /// Open the port and wait for the peer to finish its reset
    pub async fn open(settings: &SerialSettings) -> Result<Self, LinkError> {
        let stream = tokio_serial::new(settings.port.as_str(), settings.baud_rate)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .open_native_async()
            .map_err(|source| LinkError::Open {
                port: settings.port.clone(),
                source,
            })?;

        info!(
            port = %settings.port,
            baud = settings.baud_rate,
            "Serial port opened"
        );

        if settings.settle_ms > 0 {
            debug!(settle_ms = settings.settle_ms, "Waiting for peer reset");
            sleep(Duration::from_millis(settings.settle_ms)).await;
        }

        Ok(Self::from_writer(stream, settings.port.clone()))
    }
}

impl<W: AsyncWrite + Unpin> SerialLink<W> {
    /// Wrap an already open writer
    pub fn from_writer(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer,
            name: name.into(),
            bytes_sent: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Write one command
    pub async fn send(&mut self, command: SerialCommand) -> Result<(), LinkError> {
        let bytes = command.to_bytes();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        self.bytes_sent += bytes.len() as u64;

        trace!(port = %self.name, command = %command, "Sent command");
        Ok(())
    }

    /// Reset the display and force the auxiliary output off
    ///
    /// Both commands are attempted even if the first write fails.
    pub async fn shutdown(&mut self) {
        for command in [SerialCommand::FingerCount(0), SerialCommand::AuxOff] {
            if let Err(e) = self.send(command).await {
                warn!(port = %self.name, command = %command, error = %e, "Shutdown write failed");
            }
        }

        if let Err(e) = self.writer.shutdown().await {
            debug!(port = %self.name, error = %e, "Closing serial writer failed");
        }

        info!(port = %self.name, bytes = self.bytes_sent, "Serial link closed");
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
