//! Landmark sources: hand skeletons from an external pose estimator
//!
//! The estimator prints one JSON object per line:
//!
//! ```text
//! {"width":640,"height":480,"hands":[{"score":0.9,"landmarks":[{"x":0.5,"y":0.4}, ...]}]}
//! {"error":"camera read failed"}
//! {"quit":true}
//! ```
//!
//! When run as a child process it also receives one overlay line per frame
//! on its stdin so it can draw the button and cursors. Overlays are lossy: a
//! renderer that stops reading misses frames but never stalls the loop.

use std::process::Stdio;

use gesturelink_core::{Frame, HandSkeleton, Keypoint};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace};

use crate::config::DetectorConfig;
use crate::overlay::Overlay;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to start detector {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Detector {0} is missing")]
    MissingPipe(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Overlay output closed")]
    OverlayClosed,
}

/// Result of asking a source for the next frame
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Frame { frame: Frame, mirrored: bool },
    /// Acquisition failed for this frame
    Skipped(String),
    Quit,
}

/// Producer of detected hands, one frame at a time
pub trait LandmarkSource {
    /// Block until the next frame, failure, or quit request
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError>;

    /// Hand the renderer what to draw for the last frame
    async fn present(&mut self, _overlay: &Overlay<'_>) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Which detected hands to keep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandFilter {
    pub max_hands: usize,
    pub min_confidence: f32,
}

impl HandFilter {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            max_hands: config.max_hands,
            min_confidence: config.min_confidence,
        }
    }
}

impl Default for HandFilter {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_confidence: 0.7,
        }
    }
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    quit: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    mirrored: bool,
    #[serde(default)]
    hands: Vec<HandMessage>,
}

#[derive(Deserialize)]
struct HandMessage {
    #[serde(default = "default_score")]
    score: f32,
    landmarks: Vec<Keypoint>,
}

fn default_score() -> f32 {
    1.0
}

/// Decode one line of detector output
pub fn parse_line(line: &str, filter: &HandFilter) -> SourceEvent {
    let msg: Message = match serde_json::from_str(line) {
        Ok(msg) => msg,
        Err(e) => return SourceEvent::Skipped(format!("malformed detector output: {}", e)),
    };

    if msg.quit {
        return SourceEvent::Quit;
    }
    if let Some(error) = msg.error {
        return SourceEvent::Skipped(error);
    }

    let (width, height) = match (msg.width, msg.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return SourceEvent::Skipped("frame dimensions missing".to_string()),
    };

    let mut hands = Vec::with_capacity(filter.max_hands);
    for hand in msg.hands {
        if hand.score < filter.min_confidence {
            trace!(score = hand.score, "Dropping low-confidence hand");
            continue;
        }
        if hands.len() == filter.max_hands {
            debug!(max = filter.max_hands, "Dropping extra hand");
            break;
        }
        match HandSkeleton::from_keypoints(&hand.landmarks) {
            Ok(skeleton) => hands.push(skeleton),
            Err(e) => return SourceEvent::Skipped(e.to_string()),
        }
    }

    SourceEvent::Frame {
        frame: Frame::new(width, height, hands),
        mirrored: msg.mirrored,
    }
}

/// Overlay lines queued for the renderer before new ones are dropped
const OVERLAY_QUEUE: usize = 4;

/// Source reading JSON lines from any buffered reader
pub struct JsonLinesSource<R> {
    reader: R,
    filter: HandFilter,
    overlay_tx: Option<mpsc::Sender<Vec<u8>>>,
    line: String,
    // Held so the detector is killed when the source is dropped
    _child: Option<Child>,
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn new(reader: R, filter: HandFilter) -> Self {
        Self {
            reader,
            filter,
            overlay_tx: None,
            line: String::new(),
            _child: None,
        }
    }

    /// Send overlays to `writer`, one JSON line per frame
    ///
    /// Writes happen on a separate task; must be called inside a runtime.
    pub fn with_overlay_output(mut self, writer: impl AsyncWrite + Unpin + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel(OVERLAY_QUEUE);
        tokio::spawn(write_overlays(writer, rx));
        self.overlay_tx = Some(tx);
        self
    }
}

async fn write_overlays<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(line) = rx.recv().await {
        let result = match writer.write_all(&line).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!(error = %e, "Overlay writer stopped");
            return;
        }
    }
}

impl JsonLinesSource<BufReader<tokio::io::Stdin>> {
    /// Read detector output piped into this process
    pub fn stdin(filter: HandFilter) -> Self {
        info!("Reading landmark frames from stdin");
        Self::new(BufReader::new(tokio::io::stdin()), filter)
    }
}

impl JsonLinesSource<BufReader<ChildStdout>> {
    /// Start the detector program and read its stdout
    pub fn spawn(command: &str, config: &DetectorConfig) -> Result<Self, SourceError> {
        let mut child = Command::new(command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SourceError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(SourceError::MissingPipe("stdout"))?;
        let stdin = child.stdin.take().ok_or(SourceError::MissingPipe("stdin"))?;

        info!(command = %command, args = ?config.args, "Detector started");

        let mut source = Self::new(BufReader::new(stdout), HandFilter::from_config(config))
            .with_overlay_output(stdin);
        source._child = Some(child);
        Ok(source)
    }
}

impl<R: AsyncBufRead + Unpin> LandmarkSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                info!("Detector stream ended");
                return Ok(SourceEvent::Quit);
            }

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(parse_line(line, &self.filter));
        }
    }

    async fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), SourceError> {
        let Some(tx) = self.overlay_tx.as_ref() else {
            return Ok(());
        };

        let mut line = serde_json::to_vec(overlay)?;
        line.push(b'\n');

        match tx.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                trace!("Renderer behind, overlay dropped");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                self.overlay_tx = None;
                Err(SourceError::OverlayClosed)
            }
        }
    }
}
