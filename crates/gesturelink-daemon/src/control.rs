//! The per-frame control loop
//!
//! One iteration: wait for a frame, mirror it, interpret the hands, write
//! commands, present the overlay, check for quit. Iterations never overlap.
//! On exit the link always receives the reset handshake before it is closed.

use gesturelink_core::{process_frame, ButtonTouchTracker, Frame, LoopState};
use gesturelink_serial::SerialLink;
use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::overlay::Overlay;
use crate::source::{LandmarkSource, SourceError, SourceEvent};

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub skipped: u64,
    pub commands_sent: u64,
    pub write_failures: u64,
}

pub struct ControlLoop<S, W> {
    source: S,
    link: SerialLink<W>,
    tracker: ButtonTouchTracker,
    label: String,
    mirror: bool,
    state: LoopState,
    quit: watch::Receiver<bool>,
    summary: LoopSummary,
}

impl<S: LandmarkSource, W: AsyncWrite + Unpin> ControlLoop<S, W> {
    pub fn new(
        source: S,
        link: SerialLink<W>,
        tracker: ButtonTouchTracker,
        label: impl Into<String>,
        quit: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            link,
            tracker,
            label: label.into(),
            mirror: true,
            state: LoopState::default(),
            quit,
            summary: LoopSummary::default(),
        }
    }

    /// Mirror frames the source has not flipped already (on by default)
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run until quit, then send the shutdown handshake
    ///
    /// A source I/O error ends the loop; the handshake is still sent before
    /// the error is returned.
    pub async fn run(&mut self) -> Result<LoopSummary, SourceError> {
        let outcome = self.run_frames().await;
        self.link.shutdown().await;

        info!(
            frames = self.summary.frames,
            skipped = self.summary.skipped,
            commands = self.summary.commands_sent,
            "Control loop stopped"
        );

        outcome.map(|_| self.summary)
    }

    async fn run_frames(&mut self) -> Result<(), SourceError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = quit_requested(&mut self.quit) => {
                    info!("Quit requested");
                    return Ok(());
                }
                event = self.source.next_event() => event,
            };

            match event {
                Ok(SourceEvent::Frame { frame, mirrored }) => {
                    let frame = if self.mirror && !mirrored {
                        frame.mirrored()
                    } else {
                        frame
                    };
                    self.step(&frame).await;
                }
                Ok(SourceEvent::Skipped(reason)) => {
                    self.summary.skipped += 1;
                    warn!(reason = %reason, "Frame skipped");
                }
                Ok(SourceEvent::Quit) => {
                    info!("Source requested quit");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Landmark source failed");
                    return Err(e);
                }
            }

            if *self.quit.borrow() {
                info!("Quit requested");
                return Ok(());
            }
        }
    }

    async fn step(&mut self, frame: &Frame) {
        self.summary.frames += 1;
        let result = process_frame(&mut self.state, &self.tracker, frame);

        if let Some(on) = result.toggled {
            info!(on = on, "Button touched");
        }

        for &command in &result.commands {
            match self.link.send(command).await {
                Ok(()) => {
                    self.state.encoder.mark_sent(command);
                    self.summary.commands_sent += 1;
                    info!(command = %command, "Sent command");
                }
                Err(e) => {
                    // Unsent finger counts are retried on the next frame
                    self.summary.write_failures += 1;
                    warn!(command = %command, error = %e, "Serial write failed");
                }
            }
        }

        let overlay = Overlay::new(
            &self.label,
            self.tracker.region(),
            self.state.button.on,
            &result.cursors,
            result.total_fingers,
        );
        tokio::select! {
            biased;
            _ = quit_requested(&mut self.quit) => {
                debug!("Quit while presenting overlay");
            }
            presented = self.source.present(&overlay) => {
                if let Err(e) = presented {
                    debug!(error = %e, "Overlay not delivered");
                }
            }
        }
    }

    #[cfg(test)]
    pub fn into_link(self) -> SerialLink<W> {
        self.link
    }
}

/// Resolves once the flag is set; never resolves if the sender is gone
async fn quit_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::{frame_line, hand_json};
    use crate::source::{HandFilter, JsonLinesSource};
    use gesturelink_core::ButtonRegion;
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    const THREE: [bool; 5] = [false, true, true, true, false];
    // Cursor (128, 408), inside the button
    const INSIDE: (f32, f32) = (0.2, 0.85);
    const OUTSIDE: (f32, f32) = (0.6, 0.3);

    /// Source that replays a fixed list of events, then quits
    struct ScriptedSource {
        events: VecDeque<Result<SourceEvent, SourceError>>,
        overlays: Vec<(bool, u8)>,
    }

    impl LandmarkSource for ScriptedSource {
        async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
            self.events.pop_front().unwrap_or(Ok(SourceEvent::Quit))
        }

        async fn present(&mut self, overlay: &Overlay<'_>) -> Result<(), SourceError> {
            self.overlays.push((overlay.button.on, overlay.sending));
            Ok(())
        }
    }

    /// Source whose renderer never accepts an overlay
    struct StuckRenderer {
        events: VecDeque<SourceEvent>,
    }

    impl LandmarkSource for StuckRenderer {
        async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
            Ok(self.events.pop_front().unwrap_or(SourceEvent::Quit))
        }

        async fn present(&mut self, _overlay: &Overlay<'_>) -> Result<(), SourceError> {
            std::future::pending().await
        }
    }

    /// Writer that fails its first write, then records bytes
    #[derive(Default)]
    struct FlakyWriter {
        failed_once: bool,
        written: Vec<u8>,
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if !self.failed_once {
                self.failed_once = true;
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "busy")));
            }
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn tracker() -> ButtonTouchTracker {
        ButtonTouchTracker::new(ButtonRegion::new(50, 380, 150, 70))
    }

    #[tokio::test]
    async fn test_end_to_end_wire_bytes() {
        let lines = [
            frame_line(vec![]),
            frame_line(vec![hand_json(THREE, INSIDE)]),
            r#"{"error":"camera read failed"}"#.to_string(),
            frame_line(vec![hand_json(THREE, INSIDE)]),
            frame_line(vec![hand_json([true; 5], OUTSIDE)]),
        ];
        let input = lines.join("\n") + "\n";

        let source = JsonLinesSource::new(input.as_bytes(), HandFilter::default());
        let link = SerialLink::from_writer(Vec::new(), "test");
        let (_quit_tx, quit_rx) = watch::channel(false);

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        let summary = control.run().await.unwrap();

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.commands_sent, 4);
        assert!(control.state().button.on);
        assert_eq!(control.state().encoder.last_sent(), Some(5));
        assert_eq!(control.into_link().into_inner(), b"0A350a");
    }

    #[tokio::test]
    async fn test_quit_before_first_frame() {
        let source = ScriptedSource {
            events: VecDeque::from(vec![Ok(SourceEvent::Skipped("never read".into()))]),
            overlays: Vec::new(),
        };
        let link = SerialLink::from_writer(Vec::new(), "test");
        let (quit_tx, quit_rx) = watch::channel(false);
        quit_tx.send(true).unwrap();

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        let summary = control.run().await.unwrap();

        assert_eq!(summary, LoopSummary::default());
        assert_eq!(control.into_link().into_inner(), b"0a");
    }

    #[tokio::test]
    async fn test_shutdown_after_button_on() {
        let input = frame_line(vec![hand_json(THREE, INSIDE)]);
        let source = JsonLinesSource::new(input.as_bytes(), HandFilter::default());
        let link = SerialLink::from_writer(Vec::new(), "test");
        let (_quit_tx, quit_rx) = watch::channel(false);

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        control.run().await.unwrap();

        // The LED is forced off even though the button was left on
        assert!(control.state().button.on);
        assert_eq!(control.into_link().into_inner(), b"A30a");
    }

    #[tokio::test]
    async fn test_overlay_per_frame() {
        let hand = gesture_frame(INSIDE);
        let source = ScriptedSource {
            events: VecDeque::from(vec![
                Ok(SourceEvent::Frame { frame: hand.clone(), mirrored: true }),
                Ok(SourceEvent::Skipped("dropped".into())),
                Ok(SourceEvent::Frame { frame: hand, mirrored: true }),
            ]),
            overlays: Vec::new(),
        };
        let link = SerialLink::from_writer(Vec::new(), "test");
        let (_quit_tx, quit_rx) = watch::channel(false);

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        control.run().await.unwrap();

        assert_eq!(control.source.overlays, vec![(true, 3), (true, 3)]);
    }

    #[tokio::test]
    async fn test_source_error_still_shuts_down() {
        let source = ScriptedSource {
            events: VecDeque::from(vec![Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "pipe closed",
            )))]),
            overlays: Vec::new(),
        };
        let link = SerialLink::from_writer(Vec::new(), "test");
        let (_quit_tx, quit_rx) = watch::channel(false);

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        assert!(control.run().await.is_err());
        assert_eq!(control.into_link().into_inner(), b"0a");
    }

    #[tokio::test]
    async fn test_unmirrored_frame_is_flipped() {
        // Right of center before the flip, on the button after it
        let frame = gesture_frame((0.8, 0.85));

        for (mirror, expected_on) in [(true, true), (false, false)] {
            let source = ScriptedSource {
                events: VecDeque::from(vec![Ok(SourceEvent::Frame {
                    frame: frame.clone(),
                    mirrored: false,
                })]),
                overlays: Vec::new(),
            };
            let link = SerialLink::from_writer(Vec::new(), "test");
            let (_quit_tx, quit_rx) = watch::channel(false);

            let mut control =
                ControlLoop::new(source, link, tracker(), "LED 1", quit_rx).with_mirror(mirror);
            control.run().await.unwrap();
            assert_eq!(control.state().button.on, expected_on);
        }
    }

    #[tokio::test]
    async fn test_quit_interrupts_stuck_renderer() {
        let source = StuckRenderer {
            events: VecDeque::from(vec![SourceEvent::Frame {
                frame: gesture_frame(INSIDE),
                mirrored: true,
            }]),
        };
        let link = SerialLink::from_writer(Vec::new(), "test");
        let (quit_tx, quit_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            quit_tx.send(true).unwrap();
        });

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        let summary = tokio::time::timeout(Duration::from_secs(5), control.run())
            .await
            .expect("loop hung on the overlay")
            .unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(control.into_link().into_inner(), b"A30a");
    }

    #[tokio::test]
    async fn test_failed_count_is_resent_next_frame() {
        let empty = Frame::new(640, 480, vec![]);
        let source = ScriptedSource {
            events: (0..3)
                .map(|_| Ok(SourceEvent::Frame { frame: empty.clone(), mirrored: true }))
                .collect(),
            overlays: Vec::new(),
        };
        let link = SerialLink::from_writer(FlakyWriter::default(), "flaky");
        let (_quit_tx, quit_rx) = watch::channel(false);

        let mut control = ControlLoop::new(source, link, tracker(), "LED 1", quit_rx);
        let summary = control.run().await.unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.write_failures, 1);
        assert_eq!(summary.commands_sent, 1);
        // First "0" lost, second delivered, third suppressed, then the handshake
        assert_eq!(control.into_link().into_inner().written, b"00a");
    }

    /// Frame with three fingers up and the index tip at `tip`
    fn gesture_frame(tip: (f32, f32)) -> Frame {
        let line = frame_line(vec![hand_json(THREE, tip)]);
        match crate::source::parse_line(&line, &HandFilter::default()) {
            SourceEvent::Frame { frame, .. } => frame,
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
