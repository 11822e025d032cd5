//! Serial command alphabet and change-detection policy
//!
//! | Bytes          | Meaning                 |
//! |----------------|-------------------------|
//! | `A`            | auxiliary output on     |
//! | `a`            | auxiliary output off    |
//! | `"0"`..`"10"`  | finger count            |
//!
//! Commands carry no framing or acknowledgement.

use std::fmt;

use tracing::trace;

/// Largest finger count on the wire (two hands)
pub const MAX_FINGER_COUNT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialCommand {
    AuxOn,
    AuxOff,
    FingerCount(u8),
}

impl SerialCommand {
    /// Command for a toggle event carrying the new button state
    pub fn for_button(on: bool) -> Self {
        if on {
            Self::AuxOn
        } else {
            Self::AuxOff
        }
    }

    /// Wire encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::AuxOn => b"A".to_vec(),
            Self::AuxOff => b"a".to_vec(),
            Self::FingerCount(n) => n.to_string().into_bytes(),
        }
    }
}

impl fmt::Display for SerialCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuxOn => write!(f, "A"),
            Self::AuxOff => write!(f, "a"),
            Self::FingerCount(n) => write!(f, "{}", n),
        }
    }
}

/// Maps frame results to commands, suppressing repeated finger counts
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder {
    last_sent: Option<u8>,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last finger count that reached the link, `None` until the first send
    pub fn last_sent(&self) -> Option<u8> {
        self.last_sent
    }

    /// Commands for one frame, toggle first
    ///
    /// Toggle commands are never suppressed. The finger count is emitted only
    /// when it differs from the last one sent; call [`Self::mark_sent`] once
    /// the write succeeds.
    pub fn encode(&self, toggled: Option<bool>, total_fingers: u8) -> Vec<SerialCommand> {
        let mut commands = Vec::with_capacity(2);

        if let Some(on) = toggled {
            commands.push(SerialCommand::for_button(on));
        }

        debug_assert!(total_fingers <= MAX_FINGER_COUNT);
        if self.last_sent != Some(total_fingers) {
            commands.push(SerialCommand::FingerCount(total_fingers));
        } else {
            trace!(count = total_fingers, "Finger count unchanged");
        }

        commands
    }

    /// Record a successful transmission
    pub fn mark_sent(&mut self, command: SerialCommand) {
        if let SerialCommand::FingerCount(n) = command {
            self.last_sent = Some(n);
        }
    }
}
