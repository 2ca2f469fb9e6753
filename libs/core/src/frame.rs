use thiserror::Error;

use crate::{Kind, Message};

/// Maximum payload length the assembler accepts for an inbound `Command`.
///
/// The display never originates commands with more than a handful of payload
/// bytes (button presses carry one, version reports carry three); anything
/// larger is treated as line garbage so a corrupted length byte cannot make
/// the assembler swallow the line forever.
pub const MAX_COMMAND_PAYLOAD: u8 = 16;

/// Maximum payload length the assembler accepts for an inbound `Reply`.
///
/// Replies always carry exactly one status byte.
pub const MAX_REPLY_PAYLOAD: u8 = 1;

/// Computes the checksum of the given bytes.
///
/// The wire format uses a plain 8-bit sum (mod 256) over all bytes of the
/// frame preceding the checksum byte itself.
///
/// # Examples
///
/// ```
/// use lcm_core::checksum;
///
/// assert_eq!(0x03, checksum(&[0xF0, 0x01, 0x11, 0x01]));
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |sum, &b| sum.wrapping_add(b))
}

/// Errors produced while assembling inbound frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The first byte of a frame was neither `Command` (`0xF0`) nor `Reply` (`0xF1`).
    #[error("invalid frame start byte {byte:#04x}")]
    InvalidFrame {
        /// The offending start byte.
        byte: u8,
    },

    /// The length byte exceeded the cap for the frame's kind.
    #[error("frame too long: {kind} with payload length {len}")]
    FrameTooLong {
        /// The kind of the frame being assembled.
        kind: Kind,
        /// The declared payload length.
        len: u8,
    },

    /// The final byte of the frame did not match the running checksum.
    #[error("invalid checksum: expected {expected:#04x}, got {actual:#04x}")]
    InvalidChecksum {
        /// The checksum computed over the received bytes.
        expected: u8,
        /// The checksum byte that arrived on the wire.
        actual: u8,
    },

    /// More bytes arrived than the frame's declared length allows.
    ///
    /// This state is unreachable when the assembler is reset between frames;
    /// it exists to catch misuse.
    #[error("bytes past end of frame")]
    InvalidSize,
}

/// Incremental assembler for inbound frames.
///
/// Bytes are fed in one at a time with [`push`]; the assembler validates the
/// start byte, the declared length, and the trailing checksum as they arrive.
/// A completed frame is returned as a [`Message`] with the checksum stripped.
///
/// After yielding a frame or reporting an error, the assembler must be
/// [`reset`] before the next frame.
///
/// # Examples
///
/// ```
/// use lcm_core::{FrameAssembler, Function};
///
/// let mut assembler = FrameAssembler::new();
/// let mut frames = vec![];
/// for byte in [0xF1, 0x01, 0x12, 0x00, 0x04] {
///     if let Some(message) = assembler.push(byte).unwrap() {
///         frames.push(message);
///     }
/// }
/// assert_eq!(1, frames.len());
/// assert_eq!(Function::Clear, frames[0].function());
/// ```
///
/// [`push`]: FrameAssembler::push
/// [`reset`]: FrameAssembler::reset
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    want: usize,
    sum: u8,
    complete: bool,
    command_limit: u8,
    reply_limit: u8,
}

impl FrameAssembler {
    /// Creates an assembler with the default inbound length caps
    /// ([`MAX_COMMAND_PAYLOAD`] and [`MAX_REPLY_PAYLOAD`]).
    pub fn new() -> Self {
        Self::with_limits(MAX_COMMAND_PAYLOAD, MAX_REPLY_PAYLOAD)
    }

    /// Creates an assembler with explicit payload length caps.
    ///
    /// Host-originated traffic includes text frames with a payload length of
    /// 18, so tooling that parses the host side of the conversation (such as
    /// a virtual display) needs a higher command cap than the inbound
    /// default.
    pub fn with_limits(command_limit: u8, reply_limit: u8) -> Self {
        FrameAssembler {
            buf: Vec::with_capacity(4 + MAX_COMMAND_PAYLOAD as usize),
            want: 0,
            sum: 0,
            complete: false,
            command_limit,
            reply_limit,
        }
    }

    /// Feeds one byte into the assembler.
    ///
    /// Returns `Ok(None)` while the frame is incomplete and
    /// `Ok(Some(message))` when the byte completed a frame whose checksum
    /// verified; the returned [`Message`] does not include the checksum.
    ///
    /// # Errors
    ///
    /// * [`FrameError::InvalidFrame`] if the first byte is not a valid kind.
    /// * [`FrameError::FrameTooLong`] if the length byte exceeds the cap.
    /// * [`FrameError::InvalidChecksum`] if the final byte does not match.
    /// * [`FrameError::InvalidSize`] if bytes arrive past the end of a frame.
    ///
    /// After any error the partial frame is abandoned; call [`reset`] and
    /// resume feeding bytes to hunt for the next frame boundary.
    ///
    /// [`reset`]: FrameAssembler::reset
    pub fn push(&mut self, byte: u8) -> Result<Option<Message>, FrameError> {
        if self.complete {
            return Err(FrameError::InvalidSize);
        }

        let index = self.buf.len();
        match index {
            // Frame kind.
            0 => {
                if Kind::from_byte(byte).is_none() {
                    return Err(FrameError::InvalidFrame { byte });
                }
            }

            // Payload length; the checksum position is now known.
            1 => {
                let kind = Kind::from_byte(self.buf[0]).unwrap(); // Validated at index 0 so safe to unwrap.
                let limit = match kind {
                    Kind::Command => self.command_limit,
                    Kind::Reply => self.reply_limit,
                };
                if byte > limit {
                    return Err(FrameError::FrameTooLong { kind, len: byte });
                }
                self.want = 3 + byte as usize;
            }

            // End of frame (checksum byte, not appended).
            _ if index == self.want => {
                if byte != self.sum {
                    return Err(FrameError::InvalidChecksum {
                        expected: self.sum,
                        actual: byte,
                    });
                }
                self.complete = true;
                return Ok(Some(Message::from_bytes(self.buf.clone())));
            }

            // Function and payload bytes.
            _ => {}
        }

        self.sum = self.sum.wrapping_add(byte);
        self.buf.push(byte);
        Ok(None)
    }

    /// Clears all state in preparation for the next frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.want = 0;
        self.sum = 0;
        self.complete = false;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        FrameAssembler::new()
    }
}
