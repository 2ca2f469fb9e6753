use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::display::{DisplayError, DisplayLine, DISPLAY_WIDTH};
use crate::frame::checksum;

/// The kind of a message, given by its first byte on the wire.
///
/// # Examples
///
/// ```
/// use lcm_core::{Kind, Message};
///
/// assert_eq!(Some(Kind::Command), Message::display_on().kind());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A command (`0xF0`). Sent by the host to control the display; also sent
    /// by the display for button presses and version reports.
    Command,
    /// A reply (`0xF1`). Acknowledges a command with the same function byte.
    Reply,
}

impl Kind {
    /// Interprets a wire byte as a kind. Any byte other than `0xF0`/`0xF1`
    /// is not a valid frame start and yields `None`.
    pub fn from_byte(byte: u8) -> Option<Kind> {
        match byte {
            0xF0 => Some(Kind::Command),
            0xF1 => Some(Kind::Reply),
            _ => None,
        }
    }

    /// Returns the wire byte for this kind.
    pub fn to_byte(self) -> u8 {
        match self {
            Kind::Command => 0xF0,
            Kind::Reply => 0xF1,
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Command => write!(f, "Command"),
            Kind::Reply => write!(f, "Reply"),
        }
    }
}

/// The semantic operation of a message, given by its third byte on the wire.
///
/// Function codes not listed here have been observed experimentally
/// (`0x10`, `0x21`, `0x23`, `0x25`, `0x26`) but their purpose is unknown;
/// they round-trip through [`Function::Other`] untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Function {
    /// `0x00`: not a real MCU function. Sent (twice, back to back) to flush
    /// the MCU's receive buffer when it has stopped answering; the MCU
    /// acknowledges with an ok reply.
    Flush,
    /// `0x11`: backlight on (payload `0x01`) or off (`0x00`).
    On,
    /// `0x12`: clear the display (payload `0x01`).
    Clear,
    /// `0x13`: version request from the host; the display acknowledges and
    /// then reports its version as a command with a
    /// `[major, minor, patch]` payload. Only 0.1.2 has been observed.
    Version,
    /// `0x22`: status probe with an unknown purpose (payload `0x00`). The
    /// vendor daemon issues it after power-on and around text updates.
    Status,
    /// `0x27`: write one 16-character line of text.
    Text,
    /// `0x80`: button press reported by the display; the payload is a
    /// [`Button`](crate::Button) code.
    Button,
    /// Any function code without a known meaning, carried through untouched.
    Other(u8),
}

impl Function {
    /// Interprets a wire byte as a function.
    pub fn from_byte(byte: u8) -> Function {
        match byte {
            0x00 => Function::Flush,
            0x11 => Function::On,
            0x12 => Function::Clear,
            0x13 => Function::Version,
            0x22 => Function::Status,
            0x27 => Function::Text,
            0x80 => Function::Button,
            other => Function::Other(other),
        }
    }

    /// Returns the wire byte for this function.
    pub fn to_byte(self) -> u8 {
        match self {
            Function::Flush => 0x00,
            Function::On => 0x11,
            Function::Clear => 0x12,
            Function::Version => 0x13,
            Function::Status => 0x22,
            Function::Text => 0x27,
            Function::Button => 0x80,
            Function::Other(other) => other,
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Function::Flush => write!(f, "Flush"),
            Function::On => write!(f, "On"),
            Function::Clear => write!(f, "Clear"),
            Function::Version => write!(f, "Version"),
            Function::Status => write!(f, "Status"),
            Function::Text => write!(f, "Text"),
            Function::Button => write!(f, "Button"),
            Function::Other(byte) => write!(f, "{:#04x}", byte),
        }
    }
}

/// Errors from validating a [`Message`] with [`check`](Message::check).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum MessageError {
    /// The message is shorter than the four-byte minimum.
    #[error("message too short: {len} bytes")]
    TooShort {
        /// The actual length in bytes.
        len: usize,
    },

    /// The first byte is not a valid [`Kind`].
    #[error("unknown message kind {byte:#04x}")]
    UnknownKind {
        /// The offending first byte.
        byte: u8,
    },

    /// The declared payload length does not match the message length.
    #[error("wrong message length: declared {declared}, got {actual} bytes")]
    WrongLength {
        /// The length implied by the length byte.
        declared: usize,
        /// The actual length in bytes.
        actual: usize,
    },
}

/// A logical frame without its checksum byte.
///
/// The layout is `KIND | LEN | FUNCTION | PAYLOAD…`, where `LEN` counts the
/// payload bytes after the function byte. The checksum only exists on the
/// wire: it is appended by [`to_frame`] on the way out and stripped by the
/// [`FrameAssembler`](crate::FrameAssembler) on the way in.
///
/// `Message` makes no promise of well-formedness; [`check`] validates the
/// shape and the accessors are lenient so that garbage can still be logged.
///
/// # Examples
///
/// ```
/// use lcm_core::{Function, Kind, Message};
///
/// let message = Message::display_on();
/// assert_eq!(&[0xF0, 0x01, 0x11, 0x01], message.as_bytes());
/// assert_eq!(Function::On, message.function());
/// assert_eq!(&[0xF0, 0x01, 0x11, 0x01, 0x03], message.to_frame().as_slice());
/// ```
///
/// [`to_frame`]: Message::to_frame
/// [`check`]: Message::check
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    bytes: Vec<u8>,
}

impl Message {
    /// Composes a message from its parts.
    ///
    /// The length byte is derived from `value`, whose length must fit in one
    /// byte (every real message carries at most 18 payload bytes).
    ///
    /// # Examples
    ///
    /// ```
    /// use lcm_core::{Function, Kind, Message};
    ///
    /// let press = Message::new(Kind::Command, Function::Button, &[0x01]);
    /// assert_eq!(&[0xF0, 0x01, 0x80, 0x01], press.as_bytes());
    /// ```
    pub fn new(kind: Kind, function: Function, value: &[u8]) -> Self {
        debug_assert!(value.len() <= 0xFF);
        let mut bytes = Vec::with_capacity(3 + value.len());
        bytes.push(kind.to_byte());
        bytes.push(value.len() as u8);
        bytes.push(function.to_byte());
        bytes.extend_from_slice(value);
        Message { bytes }
    }

    /// Wraps raw checksum-less bytes without validating them.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Message { bytes }
    }

    /// Returns the raw checksum-less bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the message and returns ownership of its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the wire representation: the message bytes with the checksum
    /// appended.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.bytes.len() + 1);
        frame.extend_from_slice(&self.bytes);
        frame.push(checksum(&self.bytes));
        frame
    }

    /// Returns the message kind, or `None` if the message is empty or starts
    /// with a byte that is not a valid kind.
    pub fn kind(&self) -> Option<Kind> {
        self.bytes.first().copied().and_then(Kind::from_byte)
    }

    /// Returns the message function.
    pub fn function(&self) -> Function {
        Function::from_byte(self.bytes.get(2).copied().unwrap_or(0))
    }

    /// Returns the payload after the function byte, clamped to the bytes
    /// actually present.
    pub fn value(&self) -> &[u8] {
        if self.bytes.len() < 4 {
            return &[];
        }
        let declared = 3 + self.bytes[1] as usize;
        &self.bytes[3..declared.min(self.bytes.len())]
    }

    /// Whether the first payload byte signals success.
    ///
    /// Replies carry `0x00` for success; any non-zero value is an MCU-defined
    /// error code (`0x02` and `0x04` have been observed) whose only reliable
    /// meaning is "send it again".
    pub fn ok(&self) -> bool {
        self.bytes.get(3) == Some(&0)
    }

    /// Returns the success reply acknowledging this command, or `None` if
    /// this message is not a command.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcm_core::Message;
    ///
    /// let reply = Message::display_on().reply_ok().unwrap();
    /// assert_eq!(&[0xF1, 0x01, 0x11, 0x00], reply.as_bytes());
    /// ```
    pub fn reply_ok(&self) -> Option<Message> {
        match self.kind() {
            Some(Kind::Command) => Some(Message::new(Kind::Reply, self.function(), &[0x00])),
            _ => None,
        }
    }

    /// Validates the message shape: at least four bytes, a known kind, and a
    /// length byte consistent with the overall length.
    pub fn check(&self) -> Result<(), MessageError> {
        if self.bytes.len() < 4 {
            return Err(MessageError::TooShort {
                len: self.bytes.len(),
            });
        }
        if self.kind().is_none() {
            return Err(MessageError::UnknownKind {
                byte: self.bytes[0],
            });
        }
        let declared = 3 + self.bytes[1] as usize;
        if declared != self.bytes.len() {
            return Err(MessageError::WrongLength {
                declared,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    /// The made-up wake/flush command (`F0 01 00 00`).
    ///
    /// Not part of the MCU's real command set, but it answers with an ok
    /// reply, which makes it useful for unsticking the MCU's receive buffer
    /// after a dropped byte leaves it waiting mid-frame.
    pub fn mcu_flush() -> Message {
        Message::new(Kind::Command, Function::Flush, &[0x00])
    }

    /// Turns the backlight on (`F0 01 11 01`).
    pub fn display_on() -> Message {
        Message::new(Kind::Command, Function::On, &[0x01])
    }

    /// Turns the backlight off (`F0 01 11 00`).
    pub fn display_off() -> Message {
        Message::new(Kind::Command, Function::On, &[0x00])
    }

    /// Clears the current text from the display (`F0 01 12 01`).
    pub fn clear_display() -> Message {
        Message::new(Kind::Command, Function::Clear, &[0x01])
    }

    /// Status probe (`F0 01 22 00`).
    ///
    /// The purpose is unknown; the vendor daemon issues it after turning the
    /// display on and sometimes around text updates, and it makes a handy
    /// no-visible-effect probe that the link is alive.
    pub fn display_status() -> Message {
        Message::new(Kind::Command, Function::Status, &[0x00])
    }

    /// Requests the MCU firmware version (`F0 01 13 01`).
    ///
    /// The display first acknowledges the request and then reports the
    /// version as a separate command, which takes 200 ms or more to arrive.
    /// Acknowledging that report makes the display think the version was
    /// requested again, so the protocol engine never acks it.
    pub fn request_version() -> Message {
        Message::new(Kind::Command, Function::Version, &[0x01])
    }

    /// Writes one line of text to the display.
    ///
    /// `text` is at most 16 bytes in the display's 8-bit character set and is
    /// right-padded with spaces to the full line width; `indent` shifts the
    /// visible window right by up to 15 columns. Filling the line with spaces
    /// before first using an indent avoids stray characters in the leading
    /// columns.
    ///
    /// # Errors
    ///
    /// [`DisplayError::TextTooLong`] if `text` exceeds 16 bytes and
    /// [`DisplayError::IndentOutOfRange`] if `indent` exceeds 15.
    ///
    /// # Examples
    ///
    /// ```
    /// use lcm_core::{DisplayLine, Message};
    ///
    /// let message = Message::set_display(DisplayLine::Bottom, 0, ">").unwrap();
    /// assert_eq!(
    ///     &[
    ///         0xF0, 0x12, 0x27, 0x01, 0x00, 0x3E, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    ///         0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    ///     ],
    ///     message.as_bytes()
    /// );
    /// ```
    pub fn set_display(
        line: DisplayLine,
        indent: u8,
        text: impl AsRef<[u8]>,
    ) -> Result<Message, DisplayError> {
        let text = text.as_ref();
        if indent > 0xF {
            return Err(DisplayError::IndentOutOfRange { indent });
        }
        if text.len() > DISPLAY_WIDTH {
            return Err(DisplayError::TextTooLong { len: text.len() });
        }

        let mut value = Vec::with_capacity(2 + DISPLAY_WIDTH);
        value.push(line.to_byte());
        value.push(indent);
        value.extend_from_slice(text);
        value.resize(2 + DISPLAY_WIDTH, b' ');
        Ok(Message::new(Kind::Command, Function::Text, &value))
    }
}

impl Display for Message {
    /// Formats the message in a human-readable way.
    ///
    /// Useful for watching traffic go by in logs. All numbers are in hex.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{} {}", kind, self.function())?,
            None => write!(f, "Invalid")?,
        }
        if !self.value().is_empty() {
            write!(f, " |")?;
            for byte in self.value() {
                write!(f, " {:02X}", byte)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_commands() {
        assert_eq!(&[0xF0, 0x01, 0x00, 0x00], Message::mcu_flush().as_bytes());
        assert_eq!(&[0xF0, 0x01, 0x11, 0x01], Message::display_on().as_bytes());
        assert_eq!(&[0xF0, 0x01, 0x11, 0x00], Message::display_off().as_bytes());
        assert_eq!(&[0xF0, 0x01, 0x12, 0x01], Message::clear_display().as_bytes());
        assert_eq!(&[0xF0, 0x01, 0x22, 0x00], Message::display_status().as_bytes());
        assert_eq!(&[0xF0, 0x01, 0x13, 0x01], Message::request_version().as_bytes());
    }

    #[test]
    fn check_accepts_well_known_commands() {
        for message in [
            Message::mcu_flush(),
            Message::display_on(),
            Message::display_off(),
            Message::clear_display(),
            Message::display_status(),
            Message::request_version(),
        ] {
            message.check().unwrap();
        }
    }

    #[test]
    fn check_rejects_short_message() {
        let message = Message::from_bytes(vec![0xF0, 0x01, 0x11]);
        assert_eq!(Err(MessageError::TooShort { len: 3 }), message.check());
    }

    #[test]
    fn check_rejects_unknown_kind() {
        let message = Message::from_bytes(vec![0xF2, 0x01, 0x11, 0x01]);
        assert_eq!(Err(MessageError::UnknownKind { byte: 0xF2 }), message.check());
    }

    #[test]
    fn check_rejects_wrong_length() {
        let message = Message::from_bytes(vec![0xF0, 0x02, 0x11, 0x01]);
        assert_eq!(
            Err(MessageError::WrongLength {
                declared: 5,
                actual: 4
            }),
            message.check()
        );
    }

    #[test]
    fn reply_ok_mirrors_function() {
        let reply = Message::clear_display().reply_ok().unwrap();
        assert_eq!(Some(Kind::Reply), reply.kind());
        assert_eq!(Function::Clear, reply.function());
        assert_eq!(&[0x00], reply.value());
        reply.check().unwrap();
    }

    #[test]
    fn reply_ok_of_reply_is_none() {
        let reply = Message::new(Kind::Reply, Function::On, &[0x00]);
        assert_eq!(None, reply.reply_ok());
    }

    #[test]
    fn ok_reads_first_payload_byte() {
        assert!(Message::new(Kind::Reply, Function::Text, &[0x00]).ok());
        assert!(!Message::new(Kind::Reply, Function::Text, &[0x02]).ok());
        assert!(!Message::from_bytes(vec![]).ok());
    }

    #[test]
    fn value_slices_payload() {
        let version = Message::new(Kind::Command, Function::Version, &[0x00, 0x01, 0x02]);
        assert_eq!(&[0x00, 0x01, 0x02], version.value());
        assert_eq!(0, Message::from_bytes(vec![0xF0]).value().len());
    }

    #[test]
    fn value_clamped_for_lying_length_byte() {
        let message = Message::from_bytes(vec![0xF0, 0x09, 0x11, 0x01]);
        assert_eq!(&[0x01], message.value());
    }

    #[test]
    fn unknown_functions_round_trip() {
        for byte in [0x10, 0x21, 0x23, 0x25, 0x26] {
            let function = Function::from_byte(byte);
            assert_eq!(Function::Other(byte), function);
            assert_eq!(byte, function.to_byte());
        }
    }

    #[test]
    fn set_display_encodings() {
        let cases: &[(DisplayLine, u8, &str, &[u8])] = &[
            (
                DisplayLine::Top,
                0,
                "                ",
                &[
                    0xF0, 0x12, 0x27, 0x00, 0x00, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                    0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                ],
            ),
            (
                DisplayLine::Top,
                0,
                "",
                &[
                    0xF0, 0x12, 0x27, 0x00, 0x00, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                    0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
                ],
            ),
            (
                DisplayLine::Top,
                0,
                "PRESS ANY KEY TO",
                &[
                    0xF0, 0x12, 0x27, 0x00, 0x00, 0x50, 0x52, 0x45, 0x53, 0x53, 0x20, 0x41, 0x4E,
                    0x59, 0x20, 0x4B, 0x45, 0x59, 0x20, 0x54, 0x4F,
                ],
            ),
            (
                DisplayLine::Top,
                2,
                "PRESS ANY KEY TO",
                &[
                    0xF0, 0x12, 0x27, 0x00, 0x02, 0x50, 0x52, 0x45, 0x53, 0x53, 0x20, 0x41, 0x4E,
                    0x59, 0x20, 0x4B, 0x45, 0x59, 0x20, 0x54, 0x4F,
                ],
            ),
        ];
        for (line, indent, text, expected) in cases {
            let message = Message::set_display(*line, *indent, text).unwrap();
            assert_eq!(*expected, message.as_bytes(), "text {:?}", text);
            message.check().unwrap();
        }
    }

    #[test]
    fn set_display_rejects_long_text() {
        let error = Message::set_display(DisplayLine::Top, 0, "PRESS ANY KEY TO EXPLODE").unwrap_err();
        assert_eq!(DisplayError::TextTooLong { len: 24 }, error);
    }

    #[test]
    fn set_display_rejects_indent_past_last_column() {
        let error = Message::set_display(DisplayLine::Top, 16, "").unwrap_err();
        assert_eq!(DisplayError::IndentOutOfRange { indent: 16 }, error);
    }

    #[test]
    fn frame_appends_checksum() {
        assert_eq!(
            vec![0xF0, 0x01, 0x11, 0x01, 0x03],
            Message::display_on().to_frame()
        );
        assert_eq!(
            vec![0xF0, 0x01, 0x00, 0x00, 0xF1],
            Message::mcu_flush().to_frame()
        );
    }

    #[test]
    fn display_formatting() {
        let display = format!("{}", Message::display_on());
        assert_eq!("Command On | 01", display);
        assert_eq!("Invalid", format!("{}", Message::from_bytes(vec![])));
    }
}
