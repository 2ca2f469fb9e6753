use std::io;

use thiserror::Error;

use lcm_core::MessageError;

/// Errors from opening a [`Lcm`](crate::Lcm).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OpenError {
    /// The serial device could not be opened.
    #[error("failed to open serial device")]
    Open(#[source] serialport::Error),

    /// The serial device rejected a required setting, could not flush its
    /// input buffer, or could not provide a second handle for the reader.
    #[error("failed to configure serial device")]
    Configuration(#[source] serialport::Error),
}

/// The failure that made the most recent send attempt retry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum RetryCause {
    /// No matching reply arrived within the reply timeout.
    #[error("no matching reply before timeout")]
    Timeout,

    /// The MCU answered with a non-zero status byte. The observed codes
    /// (`0x02`, `0x04`) have no documented meaning beyond "send it again".
    #[error("error reply with code {0:#04x}")]
    ErrorReply(u8),
}

/// Errors from [`Lcm::send`](crate::Lcm::send).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SendError {
    /// The message failed [`check`](lcm_core::Message::check); nothing was
    /// written to the device.
    #[error("refusing to send malformed message")]
    Invalid(#[from] MessageError),

    /// Every attempt failed; the last failure is attached.
    #[error("retries exhausted after {tries} attempts")]
    RetryExceeded {
        /// How many times the frame was written.
        tries: u32,
        /// Why the final attempt failed.
        #[source]
        last: RetryCause,
    },

    /// Writing to the serial device failed, or the reader task died; the
    /// engine is unusable until reopened.
    #[error("serial transport failed")]
    Transport(#[source] io::Error),

    /// The engine was closed while the send was in flight.
    #[error("send cancelled by close")]
    Cancelled,

    /// The engine is closed.
    #[error("engine is closed")]
    Closed,
}

/// Errors from [`Lcm::recv`](crate::Lcm::recv).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum RecvError {
    /// The engine is closed and the receive queue is drained.
    #[error("engine is closed")]
    Closed,
}

/// Errors from [`Lcm::try_recv`](crate::Lcm::try_recv).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum TryRecvError {
    /// No message is currently queued.
    #[error("no message queued")]
    Empty,

    /// The engine is closed and the receive queue is drained.
    #[error("engine is closed")]
    Closed,
}

/// Errors from [`Lcm::close`](crate::Lcm::close).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum CloseError {
    /// A background task panicked instead of shutting down.
    #[error("background task panicked")]
    TaskPanicked,
}
