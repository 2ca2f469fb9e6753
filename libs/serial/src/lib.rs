//! Serial transport and protocol engine for the ASUSTOR LCM front panel.
//!
//! For the basic task of driving a display, you likely want the high-level
//! API in the [`lcm`] crate instead.
//!
//! However, you can use [`open_port`]/[`configure_port`] to prepare a serial
//! port if you are doing custom lower-level communication, and [`Lcm`] is
//! the engine itself: it owns the device, frames and deframes messages, and
//! runs the retry state machine that copes with the MCU's habit of losing
//! bytes and answering with garbage.
//!
//! Diagnostics go to an injected [`Logger`]; pass [`DebugLogger`] to route
//! them through the [`log`] crate, where consuming binaries typically use
//! `env_logger` and `RUST_LOG=debug` to watch the traffic go by.
//!
//! # Examples
//!
//! ```no_run
//! use lcm_core::Message;
//! use lcm_serial::Lcm;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut lcm = Lcm::open(lcm_serial::DEFAULT_TTY)?;
//! lcm.send(Message::display_on())?;
//! lcm.close()?;
//! #
//! # Ok(()) }
//! ```
//!
//! [`lcm`]: https://docs.rs/lcm
#![doc(html_root_url = "https://docs.rs/lcm-serial/0.1.0")]
#![deny(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(
    missing_docs,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]

mod engine;
mod errors;
mod logger;
mod serial_port;

pub use self::engine::{
    Lcm, LcmOptions, DEFAULT_TTY, FLUSH_DELAY, REPLY_TIMEOUT, RETRY_LIMIT, WRITE_DELAY,
};
pub use self::errors::{CloseError, OpenError, RecvError, RetryCause, SendError, TryRecvError};
pub use self::logger::{DebugLogger, Logger, NopLogger};
pub use self::serial_port::{configure_port, open_port, BAUD_RATE};
