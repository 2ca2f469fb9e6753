//! Core types describing the serial protocol of the ASUSTOR LCM front panel.
//!
//! For the basic task of driving a display, you likely want the high-level
//! API in the [`lcm`] crate instead.
//!
//! However, `lcm-core` is useful for crates that want to interact with the
//! wire protocol at a lower level than the [`lcm`] crate, or that implement
//! the display side of the conversation (see `lcm-testing`).
//!
//! Tested against the LCM modules of AS604T and AS6204T NAS devices. Should
//! work with any ASUSTOR model that exposes the panel on a serial port, but
//! no guarantees.
//!
//! # Examples
//!
//! ```
//! use lcm_core::{checksum, DisplayLine, Function, Kind, Message};
//!
//! // Compose a text update and frame it for the wire.
//! let message = Message::set_display(DisplayLine::Top, 0, "Hello")?;
//! let frame = message.to_frame();
//! assert_eq!(Some(&checksum(message.as_bytes())), frame.last());
//!
//! // Inspect a button press reported by the display.
//! let press = Message::new(Kind::Command, Function::Button, &[0x01]);
//! assert_eq!(Function::Button, press.function());
//! # Ok::<(), lcm_core::DisplayError>(())
//! ```
//!
//! [`lcm`]: https://docs.rs/lcm
#![doc(html_root_url = "https://docs.rs/lcm-core/0.1.0")]
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

mod button;
mod display;
mod frame;
mod message;

pub use self::button::Button;
pub use self::display::{
    CharCodePage, CharCodePages, DisplayError, DisplayLine, Scroll, ScrollFrame, DISPLAY_WIDTH,
};
pub use self::frame::{
    checksum, FrameAssembler, FrameError, MAX_COMMAND_PAYLOAD, MAX_REPLY_PAYLOAD,
};
pub use self::message::{Function, Kind, Message, MessageError};
