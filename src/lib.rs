//! A library for driving the LCD/button module (LCM) found on the front of
//! ASUSTOR NAS devices over its serial protocol.
//!
//! Provides a way to connect to the display, write its two 16-character text
//! lines, control the backlight, query the MCU firmware version, and receive
//! button-press events. The protocol engine underneath copes with the MCU's
//! well-known flakiness: lost bytes, spurious error replies, and wedged
//! receive buffers are retried and recovered transparently.
//!
//! Tested with the LCM of AS604T and AS6204T NAS devices. Should work with
//! any ASUSTOR model that exposes the panel on a serial port, but no
//! guarantees. Not affiliated with ASUSTOR in any way.
//!
//! # Examples
//!
//! ```no_run
//! use lcm::{DisplayLine, Lcm, Message, Scroll};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut lcm = Lcm::open("/dev/ttyS1")?;
//!
//! // Light the display up and greet.
//! lcm.send(Message::display_on())?;
//! lcm.send(Message::set_display(DisplayLine::Top, 0, "Hello!")?)?;
//!
//! // Scroll a longer text across the bottom line once.
//! let mut scroll = Scroll::new(DisplayLine::Bottom, "A text that does not fit on one line");
//! loop {
//!     let frame = scroll.step();
//!     lcm.send(frame.message)?;
//!     if frame.start && frame.done {
//!         break;
//!     }
//!     std::thread::sleep(Duration::from_millis(if frame.start || frame.done { 2000 } else { 75 }));
//! }
//!
//! // React to the next front panel button press.
//! let message = lcm.recv()?;
//! println!("display says: {}", message);
//!
//! lcm.close()?;
//! #
//! # Ok(()) }
//! ```
//!
//! # Sub-crates
//!
//! In addition to the high-level surface re-exported here, the lower-level
//! components can be combined for more specialized use-cases.
//!
//! - [`lcm-core`] \(re-exported as `core`\) contains the basic types
//!   describing the wire protocol, useful for operating at the level of raw
//!   frames.
//! - [`lcm-serial`] \(re-exported as `serial`\) contains the serial port
//!   configuration helpers and the protocol engine itself.
//! - `lcm-testing` contains a virtual MCU and in-memory serial ports,
//!   useful for testing and protocol exploration without hardware.
//!
//! [`lcm-core`]: https://docs.rs/lcm-core
//! [`lcm-serial`]: https://docs.rs/lcm-serial
#![doc(html_root_url = "https://docs.rs/lcm/0.1.0")]
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

pub use lcm_core as core;
pub use lcm_serial as serial;

pub use crate::core::{
    Button, CharCodePage, CharCodePages, DisplayError, DisplayLine, Function, Kind, Message,
    Scroll, ScrollFrame, DISPLAY_WIDTH,
};
pub use crate::serial::{
    CloseError, DebugLogger, Lcm, LcmOptions, Logger, NopLogger, OpenError, RecvError, RetryCause,
    SendError, TryRecvError, DEFAULT_TTY,
};
