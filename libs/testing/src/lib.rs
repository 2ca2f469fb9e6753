//! Tools for testing and debugging ASUSTOR LCM communication without the
//! hardware.
//!
//! The centerpiece is [`VirtualLcm`], a mock MCU on the far end of an
//! in-memory serial port: point the protocol engine at the port and script
//! the MCU's behavior, including the fault modes the real hardware exhibits
//! (ignored frames, error replies). [`VirtualPort`] is also usable on its
//! own for lower-level tests.
//!
//! Intended for tests and protocol exploration, not for production use.
//!
//! # Examples
//!
//! ```
//! use lcm_core::{Button, Function, Message};
//! use lcm_serial::LcmOptions;
//! use lcm_testing::{ObedientMcu, VirtualLcm};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mcu, port) = VirtualLcm::spawn(ObedientMcu);
//! let mut lcm = LcmOptions::new().attach(port)?;
//!
//! // Commands are delivered and acknowledged by the virtual MCU.
//! lcm.send(Message::clear_display())?;
//!
//! // Button presses surface through the receive side.
//! mcu.press_button(Button::Enter);
//! let event = lcm.recv()?;
//! assert_eq!(Function::Button, event.function());
//!
//! lcm.close()?;
//! #
//! # Ok(()) }
//! ```
#![doc(html_root_url = "https://docs.rs/lcm-testing/0.1.0")]
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

mod virtual_lcm;
mod virtual_port;

pub use self::virtual_lcm::{McuBehavior, ObedientMcu, VirtualLcm};
pub use self::virtual_port::VirtualPort;
