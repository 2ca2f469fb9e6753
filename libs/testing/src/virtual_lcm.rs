use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use serialport::SerialPort;

use lcm_core::{Button, FrameAssembler, Function, Kind, Message};

use crate::virtual_port::VirtualPort;

/// How long the virtual MCU blocks in one read before polling for injected
/// frames and shutdown.
const POLL_TIMEOUT: Duration = Duration::from_millis(2);

/// Host-originated text frames carry 18 payload bytes, above the inbound
/// default cap.
const HOST_COMMAND_PAYLOAD_LIMIT: u8 = 18;

/// Scripted reaction of a [`VirtualLcm`] to host traffic.
///
/// Implemented for closures, so a test can fake fault modes inline:
///
/// ```
/// use lcm_core::Message;
///
/// // An MCU that ignores the first frame it receives.
/// let mut seen = 0;
/// let deaf_at_first = move |message: &Message| {
///     seen += 1;
///     if seen == 1 {
///         vec![]
///     } else {
///         message.reply_ok().into_iter().collect()
///     }
/// };
/// # let _: Box<dyn lcm_testing::McuBehavior> = Box::new(deaf_at_first);
/// ```
pub trait McuBehavior: Send {
    /// Reacts to one frame from the host, returning the messages to write
    /// back.
    fn on_frame(&mut self, message: &Message) -> Vec<Message>;
}

impl<F> McuBehavior for F
where
    F: FnMut(&Message) -> Vec<Message> + Send,
{
    fn on_frame(&mut self, message: &Message) -> Vec<Message> {
        self(message)
    }
}

/// A well-behaved MCU: acknowledges every command immediately and answers
/// version requests with the only version observed on real hardware (0.1.2).
///
/// While most likely not a 100% accurate implementation of the firmware, it
/// is sufficient to exercise the host side of the protocol.
#[derive(Debug, Copy, Clone, Default)]
pub struct ObedientMcu;

impl McuBehavior for ObedientMcu {
    fn on_frame(&mut self, message: &Message) -> Vec<Message> {
        if message.kind() != Some(Kind::Command) {
            return vec![];
        }
        let mut replies: Vec<Message> = message.reply_ok().into_iter().collect();
        if message.function() == Function::Version {
            replies.push(Message::new(Kind::Command, Function::Version, &[0x00, 0x01, 0x02]));
        }
        replies
    }
}

/// Mock implementation of the display's MCU on the far end of an in-memory
/// serial port.
///
/// Runs on its own thread: it assembles the frames the host writes, records
/// them for later assertions, and answers according to the supplied
/// [`McuBehavior`]. Unsolicited traffic (button presses) can be injected at
/// any time.
///
/// Frames are logged using the [`log`] crate for debugging purposes; run
/// tests with `RUST_LOG=debug` to watch the conversation go by.
///
/// # Examples
///
/// ```
/// use lcm_core::Message;
/// use lcm_serial::LcmOptions;
/// use lcm_testing::{ObedientMcu, VirtualLcm};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (mcu, port) = VirtualLcm::spawn(ObedientMcu);
/// let mut lcm = LcmOptions::new().attach(port)?;
///
/// lcm.send(Message::display_on())?;
/// assert_eq!(vec![Message::display_on()], mcu.history());
///
/// lcm.close()?;
/// #
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct VirtualLcm {
    inject: Sender<Message>,
    history: Arc<Mutex<Vec<Message>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl VirtualLcm {
    /// Starts a virtual MCU with the given behavior and returns it along
    /// with the host side of the serial port, ready for
    /// [`LcmOptions::attach`](lcm_serial::LcmOptions::attach).
    pub fn spawn(behavior: impl McuBehavior + 'static) -> (VirtualLcm, Box<dyn SerialPort>) {
        let (host, mut port) = VirtualPort::pair();
        port.set_timeout(POLL_TIMEOUT).unwrap(); // Virtual ports accept any timeout so safe to unwrap.

        let (inject, injected) = unbounded();
        let history = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mcu = Mcu {
            port,
            injected,
            history: Arc::clone(&history),
            shutdown: Arc::clone(&shutdown),
        };
        let thread = thread::spawn(move || mcu.run(behavior));

        (
            VirtualLcm {
                inject,
                history,
                shutdown,
                thread: Some(thread),
            },
            Box::new(host),
        )
    }

    /// Injects an unsolicited frame, as the display does on its own accord.
    pub fn send(&self, message: Message) {
        let _ = self.inject.send(message);
    }

    /// Reports a press of the given button.
    pub fn press_button(&self, button: Button) {
        self.send(Message::new(
            Kind::Command,
            Function::Button,
            &[button.to_byte()],
        ));
    }

    /// Returns every well-formed frame received from the host so far, in
    /// arrival order and without checksums.
    pub fn history(&self) -> Vec<Message> {
        self.history.lock().unwrap().clone() // Only this crate locks it so safe to unwrap.
    }
}

impl Drop for VirtualLcm {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The MCU side of the conversation, running on its own thread.
struct Mcu {
    port: VirtualPort,
    injected: Receiver<Message>,
    history: Arc<Mutex<Vec<Message>>>,
    shutdown: Arc<AtomicBool>,
}

impl Mcu {
    fn run(mut self, mut behavior: impl McuBehavior) {
        let mut assembler =
            FrameAssembler::with_limits(HOST_COMMAND_PAYLOAD_LIMIT, lcm_core::MAX_REPLY_PAYLOAD);
        let mut byte = 0u8;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            while let Ok(message) = self.injected.try_recv() {
                debug!("vmcu: inject {}", message);
                if self.port.write_all(&message.to_frame()).is_err() {
                    return;
                }
            }

            match self.port.read(std::slice::from_mut(&mut byte)) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(error) if error.kind() == io::ErrorKind::TimedOut => continue,
                Err(_) => return, // Host side is gone.
            }

            match assembler.push(byte) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    debug!("vmcu: recv {}", message);
                    assembler.reset();
                    self.history.lock().unwrap().push(message.clone()); // Only this crate locks it so safe to unwrap.
                    for reply in behavior.on_frame(&message) {
                        debug!("vmcu: send {}", reply);
                        if self.port.write_all(&reply.to_frame()).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    debug!("vmcu: {}", error);
                    assembler.reset();
                }
            }
        }
    }
}
