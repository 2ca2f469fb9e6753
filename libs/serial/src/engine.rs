use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{at, bounded, select, Receiver, Sender, TrySendError};
use serialport::{ClearBuffer, SerialPort};

use lcm_core::{FrameAssembler, Function, Kind, Message};

use crate::errors::{CloseError, OpenError, RecvError, RetryCause, SendError, TryRecvError};
use crate::logger::{Logger, NopLogger};
use crate::serial_port;

/// The serial device the LCM lives on.
pub const DEFAULT_TTY: &str = "/dev/ttyS1";

/// Default per-attempt wait for a matching reply. Replies usually arrive
/// within 10 ms.
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(15);

/// Default maximum number of attempts per send before giving up.
pub const RETRY_LIMIT: u32 = 50;

/// Default minimum pause before each write to the serial device. Writing
/// back to back corrupts frames on the observed hardware.
pub const WRITE_DELAY: Duration = Duration::from_micros(250);

/// Default pause after emitting the flush-recovery burst, giving the MCU
/// time to discard its receive buffer.
pub const FLUSH_DELAY: Duration = Duration::from_micros(250);

/// How long the reader blocks in one read call before checking for shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Capacity of the channel carrying assembled frames to the handler.
const FRAME_CHANNEL_CAPACITY: usize = 2;

/// Capacity of the channel carrying send requests to the handler.
const SEND_CHANNEL_CAPACITY: usize = 2;

/// Capacity of the application-facing receive queue. On overflow the oldest
/// undelivered message is dropped.
const RECV_QUEUE_CAPACITY: usize = 5;

/// Options for opening a [`Lcm`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use lcm_serial::{DebugLogger, LcmOptions};
///
/// # fn main() -> Result<(), lcm_serial::OpenError> {
/// let lcm = LcmOptions::new()
///     .logger(DebugLogger)
///     .reply_timeout(Duration::from_millis(25))
///     .open("/dev/ttyS1")?;
/// #
/// # Ok(()) }
/// ```
pub struct LcmOptions {
    logger: Arc<dyn Logger>,
    protocol_ack: bool,
    reply_timeout: Duration,
    retry_limit: u32,
    write_delay: Duration,
    flush_delay: Duration,
}

impl LcmOptions {
    /// Creates options with the default timings, a discarding logger, and
    /// protocol acks disabled.
    pub fn new() -> Self {
        LcmOptions {
            logger: Arc::new(NopLogger),
            protocol_ack: false,
            reply_timeout: REPLY_TIMEOUT,
            retry_limit: RETRY_LIMIT,
            write_delay: WRITE_DELAY,
            flush_delay: FLUSH_DELAY,
        }
    }

    /// Supplies a sink for the engine's diagnostic output.
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Makes the engine acknowledge every inbound command with a success
    /// reply, except version reports (acknowledging those makes the MCU
    /// think the version was requested again, looping forever).
    ///
    /// Off by default: on the observed hardware, acknowledging tends to
    /// corrupt commands sent shortly after.
    pub fn protocol_ack(mut self, enabled: bool) -> Self {
        self.protocol_ack = enabled;
        self
    }

    /// Overrides the per-attempt reply timeout ([`REPLY_TIMEOUT`]).
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Overrides the maximum attempts per send ([`RETRY_LIMIT`]).
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Overrides the pause before each write ([`WRITE_DELAY`]).
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Overrides the pause after a flush-recovery burst ([`FLUSH_DELAY`]).
    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Opens the serial device at `tty` and starts the engine.
    ///
    /// # Errors
    ///
    /// [`OpenError::Open`] if the device cannot be opened and
    /// [`OpenError::Configuration`] if it cannot be prepared (input flush,
    /// reader handle).
    pub fn open(self, tty: &str) -> Result<Lcm, OpenError> {
        let port = serial_port::open_port(tty, READ_TIMEOUT).map_err(OpenError::Open)?;
        self.start(port)
    }

    /// Configures an already-open port and starts the engine on it.
    ///
    /// This is how tests connect the engine to an in-memory port, and how
    /// embedders hand over a device they opened themselves.
    pub fn attach(self, mut port: Box<dyn SerialPort>) -> Result<Lcm, OpenError> {
        serial_port::configure_port(port.as_mut(), READ_TIMEOUT)
            .map_err(OpenError::Configuration)?;
        self.start(port)
    }

    fn start(self, port: Box<dyn SerialPort>) -> Result<Lcm, OpenError> {
        // Discard whatever half-frame the kernel buffered while nobody was
        // listening; the assembler must start on a frame boundary.
        port.clear(ClearBuffer::Input)
            .map_err(OpenError::Configuration)?;
        let read_port = port.try_clone().map_err(OpenError::Configuration)?;

        let (frame_tx, frame_rx) = bounded(FRAME_CHANNEL_CAPACITY);
        let (send_tx, send_rx) = bounded(SEND_CHANNEL_CAPACITY);
        let (queue_tx, queue_rx) = bounded(RECV_QUEUE_CAPACITY);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let shutdown = Arc::new(AtomicBool::new(false));

        let reader = Reader {
            port: read_port,
            frames: frame_tx,
            shutdown: Arc::clone(&shutdown),
            logger: Arc::clone(&self.logger),
        };
        let handler = Handler {
            port,
            queue: queue_tx,
            overflow: queue_rx.clone(),
            flush_burst: flush_burst(),
            protocol_ack: self.protocol_ack,
            reply_timeout: self.reply_timeout,
            retry_limit: self.retry_limit,
            write_delay: self.write_delay,
            flush_delay: self.flush_delay,
            logger: self.logger,
        };

        Ok(Lcm {
            sends: send_tx,
            queue: queue_rx,
            shutdown,
            cancel: Some(cancel_tx),
            reader: Some(thread::spawn(move || reader.run())),
            handler: Some(thread::spawn(move || handler.run(frame_rx, send_rx, cancel_rx))),
        })
    }
}

impl Default for LcmOptions {
    fn default() -> Self {
        LcmOptions::new()
    }
}

impl fmt::Debug for LcmOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LcmOptions")
            .field("protocol_ack", &self.protocol_ack)
            .field("reply_timeout", &self.reply_timeout)
            .field("retry_limit", &self.retry_limit)
            .field("write_delay", &self.write_delay)
            .field("flush_delay", &self.flush_delay)
            .finish_non_exhaustive()
    }
}

/// A connection to the LCM on a serial device.
///
/// Owns the device exclusively and runs two background threads: a reader
/// that assembles inbound frames and a handler that owns the write side and
/// all protocol state. [`send`] serializes commands through the handler,
/// which retries lost or rejected frames; [`recv`] yields traffic the
/// display originates, such as button presses.
///
/// # Examples
///
/// ```no_run
/// use lcm_core::{DisplayLine, Message};
/// use lcm_serial::Lcm;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut lcm = Lcm::open("/dev/ttyS1")?;
/// lcm.send(Message::display_on())?;
/// lcm.send(Message::set_display(DisplayLine::Top, 0, "Hello!")?)?;
///
/// // Wait for a button press.
/// let event = lcm.recv()?;
/// println!("display says: {}", event);
///
/// lcm.close()?;
/// #
/// # Ok(()) }
/// ```
///
/// [`send`]: Lcm::send
/// [`recv`]: Lcm::recv
#[derive(Debug)]
pub struct Lcm {
    sends: Sender<SendRequest>,
    queue: Receiver<Message>,
    shutdown: Arc<AtomicBool>,
    cancel: Option<Sender<()>>,
    reader: Option<JoinHandle<()>>,
    handler: Option<JoinHandle<()>>,
}

impl Lcm {
    /// Opens the LCM on the serial device at `tty` with default options.
    ///
    /// Equivalent to `LcmOptions::new().open(tty)`; see [`LcmOptions`] for
    /// the knobs.
    ///
    /// # Errors
    ///
    /// See [`LcmOptions::open`].
    pub fn open(tty: &str) -> Result<Lcm, OpenError> {
        LcmOptions::new().open(tty)
    }

    /// Sends a message and blocks until the display acknowledges it.
    ///
    /// The checksum is appended here; `message` must not include it. Sends
    /// from multiple threads complete in submission order. A send is
    /// considered delivered once a successful reply with the same function
    /// byte arrives; missing or failed replies are retried with flush
    /// recovery up to the retry limit.
    ///
    /// # Errors
    ///
    /// * [`SendError::Invalid`] if the message shape is malformed.
    /// * [`SendError::RetryExceeded`] if every attempt failed.
    /// * [`SendError::Transport`] if the serial device failed.
    /// * [`SendError::Cancelled`] if the engine was closed mid-send.
    /// * [`SendError::Closed`] if the engine is closed.
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        message.check()?;
        let (done_tx, done_rx) = bounded(1);
        let request = SendRequest {
            function: message.function(),
            frame: message.to_frame(),
            done: done_tx,
        };
        self.sends
            .send(request)
            .map_err(|_| SendError::Closed)?;
        match done_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(SendError::Closed),
        }
    }

    /// Blocks until the display originates a message, and returns it.
    ///
    /// This delivers commands from the display (button presses, version
    /// reports) and any replies that did not match an outstanding send, in
    /// wire order. The engine holds at most a handful of undelivered
    /// messages; if the application does not drain them, the oldest are
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`RecvError::Closed`] once the engine is closed and the queue is
    /// drained.
    pub fn recv(&self) -> Result<Message, RecvError> {
        self.queue.recv().map_err(|_| RecvError::Closed)
    }

    /// Like [`recv`](Lcm::recv), but returns immediately when no message is
    /// queued.
    ///
    /// # Errors
    ///
    /// [`TryRecvError::Empty`] if nothing is queued right now and
    /// [`TryRecvError::Closed`] once the engine is closed and drained.
    pub fn try_recv(&self) -> Result<Message, TryRecvError> {
        self.queue.try_recv().map_err(|error| match error {
            crossbeam_channel::TryRecvError::Empty => TryRecvError::Empty,
            crossbeam_channel::TryRecvError::Disconnected => TryRecvError::Closed,
        })
    }

    /// Shuts the engine down: cancels both background threads, waits for
    /// them to exit, and closes the serial device.
    ///
    /// A send in flight completes with [`SendError::Cancelled`]. Messages
    /// already queued can still be drained with
    /// [`try_recv`](Lcm::try_recv). Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`CloseError::TaskPanicked`] if a background thread panicked instead
    /// of shutting down.
    pub fn close(&mut self) -> Result<(), CloseError> {
        self.shutdown.store(true, Ordering::Relaxed);
        drop(self.cancel.take());

        let mut panicked = false;
        if let Some(handle) = self.handler.take() {
            panicked |= handle.join().is_err();
        }
        if let Some(handle) = self.reader.take() {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(CloseError::TaskPanicked);
        }
        Ok(())
    }
}

impl Drop for Lcm {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// The two flush commands written back to back to unstick the MCU.
fn flush_burst() -> Vec<u8> {
    let flush = Message::mcu_flush().to_frame();
    let mut burst = Vec::with_capacity(flush.len() * 2);
    burst.extend_from_slice(&flush);
    burst.extend_from_slice(&flush);
    burst
}

/// One queued call to [`Lcm::send`].
struct SendRequest {
    function: Function,
    frame: Vec<u8>,
    done: Sender<Result<(), SendError>>,
}

/// The send the handler is currently trying to deliver.
struct InFlight {
    request: SendRequest,
    tries: u32,
    deadline: Instant,
    last: RetryCause,
}

/// Reads the serial device byte by byte and hands assembled frames to the
/// handler. Parse errors recover by resetting the assembler; device errors
/// are fatal.
struct Reader {
    port: Box<dyn SerialPort>,
    frames: Sender<Message>,
    shutdown: Arc<AtomicBool>,
    logger: Arc<dyn Logger>,
}

impl Reader {
    fn run(mut self) {
        let mut assembler = FrameAssembler::new();
        let mut byte = 0u8;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            match self.port.read(std::slice::from_mut(&mut byte)) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(error)
                    if error.kind() == io::ErrorKind::TimedOut
                        || error.kind() == io::ErrorKind::WouldBlock
                        || error.kind() == io::ErrorKind::Interrupted =>
                {
                    continue
                }
                Err(error) => {
                    self.logger
                        .log(format_args!("read: fatal error, terminating: {}", error));
                    return;
                }
            }
            match assembler.push(byte) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    self.logger.log(format_args!("read: ok {}", message));
                    assembler.reset();
                    if self.frames.send(message).is_err() {
                        return;
                    }
                }
                Err(error) => {
                    self.logger.log(format_args!("read: {}", error));
                    assembler.reset();
                }
            }
        }
    }
}

/// Owns the write side of the serial device and all protocol state: the
/// in-flight send, its retry counter and deadline, and the receive queue.
struct Handler {
    port: Box<dyn SerialPort>,
    queue: Sender<Message>,
    overflow: Receiver<Message>,
    flush_burst: Vec<u8>,
    protocol_ack: bool,
    reply_timeout: Duration,
    retry_limit: u32,
    write_delay: Duration,
    flush_delay: Duration,
    logger: Arc<dyn Logger>,
}

impl Handler {
    fn run(
        mut self,
        frames: Receiver<Message>,
        sends: Receiver<SendRequest>,
        cancel: Receiver<()>,
    ) {
        let mut pending: Option<InFlight> = None;
        loop {
            let completed = match pending.as_mut() {
                Some(inflight) => {
                    select! {
                        recv(frames) -> frame => match frame {
                            Ok(message) => self.on_frame_awaiting(message, inflight),
                            Err(_) => {
                                // The reader died; no reply can ever arrive.
                                let _ = inflight.request.done.send(Err(SendError::Transport(
                                    io::Error::new(io::ErrorKind::BrokenPipe, "reader task terminated"),
                                )));
                                return;
                            }
                        },
                        recv(at(inflight.deadline)) -> _ => self.on_timeout(inflight),
                        recv(cancel) -> _ => {
                            let _ = inflight.request.done.send(Err(SendError::Cancelled));
                            return;
                        }
                    }
                }
                None => {
                    // Drain inbound traffic before taking on a new send.
                    if let Ok(message) = frames.try_recv() {
                        self.on_frame_idle(message);
                        continue;
                    }
                    select! {
                        recv(frames) -> frame => match frame {
                            Ok(message) => self.on_frame_idle(message),
                            Err(_) => return,
                        },
                        recv(sends) -> request => match request {
                            Ok(request) => {
                                self.logger.log(format_args!(
                                    "handle: send {:02X?}", request.frame
                                ));
                                let mut inflight = InFlight {
                                    request,
                                    tries: 0,
                                    deadline: Instant::now(),
                                    last: RetryCause::Timeout,
                                };
                                if !self.write_attempt(&mut inflight) {
                                    pending = Some(inflight);
                                }
                            }
                            Err(_) => return,
                        },
                        recv(cancel) -> _ => return,
                    }
                    false
                }
            };
            if completed {
                pending = None;
            }
        }
    }

    /// Writes the in-flight frame after the mandatory pause and re-arms the
    /// reply deadline. Returns `true` if the send completed (with a
    /// transport failure).
    fn write_attempt(&mut self, inflight: &mut InFlight) -> bool {
        thread::sleep(self.write_delay);
        inflight.tries += 1;
        if let Err(error) = self.port.write_all(&inflight.request.frame) {
            self.logger
                .log(format_args!("write: failed: {}", error));
            let _ = inflight.request.done.send(Err(SendError::Transport(error)));
            return true;
        }
        inflight.deadline = Instant::now() + self.reply_timeout;
        false
    }

    /// Handles a frame while a send is awaiting its reply. Returns `true` if
    /// the frame completed the send.
    fn on_frame_awaiting(&mut self, message: Message, inflight: &mut InFlight) -> bool {
        match message.kind() {
            Some(Kind::Reply) if message.function() == Function::Flush => {
                self.logger
                    .log(format_args!("handle: flush acknowledged"));
                false
            }
            Some(Kind::Reply) if message.function() == inflight.request.function => {
                if message.ok() {
                    let _ = inflight.request.done.send(Ok(()));
                    return true;
                }
                let code = message.value().first().copied().unwrap_or(0);
                self.logger.log(format_args!(
                    "handle: error reply {:#04x} for {}, try {}",
                    code,
                    message.function(),
                    inflight.tries
                ));
                inflight.last = RetryCause::ErrorReply(code);
                // The MCU answered, so its receive buffer is fine; retry
                // without a flush.
                self.retry_or_fail(inflight)
            }
            Some(Kind::Reply) => {
                self.logger
                    .log(format_args!("handle: unmatched reply {}", message));
                self.forward(message);
                false
            }
            Some(Kind::Command) => {
                self.on_command(message);
                false
            }
            None => {
                self.logger
                    .log(format_args!("handle: discarding invalid frame {}", message));
                false
            }
        }
    }

    /// Handles a frame while no send is outstanding.
    fn on_frame_idle(&mut self, message: Message) {
        match message.kind() {
            Some(Kind::Command) => self.on_command(message),
            Some(Kind::Reply) if message.function() == Function::Flush => {
                self.logger
                    .log(format_args!("handle: flush acknowledged"));
            }
            Some(Kind::Reply) => {
                self.logger
                    .log(format_args!("handle: unmatched reply {}", message));
                self.forward(message);
            }
            None => {
                self.logger
                    .log(format_args!("handle: discarding invalid frame {}", message));
            }
        }
    }

    /// The reply deadline fired: unstick the MCU and retry. Returns `true`
    /// if the send completed (retries exhausted or transport failure).
    fn on_timeout(&mut self, inflight: &mut InFlight) -> bool {
        self.logger.log(format_args!(
            "handle: reply timeout for {}, try {}",
            inflight.request.function, inflight.tries
        ));
        inflight.last = RetryCause::Timeout;
        if let Err(error) = self.port.write_all(&self.flush_burst) {
            // The retry write will surface the failure if the port is gone.
            self.logger
                .log(format_args!("write: flush burst failed: {}", error));
        }
        thread::sleep(self.flush_delay);
        self.retry_or_fail(inflight)
    }

    /// Re-sends the in-flight frame, or fails the send once the retry limit
    /// is reached. Returns `true` if the send completed.
    fn retry_or_fail(&mut self, inflight: &mut InFlight) -> bool {
        if inflight.tries >= self.retry_limit {
            let _ = inflight.request.done.send(Err(SendError::RetryExceeded {
                tries: inflight.tries,
                last: inflight.last,
            }));
            return true;
        }
        self.write_attempt(inflight)
    }

    /// Handles a command originated by the display: optionally acknowledges
    /// it, then forwards it to the application.
    fn on_command(&mut self, message: Message) {
        self.logger
            .log(format_args!("handle: command {}", message));
        // Never ack a version report: the MCU takes the ack as a fresh
        // version request and reports again, forever.
        if self.protocol_ack && message.function() != Function::Version {
            if let Some(reply) = message.reply_ok() {
                thread::sleep(self.write_delay);
                if let Err(error) = self.port.write_all(&reply.to_frame()) {
                    self.logger
                        .log(format_args!("write: ack failed: {}", error));
                }
            }
        }
        self.forward(message);
    }

    /// Queues a message for the application, dropping the oldest queued
    /// message when the queue is full. Never blocks.
    fn forward(&mut self, message: Message) {
        match self.queue.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                self.logger.log(format_args!(
                    "handle: receive queue full, discarding earliest message"
                ));
                let _ = self.overflow.try_recv();
                let _ = self.queue.try_send(message);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = LcmOptions::new();
        assert!(!options.protocol_ack);
        assert_eq!(REPLY_TIMEOUT, options.reply_timeout);
        assert_eq!(RETRY_LIMIT, options.retry_limit);
        assert_eq!(WRITE_DELAY, options.write_delay);
        assert_eq!(FLUSH_DELAY, options.flush_delay);
    }

    #[test]
    fn flush_burst_bytes() {
        assert_eq!(
            vec![0xF0, 0x01, 0x00, 0x00, 0xF1, 0xF0, 0x01, 0x00, 0x00, 0xF1],
            flush_burst()
        );
    }
}
