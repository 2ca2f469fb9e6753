use std::fmt;

/// Sink for the engine's diagnostic output.
///
/// The engine deliberately avoids a global logger: it is usually embedded in
/// a daemon that already has opinions about logging, so the sink is injected
/// per engine via [`LcmOptions::logger`](crate::LcmOptions::logger) and
/// defaults to [`NopLogger`].
pub trait Logger: Send + Sync {
    /// Records one formatted line.
    fn log(&self, args: fmt::Arguments<'_>);
}

/// A [`Logger`] that discards everything. The default.
#[derive(Debug, Copy, Clone, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn log(&self, _args: fmt::Arguments<'_>) {}
}

/// A [`Logger`] that forwards to the [`log`] crate at debug level.
///
/// Binaries that use `env_logger` can watch the protocol traffic go by with
/// `RUST_LOG=debug`.
///
/// # Examples
///
/// ```no_run
/// use lcm_serial::{DebugLogger, LcmOptions};
///
/// # fn main() -> Result<(), lcm_serial::OpenError> {
/// let lcm = LcmOptions::new().logger(DebugLogger).open("/dev/ttyS1")?;
/// #
/// # Ok(()) }
/// ```
#[derive(Debug, Copy, Clone, Default)]
pub struct DebugLogger;

impl Logger for DebugLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        log::debug!("{}", args);
    }
}
