use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// The baud rate the LCM communicates at.
pub const BAUD_RATE: u32 = 115_200;

/// Opens and configures the serial device at `tty` for LCM communication.
///
/// The MCU requires 8N1 format at 115200 baud with no flow control; the port
/// is opened in raw mode. `timeout` bounds individual read and write calls.
///
/// # Errors
///
/// Returns the underlying [`serialport::Error`] if the device cannot be
/// opened.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// # fn main() -> Result<(), serialport::Error> {
/// let port = lcm_serial::open_port("/dev/ttyS1", Duration::from_millis(50))?;
/// // Now ready for communication with the display (8N1 115200 baud).
/// #
/// # Ok(()) }
/// ```
pub fn open_port(tty: &str, timeout: Duration) -> serialport::Result<Box<dyn SerialPort>> {
    serialport::new(tty, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()
}

/// Configures an already-open serial port appropriately for use with the LCM.
///
/// Useful when the port comes from somewhere else, such as the in-memory
/// ports used in tests.
///
/// # Errors
///
/// Returns the underlying [`serialport::Error`] if the port rejects a
/// setting.
pub fn configure_port(port: &mut dyn SerialPort, timeout: Duration) -> serialport::Result<()> {
    port.set_baud_rate(BAUD_RATE)?;
    port.set_data_bits(DataBits::Eight)?;
    port.set_parity(Parity::None)?;
    port.set_stop_bits(StopBits::One)?;
    port.set_flow_control(FlowControl::None)?;
    port.set_timeout(timeout)?;
    Ok(())
}
