use std::io::{self, Read, Write};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

/// An in-memory serial port.
///
/// Ports come in cross-wired pairs: what one side writes, the other reads.
/// Reads honor the configured timeout, `clear` discards buffered input, and
/// `try_clone` returns a second handle onto the same pipe, which is exactly
/// the surface the protocol engine needs from a real device.
///
/// # Examples
///
/// ```
/// use std::io::{Read, Write};
/// use lcm_testing::VirtualPort;
///
/// let (mut host, mut device) = VirtualPort::pair();
/// host.write_all(&[0xF0, 0x01]).unwrap();
///
/// let mut buf = [0u8; 2];
/// device.read_exact(&mut buf).unwrap();
/// assert_eq!([0xF0, 0x01], buf);
/// ```
#[derive(Debug, Clone)]
pub struct VirtualPort {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    // Weird defaults so tests can verify the engine actually configures the
    // port.
    baud_rate: u32,
    data_bits: DataBits,
    flow_control: FlowControl,
    parity: Parity,
    stop_bits: StopBits,
    timeout: Duration,
}

impl VirtualPort {
    /// Creates a cross-wired pair of ports.
    pub fn pair() -> (VirtualPort, VirtualPort) {
        let (tx0, rx0) = unbounded();
        let (tx1, rx1) = unbounded();
        (VirtualPort::new(tx0, rx1), VirtualPort::new(tx1, rx0))
    }

    fn new(tx: Sender<u8>, rx: Receiver<u8>) -> Self {
        VirtualPort {
            tx,
            rx,
            baud_rate: 110,
            data_bits: DataBits::Seven,
            flow_control: FlowControl::Software,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            timeout: Duration::from_millis(100),
        }
    }
}

impl Read for VirtualPort {
    /// Blocks for up to the configured timeout until at least one byte is
    /// available, then drains whatever else is already buffered.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        buf[0] = self.rx.recv_timeout(self.timeout).map_err(|error| match error {
            RecvTimeoutError::Timeout => {
                io::Error::new(io::ErrorKind::TimedOut, "virtual port read timed out")
            }
            RecvTimeoutError::Disconnected => {
                io::Error::new(io::ErrorKind::BrokenPipe, "virtual port peer is gone")
            }
        })?;
        let mut filled = 1;
        while filled < buf.len() {
            match self.rx.try_recv() {
                Ok(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                Err(_) => break,
            }
        }
        Ok(filled)
    }
}

impl Write for VirtualPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.tx.send(byte).map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "virtual port peer is gone")
            })?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialPort for VirtualPort {
    fn name(&self) -> Option<String> {
        Some("virtual".to_string())
    }

    fn baud_rate(&self) -> serialport::Result<u32> {
        Ok(self.baud_rate)
    }

    fn data_bits(&self) -> serialport::Result<DataBits> {
        Ok(self.data_bits)
    }

    fn flow_control(&self) -> serialport::Result<FlowControl> {
        Ok(self.flow_control)
    }

    fn parity(&self) -> serialport::Result<Parity> {
        Ok(self.parity)
    }

    fn stop_bits(&self) -> serialport::Result<StopBits> {
        Ok(self.stop_bits)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> serialport::Result<()> {
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn set_data_bits(&mut self, data_bits: DataBits) -> serialport::Result<()> {
        self.data_bits = data_bits;
        Ok(())
    }

    fn set_flow_control(&mut self, flow_control: FlowControl) -> serialport::Result<()> {
        self.flow_control = flow_control;
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> serialport::Result<()> {
        self.parity = parity;
        Ok(())
    }

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> serialport::Result<()> {
        self.stop_bits = stop_bits;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> serialport::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn write_request_to_send(&mut self, _level: bool) -> serialport::Result<()> {
        Ok(())
    }

    fn write_data_terminal_ready(&mut self, _level: bool) -> serialport::Result<()> {
        Ok(())
    }

    fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
        Ok(false)
    }

    fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
        Ok(false)
    }

    fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
        Ok(false)
    }

    fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
        Ok(false)
    }

    fn bytes_to_read(&self) -> serialport::Result<u32> {
        Ok(self.rx.len() as u32)
    }

    fn bytes_to_write(&self) -> serialport::Result<u32> {
        Ok(0)
    }

    fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
        match buffer_to_clear {
            ClearBuffer::Input | ClearBuffer::All => {
                while self.rx.try_recv().is_ok() {}
            }
            ClearBuffer::Output => {}
        }
        Ok(())
    }

    fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
        Ok(Box::new(self.clone()))
    }

    fn set_break(&self) -> serialport::Result<()> {
        Ok(())
    }

    fn clear_break(&self) -> serialport::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_times_out_when_idle() {
        let (mut host, _device) = VirtualPort::pair();
        host.set_timeout(Duration::from_millis(1)).unwrap();
        let mut buf = [0u8; 1];
        let error = host.read(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::TimedOut, error.kind());
    }

    #[test]
    fn read_reports_gone_peer() {
        let (mut host, device) = VirtualPort::pair();
        drop(device);
        let mut buf = [0u8; 1];
        let error = host.read(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::BrokenPipe, error.kind());
    }

    #[test]
    fn clear_discards_buffered_input() {
        let (mut host, mut device) = VirtualPort::pair();
        device.write_all(&[1, 2, 3]).unwrap();
        host.clear(ClearBuffer::Input).unwrap();
        assert_eq!(0, host.bytes_to_read().unwrap());
    }

    #[test]
    fn clones_share_the_pipe() {
        let (host, mut device) = VirtualPort::pair();
        let mut clone = host.try_clone().unwrap();
        device.write_all(&[7]).unwrap();
        let mut buf = [0u8; 1];
        clone.read_exact(&mut buf).unwrap();
        assert_eq!([7], buf);
    }
}
