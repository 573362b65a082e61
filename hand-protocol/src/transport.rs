//! Serial transport shared by the listener and the command sender.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::decoder::ByteSource;
use crate::ProtocolError;

/// Default baud rate of the hand firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Names of the serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>, ProtocolError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

pub type ReadHalf = Box<dyn Read + Send>;
pub type WriteHalf = Box<dyn Write + Send>;

struct Shared {
    name: String,
    reader: Mutex<Option<ReadHalf>>,
    writer: Mutex<Option<WriteHalf>>,
    closed: AtomicBool,
}

/// An open serial connection.
///
/// Cloning gives another handle to the same connection. The read and write
/// halves are locked separately, so one thread may read while another writes.
/// Reads must come from a single thread, as must writes.
#[derive(Clone)]
pub struct SerialTransport {
    shared: Arc<Shared>,
}

impl SerialTransport {
    /// Open a serial port (8N1, no flow control)
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ProtocolError> {
        let serial = serialport::new(port, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => ProtocolError::PortUnavailable(port.to_string()),
                serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    ProtocolError::PortUnavailable(port.to_string())
                }
                _ => ProtocolError::OpenFailed {
                    port: port.to_string(),
                    reason: e.description,
                },
            })?;

        let writer = serial.try_clone().map_err(|e| ProtocolError::OpenFailed {
            port: port.to_string(),
            reason: e.description,
        })?;

        log::info!("Opened serial port: {} at {} baud", port, baud_rate);
        Ok(Self::from_halves(port, Box::new(serial), Box::new(writer)))
    }

    /// Build a transport from separate read and write halves.
    ///
    /// The read half should report a timeout as `TimedOut` or `WouldBlock`.
    pub fn from_halves<S: Into<String>>(name: S, reader: ReadHalf, writer: WriteHalf) -> Self {
        SerialTransport {
            shared: Arc::new(Shared {
                name: name.into(),
                reader: Mutex::new(Some(reader)),
                writer: Mutex::new(Some(writer)),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    /// Read up to `n` bytes, stopping early only on timeout.
    ///
    /// Returns `ConnectionClosed` if the transport is closed before or during
    /// the read.
    pub fn read_exact(&self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        if !self.is_open() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let mut guard = self
            .shared
            .reader
            .lock()
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        let result = match guard.as_mut() {
            Some(reader) => read_until_timeout(reader.as_mut(), n, &self.shared.closed),
            None => Err(ProtocolError::ConnectionClosed),
        };
        // close() can't take the read half while we hold it, so release it here
        if !self.is_open() {
            guard.take();
        }
        result
    }

    /// Write all bytes and flush
    pub fn write(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if !self.is_open() {
            return Err(ProtocolError::NotConnected);
        }
        let mut guard = self
            .shared
            .writer
            .lock()
            .map_err(|_| ProtocolError::NotConnected)?;
        let writer = guard.as_mut().ok_or(ProtocolError::NotConnected)?;
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Close the connection.
    ///
    /// Safe to call any number of times. A read in progress returns
    /// `ConnectionClosed` once its current timeout elapses.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut writer) = self.shared.writer.lock() {
            writer.take();
        }
        if let Ok(mut reader) = self.shared.reader.try_lock() {
            reader.take();
        }
        log::info!("Closed serial port: {}", self.shared.name);
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.shared.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl ByteSource for SerialTransport {
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        SerialTransport::read_exact(self, n)
    }
}

/// Read until `n` bytes arrive, the reader times out, or `closed` is set
fn read_until_timeout<R: Read + ?Sized>(
    reader: &mut R,
    n: usize,
    closed: &AtomicBool,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        if closed.load(Ordering::Acquire) {
            return Err(ProtocolError::ConnectionClosed);
        }
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(ProtocolError::ConnectionClosed),
            Ok(k) => filled += k,
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                break;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    if closed.load(Ordering::Acquire) {
        return Err(ProtocolError::ConnectionClosed);
    }
    buf.truncate(filled);
    Ok(buf)
}
