//! Connection manager: the interface the UI talks to.

use std::sync::Arc;
use std::time::Duration;

use crate::commands::{Command, CommandEncoder, ServoRange};
use crate::events::{channel, EventReceiver, EventSink};
use crate::listener::{ConnectionState, Listener};
use crate::transport::{SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
use crate::ProtocolError;

/// Connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub baud_rate: u32,
    /// Read timeout; also the worst-case time for the listener to notice a stop request
    pub timeout: Duration,
    pub servo_range: ServoRange,
    /// Undelivered messages the event channel holds before dropping more
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            servo_range: ServoRange::Full,
            event_capacity: 1024,
        }
    }
}

/// Owns the transport and the listener thread for one hand.
///
/// Every outcome worth showing the user is reported as exactly one
/// [`Event::Log`](crate::Event::Log) line on the event channel.
pub struct HandConnection {
    config: ConnectionConfig,
    encoder: CommandEncoder,
    transport: Option<SerialTransport>,
    listener: Option<Listener>,
    state: Arc<ConnectionState>,
    sink: EventSink,
}

impl HandConnection {
    /// Create a disconnected manager and the receiving end of its events
    pub fn new(config: ConnectionConfig) -> (Self, EventReceiver) {
        let (sink, events) = channel(config.event_capacity);
        let connection = HandConnection {
            encoder: CommandEncoder::new(config.servo_range),
            config,
            transport: None,
            listener: None,
            state: Arc::new(ConnectionState::new()),
            sink,
        };
        (connection, events)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Shared connection state
    pub fn state(&self) -> Arc<ConnectionState> {
        self.state.clone()
    }

    /// Port of the open connection
    pub fn port(&self) -> Option<String> {
        self.state.port()
    }

    /// Connected with a live listener
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open()) && self.state.is_listening()
    }

    /// Open `port` and start listening, dropping any previous connection first
    pub fn connect(&mut self, port: &str) -> Result<(), ProtocolError> {
        self.disconnect();

        let port = port.trim();
        if port.is_empty() {
            self.sink.log("No port to connect to");
            return Err(ProtocolError::PortUnavailable(String::new()));
        }

        self.sink.log(format!("Connecting to {}", port));
        let transport = match SerialTransport::open(port, self.config.baud_rate, self.config.timeout) {
            Ok(t) => t,
            Err(e) => {
                self.sink.log(format!("Failed to connect to port {}: {}", port, e));
                return Err(e);
            }
        };
        self.attach(transport)
    }

    /// Take over an already open transport and start listening on it
    pub fn attach(&mut self, transport: SerialTransport) -> Result<(), ProtocolError> {
        self.disconnect();

        let listener = match Listener::spawn(transport.clone(), self.sink.clone(), self.state.clone()) {
            Ok(l) => l,
            Err(e) => {
                transport.close();
                self.sink.log(format!("Failed to connect to port {}: {}", transport.name(), e));
                return Err(e);
            }
        };

        self.state.set_port(Some(transport.name().to_string()));
        self.transport = Some(transport);
        self.listener = Some(listener);
        Ok(())
    }

    /// Stop the listener, then close the port. Does nothing when not connected.
    pub fn disconnect(&mut self) {
        // Order matters: the listener must be joined before the port is closed
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        if let Some(transport) = self.transport.take() {
            transport.close();
            self.sink.log(format!("Disconnected from {}", transport.name()));
        }
        self.state.set_port(None);
    }

    /// Encode and write one command. Failed commands are dropped, not retried.
    pub fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        let transport = match self.transport.as_ref().filter(|t| t.is_open()) {
            Some(t) => t,
            None => {
                self.sink.log(format!("Cannot send {} - port closed", command));
                return Err(ProtocolError::NotConnected);
            }
        };

        let bytes = self.encoder.encode(command);
        log::debug!("sending {} as {}", command, fmt_bits(&bytes));
        match transport.write(&bytes) {
            Ok(()) => {
                self.sink.log(format!("Sending {} ({})", command, fmt_bits(&bytes)));
                Ok(())
            }
            Err(e) => {
                self.sink.log(format!("Failed to send {}: {}", command, e));
                Err(e)
            }
        }
    }
}

impl Drop for HandConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Format bytes as `0bxxxxxxxx` groups
fn fmt_bits(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0b{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
