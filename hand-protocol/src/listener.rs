//! Background listener: decodes frames off the transport and forwards them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::decoder::{Decoded, FrameDecoder};
use crate::events::EventSink;
use crate::transport::SerialTransport;
use crate::ProtocolError;

/// Connection state shared between the foreground and the listener
#[derive(Debug, Default)]
pub struct ConnectionState {
    listening: AtomicBool,
    port: Mutex<Option<String>>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the listener should keep running
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Ask the listener to stop at its next timeout
    pub fn stop_listening(&self) {
        self.listening.store(false, Ordering::Release);
    }

    fn start_listening(&self) {
        self.listening.store(true, Ordering::Release);
    }

    /// Port of the current connection
    pub fn port(&self) -> Option<String> {
        self.port.lock().ok().and_then(|p| p.clone())
    }

    pub(crate) fn set_port(&self, port: Option<String>) {
        if let Ok(mut current) = self.port.lock() {
            *current = port;
        }
    }
}

/// Handle to a running listener thread
pub struct Listener {
    handle: Option<JoinHandle<()>>,
    state: Arc<ConnectionState>,
}

impl Listener {
    /// Start listening on `transport`, forwarding to `sink` until
    /// `state.stop_listening()` is called or the transport fails.
    pub fn spawn(
        transport: SerialTransport,
        sink: EventSink,
        state: Arc<ConnectionState>,
    ) -> Result<Self, ProtocolError> {
        state.start_listening();
        let thread_state = state.clone();
        let handle = std::thread::Builder::new()
            .name("hand-listener".to_string())
            .spawn(move || run(transport, FrameDecoder::new(), sink, thread_state))
            .map_err(|e| {
                state.stop_listening();
                ProtocolError::Spawn(e)
            })?;

        Ok(Listener {
            handle: Some(handle),
            state,
        })
    }

    /// Whether the thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread to stop and wait for it.
    ///
    /// Returns within about one read timeout.
    pub fn stop(&mut self) {
        self.state.stop_listening();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("listener thread panicked");
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut transport: SerialTransport,
    mut decoder: FrameDecoder,
    sink: EventSink,
    state: Arc<ConnectionState>,
) {
    sink.log("Serial port listener started");

    while state.is_listening() {
        match decoder.decode_next(&mut transport) {
            Ok(Decoded::Message(message)) => sink.message(message),
            Ok(Decoded::Timeout) | Ok(Decoded::Discarded(_)) => {}
            Err(ProtocolError::ConnectionClosed) => {
                // A requested stop closes the port too; only report unexpected closure
                if state.is_listening() {
                    sink.log(format!("Connection to {} closed", transport.name()));
                }
                break;
            }
            Err(e) => {
                sink.log(format!("Error in listener - is the hand connected? ({})", e));
                break;
            }
        }
    }

    state.stop_listening();
    if decoder.discarded() > 0 {
        log::debug!("listener discarded {} header bytes", decoder.discarded());
    }
    sink.log("Serial port listener stopped");
}
