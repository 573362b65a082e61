//! End-to-end tests of `HandConnection` against an in-memory device.

use hand_protocol::{
    Command, ConnectionConfig, Event, EventReceiver, HandConnection, Message, Preset,
    ProtocolError, SerialTransport, Servo, ServoRange,
};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_millis(50);

/// Device end of the link: bytes the hand "sends", and bytes it received
struct FakeHand {
    tx: Option<Sender<Vec<u8>>>,
    received: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl FakeHand {
    fn send(&self, message: &Message) {
        if let Some(tx) = &self.tx {
            tx.send(message.encode()).unwrap();
        }
    }

    fn send_raw(&self, bytes: &[u8]) {
        if let Some(tx) = &self.tx {
            tx.send(bytes.to_vec()).unwrap();
        }
    }

    fn unplug(&mut self) {
        self.tx = None;
    }

    fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

struct HostReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for HostReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(TIMEOUT) {
                Ok(bytes) => self.pending = bytes,
                Err(RecvTimeoutError::Timeout) => return Err(std::io::ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct HostWriter {
    received: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl Write for HostWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if *self.fail_writes.lock().unwrap() {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"));
        }
        self.received.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn link(name: &str) -> (SerialTransport, FakeHand) {
    let (tx, rx) = mpsc::channel();
    let received = Arc::new(Mutex::new(Vec::new()));
    let fail_writes = Arc::new(Mutex::new(false));
    let transport = SerialTransport::from_halves(
        name,
        Box::new(HostReader {
            rx,
            pending: Vec::new(),
        }),
        Box::new(HostWriter {
            received: received.clone(),
            fail_writes: fail_writes.clone(),
        }),
    );
    let hand = FakeHand {
        tx: Some(tx),
        received,
        fail_writes,
    };
    (transport, hand)
}

fn config() -> ConnectionConfig {
    ConnectionConfig {
        timeout: TIMEOUT,
        ..ConnectionConfig::default()
    }
}

/// Drain events until `done` holds or two seconds pass
fn collect_until<F: Fn(&[Event]) -> bool>(events: &EventReceiver, done: F) -> Vec<Event> {
    let mut seen = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done(seen.as_slice()) && Instant::now() < deadline {
        seen.extend(events.drain());
        std::thread::sleep(Duration::from_millis(5));
    }
    seen
}

fn messages(events: &[Event]) -> Vec<Message> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Message(m) => Some(m.clone()),
            Event::Log(_) => None,
        })
        .collect()
}

#[test]
fn query_positions_round_trip() {
    let (mut conn, events) = HandConnection::new(config());
    let (transport, hand) = link("fake0");
    conn.attach(transport).unwrap();
    assert!(conn.is_connected());
    assert_eq!(conn.port().as_deref(), Some("fake0"));

    conn.send(&Command::QueryPositions).unwrap();
    assert_eq!(hand.received(), vec![0x08]);

    hand.send(&Message::AllServoPositions([10, 20, 30, 40, 50, 60]));
    let seen = collect_until(&events, |s| !messages(s).is_empty());
    assert_eq!(
        messages(&seen),
        vec![Message::AllServoPositions([10, 20, 30, 40, 50, 60])]
    );
    assert!(seen.contains(&Event::Log("Sending query positions (0b00001000)".to_string())));

    conn.disconnect();
    assert!(!conn.is_connected());
}

#[test]
fn mixed_stream_with_garbage_and_split_writes() {
    let (mut conn, events) = HandConnection::new(config());
    let (transport, hand) = link("fake1");
    conn.attach(transport).unwrap();

    hand.send_raw(&[0b0111_1000, 0x0B]);
    hand.send(&Message::Text("Servo 5 set to 255".to_string()));
    // A force frame delivered in three pieces with a timeout in between
    let force = Message::RawForceReading {
        timestamp_ms: 1000,
        reading: 500,
    }
    .encode();
    hand.send_raw(&force[..2]);
    std::thread::sleep(TIMEOUT * 2);
    hand.send_raw(&force[2..5]);
    hand.send_raw(&force[5..]);

    let seen = collect_until(&events, |s| messages(s).len() == 2);
    assert_eq!(
        messages(&seen),
        vec![
            Message::Text("Servo 5 set to 255".to_string()),
            Message::RawForceReading {
                timestamp_ms: 1000,
                reading: 500
            },
        ]
    );
}

#[test]
fn servo_commands_follow_configured_range() {
    let (mut conn, _events) = HandConnection::new(ConnectionConfig {
        servo_range: ServoRange::Degrees,
        ..config()
    });
    let (transport, hand) = link("fake2");
    conn.attach(transport).unwrap();

    conn.send(&Command::move_servo(Servo::Thumb1, 300)).unwrap();
    conn.send(&Command::preset(Preset::Ascending)).unwrap();
    conn.send(&Command::set_config(500)).unwrap();
    assert_eq!(hand.received(), vec![0x05, 180, 0x81, 0xFF]);
}

#[test]
fn write_failure_is_logged_and_dropped() {
    let (mut conn, events) = HandConnection::new(config());
    let (transport, hand) = link("fake3");
    conn.attach(transport).unwrap();

    *hand.fail_writes.lock().unwrap() = true;
    let result = conn.send(&Command::QueryLimits);
    assert!(matches!(result, Err(ProtocolError::Io(_))));

    let seen = collect_until(&events, |s| {
        s.iter()
            .any(|e| matches!(e, Event::Log(l) if l.starts_with("Failed to send query limits")))
    });
    assert_eq!(
        seen.iter()
            .filter(|e| matches!(e, Event::Log(l) if l.starts_with("Failed to send")))
            .count(),
        1
    );

    // The connection itself is still usable once the device recovers
    *hand.fail_writes.lock().unwrap() = false;
    conn.send(&Command::QueryLimits).unwrap();
    assert_eq!(hand.received(), vec![0x09]);
}

#[test]
fn unplugging_mid_frame_delivers_nothing() {
    let (mut conn, events) = HandConnection::new(config());
    let (transport, mut hand) = link("fake4");
    conn.attach(transport).unwrap();

    hand.send_raw(&[0x09, 1, 2, 3]);
    hand.unplug();

    let seen = collect_until(&events, |s| {
        s.contains(&Event::Log("Serial port listener stopped".to_string()))
    });
    assert!(messages(&seen).is_empty());
    assert!(seen.contains(&Event::Log("Connection to fake4 closed".to_string())));
    assert!(!conn.is_connected());

    // Still safe to tear down afterwards
    conn.disconnect();
    conn.disconnect();
}

#[test]
fn closure_is_reported_when_telemetry_backs_up() {
    let (mut conn, events) = HandConnection::new(ConnectionConfig {
        event_capacity: 4,
        ..config()
    });
    let (transport, mut hand) = link("fake7");
    conn.attach(transport).unwrap();

    for position in 0..10 {
        hand.send(&Message::ServoPosition { servo: 1, position });
    }
    hand.unplug();

    // Nothing is drained while the listener runs, so the channel fills up
    let deadline = Instant::now() + Duration::from_secs(2);
    while conn.is_connected() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!conn.is_connected());

    let seen = events.drain();
    assert_eq!(messages(&seen).len(), 4);
    assert_eq!(events.dropped(), 6);
    assert!(seen.contains(&Event::Log("Serial port listener started".to_string())));
    assert!(seen.contains(&Event::Log("Connection to fake7 closed".to_string())));
    conn.disconnect();
}

#[test]
fn disconnect_returns_within_one_timeout() {
    let (mut conn, events) = HandConnection::new(config());
    let (transport, _hand) = link("fake5");
    conn.attach(transport.clone()).unwrap();
    std::thread::sleep(TIMEOUT * 2);

    let start = Instant::now();
    conn.disconnect();
    assert!(start.elapsed() < TIMEOUT * 3);
    assert!(!transport.is_open());

    let seen = collect_until(&events, |s| {
        s.contains(&Event::Log("Disconnected from fake5".to_string()))
    });
    assert!(seen.contains(&Event::Log("Serial port listener stopped".to_string())));
    assert!(matches!(
        conn.send(&Command::QueryForce),
        Err(ProtocolError::NotConnected)
    ));
}

#[test]
fn reconnect_replaces_previous_listener() {
    let (mut conn, events) = HandConnection::new(config());
    let (first, _first_hand) = link("first");
    let (second, second_hand) = link("second");

    conn.attach(first.clone()).unwrap();
    conn.attach(second).unwrap();
    assert!(!first.is_open());
    assert_eq!(conn.port().as_deref(), Some("second"));

    second_hand.send(&Message::ServoPosition {
        servo: 2,
        position: 77,
    });
    let seen = collect_until(&events, |s| !messages(s).is_empty());
    assert_eq!(
        messages(&seen),
        vec![Message::ServoPosition {
            servo: 2,
            position: 77
        }]
    );
    let started = seen
        .iter()
        .filter(|e| **e == Event::Log("Serial port listener started".to_string()))
        .count();
    assert_eq!(started, 2);
}
