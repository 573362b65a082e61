mod console;
mod logger;
mod parse_args;

use console::{parse_line, ConsoleCommand};
use hand_protocol::{available_ports, ConnectionConfig, Event, EventReceiver, HandConnection};
use logger::Logger;
use parse_args::parse_args;

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            std::process::exit(1);
        }
    };

    if args.list_ports {
        print_ports();
        return;
    }

    let logger = match &args.log_file {
        Some(path) => match Logger::file(path, args.verbosity) {
            Ok(l) => {
                eprintln!("Logging to: {}", path);
                l
            }
            Err(e) => {
                eprintln!("Failed to open log file '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => Logger::stderr(args.verbosity),
    };
    if let Err(e) = logger.install() {
        eprintln!("Failed to install logger: {}", e);
    }

    let config = ConnectionConfig {
        baud_rate: args.baud_rate,
        timeout: args.timeout,
        servo_range: args.servo_range,
        ..ConnectionConfig::default()
    };
    logger.verbose(&format!(
        "[HAND] {:?} logging, {} baud, {:?} timeout, servo values up to {}",
        logger.verbosity(),
        config.baud_rate,
        config.timeout,
        config.servo_range.max()
    ));

    let (mut hand, events) = HandConnection::new(config);
    println!("Connect to a device to start. Type `help` for commands.");

    match &args.port {
        Some(port) => {
            let _ = hand.connect(port);
        }
        None => connect_default(&mut hand, &logger),
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_stdin = shutdown.clone();

    // Set up stdin reader thread
    let (tx_stdin, rx_stdin): (Sender<String>, Receiver<String>) = mpsc::channel();
    let _stdin_thread = std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx_stdin.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        // Signal EOF
        shutdown_stdin.store(true, Ordering::Relaxed);
    });

    while !shutdown.load(Ordering::Relaxed) {
        while let Ok(line) = rx_stdin.try_recv() {
            match parse_line(&line) {
                Ok(Some(ConsoleCommand::Quit)) => {
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                Ok(Some(command)) => run_command(command, &mut hand, &logger),
                Ok(None) => {}
                Err(usage) => println!("{}", usage),
            }
        }

        print_events(&events);
        std::thread::sleep(args.tick);
    }

    println!("Stopping...");
    hand.disconnect();
    print_events(&events);
    if events.dropped() > 0 {
        logger.info(&format!("[HAND] {} messages dropped (console too slow)", events.dropped()));
    }
}

fn run_command(command: ConsoleCommand, hand: &mut HandConnection, logger: &Logger) {
    match command {
        ConsoleCommand::Connect(Some(port)) => {
            let _ = hand.connect(&port);
        }
        ConsoleCommand::Connect(None) => connect_default(hand, logger),
        ConsoleCommand::Disconnect => hand.disconnect(),
        ConsoleCommand::Ports => print_ports(),
        ConsoleCommand::Send(cmd) => {
            // Failures are already reported on the event channel
            let _ = hand.send(&cmd);
        }
        ConsoleCommand::Status => match hand.port() {
            Some(port) if hand.is_connected() => println!("Connected to {}", port),
            Some(port) => println!("Connection to {} is down", port),
            None => println!("Not connected"),
        },
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
}

/// Connect to the only available port, or list the choices
fn connect_default(hand: &mut HandConnection, logger: &Logger) {
    match available_ports() {
        Ok(ports) if ports.len() == 1 => {
            let _ = hand.connect(&ports[0]);
        }
        Ok(ports) if ports.is_empty() => println!("No device detected"),
        Ok(ports) => {
            println!("{} devices detected, use `connect <port>`:", ports.len());
            for port in ports {
                println!("  {}", port);
            }
        }
        Err(e) => logger.info(&format!("[HAND] Failed to list ports: {}", e)),
    }
}

fn print_ports() {
    match available_ports() {
        Ok(ports) if ports.is_empty() => println!("No device detected"),
        Ok(ports) => {
            for port in ports {
                println!("{}", port);
            }
        }
        Err(e) => eprintln!("Failed to list ports: {}", e),
    }
}

/// Print every pending event
fn print_events(events: &EventReceiver) {
    for event in events.drain() {
        match event {
            Event::Log(line) => println!("{}", line),
            Event::Message(message) => println!("{}", message),
        }
    }
}
