//! Diagnostics logger writing to stderr or a file.
//!
//! Installed as the `log` backend so records from `hand_protocol` end up here too.

use crate::parse_args::Verbosity;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex};

enum Output {
    Stderr,
    File(BufWriter<File>),
}

/// Thread-safe logger
#[derive(Clone)]
pub struct Logger {
    output: Arc<Mutex<Output>>,
    verbosity: Verbosity,
}

impl Logger {
    /// Create a new logger writing to stderr
    pub fn stderr(verbosity: Verbosity) -> Self {
        Logger {
            output: Arc::new(Mutex::new(Output::Stderr)),
            verbosity,
        }
    }

    /// Create a new logger writing to a file
    pub fn file(path: &str, verbosity: Verbosity) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Logger {
            output: Arc::new(Mutex::new(Output::File(BufWriter::new(file)))),
            verbosity,
        })
    }

    /// Route `log` records through this logger
    pub fn install(&self) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(self.verbosity.level_filter());
        Ok(())
    }

    /// Get verbosity level
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Log a message if verbosity level is met
    pub fn log(&self, level: Verbosity, msg: &str) {
        if self.verbosity >= level {
            self.write_line(msg);
        }
    }

    /// Log at Verbose level
    pub fn verbose(&self, msg: &str) {
        self.log(Verbosity::Verbose, msg);
    }

    /// Always log (for errors, important info)
    pub fn info(&self, msg: &str) {
        self.write_line(msg);
    }

    fn write_line(&self, msg: &str) {
        let line = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), msg);
        if let Ok(mut output) = self.output.lock() {
            match &mut *output {
                Output::Stderr => {
                    eprintln!("{}", line);
                }
                Output::File(f) => {
                    let _ = writeln!(f, "{}", line);
                    let _ = f.flush();
                }
            }
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.verbosity.level_filter()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.write_line(&format!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            ));
        }
    }

    fn flush(&self) {
        if let Ok(mut output) = self.output.lock() {
            if let Output::File(f) = &mut *output {
                let _ = f.flush();
            }
        }
    }
}
