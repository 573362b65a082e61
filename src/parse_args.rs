use hand_protocol::ServoRange;
use std::time::Duration;

const HELP: &str = "\
Hand Controller - serial console for the robotic hand

Type `help` once running for the list of console commands.

USAGE:
  hand-controller [OPTIONS]

OPTIONS:
  -h, --help             Prints help information
  -l, --list             List available serial ports and exit
  -p, --port <name>      Serial port to connect to on start
  --baud <rate>          Baud rate (default: 9600)
  --timeout-ms <ms>      Read timeout in milliseconds (default: 1000)
  --servo-range <max>    Servo value limit, 255 or 180 (default: 255)
  --tick-ms <ms>         Console refresh interval (default: 50)
  -v, --verbose          Show connection events
  -vv, --trace           Show protocol bytes and decoded frames
  -vvv, --trace-bytes    Show everything, including discarded bytes
  --log <file>           Write diagnostics to file instead of stderr
";

/// Verbosity level for debug output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    #[default]
    Quiet = 0,
    /// Connection events
    Verbose = 1,
    /// Protocol bytes and frames
    Trace = 2,
    /// Everything
    TraceBytes = 3,
}

impl Verbosity {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Quiet => log::LevelFilter::Warn,
            Verbosity::Verbose => log::LevelFilter::Info,
            Verbosity::Trace => log::LevelFilter::Debug,
            Verbosity::TraceBytes => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug)]
pub struct AppArgs {
    pub list_ports: bool,
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub servo_range: ServoRange,
    pub tick: Duration,
    pub verbosity: Verbosity,
    pub log_file: Option<String>,
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let verbosity = if pargs.contains("--trace-bytes") || pargs.contains("-vvv") {
        Verbosity::TraceBytes
    } else if pargs.contains("--trace") || pargs.contains("-vv") {
        Verbosity::Trace
    } else if pargs.contains(["-v", "--verbose"]) {
        Verbosity::Verbose
    } else {
        Verbosity::Quiet
    };

    let args = AppArgs {
        list_ports: pargs.contains(["-l", "--list"]),
        port: pargs.opt_value_from_str(["-p", "--port"])?,
        baud_rate: pargs
            .opt_value_from_str("--baud")?
            .unwrap_or(hand_protocol::transport::DEFAULT_BAUD_RATE),
        timeout: pargs
            .opt_value_from_str("--timeout-ms")?
            .map(Duration::from_millis)
            .unwrap_or(hand_protocol::transport::DEFAULT_TIMEOUT),
        servo_range: pargs.opt_value_from_str("--servo-range")?.unwrap_or_default(),
        tick: Duration::from_millis(pargs.opt_value_from_str("--tick-ms")?.unwrap_or(50)),
        verbosity,
        log_file: pargs.opt_value_from_str("--log")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}
