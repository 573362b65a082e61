//! Console line commands.

use hand_protocol::{Command, Preset, Servo};

pub const HELP: &str = "\
Commands:
  connect [port]          Connect (to the only available port if none given)
  disconnect              Close the connection
  ports                   List available serial ports
  servo <servo> <value>   Move a servo; servo is 0-5 or a name like thumb1
  config <preset|id>      Apply a preset (zeros, ascending, descending,
                          alternating, invalid) or a raw id 0-127
  positions               Ask for all servo positions
  limits                  Ask for all servo limits
  force                   Ask for one force reading
  stream                  Toggle force streaming
  status                  Show connection status
  help                    Show this help
  quit                    Disconnect and exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect(Option<String>),
    Disconnect,
    Ports,
    Send(Command),
    Status,
    Help,
    Quit,
}

/// Parse one line of input. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match verb.to_lowercase().as_str() {
        "connect" => ConsoleCommand::Connect(if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        }),
        "disconnect" => ConsoleCommand::Disconnect,
        "ports" => ConsoleCommand::Ports,
        "servo" => ConsoleCommand::Send(parse_servo(&rest)?),
        "config" => ConsoleCommand::Send(parse_config(&rest)?),
        "positions" => ConsoleCommand::Send(Command::QueryPositions),
        "limits" => ConsoleCommand::Send(Command::QueryLimits),
        "force" => ConsoleCommand::Send(Command::QueryForce),
        "stream" => ConsoleCommand::Send(Command::ToggleForceStream),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command '{}' - type `help`", other)),
    };
    Ok(Some(command))
}

/// `servo <servo> <value>`; the servo name may contain a space ("thumb 1")
fn parse_servo(args: &[&str]) -> Result<Command, String> {
    let usage = "Usage: servo <servo> <value>";
    let (value, servo) = args.split_last().ok_or(usage)?;
    if servo.is_empty() {
        return Err(usage.to_string());
    }
    let servo: Servo = servo.join(" ").parse()?;
    let value: i64 = value
        .parse()
        .map_err(|_| format!("Servo value must be a number, got '{}'", value))?;
    Ok(Command::move_servo(servo, value))
}

fn parse_config(args: &[&str]) -> Result<Command, String> {
    match args {
        [arg] => match arg.parse::<i64>() {
            Ok(id) => Ok(Command::set_config(id)),
            Err(_) => Ok(Command::preset(arg.parse::<Preset>()?)),
        },
        _ => Err("Usage: config <preset|id>".to_string()),
    }
}
