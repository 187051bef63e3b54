//! Operator console: one JSON command per line.
//!
//! ```text
//! {"type":"emergency_stop","unit":1}
//! {"type":"start","unit":1}
//! {"type":"set_target_speed","unit":2,"rpm":1500}
//! ```

use plc_core::OperatorCommand;
use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unit index starts at 1")]
    ZeroUnit,
}

/// Parse one console line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<OperatorCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let command: OperatorCommand = serde_json::from_str(line)?;
    if command.unit == 0 {
        return Err(ConsoleError::ZeroUnit);
    }
    Ok(Some(command))
}

/// Forward commands from `input` until it closes or the receiver goes away.
pub fn run_console<R: BufRead>(input: R, commands: Sender<OperatorCommand>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Console read failed");
                break;
            }
        };
        match parse_command(&line) {
            Ok(Some(command)) => {
                debug!(?command, "Console command");
                if commands.send(command).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, line = %line, "Ignoring console line"),
        }
    }
    info!("Console input closed");
}

pub fn spawn_console<R: BufRead + Send + 'static>(
    input: R,
    commands: Sender<OperatorCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run_console(input, commands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc_core::CommandAction;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn parses_each_command_kind() {
        assert_eq!(
            parse_command(r#"{"type":"emergency_stop","unit":1}"#).unwrap(),
            Some(OperatorCommand {
                unit: 1,
                action: CommandAction::EmergencyStop
            })
        );
        assert_eq!(
            parse_command(r#"{"type":"start","unit":3}"#).unwrap(),
            Some(OperatorCommand {
                unit: 3,
                action: CommandAction::Start
            })
        );
        assert_eq!(
            parse_command(r#"{"type":"set_target_speed","unit":2,"rpm":1500}"#).unwrap(),
            Some(OperatorCommand {
                unit: 2,
                action: CommandAction::SetTargetSpeed { rpm: 1500 }
            })
        );
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse_command(r#"{"type":"launch","unit":1}"#).is_err());
        assert!(parse_command(r#"{"type":"start"}"#).is_err());
        assert!(matches!(
            parse_command(r#"{"type":"start","unit":0}"#),
            Err(ConsoleError::ZeroUnit)
        ));
        assert!(parse_command("   ").unwrap().is_none());
        assert!(parse_command("# comment").unwrap().is_none());
    }

    #[test]
    fn console_forwards_valid_lines() {
        let input = Cursor::new(concat!(
            "{\"type\":\"start\",\"unit\":1}\n",
            "not json\n",
            "\n",
            "{\"type\":\"emergency_stop\",\"unit\":2}\n",
        ));
        let (tx, rx) = mpsc::channel();
        run_console(input, tx);
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].unit, 2);
    }
}
