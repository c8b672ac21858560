//! Line-oriented scripts driven through a device handle.
//!
//! ```text
//! # comments and blank lines are ignored
//! set-size 4
//! push 10
//! push -3
//! pop        # prints -3
//! unwind     # prints 10
//! pop        # prints NULL
//! ```

use std::io::{BufRead, Write};

use istack::{DeviceHandle, StackDevice, INT_SIZE, IOC_SET_SIZE};
use tracing::debug;

use crate::error::CliError;

/// One script command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetSize(u32),
    Push(i32),
    Pop,
    Unwind,
}

/// Parse one line. `Ok(None)` for blank and comment-only lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, CliError> {
    let line = line.split('#').next().unwrap_or_default().trim();
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(CliError::Usage(format!("too many arguments to '{}'", cmd)));
    }

    let command = match (cmd, arg) {
        ("set-size", Some(arg)) => Command::SetSize(parse_size(arg)?),
        ("push", Some(arg)) => Command::Push(
            arg.parse()
                .map_err(|_| CliError::BadInt(arg.to_string()))?,
        ),
        ("pop", None) => Command::Pop,
        ("unwind", None) => Command::Unwind,
        ("set-size" | "push", None) => {
            return Err(CliError::Usage(format!("'{}' takes one argument", cmd)))
        }
        ("pop" | "unwind", Some(_)) => {
            return Err(CliError::Usage(format!("'{}' takes no argument", cmd)))
        }
        (other, _) => return Err(CliError::Usage(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

fn parse_size(arg: &str) -> Result<u32, CliError> {
    match arg.parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n).map_err(|_| CliError::BadSize(arg.to_string())),
        _ => Err(CliError::BadSize(arg.to_string())),
    }
}

fn pop_one(handle: &DeviceHandle) -> Result<Option<i32>, CliError> {
    let mut buf = [0u8; INT_SIZE];
    match handle.read(&mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(i32::from_ne_bytes(buf))),
    }
}

/// Execute one command, printing popped values to `out`.
pub fn execute(
    handle: &DeviceHandle,
    command: Command,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::SetSize(size) => handle.ioctl(IOC_SET_SIZE, &size.to_ne_bytes())?,
        Command::Push(value) => {
            handle.write(&value.to_ne_bytes())?;
        }
        Command::Pop => match pop_one(handle)? {
            Some(value) => writeln!(out, "{}", value)?,
            None => writeln!(out, "NULL")?,
        },
        Command::Unwind => {
            while let Some(value) = pop_one(handle)? {
                writeln!(out, "{}", value)?;
            }
        }
    }
    Ok(())
}

/// Run a whole script. Each command opens its own handle on `device`, the
/// way separate invocations of a shell tool would. Stops at the first error.
pub fn run_script(
    device: &StackDevice,
    input: impl BufRead,
    out: &mut impl Write,
) -> Result<usize, CliError> {
    let mut executed = 0;
    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| CliError::Io {
            path: "<script>".to_string(),
            source,
        })?;
        let Some(command) = parse_line(&line).map_err(|e| e.at_line(line_no))? else {
            continue;
        };
        debug!(line = line_no, ?command, "executing");
        let handle = device.open();
        execute(&handle, command, out).map_err(|e| e.at_line(line_no))?;
        executed += 1;
    }
    Ok(executed)
}
