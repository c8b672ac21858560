//! CLI errors and their exit codes.

use istack::error::errno;
use istack::{DeviceError, StackError};
use thiserror::Error;

/// Anything that stops a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// `set-size` argument not a positive integer.
    #[error("size should be > 0")]
    BadSize(String),

    /// `push` argument not a 32-bit integer.
    #[error("bad int '{0}'")]
    BadInt(String),

    /// Unknown script command or wrong number of arguments.
    #[error("usage: {0}")]
    Usage(String),

    /// The device refused a request.
    #[error("{}", describe_device(.0))]
    Device(#[from] DeviceError),

    /// Configuration from the environment is invalid.
    #[error("bad configuration: {0}")]
    Config(#[source] StackError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A stress run found invariant violations.
    #[error("{0} invariant violation(s)")]
    Violations(usize),

    /// A stress worker thread panicked.
    #[error("stress worker {0} panicked")]
    WorkerPanicked(usize),

    /// A script command failed.
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<CliError>,
    },
}

/// Messages a shell user of the device expects.
fn describe_device(error: &DeviceError) -> String {
    match error {
        DeviceError::Stack(StackError::Full) => "stack is full".to_string(),
        DeviceError::Stack(StackError::InvalidArgument(_)) => "size must be >0".to_string(),
        DeviceError::Stack(StackError::OutOfResources { .. }) => "allocation failed".to_string(),
        DeviceError::UnknownCommand(_) => "ioctl not supported".to_string(),
        DeviceError::BadLength { .. } | DeviceError::BadArgument { .. } => {
            format!("request failed: {}", error)
        }
    }
}

impl CliError {
    /// errno-style code the process exits with.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            CliError::BadSize(_) | CliError::BadInt(_) | CliError::Usage(_) => errno::EINVAL,
            CliError::Device(e) => e.errno(),
            CliError::Config(e) => e.errno(),
            CliError::Io { source, .. } | CliError::Output(source) => {
                source.raw_os_error().unwrap_or(errno::EINVAL)
            }
            CliError::Json(_) | CliError::Violations(_) | CliError::WorkerPanicked(_) => 1,
            CliError::AtLine { source, .. } => source.errno(),
        }
    }

    /// Attach a script line number.
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        CliError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}
