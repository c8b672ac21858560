//! Error taxonomy for the stack and its device adapter.

use thiserror::Error;

/// errno values used by the device protocol (Linux numbering).
pub mod errno {
    pub const EFAULT: i32 = 14;
    pub const ENOMEM: i32 = 12;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
    pub const ERANGE: i32 = 34;
}

/// Failure of a stack operation. None of these change the stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// Push attempted with `count == capacity`.
    #[error("stack is full")]
    Full,

    /// Resize requested with a zero, negative or unparseable capacity.
    #[error("size must be > 0: {0}")]
    InvalidArgument(String),

    /// The replacement buffer could not be allocated.
    #[error("allocation failed for capacity {requested}")]
    OutOfResources { requested: usize },
}

impl StackError {
    /// The errno the device protocol reports for this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            StackError::Full => errno::ERANGE,
            StackError::InvalidArgument(_) => errno::EINVAL,
            StackError::OutOfResources { .. } => errno::ENOMEM,
        }
    }
}

/// Failure of a device request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Read or write buffer smaller than one integer.
    #[error("buffer of {len} bytes is shorter than {needed} bytes")]
    BadLength { len: usize, needed: usize },

    /// Control argument too short to hold the expected value.
    #[error("control argument of {len} bytes is shorter than {needed} bytes")]
    BadArgument { len: usize, needed: usize },

    /// Control command not understood by this device.
    #[error("unknown control command {0:#x}")]
    UnknownCommand(u32),

    /// The stack refused the operation.
    #[error(transparent)]
    Stack(#[from] StackError),
}

impl DeviceError {
    /// The errno a file-like caller would observe.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            DeviceError::BadLength { .. } => errno::EINVAL,
            DeviceError::BadArgument { .. } => errno::EFAULT,
            DeviceError::UnknownCommand(_) => errno::ENOTTY,
            DeviceError::Stack(e) => e.errno(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_error_has_distinct_errno() {
        let errors = [
            DeviceError::Stack(StackError::Full),
            DeviceError::Stack(StackError::InvalidArgument("0".into())),
            DeviceError::Stack(StackError::OutOfResources { requested: 1 }),
            DeviceError::UnknownCommand(0),
            DeviceError::BadArgument { len: 0, needed: 4 },
        ];
        let mut codes: Vec<i32> = errors.iter().map(DeviceError::errno).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_messages() {
        assert_eq!(StackError::Full.to_string(), "stack is full");
        assert_eq!(
            StackError::OutOfResources { requested: 9 }.to_string(),
            "allocation failed for capacity 9"
        );
        assert_eq!(
            DeviceError::from(StackError::Full).to_string(),
            "stack is full"
        );
    }
}
