//! File-like device adapter over a shared [`BoundedStack`].
//!
//! Every [`DeviceHandle`] opened from one [`StackDevice`] reaches the same
//! stack. The protocol:
//!
//! | Request | Effect | Result |
//! |---------|--------|--------|
//! | `read(buf)` | pop | `Ok(4)` with the value in `buf[..4]`, `Ok(0)` at end of data |
//! | `write(buf)` | push `buf[..4]` | `Ok(4)`, `ERANGE` when full |
//! | `ioctl(SET_SIZE, arg)` | resize to `arg[..4]` as `u32` | `EINVAL` for zero, `ENOMEM` on allocation failure |
//!
//! Integers travel as native-endian `i32` (`u32` for the resize argument).
//! Buffers shorter than one integer are rejected with `EINVAL`.

use std::mem::size_of;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::{DeviceError, StackError};
use crate::stack::{BoundedStack, PopOutcome};

/// Bytes in one pushed or popped value.
pub const INT_SIZE: usize = size_of::<i32>();

/// Control command type byte shared by all commands of this device.
pub const IOC_MAGIC: u8 = b's';

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_TYPESHIFT: u32 = IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_WRITE: u32 = 1;

/// Encode a caller-to-device control command carrying `size` bytes.
#[must_use]
pub const fn iow(ty: u8, nr: u8, size: usize) -> u32 {
    (IOC_WRITE << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | nr as u32
}

/// Type byte of an encoded control command.
#[must_use]
pub const fn ioc_type(cmd: u32) -> u8 {
    ((cmd >> IOC_TYPESHIFT) & ((1 << IOC_TYPEBITS) - 1)) as u8
}

/// Resize the stack; the argument is one `u32` capacity.
pub const IOC_SET_SIZE: u32 = iow(IOC_MAGIC, 1, size_of::<u32>());

struct DeviceInner {
    name: String,
    stack: BoundedStack,
    open_handles: AtomicUsize,
    next_handle_id: AtomicU64,
}

/// The published endpoint: owns the one stack all handles share.
///
/// Cloning is cheap and yields the same device.
#[derive(Clone)]
pub struct StackDevice {
    inner: Arc<DeviceInner>,
}

/// Point-in-time view of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub name: String,
    pub open_handles: usize,
    pub count: usize,
    pub capacity: usize,
}

impl StackDevice {
    /// Create the device and its stack.
    pub fn new(config: &DeviceConfig) -> Result<Self, StackError> {
        let stack = BoundedStack::new(config.default_capacity)?;
        info!(
            device = %config.name,
            capacity = config.default_capacity.get(),
            "loaded"
        );
        Ok(Self {
            inner: Arc::new(DeviceInner {
                name: config.name.clone(),
                stack,
                open_handles: AtomicUsize::new(0),
                next_handle_id: AtomicU64::new(1),
            }),
        })
    }

    /// Open a session. All sessions observe and mutate the same stack.
    #[must_use]
    pub fn open(&self) -> DeviceHandle {
        let id = self.inner.next_handle_id.fetch_add(1, Ordering::Relaxed);
        self.inner.open_handles.fetch_add(1, Ordering::AcqRel);
        info!(device = %self.inner.name, handle = id, "opened");
        DeviceHandle {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Open handle count plus the stack's count and capacity.
    #[must_use]
    pub fn stats(&self) -> DeviceStats {
        let snapshot = self.inner.stack.snapshot();
        DeviceStats {
            name: self.inner.name.clone(),
            open_handles: self.inner.open_handles.load(Ordering::Acquire),
            count: snapshot.count(),
            capacity: snapshot.capacity,
        }
    }

    /// The shared stack, for in-process callers that skip the byte protocol.
    #[must_use]
    pub fn stack(&self) -> &BoundedStack {
        &self.inner.stack
    }
}

/// One open session on a [`StackDevice`]. Dropping it closes the session.
pub struct DeviceHandle {
    inner: Arc<DeviceInner>,
    id: u64,
}

impl DeviceHandle {
    /// Session identifier, unique per device.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pop into `buf`. Returns the number of bytes written: `INT_SIZE`, or
    /// 0 when the stack is empty.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if buf.len() < INT_SIZE {
            debug!(handle = self.id, len = buf.len(), "read buffer too short");
            return Err(DeviceError::BadLength {
                len: buf.len(),
                needed: INT_SIZE,
            });
        }

        match self.inner.stack.pop() {
            PopOutcome::Value(value) => {
                buf[..INT_SIZE].copy_from_slice(&value.to_ne_bytes());
                Ok(INT_SIZE)
            }
            PopOutcome::Empty => Ok(0),
        }
    }

    /// Push the first `INT_SIZE` bytes of `buf`. Returns `INT_SIZE`.
    pub fn write(&self, buf: &[u8]) -> Result<usize, DeviceError> {
        let value = buf
            .get(..INT_SIZE)
            .and_then(|bytes| <[u8; INT_SIZE]>::try_from(bytes).ok())
            .map(i32::from_ne_bytes)
            .ok_or(DeviceError::BadLength {
                len: buf.len(),
                needed: INT_SIZE,
            })?;

        self.inner.stack.push(value).map_err(|e| {
            debug!(handle = self.id, value, "push rejected: {}", e);
            DeviceError::from(e)
        })?;
        Ok(INT_SIZE)
    }

    /// Execute a control command.
    pub fn ioctl(&self, cmd: u32, arg: &[u8]) -> Result<(), DeviceError> {
        if ioc_type(cmd) != IOC_MAGIC {
            debug!(handle = self.id, cmd, "foreign control command");
            return Err(DeviceError::UnknownCommand(cmd));
        }

        match cmd {
            IOC_SET_SIZE => {
                let needed = size_of::<u32>();
                let new_size = arg
                    .get(..needed)
                    .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                    .map(u32::from_ne_bytes)
                    .ok_or(DeviceError::BadArgument {
                        len: arg.len(),
                        needed,
                    })?;

                match self.inner.stack.resize(new_size as usize) {
                    Ok(()) => {
                        info!(device = %self.inner.name, capacity = new_size, "resized");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(device = %self.inner.name, requested = new_size, "resize failed: {}", e);
                        Err(e.into())
                    }
                }
            }
            other => Err(DeviceError::UnknownCommand(other)),
        }
    }

    /// Close the session. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.inner.open_handles.fetch_sub(1, Ordering::AcqRel);
        info!(device = %self.inner.name, handle = self.id, "closed");
    }
}
