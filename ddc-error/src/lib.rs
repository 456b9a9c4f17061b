//! Unified error handling for ddcprobe
//!
//! This crate provides the error vocabulary shared by every ddcprobe component:
//! raw kernel errno values, EDID acquisition failures, and the top-level error type.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias using DdcError
pub type Result<T> = std::result::Result<T, DdcError>;

// ============================================================================
// Errno
// ============================================================================

/// A Linux errno value as returned by open/ioctl/read/write.
///
/// Always stored as the positive errno number.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(i32);

impl Errno {
    pub const ENOENT: Errno = Errno(libc::ENOENT);
    pub const EIO: Errno = Errno(libc::EIO);
    pub const ENXIO: Errno = Errno(libc::ENXIO);
    pub const EACCES: Errno = Errno(libc::EACCES);
    pub const EBUSY: Errno = Errno(libc::EBUSY);
    pub const EINVAL: Errno = Errno(libc::EINVAL);
    pub const EOPNOTSUPP: Errno = Errno(libc::EOPNOTSUPP);
    pub const ETIMEDOUT: Errno = Errno(libc::ETIMEDOUT);

    /// Wrap a raw errno. Negative values are accepted and normalized.
    pub const fn new(errno: i32) -> Self {
        Errno(if errno < 0 { -errno } else { errno })
    }

    /// errno of the calling thread
    pub fn last() -> Self {
        Self::from_io(&io::Error::last_os_error())
    }

    /// Map an io::Error onto an errno. Errors without an OS code become EIO.
    pub fn from_io(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Errno::new(code),
            None => Errno::EIO,
        }
    }

    /// Positive errno number
    pub fn code(self) -> i32 {
        self.0
    }

    /// Status-code form used in logs (-errno)
    pub fn status(self) -> i32 {
        -self.0
    }

    /// Symbolic name for the errno values the engine classifies
    pub fn name(self) -> &'static str {
        match self.0 {
            libc::ENOENT => "ENOENT",
            libc::EIO => "EIO",
            libc::ENXIO => "ENXIO",
            libc::EACCES => "EACCES",
            libc::EBUSY => "EBUSY",
            libc::EINVAL => "EINVAL",
            libc::EOPNOTSUPP => "EOPNOTSUPP",
            libc::ETIMEDOUT => "ETIMEDOUT",
            libc::EPERM => "EPERM",
            libc::ENODEV => "ENODEV",
            libc::EAGAIN => "EAGAIN",
            libc::EREMOTEIO => "EREMOTEIO",
            _ => "errno",
        }
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}): {}",
            self.name(),
            self.0,
            io::Error::from_raw_os_error(self.0)
        )
    }
}

impl From<io::Error> for Errno {
    fn from(err: io::Error) -> Self {
        Errno::from_io(&err)
    }
}

impl From<Errno> for io::Error {
    fn from(errno: Errno) -> Self {
        io::Error::from_raw_os_error(errno.code())
    }
}

// ============================================================================
// EDID acquisition errors
// ============================================================================

/// Why an EDID could not be obtained from a bus.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdidError {
    /// Nothing usable answered: the transfer itself failed
    #[error("EDID read failed after {attempts} attempt(s): {errno}")]
    Io { errno: Errno, attempts: u32 },

    /// Bytes were read but never passed validation
    #[error("invalid EDID after {attempts} attempt(s)")]
    InvalidEdid { attempts: u32 },

    /// Address 0x50 did not respond, so no read was attempted
    #[error("no device at EDID address 0x50")]
    NotPresent,
}

impl EdidError {
    /// Number of underlying read attempts that were made
    pub fn attempts(&self) -> u32 {
        match self {
            EdidError::Io { attempts, .. } | EdidError::InvalidEdid { attempts } => *attempts,
            EdidError::NotPresent => 0,
        }
    }

    /// The errno behind the failure, if it was an I/O failure
    pub fn errno(&self) -> Option<Errno> {
        match self {
            EdidError::Io { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

// ============================================================================
// Top-level error
// ============================================================================

/// Unified error type for all ddcprobe operations
#[derive(thiserror::Error, Debug)]
pub enum DdcError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{op} failed: {errno}")]
    Os { op: &'static str, errno: Errno },

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Bus and EDID Errors
    // ============================================================================
    #[error("EDID error: {0}")]
    Edid(#[from] EdidError),

    #[error("I2C bus not found: /dev/i2c-{0}")]
    BusNotFound(u32),

    #[error("Bus enumeration failed: {0}")]
    Enumeration(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Programming Errors
    // ============================================================================
    #[error("API misuse: {0}")]
    Misuse(String),
}

impl DdcError {
    /// Create an OS error for a named operation
    pub fn os(op: &'static str, errno: Errno) -> Self {
        Self::Os { op, errno }
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an enumeration error from a string
    pub fn enumeration(msg: impl Into<String>) -> Self {
        Self::Enumeration(msg.into())
    }

    /// Report a caller ordering bug.
    ///
    /// Panics in debug builds; in release builds the error is logged and
    /// returned so the caller can propagate it.
    #[track_caller]
    pub fn misuse(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if cfg!(debug_assertions) {
            panic!("API misuse: {msg}");
        }
        tracing::error!(location = %std::panic::Location::caller(), "API misuse: {}", msg);
        Self::Misuse(msg)
    }

    /// The errno carried by this error, if any
    pub fn errno(&self) -> Option<Errno> {
        match self {
            DdcError::Os { errno, .. } => Some(*errno),
            DdcError::Edid(e) => e.errno(),
            DdcError::Io(e) | DdcError::FileRead { source: e, .. } | DdcError::FileWrite { source: e, .. } => {
                e.raw_os_error().map(Errno::new)
            }
            _ => None,
        }
    }
}
