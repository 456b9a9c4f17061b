//! Bus handles
//!
//! [`I2cIo`] is the seam between the probe/EDID logic and the kernel. The
//! real implementation is [`I2cBus`], a `/dev/i2c-N` file; tests substitute
//! a mock or a scripted fake.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::{debug, trace};

use super::ffi;
use crate::error::Errno;
use crate::sysfs::Sysfs;

/// Result of a single bus operation
pub type IoResult<T> = std::result::Result<T, Errno>;

/// Operations on an open I2C bus
#[cfg_attr(test, mockall::automock)]
pub trait I2cIo {
    /// N in /dev/i2c-N
    fn bus_number(&self) -> u32;

    /// I2C_SLAVE, or I2C_SLAVE_FORCE when `force` is set
    fn select_address(&mut self, addr: u16, force: bool) -> IoResult<()>;

    /// Raw I2C_FUNCS mask
    fn functionality(&mut self) -> IoResult<u32>;

    /// write() to the currently selected address; returns bytes written
    fn write(&mut self, bytes: &[u8]) -> IoResult<usize>;

    /// read() from the currently selected address; returns bytes read
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize>;

    /// I2C_RDWR with a single write message
    fn transfer_write(&mut self, addr: u16, bytes: &[u8]) -> IoResult<()>;

    /// I2C_RDWR with a single read message
    fn transfer_read(&mut self, addr: u16, buf: &mut [u8]) -> IoResult<()>;

    /// I2C_RDWR with a write message followed by a read message
    fn transfer_write_read(&mut self, addr: u16, bytes: &[u8], buf: &mut [u8]) -> IoResult<()>;
}

/// An open /dev/i2c-N. The descriptor is closed on drop.
#[derive(Debug)]
pub struct I2cBus {
    busno: u32,
    file: File,
}

impl I2cBus {
    /// Open an i2c-dev node at an explicit path
    pub fn open_path(path: &Path, busno: u32, read_only: bool) -> IoResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(|e| Errno::from_io(&e))?;
        trace!(busno, path = %path.display(), read_only, "Opened bus");
        Ok(Self { busno, file })
    }
}

impl Drop for I2cBus {
    fn drop(&mut self) {
        trace!(busno = self.busno, "Closing bus");
    }
}

impl I2cIo for I2cBus {
    fn bus_number(&self) -> u32 {
        self.busno
    }

    fn select_address(&mut self, addr: u16, force: bool) -> IoResult<()> {
        ffi::set_slave(self.file.as_raw_fd(), addr, force)
    }

    fn functionality(&mut self) -> IoResult<u32> {
        ffi::functionality(self.file.as_raw_fd())
    }

    fn write(&mut self, bytes: &[u8]) -> IoResult<usize> {
        self.file.write(bytes).map_err(|e| Errno::from_io(&e))
    }

    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.file.read(buf).map_err(|e| Errno::from_io(&e))
    }

    fn transfer_write(&mut self, addr: u16, bytes: &[u8]) -> IoResult<()> {
        ffi::rdwr_write(self.file.as_raw_fd(), addr, bytes)
    }

    fn transfer_read(&mut self, addr: u16, buf: &mut [u8]) -> IoResult<()> {
        ffi::rdwr_read(self.file.as_raw_fd(), addr, buf)
    }

    fn transfer_write_read(&mut self, addr: u16, bytes: &[u8], buf: &mut [u8]) -> IoResult<()> {
        ffi::rdwr_write_read(self.file.as_raw_fd(), addr, bytes, buf)
    }
}

/// Open /dev/i2c-N read-write, or read-only when asked
pub fn open_bus(busno: u32, read_only: bool) -> IoResult<I2cBus> {
    DevI2cOpener::default().open(busno, read_only)
}

/// Produces bus handles for the scanner
pub trait BusOpener {
    type Bus: I2cIo;

    fn open(&self, busno: u32, read_only: bool) -> IoResult<Self::Bus>;
}

/// Opens the i2c-dev nodes under a sysfs/dev root
#[derive(Debug, Clone, Default)]
pub struct DevI2cOpener {
    sysfs: Sysfs,
}

impl DevI2cOpener {
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }
}

impl BusOpener for DevI2cOpener {
    type Bus = I2cBus;

    fn open(&self, busno: u32, read_only: bool) -> IoResult<I2cBus> {
        let path = self.sysfs.dev_path(busno);
        I2cBus::open_path(&path, busno, read_only).map_err(|errno| {
            debug!(busno, path = %path.display(), errno = %errno, "Open failed");
            errno
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_bus_is_enoent() {
        let tmp = TempDir::new().unwrap();
        let opener = DevI2cOpener::new(Sysfs::with_root(tmp.path()));
        assert_eq!(opener.open(3, false).err(), Some(Errno::ENOENT));
    }

    #[test]
    fn test_open_regular_file_and_read() {
        // A plain file stands in for the device node; read()/write() work,
        // the ioctls do not.
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("dev")).unwrap();
        std::fs::write(tmp.path().join("dev/i2c-2"), [0xAAu8, 0xBB]).unwrap();

        let opener = DevI2cOpener::new(Sysfs::with_root(tmp.path()));
        let mut bus = opener.open(2, true).unwrap();
        assert_eq!(bus.bus_number(), 2);

        let mut buf = [0u8; 2];
        assert_eq!(bus.read(&mut buf), Ok(2));
        assert_eq!(buf, [0xAA, 0xBB]);
        assert!(bus.select_address(0x50, false).is_err());
    }

    #[test]
    fn test_read_only_rejects_write() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("dev")).unwrap();
        std::fs::write(tmp.path().join("dev/i2c-1"), b"").unwrap();

        let mut bus = DevI2cOpener::new(Sysfs::with_root(tmp.path()))
            .open(1, true)
            .unwrap();
        assert!(bus.write(&[0]).is_err());
    }
}
