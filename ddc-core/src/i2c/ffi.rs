//! Linux i2c-dev ioctl ABI
//!
//! The only unsafe code in the crate. Each wrapper takes a raw fd the caller
//! keeps open for the duration of the call and returns an [`Errno`] on
//! failure.

use std::os::unix::io::RawFd;

use crate::error::Errno;

pub const I2C_SLAVE: libc::c_ulong = 0x0703;
pub const I2C_SLAVE_FORCE: libc::c_ulong = 0x0706;
pub const I2C_FUNCS: libc::c_ulong = 0x0705;
pub const I2C_RDWR: libc::c_ulong = 0x0707;

/// Message flag: read from the slave
pub const I2C_M_RD: u16 = 0x0001;

/// struct i2c_msg from <linux/i2c.h>
#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug)]
pub struct i2c_msg {
    pub addr: u16,
    pub flags: u16,
    pub len: u16,
    pub buf: *mut u8,
}

/// struct i2c_rdwr_ioctl_data from <linux/i2c-dev.h>
#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug)]
pub struct i2c_rdwr_ioctl_data {
    pub msgs: *mut i2c_msg,
    pub nmsgs: u32,
}

fn check(rc: libc::c_int) -> Result<libc::c_int, Errno> {
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(rc)
    }
}

fn msg_len(len: usize) -> Result<u16, Errno> {
    u16::try_from(len).map_err(|_| Errno::EINVAL)
}

/// I2C_SLAVE, or I2C_SLAVE_FORCE when `force` is set
pub fn set_slave(fd: RawFd, addr: u16, force: bool) -> Result<(), Errno> {
    let request = if force { I2C_SLAVE_FORCE } else { I2C_SLAVE };
    // SAFETY: fd is an open i2c-dev node; the argument is passed by value.
    let rc = unsafe { libc::ioctl(fd, request as _, addr as libc::c_ulong) };
    check(rc).map(|_| ())
}

/// I2C_FUNCS capability mask
pub fn functionality(fd: RawFd) -> Result<u32, Errno> {
    let mut funcs: libc::c_ulong = 0;
    // SAFETY: the kernel writes one unsigned long through the pointer.
    let rc = unsafe { libc::ioctl(fd, I2C_FUNCS as _, &mut funcs as *mut libc::c_ulong) };
    check(rc)?;
    Ok(funcs as u32)
}

fn rdwr(fd: RawFd, msgs: &mut [i2c_msg]) -> Result<(), Errno> {
    let mut data = i2c_rdwr_ioctl_data {
        msgs: msgs.as_mut_ptr(),
        nmsgs: msgs.len() as u32,
    };
    // SAFETY: every msg buffer points into a slice borrowed for the
    // duration of this call and `len` matches that slice.
    let rc = unsafe { libc::ioctl(fd, I2C_RDWR as _, &mut data as *mut i2c_rdwr_ioctl_data) };
    check(rc).map(|_| ())
}

/// One write message
pub fn rdwr_write(fd: RawFd, addr: u16, bytes: &[u8]) -> Result<(), Errno> {
    let mut msgs = [i2c_msg {
        addr,
        flags: 0,
        len: msg_len(bytes.len())?,
        // Write messages are never written through
        buf: bytes.as_ptr() as *mut u8,
    }];
    rdwr(fd, &mut msgs)
}

/// One read message
pub fn rdwr_read(fd: RawFd, addr: u16, buf: &mut [u8]) -> Result<(), Errno> {
    let mut msgs = [i2c_msg {
        addr,
        flags: I2C_M_RD,
        len: msg_len(buf.len())?,
        buf: buf.as_mut_ptr(),
    }];
    rdwr(fd, &mut msgs)
}

/// Write then read in a single transaction (repeated start)
pub fn rdwr_write_read(fd: RawFd, addr: u16, bytes: &[u8], buf: &mut [u8]) -> Result<(), Errno> {
    let mut msgs = [
        i2c_msg {
            addr,
            flags: 0,
            len: msg_len(bytes.len())?,
            buf: bytes.as_ptr() as *mut u8,
        },
        i2c_msg {
            addr,
            flags: I2C_M_RD,
            len: msg_len(buf.len())?,
            buf: buf.as_mut_ptr(),
        },
    ];
    rdwr(fd, &mut msgs)
}
