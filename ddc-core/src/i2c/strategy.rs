//! Shared write/read dispatcher
//!
//! General-purpose bus transfers go through here so that the transfer
//! mechanism can be switched in one place, which is what the EINVAL driver
//! workaround does.

use tracing::{trace, warn};

use super::device::{I2cIo, IoResult};
use super::probe::set_slave_address;
use super::I2cContext;
use crate::error::Errno;
use crate::settings::IoStrategy;

/// Write `bytes` to `addr` using the configured strategy
pub fn layer_write<D>(dev: &mut D, ctx: &I2cContext, addr: u16, bytes: &[u8]) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    let strategy = ctx.settings.io_strategy();
    match write_with(dev, ctx, strategy, addr, bytes) {
        Err(Errno::EINVAL) if switch_on_einval(dev.bus_number(), ctx, strategy) => {
            write_with(dev, ctx, IoStrategy::FileIo, addr, bytes)
        }
        other => other,
    }
}

/// Fill `buf` from `addr` using the configured strategy.
///
/// `bytewise` issues one-byte reads under file I/O; the ioctl strategy
/// always reads in one message.
pub fn layer_read<D>(
    dev: &mut D,
    ctx: &I2cContext,
    addr: u16,
    bytewise: bool,
    buf: &mut [u8],
) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    let strategy = ctx.settings.io_strategy();
    match read_with(dev, ctx, strategy, addr, bytewise, buf) {
        Err(Errno::EINVAL) if switch_on_einval(dev.bus_number(), ctx, strategy) => {
            read_with(dev, ctx, IoStrategy::FileIo, addr, bytewise, buf)
        }
        other => other,
    }
}

/// On EINVAL from the ioctl strategy on an affected driver, move the whole
/// layer onto file I/O. Returns true when the caller should retry.
fn switch_on_einval(busno: u32, ctx: &I2cContext, strategy: IoStrategy) -> bool {
    if strategy != IoStrategy::Ioctl || !ctx.has_einval_quirk(busno) {
        return false;
    }
    warn!(busno, "I2C_RDWR returned EINVAL on quirky driver, switching to file I/O");
    ctx.settings.record_einval_quirk();
    true
}

fn write_with<D>(
    dev: &mut D,
    ctx: &I2cContext,
    strategy: IoStrategy,
    addr: u16,
    bytes: &[u8],
) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    let busno = dev.bus_number();
    trace!(busno, addr = format_args!("0x{:02x}", addr), len = bytes.len(), ?strategy, "layer write");
    let rc = match strategy {
        IoStrategy::Ioctl => dev.transfer_write(addr, bytes),
        IoStrategy::FileIo => {
            let force = ctx.settings.force_slave_address();
            set_slave_address(dev, addr, force).and_then(|()| file_write(dev, bytes))
        }
    };
    if let Err(errno) = rc {
        ctx.report_io_error(busno, "write", errno);
    }
    rc
}

fn read_with<D>(
    dev: &mut D,
    ctx: &I2cContext,
    strategy: IoStrategy,
    addr: u16,
    bytewise: bool,
    buf: &mut [u8],
) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    let busno = dev.bus_number();
    trace!(busno, addr = format_args!("0x{:02x}", addr), len = buf.len(), ?strategy, bytewise, "layer read");
    let rc = match strategy {
        IoStrategy::Ioctl => dev.transfer_read(addr, buf),
        IoStrategy::FileIo => {
            let force = ctx.settings.force_slave_address();
            set_slave_address(dev, addr, force).and_then(|()| file_read(dev, bytewise, buf))
        }
    };
    if let Err(errno) = rc {
        ctx.report_io_error(busno, "read", errno);
    }
    rc
}

/// write() all of `bytes`. A short write is EIO.
pub(crate) fn file_write<D>(dev: &mut D, bytes: &[u8]) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    if dev.write(bytes)? == bytes.len() {
        Ok(())
    } else {
        Err(Errno::EIO)
    }
}

/// read() into `buf`, whole or a byte at a time. Short reads are EIO.
pub(crate) fn file_read<D>(dev: &mut D, bytewise: bool, buf: &mut [u8]) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    if bytewise {
        for byte in buf.chunks_mut(1) {
            if dev.read(byte)? != 1 {
                return Err(Errno::EIO);
            }
        }
        Ok(())
    } else if dev.read(buf)? == buf.len() {
        Ok(())
    } else {
        Err(Errno::EIO)
    }
}
