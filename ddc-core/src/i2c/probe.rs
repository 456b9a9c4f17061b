//! Bus Probe
//!
//! Address selection and the checks that decide whether a bus carries a
//! display. Probing 0x30 and 0x37 is opt-in: on some eDP panels it causes
//! visible corruption.

use serde::Serialize;
use tracing::{debug, trace};

use super::device::{I2cIo, IoResult};
use super::I2cContext;
use crate::constants::addr;
use crate::error::Errno;

/// Which DDC addresses answered a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddressFlags {
    pub addr_0x30: bool,
    pub addr_0x37: bool,
    pub addr_0x50: bool,
}

/// Select the slave address for subsequent read()/write() calls.
///
/// If the address is busy (a kernel driver owns it) and `force` is set,
/// retries once with I2C_SLAVE_FORCE.
pub fn set_slave_address<D>(dev: &mut D, address: u16, force: bool) -> IoResult<()>
where
    D: I2cIo + ?Sized,
{
    let busno = dev.bus_number();
    match dev.select_address(address, false) {
        Ok(()) => Ok(()),
        Err(Errno::EBUSY) if force => {
            debug!(
                busno,
                addr = format_args!("0x{:02x}", address),
                "Address busy, retrying with I2C_SLAVE_FORCE"
            );
            dev.select_address(address, true)
        }
        Err(errno) => {
            trace!(busno, addr = format_args!("0x{:02x}", address), errno = %errno, "I2C_SLAVE failed");
            Err(errno)
        }
    }
}

/// Whether something acknowledges a one-byte read at the selected address
fn responds<D>(dev: &mut D) -> bool
where
    D: I2cIo + ?Sized,
{
    let mut byte = [0u8; 1];
    matches!(dev.read(&mut byte), Ok(n) if n > 0)
}

/// Probe the DDC addresses of an open bus.
///
/// 0x50 is always probed. 0x30 and 0x37 only when `probe_ddc_addresses` is
/// set, and on eDP buses only when `probe_ddc_addresses_on_edp` is also set.
/// A failed address select aborts the whole probe; no partial result is
/// returned.
pub fn probe_ddc_addresses<D>(dev: &mut D, ctx: &I2cContext, is_edp: bool) -> IoResult<AddressFlags>
where
    D: I2cIo + ?Sized,
{
    let settings = ctx.settings.snapshot();
    let busno = dev.bus_number();
    let extra = settings.probe_ddc_addresses && (!is_edp || settings.probe_ddc_addresses_on_edp);

    let mut flags = AddressFlags::default();

    set_slave_address(dev, addr::EDID, settings.force_slave_address).map_err(|errno| {
        ctx.report_io_error(busno, "select 0x50", errno);
        errno
    })?;
    flags.addr_0x50 = responds(dev);

    if extra {
        for (address, slot) in [
            (addr::SEGMENT_POINTER, &mut flags.addr_0x30),
            (addr::DDC_CI, &mut flags.addr_0x37),
        ] {
            set_slave_address(dev, address, settings.force_slave_address).map_err(|errno| {
                ctx.report_io_error(busno, "select", errno);
                errno
            })?;
            *slot = responds(dev);
        }
    } else if settings.probe_ddc_addresses {
        debug!(busno, "Skipping 0x30/0x37 probe on eDP bus");
    }

    debug!(busno, ?flags, "Probed DDC addresses");
    Ok(flags)
}

/// Diagnostic sweep of every 7-bit address from 0x03 to 0x7F.
///
/// Returns the addresses that answered a one-byte read. Addresses that
/// cannot be selected are skipped.
pub fn probe_all_addresses<D>(dev: &mut D, ctx: &I2cContext) -> Vec<u16>
where
    D: I2cIo + ?Sized,
{
    let settings = ctx.settings.snapshot();
    let busno = dev.bus_number();
    let found: Vec<u16> = (addr::SWEEP_FIRST..addr::SWEEP_END)
        .filter(|&address| {
            set_slave_address(dev, address, settings.force_slave_address).is_ok() && responds(dev)
        })
        .collect();
    debug!(busno, count = found.len(), "Address sweep complete");
    found
}
