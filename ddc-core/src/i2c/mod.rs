//! I2C device layer
//!
//! - `ffi` - kernel ABI structs and ioctl wrappers
//! - `device` - bus handles and the [`I2cIo`] seam
//! - `functionality` - I2C_FUNCS flags
//! - `strategy` - the shared write/read dispatcher ("I2C layer")
//! - `probe` - address selection and DDC address probing
//! - `edid_reader` - the EDID Acquisition Engine

pub mod device;
pub mod edid_reader;
pub mod ffi;
pub mod functionality;
pub mod probe;
pub mod strategy;

pub use device::{open_bus, BusOpener, DevI2cOpener, I2cBus, I2cIo, IoResult};
pub use edid_reader::{read_parsed_edid, read_raw_edid, EdidRead};
pub use functionality::I2cFunctionality;
pub use probe::{probe_all_addresses, probe_ddc_addresses, set_slave_address, AddressFlags};
pub use strategy::{layer_read, layer_write};

use tracing::{debug, warn};

use crate::constants::sysfs::EINVAL_QUIRK_DRIVER;
use crate::error::Errno;
use crate::settings::SharedSettings;
use crate::sysfs::Sysfs;

/// Everything a bus operation needs besides the bus itself
#[derive(Debug, Clone, Default)]
pub struct I2cContext {
    pub settings: SharedSettings,
    pub sysfs: Sysfs,
}

impl I2cContext {
    pub fn new(settings: SharedSettings, sysfs: Sysfs) -> Self {
        Self { settings, sysfs }
    }

    /// Whether this bus is driven by the driver that answers I2C_RDWR with
    /// a spurious EINVAL
    pub fn has_einval_quirk(&self, busno: u32) -> bool {
        self.sysfs.i2c_driver_name(busno).as_deref() == Some(EINVAL_QUIRK_DRIVER)
    }

    /// Log a bus I/O failure, loudly when DDC error reporting is on
    pub fn report_io_error(&self, busno: u32, op: &'static str, errno: Errno) {
        if self.settings.report_ddc_errors() {
            warn!(busno, op, errno = %errno, "Bus I/O failed");
        } else {
            debug!(busno, op, errno = %errno, "Bus I/O failed");
        }
    }
}
