//! ddcprobe core library
//!
//! Finds the I2C buses that carry a monitor and works out which monitor is
//! which.
//!
//! # Features
//!
//! - **Bus Probe**: opens `/dev/i2c-N`, selects addresses, checks 0x50 (and,
//!   on request, 0x30/0x37)
//! - **EDID Acquisition**: ioctl, file I/O or the shared I2C layer, with
//!   bounded retries and checksum validation
//! - **Bus Info Registry**: one [`BusInfo`] per bus, owned by the caller
//! - **Identity Cross-Reference**: correlates EDIDs with names from other
//!   subsystems and flags identical monitors
//!
//! # Module Structure
//!
//! - `i2c/` - device handles, ioctl ABI, probing, EDID reads
//! - `bus_info`, `registry`, `xref` - scan results
//! - `edid`, `sysfs`, `enumerate`, `settings`, `constants` - support
//!
//! # Example
//!
//! ```no_run
//! use ddc_core::{BusScanner, SharedSettings};
//!
//! let scanner = BusScanner::system(SharedSettings::default());
//! let registry = scanner.scan_all().unwrap();
//! for bus in registry.buses_with_edid() {
//!     println!("i2c-{}: {:?}", bus.bus_number(), bus.edid);
//! }
//! ```

// Grouped modules
pub mod i2c;

// Standalone modules
pub mod bus_info;
pub mod constants;
pub mod edid;
pub mod enumerate;
pub mod registry;
pub mod settings;
pub mod sysfs;
pub mod xref;

#[cfg(test)]
pub(crate) mod test_support;

/// Error types shared with the rest of ddcprobe
pub mod error {
    pub use ddc_error::*;
}

// Re-export error types
pub use error::{DdcError, EdidError, Errno, Result};

// Re-export scan results
pub use bus_info::{check_bus, BusFlags, BusInfo};
pub use registry::{BusRegistry, BusScanner};
pub use xref::{DeviceIdXref, XrefTable};

// Re-export EDID types
pub use edid::{edid_tag, is_valid_raw_edid, EdidSource, ParsedEdid, RawEdid};

// Re-export I2C layer
pub use i2c::{
    open_bus, probe_ddc_addresses, read_raw_edid, set_slave_address, AddressFlags, BusOpener,
    DevI2cOpener, I2cBus, I2cContext, I2cFunctionality, I2cIo,
};

// Re-export enumeration
pub use enumerate::{BusEnumerator, FixedBusEnumerator, SysfsBusEnumerator};
#[cfg(feature = "udev")]
pub use enumerate::UdevBusEnumerator;

// Re-export settings
pub use settings::{
    get_settings_path, load_settings, save_settings, DdcSettings, EdidReadMethod, EdidReadSize,
    IoStrategy, SharedSettings,
};
pub use sysfs::Sysfs;
