//! Candidate bus enumeration
//!
//! The scanner only needs a list of bus numbers. Where they come from is
//! pluggable: sysfs (default), libudev (feature `udev`), or a fixed list.

use tracing::debug;

use crate::error::Result;
use crate::sysfs::Sysfs;

/// Source of candidate I2C bus numbers
pub trait BusEnumerator {
    /// Bus numbers in scan order
    fn bus_numbers(&self) -> Result<Vec<u32>>;
}

/// Lists /sys/class/i2c-dev (or /dev/i2c-*)
#[derive(Debug, Clone, Default)]
pub struct SysfsBusEnumerator {
    sysfs: Sysfs,
}

impl SysfsBusEnumerator {
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }
}

impl BusEnumerator for SysfsBusEnumerator {
    fn bus_numbers(&self) -> Result<Vec<u32>> {
        let buses = self.sysfs.i2c_dev_bus_numbers()?;
        debug!(count = buses.len(), ?buses, "Enumerated i2c-dev buses from sysfs");
        Ok(buses)
    }
}

/// An explicit list, e.g. from `--bus` or a test
#[derive(Debug, Clone, Default)]
pub struct FixedBusEnumerator(pub Vec<u32>);

impl BusEnumerator for FixedBusEnumerator {
    fn bus_numbers(&self) -> Result<Vec<u32>> {
        Ok(self.0.clone())
    }
}

/// Every bus number from 0 up to (not including) `max`.
///
/// Used when no enumeration source works at all.
#[derive(Debug, Clone)]
pub struct RangeBusEnumerator {
    pub max: u32,
}

impl BusEnumerator for RangeBusEnumerator {
    fn bus_numbers(&self) -> Result<Vec<u32>> {
        Ok((0..self.max).collect())
    }
}

#[cfg(feature = "udev")]
pub use self::udev_enum::UdevBusEnumerator;

#[cfg(feature = "udev")]
mod udev_enum {
    use super::BusEnumerator;
    use crate::error::Result;
    use crate::sysfs::parse_bus_name;
    use crate::DdcError;
    use tracing::{debug, warn};

    /// Devices in the udev `i2c-dev` subsystem
    #[derive(Debug, Clone, Default)]
    pub struct UdevBusEnumerator;

    impl BusEnumerator for UdevBusEnumerator {
        fn bus_numbers(&self) -> Result<Vec<u32>> {
            let mut enumerator = udev::Enumerator::new()
                .map_err(|e| DdcError::enumeration(format!("udev enumerator: {}", e)))?;
            enumerator
                .match_subsystem("i2c-dev")
                .map_err(|e| DdcError::enumeration(format!("udev match_subsystem: {}", e)))?;
            let devices = enumerator
                .scan_devices()
                .map_err(|e| DdcError::enumeration(format!("udev scan: {}", e)))?;

            let mut buses = Vec::new();
            for device in devices {
                let sysname = device.sysname().to_string_lossy().into_owned();
                match parse_bus_name(&sysname) {
                    Some(n) => buses.push(n),
                    None => warn!(sysname = %sysname, "Unexpected i2c-dev sysname"),
                }
            }
            buses.sort_unstable();
            debug!(count = buses.len(), ?buses, "Enumerated i2c-dev buses from udev");
            Ok(buses)
        }
    }
}
