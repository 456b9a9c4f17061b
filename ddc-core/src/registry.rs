//! Bus Info Registry
//!
//! [`BusScanner`] runs one detection pass: enumerate bus numbers, open and
//! probe each bus in turn, read EDIDs, then build the cross-reference table.
//! The result is a [`BusRegistry`] owned by the caller.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bus_info::{check_bus, BusInfo};
use crate::enumerate::{BusEnumerator, RangeBusEnumerator, SysfsBusEnumerator};
use crate::error::Result;
use crate::i2c::{BusOpener, DevI2cOpener, I2cContext};
use crate::settings::SharedSettings;
use crate::sysfs::Sysfs;
use crate::xref::XrefTable;
use crate::DdcError;

/// Everything found by one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusRegistry {
    buses: Vec<BusInfo>,
    xref: XrefTable,
}

impl BusRegistry {
    /// Buses in enumeration order
    pub fn buses(&self) -> &[BusInfo] {
        &self.buses
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    pub fn bus_numbers(&self) -> Vec<u32> {
        self.buses.iter().map(BusInfo::bus_number).collect()
    }

    pub fn find_by_busno(&self, busno: u32) -> Option<&BusInfo> {
        self.buses.iter().find(|b| b.bus_number() == busno)
    }

    /// Probe results for a bus.
    ///
    /// Asking about a bus this registry never probed is a misuse. A bus that
    /// was probed but has no device node is `BusNotFound`.
    pub fn bus_info(&self, busno: u32) -> Result<&BusInfo> {
        match self.find_by_busno(busno) {
            Some(info) if info.is_probed() => {
                if info.exists() {
                    Ok(info)
                } else {
                    Err(DdcError::BusNotFound(busno))
                }
            }
            _ => Err(DdcError::misuse(format!("bus {} was never probed", busno))),
        }
    }

    /// Buses that yielded a valid EDID
    pub fn buses_with_edid(&self) -> impl Iterator<Item = &BusInfo> {
        self.buses.iter().filter(|b| b.edid.is_some())
    }

    pub fn xref(&self) -> &XrefTable {
        &self.xref
    }

    /// For attaching udev/DRM/XRandR names
    pub fn xref_mut(&mut self) -> &mut XrefTable {
        &mut self.xref
    }

    /// Forget every bus and every cross-reference entry
    pub fn discard(&mut self) {
        debug!(count = self.buses.len(), "Discarding bus registry");
        self.buses.clear();
        self.xref.reset();
    }

    /// JSON view of the registry
    pub fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Runs detection passes
#[derive(Debug)]
pub struct BusScanner<E = SysfsBusEnumerator, O = DevI2cOpener> {
    ctx: I2cContext,
    enumerator: E,
    opener: O,
}

impl BusScanner {
    /// Scanner for the running system
    pub fn system(settings: SharedSettings) -> Self {
        let sysfs = Sysfs::system();
        Self::new(
            I2cContext::new(settings, sysfs.clone()),
            SysfsBusEnumerator::new(sysfs.clone()),
            DevI2cOpener::new(sysfs),
        )
    }
}

impl<E: BusEnumerator, O: BusOpener> BusScanner<E, O> {
    pub fn new(ctx: I2cContext, enumerator: E, opener: O) -> Self {
        Self {
            ctx,
            enumerator,
            opener,
        }
    }

    pub fn context(&self) -> &I2cContext {
        &self.ctx
    }

    fn candidate_buses(&self) -> Result<Vec<u32>> {
        let buses = match self.enumerator.bus_numbers() {
            Ok(buses) => buses,
            Err(e) => {
                let max = self.ctx.settings.snapshot().bus_max;
                warn!(error = %e, bus_max = max, "Bus enumeration failed, trying every bus number");
                RangeBusEnumerator { max }.bus_numbers()?
            }
        };
        Ok(buses)
    }

    /// Probe every candidate bus and build the cross-reference table.
    ///
    /// A bus that cannot be opened or probed is recorded as such; it never
    /// stops the scan.
    pub fn scan_all(&self) -> Result<BusRegistry> {
        let settings = self.ctx.settings.snapshot();
        let mut buses = Vec::new();

        for busno in self.candidate_buses()? {
            if settings.skip_ignorable_buses && self.ctx.sysfs.is_ignorable_bus(busno) {
                debug!(busno, "Skipping ignorable bus");
                continue;
            }
            let mut info = BusInfo::new(busno);
            let dev = self.opener.open(busno, settings.read_only);
            check_bus(&mut info, dev, &self.ctx);
            buses.push(info);
        }

        let mut xref = XrefTable::new();
        for bus in &buses {
            if let Some(edid) = &bus.edid {
                xref.register(bus.bus_number(), &edid.raw)?;
            }
        }
        xref.mark_scan_complete()?;

        info!(
            buses = buses.len(),
            displays = xref.len(),
            "Bus scan complete"
        );
        Ok(BusRegistry { buses, xref })
    }

    /// Discard `registry` and fill it from a fresh scan
    pub fn rescan(&self, registry: &mut BusRegistry) -> Result<()> {
        registry.discard();
        *registry = self.scan_all()?;
        Ok(())
    }
}
