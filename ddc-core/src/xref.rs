//! Identity cross-reference
//!
//! One entry per bus whose EDID was read over I2C. Other subsystems (udev,
//! XRandR, DRM sysfs) attach the names they use for the same monitor.
//! Identical monitors produce identical EDIDs, so once every bus has been
//! registered the table flags entries whose EDID is not unique.

use serde::Serialize;
use tracing::{debug, info};

use crate::constants::edid::BLOCK_SIZE;
use crate::edid::edid_tag;
use crate::error::Result;
use crate::DdcError;

/// Cross-reference entry for one bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdXref {
    #[serde(skip)]
    raw_edid: [u8; BLOCK_SIZE],
    pub edid_tag: String,
    pub bus_number: Option<u32>,
    pub xrandr_name: Option<String>,
    pub drm_connector_name: Option<String>,
    pub udev_name: Option<String>,
    pub udev_syspath: Option<String>,
    pub udev_busno: Option<u32>,
    pub sysfs_drm_name: Option<String>,
    pub sysfs_drm_i2c: Option<String>,
    pub sysfs_drm_busno: Option<u32>,
    /// None until the scan is marked complete
    #[serde(rename = "ambiguous")]
    ambiguous_edid: Option<bool>,
}

impl DeviceIdXref {
    fn new(busno: u32, raw_edid: [u8; BLOCK_SIZE]) -> Self {
        Self {
            edid_tag: edid_tag(&raw_edid),
            raw_edid,
            bus_number: Some(busno),
            xrandr_name: None,
            drm_connector_name: None,
            udev_name: None,
            udev_syspath: None,
            udev_busno: None,
            sysfs_drm_name: None,
            sysfs_drm_i2c: None,
            sysfs_drm_busno: None,
            ambiguous_edid: None,
        }
    }

    pub fn raw_edid(&self) -> &[u8; BLOCK_SIZE] {
        &self.raw_edid
    }

    /// Whether another bus reports the same EDID.
    ///
    /// Only known once the scan is complete; asking earlier is a misuse.
    pub fn ambiguous(&self) -> Result<bool> {
        self.ambiguous_edid.ok_or_else(|| {
            DdcError::misuse(format!(
                "ambiguity of EDID ...{} queried before bus scan complete",
                self.edid_tag
            ))
        })
    }

    pub fn set_xrandr_name(&mut self, name: impl Into<String>) {
        self.xrandr_name = Some(name.into());
    }

    pub fn set_drm_connector_name(&mut self, name: impl Into<String>) {
        self.drm_connector_name = Some(name.into());
    }

    pub fn set_udev_info(&mut self, name: impl Into<String>, syspath: impl Into<String>, busno: u32) {
        self.udev_name = Some(name.into());
        self.udev_syspath = Some(syspath.into());
        self.udev_busno = Some(busno);
    }

    pub fn set_sysfs_drm(&mut self, name: impl Into<String>, i2c: impl Into<String>, busno: u32) {
        self.sysfs_drm_name = Some(name.into());
        self.sysfs_drm_i2c = Some(i2c.into());
        self.sysfs_drm_busno = Some(busno);
    }
}

/// The cross-reference table
#[derive(Debug, Clone, Default, Serialize)]
pub struct XrefTable {
    entries: Vec<DeviceIdXref>,
    scan_complete: bool,
}

fn base_block(raw_edid: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
    raw_edid
        .get(..BLOCK_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| DdcError::misuse(format!("EDID of {} bytes is too short", raw_edid.len())))
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for a bus. Registering the same bus twice, or
    /// registering after the scan was marked complete, is a misuse.
    pub fn register(&mut self, busno: u32, raw_edid: &[u8]) -> Result<&mut DeviceIdXref> {
        if self.scan_complete {
            return Err(DdcError::misuse(format!(
                "bus {} registered after scan complete",
                busno
            )));
        }
        if self.find_by_busno(busno).is_some() {
            return Err(DdcError::misuse(format!("bus {} registered twice", busno)));
        }
        let entry = DeviceIdXref::new(busno, base_block(raw_edid)?);
        debug!(busno, tag = %entry.edid_tag, "Registered xref");
        self.entries.push(entry);
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    pub fn find_by_busno(&self, busno: u32) -> Option<&DeviceIdXref> {
        self.entries.iter().find(|e| e.bus_number == Some(busno))
    }

    pub fn find_by_busno_mut(&mut self, busno: u32) -> Option<&mut DeviceIdXref> {
        self.entries.iter_mut().find(|e| e.bus_number == Some(busno))
    }

    /// First entry, in registration order, with this EDID.
    ///
    /// Check [`DeviceIdXref::ambiguous`] before relying on it being the only
    /// one.
    pub fn find_by_edid(&self, raw_edid: &[u8]) -> Result<Option<&DeviceIdXref>> {
        self.require_complete("find_by_edid")?;
        let key = base_block(raw_edid)?;
        Ok(self.entries.iter().find(|e| e.raw_edid == key))
    }

    /// Number of entries with this EDID
    pub fn count_by_edid(&self, raw_edid: &[u8]) -> Result<usize> {
        self.require_complete("count_by_edid")?;
        let key = base_block(raw_edid)?;
        Ok(self.entries.iter().filter(|e| e.raw_edid == key).count())
    }

    /// Record that every bus has been registered and flag duplicate EDIDs
    pub fn mark_scan_complete(&mut self) -> Result<()> {
        if self.scan_complete {
            return Err(DdcError::misuse("scan marked complete twice"));
        }
        self.scan_complete = true;

        // Pairwise comparison; the table holds a handful of entries
        let n = self.entries.len();
        let mut dup = vec![false; n];
        for i in 0..n {
            for j in (i + 1)..n {
                if self.entries[i].raw_edid == self.entries[j].raw_edid {
                    dup[i] = true;
                    dup[j] = true;
                }
            }
        }
        for (entry, is_dup) in self.entries.iter_mut().zip(dup) {
            entry.ambiguous_edid = Some(is_dup);
            if is_dup {
                info!(busno = ?entry.bus_number, tag = %entry.edid_tag, "EDID is shared by more than one bus");
            }
        }
        Ok(())
    }

    pub fn is_scan_complete(&self) -> bool {
        self.scan_complete
    }

    pub fn entries(&self) -> &[DeviceIdXref] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and forget that the scan completed
    pub fn reset(&mut self) {
        self.entries.clear();
        self.scan_complete = false;
    }

    fn require_complete(&self, op: &str) -> Result<()> {
        if self.scan_complete {
            Ok(())
        } else {
            Err(DdcError::misuse(format!("{} called before bus scan complete", op)))
        }
    }
}
