//! Sysfs queries about I2C buses
//!
//! All paths are resolved under a root directory so tests can build a fake
//! tree with tempfile. Production code uses [`Sysfs::system`].

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::constants::{paths, sysfs};
use crate::error::{Errno, Result};
use crate::DdcError;

/// Read-only view of /sys and /dev rooted at `root`
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::system()
    }
}

impl Sysfs {
    /// The real filesystem
    pub fn system() -> Self {
        Self::with_root("/")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// /dev/i2c-N under this root
    pub fn dev_path(&self, busno: u32) -> PathBuf {
        self.root
            .join(paths::DEV_DIR)
            .join(paths::dev_i2c_name(busno))
    }

    fn bus_device_dir(&self, busno: u32) -> PathBuf {
        self.root
            .join(paths::SYS_BUS_I2C_DEVICES)
            .join(paths::dev_i2c_name(busno))
    }

    pub fn i2c_dev_exists(&self, busno: u32) -> bool {
        self.dev_path(busno).exists()
    }

    /// Whether bus N is wired to an embedded DisplayPort connector.
    ///
    /// Looks for /sys/class/drm/cardX/cardX-eDP-Y/i2c-N.
    pub fn is_edp_bus(&self, busno: u32) -> bool {
        let drm = self.root.join(paths::SYS_CLASS_DRM);
        let bus_name = paths::dev_i2c_name(busno);

        let Ok(cards) = fs::read_dir(&drm) else {
            return false;
        };
        for card in cards.flatten() {
            let card_name = card.file_name().to_string_lossy().into_owned();
            if !is_card_name(&card_name) {
                continue;
            }
            let Ok(connectors) = fs::read_dir(card.path()) else {
                continue;
            };
            for conn in connectors.flatten() {
                let conn_name = conn.file_name().to_string_lossy().into_owned();
                if !conn_name.starts_with(&card_name) || !conn_name.contains(sysfs::EDP_MARKER) {
                    continue;
                }
                if conn.path().join(&bus_name).exists() {
                    debug!(busno, connector = %conn_name, "Bus belongs to eDP connector");
                    return true;
                }
            }
        }
        false
    }

    /// Kernel module driving the bus adapter, e.g. "i915" or "nvidia"
    pub fn i2c_driver_name(&self, busno: u32) -> Option<String> {
        let dev = self.bus_device_dir(busno);
        let candidates = [
            dev.join("device/driver/module"),
            dev.join("device/device/device/driver/module"),
        ];
        candidates.iter().find_map(|p| {
            let target = fs::canonicalize(p).ok()?;
            let name = target.file_name()?.to_string_lossy().into_owned();
            trace!(busno, driver = %name, path = %p.display(), "Resolved bus driver");
            Some(name)
        })
    }

    /// Adapter name from /sys/bus/i2c/devices/i2c-N/name
    pub fn i2c_adapter_name(&self, busno: u32) -> Option<String> {
        read_trimmed(&self.bus_device_dir(busno).join("name"))
    }

    /// PCI class of the adapter's parent device, if it has one
    pub fn i2c_device_class(&self, busno: u32) -> Option<u32> {
        let text = read_trimmed(&self.bus_device_dir(busno).join("device/class"))?;
        let hex = text.trim_start_matches("0x");
        u32::from_str_radix(hex, 16).ok()
    }

    /// Bus numbers that have an i2c-dev node, sorted.
    ///
    /// Reads /sys/class/i2c-dev, falling back to listing /dev. Fails only
    /// when neither directory can be read.
    pub fn i2c_dev_bus_numbers(&self) -> Result<Vec<u32>> {
        let class_dir = self.root.join(paths::SYS_CLASS_I2C_DEV);
        let mut found = match list_bus_numbers(&class_dir) {
            Ok(found) if !found.is_empty() => found,
            _ => list_bus_numbers(&self.root.join(paths::DEV_DIR))
                .map_err(|e| DdcError::os("list /dev", Errno::from_io(&e)))?,
        };
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    /// Adapters that can never carry a monitor, and that are sometimes
    /// harmful to probe.
    pub fn is_ignorable_bus(&self, busno: u32) -> bool {
        if let Some(name) = self.i2c_adapter_name(busno) {
            if sysfs::IGNORABLE_ADAPTER_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix))
            {
                debug!(busno, adapter = %name, "Ignorable adapter name");
                return true;
            }
            if self.i2c_driver_name(busno).as_deref() == Some("nouveau")
                && !name.starts_with(sysfs::NOUVEAU_DISPLAY_PREFIX)
            {
                debug!(busno, adapter = %name, "Non-display nouveau bus");
                return true;
            }
        }

        match self.i2c_device_class(busno) {
            Some(class) => {
                let base = class & 0xffff_0000;
                let ignorable = base != sysfs::PCI_CLASS_DISPLAY && base != sysfs::PCI_CLASS_DOCKING;
                if ignorable {
                    debug!(busno, class = format_args!("0x{:06x}", class), "Non-display PCI class");
                }
                ignorable
            }
            None => false,
        }
    }
}

fn is_card_name(name: &str) -> bool {
    name.strip_prefix("card")
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Parse `i2c-N` names out of a directory listing
fn list_bus_numbers(dir: &Path) -> std::io::Result<Vec<u32>> {
    Ok(fs::read_dir(dir)?
        .flatten()
        .filter_map(|e| parse_bus_name(&e.file_name().to_string_lossy()))
        .collect())
}

/// "i2c-7" -> 7
pub fn parse_bus_name(name: &str) -> Option<u32> {
    name.strip_prefix("i2c-")?.parse().ok()
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
