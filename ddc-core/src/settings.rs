//! Detection Settings
//!
//! Persistent settings stored as JSON in ~/.config/ddcprobe/settings.json,
//! plus the lock-protected shared copy that the probe and EDID code read on
//! every bus.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::{defaults, paths};
use crate::error::Result;
use crate::DdcError;

/// How the EDID Acquisition Engine talks to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdidReadMethod {
    /// One I2C_RDWR ioctl carrying the write/read message pair. Reads go
    /// through write()/read() instead once the EINVAL driver quirk was hit.
    #[default]
    Ioctl,
    /// write() then read() on the bus file descriptor
    FileIo,
    /// The shared I2C layer (see [`IoStrategy`])
    I2cLayer,
}

/// Number of bytes requested per EDID read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdidReadSize {
    /// Two attempts at 128 bytes, then two at 256
    #[default]
    Auto,
    Bytes128,
    Bytes256,
}

impl EdidReadSize {
    /// Fixed byte count, or None for auto
    pub fn fixed(self) -> Option<usize> {
        match self {
            EdidReadSize::Auto => None,
            EdidReadSize::Bytes128 => Some(128),
            EdidReadSize::Bytes256 => Some(256),
        }
    }
}

/// Transfer mechanism used by the I2C layer for general reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IoStrategy {
    #[default]
    Ioctl,
    FileIo,
}

/// Detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdcSettings {
    /// EDID transfer mechanism
    #[serde(default)]
    pub edid_read_method: EdidReadMethod,

    /// EDID read size
    #[serde(default)]
    pub edid_read_size: EdidReadSize,

    /// Read the EDID one byte at a time (file I/O and I2C layer only)
    #[serde(default)]
    pub edid_read_bytewise: bool,

    /// Write a single zero byte to 0x50 before reading
    #[serde(default = "default_write_before_read")]
    pub edid_write_before_read: bool,

    /// Transfer mechanism for the I2C layer
    #[serde(default)]
    pub io_strategy: IoStrategy,

    /// Retry address selection with I2C_SLAVE_FORCE when the address is busy
    #[serde(default)]
    pub force_slave_address: bool,

    /// Log bus-level I/O failures at warn instead of debug
    #[serde(default)]
    pub report_ddc_errors: bool,

    /// Open /dev/i2c-N read-only
    #[serde(default)]
    pub read_only: bool,

    /// Also probe 0x30 and 0x37 (known to corrupt some eDP panels)
    #[serde(default)]
    pub probe_ddc_addresses: bool,

    /// Allow the 0x30/0x37 probe on eDP buses too
    #[serde(default)]
    pub probe_ddc_addresses_on_edp: bool,

    /// Skip SMBus and other adapters that cannot carry a monitor
    #[serde(default = "default_true")]
    pub skip_ignorable_buses: bool,

    /// Highest bus number tried when no enumeration source is available
    #[serde(default = "default_bus_max")]
    pub bus_max: u32,

    /// Set once an EINVAL driver quirk forced the I2C layer onto file I/O
    #[serde(default, skip_serializing)]
    pub einval_quirk_encountered: bool,
}

fn default_true() -> bool {
    true
}
fn default_write_before_read() -> bool {
    defaults::EDID_WRITE_BEFORE_READ
}
fn default_bus_max() -> u32 {
    defaults::I2C_BUS_MAX
}

impl Default for DdcSettings {
    fn default() -> Self {
        Self {
            edid_read_method: EdidReadMethod::default(),
            edid_read_size: EdidReadSize::default(),
            edid_read_bytewise: false,
            edid_write_before_read: default_write_before_read(),
            io_strategy: IoStrategy::default(),
            force_slave_address: false,
            report_ddc_errors: false,
            read_only: false,
            probe_ddc_addresses: false,
            probe_ddc_addresses_on_edp: false,
            skip_ignorable_buses: true,
            bus_max: default_bus_max(),
            einval_quirk_encountered: false,
        }
    }
}

// ============================================================================
// Shared settings
// ============================================================================

/// Settings shared between the scanner and everything it calls.
///
/// Reads take a short read lock and copy what they need; writes are rare
/// (toggles flipped by the caller, the EINVAL quirk switching strategy).
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<DdcSettings>>,
}

impl SharedSettings {
    pub fn new(settings: DdcSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> DdcSettings {
        self.inner.read().clone()
    }

    /// Apply a change under the write lock
    pub fn update<F: FnOnce(&mut DdcSettings)>(&self, f: F) {
        let mut guard = self.inner.write();
        f(&mut guard);
    }

    pub fn force_slave_address(&self) -> bool {
        self.inner.read().force_slave_address
    }

    /// Returns the prior value
    pub fn set_force_slave_address(&self, onoff: bool) -> bool {
        std::mem::replace(&mut self.inner.write().force_slave_address, onoff)
    }

    pub fn report_ddc_errors(&self) -> bool {
        self.inner.read().report_ddc_errors
    }

    /// Returns the prior value
    pub fn set_report_ddc_errors(&self, onoff: bool) -> bool {
        std::mem::replace(&mut self.inner.write().report_ddc_errors, onoff)
    }

    pub fn io_strategy(&self) -> IoStrategy {
        self.inner.read().io_strategy
    }

    pub fn set_io_strategy(&self, strategy: IoStrategy) {
        self.inner.write().io_strategy = strategy;
    }

    /// Switch the I2C layer to file I/O after the EINVAL driver quirk was seen
    pub fn record_einval_quirk(&self) {
        let mut guard = self.inner.write();
        guard.einval_quirk_encountered = true;
        guard.io_strategy = IoStrategy::FileIo;
    }

    pub fn einval_quirk_encountered(&self) -> bool {
        self.inner.read().einval_quirk_encountered
    }
}

impl From<DdcSettings> for SharedSettings {
    fn from(settings: DdcSettings) -> Self {
        Self::new(settings)
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Get the settings file path
pub fn get_settings_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(paths::SETTINGS_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let config_dir = dirs::config_dir()
        .ok_or_else(|| DdcError::config("Could not determine config directory"))?;
    Ok(config_dir.join(paths::APP_DIR).join(paths::SETTINGS_FILE))
}

/// Load settings from disk; a missing file yields defaults
pub fn load_settings() -> Result<DdcSettings> {
    let path = get_settings_path()?;
    load_settings_from(&path)
}

/// Load settings from a specific file
pub fn load_settings_from(path: &std::path::Path) -> Result<DdcSettings> {
    if !path.exists() {
        debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(DdcSettings::default());
    }

    let content = fs::read_to_string(path).map_err(|e| DdcError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let settings: DdcSettings = serde_json::from_str(&content)?;
    info!(path = %path.display(), "Loaded settings");
    Ok(settings)
}

/// Save settings to disk
pub fn save_settings(settings: &DdcSettings) -> Result<()> {
    let path = get_settings_path()?;
    save_settings_to(settings, &path)
}

/// Save settings to a specific file, creating the parent directory
pub fn save_settings_to(settings: &DdcSettings, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "Could not create settings directory");
        }
    }

    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content).map_err(|e| DdcError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), "Saved settings");
    Ok(())
}
