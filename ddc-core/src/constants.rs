//! Constants and configuration values for ddcprobe
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! Never use magic numbers in other files - add them here first.

/// System paths, relative to a sysfs/dev root (normally `/`)
pub mod paths {
    /// Directory holding the i2c-dev character devices
    pub const DEV_DIR: &str = "dev";

    /// DRM class directory used for eDP detection
    pub const SYS_CLASS_DRM: &str = "sys/class/drm";

    /// i2c-dev class directory, one `i2c-N` entry per bus
    pub const SYS_CLASS_I2C_DEV: &str = "sys/class/i2c-dev";

    /// I2C bus devices directory
    pub const SYS_BUS_I2C_DEVICES: &str = "sys/bus/i2c/devices";

    /// Application directory name under the user config dir
    pub const APP_DIR: &str = "ddcprobe";

    /// Settings file name
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Environment variable overriding the settings file location
    pub const SETTINGS_ENV: &str = "DDCPROBE_SETTINGS";

    /// Device file name for a bus number
    pub fn dev_i2c_name(busno: u32) -> String {
        format!("i2c-{}", busno)
    }
}

/// I2C slave addresses relevant to DDC
pub mod addr {
    /// EDID EEPROM
    pub const EDID: u16 = 0x50;

    /// DDC/CI command channel
    pub const DDC_CI: u16 = 0x37;

    /// E-DDC segment pointer
    pub const SEGMENT_POINTER: u16 = 0x30;

    /// First address swept by the diagnostic full-bus probe
    pub const SWEEP_FIRST: u16 = 0x03;

    /// 7-bit addresses stop here (exclusive)
    pub const SWEEP_END: u16 = 0x80;
}

/// EDID layout
pub mod edid {
    /// One EDID block
    pub const BLOCK_SIZE: usize = 128;

    /// Base block plus one extension
    pub const DOUBLE_BLOCK_SIZE: usize = 256;

    /// Fixed header of a base block
    pub const HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

    /// Tag byte of a CEA-861 extension block
    pub const CEA861_EXTENSION_TAG: u8 = 0x02;

    /// Offset of the 4-byte tag used to label an EDID (bytes 124..128)
    pub const TAG_OFFSET: usize = 124;

    /// Descriptor blocks start here
    pub const DESCRIPTORS_START: usize = 54;
    pub const DESCRIPTOR_SIZE: usize = 18;
    pub const DESCRIPTOR_COUNT: usize = 4;
    pub const DESCRIPTOR_TEXT_MAX: usize = 13;

    pub const DESCRIPTOR_SERIAL: u8 = 0xFF;
    pub const DESCRIPTOR_TEXT: u8 = 0xFE;
    pub const DESCRIPTOR_NAME: u8 = 0xFC;
}

/// Retry bounds for EDID acquisition
pub mod retry {
    /// Attempts when the read size is fixed (128 or 256)
    pub const EDID_FIXED_SIZE_TRIES: u32 = 2;

    /// Attempts when the read size is auto (2 x 128, then 2 x 256)
    pub const EDID_AUTO_SIZE_TRIES: u32 = 4;

    /// Auto size switches from 128 to 256 bytes at this attempt index
    pub const EDID_AUTO_SWITCH_AT: u32 = 2;
}

/// Defaults for settings
pub mod defaults {
    /// Highest bus number considered when no enumeration source is available
    pub const I2C_BUS_MAX: u32 = 32;

    /// Prime address 0x50 with a zero byte before reading the EDID
    pub const EDID_WRITE_BEFORE_READ: bool = !cfg!(feature = "edid-no-prewrite");
}

/// Bus classification
pub mod sysfs {
    /// Connector directory names of embedded DisplayPort panels contain this
    pub const EDP_MARKER: &str = "-eDP-";

    /// Kernel driver that mis-reports I2C_RDWR with EINVAL
    pub const EINVAL_QUIRK_DRIVER: &str = "nvidia";

    /// Adapter name prefixes that can never carry a monitor
    pub const IGNORABLE_ADAPTER_PREFIXES: &[&str] = &[
        "SMBus",
        "Synopsys DesignWare",
        "soc:i2cdsi", // Raspberry Pi
        "smu",        // Mac G5, probing hangs the system
        "mac-io",     // Mac G5
        "u4",         // Mac G5
        "AMDGPU SMU", // AMD Navi2, probing hangs the card
    ];

    /// nouveau buses that are display buses start with this prefix
    pub const NOUVEAU_DISPLAY_PREFIX: &str = "nvkm-";

    /// PCI base class for display controllers (class & 0xffff0000)
    pub const PCI_CLASS_DISPLAY: u32 = 0x0003_0000;

    /// PCI base class for docking stations (class & 0xffff0000)
    pub const PCI_CLASS_DOCKING: u32 = 0x000a_0000;
}
