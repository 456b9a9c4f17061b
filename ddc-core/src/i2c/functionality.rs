//! I2C_FUNCS capability bits

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Adapter capabilities reported by the I2C_FUNCS ioctl
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct I2cFunctionality: u32 {
        const I2C = 0x0000_0001;
        const TEN_BIT_ADDR = 0x0000_0002;
        const PROTOCOL_MANGLING = 0x0000_0004;
        const SMBUS_PEC = 0x0000_0008;
        const NOSTART = 0x0000_0010;
        const SLAVE = 0x0000_0020;
        const SMBUS_BLOCK_PROC_CALL = 0x0000_8000;
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const SMBUS_PROC_CALL = 0x0080_0000;
        const SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const SMBUS_WRITE_BLOCK_DATA = 0x0200_0000;
        const SMBUS_READ_I2C_BLOCK = 0x0400_0000;
        const SMBUS_WRITE_I2C_BLOCK = 0x0800_0000;
        const SMBUS_HOST_NOTIFY = 0x1000_0000;
    }
}

impl I2cFunctionality {
    /// Kernel-style names of every set bit, lowest first
    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| format!("I2C_FUNC_{}", name))
            .collect()
    }

    /// Plain I2C transfers, needed for the I2C_RDWR strategy
    pub fn supports_ioctl_io(&self) -> bool {
        self.contains(Self::I2C)
    }

    /// write()/read() on the fd map onto byte-level SMBus or plain I2C
    pub fn supports_file_io(&self) -> bool {
        self.contains(Self::I2C)
            || self.contains(Self::SMBUS_READ_BYTE | Self::SMBUS_WRITE_BYTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_in_bit_order() {
        let f = I2cFunctionality::from_bits_truncate(0x0001_0001);
        assert_eq!(f.names(), vec!["I2C_FUNC_I2C", "I2C_FUNC_SMBUS_QUICK"]);
    }

    #[test]
    fn test_unknown_bits_dropped() {
        let f = I2cFunctionality::from_bits_truncate(0x8000_0000 | 0x1);
        assert_eq!(f, I2cFunctionality::I2C);
    }

    #[test]
    fn test_io_support() {
        let smbus_only = I2cFunctionality::SMBUS_READ_BYTE | I2cFunctionality::SMBUS_WRITE_BYTE;
        assert!(!smbus_only.supports_ioctl_io());
        assert!(smbus_only.supports_file_io());
        assert!(I2cFunctionality::I2C.supports_ioctl_io());
        assert!(!I2cFunctionality::SMBUS_QUICK.supports_file_io());
    }
}
