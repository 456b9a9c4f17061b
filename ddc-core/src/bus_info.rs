//! Per-bus probe results

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::edid::ParsedEdid;
use crate::error::{EdidError, Errno};
use crate::i2c::edid_reader::read_raw_edid;
use crate::i2c::probe::probe_ddc_addresses;
use crate::i2c::{I2cContext, I2cFunctionality, I2cIo, IoResult};

bitflags! {
    /// Bus state. Bits are only ever added.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    #[serde(transparent)]
    pub struct BusFlags: u16 {
        /// /dev/i2c-N exists
        const EXISTS = 1 << 0;
        /// Probing has been done
        const PROBED = 1 << 1;
        /// /dev/i2c-N could be opened
        const ACCESSIBLE = 1 << 2;
        const ADDR_0X30 = 1 << 3;
        const ADDR_0X37 = 1 << 4;
        const ADDR_0X50 = 1 << 5;
        /// Wired to an embedded DisplayPort panel
        const EDP = 1 << 6;
    }
}

fn serialize_errno<S: Serializer>(errno: &Option<Errno>, s: S) -> Result<S::Ok, S::Error> {
    match errno {
        Some(e) => s.serialize_some(e.name()),
        None => s.serialize_none(),
    }
}

fn serialize_edid_error<S: Serializer>(err: &Option<EdidError>, s: S) -> Result<S::Ok, S::Error> {
    match err {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// One discovered I2C bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusInfo {
    bus_number: u32,
    flags: BusFlags,
    pub functionality: I2cFunctionality,
    pub edid: Option<ParsedEdid>,
    #[serde(serialize_with = "serialize_errno")]
    pub open_errno: Option<Errno>,
    pub edid_read_attempts: u32,
    #[serde(serialize_with = "serialize_edid_error")]
    pub edid_error: Option<EdidError>,
    pub driver: Option<String>,
}

impl BusInfo {
    pub fn new(bus_number: u32) -> Self {
        Self {
            bus_number,
            flags: BusFlags::empty(),
            functionality: I2cFunctionality::empty(),
            edid: None,
            open_errno: None,
            edid_read_attempts: 0,
            edid_error: None,
            driver: None,
        }
    }

    pub fn bus_number(&self) -> u32 {
        self.bus_number
    }

    pub fn flags(&self) -> BusFlags {
        self.flags
    }

    /// Add state bits. There is no way to clear them.
    pub(crate) fn mark(&mut self, flags: BusFlags) {
        self.flags.insert(flags);
    }

    pub fn exists(&self) -> bool {
        self.flags.contains(BusFlags::EXISTS)
    }

    pub fn is_probed(&self) -> bool {
        self.flags.contains(BusFlags::PROBED)
    }

    pub fn is_accessible(&self) -> bool {
        self.flags.contains(BusFlags::ACCESSIBLE)
    }

    pub fn is_edp(&self) -> bool {
        self.flags.contains(BusFlags::EDP)
    }

    /// Something answered at 0x50
    pub fn has_edid_address(&self) -> bool {
        self.flags.contains(BusFlags::ADDR_0X50)
    }
}

/// Probe one bus and fill in `info`.
///
/// `dev` is the result of opening the bus; the handle is dropped (closing
/// the descriptor) before this returns. Calling this again on a bus that
/// was already probed does nothing.
pub fn check_bus<D: I2cIo>(info: &mut BusInfo, dev: IoResult<D>, ctx: &I2cContext) {
    let busno = info.bus_number;
    if info.is_probed() {
        debug!(busno, "Bus already probed");
        return;
    }

    let is_edp = ctx.sysfs.is_edp_bus(busno);
    if is_edp {
        info.mark(BusFlags::EDP);
    }
    info.driver = ctx.sysfs.i2c_driver_name(busno);

    let mut dev = match dev {
        Ok(dev) => {
            info.mark(BusFlags::EXISTS | BusFlags::PROBED | BusFlags::ACCESSIBLE);
            dev
        }
        Err(errno) => {
            if errno != Errno::ENOENT {
                info.mark(BusFlags::EXISTS);
            }
            info.mark(BusFlags::PROBED);
            info.open_errno = Some(errno);
            ctx.report_io_error(busno, "open", errno);
            return;
        }
    };

    match dev.functionality() {
        Ok(bits) => info.functionality = I2cFunctionality::from_bits_truncate(bits),
        Err(errno) => ctx.report_io_error(busno, "I2C_FUNCS", errno),
    }

    match probe_ddc_addresses(&mut dev, ctx, is_edp) {
        Ok(found) => {
            let mut flags = BusFlags::empty();
            flags.set(BusFlags::ADDR_0X30, found.addr_0x30);
            flags.set(BusFlags::ADDR_0X37, found.addr_0x37);
            flags.set(BusFlags::ADDR_0X50, found.addr_0x50);
            info.mark(flags);
        }
        Err(errno) => {
            ctx.report_io_error(busno, "probe", errno);
        }
    }

    if !info.has_edid_address() {
        info.edid_error = Some(EdidError::NotPresent);
        return;
    }

    match read_raw_edid(&mut dev, ctx) {
        Ok(read) => {
            info.edid_read_attempts = read.attempts;
            info.edid = read.parse();
            match &info.edid {
                Some(edid) => info!(busno, edid = %edid, "Found display"),
                None => {
                    info.edid_error = Some(EdidError::InvalidEdid {
                        attempts: read.attempts,
                    })
                }
            }
        }
        Err(err) => {
            info.edid_read_attempts = err.attempts();
            info.edid_error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::test_edids::{corrupt, make_edid};
    use crate::i2c::device::MockI2cIo;
    use crate::settings::SharedSettings;
    use crate::sysfs::Sysfs;
    use std::fs;
    use tempfile::TempDir;

    fn ctx_at(root: &std::path::Path) -> I2cContext {
        I2cContext::new(SharedSettings::default(), Sysfs::with_root(root))
    }

    /// A bus with a monitor whose EDID reads cleanly
    fn monitor_bus(busno: u32, edid: Vec<u8>) -> MockI2cIo {
        let mut dev = MockI2cIo::new();
        dev.expect_bus_number().return_const(busno);
        dev.expect_functionality().returning(|| Ok(0x0001_0001));
        dev.expect_select_address().returning(|_, _| Ok(()));
        dev.expect_read().returning(|b| Ok(b.len()));
        let edid2 = edid.clone();
        dev.expect_transfer_write_read().returning(move |_, _, buf| {
            let n = buf.len().min(edid.len());
            buf[..n].copy_from_slice(&edid[..n]);
            Ok(())
        });
        dev.expect_transfer_read().returning(move |_, buf| {
            let n = buf.len().min(edid2.len());
            buf[..n].copy_from_slice(&edid2[..n]);
            Ok(())
        });
        dev
    }

    #[test]
    fn test_open_failure_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let mut info = BusInfo::new(3);
        check_bus::<MockI2cIo>(&mut info, Err(Errno::ENOENT), &ctx_at(tmp.path()));

        assert!(info.is_probed());
        assert!(!info.exists());
        assert!(!info.is_accessible());
        assert_eq!(info.open_errno, Some(Errno::ENOENT));
    }

    #[test]
    fn test_permission_denied_still_exists() {
        let tmp = TempDir::new().unwrap();
        let mut info = BusInfo::new(3);
        check_bus::<MockI2cIo>(&mut info, Err(Errno::EACCES), &ctx_at(tmp.path()));
        assert!(info.exists());
        assert!(!info.is_accessible());
    }

    #[test]
    fn test_monitor_bus_gets_edid() {
        let tmp = TempDir::new().unwrap();
        let mut info = BusInfo::new(4);
        check_bus(&mut info, Ok(monitor_bus(4, make_edid("X", "Y"))), &ctx_at(tmp.path()));

        assert!(info.is_accessible() && info.has_edid_address());
        assert!(info.functionality.contains(I2cFunctionality::I2C));
        assert_eq!(info.edid.as_ref().map(|e| e.model_name.as_str()), Some("X"));
        assert_eq!(info.edid_read_attempts, 1);
    }

    #[test]
    fn test_invalid_edid_keeps_address_flag() {
        let tmp = TempDir::new().unwrap();
        let mut info = BusInfo::new(4);
        check_bus(&mut info, Ok(monitor_bus(4, corrupt(make_edid("X", "Y")))), &ctx_at(tmp.path()));

        assert!(info.has_edid_address());
        assert!(info.edid.is_none());
        assert_eq!(info.edid_error, Some(EdidError::InvalidEdid { attempts: 4 }));
    }

    #[test]
    fn test_silent_edid_address_is_not_present() {
        let tmp = TempDir::new().unwrap();
        let mut dev = MockI2cIo::new();
        dev.expect_bus_number().return_const(6u32);
        dev.expect_functionality().returning(|| Ok(0));
        dev.expect_select_address().returning(|_, _| Ok(()));
        dev.expect_read().returning(|_| Err(Errno::ENXIO));

        let mut info = BusInfo::new(6);
        check_bus(&mut info, Ok(dev), &ctx_at(tmp.path()));

        assert!(info.is_accessible());
        assert!(!info.has_edid_address());
        assert_eq!(info.edid_error, Some(EdidError::NotPresent));
        assert_eq!(info.edid_read_attempts, 0);
    }

    #[test]
    fn test_reprobe_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ctx = ctx_at(tmp.path());

        let mut first = BusInfo::new(4);
        check_bus(&mut first, Ok(monitor_bus(4, make_edid("X", "Y"))), &ctx);
        let mut second = BusInfo::new(4);
        check_bus(&mut second, Ok(monitor_bus(4, make_edid("X", "Y"))), &ctx);

        assert_eq!(first.flags(), second.flags());
        assert_eq!(first.edid, second.edid);
    }

    #[test]
    fn test_check_bus_twice_is_noop() {
        let tmp = TempDir::new().unwrap();
        let ctx = ctx_at(tmp.path());
        let mut info = BusInfo::new(4);
        check_bus(&mut info, Ok(monitor_bus(4, make_edid("X", "Y"))), &ctx);
        let before = info.clone();

        // No expectations: any call on this mock would panic
        let mut untouched = MockI2cIo::new();
        untouched.expect_bus_number().return_const(4u32);
        check_bus(&mut info, Ok(untouched), &ctx);
        assert_eq!(info, before);
    }

    #[test]
    fn test_edp_flag_set_before_probe() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sys/class/drm/card1/card1-eDP-1/i2c-4")).unwrap();
        let mut info = BusInfo::new(4);
        check_bus(&mut info, Ok(monitor_bus(4, make_edid("X", "Y"))), &ctx_at(tmp.path()));
        assert!(info.is_edp());
    }
}
