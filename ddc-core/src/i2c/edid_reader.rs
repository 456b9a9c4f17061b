//! EDID Acquisition Engine
//!
//! Reads the EDID at 0x50 with bounded retries:
//!
//! - fixed size (128 or 256): 2 attempts
//! - auto size: 4 attempts, the first two at 128 bytes, the rest at 256
//!
//! A read that returns bytes failing the checksum counts as an attempt like
//! an I/O error does. ENXIO, EOPNOTSUPP, ETIMEDOUT and EBUSY end the loop at
//! once: they mean nothing is there.
//!
//! Once the nvidia EINVAL quirk has moved the shared strategy to file I/O,
//! the ioctl method reads through write()/read() instead, including on the
//! restarted cycle.

use tracing::{debug, trace, warn};

use super::device::{I2cIo, IoResult};
use super::probe::set_slave_address;
use super::strategy::{file_read, file_write, layer_read, layer_write};
use super::I2cContext;
use crate::constants::{addr, edid as layout, retry};
use crate::edid::{edid_tag, is_valid_cea861_extension, is_valid_raw_edid, EdidSource, ParsedEdid, RawEdid};
use crate::error::{EdidError, Errno};
use crate::settings::{EdidReadMethod, EdidReadSize, IoStrategy};

/// A successfully acquired EDID and the number of reads it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdidRead {
    pub raw: RawEdid,
    pub attempts: u32,
}

impl EdidRead {
    pub fn parse(&self) -> Option<ParsedEdid> {
        ParsedEdid::parse(self.raw.as_bytes(), EdidSource::I2c)
    }
}

/// Per-read options, normally taken from the shared settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdidReadOptions {
    pub method: EdidReadMethod,
    pub size: EdidReadSize,
    pub bytewise: bool,
    pub write_before_read: bool,
}

impl EdidReadOptions {
    pub fn from_context(ctx: &I2cContext) -> Self {
        let s = ctx.settings.snapshot();
        Self {
            method: s.edid_read_method,
            size: s.edid_read_size,
            bytewise: s.edid_read_bytewise,
            write_before_read: s.edid_write_before_read,
        }
    }
}

/// Outcome of one attempt
enum Attempt {
    Io(Errno),
    Invalid,
}

fn is_absence(errno: Errno) -> bool {
    matches!(
        errno,
        Errno::ENXIO | Errno::EOPNOTSUPP | Errno::ETIMEDOUT | Errno::EBUSY
    )
}

/// The method actually used for the next attempt
fn effective_method(ctx: &I2cContext, method: EdidReadMethod) -> EdidReadMethod {
    match method {
        EdidReadMethod::Ioctl
            if ctx.settings.einval_quirk_encountered()
                && ctx.settings.io_strategy() == IoStrategy::FileIo =>
        {
            EdidReadMethod::FileIo
        }
        other => other,
    }
}

/// Read the raw EDID using the configured method and size
pub fn read_raw_edid<D>(dev: &mut D, ctx: &I2cContext) -> Result<EdidRead, EdidError>
where
    D: I2cIo + ?Sized,
{
    read_edid(dev, ctx, EdidReadOptions::from_context(ctx))
}

/// Read and decode the EDID
pub fn read_parsed_edid<D>(dev: &mut D, ctx: &I2cContext) -> Result<(ParsedEdid, u32), EdidError>
where
    D: I2cIo + ?Sized,
{
    let read = read_raw_edid(dev, ctx)?;
    match read.parse() {
        Some(parsed) => Ok((parsed, read.attempts)),
        None => Err(EdidError::InvalidEdid {
            attempts: read.attempts,
        }),
    }
}

/// Read the raw EDID with explicit options
pub fn read_edid<D>(dev: &mut D, ctx: &I2cContext, opts: EdidReadOptions) -> Result<EdidRead, EdidError>
where
    D: I2cIo + ?Sized,
{
    let busno = dev.bus_number();
    let max_tries = match opts.size {
        EdidReadSize::Auto => retry::EDID_AUTO_SIZE_TRIES,
        _ => retry::EDID_FIXED_SIZE_TRIES,
    };

    let mut attempts = 0u32;
    let mut last = Attempt::Invalid;
    let mut restarted = false;
    let mut tryctr = 0u32;

    while tryctr < max_tries {
        let size = opts.size.fixed().unwrap_or(if tryctr < retry::EDID_AUTO_SWITCH_AT {
            layout::BLOCK_SIZE
        } else {
            layout::DOUBLE_BLOCK_SIZE
        });
        let method = effective_method(ctx, opts.method);
        trace!(busno, tryctr, max_tries, size, ?method, "EDID read attempt");

        attempts += 1;
        let rc = read_once(dev, ctx, method, &opts, size);

        if let Err(Errno::EINVAL) = rc {
            if method == EdidReadMethod::Ioctl && !restarted && ctx.has_einval_quirk(busno) {
                warn!(busno, "I2C_RDWR returned EINVAL on quirky driver, restarting EDID read over file I/O");
                ctx.settings.record_einval_quirk();
                restarted = true;
                tryctr = 0;
                continue;
            }
        }
        tryctr += 1;

        match rc {
            Err(errno) if is_absence(errno) => {
                debug!(busno, errno = %errno, attempts, "No EDID device");
                return Err(EdidError::Io { errno, attempts });
            }
            Err(errno) => {
                ctx.report_io_error(busno, "EDID read", errno);
                last = Attempt::Io(errno);
            }
            Ok(bytes) => match validate(busno, bytes) {
                Some(raw) => {
                    debug!(busno, attempts, len = raw.len(), tag = %edid_tag(raw.as_bytes()), "Read EDID");
                    return Ok(EdidRead { raw, attempts });
                }
                None => {
                    debug!(busno, attempt = attempts, "Invalid EDID checksum");
                    last = Attempt::Invalid;
                }
            },
        }
    }

    Err(match last {
        Attempt::Io(errno) => EdidError::Io { errno, attempts },
        Attempt::Invalid => EdidError::InvalidEdid { attempts },
    })
}

/// Accept the bytes if they hold a valid EDID.
///
/// A 256-byte read whose second half is itself a base block (not a CEA-861
/// extension) comes from drivers that return block 0 twice; it is cut back
/// to 128 bytes.
fn validate(busno: u32, mut bytes: Vec<u8>) -> Option<RawEdid> {
    let base_ok = is_valid_raw_edid(&bytes);
    if !base_ok && is_valid_cea861_extension(&bytes) {
        trace!(busno, "EDID read starts with a CEA-861 extension block");
    }

    if bytes.len() == layout::DOUBLE_BLOCK_SIZE {
        let second = &bytes[layout::BLOCK_SIZE..];
        if is_valid_cea861_extension(second) {
            trace!(busno, "Second block is a CEA-861 extension");
        } else if is_valid_raw_edid(second) {
            debug!(busno, "Second block repeats the base block, truncating to 128 bytes");
            if !base_ok {
                bytes.copy_within(layout::BLOCK_SIZE..layout::DOUBLE_BLOCK_SIZE, 0);
            }
            bytes.truncate(layout::BLOCK_SIZE);
            return Some(RawEdid::new(bytes));
        }
    }

    base_ok.then(|| RawEdid::new(bytes))
}

/// One read of `size` bytes. Returns the bytes obtained.
fn read_once<D>(
    dev: &mut D,
    ctx: &I2cContext,
    method: EdidReadMethod,
    opts: &EdidReadOptions,
    size: usize,
) -> IoResult<Vec<u8>>
where
    D: I2cIo + ?Sized,
{
    let mut buf = vec![0u8; size];
    let prime = [0u8; 1];
    match method {
        EdidReadMethod::Ioctl => {
            if opts.write_before_read {
                dev.transfer_write_read(addr::EDID, &prime, &mut buf)?;
            } else {
                dev.transfer_read(addr::EDID, &mut buf)?;
            }
        }
        EdidReadMethod::FileIo => {
            set_slave_address(dev, addr::EDID, ctx.settings.force_slave_address())?;
            if opts.write_before_read {
                file_write(dev, &prime)?;
            }
            if opts.bytewise {
                file_read(dev, true, &mut buf)?;
            } else {
                // A short read is kept and left to fail validation
                let n = dev.read(&mut buf)?;
                buf.truncate(n);
            }
        }
        EdidReadMethod::I2cLayer => {
            if opts.write_before_read {
                layer_write(dev, ctx, addr::EDID, &prime)?;
            }
            layer_read(dev, ctx, addr::EDID, opts.bytewise, &mut buf)?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::test_edids::*;
    use crate::i2c::device::MockI2cIo;
    use crate::settings::{DdcSettings, IoStrategy, SharedSettings};
    use crate::sysfs::Sysfs;
    use mockall::predicate::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn ctx() -> I2cContext {
        I2cContext::new(SharedSettings::default(), Sysfs::with_root("/nonexistent"))
    }

    fn opts(method: EdidReadMethod, size: EdidReadSize) -> EdidReadOptions {
        EdidReadOptions {
            method,
            size,
            bytewise: false,
            write_before_read: true,
        }
    }

    fn mock_bus(busno: u32) -> MockI2cIo {
        let mut dev = MockI2cIo::new();
        dev.expect_bus_number().return_const(busno);
        dev
    }

    fn fill(buf: &mut [u8], src: &[u8]) {
        let n = buf.len().min(src.len());
        buf[..n].copy_from_slice(&src[..n]);
    }

    #[test]
    fn test_fixed_size_bounded_to_two_attempts() {
        let bad = corrupt(make_edid("X", "Y"));
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(2)
            .returning(move |_, _, buf| {
                fill(buf, &bad);
                Ok(())
            });

        let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes128))
            .unwrap_err();
        assert_eq!(err, EdidError::InvalidEdid { attempts: 2 });
    }

    #[test]
    fn test_auto_size_bounded_to_four_attempts() {
        let bad = corrupt(make_edid("X", "Y"));
        let sizes = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = sizes.clone();
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(4)
            .returning(move |_, _, buf| {
                seen.lock().push(buf.len());
                fill(buf, &bad);
                Ok(())
            });

        let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Auto))
            .unwrap_err();
        assert_eq!(err.attempts(), 4);
        assert_eq!(*sizes.lock(), vec![128, 128, 256, 256]);
    }

    #[test]
    fn test_enxio_short_circuits() {
        let mut dev = mock_bus(7);
        dev.expect_transfer_write_read()
            .times(1)
            .returning(|_, _, _| Err(Errno::ENXIO));

        let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Auto))
            .unwrap_err();
        assert_eq!(err, EdidError::Io { errno: Errno::ENXIO, attempts: 1 });
    }

    #[test]
    fn test_eio_is_retried() {
        let good = make_edid("X", "Y");
        let mut calls = 0;
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(2)
            .returning(move |_, _, buf| {
                calls += 1;
                if calls == 1 {
                    Err(Errno::EIO)
                } else {
                    fill(buf, &good);
                    Ok(())
                }
            });

        let read = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Auto)).unwrap();
        assert_eq!(read.attempts, 2);
        assert_eq!(read.raw.len(), 128);
    }

    #[test]
    fn test_exhausted_io_errors_report_errno() {
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(2)
            .returning(|_, _, _| Err(Errno::EIO));

        let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes256))
            .unwrap_err();
        assert_eq!(err, EdidError::Io { errno: Errno::EIO, attempts: 2 });
    }

    #[test]
    fn test_duplicated_base_block_is_truncated() {
        let base = make_edid("X", "Y");
        let mut doubled = base.clone();
        doubled.extend_from_slice(&base);
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(1)
            .returning(move |_, _, buf| {
                fill(buf, &doubled);
                Ok(())
            });

        let read = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes256)).unwrap();
        assert_eq!(read.raw.len(), 128);
        assert_eq!(read.raw.as_bytes(), &base[..]);
    }

    #[test]
    fn test_cea_extension_is_kept() {
        let mut full = make_edid("X", "Y");
        full.extend(make_cea_extension());
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(1)
            .returning(move |_, _, buf| {
                fill(buf, &full);
                Ok(())
            });

        let read = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes256)).unwrap();
        assert_eq!(read.raw.len(), 256);
        assert!(read.parse().unwrap().extension.is_some());
    }

    #[test]
    fn test_ioctl_without_prewrite_uses_read_only_message() {
        let good = make_edid("X", "Y");
        let mut dev = mock_bus(4);
        dev.expect_transfer_read()
            .with(eq(0x50u16), always())
            .times(1)
            .returning(move |_, buf| {
                fill(buf, &good);
                Ok(())
            });

        let mut o = opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes128);
        o.write_before_read = false;
        assert!(read_edid(&mut dev, &ctx(), o).is_ok());
    }

    #[test]
    fn test_file_io_primes_and_reads() {
        let good = make_edid("DELL", "SN1");
        let mut dev = mock_bus(4);
        dev.expect_select_address()
            .with(eq(0x50u16), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));
        dev.expect_write()
            .withf(|b: &[u8]| b == [0u8])
            .times(1)
            .returning(|b| Ok(b.len()));
        dev.expect_read().times(1).returning(move |buf| {
            fill(buf, &good);
            Ok(buf.len())
        });

        let (parsed, attempts) = {
            let read = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::FileIo, EdidReadSize::Auto)).unwrap();
            (read.parse().unwrap(), read.attempts)
        };
        assert_eq!(parsed.model_name, "DELL");
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_i2c_layer_follows_io_strategy() {
        let good = make_edid("X", "Y");
        let settings = DdcSettings {
            edid_read_method: EdidReadMethod::I2cLayer,
            io_strategy: IoStrategy::Ioctl,
            ..DdcSettings::default()
        };
        let ctx = I2cContext::new(SharedSettings::new(settings), Sysfs::with_root("/nonexistent"));
        let mut dev = mock_bus(4);
        dev.expect_transfer_write()
            .withf(|a: &u16, b: &[u8]| *a == 0x50 && b == [0u8])
            .times(1)
            .returning(|_, _| Ok(()));
        dev.expect_transfer_read().times(1).returning(move |_, buf| {
            fill(buf, &good);
            Ok(())
        });

        let (parsed, attempts) = read_parsed_edid(&mut dev, &ctx).unwrap();
        assert_eq!(parsed.mfg_id, "DEL");
        assert_eq!(attempts, 1);
    }

    fn nvidia_ctx(root: &std::path::Path, busno: u32) -> I2cContext {
        let module = root.join("sys/module/nvidia");
        std::fs::create_dir_all(&module).unwrap();
        let drv = root.join(format!("sys/bus/i2c/devices/i2c-{}/device/driver", busno));
        std::fs::create_dir_all(&drv).unwrap();
        symlink(&module, drv.join("module")).unwrap();
        I2cContext::new(SharedSettings::default(), Sysfs::with_root(root))
    }

    /// Serves `edid` through select/write/read, as a bus does under file I/O
    fn expect_file_io_read(dev: &mut MockI2cIo, edid: Vec<u8>) {
        dev.expect_select_address()
            .with(eq(0x50u16), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));
        dev.expect_write()
            .withf(|b: &[u8]| b == [0u8])
            .times(1)
            .returning(|b| Ok(b.len()));
        dev.expect_read().times(1).returning(move |buf| {
            fill(buf, &edid);
            Ok(buf.len())
        });
    }

    #[test]
    fn test_einval_quirk_restarts_over_file_io() {
        let tmp = TempDir::new().unwrap();
        let ctx = nvidia_ctx(tmp.path(), 5);
        let good = make_edid("NV", "1");

        let mut dev = mock_bus(5);
        dev.expect_transfer_write_read()
            .times(1)
            .returning(|_, _, _| Err(Errno::EINVAL));
        expect_file_io_read(&mut dev, good.clone());

        let read = read_edid(&mut dev, &ctx, opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes128)).unwrap();
        assert_eq!(read.raw.as_bytes(), &good[..]);
        assert_eq!(read.attempts, 2);
        assert!(ctx.settings.einval_quirk_encountered());
        assert_eq!(ctx.settings.io_strategy(), IoStrategy::FileIo);
    }

    #[test]
    fn test_later_bus_skips_ioctl_after_quirk() {
        let tmp = TempDir::new().unwrap();
        let ctx = nvidia_ctx(tmp.path(), 6);
        ctx.settings.record_einval_quirk();

        // No transfer_* expectation: an ioctl here would fail the test
        let mut dev = mock_bus(6);
        expect_file_io_read(&mut dev, make_edid("NV", "2"));

        let read = read_edid(&mut dev, &ctx, opts(EdidReadMethod::Ioctl, EdidReadSize::Auto)).unwrap();
        assert_eq!(read.attempts, 1);
    }

    #[test]
    fn test_einval_quirk_restarts_only_once() {
        let tmp = TempDir::new().unwrap();
        let ctx = nvidia_ctx(tmp.path(), 5);

        let mut dev = mock_bus(5);
        dev.expect_transfer_write_read()
            .times(1)
            .returning(|_, _, _| Err(Errno::EINVAL));
        dev.expect_select_address().times(2).returning(|_, _| Ok(()));
        dev.expect_write().times(2).returning(|_| Err(Errno::EINVAL));

        let err = read_edid(&mut dev, &ctx, opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes128))
            .unwrap_err();
        assert_eq!(err, EdidError::Io { errno: Errno::EINVAL, attempts: 3 });
    }

    #[test]
    fn test_einval_without_quirk_driver_is_ordinary_error() {
        let mut dev = mock_bus(5);
        dev.expect_transfer_write_read()
            .times(2)
            .returning(|_, _, _| Err(Errno::EINVAL));

        let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes128))
            .unwrap_err();
        assert_eq!(err.attempts(), 2);
    }

    #[test]
    fn test_absence_errnos_short_circuit() {
        for errno in [Errno::EOPNOTSUPP, Errno::ETIMEDOUT, Errno::EBUSY] {
            let mut dev = mock_bus(7);
            dev.expect_transfer_write_read()
                .times(1)
                .returning(move |_, _, _| Err(errno));

            let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Auto))
                .unwrap_err();
            assert_eq!(err, EdidError::Io { errno, attempts: 1 });
        }
    }

    #[test]
    fn test_valid_second_half_replaces_corrupt_first() {
        let base = make_edid("X", "Y");
        let mut doubled = corrupt(base.clone());
        doubled.extend_from_slice(&base);
        let mut dev = mock_bus(4);
        dev.expect_transfer_write_read()
            .times(1)
            .returning(move |_, _, buf| {
                fill(buf, &doubled);
                Ok(())
            });

        let read = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::Ioctl, EdidReadSize::Bytes256)).unwrap();
        assert_eq!(read.attempts, 1);
        assert_eq!(read.raw.as_bytes(), &base[..]);
    }

    #[test]
    fn test_file_io_short_read_is_retried() {
        let good = make_edid("X", "Y");
        let mut dev = mock_bus(4);
        dev.expect_select_address().times(2).returning(|_, _| Ok(()));
        dev.expect_write().times(2).returning(|b| Ok(b.len()));
        dev.expect_read().times(2).returning(move |buf| {
            fill(buf, &good);
            Ok(64)
        });

        let err = read_edid(&mut dev, &ctx(), opts(EdidReadMethod::FileIo, EdidReadSize::Bytes128))
            .unwrap_err();
        assert_eq!(err, EdidError::InvalidEdid { attempts: 2 });
    }
}
