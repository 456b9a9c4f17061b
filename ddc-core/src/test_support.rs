//! Scripted buses for scanner tests
//!
//! A [`ScriptedOpener`] hands out [`ScriptedBus`] handles that answer at a
//! fixed set of addresses and replay a queue of EDID read results.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::constants::addr;
use crate::error::Errno;
use crate::i2c::{BusOpener, I2cIo, IoResult};

/// What a simulated bus does
#[derive(Debug, Clone)]
pub struct BusScript {
    pub open: IoResult<()>,
    pub responders: Vec<u16>,
    pub functionality: u32,
    /// Replayed in order by EDID reads; an exhausted queue reads as EIO
    pub edid_reads: VecDeque<IoResult<Vec<u8>>>,
}

impl BusScript {
    /// Device node missing
    pub fn absent() -> Self {
        Self {
            open: Err(Errno::ENOENT),
            responders: Vec::new(),
            functionality: 0,
            edid_reads: VecDeque::new(),
        }
    }

    /// Answers at 0x50 and replays `reads`
    pub fn monitor(reads: Vec<IoResult<Vec<u8>>>) -> Self {
        Self {
            open: Ok(()),
            responders: vec![addr::EDID],
            functionality: 0x0001_0001,
            edid_reads: reads.into(),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedBus {
    busno: u32,
    script: BusScript,
    selected: Option<u16>,
    edid_calls: Arc<AtomicU32>,
}

impl ScriptedBus {
    fn next_edid(&mut self, buf: &mut [u8]) -> IoResult<()> {
        self.edid_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = self.script.edid_reads.pop_front().unwrap_or(Err(Errno::EIO))?;
        let n = buf.len().min(bytes.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        buf[n..].fill(0);
        Ok(())
    }
}

impl I2cIo for ScriptedBus {
    fn bus_number(&self) -> u32 {
        self.busno
    }

    fn select_address(&mut self, addr: u16, _force: bool) -> IoResult<()> {
        self.selected = Some(addr);
        Ok(())
    }

    fn functionality(&mut self) -> IoResult<u32> {
        Ok(self.script.functionality)
    }

    fn write(&mut self, bytes: &[u8]) -> IoResult<usize> {
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match self.selected {
            Some(a) if self.script.responders.contains(&a) => Ok(buf.len()),
            _ => Err(Errno::ENXIO),
        }
    }

    fn transfer_write(&mut self, _addr: u16, _bytes: &[u8]) -> IoResult<()> {
        Ok(())
    }

    fn transfer_read(&mut self, _addr: u16, buf: &mut [u8]) -> IoResult<()> {
        self.next_edid(buf)
    }

    fn transfer_write_read(&mut self, _addr: u16, _bytes: &[u8], buf: &mut [u8]) -> IoResult<()> {
        self.next_edid(buf)
    }
}

/// Opens scripted buses; unknown bus numbers are absent
#[derive(Debug, Default)]
pub struct ScriptedOpener {
    scripts: Mutex<HashMap<u32, BusScript>>,
    edid_calls: Mutex<HashMap<u32, Arc<AtomicU32>>>,
}

impl ScriptedOpener {
    pub fn with(mut self, busno: u32, script: BusScript) -> Self {
        self.scripts.get_mut().insert(busno, script);
        self
    }

    /// Underlying EDID transfers issued on a bus so far
    pub fn edid_calls(&self, busno: u32) -> u32 {
        self.edid_calls
            .lock()
            .get(&busno)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl BusOpener for ScriptedOpener {
    type Bus = ScriptedBus;

    fn open(&self, busno: u32, _read_only: bool) -> IoResult<ScriptedBus> {
        let script = self
            .scripts
            .lock()
            .get(&busno)
            .cloned()
            .unwrap_or_else(BusScript::absent);
        script.open?;
        let calls = self
            .edid_calls
            .lock()
            .entry(busno)
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .clone();
        Ok(ScriptedBus {
            busno,
            script,
            selected: None,
            edid_calls: calls,
        })
    }
}
