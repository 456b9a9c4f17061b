/*
 * This file is part of ddcprobe.
 *
 * Copyright (C) 2025 ddcprobe contributors
 *
 * ddcprobe is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 2 of the License, or
 * (at your option) any later version.
 *
 * ddcprobe is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ddcprobe. If not, see <https://www.gnu.org/licenses/>.
 */

//! Detection pass and its JSON snapshot

use ddc_core::{
    BusEnumerator, BusOpener, BusRegistry, BusScanner, DevI2cOpener, FixedBusEnumerator,
    I2cContext, SharedSettings, Sysfs, SysfsBusEnumerator,
};
use ddc_error::Result;
use serde_json::{json, Value};
use tracing::info;

use crate::logger::log_event;

/// Scan the buses listed in `buses`, or every bus when empty.
///
/// With `rescan` the first registry is discarded and a second pass run,
/// which is how callers pick up hot-plugged monitors.
pub fn run_detection(
    settings: &SharedSettings,
    sysfs: &Sysfs,
    buses: &[u32],
    rescan: bool,
) -> Result<BusRegistry> {
    let ctx = I2cContext::new(settings.clone(), sysfs.clone());
    let opener = DevI2cOpener::new(sysfs.clone());
    if buses.is_empty() {
        scan(
            BusScanner::new(ctx, SysfsBusEnumerator::new(sysfs.clone()), opener),
            rescan,
        )
    } else {
        scan(
            BusScanner::new(ctx, FixedBusEnumerator(buses.to_vec()), opener),
            rescan,
        )
    }
}

fn scan<E: BusEnumerator, O: BusOpener>(scanner: BusScanner<E, O>, rescan: bool) -> Result<BusRegistry> {
    let mut registry = scanner.scan_all()?;
    log_scan("scan", &registry);
    if rescan {
        scanner.rescan(&mut registry)?;
        log_scan("rescan", &registry);
    }
    Ok(registry)
}

fn log_scan(event: &str, registry: &BusRegistry) {
    info!(
        buses = registry.len(),
        displays = registry.buses_with_edid().count(),
        "{} finished",
        event
    );
    for bus in registry.buses() {
        log_event(
            "bus",
            json!({
                "pass": event,
                "busno": bus.bus_number(),
                "flags": format!("{:?}", bus.flags()),
                "edid": bus.edid.as_ref().map(|e| e.tag.clone()),
                "attempts": bus.edid_read_attempts,
            }),
        );
    }
}

/// The document printed by the binary
pub fn build_report(registry: &BusRegistry, settings: &SharedSettings) -> Result<Value> {
    let s = settings.snapshot();
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "settings": {
            "edid_read_method": s.edid_read_method,
            "edid_read_size": s.edid_read_size,
            "io_strategy": s.io_strategy,
            "probe_ddc_addresses": s.probe_ddc_addresses,
        },
        "einval_quirk_encountered": s.einval_quirk_encountered,
        "registry": registry.snapshot()?,
    }))
}
