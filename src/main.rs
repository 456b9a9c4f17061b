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

use ddc_core::{load_settings, SharedSettings, Sysfs};
use ddcprobe::{cli, logger, report};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    // Gather args once
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match cli::parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("ddcprobe: {}", e);
            eprintln!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };
    if opts.help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    logger::init_tracing();

    // Optional JSON event log
    if opts.logging {
        if let Some(path) = logger::init_event_log() {
            info!(path = %path.display(), "Event log enabled");
        }
        logger::log_event("startup", serde_json::json!({ "options": &opts }));
    }

    // /dev/i2c-N is usually root or group i2c only
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root; buses without group access will show as inaccessible");
    }

    let settings = match load_settings() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Could not load settings, using defaults");
            Default::default()
        }
    };
    let settings = SharedSettings::new(settings);

    let registry = report::run_detection(&settings, &Sysfs::system(), &opts.buses, opts.rescan)?;
    let doc = report::build_report(&registry, &settings)?;
    println!("{}", serde_json::to_string_pretty(&doc)?);

    logger::log_event(
        "finished",
        serde_json::json!({ "buses": registry.len(), "displays": registry.xref().len() }),
    );
    Ok(())
}
