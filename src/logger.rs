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

//! Logging
//!
//! Diagnostics go through `tracing`. The `--logging` flag additionally
//! appends one JSON object per detection event to an event log.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};

pub const DEFAULT_LOG_PATH: &str = "/var/log/ddcprobe/events.json";
pub const FALLBACK_LOG_PATH: &str = "/tmp/ddcprobe_events.json";

/// Environment variable holding the tracing filter
pub const LOG_ENV: &str = "DDCPROBE_LOG";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<(PathBuf, File)>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Install the stderr tracing subscriber.
///
/// The filter comes from `DDCPROBE_LOG` (e.g. `ddc_core=debug`), defaulting
/// to `info`. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter.as_str())
        .try_init();
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Open the JSON event log, falling back to /tmp when /var/log is not writable
pub fn init_event_log() -> Option<PathBuf> {
    init_event_log_at(Path::new(DEFAULT_LOG_PATH))
}

/// Open the JSON event log at a specific path (with the same /tmp fallback)
pub fn init_event_log_at(path: &Path) -> Option<PathBuf> {
    let (path, file) = match open_append(path) {
        Some(f) => (path.to_path_buf(), f),
        None => {
            let fallback = PathBuf::from(FALLBACK_LOG_PATH);
            let f = open_append(&fallback)?;
            (fallback, f)
        }
    };
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some((path.clone(), file));
    }
    Some(path)
}

/// Path of the open event log, if any
pub fn event_log_path() -> Option<PathBuf> {
    LOG_FILE
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|(p, _)| p.clone()))
}

/// Append one event. Does nothing unless the event log was opened.
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some((_, f)) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// Close the event log
pub fn close_event_log() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = None;
    }
}
