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

//! Command-line flags

use serde::Serialize;
use thiserror::Error;

pub const USAGE: &str = "usage: ddcprobe [--logging] [--rescan] [--bus N]...";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("--bus needs a bus number")]
    MissingBusNumber,

    #[error("invalid bus number: {0}")]
    InvalidBusNumber(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Options {
    /// Append detection events to the JSON event log
    pub logging: bool,
    /// Run a second pass after discarding the first
    pub rescan: bool,
    /// Restrict the scan to these buses; empty means every bus
    pub buses: Vec<u32>,
    pub help: bool,
}

/// Parse arguments, excluding the program name
pub fn parse_args<I, S>(args: I) -> Result<Options, CliError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut opts = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_ref() {
            "--logging" => opts.logging = true,
            "--rescan" => opts.rescan = true,
            "-h" | "--help" => opts.help = true,
            "--bus" | "-b" => {
                let value = args.next().ok_or(CliError::MissingBusNumber)?;
                opts.buses.push(parse_busno(value.as_ref())?);
            }
            other => match other.strip_prefix("--bus=") {
                Some(value) => opts.buses.push(parse_busno(value)?),
                None => return Err(CliError::UnknownArgument(other.to_string())),
            },
        }
    }
    Ok(opts)
}

/// Accepts `7` or `i2c-7`
fn parse_busno(value: &str) -> Result<u32, CliError> {
    value
        .strip_prefix("i2c-")
        .unwrap_or(value)
        .parse()
        .map_err(|_| CliError::InvalidBusNumber(value.to_string()))
}
