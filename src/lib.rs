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

//! ddcprobe - find the monitors on a Linux system's I2C buses
//!
//! Thin front end over `ddc-core`: argument handling, logging, and the JSON
//! report.

pub mod cli;
pub mod logger;
pub mod report;
