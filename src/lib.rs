/*
 * This file is part of cmk-levels.
 *
 * Copyright (C) 2025 cmk-levels contributors
 *
 * cmk-levels is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * cmk-levels is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with cmk-levels. If not, see <https://www.gnu.org/licenses/>.
 */

//! cmk-check - run monitoring check plugins against agent output
//!
//! Ties the agent protocol parser and the check plugins of `cmk-core` to a
//! command line, persisting each service's value store between runs.

pub mod cli;
pub mod config;
pub mod logger;
pub mod runner;
