// SPDX-License-Identifier: GPL-3.0-only
#[allow(clippy::module_inception)]
mod config;

pub use config::{Config, GameLogsConfig, MapConfig, ReplayConfig};
