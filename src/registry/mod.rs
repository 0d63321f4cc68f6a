// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod traits;
pub mod sqlite;

pub use models::{BanDurationType, BanInfo, BanLevel, Map, MapVersion, Player};
pub use traits::{MapRepository, MapUnitOfWork, PlayerRepository};
pub use sqlite::SqliteRegistry;
