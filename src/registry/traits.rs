// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::registry::models::{Map, Player};

#[async_trait]
pub trait MapRepository: Send + Sync {
    /// Start a unit of work. Nothing it saves is visible until `commit`.
    async fn begin(&self) -> anyhow::Result<Box<dyn MapUnitOfWork>>;

    /// Look up a map by its exact (case-sensitive) display name
    async fn find_by_display_name(&self, display_name: &str) -> anyhow::Result<Option<Map>>;

    /// List all maps with their versions
    async fn list_maps(&self) -> anyhow::Result<Vec<Map>>;
}

/// A transactional view of the map store. Dropping it without calling
/// `commit` discards every change.
#[async_trait]
pub trait MapUnitOfWork: Send {
    async fn find_by_display_name(&mut self, display_name: &str) -> anyhow::Result<Option<Map>>;

    /// Insert or update the map and all of its versions.
    /// Returns the aggregate with database ids filled in.
    async fn save(&mut self, map: Map) -> anyhow::Result<Map>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Get a player and their bans by id
    async fn get_player(&self, id: i64) -> anyhow::Result<Option<Player>>;

    /// Insert or replace a player and their bans
    async fn upsert_player(&self, player: Player) -> anyhow::Result<()>;
}
