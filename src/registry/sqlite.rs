// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use crate::registry::models::{BanDurationType, BanInfo, BanLevel, Map, MapVersion, Player};
use crate::registry::{MapRepository, MapUnitOfWork, PlayerRepository};
use tracing::{debug, info, warn};

pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.init_schema().await?;

        Ok(registry)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY,
                login TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
                level TEXT NOT NULL,
                duration TEXT NOT NULL,
                expires_at TEXT,
                revoked_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // display_name is unique so that two concurrent first uploads of the
        // same title cannot both commit
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS maps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name TEXT NOT NULL UNIQUE,
                author_id INTEGER,
                map_type TEXT NOT NULL,
                battle_type TEXT NOT NULL,
                create_time TEXT NOT NULL,
                update_time TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS map_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                map_id INTEGER NOT NULL REFERENCES maps(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                crc TEXT NOT NULL,
                description TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                max_players INTEGER NOT NULL,
                ranked INTEGER NOT NULL,
                hidden INTEGER NOT NULL,
                filename TEXT NOT NULL,
                UNIQUE (map_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Initialized SQLite registry schema");
        Ok(())
    }
}

fn parse_timestamp(value: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    value
        .map(|v| Ok(DateTime::parse_from_rfc3339(&v)?.with_timezone(&Utc)))
        .transpose()
}

fn ban_level_to_str(level: BanLevel) -> &'static str {
    match level {
        BanLevel::Global => "global",
        BanLevel::Chat => "chat",
        BanLevel::Vault => "vault",
    }
}

fn ban_level_from_str(value: &str) -> BanLevel {
    match value {
        "chat" => BanLevel::Chat,
        "vault" => BanLevel::Vault,
        "global" => BanLevel::Global,
        _ => {
            warn!(level = %value, "Unknown ban level, treating as 'global'");
            BanLevel::Global
        }
    }
}

fn ban_duration_to_str(duration: BanDurationType) -> &'static str {
    match duration {
        BanDurationType::Permanent => "permanent",
        BanDurationType::Temporary => "temporary",
    }
}

fn ban_duration_from_str(value: &str) -> BanDurationType {
    match value {
        "temporary" => BanDurationType::Temporary,
        "permanent" => BanDurationType::Permanent,
        _ => {
            warn!(duration = %value, "Unknown ban duration, treating as 'permanent'");
            BanDurationType::Permanent
        }
    }
}

fn map_from_row(row: &SqliteRow) -> Map {
    Map {
        id: Some(row.get::<i64, _>("id")),
        display_name: row.get::<String, _>("display_name"),
        author: row.get::<Option<i64>, _>("author_id"),
        map_type: row.get::<String, _>("map_type"),
        battle_type: row.get::<String, _>("battle_type"),
        versions: Vec::new(),
    }
}

fn version_from_row(row: &SqliteRow) -> MapVersion {
    MapVersion {
        id: Some(row.get::<i64, _>("id")),
        version: row.get::<i64, _>("version") as u32,
        crc: row.get::<String, _>("crc"),
        description: row.get::<String, _>("description"),
        width: row.get::<i64, _>("width") as u32,
        height: row.get::<i64, _>("height") as u32,
        max_players: row.get::<i64, _>("max_players") as u32,
        ranked: row.get::<bool, _>("ranked"),
        hidden: row.get::<bool, _>("hidden"),
        filename: row.get::<String, _>("filename"),
    }
}

async fn load_versions(conn: &mut SqliteConnection, mut map: Map) -> anyhow::Result<Map> {
    let rows = sqlx::query("SELECT * FROM map_versions WHERE map_id = ?1 ORDER BY version")
        .bind(map.id)
        .fetch_all(&mut *conn)
        .await?;

    map.versions = rows.iter().map(version_from_row).collect();
    Ok(map)
}

async fn find_map(conn: &mut SqliteConnection, display_name: &str) -> anyhow::Result<Option<Map>> {
    let row = sqlx::query("SELECT * FROM maps WHERE display_name = ?1")
        .bind(display_name)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(load_versions(conn, map_from_row(&row)).await?)),
        None => Ok(None),
    }
}

async fn save_map(conn: &mut SqliteConnection, mut map: Map) -> anyhow::Result<Map> {
    let now = Utc::now().to_rfc3339();

    let map_id = match map.id {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE maps
                SET display_name = ?2, author_id = ?3, map_type = ?4, battle_type = ?5, update_time = ?6
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(&map.display_name)
            .bind(map.author)
            .bind(&map.map_type)
            .bind(&map.battle_type)
            .bind(&now)
            .execute(&mut *conn)
            .await?;
            id
        }
        None => sqlx::query(
            r#"
            INSERT INTO maps (display_name, author_id, map_type, battle_type, create_time, update_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&map.display_name)
        .bind(map.author)
        .bind(&map.map_type)
        .bind(&map.battle_type)
        .bind(&now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid(),
    };
    map.id = Some(map_id);

    for version in map.versions.iter_mut() {
        match version.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE map_versions
                    SET version = ?2, crc = ?3, description = ?4, width = ?5, height = ?6,
                        max_players = ?7, ranked = ?8, hidden = ?9, filename = ?10
                    WHERE id = ?1
                    "#,
                )
                .bind(id)
                .bind(version.version as i64)
                .bind(&version.crc)
                .bind(&version.description)
                .bind(version.width as i64)
                .bind(version.height as i64)
                .bind(version.max_players as i64)
                .bind(version.ranked)
                .bind(version.hidden)
                .bind(&version.filename)
                .execute(&mut *conn)
                .await?;
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO map_versions (map_id, version, crc, description, width, height, max_players, ranked, hidden, filename)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                )
                .bind(map_id)
                .bind(version.version as i64)
                .bind(&version.crc)
                .bind(&version.description)
                .bind(version.width as i64)
                .bind(version.height as i64)
                .bind(version.max_players as i64)
                .bind(version.ranked)
                .bind(version.hidden)
                .bind(&version.filename)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();
                version.id = Some(id);
            }
        }
    }

    debug!(map_id, versions = map.versions.len(), "Saved map");
    Ok(map)
}

pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl MapUnitOfWork for SqliteUnitOfWork {
    async fn find_by_display_name(&mut self, display_name: &str) -> anyhow::Result<Option<Map>> {
        find_map(&mut self.tx, display_name).await
    }

    async fn save(&mut self, map: Map) -> anyhow::Result<Map> {
        save_map(&mut self.tx, map).await
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl MapRepository for SqliteRegistry {
    async fn begin(&self) -> anyhow::Result<Box<dyn MapUnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }

    async fn find_by_display_name(&self, display_name: &str) -> anyhow::Result<Option<Map>> {
        let mut conn = self.pool.acquire().await?;
        find_map(&mut conn, display_name).await
    }

    async fn list_maps(&self) -> anyhow::Result<Vec<Map>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query("SELECT * FROM maps ORDER BY display_name")
            .fetch_all(&mut *conn)
            .await?;

        let mut maps = Vec::with_capacity(rows.len());
        for row in rows {
            maps.push(load_versions(&mut conn, map_from_row(&row)).await?);
        }

        Ok(maps)
    }
}

#[async_trait]
impl PlayerRepository for SqliteRegistry {
    async fn get_player(&self, id: i64) -> anyhow::Result<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ban_rows = sqlx::query("SELECT * FROM bans WHERE player_id = ?1")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let mut bans = Vec::with_capacity(ban_rows.len());
        for ban in ban_rows {
            bans.push(BanInfo {
                level: ban_level_from_str(&ban.get::<String, _>("level")),
                duration: ban_duration_from_str(&ban.get::<String, _>("duration")),
                expires_at: parse_timestamp(ban.get::<Option<String>, _>("expires_at"))?,
                revoked_at: parse_timestamp(ban.get::<Option<String>, _>("revoked_at"))?,
            });
        }

        Ok(Some(Player {
            id: row.get::<i64, _>("id"),
            login: row.get::<String, _>("login"),
            is_admin: row.get::<bool, _>("is_admin"),
            bans,
        }))
    }

    async fn upsert_player(&self, player: Player) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO players (id, login, is_admin) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET login = excluded.login, is_admin = excluded.is_admin
            "#,
        )
        .bind(player.id)
        .bind(&player.login)
        .bind(player.is_admin)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM bans WHERE player_id = ?1")
            .bind(player.id)
            .execute(&mut *tx)
            .await?;

        for ban in &player.bans {
            sqlx::query(
                r#"
                INSERT INTO bans (player_id, level, duration, expires_at, revoked_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(player.id)
            .bind(ban_level_to_str(ban.level))
            .bind(ban_duration_to_str(ban.duration))
            .bind(ban.expires_at.map(|t| t.to_rfc3339()))
            .bind(ban.revoked_at.map(|t| t.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(player_id = player.id, "Stored player");
        Ok(())
    }
}
