use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use super::{Store, StoreError};
use crate::models::{format_timestamp, NewPlayer, PlayerRecord, PlayerUpdate};

/// Local backend with the same two tables as the hosted database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database. A single connection that never expires,
    /// since every SQLite connection to `:memory:` opens its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the tables if needed and provision the counter row with
    /// `initial_counter` when the counter table is empty.
    pub async fn init_schema(&self, initial_counter: i64) -> Result<(), StoreError> {
        sqlx::query(r#"CREATE TABLE IF NOT EXISTS codipartida (numero INTEGER NOT NULL)"#)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"INSERT INTO codipartida (numero)
               SELECT ? WHERE NOT EXISTS (SELECT 1 FROM codipartida)"#
        )
        .bind(initial_counter)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS jugadors (
                   "idGrup" INTEGER PRIMARY KEY AUTOINCREMENT,
                   "numeroPartida" INTEGER NOT NULL,
                   "nomGrup" TEXT NOT NULL,
                   "numeroClaus" INTEGER NOT NULL DEFAULT 0,
                   "guanyador" INTEGER NOT NULL DEFAULT 0,
                   "dataPartida" TEXT,
                   "darreraConnexio" TEXT,
                   "darreraPosicioX" REAL NOT NULL DEFAULT 0,
                   "darreraPosicioY" REAL NOT NULL DEFAULT 0
               )"#
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("SQLite schema ready");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn read_counter(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(r#"SELECT numero FROM codipartida LIMIT 1"#)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::CounterMissing)
    }

    async fn compare_and_set_counter(&self, expected: i64, next: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"UPDATE codipartida SET numero = ? WHERE numero = ?"#)
            .bind(next)
            .bind(expected)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let players = sqlx::query_as::<_, PlayerRecord>(
            r#"SELECT * FROM jugadors ORDER BY "idGrup""#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(players)
    }

    async fn insert_player(&self, player: &NewPlayer) -> Result<PlayerRecord, StoreError> {
        let record = sqlx::query_as::<_, PlayerRecord>(
            r#"INSERT INTO jugadors (
                   "numeroPartida", "nomGrup", "numeroClaus", "guanyador",
                   "dataPartida", "darreraConnexio", "darreraPosicioX", "darreraPosicioY"
               )
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#
        )
        .bind(player.numero_partida)
        .bind(&player.nom_grup)
        .bind(player.numero_claus)
        .bind(player.guanyador)
        .bind(&player.data_partida)
        .bind(&player.darrera_connexio)
        .bind(player.darrera_posicio_x)
        .bind(player.darrera_posicio_y)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_player(&self, id_grup: i64, update: &PlayerUpdate) -> Result<u64, StoreError> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE jugadors SET ");
        let mut columns = query.separated(", ");
        if let Some(v) = update.numero_partida {
            columns.push(r#""numeroPartida" = "#).push_bind_unseparated(v);
        }
        if let Some(v) = &update.nom_grup {
            columns.push(r#""nomGrup" = "#).push_bind_unseparated(v.clone());
        }
        if let Some(v) = update.numero_claus {
            columns.push(r#""numeroClaus" = "#).push_bind_unseparated(v);
        }
        if let Some(v) = update.guanyador {
            columns.push(r#""guanyador" = "#).push_bind_unseparated(v);
        }
        if let Some(v) = &update.data_partida {
            columns.push(r#""dataPartida" = "#).push_bind_unseparated(v.clone());
        }
        if let Some(v) = &update.darrera_connexio {
            columns.push(r#""darreraConnexio" = "#).push_bind_unseparated(v.clone());
        }
        if let Some(v) = update.darrera_posicio_x {
            columns.push(r#""darreraPosicioX" = "#).push_bind_unseparated(v);
        }
        if let Some(v) = update.darrera_posicio_y {
            columns.push(r#""darreraPosicioY" = "#).push_bind_unseparated(v);
        }
        query.push(r#" WHERE "idGrup" = "#).push_bind(id_grup);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_players_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        // Timestamps are stored normalised, so text order is time order
        let result = sqlx::query(r#"DELETE FROM jugadors WHERE "dataPartida" < ?"#)
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
